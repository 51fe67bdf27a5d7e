//! Path resolution for the encoder checkpoint and the data directory.

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// File that must exist for a directory to count as a checkpoint.
const WEIGHTS_FILENAME: &str = "model.safetensors";

/// Database file name.
const DATABASE_FILENAME: &str = "chunks.redb";

/// Environment variable overriding the checkpoint directory.
const MODEL_DIR_ENV: &str = "THREADMARK_MODEL_DIR";

/// Finds the encoder checkpoint directory.
///
/// Search order:
/// 1. `$THREADMARK_MODEL_DIR`
/// 2. Workspace `assets/models/` (development)
/// 3. `assets/models/` next to the executable (distribution)
pub fn find_model_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(MODEL_DIR_ENV) {
        let path = PathBuf::from(dir);
        if path.join(WEIGHTS_FILENAME).exists() {
            return Ok(path);
        }
        return Err(anyhow!(
            "{} does not contain {}",
            path.display(),
            WEIGHTS_FILENAME
        ));
    }

    // Workspace assets (development). CARGO_MANIFEST_DIR points to
    // crates/threadmark-cli.
    let workspace_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .map(|p| p.join("assets/models"));
    if let Some(ref path) = workspace_path {
        if path.join(WEIGHTS_FILENAME).exists() {
            return Ok(path.clone());
        }
    }

    // Relative to the executable (distribution).
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let dist_path = exe_dir.join("assets/models");
            if dist_path.join(WEIGHTS_FILENAME).exists() {
                return Ok(dist_path);
            }
        }
    }

    Err(anyhow!(
        "No encoder checkpoint found. Set {} to a directory containing \
         config.json, tokenizer.json, and {}",
        MODEL_DIR_ENV,
        WEIGHTS_FILENAME
    ))
}

/// Resolves the database path, creating the data directory if needed.
pub fn database_path(data_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => ProjectDirs::from("", "", "threadmark")
            .ok_or_else(|| anyhow!("Could not determine a data directory"))?
            .data_dir()
            .to_path_buf(),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
    Ok(dir.join(DATABASE_FILENAME))
}
