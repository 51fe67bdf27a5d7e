//! Candle-based ColBERT-style token encoder.
//!
//! A BERT encoder with a bias-free linear projection down to the retrieval
//! dimension. Both paths L2-normalize each token vector; the document path
//! first zeroes punctuation and padding token vectors so they cannot win a
//! MaxSim comparison.
//!
//! Checkpoint layout (one directory):
//! - `config.json` - standard BERT fields plus the retrieval head fields
//!   ([`ColbertConfig`])
//! - `model.safetensors` - weights under `bert.*` and `linear.*`
//! - `tokenizer.json` - tokenizer (also used to derive the punctuation
//!   skip-list)

use super::config::ColbertConfig;
use super::traits::TokenEncoder;
use crate::error::EmbeddingError;
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use std::collections::HashSet;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::info;

/// ASCII punctuation masked out on the document path.
const PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Encoder dimensions read from the checkpoint config.
#[derive(serde::Deserialize)]
struct EncoderDims {
    hidden_size: usize,
    num_hidden_layers: usize,
}

/// Token-level encoder backed by candle.
pub struct ColbertEncoder {
    model: BertModel,
    projection: Linear,
    config: ColbertConfig,
    device: Device,
    /// Token ids zeroed on the document path (punctuation).
    skiplist: HashSet<u32>,
    pad_id: u32,
}

impl ColbertEncoder {
    /// Loads an encoder from a checkpoint directory.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, EmbeddingError> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            std::fs::read(dir.join(name)).map_err(|e| {
                EmbeddingError::ModelLoad(format!("Failed to read {}: {}", name, e))
            })
        };
        let config_bytes = read("config.json")?;
        let tokenizer_bytes = read("tokenizer.json")?;
        let model_bytes = read("model.safetensors")?;
        Self::from_bytes(&config_bytes, &tokenizer_bytes, model_bytes)
    }

    /// Creates an encoder from raw checkpoint bytes.
    pub fn from_bytes(
        config_bytes: &[u8],
        tokenizer_bytes: &[u8],
        model_bytes: Vec<u8>,
    ) -> Result<Self, EmbeddingError> {
        let bert_config: BertConfig = serde_json::from_slice(config_bytes)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Invalid BERT config: {}", e)))?;
        let config: ColbertConfig = serde_json::from_slice(config_bytes)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Invalid retrieval config: {}", e)))?;
        // The projection input size comes from the same JSON; candle's BERT
        // config keeps its fields to itself.
        let dims: EncoderDims = serde_json::from_slice(config_bytes)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Invalid encoder dims: {}", e)))?;

        let tokenizer = Tokenizer::from_bytes(tokenizer_bytes).map_err(|e| {
            EmbeddingError::TokenizerUnavailable(format!("Failed to load tokenizer: {}", e))
        })?;

        let device = Self::select_device();
        info!(
            "Loading encoder: {}d hidden -> {}d retrieval, {} layers",
            dims.hidden_size, config.dim, dims.num_hidden_layers
        );

        let vb = VarBuilder::from_buffered_safetensors(model_bytes, DTYPE, &device)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to read weights: {}", e)))?;
        let model = BertModel::load(vb.pp("bert"), &bert_config)
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to build encoder: {}", e)))?;
        let projection = candle_nn::linear_no_bias(dims.hidden_size, config.dim, vb.pp("linear"))
            .map_err(|e| EmbeddingError::ModelLoad(format!("Failed to build projection: {}", e)))?;

        let skiplist = if config.mask_punctuation {
            punctuation_skiplist(&tokenizer)
        } else {
            HashSet::new()
        };
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        Ok(Self {
            model,
            projection,
            config,
            device,
            skiplist,
            pad_id,
        })
    }

    /// Returns the retrieval head configuration.
    pub fn config(&self) -> &ColbertConfig {
        &self.config
    }

    /// Selects the best available compute device: CUDA, then Metal, then CPU.
    pub fn select_device() -> Device {
        if let Ok(cuda) = Device::new_cuda(0) {
            info!("Using CUDA GPU");
            return cuda;
        }
        if let Ok(metal) = Device::new_metal(0) {
            info!("Using Metal GPU");
            return metal;
        }
        info!("Using CPU");
        Device::Cpu
    }

    fn encode(
        &self,
        token_ids: &[u32],
        attention_mask: &[u32],
        is_query: bool,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if token_ids.is_empty() {
            return Ok(vec![]);
        }
        if token_ids.len() != attention_mask.len() {
            return Err(EmbeddingError::InferenceFailed(format!(
                "{} token ids but {} mask entries",
                token_ids.len(),
                attention_mask.len()
            )));
        }

        let tensor_err = |e: candle_core::Error| EmbeddingError::TensorCreation(e.to_string());
        let infer_err = |e: candle_core::Error| EmbeddingError::InferenceFailed(e.to_string());

        let input_ids = Tensor::new(token_ids, &self.device)
            .map_err(tensor_err)?
            .unsqueeze(0)
            .map_err(tensor_err)?;
        let token_type_ids = input_ids.zeros_like().map_err(tensor_err)?;
        let mask = Tensor::new(attention_mask, &self.device)
            .map_err(tensor_err)?
            .unsqueeze(0)
            .map_err(tensor_err)?;

        // [1, L, H] -> [1, L, D]
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&mask))
            .map_err(infer_err)?;
        let mut projected = self.projection.forward(&hidden).map_err(infer_err)?;

        if !is_query && !self.skiplist.is_empty() {
            let keep: Vec<f32> = token_ids
                .iter()
                .map(|id| {
                    if self.skiplist.contains(id) || *id == self.pad_id {
                        0.0
                    } else {
                        1.0
                    }
                })
                .collect();
            let keep = Tensor::from_vec(keep, (1, token_ids.len(), 1), &self.device)
                .map_err(tensor_err)?;
            projected = projected.broadcast_mul(&keep).map_err(infer_err)?;
        }

        let normalized = normalize_rows(&projected).map_err(infer_err)?;
        normalized
            .squeeze(0)
            .map_err(infer_err)?
            .to_vec2::<f32>()
            .map_err(infer_err)
    }
}

impl TokenEncoder for ColbertEncoder {
    fn embedding_dim(&self) -> usize {
        self.config.dim
    }

    fn encode_query(
        &self,
        token_ids: &[u32],
        attention_mask: &[u32],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.encode(token_ids, attention_mask, true)
    }

    fn encode_doc(
        &self,
        token_ids: &[u32],
        attention_mask: &[u32],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.encode(token_ids, attention_mask, false)
    }
}

/// L2-normalizes each row of a `[1, L, D]` tensor.
///
/// The small epsilon keeps zeroed punctuation rows at zero instead of NaN.
fn normalize_rows(v: &Tensor) -> Result<Tensor, candle_core::Error> {
    let norm = v
        .sqr()?
        .sum_keepdim(candle_core::D::Minus1)?
        .sqrt()?
        .affine(1.0, 1e-12)?;
    v.broadcast_div(&norm)
}

/// Collects the token ids of ASCII punctuation symbols present in the
/// vocabulary.
fn punctuation_skiplist(tokenizer: &Tokenizer) -> HashSet<u32> {
    PUNCTUATION
        .chars()
        .filter_map(|symbol| tokenizer.token_to_id(&symbol.to_string()))
        .collect()
}
