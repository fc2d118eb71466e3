//! Query embedder backing the child-document similarity search.
//!
//! Loads a BERT-style sentence encoder from the HuggingFace Hub via candle.
//! Loading is expensive (weights download + graph construction) and happens
//! once per process through the shared retriever cache; embedding a query
//! afterwards is cheap.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use tokenizers::Tokenizer;

/// Embedding model wrapper for retrieval queries
pub struct QueryEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl QueryEmbedder {
    /// Download (on first use) and load the encoder. CPU only; the
    /// advisory service shares hosts with other workers.
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().context("Failed to create HuggingFace API client")?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo.get("config.json").context("Failed to fetch model config")?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .context("Failed to fetch tokenizer")?;
        let weights_path = repo
            .get("model.safetensors")
            .context("Failed to fetch model weights")?;

        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(config_path).context("Failed to read model config")?,
        )
        .context("Failed to parse model config")?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .context("Failed to load model weights")?
        };
        let model = BertModel::load(vb, &config).context("Failed to build encoder")?;

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    /// Embed one query into a normalized vector
    pub fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let ids = encoding.get_ids().to_vec();
        let mask = encoding.get_attention_mask().to_vec();
        let len = ids.len();

        let token_ids = Tensor::from_vec(ids, (1, len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (1, len), &self.device)?;

        let hidden = self.model.forward(&token_ids, &attention_mask, None)?;
        let pooled = mean_pool(&hidden, &attention_mask)?;
        let normalized = l2_normalize(&pooled)?;

        Ok(normalized.to_vec2::<f32>()?.remove(0))
    }
}

/// Average token embeddings over the attended positions
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask
        .to_dtype(DType::F32)?
        .unsqueeze(2)?
        .broadcast_as(hidden.shape())?;
    let summed = (hidden * &mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9, f64::INFINITY)?;
    Ok((summed / counts)?)
}

fn l2_normalize(embeddings: &Tensor) -> Result<Tensor> {
    let norm = embeddings.sqr()?.sum_keepdim(1)?.sqrt()?;
    Ok(embeddings.broadcast_div(&norm)?)
}
