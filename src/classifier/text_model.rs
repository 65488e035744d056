//! RoBERTa sequence classifier for machine-generated text, via candle.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config, XLMRobertaForSequenceClassification};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{error, info};

use super::{ai_label_index, class_probability, TextClassifier};

/// Hello-SimpleAI/chatgpt-detector-roberta: 0 = Human, 1 = ChatGPT.
const DEFAULT_AI_INDEX: usize = 1;

#[derive(Deserialize)]
struct LabelMeta {
    #[serde(default)]
    id2label: HashMap<String, String>,
}

struct LoadedRoberta {
    model: Mutex<XLMRobertaForSequenceClassification>,
    tokenizer: Tokenizer,
    device: Device,
    ai_index: usize,
}

pub struct RobertaTextClassifier {
    repo: String,
    inner: Option<LoadedRoberta>,
}

impl RobertaTextClassifier {
    /// Load the model and its tokenizer. Input longer than `max_tokens` is
    /// truncated at scoring time. Blocking.
    pub fn load(repo: &str, max_tokens: usize) -> Self {
        info!("🔄 Loading text model {repo}...");
        let inner = match LoadedRoberta::load(repo, max_tokens) {
            Ok(loaded) => {
                info!("✅ Text model ready (AI class index {})", loaded.ai_index);
                Some(loaded)
            }
            Err(e) => {
                error!("❌ Failed to load text model {repo}: {e:#}");
                None
            }
        };
        Self {
            repo: repo.to_string(),
            inner,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_some()
    }
}

impl TextClassifier for RobertaTextClassifier {
    fn ai_probability(&self, text: &str) -> Result<f32> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| anyhow!("text model {} is not loaded", self.repo))?;
        inner.ai_probability(text)
    }
}

impl LoadedRoberta {
    fn load(repo_id: &str, max_tokens: usize) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new()?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let raw_config = std::fs::read_to_string(repo.get("config.json")?)?;
        let config: Config = serde_json::from_str(&raw_config)?;
        let labels: LabelMeta = serde_json::from_str(&raw_config)?;
        let num_labels = labels.id2label.len().max(2);
        let ai_index = ai_label_index(&labels.id2label).unwrap_or(DEFAULT_AI_INDEX);
        if ai_index >= num_labels {
            bail!("AI class index {ai_index} out of range for {num_labels} labels");
        }

        let mut tokenizer = Tokenizer::from_file(repo.get("tokenizer.json")?).map_err(anyhow::Error::msg)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_tokens,
                ..Default::default()
            }))
            .map_err(anyhow::Error::msg)?;

        // Older checkpoints only publish the pickled PyTorch weights.
        let vb = match repo.get("model.safetensors") {
            Ok(path) => unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, &device)? },
            Err(_) => VarBuilder::from_pth(repo.get("pytorch_model.bin")?, DType::F32, &device)?,
        };
        let model = XLMRobertaForSequenceClassification::new(num_labels, &config, vb)?;

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            ai_index,
        })
    }

    fn ai_probability(&self, text: &str) -> Result<f32> {
        let encoding = self.tokenizer.encode(text, true).map_err(anyhow::Error::msg)?;
        let input_ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let attention_mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = input_ids.zeros_like()?;

        let model = self.model.lock().map_err(|e| anyhow!("model lock poisoned: {e}"))?;
        let logits = model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        drop(model);

        class_probability(&logits, self.ai_index)
    }
}
