//! ViT image classifier via candle, weights from the Hugging Face hub.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{api::sync::Api, Repo, RepoType};
use image::{imageops::FilterType, RgbImage};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{ai_label_index, class_probability, ImageClassifier, ImageScores};

// Normalization used by the ViT image processors these detectors ship with.
const MEAN: f32 = 0.5;
const STD: f32 = 0.5;
const DEFAULT_AI_INDEX: usize = 0;

#[derive(Deserialize)]
struct ModelMeta {
    #[serde(default)]
    id2label: HashMap<String, String>,
    #[serde(default = "default_image_size")]
    image_size: usize,
}

fn default_image_size() -> usize {
    224
}

struct LoadedVit {
    model: Mutex<vit::Model>,
    device: Device,
    image_size: usize,
    ai_index: usize,
}

/// Image authenticity classifier. A model that failed to load keeps the
/// adapter usable: every prediction is the neutral fallback.
pub struct VitImageClassifier {
    repo: String,
    inner: Option<LoadedVit>,
}

impl VitImageClassifier {
    /// Download (or reuse the hub cache) and load the model. Blocking.
    pub fn load(repo: &str) -> Self {
        info!("🚀 Loading image model {repo}...");
        let inner = match LoadedVit::load(repo) {
            Ok(loaded) => {
                info!("✅ Image model ready (AI class index {})", loaded.ai_index);
                Some(loaded)
            }
            Err(e) => {
                error!("❌ Failed to load image model {repo}: {e:#}");
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

impl ImageClassifier for VitImageClassifier {
    fn predict(&self, image: &RgbImage) -> ImageScores {
        let Some(inner) = &self.inner else {
            warn!("Image model {} is not loaded, returning fallback", self.repo);
            return ImageScores::fallback();
        };

        match inner.predict(image) {
            Ok(scores) => scores,
            Err(e) => {
                error!("❌ Image analysis failed: {e:#}");
                ImageScores::fallback()
            }
        }
    }
}

impl LoadedVit {
    fn load(repo_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new()?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));
        let config_path = repo.get("config.json")?;
        let weights_path = repo.get("model.safetensors")?;

        let raw_config = std::fs::read_to_string(config_path)?;
        let config: vit::Config = serde_json::from_str(&raw_config)?;
        let meta: ModelMeta = serde_json::from_str(&raw_config)?;

        let num_labels = meta.id2label.len().max(2);
        let ai_index = ai_label_index(&meta.id2label).unwrap_or(DEFAULT_AI_INDEX);
        if ai_index >= num_labels {
            bail!("AI class index {ai_index} out of range for {num_labels} labels");
        }

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)? };
        let model = vit::Model::new(&config, num_labels, vb)?;

        Ok(Self {
            model: Mutex::new(model),
            device,
            image_size: meta.image_size,
            ai_index,
        })
    }

    fn preprocess(&self, image: &RgbImage) -> Result<Tensor> {
        let size = self.image_size;
        let resized = image::imageops::resize(image, size as u32, size as u32, FilterType::Triangle);

        // CHW layout
        let plane = size * size;
        let mut data = vec![0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for channel in 0..3 {
                data[channel * plane + i] = (pixel[channel] as f32 / 255.0 - MEAN) / STD;
            }
        }

        Ok(Tensor::from_vec(data, (1, 3, size, size), &self.device)?)
    }

    fn predict(&self, image: &RgbImage) -> Result<ImageScores> {
        let input = self.preprocess(image)?;
        let model = self.model.lock().map_err(|e| anyhow!("model lock poisoned: {e}"))?;
        let logits = model.forward(&input)?;
        drop(model);

        Ok(ImageScores::from_ai_probability(class_probability(&logits, self.ai_index)?))
    }
}
