//! Model adapters for image and text authenticity.
//!
//! Both adapters sit behind traits so the HTTP service can be built with the
//! pretrained models in production and with fixed scorers in tests.

pub mod image_model;
pub mod text_model;

use std::collections::HashMap;
use std::sync::Arc;

use candle_core::Tensor;
use image::RgbImage;

pub use image_model::VitImageClassifier;
pub use text_model::RobertaTextClassifier;

/// Minimum trimmed length (in characters) of text worth scoring.
pub const MIN_TEXT_CHARS: usize = 10;

pub const SHORT_TEXT_LABEL: &str = "text too short (need at least 10 characters)";
pub const ERROR_LABEL: &str = "error";

/// Two-way image scores. `real_probability + ai_probability == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageScores {
    pub real_probability: f32,
    pub ai_probability: f32,
    pub confidence: f32,
    pub label: &'static str,
}

impl ImageScores {
    pub fn from_ai_probability(ai_probability: f32) -> Self {
        let ai_probability = ai_probability.clamp(0.0, 1.0);
        let real_probability = 1.0 - ai_probability;
        Self {
            real_probability,
            ai_probability,
            confidence: real_probability.max(ai_probability),
            label: if real_probability >= 0.5 { "passed the check" } else { "AI generated" },
        }
    }

    /// Neutral result reported when the model is missing or inference fails.
    pub fn fallback() -> Self {
        Self {
            real_probability: 0.5,
            ai_probability: 0.5,
            confidence: 0.0,
            label: "analysis error",
        }
    }

    pub fn is_real(&self) -> bool {
        self.real_probability >= 0.5
    }
}

pub trait ImageClassifier: Send + Sync {
    /// Score an RGB image. Never fails: errors surface as [`ImageScores::fallback`].
    fn predict(&self, image: &RgbImage) -> ImageScores;
}

pub trait TextClassifier: Send + Sync {
    /// Probability in [0, 1] that the text is machine generated.
    fn ai_probability(&self, text: &str) -> anyhow::Result<f32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    DefinitelyAi,
    LikelyAi,
    HumanWritten,
    TooShort,
}

impl Verdict {
    /// Thresholds apply to the unrounded percentage.
    pub fn from_percent(percent: f64) -> Self {
        if percent > 80.0 {
            Verdict::DefinitelyAi
        } else if percent > 50.0 {
            Verdict::LikelyAi
        } else {
            Verdict::HumanWritten
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::DefinitelyAi => "definitely AI",
            Verdict::LikelyAi => "likely AI",
            Verdict::HumanWritten => "human-written",
            Verdict::TooShort => SHORT_TEXT_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextVerdict {
    pub verdict: Verdict,
    /// AI probability as a percentage with one decimal place.
    pub score: f64,
}

/// Applies the length policy, rounding and thresholds around a [`TextClassifier`].
pub struct TextDetector {
    classifier: Arc<dyn TextClassifier>,
}

impl TextDetector {
    pub fn new(classifier: Arc<dyn TextClassifier>) -> Self {
        Self { classifier }
    }

    pub fn detect(&self, text: &str) -> anyhow::Result<TextVerdict> {
        if text.trim().chars().count() < MIN_TEXT_CHARS {
            return Ok(TextVerdict {
                verdict: Verdict::TooShort,
                score: 0.0,
            });
        }

        let percent = f64::from(self.classifier.ai_probability(text)?).clamp(0.0, 1.0) * 100.0;
        Ok(TextVerdict {
            verdict: Verdict::from_percent(percent),
            score: (percent * 10.0).round() / 10.0,
        })
    }
}

/// Softmax a `(1, num_labels)` logits tensor over the class dimension and pick one class.
pub fn class_probability(logits: &Tensor, index: usize) -> anyhow::Result<f32> {
    let probs: Vec<f32> = candle_nn::ops::softmax(logits, 1)?.flatten_all()?.to_vec1()?;
    probs
        .get(index)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("model returned {} classes, expected more than {index}", probs.len()))
}

/// Find the class index of the "machine generated" label in a model's `id2label`.
pub fn ai_label_index(id2label: &HashMap<String, String>) -> Option<usize> {
    const AI_MARKERS: [&str; 6] = ["artificial", "fake", "generated", "synthetic", "chatgpt", "gpt"];

    id2label.iter().find_map(|(id, label)| {
        let label = label.to_lowercase();
        let is_ai = label == "ai" || AI_MARKERS.iter().any(|m| label.contains(m));
        if is_ai { id.parse().ok() } else { None }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScorer {
        probability: f32,
        calls: AtomicUsize,
    }

    impl TextClassifier for CountingScorer {
        fn ai_probability(&self, _text: &str) -> anyhow::Result<f32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.probability)
        }
    }

    struct BrokenScorer;

    impl TextClassifier for BrokenScorer {
        fn ai_probability(&self, _text: &str) -> anyhow::Result<f32> {
            anyhow::bail!("inference exploded")
        }
    }

    fn detector(probability: f32) -> (TextDetector, Arc<CountingScorer>) {
        let scorer = Arc::new(CountingScorer { probability, calls: AtomicUsize::new(0) });
        (TextDetector::new(scorer.clone()), scorer)
    }

    #[test]
    fn test_short_text_skips_model() {
        let (detector, scorer) = detector(0.99);
        for text in ["hi", "", "   short   ", "123456789"] {
            let result = detector.detect(text).unwrap();
            assert_eq!(result.verdict, Verdict::TooShort);
            assert_eq!(result.score, 0.0);
            assert_eq!(result.verdict.label(), SHORT_TEXT_LABEL);
        }
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 9 Cyrillic characters, 18 bytes
        let (detector, scorer) = detector(0.2);
        assert_eq!(detector.detect("проверкаа").unwrap().verdict, Verdict::TooShort);
        assert_eq!(scorer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_thresholds() {
        let cases = [
            (0.95, Verdict::DefinitelyAi),
            (0.81, Verdict::DefinitelyAi),
            (0.79, Verdict::LikelyAi),
            (0.51, Verdict::LikelyAi),
            (0.50, Verdict::HumanWritten),
            (0.02, Verdict::HumanWritten),
        ];
        for (probability, expected) in cases {
            let (detector, _) = detector(probability);
            let result = detector.detect("This text is definitely long enough").unwrap();
            assert_eq!(result.verdict, expected, "probability {probability}");
        }
    }

    #[test]
    fn test_score_has_one_decimal() {
        let (detector, _) = detector(0.123456);
        let result = detector.detect("This text is definitely long enough").unwrap();
        assert_eq!(result.score, 12.3);
    }

    #[test]
    fn test_classifier_error_propagates() {
        let detector = TextDetector::new(Arc::new(BrokenScorer));
        assert!(detector.detect("This text is definitely long enough").is_err());
    }

    #[test]
    fn test_image_scores_sum_to_one() {
        for logits in [[2.0f32, -1.0], [0.0, 0.0], [-30.0, 12.5], [5.5, 5.4]] {
            let logits = Tensor::new(&[logits], &Device::Cpu).unwrap();
            let ai = class_probability(&logits, 0).unwrap();
            let real = class_probability(&logits, 1).unwrap();
            assert!((ai + real - 1.0).abs() < 1e-6);

            let scores = ImageScores::from_ai_probability(ai);
            assert!((0.0..=1.0).contains(&scores.real_probability));
            assert!((scores.real_probability + scores.ai_probability - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_class_probability_picks_requested_class() {
        let logits = Tensor::new(&[[1.0f32, 3.0, 0.5]], &Device::Cpu).unwrap();
        let top = class_probability(&logits, 1).unwrap();
        assert!(top > class_probability(&logits, 0).unwrap());
        assert!(top > class_probability(&logits, 2).unwrap());
        assert!(class_probability(&logits, 3).is_err());
    }

    #[test]
    fn test_real_verdict_boundary() {
        assert!(ImageScores::from_ai_probability(0.5).is_real());
        assert!(!ImageScores::from_ai_probability(0.51).is_real());
        assert!(ImageScores::fallback().is_real());
        assert_eq!(ImageScores::fallback().confidence, 0.0);
    }

    #[test]
    fn test_ai_label_index() {
        let labels = |pairs: &[(&str, &str)]| -> HashMap<String, String> {
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
        };
        assert_eq!(ai_label_index(&labels(&[("0", "artificial"), ("1", "human")])), Some(0));
        assert_eq!(ai_label_index(&labels(&[("0", "REAL"), ("1", "FAKE")])), Some(1));
        assert_eq!(ai_label_index(&labels(&[("0", "Human"), ("1", "ChatGPT")])), Some(1));
        assert_eq!(ai_label_index(&labels(&[("0", "cat"), ("1", "dog")])), None);
    }
}
