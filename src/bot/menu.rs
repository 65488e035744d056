//! Menu layout, text routing and reply formatting for the chat client.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::html;

use crate::classifier::MIN_TEXT_CHARS;
use crate::client::{Error as ClientError, ImageDetection, TextDetection};

pub const BUTTON_CHECK_TEXT: &str = "📝 Check text";
pub const BUTTON_PROFILE: &str = "👤 My profile";
pub const BUTTON_GLOBAL_STATS: &str = "📊 Global stats";

pub const GREETING: &str = "👋 Hi! I'm AI Detector.\n\n\
    🔸 Send me a <b>PHOTO</b> and I'll look for traces of AI generation.\n\
    🔸 Send me a <b>TEXT</b> and I'll tell you who wrote it.";
pub const CHECK_TEXT_HINT: &str = "Just send me the text in your next message!";
pub const TEXT_TOO_SHORT: &str = "The text is too short to analyze (at least 10 characters).";

/// What to do with an incoming text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRoute {
    Start,
    CheckTextHint,
    Profile,
    GlobalStats,
    /// Any other slash command.
    Ignore,
    TooShort,
    Detect,
}

/// Menu buttons match exactly; everything else that isn't a command is a
/// detection request, including near-misses of the button labels.
pub fn route_text(text: &str) -> TextRoute {
    match text {
        BUTTON_CHECK_TEXT => TextRoute::CheckTextHint,
        BUTTON_PROFILE => TextRoute::Profile,
        BUTTON_GLOBAL_STATS => TextRoute::GlobalStats,
        _ if is_command(text, "start") => TextRoute::Start,
        _ if text.starts_with('/') => TextRoute::Ignore,
        _ if text.chars().count() < MIN_TEXT_CHARS => TextRoute::TooShort,
        _ => TextRoute::Detect,
    }
}

fn is_command(text: &str, name: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let Some(command) = first.strip_prefix('/') else {
        return false;
    };
    // "/start@SomeBot" is how commands arrive in groups
    command.split('@').next() == Some(name)
}

pub fn keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(BUTTON_CHECK_TEXT), KeyboardButton::new(BUTTON_PROFILE)],
        vec![KeyboardButton::new(BUTTON_GLOBAL_STATS)],
    ])
    .resize_keyboard()
}

pub fn profile_text(user_id: i64, checks: i64) -> String {
    format!("👤 <b>Your profile:</b>\n🆔 ID: <code>{user_id}</code>\n✅ Checks: <code>{checks}</code>")
}

pub fn global_stats_text(total: i64) -> String {
    format!("📊 <b>Total checks:</b> <code>{total}</code>")
}

/// The service reports probabilities in [0, 1]; older builds sent percentages.
pub fn ai_percent(ai_probability: f32) -> f32 {
    if ai_probability <= 1.0 { ai_probability * 100.0 } else { ai_probability }
}

pub fn photo_caption(ai_probability: f32) -> String {
    let percent = ai_percent(ai_probability);
    let verdict = if percent > 50.0 { "⚠️ LIKELY AI" } else { "✅ HUMAN" };
    format!("📊 <b>Result:</b>\nAI: <code>{percent:.1}%</code>\nVerdict: <b>{verdict}</b>")
}

pub fn text_result(label: &str, score: f64) -> String {
    format!(
        "📝 <b>Text analysis:</b>\n\n🏷 Verdict: <b>{}</b>\n🤖 AI probability: <code>{score:.1}%</code>",
        html::escape(label)
    )
}

/// Reply to a text check. Only successful checks are counted.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOutcome {
    pub reply: String,
    pub counts_check: bool,
}

pub fn text_outcome(result: &Result<TextDetection, ClientError>) -> TextOutcome {
    match result {
        Ok(detection) if detection.success => TextOutcome {
            reply: text_result(&detection.label, detection.ai_score),
            counts_check: true,
        },
        Ok(_) => failed_text("❌ The server failed to process the text.".to_string()),
        Err(ClientError::Status(code)) => failed_text(format!("❌ Server error: {code}")),
        Err(e) => failed_text(format!("❌ Could not reach the server: {}", html::escape(&e.to_string()))),
    }
}

fn failed_text(reply: String) -> TextOutcome {
    TextOutcome { reply, counts_check: false }
}

/// Reply to a photo check: the annotated image, or an error for the status message.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoOutcome {
    Annotated { image: Vec<u8>, caption: String },
    Failed(String),
}

impl PhotoOutcome {
    pub fn counts_check(&self) -> bool {
        matches!(self, PhotoOutcome::Annotated { .. })
    }
}

pub fn photo_outcome(result: &Result<ImageDetection, ClientError>) -> PhotoOutcome {
    let detection = match result {
        Ok(detection) => detection,
        Err(ClientError::Status(code)) => {
            return PhotoOutcome::Failed(format!("❌ The server returned an error: {code}"));
        }
        Err(e) => return PhotoOutcome::Failed(format!("❌ Connection error: {}", html::escape(&e.to_string()))),
    };

    let image = match detection.image_base64.as_deref().map(|b64| BASE64.decode(b64)) {
        Some(Ok(bytes)) if detection.success => bytes,
        _ => return PhotoOutcome::Failed("❌ The server returned no image.".to_string()),
    };
    PhotoOutcome::Annotated {
        image,
        caption: photo_caption(detection.ai_probability),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_buttons_route_exactly() {
        assert_eq!(route_text(BUTTON_CHECK_TEXT), TextRoute::CheckTextHint);
        assert_eq!(route_text(BUTTON_PROFILE), TextRoute::Profile);
        assert_eq!(route_text(BUTTON_GLOBAL_STATS), TextRoute::GlobalStats);
    }

    #[test]
    fn test_menu_typos_become_detection_requests() {
        // Near-misses of button labels are long enough to be scored
        assert_eq!(route_text("👤 My profile "), TextRoute::Detect);
        assert_eq!(route_text("📊 Global stat"), TextRoute::Detect);
        assert_eq!(route_text("📝 check text"), TextRoute::Detect);
    }

    #[test]
    fn test_commands() {
        assert_eq!(route_text("/start"), TextRoute::Start);
        assert_eq!(route_text("/start@DetectorBot"), TextRoute::Start);
        assert_eq!(route_text("/help"), TextRoute::Ignore);
        assert_eq!(route_text("/starting a long message"), TextRoute::Ignore);
    }

    #[test]
    fn test_short_text_rejected_locally() {
        assert_eq!(route_text("hi"), TextRoute::TooShort);
        assert_eq!(route_text("123456789"), TextRoute::TooShort);
        assert_eq!(route_text("1234567890"), TextRoute::Detect);
    }

    #[test]
    fn test_length_counts_characters() {
        // 6 Cyrillic letters, 12 bytes
        assert_eq!(route_text("привет"), TextRoute::TooShort);
    }

    #[test]
    fn test_photo_caption_scales_probability() {
        assert!(photo_caption(0.734).contains("73.4%"));
        assert!(photo_caption(0.734).contains("LIKELY AI"));
        assert!(photo_caption(0.5).contains("HUMAN"));
        assert!(photo_caption(87.0).contains("87.0%"));
    }

    #[test]
    fn test_text_result_escapes_label() {
        let reply = text_result("<b>bad</b>", 12.5);
        assert!(reply.contains("&lt;b&gt;bad&lt;/b&gt;"));
        assert!(reply.contains("12.5%"));
    }

    #[test]
    fn test_profile_and_stats_text() {
        assert!(profile_text(42, 3).contains("<code>42</code>"));
        assert!(profile_text(42, 3).contains("<code>3</code>"));
        assert!(global_stats_text(99).contains("<code>99</code>"));
    }

    fn text_detection(success: bool, label: &str, ai_score: f64) -> TextDetection {
        TextDetection {
            success,
            ai_score,
            label: label.to_string(),
        }
    }

    fn image_detection(success: bool, image_base64: Option<&str>) -> ImageDetection {
        ImageDetection {
            success,
            real_probability: 0.25,
            ai_probability: 0.75,
            watermark: "Failed the AI check".to_string(),
            image_base64: image_base64.map(str::to_string),
        }
    }

    #[test]
    fn test_text_success_is_counted() {
        let outcome = text_outcome(&Ok(text_detection(true, "likely AI", 64.2)));
        assert!(outcome.counts_check);
        assert!(outcome.reply.contains("likely AI"));
        assert!(outcome.reply.contains("64.2%"));
    }

    #[test]
    fn test_text_soft_failure_is_not_counted() {
        let outcome = text_outcome(&Ok(text_detection(false, "error", 0.0)));
        assert!(!outcome.counts_check);
        assert!(outcome.reply.contains("failed to process"));
    }

    #[test]
    fn test_text_transport_errors_are_not_counted() {
        let outcome = text_outcome(&Err(ClientError::Status(502)));
        assert!(!outcome.counts_check);
        assert!(outcome.reply.contains("502"));

        let outcome = text_outcome(&Err(ClientError::Http("connection refused <tcp>".to_string())));
        assert!(!outcome.counts_check);
        assert!(outcome.reply.contains("&lt;tcp&gt;"));

        let outcome = text_outcome(&Err(ClientError::Parse("eof".to_string())));
        assert!(!outcome.counts_check);
    }

    #[test]
    fn test_photo_success_is_counted() {
        let encoded = BASE64.encode([0xFF, 0xD8, 0xFF]);
        let outcome = photo_outcome(&Ok(image_detection(true, Some(&encoded))));
        assert!(outcome.counts_check());
        match outcome {
            PhotoOutcome::Annotated { image, caption } => {
                assert_eq!(image, vec![0xFF, 0xD8, 0xFF]);
                assert!(caption.contains("75.0%"));
                assert!(caption.contains("LIKELY AI"));
            }
            PhotoOutcome::Failed(reply) => panic!("unexpected failure: {reply}"),
        }
    }

    #[test]
    fn test_photo_without_usable_image_is_not_counted() {
        let missing = photo_outcome(&Ok(image_detection(true, None)));
        assert_eq!(missing, PhotoOutcome::Failed("❌ The server returned no image.".to_string()));

        let garbled = photo_outcome(&Ok(image_detection(true, Some("%%% not base64 %%%"))));
        assert!(!garbled.counts_check());

        let encoded = BASE64.encode([1, 2, 3]);
        let unsuccessful = photo_outcome(&Ok(image_detection(false, Some(&encoded))));
        assert!(!unsuccessful.counts_check());
    }

    #[test]
    fn test_photo_transport_errors_are_not_counted() {
        let status = photo_outcome(&Err(ClientError::Status(500)));
        assert_eq!(status, PhotoOutcome::Failed("❌ The server returned an error: 500".to_string()));

        let http = photo_outcome(&Err(ClientError::Http("timed out".to_string())));
        assert!(!http.counts_check());
        assert!(matches!(http, PhotoOutcome::Failed(reply) if reply.contains("Connection error")));
    }
}
