//! Append-only JSON detection log.
//!
//! The log is a single JSON array rewritten on every append. All writes go
//! through one writer task, so concurrent requests never lose records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Result of one successful detection, as returned to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Detection {
    Image {
        success: bool,
        real_probability: f32,
        ai_probability: f32,
        watermark: String,
        image_base64: String,
    },
    Text {
        success: bool,
        ai_score: f64,
        label: String,
    },
}

/// A logged detection with its server-side timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    #[serde(flatten)]
    pub detection: Detection,
    pub timestamp: String,
}

impl DetectionRecord {
    pub fn now(detection: Detection) -> Self {
        Self {
            detection,
            timestamp: crate::server::now_iso(),
        }
    }
}

struct AppendRequest {
    record: DetectionRecord,
    done: oneshot::Sender<Result<(), String>>,
}

/// Handle to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct DetectionLog {
    tx: mpsc::Sender<AppendRequest>,
    path: PathBuf,
}

impl DetectionLog {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::channel::<AppendRequest>(64);
        let writer_path = path.clone();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let path = writer_path.clone();
                let result = tokio::task::spawn_blocking(move || append_to_file(&path, request.record))
                    .await
                    .unwrap_or_else(|e| Err(format!("log writer panicked: {e}")));
                // The requester may have gone away; the record is written either way.
                let _ = request.done.send(result);
            }
            debug!("Detection log writer stopped");
        });

        Self { tx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a detection stamped with the current time. Resolves once it is on disk.
    pub async fn append(&self, detection: Detection) -> Result<(), String> {
        let (done, rx) = oneshot::channel();
        let request = AppendRequest {
            record: DetectionRecord::now(detection),
            done,
        };
        self.tx
            .send(request)
            .await
            .map_err(|_| "detection log writer is not running".to_string())?;
        rx.await
            .map_err(|_| "detection log writer dropped the request".to_string())?
    }

    pub fn read_all(&self) -> Vec<DetectionRecord> {
        load_records(&self.path)
    }
}

/// Read the log. A missing, unreadable or corrupt file counts as empty.
pub fn load_records(path: &Path) -> Vec<DetectionRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Cannot read detection log {:?}, treating as empty: {e}", path);
            return Vec::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Detection log {:?} is corrupt, starting over: {e}", path);
        Vec::new()
    })
}

fn append_to_file(path: &Path, record: DetectionRecord) -> Result<(), String> {
    let mut records = load_records(path);
    records.push(record);

    let json = serde_json::to_string_pretty(&records)
        .map_err(|e| format!("Failed to serialize detection log: {e}"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {:?}: {e}", parent))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(|e| format!("Failed to write {:?}: {e}", tmp_path))?;
    std::fs::rename(&tmp_path, path).map_err(|e| format!("Failed to replace {:?}: {e}", path))?;
    Ok(())
}
