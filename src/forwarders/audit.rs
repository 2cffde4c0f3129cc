//! Append-only JSON-lines copy of received webhook bodies.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::warn;

use crate::telemetry;

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `payload` as one line. Failures are logged and dropped.
    pub async fn append(&self, payload: &Value) {
        if let Err(err) = self.try_append(payload).await {
            telemetry::record_forward_failure("audit");
            warn!(path = %self.path.display(), error = %err, "Failed to append webhook to audit log");
        }
    }

    async fn try_append(&self, payload: &Value) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(payload)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}
