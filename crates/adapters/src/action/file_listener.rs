use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use domain::action::entity::Action;
use domain::common::error::DomainError;
use ports::secondary::action_listener::ActionListener;
use tokio::io::AsyncWriteExt;

/// Property overriding the listener's base directory for one action.
pub const PATH_PROPERTY: &str = "path";

/// Action listener appending each action as one JSON line to
/// `<dir>/<tenant>/<plugin>.jsonl`.
///
/// The file is opened and closed within each call.
pub struct FileActionListener {
    base_dir: PathBuf,
}

impl FileActionListener {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Destination file for `action`.
    pub fn target_path(&self, action: &Action) -> PathBuf {
        let dir = action
            .properties
            .get(PATH_PROPERTY)
            .filter(|p| !p.is_empty())
            .map_or(self.base_dir.as_path(), Path::new);
        dir.join(&action.tenant_id.0)
            .join(format!("{}.jsonl", action.action_plugin))
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> DomainError {
    DomainError::EngineError(format!("action file {}: {e}", path.display()))
}

impl ActionListener for FileActionListener {
    fn name(&self) -> &str {
        "file"
    }

    fn process<'a>(
        &'a self,
        action: &'a Action,
    ) -> Pin<Box<dyn Future<Output = Result<(), DomainError>> + Send + 'a>> {
        Box::pin(async move {
            let path = self.target_path(action);
            let mut line = serde_json::to_vec(action)
                .map_err(|e| DomainError::EngineError(format!("failed to serialize action: {e}")))?;
            line.push(b'\n');

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| io_error(parent, &e))?;
            }
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| io_error(&path, &e))?;
            file.write_all(&line).await.map_err(|e| io_error(&path, &e))?;
            file.flush().await.map_err(|e| io_error(&path, &e))?;

            tracing::debug!(
                alert_id = %action.alert_id,
                path = %path.display(),
                "action appended"
            );
            Ok(())
        })
    }
}
