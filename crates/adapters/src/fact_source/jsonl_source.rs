use std::path::{Path, PathBuf};
use std::time::Duration;

use domain::fact::entity::Fact;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Path value selecting standard input.
pub const STDIN_PATH: &str = "-";

#[derive(Debug, Error)]
pub enum FactSourceError {
    #[error("failed to open fact source {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read fact source: {0}")]
    Read(#[from] std::io::Error),
}

/// Counters reported when a source finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FactSourceStats {
    pub ticks: u64,
    pub facts: u64,
    pub skipped_lines: u64,
}

/// Reads one tick per line, each line a JSON array of facts, and forwards
/// the batches into the engine's fact channel.
///
/// Blank lines are ignored. Lines that fail to parse are logged and skipped.
pub struct JsonLinesFactSource {
    tx: mpsc::Sender<Vec<Fact>>,
    tick_interval: Option<Duration>,
}

impl JsonLinesFactSource {
    pub fn new(tx: mpsc::Sender<Vec<Fact>>) -> Self {
        Self {
            tx,
            tick_interval: None,
        }
    }

    /// Pause between ticks, for replaying a recording at a steady pace.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    /// Stream from `path`, or from stdin when `path` is `-`.
    pub async fn run_path(
        self,
        path: &Path,
        cancel_token: CancellationToken,
    ) -> Result<FactSourceStats, FactSourceError> {
        if path.as_os_str() == STDIN_PATH {
            return self
                .run(BufReader::new(tokio::io::stdin()), cancel_token)
                .await;
        }
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| FactSourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        self.run(BufReader::new(file), cancel_token).await
    }

    /// Stream ticks from `reader` until EOF, cancellation, or the engine
    /// closing its receiver. Dropping the source closes the fact channel.
    pub async fn run<R>(
        self,
        reader: R,
        cancel_token: CancellationToken,
    ) -> Result<FactSourceStats, FactSourceError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut stats = FactSourceStats::default();
        let mut line_no: u64 = 0;

        loop {
            let line = tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                break; // EOF
            };
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let batch: Vec<Fact> = match serde_json::from_str(&line) {
                Ok(batch) => batch,
                Err(e) => {
                    stats.skipped_lines += 1;
                    tracing::warn!(line = line_no, error = %e, "skipping malformed fact line");
                    continue;
                }
            };

            stats.ticks += 1;
            stats.facts += batch.len() as u64;
            if self.tx.send(batch).await.is_err() {
                tracing::debug!("fact channel closed, stopping source");
                break;
            }

            if let Some(interval) = self.tick_interval {
                tokio::select! {
                    biased;
                    () = cancel_token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        }

        tracing::info!(
            ticks = stats.ticks,
            facts = stats.facts,
            skipped_lines = stats.skipped_lines,
            "fact source finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::fact::entity::DataValue;

    const SAMPLE: &str = r#"[{"kind":"data","tenantId":"acme","dataId":"X","timestamp":1,"value":{"type":"NUMERIC","value":1001.0}}]

not json
[{"kind":"event","tenantId":"acme","id":"e1","ctime":2,"text":"disk full"},{"kind":"data","tenantId":"acme","dataId":"B","timestamp":2,"value":{"type":"AVAILABILITY","value":"DOWN"}}]
"#;

    #[tokio::test]
    async fn forwards_one_batch_per_line() {
        let (tx, mut rx) = mpsc::channel(8);
        let source = JsonLinesFactSource::new(tx);
        let stats = source
            .run(SAMPLE.as_bytes(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            stats,
            FactSourceStats {
                ticks: 2,
                facts: 3,
                skipped_lines: 1,
            }
        );

        let first = rx.recv().await.unwrap();
        match &first[0] {
            Fact::Data(d) => assert_eq!(d.value, DataValue::Numeric(1001.0)),
            Fact::Event(_) => panic!("expected data fact"),
        }
        let second = rx.recv().await.unwrap();
        assert_eq!(second.len(), 2);
        // sender dropped with the source
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_receiver_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let stats = JsonLinesFactSource::new(tx)
            .run(SAMPLE.as_bytes(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.ticks, 1);
    }

    #[tokio::test]
    async fn cancelled_source_sends_nothing() {
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let stats = JsonLinesFactSource::new(tx)
            .run(SAMPLE.as_bytes(), cancel)
            .await
            .unwrap();
        assert_eq!(stats.ticks, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facts.jsonl");
        std::fs::write(&path, SAMPLE).unwrap();

        let (tx, _rx) = mpsc::channel(8);
        let stats = JsonLinesFactSource::new(tx)
            .run_path(&path, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(stats.ticks, 2);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let (tx, _rx) = mpsc::channel(8);
        let err = JsonLinesFactSource::new(tx)
            .run_path(Path::new("/nonexistent/facts.jsonl"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FactSourceError::Open { .. }));
    }
}
