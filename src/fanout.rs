//! Daily fan-out job - push the reminder to every registered recipient

use crate::notifier::Notifier;
use crate::registry::SharedRegistry;
use chrono::{FixedOffset, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Tally of one fan-out run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub total: usize,
}

impl FanoutReport {
    pub fn failed(&self) -> usize {
        self.total - self.delivered
    }
}

impl fmt::Display for FanoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.delivered, self.total)
    }
}

/// Sends one fixed text to every registry member, sequentially
#[derive(Clone)]
pub struct FanoutJob {
    registry: SharedRegistry,
    notifier: Arc<dyn Notifier>,
    text: String,
    offset: FixedOffset,
}

impl FanoutJob {
    pub fn new(
        registry: SharedRegistry,
        notifier: Arc<dyn Notifier>,
        text: impl Into<String>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            registry,
            notifier,
            text: text.into(),
            offset,
        }
    }

    /// Run once to completion. Send failures are counted, never abort the run.
    pub async fn run(&self) -> FanoutReport {
        let now = Utc::now().with_timezone(&self.offset);
        info!("[{}] Sending daily reminder", now.format("%Y-%m-%d %H:%M:%S %:z"));

        let members = match self.registry.load().await {
            Ok(members) => members,
            Err(e) => {
                error!("Failed to read registry for fan-out: {}", e);
                Default::default()
            }
        };

        if members.is_empty() {
            info!("No recipients registered, skipping fan-out");
            return FanoutReport::default();
        }

        let mut report = FanoutReport {
            delivered: 0,
            total: members.len(),
        };

        for member in &members {
            match self.notifier.send(member, &self.text).await {
                Ok(()) => report.delivered += 1,
                Err(e) => warn!("Reminder to {} failed: {}", member, e),
            }
        }

        info!(
            "Daily reminder sent to {} recipients ({} failed)",
            report,
            report.failed()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::registry::{Members, RecipientRegistry};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory sink for formatted log lines
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Route this thread's log output into a buffer until the guard drops
    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }

    /// Records every attempt; fails for ids in `failing`
    #[derive(Default)]
    struct FlakyNotifier {
        attempts: Mutex<Vec<String>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, recipient: &str, _text: &str) -> Result<()> {
            self.attempts.lock().unwrap().push(recipient.to_string());
            if self.failing.contains(recipient) {
                Err(Error::SendRejected { status: 400, body: "no".to_string() })
            } else {
                Ok(())
            }
        }
    }

    fn utc8() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    async fn job_with(temp_dir: &TempDir, ids: &[&str], notifier: Arc<FlakyNotifier>) -> FanoutJob {
        let registry = SharedRegistry::new(RecipientRegistry::with_path(temp_dir.path().join("r.json")));
        if !ids.is_empty() {
            let members: Members = ids.iter().map(|s| s.to_string()).collect();
            registry.save(members).await.unwrap();
        }
        FanoutJob::new(registry, notifier, "Reminder!", utc8())
    }

    #[tokio::test]
    async fn test_partial_failure_continues() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(FlakyNotifier {
            failing: ["b".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let job = job_with(&temp_dir, &["a", "b", "c"], Arc::clone(&notifier)).await;

        let report = job.run().await;

        assert_eq!(report, FanoutReport { delivered: 2, total: 3 });
        assert_eq!(report.failed(), 1);
        assert_eq!(report.to_string(), "2/3");
        assert_eq!(*notifier.attempts.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_registry_sends_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(FlakyNotifier::default());
        let job = job_with(&temp_dir, &[], Arc::clone(&notifier)).await;

        let report = job.run().await;

        assert_eq!(report, FanoutReport::default());
        assert!(notifier.attempts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_registry_logs_no_recipients() {
        let temp_dir = TempDir::new().unwrap();
        let job = job_with(&temp_dir, &[], Arc::new(FlakyNotifier::default())).await;
        let (logs, _guard) = capture_logs();

        job.run().await;

        let output = logs.contents();
        assert!(output.contains("No recipients registered"), "logs: {}", output);
        assert!(!output.contains("Daily reminder sent"));
    }

    #[tokio::test]
    async fn test_tally_is_logged() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(FlakyNotifier {
            failing: ["b".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let job = job_with(&temp_dir, &["a", "b", "c"], notifier).await;
        let (logs, _guard) = capture_logs();

        job.run().await;

        let output = logs.contents();
        assert!(
            output.contains("Daily reminder sent to 2/3 recipients (1 failed)"),
            "logs: {}",
            output
        );
        assert!(output.contains("Reminder to b failed"));
    }

    #[tokio::test]
    async fn test_all_delivered() {
        let temp_dir = TempDir::new().unwrap();
        let notifier = Arc::new(FlakyNotifier::default());
        let job = job_with(&temp_dir, &["x", "y"], Arc::clone(&notifier)).await;

        assert_eq!(job.run().await.to_string(), "2/2");
    }
}
