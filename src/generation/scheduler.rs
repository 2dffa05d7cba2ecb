//! Startup ordering and the periodic generation loop.

use super::QuestionGenerator;
use crate::config::GenerationSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Closed-once completion signal resolved by the startup ingestion run.
///
/// Resolving a second time is a no-op; waiters that subscribe after the
/// resolution return immediately.
pub struct IngestionSignal {
    tx: watch::Sender<bool>,
}

impl IngestionSignal {
    /// Create an unresolved signal.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Resolve the signal.
    pub fn notify(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been resolved.
    pub fn is_complete(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the signal resolves.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Default for IngestionSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the reentrancy flag when a pass ends, however it ends.
struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives generation passes: one after startup ingestion, then on a fixed
/// interval, with overlapping ticks skipped outright.
pub struct GenerationScheduler {
    generator: Arc<QuestionGenerator>,
    running: AtomicBool,
    initial_delay: Duration,
    interval: Duration,
}

impl GenerationScheduler {
    /// Create a scheduler over the given generator.
    pub fn new(generator: Arc<QuestionGenerator>, settings: &GenerationSettings) -> Self {
        Self {
            generator,
            running: AtomicBool::new(false),
            initial_delay: Duration::from_secs(settings.initial_delay_seconds),
            interval: Duration::from_secs(settings.interval_seconds.max(1)),
        }
    }

    /// Run the scheduler until cancelled.
    ///
    /// Blocks on the startup ingestion signal, runs an initial pass, then
    /// ticks after the initial delay and every interval thereafter.
    /// Cancellation during any wait ends the loop without running the
    /// pending tick.
    #[instrument(skip(self, signal, cancel))]
    pub async fn run(&self, signal: &IngestionSignal, cancel: CancellationToken) {
        info!("Generation scheduler waiting for startup ingestion");
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scheduler cancelled before startup ingestion finished");
                return;
            }
            _ = signal.wait() => {}
        }

        info!("Startup ingestion complete, running initial generation pass");
        self.run_pass().await;

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Generation scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(self.initial_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately and stands in for the
        // initial-delay firing
        ticker.tick().await;

        loop {
            self.run_pass().await;
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Generation scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }
        }
    }

    /// Run one pass behind the reentrancy flag.
    ///
    /// A tick arriving while a pass is in flight is skipped, not queued.
    /// All pass failures are swallowed so the loop survives.
    pub async fn run_pass(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Previous generation pass still running, skipping this tick");
            return;
        }
        let _guard = FlagGuard(&self.running);

        match self.generator.generate_once().await {
            Ok(set) => info!(
                "Generated {} questions for episode {}",
                set.questions.len(),
                set.source_episode_number
            ),
            Err(e) => warn!("Generation pass failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::test_support::{generator_with, sample_chunk};

    #[tokio::test]
    async fn test_signal_resolves_waiters_and_double_notify_is_noop() {
        let signal = IngestionSignal::new();
        assert!(!signal.is_complete());

        signal.notify();
        signal.notify();
        assert!(signal.is_complete());

        // a waiter subscribing after resolution returns immediately
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("wait should resolve immediately");
    }

    #[tokio::test]
    async fn test_run_pass_caches_questions() {
        let (generator, question_store) = generator_with(
            vec![sample_chunk("201", 0.0, "content")],
            r#"["A question?"]"#,
            vec![],
        )
        .await;
        let scheduler = GenerationScheduler::new(
            Arc::new(generator),
            &crate::config::GenerationSettings::default(),
        );

        scheduler.run_pass().await;

        assert_eq!(question_store.len(), 1);
        assert!(!scheduler.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_pass_skips_when_flag_is_held() {
        let (generator, question_store) = generator_with(
            vec![sample_chunk("201", 0.0, "content")],
            r#"["A question?"]"#,
            vec![],
        )
        .await;
        let scheduler = GenerationScheduler::new(
            Arc::new(generator),
            &crate::config::GenerationSettings::default(),
        );

        scheduler.running.store(true, Ordering::SeqCst);
        scheduler.run_pass().await;
        assert!(question_store.is_empty());

        scheduler.running.store(false, Ordering::SeqCst);
        scheduler.run_pass().await;
        assert_eq!(question_store.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_pass_clears_flag_and_does_not_propagate() {
        let (generator, question_store) = generator_with(
            vec![sample_chunk("201", 0.0, "content")],
            "not json at all",
            vec![],
        )
        .await;
        let scheduler = GenerationScheduler::new(
            Arc::new(generator),
            &crate::config::GenerationSettings::default(),
        );

        scheduler.run_pass().await;

        assert!(question_store.is_empty());
        assert!(!scheduler.running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancellation_before_signal_ends_the_loop() {
        let (generator, question_store) = generator_with(
            vec![sample_chunk("201", 0.0, "content")],
            r#"["A question?"]"#,
            vec![],
        )
        .await;
        let scheduler = GenerationScheduler::new(
            Arc::new(generator),
            &crate::config::GenerationSettings::default(),
        );

        let signal = IngestionSignal::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_millis(200), scheduler.run(&signal, cancel))
            .await
            .expect("run should return promptly when cancelled");

        // no initial pass ran
        assert!(question_store.is_empty());
    }
}
