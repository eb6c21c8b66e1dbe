// Meterwatch Monitor - Live poller
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Background task that polls the reading source and scores each reading.
//!
//! The latest snapshot is published on a `watch` channel and a bounded
//! history is kept for the status endpoint. Request handlers never touch
//! the link directly.

use crate::metrics::record_poll;
use chrono::{Local, NaiveDateTime};
use meterwatch::{LiveRiskResult, LiveRiskScorer, ReadOutcome, ReadingSource};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Reading source shared between the poller and request handlers.
pub type SharedSource = Arc<Mutex<ReadingSource>>;

/// One scored poll.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub taken_at: NaiveDateTime,
    /// `fresh`, `stale` or `unavailable`.
    pub outcome: &'static str,
    /// `None` until the source has produced its first valid sample.
    pub result: Option<LiveRiskResult>,
}

impl LiveSnapshot {
    fn from_outcome(outcome: ReadOutcome, scorer: &LiveRiskScorer) -> Self {
        Self {
            taken_at: Local::now().naive_local(),
            outcome: outcome.as_str(),
            result: outcome.value().map(|reading| scorer.score(reading)),
        }
    }
}

/// Spawns the polling task.
pub struct LivePoller {
    source: SharedSource,
    scorer: LiveRiskScorer,
    interval: Duration,
    history_len: usize,
}

impl LivePoller {
    pub fn new(source: SharedSource, scorer: LiveRiskScorer) -> Self {
        Self {
            source,
            scorer,
            interval: Duration::from_millis(100),
            history_len: 120,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_history_len(mut self, history_len: usize) -> Self {
        self.history_len = history_len.max(1);
        self
    }

    /// Start polling on the current runtime.
    pub fn spawn(self) -> PollerHandle {
        let running = Arc::new(AtomicBool::new(true));
        let history = Arc::new(RwLock::new(VecDeque::with_capacity(self.history_len)));
        let (tx, rx) = watch::channel(None);

        let task = tokio::spawn(run(
            self,
            Arc::clone(&running),
            Arc::clone(&history),
            tx,
        ));

        PollerHandle {
            running,
            history,
            latest: rx,
            task,
        }
    }
}

async fn run(
    poller: LivePoller,
    running: Arc<AtomicBool>,
    history: Arc<RwLock<VecDeque<LiveSnapshot>>>,
    tx: watch::Sender<Option<LiveSnapshot>>,
) {
    info!("Live poller started ({} ms interval)", poller.interval.as_millis());

    while running.load(Ordering::SeqCst) {
        let outcome = poller.source.lock().await.next_reading();
        let snapshot = LiveSnapshot::from_outcome(outcome, &poller.scorer);
        record_poll(&outcome, snapshot.result.as_ref());

        if let Some(result) = &snapshot.result {
            debug!(
                "Live {} reading {:.2} kWh: risk {} ({})",
                snapshot.outcome,
                result.consumption.kwh(),
                result.risk_score,
                result.verdict
            );
        }

        {
            let mut history = history.write().await;
            if history.len() == poller.history_len {
                history.pop_front();
            }
            history.push_back(snapshot.clone());
        }
        tx.send_replace(Some(snapshot));

        tokio::time::sleep(poller.interval).await;
    }

    poller.source.lock().await.reset();
    info!("Live poller stopped");
}

/// Control and read side of a running poller.
pub struct PollerHandle {
    running: Arc<AtomicBool>,
    history: Arc<RwLock<VecDeque<LiveSnapshot>>>,
    latest: watch::Receiver<Option<LiveSnapshot>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Ask the task to stop after its current poll.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Stop and wait for the task to finish.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            tracing::warn!("Live poller task failed: {}", e);
        }
    }

    pub fn latest(&self) -> Option<LiveSnapshot> {
        self.latest.borrow().clone()
    }

    /// Snapshots oldest first.
    pub async fn history(&self) -> Vec<LiveSnapshot> {
        self.history.read().await.iter().cloned().collect()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LiveSnapshot>> {
        self.latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterwatch::{LineLink, SourceConfig};

    fn simulated() -> SharedSource {
        let config = SourceConfig::simulation().with_seed(11);
        Arc::new(Mutex::new(ReadingSource::simulated(&config)))
    }

    #[tokio::test]
    async fn test_poller_publishes_snapshots() {
        let source = simulated();
        let handle = LivePoller::new(Arc::clone(&source), LiveRiskScorer::default())
            .with_interval(Duration::from_millis(5))
            .with_history_len(3)
            .spawn();

        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        let snapshot = handle.latest().unwrap();
        assert_eq!(snapshot.outcome, "fresh");
        let result = snapshot.result.unwrap();
        assert!(result.risk_score <= 80);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(handle.is_running());
        assert_eq!(handle.history().await.len(), 3);

        handle.shutdown().await;
        assert!(source.lock().await.window().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_source_has_no_result() {
        let (_tx, link) = LineLink::channel();
        let source = Arc::new(Mutex::new(ReadingSource::with_link(
            Box::new(link),
            &SourceConfig::default(),
        )));
        let handle = LivePoller::new(source, LiveRiskScorer::default())
            .with_interval(Duration::from_millis(5))
            .spawn();

        let mut rx = handle.subscribe();
        rx.changed().await.unwrap();
        let snapshot = handle.latest().unwrap();
        assert_eq!(snapshot.outcome, "unavailable");
        assert!(snapshot.result.is_none());

        handle.stop();
        assert!(!handle.is_running());
    }
}
