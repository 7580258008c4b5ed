//! Background enrichment queue
//!
//! Callers submit wine ids and return immediately; a dispatcher task runs
//! `RatingsService::refresh_wine` for each job on a bounded worker pool. Job
//! failures are logged and counted, never propagated to the submitter.

use crate::config::QueueConfig;
use crate::error::{RatingsError, RatingsResult};
use crate::services::ratings_service::RatingsService;
use crate::types::WineId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentJob {
    pub wine_id: WineId,
}

/// Job counters
#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
}

pub struct EnrichmentQueue {
    tx: mpsc::Sender<EnrichmentJob>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    dispatcher: JoinHandle<()>,
}

impl EnrichmentQueue {
    /// Spawn the dispatcher
    ///
    /// Cancelling `cancel` stops intake immediately; jobs already running
    /// finish their current tier and attempt no further tiers.
    pub fn start(service: Arc<RatingsService>, config: &QueueConfig, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let counters = Arc::new(Counters::default());
        let workers = Arc::new(Semaphore::new(config.workers.max(1)));

        let dispatcher = tokio::spawn(dispatch(
            rx,
            service,
            workers,
            cancel.clone(),
            Arc::clone(&counters),
        ));

        info!(
            capacity = config.capacity,
            workers = config.workers,
            "Enrichment queue started"
        );

        Self {
            tx,
            cancel,
            counters,
            dispatcher,
        }
    }

    /// Queue a wine for refresh without waiting for it
    ///
    /// # Errors
    /// `QueueClosed` when the queue is full, cancelled or shut down.
    pub fn submit(&self, wine_id: WineId) -> RatingsResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RatingsError::QueueClosed("queue cancelled".to_string()));
        }

        self.tx
            .try_send(EnrichmentJob { wine_id })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(job) => {
                    RatingsError::QueueClosed(format!("queue full, wine {} not queued", job.wine_id))
                }
                mpsc::error::TrySendError::Closed(job) => {
                    RatingsError::QueueClosed(format!("queue closed, wine {} not queued", job.wine_id))
                }
            })?;

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        debug!(wine_id, "Enrichment job queued");
        Ok(())
    }

    pub fn stats(&self) -> EnrichmentStats {
        snapshot(&self.counters)
    }

    /// Stop accepting jobs, let queued and running jobs finish
    pub async fn shutdown(self) -> EnrichmentStats {
        let Self {
            tx,
            counters,
            dispatcher,
            ..
        } = self;
        drop(tx);

        if let Err(e) = dispatcher.await {
            error!(error = %e, "Enrichment dispatcher ended abnormally");
        }
        snapshot(&counters)
    }
}

fn snapshot(counters: &Counters) -> EnrichmentStats {
    EnrichmentStats {
        submitted: counters.submitted.load(Ordering::Relaxed),
        completed: counters.completed.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<EnrichmentJob>,
    service: Arc<RatingsService>,
    workers: Arc<Semaphore>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) {
    let mut running = JoinSet::new();

    loop {
        let job = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(finished) = running.join_next(), if !running.is_empty() => {
                reap(finished, &counters);
                continue;
            }
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        running.spawn(run_job(
            Arc::clone(&service),
            job,
            cancel.clone(),
            Arc::clone(&counters),
            permit,
        ));
    }

    let dropped = {
        rx.close();
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    };
    if dropped > 0 {
        warn!(dropped, "Enrichment queue stopped with unprocessed jobs");
    }

    while let Some(finished) = running.join_next().await {
        reap(finished, &counters);
    }
    info!("Enrichment queue stopped");
}

async fn run_job(
    service: Arc<RatingsService>,
    job: EnrichmentJob,
    cancel: CancellationToken,
    counters: Arc<Counters>,
    _permit: OwnedSemaphorePermit,
) -> bool {
    match service.refresh_wine(job.wine_id, &cancel).await {
        Ok(report) => {
            info!(
                wine_id = job.wine_id,
                used_method = %report.used_method,
                inserted = report.inserted,
                message = %report.message,
                "Enrichment job finished"
            );
            counters.completed.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(e) => {
            warn!(wine_id = job.wine_id, error = %e, "Enrichment job failed");
            counters.failed.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

/// Count a worker that panicked; normal results were counted by the worker
fn reap(finished: Result<bool, tokio::task::JoinError>, counters: &Counters) {
    if let Err(e) = finished {
        error!(error = %e, "Enrichment worker panicked");
        counters.failed.fetch_add(1, Ordering::Relaxed);
    }
}
