//! Batch search processing over a bounded worker pool
//!
//! Runs many independent searches through one client, preserving the
//! input order in the output and isolating per-item failures.

use crate::client::SearchClient;
use crate::error::Error;
use crate::models::{SearchRequest, SearchResponse};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One unit of work in a batch: a caller-supplied identifier paired with
/// the request to execute.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Opaque identifier correlating this item with its outcome
    pub id: String,
    /// The search to perform
    pub request: SearchRequest,
}

impl BatchItem {
    /// Create an item with a generated identifier
    pub fn new(request: SearchRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
        }
    }

    /// Create an item with an explicit identifier
    pub fn with_id(id: impl Into<String>, request: SearchRequest) -> Self {
        Self {
            id: id.into(),
            request,
        }
    }
}

/// Outcome for one batch item, correlated by identifier
#[derive(Debug)]
pub struct BatchOutcome {
    /// Identifier of the originating item
    pub id: String,
    /// The item's pipeline result; one item's error never affects siblings
    pub result: Result<SearchResponse, Error>,
    /// Wall-clock time spent executing this item
    pub elapsed: Duration,
}

impl BatchOutcome {
    /// Whether this item completed successfully
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs batches of searches on a fixed-size worker pool
pub struct BatchProcessor {
    client: Arc<SearchClient>,
    max_workers: usize,
}

impl BatchProcessor {
    /// Create a processor with an explicit worker count
    pub fn new(client: Arc<SearchClient>, max_workers: usize) -> Self {
        Self {
            client,
            max_workers: max_workers.max(1),
        }
    }

    /// Create a processor sized from the client's batch settings
    pub fn from_settings(client: Arc<SearchClient>) -> Self {
        let max_workers = client.settings().batch.max_workers;
        Self::new(client, max_workers)
    }

    /// Process a batch concurrently.
    ///
    /// The output has exactly one entry per input item, at the same index,
    /// regardless of the order in which workers finish.
    pub async fn process(&self, items: Vec<BatchItem>) -> Vec<BatchOutcome> {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = self.max_workers.min(total);
        info!(total, workers, "processing batch");

        let ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let queue: Arc<Mutex<VecDeque<(usize, BatchItem)>>> =
            Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
        let slots: Arc<Mutex<Vec<Option<BatchOutcome>>>> =
            Arc::new(Mutex::new((0..total).map(|_| None).collect()));

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let client = Arc::clone(&self.client);
                let queue = Arc::clone(&queue);
                let slots = Arc::clone(&slots);

                tokio::spawn(async move {
                    loop {
                        let next = queue.lock().unwrap().pop_front();
                        let Some((index, item)) = next else {
                            break;
                        };

                        debug!(worker, index, id = %item.id, "worker picked up item");
                        let outcome = run_item(&client, item).await;
                        if let Err(ref err) = outcome.result {
                            warn!(index, id = %outcome.id, error = %err, "batch item failed");
                        }
                        slots.lock().unwrap()[index] = Some(outcome);
                    }
                })
            })
            .collect();

        for handle in handles {
            if let Err(join_err) = handle.await {
                warn!(error = %join_err, "batch worker terminated abnormally");
            }
        }

        let slots = std::mem::take(&mut *slots.lock().unwrap());
        collect_outcomes(slots, ids)
    }

    /// Process a batch one item at a time.
    ///
    /// Functionally equivalent to [`process`](Self::process) per item;
    /// exists as a throughput baseline.
    pub async fn process_sequential(&self, items: Vec<BatchItem>) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(run_item(&self.client, item).await);
        }
        outcomes
    }
}

/// Assemble ordered outcomes from worker slots.
///
/// A slot left empty by a worker that was cancelled or panicked becomes a
/// configuration-error outcome for its item rather than a missing entry, so
/// the batch still returns one result per input.
fn collect_outcomes(slots: Vec<Option<BatchOutcome>>, ids: Vec<String>) -> Vec<BatchOutcome> {
    slots
        .into_iter()
        .zip(ids)
        .map(|(slot, id)| {
            slot.unwrap_or_else(|| BatchOutcome {
                id,
                result: Err(Error::configuration(
                    "batch worker terminated before completing this item",
                )),
                elapsed: Duration::ZERO,
            })
        })
        .collect()
}

/// Execute one item through the pipeline, measuring its wall-clock time
async fn run_item(client: &SearchClient, item: BatchItem) -> BatchOutcome {
    let started = Instant::now();
    let result = client.search_with(&item.request).await;

    BatchOutcome {
        id: item.id,
        result,
        elapsed: started.elapsed(),
    }
}
