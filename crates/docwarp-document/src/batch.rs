// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch runner — order-preserving parallel processing on a rayon pool.

use std::time::{Duration, Instant};

use docwarp_core::error::{DocError, Result};
use docwarp_core::types::ProcessingResult;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::pipeline::DocumentProcessor;

/// One named input of a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// The outcome of one item, tagged with its input position.
#[derive(Debug)]
pub struct ItemOutcome {
    pub index: usize,
    pub name: String,
    pub result: Result<ProcessingResult>,
}

impl ItemOutcome {
    /// An item that failed before it reached the processor.
    pub fn failed(index: usize, name: impl Into<String>, error: DocError) -> Self {
        Self {
            index,
            name: name.into(),
            result: Err(error),
        }
    }
}

/// Outcomes in input order.
#[derive(Debug)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Successful results, in input order.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &ProcessingResult)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (o.name.as_str(), r)))
    }

    /// Failed items, in input order.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DocError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }

    /// One `"<name>: <error>"` line per failed item.
    pub fn failure_descriptions(&self) -> Vec<String> {
        self.failures()
            .map(|(name, err)| format!("{name}: {err}"))
            .collect()
    }

    /// Number of items that produced a result.
    pub fn processed_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.processed_count()
    }

    /// Fold in items that failed before processing.
    ///
    /// Each failure's `index` is its position in the full input list; the
    /// processed outcomes fill the remaining positions in their own order.
    /// Indices are renumbered to match the merged order.
    pub fn merge_failures(self, mut failures: Vec<ItemOutcome>) -> Self {
        failures.sort_by_key(|f| f.index);
        let total = self.outcomes.len() + failures.len();
        let mut processed = self.outcomes.into_iter();
        let mut failed = failures.into_iter().peekable();

        let mut outcomes = Vec::with_capacity(total);
        for position in 0..total {
            let next = if failed.peek().is_some_and(|f| f.index <= position) {
                failed.next()
            } else {
                processed.next().or_else(|| failed.next())
            };
            outcomes.extend(next);
        }
        for (position, outcome) in outcomes.iter_mut().enumerate() {
            outcome.index = position;
        }
        Self {
            outcomes,
            elapsed: self.elapsed,
        }
    }
}

/// Process every item on a dedicated thread pool.
///
/// The pool has the configured number of workers, or one per core, but never
/// more threads than items. Outcomes keep input order regardless of which
/// item finishes first; one item's failure does not affect the others.
#[instrument(skip_all, fields(items = items.len()))]
pub fn process_batch(processor: &DocumentProcessor, items: Vec<BatchItem>) -> Result<BatchReport> {
    let start = Instant::now();
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let workers = processor
        .config()
        .batch
        .workers
        .unwrap_or(available)
        .min(items.len())
        .max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| DocError::Internal(format!("failed to build thread pool: {err}")))?;

    let outcomes: Vec<ItemOutcome> = pool.install(|| {
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| {
                let result = processor.process(&item.bytes);
                if let Err(err) = &result {
                    warn!(name = %item.name, error = %err, "Batch item failed");
                }
                ItemOutcome {
                    index,
                    name: item.name.clone(),
                    result,
                }
            })
            .collect()
    });

    let report = BatchReport {
        outcomes,
        elapsed: start.elapsed(),
    };
    info!(
        workers,
        processed = report.processed_count(),
        failed = report.failed_count(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Batch complete"
    );
    Ok(report)
}
