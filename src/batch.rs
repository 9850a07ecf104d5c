//! Batch orchestrator – runs one workflow operation over many employees
//! with a small, fixed number of workers.
//!
//! Employees are fed through a bounded `async_channel` queue. Each worker
//! finishes one employee (including its retries) before taking the next.
//! Failures are recorded per employee and never stop the batch.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::employee::EmployeeRecord;
use crate::error::{ErrorKind, ExportError};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Worker count. Kept low: every capture holds full-page bitmaps.
    pub concurrency: usize,
    /// Extra attempts for retryable failures.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
}

impl BatchProgress {
    pub fn is_done(&self) -> bool {
        self.processed >= self.total
    }
}

#[derive(Debug, Clone)]
pub struct BatchSuccess<T> {
    pub id: u64,
    pub value: T,
}

#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub id: u64,
    pub error: ExportError,
}

impl BatchFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

/// Outcome of a whole batch, both lists in input order.
#[derive(Debug, Clone)]
pub struct BatchSummary<T> {
    pub succeeded: Vec<BatchSuccess<T>>,
    pub failed: Vec<BatchFailure>,
}

impl<T> BatchSummary<T> {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BatchRunner {
    options: BatchOptions,
    progress: Arc<watch::Sender<BatchProgress>>,
}

impl BatchRunner {
    pub fn new(options: BatchOptions) -> Self {
        let (progress, _) = watch::channel(BatchProgress::default());
        Self {
            options,
            progress: Arc::new(progress),
        }
    }

    /// Latest `processed / total` count; updating it never waits on readers.
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress.subscribe()
    }

    /// Run `op` once per employee, retrying retryable failures after a fixed
    /// backoff. Returns when the queue is drained and every worker is done.
    pub async fn run_all<F, Fut, T>(&self, employees: Vec<EmployeeRecord>, op: F) -> BatchSummary<T>
    where
        F: Fn(EmployeeRecord) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ExportError>> + Send + 'static,
        T: Send + 'static,
    {
        let total = employees.len();
        self.progress.send_replace(BatchProgress {
            processed: 0,
            total,
        });
        let ids: Vec<u64> = employees.iter().map(|e| e.id).collect();

        let (tx, rx) = async_channel::bounded::<(usize, EmployeeRecord)>(total.max(1));
        for item in employees.into_iter().enumerate() {
            // Capacity covers every item and the receiver is alive.
            if tx.try_send(item).is_err() {
                log::error!("batch queue rejected an item");
            }
        }
        tx.close();

        let workers = self.options.concurrency.clamp(1, total.max(1));
        log::info!("batch: {total} employee(s) on {workers} worker(s)");

        let op = Arc::new(op);
        let processed = Arc::new(AtomicUsize::new(0));
        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let rx = rx.clone();
            let op = Arc::clone(&op);
            let options = self.options.clone();
            let processed = Arc::clone(&processed);
            let progress = Arc::clone(&self.progress);
            set.spawn(async move {
                let mut done = Vec::new();
                while let Ok((index, employee)) = rx.recv().await {
                    log::debug!("[WORKER-{worker_id}] employee {}", employee.id);
                    let outcome = run_with_retry(op.as_ref(), &employee, &options).await;
                    done.push((index, outcome));
                    let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress.send_replace(BatchProgress { processed: n, total });
                }
                done
            });
        }

        let mut outcomes: Vec<Option<Result<T, ExportError>>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(done) => {
                    for (index, outcome) in done {
                        outcomes[index] = Some(outcome);
                    }
                }
                Err(e) => log::error!("batch worker stopped: {e}"),
            }
        }

        let mut summary = BatchSummary {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (id, outcome) in ids.into_iter().zip(outcomes) {
            match outcome {
                Some(Ok(value)) => summary.succeeded.push(BatchSuccess { id, value }),
                Some(Err(error)) => summary.failed.push(BatchFailure { id, error }),
                None => summary.failed.push(BatchFailure {
                    id,
                    error: ExportError::Capture("worker stopped before finishing".into()),
                }),
            }
        }
        log::info!(
            "batch finished: {} succeeded, {} failed",
            summary.succeeded.len(),
            summary.failed.len()
        );
        summary
    }
}

async fn run_with_retry<F, Fut, T>(
    op: &F,
    employee: &EmployeeRecord,
    options: &BatchOptions,
) -> Result<T, ExportError>
where
    F: Fn(EmployeeRecord) -> Fut,
    Fut: Future<Output = Result<T, ExportError>> + Send + 'static,
    T: Send + 'static,
{
    let mut attempt = 0;
    loop {
        // Own task so a panicking attempt becomes a recorded failure.
        let outcome = match tokio::spawn(op(employee.clone())).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(ExportError::Capture(format!("attempt aborted: {e}")));
            }
        };
        match outcome {
            Err(e) if e.is_retryable() && attempt < options.max_retries => {
                attempt += 1;
                log::warn!(
                    "employee {}: {e}; retry {attempt}/{} in {:?}",
                    employee.id,
                    options.max_retries,
                    options.backoff
                );
                tokio::time::sleep(options.backoff).await;
            }
            other => return other,
        }
    }
}
