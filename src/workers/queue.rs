use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::modules::conversion::model::ConversionJob;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is shut down")]
    Closed,
}

/// Work done for each dequeued job.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: &ConversionJob);
}

type ActiveJobs = Arc<RwLock<HashMap<String, Arc<ConversionJob>>>>;

/// Bounded FIFO of conversion jobs drained by a single worker task.
///
/// Jobs never run concurrently with each other. That caps throughput at one
/// encode at a time for the whole process; adding workers would need to keep
/// the qualities of a single job sequential.
pub struct JobQueue {
    sender: Sender<Arc<ConversionJob>>,
    active: ActiveJobs,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl JobQueue {
    /// Spawns the worker on the current tokio runtime.
    pub fn start(processor: Arc<dyn JobProcessor>, capacity: usize) -> Self {
        let (sender, receiver) = async_channel::bounded(capacity.max(1));
        let active: ActiveJobs = Arc::default();
        let worker = tokio::spawn(run_worker(receiver, active.clone(), processor));

        Self {
            sender,
            active,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Admits a job, waiting for buffer space when the queue is full.
    pub async fn enqueue(&self, job: ConversionJob) -> Result<Arc<ConversionJob>, QueueError> {
        if self.sender.is_closed() {
            return Err(QueueError::Closed);
        }

        let job = Arc::new(job);
        self.write_active().insert(job.id.clone(), job.clone());

        // Undoes the registration if the send fails or this future is dropped
        // while waiting for space.
        let mut admission = Admission {
            active: &self.active,
            id: &job.id,
            admitted: false,
        };
        if self.sender.send(job.clone()).await.is_err() {
            return Err(QueueError::Closed);
        }
        admission.admitted = true;
        drop(admission);

        info!(
            job_id = %job.id,
            media_file_id = job.request.media_file_id,
            qualities = ?job.request.qualities,
            "Job enqueued"
        );
        Ok(job)
    }

    /// Signals cancellation to a queued or running job. Returns whether the
    /// job was known.
    pub fn cancel(&self, id: &str) -> bool {
        match self.job(id) {
            Some(job) => {
                job.cancel();
                info!(job_id = %id, "Job cancelled");
                true
            }
            None => false,
        }
    }

    pub fn job(&self, id: &str) -> Option<Arc<ConversionJob>> {
        self.read_active().get(id).cloned()
    }

    pub fn active_jobs(&self) -> usize {
        self.read_active().len()
    }

    /// Stops accepting jobs, lets the worker finish everything already
    /// queued, and returns once it has exited.
    pub async fn shutdown(&self) {
        self.sender.close();
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            info!(pending = self.sender.len(), "Waiting for conversion worker to drain");
            if let Err(e) = handle.await {
                error!("Conversion worker ended abnormally: {}", e);
            }
        }
    }

    fn read_active(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ConversionJob>>> {
        self.active.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_active(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ConversionJob>>> {
        self.active.write().unwrap_or_else(|e| e.into_inner())
    }
}

struct Admission<'a> {
    active: &'a ActiveJobs,
    id: &'a str,
    admitted: bool,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.admitted {
            self.active
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(self.id);
        }
    }
}

async fn run_worker(
    receiver: Receiver<Arc<ConversionJob>>,
    active: ActiveJobs,
    processor: Arc<dyn JobProcessor>,
) {
    info!("🎥 Conversion worker started");

    // recv keeps yielding buffered jobs after the channel is closed.
    while let Ok(job) = receiver.recv().await {
        info!(job_id = %job.id, "📦 Processing job");
        processor.process(&job).await;
        active
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&job.id);
        info!(job_id = %job.id, "Job finished");
    }

    info!("Conversion worker stopped");
}
