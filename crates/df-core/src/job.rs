use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bitmap::Bitmap;
use crate::error::{GenerationError, Result};
use crate::output::OutputDir;
use crate::service::{GenerationRequest, GenerationService};

/// What the UI hands over when Generate is clicked. The base image is decoded on the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub prompt: String,
    pub base_image: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Success { image: Bitmap, path: PathBuf },
    Failure { message: String },
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<(Bitmap, PathBuf)>> for GenerationOutcome {
    fn from(result: Result<(Bitmap, PathBuf)>) -> Self {
        match result {
            Ok((image, path)) => Self::Success { image, path },
            Err(e) => Self::Failure { message: e.to_string() },
        }
    }
}

/// Carries an outcome from the worker back to the UI's own thread.
///
/// Implementations must only enqueue; the UI applies the outcome when it drains its queue.
pub trait OutcomeSink: Send + Sync + 'static {
    fn deliver(&self, outcome: GenerationOutcome);
}

impl OutcomeSink for Sender<GenerationOutcome> {
    fn deliver(&self, outcome: GenerationOutcome) {
        if self.send(outcome).is_err() {
            error!("Outcome receiver is gone, dropping result");
        }
    }
}

/// Runs each job on its own blocking task.
///
/// Nothing here stops two jobs from overlapping; the caller keeps at most one in
/// flight. The service mutex still serializes pipeline access if that ever changes.
pub struct JobRunner {
    service: Arc<Mutex<GenerationService>>,
    output: OutputDir,
    sink: Arc<dyn OutcomeSink>,
    runtime: Handle,
}

impl JobRunner {
    pub fn new(service: GenerationService, output: OutputDir, sink: Arc<dyn OutcomeSink>, runtime: Handle) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
            output,
            sink,
            runtime,
        }
    }

    pub fn submit(&self, job: GenerationJob) -> JoinHandle<()> {
        let service = self.service.clone();
        let output = self.output.clone();
        let sink = self.sink.clone();

        self.runtime.spawn_blocking(move || {
            let outcome: GenerationOutcome = panic::catch_unwind(AssertUnwindSafe(|| run(&service, &output, &job)))
                .unwrap_or_else(|payload| Err(GenerationError::WorkerPanicked(panic_message(payload))))
                .into();

            if let GenerationOutcome::Failure { message } = &outcome {
                error!("Generation failed: {message}");
            }
            sink.deliver(outcome);
        })
    }

    pub fn output(&self) -> &OutputDir {
        &self.output
    }
}

fn run(service: &Mutex<GenerationService>, output: &OutputDir, job: &GenerationJob) -> Result<(Bitmap, PathBuf)> {
    info!("Generating {:?} ({})", job.prompt, if job.base_image.is_some() { "image-to-image" } else { "text-to-image" });

    let base_image = job.base_image.as_deref().map(Bitmap::open).transpose()?;
    let request = GenerationRequest { prompt: job.prompt.clone(), base_image };

    // A panic in an earlier job cannot leave the pipelines half-updated.
    let image = service.lock().unwrap_or_else(PoisonError::into_inner).generate(&request)?;

    let path = output.save(&image)?;
    info!("Saved {}", path.display());
    Ok((image, path))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
