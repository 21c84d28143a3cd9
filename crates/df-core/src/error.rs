use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::PipelineKind;

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Everything that can go wrong while producing one image.
///
/// Apart from a startup failure of the text-to-image pipeline, all of these are
/// request-scoped: the job runner turns them into a failure outcome and the UI
/// goes back to idle.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("failed to load the {kind} pipeline: {source:#}")]
    PipelineLoad {
        kind: PipelineKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("inference failed: {0:#}")]
    Inference(#[from] anyhow::Error),

    #[error("could not decode base image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("the generated image was flagged by the safety checker")]
    UnsafeContent,

    #[error("safety checking is enabled but this model provides no safety checker")]
    SafetyCheckerUnavailable,

    #[error("failed to load the safety checker: {0:#}")]
    SafetyCheckerLoad(#[source] anyhow::Error),

    #[error("generation worker crashed: {0}")]
    WorkerPanicked(String),

    #[error("output directory {} is unavailable: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Input rejected synchronously by the UI handlers. None of these have side effects.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a prompt.")]
    EmptyPrompt,

    #[error("A generation is already running.")]
    Busy,

    #[error("Please generate an image first.")]
    NoOutput,

    #[error("The last generated image could not be found at {}.", .0.display())]
    OutputMissing(PathBuf),
}
