pub mod bitmap;
pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod presenter;
pub mod safety;
pub mod service;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use bitmap::Bitmap;
pub use config::AppConfig;
pub use error::{GenerationError, ValidationError};
pub use job::{GenerationJob, GenerationOutcome, JobRunner, OutcomeSink};
pub use presenter::{Frontend, Presenter};
pub use service::{GenerationRequest, GenerationService, GenerationSettings};
pub use session::{Session, Status};
