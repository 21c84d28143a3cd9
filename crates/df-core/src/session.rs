use std::path::{Path, PathBuf};

use crate::error::ValidationError;
use crate::job::{GenerationJob, GenerationOutcome};

pub const NOT_SAVED: &str = "Not saved yet.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Generating,
    Complete,
}

impl Status {
    pub fn message(&self) -> &str {
        match self {
            Self::Idle => "",
            Self::Generating => "Generating image… please wait ⏳",
            Self::Complete => "Generation complete ✅",
        }
    }
}

/// Everything the window shows about the current session. Only the presenter writes to it.
#[derive(Debug, Clone)]
pub struct Session {
    base_image: Option<PathBuf>,
    last_output: Option<PathBuf>,
    controls_enabled: bool,
    status: Status,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            base_image: None,
            last_output: None,
            controls_enabled: true,
            status: Status::Idle,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the prompt and moves to busy. The returned job is what should be submitted.
    pub fn begin_generation(&mut self, prompt: &str) -> Result<GenerationJob, ValidationError> {
        if !self.controls_enabled {
            return Err(ValidationError::Busy);
        }

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }

        self.controls_enabled = false;
        self.status = Status::Generating;

        Ok(GenerationJob {
            prompt: prompt.to_string(),
            base_image: self.base_image.clone(),
        })
    }

    /// Back to idle, whatever the outcome.
    pub fn finish_generation(&mut self, outcome: &GenerationOutcome) {
        self.controls_enabled = true;

        match outcome {
            GenerationOutcome::Success { path, .. } => {
                self.last_output = Some(path.clone());
                self.status = Status::Complete;
            }
            GenerationOutcome::Failure { .. } => {
                self.status = Status::Idle;
            }
        }
    }

    pub fn select_base_image(&mut self, path: PathBuf) {
        self.base_image = Some(path);
    }

    pub fn clear_base_image(&mut self) {
        self.base_image = None;
    }

    /// The file Download should copy, checked against the disk right now.
    pub fn download_source(&self) -> Result<&Path, ValidationError> {
        let path = self.last_output.as_deref().ok_or(ValidationError::NoOutput)?;
        if !path.is_file() {
            return Err(ValidationError::OutputMissing(path.to_path_buf()));
        }
        Ok(path)
    }

    pub fn base_image(&self) -> Option<&Path> {
        self.base_image.as_deref()
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    pub fn is_busy(&self) -> bool {
        !self.controls_enabled
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// The output the label currently shows, and what Copy path copies. Hidden
    /// while generating and after a failure.
    pub fn shown_output(&self) -> Option<&Path> {
        match self.status {
            Status::Complete => self.last_output.as_deref(),
            _ => None,
        }
    }

    pub fn output_label(&self) -> String {
        match self.shown_output() {
            Some(path) => path.display().to_string(),
            None => NOT_SAVED.to_string(),
        }
    }
}
