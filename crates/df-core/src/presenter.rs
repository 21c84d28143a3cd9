use std::path::PathBuf;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bitmap::Bitmap;
use crate::error::ValidationError;
use crate::job::{GenerationOutcome, JobRunner};
use crate::output::export_image;
use crate::session::Session;

/// What the handlers need from the window: dialogs, clipboard and the preview.
pub trait Frontend {
    fn show_error(&mut self, title: &str, message: &str);

    fn show_info(&mut self, title: &str, message: &str);

    fn pick_base_image(&mut self) -> Option<PathBuf>;

    fn pick_save_path(&mut self) -> Option<PathBuf>;

    fn copy_to_clipboard(&mut self, text: &str);

    fn show_image(&mut self, image: &Bitmap);
}

/// Button handlers. Runs on the UI thread and is the only writer of the [`Session`].
pub struct Presenter {
    session: Session,
    runner: JobRunner,
}

impl Presenter {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            session: Session::new(),
            runner,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Submits a job unless the prompt is empty or one is already running.
    pub fn generate(&mut self, prompt: &str, ui: &mut impl Frontend) -> Option<JoinHandle<()>> {
        match self.session.begin_generation(prompt) {
            Ok(job) => Some(self.runner.submit(job)),
            Err(ValidationError::Busy) => {
                debug!("Ignoring Generate while a job is running");
                None
            }
            Err(e) => {
                ui.show_error("Missing prompt", &e.to_string());
                None
            }
        }
    }

    pub fn outcome_received(&mut self, outcome: GenerationOutcome, ui: &mut impl Frontend) {
        self.session.finish_generation(&outcome);

        match outcome {
            GenerationOutcome::Success { image, path } => {
                info!("Showing {}", path.display());
                ui.show_image(&image);
            }
            GenerationOutcome::Failure { message } => {
                ui.show_error("Error", &format!("An error occurred during generation: {message}"));
            }
        }
    }

    pub fn browse(&mut self, ui: &mut impl Frontend) {
        if self.session.is_busy() {
            return;
        }

        if let Some(path) = ui.pick_base_image() {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            info!("Base image selected: {}", path.display());
            self.session.select_base_image(path);
            ui.show_info("Image Uploaded", &format!("Base image selected:\n{name}"));
        }
    }

    pub fn clear_base_image(&mut self) {
        if !self.session.is_busy() {
            self.session.clear_base_image();
        }
    }

    pub fn download(&mut self, ui: &mut impl Frontend) {
        if self.session.is_busy() {
            return;
        }

        let source = match self.session.download_source() {
            Ok(path) => path.to_path_buf(),
            Err(_) => {
                ui.show_error(
                    "No image",
                    "Please generate an image first or the last generated image could not be found.",
                );
                return;
            }
        };

        let Some(destination) = ui.pick_save_path() else {
            return;
        };

        match export_image(&source, &destination) {
            Ok(_) => ui.show_info("Saved", &format!("Image saved to:\n{}", destination.display())),
            Err(e) => {
                warn!("Copy to {} failed: {e}", destination.display());
                ui.show_error("Save Error", &format!("Failed to save image: {e}"));
            }
        }
    }

    pub fn copy_path(&mut self, ui: &mut impl Frontend) {
        if self.session.is_busy() {
            return;
        }

        match self.session.shown_output() {
            Some(path) => {
                ui.copy_to_clipboard(&path.display().to_string());
                ui.show_info("Path copied", "Output path copied to clipboard!");
            }
            None => ui.show_info("No Path", "No output path available to copy yet."),
        }
    }
}
