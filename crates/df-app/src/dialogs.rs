//! Blocking native dialogs.

use std::path::PathBuf;

use rfd::{FileDialog, MessageButtons, MessageDialog, MessageLevel};
use winit::window::Window;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

fn message(level: MessageLevel, title: &str, description: &str) -> MessageDialog {
    MessageDialog::new()
        .set_level(level)
        .set_title(title)
        .set_description(description)
        .set_buttons(MessageButtons::Ok)
}

/// Used before a window exists.
pub fn error(title: &str, description: &str) {
    message(MessageLevel::Error, title, description).show();
}

pub fn error_in(window: &Window, title: &str, description: &str) {
    message(MessageLevel::Error, title, description).set_parent(window).show();
}

pub fn info_in(window: &Window, title: &str, description: &str) {
    message(MessageLevel::Info, title, description).set_parent(window).show();
}

pub fn pick_base_image(window: &Window) -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Choose base image")
        .add_filter("Image files", &IMAGE_EXTENSIONS)
        .set_parent(window)
        .pick_file()
}

pub fn pick_save_path(window: &Window) -> Option<PathBuf> {
    let path = FileDialog::new()
        .add_filter("PNG Image", &["png"])
        .add_filter("All files", &["*"])
        .set_file_name("image.png")
        .set_parent(window)
        .save_file()?;

    Some(if path.extension().is_none() { path.with_extension("png") } else { path })
}
