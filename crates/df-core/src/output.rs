use std::fs::File;
use std::path::{Path, PathBuf};
use std::{fs, io};

use tempfile::NamedTempFile;
use tracing::info;
use uuid::Uuid;

use crate::bitmap::Bitmap;
use crate::error::{GenerationError, Result};

pub const OUTPUT_EXTENSION: &str = "png";

/// Where generated images are written. Every image gets a fresh random name, so
/// nothing is ever overwritten.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Creates the directory if needed and pins it to an absolute path.
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let io_err = |source| GenerationError::OutputDir { path: root.to_path_buf(), source };

        fs::create_dir_all(root).map_err(io_err)?;
        let root = fs::canonicalize(root).map_err(io_err)?;

        info!("Writing images to {}", root.display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn unique_path(&self) -> PathBuf {
        self.root.join(format!("{}.{}", Uuid::new_v4().simple(), OUTPUT_EXTENSION))
    }

    /// Saves the bitmap under a new name and returns its absolute path.
    pub fn save(&self, image: &Bitmap) -> Result<PathBuf> {
        let path = self.unique_path();
        image.save(&path)?;
        Ok(path)
    }
}

/// Copies a generated image to a user-chosen destination. The source is never touched.
///
/// The bytes are staged in a temporary file next to the destination and renamed
/// into place, so a destination that aliases the source (symlink, hard link,
/// `..`) never sees a truncate.
pub fn export_image(source: &Path, destination: &Path) -> io::Result<u64> {
    if same_file(source, destination) {
        return Ok(fs::metadata(source)?.len());
    }

    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    let bytes = io::copy(&mut File::open(source)?, staged.as_file_mut())?;
    fs::set_permissions(staged.path(), fs::metadata(source)?.permissions())?;
    staged.persist(destination).map_err(|e| e.error)?;

    Ok(bytes)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
