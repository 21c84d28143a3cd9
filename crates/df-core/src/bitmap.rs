use std::fmt;
use std::path::Path;

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};

use crate::error::{GenerationError, Result};

/// Packed RGB8 image, row major, no padding.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Wraps raw RGB bytes. Returns `None` if the buffer does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb.iter().copied().cycle().take(width as usize * height as usize * 3).collect();
        Self { width, height, pixels }
    }

    /// Decodes any format `image` understands and drops alpha.
    pub fn open(path: &Path) -> Result<Self> {
        let decode_err = |source| GenerationError::Decode { path: path.to_path_buf(), source };

        let decoded = ImageReader::open(path)
            .map_err(|e| decode_err(image::ImageError::IoError(e)))?
            .with_guessed_format()
            .map_err(|e| decode_err(image::ImageError::IoError(e)))?
            .decode()
            .map_err(decode_err)?;

        Ok(decoded.into_rgb8().into())
    }

    /// Writes the bitmap; the format follows the file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_image()
            .save(path)
            .map_err(|source| GenerationError::Write { path: path.to_path_buf(), source })
    }

    /// Exact resize, aspect ratio is not preserved.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        if self.width == width && self.height == height {
            return self.clone();
        }
        image::imageops::resize(&self.to_image(), width, height, FilterType::CatmullRom).into()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn to_image(&self) -> RgbImage {
        // Length is checked at every construction site.
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

impl From<RgbImage> for Bitmap {
    fn from(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self { width, height, pixels: img.into_raw() }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_rejects_bad_length() {
        assert!(Bitmap::from_rgb(2, 2, vec![0; 11]).is_none());
        assert!(Bitmap::from_rgb(2, 2, vec![0; 12]).is_some());
    }

    #[test]
    fn test_resize_to_square() {
        let bmp = Bitmap::filled(40, 20, [200, 10, 10]);
        let out = bmp.resized(16, 16);
        assert_eq!((out.width(), out.height()), (16, 16));
        assert_eq!(out.pixels().len(), 16 * 16 * 3);
        assert_eq!(&out.pixels()[..3], &[200, 10, 10]);
    }

    #[test]
    fn test_save_and_open_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        let bmp = Bitmap::filled(8, 4, [1, 2, 3]);

        bmp.save(&path).unwrap();
        assert_eq!(Bitmap::open(&path).unwrap(), bmp);
    }

    #[test]
    fn test_open_non_image_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        match Bitmap::open(&path) {
            Err(GenerationError::Decode { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected decode error, got {other:?}"),
        }
    }
}
