//! The seam between the generation service and an actual diffusion model.
//!
//! A [`PipelineLoader`] knows where the weights live and how to build each of the
//! two pipelines. The service decides *when* to build them.

pub mod stable_diffusion;

use std::fmt;

use crate::bitmap::Bitmap;
use crate::safety::SafetyChecker;

pub use stable_diffusion::StableDiffusionLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    TextToImage,
    ImageToImage,
}

impl PipelineKind {
    pub fn name(&self) -> &str {
        match self {
            Self::TextToImage => "text-to-image",
            Self::ImageToImage => "image-to-image",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextToImageParams {
    pub width: u32,
    pub height: u32,
    pub steps: usize,
    pub guidance_scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageToImageParams {
    /// Side of the square the base image is resized to.
    pub size: u32,
    /// 0 keeps the base image, 1 ignores it.
    pub strength: f64,
    pub steps: usize,
    pub guidance_scale: f64,
}

pub trait TextToImage: Send {
    fn generate(&mut self, prompt: &str, params: &TextToImageParams) -> anyhow::Result<Bitmap>;
}

pub trait ImageToImage: Send {
    /// `base` has already been resized to `params.size` square.
    fn generate(&mut self, prompt: &str, base: &Bitmap, params: &ImageToImageParams) -> anyhow::Result<Bitmap>;
}

pub trait PipelineLoader: Send {
    fn load_text_to_image(&self) -> anyhow::Result<Box<dyn TextToImage>>;

    fn load_image_to_image(&self) -> anyhow::Result<Box<dyn ImageToImage>>;

    /// Models without a bundled checker return `None`.
    fn load_safety_checker(&self) -> anyhow::Result<Option<Box<dyn SafetyChecker>>> {
        Ok(None)
    }
}
