//! Stable Diffusion v1.5 on candle.
//!
//! Weights are read from one model directory holding the UNet, VAE and CLIP
//! safetensors plus the CLIP `tokenizer.json`. Each pipeline owns its own copy of
//! the models, so loading image-to-image later does not disturb text-to-image.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Error as E, Result, bail};
use candle_core::{DType, Device, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    self, StableDiffusionConfig, clip::ClipTextTransformer, schedulers::Scheduler,
    unet_2d::UNet2DConditionModel, vae::AutoEncoderKL,
};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::bitmap::Bitmap;
use crate::config::DevicePreference;
use crate::pipeline::{
    ImageToImage, ImageToImageParams, PipelineKind, PipelineLoader, TextToImage, TextToImageParams,
};

pub const UNET_FILE: &str = "unet.safetensors";
pub const VAE_FILE: &str = "vae.safetensors";
pub const CLIP_FILE: &str = "clip.safetensors";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

const VAE_SCALE: f64 = 0.18215;
const LATENT_CHANNELS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub unet: PathBuf,
    pub vae: PathBuf,
    pub clip: PathBuf,
    pub tokenizer: PathBuf,
}

impl ModelFiles {
    /// Resolves the component files under `root`, failing if any are missing.
    pub fn locate(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("model directory {} does not exist", root.display());
        }

        let files = Self {
            unet: root.join(UNET_FILE),
            vae: root.join(VAE_FILE),
            clip: root.join(CLIP_FILE),
            tokenizer: root.join(TOKENIZER_FILE),
        };

        let missing: Vec<&str> = [
            (UNET_FILE, &files.unet),
            (VAE_FILE, &files.vae),
            (CLIP_FILE, &files.clip),
            (TOKENIZER_FILE, &files.tokenizer),
        ]
        .into_iter()
        .filter(|(_, path)| !path.is_file())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            bail!("model directory {} is missing {}", root.display(), missing.join(", "));
        }

        Ok(files)
    }
}

pub struct StableDiffusionLoader {
    files: ModelFiles,
    device: Device,
    dtype: DType,
}

impl StableDiffusionLoader {
    pub fn new(model_path: &Path, device: DevicePreference) -> Result<Self> {
        let files = ModelFiles::locate(model_path)?;

        let device = match device {
            DevicePreference::Auto => Device::cuda_if_available(0)?,
            DevicePreference::Cpu => Device::Cpu,
        };
        // Half precision only pays off on the GPU.
        let dtype = if device.is_cuda() { DType::F16 } else { DType::F32 };

        info!("Using {:?} with {:?} weights from {}", device, dtype, model_path.display());

        Ok(Self { files, device, dtype })
    }

    fn load_model(&self, kind: PipelineKind) -> Result<SdModel> {
        info!("Loading {} pipeline…", kind);
        let started = Instant::now();

        let model = SdModel::load(&self.files, &self.device, self.dtype)?;

        info!("{} pipeline loaded in {:.1}s", kind, started.elapsed().as_secs_f32());
        Ok(model)
    }
}

impl PipelineLoader for StableDiffusionLoader {
    fn load_text_to_image(&self) -> Result<Box<dyn TextToImage>> {
        let model = self.load_model(PipelineKind::TextToImage)?;
        Ok(Box::new(StableDiffusionTextToImage { model }))
    }

    fn load_image_to_image(&self) -> Result<Box<dyn ImageToImage>> {
        let model = self.load_model(PipelineKind::ImageToImage)?;
        Ok(Box::new(StableDiffusionImageToImage { model }))
    }
}

pub struct StableDiffusionTextToImage {
    model: SdModel,
}

impl TextToImage for StableDiffusionTextToImage {
    fn generate(&mut self, prompt: &str, params: &TextToImageParams) -> Result<Bitmap> {
        let mut scheduler = self.model.config.build_scheduler(params.steps)?;
        let embeddings = self.model.text_embeddings(prompt)?;

        let shape = (
            1,
            LATENT_CHANNELS,
            params.height as usize / 8,
            params.width as usize / 8,
        );
        let latents = Tensor::randn(0f32, 1f32, shape, &self.model.device)?;
        let latents = (latents * scheduler.init_noise_sigma())?.to_dtype(self.model.dtype)?;

        let latents = self.model.denoise(latents, scheduler.as_mut(), 0, &embeddings, params.guidance_scale)?;
        self.model.decode(&latents)
    }
}

pub struct StableDiffusionImageToImage {
    model: SdModel,
}

impl ImageToImage for StableDiffusionImageToImage {
    fn generate(&mut self, prompt: &str, base: &Bitmap, params: &ImageToImageParams) -> Result<Bitmap> {
        if !(0.0..=1.0).contains(&params.strength) {
            bail!("strength must be between 0 and 1, got {}", params.strength);
        }

        let mut scheduler = self.model.config.build_scheduler(params.steps)?;
        let embeddings = self.model.text_embeddings(prompt)?;
        let timesteps = scheduler.timesteps().to_vec();

        let t_start = params.steps - (params.steps as f64 * params.strength) as usize;

        let latents = self.model.encode(base)?;
        let latents = match timesteps.get(t_start) {
            Some(&timestep) => {
                let noise = Tensor::randn(0f32, 1f32, latents.dims(), &self.model.device)?
                    .to_dtype(latents.dtype())?;
                scheduler.add_noise(&latents, noise, timestep)?
            }
            None => latents,
        };

        let latents = self.model.denoise(latents, scheduler.as_mut(), t_start, &embeddings, params.guidance_scale)?;
        self.model.decode(&latents)
    }
}

struct SdModel {
    config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    pad_id: u32,
    clip: ClipTextTransformer,
    vae: AutoEncoderKL,
    unet: UNet2DConditionModel,
    device: Device,
    dtype: DType,
}

impl SdModel {
    fn load(files: &ModelFiles, device: &Device, dtype: DType) -> Result<Self> {
        let config = StableDiffusionConfig::v1_5(None, None, None);

        let tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(E::msg)?;
        let pad_id = match tokenizer.get_padding() {
            Some(padding) => padding.pad_id,
            None => *tokenizer
                .get_vocab(true)
                .get("<|endoftext|>")
                .context("tokenizer has no <|endoftext|> token")?,
        };

        debug!("Building the CLIP text encoder");
        let clip = stable_diffusion::build_clip_transformer(&config.clip, &files.clip, device, dtype)
            .with_context(|| format!("loading {}", files.clip.display()))?;
        debug!("Building the autoencoder");
        let vae = config
            .build_vae(&files.vae, device, dtype)
            .with_context(|| format!("loading {}", files.vae.display()))?;
        debug!("Building the UNet");
        let unet = config
            .build_unet(&files.unet, device, LATENT_CHANNELS, false, dtype)
            .with_context(|| format!("loading {}", files.unet.display()))?;

        Ok(Self {
            config,
            tokenizer,
            pad_id,
            clip,
            vae,
            unet,
            device: device.clone(),
            dtype,
        })
    }

    fn tokens(&self, text: &str) -> Result<Tensor> {
        let max_len = self.config.clip.max_position_embeddings;

        let mut ids = self.tokenizer.encode(text, true).map_err(E::msg)?.get_ids().to_vec();
        ids.truncate(max_len);
        ids.resize(max_len, self.pad_id);

        Ok(Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?)
    }

    /// Unconditional and prompt embeddings stacked on the batch axis, for classifier-free guidance.
    fn text_embeddings(&self, prompt: &str) -> Result<Tensor> {
        let cond = self.clip.forward(&self.tokens(prompt)?)?;
        let uncond = self.clip.forward(&self.tokens("")?)?;
        Ok(Tensor::cat(&[uncond, cond], 0)?.to_dtype(self.dtype)?)
    }

    fn denoise(
        &self,
        mut latents: Tensor,
        scheduler: &mut dyn Scheduler,
        t_start: usize,
        embeddings: &Tensor,
        guidance_scale: f64,
    ) -> Result<Tensor> {
        let timesteps = scheduler.timesteps().to_vec();

        for (index, &timestep) in timesteps.iter().enumerate().skip(t_start) {
            let input = Tensor::cat(&[&latents, &latents], 0)?;
            let input = scheduler.scale_model_input(input, timestep)?;

            let noise_pred = self.unet.forward(&input, timestep as f64, embeddings)?;
            let noise_pred = noise_pred.chunk(2, 0)?;
            let (uncond, text) = (&noise_pred[0], &noise_pred[1]);
            let noise_pred = (uncond + ((text - uncond)? * guidance_scale)?)?;

            latents = scheduler.step(&noise_pred, timestep, &latents)?;
            debug!("Denoising step {}/{}", index + 1, timesteps.len());
        }

        Ok(latents)
    }

    fn encode(&self, base: &Bitmap) -> Result<Tensor> {
        let (width, height) = (base.width() as usize, base.height() as usize);

        let image = Tensor::from_vec(base.pixels().to_vec(), (height, width, 3), &Device::Cpu)?
            .permute((2, 0, 1))?
            .to_dtype(DType::F32)?
            .affine(2. / 255., -1.)?
            .unsqueeze(0)?
            .to_device(&self.device)?
            .to_dtype(self.dtype)?;

        let dist = self.vae.encode(&image)?;
        Ok((dist.sample()? * VAE_SCALE)?)
    }

    fn decode(&self, latents: &Tensor) -> Result<Bitmap> {
        let image = self.vae.decode(&(latents / VAE_SCALE)?)?;
        let image = ((image.to_dtype(DType::F32)? / 2.)? + 0.5)?.to_device(&Device::Cpu)?;
        let image = (image.clamp(0f32, 1f32)? * 255.)?.to_dtype(DType::U8)?.get(0)?;

        let (_, height, width) = image.dims3()?;
        let pixels = image.permute((1, 2, 0))?.flatten_all()?.to_vec1::<u8>()?;

        Bitmap::from_rgb(width as u32, height as u32, pixels).context("decoded image has an unexpected size")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelFiles::locate(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_locate_reports_missing_components() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(UNET_FILE), b"").unwrap();
        std::fs::write(dir.path().join(TOKENIZER_FILE), b"{}").unwrap();

        let msg = ModelFiles::locate(dir.path()).unwrap_err().to_string();
        assert!(msg.contains(VAE_FILE));
        assert!(msg.contains(CLIP_FILE));
        assert!(!msg.contains(UNET_FILE));
    }

    #[test]
    fn test_locate_complete_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in [UNET_FILE, VAE_FILE, CLIP_FILE, TOKENIZER_FILE] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let files = ModelFiles::locate(dir.path()).unwrap();
        assert_eq!(files.vae, dir.path().join(VAE_FILE));
    }

    #[test]
    fn test_loader_fails_without_weights() {
        let dir = tempfile::tempdir().unwrap();
        assert!(StableDiffusionLoader::new(dir.path(), DevicePreference::Cpu).is_err());
    }
}
