use std::time::Instant;

use tracing::{info, warn};

use crate::bitmap::Bitmap;
use crate::error::{GenerationError, Result};
use crate::pipeline::{
    ImageToImage, ImageToImageParams, PipelineKind, PipelineLoader, TextToImage, TextToImageParams,
};
use crate::safety::SafetyPolicy;

/// Fixed inference parameters. Requests only carry a prompt and an optional base image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    pub text_to_image: TextToImageParams,
    pub image_to_image: ImageToImageParams,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            text_to_image: TextToImageParams {
                width: 512,
                height: 512,
                steps: 50,
                guidance_scale: 7.5,
            },
            image_to_image: ImageToImageParams {
                size: 512,
                strength: 0.75,
                steps: 50,
                guidance_scale: 7.5,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub base_image: Option<Bitmap>,
}

/// Owns both pipelines for the lifetime of the process.
///
/// Text-to-image is built up front; image-to-image is built the first time a
/// request carries a base image and cached from then on.
pub struct GenerationService {
    loader: Box<dyn PipelineLoader>,
    settings: GenerationSettings,
    safety: SafetyPolicy,
    text_to_image: Box<dyn TextToImage>,
    image_to_image: Option<Box<dyn ImageToImage>>,
}

impl GenerationService {
    /// Fails if the text-to-image pipeline cannot be built; the app is unusable without it.
    pub fn new(loader: Box<dyn PipelineLoader>, settings: GenerationSettings, safety: SafetyPolicy) -> Result<Self> {
        let text_to_image = loader
            .load_text_to_image()
            .map_err(|source| GenerationError::PipelineLoad { kind: PipelineKind::TextToImage, source })?;

        Ok(Self {
            loader,
            settings,
            safety,
            text_to_image,
            image_to_image: None,
        })
    }

    /// Builds the safety policy a config flag asks for, using whatever checker the model ships.
    pub fn safety_policy(loader: &dyn PipelineLoader, enabled: bool) -> Result<SafetyPolicy> {
        if !enabled {
            return Ok(SafetyPolicy::Disabled);
        }

        match loader.load_safety_checker() {
            Ok(Some(checker)) => Ok(SafetyPolicy::Enforced(checker)),
            Ok(None) => Err(GenerationError::SafetyCheckerUnavailable),
            Err(e) => Err(GenerationError::SafetyCheckerLoad(e)),
        }
    }

    pub fn generate(&mut self, request: &GenerationRequest) -> Result<Bitmap> {
        let started = Instant::now();

        let image = match &request.base_image {
            Some(base) => {
                if !self.image_to_image_loaded() {
                    info!("First image-to-image request, building the pipeline");
                }
                let params = self.settings.image_to_image;
                let base = base.resized(params.size, params.size);
                self.image_to_image()?.generate(&request.prompt, &base, &params)?
            }
            None => {
                let params = self.settings.text_to_image;
                self.text_to_image.generate(&request.prompt, &params)?
            }
        };

        if !self.safety.permits(&image) {
            warn!("Discarding image flagged by the safety checker");
            return Err(GenerationError::UnsafeContent);
        }

        info!("Generated {}x{} image in {:.1}s", image.width(), image.height(), started.elapsed().as_secs_f32());
        Ok(image)
    }

    pub fn image_to_image_loaded(&self) -> bool {
        self.image_to_image.is_some()
    }

    /// A failed build is not cached, so the next request tries again.
    fn image_to_image(&mut self) -> Result<&mut Box<dyn ImageToImage>> {
        let pipeline = match self.image_to_image.take() {
            Some(pipeline) => pipeline,
            None => self
                .loader
                .load_image_to_image()
                .map_err(|source| GenerationError::PipelineLoad { kind: PipelineKind::ImageToImage, source })?,
        };

        Ok(self.image_to_image.insert(pipeline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SafetyChecker;
    use crate::testing::{Calls, FakeLoader};

    fn service(loader: FakeLoader) -> GenerationService {
        GenerationService::new(Box::new(loader), GenerationSettings::default(), SafetyPolicy::Disabled).unwrap()
    }

    fn request(prompt: &str, base: Option<Bitmap>) -> GenerationRequest {
        GenerationRequest { prompt: prompt.into(), base_image: base }
    }

    #[test]
    fn test_text_to_image_loaded_eagerly() {
        let calls = Calls::default();
        let svc = service(FakeLoader::new(calls.clone()));

        assert_eq!(calls.text_loads(), 1);
        assert_eq!(calls.image_loads(), 0);
        assert!(!svc.image_to_image_loaded());
    }

    #[test]
    fn test_startup_failure_is_pipeline_load_error() {
        let loader = FakeLoader::new(Calls::default()).failing_text_to_image();
        let err = GenerationService::new(Box::new(loader), GenerationSettings::default(), SafetyPolicy::Disabled)
            .err()
            .unwrap();

        assert!(matches!(err, GenerationError::PipelineLoad { kind: PipelineKind::TextToImage, .. }));
    }

    #[test]
    fn test_prompt_only_uses_text_to_image() {
        let calls = Calls::default();
        let mut svc = service(FakeLoader::new(calls.clone()));

        let img = svc.generate(&request("a red bicycle", None)).unwrap();

        assert_eq!((img.width(), img.height()), (512, 512));
        assert_eq!(calls.prompts(), vec![("t2i".to_string(), "a red bicycle".to_string())]);
        assert!(!svc.image_to_image_loaded());
    }

    #[test]
    fn test_base_image_is_resized_and_routed_to_image_to_image() {
        let calls = Calls::default();
        let mut svc = service(FakeLoader::new(calls.clone()));

        svc.generate(&request("watercolor", Some(Bitmap::filled(300, 120, [9, 9, 9])))).unwrap();

        assert_eq!(calls.image_loads(), 1);
        assert_eq!(calls.base_sizes(), vec![(512, 512)]);
        assert_eq!(calls.prompts(), vec![("i2i".to_string(), "watercolor".to_string())]);
    }

    #[test]
    fn test_alternating_keeps_one_cached_image_to_image() {
        let calls = Calls::default();
        let mut svc = service(FakeLoader::new(calls.clone()));
        let base = Bitmap::filled(64, 64, [1, 2, 3]);

        svc.generate(&request("one", Some(base.clone()))).unwrap();
        svc.generate(&request("two", None)).unwrap();
        svc.generate(&request("three", Some(base))).unwrap();
        svc.generate(&request("four", None)).unwrap();

        assert_eq!(calls.text_loads(), 1);
        assert_eq!(calls.image_loads(), 1);
        let routes: Vec<String> = calls.prompts().into_iter().map(|(route, _)| route).collect();
        assert_eq!(routes, ["i2i", "t2i", "i2i", "t2i"]);
    }

    #[test]
    fn test_failed_lazy_load_is_request_scoped_and_retried() {
        let calls = Calls::default();
        let mut svc = service(FakeLoader::new(calls.clone()).failing_image_to_image(1));
        let base = Bitmap::filled(8, 8, [0, 0, 0]);

        let err = svc.generate(&request("first", Some(base.clone()))).unwrap_err();
        assert!(matches!(err, GenerationError::PipelineLoad { kind: PipelineKind::ImageToImage, .. }));
        assert!(!svc.image_to_image_loaded());

        // Text-to-image still works after the failure.
        svc.generate(&request("plain", None)).unwrap();

        svc.generate(&request("second", Some(base))).unwrap();
        assert!(svc.image_to_image_loaded());
        assert_eq!(calls.image_loads(), 2);
    }

    #[test]
    fn test_inference_failure_surfaces() {
        let mut svc = service(FakeLoader::new(Calls::default()).failing_inference());
        let err = svc.generate(&request("boom", None)).unwrap_err();
        assert!(matches!(err, GenerationError::Inference(_)));
    }

    struct FlagEverything;

    impl SafetyChecker for FlagEverything {
        fn is_unsafe(&self, _image: &Bitmap) -> bool {
            true
        }
    }

    #[test]
    fn test_enforced_safety_policy_rejects_output() {
        let loader = FakeLoader::new(Calls::default());
        let mut svc = GenerationService::new(
            Box::new(loader),
            GenerationSettings::default(),
            SafetyPolicy::Enforced(Box::new(FlagEverything)),
        )
        .unwrap();

        assert!(matches!(svc.generate(&request("x", None)), Err(GenerationError::UnsafeContent)));
    }

    #[test]
    fn test_safety_policy_from_flag() {
        let loader = FakeLoader::new(Calls::default());

        assert!(!GenerationService::safety_policy(&loader, false).unwrap().is_enforced());
        assert!(matches!(
            GenerationService::safety_policy(&loader, true),
            Err(GenerationError::SafetyCheckerUnavailable)
        ));
    }

    #[test]
    fn test_safety_checker_load_failure_is_its_own_error() {
        let loader = FakeLoader::new(Calls::default()).failing_safety_checker();

        let err = GenerationService::safety_policy(&loader, true).err().unwrap();
        assert!(matches!(err, GenerationError::SafetyCheckerLoad(_)));
        assert!(err.to_string().contains("safety checker weights are corrupt"));

        assert!(!GenerationService::safety_policy(&loader, false).unwrap().is_enforced());
    }
}
