//! In-memory pipelines for exercising the service and runner without model weights.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};

use crate::bitmap::Bitmap;
use crate::pipeline::{ImageToImage, ImageToImageParams, PipelineLoader, TextToImage, TextToImageParams};
use crate::safety::SafetyChecker;

#[derive(Default)]
struct CallLog {
    text_loads: usize,
    image_loads: usize,
    prompts: Vec<(String, String)>,
    base_sizes: Vec<(u32, u32)>,
}

#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<CallLog>>);

impl Calls {
    fn with<T>(&self, f: impl FnOnce(&mut CallLog) -> T) -> T {
        f(&mut self.0.lock().unwrap())
    }

    pub fn text_loads(&self) -> usize {
        self.with(|log| log.text_loads)
    }

    pub fn image_loads(&self) -> usize {
        self.with(|log| log.image_loads)
    }

    /// `(route, prompt)` per inference, route being `t2i` or `i2i`.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.with(|log| log.prompts.clone())
    }

    pub fn base_sizes(&self) -> Vec<(u32, u32)> {
        self.with(|log| log.base_sizes.clone())
    }
}

pub struct FakeLoader {
    calls: Calls,
    fail_text_to_image: bool,
    image_to_image_failures: AtomicUsize,
    fail_inference: bool,
    fail_safety_checker: bool,
    panic_once: Arc<AtomicBool>,
    delay: Duration,
}

impl FakeLoader {
    pub fn new(calls: Calls) -> Self {
        Self {
            calls,
            fail_text_to_image: false,
            image_to_image_failures: AtomicUsize::new(0),
            fail_inference: false,
            fail_safety_checker: false,
            panic_once: Arc::new(AtomicBool::new(false)),
            delay: Duration::ZERO,
        }
    }

    pub fn failing_text_to_image(mut self) -> Self {
        self.fail_text_to_image = true;
        self
    }

    /// The first `times` image-to-image builds fail.
    pub fn failing_image_to_image(self, times: usize) -> Self {
        self.image_to_image_failures.store(times, Ordering::SeqCst);
        self
    }

    pub fn failing_inference(mut self) -> Self {
        self.fail_inference = true;
        self
    }

    /// The first inference panics; later ones behave normally.
    pub fn panicking_inference(self) -> Self {
        self.panic_once.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_safety_checker(mut self) -> Self {
        self.fail_safety_checker = true;
        self
    }

    /// Every inference sleeps this long first.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn pipeline(&self) -> FakePipeline {
        FakePipeline {
            calls: self.calls.clone(),
            fail: self.fail_inference,
            panic_once: self.panic_once.clone(),
            delay: self.delay,
        }
    }
}

impl PipelineLoader for FakeLoader {
    fn load_text_to_image(&self) -> anyhow::Result<Box<dyn TextToImage>> {
        if self.fail_text_to_image {
            bail!("weights not found");
        }
        self.calls.with(|log| log.text_loads += 1);
        Ok(Box::new(self.pipeline()))
    }

    fn load_image_to_image(&self) -> anyhow::Result<Box<dyn ImageToImage>> {
        self.calls.with(|log| log.image_loads += 1);
        let remaining = self.image_to_image_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.image_to_image_failures.store(remaining - 1, Ordering::SeqCst);
            bail!("out of memory");
        }
        Ok(Box::new(self.pipeline()))
    }

    fn load_safety_checker(&self) -> anyhow::Result<Option<Box<dyn SafetyChecker>>> {
        if self.fail_safety_checker {
            bail!("safety checker weights are corrupt");
        }
        Ok(None)
    }
}

struct FakePipeline {
    calls: Calls,
    fail: bool,
    panic_once: Arc<AtomicBool>,
    delay: Duration,
}

impl FakePipeline {
    fn run(&self, route: &str, prompt: &str) -> anyhow::Result<()> {
        std::thread::sleep(self.delay);
        self.calls.with(|log| log.prompts.push((route.into(), prompt.into())));
        if self.panic_once.swap(false, Ordering::SeqCst) {
            panic!("kaboom");
        }
        if self.fail {
            return Err(anyhow!("CUDA out of memory"));
        }
        Ok(())
    }
}

impl TextToImage for FakePipeline {
    fn generate(&mut self, prompt: &str, params: &TextToImageParams) -> anyhow::Result<Bitmap> {
        self.run("t2i", prompt)?;
        Ok(Bitmap::filled(params.width, params.height, [200, 40, 40]))
    }
}

impl ImageToImage for FakePipeline {
    fn generate(&mut self, prompt: &str, base: &Bitmap, _params: &ImageToImageParams) -> anyhow::Result<Bitmap> {
        self.calls.with(|log| log.base_sizes.push((base.width(), base.height())));
        self.run("i2i", prompt)?;
        Ok(base.clone())
    }
}
