//! Test utilities and mock models for testing the pipeline
//!
//! Mock implementations of `SegmentationModel` and `ModelLoader` that need no
//! model files or inference engines.

use crate::{
    error::{CutoutError, Result},
    inference::{ModelHandle, SegmentationModel},
    models::{ModelKind, ModelLoader},
    types::Mask,
};
use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock derives a mask from its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMaskMode {
    /// Mean of the RGB channels
    Luma,
    /// Every pixel set to the value
    Constant(u8),
    /// Soft disc centred in the frame
    Circle,
}

/// Mock segmentation model for testing
#[derive(Debug, Clone)]
pub struct MockSegmentationModel {
    kind: ModelKind,
    mode: MockMaskMode,
    /// Output resolution (width, height); `None` keeps the input size
    output_size: Option<(u32, u32)>,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_inference: bool,
}

impl MockSegmentationModel {
    /// Luma mask at the input resolution
    #[must_use]
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            mode: MockMaskMode::Luma,
            output_size: None,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_inference: false,
        }
    }

    /// Create a mock model that will fail during inference
    #[must_use]
    pub fn new_failing_inference(kind: ModelKind) -> Self {
        let mut model = Self::new(kind);
        model.should_fail_inference = true;
        model
    }

    #[must_use]
    pub fn with_mode(mut self, mode: MockMaskMode) -> Self {
        self.mode = mode;
        self
    }

    /// Emit masks at a fixed resolution, like a real model would
    #[must_use]
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = Some((width, height));
        self
    }

    /// Get the call history for verification in tests
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_mask(&self, image: &RgbImage) -> Mask {
        let (width, height) = image.dimensions();
        let full = match self.mode {
            MockMaskMode::Luma => Mask::new(image::GrayImage::from_fn(width, height, |x, y| {
                let p = image.get_pixel(x, y);
                let sum = u16::from(p[0]) + u16::from(p[1]) + u16::from(p[2]);
                image::Luma([(sum / 3) as u8])
            })),
            MockMaskMode::Constant(value) => Mask::filled(width, height, value),
            MockMaskMode::Circle => {
                let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
                let radius = (width.min(height) as f32 / 3.0).max(1.0);
                Mask::new(image::GrayImage::from_fn(width, height, |x, y| {
                    let distance = (x as f32 - cx).hypot(y as f32 - cy);
                    let value = ((radius - distance) / radius).clamp(0.0, 1.0);
                    image::Luma([(value * 255.0) as u8])
                }))
            },
        };
        match self.output_size {
            Some((w, h)) => full.resize(w, h),
            None => full,
        }
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, image: &RgbImage) -> Result<Mask> {
        self.record_call("predict");
        if self.should_fail_inference {
            return Err(CutoutError::inference("Mock inference failed"));
        }
        Ok(self.generate_mask(image))
    }

    fn predict_batch(&self, images: &[RgbImage]) -> Result<Vec<Mask>> {
        self.record_call(&format!("predict_batch:{}", images.len()));
        if self.should_fail_inference {
            return Err(CutoutError::inference("Mock batch inference failed"));
        }
        Ok(images.iter().map(|image| self.generate_mask(image)).collect())
    }
}

/// Mock loader counting loads per call, optionally failing the first attempts
#[derive(Debug)]
pub struct MockModelLoader {
    mode: MockMaskMode,
    output_size: Option<(u32, u32)>,
    loads: Arc<AtomicUsize>,
    failures_remaining: AtomicUsize,
    delay: Option<Duration>,
}

impl MockModelLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mode: MockMaskMode::Luma,
            output_size: None,
            loads: Arc::new(AtomicUsize::new(0)),
            failures_remaining: AtomicUsize::new(0),
            delay: None,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: MockMaskMode) -> Self {
        self.mode = mode;
        self
    }

    /// Models emit masks at a fixed resolution
    #[must_use]
    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_size = Some((width, height));
        self
    }

    /// Fail the first `count` load attempts
    #[must_use]
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    /// Sleep inside every load to widen race windows
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of load attempts
    #[must_use]
    pub fn load_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl Default for MockModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader for MockModelLoader {
    fn load(&self, kind: ModelKind) -> Result<ModelHandle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CutoutError::model(format!("Mock load of {kind} failed")));
        }
        let model = MockSegmentationModel::new(kind).with_mode(self.mode);
        Ok(Arc::new(match self.output_size {
            Some((width, height)) => model.with_output_size(width, height),
            None => model,
        }))
    }
}
