//! Shared mock model and loader for integration tests

#![allow(dead_code)]

use bgcutout::{ModelHandle, ModelKind, ModelLoader, Result, SegmentationModel};
use image::RgbImage;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Emits a mask with one constant value, or the per-pixel channel mean
#[derive(Debug, Clone, Copy)]
pub struct FixedMaskModel {
    pub kind: ModelKind,
    pub value: Option<u8>,
}

impl SegmentationModel for FixedMaskModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, image: &RgbImage) -> Result<bgcutout::Mask> {
        let (width, height) = image.dimensions();
        let data = match self.value {
            Some(value) => vec![value; (width * height) as usize],
            None => image
                .pixels()
                .map(|p| ((u16::from(p[0]) + u16::from(p[1]) + u16::from(p[2])) / 3) as u8)
                .collect(),
        };
        bgcutout::Mask::from_raw(width, height, data)
    }
}

/// Loader handing out [`FixedMaskModel`]s and counting loads
#[derive(Debug, Default)]
pub struct CountingLoader {
    pub value: Option<u8>,
    pub loads: Arc<AtomicUsize>,
}

impl CountingLoader {
    pub fn constant(value: u8) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn luma() -> Self {
        Self::default()
    }

    pub fn load_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, kind: ModelKind) -> Result<ModelHandle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FixedMaskModel {
            kind,
            value: self.value,
        }))
    }
}

pub fn gray_image(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb([value, value, value]))
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}
