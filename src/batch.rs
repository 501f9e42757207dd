//! Batched mask prediction over compressed envelopes
//!
//! Inputs and outputs travel as [`CompressedArray`] envelopes. The first pull
//! decodes every input and runs one batched prediction; each later pull only
//! resizes and recompresses one mask, so at most one full-resolution mask is
//! uncompressed at a time.

use crate::envelope::{CompressedArray, MaskEnvelope};
use crate::error::{CutoutError, Result};
use crate::registry::ModelRegistry;
use crate::types::Mask;
use image::RgbImage;
use std::io::{Read, Seek};
use std::iter::FusedIterator;
use std::vec;
use tracing::{span, Level};

/// Lazy sequence of mask envelopes returned by [`remove_many`]
#[derive(Debug)]
pub struct RemoveMany<'a, R> {
    registry: &'a ModelRegistry,
    state: BatchState<R>,
}

#[derive(Debug)]
enum BatchState<R> {
    NotStarted {
        buffers: Vec<R>,
        model_name: String,
    },
    BatchComputed {
        pending: vec::IntoIter<((u32, u32), Mask)>,
    },
    Exhausted,
}

/// Predict masks for a batch of compressed images
///
/// Nothing runs until the first `next()`. Envelopes come back in input order,
/// each resized to its input's resolution. A failure while decoding or
/// predicting yields one error and ends the sequence.
pub fn remove_many<'a, I, R>(
    buffers: I,
    registry: &'a ModelRegistry,
    model_name: &str,
) -> RemoveMany<'a, R>
where
    I: IntoIterator<Item = R>,
    R: Read + Seek,
{
    RemoveMany {
        registry,
        state: BatchState::NotStarted {
            buffers: buffers.into_iter().collect(),
            model_name: model_name.to_string(),
        },
    }
}

impl<R: Read + Seek> RemoveMany<'_, R> {
    fn compute_batch(
        &self,
        buffers: Vec<R>,
        model_name: &str,
    ) -> Result<vec::IntoIter<((u32, u32), Mask)>> {
        let _span = span!(Level::DEBUG, "remove_many", model = model_name, count = buffers.len())
            .entered();
        let model = self.registry.get_model(model_name)?;

        let images = buffers
            .into_iter()
            .enumerate()
            .map(|(index, mut buffer)| {
                decode_buffer(&mut buffer).map_err(|e| {
                    CutoutError::decode(format!("Batch input {index} could not be read: {e}"))
                })
            })
            .collect::<Result<Vec<RgbImage>>>()?;

        let masks = {
            let _span = span!(Level::DEBUG, "inference", batch = images.len()).entered();
            model.predict_batch(&images)?
        };
        if masks.len() != images.len() {
            return Err(CutoutError::inference(format!(
                "Model {} returned {} masks for {} images",
                model.kind(),
                masks.len(),
                images.len()
            )));
        }

        let dimensions: Vec<(u32, u32)> = images.iter().map(RgbImage::dimensions).collect();
        drop(images);
        log::debug!("Batch of {} masks ready", masks.len());
        Ok(dimensions
            .into_iter()
            .zip(masks)
            .collect::<Vec<_>>()
            .into_iter())
    }
}

fn decode_buffer<R: Read + Seek>(buffer: &mut R) -> Result<RgbImage> {
    CompressedArray::read_from(buffer)?
        .decompress()?
        .into_rgb_image()
}

fn finish_item(dimensions: (u32, u32), mask: &Mask) -> Result<MaskEnvelope> {
    let resized = mask.resize(dimensions.0, dimensions.1);
    MaskEnvelope::from_mask(&resized)
}

impl<R: Read + Seek> Iterator for RemoveMany<'_, R> {
    type Item = Result<MaskEnvelope>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, BatchState::Exhausted) {
                BatchState::NotStarted {
                    buffers,
                    model_name,
                } => match self.compute_batch(buffers, &model_name) {
                    Ok(pending) => self.state = BatchState::BatchComputed { pending },
                    Err(e) => return Some(Err(e)),
                },
                BatchState::BatchComputed { mut pending } => {
                    let (dimensions, mask) = pending.next()?;
                    self.state = BatchState::BatchComputed { pending };
                    return Some(finish_item(dimensions, &mask));
                },
                BatchState::Exhausted => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.state {
            BatchState::NotStarted { buffers, .. } => (0, Some(buffers.len())),
            BatchState::BatchComputed { pending } => pending.size_hint(),
            BatchState::Exhausted => (0, Some(0)),
        }
    }
}

impl<R: Read + Seek> FusedIterator for RemoveMany<'_, R> {}
