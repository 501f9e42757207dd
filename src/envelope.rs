//! Compressed 8-bit array envelopes
//!
//! Layout:
//!
//! ```text
//! "BGCA" | version: u8 = 1 | rank: u8 (2 or 3) | dims: rank × u32 LE | zlib(row-major bytes)
//! ```
//!
//! Dimensions are `(height, width)` or `(height, width, channels)`. The
//! inflated payload must hold exactly the product of the dimensions.

use crate::error::{CutoutError, Result};
use crate::types::Mask;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{GrayImage, RgbImage};
use std::io::{Read, Seek, SeekFrom, Write};

const MAGIC: &[u8; 4] = b"BGCA";
const FORMAT_VERSION: u8 = 1;
const FIXED_HEADER_LEN: usize = 6;

/// Losslessly compressed 8-bit array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArray {
    bytes: Vec<u8>,
}

/// Envelope carrying one predicted mask
pub type MaskEnvelope = CompressedArray;

/// Inflated envelope contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedArray {
    pub shape: Vec<usize>,
    pub data: Vec<u8>,
}

impl CompressedArray {
    /// Compress `data` laid out row-major with the given shape
    ///
    /// # Errors
    /// - Rank other than 2 or 3
    /// - Dimensions that do not fit in u32
    /// - `data` length differing from the shape's element count
    pub fn compress(shape: &[usize], data: &[u8]) -> Result<Self> {
        if !(2..=3).contains(&shape.len()) {
            return Err(CutoutError::envelope(format!(
                "Unsupported rank {}; expected 2 or 3",
                shape.len()
            )));
        }
        let expected = element_count(shape)?;
        if expected != data.len() {
            return Err(CutoutError::envelope(format!(
                "Shape {shape:?} needs {expected} bytes, got {}",
                data.len()
            )));
        }

        let mut bytes = Vec::with_capacity(FIXED_HEADER_LEN + 4 * shape.len() + data.len() / 4);
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        #[allow(clippy::cast_possible_truncation)]
        bytes.push(shape.len() as u8);
        for &dim in shape {
            let dim = u32::try_from(dim)
                .map_err(|_| CutoutError::envelope(format!("Dimension {dim} exceeds u32")))?;
            bytes.extend_from_slice(&dim.to_le_bytes());
        }

        let mut encoder = ZlibEncoder::new(bytes, Compression::default());
        encoder.write_all(data)?;
        Ok(Self {
            bytes: encoder.finish()?,
        })
    }

    /// Compress an RGB image as `(height, width, 3)`
    ///
    /// # Errors
    /// - Compression failures
    pub fn from_rgb_image(image: &RgbImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::compress(&[height as usize, width as usize, 3], image.as_raw())
    }

    /// Compress a mask as `(height, width)`
    ///
    /// # Errors
    /// - Compression failures
    pub fn from_mask(mask: &Mask) -> Result<Self> {
        let (width, height) = mask.dimensions();
        Self::compress(&[height as usize, width as usize], mask.as_raw())
    }

    /// Wrap envelope bytes, checking the header
    ///
    /// # Errors
    /// - Missing magic, unknown version or unsupported rank
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        parse_header(&bytes)?;
        Ok(Self { bytes })
    }

    /// Read a whole envelope from the start of `reader`
    ///
    /// # Errors
    /// - Seek or read failures
    /// - Malformed header
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Shape recorded in the header
    ///
    /// # Errors
    /// - Malformed header
    pub fn shape(&self) -> Result<Vec<usize>> {
        parse_header(&self.bytes).map(|(shape, _)| shape)
    }

    /// Inflate the payload
    ///
    /// # Errors
    /// - Malformed header or zlib stream
    /// - Payload length differing from the recorded shape
    pub fn decompress(&self) -> Result<DecodedArray> {
        let (shape, payload_start) = parse_header(&self.bytes)?;
        let expected = element_count(&shape)?;
        let payload = self.bytes.get(payload_start..).unwrap_or_default();

        let mut data = Vec::with_capacity(expected);
        ZlibDecoder::new(payload)
            .take(expected as u64 + 1)
            .read_to_end(&mut data)
            .map_err(|e| CutoutError::envelope(format!("Corrupt payload: {e}")))?;
        if data.len() != expected {
            return Err(CutoutError::envelope(format!(
                "Payload holds {} bytes, shape {shape:?} needs {expected}",
                data.len()
            )));
        }
        Ok(DecodedArray { shape, data })
    }
}

impl DecodedArray {
    /// Interpret the array as an image
    ///
    /// Rank 2 and single-channel rank 3 are treated as gray, three channels
    /// as RGB and four channels as RGBA with alpha dropped.
    ///
    /// # Errors
    /// - Any other channel count
    pub fn into_rgb_image(self) -> Result<RgbImage> {
        let (height, width) = self.spatial_dims()?;
        let channels = self.shape.get(2).copied().unwrap_or(1);
        let image = match channels {
            1 => GrayImage::from_raw(width, height, self.data)
                .map(|gray| image::DynamicImage::ImageLuma8(gray).to_rgb8()),
            3 => RgbImage::from_raw(width, height, self.data),
            4 => image::RgbaImage::from_raw(width, height, self.data)
                .map(|rgba| image::DynamicImage::ImageRgba8(rgba).to_rgb8()),
            other => {
                return Err(CutoutError::envelope(format!(
                    "Cannot read {other}-channel array as an image"
                )));
            },
        };
        image.ok_or_else(|| CutoutError::envelope("Array data does not match its shape"))
    }

    /// Interpret a rank-2 (or single-channel) array as a mask
    ///
    /// # Errors
    /// - Multi-channel arrays
    pub fn into_mask(self) -> Result<Mask> {
        if self.shape.get(2).is_some_and(|&c| c != 1) {
            return Err(CutoutError::envelope(format!(
                "Mask must have one channel, got shape {:?}",
                self.shape
            )));
        }
        let (height, width) = self.spatial_dims()?;
        Mask::from_raw(width, height, self.data)
    }

    fn spatial_dims(&self) -> Result<(u32, u32)> {
        let to_u32 = |index: usize| {
            self.shape
                .get(index)
                .and_then(|&dim| u32::try_from(dim).ok())
                .ok_or_else(|| CutoutError::envelope(format!("Bad shape {:?}", self.shape)))
        };
        Ok((to_u32(0)?, to_u32(1)?))
    }
}

/// Inflate a mask envelope
///
/// # Errors
/// - Malformed envelope or non-mask shape
pub fn decompress_mask(envelope: &MaskEnvelope) -> Result<Mask> {
    envelope.decompress()?.into_mask()
}

fn parse_header(bytes: &[u8]) -> Result<(Vec<usize>, usize)> {
    let Some(&[m0, m1, m2, m3, version, rank]) = bytes.get(..FIXED_HEADER_LEN) else {
        return Err(CutoutError::envelope("Missing BGCA header"));
    };
    if &[m0, m1, m2, m3] != MAGIC {
        return Err(CutoutError::envelope("Missing BGCA header"));
    }
    if version != FORMAT_VERSION {
        return Err(CutoutError::envelope(format!(
            "Unsupported envelope version {version}"
        )));
    }
    let rank = usize::from(rank);
    if !(2..=3).contains(&rank) {
        return Err(CutoutError::envelope(format!("Unsupported rank {rank}")));
    }

    let dims_end = FIXED_HEADER_LEN + 4 * rank;
    let dims = bytes
        .get(FIXED_HEADER_LEN..dims_end)
        .ok_or_else(|| CutoutError::envelope("Truncated envelope header"))?;
    let shape = dims
        .chunks_exact(4)
        .map(|chunk| {
            let mut le = [0u8; 4];
            le.copy_from_slice(chunk);
            u32::from_le_bytes(le) as usize
        })
        .collect();
    Ok((shape, dims_end))
}

fn element_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| CutoutError::envelope(format!("Shape {shape:?} overflows")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let envelope = CompressedArray::compress(&[2, 3], &[0, 1, 2, 3, 4, 5]).unwrap();
        let bytes = envelope.as_bytes();
        assert_eq!(&bytes[..4], b"BGCA");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 2);
        assert_eq!(&bytes[6..10], &2u32.to_le_bytes());
        assert_eq!(&bytes[10..14], &3u32.to_le_bytes());
        assert_eq!(envelope.shape().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_image_envelope_preserves_pixels() {
        let image = RgbImage::from_fn(5, 3, |x, y| image::Rgb([x as u8, y as u8, 7]));
        let envelope = CompressedArray::from_rgb_image(&image).unwrap();
        let decoded = envelope.decompress().unwrap();
        assert_eq!(decoded.shape, vec![3, 5, 3]);
        assert_eq!(decoded.into_rgb_image().unwrap(), image);
    }

    #[test]
    fn test_gray_and_rgba_arrays_become_rgb() {
        let gray = CompressedArray::compress(&[1, 2], &[10, 20]).unwrap();
        let rgb = gray.decompress().unwrap().into_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [20, 20, 20]);

        let rgba = CompressedArray::compress(&[1, 1, 4], &[1, 2, 3, 0]).unwrap();
        let rgb = rgba.decompress().unwrap().into_rgb_image().unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [1, 2, 3]);

        let two = CompressedArray::compress(&[1, 1, 2], &[1, 2]).unwrap();
        assert!(two.decompress().unwrap().into_rgb_image().is_err());
    }

    #[test]
    fn test_mask_envelope() {
        let mask = Mask::from_raw(3, 2, vec![0, 50, 100, 150, 200, 255]).unwrap();
        let envelope = MaskEnvelope::from_mask(&mask).unwrap();
        assert_eq!(decompress_mask(&envelope).unwrap(), mask);
    }

    #[test]
    fn test_read_from_rewinds() {
        let envelope = CompressedArray::compress(&[1, 1], &[9]).unwrap();
        let mut cursor = Cursor::new(envelope.as_bytes().to_vec());
        cursor.seek(SeekFrom::End(0)).unwrap();
        let read = CompressedArray::read_from(&mut cursor).unwrap();
        assert_eq!(read, envelope);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(CompressedArray::compress(&[4], &[0; 4]).is_err());
        assert!(CompressedArray::compress(&[2, 2], &[0; 3]).is_err());
    }

    #[test]
    fn test_rejects_malformed_bytes() {
        assert!(matches!(
            CompressedArray::from_bytes(b"PK\x03\x04".to_vec()),
            Err(CutoutError::Envelope(_))
        ));

        let mut bytes = CompressedArray::compress(&[2, 2], &[1, 2, 3, 4])
            .unwrap()
            .into_bytes();
        bytes[4] = 9;
        assert!(CompressedArray::from_bytes(bytes).is_err());
    }

    #[test]
    fn test_payload_length_must_match_shape() {
        let mut bytes = CompressedArray::compress(&[2, 2], &[1, 2, 3, 4])
            .unwrap()
            .into_bytes();
        // Claim a 2x3 array over a 4-byte payload
        bytes[10..14].copy_from_slice(&3u32.to_le_bytes());
        let envelope = CompressedArray::from_bytes(bytes).unwrap();
        assert!(matches!(envelope.decompress(), Err(CutoutError::Envelope(_))));
    }

    #[test]
    fn test_truncated_payload_is_error() {
        let mut bytes = CompressedArray::compress(&[16, 16], &[7; 256])
            .unwrap()
            .into_bytes();
        bytes.truncate(bytes.len() - 3);
        let envelope = CompressedArray::from_bytes(bytes).unwrap();
        assert!(envelope.decompress().is_err());
    }
}
