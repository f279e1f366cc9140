use async_trait::async_trait;
use image::imageops::{self, FilterType};

use super::{FaceEncoder, FaceImage, RecognitionError};
use crate::models::FaceDescriptor;

const GRID_WIDTH: u32 = 16;
const GRID_HEIGHT: u32 = 8;

/// Deterministic, model-free encoder.
///
/// The frame is downsampled to a 16x8 grid, standardized and L2-normalized,
/// giving a 128-dimensional unit vector. Identical or brightness-shifted images
/// produce near-identical descriptors. A frame without contrast is treated as
/// containing no face.
#[derive(Debug, Default, Clone)]
pub struct MockFaceEncoder;

impl MockFaceEncoder {
    pub fn new() -> Self {
        Self
    }

    fn encode(&self, image: &FaceImage) -> Result<FaceDescriptor, RecognitionError> {
        let luma = image
            .to_luma()
            .ok_or_else(|| RecognitionError::InvalidImage("pixel buffer size mismatch".to_string()))?;
        let grid = imageops::resize(&luma, GRID_WIDTH, GRID_HEIGHT, FilterType::Triangle);

        let values: Vec<f32> = grid.pixels().map(|p| p.0[0] as f32).collect();
        let n = values.len() as f32;
        let mean = values.iter().sum::<f32>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let std_dev = variance.sqrt();
        if std_dev < 1e-3 {
            return Err(RecognitionError::NoFaceDetected);
        }

        let standardized: Vec<f32> = values.iter().map(|v| (v - mean) / std_dev).collect();
        Ok(FaceDescriptor::new(standardized).l2_normalized())
    }
}

#[async_trait]
impl FaceEncoder for MockFaceEncoder {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn describe(&self, image: FaceImage) -> Result<FaceDescriptor, RecognitionError> {
        self.encode(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn frame(img: GrayImage) -> FaceImage {
        FaceImage::from_luma(img)
    }

    fn horizontal(offset: u8) -> FaceImage {
        frame(GrayImage::from_fn(64, 64, |x, _| Luma([(x * 3) as u8 + offset])))
    }

    fn vertical() -> FaceImage {
        frame(GrayImage::from_fn(64, 64, |_, y| Luma([(y * 3) as u8])))
    }

    #[tokio::test]
    async fn produces_unit_length_128_d_descriptor() {
        let descriptor = MockFaceEncoder::new().describe(horizontal(0)).await.unwrap();
        assert_eq!(descriptor.len(), 128);
        let norm: f32 = descriptor.as_slice().iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn same_image_has_zero_distance() {
        let encoder = MockFaceEncoder::new();
        let a = encoder.describe(horizontal(0)).await.unwrap();
        let b = encoder.describe(horizontal(0)).await.unwrap();
        assert!(a.euclidean_distance(&b).unwrap() < 1e-6);
    }

    #[tokio::test]
    async fn brightness_shift_stays_close() {
        let encoder = MockFaceEncoder::new();
        let a = encoder.describe(horizontal(0)).await.unwrap();
        let b = encoder.describe(horizontal(40)).await.unwrap();
        assert!(a.euclidean_distance(&b).unwrap() < 0.05);
    }

    #[tokio::test]
    async fn orthogonal_patterns_are_far_apart() {
        let encoder = MockFaceEncoder::new();
        let a = encoder.describe(horizontal(0)).await.unwrap();
        let b = encoder.describe(vertical()).await.unwrap();
        assert!(a.euclidean_distance(&b).unwrap() > 1.3);
    }

    #[tokio::test]
    async fn flat_image_has_no_face() {
        let flat = frame(GrayImage::from_pixel(32, 32, Luma([128])));
        let err = MockFaceEncoder::new().describe(flat).await.unwrap_err();
        assert!(matches!(err, RecognitionError::NoFaceDetected));
    }
}
