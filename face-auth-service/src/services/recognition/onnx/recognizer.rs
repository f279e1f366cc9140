//! ArcFace descriptor extraction from aligned crops.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

use super::alignment::{align_face, ALIGNED_SIZE};
use super::detector::Detection;
use super::super::{FaceImage, RecognitionError};
use crate::models::FaceDescriptor;

const PIXEL_MEAN: f32 = 127.5;
const PIXEL_SCALE: f32 = 127.5;
const DESCRIPTOR_LEN: usize = 512;

pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    pub fn load(model_path: &Path) -> Result<Self, RecognitionError> {
        if !model_path.exists() {
            return Err(RecognitionError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name().to_string()).collect::<Vec<_>>(),
            "Loaded face recognizer"
        );

        Ok(Self { session })
    }

    /// L2-normalized descriptor of `face`.
    pub fn describe(
        &mut self,
        image: &FaceImage,
        face: &Detection,
    ) -> Result<FaceDescriptor, RecognitionError> {
        let landmarks = face.landmarks.as_ref().ok_or_else(|| {
            RecognitionError::InferenceFailed("detection has no landmarks".to_string())
        })?;
        let crop = align_face(image, landmarks).ok_or(RecognitionError::NoFaceDetected)?;
        let input = to_tensor(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            RecognitionError::InferenceFailed(format!("descriptor output: {}", e))
        })?;

        if raw.len() != DESCRIPTOR_LEN {
            return Err(RecognitionError::InferenceFailed(format!(
                "expected {} values, model produced {}",
                DESCRIPTOR_LEN,
                raw.len()
            )));
        }

        Ok(FaceDescriptor::new(raw.to_vec()).l2_normalized())
    }
}

/// Interleaved RGB crop to an NCHW tensor in RGB channel order.
fn to_tensor(crop: &[u8]) -> Array4<f32> {
    Array4::from_shape_fn((1, 3, ALIGNED_SIZE, ALIGNED_SIZE), |(_, c, y, x)| {
        let pixel = crop.get((y * ALIGNED_SIZE + x) * 3 + c).copied().unwrap_or(0) as f32;
        (pixel - PIXEL_MEAN) / PIXEL_SCALE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_splits_interleaved_rgb_into_planes() {
        let crop = [10u8, 128, 250].repeat(ALIGNED_SIZE * ALIGNED_SIZE);
        let tensor = to_tensor(&crop);
        assert_eq!(tensor.shape(), &[1, 3, ALIGNED_SIZE, ALIGNED_SIZE]);
        for (c, value) in [10.0f32, 128.0, 250.0].into_iter().enumerate() {
            let expected = (value - PIXEL_MEAN) / PIXEL_SCALE;
            assert!((tensor[[0, c, 7, 9]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn tensor_range_is_symmetric() {
        let tensor = to_tensor(&[0, 0, 0, 255, 255, 255]);
        assert!((tensor[[0, 0, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn missing_model_is_reported() {
        let err = FaceRecognizer::load(Path::new("/nonexistent/w600k_r50.onnx")).err().unwrap();
        assert!(matches!(err, RecognitionError::ModelNotFound(_)));
    }
}
