//! Face descriptor extraction.
//!
//! Images arrive as base64 payloads, are decoded to 8-bit RGB frames and
//! handed to a [`FaceEncoder`], which returns one descriptor for the most
//! prominent face. Two encoders exist: [`OnnxFaceEncoder`] runs pretrained
//! SCRFD/ArcFace models, [`MockFaceEncoder`] is model-free and deterministic.

pub mod decode;
pub mod mock;
#[cfg(feature = "onnx")]
pub mod onnx;

pub use decode::{decode_image, FaceImage};
pub use mock::MockFaceEncoder;
#[cfg(feature = "onnx")]
pub use onnx::OnnxFaceEncoder;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{EncoderBackend, RecognitionConfig};
use crate::models::FaceDescriptor;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("{0}")]
    InvalidImage(String),
    #[error("no face detected")]
    NoFaceDetected,
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("recognition engine is not running")]
    EngineUnavailable,
    #[error("unsupported face encoder: {0}")]
    Unsupported(String),
}

#[async_trait]
pub trait FaceEncoder: Send + Sync {
    /// Short identifier reported by the health endpoint.
    fn name(&self) -> &'static str;

    /// Compute the descriptor of the most prominent face in `image`.
    async fn describe(&self, image: FaceImage) -> Result<FaceDescriptor, RecognitionError>;
}

/// Build the encoder selected by configuration.
pub fn build_encoder(config: &RecognitionConfig) -> Result<Arc<dyn FaceEncoder>, RecognitionError> {
    match config.backend {
        EncoderBackend::Mock => {
            tracing::warn!("Using mock face encoder; descriptors are not biometric");
            Ok(Arc::new(MockFaceEncoder::new()))
        }
        #[cfg(feature = "onnx")]
        EncoderBackend::Onnx => Ok(Arc::new(OnnxFaceEncoder::spawn(config)?)),
        #[cfg(not(feature = "onnx"))]
        EncoderBackend::Onnx => Err(RecognitionError::Unsupported(
            "onnx (rebuild with the `onnx` feature)".to_string(),
        )),
    }
}
