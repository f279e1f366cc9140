//! SCRFD + ArcFace encoder on ONNX Runtime.
//!
//! Sessions need exclusive access while running, so both models live on one
//! dedicated OS thread. Requests reach it over a bounded channel and each
//! carries a oneshot sender for the reply.

pub mod alignment;
pub mod detector;
pub mod recognizer;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use self::detector::FaceDetector;
use self::recognizer::FaceRecognizer;
use super::{FaceEncoder, FaceImage, RecognitionError};
use crate::config::RecognitionConfig;
use crate::models::FaceDescriptor;

const QUEUE_DEPTH: usize = 32;

impl From<ort::Error> for RecognitionError {
    fn from(err: ort::Error) -> Self {
        RecognitionError::InferenceFailed(err.to_string())
    }
}

struct EngineRequest {
    image: FaceImage,
    reply: oneshot::Sender<Result<FaceDescriptor, RecognitionError>>,
}

/// Clone-safe handle to the inference thread.
#[derive(Clone)]
pub struct OnnxFaceEncoder {
    tx: mpsc::Sender<EngineRequest>,
}

impl OnnxFaceEncoder {
    /// Load both models and start the inference thread. Fails if either model
    /// is missing or cannot be loaded.
    pub fn spawn(config: &RecognitionConfig) -> Result<Self, RecognitionError> {
        let mut detector =
            FaceDetector::load(&config.detector_model_path(), config.min_detection_confidence)?;
        let mut recognizer = FaceRecognizer::load(&config.recognizer_model_path())?;

        let (tx, mut rx) = mpsc::channel::<EngineRequest>(QUEUE_DEPTH);
        std::thread::Builder::new()
            .name("face-engine".to_string())
            .spawn(move || {
                while let Some(request) = rx.blocking_recv() {
                    let result = run(&mut detector, &mut recognizer, &request.image);
                    // Caller may have gone away (request cancelled).
                    let _ = request.reply.send(result);
                }
                tracing::info!("Face engine stopped");
            })
            .map_err(|e| RecognitionError::InferenceFailed(format!("engine thread: {}", e)))?;

        tracing::info!("Face engine started");
        Ok(Self { tx })
    }
}

fn run(
    detector: &mut FaceDetector,
    recognizer: &mut FaceRecognizer,
    image: &FaceImage,
) -> Result<FaceDescriptor, RecognitionError> {
    let faces = detector.detect(image)?;
    let face_count = faces.len();
    let best = faces.into_iter().next().ok_or(RecognitionError::NoFaceDetected)?;

    tracing::debug!(
        faces = face_count,
        confidence = best.confidence,
        "Selected most confident face"
    );

    recognizer.describe(image, &best)
}

#[async_trait]
impl FaceEncoder for OnnxFaceEncoder {
    fn name(&self) -> &'static str {
        "onnx"
    }

    async fn describe(&self, image: FaceImage) -> Result<FaceDescriptor, RecognitionError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(EngineRequest { image, reply })
            .await
            .map_err(|_| RecognitionError::EngineUnavailable)?;
        response.await.map_err(|_| RecognitionError::EngineUnavailable)?
    }
}
