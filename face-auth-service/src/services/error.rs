use service_core::error::AppError;
use thiserror::Error;

use super::recognition::RecognitionError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User not found")]
    UserNotFound,

    #[error("Face not recognized")]
    FaceNotRecognized,

    #[error("No face detected in image")]
    NoFaceDetected,

    #[error("Face recognition failed: {0}")]
    Recognition(String),
}

impl From<RecognitionError> for ServiceError {
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::InvalidImage(msg) => ServiceError::InvalidImage(msg),
            RecognitionError::NoFaceDetected => ServiceError::NoFaceDetected,
            other => ServiceError::Recognition(other.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::from(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            e @ ServiceError::InvalidImage(_) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::UserAlreadyExists
            | ServiceError::UserNotFound
            | ServiceError::FaceNotRecognized) => AppError::BadRequest(anyhow::anyhow!(e.to_string())),
            e @ (ServiceError::NoFaceDetected | ServiceError::Recognition(_)) => {
                AppError::Recognition(e.to_string())
            }
        }
    }
}
