pub mod auth;
pub mod database;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod recognition;
pub mod user_store;

pub use auth::FaceAuthService;
pub use database::MongoDb;
pub use error::ServiceError;
pub use matcher::{best_match, MatchOutcome};
pub use metrics::{get_metrics, init_metrics, record_attempt};
pub use recognition::{build_encoder, FaceEncoder, MockFaceEncoder, RecognitionError};
pub use user_store::{MockUserStore, UserStore};
