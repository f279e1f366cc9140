use service_core::config::{self as core_config, get_env, parse_env};
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct FaceAuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub recognition: RecognitionConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

/// Which face encoder computes descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderBackend {
    /// SCRFD detector + ArcFace recognizer on ONNX Runtime.
    Onnx,
    /// Model-free deterministic encoder for development and tests.
    Mock,
}

impl FromStr for EncoderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "onnx" => Ok(EncoderBackend::Onnx),
            "mock" => Ok(EncoderBackend::Mock),
            other => Err(format!("Unknown face encoder: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub backend: EncoderBackend,
    pub model_dir: PathBuf,
    pub detector_model: String,
    pub recognizer_model: String,
    /// A login matches when the Euclidean distance is strictly below this value.
    pub match_threshold: f32,
    pub min_detection_confidence: f32,
}

impl RecognitionConfig {
    pub fn detector_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_model)
    }

    pub fn recognizer_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.recognizer_model)
    }
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// `*` allows any origin.
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub signup_attempts: u32,
    pub signup_window_seconds: u64,
    pub login_attempts: u32,
    pub login_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key limiters on `x-forwarded-for`. Only safe behind a proxy that overwrites it.
    pub trust_forwarded_for: bool,
    pub eviction_interval_seconds: u64,
}

impl FaceAuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = FaceAuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("face-auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", None, is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("face_auth"), is_prod)?,
            },
            recognition: RecognitionConfig {
                backend: get_env("FACE_ENCODER", Some("onnx"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                model_dir: PathBuf::from(get_env("FACE_MODEL_DIR", Some("models"), is_prod)?),
                detector_model: get_env("FACE_DETECTOR_MODEL", Some("det_10g.onnx"), is_prod)?,
                recognizer_model: get_env(
                    "FACE_RECOGNIZER_MODEL",
                    Some("w600k_r50.onnx"),
                    is_prod,
                )?,
                match_threshold: parse_env("MATCH_DISTANCE_THRESHOLD", Some("1.0"), is_prod)?,
                min_detection_confidence: parse_env(
                    "MIN_DETECTION_CONFIDENCE",
                    Some("0.5"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("*"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                max_body_bytes: parse_env("MAX_BODY_BYTES", Some("10485760"), is_prod)?,
            },
            rate_limit: RateLimitConfig {
                signup_attempts: parse_env("SIGNUP_RATE_LIMIT", Some("10"), is_prod)?,
                signup_window_seconds: parse_env(
                    "SIGNUP_RATE_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                login_attempts: parse_env("LOGIN_RATE_LIMIT", Some("10"), is_prod)?,
                login_window_seconds: parse_env("LOGIN_RATE_WINDOW_SECONDS", Some("60"), is_prod)?,
                global_ip_limit: parse_env("GLOBAL_IP_RATE_LIMIT", Some("100"), is_prod)?,
                global_ip_window_seconds: parse_env(
                    "GLOBAL_IP_RATE_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                trust_forwarded_for: parse_env("TRUST_FORWARDED_FOR", Some("false"), is_prod)?,
                eviction_interval_seconds: parse_env(
                    "RATE_LIMIT_EVICTION_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every login fail or succeed.
    pub fn validate(&self) -> Result<(), AppError> {
        let threshold = self.recognition.match_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MATCH_DISTANCE_THRESHOLD must be a positive number, got {}",
                threshold
            )));
        }

        let confidence = self.recognition.min_detection_confidence;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MIN_DETECTION_CONFIDENCE must be within [0, 1], got {}",
                confidence
            )));
        }

        if self.security.max_body_bytes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "MAX_BODY_BYTES must be greater than zero"
            )));
        }

        Ok(())
    }
}
