use std::sync::Arc;

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, SignupRequest, SignupResponse},
    models::{user::normalize_email, FaceDescriptor, User},
    services::{
        matcher::best_match,
        metrics::{record_attempt, record_match_distance},
        recognition::{decode_image, FaceEncoder},
        ServiceError, UserStore,
    },
};

#[derive(Clone)]
pub struct FaceAuthService {
    store: Arc<dyn UserStore>,
    encoder: Arc<dyn FaceEncoder>,
    match_threshold: f32,
}

impl FaceAuthService {
    pub fn new(store: Arc<dyn UserStore>, encoder: Arc<dyn FaceEncoder>, match_threshold: f32) -> Self {
        Self {
            store,
            encoder,
            match_threshold,
        }
    }

    pub async fn signup(&self, req: SignupRequest) -> Result<SignupResponse, ServiceError> {
        let result = self.try_signup(req).await;
        record_attempt("signup", outcome_label(&result));
        result
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let result = self.try_login(req).await;
        record_attempt("login", outcome_label(&result));
        result
    }

    async fn try_signup(&self, req: SignupRequest) -> Result<SignupResponse, ServiceError> {
        let email = normalize_email(&req.email);

        if self.store.find_by_email(&email).await?.is_some() {
            tracing::info!(email = %email, "Signup rejected: email already registered");
            return Err(ServiceError::UserAlreadyExists);
        }

        let descriptor = self.describe(req.image).await.inspect_err(|e| {
            tracing::warn!(email = %email, error = %e, "Signup rejected: face not usable");
        })?;

        let user = User::new(
            req.name.trim().to_string(),
            req.age,
            email,
            req.role.trim().to_string(),
            descriptor,
        );
        self.store.insert(&user).await?;

        tracing::info!(user_id = %user.user_id, email = %user.email, "User signed up");

        Ok(SignupResponse {
            message: "User registered successfully".to_string(),
            user_id: user.user_id,
        })
    }

    async fn try_login(&self, req: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let email = normalize_email(&req.email);

        let user = self.store.find_by_email(&email).await?.ok_or_else(|| {
            tracing::info!(email = %email, "Login rejected: unknown user");
            ServiceError::UserNotFound
        })?;

        let probe = self.describe(req.image).await.inspect_err(|e| {
            tracing::warn!(email = %email, error = %e, "Login rejected: face not usable");
        })?;

        let outcome = best_match(&probe, &user.descriptors, self.match_threshold);
        if let Some(distance) = outcome.distance {
            record_match_distance(distance);
        }

        if !outcome.matched {
            tracing::info!(
                email = %email,
                distance = ?outcome.distance,
                threshold = self.match_threshold,
                "Login rejected: face does not match"
            );
            return Err(ServiceError::FaceNotRecognized);
        }

        tracing::info!(
            user_id = %user.user_id,
            distance = ?outcome.distance,
            "User logged in"
        );

        Ok(LoginResponse {
            message: "Login successful".to_string(),
            role: user.role,
        })
    }

    /// Decode off the async runtime, then run the encoder.
    async fn describe(&self, image: String) -> Result<FaceDescriptor, ServiceError> {
        let frame = tokio::task::spawn_blocking(move || decode_image(&image))
            .await
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Image decode task failed: {}", e)))??;

        Ok(self.encoder.describe(frame).await?)
    }
}

fn outcome_label<T>(result: &Result<T, ServiceError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ServiceError::UserAlreadyExists) => "duplicate_email",
        Err(ServiceError::UserNotFound) => "unknown_user",
        Err(ServiceError::FaceNotRecognized) => "no_match",
        Err(ServiceError::InvalidImage(_)) => "invalid_input",
        Err(ServiceError::NoFaceDetected) => "no_face",
        Err(_) => "error",
    }
}
