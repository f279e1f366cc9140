//! Shared harness for face-auth-service integration tests.
//!
//! Builds the full router over an in-memory user store and the mock encoder,
//! and generates PNG test images at runtime.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use face_auth_service::{
    build_router,
    config::{
        EncoderBackend, Environment, FaceAuthConfig, MongoConfig, RateLimitConfig,
        RecognitionConfig, SecurityConfig,
    },
    services::{FaceEncoder, MockFaceEncoder, MockUserStore, UserStore},
    AppState,
};
use http_body_util::BodyExt;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MockUserStore>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: FaceAuthConfig) -> Self {
        let store = Arc::new(MockUserStore::new());
        let encoder: Arc<dyn FaceEncoder> = Arc::new(MockFaceEncoder::new());
        let state = AppState::new(config, store.clone() as Arc<dyn UserStore>, encoder);
        let router = build_router(state).expect("Failed to build router");
        Self { router, store }
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
        self.post_raw(uri, body.to_string(), "10.0.0.1").await
    }

    /// POST from the socket peer `client_ip`.
    pub async fn post_raw(&self, uri: &str, body: String, client_ip: &str) -> Response {
        self.post_with_headers(uri, body, client_ip, None).await
    }

    /// POST from socket peer `peer_ip`, claiming `forwarded_for` in `x-forwarded-for`.
    pub async fn post_forwarded(
        &self,
        uri: &str,
        body: String,
        peer_ip: &str,
        forwarded_for: &str,
    ) -> Response {
        self.post_with_headers(uri, body, peer_ip, Some(forwarded_for)).await
    }

    async fn post_with_headers(
        &self,
        uri: &str,
        body: String,
        peer_ip: &str,
        forwarded_for: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .extension(peer(peer_ip));
        if let Some(value) = forwarded_for {
            builder = builder.header("x-forwarded-for", value);
        }

        self.router
            .clone()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .extension(peer("10.0.0.1"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    /// Sign up a user with the given face and assert success.
    pub async fn signup(&self, email: &str, role: &str, image: String) {
        let res = self.post_json("/signup", signup_body(email, role, image)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
    }
}

fn peer(ip: &str) -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::new(ip.parse().unwrap(), 40000))
}

pub fn test_config() -> FaceAuthConfig {
    FaceAuthConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "face-auth-service-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "face_auth_test".to_string(),
        },
        recognition: RecognitionConfig {
            backend: EncoderBackend::Mock,
            model_dir: PathBuf::from("models"),
            detector_model: "det_10g.onnx".to_string(),
            recognizer_model: "w600k_r50.onnx".to_string(),
            match_threshold: 1.0,
            min_detection_confidence: 0.5,
        },
        security: SecurityConfig {
            allowed_origins: vec!["*".to_string()],
            max_body_bytes: 1024 * 1024,
        },
        rate_limit: RateLimitConfig {
            signup_attempts: 100,
            signup_window_seconds: 60,
            login_attempts: 100,
            login_window_seconds: 60,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
            trust_forwarded_for: false,
            eviction_interval_seconds: 60,
        },
    }
}

pub fn signup_body(email: &str, role: &str, image: String) -> serde_json::Value {
    serde_json::json!({
        "name": "Ada Lovelace",
        "age": 36,
        "email": email,
        "role": role,
        "image": image,
    })
}

pub fn login_body(email: &str, image: String) -> serde_json::Value {
    serde_json::json!({ "email": email, "image": image })
}

pub async fn body_json(res: Response) -> serde_json::Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn encode_png(img: GrayImage) -> String {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    STANDARD.encode(buf.into_inner())
}

/// Left-to-right gradient.
pub fn face_a() -> String {
    encode_png(GrayImage::from_fn(64, 64, |x, _| Luma([(x * 3) as u8])))
}

/// Same pattern as [`face_a`] under brighter lighting.
pub fn face_a_brighter() -> String {
    encode_png(GrayImage::from_fn(64, 64, |x, _| Luma([(x * 3) as u8 + 30])))
}

/// Top-to-bottom gradient; far from [`face_a`].
pub fn face_b() -> String {
    encode_png(GrayImage::from_fn(64, 64, |_, y| Luma([(y * 3) as u8])))
}

/// No contrast at all; the encoder finds no face.
pub fn blank_image() -> String {
    encode_png(GrayImage::from_pixel(64, 64, Luma([90])))
}
