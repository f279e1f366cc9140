//! User account: identity fields plus the face descriptors that stand in for a password.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FaceDescriptor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub name: String,
    pub age: u32,
    /// Normalised (trimmed, lowercase); unique across the collection.
    pub email: String,
    pub role: String,
    pub descriptors: Vec<FaceDescriptor>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a freshly signed-up user holding exactly one descriptor.
    pub fn new(
        name: String,
        age: u32,
        email: String,
        role: String,
        descriptor: FaceDescriptor,
    ) -> Self {
        Self {
            id: None,
            user_id: Uuid::new_v4().to_string(),
            name,
            age,
            email: normalize_email(&email),
            role,
            descriptors: vec![descriptor],
            created_utc: Utc::now(),
        }
    }
}

/// Canonical form used for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
