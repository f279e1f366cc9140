use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

#[derive(Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(custom(function = "not_blank", message = "Name is required"))]
    #[schema(example = "Ada Lovelace")]
    pub name: String,

    #[serde(deserialize_with = "deserialize_age")]
    #[validate(range(min = 1, max = 150, message = "Age must be between 1 and 150"))]
    #[schema(example = 36, value_type = u32)]
    pub age: u32,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,

    #[validate(custom(function = "not_blank", message = "Role is required"))]
    #[schema(example = "admin")]
    pub role: String,

    /// Base64 image, optionally as a `data:image/...;base64,` URL.
    #[validate(custom(function = "not_blank", message = "Image is required"))]
    #[schema(example = "data:image/jpeg;base64,/9j/4AAQSkZJRg...")]
    pub image: String,
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("name", &self.name)
            .field("age", &self.age)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("image_len", &self.image.len())
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    #[schema(example = "User registered successfully")]
    pub message: String,
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub user_id: String,
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "ada@example.com")]
    pub email: String,

    #[validate(custom(function = "not_blank", message = "Image is required"))]
    #[schema(example = "data:image/jpeg;base64,/9j/4AAQSkZJRg...")]
    pub image: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("image_len", &self.image.len())
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    #[schema(example = "Login successful")]
    pub message: String,
    #[schema(example = "admin")]
    pub role: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Accept the age either as a JSON number or as a numeric string (HTML form inputs).
fn deserialize_age<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Age {
        Number(u32),
        Text(String),
    }

    match Age::deserialize(deserializer)? {
        Age::Number(n) => Ok(n),
        Age::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| serde::de::Error::custom(format!("invalid age: {:?}", s))),
    }
}
