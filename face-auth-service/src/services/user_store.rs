use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::error::ServiceError;
use crate::models::User;

/// Persistence for user accounts, keyed by normalised email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError>;

    /// Store a new user. Fails with [`ServiceError::UserAlreadyExists`] when
    /// the email is taken.
    async fn insert(&self, user: &User) -> Result<(), ServiceError>;
}

/// In-memory store for tests and local runs without MongoDB.
pub struct MockUserStore {
    pub users: Mutex<HashMap<String, User>>,
    unavailable: AtomicBool,
}

impl Default for MockUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUserStore {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.users.lock().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::Internal(anyhow::anyhow!("Mock user store unavailable")));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, User>>, ServiceError> {
        self.users
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock user store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl UserStore for MockUserStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.check_available()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        self.check_available()?;
        Ok(self.lock()?.get(email).cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), ServiceError> {
        self.check_available()?;
        let mut users = self.lock()?;
        if users.contains_key(&user.email) {
            return Err(ServiceError::UserAlreadyExists);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }
}
