use axum::{extract::FromRequestParts, http::request::Parts};

use crate::core::error::AppError;
use crate::shared::lifecycle::Actor;

/// Operator authenticated by the admin basic-auth middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub username: String,
}

impl AdminIdentity {
    /// The actor recorded for transitions this operator triggers
    pub fn actor(&self) -> Actor {
        Actor::Admin {
            username: self.username.clone(),
        }
    }
}

impl<S> FromRequestParts<S> for AdminIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Admin authentication required".to_string()))
    }
}
