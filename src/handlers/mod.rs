use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

use crate::utils::error::AppError;
use crate::utils::response::success;

pub mod events;
pub mod locations;

/// The requesting actor, resolved by the external auth layer and passed in
/// via headers. Absent headers mean an anonymous request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor {
    pub profile_id: Option<Uuid>,
    pub is_privileged: bool,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let profile_id = match parts.headers.get("x-profile-id") {
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| AppError::Validation("Invalid x-profile-id header".into()))?;
                Some(
                    raw.parse::<Uuid>()
                        .map_err(|_| AppError::Validation("Invalid x-profile-id header".into()))?,
                )
            }
            None => None,
        };

        let is_privileged = parts
            .headers
            .get("x-profile-role")
            .and_then(|v| v.to_str().ok())
            .map(|role| role.eq_ignore_ascii_case("admin"))
            .unwrap_or(false);

        Ok(Actor {
            profile_id,
            is_privileged,
        })
    }
}

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "commons-api",
    };

    success(payload, "Health check successful").into_response()
}
