//! The authentication provider is an external collaborator (spec.md §1):
//! it supplies `{viewerId, role}` per request. This extractor reads that
//! identity off request extensions, the way `acton_service::session`'s
//! `TypedSession` reads session state off a request-scoped store, with a
//! non-production bypass header for local development and tests.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    config::Environment,
    error::AppError,
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "super_admin" => Role::SuperAdmin,
            _ => Role::User,
        }
    }

    pub fn may_revise_any(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// Identity supplied by the upstream auth collaborator.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: String,
    pub role: Role,
}

const TEST_USER_HEADER: &str = "x-test-user-id";

impl<S> FromRequestParts<S> for Viewer
where
    AppState: axum::extract::FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        if let Some(ext) = parts.extensions.get::<Viewer>() {
            return Ok(ext.clone());
        }

        if !app_state.config.service.environment.is_production() {
            if let Some(header) = parts.headers.get(TEST_USER_HEADER) {
                let user_id = header
                    .to_str()
                    .map_err(|_| AppError::Unauthorized)?
                    .to_string();
                return Ok(Viewer {
                    user_id,
                    role: Role::User,
                });
            }
        }

        Err(AppError::Unauthorized)
    }
}

#[allow(dead_code)]
fn environment_allows_bypass(env: Environment) -> bool {
    !env.is_production()
}
