//! Opaque keyset cursor for `GET /home`.
//!
//! `acton_service::pagination` re-exports `paginator-rs`, whose `Cursor`
//! type is single-field oriented. The home feed orders by
//! `(createdAt desc, id desc)`, a composite key, so rather than contort
//! that generic cursor this is a small purpose-built type (see DESIGN.md).

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HomeCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl HomeCursor {
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("HomeCursor always serializes");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(s: &str) -> AppResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| AppError::Validation(format!("invalid cursor: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Validation(format!("invalid cursor: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cursor = HomeCursor {
            created_at: Utc::now(),
            id: "assertion_abc".into(),
        };
        let encoded = cursor.encode();
        let decoded = HomeCursor::decode(&encoded).unwrap();
        assert_eq!(decoded.id, cursor.id);
    }

    #[test]
    fn rejects_garbage() {
        assert!(HomeCursor::decode("not-a-cursor!!").is_err());
    }
}
