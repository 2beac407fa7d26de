//! Composer State Object: the canonical structural input to publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionType {
    Moment,
    Note,
    Article,
    Artifact,
    Response,
    Curation,
    Tombstone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Followers,
    Unlisted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub url: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// A reference to another assertion or external resource. Strings in
/// `refs` are rejected at the HTTP boundary — refs are always objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionRef {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsoMeta {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The canonical in-memory form of a publishable assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cso {
    pub assertion_type: AssertionType,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    pub visibility: Visibility,
    #[serde(default)]
    pub media: Vec<MediaDescriptor>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub refs: Vec<AssertionRef>,
    pub meta: CsoMeta,
}

impl Cso {
    /// Build a CSO, stamping `meta` and normalizing collection fields.
    /// `assertion_type` / `visibility` are already-parsed enums by this
    /// point — invalid wire values are rejected by serde during
    /// deserialization of the HTTP request body before a `Cso` exists.
    pub fn new(
        assertion_type: AssertionType,
        text: String,
        title: Option<String>,
        visibility: Visibility,
        media: Vec<MediaDescriptor>,
        topics: Vec<String>,
        mentions: Vec<String>,
        refs: Vec<AssertionRef>,
    ) -> Self {
        let now = Utc::now();
        Self {
            assertion_type,
            text,
            title,
            visibility,
            media,
            topics,
            mentions,
            refs,
            meta: CsoMeta {
                created_at: now,
                updated_at: now,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorCode {
    ErrEmptyAssertion,
    ErrResponseNoTarget,
    ErrInvalidRefShape,
    ErrCurationEmpty,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<ValidationErrorCode>,
    pub warnings: Vec<String>,
}

impl Cso {
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        let has_text = !self.text.trim().is_empty();
        let has_media = !self.media.is_empty();

        if !has_text && !has_media {
            errors.push(ValidationErrorCode::ErrEmptyAssertion);
        }

        match self.assertion_type {
            AssertionType::Response => {
                if self.refs.is_empty() {
                    errors.push(ValidationErrorCode::ErrResponseNoTarget);
                } else if self.refs.iter().any(|r| r.uri.trim().is_empty()) {
                    errors.push(ValidationErrorCode::ErrInvalidRefShape);
                }
            }
            AssertionType::Curation => {
                if self.refs.is_empty() && self.media.is_empty() {
                    errors.push(ValidationErrorCode::ErrCurationEmpty);
                }
            }
            _ => {}
        }

        ValidationReport {
            ok: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(assertion_type: AssertionType) -> Cso {
        Cso::new(
            assertion_type,
            String::new(),
            None,
            Visibility::Public,
            vec![],
            vec![],
            vec![],
            vec![],
        )
    }

    #[test]
    fn empty_moment_fails() {
        let cso = base(AssertionType::Moment);
        let report = cso.validate();
        assert!(!report.ok);
        assert_eq!(report.errors, vec![ValidationErrorCode::ErrEmptyAssertion]);
    }

    #[test]
    fn moment_with_text_passes() {
        let mut cso = base(AssertionType::Moment);
        cso.text = "hello".into();
        assert!(cso.validate().ok);
    }

    #[test]
    fn response_without_refs_fails() {
        let mut cso = base(AssertionType::Response);
        cso.text = "a reply".into();
        let report = cso.validate();
        assert_eq!(
            report.errors,
            vec![ValidationErrorCode::ErrResponseNoTarget]
        );
    }

    #[test]
    fn response_with_blank_ref_uri_fails() {
        let mut cso = base(AssertionType::Response);
        cso.text = "a reply".into();
        cso.refs = vec![AssertionRef { uri: "   ".into() }];
        let report = cso.validate();
        assert_eq!(report.errors, vec![ValidationErrorCode::ErrInvalidRefShape]);
    }

    #[test]
    fn curation_needs_refs_or_media() {
        let cso = base(AssertionType::Curation);
        let report = cso.validate();
        assert!(report
            .errors
            .contains(&ValidationErrorCode::ErrCurationEmpty));
    }

    #[test]
    fn curation_with_media_passes() {
        let mut cso = base(AssertionType::Curation);
        cso.media = vec![MediaDescriptor {
            url: "https://example.com/x.png".into(),
            kind: None,
        }];
        assert!(cso.validate().ok);
    }
}
