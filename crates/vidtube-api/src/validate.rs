use uuid::Uuid;

use crate::error::ApiError;

pub fn parse_id(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {field}")))
}

/// Ownership check for mutations.
pub fn ensure_owner(owner_id: Uuid, caller: Uuid, what: &str) -> Result<(), ApiError> {
    if owner_id != caller {
        return Err(ApiError::forbidden(format!("You are not the owner of this {what}")));
    }
    Ok(())
}

/// Collects "field is required" errors for a request body.
#[derive(Debug, Default)]
pub struct Required {
    missing: Vec<String>,
}

impl Required {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value unchanged when it has non-whitespace content.
    pub fn take(&mut self, field: &str, value: Option<String>) -> String {
        match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                self.missing.push(format!("{field} is required"));
                String::new()
            }
        }
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.missing.is_empty() {
            return Ok(());
        }
        Err(ApiError::bad_request("All fields are required").with_errors(self.missing))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn parse_id_rejects_garbage_with_400() {
        let err = parse_id("not-a-uuid", "videoId").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid videoId");

        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "videoId").unwrap(), id);
    }

    #[test]
    fn ownership_mismatch_is_forbidden() {
        let owner = Uuid::new_v4();
        assert!(ensure_owner(owner, owner, "video").is_ok());
        let err = ensure_owner(owner, Uuid::new_v4(), "video").unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn required_lists_every_blank_field() {
        let mut required = Required::new();
        assert_eq!(required.take("title", Some("Intro".into())), "Intro");
        required.take("description", Some("   ".into()));
        required.take("thumbnail", None);

        let err = required.finish().unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            err.errors,
            vec!["description is required", "thumbnail is required"]
        );
    }
}
