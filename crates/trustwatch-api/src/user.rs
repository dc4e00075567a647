// crates/trustwatch-api/src/user.rs
// ============================================================================
// Module: Caller Identity
// Description: Resolves the owning user for a request.
// Purpose: Authentication/session handling is explicitly out of scope (§1);
//          this module is the seam a real auth layer would replace.
// Dependencies: axum, trustwatch-core
// ============================================================================

//! Resolves the owning user for a request.

use axum::http::HeaderMap;
use trustwatch_core::UserId;

use crate::error::ApiError;

/// Header carrying the caller's user id. A real deployment would derive this
/// from a verified session or bearer token; that verification step is out
/// of scope here (§1), so the header is trusted as given.
pub const CALLER_USER_ID_HEADER: &str = "x-trustwatch-user-id";

/// Extracts the caller's user id from the request headers.
///
/// # Errors
/// Returns [`ApiError::Validation`] when the header is missing or empty.
pub fn caller_user_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let value = headers
        .get(CALLER_USER_ID_HEADER)
        .ok_or_else(|| ApiError::Validation(format!("missing {CALLER_USER_ID_HEADER} header")))?
        .to_str()
        .map_err(|_err| ApiError::Validation(format!("{CALLER_USER_ID_HEADER} header is not valid UTF-8")))?;
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{CALLER_USER_ID_HEADER} header must not be empty")));
    }
    Ok(UserId::new(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use axum::http::HeaderMap;
    use axum::http::HeaderValue;

    use super::CALLER_USER_ID_HEADER;
    use super::caller_user_id;

    #[test]
    fn missing_header_is_rejected() {
        let headers = HeaderMap::new();
        assert!(caller_user_id(&headers).is_err());
    }

    #[test]
    fn present_header_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLER_USER_ID_HEADER, HeaderValue::from_static("user-1"));
        assert_eq!(caller_user_id(&headers).expect("header present").as_str(), "user-1");
    }
}
