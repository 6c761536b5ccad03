//! Authentication for the Z.AI API
//!
//! Derives bearer headers from a validated credential. Pure; no network or
//! mutable state.

use crate::config::{ApiSettings, API_KEY_PATTERN};
use crate::error::Error;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

/// Holds the API credential and builds authorization headers.
///
/// The key is re-checked at header-build time so a handle constructed
/// outside [`Authenticator::new`] still cannot emit a malformed credential.
#[derive(Clone)]
pub struct Authenticator {
    api_key: String,
}

impl Authenticator {
    /// Create an authenticator from an API key, validating its shape
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        let api_key = api_key.into();
        validate_api_key(&api_key)?;
        Ok(Self { api_key })
    }

    /// Create an authenticator from API settings
    pub fn from_settings(settings: &ApiSettings) -> Result<Self, Error> {
        Self::new(settings.api_key.clone())
    }

    /// Build the authorization headers for an outbound request
    pub fn headers(&self) -> Result<HeaderMap, Error> {
        validate_api_key(&self.api_key)?;

        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", self.api_key);
        let value = HeaderValue::from_str(&bearer)
            .map_err(|_| Error::authentication("api key contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

// The credential must never leak through logs or debug formatting.
impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn validate_api_key(api_key: &str) -> Result<(), Error> {
    if api_key.is_empty() {
        return Err(Error::authentication("api key cannot be empty"));
    }
    if !API_KEY_PATTERN.is_match(api_key) {
        return Err(Error::authentication(
            "invalid api key format, expected zai_ prefix followed by 32 alphanumeric characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_key() -> String {
        format!("zai_{}", "x".repeat(32))
    }

    #[test]
    fn test_valid_key_accepted() {
        assert!(Authenticator::new(valid_key()).is_ok());
    }

    #[test]
    fn test_bad_key_rejected() {
        assert!(matches!(
            Authenticator::new("bad_key"),
            Err(Error::Authentication { .. })
        ));
        assert!(matches!(
            Authenticator::new(""),
            Err(Error::Authentication { .. })
        ));
        // Right prefix, wrong token length
        assert!(Authenticator::new("zai_short").is_err());
    }

    #[test]
    fn test_bearer_headers() {
        let key = valid_key();
        let auth = Authenticator::new(key.clone()).unwrap();
        let headers = auth.headers().unwrap();

        assert_eq!(
            headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            format!("Bearer {}", key)
        );
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap().to_str().unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let auth = Authenticator::new(valid_key()).unwrap();
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("zai_"));
        assert!(rendered.contains("<redacted>"));
    }
}
