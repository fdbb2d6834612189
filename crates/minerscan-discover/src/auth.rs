//! Credential tiers and digest challenge handling.
//!
//! Devices are tried with digest credentials first; plain basic credentials are
//! only sent after the digest tier was rejected on the same endpoint.

use std::fmt;

use digest_auth::AuthContext;
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};

/// One fixed username/password pair used by every tier.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Authentication tiers in try-order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTier {
    /// Challenge-response credentials.
    Digest,
    /// Plain credentials.
    Basic,
}

impl AuthTier {
    pub const ORDER: [AuthTier; 2] = [AuthTier::Digest, AuthTier::Basic];

    /// Tier to fall back to after an authentication rejection, if any.
    pub fn next(self) -> Option<AuthTier> {
        match self {
            Self::Digest => Some(Self::Basic),
            Self::Basic => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Digest => "digest",
            Self::Basic => "basic",
        }
    }
}

impl fmt::Display for AuthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first `WWW-Authenticate` value offering a digest challenge.
pub fn digest_challenge(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| {
            value
                .get(..6)
                .is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        })
}

/// Answer a digest challenge for a GET of `path`.
///
/// Returns `None` when the challenge cannot be parsed or answered; the caller
/// treats that as a rejection of the digest tier.
pub fn digest_authorization(challenge: &str, credentials: &Credentials, path: &str) -> Option<String> {
    let mut prompt = match digest_auth::parse(challenge) {
        Ok(prompt) => prompt,
        Err(e) => {
            tracing::debug!(error = ?e, "Unparseable digest challenge");
            return None;
        }
    };

    let context = AuthContext::new(
        credentials.username.as_str(),
        credentials.password.as_str(),
        path,
    );

    match prompt.respond(&context) {
        Ok(answer) => Some(answer.to_header_string()),
        Err(e) => {
            tracing::debug!(error = ?e, "Digest challenge could not be answered");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const CHALLENGE: &str =
        r#"Digest realm="antMiner Configuration", nonce="5f2b7d3c", algorithm=MD5, qop="auth""#;

    #[test]
    fn test_tier_order() {
        assert_eq!(AuthTier::ORDER[0], AuthTier::Digest);
        assert_eq!(AuthTier::Digest.next(), Some(AuthTier::Basic));
        assert_eq!(AuthTier::Basic.next(), None);
    }

    #[test]
    fn test_digest_challenge_picks_digest_value() {
        let mut headers = HeaderMap::new();
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="x""#));
        headers.append(WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
        assert_eq!(digest_challenge(&headers), Some(CHALLENGE));
    }

    #[test]
    fn test_digest_challenge_absent_for_basic_only() {
        let mut headers = HeaderMap::new();
        headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static(r#"Basic realm="x""#));
        assert_eq!(digest_challenge(&headers), None);
    }

    #[test]
    fn test_digest_authorization_answers_challenge() {
        let credentials = Credentials::new("root", "root");
        let header = digest_authorization(CHALLENGE, &credentials, "/cgi-bin/stats.cgi").unwrap();
        assert!(header.starts_with("Digest "));
        assert!(header.contains(r#"username="root""#));
        assert!(header.contains(r#"uri="/cgi-bin/stats.cgi""#));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("root", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
