//! HTTP authentication for public tunnel ingress
//!
//! A tunnel may declare a credential that every public request must present
//! verbatim in its `Authorization` header. The comparison is byte-for-byte:
//! no scheme parsing, no base64 decoding, no case folding. A tunnel with an
//! empty credential is public.
//!
//! # Usage
//!
//! ```
//! use ingress_http_auth::{AuthResult, HttpAuthenticator};
//!
//! let auth = HttpAuthenticator::from_credential("Basic dXNlcjpwYXNz");
//! assert!(auth.requires_auth());
//!
//! match auth.authenticate(Some(b"Basic dXNlcjpwYXNz".as_slice())) {
//!     AuthResult::Authenticated => { /* hand off */ }
//!     AuthResult::Unauthorized(_response) => unreachable!(),
//! }
//! ```

mod credential;

pub use credential::ExactCredentialProvider;

/// Realm advertised in the `WWW-Authenticate` challenge
pub const DEFAULT_REALM: &str = "ngrok";

/// Fixed body of the 401 response (23 bytes)
pub const NOT_AUTHORIZED_BODY: &str = "Authorization required\n";

/// Authentication result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// No auth required, or the credential matched
    Authenticated,
    /// Credential missing or wrong; carries the complete 401 response bytes
    Unauthorized(Vec<u8>),
}

/// Trait for tunnel authentication providers
///
/// Providers are stateless: each call to `authenticate` stands alone.
pub trait HttpAuthProvider: Send + Sync {
    /// Check the request's `Authorization` value (`None` if absent)
    fn authenticate(&self, authorization: Option<&[u8]>) -> AuthResult;

    /// The 401 response for this provider
    fn unauthorized_response(&self) -> Vec<u8>;

    /// Authentication type name (for logging)
    fn auth_type(&self) -> &'static str;
}

/// Build the HTTP/1.0 401 response with a Basic challenge for `realm`
pub fn not_authorized_response(realm: &str) -> Vec<u8> {
    let realm_escaped = realm.replace('"', "\\\"");
    format!(
        "HTTP/1.0 401 Not Authorized\r\n\
         WWW-Authenticate: Basic realm=\"{}\"\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        realm_escaped,
        NOT_AUTHORIZED_BODY.len(),
        NOT_AUTHORIZED_BODY
    )
    .into_bytes()
}

/// No-op provider for public tunnels
pub struct NoAuthProvider;

impl HttpAuthProvider for NoAuthProvider {
    fn authenticate(&self, _authorization: Option<&[u8]>) -> AuthResult {
        AuthResult::Authenticated
    }

    fn unauthorized_response(&self) -> Vec<u8> {
        not_authorized_response(DEFAULT_REALM)
    }

    fn auth_type(&self) -> &'static str {
        "none"
    }
}

/// Authenticator wrapping whichever provider a tunnel needs
pub struct HttpAuthenticator {
    provider: Box<dyn HttpAuthProvider>,
}

impl HttpAuthenticator {
    /// Authenticator for a tunnel's declared credential (empty = public)
    pub fn from_credential(credential: &str) -> Self {
        let provider: Box<dyn HttpAuthProvider> = if credential.is_empty() {
            Box::new(NoAuthProvider)
        } else {
            Box::new(ExactCredentialProvider::new(credential))
        };

        Self { provider }
    }

    pub fn authenticate(&self, authorization: Option<&[u8]>) -> AuthResult {
        self.provider.authenticate(authorization)
    }

    pub fn auth_type(&self) -> &'static str {
        self.provider.auth_type()
    }

    pub fn requires_auth(&self) -> bool {
        self.provider.auth_type() != "none"
    }
}

impl Default for HttpAuthenticator {
    fn default() -> Self {
        Self {
            provider: Box::new(NoAuthProvider),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_auth_provider_always_authenticates() {
        let provider = NoAuthProvider;
        assert_eq!(provider.authenticate(None), AuthResult::Authenticated);
        assert_eq!(
            provider.authenticate(Some(b"anything".as_slice())),
            AuthResult::Authenticated
        );
    }

    #[test]
    fn test_authenticator_from_empty_credential() {
        let auth = HttpAuthenticator::from_credential("");
        assert_eq!(auth.auth_type(), "none");
        assert!(!auth.requires_auth());
        assert!(!HttpAuthenticator::default().requires_auth());
    }

    #[test]
    fn test_not_authorized_response_layout() {
        let response = String::from_utf8(not_authorized_response(DEFAULT_REALM)).unwrap();
        assert_eq!(
            response,
            "HTTP/1.0 401 Not Authorized\r\n\
             WWW-Authenticate: Basic realm=\"ngrok\"\r\n\
             Content-Length: 23\r\n\
             \r\n\
             Authorization required\n"
        );
        assert_eq!(NOT_AUTHORIZED_BODY.len(), 23);
    }

    #[test]
    fn test_realm_quotes_are_escaped() {
        let response = String::from_utf8(not_authorized_response("my \"app\"")).unwrap();
        assert!(response.contains("realm=\"my \\\"app\\\"\""));
    }
}
