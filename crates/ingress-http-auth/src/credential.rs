//! Exact-match credential provider
//!
//! The tunnel's credential is compared against the raw `Authorization`
//! header value. Whatever scheme the tunnel owner chose (`Basic ...`,
//! `Bearer ...`, a bare token) must be sent exactly as registered.

use crate::{not_authorized_response, AuthResult, HttpAuthProvider, DEFAULT_REALM};
use subtle::ConstantTimeEq;
use tracing::debug;

pub struct ExactCredentialProvider {
    credential: Vec<u8>,
    realm: String,
}

impl ExactCredentialProvider {
    pub fn new(credential: &str) -> Self {
        Self::with_realm(credential, DEFAULT_REALM)
    }

    pub fn with_realm(credential: &str, realm: &str) -> Self {
        Self {
            credential: credential.as_bytes().to_vec(),
            realm: realm.to_string(),
        }
    }
}

impl HttpAuthProvider for ExactCredentialProvider {
    fn authenticate(&self, authorization: Option<&[u8]>) -> AuthResult {
        let Some(offered) = authorization else {
            debug!("Credential auth: no Authorization header");
            return AuthResult::Unauthorized(self.unauthorized_response());
        };

        if bool::from(offered.ct_eq(&self.credential)) {
            AuthResult::Authenticated
        } else {
            debug!("Credential auth: Authorization header does not match");
            AuthResult::Unauthorized(self.unauthorized_response())
        }
    }

    fn unauthorized_response(&self) -> Vec<u8> {
        not_authorized_response(&self.realm)
    }

    fn auth_type(&self) -> &'static str {
        "credential"
    }
}
