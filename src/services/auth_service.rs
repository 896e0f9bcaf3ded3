use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServiceError;

/// Claims carried by bearer tokens issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User identifier.
    pub id: String,
    /// Email of the user, when the issuer includes it.
    #[serde(default)]
    pub email: Option<String>,
    /// Expiry as a Unix timestamp.
    pub exp: u64,
}

/// Verified caller attached to authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// User identifier from the token.
    pub id: String,
    /// Email from the token, if any.
    pub email: Option<String>,
}

/// HS256 bearer token verifier built once from the configured secret.
pub struct TokenVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl TokenVerifier {
    /// An empty secret yields a verifier that rejects every token.
    pub fn new(secret: &str) -> Self {
        let key = (!secret.is_empty()).then(|| DecodingKey::from_secret(secret.as_bytes()));
        Self {
            key,
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Validate the raw `Authorization` header value and extract the caller.
    pub fn verify_header(&self, header: Option<&str>) -> Result<AuthUser, ServiceError> {
        let header = header
            .ok_or_else(|| ServiceError::Unauthenticated("No token, authorization denied.".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Unauthenticated("No token, authorization denied.".into()))?;
        self.verify(token)
    }

    /// Decode and check a bare token.
    pub fn verify(&self, token: &str) -> Result<AuthUser, ServiceError> {
        let Some(key) = self.key.as_ref() else {
            return Err(ServiceError::Unauthenticated("Token is not valid.".into()));
        };

        let data = decode::<Claims>(token, key, &self.validation).map_err(|err| {
            debug!(error = %err, "rejected bearer token");
            ServiceError::Unauthenticated("Token is not valid.".into())
        })?;

        if data.claims.id.is_empty() {
            return Err(ServiceError::Unauthenticated("Token is not valid.".into()));
        }

        Ok(AuthUser {
            id: data.claims.id,
            email: data.claims.email,
        })
    }
}

/// Sign a token for `user_id`; used by the test suites to stand in for the identity service.
#[cfg(test)]
pub fn issue_test_token(secret: &str, user_id: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use std::time::{SystemTime, UNIX_EPOCH};

    let exp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
        + 3600;
    let claims = Claims {
        id: user_id.to_owned(),
        email: Some(format!("{user_id}@example.com")),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn valid_token_yields_caller() {
        let verifier = TokenVerifier::new(SECRET);
        let token = issue_test_token(SECRET, "u1");
        let user = verifier
            .verify_header(Some(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("u1@example.com"));
    }

    #[test]
    fn missing_or_foreign_tokens_are_rejected() {
        let verifier = TokenVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify_header(None),
            Err(ServiceError::Unauthenticated(_))
        ));
        assert!(matches!(
            verifier.verify_header(Some("Basic abc")),
            Err(ServiceError::Unauthenticated(_))
        ));

        let foreign = issue_test_token("other-secret", "u1");
        assert!(verifier.verify(&foreign).is_err());
    }

    #[test]
    fn empty_secret_rejects_everything() {
        let verifier = TokenVerifier::new("");
        let token = issue_test_token("", "u1");
        assert!(verifier.verify(&token).is_err());
    }
}
