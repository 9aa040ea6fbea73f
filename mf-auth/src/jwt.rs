use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use mf_core::{MfError, MfResult};
use serde::Deserialize;

/// The only claim the orchestration core consumes: who is making the
/// request. Everything else in the token belongs to the Auth Provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject: String,
}

/// Verifies a bearer token and extracts its `subject` claim. The core
/// never issues tokens, only consumes them.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> MfResult<Claims>;
}

/// HMAC-signed JWT verification. The upstream authorizer and this service
/// share the signing secret out of band.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(hmac_secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Self { decoding_key: DecodingKey::from_secret(hmac_secret), validation }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> MfResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| MfError::ownership("invalid or expired credentials").with_source(e))?;
        Ok(data.claims)
    }
}

/// Test/local-dev verifier: treats the raw token string as the subject,
/// with no signature check. Never wired into `mediaforge-gateway` outside
/// of its dev-mode config flag.
pub struct InsecureTestVerifier;

#[async_trait]
impl TokenVerifier for InsecureTestVerifier {
    async fn verify(&self, token: &str) -> MfResult<Claims> {
        if token.trim().is_empty() {
            return Err(MfError::ownership("empty token"));
        }
        Ok(Claims { subject: token.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct SignClaims<'a> {
        sub: &'a str,
        exp: i64,
    }

    #[tokio::test]
    async fn verifies_hmac_signed_token_and_extracts_subject() {
        let secret = b"test-secret";
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = encode(&Header::new(Algorithm::HS256), &SignClaims { sub: "user-1", exp }, &EncodingKey::from_secret(secret))
            .unwrap();

        let verifier = JwtVerifier::new(secret);
        let claims = verifier.verify(&token).await.unwrap();
        assert_eq!(claims.subject, "user-1");
    }

    #[tokio::test]
    async fn rejects_token_signed_with_wrong_secret() {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let token = encode(
            &Header::new(Algorithm::HS256),
            &SignClaims { sub: "user-1", exp },
            &EncodingKey::from_secret(b"wrong-secret"),
        )
        .unwrap();

        let verifier = JwtVerifier::new(b"test-secret");
        assert!(verifier.verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let secret = b"test-secret";
        let exp = (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp();
        let token = encode(&Header::new(Algorithm::HS256), &SignClaims { sub: "user-1", exp }, &EncodingKey::from_secret(secret))
            .unwrap();

        let verifier = JwtVerifier::new(secret);
        assert!(verifier.verify(&token).await.is_err());
    }
}
