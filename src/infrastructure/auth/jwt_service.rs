use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Caller identity issued by the platform's auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub exp: usize,
    pub iat: usize,
}

/// Verifies identity tokens with the secret shared with the auth service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expires_in_seconds: usize,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expires_in_seconds: 24 * 60 * 60,
        }
    }

    /// Issue a token. Production tokens come from the auth service; this is
    /// for tooling and tests sharing the secret.
    pub fn sign(&self, user_id: &str, username: &str) -> Result<String, JwtError> {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            exp: now + self.expires_in_seconds,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Sign(e.to_string()))
    }

    /// Verify and decode a token
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let validation = Validation::default();
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::Invalid,
                _ => JwtError::Verify(e.to_string()),
            })
    }
}

/// JWT error types
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to sign token: {0}")]
    Sign(String),
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Failed to verify token: {0}")]
    Verify(String),
}
