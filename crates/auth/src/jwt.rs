use crate::error::{AuthError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HS256 keys shorter than this are refused
pub const MIN_KEY_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub key: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "visor".to_string(),
            audience: "visor-clients".to_string(),
            key: String::new(),
            access_token_minutes: 60,
            refresh_token_days: 7,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // User ID
    pub email: String,
    pub roles: Vec<String>, // Role names at issue time
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidToken("Invalid user ID".to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl JwtService {
    pub fn new(config: &JwtConfig) -> Result<Self> {
        if config.key.len() < MIN_KEY_BYTES {
            return Err(AuthError::ConfigurationError(format!(
                "jwt.key must be at least {} bytes",
                MIN_KEY_BYTES
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.key.as_bytes()),
            algorithm: Algorithm::HS256,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl: Duration::minutes(config.access_token_minutes),
            refresh_token_ttl: Duration::days(config.refresh_token_days),
        })
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        roles: &[String],
        token_type: TokenType,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            roles: roles.to_vec(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)?;
        Ok(token)
    }

    pub fn generate_access_token(&self, user_id: Uuid, email: &str, roles: &[String]) -> Result<String> {
        self.issue(user_id, email, roles, TokenType::Access, self.access_token_ttl)
    }

    /// Refresh tokens carry no roles; they are re-read on rotation
    pub fn generate_refresh_token(&self, user_id: Uuid, email: &str) -> Result<String> {
        self.issue(user_id, email, &[], TokenType::Refresh, self.refresh_token_ttl)
    }

    pub fn generate_token_pair(&self, user_id: Uuid, email: &str, roles: &[String]) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.generate_access_token(user_id, email, roles)?,
            refresh_token: self.generate_refresh_token(user_id, email)?,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl.num_seconds(),
        })
    }

    /// Validate signature, issuer, audience and lifetime
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;

        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken(
                "Token is not an access token".to_string(),
            ));
        }

        Ok(claims)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;

        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken(
                "Token is not a refresh token".to_string(),
            ));
        }

        Ok(claims)
    }
}

/// Generate a SHA256 hash of a token (for storing in database)
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// 32 random bytes, hex-encoded
pub fn generate_secure_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
