use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::Role;

/// JWT claims carried by every authenticated request
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Role granted by the identity provider
    #[serde(default)]
    pub role: Role,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates new claims for a user
    ///
    /// # Arguments
    /// * `user_id` - The user's ID
    /// * `role` - The user's role
    /// * `expiration_hours` - Token validity duration in hours
    pub fn new(user_id: i32, role: Role, expiration_hours: i64) -> Self {
        let now = Timestamp::now();
        let exp = now.as_second() + SignedDuration::from_hours(expiration_hours).as_secs();

        Self {
            sub: user_id.to_string(),
            role,
            iat: now.as_second(),
            exp,
        }
    }

    /// Parses the subject back into a user ID
    pub fn user_id(&self) -> AppResult<i32> {
        self.sub
            .parse::<i32>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Invalid user ID in token".to_string(),
            })
    }
}

/// Generates a signed access token.
///
/// The service never hands tokens to end users; this is used by tests and
/// by operators minting tokens for trusted callers.
///
/// # Example
/// ```ignore
/// let token = generate_access_token(1, Role::Admin, "secret", 1)?;
/// ```
pub fn generate_access_token(
    user_id: i32,
    role: Role,
    secret: &str,
    expiration_hours: i64,
) -> AppResult<String> {
    let claims = Claims::new(user_id, role, expiration_hours);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal {
        source: anyhow::anyhow!("Failed to generate JWT token: {}", e),
    })
}

/// Validates and decodes an access token
///
/// # Returns
/// The decoded claims if the signature and expiry check out
pub fn validate_access_token(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthorized {
            message: "Token has expired".to_string(),
        },
        jsonwebtoken::errors::ErrorKind::InvalidToken => AppError::Unauthorized {
            message: "Invalid token".to_string(),
        },
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AppError::Unauthorized {
            message: "Invalid token signature".to_string(),
        },
        _ => AppError::Unauthorized {
            message: format!("Token validation failed: {}", e),
        },
    })
}
