//! Access token issuing and verification.
//!
//! Keys are derived once from the configured secret and shared with handlers
//! as `web::Data<JwtKeys>`.

use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use super::model::{AuthContext, Claims};

const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;
pub const ACCESS_TOKEN_TYPE: &str = "access";

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue an access token for a context (used by the identity service and tests).
    pub fn issue(&self, ctx: &AuthContext) -> Result<String, JwtError> {
        let iat = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: ctx.user_id,
            company_id: ctx.company_id,
            permissions: ctx.permissions.clone(),
            exp: iat + ACCESS_TOKEN_TTL_SECS as usize,
            iat,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Check signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding, &Validation::default()).map(|data| data.claims)
    }
}
