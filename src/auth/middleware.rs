use actix_web::{web, HttpRequest};

use super::jwt::{JwtKeys, ACCESS_TOKEN_TYPE};
use super::model::{AuthContext, Permission};
use crate::error::ReportError;

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Validate the bearer token and return the caller's context
pub fn validate_request_token(req: &HttpRequest) -> Result<AuthContext, ReportError> {
    let token = extract_token(req)
        .ok_or_else(|| ReportError::Unauthorized("Missing authorization token".to_string()))?;

    let keys = req.app_data::<web::Data<JwtKeys>>().ok_or_else(|| {
        log::error!("JwtKeys not registered as app data");
        ReportError::Internal("token keys not configured".to_string())
    })?;

    let claims = keys.verify(token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        ReportError::Unauthorized("Invalid or expired token".to_string())
    })?;

    if claims.token_type != ACCESS_TOKEN_TYPE {
        return Err(ReportError::Unauthorized("Invalid token type".to_string()));
    }

    Ok(claims.into())
}

/// Validate the token and check one named capability
pub fn require_permission(
    req: &HttpRequest,
    permission: Permission,
) -> Result<AuthContext, ReportError> {
    let ctx = validate_request_token(req)?;
    if !ctx.has(permission) {
        log::warn!(
            "User {} of company {} lacks permission {}",
            ctx.user_id,
            ctx.company_id,
            permission.as_str()
        );
        return Err(ReportError::Forbidden(format!(
            "Missing permission: {}",
            permission.as_str()
        )));
    }
    Ok(ctx)
}
