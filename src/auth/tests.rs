//! Unit tests for authentication and PIN checks

#[cfg(test)]
mod tests {
    use crate::auth::jwt::JwtKeys;
    use crate::auth::middleware::{require_permission, validate_request_token};
    use crate::auth::model::{AuthContext, Permission};
    use crate::auth::pin::{pin_length_ok, verify_pin};
    use crate::error::ReportError;
    use actix_web::test::TestRequest;
    use actix_web::web;

    fn keys() -> JwtKeys {
        JwtKeys::from_secret("unit-test-secret")
    }

    fn authorized(token: &str) -> actix_web::HttpRequest {
        TestRequest::default()
            .app_data(web::Data::new(keys()))
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_http_request()
    }

    fn inspector() -> AuthContext {
        AuthContext::new(7, 42, &[Permission::ViewReports, Permission::SignReports])
    }

    #[test]
    fn test_jwt_generation_and_validation() {
        let ctx = inspector();
        let token = keys().issue(&ctx).expect("Failed to generate token");
        let claims = keys().verify(&token).expect("Failed to validate token");

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.company_id, 7);
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.permissions, vec!["viewReports", "signReports"]);
    }

    #[test]
    fn test_invalid_token() {
        let result = keys().verify("invalid.token.here");
        assert!(result.is_err());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = JwtKeys::from_secret("someone-else").issue(&inspector()).unwrap();
        assert!(keys().verify(&token).is_err());
        assert!(matches!(
            validate_request_token(&authorized(&token)),
            Err(ReportError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_request_without_token_is_unauthorized() {
        let req = TestRequest::default()
            .app_data(web::Data::new(keys()))
            .to_http_request();
        assert!(matches!(
            validate_request_token(&req),
            Err(ReportError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_request_with_bearer_token_yields_context() {
        let token = keys().issue(&inspector()).unwrap();
        let req = authorized(&token);
        let ctx = validate_request_token(&req).unwrap();
        assert_eq!(ctx, inspector());
    }

    #[test]
    fn test_missing_permission_is_forbidden() {
        let token = keys().issue(&inspector()).unwrap();
        let req = authorized(&token);
        assert!(require_permission(&req, Permission::SignReports).is_ok());
        assert!(matches!(
            require_permission(&req, Permission::SendReports),
            Err(ReportError::Forbidden(_))
        ));
    }

    #[test]
    fn test_plain_pin_compared_exactly() {
        assert!(verify_pin("1234", "1234"));
        assert!(!verify_pin("1234", "0000"));
        assert!(!verify_pin("1234", "12345"));
        assert!(!verify_pin("1234", " 1234"));
    }

    #[test]
    fn test_plain_pin_rejects_prefixes_and_empty() {
        assert!(!verify_pin("123456", "1234"));
        assert!(!verify_pin("1234", ""));
        assert!(!verify_pin("", "1234"));
        assert!(verify_pin("0000000000", "0000000000"));
    }

    #[test]
    fn test_bcrypt_pin() {
        let hash = bcrypt::hash("4821", 4).unwrap();
        assert!(verify_pin(&hash, "4821"));
        assert!(!verify_pin(&hash, "0000"));
    }

    #[test]
    fn test_pin_length_bounds() {
        assert!(!pin_length_ok("123"));
        assert!(pin_length_ok("1234"));
        assert!(pin_length_ok("1234567890"));
        assert!(!pin_length_ok("12345678901"));
    }
}
