use axum::http::StatusCode;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token roles issued by the identity provider
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Official,
}

impl Role {
    pub fn from_str(role: &str) -> Result<Self, String> {
        match role.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "official" => Ok(Role::Official),
            _ => Err(format!("Invalid role: {}", role)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Official => "official",
        }
    }
}

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (user ID)
    pub role: Role,  // Token role
    pub exp: usize,  // Expiration time
    pub iat: usize,  // Issued at
}

/// Validate a JWT token and extract claims
///
/// Tokens are minted by the identity provider; this service only verifies
/// the signature and expiry against the shared `JWT_SECRET`.
pub fn validate_token(token: &str) -> Result<Claims, JwtError> {
    let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| JwtError::MissingSecret)?;

    // Create a validation that explicitly checks for token expiration
    let mut validation = Validation::default();
    validation.validate_exp = true; // Explicitly validate expiration
    validation.leeway = 0; // No leeway/grace period for testing

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_e| JwtError::InvalidToken)?;

    Ok(token_data.claims)
}

#[derive(Debug)]
pub enum JwtError {
    MissingSecret,
    InvalidToken,
}

impl fmt::Display for JwtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JwtError::MissingSecret => write!(f, "JWT secret is missing or not set"),
            JwtError::InvalidToken => write!(f, "Invalid or expired JWT token"),
        }
    }
}

impl From<JwtError> for StatusCode {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::MissingSecret => StatusCode::INTERNAL_SERVER_ERROR,
            JwtError::InvalidToken => StatusCode::UNAUTHORIZED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::env;
    use std::thread;
    use uuid::Uuid;

    // Mint a token the way the identity provider would
    fn mint_token(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("Token encoding failed")
    }

    fn claims_for(user_id: &Uuid, role: Role) -> Claims {
        let now = chrono::Utc::now().timestamp() as usize;
        Claims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp: now + 24 * 60 * 60,
        }
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("user").unwrap(), Role::User);
        assert_eq!(Role::from_str("official").unwrap(), Role::Official);
        assert!(Role::from_str("invalid").is_err());
    }

    #[test]
    fn test_role_as_str() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Official.as_str(), "official");
    }

    #[test]
    fn test_role_case_insensitivity() {
        assert_eq!(Role::from_str("USER").unwrap(), Role::User);
        assert_eq!(Role::from_str("User").unwrap(), Role::User);
        assert_eq!(Role::from_str("OFFICIAL").unwrap(), Role::Official);
        assert_eq!(Role::from_str("Official").unwrap(), Role::Official);
    }

    #[test]
    fn test_token_validation_round_trip() {
        // Set JWT_SECRET for the test
        env::set_var("JWT_SECRET", "test_secret");

        let user_id = Uuid::new_v4();
        let token = mint_token(&claims_for(&user_id, Role::User), "test_secret");
        assert!(!token.is_empty());

        let claims = validate_token(&token).expect("Token validation failed");
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_different_roles_in_tokens() {
        env::set_var("JWT_SECRET", "test_secret");
        let user_id = Uuid::new_v4();

        for role in [Role::User, Role::Official] {
            let token = mint_token(&claims_for(&user_id, role.clone()), "test_secret");
            let claims = validate_token(&token).expect("Token validation failed");

            assert_eq!(claims.role, role);
        }
    }

    #[test]
    fn test_expired_token_rejection() {
        env::set_var("JWT_SECRET", "test_secret");

        let user_id = Uuid::new_v4();
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            role: Role::User,
            iat: now - 7200,
            exp: now - 3600, // Expired an hour ago
        };

        let token = mint_token(&claims, "test_secret");
        let result = validate_token(&token);
        assert!(result.is_err(), "Expired token should be rejected");

        match result {
            Err(JwtError::InvalidToken) => {} // Expected
            _ => panic!("Expected InvalidToken error for expired token"),
        }
    }

    #[test]
    fn test_wrong_secret_rejection() {
        env::set_var("JWT_SECRET", "test_secret");

        let user_id = Uuid::new_v4();
        let token = mint_token(&claims_for(&user_id, Role::User), "some_other_secret");

        let result = validate_token(&token);
        assert!(result.is_err());
        match result {
            Err(JwtError::InvalidToken) => {} // Expected
            _ => panic!("Expected InvalidToken error"),
        }
    }

    #[test]
    fn test_token_tampering() {
        env::set_var("JWT_SECRET", "test_secret");
        let user_id = Uuid::new_v4();

        // Mint valid token
        let token = mint_token(&claims_for(&user_id, Role::User), "test_secret");

        // Tamper with the token - modify the middle section (payload)
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3, "JWT should have 3 parts");

        let tampered_token = format!("{}.{}tampered.{}", parts[0], parts[1], parts[2]);

        // Verify that tampered token is rejected
        let result = validate_token(&tampered_token);
        assert!(result.is_err());
        match result {
            Err(JwtError::InvalidToken) => {} // Expected
            _ => panic!("Expected InvalidToken error"),
        }
    }

    #[test]
    fn test_malformed_tokens() {
        env::set_var("JWT_SECRET", "test_secret");

        // Test various malformed tokens
        let malformed_tokens = [
            "",                          // Empty token
            "not.a.jwt.token",           // Too many segments
            "missing.segments",          // Too few segments
            "invalid base64.parts.here", // Invalid base64
            "eyJhbGciOiJIUzI1NiJ9",      // Header only
        ];

        for token in &malformed_tokens {
            let result = validate_token(token);
            assert!(result.is_err(), "Token '{}' should be rejected", token);
            match result {
                Err(JwtError::InvalidToken) => {} // Expected
                _ => panic!("Expected InvalidToken error for '{}'", token),
            }
        }
    }

    #[test]
    fn test_jwt_error_conversion() {
        // Test conversion from JwtError to StatusCode
        use axum::http::StatusCode;

        assert_eq!(
            StatusCode::from(JwtError::MissingSecret),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            StatusCode::from(JwtError::InvalidToken),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_role_serialization_consistency() {
        // Test that roles are serialized and deserialized consistently
        for role in [Role::User, Role::Official] {
            let serialized = serde_json::to_string(&role).expect("Failed to serialize role");
            let deserialized: Role =
                serde_json::from_str(&serialized).expect("Failed to deserialize role");

            assert_eq!(
                role, deserialized,
                "Role should remain the same after serialization cycle"
            );
        }
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Official).unwrap(),
            "\"official\""
        );
    }

    #[test]
    fn test_uuid_conversion_in_claims() {
        env::set_var("JWT_SECRET", "test_secret");

        // Test with normal UUID
        let user_id = Uuid::new_v4();
        let token = mint_token(&claims_for(&user_id, Role::User), "test_secret");
        let claims = validate_token(&token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());

        // Test with nil UUID
        let nil_uuid = Uuid::nil();
        let token = mint_token(&claims_for(&nil_uuid, Role::User), "test_secret");
        let claims = validate_token(&token).unwrap();
        assert_eq!(claims.sub, nil_uuid.to_string());
    }

    #[test]
    fn test_token_validation_concurrency() {
        env::set_var("JWT_SECRET", "test_secret");
        let user_id = Uuid::new_v4();
        let token = mint_token(&claims_for(&user_id, Role::User), "test_secret");

        // Test concurrent validation
        let mut handles = vec![];
        for _ in 0..10 {
            let token_clone = token.clone();
            let handle = thread::spawn(move || {
                let result = validate_token(&token_clone);
                assert!(result.is_ok());
                let claims = result.unwrap();
                assert_eq!(claims.sub, user_id.to_string());
            });
            handles.push(handle);
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
