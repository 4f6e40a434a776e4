//! End-to-end use of the auth primitives the way the API composes them.

use leadforge_auth::{
    generate_refresh_token, hash_presented_token, AuthError, HashParams, JwtKeys,
    PasswordHasherService,
};
use leadforge_core::{Principal, UserRole};
use uuid::Uuid;

const SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

#[test]
fn test_login_then_refresh_round() {
    let hasher = PasswordHasherService::new(HashParams::insecure_fast());
    let stored = hasher.hash("s3cure-passw0rd").unwrap();

    // Login: password matches, issue a pair.
    assert!(hasher.verify("s3cure-passw0rd", &stored).unwrap());
    let keys = JwtKeys::new(SECRET, "leadforge", 900).unwrap();
    let principal = Principal {
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        role: UserRole::Owner,
    };
    let access = keys.issue(&principal).unwrap();
    let refresh = generate_refresh_token();

    // Client presents both later.
    let claims = keys.verify(&access).unwrap();
    assert_eq!(claims.company_id, principal.company_id);
    assert_eq!(hash_presented_token(&refresh.plaintext).unwrap(), refresh.hash);

    // Rotation issues an unrelated token.
    let rotated = generate_refresh_token();
    assert_ne!(rotated.hash, refresh.hash);
}

#[test]
fn test_access_token_cannot_be_used_as_refresh_token() {
    let keys = JwtKeys::new(SECRET, "leadforge", 900).unwrap();
    let access = keys
        .issue(&Principal {
            user_id: Uuid::nil(),
            company_id: Uuid::nil(),
            role: UserRole::Member,
        })
        .unwrap();
    assert!(matches!(
        hash_presented_token(&access),
        Err(AuthError::MalformedRefreshToken)
    ));
}

#[test]
fn test_tokens_from_other_tenants_decode_to_their_own_company() {
    let keys = JwtKeys::new(SECRET, "leadforge", 900).unwrap();
    let a = Principal {
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        role: UserRole::Admin,
    };
    let b = Principal {
        user_id: Uuid::new_v4(),
        company_id: Uuid::new_v4(),
        role: UserRole::Admin,
    };
    let ta = keys.verify(&keys.issue(&a).unwrap()).unwrap();
    let tb = keys.verify(&keys.issue(&b).unwrap()).unwrap();
    assert_ne!(ta.company_id, tb.company_id);
    assert_ne!(ta.jti, tb.jti);
}
