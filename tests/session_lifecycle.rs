//! End-to-end exercises of the session core over the in-memory adapters:
//! issuance, rotation, reuse detection, revocation and authorization.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use turnstile::application_impl::*;
use turnstile::application_port::*;
use turnstile::domain::*;
use turnstile::domain_model::*;
use turnstile::infra_memory::*;

fn codec_config() -> CodecConfig {
    CodecConfig {
        issuer: "turnstile.auth".to_string(),
        audience: "hiring-api".to_string(),
        access_ttl: Duration::from_secs(300),
        refresh_ttl: Duration::from_secs(3600),
        leeway: Duration::from_secs(30),
        signing_key: b"lifecycle-test-signing-key".to_vec(),
    }
}

fn subjects() -> Vec<FakeSubject> {
    vec![
        FakeSubject {
            email: "admin@example.com".to_string(),
            password: "admin-pass".to_string(),
            role: Role::Admin,
            mfa_code: None,
        },
        FakeSubject {
            email: "recruiter@example.com".to_string(),
            password: "recruiter-pass".to_string(),
            role: Role::Recruiter,
            mfa_code: None,
        },
        FakeSubject {
            email: "manager@example.com".to_string(),
            password: "manager-pass".to_string(),
            role: Role::HiringManager,
            mfa_code: Some("117711".to_string()),
        },
    ]
}

fn service() -> Arc<dyn SessionService> {
    Arc::new(CoreSessionService::new(
        Arc::new(FakeIdentityProvider::new(subjects())),
        Arc::new(JwtHs256Codec::new(codec_config())),
        Arc::new(MemoryTokenFamilyStore::new()),
        SessionConfig {
            refresh_ttl: Duration::from_secs(3600),
            store_timeout: Duration::from_secs(2),
        },
    ))
}

async fn login_tokens(service: &Arc<dyn SessionService>, email: &str, password: &str) -> SessionTokens {
    let outcome = service
        .login(LoginInput {
            email: email.to_string(),
            password: password.to_string(),
            mfa_code: None,
        })
        .await
        .expect("login should succeed");
    match outcome {
        LoginOutcome::Tokens(tokens) => tokens,
        LoginOutcome::MfaChallenge { .. } => panic!("unexpected MFA challenge"),
    }
}

#[tokio::test]
async fn login_then_refresh_then_replay() {
    let service = service();
    let original = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;

    // First rotation succeeds and yields a new pair.
    let rotated = service.refresh(&original.refresh_token.0).await.unwrap();
    assert_ne!(rotated.refresh_token.0, original.refresh_token.0);

    // Replaying the rotated-out token is reuse: family dies.
    let replay = service.refresh(&original.refresh_token.0).await;
    assert!(matches!(replay, Err(AuthError::ReuseDetected)));

    // The legitimate generation-1 token is collateral damage.
    let follow_up = service.refresh(&rotated.refresh_token.0).await;
    assert!(matches!(follow_up, Err(AuthError::TokenRevoked)));
}

#[tokio::test]
async fn refresh_chain_survives_many_rotations() {
    let service = service();
    let mut tokens = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;

    for _ in 0..5 {
        tokens = service.refresh(&tokens.refresh_token.0).await.unwrap();
    }

    // The latest token still authorizes.
    let context = service
        .authorize(&tokens.access_token.0, &[Permission::ReadProfiles])
        .await
        .unwrap();
    assert_eq!(context.role, Role::Recruiter);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refresh_has_exactly_one_winner() {
    let service = service();
    let tokens = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;
    let refresh_token = tokens.refresh_token.0;

    let attempts = (0..50).map(|_| {
        let service = service.clone();
        let token = refresh_token.clone();
        tokio::spawn(async move { service.refresh(&token).await })
    });
    let results = join_all(attempts).await;

    let mut rotated = 0;
    let mut rejected = 0;
    for result in results {
        match result.expect("task must not panic") {
            Ok(_) => rotated += 1,
            Err(AuthError::ReuseDetected) | Err(AuthError::TokenRevoked) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(rotated, 1);
    assert_eq!(rejected, 49);
}

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_family() {
    let service = service();
    let tokens = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;

    service.logout(&tokens.refresh_token.0).await.unwrap();
    service.logout(&tokens.refresh_token.0).await.unwrap();

    let refresh = service.refresh(&tokens.refresh_token.0).await;
    assert!(matches!(refresh, Err(AuthError::TokenRevoked)));
}

#[tokio::test]
async fn access_tokens_stay_valid_across_store_changes() {
    let service = service();
    let tokens = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;

    let before = service
        .authorize(&tokens.access_token.0, &[Permission::ReadProfiles])
        .await
        .unwrap();

    // Revoking the family does not reach into already-issued access
    // tokens; they ride out their own expiry.
    service.logout(&tokens.refresh_token.0).await.unwrap();

    let after = service
        .authorize(&tokens.access_token.0, &[Permission::ReadProfiles])
        .await
        .unwrap();
    assert_eq!(before.subject_id, after.subject_id);
    assert_eq!(before.permissions, after.permissions);
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let service = service();

    // MFA-enrolled user: login stops at a challenge, the code mints tokens.
    let tokens = match service
        .login(LoginInput {
            email: "manager@example.com".to_string(),
            password: "manager-pass".to_string(),
            mfa_code: None,
        })
        .await
        .unwrap()
    {
        LoginOutcome::MfaChallenge { challenge_id } => service
            .complete_mfa(MfaInput {
                challenge_id,
                code: "117711".to_string(),
            })
            .await
            .unwrap(),
        LoginOutcome::Tokens(_) => panic!("expected MFA challenge"),
    };

    // Read-only role against a read+write requirement.
    let result = service
        .authorize(
            &tokens.access_token.0,
            &[Permission::ReadProfiles, Permission::WriteProfiles],
        )
        .await;
    assert!(matches!(result, Err(AuthError::Forbidden)));

    let ok = service
        .authorize(&tokens.access_token.0, &[Permission::ReadProfiles])
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn admin_revocation_ends_every_session() {
    let service = service();
    let first = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;
    let second = login_tokens(&service, "recruiter@example.com", "recruiter-pass").await;

    let claims_subject = service
        .authorize(&first.access_token.0, &[])
        .await
        .unwrap()
        .subject_id;

    let revoked = service.revoke_subject(claims_subject).await.unwrap();
    assert_eq!(revoked, 2);

    assert!(matches!(
        service.refresh(&first.refresh_token.0).await,
        Err(AuthError::TokenRevoked)
    ));
    assert!(matches!(
        service.refresh(&second.refresh_token.0).await,
        Err(AuthError::TokenRevoked)
    ));
}

#[tokio::test]
async fn garbage_tokens_never_reach_the_store() {
    let service = service();

    assert!(matches!(
        service.refresh("garbage").await,
        Err(AuthError::TokenInvalid)
    ));
    assert!(matches!(
        service.authorize("garbage", &[]).await,
        Err(AuthError::TokenInvalid)
    ));
}

#[tokio::test]
async fn wrong_mfa_code_does_not_mint_tokens() {
    let service = service();

    let challenge_id = match service
        .login(LoginInput {
            email: "manager@example.com".to_string(),
            password: "manager-pass".to_string(),
            mfa_code: None,
        })
        .await
        .unwrap()
    {
        LoginOutcome::MfaChallenge { challenge_id } => challenge_id,
        LoginOutcome::Tokens(_) => panic!("expected MFA challenge"),
    };

    let result = service
        .complete_mfa(MfaInput {
            challenge_id,
            code: "000000".to_string(),
        })
        .await;
    assert!(matches!(result, Err(AuthError::MfaInvalid)));
}
