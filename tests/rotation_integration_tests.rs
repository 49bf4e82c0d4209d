use chrono::{Duration, Utc};
use refresh_authority::auth::{Clock, ManualClock, RotationError};
use refresh_authority::database::entities::refresh_tokens::hash_refresh_secret;
use refresh_authority::database::entities::{RefreshTokenRecord, RevokeReason};
use refresh_authority::test_utils::{create_test_user, TestAuthorityBuilder};
use std::sync::Arc;

#[tokio::test]
async fn test_issue_creates_generation_one() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let issued = service
        .issue(user_id, Some("device-1".to_string()))
        .await
        .unwrap();

    assert_eq!(issued.generation, 1);
    assert!(issued.token.starts_with("TEST_"));

    let family = database
        .refresh_tokens()
        .find_family(&issued.family_id)
        .await
        .unwrap();
    assert_eq!(family.len(), 1);
    assert_eq!(family[0].generation, 1);
    assert_eq!(family[0].previous_token_hash, None);
    assert_eq!(family[0].user_id, user_id);
    assert_eq!(family[0].device_id.as_deref(), Some("device-1"));
    assert!(family[0].used_at.is_none());
    assert!(family[0].revoke_reason.is_none());
    // The plaintext secret is never stored
    assert_ne!(family[0].token_hash, issued.token);
}

#[tokio::test]
async fn test_issue_unknown_user_fails() {
    let (_database, service) = TestAuthorityBuilder::new().build().await;

    let result = service.issue(999, None).await;
    assert!(matches!(result, Err(RotationError::UnknownUser(999))));
}

#[tokio::test]
async fn test_rotate_links_successor_to_predecessor() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let first = service.issue(user_id, None).await.unwrap();
    let second = service.rotate(&first.token).await.unwrap();

    assert_eq!(second.family_id, first.family_id);
    assert_eq!(second.generation, 2);
    assert_ne!(second.token, first.token);

    let family = database
        .refresh_tokens()
        .find_family(&first.family_id)
        .await
        .unwrap();
    assert_eq!(family.len(), 2);

    // Chain integrity: previous_token_hash of gen N equals token_hash of gen N-1
    assert_eq!(
        family[1].previous_token_hash.as_deref(),
        Some(family[0].token_hash.as_str())
    );
    assert_eq!(family[1].generation, family[0].generation + 1);

    // The presented row was consumed exactly once
    assert!(family[0].used_at.is_some());
    assert!(family[1].used_at.is_none());
}

#[tokio::test]
async fn test_rotation_chain_has_no_generation_gaps() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let mut current = service.issue(user_id, None).await.unwrap();
    for _ in 0..4 {
        current = service.rotate(&current.token).await.unwrap();
    }

    let family = database
        .refresh_tokens()
        .find_family(&current.family_id)
        .await
        .unwrap();
    assert_eq!(family.len(), 5);
    for (i, row) in family.iter().enumerate() {
        assert_eq!(row.generation, i as i32 + 1);
    }
}

#[tokio::test]
async fn test_rotate_unknown_token_fails() {
    let (_database, service) = TestAuthorityBuilder::new().build().await;

    let result = service.rotate("TEST_nosuchtoken").await;
    assert!(matches!(result, Err(RotationError::NotFound)));
}

#[tokio::test]
async fn test_replay_revokes_family() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let first = service.issue(user_id, None).await.unwrap();
    let _second = service.rotate(&first.token).await.unwrap();

    // Replaying the consumed token trips reuse detection
    let result = service.rotate(&first.token).await;
    assert!(matches!(result, Err(RotationError::ReuseDetected)));

    // Every unused row in the family is now revoked
    let family = database
        .refresh_tokens()
        .find_family(&first.family_id)
        .await
        .unwrap();
    for row in &family {
        if row.used_at.is_none() {
            assert_eq!(row.revoke_reason, Some(RevokeReason::ReuseDetected));
        }
    }
}

#[tokio::test]
async fn test_replay_of_old_token_kills_latest_generation() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    // issue -> rotate (gen 1->2) -> rotate (gen 2->3)
    let gen1 = service.issue(user_id, None).await.unwrap();
    let gen2 = service.rotate(&gen1.token).await.unwrap();
    let gen3 = service.rotate(&gen2.token).await.unwrap();
    assert_eq!(gen3.generation, 3);

    // Replay gen 1
    let result = service.rotate(&gen1.token).await;
    assert!(matches!(result, Err(RotationError::ReuseDetected)));

    // Gen 3 is now unusable despite never being directly attacked
    let result = service.rotate(&gen3.token).await;
    assert!(matches!(result, Err(RotationError::Revoked)));
    let result = service.validate_access(&gen3.token).await;
    assert!(matches!(result, Err(RotationError::Revoked)));

    let family = database
        .refresh_tokens()
        .find_family(&gen1.family_id)
        .await
        .unwrap();
    let gen3_row = family.iter().find(|r| r.generation == 3).unwrap();
    assert_eq!(gen3_row.revoke_reason, Some(RevokeReason::ReuseDetected));
}

#[tokio::test]
async fn test_rotate_expired_token_mutates_nothing() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (database, service) = TestAuthorityBuilder::new()
        .with_token_ttl(3600)
        .with_manual_clock(clock.clone())
        .build()
        .await;
    let user_id = create_test_user(&database).await;

    let issued = service.issue(user_id, None).await.unwrap();
    clock.advance(Duration::seconds(3601));

    let result = service.rotate(&issued.token).await;
    assert!(matches!(result, Err(RotationError::Expired)));

    // Expiry is not the replay path: no row was mutated
    let family = database
        .refresh_tokens()
        .find_family(&issued.family_id)
        .await
        .unwrap();
    assert_eq!(family.len(), 1);
    assert!(family[0].used_at.is_none());
    assert!(family[0].revoke_reason.is_none());
}

#[tokio::test]
async fn test_concurrent_rotation_single_winner() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let issued = service.issue(user_id, None).await.unwrap();
    let service = Arc::new(service);

    let a = {
        let service = service.clone();
        let token = issued.token.clone();
        tokio::spawn(async move { service.rotate(&token).await })
    };
    let b = {
        let service = service.clone();
        let token = issued.token.clone();
        tokio::spawn(async move { service.rotate(&token).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one rotation must win");

    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        RotationError::ReuseDetected
    ));

    // Fail-closed: the loser's family revocation ran after the winner's
    // successor was committed, so nothing in the family is left acceptable
    let family = database
        .refresh_tokens()
        .find_family(&issued.family_id)
        .await
        .unwrap();
    assert!(family
        .iter()
        .all(|r| r.used_at.is_some() || r.revoke_reason.is_some()));
}

#[tokio::test]
async fn test_revoked_family_refuses_late_successor_insert() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let gen1 = service.issue(user_id, None).await.unwrap();
    let gen2 = service.rotate(&gen1.token).await.unwrap();

    // The family is revoked while a rotation of gen 2 is still in flight,
    // as happens when a replay of gen 1 is handled concurrently
    let dao = database.refresh_tokens();
    dao.revoke_unused_in_family(&gen1.family_id, RevokeReason::ReuseDetected)
        .await
        .unwrap();

    // The in-flight rotation's storage swap must now lose: the guard sees
    // the revoked row, and no successor reaches the table
    let gen2_hash = hash_refresh_secret(&gen2.token);
    let successor = RefreshTokenRecord {
        id: 0,
        user_id,
        family_id: gen2.family_id.clone(),
        token_hash: hash_refresh_secret("TEST_neverminted"),
        previous_token_hash: Some(gen2_hash.clone()),
        generation: 3,
        device_id: None,
        issued_at: Utc::now(),
        expires_at: Utc::now() + Duration::seconds(3600),
        used_at: None,
        revoke_reason: None,
    };
    let won = dao
        .consume_and_insert(&gen2_hash, &successor, Utc::now())
        .await
        .unwrap();
    assert!(!won, "a revoked row must not be consumable");

    // Nothing in the family survived the revocation
    let family = dao.find_family(&gen1.family_id).await.unwrap();
    assert_eq!(family.len(), 2);
    assert!(family
        .iter()
        .all(|r| r.used_at.is_some() || r.revoke_reason.is_some()));

    // The service agrees: gen 2 is revoked, not rotatable
    let result = service.rotate(&gen2.token).await;
    assert!(matches!(result, Err(RotationError::Revoked)));
}

#[tokio::test]
async fn test_revoke_family_is_idempotent() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let issued = service.issue(user_id, None).await.unwrap();

    service
        .revoke_family(&issued.family_id, RevokeReason::Logout)
        .await
        .unwrap();
    let after_first = database
        .refresh_tokens()
        .find_family(&issued.family_id)
        .await
        .unwrap();

    // Second revocation is a no-op, not an error
    service
        .revoke_family(&issued.family_id, RevokeReason::AdminRevoked)
        .await
        .unwrap();
    let after_second = database
        .refresh_tokens()
        .find_family(&issued.family_id)
        .await
        .unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(after_first[0].revoke_reason, Some(RevokeReason::Logout));
}

#[tokio::test]
async fn test_validate_access_is_read_only() {
    let (database, service) = TestAuthorityBuilder::new().build().await;
    let user_id = create_test_user(&database).await;

    let gen1 = service.issue(user_id, None).await.unwrap();
    assert_eq!(service.validate_access(&gen1.token).await.unwrap(), user_id);

    let gen2 = service.rotate(&gen1.token).await.unwrap();

    // A consumed token reports replay on the read path but triggers no cascade
    let result = service.validate_access(&gen1.token).await;
    assert!(matches!(result, Err(RotationError::ReuseDetected)));
    assert_eq!(service.validate_access(&gen2.token).await.unwrap(), user_id);

    let result = service.validate_access("TEST_unknown").await;
    assert!(matches!(result, Err(RotationError::NotFound)));
}

#[tokio::test]
async fn test_validate_access_expired() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (database, service) = TestAuthorityBuilder::new()
        .with_token_ttl(60)
        .with_manual_clock(clock.clone())
        .build()
        .await;
    let user_id = create_test_user(&database).await;

    let issued = service.issue(user_id, None).await.unwrap();
    clock.advance(Duration::seconds(61));

    let result = service.validate_access(&issued.token).await;
    assert!(matches!(result, Err(RotationError::Expired)));
}

#[tokio::test]
async fn test_sweep_removes_only_dead_rows() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (database, service) = TestAuthorityBuilder::new()
        .with_token_ttl(3600)
        .with_manual_clock(clock.clone())
        .build()
        .await;
    let user_id = create_test_user(&database).await;

    // Family A: rotated once, gen 1 used, gen 2 live
    let a1 = service.issue(user_id, None).await.unwrap();
    let _a2 = service.rotate(&a1.token).await.unwrap();

    // Family B: expires before the sweep
    let b1 = service.issue(user_id, None).await.unwrap();

    clock.advance(Duration::seconds(3601));

    // Family C: issued after the clock moved, still live
    let c1 = service.issue(user_id, None).await.unwrap();

    let dao = database.refresh_tokens();
    // Retention zero: any used row is eligible immediately
    let swept = dao.sweep(clock.now(), Duration::zero()).await.unwrap();

    // a1 (used), a2 (expired), b1 (expired) go; c1 stays
    assert_eq!(swept, 3);
    assert!(dao.find_family(&b1.family_id).await.unwrap().is_empty());
    let family_c = dao.find_family(&c1.family_id).await.unwrap();
    assert_eq!(family_c.len(), 1);
    assert!(family_c[0].used_at.is_none());
}
