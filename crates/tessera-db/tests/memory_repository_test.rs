//! Concurrency tests for the in-memory adapters.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tessera_core::models::refresh_token::CreateRefreshToken;
use tessera_core::models::user::CreateUser;
use tessera_core::repository::{RefreshTokenRepository, UserRepository};
use tessera_db::repository::{MemoryRefreshTokenRepository, MemoryUserRepository};
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_produce_exactly_one_user() {
    let repo = Arc::new(MemoryUserRepository::new());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.create(CreateUser {
                    email: "race@example.com".into(),
                    password_hash: format!("hash-{i}"),
                    first_name: String::new(),
                    last_name: String::new(),
                })
                .await
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(repo.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_succeed_exactly_once() {
    let repo = Arc::new(MemoryRefreshTokenRepository::new());
    repo.register(CreateRefreshToken {
        token_hash: "contended".into(),
        user_id: Uuid::new_v4(),
        expires_at: Utc::now() + Duration::hours(1),
    })
    .await
    .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.redeem("contended").await })
        })
        .collect();

    let mut redeemed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => redeemed += 1,
            Err(e) => assert!(e.is_not_found()),
        }
    }

    assert_eq!(redeemed, 1);
    assert!(repo.is_empty());
}

#[tokio::test]
async fn revoke_all_only_touches_one_user() {
    let repo = MemoryRefreshTokenRepository::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    for (hash, owner) in [("a1", alice), ("a2", alice), ("b1", bob)] {
        repo.register(CreateRefreshToken {
            token_hash: hash.into(),
            user_id: owner,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();
    }

    assert_eq!(repo.revoke_all(alice).await.unwrap(), 2);
    assert_eq!(repo.len(), 1);
    assert_eq!(repo.redeem("b1").await.unwrap().user_id, bob);
}
