//! Store behavior against a real Postgres, enabled by `SCOPEGATE_TEST_DSN`.

use anyhow::{Result, anyhow};
use chrono::{TimeDelta, Utc};
use scopegate::{
    auth::{
        Capability, NewUser, Scope, UserChanges, WriteOutcome,
        repo::{PgTokenRepo, PgUserRepo, TokenRepo, UserRepo},
        token::{TokenDigest, generate},
    },
    db,
};
use sqlx::PgPool;
use std::time::Duration;
use tokio::task::JoinSet;
use ulid::Ulid;

async fn pool() -> Result<Option<PgPool>> {
    let Ok(dsn) = std::env::var("SCOPEGATE_TEST_DSN") else {
        eprintln!("Skipping integration test: SCOPEGATE_TEST_DSN not set");
        return Ok(None);
    };
    let pool = db::connect(&dsn, 8, Duration::from_secs(5)).await?;
    db::migrate(&pool).await?;
    Ok(Some(pool))
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: email.to_string(),
        password_hash: "$2b$04$placeholderplaceholderplaceholderplaceholder12".to_string(),
        scope: Scope::from([Capability::ReadA, Capability::WriteA]),
    }
}

fn unique_email() -> String {
    format!("grace-{}@example.com", Ulid::new().to_string().to_lowercase())
}

#[tokio::test]
async fn user_lifecycle() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let users = PgUserRepo::new(pool.clone());
    let email = unique_email();

    let WriteOutcome::Written(user) = users.insert(&new_user(&email)).await? else {
        return Err(anyhow!("insert did not write"));
    };
    assert_eq!(user.scope, Scope::from([Capability::ReadA, Capability::WriteA]));
    assert_eq!(
        users.insert(&new_user(&email.to_uppercase())).await?,
        WriteOutcome::Conflict
    );

    let found = users.find_by_email(&email).await?;
    assert_eq!(found.map(|u| u.id), Some(user.id));

    let changes = UserChanges {
        first_name: "Grace B.".to_string(),
        last_name: "Hopper".to_string(),
        email: email.clone(),
        password_hash: None,
        scope: Some(Scope::all()),
    };
    let WriteOutcome::Written(updated) = users.update(user.id, &changes).await? else {
        return Err(anyhow!("update did not write"));
    };
    assert_eq!(updated.first_name, "Grace B.");
    assert_eq!(updated.password_hash, user.password_hash);
    assert_eq!(updated.scope, Scope::all());

    assert!(users.delete(user.id).await?);
    assert!(!users.delete(user.id).await?);
    assert_eq!(users.update(user.id, &changes).await?, WriteOutcome::NotFound);
    users.ping().await?;
    Ok(())
}

#[tokio::test]
async fn one_token_per_user_and_cascade() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let users = PgUserRepo::new(pool.clone());
    let tokens = PgTokenRepo::new(pool);

    let WriteOutcome::Written(user) = users.insert(&new_user(&unique_email())).await? else {
        return Err(anyhow!("insert did not write"));
    };

    let first = generate(user.id, TimeDelta::hours(2), Scope::empty(), Utc::now())?;
    let second = generate(
        user.id,
        TimeDelta::hours(2),
        Scope::from([Capability::ReadA]),
        Utc::now(),
    )?;
    tokens.replace_for_user(first.token()).await?;
    tokens.replace_for_user(second.token()).await?;

    assert!(tokens.find_by_digest(&first.token().digest).await?.is_none());
    let Some((owner, stored)) = tokens.find_by_digest(&second.token().digest).await? else {
        return Err(anyhow!("second token missing"));
    };
    assert_eq!(owner.id, user.id);
    assert_eq!(&stored, second.token());

    let unknown = TokenDigest::from_plaintext("A".repeat(26).as_str());
    assert!(tokens.find_by_digest(&unknown).await?.is_none());

    assert!(users.delete(user.id).await?);
    assert!(tokens.find_by_digest(&second.token().digest).await?.is_none());
    assert_eq!(tokens.delete_for_user(user.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn concurrent_logins_leave_one_token() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let users = PgUserRepo::new(pool.clone());
    let tokens = PgTokenRepo::new(pool.clone());

    let WriteOutcome::Written(user) = users.insert(&new_user(&unique_email())).await? else {
        return Err(anyhow!("insert did not write"));
    };

    let mut issued = Vec::new();
    for _ in 0..8 {
        issued.push(generate(user.id, TimeDelta::hours(2), Scope::empty(), Utc::now())?);
    }

    let mut logins = JoinSet::new();
    for token in issued.iter().map(|issued| issued.token().clone()) {
        let tokens = tokens.clone();
        logins.spawn(async move { tokens.replace_for_user(&token).await });
    }
    while let Some(joined) = logins.join_next().await {
        joined??;
    }

    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM tokens WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    let mut resolvable = 0;
    for token in &issued {
        if tokens.find_by_digest(&token.token().digest).await?.is_some() {
            resolvable += 1;
        }
    }
    assert_eq!(resolvable, 1);

    users.delete(user.id).await?;
    Ok(())
}

#[tokio::test]
async fn scope_change_revokes_tokens_with_the_update() -> Result<()> {
    let Some(pool) = pool().await? else {
        return Ok(());
    };
    let users = PgUserRepo::new(pool.clone());
    let tokens = PgTokenRepo::new(pool);
    let email = unique_email();

    let WriteOutcome::Written(user) = users.insert(&new_user(&email)).await? else {
        return Err(anyhow!("insert did not write"));
    };
    let issued = generate(user.id, TimeDelta::hours(2), Scope::empty(), Utc::now())?;
    tokens.replace_for_user(issued.token()).await?;

    let mut changes = UserChanges {
        first_name: "Grace".to_string(),
        last_name: "Murray Hopper".to_string(),
        email,
        password_hash: None,
        scope: None,
    };
    users.update(user.id, &changes).await?;
    assert!(tokens.find_by_digest(&issued.token().digest).await?.is_some());

    changes.scope = Some(Scope::from([Capability::ReadA]));
    users.update(user.id, &changes).await?;
    assert!(tokens.find_by_digest(&issued.token().digest).await?.is_none());

    users.delete(user.id).await?;
    Ok(())
}
