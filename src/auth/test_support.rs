//! In-memory doubles for the repositories and the clock.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use super::{
    clock::Clock,
    error::StoreError,
    models::{NewUser, User, UserChanges, WriteOutcome},
    repo::{TokenRepo, UserRepo},
    scope::Scope,
    token::{Token, TokenDigest},
};

/// Per-method call counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub find_by_email: usize,
    pub find_by_id: usize,
    pub list: usize,
    pub insert_user: usize,
    pub update_user: usize,
    pub delete_user: usize,
    pub ping: usize,
    pub replace_for_user: usize,
    pub find_by_digest: usize,
    pub delete_by_digest: usize,
    pub delete_for_user: usize,
}

impl CallCounts {
    pub fn token_calls(&self) -> usize {
        self.replace_for_user + self.find_by_digest + self.delete_by_digest + self.delete_for_user
    }

    pub fn total(&self) -> usize {
        self.token_calls()
            + self.find_by_email
            + self.find_by_id
            + self.list
            + self.insert_user
            + self.update_user
            + self.delete_user
            + self.ping
    }
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    tokens: Vec<Token>,
    next_id: i64,
    calls: CallCounts,
    stall: Option<Duration>,
    fail_ping: bool,
}

/// Implements both repositories over one shared map, with cascade on user delete.
#[derive(Default)]
pub struct MemoryRepo {
    inner: Mutex<Inner>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seed_user(&self, email: &str, scope: Scope) -> User {
        self.seed_user_with_hash(email, "$2b$04$invalidinvalidinvalidinvalidinvalidinvalidinvalidinv", scope)
    }

    pub fn seed_user_with_hash(&self, email: &str, password_hash: &str, scope: Scope) -> User {
        let mut state = self.state();
        state.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: state.next_id,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            scope,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        user
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn token_count(&self) -> usize {
        self.state().tokens.len()
    }

    /// Make every subsequent call sleep before answering.
    pub fn stall_for(&self, duration: Duration) {
        self.state().stall = Some(duration);
    }

    pub fn fail_ping(&self) {
        self.state().fail_ping = true;
    }

    async fn enter(&self, count: impl FnOnce(&mut CallCounts)) {
        let stall = {
            let mut state = self.state();
            count(&mut state.calls);
            state.stall
        };
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
    }

    fn email_taken(state: &Inner, email: &str, except: Option<i64>) -> bool {
        state
            .users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(email) && Some(user.id) != except)
    }
}

#[async_trait]
impl UserRepo for MemoryRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.enter(|calls| calls.find_by_email += 1).await;
        Ok(self
            .state()
            .users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.enter(|calls| calls.find_by_id += 1).await;
        Ok(self.state().users.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        self.enter(|calls| calls.list += 1).await;
        let mut users: Vec<User> = self.state().users.values().cloned().collect();
        users.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(users)
    }

    async fn insert(&self, user: &NewUser) -> Result<WriteOutcome, StoreError> {
        self.enter(|calls| calls.insert_user += 1).await;
        let mut state = self.state();
        if Self::email_taken(&state, &user.email, None) {
            return Ok(WriteOutcome::Conflict);
        }
        state.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: state.next_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            scope: user.scope.clone(),
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(WriteOutcome::Written(created))
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<WriteOutcome, StoreError> {
        self.enter(|calls| calls.update_user += 1).await;
        let mut state = self.state();
        if !state.users.contains_key(&id) {
            return Ok(WriteOutcome::NotFound);
        }
        if Self::email_taken(&state, &changes.email, Some(id)) {
            return Ok(WriteOutcome::Conflict);
        }
        let Some(user) = state.users.get_mut(&id) else {
            return Ok(WriteOutcome::NotFound);
        };
        user.first_name.clone_from(&changes.first_name);
        user.last_name.clone_from(&changes.last_name);
        user.email.clone_from(&changes.email);
        if let Some(hash) = &changes.password_hash {
            user.password_hash.clone_from(hash);
        }
        if let Some(scope) = &changes.scope {
            user.scope = scope.clone();
        }
        user.updated_at = Utc::now();
        let user = user.clone();
        if changes.revokes_tokens() {
            state.tokens.retain(|token| token.user_id != id);
        }
        Ok(WriteOutcome::Written(user))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.enter(|calls| calls.delete_user += 1).await;
        let mut state = self.state();
        let removed = state.users.remove(&id).is_some();
        state.tokens.retain(|token| token.user_id != id);
        Ok(removed)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.enter(|calls| calls.ping += 1).await;
        if self.state().fail_ping {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenRepo for MemoryRepo {
    async fn replace_for_user(&self, token: &Token) -> Result<(), StoreError> {
        self.enter(|calls| calls.replace_for_user += 1).await;
        let mut state = self.state();
        if !state.users.contains_key(&token.user_id) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        state.tokens.retain(|existing| existing.user_id != token.user_id);
        state.tokens.push(token.clone());
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<(User, Token)>, StoreError> {
        self.enter(|calls| calls.find_by_digest += 1).await;
        let state = self.state();
        Ok(state
            .tokens
            .iter()
            .find(|token| token.digest == *digest)
            .and_then(|token| {
                state
                    .users
                    .get(&token.user_id)
                    .map(|user| (user.clone(), token.clone()))
            }))
    }

    async fn delete_by_digest(&self, digest: &TokenDigest) -> Result<(), StoreError> {
        self.enter(|calls| calls.delete_by_digest += 1).await;
        self.state().tokens.retain(|token| token.digest != *digest);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<u64, StoreError> {
        self.enter(|calls| calls.delete_for_user += 1).await;
        let mut state = self.state();
        let before = state.tokens.len();
        state.tokens.retain(|token| token.user_id != user_id);
        Ok(u64::try_from(before - state.tokens.len()).unwrap_or_default())
    }
}

/// Clock whose instant only moves when told to.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
