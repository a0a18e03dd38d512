//! # Scopegate (user management behind scoped bearer tokens)
//!
//! `scopegate` is a small HTTP API that manages user accounts and guards its
//! routes with opaque bearer tokens carrying permission scopes.
//!
//! ## Tokens
//!
//! A token is 16 random bytes encoded as 26 characters of unpadded base-32.
//! The plaintext is returned to the client exactly once; the database only
//! stores its SHA-256 digest. Each user holds at most one active token: issuing
//! a new one removes the previous ones in the same transaction. Expired tokens
//! are deleted lazily the next time they are presented.
//!
//! ## Scopes
//!
//! Capabilities come from a closed vocabulary (`read:a`, `write:a`, `read:b`,
//! `write:b`). A token can only carry capabilities its user holds, and every
//! protected route group declares the capabilities a token must contain.
//! Insufficient scope is answered with `401` and names the missing capability.

pub mod api;
pub mod auth;
pub mod cli;
pub mod db;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
