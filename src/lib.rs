//! # Bileto (Ticket-based Single Sign-On Authority)
//!
//! `bileto` is a single sign-on authority built around a TTL-governed ticket
//! registry and an ordered authentication-dispatch chain.
//!
//! ## Tickets
//!
//! - A **granting ticket** (`TGT-…`) represents an established sign-on
//!   session. It is minted only after the dispatcher produced a principal and
//!   is bounded by both an absolute lifetime and a sliding idle window.
//! - A **service ticket** (`ST-…`) is a short-lived, one-time token chained
//!   to a granting ticket and bound to exactly one service identifier.
//!   The first successful validation consumes it.
//!
//! The registry is the sole owner of ticket state. Its backing store is the
//! [`ticket::TicketStore`] trait: the bundled backend is an in-process
//! concurrent map; a distributed key-value grid can implement the same
//! contract for multi-node deployments.
//!
//! ## Authentication
//!
//! Credentials run through an ordered list of (handler, resolver) pairs.
//! Handlers classify each attempt as success, handled failure (bad
//! credentials), or prevented (backend unreachable), and the dispatcher keeps
//! the two apart so an LDAP outage never reads like a wave of bad passwords.

pub mod api;
pub mod authn;
pub mod cli;
pub mod ticket;

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

static BANNER_EMITTED: AtomicBool = AtomicBool::new(false);

/// Log the server name/version/build exactly once per process.
///
/// Startup paths may be re-entered (tests, embedded use); the guard keeps the
/// banner from repeating.
pub fn emit_version_banner() {
    if BANNER_EMITTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_ok()
    {
        info!(
            "=======| {} {} ({}) |=======",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            GIT_COMMIT_HASH
        );
    }
}
