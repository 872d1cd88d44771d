//! Cookie storage shared across exchanges.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use tracing::trace;

use super::{Cookie, CookieKey};

/// Storage for cookies shared by every exchange of a client.
///
/// Implementations serialize their own mutations; the cookie agent only
/// reads a snapshot and adds accepted cookies.
pub trait CookieStore: Send + Sync {
    /// Snapshot of every stored cookie, including expired ones not yet purged.
    fn cookies(&self) -> Vec<Cookie>;

    /// Adds a cookie, replacing any cookie with the same identity.
    ///
    /// Adding an already expired cookie removes the stored one instead.
    fn add_cookie(&self, cookie: Cookie);

    /// Removes cookies expired at `now`, returning how many were dropped.
    fn clear_expired(&self, now: SystemTime) -> usize;

    /// Removes everything.
    fn clear(&self);
}

/// In-memory store ordered by cookie identity.
#[derive(Debug, Default)]
pub struct BasicCookieStore {
    cookies: Mutex<BTreeMap<CookieKey, Cookie>>,
}

impl BasicCookieStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<CookieKey, Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for BasicCookieStore {
    fn cookies(&self) -> Vec<Cookie> {
        self.lock().values().cloned().collect()
    }

    fn add_cookie(&self, cookie: Cookie) {
        let key = cookie.key();
        let mut cookies = self.lock();
        if cookie.is_expired(SystemTime::now()) {
            trace!(name = %cookie.name(), domain = %cookie.domain(), "expired cookie removes stored entry");
            cookies.remove(&key);
        } else {
            cookies.insert(key, cookie);
        }
    }

    fn clear_expired(&self, now: SystemTime) -> usize {
        let mut cookies = self.lock();
        let before = cookies.len();
        cookies.retain(|_, cookie| !cookie.is_expired(now));
        before - cookies.len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
