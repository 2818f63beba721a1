use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::warn;

use crate::storage::SessionStorage;
use crate::tprintln;

use super::principal::{RegistrationExtras, Role, UserRecord, UserUpdate};

/// Fixed storage key holding the serialized current identity record.
pub const SESSION_KEY: &str = "user";

/// Owner of the current authenticated identity.
///
/// The store is the single source of truth: consumers receive cloned
/// snapshots via `current()`, and every mutation writes through to persistent
/// storage before the in-memory value is replaced. A restart immediately
/// after any operation therefore observes the new state, never a stale one.
#[derive(Clone)]
pub struct SessionStore {
    storage: SessionStorage,
    current: Arc<RwLock<Option<UserRecord>>>,
    loading: Arc<AtomicBool>,
}

impl SessionStore {
    pub fn new(storage: SessionStorage) -> Self {
        Self {
            storage,
            current: Arc::new(RwLock::new(None)),
            loading: Arc::new(AtomicBool::new(true)),
        }
    }

    /// True until the startup `load` has completed exactly once.
    pub fn loading(&self) -> bool { self.loading.load(Ordering::Acquire) }

    /// Read-only snapshot of the current record, if any.
    pub fn current(&self) -> Option<UserRecord> { self.current.read().clone() }

    /// Attempt to restore a persisted session on startup.
    ///
    /// Fails soft: any read or parse error is treated as "no session" and is
    /// never raised to the caller. Clears the loading flag when done.
    pub async fn load(&self) {
        match self.storage.fetch::<UserRecord>(SESSION_KEY) {
            Ok(Some(rec)) => {
                tprintln!("session.load restored email={} role={:?}", rec.email, rec.role);
                *self.current.write() = Some(rec);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(target: "mediconnect::session", "failed to load persisted session: {e:#}");
            }
        }
        self.loading.store(false, Ordering::Release);
    }

    /// Create a session from a login submission.
    ///
    /// There is no credential store: the password is accepted unchecked and a
    /// fresh record is synthesized for the email/role with role defaults.
    pub async fn login(&self, email: &str, password: &str, role: Role) -> Result<UserRecord> {
        let _ = password;
        let rec = UserRecord::synthesize(email, role);
        tprintln!("session.login email={} role={:?} id={}", email, role, rec.id);
        self.publish(rec)
    }

    /// Create a session from a registration submission. Role defaults are
    /// merged with the caller-supplied extras (document references and
    /// verification outcomes carried over from the auth flow).
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Role,
        extras: RegistrationExtras,
    ) -> Result<UserRecord> {
        let _ = password;
        let rec = UserRecord::synthesize(email, role).with_extras(extras);
        tprintln!("session.register email={} role={:?} id={}", email, role, rec.id);
        self.publish(rec)
    }

    /// Merge partial fields into the current record. No-op (`Ok(None)`) when
    /// no session exists. Identifier and role are never changed.
    pub async fn update(&self, update: UserUpdate) -> Result<Option<UserRecord>> {
        let Some(mut rec) = self.current() else { return Ok(None) };
        rec.apply(&update);
        Ok(Some(self.publish(rec)?))
    }

    /// Remove the persisted record and the in-memory record unconditionally.
    pub async fn logout(&self) -> Result<()> {
        self.storage.remove(SESSION_KEY)?;
        *self.current.write() = None;
        tprintln!("session.logout");
        Ok(())
    }

    // Persist first, publish second. A write failure leaves the previous
    // in-memory record intact, so the operation is all-or-nothing from the
    // caller's perspective.
    fn publish(&self, rec: UserRecord) -> Result<UserRecord> {
        self.storage.put(SESSION_KEY, &rec)?;
        *self.current.write() = Some(rec.clone());
        Ok(rec)
    }
}
