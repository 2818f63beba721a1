//! Central identity and session management for MediConnect.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;

pub use principal::{RegistrationExtras, Role, UserRecord, UserUpdate};
pub use session::{SessionStore, SESSION_KEY};
