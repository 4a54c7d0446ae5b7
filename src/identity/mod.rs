//! Admin session management and visitor unlock verification.
//! Keep the public surface thin and split implementation across sub-modules.

mod session;
mod unlock;

pub use session::{Session, SessionManager};
pub use unlock::{verify_password, EntityKind, UnlockOutcome};
