pub mod credentials;
pub mod guard;
pub mod password;
pub mod session;
pub mod single_session;

pub use guard::{CurrentUser, admin_required, auth_required};
pub use session::{SESSION_COOKIE, SessionData, SessionStore};
