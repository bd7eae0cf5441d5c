//! Authentication
//!
//! Sessions are issued by the external account service. This module
//! only verifies them:
//! - Signed session tokens
//! - Current-user extraction for handlers

mod middleware;
pub mod session;

pub use middleware::CurrentUser;
pub use session::{Session, create_session_token, verify_session_token};
