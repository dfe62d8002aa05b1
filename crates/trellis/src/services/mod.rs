//! Mock business collaborators behind the reference pipelines.
//!
//! None of these talk to a real backend. They keep state in memory so the
//! pipelines can be exercised end to end.

pub mod chat;
pub mod login;
pub mod session;

pub use chat::{ChatService, HISTORY_LIMIT};
pub use login::{ApiKeyCredentials, LoginService};
pub use session::{IssuedToken, SessionTokens};
