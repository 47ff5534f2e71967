//! Bearer token sessions and the routes that issue them.

pub mod http;
mod session;

pub use session::{Session, SessionError, SessionKeys};
