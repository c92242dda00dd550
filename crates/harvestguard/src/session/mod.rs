//! Client session: bearer token and role, persisted across runs.

mod store;

pub use store::{Session, SessionError, SessionStore, DEFAULT_ROLE};
