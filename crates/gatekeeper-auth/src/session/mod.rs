//! Session lifecycle: registration, login, token rotation, logout.

pub mod manager;

pub use manager::{AuthOutcome, Registration, SessionManager};
