// vpnhub-session-core - session admission, suppression and reusable
// client-stream core for a VPN broker server

pub mod access;
pub mod config;
pub mod server;
pub mod session;
pub mod stream;
pub mod utils;

pub use utils::error::{Result, SessionError};
