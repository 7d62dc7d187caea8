pub mod bridge;
pub mod cli;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod test_utils;

pub use error::{BridgeError, Result};
