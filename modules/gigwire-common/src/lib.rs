pub mod config;
pub mod fingerprint;
pub mod types;

pub use config::Config;
pub use fingerprint::{content_hash, fingerprint};
pub use types::*;
