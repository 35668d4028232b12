pub mod client;
pub mod config;
pub mod daemon;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod providers;
pub mod services;

pub use crate::client::Nestwatch;
pub use crate::config::Config;
pub use crate::error::{NestwatchError, Result};
pub use crate::services::ids::{EntityKind, GeneratedIds};
