pub mod auth;
pub mod constants;
pub mod decoder;
pub mod health;
pub mod ingress;
pub mod logging;
pub mod main_helper;
pub mod projection;
pub mod repair;
pub mod str_utils;
pub mod streaming;
pub mod toolchain;
pub mod types;
pub mod upstream;

pub use types::*;

pub use main_helper::{AppState, Args};
