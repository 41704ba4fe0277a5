#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible to every other module.
pub(crate) mod fmt;

pub mod buffer;
pub mod codec;
pub mod config;
pub mod drivers;
pub mod error;
pub mod gatt;
pub mod guard;
pub mod ipc;
pub mod publisher;
pub mod scheduler;
pub mod signal;
pub mod tasks;

pub use config::GloveConfig;
pub use drivers::SensorSource;
pub use error::{GloveError, SensorError};
pub use gatt::GloveTable;
pub use signal::{GloveSnapshot, Signal};
pub use tasks::Glove;
