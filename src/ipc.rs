use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex as RawMutex, channel::Channel};

use crate::config::*;
use crate::gatt::GloveTable;
use crate::tasks::{PassReport, SystemMessage};

pub type PassChannel = Channel<RawMutex, PassReport, PASS_CHANNEL_SIZE>;
pub type SystemChannel = Channel<RawMutex, SystemMessage, SYSTEM_CHANNEL_SIZE>;

/// Characteristic storage served to the BLE stack.
pub static GLOVE_TABLE: GloveTable = GloveTable::new();

/*  telemetry channels */
pub static PASS_CH: PassChannel = Channel::new();
pub static SYSTEM_CH: SystemChannel = Channel::new();
