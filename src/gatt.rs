//! GATT layout and characteristic storage.
//!
//! [`GloveTable`] is the value store the BLE stack serves reads and
//! notifications from. It has exactly one writer (the [`SnapshotPublisher`])
//! and any number of readers. Each characteristic value is replaced as a
//! whole, and the Data Ready flag orders the writes of a pass against readers.
//!
//! [`SnapshotPublisher`]: crate::publisher::SnapshotPublisher

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::watch::{Receiver, Watch};
use heapless::Vec;
use portable_atomic::{fence, AtomicBool, AtomicU32, AtomicU8, Ordering};
use uuid::Uuid;

use crate::buffer::DegradedMask;
use crate::codec::{self, F32_LEN, VEC3_LEN};
use crate::config::READY_SUBSCRIBERS;
use crate::signal::{FingerAngles, GloveSnapshot, Signal, Vector3};

pub mod uuids {
    pub const IMU_SERVICE: u16 = 0x4000;
    pub const ACCEL_CHAR: u16 = 0x4001;
    pub const GYRO_CHAR: u16 = 0x4002;
    pub const MAG_CHAR: u16 = 0x4003;
    pub const FLEX_SERVICE: u16 = 0x4004;
    pub const THUMB_CHAR: u16 = 0x4005;
    pub const INDEX_CHAR: u16 = 0x4006;
    pub const MIDDLE_CHAR: u16 = 0x4007;
    pub const RING_CHAR: u16 = 0x4008;
    pub const PINKY_CHAR: u16 = 0x4009;
    pub const SMART_SERVICE: u16 = 0x400A;
    pub const DATA_READY_CHAR: u16 = 0x400B;
    pub const STATUS_CHAR: u16 = 0x400C;
}

const BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

/// Bluetooth base UUID 00000000-0000-1000-8000-00805F9B34FB.
pub const BASE_UUID: Uuid = Uuid::from_u128(BASE);

/// Expands a 16-bit UUID onto the Bluetooth base.
pub const fn uuid128(short: u16) -> Uuid {
    Uuid::from_u128(BASE | (short as u128) << 96)
}

pub const MAX_VALUE_LEN: usize = VEC3_LEN;
pub const STATUS_LEN: usize = 3;
pub type CharValue = Vec<u8, MAX_VALUE_LEN>;

pub const DATA_NOT_READY: u8 = 0x00;
pub const DATA_READY: u8 = 0x01;

// GATT characteristic property bits
pub const PROP_READ: u8 = 0x02;
pub const PROP_NOTIFY: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharacteristicId {
    Accel,
    Gyro,
    Mag,
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
    DataReady,
    Status,
}

const DATA_CHARACTERISTICS: usize = 8;

impl CharacteristicId {
    pub const ALL: [CharacteristicId; 10] = [
        CharacteristicId::Accel,
        CharacteristicId::Gyro,
        CharacteristicId::Mag,
        CharacteristicId::Thumb,
        CharacteristicId::Index,
        CharacteristicId::Middle,
        CharacteristicId::Ring,
        CharacteristicId::Pinky,
        CharacteristicId::DataReady,
        CharacteristicId::Status,
    ];

    pub const fn uuid(self) -> u16 {
        match self {
            CharacteristicId::Accel => uuids::ACCEL_CHAR,
            CharacteristicId::Gyro => uuids::GYRO_CHAR,
            CharacteristicId::Mag => uuids::MAG_CHAR,
            CharacteristicId::Thumb => uuids::THUMB_CHAR,
            CharacteristicId::Index => uuids::INDEX_CHAR,
            CharacteristicId::Middle => uuids::MIDDLE_CHAR,
            CharacteristicId::Ring => uuids::RING_CHAR,
            CharacteristicId::Pinky => uuids::PINKY_CHAR,
            CharacteristicId::DataReady => uuids::DATA_READY_CHAR,
            CharacteristicId::Status => uuids::STATUS_CHAR,
        }
    }

    pub fn from_uuid(uuid: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.uuid() == uuid)
    }

    pub const fn service(self) -> u16 {
        match self {
            CharacteristicId::Accel | CharacteristicId::Gyro | CharacteristicId::Mag => {
                uuids::IMU_SERVICE
            }
            CharacteristicId::DataReady | CharacteristicId::Status => uuids::SMART_SERVICE,
            _ => uuids::FLEX_SERVICE,
        }
    }

    /// Payload length in bytes.
    pub const fn payload_len(self) -> usize {
        match self {
            CharacteristicId::Accel | CharacteristicId::Gyro | CharacteristicId::Mag => VEC3_LEN,
            CharacteristicId::DataReady => 1,
            CharacteristicId::Status => STATUS_LEN,
            _ => F32_LEN,
        }
    }

    pub const fn properties(self) -> u8 {
        match self {
            CharacteristicId::DataReady | CharacteristicId::Status => PROP_READ | PROP_NOTIFY,
            _ => PROP_READ,
        }
    }

    /// Signals carried by this characteristic, in payload order.
    pub const fn signals(self) -> &'static [Signal] {
        match self {
            CharacteristicId::Accel => &[Signal::AccelX, Signal::AccelY, Signal::AccelZ],
            CharacteristicId::Gyro => &[Signal::GyroX, Signal::GyroY, Signal::GyroZ],
            CharacteristicId::Mag => &[Signal::MagX, Signal::MagY, Signal::MagZ],
            CharacteristicId::Thumb => &[Signal::Thumb],
            CharacteristicId::Index => &[Signal::Index],
            CharacteristicId::Middle => &[Signal::Middle],
            CharacteristicId::Ring => &[Signal::Ring],
            CharacteristicId::Pinky => &[Signal::Pinky],
            CharacteristicId::DataReady | CharacteristicId::Status => &[],
        }
    }

    const fn slot(self) -> Option<usize> {
        match self {
            CharacteristicId::DataReady | CharacteristicId::Status => None,
            other => Some(other as usize),
        }
    }
}

pub struct ServiceDef {
    pub uuid: u16,
    pub characteristics: &'static [CharacteristicId],
}

/// The three services in registration order.
pub const SERVICES: [ServiceDef; 3] = [
    ServiceDef {
        uuid: uuids::IMU_SERVICE,
        characteristics: &[
            CharacteristicId::Accel,
            CharacteristicId::Gyro,
            CharacteristicId::Mag,
        ],
    },
    ServiceDef {
        uuid: uuids::FLEX_SERVICE,
        characteristics: &[
            CharacteristicId::Thumb,
            CharacteristicId::Index,
            CharacteristicId::Middle,
            CharacteristicId::Ring,
            CharacteristicId::Pinky,
        ],
    },
    ServiceDef {
        uuid: uuids::SMART_SERVICE,
        characteristics: &[CharacteristicId::DataReady, CharacteristicId::Status],
    },
];

const FLAG_IMU_TRUSTED: u8 = 1 << 0;
const FLAG_DEGRADED: u8 = 1 << 1;
const FLAG_OVERRUN: u8 = 1 << 2;

/// Payload of the Status characteristic: `[flags, degraded_lo, degraded_hi]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GloveStatus {
    pub imu_trusted: bool,
    pub degraded: DegradedMask,
    pub overrun: bool,
}

impl GloveStatus {
    pub fn encode(&self) -> [u8; STATUS_LEN] {
        let mut flags = 0;
        if self.imu_trusted {
            flags |= FLAG_IMU_TRUSTED;
        }
        if !self.degraded.is_empty() {
            flags |= FLAG_DEGRADED;
        }
        if self.overrun {
            flags |= FLAG_OVERRUN;
        }
        let [lo, hi] = self.degraded.bits().to_le_bytes();
        [flags, lo, hi]
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let &[flags, lo, hi] = bytes else {
            return None;
        };
        Some(Self {
            imu_trusted: flags & FLAG_IMU_TRUSTED != 0,
            degraded: DegradedMask::from_bits(u16::from_le_bytes([lo, hi])),
            overrun: flags & FLAG_OVERRUN != 0,
        })
    }
}

/// A snapshot a reader obtained while Data Ready stayed set.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PublishedSnapshot {
    pub generation: u32,
    pub snapshot: GloveSnapshot,
    pub status: GloveStatus,
}

type Slot<const N: usize> = Mutex<CriticalSectionRawMutex, Cell<[u8; N]>>;

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Slot<MAX_VALUE_LEN> = Mutex::new(Cell::new([0; MAX_VALUE_LEN]));

pub struct GloveTable {
    values: [Slot<MAX_VALUE_LEN>; DATA_CHARACTERISTICS],
    status: Slot<STATUS_LEN>,
    data_ready: AtomicU8,
    generation: AtomicU32,
    writer_claimed: AtomicBool,
    ready_watch: Watch<CriticalSectionRawMutex, u32, READY_SUBSCRIBERS>,
}

impl GloveTable {
    pub const fn new() -> Self {
        Self {
            values: [EMPTY_SLOT; DATA_CHARACTERISTICS],
            status: Mutex::new(Cell::new([0; STATUS_LEN])),
            data_ready: AtomicU8::new(DATA_NOT_READY),
            generation: AtomicU32::new(0),
            writer_claimed: AtomicBool::new(false),
            ready_watch: Watch::new(),
        }
    }

    /// Serves a GATT read by 16-bit UUID. `None` for unknown characteristics.
    pub fn read(&self, uuid: u16) -> Option<CharValue> {
        CharacteristicId::from_uuid(uuid).map(|c| self.read_characteristic(c))
    }

    pub fn read_characteristic(&self, id: CharacteristicId) -> CharValue {
        let mut raw = [0u8; MAX_VALUE_LEN];
        match id {
            CharacteristicId::DataReady => raw[0] = self.data_ready.load(Ordering::Acquire),
            CharacteristicId::Status => {
                raw[..STATUS_LEN].copy_from_slice(&self.status.lock(|c| c.get()))
            }
            other => {
                if let Some(slot) = other.slot() {
                    raw = self.values[slot].lock(|c| c.get());
                }
            }
        }
        // id.payload_len() <= MAX_VALUE_LEN for every characteristic
        CharValue::from_slice(&raw[..id.payload_len()]).unwrap_or_default()
    }

    pub fn data_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire) == DATA_READY
    }

    /// Number of passes committed so far.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn status(&self) -> GloveStatus {
        GloveStatus::decode(&self.status.lock(|c| c.get())).unwrap_or_default()
    }

    /// Reads every data characteristic and returns them only if Data Ready
    /// stayed set and no commit happened in between.
    pub fn read_snapshot(&self) -> Option<PublishedSnapshot> {
        let generation = self.generation.load(Ordering::Acquire);
        if self.data_ready.load(Ordering::Acquire) != DATA_READY {
            return None;
        }

        let snapshot = self.decode_values();
        let status = self.status();

        fence(Ordering::Acquire);
        if self.data_ready.load(Ordering::Acquire) != DATA_READY
            || self.generation.load(Ordering::Acquire) != generation
        {
            return None;
        }
        Some(PublishedSnapshot {
            generation,
            snapshot,
            status,
        })
    }

    /// Subscribe to Data Ready notifications. Each value is the generation
    /// of a completed pass. `None` once all subscriber slots are taken.
    pub fn subscribe(&self) -> Option<Receiver<'_, CriticalSectionRawMutex, u32, READY_SUBSCRIBERS>> {
        self.ready_watch.receiver()
    }

    fn decode_values(&self) -> GloveSnapshot {
        let vec3 = |id: CharacteristicId| {
            let [x, y, z] = codec::decode_vec3(&self.read_characteristic(id)).unwrap_or_default();
            Vector3::new(x, y, z)
        };
        let scalar = |id: CharacteristicId| {
            codec::decode_scalar(&self.read_characteristic(id)).unwrap_or_default()
        };
        GloveSnapshot {
            accel: vec3(CharacteristicId::Accel),
            gyro: vec3(CharacteristicId::Gyro),
            mag: vec3(CharacteristicId::Mag),
            fingers: FingerAngles {
                thumb: scalar(CharacteristicId::Thumb),
                index: scalar(CharacteristicId::Index),
                middle: scalar(CharacteristicId::Middle),
                ring: scalar(CharacteristicId::Ring),
                pinky: scalar(CharacteristicId::Pinky),
            },
        }
    }

    // ---------- writer side, used by the publisher only ----------

    pub(crate) fn claim_writer(&self) -> bool {
        self.writer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_writer(&self) {
        self.writer_claimed.store(false, Ordering::Release);
    }

    pub(crate) fn clear_ready(&self) {
        self.data_ready.store(DATA_NOT_READY, Ordering::Relaxed);
        // Value writes that follow must not become visible before the clear.
        fence(Ordering::Release);
    }

    pub(crate) fn write_value(&self, id: CharacteristicId, payload: &[u8]) {
        if let Some(slot) = id.slot() {
            let mut value = [0u8; MAX_VALUE_LEN];
            let len = payload.len().min(MAX_VALUE_LEN);
            value[..len].copy_from_slice(&payload[..len]);
            self.values[slot].lock(|c| c.set(value));
        }
    }

    pub(crate) fn write_status(&self, status: &GloveStatus) {
        self.status.lock(|c| c.set(status.encode()));
    }

    /// Bumps the generation and sets Data Ready as the last store of a pass.
    pub(crate) fn mark_ready(&self) -> u32 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.data_ready.store(DATA_READY, Ordering::Release);
        self.ready_watch.sender().send(generation);
        generation
    }
}

impl Default for GloveTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_uuids_expand_onto_base() {
        assert_eq!(
            uuid128(uuids::DATA_READY_CHAR),
            Uuid::parse_str("0000400B-0000-1000-8000-00805F9B34FB").unwrap()
        );
        assert_eq!(uuid128(0), BASE_UUID);
        assert_eq!(
            uuid128(uuids::IMU_SERVICE).to_string(),
            "00004000-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn layout_matches_published_table() {
        let expected = [
            (0x4001, 0x4000, 12),
            (0x4002, 0x4000, 12),
            (0x4003, 0x4000, 12),
            (0x4005, 0x4004, 4),
            (0x4006, 0x4004, 4),
            (0x4007, 0x4004, 4),
            (0x4008, 0x4004, 4),
            (0x4009, 0x4004, 4),
            (0x400B, 0x400A, 1),
            (0x400C, 0x400A, 3),
        ];
        for (id, (uuid, service, len)) in CharacteristicId::ALL.into_iter().zip(expected) {
            assert_eq!(id.uuid(), uuid);
            assert_eq!(id.service(), service);
            assert_eq!(id.payload_len(), len);
            assert_eq!(CharacteristicId::from_uuid(uuid), Some(id));
        }
        for service in SERVICES {
            assert!(service.characteristics.iter().all(|c| c.service() == service.uuid));
        }
    }

    #[test]
    fn every_signal_has_exactly_one_characteristic() {
        for signal in Signal::ALL {
            let owners = CharacteristicId::ALL
                .iter()
                .filter(|c| c.signals().contains(&signal))
                .count();
            assert_eq!(owners, 1, "{}", signal);
        }
    }

    #[test]
    fn fresh_table_is_not_ready() {
        let table = GloveTable::new();
        assert!(!table.data_ready());
        assert_eq!(table.generation(), 0);
        assert_eq!(table.read_snapshot(), None);
        assert_eq!(table.read(uuids::DATA_READY_CHAR).unwrap().as_slice(), &[0]);
        assert_eq!(table.read(uuids::ACCEL_CHAR).unwrap().len(), 12);
        assert_eq!(table.read(uuids::THUMB_CHAR).unwrap().len(), 4);
        assert_eq!(table.read(0x2A19), None);
    }

    #[test]
    fn status_round_trip() {
        let mut degraded = DegradedMask::EMPTY;
        degraded.insert(Signal::GyroY);
        degraded.insert(Signal::Pinky);
        let status = GloveStatus {
            imu_trusted: true,
            degraded,
            overrun: true,
        };
        let bytes = status.encode();
        assert_eq!(bytes, [0b111, 0x10, 0x20]);
        assert_eq!(GloveStatus::decode(&bytes), Some(status));
        assert_eq!(GloveStatus::decode(&bytes[..2]), None);
    }

    #[test]
    fn only_one_writer_at_a_time() {
        let table = GloveTable::new();
        assert!(table.claim_writer());
        assert!(!table.claim_writer());
        table.release_writer();
        assert!(table.claim_writer());
    }
}
