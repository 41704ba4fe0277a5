//! Ordered commit of one pass into the characteristic table.
//!
//! Data Ready is cleared before the first value write of a pass and set after
//! the last one. A reader that sees Data Ready go to `0x01` therefore sees
//! every value of that pass; a reader that checks Data Ready before and after
//! reading (see [`GloveTable::read_snapshot`]) never mixes two passes.

use crate::codec;
use crate::gatt::{CharacteristicId, GloveStatus, GloveTable};
use crate::signal::{GloveSnapshot, SignalGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    /// Another publisher already owns the table.
    WriterTaken,
}

/// The single writer of a [`GloveTable`]. Dropping it releases the table.
pub struct SnapshotPublisher<'a> {
    table: &'a GloveTable,
}

impl<'a> SnapshotPublisher<'a> {
    pub fn new(table: &'a GloveTable) -> Result<Self, PublishError> {
        if table.claim_writer() {
            Ok(Self { table })
        } else {
            Err(PublishError::WriterTaken)
        }
    }

    pub fn table(&self) -> &'a GloveTable {
        self.table
    }

    /// Commits `snapshot` and returns the new generation.
    ///
    /// The IMU group is written only when `status.imu_trusted` is set;
    /// otherwise its characteristics keep whatever they held before.
    pub fn commit(&mut self, snapshot: &GloveSnapshot, status: GloveStatus) -> u32 {
        let mut pending = self.begin(status);
        pending.write_group(SignalGroup::Imu, snapshot);
        pending.write_group(SignalGroup::Flex, snapshot);
        pending.finish()
    }

    /// Clears Data Ready and starts a commit. Data Ready stays `0x00` until
    /// [`PendingCommit::finish`]; dropping the commit unfinished leaves it so.
    pub fn begin(&mut self, status: GloveStatus) -> PendingCommit<'_, 'a> {
        self.table.clear_ready();
        PendingCommit {
            publisher: self,
            status,
        }
    }
}

/// A commit whose values are being written.
pub struct PendingCommit<'p, 'a> {
    publisher: &'p mut SnapshotPublisher<'a>,
    status: GloveStatus,
}

impl PendingCommit<'_, '_> {
    /// Writes the characteristics of `group`. The IMU group is skipped
    /// unless the commit's status marks the IMU trusted.
    pub fn write_group(&mut self, group: SignalGroup, snapshot: &GloveSnapshot) {
        let table = self.publisher.table;
        match group {
            SignalGroup::Imu if !self.status.imu_trusted => {}
            SignalGroup::Imu => {
                for (id, v) in [
                    (CharacteristicId::Accel, snapshot.accel),
                    (CharacteristicId::Gyro, snapshot.gyro),
                    (CharacteristicId::Mag, snapshot.mag),
                ] {
                    table.write_value(id, &codec::encode_vec3(v.to_array()));
                }
            }
            SignalGroup::Flex => {
                let f = snapshot.fingers;
                for (id, v) in [
                    (CharacteristicId::Thumb, f.thumb),
                    (CharacteristicId::Index, f.index),
                    (CharacteristicId::Middle, f.middle),
                    (CharacteristicId::Ring, f.ring),
                    (CharacteristicId::Pinky, f.pinky),
                ] {
                    table.write_value(id, &codec::encode_f32(v));
                }
            }
        }
    }

    /// Writes the status, bumps the generation and sets Data Ready.
    pub fn finish(self) -> u32 {
        let table = self.publisher.table;
        table.write_status(&self.status);
        let generation = table.mark_ready();
        trace!(
            "Committed pass {} (degraded=0x{:04X})",
            generation,
            self.status.degraded.bits()
        );
        generation
    }
}

impl Drop for SnapshotPublisher<'_> {
    fn drop(&mut self) {
        self.table.release_writer();
    }
}
