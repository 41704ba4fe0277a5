//! IMU identity check.
//!
//! Runs at IMU bring-up only. Until the module answers with
//! [`IMU_CHECK_KEY`], its data is neither sampled nor marked ready.

use embassy_time::{with_timeout, Duration};

use crate::config::IMU_CHECK_KEY;
use crate::drivers::SensorSource;
use crate::error::{GloveError, SensorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trust {
    Trusted,
    Untrusted,
}

impl Trust {
    pub const fn is_trusted(self) -> bool {
        matches!(self, Trust::Trusted)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IdentityGuard {
    expected: u16,
    trust: Trust,
    last_observed: Option<u16>,
    bring_ups: u32,
}

impl IdentityGuard {
    pub const fn new() -> Self {
        Self::with_key(IMU_CHECK_KEY)
    }

    pub const fn with_key(expected: u16) -> Self {
        Self {
            expected,
            trust: Trust::Untrusted,
            last_observed: None,
            bring_ups: 0,
        }
    }

    /// Pure comparison against the expected key.
    pub const fn verify(&self, observed: u16) -> Trust {
        if observed == self.expected {
            Trust::Trusted
        } else {
            Trust::Untrusted
        }
    }

    /// Reads the check value from `source` and records the verdict.
    pub async fn bring_up<S: SensorSource>(
        &mut self,
        source: &mut S,
        timeout: Duration,
    ) -> Result<(), BringUpError> {
        self.bring_ups = self.bring_ups.wrapping_add(1);
        info!("Checking IMU identity (bring-up #{})...", self.bring_ups);

        let observed = match with_timeout(timeout, source.identity()).await {
            Ok(Ok(key)) => key,
            Ok(Err(e)) => {
                self.trust = Trust::Untrusted;
                warn!("IMU identity read failed: {:?}", e);
                return Err(BringUpError::Read(e));
            }
            Err(_) => {
                self.trust = Trust::Untrusted;
                warn!("IMU identity read timed out");
                return Err(BringUpError::Read(SensorError::Timeout));
            }
        };

        self.last_observed = Some(observed);
        self.trust = self.verify(observed);
        if self.trust.is_trusted() {
            info!("IMU identity verified: 0x{:04X}", observed);
            Ok(())
        } else {
            error!(
                "Invalid IMU identity: 0x{:04X}, expected 0x{:04X}",
                observed, self.expected
            );
            Err(BringUpError::Mismatch(GloveError::IdentityMismatch { observed }))
        }
    }

    /// Forget the previous verdict, e.g. after the IMU was reset.
    pub fn invalidate(&mut self) {
        self.trust = Trust::Untrusted;
    }

    pub const fn trust(&self) -> Trust {
        self.trust
    }

    pub const fn last_observed(&self) -> Option<u16> {
        self.last_observed
    }

    pub const fn bring_ups(&self) -> u32 {
        self.bring_ups
    }
}

impl Default for IdentityGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError {
    /// The check value could not be read at all.
    Read(SensorError),
    /// The check value was read but is wrong.
    Mismatch(GloveError),
}
