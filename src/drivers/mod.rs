pub mod imu;
pub mod sim;

pub use imu::{compose_identity, XM_WHO_AM_I, G_WHO_AM_I};
pub use sim::SimulatedGlove;

use crate::error::SensorError;
use crate::signal::Signal;

/// Raw sensor access for the sampling core.
///
/// Board crates implement this over their IMU and flex-sensor drivers. Each
/// call may block on bus I/O; the caller bounds it with a timeout.
#[allow(async_fn_in_trait)]
pub trait SensorSource {
    /// Reads the current value of one signal.
    async fn read(&mut self, signal: Signal) -> Result<f32, SensorError>;

    /// Reads the IMU check value, see [`compose_identity`].
    async fn identity(&mut self) -> Result<u16, SensorError>;
}

impl<T: SensorSource + ?Sized> SensorSource for &mut T {
    async fn read(&mut self, signal: Signal) -> Result<f32, SensorError> {
        T::read(self, signal).await
    }

    async fn identity(&mut self) -> Result<u16, SensorError> {
        T::identity(self).await
    }
}
