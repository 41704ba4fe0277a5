// Centralize all configuration constants
use embassy_time::Duration;

pub const DEVICE_NAME: &str = "SmartGlove";
pub const DATA_REFRESH_RATE_MS: u64 = 500;
pub const SENSOR_READ_TIMEOUT_MS: u64 = 50;

/// Expected identity of the 9DoF module: accel/mag WHO_AM_I in the high byte,
/// gyro WHO_AM_I in the low byte.
pub const IMU_CHECK_KEY: u16 = 0x49D4;

// While untrusted, retry IMU bring-up every N passes (10 s at 500 ms).
pub const IDENTITY_RETRY_PASSES: u32 = 20;
// Passes with every IMU read failing before the IMU is treated as reset.
pub const IMU_FAILURE_THRESHOLD: u32 = 10;
// Consecutive degraded passes before a SensorFault alert goes out.
pub const DEGRADED_ALERT_THRESHOLD: u32 = 10;

// Channel sizes
pub const PASS_CHANNEL_SIZE: usize = 16;
pub const SYSTEM_CHANNEL_SIZE: usize = 32;
pub const READY_SUBSCRIBERS: usize = 4;

/// Runtime knobs for the sampling loop. `Default` matches the constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GloveConfig {
    pub refresh_period: Duration,
    pub read_timeout: Duration,
    pub identity_retry_passes: u32,
    pub imu_failure_threshold: u32,
    pub degraded_alert_threshold: u32,
}

impl GloveConfig {
    pub const fn new() -> Self {
        Self {
            refresh_period: Duration::from_millis(DATA_REFRESH_RATE_MS),
            read_timeout: Duration::from_millis(SENSOR_READ_TIMEOUT_MS),
            identity_retry_passes: IDENTITY_RETRY_PASSES,
            imu_failure_threshold: IMU_FAILURE_THRESHOLD,
            degraded_alert_threshold: DEGRADED_ALERT_THRESHOLD,
        }
    }

    pub const fn with_refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    pub const fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for GloveConfig {
    fn default() -> Self {
        Self::new()
    }
}
