// The 9DoF module carries two dies, accelerometer/magnetometer (XM) and
// gyroscope (G), each answering its own WHO_AM_I register.
pub const XM_WHO_AM_I: u8 = 0x49;
pub const G_WHO_AM_I: u8 = 0xD4;

/// Combines both WHO_AM_I bytes into the 16-bit check value the identity
/// guard compares against `IMU_CHECK_KEY` (XM in the high byte).
pub const fn compose_identity(xm_id: u8, g_id: u8) -> u16 {
    ((xm_id as u16) << 8) | g_id as u16
}
