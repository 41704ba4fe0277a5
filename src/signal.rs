use bytemuck::{Pod, Zeroable};

pub const SIGNAL_COUNT: usize = 14;
pub const IMU_SIGNAL_COUNT: usize = 9;

/// One published scalar. The discriminant is the signal's index in
/// [`GloveSnapshot`] and its bit in a degraded mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Signal {
    AccelX = 0,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
    MagX,
    MagY,
    MagZ,
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalGroup {
    Imu,
    Flex,
}

impl Signal {
    pub const ALL: [Signal; SIGNAL_COUNT] = [
        Signal::AccelX,
        Signal::AccelY,
        Signal::AccelZ,
        Signal::GyroX,
        Signal::GyroY,
        Signal::GyroZ,
        Signal::MagX,
        Signal::MagY,
        Signal::MagZ,
        Signal::Thumb,
        Signal::Index,
        Signal::Middle,
        Signal::Ring,
        Signal::Pinky,
    ];

    pub const IMU: [Signal; IMU_SIGNAL_COUNT] = [
        Signal::AccelX,
        Signal::AccelY,
        Signal::AccelZ,
        Signal::GyroX,
        Signal::GyroY,
        Signal::GyroZ,
        Signal::MagX,
        Signal::MagY,
        Signal::MagZ,
    ];

    pub const FLEX: [Signal; 5] = [
        Signal::Thumb,
        Signal::Index,
        Signal::Middle,
        Signal::Ring,
        Signal::Pinky,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn group(self) -> SignalGroup {
        if self.index() < IMU_SIGNAL_COUNT {
            SignalGroup::Imu
        } else {
            SignalGroup::Flex
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Signal::AccelX => "accel-x",
            Signal::AccelY => "accel-y",
            Signal::AccelZ => "accel-z",
            Signal::GyroX => "gyro-x",
            Signal::GyroY => "gyro-y",
            Signal::GyroZ => "gyro-z",
            Signal::MagX => "mag-x",
            Signal::MagY => "mag-y",
            Signal::MagZ => "mag-z",
            Signal::Thumb => "thumb",
            Signal::Index => "index",
            Signal::Middle => "middle",
            Signal::Ring => "ring",
            Signal::Pinky => "pinky",
        }
    }
}

impl SignalGroup {
    pub const fn signals(self) -> &'static [Signal] {
        match self {
            SignalGroup::Imu => &Signal::IMU,
            SignalGroup::Flex => &Signal::FLEX,
        }
    }
}

impl core::fmt::Display for Signal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Zeroable, Pod)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Zeroable, Pod)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FingerAngles {
    pub thumb: f32,
    pub index: f32,
    pub middle: f32,
    pub ring: f32,
    pub pinky: f32,
}

/// Value of every signal from one pass, laid out in [`Signal`] order.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Zeroable, Pod)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GloveSnapshot {
    pub accel: Vector3,
    pub gyro: Vector3,
    pub mag: Vector3,
    pub fingers: FingerAngles,
}

impl GloveSnapshot {
    pub const ZERO: Self = Self {
        accel: Vector3::ZERO,
        gyro: Vector3::ZERO,
        mag: Vector3::ZERO,
        fingers: FingerAngles {
            thumb: 0.0,
            index: 0.0,
            middle: 0.0,
            ring: 0.0,
            pinky: 0.0,
        },
    };

    pub fn as_array(&self) -> &[f32; SIGNAL_COUNT] {
        bytemuck::cast_ref(self)
    }

    pub fn as_array_mut(&mut self) -> &mut [f32; SIGNAL_COUNT] {
        bytemuck::cast_mut(self)
    }

    pub fn from_array(values: [f32; SIGNAL_COUNT]) -> Self {
        bytemuck::cast(values)
    }

    #[inline]
    pub fn get(&self, signal: Signal) -> f32 {
        self.as_array()[signal.index()]
    }

    #[inline]
    pub fn set(&mut self, signal: Signal, value: f32) {
        self.as_array_mut()[signal.index()] = value;
    }

    /// Bitwise comparison, so that NaN samples and signed zeros compare as sent.
    pub fn same_bits(&self, other: &Self) -> bool {
        bytemuck::bytes_of(self) == bytemuck::bytes_of(other)
    }
}
