//! Motion and safe motion parameter records
//!
//! Each record is read-modify-written as a unit. Fields which the commissioning recipe does not
//! set (e.g. the ramp delta times) must be written back exactly as they were read.

use serde::{Deserialize, Serialize};

/// Polarity of the drive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolarityParameters {
    /// Velocity demand values are multiplied by -1 when set
    pub velocity_polarity: bool,
    /// Position demand values are multiplied by -1 when set
    pub position_polarity: bool,
}

impl PolarityParameters {
    /// Create a record applying the same polarity to velocity and position
    pub fn uniform(polarity: bool) -> Self {
        Self {
            velocity_polarity: polarity,
            position_polarity: polarity,
        }
    }
}

/// Velocity mode ramps
///
/// A ramp is expressed as a change of speed (`delta_speed`) over a time (`delta_time`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VelocityModeParameters {
    /// Acceleration ramp delta speed
    pub acceleration_delta_speed: u32,
    /// Acceleration ramp delta time
    pub acceleration_delta_time: u16,
    /// Deceleration ramp delta speed
    pub deceleration_delta_speed: u32,
    /// Deceleration ramp delta time
    pub deceleration_delta_time: u16,
}

/// Identifies an STO function instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoId {
    /// The single STO instance of the drive
    #[default]
    #[serde(rename = "STO_1")]
    Sto1,
}

impl StoId {
    /// Zero-based index of the instance
    pub fn index(&self) -> usize {
        match self {
            StoId::Sto1 => 0,
        }
    }
}

impl core::fmt::Display for StoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "STO_{}", self.index() + 1)
    }
}

/// Safe Torque Off parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoParameters {
    /// When true, leaving STO requires an explicit restart acknowledge
    pub restart_acknowledge_behavior: bool,
}

impl StoParameters {
    /// Serialize the record as stored in the node, for signature computation
    pub fn to_le_bytes(&self) -> [u8; 1] {
        [self.restart_acknowledge_behavior as u8]
    }
}

/// Identifies an SLS function instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlsId {
    /// SLS instance 1
    #[default]
    #[serde(rename = "SLS_1")]
    Sls1,
    /// SLS instance 2
    #[serde(rename = "SLS_2")]
    Sls2,
    /// SLS instance 3
    #[serde(rename = "SLS_3")]
    Sls3,
    /// SLS instance 4
    #[serde(rename = "SLS_4")]
    Sls4,
}

impl SlsId {
    /// All SLS instances of the drive
    pub const ALL: [SlsId; 4] = [SlsId::Sls1, SlsId::Sls2, SlsId::Sls3, SlsId::Sls4];

    /// Zero-based index of the instance
    pub fn index(&self) -> usize {
        match self {
            SlsId::Sls1 => 0,
            SlsId::Sls2 => 1,
            SlsId::Sls3 => 2,
            SlsId::Sls4 => 3,
        }
    }
}

impl core::fmt::Display for SlsId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SLS_{}", self.index() + 1)
    }
}

/// Safe Limited Speed parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlsParameters {
    /// The velocity limit
    pub velocity_limit: u32,
    /// Delay after SLS request before the velocity limit is monitored, in ms
    pub time_to_velocity_monitoring: u16,
    /// Time the velocity must stay within the limit before SLS is reported as reached, in ms
    pub time_for_velocity_in_limits: u16,
}

impl SlsParameters {
    /// Serialize the record as stored in the node, for signature computation
    pub fn to_le_bytes(&self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[0..4].copy_from_slice(&self.velocity_limit.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.time_to_velocity_monitoring.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.time_for_velocity_in_limits.to_le_bytes());
        bytes
    }
}

/// Manufacturer specific drive parameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManufacturerParameters {
    /// Proportional gain of the speed controller
    pub speed_pid_p: u32,
    /// Integral gain of the speed controller
    pub speed_pid_i: u32,
    /// Derivative gain of the speed controller
    pub speed_pid_d: u32,
}

/// A safety parameter record returned together with the signature the node computed over it
///
/// The signature is opaque to the sequencers; it is carried along so that callers can log it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signed<T> {
    /// The parameter record
    pub parameters: T,
    /// The node's signature over the stored record
    pub signature: u16,
}
