//! Network identity parameters

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// CAN bit rate of a node
///
/// In configuration files, the bit timing is written as the rate in kbit/s, e.g. `1000`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitTiming {
    /// 1 Mbit/s
    Bt1000,
    /// 800 kbit/s
    Bt800,
    /// 500 kbit/s
    Bt500,
    /// 250 kbit/s
    Bt250,
    /// 125 kbit/s
    Bt125,
    /// 50 kbit/s
    Bt50,
    /// 20 kbit/s
    Bt20,
    /// 10 kbit/s
    Bt10,
}

impl BitTiming {
    /// The bit rate in kbit/s
    pub fn kbps(&self) -> u16 {
        match self {
            BitTiming::Bt1000 => 1000,
            BitTiming::Bt800 => 800,
            BitTiming::Bt500 => 500,
            BitTiming::Bt250 => 250,
            BitTiming::Bt125 => 125,
            BitTiming::Bt50 => 50,
            BitTiming::Bt20 => 20,
            BitTiming::Bt10 => 10,
        }
    }
}

/// Error for converting a bit rate into a [`BitTiming`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidBitTimingError(pub u16);

impl core::fmt::Display for InvalidBitTimingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Unsupported bit rate {} kbit/s", self.0)
    }
}
impl core::error::Error for InvalidBitTimingError {}

impl TryFrom<u16> for BitTiming {
    type Error = InvalidBitTimingError;

    fn try_from(kbps: u16) -> Result<Self, Self::Error> {
        match kbps {
            1000 => Ok(BitTiming::Bt1000),
            800 => Ok(BitTiming::Bt800),
            500 => Ok(BitTiming::Bt500),
            250 => Ok(BitTiming::Bt250),
            125 => Ok(BitTiming::Bt125),
            50 => Ok(BitTiming::Bt50),
            20 => Ok(BitTiming::Bt20),
            10 => Ok(BitTiming::Bt10),
            _ => Err(InvalidBitTimingError(kbps)),
        }
    }
}

impl From<BitTiming> for u16 {
    fn from(value: BitTiming) -> Self {
        value.kbps()
    }
}

impl core::fmt::Display for BitTiming {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "BT_{}", self.kbps())
    }
}

/// Network identity of a node
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkParameters {
    /// The node ID
    pub node_id: NodeId,
    /// The CAN bit rate
    pub bit_timing: BitTiming,
    /// Whether real-time (PDO/SRDO) communication is activated
    pub rt_activated: bool,
}
