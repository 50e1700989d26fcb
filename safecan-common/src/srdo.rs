//! Definitions and data types related to SRDOs

use serde::{Deserialize, Serialize};

use crate::constants::SRDO_COUNT;

/// Number of an SRDO slot (1-16)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SrdoId(u8);

impl SrdoId {
    /// Try to create an SrdoId
    ///
    /// Fails if the number is not a slot present on the node
    pub const fn new(number: u8) -> Result<Self, InvalidSrdoIdError> {
        if number >= 1 && number <= SRDO_COUNT {
            Ok(Self(number))
        } else {
            Err(InvalidSrdoIdError(number))
        }
    }

    /// Get the SRDO number (1-based)
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Get the zero-based index of the slot
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Iterate over every SRDO slot of the node, in order
    pub fn all() -> impl Iterator<Item = SrdoId> {
        (1..=SRDO_COUNT).map(SrdoId)
    }
}

/// Error for converting a u8 into a [`SrdoId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSrdoIdError(pub u8);

impl core::fmt::Display for InvalidSrdoIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid SRDO number {}, must be within 1..={}", self.0, SRDO_COUNT)
    }
}
impl core::error::Error for InvalidSrdoIdError {}

impl TryFrom<u8> for SrdoId {
    type Error = InvalidSrdoIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SrdoId> for u8 {
    fn from(value: SrdoId) -> Self {
        value.0
    }
}

impl core::fmt::Display for SrdoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SRDO_{}", self.0)
    }
}

/// Communication parameters of one SRDO slot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SrdoParameters {
    /// CAN ID of the normal data frame
    pub can_id1: u16,
    /// CAN ID of the inverted data frame
    pub can_id2: u16,
    /// Whether the SRDO is enabled
    pub valid: bool,
    /// Safety cycle time, in ms
    pub sct: u16,
    /// Safety related validation time, in ms
    pub srvt: u8,
}

impl SrdoParameters {
    /// Serialize the record as stored in the node, for signature computation
    pub fn to_le_bytes(&self) -> [u8; 8] {
        let mut bytes = [0; 8];
        bytes[0..2].copy_from_slice(&self.can_id1.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.can_id2.to_le_bytes());
        bytes[4] = self.valid as u8;
        bytes[5..7].copy_from_slice(&self.sct.to_le_bytes());
        bytes[7] = self.srvt;
        bytes
    }
}
