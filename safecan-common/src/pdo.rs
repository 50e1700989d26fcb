//! Definitions and data types related to PDOs

use serde::{Deserialize, Serialize};

use crate::constants::PDO_COUNT;

/// Address of an object dictionary entry, as mapped into a PDO payload
///
/// Each address specifies one sub-object to be included in the PDO data bytes. In configuration
/// files it is written as the raw u32 stored in the PDO mapping object, e.g. `0x6041_00_10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct ObjectAddress {
    /// The object index
    pub index: u16,
    /// The object sub index
    pub sub: u8,
    /// The size of the object to map, in **bits**
    pub size: u8,
}

impl ObjectAddress {
    /// Create a new object address
    pub const fn new(index: u16, sub: u8, size: u8) -> Self {
        Self { index, sub, size }
    }

    /// Convert an ObjectAddress to the u32 representation stored in the PDO mapping object
    pub fn to_object_value(&self) -> u32 {
        ((self.index as u32) << 16) | ((self.sub as u32) << 8) | (self.size as u32)
    }

    /// Create an ObjectAddress from the raw u32 representation stored in the PDO mapping object
    pub fn from_object_value(value: u32) -> Self {
        let index = (value >> 16) as u16;
        let sub = ((value >> 8) & 0xff) as u8;
        let size = (value & 0xff) as u8;
        Self { index, sub, size }
    }
}

impl From<u32> for ObjectAddress {
    fn from(value: u32) -> Self {
        Self::from_object_value(value)
    }
}

impl From<ObjectAddress> for u32 {
    fn from(value: ObjectAddress) -> Self {
        value.to_object_value()
    }
}

impl core::fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{:04X}sub{}:{}", self.index, self.sub, self.size)
    }
}

/// Number of a PDO within its direction (1-4)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PdoId(u8);

impl PdoId {
    /// Try to create a PdoId
    ///
    /// Fails if the number is not within 1..=4
    pub const fn new(number: u8) -> Result<Self, InvalidPdoIdError> {
        if number >= 1 && number <= PDO_COUNT {
            Ok(Self(number))
        } else {
            Err(InvalidPdoIdError(number))
        }
    }

    /// Get the PDO number (1-based)
    pub fn number(&self) -> u8 {
        self.0
    }

    /// Get the zero-based index of the PDO
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }

    /// Iterate over all PDO numbers of one direction
    pub fn all() -> impl Iterator<Item = PdoId> {
        (1..=PDO_COUNT).map(PdoId)
    }
}

/// Error for converting a u8 into a [`PdoId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPdoIdError(pub u8);

impl core::fmt::Display for InvalidPdoIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid PDO number {}, must be within 1..={}", self.0, PDO_COUNT)
    }
}
impl core::error::Error for InvalidPdoIdError {}

impl TryFrom<u8> for PdoId {
    type Error = InvalidPdoIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PdoId> for u8 {
    fn from(value: PdoId) -> Self {
        value.0
    }
}

impl core::fmt::Display for PdoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "PDO_{}", self.0)
    }
}

/// Direction of a PDO, from the node's perspective
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdoDirection {
    /// Transmit PDO (TPDO), sent by the node
    Transmit,
    /// Receive PDO (RPDO), consumed by the node
    Receive,
}

/// A direction-qualified PDO
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PdoSlot {
    /// The direction of the PDO
    pub direction: PdoDirection,
    /// The PDO number
    pub pdo: PdoId,
}

impl PdoSlot {
    /// Create a transmit PDO slot
    pub const fn tpdo(pdo: PdoId) -> Self {
        Self {
            direction: PdoDirection::Transmit,
            pdo,
        }
    }

    /// Create a receive PDO slot
    pub const fn rpdo(pdo: PdoId) -> Self {
        Self {
            direction: PdoDirection::Receive,
            pdo,
        }
    }
}

impl core::fmt::Display for PdoSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.direction {
            PdoDirection::Transmit => write!(f, "TPDO_{}", self.pdo.number()),
            PdoDirection::Receive => write!(f, "RPDO_{}", self.pdo.number()),
        }
    }
}

/// COB ID record of a PDO
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CobId {
    /// The 11-bit CAN ID
    pub can_id: u16,
    /// Whether the PDO is enabled
    pub valid: bool,
    /// Frame format flag
    pub flag: bool,
}

/// The transmission type of a PDO
///
/// In configuration files, it is written as the raw u8 stored in the PDO communication object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PdoTransmissionType {
    /// Synchronous, acyclic (0)
    SyncAcyclic,
    /// Synchronous, every n-th SYNC (1-240)
    Sync(u8),
    /// Synchronous on RTR only (252)
    RtrSync,
    /// Event driven on RTR only (253)
    RtrEvent,
    /// Event driven, manufacturer specific (254)
    EventManufacturer,
    /// Event driven, device profile specific (255)
    EventProfile,
}

/// Error for converting a u8 into a [`PdoTransmissionType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransmissionTypeError(pub u8);

impl core::fmt::Display for InvalidTransmissionTypeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Reserved PDO transmission type {}", self.0)
    }
}
impl core::error::Error for InvalidTransmissionTypeError {}

impl TryFrom<u8> for PdoTransmissionType {
    type Error = InvalidTransmissionTypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::SyncAcyclic),
            1..=240 => Ok(Self::Sync(value)),
            252 => Ok(Self::RtrSync),
            253 => Ok(Self::RtrEvent),
            254 => Ok(Self::EventManufacturer),
            255 => Ok(Self::EventProfile),
            _ => Err(InvalidTransmissionTypeError(value)),
        }
    }
}

impl From<PdoTransmissionType> for u8 {
    fn from(value: PdoTransmissionType) -> Self {
        match value {
            PdoTransmissionType::SyncAcyclic => 0,
            PdoTransmissionType::Sync(n) => n,
            PdoTransmissionType::RtrSync => 252,
            PdoTransmissionType::RtrEvent => 253,
            PdoTransmissionType::EventManufacturer => 254,
            PdoTransmissionType::EventProfile => 255,
        }
    }
}

impl core::fmt::Display for PdoTransmissionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PdoTransmissionType::SyncAcyclic => write!(f, "PDO_SYNC_ACYCLIC"),
            PdoTransmissionType::Sync(n) => write!(f, "PDO_SYNC_{n}"),
            PdoTransmissionType::RtrSync => write!(f, "PDO_RTR_SYNC"),
            PdoTransmissionType::RtrEvent => write!(f, "PDO_RTR_EVENT"),
            PdoTransmissionType::EventManufacturer => write!(f, "PDO_EVENT_MANUFACTURER"),
            PdoTransmissionType::EventProfile => write!(f, "PDO_EVENT_PROFILE"),
        }
    }
}

/// Communication parameters of one PDO
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdoCommunicationParameters {
    /// The COB ID record
    pub cob_id: CobId,
    /// When the PDO is transmitted
    pub transmission_type: PdoTransmissionType,
}

/// Mapping parameters of one PDO
///
/// Only the first `nb` items are active.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdoMappingParameters {
    /// Number of active mapping entries
    pub nb: u8,
    /// The mapped objects, in payload order
    pub items: Vec<ObjectAddress>,
}

impl PdoMappingParameters {
    /// Create a mapping with all `items` active
    pub fn new(items: Vec<ObjectAddress>) -> Self {
        Self {
            nb: items.len() as u8,
            items,
        }
    }

    /// Get the active mapping entries
    pub fn active(&self) -> &[ObjectAddress] {
        let n = (self.nb as usize).min(self.items.len());
        &self.items[..n]
    }

    /// Returns true if `address` is one of the active mapping entries
    pub fn contains(&self, address: &ObjectAddress) -> bool {
        self.active().contains(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_address_layout() {
        let addr = ObjectAddress::from_object_value(0x6064_00_20);
        assert_eq!(ObjectAddress::new(0x6064, 0, 32), addr);
        assert_eq!(0x2620_02_08, ObjectAddress::new(0x2620, 2, 8).to_object_value());
    }

    #[test]
    fn test_transmission_type_ranges() {
        assert_eq!(Ok(PdoTransmissionType::Sync(1)), PdoTransmissionType::try_from(1));
        assert_eq!(
            Ok(PdoTransmissionType::SyncAcyclic),
            PdoTransmissionType::try_from(0)
        );
        assert_eq!(
            Err(InvalidTransmissionTypeError(241)),
            PdoTransmissionType::try_from(241)
        );
        assert_eq!(254, u8::from(PdoTransmissionType::EventManufacturer));
    }

    #[test]
    fn test_inactive_items_are_ignored() {
        let mut mapping = PdoMappingParameters::new(vec![
            ObjectAddress::new(0x6041, 0, 16),
            ObjectAddress::new(0x6064, 0, 32),
        ]);
        mapping.nb = 1;
        assert!(mapping.contains(&ObjectAddress::new(0x6041, 0, 16)));
        assert!(!mapping.contains(&ObjectAddress::new(0x6064, 0, 32)));

        // A count larger than the item list must not panic
        mapping.nb = 8;
        assert_eq!(2, mapping.active().len());
    }

    #[test]
    fn test_slot_names() {
        let pdo = PdoId::new(3).unwrap();
        assert_eq!("TPDO_3", PdoSlot::tpdo(pdo).to_string());
        assert_eq!("RPDO_3", PdoSlot::rpdo(pdo).to_string());
        assert!(PdoId::new(0).is_err());
        assert!(PdoId::new(5).is_err());
        assert_eq!(4, PdoId::all().count());
    }
}
