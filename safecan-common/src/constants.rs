//! Constants defining standard objects and special values
//!
//!

/// Object indices for standard objects
pub mod object_ids {
    /// The error behavior object index
    pub const ERROR_BEHAVIOR: u16 = 0x1029;
    /// The SRDO configuration valid object index
    pub const SRDO_CONFIGURATION_VALID: u16 = 0x13FE;
}

/// Sub indices of standard objects
pub mod sub_ids {
    /// Sub index of 0x1029 holding the reaction to a communication error
    pub const COMMUNICATION_ERROR_BEHAVIOR: u8 = 2;
}

/// Base offsets used to derive default PDO COB IDs by adding the node ID
pub mod cob_bases {
    /// TPDO1 COB ID base
    pub const TPDO1: u16 = 0x180;
    /// TPDO2 COB ID base
    pub const TPDO2: u16 = 0x280;
    /// TPDO3 COB ID base
    pub const TPDO3: u16 = 0x380;
    /// TPDO4 COB ID base
    pub const TPDO4: u16 = 0x480;
    /// RPDO1 COB ID base
    pub const RPDO1: u16 = 0x200;
    /// RPDO2 COB ID base
    pub const RPDO2: u16 = 0x300;
    /// RPDO3 COB ID base
    pub const RPDO3: u16 = 0x400;
    /// RPDO4 COB ID base
    pub const RPDO4: u16 = 0x500;
}

/// Special values used to access standard objects
pub mod values {
    /// Value of object 0x13FE marking the SRDO configuration as valid. Any other value means the
    /// configuration is invalid.
    pub const SRDO_CONFIGURATION_VALID: u8 = 0xA5;
}

/// Number of SRDO slots on a drive node
pub const SRDO_COUNT: u8 = 16;

/// Number of PDOs in each direction on a drive node
pub const PDO_COUNT: u8 = 4;

/// Largest valid 11-bit CAN identifier
pub const MAX_STD_CAN_ID: u16 = 0x7FF;
