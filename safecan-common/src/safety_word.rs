//! Safety word mapping codec
//!
//! A safety control word is a bitfield in which each bit is assigned a safety function. When the
//! bit is asserted, the node triggers the function mapped to it. The mapping is configured per
//! control word as an ordered list of [`SafetyFunctionId`], where the position in the list is the
//! bit number.
//!
//! Assigning the correct function to the wrong bit silently changes which input triggers which
//! safety reaction, so mappings are always compared positionally, never as sets.
//!
//! ```
//! use safecan_common::safety_word::{SafetyControlWordId, SafetyFunctionId, SafetyWordMapping};
//!
//! let mapping = SafetyWordMapping::encode(
//!     SafetyControlWordId::Can2,
//!     &[SafetyFunctionId::Sto, SafetyFunctionId::Sto],
//! )
//! .unwrap();
//! assert_eq!(8, mapping.decode().len());
//! assert_eq!(0b11, mapping.mask_of(SafetyFunctionId::Sto));
//! ```

use int_enum::IntEnum;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// The widest safety control word supported, in bits
pub const MAX_WIDTH: usize = 8;

/// A safety function which can be mapped onto a control word bit
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, IntEnum, Serialize, Deserialize)]
#[repr(u8)]
pub enum SafetyFunctionId {
    /// No function is mapped to the bit
    #[default]
    #[serde(rename = "NONE")]
    None = 0,
    /// Safe Torque Off
    #[serde(rename = "STO")]
    Sto = 1,
    /// Safe Brake Control
    #[serde(rename = "SBC")]
    Sbc = 2,
    /// Safe Stop 1
    #[serde(rename = "SS1")]
    Ss1 = 3,
    /// Safe Direction, positive, instance 1
    #[serde(rename = "SDIP_1")]
    Sdip1 = 4,
    /// Safe Direction, negative, instance 1
    #[serde(rename = "SDIN_1")]
    Sdin1 = 5,
    /// Safe Limited Speed, instance 1
    #[serde(rename = "SLS_1")]
    Sls1 = 6,
    /// Safe Limited Speed, instance 2
    #[serde(rename = "SLS_2")]
    Sls2 = 7,
    /// Safe Limited Speed, instance 3
    #[serde(rename = "SLS_3")]
    Sls3 = 8,
    /// Safe Limited Speed, instance 4
    #[serde(rename = "SLS_4")]
    Sls4 = 9,
}

impl core::fmt::Display for SafetyFunctionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            SafetyFunctionId::None => "NONE",
            SafetyFunctionId::Sto => "STO",
            SafetyFunctionId::Sbc => "SBC",
            SafetyFunctionId::Ss1 => "SS1",
            SafetyFunctionId::Sdip1 => "SDIP_1",
            SafetyFunctionId::Sdin1 => "SDIN_1",
            SafetyFunctionId::Sls1 => "SLS_1",
            SafetyFunctionId::Sls2 => "SLS_2",
            SafetyFunctionId::Sls3 => "SLS_3",
            SafetyFunctionId::Sls4 => "SLS_4",
        };
        write!(f, "{name}")
    }
}

/// Identifies a safety control word, i.e. the source of the bits a mapping applies to
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SafetyControlWordId {
    /// Control word received over CAN, instance 1
    #[serde(rename = "CAN_1")]
    Can1,
    /// Control word received over CAN, instance 2
    #[serde(rename = "CAN_2")]
    Can2,
    /// Control word built from the hardware safe inputs
    #[serde(rename = "SAFEIN_1")]
    SafeIn1,
}

impl SafetyControlWordId {
    /// All control words of the node
    pub const ALL: [SafetyControlWordId; 3] = [Self::Can1, Self::Can2, Self::SafeIn1];

    /// The number of bits in the control word
    pub const fn width(&self) -> usize {
        match self {
            SafetyControlWordId::Can1 | SafetyControlWordId::Can2 => 8,
            SafetyControlWordId::SafeIn1 => 6,
        }
    }
}

impl core::fmt::Display for SafetyControlWordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SafetyControlWordId::Can1 => write!(f, "CAN_1"),
            SafetyControlWordId::Can2 => write!(f, "CAN_2"),
            SafetyControlWordId::SafeIn1 => write!(f, "SAFEIN_1"),
        }
    }
}

/// Selects how an expected function list is compared to a mapping read from a node
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MappingComparison {
    /// Only the bits covered by the expected list are compared
    ///
    /// Bits beyond the end of the expected list may hold any function.
    #[default]
    Prefix,
    /// Every bit of the control word is compared, with the expected list padded with
    /// [`SafetyFunctionId::None`]
    FullWidth,
}

/// Error returned when building a [`SafetyWordMapping`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Snafu)]
pub enum MappingError {
    /// More functions were provided than the control word has bits
    #[snafu(display("{len} safety functions do not fit in the {width} bits of {target}"))]
    InvalidMappingLength {
        /// The targeted control word
        target: SafetyControlWordId,
        /// The number of functions provided
        len: usize,
        /// The width of the control word
        width: usize,
    },
    /// A wire encoded mapping did not have exactly one byte per control word bit
    #[snafu(display("Wire mapping for {target} has {len} bytes, expected {}", target.width()))]
    InvalidWireLength {
        /// The targeted control word
        target: SafetyControlWordId,
        /// The number of bytes received
        len: usize,
    },
    /// A wire encoded mapping held a code which is not a known safety function
    #[snafu(display("Unknown safety function code {code} at bit {bit} of {target}"))]
    UnknownSafetyFunction {
        /// The targeted control word
        target: SafetyControlWordId,
        /// The bit holding the code
        bit: usize,
        /// The unknown code
        code: u8,
    },
}

/// The assignment of safety functions to the bits of one safety control word
///
/// The mapping always has exactly [`SafetyControlWordId::width()`] positions. Positions which were
/// not assigned hold [`SafetyFunctionId::None`]. Equality is positional.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SafetyWordMapping {
    target: SafetyControlWordId,
    // Positions at or beyond target.width() are always None
    functions: [SafetyFunctionId; MAX_WIDTH],
}

impl SafetyWordMapping {
    /// Create a mapping with no function assigned to any bit
    pub const fn empty(target: SafetyControlWordId) -> Self {
        Self {
            target,
            functions: [SafetyFunctionId::None; MAX_WIDTH],
        }
    }

    /// Build a mapping from an ordered list of functions, where index `i` is assigned to bit `i`
    ///
    /// Bits beyond the end of the list are assigned [`SafetyFunctionId::None`]. Fails if the list
    /// is longer than the width of `target`.
    pub fn encode(
        target: SafetyControlWordId,
        functions: &[SafetyFunctionId],
    ) -> Result<Self, MappingError> {
        let width = target.width();
        if functions.len() > width {
            return InvalidMappingLengthSnafu {
                target,
                len: functions.len(),
                width,
            }
            .fail();
        }
        let mut mapping = Self::empty(target);
        mapping.functions[..functions.len()].copy_from_slice(functions);
        Ok(mapping)
    }

    /// Get the function assigned to each bit of the control word, from bit 0 up
    ///
    /// The returned list always has the full width of the control word.
    pub fn decode(&self) -> Vec<SafetyFunctionId> {
        self.as_slice().to_vec()
    }

    /// The control word this mapping applies to
    pub fn target(&self) -> SafetyControlWordId {
        self.target
    }

    /// The number of bits in the mapping
    pub fn width(&self) -> usize {
        self.target.width()
    }

    /// Get the function assigned to a bit
    ///
    /// Returns None if the bit is beyond the width of the control word
    pub fn get(&self, bit: usize) -> Option<SafetyFunctionId> {
        self.as_slice().get(bit).copied()
    }

    /// View the assigned functions as a slice of the full control word width
    pub fn as_slice(&self) -> &[SafetyFunctionId] {
        &self.functions[..self.width()]
    }

    /// Get a bitmask of the control word bits which trigger `function`
    pub fn mask_of(&self, function: SafetyFunctionId) -> u8 {
        self.as_slice()
            .iter()
            .enumerate()
            .filter(|(_, f)| **f == function)
            .fold(0, |mask, (bit, _)| mask | (1 << bit))
    }

    /// Check whether this mapping matches an expected list of functions
    ///
    /// With [`MappingComparison::Prefix`], `expected[i]` must equal bit `i` for every `i` in
    /// `0..expected.len()` and higher bits are not checked. With [`MappingComparison::FullWidth`],
    /// the higher bits must also be [`SafetyFunctionId::None`]. An expected list longer than the
    /// control word never matches.
    pub fn matches(&self, expected: &[SafetyFunctionId], comparison: MappingComparison) -> bool {
        if expected.len() > self.width() {
            return false;
        }
        let (covered, rest) = self.as_slice().split_at(expected.len());
        if covered != expected {
            return false;
        }
        match comparison {
            MappingComparison::Prefix => true,
            MappingComparison::FullWidth => rest.iter().all(|f| *f == SafetyFunctionId::None),
        }
    }

    /// Encode the mapping for transmission: one function code byte per control word bit
    pub fn to_wire(&self) -> Vec<u8> {
        self.as_slice().iter().map(|f| u8::from(*f)).collect()
    }

    /// Decode a mapping received from a node
    ///
    /// `bytes` must hold exactly one known function code per bit of `target`.
    pub fn from_wire(target: SafetyControlWordId, bytes: &[u8]) -> Result<Self, MappingError> {
        if bytes.len() != target.width() {
            return InvalidWireLengthSnafu {
                target,
                len: bytes.len(),
            }
            .fail();
        }
        let mut mapping = Self::empty(target);
        for (bit, code) in bytes.iter().enumerate() {
            mapping.functions[bit] = SafetyFunctionId::try_from(*code).map_err(|_| {
                UnknownSafetyFunctionSnafu {
                    target,
                    bit,
                    code: *code,
                }
                .build()
            })?;
        }
        Ok(mapping)
    }
}

impl core::fmt::Display for SafetyWordMapping {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}[", self.target)?;
        for (i, function) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{function}")?;
        }
        write!(f, "]")
    }
}
