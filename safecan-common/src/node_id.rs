//! Types for representing node IDs
//!

/// A newtype on u8 to enforce a valid, configured node ID (1-127)
///
/// Commissioning always assigns a concrete node ID, so unlike LSS there is no "unconfigured"
/// value here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct NodeId(u8);

impl NodeId {
    /// Try to create a new NodeId
    ///
    /// It will fail if value is invalid (i.e. <1 or >127)
    pub const fn new(value: u8) -> Result<Self, InvalidNodeIdError> {
        if value > 0 && value < 128 {
            Ok(NodeId(value))
        } else {
            Err(InvalidNodeIdError(value))
        }
    }

    /// Get the raw node ID as a u8
    pub fn raw(&self) -> u8 {
        self.0
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for converting u8 to a NodeId
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidNodeIdError(pub u8);

impl core::fmt::Display for InvalidNodeIdError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid node ID {}, must be within 1..=127", self.0)
    }
}
impl core::error::Error for InvalidNodeIdError {}

impl TryFrom<u8> for NodeId {
    type Error = InvalidNodeIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for u8 {
    fn from(value: NodeId) -> Self {
        value.raw()
    }
}
