//! Definitions for NMT commands and parameter store scopes

use int_enum::IntEnum;

/// NMT commands which can be issued to a node
///
/// The discriminant is the command specifier byte sent in the NMT message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum NmtCommand {
    /// Enter the Operational state
    Start = 1,
    /// Enter the Stopped state
    Stop = 2,
    /// Enter the PreOperational state
    EnterPreOperational = 0x80,
    /// Reset the application and communication parameters of the node
    ///
    /// Parameters held in non-volatile storage are reloaded.
    ResetNode = 0x81,
    /// Reset only the communication parameters of the node
    ResetCommunication = 0x82,
}

impl core::fmt::Display for NmtCommand {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NmtCommand::Start => write!(f, "Start"),
            NmtCommand::Stop => write!(f, "Stop"),
            NmtCommand::EnterPreOperational => write!(f, "EnterPreOperational"),
            NmtCommand::ResetNode => write!(f, "ResetNode"),
            NmtCommand::ResetCommunication => write!(f, "ResetCommunication"),
        }
    }
}

/// Selects which block of parameters a store or restore command applies to
///
/// The discriminant is the sub index of the 0x1010/0x1011 objects used for the command.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum ParameterScope {
    /// Every parameter
    All = 1,
    /// Communication parameters (0x1000 - 0x1FFF)
    Communication = 2,
    /// Application parameters (0x6000 - 0x9FFF)
    Application = 3,
    /// Manufacturer specific parameters (0x2000 - 0x5FFF)
    Manufacturer = 4,
}

impl core::fmt::Display for ParameterScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ParameterScope::All => write!(f, "ALL"),
            ParameterScope::Communication => write!(f, "COMMUNICATION"),
            ParameterScope::Application => write!(f, "APPLICATION"),
            ParameterScope::Manufacturer => write!(f, "MANUFACTURER"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_specifiers() {
        assert_eq!(0x81, u8::from(NmtCommand::ResetNode));
        assert_eq!(Ok(NmtCommand::Start), NmtCommand::try_from(1));
        assert!(NmtCommand::try_from(0x83).is_err());
        assert_eq!(Ok(ParameterScope::All), ParameterScope::try_from(1));
    }
}
