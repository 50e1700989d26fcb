//! Status codes returned by parameter client calls

use int_enum::IntEnum;

/// Status of a remote parameter call
///
/// This is a closed set in which exactly one value, [`Status::Ok`], means success. Every other
/// code is treated uniformly as a failure; none of them is given special meaning by the
/// commissioning or verification sequencers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntEnum)]
#[repr(u8)]
pub enum Status {
    /// Generic failure
    Failed = 0,
    /// The call succeeded
    Ok = 1,
    /// A parameter value was rejected by the node
    InvalidParameter = 2,
    /// The node does not allow the operation in its current state
    NotAllowed = 3,
    /// The node did not answer in time
    Timeout = 4,
    /// The node is busy with a previous request
    Busy = 5,
    /// The client is not connected to the node
    Disconnected = 6,
}

/// Result of a remote parameter call
///
/// The error is never [`Status::Ok`].
pub type StatusResult<T> = Result<T, Status>;

impl Status {
    /// Convert a raw status code received from a client
    ///
    /// Unknown codes are mapped to [`Status::Failed`], since anything but success is a failure.
    pub fn from_raw(code: u8) -> Self {
        Status::try_from(code).unwrap_or(Status::Failed)
    }

    /// Returns true if this is the success status
    pub fn is_ok(&self) -> bool {
        *self == Status::Ok
    }

    /// Convert into a [`StatusResult`] carrying no value
    pub fn into_result(self) -> StatusResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Status::Failed => write!(f, "FAILED"),
            Status::Ok => write!(f, "OK"),
            Status::InvalidParameter => write!(f, "INVALID_PARAMETER"),
            Status::NotAllowed => write!(f, "NOT_ALLOWED"),
            Status::Timeout => write!(f, "TIMEOUT"),
            Status::Busy => write!(f, "BUSY"),
            Status::Disconnected => write!(f, "DISCONNECTED"),
        }
    }
}

impl core::error::Error for Status {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ok_is_success() {
        assert_eq!(Ok(()), Status::from_raw(1).into_result());
        for code in [0u8, 2, 3, 4, 5, 6, 7, 200] {
            let status = Status::from_raw(code);
            assert!(!status.is_ok());
            assert!(status.into_result().is_err());
        }
        assert_eq!(Status::Failed, Status::from_raw(42));
    }
}
