//! Commissioning and verification of the safety configuration of CANOpen drive nodes
//!
//! The two entry points are [`commission`], which writes the configuration described by a
//! [`NodeProfile`] to a node, and [`verify`], which reads the configuration back and compares it
//! with the profile. Both access the node through a [`ParameterClient`] held by a [`Session`].
//!
//! ```no_run
//! use safecan_client::{commission, verify, NodeProfile, Session, SimNode, VerifyOptions};
//!
//! async fn commission_right_wheel() -> Result<(), Box<dyn std::error::Error>> {
//!     let profile = NodeProfile::builtin("right")?;
//!     let mut session = Session::new(SimNode::new());
//!     commission(&mut session, &profile).await?;
//!     verify(&mut session, &profile, VerifyOptions::default()).await?;
//!     Ok(())
//! }
//! ```
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod commission;
pub mod session;
pub mod sim;
pub mod traits;
pub mod verify;

pub use commission::{commission, CommissioningFailure, CommissioningStage};
pub use session::{Session, StepRecord};
pub use sim::{NodeConfig, SimNode, SimStateError};
pub use traits::ParameterClient;
pub use verify::{verify, Domain, FailurePolicy, VerificationFailure, VerifyOptions};

// Re-export types used in the API
pub use safecan_common as common;
pub use safecan_common::{
    safety_word::MappingComparison, NodeProfile, SafetyControlWordId, SafetyFunctionId,
    SafetyWordMapping, Status, StatusResult,
};
