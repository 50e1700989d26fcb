//! Common functionality shared among other safecan crates.
//!
//! This crate holds the data model for the safety-relevant configuration of a motor drive node
//! (network identity, PDOs, polarity, velocity ramps, STO, SLS and SRDOs), the safety word mapping
//! codec, and the [`NodeProfile`](profile::NodeProfile) catalog describing the intended
//! configuration of each node role.
//!
//! Most users will have no reason to depend on this crate directly, as it is re-exported by
//! `safecan-client`.
#![warn(missing_docs, missing_copy_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod constants;
pub mod motion;
pub mod network;
pub mod nmt;
pub mod node_id;
pub mod pdo;
pub mod profile;
pub mod safety_word;
pub mod srdo;
pub mod status;

pub use node_id::NodeId;
pub use profile::NodeProfile;
pub use safety_word::{SafetyControlWordId, SafetyFunctionId, SafetyWordMapping};
pub use status::{Status, StatusResult};
