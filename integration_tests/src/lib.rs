pub mod utils;

pub mod prelude {
    pub use super::utils::{
        calls_matching, commissioned_session, fresh_session, srdo, temp_state_path,
    };
    pub use safecan_client::{
        commission,
        common::{pdo::PdoSlot, srdo::SrdoId, NodeId},
        verify, CommissioningFailure, CommissioningStage, Domain, FailurePolicy,
        MappingComparison, NodeProfile, Session, SimNode, Status, VerificationFailure,
        VerifyOptions,
    };
}
