#![allow(dead_code)]
use std::path::PathBuf;

use safecan_client::{commission, common::srdo::SrdoId, NodeProfile, Session, SimNode};

pub fn fresh_session() -> Session<SimNode> {
    Session::new(SimNode::new())
}

/// Create a session on a node which has been successfully commissioned with `profile`
///
/// The session journal and the node call log are cleared before returning.
pub async fn commissioned_session(profile: &NodeProfile) -> Session<SimNode> {
    let mut session = fresh_session();
    commission(&mut session, profile)
        .await
        .expect("Commissioning failed");
    session.clear_journal();
    session.client_mut().clear_calls();
    session
}

pub fn srdo(n: u8) -> SrdoId {
    SrdoId::new(n).unwrap()
}

/// Count the calls received by the node which start with `prefix`
pub fn calls_matching(node: &SimNode, prefix: &str) -> usize {
    node.calls().iter().filter(|c| c.starts_with(prefix)).count()
}

/// Get a path for a state file which is unique to the test
pub fn temp_state_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "safecan-{name}-{}.toml",
        std::process::id()
    ));
    std::fs::remove_file(&path).ok();
    path
}
