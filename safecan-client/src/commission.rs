//! Commissioning sequencer
//!
//! Brings a node from factory defaults to the configuration described by a [`NodeProfile`]. The
//! recipe is a fixed, ordered list of steps; each remote call is checked as soon as it returns, and
//! the first failure ends the run. Nothing is rolled back: the only way to recover from a partial
//! run is to commission again, which starts by restoring the factory defaults.

use safecan_common::{
    constants::{object_ids, sub_ids},
    nmt::{NmtCommand, ParameterScope},
    profile::ProfileError,
    srdo::SrdoId,
    NodeProfile, Status, StatusResult,
};
use snafu::{ResultExt, Snafu};

use crate::{session::Session, traits::ParameterClient};

/// The stages of a commissioning run, in execution order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommissioningStage {
    /// Profile checks before any remote call
    Init,
    /// Restore the factory defaults of all parameters
    RestoreFactoryDefaults,
    /// Reset the node to apply the factory defaults
    ResetNode,
    /// Write the network identity
    SetNetworkParameters,
    /// Write the communication record of every PDO
    SetPdoCommunicationParameters,
    /// Write the payload mapping of every mapped PDO
    SetPdoMappingParameters,
    /// Write the motion polarity
    SetPolarityParameters,
    /// Read-modify-write every SRDO slot to disable it
    DisableAllSrdos,
    /// Mark the SRDO configuration invalid while it is edited
    InvalidateSrdoConfiguration,
    /// Write the record of every used SRDO slot
    ConfigureSrdoSlots,
    /// Write the safety word mapping of every used control word
    SetSafetyWordMappings,
    /// Mark the SRDO configuration valid
    ValidateSrdoConfiguration,
    /// Read-modify-write the velocity mode ramps
    SetVelocityRamps,
    /// Read-modify-write the STO record
    SetStoParameters,
    /// Read-modify-write the SLS record
    SetSlsParameters,
    /// Write the communication error behavior object
    SetErrorBehavior,
    /// Save all parameters to the persistent store
    StoreParameters,
    /// Reset the node to apply the stored parameters
    FinalReset,
}

impl core::fmt::Display for CommissioningStage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            CommissioningStage::Init => "init",
            CommissioningStage::RestoreFactoryDefaults => "restore factory defaults",
            CommissioningStage::ResetNode => "reset node",
            CommissioningStage::SetNetworkParameters => "set network parameters",
            CommissioningStage::SetPdoCommunicationParameters => "set PDO communication parameters",
            CommissioningStage::SetPdoMappingParameters => "set PDO mapping parameters",
            CommissioningStage::SetPolarityParameters => "set polarity parameters",
            CommissioningStage::DisableAllSrdos => "disable all SRDOs",
            CommissioningStage::InvalidateSrdoConfiguration => "invalidate SRDO configuration",
            CommissioningStage::ConfigureSrdoSlots => "configure SRDO slots",
            CommissioningStage::SetSafetyWordMappings => "set safety word mappings",
            CommissioningStage::ValidateSrdoConfiguration => "validate SRDO configuration",
            CommissioningStage::SetVelocityRamps => "set velocity ramps",
            CommissioningStage::SetStoParameters => "set STO parameters",
            CommissioningStage::SetSlsParameters => "set SLS parameters",
            CommissioningStage::SetErrorBehavior => "set error behavior",
            CommissioningStage::StoreParameters => "store parameters",
            CommissioningStage::FinalReset => "final reset",
        };
        write!(f, "{name}")
    }
}

/// Error returned by [`commission`]
#[derive(Debug, Snafu)]
pub enum CommissioningFailure {
    /// A remote call returned a failure status
    #[snafu(display("Commissioning failed at {stage}: {step} returned {status}"))]
    RemoteCall {
        /// The stage the failing step belongs to
        stage: CommissioningStage,
        /// Description of the failing step
        step: String,
        /// The status returned by the node
        #[snafu(source)]
        status: Status,
    },
    /// The profile is inconsistent, e.g. a safety word mapping does not fit its control word
    #[snafu(display("Commissioning failed at {stage}: {source}"))]
    InvalidProfile {
        /// The stage which found the problem
        stage: CommissioningStage,
        /// The profile error
        source: ProfileError,
    },
}

impl CommissioningFailure {
    /// The stage at which the run stopped
    pub fn stage(&self) -> CommissioningStage {
        match self {
            CommissioningFailure::RemoteCall { stage, .. } => *stage,
            CommissioningFailure::InvalidProfile { stage, .. } => *stage,
        }
    }
}

type Result<T> = std::result::Result<T, CommissioningFailure>;

impl<C> Session<C> {
    fn commission_step<T>(
        &mut self,
        stage: CommissioningStage,
        step: String,
        result: StatusResult<T>,
    ) -> Result<T> {
        self.record_call(step.clone(), result)
            .context(RemoteCallSnafu { stage, step })
    }
}

/// Commission a node with the configuration of `profile`
///
/// Every step is recorded in the session journal. On failure, the journal ends with the failing
/// step and the node is left in whatever state the completed steps produced.
pub async fn commission<C: ParameterClient>(
    session: &mut Session<C>,
    profile: &NodeProfile,
) -> Result<()> {
    use CommissioningStage as Stage;

    log::info!(
        "Commissioning {} revision {} on node {}",
        profile.name,
        profile.revision,
        profile.node_id
    );
    profile
        .validate()
        .context(InvalidProfileSnafu { stage: Stage::Init })?;

    let r = session
        .client
        .restore_default_parameters(ParameterScope::All)
        .await;
    session.commission_step(
        Stage::RestoreFactoryDefaults,
        format!("Restore factory parameters ({})", ParameterScope::All),
        r,
    )?;

    let r = session.client.set_nmt_state(NmtCommand::ResetNode).await;
    session.commission_step(
        Stage::ResetNode,
        "Reset node to apply factory parameters".into(),
        r,
    )?;

    log::info!("Waiting {} ms for node to restart", profile.settle_delay_ms);
    tokio::time::sleep(profile.settle_delay()).await;

    let network = profile.network();
    let r = session.client.set_network_parameters(&network).await;
    session.commission_step(
        Stage::SetNetworkParameters,
        format!("Set network parameters (node_id={})", network.node_id),
        r,
    )?;

    for pdo in &profile.pdo_communication {
        let params = pdo.parameters(profile.node_id);
        let r = session
            .client
            .set_pdo_communication_parameters(pdo.slot(), &params)
            .await;
        session.commission_step(
            Stage::SetPdoCommunicationParameters,
            format!(
                "Set {} communication parameters (cob_id=0x{:X})",
                pdo.slot(),
                params.cob_id.can_id
            ),
            r,
        )?;
    }

    for pdo in &profile.pdo_mapping {
        let r = session
            .client
            .set_pdo_mapping_parameters(pdo.slot(), &pdo.parameters())
            .await;
        session.commission_step(
            Stage::SetPdoMappingParameters,
            format!("Set {} mapping parameters", pdo.slot()),
            r,
        )?;
    }

    let r = session
        .client
        .set_polarity_parameters(&profile.polarity_parameters())
        .await;
    session.commission_step(
        Stage::SetPolarityParameters,
        format!("Set polarity parameters ({})", profile.polarity),
        r,
    )?;

    disable_all_srdos(session).await?;

    let r = session.client.set_srdo_configuration_valid(false).await;
    session.commission_step(
        Stage::InvalidateSrdoConfiguration,
        "Set SRDO configuration validity (false)".into(),
        r,
    )?;

    for srdo in &profile.srdo {
        let r = session
            .client
            .set_srdo_parameters(srdo.id, &srdo.parameters())
            .await;
        session.commission_step(
            Stage::ConfigureSrdoSlots,
            format!(
                "Set {} parameters (0x{:X}, 0x{:X})",
                srdo.id, srdo.can_id1, srdo.can_id2
            ),
            r,
        )?;
    }

    for srdo in &profile.srdo {
        let Some(mapping) = srdo
            .safety_word_mapping()
            .context(InvalidProfileSnafu {
                stage: Stage::SetSafetyWordMappings,
            })?
        else {
            continue;
        };
        let r = session.client.set_safety_word_mapping(&mapping).await;
        session.commission_step(
            Stage::SetSafetyWordMappings,
            format!("Set {} safety word mapping {mapping}", srdo.id),
            r,
        )?;
    }

    let r = session.client.set_srdo_configuration_valid(true).await;
    session.commission_step(
        Stage::ValidateSrdoConfiguration,
        "Set SRDO configuration validity (true)".into(),
        r,
    )?;

    let r = session.client.get_velocity_mode_parameters().await;
    let mut ramps = session.commission_step(
        Stage::SetVelocityRamps,
        "Get velocity mode parameters".into(),
        r,
    )?;
    ramps.acceleration_delta_speed = profile.velocity_ramps.acceleration_delta_speed;
    ramps.deceleration_delta_speed = profile.velocity_ramps.deceleration_delta_speed;
    let r = session.client.set_velocity_mode_parameters(&ramps).await;
    session.commission_step(
        Stage::SetVelocityRamps,
        format!(
            "Set velocity mode parameters ({}, {})",
            ramps.acceleration_delta_speed, ramps.deceleration_delta_speed
        ),
        r,
    )?;

    let sto_id = profile.sto.id;
    let r = session.client.get_sto_parameters(sto_id).await;
    let mut sto = session.commission_step(
        Stage::SetStoParameters,
        format!("Get {sto_id} parameters"),
        r,
    )?;
    log::debug!("{sto_id} signature before commissioning: 0x{:04X}", sto.signature);
    sto.parameters.restart_acknowledge_behavior = profile.sto.restart_acknowledge_behavior;
    let r = session
        .client
        .set_sto_parameters(sto_id, &sto.parameters)
        .await;
    session.commission_step(
        Stage::SetStoParameters,
        format!(
            "Set {sto_id} parameters ({})",
            sto.parameters.restart_acknowledge_behavior
        ),
        r,
    )?;

    let sls_id = profile.sls.id;
    let expected_sls = profile.sls.parameters();
    let r = session.client.get_sls_parameters(sls_id).await;
    let mut sls = session.commission_step(
        Stage::SetSlsParameters,
        format!("Get {sls_id} parameters"),
        r,
    )?;
    log::debug!("{sls_id} signature before commissioning: 0x{:04X}", sls.signature);
    sls.parameters.velocity_limit = expected_sls.velocity_limit;
    sls.parameters.time_to_velocity_monitoring = expected_sls.time_to_velocity_monitoring;
    sls.parameters.time_for_velocity_in_limits = expected_sls.time_for_velocity_in_limits;
    let r = session
        .client
        .set_sls_parameters(sls_id, &sls.parameters)
        .await;
    session.commission_step(
        Stage::SetSlsParameters,
        format!(
            "Set {sls_id} parameters ({}, {})",
            sls.parameters.velocity_limit, sls.parameters.time_to_velocity_monitoring
        ),
        r,
    )?;

    let r = session
        .client
        .set_value_u8(
            object_ids::ERROR_BEHAVIOR,
            sub_ids::COMMUNICATION_ERROR_BEHAVIOR,
            profile.error_behavior,
        )
        .await;
    session.commission_step(
        Stage::SetErrorBehavior,
        format!("Set error behavior ({})", profile.error_behavior),
        r,
    )?;

    let r = session.client.store_parameters(ParameterScope::All).await;
    session.commission_step(
        Stage::StoreParameters,
        format!("Store parameters ({})", ParameterScope::All),
        r,
    )?;

    let r = session.client.set_nmt_state(NmtCommand::ResetNode).await;
    session.commission_step(
        Stage::FinalReset,
        "Reset node to apply parameters".into(),
        r,
    )?;

    log::info!("Commissioning of {} succeeded", profile.name);
    Ok(())
}

async fn disable_all_srdos<C: ParameterClient>(session: &mut Session<C>) -> Result<()> {
    let stage = CommissioningStage::DisableAllSrdos;
    for id in SrdoId::all() {
        let r = session.client.get_srdo_parameters(id).await;
        let mut srdo = session.commission_step(stage, format!("Get {id} parameters"), r)?;
        srdo.parameters.valid = false;
        let r = session
            .client
            .set_srdo_parameters(id, &srdo.parameters)
            .await;
        session.commission_step(stage, format!("Disable {id}"), r)?;
    }
    Ok(())
}
