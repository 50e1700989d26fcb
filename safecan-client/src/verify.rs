//! Verification sequencer
//!
//! Reads back the live configuration of a node and compares it field by field with a
//! [`NodeProfile`]. Comparisons are exact. Domains are checked in a fixed order, and by default
//! the first mismatch ends the run without reading any later domain.

use safecan_common::{
    constants::{object_ids, sub_ids},
    motion::{SlsId, StoId},
    pdo::PdoSlot,
    profile::ProfileError,
    safety_word::{MappingComparison, SafetyWordMapping},
    srdo::SrdoId,
    NodeProfile, SafetyControlWordId, Status,
};
use snafu::{ResultExt, Snafu};

use crate::{session::Session, traits::ParameterClient};

/// A configuration domain checked by [`verify`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Node ID, bit timing and RT flag
    Network,
    /// Communication record of one PDO
    PdoCommunication(PdoSlot),
    /// Payload mapping of one PDO
    PdoMapping(PdoSlot),
    /// Velocity and position polarity
    Polarity,
    /// Record of one SRDO slot
    Srdo(SrdoId),
    /// Safety word mapping of the control word fed by an SRDO
    SafetyWordMapping {
        /// The SRDO feeding the control word
        srdo: SrdoId,
        /// The control word
        control_word: SafetyControlWordId,
    },
    /// The global SRDO configuration validity flag
    SrdoConfigurationValidity,
    /// Velocity mode ramps
    VelocityRamps,
    /// STO record
    Sto(StoId),
    /// SLS record
    Sls(SlsId),
    /// Communication error behavior object
    ErrorBehavior,
    /// Manufacturer speed controller gains
    Manufacturer,
}

impl core::fmt::Display for Domain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Domain::Network => write!(f, "network parameters"),
            Domain::PdoCommunication(slot) => write!(f, "{slot} communication parameters"),
            Domain::PdoMapping(slot) => write!(f, "{slot} mapping parameters"),
            Domain::Polarity => write!(f, "polarity parameters"),
            Domain::Srdo(id) => write!(f, "{id} parameters"),
            Domain::SafetyWordMapping { srdo, control_word } => {
                write!(f, "{srdo} safety word mapping {control_word}")
            }
            Domain::SrdoConfigurationValidity => write!(f, "SRDO configuration validity"),
            Domain::VelocityRamps => write!(f, "velocity mode parameters"),
            Domain::Sto(id) => write!(f, "{id} parameters"),
            Domain::Sls(id) => write!(f, "{id} parameters"),
            Domain::ErrorBehavior => write!(f, "error behavior"),
            Domain::Manufacturer => write!(f, "manufacturer parameters"),
        }
    }
}

/// What to do when a domain fails verification
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// End the run at the first failing domain
    #[default]
    StopAtFirst,
    /// Check every domain and report all failures
    CollectAll,
}

/// Options for [`verify`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// How safety word mappings are compared
    pub mapping_comparison: MappingComparison,
    /// Whether to stop at the first failing domain
    pub failure_policy: FailurePolicy,
}

/// Error returned by [`verify`]
#[derive(Debug, Snafu)]
pub enum VerificationFailure {
    /// A read returned a failure status
    #[snafu(display("Reading {domain} failed with status {status}"))]
    RemoteCall {
        /// The domain being read
        domain: Domain,
        /// The status returned by the node
        #[snafu(source)]
        status: Status,
    },
    /// A value read from the node differs from the profile
    #[snafu(display("{domain}: {field} is {actual}, expected {expected}"))]
    Mismatch {
        /// The domain holding the value
        domain: Domain,
        /// The field which differs
        field: String,
        /// The value from the profile
        expected: String,
        /// The value read from the node
        actual: String,
    },
    /// The profile is inconsistent
    #[snafu(display("Invalid profile: {source}"))]
    InvalidProfile {
        /// The profile error
        source: ProfileError,
    },
    /// More than one domain failed, see [`FailurePolicy::CollectAll`]
    #[snafu(display("{} domains failed verification", failures.len()))]
    Multiple {
        /// The failures, in check order
        failures: Vec<VerificationFailure>,
    },
}

impl VerificationFailure {
    /// The domain which failed, if the failure concerns a single domain
    pub fn domain(&self) -> Option<Domain> {
        match self {
            VerificationFailure::RemoteCall { domain, .. } => Some(*domain),
            VerificationFailure::Mismatch { domain, .. } => Some(*domain),
            _ => None,
        }
    }
}

type Result<T> = std::result::Result<T, VerificationFailure>;

fn compare<T: PartialEq + core::fmt::Display>(
    domain: Domain,
    field: &str,
    expected: T,
    actual: T,
) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        MismatchSnafu {
            domain,
            field,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .fail()
    }
}

fn compare_mapping(
    domain: Domain,
    expected: &SafetyWordMapping,
    expected_len: usize,
    actual: &SafetyWordMapping,
    comparison: MappingComparison,
) -> Result<()> {
    compare(domain, "control word", expected.target(), actual.target())?;
    let expected_list = &expected.as_slice()[..expected_len];
    if actual.matches(expected_list, comparison) {
        return Ok(());
    }
    let checked = match comparison {
        MappingComparison::Prefix => expected_len,
        MappingComparison::FullWidth => expected.width(),
    };
    let bit = (0..checked)
        .find(|&i| expected.get(i) != actual.get(i))
        .unwrap_or(0);
    MismatchSnafu {
        domain,
        field: format!("bit {bit}"),
        expected: expected.get(bit).map(|f| f.to_string()).unwrap_or_default(),
        actual: actual.get(bit).map(|f| f.to_string()).unwrap_or_default(),
    }
    .fail()
}

struct Verifier<'a, C> {
    session: &'a mut Session<C>,
    options: VerifyOptions,
    failures: Vec<VerificationFailure>,
}

impl<C: ParameterClient> Verifier<'_, C> {
    /// Record the outcome of one domain
    ///
    /// Returns an error if the run must stop.
    fn finish(&mut self, domain: Domain, result: Result<()>) -> Result<()> {
        self.session.record(format!("Check {domain}"), result.is_ok());
        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("{e}");
                match self.options.failure_policy {
                    FailurePolicy::StopAtFirst => Err(e),
                    FailurePolicy::CollectAll => {
                        self.failures.push(e);
                        Ok(())
                    }
                }
            }
        }
    }

    async fn network(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::Network;
        let expected = profile.network();
        let actual = self
            .session
            .client
            .get_network_parameters()
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "node_id", expected.node_id, actual.node_id)?;
        compare(domain, "bit_timing", expected.bit_timing, actual.bit_timing)?;
        compare(domain, "rt_activated", expected.rt_activated, actual.rt_activated)
    }

    async fn pdo_communication(&mut self, profile: &NodeProfile, slot: PdoSlot) -> Result<()> {
        let domain = Domain::PdoCommunication(slot);
        let Some(pdo) = profile.pdo_communication(slot) else {
            return Ok(());
        };
        let expected = pdo.parameters(profile.node_id);
        let actual = self
            .session
            .client
            .get_pdo_communication_parameters(slot)
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "cob_id.can_id", expected.cob_id.can_id, actual.cob_id.can_id)?;
        compare(domain, "cob_id.valid", expected.cob_id.valid, actual.cob_id.valid)?;
        compare(domain, "cob_id.flag", expected.cob_id.flag, actual.cob_id.flag)?;
        compare(
            domain,
            "transmission_type",
            expected.transmission_type,
            actual.transmission_type,
        )
    }

    async fn pdo_mapping(&mut self, profile: &NodeProfile, index: usize) -> Result<()> {
        let pdo = &profile.pdo_mapping[index];
        let domain = Domain::PdoMapping(pdo.slot());
        let actual = self
            .session
            .client
            .get_pdo_mapping_parameters(pdo.slot())
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "nb", pdo.items.len(), actual.nb as usize)?;
        // Order of the mapped objects is not checked
        for item in &pdo.items {
            if !actual.contains(item) {
                let mapped: Vec<String> =
                    actual.active().iter().map(|a| a.to_string()).collect();
                return MismatchSnafu {
                    domain,
                    field: "items",
                    expected: format!("{item} mapped"),
                    actual: format!("[{}]", mapped.join(", ")),
                }
                .fail();
            }
        }
        Ok(())
    }

    async fn polarity(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::Polarity;
        let expected = profile.polarity_parameters();
        let actual = self
            .session
            .client
            .get_polarity_parameters()
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(
            domain,
            "velocity_polarity",
            expected.velocity_polarity,
            actual.velocity_polarity,
        )?;
        compare(
            domain,
            "position_polarity",
            expected.position_polarity,
            actual.position_polarity,
        )
    }

    async fn unused_srdo(&mut self, id: SrdoId) -> Result<()> {
        let domain = Domain::Srdo(id);
        let actual = self
            .session
            .client
            .get_srdo_parameters(id)
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "valid", false, actual.parameters.valid)
    }

    async fn used_srdo(&mut self, profile: &NodeProfile, index: usize) -> Result<()> {
        let srdo = &profile.srdo[index];
        let domain = Domain::Srdo(srdo.id);
        let expected = srdo.parameters();
        let actual = self
            .session
            .client
            .get_srdo_parameters(srdo.id)
            .await
            .context(RemoteCallSnafu { domain })?;
        log::debug!("{} signature 0x{:04X}", srdo.id, actual.signature);
        let actual = actual.parameters;
        compare(domain, "can_id1", expected.can_id1, actual.can_id1)?;
        compare(domain, "can_id2", expected.can_id2, actual.can_id2)?;
        compare(domain, "valid", expected.valid, actual.valid)?;
        compare(domain, "sct", expected.sct, actual.sct)?;
        compare(domain, "srvt", expected.srvt, actual.srvt)
    }

    async fn safety_word_mapping(
        &mut self,
        srdo: SrdoId,
        expected: &SafetyWordMapping,
        expected_len: usize,
    ) -> Result<()> {
        let domain = Domain::SafetyWordMapping {
            srdo,
            control_word: expected.target(),
        };
        let actual = self
            .session
            .client
            .get_safety_word_mapping(expected.target())
            .await
            .context(RemoteCallSnafu { domain })?;
        compare_mapping(
            domain,
            expected,
            expected_len,
            &actual,
            self.options.mapping_comparison,
        )
    }

    async fn srdo_configuration_validity(&mut self) -> Result<()> {
        let domain = Domain::SrdoConfigurationValidity;
        let valid = self
            .session
            .client
            .get_srdo_configuration_valid()
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "valid", true, valid)
    }

    async fn velocity_ramps(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::VelocityRamps;
        let expected = profile.velocity_ramps;
        let actual = self
            .session
            .client
            .get_velocity_mode_parameters()
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(
            domain,
            "acceleration_delta_speed",
            expected.acceleration_delta_speed,
            actual.acceleration_delta_speed,
        )?;
        compare(
            domain,
            "deceleration_delta_speed",
            expected.deceleration_delta_speed,
            actual.deceleration_delta_speed,
        )
    }

    async fn sto(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::Sto(profile.sto.id);
        let expected = profile.sto.parameters();
        let actual = self
            .session
            .client
            .get_sto_parameters(profile.sto.id)
            .await
            .context(RemoteCallSnafu { domain })?;
        log::debug!("{} signature 0x{:04X}", profile.sto.id, actual.signature);
        compare(
            domain,
            "restart_acknowledge_behavior",
            expected.restart_acknowledge_behavior,
            actual.parameters.restart_acknowledge_behavior,
        )
    }

    async fn sls(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::Sls(profile.sls.id);
        let expected = profile.sls.parameters();
        let actual = self
            .session
            .client
            .get_sls_parameters(profile.sls.id)
            .await
            .context(RemoteCallSnafu { domain })?;
        log::debug!("{} signature 0x{:04X}", profile.sls.id, actual.signature);
        let actual = actual.parameters;
        compare(
            domain,
            "velocity_limit",
            expected.velocity_limit,
            actual.velocity_limit,
        )?;
        compare(
            domain,
            "time_to_velocity_monitoring",
            expected.time_to_velocity_monitoring,
            actual.time_to_velocity_monitoring,
        )?;
        compare(
            domain,
            "time_for_velocity_in_limits",
            expected.time_for_velocity_in_limits,
            actual.time_for_velocity_in_limits,
        )
    }

    async fn error_behavior(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::ErrorBehavior;
        let value = self
            .session
            .client
            .get_value_u8(object_ids::ERROR_BEHAVIOR, sub_ids::COMMUNICATION_ERROR_BEHAVIOR)
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "value", profile.error_behavior, value)
    }

    async fn manufacturer(&mut self, profile: &NodeProfile) -> Result<()> {
        let domain = Domain::Manufacturer;
        let expected = profile.manufacturer;
        let actual = self
            .session
            .client
            .get_manufacturer_parameters()
            .await
            .context(RemoteCallSnafu { domain })?;
        compare(domain, "speed_pid_p", expected.speed_pid_p, actual.speed_pid_p)?;
        compare(domain, "speed_pid_i", expected.speed_pid_i, actual.speed_pid_i)?;
        compare(domain, "speed_pid_d", expected.speed_pid_d, actual.speed_pid_d)
    }
}

/// Verify that the configuration of a node matches `profile`
///
/// Each checked domain is recorded in the session journal. With
/// [`FailurePolicy::StopAtFirst`], the first failing domain is returned and no later domain is
/// read. With [`FailurePolicy::CollectAll`], every domain is checked; a single failure is returned
/// as is, and several are returned as [`VerificationFailure::Multiple`].
pub async fn verify<C: ParameterClient>(
    session: &mut Session<C>,
    profile: &NodeProfile,
    options: VerifyOptions,
) -> Result<()> {
    log::info!(
        "Verifying {} revision {} on node {}",
        profile.name,
        profile.revision,
        profile.node_id
    );
    profile.validate().context(InvalidProfileSnafu)?;

    // Encode every mapping up front, so that a bad profile is reported before any remote call
    let mut mappings = Vec::new();
    for srdo in &profile.srdo {
        if let Some(mapping) = srdo.safety_word_mapping().context(InvalidProfileSnafu)? {
            mappings.push((srdo.id, mapping, srdo.mapping.len()));
        }
    }

    let mut v = Verifier {
        session,
        options,
        failures: Vec::new(),
    };

    let r = v.network(profile).await;
    v.finish(Domain::Network, r)?;

    for pdo in &profile.pdo_communication {
        let r = v.pdo_communication(profile, pdo.slot()).await;
        v.finish(Domain::PdoCommunication(pdo.slot()), r)?;
    }

    for (i, pdo) in profile.pdo_mapping.iter().enumerate() {
        let r = v.pdo_mapping(profile, i).await;
        v.finish(Domain::PdoMapping(pdo.slot()), r)?;
    }

    let r = v.polarity(profile).await;
    v.finish(Domain::Polarity, r)?;

    for id in SrdoId::all().filter(|id| profile.srdo(*id).is_none()) {
        let r = v.unused_srdo(id).await;
        v.finish(Domain::Srdo(id), r)?;
    }
    for (i, srdo) in profile.srdo.iter().enumerate() {
        let r = v.used_srdo(profile, i).await;
        v.finish(Domain::Srdo(srdo.id), r)?;

        for (_, mapping, len) in mappings.iter().filter(|(id, _, _)| *id == srdo.id) {
            let domain = Domain::SafetyWordMapping {
                srdo: srdo.id,
                control_word: mapping.target(),
            };
            let r = v.safety_word_mapping(srdo.id, mapping, *len).await;
            v.finish(domain, r)?;
        }
    }
    let r = v.srdo_configuration_validity().await;
    v.finish(Domain::SrdoConfigurationValidity, r)?;

    let r = v.velocity_ramps(profile).await;
    v.finish(Domain::VelocityRamps, r)?;

    let r = v.sto(profile).await;
    v.finish(Domain::Sto(profile.sto.id), r)?;

    let r = v.sls(profile).await;
    v.finish(Domain::Sls(profile.sls.id), r)?;

    let r = v.error_behavior(profile).await;
    v.finish(Domain::ErrorBehavior, r)?;

    let r = v.manufacturer(profile).await;
    v.finish(Domain::Manufacturer, r)?;

    let mut failures = v.failures;
    match failures.len() {
        0 => {
            log::info!("Verification of {} succeeded", profile.name);
            Ok(())
        }
        1 => Err(failures.remove(0)),
        _ => MultipleSnafu { failures }.fail(),
    }
}
