//! Node profiles
//!
//! A [`NodeProfile`] describes the intended safety configuration of one node role. It is the single
//! source of truth for both commissioning and verification. Profiles are written as TOML:
//!
//! ```toml
//! name = "swd_right"
//! revision = 1
//! node_id = 5
//! bit_timing = 1000
//! rt_activated = true
//! settle_delay_ms = 1000
//! polarity = false
//! error_behavior = 1
//!
//! [velocity_ramps]
//! acceleration_delta_speed = 1500
//! deceleration_delta_speed = 1500
//!
//! [sto]
//! restart_acknowledge_behavior = false
//!
//! [sls]
//! velocity_limit = 680
//! time_to_velocity_monitoring = 1000
//!
//! [manufacturer]
//! speed_pid_p = 200
//! speed_pid_i = 10
//! speed_pid_d = 0
//!
//! [[pdo_communication]]
//! direction = "transmit"
//! pdo = 1
//! cob_base = 0x180
//! enabled = true
//! transmission_type = 1
//!
//! [[pdo_mapping]]
//! direction = "transmit"
//! pdo = 1
//! items = [0x2620_02_08]
//!
//! [[srdo]]
//! id = 9
//! can_id1 = 0x160
//! can_id2 = 0x161
//! sct = 50
//! srvt = 20
//! control_word = "CAN_2"
//! mapping = ["STO", "STO", "SDIP_1", "SDIP_1", "SLS_1", "SLS_1"]
//! ```
//!
//! Every TPDO and RPDO 1..=4 needs a `pdo_communication` entry; only one is shown above.
//!
//! Two profiles are built in, see [`NodeProfile::builtin`].

use std::{collections::HashSet, path::Path, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::{
    constants::MAX_STD_CAN_ID,
    motion::{
        ManufacturerParameters, PolarityParameters, SlsId, SlsParameters, StoId, StoParameters,
    },
    network::{BitTiming, NetworkParameters},
    pdo::{
        CobId, ObjectAddress, PdoCommunicationParameters, PdoDirection, PdoId,
        PdoMappingParameters, PdoSlot, PdoTransmissionType,
    },
    safety_word::{MappingError, SafetyControlWordId, SafetyFunctionId, SafetyWordMapping},
    srdo::{SrdoId, SrdoParameters},
    NodeId,
};

const SWD_LEFT: &str = include_str!("../profiles/swd_left.toml");
const SWD_RIGHT: &str = include_str!("../profiles/swd_right.toml");

/// Maximum number of objects which can be mapped into one PDO
pub const MAX_PDO_MAPPING_ITEMS: usize = 8;

/// Error returned when loading or validating a [`NodeProfile`]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProfileError {
    /// The profile document is not valid TOML or does not match the profile schema
    #[snafu(display("Failed to parse profile: {source}"))]
    Parse {
        /// The underlying parse error
        source: toml::de::Error,
    },
    /// The profile file could not be read
    #[snafu(display("Failed to read profile {}: {source}", path.display()))]
    Io {
        /// The path which was read
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// An SRDO safety word mapping does not fit its control word
    #[snafu(display("Invalid safety word mapping on {srdo}: {source}"))]
    InvalidMapping {
        /// The SRDO owning the mapping
        srdo: SrdoId,
        /// The codec error
        source: MappingError,
    },
    /// An SRDO has a mapping list but no control word to apply it to
    #[snafu(display("{srdo} has a safety word mapping but no control_word"))]
    MissingControlWord {
        /// The SRDO owning the mapping
        srdo: SrdoId,
    },
    /// The same SRDO slot is configured twice
    #[snafu(display("{srdo} is configured more than once"))]
    DuplicateSrdo {
        /// The repeated slot
        srdo: SrdoId,
    },
    /// Two SRDO slots feed the same control word
    #[snafu(display("Control word {control_word} is mapped by more than one SRDO"))]
    DuplicateControlWord {
        /// The repeated control word
        control_word: SafetyControlWordId,
    },
    /// The same PDO is listed twice in one section
    #[snafu(display("{slot} appears more than once in {section}"))]
    DuplicatePdo {
        /// The profile section holding the repeated entry
        section: &'static str,
        /// The repeated PDO
        slot: PdoSlot,
    },
    /// A PDO has no communication parameters
    #[snafu(display("No communication parameters for {slot}"))]
    MissingPdo {
        /// The unconfigured PDO
        slot: PdoSlot,
    },
    /// A PDO COB ID, after adding the node ID, is not a valid 11-bit CAN ID
    #[snafu(display("COB ID 0x{cob_id:X} of {slot} is not an 11-bit CAN ID"))]
    CobIdOutOfRange {
        /// The PDO
        slot: PdoSlot,
        /// The derived COB ID
        cob_id: u32,
    },
    /// An SRDO CAN ID is not a valid 11-bit CAN ID
    #[snafu(display("CAN ID 0x{can_id:X} of {srdo} is not an 11-bit CAN ID"))]
    SrdoCanIdOutOfRange {
        /// The SRDO
        srdo: SrdoId,
        /// The invalid CAN ID
        can_id: u16,
    },
    /// A PDO maps more objects than the node supports
    #[snafu(display("{slot} maps {count} objects, at most {MAX_PDO_MAPPING_ITEMS} are supported"))]
    TooManyMappingItems {
        /// The PDO
        slot: PdoSlot,
        /// The number of mapped objects
        count: usize,
    },
    /// No built-in profile has the requested name
    #[snafu(display("Unknown profile '{name}'"))]
    UnknownProfile {
        /// The requested name
        name: String,
    },
}

type Result<T> = std::result::Result<T, ProfileError>;

/// Velocity ramps set during commissioning
///
/// Only the delta speeds are commissioned. The ramp delta times keep whatever value the node holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RampProfile {
    /// Acceleration ramp delta speed
    pub acceleration_delta_speed: u32,
    /// Deceleration ramp delta speed
    pub deceleration_delta_speed: u32,
}

/// STO settings of a profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoProfile {
    /// The STO instance to configure
    #[serde(default)]
    pub id: StoId,
    /// When true, leaving STO requires an explicit restart acknowledge
    pub restart_acknowledge_behavior: bool,
}

impl StoProfile {
    /// The STO record expected on the node
    pub fn parameters(&self) -> StoParameters {
        StoParameters {
            restart_acknowledge_behavior: self.restart_acknowledge_behavior,
        }
    }
}

/// SLS settings of a profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlsProfile {
    /// The SLS instance to configure
    #[serde(default)]
    pub id: SlsId,
    /// The velocity limit
    pub velocity_limit: u32,
    /// Delay after SLS request before the limit is monitored, in ms
    pub time_to_velocity_monitoring: u16,
    /// Time the velocity must stay in the limit, in ms
    ///
    /// Defaults to `time_to_velocity_monitoring`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_for_velocity_in_limits: Option<u16>,
}

impl SlsProfile {
    /// The SLS record expected on the node
    pub fn parameters(&self) -> SlsParameters {
        SlsParameters {
            velocity_limit: self.velocity_limit,
            time_to_velocity_monitoring: self.time_to_velocity_monitoring,
            time_for_velocity_in_limits: self
                .time_for_velocity_in_limits
                .unwrap_or(self.time_to_velocity_monitoring),
        }
    }
}

/// Communication settings of one PDO
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdoCommunicationProfile {
    /// Direction of the PDO
    pub direction: PdoDirection,
    /// PDO number
    pub pdo: PdoId,
    /// COB ID base offset. The node ID is added to get the COB ID.
    pub cob_base: u16,
    /// Whether the PDO is enabled
    pub enabled: bool,
    /// Frame format flag
    #[serde(default)]
    pub flag: bool,
    /// When the PDO is transmitted
    pub transmission_type: PdoTransmissionType,
}

impl PdoCommunicationProfile {
    /// The PDO this entry configures
    pub fn slot(&self) -> PdoSlot {
        PdoSlot {
            direction: self.direction,
            pdo: self.pdo,
        }
    }

    /// The COB ID derived for a node
    pub fn cob_id(&self, node_id: NodeId) -> u32 {
        self.cob_base as u32 + node_id.raw() as u32
    }

    /// The communication record expected on the node
    ///
    /// The profile must have been validated, so that the COB ID fits in 11 bits.
    pub fn parameters(&self, node_id: NodeId) -> PdoCommunicationParameters {
        PdoCommunicationParameters {
            cob_id: CobId {
                can_id: self.cob_id(node_id) as u16,
                valid: self.enabled,
                flag: self.flag,
            },
            transmission_type: self.transmission_type,
        }
    }
}

/// Payload mapping of one PDO
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdoMappingProfile {
    /// Direction of the PDO
    pub direction: PdoDirection,
    /// PDO number
    pub pdo: PdoId,
    /// The mapped objects, as raw mapping values (`index << 16 | sub << 8 | bits`)
    pub items: Vec<ObjectAddress>,
}

impl PdoMappingProfile {
    /// The PDO this entry configures
    pub fn slot(&self) -> PdoSlot {
        PdoSlot {
            direction: self.direction,
            pdo: self.pdo,
        }
    }

    /// The mapping record written to the node
    pub fn parameters(&self) -> PdoMappingParameters {
        PdoMappingParameters::new(self.items.clone())
    }
}

/// Configuration of one used SRDO slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SrdoProfile {
    /// The SRDO slot
    pub id: SrdoId,
    /// CAN ID of the normal data frame
    pub can_id1: u16,
    /// CAN ID of the inverted data frame
    pub can_id2: u16,
    /// Safety cycle time, in ms
    pub sct: u16,
    /// Safety related validation time, in ms
    pub srvt: u8,
    /// The control word fed by this SRDO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_word: Option<SafetyControlWordId>,
    /// Safety functions assigned to the control word bits, starting from bit 0
    #[serde(default)]
    pub mapping: Vec<SafetyFunctionId>,
}

impl SrdoProfile {
    /// The SRDO record expected on the node. Used slots are always enabled.
    pub fn parameters(&self) -> SrdoParameters {
        SrdoParameters {
            can_id1: self.can_id1,
            can_id2: self.can_id2,
            valid: true,
            sct: self.sct,
            srvt: self.srvt,
        }
    }

    /// Encode the safety word mapping of this slot, if it feeds a control word
    pub fn safety_word_mapping(&self) -> Result<Option<SafetyWordMapping>> {
        match self.control_word {
            Some(target) => SafetyWordMapping::encode(target, &self.mapping)
                .map(Some)
                .context(InvalidMappingSnafu { srdo: self.id }),
            None if self.mapping.is_empty() => Ok(None),
            None => MissingControlWordSnafu { srdo: self.id }.fail(),
        }
    }
}

/// The intended configuration of one node role
///
/// Fields are public so tests and tools can derive variants of a built-in profile. `commission`
/// and `verify` call [`NodeProfile::validate`] again before any remote call, so a profile edited
/// after loading is rejected there rather than half applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeProfile {
    /// Name of the role, e.g. `swd_left`
    pub name: String,
    /// Revision of the recipe
    pub revision: u32,
    /// Free text description
    #[serde(default)]
    pub description: String,
    /// Node ID of the node
    pub node_id: NodeId,
    /// CAN bit rate
    pub bit_timing: BitTiming,
    /// Whether real-time communication is activated
    pub rt_activated: bool,
    /// Delay after the first node reset, before any other access, in ms
    pub settle_delay_ms: u64,
    /// Polarity applied to both velocity and position
    pub polarity: bool,
    /// Value of the communication error behavior object (0x1029 sub 2)
    pub error_behavior: u8,
    /// Velocity mode ramps
    pub velocity_ramps: RampProfile,
    /// STO settings
    pub sto: StoProfile,
    /// SLS settings
    pub sls: SlsProfile,
    /// Expected manufacturer gains. These are only verified, never written.
    pub manufacturer: ManufacturerParameters,
    /// Communication settings of each PDO
    #[serde(default)]
    pub pdo_communication: Vec<PdoCommunicationProfile>,
    /// Payload mappings of each mapped PDO
    #[serde(default)]
    pub pdo_mapping: Vec<PdoMappingProfile>,
    /// The used SRDO slots. Any slot not listed is expected to be disabled.
    #[serde(default)]
    pub srdo: Vec<SrdoProfile>,
}

impl NodeProfile {
    /// Names of the built-in profiles
    pub fn builtin_names() -> &'static [&'static str] {
        &["swd_left", "swd_right"]
    }

    /// Load a built-in profile by role name
    ///
    /// Accepts the full profile name (`swd_left`) or the short wheel name (`left`).
    pub fn builtin(name: &str) -> Result<Self> {
        let doc = match name {
            "swd_left" | "left" => SWD_LEFT,
            "swd_right" | "right" => SWD_RIGHT,
            _ => return UnknownProfileSnafu { name }.fail(),
        };
        Self::load_from_str(doc)
    }

    /// Parse and validate a profile from a TOML string
    pub fn load_from_str(s: &str) -> Result<Self> {
        let profile: NodeProfile = toml::from_str(s).context(ParseSnafu)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Read, parse and validate a profile from a TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Loading profile from {}", path.display());
        let s = std::fs::read_to_string(path).context(IoSnafu { path })?;
        Self::load_from_str(&s)
    }

    /// Return a copy of the profile for a different node ID
    ///
    /// The copy is validated again, as derived COB IDs change.
    pub fn with_node_id(&self, node_id: NodeId) -> Result<Self> {
        let mut profile = self.clone();
        if node_id != self.node_id {
            log::info!("Overriding node ID of {}: {} -> {}", self.name, self.node_id, node_id);
        }
        profile.node_id = node_id;
        profile.validate()?;
        Ok(profile)
    }

    /// Check the profile for internal consistency
    pub fn validate(&self) -> Result<()> {
        let mut pdo_slots = HashSet::new();
        for pdo in &self.pdo_communication {
            if !pdo_slots.insert(pdo.slot()) {
                return DuplicatePdoSnafu {
                    section: "pdo_communication",
                    slot: pdo.slot(),
                }
                .fail();
            }
            let cob_id = pdo.cob_id(self.node_id);
            if cob_id > MAX_STD_CAN_ID as u32 {
                return CobIdOutOfRangeSnafu {
                    slot: pdo.slot(),
                    cob_id,
                }
                .fail();
            }
        }

        for direction in [PdoDirection::Transmit, PdoDirection::Receive] {
            for pdo in PdoId::all() {
                let slot = PdoSlot { direction, pdo };
                if !pdo_slots.contains(&slot) {
                    return MissingPdoSnafu { slot }.fail();
                }
            }
        }

        pdo_slots.clear();
        for pdo in &self.pdo_mapping {
            if !pdo_slots.insert(pdo.slot()) {
                return DuplicatePdoSnafu {
                    section: "pdo_mapping",
                    slot: pdo.slot(),
                }
                .fail();
            }
            if pdo.items.len() > MAX_PDO_MAPPING_ITEMS {
                return TooManyMappingItemsSnafu {
                    slot: pdo.slot(),
                    count: pdo.items.len(),
                }
                .fail();
            }
        }

        let mut srdo_ids = HashSet::new();
        let mut control_words = HashSet::new();
        for srdo in &self.srdo {
            if !srdo_ids.insert(srdo.id) {
                return DuplicateSrdoSnafu { srdo: srdo.id }.fail();
            }
            for can_id in [srdo.can_id1, srdo.can_id2] {
                if can_id > MAX_STD_CAN_ID {
                    return SrdoCanIdOutOfRangeSnafu {
                        srdo: srdo.id,
                        can_id,
                    }
                    .fail();
                }
            }
            if let Some(mapping) = srdo.safety_word_mapping()? {
                if !control_words.insert(mapping.target()) {
                    return DuplicateControlWordSnafu {
                        control_word: mapping.target(),
                    }
                    .fail();
                }
            }
        }

        Ok(())
    }

    /// The network record expected on the node
    pub fn network(&self) -> NetworkParameters {
        NetworkParameters {
            node_id: self.node_id,
            bit_timing: self.bit_timing,
            rt_activated: self.rt_activated,
        }
    }

    /// The polarity record expected on the node
    pub fn polarity_parameters(&self) -> PolarityParameters {
        PolarityParameters::uniform(self.polarity)
    }

    /// The delay to wait after the first node reset
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Get the profile of a used SRDO slot
    ///
    /// Returns None if the slot is not used, i.e. must be disabled
    pub fn srdo(&self, id: SrdoId) -> Option<&SrdoProfile> {
        self.srdo.iter().find(|s| s.id == id)
    }

    /// Get the communication settings of a PDO, if the profile configures it
    pub fn pdo_communication(&self, slot: PdoSlot) -> Option<&PdoCommunicationProfile> {
        self.pdo_communication.iter().find(|p| p.slot() == slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_load() {
        for name in NodeProfile::builtin_names() {
            let profile = NodeProfile::builtin(name).unwrap();
            assert_eq!(*name, profile.name);
        }
        assert_eq!("swd_left", NodeProfile::builtin("left").unwrap().name);
        assert_eq!("swd_right", NodeProfile::builtin("right").unwrap().name);
        assert!(matches!(
            NodeProfile::builtin("middle"),
            Err(ProfileError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn test_sls_in_limits_time_defaults_to_monitoring_time() {
        let sls = SlsProfile {
            id: SlsId::Sls1,
            velocity_limit: 680,
            time_to_velocity_monitoring: 1000,
            time_for_velocity_in_limits: None,
        };
        assert_eq!(1000, sls.parameters().time_for_velocity_in_limits);
        let sls = SlsProfile {
            time_for_velocity_in_limits: Some(250),
            ..sls
        };
        assert_eq!(250, sls.parameters().time_for_velocity_in_limits);
    }

    #[test]
    fn test_node_id_override_revalidates() {
        let profile = NodeProfile::builtin("right").unwrap();
        let moved = profile.with_node_id(NodeId::new(10).unwrap()).unwrap();
        let tpdo1 = moved
            .pdo_communication(PdoSlot::tpdo(PdoId::new(1).unwrap()))
            .unwrap();
        assert_eq!(0x18A, tpdo1.parameters(moved.node_id).cob_id.can_id);

        // 0x480 + 127 overflows the 11-bit range
        let mut profile = profile;
        profile.pdo_communication[3].cob_base = 0x7C0;
        assert!(matches!(
            profile.with_node_id(NodeId::new(127).unwrap()),
            Err(ProfileError::CobIdOutOfRange { .. })
        ));
    }

    #[test]
    fn test_mapping_without_control_word() {
        let srdo = SrdoProfile {
            id: SrdoId::new(1).unwrap(),
            can_id1: 0x101,
            can_id2: 0x102,
            sct: 25,
            srvt: 20,
            control_word: None,
            mapping: vec![SafetyFunctionId::Sto],
        };
        assert!(matches!(
            srdo.safety_word_mapping(),
            Err(ProfileError::MissingControlWord { .. })
        ));
        let srdo = SrdoProfile {
            mapping: vec![],
            ..srdo
        };
        assert!(srdo.safety_word_mapping().unwrap().is_none());
    }
}
