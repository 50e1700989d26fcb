//! Simulated drive node
//!
//! [`SimNode`] implements every parameter client trait against an in-memory node. It is used to
//! exercise the sequencers in tests, and by the CLI when no real transport is available.
//!
//! The node holds three configuration banks:
//!
//! - `factory`: the defaults, never modified
//! - `active`: the values the node is running with; every get and set accesses this bank
//! - `stored`: the persistent store, which is loaded into `active` on a node reset
//!
//! Restoring defaults copies `factory` into `stored`, storing copies `active` into `stored`. The
//! stored bank can be saved to and loaded from a TOML file, so that separate runs see the same
//! node.
//!
//! Like a real node, the simulation refuses to enable an SRDO slot or change a safety word mapping
//! while the SRDO configuration is marked valid.

use std::path::{Path, PathBuf};

use safecan_common::{
    constants::{cob_bases, object_ids, sub_ids, values, MAX_STD_CAN_ID},
    motion::{
        ManufacturerParameters, PolarityParameters, Signed, SlsId, SlsParameters, StoId,
        StoParameters, VelocityModeParameters,
    },
    network::{BitTiming, NetworkParameters},
    nmt::{NmtCommand, ParameterScope},
    pdo::{
        CobId, PdoCommunicationParameters, PdoDirection, PdoId, PdoMappingParameters, PdoSlot,
        PdoTransmissionType,
    },
    profile::MAX_PDO_MAPPING_ITEMS,
    srdo::{SrdoId, SrdoParameters},
    NodeId, SafetyControlWordId, SafetyWordMapping, Status, StatusResult,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::traits::{
    CanOpenClient, CommunicationClient, ManufacturerClient, NmtClient, PdsClient,
    SafeMotionClient, SrdoClient, StorageClient, VelocityModeClient,
};

const FACTORY_NODE_ID: NodeId = match NodeId::new(127) {
    Ok(id) => id,
    Err(_) => panic!("Invalid factory node ID"),
};

/// Error loading or saving the simulated node state
#[derive(Debug, Snafu)]
pub enum SimStateError {
    /// The state file could not be read or written
    #[snafu(display("Failed to access state file {}: {source}", path.display()))]
    Io {
        /// The state file
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },
    /// The state file is not valid TOML or does not match the state schema
    #[snafu(display("Failed to parse state file {}: {source}", path.display()))]
    Parse {
        /// The state file
        path: PathBuf,
        /// The underlying parse error
        source: toml::de::Error,
    },
    /// The state could not be serialized
    #[snafu(display("Failed to serialize node state: {source}"))]
    Serialize {
        /// The underlying serialization error
        source: toml::ser::Error,
    },
    /// The state parsed, but does not describe a complete node
    #[snafu(display("Invalid node state: {reason}"))]
    InvalidState {
        /// What is wrong with the state
        reason: String,
    },
}

/// Configuration of one PDO
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdoConfig {
    /// Direction of the PDO
    pub direction: PdoDirection,
    /// PDO number
    pub pdo: PdoId,
    /// Communication record
    pub communication: PdoCommunicationParameters,
    /// Mapping record
    pub mapping: PdoMappingParameters,
}

impl PdoConfig {
    fn slot(&self) -> PdoSlot {
        PdoSlot {
            direction: self.direction,
            pdo: self.pdo,
        }
    }
}

/// A safety word mapping as held by the node: one function code per control word bit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireMapping {
    /// The control word
    pub control_word: SafetyControlWordId,
    /// Function codes, starting at bit 0
    pub functions: Vec<u8>,
}

/// A u8 object dictionary entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectValue {
    /// Object index
    pub index: u16,
    /// Sub index
    pub sub: u8,
    /// Value
    pub value: u8,
}

/// One bank of node configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Network identity
    pub network: NetworkParameters,
    /// Every transmit and receive PDO
    pub pdos: Vec<PdoConfig>,
    /// Motion polarity
    pub polarity: PolarityParameters,
    /// Velocity mode ramps
    pub velocity_mode: VelocityModeParameters,
    /// STO record
    pub sto: StoParameters,
    /// SLS records, indexed by [`SlsId::index`]
    pub sls: Vec<SlsParameters>,
    /// SRDO records, indexed by [`SrdoId::index`]
    pub srdo: Vec<SrdoParameters>,
    /// Safety word mappings of every control word
    pub safety_words: Vec<WireMapping>,
    /// Raw u8 objects, including the error behavior and SRDO configuration validity objects
    pub objects: Vec<ObjectValue>,
    /// Manufacturer parameters
    pub manufacturer: ManufacturerParameters,
}

fn default_cob_base(slot: PdoSlot) -> u16 {
    match (slot.direction, slot.pdo.number()) {
        (PdoDirection::Transmit, 1) => cob_bases::TPDO1,
        (PdoDirection::Transmit, 2) => cob_bases::TPDO2,
        (PdoDirection::Transmit, 3) => cob_bases::TPDO3,
        (PdoDirection::Transmit, _) => cob_bases::TPDO4,
        (PdoDirection::Receive, 1) => cob_bases::RPDO1,
        (PdoDirection::Receive, 2) => cob_bases::RPDO2,
        (PdoDirection::Receive, 3) => cob_bases::RPDO3,
        (PdoDirection::Receive, _) => cob_bases::RPDO4,
    }
}

fn scope_contains(scope: ParameterScope, index: u16) -> bool {
    match scope {
        ParameterScope::All => true,
        ParameterScope::Communication => (0x1000..=0x1FFF).contains(&index),
        ParameterScope::Manufacturer => (0x2000..=0x5FFF).contains(&index),
        ParameterScope::Application => (0x6000..=0x9FFF).contains(&index),
    }
}

impl NodeConfig {
    /// The factory default configuration
    pub fn factory() -> Self {
        let pdos = [PdoDirection::Transmit, PdoDirection::Receive]
            .into_iter()
            .flat_map(|direction| PdoId::all().map(move |pdo| PdoSlot { direction, pdo }))
            .map(|slot| PdoConfig {
                direction: slot.direction,
                pdo: slot.pdo,
                communication: PdoCommunicationParameters {
                    cob_id: CobId {
                        can_id: default_cob_base(slot) + FACTORY_NODE_ID.raw() as u16,
                        valid: slot.pdo.number() == 1,
                        flag: false,
                    },
                    transmission_type: PdoTransmissionType::EventProfile,
                },
                mapping: PdoMappingParameters::default(),
            })
            .collect();

        let srdo = SrdoId::all()
            .map(|id| SrdoParameters {
                can_id1: 0xFF + 2 * id.number() as u16,
                can_id2: 0x100 + 2 * id.number() as u16,
                valid: false,
                sct: 25,
                srvt: 20,
            })
            .collect();

        let safety_words = SafetyControlWordId::ALL
            .iter()
            .map(|target| WireMapping {
                control_word: *target,
                functions: SafetyWordMapping::empty(*target).to_wire(),
            })
            .collect();

        Self {
            network: NetworkParameters {
                node_id: FACTORY_NODE_ID,
                bit_timing: BitTiming::Bt500,
                rt_activated: false,
            },
            pdos,
            polarity: PolarityParameters::uniform(false),
            velocity_mode: VelocityModeParameters {
                acceleration_delta_speed: 1000,
                acceleration_delta_time: 1,
                deceleration_delta_speed: 1000,
                deceleration_delta_time: 1,
            },
            sto: StoParameters {
                restart_acknowledge_behavior: true,
            },
            sls: SlsId::ALL
                .iter()
                .map(|_| SlsParameters {
                    velocity_limit: 1000,
                    time_to_velocity_monitoring: 500,
                    time_for_velocity_in_limits: 500,
                })
                .collect(),
            srdo,
            safety_words,
            objects: vec![
                ObjectValue {
                    index: object_ids::ERROR_BEHAVIOR,
                    sub: 1,
                    value: 0,
                },
                ObjectValue {
                    index: object_ids::ERROR_BEHAVIOR,
                    sub: sub_ids::COMMUNICATION_ERROR_BEHAVIOR,
                    value: 0,
                },
                ObjectValue {
                    index: object_ids::SRDO_CONFIGURATION_VALID,
                    sub: 0,
                    value: values::SRDO_CONFIGURATION_VALID,
                },
            ],
            manufacturer: ManufacturerParameters {
                speed_pid_p: 200,
                speed_pid_i: 10,
                speed_pid_d: 0,
            },
        }
    }

    /// Check that the bank holds every record of a node exactly once
    pub fn check_layout(&self) -> Result<(), SimStateError> {
        for direction in [PdoDirection::Transmit, PdoDirection::Receive] {
            for pdo in PdoId::all() {
                let slot = PdoSlot { direction, pdo };
                let count = self.pdos.iter().filter(|p| p.slot() == slot).count();
                if count != 1 {
                    return InvalidStateSnafu {
                        reason: format!("{slot} appears {count} times"),
                    }
                    .fail();
                }
            }
        }
        if self.srdo.len() != SrdoId::all().count() {
            return InvalidStateSnafu {
                reason: format!("{} SRDO records", self.srdo.len()),
            }
            .fail();
        }
        if self.sls.len() != SlsId::ALL.len() {
            return InvalidStateSnafu {
                reason: format!("{} SLS records", self.sls.len()),
            }
            .fail();
        }
        for target in SafetyControlWordId::ALL {
            if self.safety_word_mapping(target).is_none() {
                return InvalidStateSnafu {
                    reason: format!("missing or malformed mapping for {target}"),
                }
                .fail();
            }
        }
        for (index, sub) in [
            (
                object_ids::ERROR_BEHAVIOR,
                sub_ids::COMMUNICATION_ERROR_BEHAVIOR,
            ),
            (object_ids::SRDO_CONFIGURATION_VALID, 0),
        ] {
            if self.object(index, sub).is_none() {
                return InvalidStateSnafu {
                    reason: format!("missing object 0x{index:04X}sub{sub}"),
                }
                .fail();
            }
        }
        Ok(())
    }

    /// Get the configuration of a PDO
    pub fn pdo(&self, slot: PdoSlot) -> Option<&PdoConfig> {
        self.pdos.iter().find(|p| p.slot() == slot)
    }

    /// Get the configuration of a PDO for modification
    pub fn pdo_mut(&mut self, slot: PdoSlot) -> Option<&mut PdoConfig> {
        self.pdos.iter_mut().find(|p| p.slot() == slot)
    }

    /// Decode the safety word mapping of a control word
    ///
    /// Returns None if the bank holds no valid mapping for the control word
    pub fn safety_word_mapping(&self, target: SafetyControlWordId) -> Option<SafetyWordMapping> {
        let wire = self
            .safety_words
            .iter()
            .find(|m| m.control_word == target)?;
        SafetyWordMapping::from_wire(target, &wire.functions).ok()
    }

    /// Replace the safety word mapping of the control word given by [`SafetyWordMapping::target`]
    pub fn set_safety_word_mapping(&mut self, mapping: &SafetyWordMapping) {
        let functions = mapping.to_wire();
        match self
            .safety_words
            .iter_mut()
            .find(|m| m.control_word == mapping.target())
        {
            Some(wire) => wire.functions = functions,
            None => self.safety_words.push(WireMapping {
                control_word: mapping.target(),
                functions,
            }),
        }
    }

    /// Read a u8 object
    pub fn object(&self, index: u16, sub: u8) -> Option<u8> {
        self.objects
            .iter()
            .find(|o| o.index == index && o.sub == sub)
            .map(|o| o.value)
    }

    fn object_mut(&mut self, index: u16, sub: u8) -> Option<&mut u8> {
        self.objects
            .iter_mut()
            .find(|o| o.index == index && o.sub == sub)
            .map(|o| &mut o.value)
    }

    /// Returns true if the SRDO configuration validity object holds the valid marker
    pub fn srdo_configuration_valid(&self) -> bool {
        self.object(object_ids::SRDO_CONFIGURATION_VALID, 0)
            == Some(values::SRDO_CONFIGURATION_VALID)
    }

    /// Copy the parameters belonging to `scope` from another bank
    pub fn copy_scope(&mut self, from: &NodeConfig, scope: ParameterScope) {
        if scope_contains(scope, 0x1000) {
            self.network = from.network;
            self.pdos = from.pdos.clone();
            self.srdo = from.srdo.clone();
        }
        if scope_contains(scope, 0x2000) {
            self.manufacturer = from.manufacturer;
        }
        if scope_contains(scope, 0x6000) {
            self.polarity = from.polarity;
            self.velocity_mode = from.velocity_mode;
            self.sto = from.sto;
            self.sls = from.sls.clone();
            self.safety_words = from.safety_words.clone();
        }
        self.objects.retain(|o| !scope_contains(scope, o.index));
        self.objects.extend(
            from.objects
                .iter()
                .filter(|o| scope_contains(scope, o.index))
                .copied(),
        );
    }
}

fn signature(bytes: &[u8]) -> u16 {
    crc16::State::<crc16::XMODEM>::calculate(bytes)
}

/// An in-memory drive node
#[derive(Debug)]
pub struct SimNode {
    factory: NodeConfig,
    active: NodeConfig,
    stored: NodeConfig,
    calls: Vec<String>,
    fault: Option<(usize, Status)>,
    last_nmt_command: Option<NmtCommand>,
}

impl Default for SimNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SimNode {
    /// Create a node fresh from the factory
    pub fn new() -> Self {
        Self::with_stored(NodeConfig::factory())
    }

    /// Create a node which has `stored` in its persistent store, and has just been reset
    pub fn with_stored(stored: NodeConfig) -> Self {
        Self {
            factory: NodeConfig::factory(),
            active: stored.clone(),
            stored,
            calls: Vec::new(),
            fault: None,
            last_nmt_command: None,
        }
    }

    /// Load a node from a state file written by [`SimNode::save_state`]
    ///
    /// If the file does not exist, a factory fresh node is returned.
    pub fn load_state(path: impl AsRef<Path>) -> Result<Self, SimStateError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!(
                "No state file at {}, starting from factory defaults",
                path.display()
            );
            return Ok(Self::new());
        }
        let s = std::fs::read_to_string(path).context(IoSnafu { path })?;
        let stored: NodeConfig = toml::from_str(&s).context(ParseSnafu { path })?;
        stored.check_layout()?;
        Ok(Self::with_stored(stored))
    }

    /// Save the persistent store of the node to a state file
    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<(), SimStateError> {
        let path = path.as_ref();
        let s = toml::to_string(&self.stored).context(SerializeSnafu)?;
        std::fs::write(path, s).context(IoSnafu { path })
    }

    /// The factory defaults bank
    pub fn factory(&self) -> &NodeConfig {
        &self.factory
    }

    /// The active bank
    pub fn active(&self) -> &NodeConfig {
        &self.active
    }

    /// The active bank, for modification outside of the client interface
    pub fn active_mut(&mut self) -> &mut NodeConfig {
        &mut self.active
    }

    /// The persistent store bank
    pub fn stored(&self) -> &NodeConfig {
        &self.stored
    }

    /// The persistent store bank, for modification outside of the client interface
    pub fn stored_mut(&mut self) -> &mut NodeConfig {
        &mut self.stored
    }

    /// Every client call received, in order, including rejected calls
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Clear the call log
    ///
    /// This also restarts the numbering used by [`SimNode::fail_call`].
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Make the `n`-th call in the call log (1-based) fail with `status`
    pub fn fail_call(&mut self, n: usize, status: Status) {
        self.fault = Some((n, status));
    }

    /// Remove any injected failure
    pub fn clear_fault(&mut self) {
        self.fault = None;
    }

    /// The last NMT command received
    pub fn last_nmt_command(&self) -> Option<NmtCommand> {
        self.last_nmt_command
    }

    fn call(&mut self, description: String) -> StatusResult<()> {
        log::debug!("sim call {}: {description}", self.calls.len() + 1);
        self.calls.push(description);
        match self.fault {
            Some((n, status)) if n == self.calls.len() => {
                log::warn!("Injected failure {status} on call {n}");
                Err(status)
            }
            _ => Ok(()),
        }
    }

    fn reject<T>(&self, status: Status) -> StatusResult<T> {
        if let Some(call) = self.calls.last() {
            log::warn!("Rejected {call}: {status}");
        }
        Err(status)
    }
}

impl NmtClient for SimNode {
    async fn set_nmt_state(&mut self, command: NmtCommand) -> StatusResult<()> {
        self.call(format!("set_nmt_state({command})"))?;
        match command {
            NmtCommand::ResetNode => self.active = self.stored.clone(),
            NmtCommand::ResetCommunication => self
                .active
                .copy_scope(&self.stored, ParameterScope::Communication),
            NmtCommand::Start | NmtCommand::Stop | NmtCommand::EnterPreOperational => (),
        }
        self.last_nmt_command = Some(command);
        Ok(())
    }
}

impl StorageClient for SimNode {
    async fn restore_default_parameters(&mut self, scope: ParameterScope) -> StatusResult<()> {
        self.call(format!("restore_default_parameters({scope})"))?;
        self.stored.copy_scope(&self.factory, scope);
        Ok(())
    }

    async fn store_parameters(&mut self, scope: ParameterScope) -> StatusResult<()> {
        self.call(format!("store_parameters({scope})"))?;
        self.stored.copy_scope(&self.active, scope);
        Ok(())
    }
}

impl CommunicationClient for SimNode {
    async fn get_network_parameters(&mut self) -> StatusResult<NetworkParameters> {
        self.call("get_network_parameters".into())?;
        Ok(self.active.network)
    }

    async fn set_network_parameters(&mut self, params: &NetworkParameters) -> StatusResult<()> {
        self.call(format!("set_network_parameters(node_id={})", params.node_id))?;
        self.active.network = *params;
        Ok(())
    }

    async fn get_pdo_communication_parameters(
        &mut self,
        slot: PdoSlot,
    ) -> StatusResult<PdoCommunicationParameters> {
        self.call(format!("get_pdo_communication_parameters({slot})"))?;
        match self.active.pdo(slot) {
            Some(pdo) => Ok(pdo.communication),
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn set_pdo_communication_parameters(
        &mut self,
        slot: PdoSlot,
        params: &PdoCommunicationParameters,
    ) -> StatusResult<()> {
        self.call(format!("set_pdo_communication_parameters({slot})"))?;
        if params.cob_id.can_id > MAX_STD_CAN_ID {
            return self.reject(Status::InvalidParameter);
        }
        match self.active.pdo_mut(slot) {
            Some(pdo) => {
                pdo.communication = *params;
                Ok(())
            }
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn get_pdo_mapping_parameters(
        &mut self,
        slot: PdoSlot,
    ) -> StatusResult<PdoMappingParameters> {
        self.call(format!("get_pdo_mapping_parameters({slot})"))?;
        match self.active.pdo(slot) {
            Some(pdo) => Ok(pdo.mapping.clone()),
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn set_pdo_mapping_parameters(
        &mut self,
        slot: PdoSlot,
        params: &PdoMappingParameters,
    ) -> StatusResult<()> {
        self.call(format!("set_pdo_mapping_parameters({slot})"))?;
        if params.items.len() > MAX_PDO_MAPPING_ITEMS || params.nb as usize > params.items.len()
        {
            return self.reject(Status::InvalidParameter);
        }
        match self.active.pdo_mut(slot) {
            Some(pdo) => {
                pdo.mapping = params.clone();
                Ok(())
            }
            None => self.reject(Status::InvalidParameter),
        }
    }
}

impl PdsClient for SimNode {
    async fn get_polarity_parameters(&mut self) -> StatusResult<PolarityParameters> {
        self.call("get_polarity_parameters".into())?;
        Ok(self.active.polarity)
    }

    async fn set_polarity_parameters(&mut self, params: &PolarityParameters) -> StatusResult<()> {
        self.call("set_polarity_parameters".into())?;
        self.active.polarity = *params;
        Ok(())
    }
}

impl VelocityModeClient for SimNode {
    async fn get_velocity_mode_parameters(&mut self) -> StatusResult<VelocityModeParameters> {
        self.call("get_velocity_mode_parameters".into())?;
        Ok(self.active.velocity_mode)
    }

    async fn set_velocity_mode_parameters(
        &mut self,
        params: &VelocityModeParameters,
    ) -> StatusResult<()> {
        self.call("set_velocity_mode_parameters".into())?;
        self.active.velocity_mode = *params;
        Ok(())
    }
}

impl SafeMotionClient for SimNode {
    async fn get_sto_parameters(&mut self, id: StoId) -> StatusResult<Signed<StoParameters>> {
        self.call(format!("get_sto_parameters({id})"))?;
        let parameters = self.active.sto;
        Ok(Signed {
            parameters,
            signature: signature(&parameters.to_le_bytes()),
        })
    }

    async fn set_sto_parameters(&mut self, id: StoId, params: &StoParameters) -> StatusResult<()> {
        self.call(format!("set_sto_parameters({id})"))?;
        self.active.sto = *params;
        Ok(())
    }

    async fn get_sls_parameters(&mut self, id: SlsId) -> StatusResult<Signed<SlsParameters>> {
        self.call(format!("get_sls_parameters({id})"))?;
        match self.active.sls.get(id.index()) {
            Some(parameters) => Ok(Signed {
                parameters: *parameters,
                signature: signature(&parameters.to_le_bytes()),
            }),
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn set_sls_parameters(&mut self, id: SlsId, params: &SlsParameters) -> StatusResult<()> {
        self.call(format!("set_sls_parameters({id})"))?;
        match self.active.sls.get_mut(id.index()) {
            Some(sls) => {
                *sls = *params;
                Ok(())
            }
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn get_safety_word_mapping(
        &mut self,
        target: SafetyControlWordId,
    ) -> StatusResult<SafetyWordMapping> {
        self.call(format!("get_safety_word_mapping({target})"))?;
        match self.active.safety_word_mapping(target) {
            Some(mapping) => Ok(mapping),
            None => self.reject(Status::Failed),
        }
    }

    async fn set_safety_word_mapping(&mut self, mapping: &SafetyWordMapping) -> StatusResult<()> {
        self.call(format!("set_safety_word_mapping({mapping})"))?;
        if self.active.srdo_configuration_valid() {
            return self.reject(Status::NotAllowed);
        }
        self.active.set_safety_word_mapping(mapping);
        Ok(())
    }
}

impl SrdoClient for SimNode {
    async fn get_srdo_parameters(&mut self, id: SrdoId) -> StatusResult<Signed<SrdoParameters>> {
        self.call(format!("get_srdo_parameters({id})"))?;
        match self.active.srdo.get(id.index()) {
            Some(parameters) => Ok(Signed {
                parameters: *parameters,
                signature: signature(&parameters.to_le_bytes()),
            }),
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn set_srdo_parameters(
        &mut self,
        id: SrdoId,
        params: &SrdoParameters,
    ) -> StatusResult<()> {
        self.call(format!("set_srdo_parameters({id})"))?;
        if params.can_id1 > MAX_STD_CAN_ID || params.can_id2 > MAX_STD_CAN_ID {
            return self.reject(Status::InvalidParameter);
        }
        if params.valid && self.active.srdo_configuration_valid() {
            return self.reject(Status::NotAllowed);
        }
        match self.active.srdo.get_mut(id.index()) {
            Some(srdo) => {
                *srdo = *params;
                Ok(())
            }
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn get_srdo_configuration_valid(&mut self) -> StatusResult<bool> {
        self.call("get_srdo_configuration_valid".into())?;
        Ok(self.active.srdo_configuration_valid())
    }

    async fn set_srdo_configuration_valid(&mut self, valid: bool) -> StatusResult<()> {
        self.call(format!("set_srdo_configuration_valid({valid})"))?;
        let value = if valid {
            values::SRDO_CONFIGURATION_VALID
        } else {
            0
        };
        match self.active.object_mut(object_ids::SRDO_CONFIGURATION_VALID, 0) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => self.reject(Status::Failed),
        }
    }
}

impl CanOpenClient for SimNode {
    async fn get_value_u8(&mut self, index: u16, sub: u8) -> StatusResult<u8> {
        self.call(format!("get_value_u8(0x{index:04X}sub{sub})"))?;
        match self.active.object(index, sub) {
            Some(value) => Ok(value),
            None => self.reject(Status::InvalidParameter),
        }
    }

    async fn set_value_u8(&mut self, index: u16, sub: u8, value: u8) -> StatusResult<()> {
        self.call(format!("set_value_u8(0x{index:04X}sub{sub}, {value})"))?;
        match self.active.object_mut(index, sub) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => self.reject(Status::InvalidParameter),
        }
    }
}

impl ManufacturerClient for SimNode {
    async fn get_manufacturer_parameters(&mut self) -> StatusResult<ManufacturerParameters> {
        self.call("get_manufacturer_parameters".into())?;
        Ok(self.active.manufacturer)
    }
}

#[cfg(test)]
mod tests {
    use safecan_common::SafetyFunctionId;

    use super::*;

    fn srdo(n: u8) -> SrdoId {
        SrdoId::new(n).unwrap()
    }

    #[test]
    fn test_factory_layout() {
        let config = NodeConfig::factory();
        config.check_layout().unwrap();
        assert!(config.srdo_configuration_valid());
        assert!(config.srdo.iter().all(|s| !s.valid));
    }

    #[tokio::test]
    async fn test_banks() {
        let mut node = SimNode::new();
        node.set_polarity_parameters(&PolarityParameters::uniform(true))
            .await
            .unwrap();
        assert!(node.active().polarity.velocity_polarity);
        assert!(!node.stored().polarity.velocity_polarity);

        // A reset without store loses the change
        node.set_nmt_state(NmtCommand::ResetNode).await.unwrap();
        assert!(!node.active().polarity.velocity_polarity);

        node.set_polarity_parameters(&PolarityParameters::uniform(true))
            .await
            .unwrap();
        node.store_parameters(ParameterScope::All).await.unwrap();
        node.set_nmt_state(NmtCommand::ResetNode).await.unwrap();
        assert!(node.active().polarity.velocity_polarity);

        // Restore only affects the store until the next reset
        node.restore_default_parameters(ParameterScope::All)
            .await
            .unwrap();
        assert!(node.active().polarity.velocity_polarity);
        node.set_nmt_state(NmtCommand::ResetNode).await.unwrap();
        assert_eq!(node.factory(), node.active());
    }

    #[tokio::test]
    async fn test_scoped_store() {
        let mut node = SimNode::new();
        node.set_polarity_parameters(&PolarityParameters::uniform(true))
            .await
            .unwrap();
        node.set_value_u8(object_ids::ERROR_BEHAVIOR, 2, 1)
            .await
            .unwrap();
        node.store_parameters(ParameterScope::Communication)
            .await
            .unwrap();
        assert_eq!(Some(1), node.stored().object(object_ids::ERROR_BEHAVIOR, 2));
        assert!(!node.stored().polarity.velocity_polarity);
    }

    #[tokio::test]
    async fn test_srdo_edit_protection() {
        let mut node = SimNode::new();
        let mut params = node.get_srdo_parameters(srdo(9)).await.unwrap().parameters;
        params.valid = true;
        assert_eq!(
            Err(Status::NotAllowed),
            node.set_srdo_parameters(srdo(9), &params).await
        );
        let mapping =
            SafetyWordMapping::encode(SafetyControlWordId::Can2, &[SafetyFunctionId::Sto])
                .unwrap();
        assert_eq!(
            Err(Status::NotAllowed),
            node.set_safety_word_mapping(&mapping).await
        );

        node.set_srdo_configuration_valid(false).await.unwrap();
        node.set_srdo_parameters(srdo(9), &params).await.unwrap();
        node.set_safety_word_mapping(&mapping).await.unwrap();
        node.set_srdo_configuration_valid(true).await.unwrap();

        assert_eq!(
            Ok(mapping),
            node.get_safety_word_mapping(SafetyControlWordId::Can2).await
        );
        assert_eq!(
            Some(values::SRDO_CONFIGURATION_VALID),
            node.active().object(object_ids::SRDO_CONFIGURATION_VALID, 0)
        );
    }

    #[tokio::test]
    async fn test_signature_follows_record() {
        let mut node = SimNode::new();
        let before = node.get_sls_parameters(SlsId::Sls1).await.unwrap();
        let mut params = before.parameters;
        params.velocity_limit = 680;
        node.set_sls_parameters(SlsId::Sls1, &params).await.unwrap();
        let after = node.get_sls_parameters(SlsId::Sls1).await.unwrap();
        assert_eq!(params, after.parameters);
        assert_ne!(before.signature, after.signature);
        assert_eq!(
            crc16::State::<crc16::XMODEM>::calculate(&params.to_le_bytes()),
            after.signature
        );
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let mut node = SimNode::new();
        node.fail_call(2, Status::Timeout);
        assert!(node.get_polarity_parameters().await.is_ok());
        assert_eq!(Err(Status::Timeout), node.get_polarity_parameters().await);
        assert!(node.get_polarity_parameters().await.is_ok());
        assert_eq!(3, node.calls().len());
    }

    #[tokio::test]
    async fn test_unknown_object() {
        let mut node = SimNode::new();
        assert_eq!(
            Err(Status::InvalidParameter),
            node.get_value_u8(0x2000, 1).await
        );
        assert_eq!(
            Err(Status::InvalidParameter),
            node.set_value_u8(0x2000, 1, 4).await
        );
    }
}
