//! Parameter client traits
//!
//! A node exposes its configuration through one client per configuration domain. Every call
//! returns a [`StatusResult`]: `Ok` when the node reported [`Status::Ok`](safecan_common::Status),
//! and the reported status otherwise.
//!
//! The sequencers are generic over [`ParameterClient`], which is implemented for any type
//! implementing all of the domain traits.

use core::future::Future;

use safecan_common::{
    motion::{
        ManufacturerParameters, PolarityParameters, Signed, SlsId, SlsParameters, StoId,
        StoParameters, VelocityModeParameters,
    },
    network::NetworkParameters,
    nmt::{NmtCommand, ParameterScope},
    pdo::{PdoCommunicationParameters, PdoMappingParameters, PdoSlot},
    srdo::{SrdoId, SrdoParameters},
    SafetyControlWordId, SafetyWordMapping, StatusResult,
};

/// Network management of the node
pub trait NmtClient {
    /// Send an NMT command to the node
    fn set_nmt_state(&mut self, command: NmtCommand) -> impl Future<Output = StatusResult<()>>;
}

/// Persistent parameter storage of the node
pub trait StorageClient {
    /// Restore the factory defaults of a parameter group into the persistent store
    ///
    /// The restored values become active on the next node reset.
    fn restore_default_parameters(
        &mut self,
        scope: ParameterScope,
    ) -> impl Future<Output = StatusResult<()>>;

    /// Save the active values of a parameter group to the persistent store
    fn store_parameters(&mut self, scope: ParameterScope)
        -> impl Future<Output = StatusResult<()>>;
}

/// Network identity and PDO configuration
pub trait CommunicationClient {
    /// Read the network identity
    fn get_network_parameters(&mut self) -> impl Future<Output = StatusResult<NetworkParameters>>;

    /// Write the network identity
    fn set_network_parameters(
        &mut self,
        params: &NetworkParameters,
    ) -> impl Future<Output = StatusResult<()>>;

    /// Read the communication record of a PDO
    fn get_pdo_communication_parameters(
        &mut self,
        slot: PdoSlot,
    ) -> impl Future<Output = StatusResult<PdoCommunicationParameters>>;

    /// Write the communication record of a PDO
    fn set_pdo_communication_parameters(
        &mut self,
        slot: PdoSlot,
        params: &PdoCommunicationParameters,
    ) -> impl Future<Output = StatusResult<()>>;

    /// Read the mapping record of a PDO
    fn get_pdo_mapping_parameters(
        &mut self,
        slot: PdoSlot,
    ) -> impl Future<Output = StatusResult<PdoMappingParameters>>;

    /// Write the mapping record of a PDO
    fn set_pdo_mapping_parameters(
        &mut self,
        slot: PdoSlot,
        params: &PdoMappingParameters,
    ) -> impl Future<Output = StatusResult<()>>;
}

/// Power drive system parameters
pub trait PdsClient {
    /// Read the polarity record
    fn get_polarity_parameters(&mut self)
        -> impl Future<Output = StatusResult<PolarityParameters>>;

    /// Write the polarity record
    fn set_polarity_parameters(
        &mut self,
        params: &PolarityParameters,
    ) -> impl Future<Output = StatusResult<()>>;
}

/// Velocity mode parameters
pub trait VelocityModeClient {
    /// Read the velocity mode ramps
    fn get_velocity_mode_parameters(
        &mut self,
    ) -> impl Future<Output = StatusResult<VelocityModeParameters>>;

    /// Write the velocity mode ramps
    fn set_velocity_mode_parameters(
        &mut self,
        params: &VelocityModeParameters,
    ) -> impl Future<Output = StatusResult<()>>;
}

/// Safe motion functions and safety word mappings
pub trait SafeMotionClient {
    /// Read an STO record, with its signature
    fn get_sto_parameters(
        &mut self,
        id: StoId,
    ) -> impl Future<Output = StatusResult<Signed<StoParameters>>>;

    /// Write an STO record
    fn set_sto_parameters(
        &mut self,
        id: StoId,
        params: &StoParameters,
    ) -> impl Future<Output = StatusResult<()>>;

    /// Read an SLS record, with its signature
    fn get_sls_parameters(
        &mut self,
        id: SlsId,
    ) -> impl Future<Output = StatusResult<Signed<SlsParameters>>>;

    /// Write an SLS record
    fn set_sls_parameters(
        &mut self,
        id: SlsId,
        params: &SlsParameters,
    ) -> impl Future<Output = StatusResult<()>>;

    /// Read the safety word mapping of a control word
    fn get_safety_word_mapping(
        &mut self,
        target: SafetyControlWordId,
    ) -> impl Future<Output = StatusResult<SafetyWordMapping>>;

    /// Write the safety word mapping of the control word given by [`SafetyWordMapping::target`]
    fn set_safety_word_mapping(
        &mut self,
        mapping: &SafetyWordMapping,
    ) -> impl Future<Output = StatusResult<()>>;
}

/// SRDO configuration
pub trait SrdoClient {
    /// Read the record of an SRDO slot, with its signature
    fn get_srdo_parameters(
        &mut self,
        id: SrdoId,
    ) -> impl Future<Output = StatusResult<Signed<SrdoParameters>>>;

    /// Write the record of an SRDO slot
    fn set_srdo_parameters(
        &mut self,
        id: SrdoId,
        params: &SrdoParameters,
    ) -> impl Future<Output = StatusResult<()>>;

    /// Read the global SRDO configuration validity flag
    fn get_srdo_configuration_valid(&mut self) -> impl Future<Output = StatusResult<bool>>;

    /// Write the global SRDO configuration validity flag
    fn set_srdo_configuration_valid(&mut self, valid: bool)
        -> impl Future<Output = StatusResult<()>>;
}

/// Raw object dictionary access
pub trait CanOpenClient {
    /// Read a u8 sub object
    fn get_value_u8(&mut self, index: u16, sub: u8) -> impl Future<Output = StatusResult<u8>>;

    /// Write a u8 sub object
    fn set_value_u8(
        &mut self,
        index: u16,
        sub: u8,
        value: u8,
    ) -> impl Future<Output = StatusResult<()>>;
}

/// Manufacturer specific parameters
pub trait ManufacturerClient {
    /// Read the manufacturer drive parameters
    fn get_manufacturer_parameters(
        &mut self,
    ) -> impl Future<Output = StatusResult<ManufacturerParameters>>;
}

/// Access to every configuration domain of one node
pub trait ParameterClient:
    NmtClient
    + StorageClient
    + CommunicationClient
    + PdsClient
    + VelocityModeClient
    + SafeMotionClient
    + SrdoClient
    + CanOpenClient
    + ManufacturerClient
{
}

impl<T> ParameterClient for T where
    T: NmtClient
        + StorageClient
        + CommunicationClient
        + PdsClient
        + VelocityModeClient
        + SafeMotionClient
        + SrdoClient
        + CanOpenClient
        + ManufacturerClient
{
}
