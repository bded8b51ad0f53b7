pub const SC_RDM: u8 = 0xCC;
pub const SC_SUB_MESSAGE: u8 = 0x01;

pub const UID_LENGTH: usize = 6;
pub const BROADCAST_UID: u64 = 0xFFFF_FFFFFFFF;

/// Start code through parameter-data length field.
pub const RDM_HEADER_SIZE: usize = 24;
pub const RDM_CHECKSUM_LENGTH: usize = 2;
pub const RDM_MIN_PACKAGE_SIZE: usize = RDM_HEADER_SIZE + RDM_CHECKSUM_LENGTH;
pub const RDM_MAX_PACKAGE_SIZE: usize = 257;

pub const RDM_MAX_PARAMETER_DATA_LENGTH: usize = 231;

pub const SUB_DEVICE_ROOT: u16 = 0x0000;
pub const SUB_DEVICE_ALL: u16 = 0xFFFF;

/// Capacity of the model table. A firmware image ships a fixed set of
/// personalities, so this is a compile-time constant.
pub const MAX_RDM_MODELS: usize = 4;

/// Model id meaning "no model". Never a valid id for a registered model;
/// on the wire it reports an unconfigured device and deactivates on SET.
pub const NULL_MODEL_ID: u16 = 0x0000;
