use crate::command_class::{RequestCommandClass, ResponseCommandClass};
use crate::consts::{
    RDM_HEADER_SIZE, RDM_MAX_PACKAGE_SIZE, RDM_MIN_PACKAGE_SIZE, SC_RDM, SC_SUB_MESSAGE,
};
use crate::layouts::rdm_message_layout;
use crate::types::{DataPack, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};
use crate::utils::verify_checksum;

/// An RDM request that does not have its parameter data deserialized.
/// The transport layer hands this to [crate::rdm_handler::RdmHandler::handle_request];
/// the dispatcher never mutates it.
#[derive(Debug, Clone)]
pub struct RdmRequestData {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub port_id: u8,
    pub message_count: u8,
    pub sub_device: u16,
    pub command_class: RequestCommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

/// An RDM response that does not have its parameter data deserialized.
#[derive(Debug, Clone)]
pub struct RdmResponseData {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub response_type: ResponseType,
    pub message_count: u8,
    pub sub_device: u16,
    pub command_class: ResponseCommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmDeserializationError {
    /// Buffer must be at least 26 bytes
    BufferTooSmall,
    /// Buffer must be at most 257 bytes
    BufferTooBig,
    /// The command class was not found; contains contents of command class field.
    /// Discovery frames land here as well, they never reach this layer.
    CommandClassNotFound(u8),
    /// The response type was not found; contains contents of response type field
    ResponseTypeNotFound(u8),
    /// The message length field is incorrect; contains result of parsing
    WrongMessageLength(usize),
    /// The parameter data length field disagrees with the frame size;
    /// contains result of parsing
    WrongParameterDataLength(usize),
    /// Wrong checksum
    WrongChecksum,
    /// Received wrong start code (0xCC) or sub start code (0x01)
    WrongStartCode,
    /// The source uid is a broadcast address.
    SourceUidIsBroadcast,
}

impl core::fmt::Display for RdmDeserializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdmDeserializationError::BufferTooSmall => write!(f, "buffer too small"),
            RdmDeserializationError::BufferTooBig => write!(f, "buffer to big"),
            RdmDeserializationError::CommandClassNotFound(command_class) => {
                write!(f, "command class {} not found", command_class)
            },
            RdmDeserializationError::ResponseTypeNotFound(response_type) => {
                write!(f, "response type {} is unknown", response_type)
            },
            RdmDeserializationError::WrongMessageLength(message_length) => {
                write!(f, "message length {} is incorrect", message_length)
            },
            RdmDeserializationError::WrongParameterDataLength(parameter_data_length) => {
                write!(
                    f,
                    "parameter data length {} is incorrect",
                    parameter_data_length
                )
            },
            RdmDeserializationError::WrongChecksum => write!(f, "checksum is incorrect"),
            RdmDeserializationError::WrongStartCode => write!(f, "start code is incorrect"),
            RdmDeserializationError::SourceUidIsBroadcast => write!(f, "source uid is a broadcast"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RdmDeserializationError {}

#[derive(Debug)]
pub enum RdmData {
    Request(RdmRequestData),
    Response(RdmResponseData),
}

impl RdmData {
    pub fn deserialize(buf: &[u8]) -> Result<Self, RdmDeserializationError> {
        deserialize_rdm_data(buf)
    }
}

/// Deserialize rdm data.
/// Buffer must be between 26 and 257 bytes.
pub fn deserialize_rdm_data(buffer: &[u8]) -> Result<RdmData, RdmDeserializationError> {
    let buffer_size = buffer.len();

    if buffer_size < RDM_MIN_PACKAGE_SIZE {
        return Err(RdmDeserializationError::BufferTooSmall);
    }

    if buffer_size > RDM_MAX_PACKAGE_SIZE {
        return Err(RdmDeserializationError::BufferTooBig);
    }

    if !verify_checksum(buffer) {
        return Err(RdmDeserializationError::WrongChecksum);
    }

    let message_view = rdm_message_layout::View::new(buffer);

    if message_view.start_code().read() != SC_RDM
        || message_view.sub_start_code().read() != SC_SUB_MESSAGE
    {
        return Err(RdmDeserializationError::WrongStartCode);
    }

    // exclude checksum
    let message_length = message_view.message_length().read() as usize;
    if message_length != buffer_size - 2 {
        return Err(RdmDeserializationError::WrongMessageLength(message_length));
    }

    let parameter_data_length = message_view.parameter_data_length().read() as usize;
    if RDM_HEADER_SIZE + parameter_data_length != message_length {
        return Err(RdmDeserializationError::WrongParameterDataLength(
            parameter_data_length,
        ));
    }

    let parameter_data_and_checksum = message_view.parameter_data_and_checksum();
    let parameter_data =
        DataPack::from_slice(&parameter_data_and_checksum[..parameter_data_length])
            .map_err(|_| RdmDeserializationError::BufferTooBig)?;

    let source_uid = match PackageAddress::from_bytes(message_view.source_uid()) {
        PackageAddress::Device(device_uid) => device_uid,
        _ => return Err(RdmDeserializationError::SourceUidIsBroadcast),
    };

    let command_class_field = message_view.command_class().read();
    let is_request = RequestCommandClass::try_from(command_class_field).is_ok();

    let rdm_data = if is_request {
        RdmData::Request(RdmRequestData {
            destination_uid: PackageAddress::from_bytes(message_view.destination_uid()),
            source_uid,
            transaction_number: message_view.transaction_number().read(),
            port_id: message_view.port_id_response_type().read(),
            message_count: message_view.message_count().read(),
            sub_device: message_view.sub_device().read(),
            command_class: command_class_field
                .try_into()
                .map_err(|_| RdmDeserializationError::CommandClassNotFound(command_class_field))?,
            parameter_id: message_view.parameter_id().read(),
            parameter_data,
        })
    } else {
        let response_type_field = message_view.port_id_response_type().read();
        let response_type = response_type_field
            .try_into()
            .map_err(|_| RdmDeserializationError::ResponseTypeNotFound(response_type_field))?;

        RdmData::Response(RdmResponseData {
            destination_uid: PackageAddress::from_bytes(message_view.destination_uid()),
            source_uid,
            transaction_number: message_view.transaction_number().read(),
            response_type,
            message_count: message_view.message_count().read(),
            sub_device: message_view.sub_device().read(),
            command_class: command_class_field
                .try_into()
                .map_err(|_| RdmDeserializationError::CommandClassNotFound(command_class_field))?,
            parameter_id: message_view.parameter_id().read(),
            parameter_data,
        })
    };

    Ok(rdm_data)
}
