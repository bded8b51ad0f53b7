use crate::consts::{
    RDM_HEADER_SIZE, RDM_MAX_PACKAGE_SIZE, RDM_MAX_PARAMETER_DATA_LENGTH, SC_RDM, SC_SUB_MESSAGE,
};
use crate::layouts::rdm_message_layout;
use crate::rdm_data::RdmRequestData;
use crate::types::{NackReason, RdmResponse, ResponseType};
use crate::unique_identifier::UniqueIdentifier;
use crate::utils::append_checksum;

/// Fixed buffer that responses are serialized into in place. The protocol
/// guarantees strict request/response turn-taking, so one buffer per
/// dispatcher suffices; exclusive access for the duration of a request is
/// enforced by the `&mut` borrows reaching it.
pub struct ResponseBuffer {
    frame: [u8; RDM_MAX_PACKAGE_SIZE],
}

impl ResponseBuffer {
    pub const fn new() -> Self {
        Self {
            frame: [0u8; RDM_MAX_PACKAGE_SIZE],
        }
    }

    /// Serializes a complete response frame: header with source and
    /// destination swapped, the request's command class mapped to its
    /// response counterpart and the pid echoed, then the parameter data,
    /// then the checksum. Returns the total frame length.
    pub fn build_response(
        &mut self,
        request: &RdmRequestData,
        source_uid: UniqueIdentifier,
        response_type: ResponseType,
        parameter_data: &[u8],
    ) -> usize {
        assert!(parameter_data.len() <= RDM_MAX_PARAMETER_DATA_LENGTH);

        let mut view = rdm_message_layout::View::new(&mut self.frame[..]);

        view.start_code_mut().write(SC_RDM);
        view.sub_start_code_mut().write(SC_SUB_MESSAGE);
        view.message_length_mut()
            .write((RDM_HEADER_SIZE + parameter_data.len()) as u8);
        view.destination_uid_mut()
            .copy_from_slice(&request.source_uid.to_bytes());
        view.source_uid_mut().copy_from_slice(&source_uid.to_bytes());
        view.transaction_number_mut()
            .write(request.transaction_number);
        view.port_id_response_type_mut().write(response_type as u8);
        view.message_count_mut().write(0);
        view.sub_device_mut().write(request.sub_device);
        view.command_class_mut()
            .write(request.command_class.get_response_class() as u8);
        view.parameter_id_mut().write(request.parameter_id);
        view.parameter_data_length_mut()
            .write(parameter_data.len() as u8);
        view.parameter_data_and_checksum_mut()[..parameter_data.len()]
            .copy_from_slice(parameter_data);

        append_checksum(&mut self.frame)
    }

    /// Builds an ack frame carrying `parameter_data`.
    pub fn build_ack(
        &mut self,
        request: &RdmRequestData,
        source_uid: UniqueIdentifier,
        parameter_data: &[u8],
    ) -> RdmResponse {
        RdmResponse::Ack(self.build_response(
            request,
            source_uid,
            ResponseType::ResponseTypeAck,
            parameter_data,
        ))
    }

    /// Builds a nack frame carrying the reason code as parameter data.
    pub fn build_nack(
        &mut self,
        request: &RdmRequestData,
        source_uid: UniqueIdentifier,
        reason: NackReason,
    ) -> RdmResponse {
        RdmResponse::Nack(self.build_response(
            request,
            source_uid,
            ResponseType::ResponseTypeNackReason,
            &reason.serialize(),
        ))
    }

    /// Builds an ack-timer frame. `delay` is the time the controller has to
    /// wait before collecting the result, in 100ms steps.
    pub fn build_ack_timer(
        &mut self,
        request: &RdmRequestData,
        source_uid: UniqueIdentifier,
        delay: u16,
    ) -> RdmResponse {
        RdmResponse::Ack(self.build_response(
            request,
            source_uid,
            ResponseType::ResponseTypeAckTimer,
            &delay.to_be_bytes(),
        ))
    }

    /// The serialized frame of the given length, for handing to the
    /// transport as a single scatter/gather segment.
    pub fn frame(&self, length: usize) -> &[u8] {
        &self.frame[..length]
    }
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}
