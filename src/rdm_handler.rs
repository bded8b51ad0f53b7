//! The request dispatcher. Decoded requests come in from the transport
//! layer, get routed to the built-in model-control pids or the active
//! [Model], and any reply is serialized into the dispatcher's
//! [ResponseBuffer] and handed back to the transport.
//!
//! Dispatch is single-threaded and run-to-completion:
//! [RdmHandler::handle_request] returns after the transport callback
//! completes or is skipped. A model's request hook cannot re-enter the
//! dispatcher, every path in reaches it through the same `&mut RdmHandler`.

use crate::command_class::RequestCommandClass;
use crate::consts::{SUB_DEVICE_ALL, SUB_DEVICE_ROOT, UID_LENGTH};
use crate::model::{IoctlCommand, Model, ModelRegistry};
use crate::pids;
use crate::rdm_data::RdmRequestData;
use crate::response::ResponseBuffer;
use crate::types::{DataPack, NackReason, RdmResponse};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};

/// The seam to the wire. Implementations queue the frame on the physical
/// transceiver; `is_ack` is false for error-class frames so the transport
/// can route them differently.
pub trait ResponseTransport {
    /// Send a response frame. The dispatcher always supplies exactly one
    /// segment. Returns false if the frame could not be queued.
    fn send_response(&mut self, is_ack: bool, segments: &[&[u8]]) -> bool;
}

pub struct RdmHandlerConfig<Transport> {
    /// The model that comes up active when it is registered.
    pub default_model_id: u16,
    /// Where finished response frames go.
    pub transport: Transport,
}

/// The dispatcher. One instance exists per responder port; construct it once
/// at start-up and pass it by `&mut` to every dispatch call.
pub struct RdmHandler<'m, Transport: ResponseTransport> {
    registry: ModelRegistry<'m>,
    transport: Transport,
    response: ResponseBuffer,
}

impl<'m, Transport: ResponseTransport> RdmHandler<'m, Transport> {
    pub fn new(config: RdmHandlerConfig<Transport>) -> Self {
        Self {
            registry: ModelRegistry::new(config.default_model_id),
            transport: config.transport,
            response: ResponseBuffer::new(),
        }
    }

    /// See [ModelRegistry::add_model].
    pub fn add_model(&mut self, model: &'m mut dyn Model) -> bool {
        self.registry.add_model(model)
    }

    /// See [ModelRegistry::set_active_model].
    pub fn set_active_model(&mut self, model_id: u16) -> bool {
        self.registry.set_active_model(model_id)
    }

    /// See [ModelRegistry::active_model_id].
    pub fn active_model_id(&self) -> u16 {
        self.registry.active_model_id()
    }

    /// Ids of every installed model, in registration order.
    pub fn installed_models(&self) -> impl Iterator<Item = u16> + '_ + use<'_, 'm, Transport> {
        self.registry.installed_models()
    }

    /// Dispatches one decoded request. DEVICE_MODEL and DEVICE_MODEL_LIST
    /// are handled here, they exist above any model's own pid table and are
    /// how a controller configures an otherwise silent device. Everything
    /// else goes to the active model; with no active model the request is
    /// dropped without any reply.
    pub fn handle_request(&mut self, request: &RdmRequestData) {
        let response = match request.parameter_id {
            pids::DEVICE_MODEL => self.get_set_device_model(request),
            pids::DEVICE_MODEL_LIST => self.get_model_list(request),
            _ => {
                let Some(model) = self.registry.active_model_mut() else {
                    return;
                };

                model.request(request, &mut self.response)
            },
        };

        match response {
            RdmResponse::NoResponse => {},
            RdmResponse::Ack(length) => {
                let _ = self
                    .transport
                    .send_response(true, &[self.response.frame(length)]);
            },
            RdmResponse::Nack(length) => {
                let _ = self
                    .transport
                    .send_response(false, &[self.response.frame(length)]);
            },
        }
    }

    /// The device uid, queried from the active model. A device with no
    /// active personality has no identity and must not claim one, so this
    /// falls back to [UniqueIdentifier::NULL].
    pub fn uid(&mut self) -> UniqueIdentifier {
        let Some(model) = self.registry.active_model_mut() else {
            return UniqueIdentifier::NULL;
        };

        let mut buffer = [0u8; UID_LENGTH];
        match model.ioctl(IoctlCommand::GetUid, &mut buffer) {
            Some(UID_LENGTH) => match PackageAddress::from_bytes(&buffer) {
                PackageAddress::Device(uid) => uid,
                _ => UniqueIdentifier::NULL,
            },
            _ => UniqueIdentifier::NULL,
        }
    }

    /// Forwards the scheduler tick to the active model. Must stay cheap, the
    /// host loop also services transceiver i/o.
    pub fn tasks(&mut self) {
        if let Some(model) = self.registry.active_model_mut() {
            model.tasks();
        }
    }

    fn get_set_device_model(&mut self, request: &RdmRequestData) -> RdmResponse {
        let our_uid = self.uid();

        if !request.destination_uid.requires_action(our_uid) {
            return RdmResponse::NoResponse;
        }

        // No subdevice support.
        if request.sub_device != SUB_DEVICE_ROOT && request.sub_device != SUB_DEVICE_ALL {
            return self.nack_response(request, our_uid, NackReason::SubDeviceOutOfRange);
        }

        if request.sub_device == SUB_DEVICE_ALL
            && request.command_class == RequestCommandClass::GetCommand
        {
            return self.nack_response(request, our_uid, NackReason::SubDeviceOutOfRange);
        }

        match request.command_class {
            RequestCommandClass::GetCommand => {
                if !request.parameter_data.is_empty() {
                    return self.nack_response(request, our_uid, NackReason::FormatError);
                }

                if !request.destination_uid.requires_response(our_uid) {
                    return RdmResponse::NoResponse;
                }

                let model_id = self.registry.active_model_id();
                self.response
                    .build_ack(request, our_uid, &model_id.to_be_bytes())
            },
            RequestCommandClass::SetCommand => {
                if request.parameter_data.len() != 2 {
                    return self.nack_response(request, our_uid, NackReason::FormatError);
                }

                // Take action first. A broadcast SET must still change the
                // device state, only the reply is suppressed.
                let new_model =
                    u16::from_be_bytes(request.parameter_data[..2].try_into().unwrap());
                let changed = self.registry.set_active_model(new_model);

                if !request.destination_uid.requires_response(our_uid) {
                    return RdmResponse::NoResponse;
                }

                if !changed {
                    return self
                        .response
                        .build_nack(request, our_uid, NackReason::DataOutOfRange);
                }

                self.response.build_ack(request, our_uid, &[])
            },
        }
    }

    fn get_model_list(&mut self, request: &RdmRequestData) -> RdmResponse {
        let our_uid = self.uid();

        if !request.destination_uid.requires_response(our_uid) {
            return RdmResponse::NoResponse;
        }

        // No subdevice support.
        if request.sub_device != SUB_DEVICE_ROOT {
            return self.nack_response(request, our_uid, NackReason::SubDeviceOutOfRange);
        }

        if request.command_class != RequestCommandClass::GetCommand {
            return self.nack_response(request, our_uid, NackReason::UnsupportedCommandClass);
        }

        if !request.parameter_data.is_empty() {
            return self.nack_response(request, our_uid, NackReason::FormatError);
        }

        let mut model_ids = DataPack::new();
        for model_id in self.registry.installed_models() {
            model_ids.extend_from_slice(&model_id.to_be_bytes()).unwrap();
        }

        self.response.build_ack(request, our_uid, &model_ids)
    }

    fn nack_response(
        &mut self,
        request: &RdmRequestData,
        our_uid: UniqueIdentifier,
        reason: NackReason,
    ) -> RdmResponse {
        if !request.destination_uid.requires_response(our_uid) {
            return RdmResponse::NoResponse;
        }

        self.response.build_nack(request, our_uid, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_class::ResponseCommandClass;
    use crate::consts::NULL_MODEL_ID;
    use crate::rdm_data::RdmData;
    use crate::types::ResponseType;
    use std::cell::RefCell;
    use std::rc::Rc;

    type SentFrames = Rc<RefCell<Vec<(bool, Vec<u8>)>>>;

    struct RecordingTransport {
        sent: SentFrames,
    }

    impl ResponseTransport for RecordingTransport {
        fn send_response(&mut self, is_ack: bool, segments: &[&[u8]]) -> bool {
            assert_eq!(segments.len(), 1);
            self.sent.borrow_mut().push((is_ack, segments[0].to_vec()));
            true
        }
    }

    struct PersonalityModel {
        model_id: u16,
        uid: UniqueIdentifier,
        handled_pids: Rc<RefCell<Vec<u16>>>,
        ticks: Rc<RefCell<u32>>,
    }

    impl PersonalityModel {
        fn new(model_id: u16) -> Self {
            Self {
                model_id,
                uid: our_uid(),
                handled_pids: Rc::new(RefCell::new(Vec::new())),
                ticks: Rc::new(RefCell::new(0)),
            }
        }
    }

    impl Model for PersonalityModel {
        fn model_id(&self) -> u16 {
            self.model_id
        }

        fn ioctl(&mut self, command: IoctlCommand, buffer: &mut [u8]) -> Option<usize> {
            match command {
                IoctlCommand::GetUid => {
                    buffer[..UID_LENGTH].copy_from_slice(&self.uid.to_bytes());
                    Some(UID_LENGTH)
                },
            }
        }

        fn request(
            &mut self,
            request: &RdmRequestData,
            response: &mut ResponseBuffer,
        ) -> RdmResponse {
            self.handled_pids.borrow_mut().push(request.parameter_id);

            if !request.destination_uid.requires_response(self.uid) {
                return RdmResponse::NoResponse;
            }

            response.build_ack(request, self.uid, &[0x01])
        }

        fn tasks(&mut self) {
            *self.ticks.borrow_mut() += 1;
        }
    }

    fn our_uid() -> UniqueIdentifier {
        UniqueIdentifier::new(0x7a70, 0x01020304).unwrap()
    }

    fn controller_uid() -> UniqueIdentifier {
        UniqueIdentifier::new(0x7a70, 0x12345678).unwrap()
    }

    fn request(
        command_class: RequestCommandClass,
        parameter_id: u16,
        destination_uid: PackageAddress,
        parameter_data: &[u8],
    ) -> RdmRequestData {
        RdmRequestData {
            destination_uid,
            source_uid: controller_uid(),
            transaction_number: 0x42,
            port_id: 1,
            message_count: 0,
            sub_device: SUB_DEVICE_ROOT,
            command_class,
            parameter_id,
            parameter_data: DataPack::from_slice(parameter_data).unwrap(),
        }
    }

    fn new_handler<'m>(
        default_model_id: u16,
    ) -> (RdmHandler<'m, RecordingTransport>, SentFrames) {
        let sent: SentFrames = Rc::new(RefCell::new(Vec::new()));
        let handler = RdmHandler::new(RdmHandlerConfig {
            default_model_id,
            transport: RecordingTransport { sent: sent.clone() },
        });

        (handler, sent)
    }

    fn parse_single_response(sent: &SentFrames) -> (bool, crate::rdm_data::RdmResponseData) {
        let sent = sent.borrow();
        assert_eq!(sent.len(), 1);

        let (is_ack, frame) = &sent[0];
        match RdmData::deserialize(frame).unwrap() {
            RdmData::Response(response) => (*is_ack, response),
            RdmData::Request(_) => panic!("sent frame parsed as a request"),
        }
    }

    #[test]
    fn test_get_device_model_reports_active_id() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        assert!(handler.add_model(&mut model));

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[],
        ));

        let (is_ack, response) = parse_single_response(&sent);
        assert!(is_ack);
        assert_eq!(response.response_type, ResponseType::ResponseTypeAck);
        assert_eq!(response.command_class, ResponseCommandClass::GetCommandResponse);
        assert_eq!(response.parameter_id, pids::DEVICE_MODEL);
        assert_eq!(response.parameter_data.as_slice(), &[0x01, 0x02]);
        assert_eq!(response.source_uid, our_uid());
        assert_eq!(
            response.destination_uid,
            PackageAddress::Device(controller_uid())
        );
    }

    #[test]
    fn test_get_device_model_without_active_model_reports_null() {
        let (mut handler, sent) = new_handler(0x0102);

        // no personality, no identity: the device only answers at the
        // all-zero uid
        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(UniqueIdentifier::NULL),
            &[],
        ));

        let (is_ack, response) = parse_single_response(&sent);
        assert!(is_ack);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NULL_MODEL_ID.to_be_bytes()
        );
    }

    #[test]
    fn test_get_device_model_rejects_parameter_data() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[0x00],
        ));

        let (is_ack, response) = parse_single_response(&sent);
        assert!(!is_ack);
        assert_eq!(response.response_type, ResponseType::ResponseTypeNackReason);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::FormatError.serialize()
        );
    }

    #[test]
    fn test_get_device_model_rejects_sub_device_all() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        let mut get = request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[],
        );
        get.sub_device = SUB_DEVICE_ALL;
        handler.handle_request(&get);

        let (is_ack, response) = parse_single_response(&sent);
        assert!(!is_ack);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::SubDeviceOutOfRange.serialize()
        );
    }

    #[test]
    fn test_get_device_model_rejects_unknown_sub_device() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        let mut get = request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[],
        );
        get.sub_device = 5;
        handler.handle_request(&get);

        let (_, response) = parse_single_response(&sent);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::SubDeviceOutOfRange.serialize()
        );
    }

    #[test]
    fn test_get_device_model_suppressed_for_broadcast() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Broadcast,
            &[],
        ));
        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::ManufacturerBroadcast(0x7a70),
            &[],
        ));

        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_set_device_model_switches_and_acks() {
        let mut first = PersonalityModel::new(0x0102);
        let mut second = PersonalityModel::new(0x0203);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut first);
        handler.add_model(&mut second);

        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[0x02, 0x03],
        ));

        assert_eq!(handler.active_model_id(), 0x0203);

        let (is_ack, response) = parse_single_response(&sent);
        assert!(is_ack);
        assert_eq!(response.command_class, ResponseCommandClass::SetCommandResponse);
        assert!(response.parameter_data.is_empty());
    }

    #[test]
    fn test_set_device_model_unknown_id_nacks_and_keeps_model() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[0x7f, 0xff],
        ));

        assert_eq!(handler.active_model_id(), 0x0102);

        let (is_ack, response) = parse_single_response(&sent);
        assert!(!is_ack);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::DataOutOfRange.serialize()
        );
    }

    #[test]
    fn test_set_device_model_broadcast_acts_but_stays_silent() {
        let mut first = PersonalityModel::new(0x0102);
        let mut second = PersonalityModel::new(0x0203);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut first);
        handler.add_model(&mut second);

        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Broadcast,
            &[0x02, 0x03],
        ));

        assert_eq!(handler.active_model_id(), 0x0203);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_set_device_model_broadcast_unknown_id_stays_silent() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Broadcast,
            &[0x7f, 0xff],
        ));

        assert_eq!(handler.active_model_id(), 0x0102);
        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_set_device_model_rejects_wrong_length() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(our_uid()),
            &[0x02],
        ));

        let (is_ack, response) = parse_single_response(&sent);
        assert!(!is_ack);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::FormatError.serialize()
        );
    }

    #[test]
    fn test_get_model_list_enumerates_in_registration_order() {
        let mut first = PersonalityModel::new(0x0203);
        let mut second = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0203);
        handler.add_model(&mut first);
        handler.add_model(&mut second);

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL_LIST,
            PackageAddress::Device(our_uid()),
            &[],
        ));

        let (is_ack, response) = parse_single_response(&sent);
        assert!(is_ack);
        assert_eq!(response.parameter_id, pids::DEVICE_MODEL_LIST);
        // registration order, not numeric order
        assert_eq!(
            response.parameter_data.as_slice(),
            &[0x02, 0x03, 0x01, 0x02]
        );
    }

    #[test]
    fn test_get_model_list_rejects_set_command() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL_LIST,
            PackageAddress::Device(our_uid()),
            &[],
        ));

        let (is_ack, response) = parse_single_response(&sent);
        assert!(!is_ack);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::UnsupportedCommandClass.serialize()
        );
    }

    #[test]
    fn test_get_model_list_rejects_sub_devices() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        let mut get = request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL_LIST,
            PackageAddress::Device(our_uid()),
            &[],
        );
        get.sub_device = SUB_DEVICE_ALL;
        handler.handle_request(&get);

        let (_, response) = parse_single_response(&sent);
        assert_eq!(
            response.parameter_data.as_slice(),
            &NackReason::SubDeviceOutOfRange.serialize()
        );
    }

    #[test]
    fn test_get_model_list_suppressed_for_broadcast() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL_LIST,
            PackageAddress::Broadcast,
            &[],
        ));

        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_unknown_pid_without_active_model_is_dropped() {
        let (mut handler, sent) = new_handler(0x0102);

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            0x1000,
            PackageAddress::Device(our_uid()),
            &[],
        ));

        assert!(sent.borrow().is_empty());
    }

    #[test]
    fn test_unknown_pid_delegates_to_active_model() {
        let mut model = PersonalityModel::new(0x0102);
        let handled_pids = model.handled_pids.clone();
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            0x1000,
            PackageAddress::Device(our_uid()),
            &[],
        ));

        assert_eq!(*handled_pids.borrow(), [0x1000]);

        let (is_ack, response) = parse_single_response(&sent);
        assert!(is_ack);
        assert_eq!(response.parameter_id, 0x1000);
        assert_eq!(response.parameter_data.as_slice(), &[0x01]);
    }

    #[test]
    fn test_unrelated_destination_is_ignored() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, sent) = new_handler(0x0102);
        handler.add_model(&mut model);

        let other_device = UniqueIdentifier::new(0x7a70, 0x01020363).unwrap();
        handler.handle_request(&request(
            RequestCommandClass::GetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::Device(other_device),
            &[],
        ));
        handler.handle_request(&request(
            RequestCommandClass::SetCommand,
            pids::DEVICE_MODEL,
            PackageAddress::ManufacturerBroadcast(0x4a80),
            &[0x02, 0x03],
        ));

        assert!(sent.borrow().is_empty());
        assert_eq!(handler.active_model_id(), 0x0102);
    }

    #[test]
    fn test_uid_follows_active_model() {
        let mut model = PersonalityModel::new(0x0102);
        let (mut handler, _) = new_handler(0x0102);

        assert_eq!(handler.uid(), UniqueIdentifier::NULL);

        handler.add_model(&mut model);
        assert_eq!(handler.uid(), our_uid());

        handler.set_active_model(NULL_MODEL_ID);
        assert_eq!(handler.uid(), UniqueIdentifier::NULL);
    }

    #[test]
    fn test_tasks_only_reach_the_active_model() {
        let mut model = PersonalityModel::new(0x0102);
        let ticks = model.ticks.clone();
        let (mut handler, _) = new_handler(0x0102);

        handler.tasks();
        assert_eq!(*ticks.borrow(), 0);

        handler.add_model(&mut model);
        handler.tasks();
        handler.tasks();
        assert_eq!(*ticks.borrow(), 2);

        handler.set_active_model(NULL_MODEL_ID);
        handler.tasks();
        assert_eq!(*ticks.borrow(), 2);
    }
}
