//! Rust library implementing the model management and request dispatch core
//! of a DMX-RDM (ANSI E1.20) responder. A device ships one or more "models"
//! (personalities), registers them at start-up and a controller switches
//! between them over the wire; the dispatcher routes every other pid to
//! whichever model is active. This library features no-std as well as
//! no-alloc support (no heap allocation) to target embedded as well as os
//! platforms.
//!
//! The physical transceiver, its timing and the discovery/arbitration
//! handling live outside this crate: the host decodes frames off the bus,
//! hands requests to [rdm_handler::RdmHandler::handle_request] and wires a
//! [rdm_handler::ResponseTransport] for the reply direction.
//!
//! Please refer to the [official specifications](https://tsp.esta.org/)
//! published by the ESTA.
//!
//! # Usage
//!
//! ```rust
//! use dmx_rdm_models::command_class::RequestCommandClass;
//! use dmx_rdm_models::model::{IoctlCommand, Model};
//! use dmx_rdm_models::rdm_data::{RdmData, RdmRequestData};
//! use dmx_rdm_models::rdm_handler::{RdmHandler, RdmHandlerConfig, ResponseTransport};
//! use dmx_rdm_models::response::ResponseBuffer;
//! use dmx_rdm_models::types::{NackReason, RdmResponse};
//! use dmx_rdm_models::unique_identifier::UniqueIdentifier;
//!
//! const PID_IDENTIFY_DEVICE: u16 = 0x1000;
//!
//! struct DimmerModel {
//!     uid: UniqueIdentifier,
//!     identify: bool,
//! }
//!
//! impl Model for DimmerModel {
//!     fn model_id(&self) -> u16 {
//!         0x0102
//!     }
//!
//!     fn ioctl(&mut self, command: IoctlCommand, buffer: &mut [u8]) -> Option<usize> {
//!         match command {
//!             IoctlCommand::GetUid => {
//!                 buffer[..6].copy_from_slice(&self.uid.to_bytes());
//!                 Some(6)
//!             },
//!         }
//!     }
//!
//!     fn request(
//!         &mut self,
//!         request: &RdmRequestData,
//!         response: &mut ResponseBuffer,
//!     ) -> RdmResponse {
//!         match request.parameter_id {
//!             PID_IDENTIFY_DEVICE => match request.command_class {
//!                 RequestCommandClass::GetCommand => {
//!                     if !request.destination_uid.requires_response(self.uid) {
//!                         return RdmResponse::NoResponse;
//!                     }
//!
//!                     response.build_ack(request, self.uid, &[self.identify as u8])
//!                 },
//!                 RequestCommandClass::SetCommand => {
//!                     if request.parameter_data.len() != 1 {
//!                         return response.build_nack(
//!                             request,
//!                             self.uid,
//!                             NackReason::DataOutOfRange,
//!                         );
//!                     }
//!
//!                     // A broadcast SET changes the state, only the reply
//!                     // is suppressed.
//!                     self.identify = request.parameter_data[0] != 0;
//!
//!                     if !request.destination_uid.requires_response(self.uid) {
//!                         return RdmResponse::NoResponse;
//!                     }
//!
//!                     response.build_ack(request, self.uid, &[])
//!                 },
//!             },
//!             _ => {
//!                 if !request.destination_uid.requires_response(self.uid) {
//!                     return RdmResponse::NoResponse;
//!                 }
//!
//!                 response.build_nack(request, self.uid, NackReason::UnknownPid)
//!             },
//!         }
//!     }
//! }
//!
//! struct UartTransport;
//!
//! impl ResponseTransport for UartTransport {
//!     fn send_response(&mut self, _is_ack: bool, _segments: &[&[u8]]) -> bool {
//!         // queue the single segment on the transceiver here
//!         true
//!     }
//! }
//!
//! let mut dimmer = DimmerModel {
//!     uid: UniqueIdentifier::new(0x7ff0, 1).unwrap(),
//!     identify: false,
//! };
//!
//! let mut handler = RdmHandler::new(RdmHandlerConfig {
//!     // matches the dimmer's model id, so it comes up active
//!     default_model_id: 0x0102,
//!     transport: UartTransport,
//! });
//!
//! assert!(handler.add_model(&mut dimmer));
//! assert_eq!(handler.active_model_id(), 0x0102);
//!
//! // The host loop decodes frames off the bus, dispatches requests and
//! // drives the periodic hook of the active model.
//! # let frame: &[u8] = &[];
//! if let Ok(RdmData::Request(request)) = RdmData::deserialize(frame) {
//!     handler.handle_request(&request);
//! }
//! handler.tasks();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod command_class;
pub mod consts;
mod layouts;
pub mod model;
pub mod pids;
pub mod rdm_data;
pub mod rdm_handler;
/// In-place serialization of response frames.
pub mod response;
pub mod types;
pub mod unique_identifier;
pub mod utils;
