//! Device models and the fixed-capacity table they are registered in.
//!
//! A model is one personality of the physical device. Firmware registers
//! every personality it ships at start-up; at most one model is active at a
//! time and only the active model sees requests, drives the uid and gets
//! scheduler ticks.

use crate::consts::{MAX_RDM_MODELS, NULL_MODEL_ID};
use crate::rdm_data::RdmRequestData;
use crate::response::ResponseBuffer;
use crate::types::RdmResponse;

/// Queries a model answers through its [Model::ioctl] hook.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoctlCommand {
    /// Copy the model's 6 byte uid into the buffer.
    GetUid,
}

/// One pluggable device personality.
///
/// All hooks run on the dispatcher's single thread of control and must not
/// block; [Model::tasks] competes with time-critical transceiver servicing
/// and has to return promptly.
pub trait Model {
    /// The id this model answers to on the wire. Must not be
    /// [NULL_MODEL_ID] and must be stable for the model's lifetime.
    fn model_id(&self) -> u16;

    /// Called when this model becomes the active model.
    fn activate(&mut self) {}

    /// Called when this model is superseded or deactivated.
    fn deactivate(&mut self) {}

    /// Generic query interface. Writes the answer into `buffer` and returns
    /// the number of bytes written, or `None` if the command is not
    /// supported. [IoctlCommand::GetUid] is the one command the dispatcher
    /// itself relies on.
    fn ioctl(&mut self, _command: IoctlCommand, _buffer: &mut [u8]) -> Option<usize> {
        None
    }

    /// Handles every pid the dispatcher does not intercept. Any reply is
    /// serialized into `response`; the returned [RdmResponse] tells the
    /// dispatcher whether and how to send it.
    fn request(&mut self, request: &RdmRequestData, response: &mut ResponseBuffer) -> RdmResponse;

    /// Invoked once per scheduler tick while this model is active.
    fn tasks(&mut self) {}
}

struct ModelSlot<'m> {
    model_id: u16,
    model: &'m mut dyn Model,
}

/// Fixed-capacity table of installed models. Registration is append-only;
/// after start-up only the active reference changes.
pub struct ModelRegistry<'m> {
    slots: [Option<ModelSlot<'m>>; MAX_RDM_MODELS],
    active: Option<usize>,
    default_model_id: u16,
}

impl<'m> ModelRegistry<'m> {
    pub fn new(default_model_id: u16) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            active: None,
            default_model_id,
        }
    }

    /// Installs a model into the first free slot. Fails without mutating the
    /// table if the id is [NULL_MODEL_ID], already installed or the table is
    /// full. A model whose id equals the configured default is activated
    /// immediately, before this returns, so the configured personality comes
    /// up live with no extra call.
    pub fn add_model(&mut self, model: &'m mut dyn Model) -> bool {
        let model_id = model.model_id();

        if model_id == NULL_MODEL_ID {
            return false;
        }

        if self.slots.iter().flatten().any(|slot| slot.model_id == model_id) {
            return false;
        }

        let Some(free) = self.slots.iter().position(|slot| slot.is_none()) else {
            return false;
        };

        let slot = self.slots[free].insert(ModelSlot { model_id, model });

        if model_id == self.default_model_id {
            self.active = Some(free);
            slot.model.activate();
        }

        true
    }

    /// Makes the model with `model_id` active. Already active is a no-op
    /// success. [NULL_MODEL_ID] deactivates the current model and always
    /// succeeds. An id that is not installed fails and leaves the active
    /// model untouched. The current model is always deactivated before the
    /// new one activates; the hooks may touch shared hardware state, so the
    /// ordering is never skipped or reversed.
    pub fn set_active_model(&mut self, model_id: u16) -> bool {
        if self.active_model_id() == model_id && self.active.is_some() {
            return true;
        }

        if model_id == NULL_MODEL_ID {
            self.deactivate_current();
            return true;
        }

        let Some(index) = self
            .slots
            .iter()
            .position(|slot| matches!(slot, Some(slot) if slot.model_id == model_id))
        else {
            return false;
        };

        self.deactivate_current();
        self.active = Some(index);
        if let Some(slot) = self.slots[index].as_mut() {
            slot.model.activate();
        }

        true
    }

    /// The active model's id, or [NULL_MODEL_ID] if none is active.
    pub fn active_model_id(&self) -> u16 {
        match self.active.and_then(|index| self.slots[index].as_ref()) {
            Some(slot) => slot.model_id,
            None => NULL_MODEL_ID,
        }
    }

    /// Ids of every installed model, in registration order.
    pub fn installed_models(&self) -> impl Iterator<Item = u16> + '_ + use<'_, 'm> {
        self.slots.iter().flatten().map(|slot| slot.model_id)
    }

    pub(crate) fn active_model_mut(&mut self) -> Option<&mut dyn Model> {
        let index = self.active?;

        match self.slots[index].as_mut() {
            Some(slot) => Some(&mut *slot.model),
            None => None,
        }
    }

    fn deactivate_current(&mut self) {
        if let Some(index) = self.active.take() {
            if let Some(slot) = self.slots[index].as_mut() {
                slot.model.deactivate();
            }
        }
    }
}
