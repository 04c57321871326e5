//! Common header values as a built-in schema.

use crate::binding::Bound;
use crate::error::Result;
use crate::hl7_schema;
use crate::message::Message;

/// Routing and identification values from the `MSH` segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageInfo {
    pub sending_app: String,
    pub sending_facility: String,
    pub receiving_app: String,
    pub receiving_facility: String,
    pub timestamp: String,
    pub message_type: String,
    pub trigger_event: String,
    pub structure: String,
    pub control_id: String,
    pub processing_id: String,
    pub version: String,
}

hl7_schema! {
    MessageInfo {
        sending_app: text "MSH.3",
        sending_facility: text "MSH.4",
        receiving_app: text "MSH.5",
        receiving_facility: text "MSH.6",
        timestamp: text "MSH.7",
        message_type: text "MSH.9.1",
        trigger_event: text "MSH.9.2",
        structure: text "MSH.9.3",
        control_id: text "MSH.10",
        processing_id: text "MSH.11",
        version: text "MSH.12",
    }
}

impl Message {
    /// Header values; fields the message lacks are left empty.
    pub fn info(&self) -> Result<MessageInfo> {
        let bound: Bound<MessageInfo> = self.bind();
        bound.into_result()
    }
}
