//! # Queue message codec.
//!
//! A queue message is a serialized positional sequence. Two wire arities
//! exist in the field and both are valid: 6 fields (id, label, args,
//! execute-at, retries, retry-delay) and 7 (one extra trailing field).
//! Only the first two fields mean anything to the dispatcher:
//!
//! - field 0: unique task id (string)
//! - field 1: task/class label (string)
//!
//! Everything after them is opaque payload, preserved byte-for-byte through
//! re-encoding and forwarded to the worker untouched.
//!
//! ## Rules
//! - Any other arity is a typed [`CodecError::Arity`]; the message is
//!   rejected and logged, never guessed at.
//! - The arity is kept explicit on the decoded value so re-encoding
//!   produces exactly the variant that arrived.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::CodecError;

/// Wire arity of a [`TaskMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageArity {
    Six,
    Seven,
}

impl MessageArity {
    /// Total number of fields on the wire.
    pub fn fields(&self) -> usize {
        match self {
            MessageArity::Six => 6,
            MessageArity::Seven => 7,
        }
    }
}

/// Decoded queue message.
#[derive(Debug, Clone)]
pub struct TaskMessage {
    id: String,
    label: String,
    arity: MessageArity,
    /// Fields 2.. verbatim; forwarded, never interpreted.
    rest: Vec<Value>,
}

impl TaskMessage {
    /// Decodes a raw queue payload.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let fields: Vec<Value> = serde_json::from_slice(raw)?;
        let arity = match fields.len() {
            6 => MessageArity::Six,
            7 => MessageArity::Seven,
            n => return Err(CodecError::Arity(n)),
        };
        let mut fields = fields.into_iter();
        let id = take_string(fields.next(), 0)?;
        let label = take_string(fields.next(), 1)?;
        Ok(Self {
            id,
            label,
            arity,
            rest: fields.collect(),
        })
    }

    /// Builds the envelope for a freshly fired periodic task: new unique id,
    /// label from the final dotted path segment, empty positional/keyword
    /// argument placeholders.
    pub fn periodic(command: &str) -> Self {
        let label = command.rsplit('.').next().unwrap_or(command).to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            label,
            arity: MessageArity::Six,
            rest: vec![json!([[], {}]), Value::Null, json!(0), json!(0)],
        }
    }

    /// Serializes back to the wire form that was decoded (or built).
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = Vec::with_capacity(self.arity.fields());
        fields.push(Value::String(self.id.clone()));
        fields.push(Value::String(self.label.clone()));
        fields.extend(self.rest.iter().cloned());
        // A sequence of JSON values always serializes.
        serde_json::to_vec(&fields).unwrap_or_default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn arity(&self) -> MessageArity {
        self.arity
    }
}

fn take_string(value: Option<Value>, index: usize) -> Result<String, CodecError> {
    match value {
        Some(Value::String(s)) => Ok(s),
        _ => Err(CodecError::Field {
            index,
            expected: "string",
        }),
    }
}
