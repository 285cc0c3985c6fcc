//! Compile failures.

use thiserror::Error;

use super::types::{ContextType, ParamId, ValueType};

/// Reasons a system fails to compile. Any of these leaves the caller without
/// a result; the previous artifact (if any) stays authoritative.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("system is invalid: missing {0} context")]
    MissingContext(ContextType),

    #[error("system is invalid: empty")]
    EmptySystem,

    #[error("unknown block type: {block_type} (block {block})")]
    UnknownBlockType { block: String, block_type: String },

    #[error("block {block}: attribute {attribute} has non attribute type {ty}")]
    InvalidAttributeType {
        block: String,
        attribute: String,
        ty: ValueType,
    },

    #[error("block {block}: {name:?} is not a valid HLSL identifier")]
    InvalidIdentifier { block: String, name: String },

    #[error("block {block}: property {property} is not bound and has no default")]
    MissingSlot { block: String, property: String },

    #[error("block {block}: slot {property} references unknown param {param}")]
    UnknownParam {
        block: String,
        property: String,
        param: ParamId,
    },

    #[error("block {block}: slot {property} expects {expected}, param {param} is {found}")]
    SlotTypeMismatch {
        block: String,
        property: String,
        param: ParamId,
        expected: ValueType,
        found: ValueType,
    },

    #[error("block {block}: {capability} blocks are not supported in {stage} contexts")]
    MisplacedBlock {
        block: String,
        capability: &'static str,
        stage: ContextType,
    },

    #[error("invalid {stage} generator settings: {reason}")]
    InvalidGenerator { stage: ContextType, reason: String },

    #[error("attribute {name} is declared as both {first} and {second}")]
    ConflictingAttributeType {
        name: String,
        first: ValueType,
        second: ValueType,
    },

    #[error("phase shift requires a {0} attribute")]
    PhaseShiftPrerequisite(&'static str),

    #[error("{stage} generator cannot satisfy its attributes: {reason}")]
    GeneratorRejected { stage: ContextType, reason: String },

    #[error("too many buffers used ({used}, max is {max} + 2 reserved)")]
    TooManyBuffers { used: usize, max: usize },

    #[error("cannot push {ty} param {param} as an output uniform")]
    UnsupportedOutputUniform { param: ParamId, ty: ValueType },

    #[error("param {0} is referenced but has no value")]
    MissingParamValue(ParamId),
}

impl CompileError {
    /// Capacity failures are the only ones fixable by changing the budget.
    pub fn is_capacity(&self) -> bool {
        matches!(self, CompileError::TooManyBuffers { .. })
    }
}
