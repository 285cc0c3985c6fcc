use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::compiler::types::{BlendMode, ContextType, ValueType};
use crate::schema::BlockDesc;

/// Serialized description of one particle system.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemDSL {
    pub version: String,
    pub metadata: Metadata,
    /// Stable system id, used to name generated shaders (`VFX_<id>`).
    pub id: String,
    #[serde(default, rename = "blendMode")]
    pub blend_mode: BlendMode,
    #[serde(default, rename = "phaseShift")]
    pub phase_shift: bool,
    #[serde(default)]
    pub params: Vec<ParamDSL>,
    pub contexts: Vec<ContextDSL>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Metadata {
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ParamDSL {
    pub id: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContextDSL {
    pub id: String,
    #[serde(rename = "type")]
    pub context_type: ContextType,
    /// Stage generator settings (`lifetime`, `integrate`, `kind`, ...).
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub blocks: Vec<BlockDSL>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BlockDSL {
    pub id: String,
    /// Name of the block library entry; ignored when `desc` is inline.
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub slots: HashMap<String, SlotBinding>,
    #[serde(default)]
    pub desc: Option<BlockDesc>,
}

/// What a block property is driven by.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum SlotBinding {
    /// A declared host parameter (becomes a uniform).
    Param { param: String },
    /// Inline HLSL, emitted verbatim at the call site.
    Expr { expr: String },
}

impl SlotBinding {
    pub fn param(id: impl Into<String>) -> Self {
        SlotBinding::Param { param: id.into() }
    }

    pub fn expr(src: impl Into<String>) -> Self {
        SlotBinding::Expr { expr: src.into() }
    }
}

pub fn load_system_from_path(path: impl AsRef<std::path::Path>) -> Result<SystemDSL> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read system json at {}", path.display()))?;
    load_system_from_str(&text)
}

pub fn load_system_from_str(text: &str) -> Result<SystemDSL> {
    serde_json::from_str(text).context("failed to parse system json")
}

pub fn parse_bool(params: &HashMap<String, serde_json::Value>, key: &str) -> Option<bool> {
    params.get(key).and_then(|v| v.as_bool())
}

pub fn parse_f32(params: &HashMap<String, serde_json::Value>, key: &str) -> Option<f32> {
    match params.get(key) {
        Some(v) => v
            .as_f64()
            .map(|x| x as f32)
            .or_else(|| v.as_u64().map(|x| x as f32))
            .or_else(|| v.as_i64().map(|x| x as f32)),
        None => None,
    }
}

pub fn parse_str<'a>(params: &'a HashMap<String, serde_json::Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Read a slot binding from generator params.
///
/// Accepts `{"param": id}`, `{"expr": src}` or a bare number (shorthand for
/// an inline float literal).
pub fn parse_slot(
    params: &HashMap<String, serde_json::Value>,
    key: &str,
) -> Result<Option<SlotBinding>> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    if let Some(x) = parse_f32(params, key) {
        return Ok(Some(SlotBinding::expr(crate::compiler::utils::fmt_f32(x))));
    }
    serde_json::from_value(v.clone())
        .map(Some)
        .map_err(|e| anyhow!("invalid slot binding for {key}: {e}"))
}
