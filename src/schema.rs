use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::compiler::{
    error::CompileError,
    types::{Attribute, BlockFlags, ValueType},
    utils::{is_hlsl_ident, sanitize_hlsl_ident},
};
use crate::dsl::BlockDSL;

const DEFAULT_BLOCK_LIBRARY_JSON: &str = include_str!("../assets/block-library.json");

/// Static description of a block: what it reads/writes, which properties it
/// exposes and the HLSL body of its function.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlockDesc {
    #[serde(default, rename = "functionName")]
    pub function_name: Option<String>,
    #[serde(default)]
    pub flags: Vec<BlockFlag>,
    #[serde(default)]
    pub attributes: Vec<AttributeDecl>,
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
    /// Function body, one HLSL line per entry.
    #[serde(default)]
    pub source: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockFlag {
    Rand,
    Kill,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AttributeDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    #[serde(default)]
    pub writable: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ValueType,
    /// Inline HLSL used when the property has no slot binding.
    #[serde(default)]
    pub default: Option<String>,
}

impl AttributeDecl {
    pub fn attribute(&self) -> Attribute {
        Attribute::new(self.name.clone(), self.ty)
    }
}

impl BlockDesc {
    pub fn flags(&self) -> BlockFlags {
        self.flags.iter().fold(BlockFlags::empty(), |acc, f| {
            acc | match f {
                BlockFlag::Rand => BlockFlags::RAND,
                BlockFlag::Kill => BlockFlags::KILL,
            }
        })
    }

    /// HLSL function name; falls back to the library type name.
    pub fn function_name(&self, block_type: &str) -> String {
        sanitize_hlsl_ident(self.function_name.as_deref().unwrap_or(block_type))
    }

    /// Attributes must be scalar or vector types so they can be packed, and
    /// every attribute and property name is emitted verbatim as HLSL.
    pub fn validate(&self, block_type: &str) -> Result<(), CompileError> {
        let names = self
            .attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.properties.iter().map(|p| p.name.as_str()));
        for name in names {
            if !is_hlsl_ident(name) {
                return Err(CompileError::InvalidIdentifier {
                    block: block_type.to_string(),
                    name: name.to_string(),
                });
            }
        }
        match self.attributes.iter().find(|a| a.ty.components().is_none()) {
            Some(a) => Err(CompileError::InvalidAttributeType {
                block: block_type.to_string(),
                attribute: a.name.clone(),
                ty: a.ty,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawBlockLibrary {
    #[allow(dead_code)]
    pub version: String,
    #[serde(default)]
    pub blocks: Vec<RawBlockEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawBlockEntry {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(flatten)]
    pub desc: BlockDesc,
}

/// Block descriptors keyed by block type.
#[derive(Debug, Clone, Default)]
pub struct BlockLibrary {
    pub blocks: HashMap<String, BlockDesc>,
}

impl BlockLibrary {
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawBlockLibrary =
            serde_json::from_str(text).map_err(|e| anyhow!("failed to parse block library: {e}"))?;
        let mut blocks = HashMap::with_capacity(raw.blocks.len());
        for entry in raw.blocks {
            entry.desc.validate(&entry.block_type)?;
            if blocks.insert(entry.block_type.clone(), entry.desc).is_some() {
                bail!("duplicate block type in library: {}", entry.block_type);
            }
        }
        Ok(Self { blocks })
    }

    /// Descriptor for a block instance: the inline one wins over the library.
    pub fn resolve<'a>(&'a self, block: &'a BlockDSL) -> Option<&'a BlockDesc> {
        block
            .desc
            .as_ref()
            .or_else(|| self.blocks.get(&block.block_type))
    }
}

pub fn load_default_library() -> Result<BlockLibrary> {
    BlockLibrary::from_json(DEFAULT_BLOCK_LIBRARY_JSON)
}
