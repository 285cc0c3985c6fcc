//! Core type definitions for the particle compiler.

use std::{borrow::Cow, fmt};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Value type of an attribute or a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Float,
    Float2,
    Float3,
    Float4,
    Int,
    Uint,
    #[serde(rename = "texture2D")]
    Texture2D,
    #[serde(rename = "texture3D")]
    Texture3D,
    Transform,
    ColorGradient,
    Curve,
}

impl ValueType {
    /// HLSL type used when the value is declared in a cbuffer, a struct or a
    /// function signature.
    ///
    /// Signals are declared as their host-side selector: a gradient is the
    /// v-coordinate of its baked row, a curve is its packed sampling data.
    pub fn hlsl(self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Float2 => "float2",
            ValueType::Float3 => "float3",
            ValueType::Float4 => "float4",
            ValueType::Int => "int",
            ValueType::Uint => "uint",
            ValueType::Texture2D => "sampler2D",
            ValueType::Texture3D => "sampler3D",
            ValueType::Transform => "float4x4",
            ValueType::ColorGradient => "float",
            ValueType::Curve => "float4",
        }
    }

    /// Number of 32-bit components for attribute-capable types.
    pub fn components(self) -> Option<u32> {
        match self {
            ValueType::Float | ValueType::Int | ValueType::Uint => Some(1),
            ValueType::Float2 => Some(2),
            ValueType::Float3 => Some(3),
            ValueType::Float4 => Some(4),
            _ => None,
        }
    }

    pub fn is_sampler(self) -> bool {
        matches!(self, ValueType::Texture2D | ValueType::Texture3D)
    }

    pub fn is_signal(self) -> bool {
        matches!(self, ValueType::ColorGradient | ValueType::Curve)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Float2 => "float2",
            ValueType::Float3 => "float3",
            ValueType::Float4 => "float4",
            ValueType::Int => "int",
            ValueType::Uint => "uint",
            ValueType::Texture2D => "texture2D",
            ValueType::Texture3D => "texture3D",
            ValueType::Transform => "transform",
            ValueType::ColorGradient => "colorGradient",
            ValueType::Curve => "curve",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stage a context (and its blocks) runs in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextType {
    Init,
    Update,
    Output,
}

impl ContextType {
    /// Bit-field position of the stage inside an [`AttributeUsage`] mask.
    pub fn stage_index(self) -> u32 {
        match self {
            ContextType::Init => 0,
            ContextType::Update => 1,
            ContextType::Output => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContextType::Init => "init",
            ContextType::Update => "update",
            ContextType::Output => "output",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A per-particle field. Identity is `(name, ty)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: Cow<'static, str>,
    pub ty: ValueType,
}

impl Attribute {
    pub fn new(name: impl Into<Cow<'static, str>>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    /// Byte size inside a packed attribute struct. Non attribute-capable
    /// types are rejected before packing, so they count as zero here.
    pub fn size_in_bytes(&self) -> u32 {
        self.ty.components().unwrap_or(0) * 4
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.ty)
    }
}

/// Attributes the compiler itself knows about.
pub mod common {
    use std::borrow::Cow;

    use super::{Attribute, ValueType};

    const fn attr(name: &'static str, ty: ValueType) -> Attribute {
        Attribute {
            name: Cow::Borrowed(name),
            ty,
        }
    }

    pub const SEED: Attribute = attr("seed", ValueType::Uint);
    pub const POSITION: Attribute = attr("position", ValueType::Float3);
    pub const VELOCITY: Attribute = attr("velocity", ValueType::Float3);
    pub const COLOR: Attribute = attr("color", ValueType::Float3);
    pub const ALPHA: Attribute = attr("alpha", ValueType::Float);
    pub const PHASE: Attribute = attr("phase", ValueType::Float);
    pub const SIZE: Attribute = attr("size", ValueType::Float2);
    pub const LIFETIME: Attribute = attr("lifetime", ValueType::Float);
    pub const AGE: Attribute = attr("age", ValueType::Float);
    pub const ANGLE: Attribute = attr("angle", ValueType::Float);
    pub const ANGULAR_VELOCITY: Attribute = attr("angularVelocity", ValueType::Float);
    pub const TEX_INDEX: Attribute = attr("texIndex", ValueType::Float);
}

bitflags! {
    /// Read/write usage of an attribute, two bits per stage.
    ///
    /// Output only ever reads, so it owns a single bit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct AttributeUsage: u8 {
        const INIT_READ = 0x01;
        const INIT_WRITE = 0x02;
        const UPDATE_READ = 0x04;
        const UPDATE_WRITE = 0x08;
        const OUTPUT_READ = 0x10;

        const INIT = Self::INIT_READ.bits() | Self::INIT_WRITE.bits();
        const UPDATE = Self::UPDATE_READ.bits() | Self::UPDATE_WRITE.bits();
    }
}

impl AttributeUsage {
    /// Usage contributed by one block declaration in `stage`.
    pub fn declared(stage: ContextType, writable: bool) -> Self {
        let write = if writable && stage != ContextType::Output {
            0x2
        } else {
            0x0
        };
        Self::from_bits_truncate((0x1 | write) << (stage.stage_index() * 2))
    }

    /// Every bit belonging to `stage`.
    pub fn stage_bits(stage: ContextType) -> Self {
        Self::from_bits_truncate(0x3 << (stage.stage_index() * 2))
    }

    pub fn used(self, stage: ContextType) -> bool {
        self.intersects(Self::stage_bits(stage))
    }

    pub fn writable(self, stage: ContextType) -> bool {
        match stage {
            ContextType::Init => self.contains(Self::INIT_WRITE),
            ContextType::Update => self.contains(Self::UPDATE_WRITE),
            ContextType::Output => false,
        }
    }
}

bitflags! {
    /// Capabilities a block (or a stage generator) requires.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BlockFlags: u8 {
        const RAND = 0x1;
        const KILL = 0x2;
    }
}

/// Blending of the output program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlendMode {
    Masked,
    #[default]
    Additive,
    Alpha,
}

/// Identity of a host parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamId(pub String);

impl ParamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reduced parameter referenced by generated code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Param {
    pub id: ParamId,
    pub ty: ValueType,
}

impl Param {
    pub fn new(id: impl Into<String>, ty: ValueType) -> Self {
        Self {
            id: ParamId::new(id),
            ty,
        }
    }
}
