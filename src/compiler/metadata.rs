//! Everything the emitters need to know about a compiled system.

use std::collections::HashMap;

use super::{
    flatten::{ResolvedBlock, SlotArg},
    packer::AttributeBuffer,
    types::{Attribute, ContextType},
    uniforms::{ParamNames, ParamSet},
};

/// Snapshot of the signal baker taken after generation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalShaderInfo {
    pub has_color_texture: bool,
    pub has_float_texture: bool,
    pub sample_functions: Vec<String>,
}

/// Built once per compile and only read afterwards.
#[derive(Clone, Debug, Default)]
pub struct ShaderMetaData {
    pub init_blocks: Vec<ResolvedBlock>,
    pub update_blocks: Vec<ResolvedBlock>,
    pub output_blocks: Vec<ResolvedBlock>,

    pub has_kill: bool,
    pub has_rand: bool,
    pub phase_shift: bool,

    pub attribute_buffers: Vec<AttributeBuffer>,
    /// Attribute -> position in `attribute_buffers`.
    pub attrib_to_buffer: HashMap<Attribute, usize>,

    pub global_uniforms: ParamSet,
    pub init_uniforms: ParamSet,
    pub update_uniforms: ParamSet,
    pub output_uniforms: ParamSet,

    pub global_samplers: ParamSet,
    pub init_samplers: ParamSet,
    pub update_samplers: ParamSet,
    pub output_samplers: ParamSet,

    pub param_to_name: ParamNames,
    pub output_param_to_name: ParamNames,

    pub signals: SignalShaderInfo,
}

impl ShaderMetaData {
    pub fn buffer_of(&self, attr: &Attribute) -> Option<&AttributeBuffer> {
        self.attrib_to_buffer
            .get(attr)
            .and_then(|&i| self.attribute_buffers.get(i))
    }

    pub fn has_attribute(&self, attr: &Attribute) -> bool {
        self.attrib_to_buffer.contains_key(attr)
    }

    /// `attribN.name` for a packed attribute. Unpacked attributes fall back
    /// to their bare name.
    pub fn attrib_ref(&self, attr: &Attribute) -> String {
        match self.buffer_of(attr) {
            Some(buffer) => format!("attrib{}.{}", buffer.index, attr.name),
            None => attr.name.to_string(),
        }
    }

    /// Call-site text of a slot argument in `stage`.
    pub fn arg_expr(&self, arg: &SlotArg, stage: ContextType) -> String {
        match arg {
            SlotArg::Expr(src) => src.clone(),
            SlotArg::Param(p) => {
                let names = match stage {
                    ContextType::Output => &self.output_param_to_name,
                    _ => &self.param_to_name,
                };
                names
                    .get(&p.id)
                    .map(str::to_string)
                    .unwrap_or_else(|| p.id.to_string())
            }
        }
    }
}
