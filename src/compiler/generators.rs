//! Stage generators: per-context code wrapped around the block calls.

use std::collections::HashMap;

use serde_json::Value;

use crate::dsl::{parse_bool, parse_f32, parse_slot, parse_str};

use super::{
    attributes::AttributeTable,
    error::CompileError,
    flatten::{SlotArg, resolve_slot},
    metadata::ShaderMetaData,
    params::ParamTable,
    source_builder::ShaderSourceBuilder,
    types::{Attribute, AttributeUsage, BlockFlags, ContextType, Param, ValueType, common},
    uniforms::ParamSet,
    utils::fmt_f32,
};

pub const DEFAULT_BILLBOARD_SIZE: f32 = 0.1;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitGenerator {
    /// Initial lifetime; also resets `age`.
    pub lifetime: Option<SlotArg>,
}

impl InitGenerator {
    pub fn from_params(
        settings: &HashMap<String, Value>,
        params: &ParamTable,
    ) -> Result<Self, CompileError> {
        let binding = parse_slot(settings, "lifetime").map_err(|e| CompileError::InvalidGenerator {
            stage: ContextType::Init,
            reason: e.to_string(),
        })?;
        let lifetime = match binding {
            Some(b) => Some(resolve_slot(&b, ValueType::Float, params, "init", "lifetime")?),
            None => None,
        };
        Ok(Self { lifetime })
    }

    fn update_attributes(&self, table: &mut AttributeTable) {
        if self.lifetime.is_some() {
            let written = AttributeUsage::declared(ContextType::Init, true);
            table.or_usage(common::LIFETIME, written);
            table.or_usage(common::AGE, written);
        }
    }

    fn update_uniforms(&self, uniforms: &mut ParamSet) {
        if let Some(SlotArg::Param(p)) = &self.lifetime {
            uniforms.insert(p.clone());
        }
    }

    fn write_post_block(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        if let Some(lifetime) = &self.lifetime {
            b.write_line(format!(
                "{} = {};",
                data.attrib_ref(&common::LIFETIME),
                data.arg_expr(lifetime, ContextType::Init)
            ));
            b.write_line(format!("{} = 0.0;", data.attrib_ref(&common::AGE)));
            b.blank_line();
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateGenerator {
    /// Euler-integrate `position` from `velocity`.
    pub integrate: bool,
    /// Advance `age` by the frame delta.
    pub age: bool,
    /// Kill particles whose `age` reached `lifetime`.
    pub reap: bool,
}

impl UpdateGenerator {
    pub fn from_params(settings: &HashMap<String, Value>) -> Result<Self, CompileError> {
        Ok(Self {
            integrate: parse_bool(settings, "integrate").unwrap_or(false),
            age: parse_bool(settings, "age").unwrap_or(false),
            reap: parse_bool(settings, "reap").unwrap_or(false),
        })
    }

    fn require(
        table: &AttributeTable,
        what: &str,
        attrs: &[&Attribute],
    ) -> Result<(), CompileError> {
        match attrs.iter().find(|a| !table.contains(a)) {
            Some(missing) => Err(CompileError::GeneratorRejected {
                stage: ContextType::Update,
                reason: format!("{what} requires a {} attribute", missing.name),
            }),
            None => Ok(()),
        }
    }

    fn update_attributes(
        &self,
        table: &mut AttributeTable,
        flags: &mut BlockFlags,
    ) -> Result<(), CompileError> {
        if self.integrate {
            Self::require(table, "integration", &[&common::POSITION, &common::VELOCITY])?;
            table.or_usage(
                common::POSITION,
                AttributeUsage::declared(ContextType::Update, true),
            );
            table.or_usage(
                common::VELOCITY,
                AttributeUsage::declared(ContextType::Update, false),
            );
        }
        if self.age {
            Self::require(table, "aging", &[&common::AGE])?;
            table.or_usage(common::AGE, AttributeUsage::declared(ContextType::Update, true));
        }
        if self.reap {
            Self::require(table, "reaping", &[&common::AGE, &common::LIFETIME])?;
            let read = AttributeUsage::declared(ContextType::Update, false);
            table.or_usage(common::AGE, read);
            table.or_usage(common::LIFETIME, read);
            *flags |= BlockFlags::KILL;
        }
        Ok(())
    }

    fn write_post_block(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        if self.integrate {
            b.write_line(format!(
                "{} += {} * deltaTime;",
                data.attrib_ref(&common::POSITION),
                data.attrib_ref(&common::VELOCITY)
            ));
        }
        if self.age {
            b.write_line(format!("{} += deltaTime;", data.attrib_ref(&common::AGE)));
        }
        if self.reap {
            b.write_line(format!(
                "if ({} >= {}) KILL;",
                data.attrib_ref(&common::AGE),
                data.attrib_ref(&common::LIFETIME)
            ));
        }
        if self.integrate || self.age || self.reap {
            b.blank_line();
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputKind {
    #[default]
    Point,
    Billboard,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputGenerator {
    pub kind: OutputKind,
    /// Size used when particles carry no `size` attribute.
    pub size: f32,
    pub texture: Option<Param>,
}

impl Default for OutputGenerator {
    fn default() -> Self {
        Self {
            kind: OutputKind::Point,
            size: DEFAULT_BILLBOARD_SIZE,
            texture: None,
        }
    }
}

impl OutputGenerator {
    pub fn from_params(
        settings: &HashMap<String, Value>,
        params: &ParamTable,
    ) -> Result<Self, CompileError> {
        let invalid = |reason: String| CompileError::InvalidGenerator {
            stage: ContextType::Output,
            reason,
        };
        let kind = match parse_str(settings, "kind").unwrap_or("point") {
            "point" => OutputKind::Point,
            "billboard" => OutputKind::Billboard,
            other => return Err(invalid(format!("unknown output kind: {other}"))),
        };
        let texture = match parse_slot(settings, "texture").map_err(|e| invalid(e.to_string()))? {
            Some(binding) => match resolve_slot(&binding, ValueType::Texture2D, params, "output", "texture")? {
                SlotArg::Param(p) => Some(p),
                SlotArg::Expr(_) => {
                    return Err(invalid("texture must be bound to a texture2D param".to_string()));
                }
            },
            None => None,
        };
        Ok(Self {
            kind,
            size: parse_f32(settings, "size").unwrap_or(DEFAULT_BILLBOARD_SIZE),
            texture,
        })
    }

    fn update_attributes(&self, table: &mut AttributeTable) -> Result<(), CompileError> {
        if !table.contains(&common::POSITION) {
            return Err(CompileError::GeneratorRejected {
                stage: ContextType::Output,
                reason: "rendering requires a position attribute".to_string(),
            });
        }
        let mut read = vec![common::POSITION, common::COLOR, common::ALPHA];
        if self.kind == OutputKind::Billboard {
            read.extend([common::SIZE, common::ANGLE]);
        }
        for attr in read {
            if table.contains(&attr) {
                table.or_usage(attr, AttributeUsage::OUTPUT_READ);
            }
        }
        Ok(())
    }

    fn update_uniforms(&self, uniforms: &mut ParamSet) {
        if let Some(texture) = &self.texture {
            uniforms.insert(texture.clone());
        }
    }

    fn has_angle(&self, data: &ShaderMetaData) -> bool {
        self.kind == OutputKind::Billboard && data.has_attribute(&common::ANGLE)
    }

    fn write_functions(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        if self.has_angle(data) {
            b.write_line("float2 rotateCorner(float2 corner,float angle)");
            b.enter_scope();
            b.write_line("float s, c;");
            b.write_line("sincos(angle, s, c);");
            b.write_line("return float2(c * corner.x - s * corner.y, s * corner.x + c * corner.y);");
            b.exit_scope();
            b.blank_line();
        }
    }

    pub fn write_index(&self, b: &mut ShaderSourceBuilder) {
        match self.kind {
            OutputKind::Point => b.write_line("uint index = id;"),
            OutputKind::Billboard => b.write_line("uint index = id >> 2;"),
        };
    }

    pub fn write_additional_vertex_output(&self, b: &mut ShaderSourceBuilder) {
        if self.kind == OutputKind::Billboard {
            b.write_line("float2 offsets : TEXCOORD0;");
        }
    }

    fn write_pre_block(&self, b: &mut ShaderSourceBuilder) {
        if self.kind == OutputKind::Billboard {
            b.write_line("o.offsets.x = float(id & 1);");
            b.write_line("o.offsets.y = float((id & 2) >> 1);");
            b.blank_line();
        }
    }

    fn write_post_block(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        let position = data.attrib_ref(&common::POSITION);
        match self.kind {
            OutputKind::Point => {
                b.write_line(format!(
                    "o.pos = mul(UNITY_MATRIX_VP, float4({position}, 1.0));"
                ));
            }
            OutputKind::Billboard => {
                let size = if data.has_attribute(&common::SIZE) {
                    data.attrib_ref(&common::SIZE)
                } else {
                    let s = fmt_f32(self.size);
                    format!("float2({s},{s})")
                };
                b.write_line(format!("float2 corner = (o.offsets - 0.5) * {size};"));
                if self.has_angle(data) {
                    b.write_line(format!(
                        "corner = rotateCorner(corner, {});",
                        data.attrib_ref(&common::ANGLE)
                    ));
                }
                b.write_line(format!(
                    "float3 worldPos = {position} + UNITY_MATRIX_V[0].xyz * corner.x + UNITY_MATRIX_V[1].xyz * corner.y;"
                ));
                b.write_line("o.pos = mul(UNITY_MATRIX_VP, float4(worldPos, 1.0));");
            }
        }
        b.blank_line();
    }

    pub fn write_pixel_shader(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        if self.kind != OutputKind::Billboard {
            return;
        }
        match &self.texture {
            Some(texture) => {
                let name = data
                    .output_param_to_name
                    .get(&texture.id)
                    .map(str::to_string)
                    .unwrap_or_else(|| texture.id.to_string());
                b.write_line(format!("color *= tex2D({name}, i.offsets);"));
            }
            None => {
                b.write_line("float2 d = i.offsets * 2.0 - 1.0;");
                b.write_line("clip(1.0 - dot(d, d));");
            }
        }
    }

    /// Billboards draw two triangles per particle through a shared quad
    /// index buffer.
    pub fn uses_quad_index_buffer(&self) -> bool {
        self.kind == OutputKind::Billboard
    }
}

/// A stage generator, dispatched by stage.
#[derive(Clone, Copy, Debug)]
pub enum StageGenerator<'a> {
    Init(&'a InitGenerator),
    Update(&'a UpdateGenerator),
    Output(&'a OutputGenerator),
}

impl StageGenerator<'_> {
    /// Add the generator's attribute requirements; `flags` receives the
    /// capabilities it needs.
    pub fn update_attributes(
        &self,
        table: &mut AttributeTable,
        flags: &mut BlockFlags,
    ) -> Result<(), CompileError> {
        match self {
            StageGenerator::Init(g) => {
                g.update_attributes(table);
                Ok(())
            }
            StageGenerator::Update(g) => g.update_attributes(table, flags),
            StageGenerator::Output(g) => g.update_attributes(table),
        }
    }

    pub fn update_uniforms(&self, uniforms: &mut ParamSet) {
        match self {
            StageGenerator::Init(g) => g.update_uniforms(uniforms),
            StageGenerator::Update(_) => {}
            StageGenerator::Output(g) => g.update_uniforms(uniforms),
        }
    }

    pub fn write_functions(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        if let StageGenerator::Output(g) = self {
            g.write_functions(b, data);
        }
    }

    pub fn write_pre_block(&self, b: &mut ShaderSourceBuilder, _data: &ShaderMetaData) {
        if let StageGenerator::Output(g) = self {
            g.write_pre_block(b);
        }
    }

    pub fn write_post_block(&self, b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
        match self {
            StageGenerator::Init(g) => g.write_post_block(b, data),
            StageGenerator::Update(g) => g.write_post_block(b, data),
            StageGenerator::Output(g) => g.write_post_block(b, data),
        }
    }
}
