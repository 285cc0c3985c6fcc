//! Runtime descriptor handed to the host and the one-shot uniform push.

use serde::Serialize;

use crate::compiler::{
    error::CompileError,
    generators::OutputGenerator,
    metadata::ShaderMetaData,
    params::{ParamTable, ParamValue},
    signals::{BakedTexture, SignalBaker},
    types::{ContextType, ParamId},
    uniforms::ParamNames,
};

/// How the host allocates one attribute buffer and which shader variable it
/// binds to in each stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BufferDesc {
    /// Stride in bytes.
    pub size: u32,
    pub init_name: Option<String>,
    pub update_name: Option<String>,
    pub output_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    Point,
    /// Four vertices per particle through a shared quad index buffer.
    Quad,
}

impl OutputType {
    pub fn as_u32(self) -> u32 {
        match self {
            OutputType::Point => 0,
            OutputType::Quad => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Kernel {
    Init,
    Update,
}

impl Kernel {
    pub fn name(self) -> &'static str {
        match self {
            Kernel::Init => "CSVFXInit",
            Kernel::Update => "CSVFXUpdate",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PushTarget {
    /// Compute shader globals shared by both kernels.
    Compute,
    Kernel(Kernel),
    /// Output material.
    Material,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PushedValue {
    Float(f32),
    Floats(Vec<f32>),
    Vector([f32; 4]),
    Int(i32),
    Matrix([f32; 16]),
    /// Asset path of a texture.
    Texture(String),
    Baked(BakedTexture),
}

/// Receiver of the uniform push, owned by the rendering host.
pub trait UniformHost {
    fn push(&mut self, target: PushTarget, name: &str, value: PushedValue);
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PushRecord {
    pub target: PushTarget,
    pub name: String,
    pub value: PushedValue,
}

/// Host that only records what it was sent.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RecordingHost {
    pub records: Vec<PushRecord>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> impl Iterator<Item = &PushRecord> {
        self.records.iter().filter(move |r| r.name == name)
    }
}

impl UniformHost for RecordingHost {
    fn push(&mut self, target: PushTarget, name: &str, value: PushedValue) {
        self.records.push(PushRecord {
            target,
            name: name.to_string(),
            value,
        });
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SystemRuntimeData {
    pub buffers: Vec<BufferDesc>,
    pub uniforms: ParamNames,
    pub output_uniforms: ParamNames,
    pub has_kill: bool,
    pub output_type: OutputType,
}

fn stage_name(base: &str, writable: bool) -> String {
    if writable {
        base.to_string()
    } else {
        format!("{base}_RO")
    }
}

impl SystemRuntimeData {
    pub fn new(data: &ShaderMetaData, output: &OutputGenerator) -> Self {
        let buffers = data
            .attribute_buffers
            .iter()
            .map(|buffer| {
                let base = format!("attribBuffer{}", buffer.index);
                BufferDesc {
                    size: buffer.stride(),
                    init_name: buffer
                        .used(ContextType::Init)
                        .then(|| stage_name(&base, buffer.writable(ContextType::Init))),
                    update_name: buffer
                        .used(ContextType::Update)
                        .then(|| stage_name(&base, buffer.writable(ContextType::Update))),
                    output_name: buffer.used(ContextType::Output).then(|| base.clone()),
                }
            })
            .collect();

        Self {
            buffers,
            uniforms: data.param_to_name.clone(),
            output_uniforms: data.output_param_to_name.clone(),
            has_kill: data.has_kill,
            output_type: if output.uses_quad_index_buffer() {
                OutputType::Quad
            } else {
                OutputType::Point
            },
        }
    }

    /// Push every named uniform, then bind the baked signal textures to both
    /// kernels. Every value is resolved before the first push, so a failure
    /// leaves the host untouched.
    pub fn update_all_uniforms(
        &self,
        params: &ParamTable,
        baker: &dyn SignalBaker,
        host: &mut dyn UniformHost,
    ) -> Result<(), CompileError> {
        let mut pushes = Vec::new();
        for (id, name) in self.uniforms.iter() {
            resolve_uniform(id, name, false, params, baker, &mut pushes)?;
        }
        for (id, name) in self.output_uniforms.iter() {
            resolve_uniform(id, name, true, params, baker, &mut pushes)?;
        }

        let baked = [
            ("gradientTexture", baker.color_texture()),
            ("curveTexture", baker.float_texture()),
        ];
        for (name, texture) in baked {
            let Some(texture) = texture else { continue };
            for kernel in [Kernel::Init, Kernel::Update] {
                pushes.push(PushRecord {
                    target: PushTarget::Kernel(kernel),
                    name: name.to_string(),
                    value: PushedValue::Baked(texture.clone()),
                });
            }
        }

        for record in pushes {
            host.push(record.target, &record.name, record.value);
        }
        Ok(())
    }
}

fn resolve_uniform(
    id: &ParamId,
    name: &str,
    output: bool,
    params: &ParamTable,
    baker: &dyn SignalBaker,
    pushes: &mut Vec<PushRecord>,
) -> Result<(), CompileError> {
    let value = params
        .get(id)
        .ok_or_else(|| CompileError::MissingParamValue(id.clone()))?;
    let target = if output {
        PushTarget::Material
    } else {
        PushTarget::Compute
    };
    let mut push = |target: PushTarget, value: PushedValue| {
        pushes.push(PushRecord {
            target,
            name: name.to_string(),
            value,
        })
    };

    let pushed = match value {
        ParamValue::Float(v) => PushedValue::Float(*v),
        ParamValue::Float2([x, y]) if output => PushedValue::Vector([*x, *y, 0.0, 0.0]),
        ParamValue::Float2(v) => PushedValue::Floats(v.to_vec()),
        ParamValue::Float3([x, y, z]) if output => PushedValue::Vector([*x, *y, *z, 0.0]),
        ParamValue::Float3(v) => PushedValue::Floats(v.to_vec()),
        ParamValue::Float4(v) => PushedValue::Vector(*v),
        ParamValue::Int(v) => PushedValue::Int(*v),
        ParamValue::Uint(v) => PushedValue::Int(*v as i32),
        ParamValue::Transform(m) if output => PushedValue::Matrix(*m),
        ParamValue::Transform(m) => PushedValue::Floats(m.to_vec()),
        ParamValue::Texture2D(path) | ParamValue::Texture3D(path) => {
            if path.is_empty() {
                return Ok(());
            }
            if output {
                push(target, PushedValue::Texture(path.clone()));
            } else {
                let global = name.contains("global");
                if global || name.contains("init") {
                    push(
                        PushTarget::Kernel(Kernel::Init),
                        PushedValue::Texture(path.clone()),
                    );
                }
                if global || name.contains("update") {
                    push(
                        PushTarget::Kernel(Kernel::Update),
                        PushedValue::Texture(path.clone()),
                    );
                }
            }
            return Ok(());
        }
        ParamValue::ColorGradient(_) | ParamValue::Curve(_) if output => {
            return Err(CompileError::UnsupportedOutputUniform {
                param: id.clone(),
                ty: value.value_type(),
            });
        }
        ParamValue::ColorGradient(_) => PushedValue::Float(
            baker
                .gradient_uniform(id)
                .ok_or_else(|| CompileError::MissingParamValue(id.clone()))?,
        ),
        ParamValue::Curve(_) => PushedValue::Vector(
            baker
                .curve_uniform(id)
                .ok_or_else(|| CompileError::MissingParamValue(id.clone()))?,
        ),
    };
    push(target, pushed);
    Ok(())
}
