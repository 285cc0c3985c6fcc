//! End-to-end compile of one particle system.

use std::collections::HashMap;

use crate::dsl::SystemDSL;
use crate::runtime::SystemRuntimeData;
use crate::schema::BlockLibrary;

use super::{
    attributes::{apply_structural_rules, collect_attributes},
    compute_shader::write_compute_shader,
    diagnostics::{Diagnostic, Diagnostics},
    error::CompileError,
    flatten::{FlattenedSystem, flatten_system},
    generators::StageGenerator,
    metadata::{ShaderMetaData, SignalShaderInfo},
    output_shader::write_output_shader,
    packer::{DEFAULT_MAX_ATTRIBUTE_BUFFERS, pack},
    params::ParamTable,
    signals::SignalBaker,
    types::{BlockFlags, ContextType},
    uniforms::partition_uniforms,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    /// Offset particles along their velocity by a random sub-frame phase.
    /// Cleared by the compiler when the system cannot support it.
    pub phase_shift: bool,
    pub max_buffers: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            phase_shift: false,
            max_buffers: DEFAULT_MAX_ATTRIBUTE_BUFFERS,
        }
    }
}

impl CompileOptions {
    pub fn for_system(system: &SystemDSL) -> Self {
        Self {
            phase_shift: system.phase_shift,
            ..Self::default()
        }
    }
}

/// Collaborators a compile reports to and reads from.
pub struct CompileEnv<'a> {
    pub library: &'a BlockLibrary,
    pub baker: &'a mut dyn SignalBaker,
    pub diagnostics: &'a mut dyn Diagnostics,
}

#[derive(Clone, Debug)]
pub struct CompiledSystem {
    pub system_id: String,
    pub compute_source: String,
    pub output_source: String,
    pub metadata: ShaderMetaData,
    pub runtime: SystemRuntimeData,
}

impl CompiledSystem {
    /// `VFX_<id>`, the base name of both generated shaders.
    pub fn shader_name(&self) -> String {
        format!("VFX_{}", self.system_id)
    }
}

/// Compile `system` into shader sources and the runtime descriptor.
///
/// Nothing is produced on failure; the failure is also reported to the
/// diagnostics sink.
pub fn compile_system(
    system: &SystemDSL,
    params: &ParamTable,
    options: &mut CompileOptions,
    env: &mut CompileEnv<'_>,
) -> Result<CompiledSystem, CompileError> {
    let result = compile_inner(system, params, options, env);
    if let Err(e) = &result {
        let diagnostic = match e {
            CompileError::TooManyBuffers { used, max } => Diagnostic::TooManyBuffers {
                used: *used,
                max: *max,
            },
            other => Diagnostic::Rejected(other.to_string()),
        };
        env.diagnostics.report(diagnostic);
    }
    result
}

fn compile_inner(
    system: &SystemDSL,
    params: &ParamTable,
    options: &mut CompileOptions,
    env: &mut CompileEnv<'_>,
) -> Result<CompiledSystem, CompileError> {
    let flat = flatten_system(system, env.library, params)?;
    let FlattenedSystem {
        init_blocks,
        update_blocks,
        output_blocks,
        init,
        update,
        output,
        ..
    } = &flat;
    let mut flags = flat.flags;

    let mut table = collect_attributes(init_blocks, ContextType::Init)
        .merge(collect_attributes(update_blocks, ContextType::Update))
        .merge(collect_attributes(output_blocks, ContextType::Output));

    let mut init_flags = BlockFlags::empty();
    StageGenerator::Init(init).update_attributes(&mut table, &mut init_flags)?;
    flags.init_rand |= init_flags.contains(BlockFlags::RAND);

    let mut update_flags = BlockFlags::empty();
    StageGenerator::Update(update).update_attributes(&mut table, &mut update_flags)?;
    flags.update_rand |= update_flags.contains(BlockFlags::RAND);
    flags.update_kill |= update_flags.contains(BlockFlags::KILL);

    StageGenerator::Output(output).update_attributes(&mut table, &mut BlockFlags::empty())?;

    apply_structural_rules(
        &mut table,
        &mut flags,
        &mut options.phase_shift,
        env.diagnostics,
    )?;
    table.check_distinct_names()?;

    let buffers = pack(&table, options.max_buffers)?;
    let attrib_to_buffer: HashMap<_, _> = buffers
        .iter()
        .enumerate()
        .flat_map(|(i, b)| b.attributes.iter().map(move |a| (a.clone(), i)))
        .collect();

    env.diagnostics.report(Diagnostic::AttributeCount(table.len()));
    env.diagnostics.report(Diagnostic::BufferCount(buffers.len()));
    for buffer in &buffers {
        env.diagnostics.report(Diagnostic::BufferLayout {
            index: buffer.index,
            attributes: buffer.attributes.iter().map(|a| a.name.to_string()).collect(),
            size_in_bytes: buffer.size_in_bytes(),
        });
    }

    let uniforms = partition_uniforms(&flat, params, env.baker)?;

    for (stage, count) in [
        (ContextType::Init, init_blocks.len()),
        (ContextType::Update, update_blocks.len()),
        (ContextType::Output, output_blocks.len()),
    ] {
        env.diagnostics.report(Diagnostic::BlockCount { stage, count });
    }
    env.diagnostics.report(Diagnostic::UniformCounts {
        global: uniforms.global_uniforms.len(),
        init: uniforms.init_uniforms.len(),
        update: uniforms.update_uniforms.len(),
        output: uniforms.output_uniforms.len(),
    });

    let data = ShaderMetaData {
        init_blocks: init_blocks.clone(),
        update_blocks: update_blocks.clone(),
        output_blocks: output_blocks.clone(),
        has_kill: flags.update_kill,
        has_rand: flags.has_rand(),
        phase_shift: options.phase_shift,
        attribute_buffers: buffers,
        attrib_to_buffer,
        global_uniforms: uniforms.global_uniforms,
        init_uniforms: uniforms.init_uniforms,
        update_uniforms: uniforms.update_uniforms,
        output_uniforms: uniforms.output_uniforms,
        global_samplers: uniforms.global_samplers,
        init_samplers: uniforms.init_samplers,
        update_samplers: uniforms.update_samplers,
        output_samplers: uniforms.output_samplers,
        param_to_name: uniforms.param_to_name,
        output_param_to_name: uniforms.output_param_to_name,
        signals: SignalShaderInfo {
            has_color_texture: env.baker.has_color_texture(),
            has_float_texture: env.baker.has_float_texture(),
            sample_functions: env.baker.shader_functions(),
        },
    };

    let compute_source = write_compute_shader(&data, Some(init), Some(update));
    let output_source = write_output_shader(&system.id, system.blend_mode, &data, output);
    let runtime = SystemRuntimeData::new(&data, output);

    Ok(CompiledSystem {
        system_id: system.id.clone(),
        compute_source,
        output_source,
        metadata: data,
        runtime,
    })
}
