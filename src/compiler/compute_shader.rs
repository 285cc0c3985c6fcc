//! Simulation compute shader (`CSVFXInit` / `CSVFXUpdate`).

use std::collections::HashSet;

use super::{
    generators::{InitGenerator, StageGenerator, UpdateGenerator},
    hlsl::{
        write_add_phase_shift, write_attribute_buffer, write_cbuffer, write_function,
        write_function_call, write_kernel_header, write_remove_phase_shift, write_samplers,
    },
    metadata::ShaderMetaData,
    source_builder::ShaderSourceBuilder,
    types::{ContextType, common},
};

pub const NB_THREADS_PER_GROUP: u32 = 256;

pub fn write_compute_shader(
    data: &ShaderMetaData,
    init: Option<&InitGenerator>,
    update: Option<&UpdateGenerator>,
) -> String {
    let mut b = ShaderSourceBuilder::new();

    if init.is_some() {
        b.write_line("#pragma kernel CSVFXInit");
    }
    if update.is_some() {
        b.write_line("#pragma kernel CSVFXUpdate");
    }
    b.blank_line();

    b.write_line("#include \"UnityCG.cginc\"");
    b.write_line("#include \"HLSLSupport.cginc\"");
    b.blank_line();

    b.write_line(format!("#define NB_THREADS_PER_GROUP {NB_THREADS_PER_GROUP}"));
    b.blank_line();

    b.write_line("#define RAND rand(seed)");
    b.write_line("#define RAND2 float2(RAND,RAND)");
    b.write_line("#define RAND3 float3(RAND,RAND,RAND)");
    b.write_line("#define RAND4 float4(RAND,RAND,RAND,RAND)");
    b.write_line("#define KILL {kill = true;}");
    b.write_line("#define SAMPLE sampleSignal");
    b.blank_line();

    b.write_line("CBUFFER_START(GlobalInfo)");
    b.write_line("\tfloat deltaTime;");
    b.write_line("\tfloat totalTime;");
    b.write_line("\tuint nbMax;");
    if data.has_rand {
        b.write_line("\tuint systemSeed;");
    }
    b.write_line("CBUFFER_END");
    b.blank_line();

    if init.is_some() {
        b.write_line("CBUFFER_START(SpawnInfo)");
        b.write_line("\tuint nbSpawned;");
        b.write_line("\tuint spawnIndex;");
        b.write_line("CBUFFER_END");
        b.blank_line();
    }

    write_cbuffer(&mut b, "GlobalUniforms", &data.global_uniforms, &data.param_to_name);
    write_cbuffer(&mut b, "initUniforms", &data.init_uniforms, &data.param_to_name);
    write_cbuffer(&mut b, "updateUniforms", &data.update_uniforms, &data.param_to_name);

    write_samplers(&mut b, &data.global_samplers, &data.param_to_name);
    write_samplers(&mut b, &data.init_samplers, &data.param_to_name);
    write_samplers(&mut b, &data.update_samplers, &data.param_to_name);

    if data.signals.has_color_texture {
        b.write_line("sampler2D gradientTexture;");
        b.blank_line();
    }
    if data.signals.has_float_texture {
        b.write_line("sampler2D curveTexture;");
        b.blank_line();
    }

    for buffer in &data.attribute_buffers {
        write_attribute_buffer(&mut b, buffer);
    }

    for buffer in &data.attribute_buffers {
        let i = buffer.index;
        b.write_line(format!("RWStructuredBuffer<Attribute{i}> attribBuffer{i};"));
        if buffer.used(ContextType::Update) && !buffer.writable(ContextType::Update) {
            b.write_line(format!("StructuredBuffer<Attribute{i}> attribBuffer{i}_RO;"));
        }
    }
    if !data.attribute_buffers.is_empty() {
        b.blank_line();
    }

    if data.has_kill {
        b.write_line("RWStructuredBuffer<int> flags;");
        b.write_line("ConsumeStructuredBuffer<uint> deadListIn;");
        b.write_line("AppendStructuredBuffer<uint> deadListOut;");
        b.write_line("Buffer<uint> deadListCount;");
        b.blank_line();
    }

    if data.has_rand {
        b.write_line("float rand(inout uint seed)");
        b.enter_scope();
        b.write_line("seed = 1664525 * seed + 1013904223;");
        b.write_line("return float(seed) / 4294967296.0;");
        b.exit_scope();
        b.blank_line();
    }

    if !data.signals.sample_functions.is_empty() {
        for line in &data.signals.sample_functions {
            b.write_line(line);
        }
        b.blank_line();
    }

    let mut function_names = HashSet::new();
    for block in data.init_blocks.iter().chain(&data.update_blocks) {
        write_function(&mut b, block, &mut function_names);
    }

    if let Some(g) = init {
        StageGenerator::Init(g).write_functions(&mut b, data);
    }
    if let Some(g) = update {
        StageGenerator::Update(g).write_functions(&mut b, data);
    }

    if let Some(g) = init {
        write_init_kernel(&mut b, data, StageGenerator::Init(g));
    }
    if let Some(g) = update {
        write_update_kernel(&mut b, data, StageGenerator::Update(g));
    }

    b.into_string()
}

fn write_init_kernel(
    b: &mut ShaderSourceBuilder,
    data: &ShaderMetaData,
    generator: StageGenerator<'_>,
) {
    write_kernel_header(b, "CSVFXInit");
    if data.has_kill {
        b.write_line("if (id.x < min(nbSpawned,deadListCount[0]))");
    } else {
        b.write_line("if (id.x < nbSpawned)");
    }
    b.enter_scope();
    if data.has_kill {
        b.write_line("uint index = deadListIn.Consume();");
    } else {
        b.write_line("uint index = id.x + spawnIndex;");
    }
    b.blank_line();

    for buffer in &data.attribute_buffers {
        let i = buffer.index;
        b.write_line(format!("Attribute{i} attrib{i} = (Attribute{i})0;"));
    }
    b.blank_line();

    if data.has_rand {
        b.write_line("uint seed = (id.x + spawnIndex) ^ systemSeed;");
        b.write_line("seed = (seed ^ 61) ^ (seed >> 16);");
        b.write_line("seed *= 9;");
        b.write_line("seed = seed ^ (seed >> 4);");
        b.write_line("seed *= 0x27d4eb2d;");
        b.write_line("seed = seed ^ (seed >> 15);");
        b.write_line(format!("{} = seed;", data.attrib_ref(&common::SEED)));
        b.blank_line();
    }

    if data.phase_shift {
        b.write_line(format!(
            "{} = rand({});",
            data.attrib_ref(&common::PHASE),
            data.attrib_ref(&common::SEED)
        ));
        b.blank_line();
    }

    generator.write_pre_block(b, data);
    for block in &data.init_blocks {
        write_function_call(b, block, data, ContextType::Init);
    }
    b.blank_line();
    generator.write_post_block(b, data);

    if data.phase_shift {
        write_remove_phase_shift(b, data);
        b.blank_line();
    }

    for buffer in &data.attribute_buffers {
        let i = buffer.index;
        b.write_line(format!("attribBuffer{i}[index] = attrib{i};"));
    }

    if data.has_kill {
        b.blank_line();
        b.write_line("flags[index] = 1;");
    }

    b.exit_scope();
    b.exit_scope();
    b.blank_line();
}

fn write_update_kernel(
    b: &mut ShaderSourceBuilder,
    data: &ShaderMetaData,
    generator: StageGenerator<'_>,
) {
    write_kernel_header(b, "CSVFXUpdate");
    if data.has_kill {
        b.write_line("if (id.x < nbMax && flags[id.x] == 1)");
    } else {
        b.write_line("if (id.x < nbMax)");
    }
    b.enter_scope();
    b.write_line("uint index = id.x;");
    if data.has_kill {
        b.write_line("bool kill = false;");
    }
    b.blank_line();

    for buffer in data
        .attribute_buffers
        .iter()
        .filter(|buf| buf.used(ContextType::Update))
    {
        let i = buffer.index;
        let suffix = if buffer.writable(ContextType::Update) { "" } else { "_RO" };
        b.write_line(format!("Attribute{i} attrib{i} = attribBuffer{i}{suffix}[index];"));
    }
    b.blank_line();

    if data.phase_shift {
        write_add_phase_shift(b, data);
        b.blank_line();
    }

    generator.write_pre_block(b, data);
    for block in &data.update_blocks {
        write_function_call(b, block, data, ContextType::Update);
    }
    b.blank_line();
    generator.write_post_block(b, data);

    if data.phase_shift {
        write_remove_phase_shift(b, data);
        b.blank_line();
    }

    if data.has_kill {
        b.write_line("if (kill)");
        b.enter_scope();
        b.write_line("flags[index] = 0;");
        b.write_line("deadListOut.Append(index);");
        b.write_line("return;");
        b.exit_scope();
        b.blank_line();
    }

    for buffer in data
        .attribute_buffers
        .iter()
        .filter(|buf| buf.writable(ContextType::Update))
    {
        let i = buffer.index;
        b.write_line(format!("attribBuffer{i}[index] = attrib{i};"));
    }

    b.exit_scope();
    b.exit_scope();
    b.blank_line();
}
