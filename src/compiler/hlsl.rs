//! HLSL fragments shared by the compute and output emitters.

use std::collections::HashSet;

use super::{
    flatten::ResolvedBlock,
    metadata::ShaderMetaData,
    packer::AttributeBuffer,
    source_builder::ShaderSourceBuilder,
    types::{BlockFlags, ContextType, common},
    uniforms::{ParamNames, ParamSet},
};

fn param_name(names: &ParamNames, id: &super::types::ParamId) -> String {
    names
        .get(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

/// `CBUFFER_START(name)` block, skipped when `uniforms` is empty.
pub fn write_cbuffer(
    b: &mut ShaderSourceBuilder,
    name: &str,
    uniforms: &ParamSet,
    names: &ParamNames,
) {
    if uniforms.is_empty() {
        return;
    }
    b.write_line(format!("CBUFFER_START({name})"));
    for p in uniforms.iter() {
        b.write_line(format!("\t{} {};", p.ty.hlsl(), param_name(names, &p.id)));
    }
    b.write_line("CBUFFER_END");
    b.blank_line();
}

pub fn write_samplers(b: &mut ShaderSourceBuilder, samplers: &ParamSet, names: &ParamNames) {
    for p in samplers.iter() {
        b.write_line(format!("{} {};", p.ty.hlsl(), param_name(names, &p.id)));
    }
    if !samplers.is_empty() {
        b.blank_line();
    }
}

/// `struct AttributeN`, padded so its size matches the buffer stride.
pub fn write_attribute_buffer(b: &mut ShaderSourceBuilder, buffer: &AttributeBuffer) {
    b.write_line(format!("struct Attribute{}", buffer.index));
    b.enter_scope();
    for attr in &buffer.attributes {
        b.write_line(format!("{} {};", attr.ty.hlsl(), attr.name));
    }
    if buffer.needs_padding() {
        let pad = (buffer.stride() - buffer.size_in_bytes()) / 4;
        for i in 0..pad {
            b.write_line(format!("uint _PADDING_{i};"));
        }
    }
    b.exit_scope_struct();
    b.blank_line();
}

/// Write the function of `block` unless one with the same name already was.
pub fn write_function(
    b: &mut ShaderSourceBuilder,
    block: &ResolvedBlock,
    written: &mut HashSet<String>,
) {
    if !written.insert(block.function_name.clone()) {
        return;
    }

    let mut params: Vec<String> = block
        .desc
        .attributes
        .iter()
        .map(|a| {
            let inout = if a.writable { "inout " } else { "" };
            format!("{inout}{} {}", a.ty.hlsl(), a.name)
        })
        .collect();
    params.extend(
        block
            .desc
            .properties
            .iter()
            .map(|p| format!("{} {}", p.ty.hlsl(), p.name)),
    );
    let flags = block.flags();
    if flags.contains(BlockFlags::RAND) {
        params.push("inout uint seed".to_string());
    }
    if flags.contains(BlockFlags::KILL) {
        params.push("inout bool kill".to_string());
    }

    b.write_line(format!("void {}({})", block.function_name, params.join(",")));
    b.enter_scope();
    for line in &block.desc.source {
        b.write_line(line);
    }
    b.exit_scope();
    b.blank_line();
}

pub fn write_function_call(
    b: &mut ShaderSourceBuilder,
    block: &ResolvedBlock,
    data: &ShaderMetaData,
    stage: ContextType,
) {
    let mut args: Vec<String> = block
        .desc
        .attributes
        .iter()
        .map(|a| data.attrib_ref(&a.attribute()))
        .collect();
    args.extend(block.args.iter().map(|arg| data.arg_expr(arg, stage)));
    let flags = block.flags();
    if flags.contains(BlockFlags::RAND) {
        args.push(data.attrib_ref(&common::SEED));
    }
    if flags.contains(BlockFlags::KILL) {
        args.push("kill".to_string());
    }
    b.write_line(format!("{}({});", block.function_name, args.join(",")));
}

pub fn write_kernel_header(b: &mut ShaderSourceBuilder, name: &str) {
    b.write_line("[numthreads(NB_THREADS_PER_GROUP,1,1)]");
    b.write_line(format!("void {name}(uint3 id : SV_DispatchThreadID)"));
    b.enter_scope();
}

fn write_phase_shift(b: &mut ShaderSourceBuilder, data: &ShaderMetaData, op: &str) {
    b.write_line(format!(
        "{} {op} ({} * deltaTime) * {};",
        data.attrib_ref(&common::POSITION),
        data.attrib_ref(&common::PHASE),
        data.attrib_ref(&common::VELOCITY),
    ));
}

pub fn write_add_phase_shift(b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
    write_phase_shift(b, data, "+=");
}

pub fn write_remove_phase_shift(b: &mut ShaderSourceBuilder, data: &ShaderMetaData) {
    write_phase_shift(b, data, "-=");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{AttributeUsage, Param, ValueType};

    #[test]
    fn empty_cbuffer_is_skipped() {
        let mut b = ShaderSourceBuilder::new();
        write_cbuffer(&mut b, "initUniforms", &ParamSet::new(), &ParamNames::new());
        assert!(b.into_string().is_empty());
    }

    #[test]
    fn cbuffer_uses_generated_names() {
        let set: ParamSet = [Param::new("speed", ValueType::Float3)].into_iter().collect();
        let mut names = ParamNames::new();
        names.generate(&set, "initUniform");
        let mut b = ShaderSourceBuilder::new();
        write_cbuffer(&mut b, "initUniforms", &set, &names);
        assert_eq!(
            b.into_string(),
            "CBUFFER_START(initUniforms)\n\tfloat3 initUniform0;\nCBUFFER_END\n\n"
        );
    }

    #[test]
    fn twelve_byte_struct_is_padded() {
        let buffer = AttributeBuffer {
            index: 2,
            usage: AttributeUsage::INIT,
            attributes: vec![common::POSITION],
        };
        let mut b = ShaderSourceBuilder::new();
        write_attribute_buffer(&mut b, &buffer);
        assert_eq!(
            b.into_string(),
            "struct Attribute2\n{\n\tfloat3 position;\n\tuint _PADDING_0;\n};\n\n"
        );
    }
}
