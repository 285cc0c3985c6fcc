//! Vertex/fragment program drawing the particles.

use std::collections::HashSet;

use super::{
    generators::{OutputGenerator, StageGenerator},
    hlsl::{
        write_attribute_buffer, write_cbuffer, write_function, write_function_call,
        write_samplers,
    },
    metadata::ShaderMetaData,
    source_builder::ShaderSourceBuilder,
    types::{BlendMode, ContextType, common},
};

pub fn write_output_shader(
    system_id: &str,
    blend_mode: BlendMode,
    data: &ShaderMetaData,
    output: &OutputGenerator,
) -> String {
    let generator = StageGenerator::Output(output);
    let mut b = ShaderSourceBuilder::new();

    b.write_line(format!("Shader \"Custom/VFX_{system_id}\""));
    b.enter_scope();
    b.write_line("SubShader");
    b.enter_scope();

    if blend_mode != BlendMode::Masked {
        b.write_line(
            "Tags { \"Queue\"=\"Transparent\" \"IgnoreProjector\"=\"True\" \"RenderType\"=\"Transparent\" }",
        );
    }
    b.write_line("Pass");
    b.enter_scope();
    match blend_mode {
        BlendMode::Additive => {
            b.write_line("Blend SrcAlpha One");
        }
        BlendMode::Alpha => {
            b.write_line("Blend SrcAlpha OneMinusSrcAlpha");
        }
        BlendMode::Masked => {}
    }
    b.write_line("ZTest LEqual");
    if blend_mode == BlendMode::Masked {
        b.write_line("ZWrite On");
    } else {
        b.write_line("ZWrite Off");
    }
    b.write_line("CGPROGRAM");
    b.write_line("#pragma target 5.0");
    b.blank_line();
    b.write_line("#pragma vertex vert");
    b.write_line("#pragma fragment frag");
    b.blank_line();
    b.write_line("#include \"UnityCG.cginc\"");
    b.blank_line();

    write_cbuffer(&mut b, "outputUniforms", &data.output_uniforms, &data.output_param_to_name);
    write_samplers(&mut b, &data.output_samplers, &data.output_param_to_name);

    let output_buffers: Vec<_> = data
        .attribute_buffers
        .iter()
        .filter(|buf| buf.used(ContextType::Output))
        .collect();
    for buffer in &output_buffers {
        write_attribute_buffer(&mut b, buffer);
    }
    for buffer in &output_buffers {
        let i = buffer.index;
        b.write_line(format!("StructuredBuffer<Attribute{i}> attribBuffer{i};"));
    }
    if data.has_kill {
        b.write_line("StructuredBuffer<int> flags;");
    }
    b.blank_line();

    let has_color = data.has_attribute(&common::COLOR);
    let has_alpha = data.has_attribute(&common::ALPHA);

    b.write_line("struct ps_input");
    b.enter_scope();
    b.write_line("float4 pos : SV_POSITION;");
    if has_color || has_alpha {
        b.write_line("nointerpolation float4 col : COLOR0;");
    }
    output.write_additional_vertex_output(&mut b);
    b.exit_scope_struct();
    b.blank_line();

    let mut function_names = HashSet::new();
    for block in &data.output_blocks {
        write_function(&mut b, block, &mut function_names);
    }
    generator.write_functions(&mut b, data);

    b.write_line("ps_input vert (uint id : SV_VertexID, uint instanceID : SV_InstanceID)");
    b.enter_scope();
    b.write_line("ps_input o;");
    output.write_index(&mut b);

    if data.has_kill {
        b.write_line("if (flags[index] == 1)");
        b.enter_scope();
    }

    for buffer in &output_buffers {
        let i = buffer.index;
        b.write_line(format!("Attribute{i} attrib{i} = attribBuffer{i}[index];"));
    }
    b.blank_line();

    generator.write_pre_block(&mut b, data);
    if !data.output_blocks.is_empty() {
        for block in &data.output_blocks {
            write_function_call(&mut b, block, data, ContextType::Output);
        }
        b.blank_line();
    }
    generator.write_post_block(&mut b, data);

    if has_color || has_alpha {
        let rgb = if has_color {
            format!("{}.xyz,", data.attrib_ref(&common::COLOR))
        } else {
            "1.0,1.0,1.0,".to_string()
        };
        let alpha = if has_alpha {
            data.attrib_ref(&common::ALPHA)
        } else {
            "0.5".to_string()
        };
        b.write_line(format!("o.col = float4({rgb}{alpha});"));
    }

    if data.has_kill {
        b.exit_scope();
        b.write_line("else");
        b.enter_scope();
        b.write_line("o.pos = -1.0;");
        if has_color || has_alpha {
            b.write_line("o.col = 0;");
        }
        b.exit_scope();
        b.blank_line();
    }

    b.write_line("return o;");
    b.exit_scope();
    b.blank_line();

    b.write_line("float4 frag (ps_input i) : COLOR");
    b.enter_scope();
    if has_color || has_alpha {
        b.write_line("float4 color = i.col;");
    } else {
        b.write_line("float4 color = float4(1.0,1.0,1.0,0.5);");
    }
    output.write_pixel_shader(&mut b, data);
    b.write_line("return color;");
    b.exit_scope();
    b.blank_line();

    b.write_line("ENDCG");
    b.exit_scope();
    b.exit_scope();
    b.write_line("FallBack Off");
    b.exit_scope();

    b.into_string()
}
