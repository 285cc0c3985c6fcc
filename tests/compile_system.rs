use std::path::PathBuf;

use particle_forge::{
    compiler::{
        CompileEnv, CompileError, CompileOptions, CompiledSystem, Diagnostic, GeneratedTextureData,
        ParamTable, VecSink, compile_system,
        types::{AttributeUsage, ContextType, ParamId, ValueType},
    },
    dsl::{self, SystemDSL},
    runtime::{BufferDesc, OutputType, PushTarget, PushedValue, RecordingHost},
    schema::{BlockLibrary, load_default_library},
};
use serde_json::json;

fn case_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("cases")
        .join(name)
}

fn load_case(name: &str) -> SystemDSL {
    dsl::load_system_from_path(case_path(name))
        .unwrap_or_else(|e| panic!("failed to load case {name}: {e:#}"))
}

struct Outcome {
    result: Result<CompiledSystem, CompileError>,
    options: CompileOptions,
    params: ParamTable,
    baker: GeneratedTextureData,
    sink: VecSink,
}

fn compile_with(system: &SystemDSL, mut options: CompileOptions) -> Outcome {
    let library: BlockLibrary = load_default_library().expect("default block library");
    let params = ParamTable::from_dsl(&system.params).expect("params");
    let mut baker = GeneratedTextureData::new();
    let mut sink = VecSink::new();
    let result = {
        let mut env = CompileEnv {
            library: &library,
            baker: &mut baker,
            diagnostics: &mut sink,
        };
        compile_system(system, &params, &mut options, &mut env)
    };
    Outcome {
        result,
        options,
        params,
        baker,
        sink,
    }
}

fn compile(system: &SystemDSL) -> Outcome {
    compile_with(system, CompileOptions::for_system(system))
}

fn system_from(value: serde_json::Value) -> SystemDSL {
    serde_json::from_value(value).expect("system json")
}

/// A system whose init stage writes only `position`, plus whatever else the
/// caller puts in the contexts.
fn minimal(init_blocks: serde_json::Value, update_blocks: serde_json::Value) -> SystemDSL {
    system_from(json!({
        "version": "1",
        "metadata": { "name": "minimal", "created": null, "modified": null },
        "id": "3",
        "contexts": [
            { "id": "i", "type": "init", "blocks": init_blocks },
            { "id": "u", "type": "update", "blocks": update_blocks },
            { "id": "o", "type": "output" }
        ]
    }))
}

fn origin_block() -> serde_json::Value {
    json!({
        "id": "origin",
        "type": "SetPositionOrigin",
        "desc": {
            "attributes": [{ "name": "position", "type": "float3", "writable": true }],
            "source": ["position = float3(0.0,0.0,0.0);"]
        }
    })
}

fn warnings(sink: &VecSink) -> Vec<String> {
    sink.warnings()
        .filter_map(|d| match d {
            Diagnostic::UninitializedAttribute(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn fountain_packs_one_buffer_per_usage_class() {
    let outcome = compile(&load_case("fountain.json"));
    let compiled = outcome.result.expect("fountain compiles");
    let buffers = &compiled.metadata.attribute_buffers;

    let layout: Vec<(u8, Vec<&str>)> = buffers
        .iter()
        .map(|b| (b.usage.bits(), b.attributes.iter().map(|a| &*a.name).collect()))
        .collect();
    assert_eq!(
        layout,
        vec![
            (0x1F, vec!["position", "color"]),
            (0x0F, vec!["velocity", "age", "seed"]),
            (0x13, vec!["alpha"]),
            (0x07, vec!["lifetime"]),
        ]
    );
    assert_eq!(
        buffers.iter().map(|b| b.size_in_bytes()).collect::<Vec<_>>(),
        vec![24, 20, 4, 4]
    );
    assert!(compiled.metadata.has_kill);
    assert!(compiled.metadata.has_rand);
}

#[test]
fn fountain_runtime_descriptor() {
    let outcome = compile(&load_case("fountain.json"));
    let compiled = outcome.result.expect("fountain compiles");
    let rt = &compiled.runtime;

    assert_eq!(compiled.shader_name(), "VFX_42");
    assert_eq!(rt.output_type, OutputType::Quad);
    assert!(rt.has_kill);
    assert_eq!(
        rt.buffers[3],
        BufferDesc {
            size: 4,
            init_name: Some("attribBuffer3".to_string()),
            update_name: Some("attribBuffer3_RO".to_string()),
            output_name: None,
        }
    );
    assert_eq!(rt.buffers[2].update_name, None);
    assert_eq!(rt.buffers[2].output_name.as_deref(), Some("attribBuffer2"));

    let names: Vec<(&str, &str)> = rt.uniforms.iter().map(|(id, n)| (id.as_str(), n)).collect();
    assert_eq!(
        names,
        vec![
            ("spread", "globalUniform0"),
            ("life", "initUniform0"),
            ("gravity", "updateUniform0"),
            ("fade", "updateUniform1"),
        ]
    );
    let output_names: Vec<(&str, &str)> = rt
        .output_uniforms
        .iter()
        .map(|(id, n)| (id.as_str(), n))
        .collect();
    assert_eq!(
        output_names,
        vec![("tint", "outputUniform0"), ("sprite", "outputSampler0")]
    );
}

#[test]
fn param_shared_by_init_and_update_is_global_only() {
    let outcome = compile(&load_case("fountain.json"));
    let data = outcome.result.expect("fountain compiles").metadata;
    let spread = ParamId::new("spread");

    assert!(data.global_uniforms.contains(&spread));
    assert!(!data.init_uniforms.contains(&spread));
    assert!(!data.update_uniforms.contains(&spread));
    // signals stay uniforms
    assert!(data.update_uniforms.contains(&ParamId::new("fade")));
    assert!(data.signals.has_color_texture);
    assert!(!data.signals.has_float_texture);
}

#[test]
fn fountain_reports_uninitialized_color() {
    let outcome = compile(&load_case("fountain.json"));
    assert!(outcome.result.is_ok());
    assert_eq!(warnings(&outcome.sink), vec!["color"]);
    assert!(outcome.sink.entries.contains(&Diagnostic::BufferCount(4)));
    assert!(outcome.sink.entries.contains(&Diagnostic::AttributeCount(7)));
    assert!(outcome.sink.entries.contains(&Diagnostic::BlockCount {
        stage: ContextType::Update,
        count: 3,
    }));
}

#[test]
fn fountain_uniform_push() {
    let outcome = compile(&load_case("fountain.json"));
    let compiled = outcome.result.expect("fountain compiles");
    let mut host = RecordingHost::new();
    compiled
        .runtime
        .update_all_uniforms(&outcome.params, &outcome.baker, &mut host)
        .expect("push");

    let spread: Vec<_> = host.find("globalUniform0").collect();
    assert_eq!(spread.len(), 1);
    assert_eq!(spread[0].target, PushTarget::Compute);
    assert_eq!(spread[0].value, PushedValue::Float(0.5));

    let gravity: Vec<_> = host.find("updateUniform0").collect();
    assert_eq!(gravity[0].value, PushedValue::Floats(vec![0.0, -4.0, 0.0]));

    // single gradient row: center of the only texel row
    let fade: Vec<_> = host.find("updateUniform1").collect();
    assert_eq!(fade[0].value, PushedValue::Float(0.5));

    let tint: Vec<_> = host.find("outputUniform0").collect();
    assert_eq!(tint[0].target, PushTarget::Material);
    assert_eq!(tint[0].value, PushedValue::Vector([1.0, 0.5, 0.25, 0.0]));

    let sprite: Vec<_> = host.find("outputSampler0").collect();
    assert_eq!(
        sprite[0].value,
        PushedValue::Texture("textures/spark.png".to_string())
    );

    assert_eq!(host.find("gradientTexture").count(), 2);
    assert_eq!(host.find("curveTexture").count(), 0);
}

#[test]
fn update_only_attribute_read_by_output_is_initialized() {
    let outcome = compile(&load_case("spinning_sparks.json"));
    let compiled = outcome.result.expect("spinning sparks compiles");
    let data = &compiled.metadata;

    assert_eq!(warnings(&outcome.sink), vec!["angle", "angularVelocity"]);

    let angle_buffer = data
        .attribute_buffers
        .iter()
        .find(|b| b.attributes.iter().any(|a| a.name == "angle"))
        .expect("angle is packed");
    assert_eq!(
        angle_buffer.usage,
        AttributeUsage::INIT | AttributeUsage::UPDATE | AttributeUsage::OUTPUT_READ
    );

    let spin_buffer = data
        .attribute_buffers
        .iter()
        .find(|b| b.attributes.iter().any(|a| a.name == "angularVelocity"))
        .expect("angularVelocity is packed");
    assert_eq!(spin_buffer.usage, AttributeUsage::INIT | AttributeUsage::UPDATE_READ);
}

#[test]
fn phase_shift_adds_phase_attribute() {
    let outcome = compile(&load_case("spinning_sparks.json"));
    assert!(outcome.options.phase_shift);
    let data = outcome.result.expect("spinning sparks compiles").metadata;
    assert!(data.phase_shift);
    let phase = data
        .attribute_buffers
        .iter()
        .find(|b| b.attributes.iter().any(|a| a.name == "phase"))
        .expect("phase is packed");
    assert_eq!(phase.usage, AttributeUsage::INIT | AttributeUsage::UPDATE);
}

#[test]
fn phase_shift_without_velocity_is_rejected_and_cleared() {
    let mut system = minimal(json!([origin_block()]), json!([]));
    system.phase_shift = true;
    let outcome = compile(&system);

    assert_eq!(
        outcome.result.unwrap_err(),
        CompileError::PhaseShiftPrerequisite("velocity")
    );
    assert!(!outcome.options.phase_shift);

    // the cleared option compiles
    let retry = compile_with(&system, outcome.options);
    assert!(retry.result.is_ok());
}

#[test]
fn missing_output_context_is_rejected() {
    let system = system_from(json!({
        "version": "1",
        "metadata": { "name": "no output", "created": null, "modified": null },
        "id": "9",
        "contexts": [
            { "id": "i", "type": "init", "blocks": [origin_block()] },
            { "id": "u", "type": "update" }
        ]
    }));
    let outcome = compile(&system);
    assert_eq!(
        outcome.result.unwrap_err(),
        CompileError::MissingContext(ContextType::Output)
    );
    assert!(matches!(
        outcome.sink.entries.last(),
        Some(Diagnostic::Rejected(_))
    ));
}

fn seven_class_system() -> SystemDSL {
    let attr = |name: &str, writable: bool| {
        json!({ "name": name, "type": "float", "writable": writable })
    };
    let init = json!({
        "id": "seed-all",
        "type": "SeedAll",
        "desc": {
            "attributes": [
                attr("a0", true),
                attr("a1", false),
                attr("a2", true),
                attr("a3", true),
                attr("a4", false),
                attr("a5", false),
                { "name": "position", "type": "float3", "writable": true }
            ],
            "source": []
        }
    });
    let update = json!({
        "id": "touch",
        "type": "Touch",
        "desc": {
            "attributes": [attr("a2", false), attr("a3", true), attr("a4", false), attr("a5", true)],
            "source": []
        }
    });
    minimal(json!([init]), json!([update]))
}

#[test]
fn too_many_usage_classes_fail() {
    let system = seven_class_system();
    let outcome = compile(&system);
    let err = outcome.result.unwrap_err();
    assert_eq!(err, CompileError::TooManyBuffers { used: 7, max: 6 });
    assert!(err.is_capacity());
    assert!(outcome
        .sink
        .entries
        .contains(&Diagnostic::TooManyBuffers { used: 7, max: 6 }));

    let options = CompileOptions {
        max_buffers: 7,
        ..CompileOptions::for_system(&system)
    };
    let outcome = compile_with(&system, options);
    assert_eq!(outcome.result.expect("fits in 7").metadata.attribute_buffers.len(), 7);
}

#[test]
fn twelve_byte_buffer_is_padded_to_sixteen() {
    let outcome = compile(&minimal(json!([origin_block()]), json!([])));
    let compiled = outcome.result.expect("compiles");
    let buffer = &compiled.metadata.attribute_buffers[0];
    assert_eq!(buffer.size_in_bytes(), 12);
    assert_eq!(buffer.stride(), 16);
    assert_eq!(compiled.runtime.buffers[0].size, 16);
}

#[test]
fn unknown_output_kind_is_rejected() {
    let system = system_from(json!({
        "version": "1",
        "metadata": { "name": "bad output", "created": null, "modified": null },
        "id": "5",
        "contexts": [
            { "id": "i", "type": "init", "blocks": [origin_block()] },
            { "id": "u", "type": "update" },
            { "id": "o", "type": "output", "params": { "kind": "mesh" } }
        ]
    }));
    assert!(matches!(
        compile(&system).result,
        Err(CompileError::InvalidGenerator {
            stage: ContextType::Output,
            ..
        })
    ));
}

#[test]
fn output_signal_push_fails() {
    let system = system_from(json!({
        "version": "1",
        "metadata": { "name": "curve output", "created": null, "modified": null },
        "id": "11",
        "params": [
            { "id": "k", "type": "float", "value": 2.0 },
            { "id": "ramp", "type": "curve", "value": [{ "time": 0.0, "value": 0.0 }, { "time": 1.0, "value": 1.0 }] }
        ],
        "contexts": [
            {
                "id": "i",
                "type": "init",
                "blocks": [origin_block(), {
                    "id": "scale",
                    "type": "ScalePosition",
                    "slots": { "k": { "param": "k" } },
                    "desc": {
                        "attributes": [{ "name": "position", "type": "float3", "writable": true }],
                        "properties": [{ "name": "k", "type": "float" }],
                        "source": ["position *= k;"]
                    }
                }]
            },
            { "id": "u", "type": "update" },
            {
                "id": "o",
                "type": "output",
                "blocks": [{
                    "id": "ramp",
                    "type": "OutputRamp",
                    "slots": { "ramp": { "param": "ramp" } },
                    "desc": {
                        "properties": [{ "name": "ramp", "type": "curve" }],
                        "source": []
                    }
                }]
            }
        ]
    }));
    let outcome = compile(&system);
    let compiled = outcome.result.expect("compiles");
    assert_eq!(compiled.runtime.output_uniforms.get(&ParamId::new("ramp")), Some("outputUniform0"));

    assert_eq!(compiled.runtime.uniforms.get(&ParamId::new("k")), Some("initUniform0"));

    let mut host = RecordingHost::new();
    let err = compiled
        .runtime
        .update_all_uniforms(&outcome.params, &outcome.baker, &mut host)
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::UnsupportedOutputUniform {
            param: ParamId::new("ramp"),
            ty: ValueType::Curve,
        }
    );
    // the compute uniform resolved fine but was never sent
    assert!(host.records.is_empty());
}

#[test]
fn attribute_declared_with_two_types_is_rejected() {
    let size_block = |id: &str, ty: &str| {
        json!({
            "id": id,
            "type": id,
            "desc": {
                "attributes": [{ "name": "size", "type": ty, "writable": true }],
                "source": []
            }
        })
    };
    let system = minimal(
        json!([origin_block(), size_block("SizeScalar", "float"), size_block("SizeVector", "float2")]),
        json!([]),
    );
    let outcome = compile(&system);
    assert_eq!(
        outcome.result.unwrap_err(),
        CompileError::ConflictingAttributeType {
            name: "size".to_string(),
            first: ValueType::Float,
            second: ValueType::Float2,
        }
    );
}

#[test]
fn inline_attribute_name_must_be_an_identifier() {
    let block = json!({
        "id": "bad",
        "type": "SetBad",
        "desc": {
            "attributes": [{ "name": "my attr", "type": "float", "writable": true }],
            "source": []
        }
    });
    let outcome = compile(&minimal(json!([origin_block(), block]), json!([])));
    assert_eq!(
        outcome.result.unwrap_err(),
        CompileError::InvalidIdentifier {
            block: "bad".to_string(),
            name: "my attr".to_string(),
        }
    );
}
