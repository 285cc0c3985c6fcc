use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;

use particle_forge::{
    compiler::{
        CompileEnv, CompileOptions, GeneratedTextureData, LogSink, ParamTable, compile_system,
    },
    dsl,
    runtime::{PushRecord, PushTarget, RecordingHost, SystemRuntimeData},
    schema,
};

#[derive(Debug, Default, Clone)]
struct Cli {
    system_json: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    max_buffers: Option<usize>,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--system-json" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --system-json"));
                };
                cli.system_json = Some(PathBuf::from(v));
                i += 2;
            }
            "--outputdir" | "--output-dir" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --outputdir"));
                };
                cli.output_dir = Some(PathBuf::from(v));
                i += 2;
            }
            "--max-buffers" => {
                let Some(v) = args.get(i + 1) else {
                    return Err(anyhow!("missing value for --max-buffers"));
                };
                let n = v
                    .parse::<usize>()
                    .map_err(|e| anyhow!("invalid --max-buffers value {v}: {e}"))?;
                cli.max_buffers = Some(n);
                i += 2;
            }
            other => {
                return Err(anyhow!(
                    "unknown argument: {other} (supported: --system-json <system.json>, --outputdir <dir>, --max-buffers <n>)"
                ));
            }
        }
    }
    Ok(cli)
}

/// Everything the host needs besides the two shader sources.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LayoutReport<'a> {
    system_id: &'a str,
    phase_shift: bool,
    runtime: &'a SystemRuntimeData,
    pushes: &'a [PushRecord],
}

fn target_label(target: PushTarget) -> &'static str {
    match target {
        PushTarget::Compute => "compute",
        PushTarget::Kernel(kernel) => kernel.name(),
        PushTarget::Material => "material",
    }
}

fn write_file(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("saved: {}", path.display());
    Ok(path)
}

fn run(system_json: &Path, output_dir: &Path, max_buffers: Option<usize>) -> Result<()> {
    let system = dsl::load_system_from_path(system_json)?;
    let params = ParamTable::from_dsl(&system.params)
        .with_context(|| format!("invalid params in {}", system_json.display()))?;
    let library = schema::load_default_library()?;

    let mut options = CompileOptions::for_system(&system);
    if let Some(n) = max_buffers {
        options.max_buffers = n;
    }

    let mut baker = GeneratedTextureData::new();
    let mut sink = LogSink;
    let compiled = {
        let mut env = CompileEnv {
            library: &library,
            baker: &mut baker,
            diagnostics: &mut sink,
        };
        match compile_system(&system, &params, &mut options, &mut env) {
            Ok(c) => c,
            Err(e) if e.is_capacity() => {
                bail!(
                    "system {} does not fit in {} attribute buffers: {e}",
                    system.id,
                    options.max_buffers
                )
            }
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to compile system {}", system.id));
            }
        }
    };

    let mut host = RecordingHost::new();
    compiled
        .runtime
        .update_all_uniforms(&params, &baker, &mut host)
        .with_context(|| format!("failed to push uniforms for system {}", system.id))?;
    for record in &host.records {
        log::debug!("push {} -> {}", record.name, target_label(record.target));
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let name = compiled.shader_name();
    write_file(output_dir, &format!("{name}.compute"), &compiled.compute_source)?;
    write_file(output_dir, &format!("{name}.shader"), &compiled.output_source)?;

    let report = LayoutReport {
        system_id: &compiled.system_id,
        phase_shift: options.phase_shift,
        runtime: &compiled.runtime,
        pushes: &host.records,
    };
    let json = serde_json::to_string_pretty(&report).context("failed to serialize layout")?;
    write_file(output_dir, &format!("{name}.layout.json"), &json)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&argv)?;

    let Some(system_json) = cli.system_json.as_deref() else {
        bail!("--system-json <system.json> is required");
    };
    let output_dir = cli.output_dir.unwrap_or_else(|| PathBuf::from("."));
    run(system_json, &output_dir, cli.max_buffers)
}
