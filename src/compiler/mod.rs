//! Particle system compiler.
//!
//! A [`SystemDSL`](crate::dsl::SystemDSL) goes through these passes:
//!
//! 1. [`flatten`] resolves block descriptors, slot bindings and the stage
//!    generators.
//! 2. [`attributes`] collects per-attribute usage and applies the structural
//!    rules (seed, phase shift, default initialization).
//! 3. [`packer`] groups attributes into buffers by usage class.
//! 4. [`uniforms`] partitions parameters into global/init/update/output sets
//!    and names them; [`signals`] bakes gradients and curves.
//! 5. [`compute_shader`] and [`output_shader`] emit HLSL.

pub mod attributes;
pub mod compute_shader;
pub mod diagnostics;
pub mod error;
pub mod flatten;
pub mod generators;
pub mod hlsl;
pub mod metadata;
pub mod output_shader;
pub mod packer;
pub mod params;
pub mod pipeline;
pub mod signals;
pub mod source_builder;
pub mod types;
pub mod uniforms;
pub mod utils;

pub use diagnostics::{Diagnostic, Diagnostics, LogSink, VecSink};
pub use error::CompileError;
pub use params::{ParamTable, ParamValue};
pub use pipeline::{CompileEnv, CompileOptions, CompiledSystem, compile_system};
pub use signals::{GeneratedTextureData, SignalBaker};

/// Builders for systems used by unit tests; only the fields a test cares
/// about need to be spelled out.
#[cfg(test)]
pub(crate) mod test_utils {
    use std::collections::HashMap;

    use crate::dsl::{BlockDSL, ContextDSL, Metadata, SystemDSL};

    use super::types::{BlendMode, ContextType};

    pub fn block(id: &str, block_type: &str) -> BlockDSL {
        BlockDSL {
            id: id.to_string(),
            block_type: block_type.to_string(),
            slots: HashMap::new(),
            desc: None,
        }
    }

    pub fn context(id: &str, context_type: ContextType, blocks: Vec<BlockDSL>) -> ContextDSL {
        ContextDSL {
            id: id.to_string(),
            context_type,
            params: HashMap::new(),
            blocks,
        }
    }

    pub fn system(contexts: Vec<ContextDSL>) -> SystemDSL {
        SystemDSL {
            version: "1".to_string(),
            metadata: Metadata {
                name: "test".to_string(),
                created: None,
                modified: None,
            },
            id: "1".to_string(),
            blend_mode: BlendMode::default(),
            phase_shift: false,
            params: Vec::new(),
            contexts,
        }
    }
}
