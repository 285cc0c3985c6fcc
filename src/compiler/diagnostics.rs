//! Side channel for compile diagnostics.
//!
//! The pipeline never logs directly: it reports [`Diagnostic`] values to a
//! sink passed in by the caller. [`LogSink`] forwards to the `log` facade,
//! [`VecSink`] keeps everything in memory.

use std::fmt;

use super::types::ContextType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    AttributeCount(usize),
    BufferCount(usize),
    BufferLayout {
        index: u32,
        attributes: Vec<String>,
        size_in_bytes: u32,
    },
    UninitializedAttribute(String),
    TooManyBuffers { used: usize, max: usize },
    BlockCount { stage: ContextType, count: usize },
    UniformCounts {
        global: usize,
        init: usize,
        update: usize,
        output: usize,
    },
    Rejected(String),
}

impl Diagnostic {
    pub fn level(&self) -> Level {
        match self {
            Diagnostic::UninitializedAttribute(_) => Level::Warning,
            Diagnostic::TooManyBuffers { .. } | Diagnostic::Rejected(_) => Level::Error,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::AttributeCount(n) => write!(f, "Nb Attributes : {n}"),
            Diagnostic::BufferCount(n) => write!(f, "Nb Attribute buffers: {n}"),
            Diagnostic::BufferLayout {
                index,
                attributes,
                size_in_bytes,
            } => write!(f, "\t {index} |{}| {size_in_bytes}bytes", attributes.join("|")),
            Diagnostic::UninitializedAttribute(name) => {
                write!(f, "WARNING: {name} is not initialized. Use default value")
            }
            Diagnostic::TooManyBuffers { used, max } => {
                write!(f, "ERROR: too many buffers used ({used}, max is {max} + 2 reserved)")
            }
            Diagnostic::BlockCount { stage, count } => write!(f, "Nb {stage} blocks: {count}"),
            Diagnostic::UniformCounts {
                global,
                init,
                update,
                output,
            } => write!(
                f,
                "Nb uniforms: global={global} init={init} update={update} output={output}"
            ),
            Diagnostic::Rejected(reason) => write!(f, "System is invalid: {reason}"),
        }
    }
}

pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);
}

/// Forwards every diagnostic to the `log` facade under the `particle_forge`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl Diagnostics for LogSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level() {
            Level::Info => log::info!(target: "particle_forge", "{diagnostic}"),
            Level::Warning => log::warn!(target: "particle_forge", "{diagnostic}"),
            Level::Error => log::error!(target: "particle_forge", "{diagnostic}"),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct VecSink {
    pub entries: Vec<Diagnostic>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(|d| d.level() == Level::Warning)
    }
}

impl Diagnostics for VecSink {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }
}
