use std::fmt;

use thiserror::Error;

/// Programmable pipeline stage, used when reporting shader failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failures surfaced by a graphics context.
///
/// All of these are fatal: they are reported at construction time and the
/// frame loop never retries them.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{stage} shader of `{label}` failed to compile: {log}")]
    ShaderCompile {
        label: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("program `{label}` failed to link: {log}")]
    ProgramLink { label: String, log: String },
    #[error("render pipeline for `{label}` could not be created: {log}")]
    Pipeline { label: String, log: String },
    #[error("surface is unusable: {0}")]
    Surface(String),
}
