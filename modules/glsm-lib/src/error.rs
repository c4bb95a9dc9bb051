//! Error taxonomy for shader program management.
//!
//! Every failure carries a human-readable message; compile, link, and
//! validate failures embed the context's info log verbatim. Uniform lookup
//! misses are deliberately *not* represented here: they are logged and
//! cached as a negative location, and rendering goes on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Kind of GPU object whose allocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Program,
    Shader,
    Pipeline,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Program => f.write_str("program"),
            ObjectKind::Shader => f.write_str("shader"),
            ObjectKind::Pipeline => f.write_str("pipeline"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The context could not allocate a program, shader, or pipeline object.
    #[error("unable to create {0} object")]
    CreationFailed(ObjectKind),

    /// The file name suffix does not map to a known shader stage.
    #[error("unrecognized shader extension: {0}")]
    UnknownExtension(String),

    /// The shader source file is missing or unreadable.
    #[error("unable to read shader source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The shader compiler rejected the source. The info log is verbatim.
    #[error("shader {name} failed to compile:\n{log}")]
    Compile { name: String, log: String },

    /// The linker rejected the attached shader objects.
    #[error("program failed to link:\n{log}")]
    Link { log: String },

    /// Program validation rejected the current context state.
    #[error("program failed to validate:\n{log}")]
    Validate { log: String },

    /// Pipeline validation rejected the current stage assignments.
    #[error("pipeline failed to validate:\n{log}")]
    ValidatePipeline { log: String },

    /// The operation requires a successfully linked program.
    #[error("program is not linked")]
    NotLinked,

    /// The program id does not refer to a live program.
    #[error("unknown or destroyed program")]
    UnknownProgram,

    /// The pipeline id does not refer to a live pipeline.
    #[error("unknown or destroyed pipeline")]
    UnknownPipeline,
}
