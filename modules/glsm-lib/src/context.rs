//! The graphics-context collaborator.
//!
//! Everything the manager needs from the underlying graphics API is behind
//! [`GlContext`], so the same lifecycle logic drives a real OpenGL context
//! (`glsm-backend-gl`) or the simulated one used by the test suite
//! (`glsm-backend-headless`).
//!
//! Raw object names are plain `u32`s here, exactly as the API hands them
//! out; zero is the "allocation failed" / "nothing bound" value throughout.

use std::fmt;
use std::panic::Location;

use crate::stage::{ShaderStage, StageMask};
use crate::uniform::UniformValue;

/// Classification of a context-level error pulled from the side channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
    Unknown(u32),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::InvalidEnum => f.write_str("invalid enum"),
            ContextError::InvalidValue => f.write_str("invalid value"),
            ContextError::InvalidOperation => f.write_str("invalid operation"),
            ContextError::InvalidFramebufferOperation => {
                f.write_str("invalid framebuffer operation")
            }
            ContextError::OutOfMemory => f.write_str("out of memory"),
            ContextError::Unknown(code) => write!(f, "unknown error {:#x}", code),
        }
    }
}

/// Identity strings of the underlying context, logged once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub vendor: String,
    pub renderer: String,
    pub version: String,
    pub shading_language_version: String,
}

/// An active (non-block) uniform reported by the context after a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub location: i32,
}

/// The surface of the graphics context that shader program management
/// touches. Methods take `&self`: the context is process-global state and
/// all access is serialized by program order (single render thread).
pub trait GlContext {
    // Shader objects.
    fn create_shader(&self, stage: ShaderStage) -> u32;
    fn shader_source(&self, shader: u32, source: &str);
    fn compile_shader(&self, shader: u32) -> bool;
    fn shader_info_log(&self, shader: u32) -> String;
    fn delete_shader(&self, shader: u32);

    // Programs.
    fn create_program(&self) -> u32;
    fn set_program_separable(&self, program: u32);
    fn attach_shader(&self, program: u32, shader: u32);
    fn detach_shader(&self, program: u32, shader: u32);
    fn attached_shaders(&self, program: u32) -> Vec<u32>;
    fn link_program(&self, program: u32) -> bool;
    fn validate_program(&self, program: u32) -> bool;
    fn program_info_log(&self, program: u32) -> String;
    fn delete_program(&self, program: u32);
    fn use_program(&self, program: u32);

    // Pre-link metadata.
    fn bind_attrib_location(&self, program: u32, location: u32, name: &str);
    fn bind_frag_data_location(&self, program: u32, location: u32, name: &str);

    // Uniforms. Sets are program-addressed: they mutate the given program
    // regardless of which program or pipeline is currently bound.
    fn uniform_location(&self, program: u32, name: &str) -> i32;
    /// Active non-block uniforms of a linked program. Uniforms living in a
    /// uniform block are never reported here.
    fn active_uniforms(&self, program: u32) -> Vec<ActiveUniform>;
    fn set_uniform(&self, program: u32, location: i32, value: &UniformValue);

    // Separable pipelines.
    fn create_pipeline(&self) -> u32;
    fn use_program_stages(&self, pipeline: u32, stages: StageMask, program: u32);
    fn bind_pipeline(&self, pipeline: u32);
    fn validate_pipeline(&self, pipeline: u32) -> bool;
    fn pipeline_info_log(&self, pipeline: u32) -> String;
    fn delete_pipeline(&self, pipeline: u32);

    // Side channel.
    /// Pop one pending context error, or `None` when the channel is clear.
    fn poll_error(&self) -> Option<ContextError>;
    fn info(&self) -> ContextInfo;
}

/// Drain and log every pending context error, tagged with the caller's
/// file and line. Returns `true` if at least one error was pending. Never
/// unwinds; the side channel is advisory.
#[track_caller]
pub fn check_errors<G: GlContext>(gl: &G) -> bool {
    let caller = Location::caller();
    let mut any = false;
    while let Some(err) = gl.poll_error() {
        log::error!(
            target: "glsm",
            "context error at {}:{}: {}",
            caller.file(),
            caller.line(),
            err
        );
        any = true;
    }
    any
}

/// Log the context identity strings once at startup.
pub fn log_context_info<G: GlContext>(gl: &G) {
    let info = gl.info();
    log::info!(target: "glsm", "vendor         : {}", info.vendor);
    log::info!(target: "glsm", "renderer       : {}", info.renderer);
    log::info!(target: "glsm", "version        : {}", info.version);
    log::info!(target: "glsm", "shading lang   : {}", info.shading_language_version);
}
