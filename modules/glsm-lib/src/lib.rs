//! Shader program lifecycle management for a small OpenGL demo harness.
//!
//! The manager owns creation, compilation, linking, validation, uniform
//! location caching, and teardown of shader program objects, plus separable
//! pipeline composition (mixing independently linked vertex/fragment
//! programs at draw time). The graphics API itself is a collaborator behind
//! the [`GlContext`] trait; see `glsm-backend-gl` for the real OpenGL
//! implementation and `glsm-backend-headless` for the simulated one the
//! test suite runs against.
//!
//! [`GlContext`]: context::GlContext

pub mod context;
pub mod error;
pub mod manager;
pub mod scene;
pub mod stage;
pub mod uniform;

pub use context::{
    check_errors, log_context_info, ActiveUniform, ContextError, ContextInfo, GlContext,
};
pub use error::{Error, ObjectKind};
pub use manager::{PipelineId, ProgramId, ShaderManager};
pub use scene::{RenderSettings, Scene};
pub use stage::{stage_from_path, ShaderStage, StageMask};
pub use uniform::UniformValue;
