//! The scene collaborator contract.
//!
//! The harness owns meshes, textures, and the camera; the manager owns
//! programs and pipelines. Scenes sit between the two: they supply shader
//! file paths at init and uniform values every frame. Tweakable parameters
//! (background color, light and material settings) live in an explicit
//! [`RenderSettings`] owned by the scene's caller and passed by reference
//! into `render`, never in process-wide mutable state.

use glam::{Mat4, Vec3, Vec4};

use crate::context::GlContext;
use crate::error::Error;
use crate::manager::ShaderManager;

/// A single point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSettings {
    /// Position in view space.
    pub position: Vec4,
    /// Diffuse and specular intensity.
    pub intensity: Vec3,
    /// Ambient intensity.
    pub ambient: Vec3,
}

/// Surface reflectivity parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSettings {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

/// Live-tweakable render parameters, typically driven by a debug UI.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub clear_color: Vec4,
    pub lights: Vec<LightSettings>,
    pub material: MaterialSettings,
    pub animate: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            clear_color: Vec4::new(25.0 / 255.0, 25.0 / 255.0, 25.0 / 255.0, 1.0),
            lights: Vec::new(),
            material: MaterialSettings {
                ambient: Vec3::splat(0.5),
                diffuse: Vec3::splat(0.4),
                specular: Vec3::splat(0.9),
                shininess: 180.0,
            },
            animate: false,
        }
    }
}

/// A renderable scene. The runner calls `init` once before entering the
/// main loop; if `init` fails (typically a shader compile or link error)
/// the loop must not be entered.
pub trait Scene<G: GlContext> {
    /// Compile and link shader programs, set frame-invariant uniforms.
    fn init(&mut self, manager: &mut ShaderManager<G>) -> Result<(), Error>;

    /// Advance animation to time `t` (seconds).
    fn update(&mut self, t: f32);

    /// Draw one frame. Per-frame uniform misses are logged by the manager
    /// and leave the uniform unset; they do not abort the frame.
    fn render(
        &mut self,
        manager: &mut ShaderManager<G>,
        settings: &RenderSettings,
    ) -> Result<(), Error>;

    /// The framebuffer was resized.
    fn resize(&mut self, width: u32, height: u32);

    /// View matrix pushed by the camera collaborator.
    fn set_view(&mut self, _view: Mat4) {}

    /// Projection matrix pushed by the camera collaborator.
    fn set_projection(&mut self, _projection: Mat4) {}
}
