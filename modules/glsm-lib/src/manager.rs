//! Shader program lifecycle management.
//!
//! [`ShaderManager`] owns the graphics context plus every program and
//! pipeline created through it. Programs are created separable, so a
//! one-stage program can fill a slot of any number of pipelines. Uniform
//! locations are resolved lazily per program and cached (negative results
//! included) until the program is destroyed.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::context::{check_errors, GlContext};
use crate::error::{Error, ObjectKind};
use crate::stage::{stage_from_path, ShaderStage, StageMask};
use crate::uniform::UniformValue;

/// Index of a program owned by the manager. Pipelines reference programs
/// through this id, never through raw context handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(usize);

/// Index of a pipeline owned by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(usize);

struct ProgramState {
    handle: u32,
    linked: bool,
    // Uniform name -> location, negatives cached too.
    uniforms: HashMap<String, i32>,
}

struct PipelineState {
    handle: u32,
    // Latest program assigned per stage slot.
    stages: HashMap<ShaderStage, ProgramId>,
}

pub struct ShaderManager<G: GlContext> {
    gl: G,
    // Tombstoned arenas: ids stay stable, destroyed slots become None.
    programs: Vec<Option<ProgramState>>,
    pipelines: Vec<Option<PipelineState>>,
}

impl<G: GlContext> ShaderManager<G> {
    pub fn new(gl: G) -> Self {
        Self {
            gl,
            programs: Vec::new(),
            pipelines: Vec::new(),
        }
    }

    /// The underlying context, for collaborators that draw.
    pub fn gl(&self) -> &G {
        &self.gl
    }

    fn program(&self, id: ProgramId) -> Result<&ProgramState, Error> {
        self.programs
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownProgram)
    }

    fn program_mut(&mut self, id: ProgramId) -> Result<&mut ProgramState, Error> {
        self.programs
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownProgram)
    }

    fn pipeline(&self, id: PipelineId) -> Result<&PipelineState, Error> {
        self.pipelines
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::UnknownPipeline)
    }

    /// Allocate a new program object, marked separable so it can later fill
    /// pipeline stage slots.
    pub fn create_program(&mut self) -> Result<ProgramId, Error> {
        let handle = self.gl.create_program();
        if handle == 0 {
            return Err(Error::CreationFailed(ObjectKind::Program));
        }
        self.gl.set_program_separable(handle);

        let id = ProgramId(self.programs.len());
        self.programs.push(Some(ProgramState {
            handle,
            linked: false,
            uniforms: HashMap::new(),
        }));
        log::info!(target: "glsm", "program handle {} created", handle);
        Ok(id)
    }

    /// The raw context handle of a live program.
    pub fn program_handle(&self, id: ProgramId) -> Result<u32, Error> {
        Ok(self.program(id)?.handle)
    }

    /// Whether the program has been successfully linked.
    pub fn is_linked(&self, id: ProgramId) -> Result<bool, Error> {
        Ok(self.program(id)?.linked)
    }

    /// Compile a shader source file, inferring the stage from the file name
    /// suffix, and attach the result to `id`.
    pub fn compile_file<P: AsRef<Path>>(&mut self, id: ProgramId, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let stage = stage_from_path(path).ok_or_else(|| {
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            Error::UnknownExtension(name.unwrap_or_else(|| path.display().to_string()))
        })?;
        self.compile_file_as(id, path, stage)
    }

    /// Compile a shader source file as an explicit stage and attach the
    /// result to `id`.
    pub fn compile_file_as<P: AsRef<Path>>(
        &mut self,
        id: ProgramId,
        path: P,
        stage: ShaderStage,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_source(id, &source, stage, &path.display().to_string())
    }

    /// Compile shader source text into a new shader object and attach it to
    /// `id`. On compiler failure nothing is attached and the program is left
    /// untouched; the returned error carries the full compiler log. `name`
    /// only labels diagnostics.
    pub fn compile_source(
        &mut self,
        id: ProgramId,
        source: &str,
        stage: ShaderStage,
        name: &str,
    ) -> Result<(), Error> {
        let program = self.program(id)?.handle;

        let shader = self.gl.create_shader(stage);
        if shader == 0 {
            return Err(Error::CreationFailed(ObjectKind::Shader));
        }
        self.gl.shader_source(shader, source);
        if !self.gl.compile_shader(shader) {
            let log = self.gl.shader_info_log(shader);
            self.gl.delete_shader(shader);
            log::error!(target: "glsm", "{} shader {:?} failed to compile", stage, name);
            return Err(Error::Compile {
                name: name.to_string(),
                log,
            });
        }

        self.gl.attach_shader(program, shader);
        log::info!(
            target: "glsm",
            "{} shader handle {} (from {:?}) compiled, attached to program {}",
            stage,
            shader,
            name,
            program
        );
        Ok(())
    }

    /// Link all attached shader objects into an executable program. Linking
    /// an already-linked program is a no-op. Both on success and on failure
    /// the attached shader objects are detached and deleted; on failure the
    /// program stays unlinked and the error carries the linker log.
    pub fn link(&mut self, id: ProgramId) -> Result<(), Error> {
        let state = self.program(id)?;
        if state.linked {
            return Ok(());
        }
        let handle = state.handle;

        let linked = self.gl.link_program(handle);
        let log = if linked {
            String::new()
        } else {
            self.gl.program_info_log(handle)
        };

        // Shader objects are transient either way: once the link attempt is
        // made they no longer need to exist on their own.
        self.detach_and_delete_shaders(handle);

        if !linked {
            log::error!(target: "glsm", "program {} failed to link", handle);
            return Err(Error::Link { log });
        }
        self.program_mut(id)?.linked = true;
        log::info!(target: "glsm", "program {} linked", handle);
        Ok(())
    }

    /// Eagerly resolve every active non-block uniform of a linked program
    /// into the location cache. Optional: lookups fall back to lazy
    /// resolution either way.
    pub fn cache_active_uniforms(&mut self, id: ProgramId) -> Result<(), Error> {
        let state = self.program(id)?;
        if !state.linked {
            return Err(Error::NotLinked);
        }
        let handle = state.handle;
        let actives = self.gl.active_uniforms(handle);
        let state = self.program_mut(id)?;
        for uniform in actives {
            log::info!(
                target: "glsm",
                "program {}: active uniform {:?} at location {}",
                handle,
                uniform.name,
                uniform.location
            );
            state.uniforms.insert(uniform.name, uniform.location);
        }
        Ok(())
    }

    /// Run the context's state-dependent validation on a linked program.
    /// Advisory: a failure means the program cannot execute against the
    /// currently bound state, which is a debugging aid distinct from link
    /// success.
    pub fn validate(&self, id: ProgramId) -> Result<(), Error> {
        let state = self.program(id)?;
        if !state.linked {
            return Err(Error::NotLinked);
        }
        if !self.gl.validate_program(state.handle) {
            let log = self.gl.program_info_log(state.handle);
            return Err(Error::Validate { log });
        }
        Ok(())
    }

    /// Bind a program as the current rendering program. Requires a
    /// successful link.
    pub fn use_program(&self, id: ProgramId) -> Result<(), Error> {
        let state = self.program(id)?;
        if !state.linked {
            return Err(Error::NotLinked);
        }
        self.gl.use_program(state.handle);
        Ok(())
    }

    /// Bind a vertex attribute index to a named attribute. Only effective
    /// before the program is linked; context-level complaints surface
    /// through the error side channel.
    #[track_caller]
    pub fn bind_attrib_location(
        &self,
        id: ProgramId,
        location: u32,
        name: &str,
    ) -> Result<(), Error> {
        let handle = self.program(id)?.handle;
        self.gl.bind_attrib_location(handle, location, name);
        check_errors(&self.gl);
        Ok(())
    }

    /// Bind a fragment output color number to a named output. Only
    /// effective before link, like [`bind_attrib_location`].
    ///
    /// [`bind_attrib_location`]: Self::bind_attrib_location
    #[track_caller]
    pub fn bind_frag_data_location(
        &self,
        id: ProgramId,
        location: u32,
        name: &str,
    ) -> Result<(), Error> {
        let handle = self.program(id)?.handle;
        self.gl.bind_frag_data_location(handle, location, name);
        check_errors(&self.gl);
        Ok(())
    }

    /// Resolve a uniform location through the per-program cache, querying
    /// the context on a miss. Negative (not found) results are cached and
    /// returned as-is; the caller decides how loudly to complain.
    pub fn uniform_location(&mut self, id: ProgramId, name: &str) -> Result<i32, Error> {
        let state = self.program(id)?;
        if let Some(&location) = state.uniforms.get(name) {
            return Ok(location);
        }
        let handle = state.handle;
        let location = self.gl.uniform_location(handle, name);
        if location < 0 {
            log::warn!(
                target: "glsm",
                "program {}: uniform {:?} not found (location {})",
                handle,
                name,
                location
            );
        }
        self.program_mut(id)?
            .uniforms
            .insert(name.to_string(), location);
        Ok(location)
    }

    /// Set a named uniform on a linked program. Program-addressed: the
    /// target does not need to be currently bound. A uniform name with no
    /// location is logged and skipped; the frame renders with that uniform
    /// unset.
    #[track_caller]
    pub fn set_uniform<V>(&mut self, id: ProgramId, name: &str, value: V) -> Result<(), Error>
    where
        V: Into<UniformValue>,
    {
        if !self.program(id)?.linked {
            return Err(Error::NotLinked);
        }
        let value = value.into();
        let location = self.uniform_location(id, name)?;
        let handle = self.program(id)?.handle;
        if location < 0 {
            log::error!(
                target: "glsm",
                "{} set uniform error: {:?} loc: {}",
                value.kind(),
                name,
                location
            );
        }
        self.gl.set_uniform(handle, location, &value);
        check_errors(&self.gl);
        Ok(())
    }

    /// Allocate a pipeline. Pipelines carry no shader code of their own,
    /// only per-stage references to separable programs, and normally live
    /// for the whole run with their stage bindings swapped on the fly.
    pub fn create_pipeline(&mut self) -> Result<PipelineId, Error> {
        let handle = self.gl.create_pipeline();
        if handle == 0 {
            return Err(Error::CreationFailed(ObjectKind::Pipeline));
        }
        let id = PipelineId(self.pipelines.len());
        self.pipelines.push(Some(PipelineState {
            handle,
            stages: HashMap::new(),
        }));
        log::info!(target: "glsm", "pipeline handle {} created", handle);
        Ok(id)
    }

    /// Fill the masked stage slots of a pipeline with a linked program,
    /// replacing whatever filled them before. No ownership moves: the same
    /// program may fill slots in any number of pipelines, and the swap is
    /// repeatable every frame.
    pub fn use_program_stages(
        &mut self,
        pipeline: PipelineId,
        stages: StageMask,
        program: ProgramId,
    ) -> Result<(), Error> {
        let prog = self.program(program)?;
        if !prog.linked {
            return Err(Error::NotLinked);
        }
        let prog_handle = prog.handle;
        let state = self
            .pipelines
            .get_mut(pipeline.0)
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownPipeline)?;
        self.gl.use_program_stages(state.handle, stages, prog_handle);
        for stage in stages.stages() {
            state.stages.insert(stage, program);
        }
        Ok(())
    }

    /// The program currently filling a pipeline's stage slot, if any.
    pub fn pipeline_stage(
        &self,
        pipeline: PipelineId,
        stage: ShaderStage,
    ) -> Result<Option<ProgramId>, Error> {
        Ok(self.pipeline(pipeline)?.stages.get(&stage).copied())
    }

    /// Bind a pipeline as the active stage-composition source. The active
    /// program is cleared in the same call so the per-stage programs are
    /// actually consulted. Callers must not mix a bound program and a bound
    /// pipeline in one draw; that combination is undefined.
    pub fn bind_pipeline(&self, pipeline: PipelineId) -> Result<(), Error> {
        let state = self.pipeline(pipeline)?;
        self.gl.use_program(0);
        self.gl.bind_pipeline(state.handle);
        Ok(())
    }

    /// Validate a pipeline's current stage assignments against current
    /// context state. Same advisory contract as [`validate`].
    ///
    /// [`validate`]: Self::validate
    pub fn validate_pipeline(&self, pipeline: PipelineId) -> Result<(), Error> {
        let state = self.pipeline(pipeline)?;
        if !self.gl.validate_pipeline(state.handle) {
            let log = self.gl.pipeline_info_log(state.handle);
            return Err(Error::ValidatePipeline { log });
        }
        Ok(())
    }

    /// Destroy a program: detach and delete any still-attached shader
    /// objects, release the program handle, and drop its uniform cache.
    /// Pipelines still referencing the id keep their context-side bindings;
    /// further manager calls with the id report `UnknownProgram`.
    pub fn destroy_program(&mut self, id: ProgramId) -> Result<(), Error> {
        let state = self
            .programs
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(Error::UnknownProgram)?;
        self.detach_and_delete_shaders(state.handle);
        self.gl.delete_program(state.handle);
        log::info!(target: "glsm", "program handle {} destroyed", state.handle);
        Ok(())
    }

    fn detach_and_delete_shaders(&self, program: u32) {
        for shader in self.gl.attached_shaders(program) {
            self.gl.detach_shader(program, shader);
            self.gl.delete_shader(shader);
            log::info!(
                target: "glsm",
                "detached and deleted shader handle {} from program {}",
                shader,
                program
            );
        }
    }
}

impl<G: GlContext> Drop for ShaderManager<G> {
    fn drop(&mut self) {
        for state in self.programs.iter().flatten() {
            self.detach_and_delete_shaders(state.handle);
            self.gl.delete_program(state.handle);
        }
        for state in self.pipelines.iter().flatten() {
            self.gl.delete_pipeline(state.handle);
        }
    }
}
