//! Simulated graphics context.
//!
//! Implements [`GlContext`] entirely on the CPU so the manager can be
//! exercised without a window or GPU. The simulation keeps the observable
//! contract of a real context: shader objects compile (with a fake GLSL
//! front end that produces an info log on failure), programs link and
//! expose active non-block uniforms at sequential locations, uniform sets
//! are program-addressed, and pipelines record per-stage program bindings.
//!
//! Every mutating call is appended to a call log that tests can inspect,
//! and tests may inject side-channel errors with [`HeadlessContext::inject_error`].

use std::cell::RefCell;
use std::collections::HashMap;

use glsm_lib::{ActiveUniform, ContextError, ContextInfo, GlContext, ShaderStage, StageMask, UniformValue};

mod compiler;

use compiler::{compile, UniformDecl};

#[derive(Debug, Clone)]
struct ShaderObject {
    stage: ShaderStage,
    compiled: bool,
    uniforms: Vec<UniformDecl>,
    log: String,
}

#[derive(Debug, Clone, Default)]
struct ProgramObject {
    separable: bool,
    attached: Vec<u32>,
    linked: bool,
    log: String,
    // Active non-block uniforms, assigned sequential locations at link.
    uniforms: Vec<ActiveUniform>,
    attrib_bindings: HashMap<String, u32>,
    frag_data_bindings: HashMap<String, u32>,
}

#[derive(Debug, Clone, Default)]
struct PipelineObject {
    stages: HashMap<ShaderStage, u32>,
    log: String,
}

/// A recorded program-addressed uniform write.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformWrite {
    pub program: u32,
    pub location: i32,
    pub value: UniformValue,
}

#[derive(Default)]
struct State {
    next_handle: u32,
    shaders: HashMap<u32, ShaderObject>,
    programs: HashMap<u32, ProgramObject>,
    pipelines: HashMap<u32, PipelineObject>,
    current_program: u32,
    current_pipeline: u32,
    uniform_writes: Vec<UniformWrite>,
    calls: Vec<String>,
    pending_errors: Vec<ContextError>,
}

impl State {
    fn alloc(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn record(&mut self, call: String) {
        self.calls.push(call);
    }
}

/// The simulated context. Interior mutability keeps the [`GlContext`]
/// surface `&self`, matching a real context where the mutable state lives
/// process-wide behind the API.
#[derive(Default)]
pub struct HeadlessContext {
    state: RefCell<State>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutating call made so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// All uniform writes addressed to `program`, in issue order.
    pub fn uniform_writes(&self, program: u32) -> Vec<UniformWrite> {
        self.state
            .borrow()
            .uniform_writes
            .iter()
            .filter(|w| w.program == program)
            .cloned()
            .collect()
    }

    /// The program handle currently bound to a pipeline stage slot.
    pub fn pipeline_stage(&self, pipeline: u32, stage: ShaderStage) -> Option<u32> {
        self.state
            .borrow()
            .pipelines
            .get(&pipeline)?
            .stages
            .get(&stage)
            .copied()
    }

    /// The currently bound program handle (0 when none).
    pub fn current_program(&self) -> u32 {
        self.state.borrow().current_program
    }

    /// The currently bound pipeline handle (0 when none).
    pub fn current_pipeline(&self) -> u32 {
        self.state.borrow().current_pipeline
    }

    /// Number of shader objects attached to a program.
    pub fn attached_count(&self, program: u32) -> usize {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.attached.len())
            .unwrap_or(0)
    }

    /// Number of shader objects still alive in the context.
    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    /// Number of program objects still alive in the context.
    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    /// Queue a side-channel error for the next poll.
    pub fn inject_error(&self, error: ContextError) {
        self.state.borrow_mut().pending_errors.push(error);
    }
}

impl GlContext for HeadlessContext {
    fn create_shader(&self, stage: ShaderStage) -> u32 {
        let mut state = self.state.borrow_mut();
        let handle = state.alloc();
        state.shaders.insert(
            handle,
            ShaderObject {
                stage,
                compiled: false,
                uniforms: Vec::new(),
                log: String::new(),
            },
        );
        state.record(format!("create_shader({}) -> {}", stage, handle));
        handle
    }

    fn shader_source(&self, shader: u32, source: &str) {
        let mut state = self.state.borrow_mut();
        // The compilation result is decided here and only reported by
        // compile_shader, like a driver that front-loads the work.
        if let Some(obj) = state.shaders.get_mut(&shader) {
            match compile(source) {
                Ok(uniforms) => {
                    obj.compiled = true;
                    obj.uniforms = uniforms;
                    obj.log.clear();
                }
                Err(log) => {
                    obj.compiled = false;
                    obj.uniforms.clear();
                    obj.log = log;
                }
            }
        }
        state.record(format!("shader_source({})", shader));
    }

    fn compile_shader(&self, shader: u32) -> bool {
        let mut state = self.state.borrow_mut();
        state.record(format!("compile_shader({})", shader));
        state
            .shaders
            .get(&shader)
            .map(|s| s.compiled)
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: u32) -> String {
        self.state
            .borrow()
            .shaders
            .get(&shader)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        state.shaders.remove(&shader);
        state.record(format!("delete_shader({})", shader));
    }

    fn create_program(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        let handle = state.alloc();
        state.programs.insert(handle, ProgramObject::default());
        state.record(format!("create_program() -> {}", handle));
        handle
    }

    fn set_program_separable(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(obj) = state.programs.get_mut(&program) {
            obj.separable = true;
        }
        state.record(format!("set_program_separable({})", program));
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(obj) = state.programs.get_mut(&program) {
            obj.attached.push(shader);
        }
        state.record(format!("attach_shader({}, {})", program, shader));
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(obj) = state.programs.get_mut(&program) {
            obj.attached.retain(|&s| s != shader);
        }
        state.record(format!("detach_shader({}, {})", program, shader));
    }

    fn attached_shaders(&self, program: u32) -> Vec<u32> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.attached.clone())
            .unwrap_or_default()
    }

    fn link_program(&self, program: u32) -> bool {
        let mut state = self.state.borrow_mut();
        state.record(format!("link_program({})", program));

        let Some(obj) = state.programs.get(&program) else {
            return false;
        };
        if obj.attached.is_empty() {
            let obj = state.programs.get_mut(&program).unwrap();
            obj.linked = false;
            obj.log = "link failed: no shader objects attached to program".to_string();
            return false;
        }

        // Gather uniform declarations from attached shader objects in
        // attach order, dropping duplicates, and hand out sequential
        // locations. Block members were already excluded at compile.
        let mut uniforms: Vec<ActiveUniform> = Vec::new();
        for shader in obj.attached.clone() {
            let Some(stage_obj) = state.shaders.get(&shader) else {
                continue;
            };
            if !stage_obj.compiled {
                let obj = state.programs.get_mut(&program).unwrap();
                obj.linked = false;
                obj.log = format!("link failed: attached shader {} is not compiled", shader);
                return false;
            }
            for decl in &stage_obj.uniforms {
                if !uniforms.iter().any(|u| u.name == decl.name) {
                    uniforms.push(ActiveUniform {
                        name: decl.name.clone(),
                        location: uniforms.len() as i32,
                    });
                }
            }
        }

        let obj = state.programs.get_mut(&program).unwrap();
        obj.linked = true;
        obj.log.clear();
        obj.uniforms = uniforms;
        true
    }

    fn validate_program(&self, program: u32) -> bool {
        let mut state = self.state.borrow_mut();
        state.record(format!("validate_program({})", program));
        let Some(obj) = state.programs.get(&program) else {
            return false;
        };
        if !obj.linked {
            let obj = state.programs.get_mut(&program).unwrap();
            obj.log = "validation failed: program is not linked".to_string();
            return false;
        }
        true
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current_program == program {
            state.current_program = 0;
        }
        state.record(format!("delete_program({})", program));
    }

    fn use_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.current_program = program;
        state.record(format!("use_program({})", program));
    }

    fn bind_attrib_location(&self, program: u32, location: u32, name: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(obj) = state.programs.get_mut(&program) {
            obj.attrib_bindings.insert(name.to_string(), location);
        }
        state.record(format!(
            "bind_attrib_location({}, {}, {:?})",
            program, location, name
        ));
    }

    fn bind_frag_data_location(&self, program: u32, location: u32, name: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(obj) = state.programs.get_mut(&program) {
            obj.frag_data_bindings.insert(name.to_string(), location);
        }
        state.record(format!(
            "bind_frag_data_location({}, {}, {:?})",
            program, location, name
        ));
    }

    fn uniform_location(&self, program: u32, name: &str) -> i32 {
        let state = self.state.borrow();
        state
            .programs
            .get(&program)
            .filter(|p| p.linked)
            .and_then(|p| p.uniforms.iter().find(|u| u.name == name))
            .map(|u| u.location)
            .unwrap_or(-1)
    }

    fn active_uniforms(&self, program: u32) -> Vec<ActiveUniform> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .filter(|p| p.linked)
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn set_uniform(&self, program: u32, location: i32, value: &UniformValue) {
        let mut state = self.state.borrow_mut();
        state.record(format!(
            "program_uniform({}, {}, {})",
            program,
            location,
            value.kind()
        ));
        // A negative location is a silent no-op, like real hardware.
        if location < 0 {
            return;
        }
        state.uniform_writes.push(UniformWrite {
            program,
            location,
            value: *value,
        });
    }

    fn create_pipeline(&self) -> u32 {
        let mut state = self.state.borrow_mut();
        let handle = state.alloc();
        state.pipelines.insert(handle, PipelineObject::default());
        state.record(format!("create_pipeline() -> {}", handle));
        handle
    }

    fn use_program_stages(&self, pipeline: u32, stages: StageMask, program: u32) {
        let mut state = self.state.borrow_mut();
        if let Some(obj) = state.pipelines.get_mut(&pipeline) {
            for stage in stages.stages() {
                obj.stages.insert(stage, program);
            }
        }
        state.record(format!(
            "use_program_stages({}, {:?}, {})",
            pipeline, stages, program
        ));
    }

    fn bind_pipeline(&self, pipeline: u32) {
        let mut state = self.state.borrow_mut();
        state.current_pipeline = pipeline;
        state.record(format!("bind_pipeline({})", pipeline));
    }

    fn validate_pipeline(&self, pipeline: u32) -> bool {
        let mut state = self.state.borrow_mut();
        state.record(format!("validate_pipeline({})", pipeline));
        let Some(obj) = state.pipelines.get(&pipeline) else {
            return false;
        };
        let missing: Vec<&str> = [
            (ShaderStage::Vertex, "vertex"),
            (ShaderStage::Fragment, "fragment"),
        ]
        .iter()
        .filter(|(stage, _)| !obj.stages.contains_key(stage))
        .map(|(_, name)| *name)
        .collect();
        if !missing.is_empty() {
            let log = format!("validation failed: no {} program bound", missing.join(" or "));
            state.pipelines.get_mut(&pipeline).unwrap().log = log;
            return false;
        }
        true
    }

    fn pipeline_info_log(&self, pipeline: u32) -> String {
        self.state
            .borrow()
            .pipelines
            .get(&pipeline)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn delete_pipeline(&self, pipeline: u32) {
        let mut state = self.state.borrow_mut();
        state.pipelines.remove(&pipeline);
        if state.current_pipeline == pipeline {
            state.current_pipeline = 0;
        }
        state.record(format!("delete_pipeline({})", pipeline));
    }

    fn poll_error(&self) -> Option<ContextError> {
        let mut state = self.state.borrow_mut();
        if state.pending_errors.is_empty() {
            None
        } else {
            Some(state.pending_errors.remove(0))
        }
    }

    fn info(&self) -> ContextInfo {
        ContextInfo {
            vendor: "glsm".to_string(),
            renderer: "headless".to_string(),
            version: "4.6 (simulated)".to_string(),
            shading_language_version: "4.60 (simulated)".to_string(),
        }
    }
}
