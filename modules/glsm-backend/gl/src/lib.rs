//! OpenGL 4.x backend.
//!
//! Implements the context trait with raw `gl` calls. Uniform sets use the
//! program-addressed `glProgramUniform*` family, so a program's uniforms
//! can be updated while a different program or pipeline is bound.
//!
//! The caller owns window and context creation; [`RawGl::load`] must run
//! once with the context current before any other call.

use std::ffi::{c_void, CStr, CString};
use std::ptr;

use gl::types::{GLchar, GLenum, GLint, GLsizei, GLuint};
use glsm_lib::{ActiveUniform, ContextError, ContextInfo, GlContext, ShaderStage, StageMask, UniformValue};

/// A live OpenGL context with its function pointers loaded.
pub struct RawGl {
    _private: (),
}

impl RawGl {
    /// Load the GL function pointers through `loader` (typically
    /// `|s| video.gl_get_proc_address(s)`) and wrap the context.
    pub fn load<F>(loader: F) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        RawGl { _private: () }
    }
}

fn gl_stage(stage: ShaderStage) -> GLenum {
    match stage {
        ShaderStage::Vertex => gl::VERTEX_SHADER,
        ShaderStage::Fragment => gl::FRAGMENT_SHADER,
        ShaderStage::Geometry => gl::GEOMETRY_SHADER,
        ShaderStage::TessControl => gl::TESS_CONTROL_SHADER,
        ShaderStage::TessEvaluation => gl::TESS_EVALUATION_SHADER,
        ShaderStage::Compute => gl::COMPUTE_SHADER,
    }
}

fn gl_stage_bits(stages: StageMask) -> GLenum {
    let mut bits = 0;
    for stage in stages.stages() {
        bits |= match stage {
            ShaderStage::Vertex => gl::VERTEX_SHADER_BIT,
            ShaderStage::Fragment => gl::FRAGMENT_SHADER_BIT,
            ShaderStage::Geometry => gl::GEOMETRY_SHADER_BIT,
            ShaderStage::TessControl => gl::TESS_CONTROL_SHADER_BIT,
            ShaderStage::TessEvaluation => gl::TESS_EVALUATION_SHADER_BIT,
            ShaderStage::Compute => gl::COMPUTE_SHADER_BIT,
        };
    }
    bits
}

fn shader_log(shader: GLuint) -> String {
    unsafe {
        let mut len: GLint = 0;
        gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        gl::GetShaderInfoLog(shader, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn program_log(program: GLuint) -> String {
    unsafe {
        let mut len: GLint = 0;
        gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
        if len <= 0 {
            return String::new();
        }
        let mut buf = vec![0u8; len as usize];
        let mut written: GLsizei = 0;
        gl::GetProgramInfoLog(program, len, &mut written, buf.as_mut_ptr() as *mut GLchar);
        buf.truncate(written.max(0) as usize);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

fn get_string(name: GLenum) -> String {
    unsafe {
        let ptr = gl::GetString(name);
        if ptr.is_null() {
            return "unknown".to_string();
        }
        CStr::from_ptr(ptr as *const GLchar)
            .to_string_lossy()
            .into_owned()
    }
}

impl GlContext for RawGl {
    fn create_shader(&self, stage: ShaderStage) -> u32 {
        unsafe { gl::CreateShader(gl_stage(stage)) }
    }

    fn shader_source(&self, shader: u32, source: &str) {
        // Length-delimited upload; the source needs no NUL terminator.
        let ptr = source.as_ptr() as *const GLchar;
        let len = source.len() as GLint;
        unsafe { gl::ShaderSource(shader, 1, &ptr, &len) }
    }

    fn compile_shader(&self, shader: u32) -> bool {
        unsafe {
            gl::CompileShader(shader);
            let mut status: GLint = 0;
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
            status != 0
        }
    }

    fn shader_info_log(&self, shader: u32) -> String {
        shader_log(shader)
    }

    fn delete_shader(&self, shader: u32) {
        unsafe { gl::DeleteShader(shader) }
    }

    fn create_program(&self) -> u32 {
        unsafe { gl::CreateProgram() }
    }

    fn set_program_separable(&self, program: u32) {
        unsafe { gl::ProgramParameteri(program, gl::PROGRAM_SEPARABLE, gl::TRUE as GLint) }
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        unsafe { gl::AttachShader(program, shader) }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        unsafe { gl::DetachShader(program, shader) }
    }

    fn attached_shaders(&self, program: u32) -> Vec<u32> {
        unsafe {
            let mut count: GLint = 0;
            gl::GetProgramiv(program, gl::ATTACHED_SHADERS, &mut count);
            if count <= 0 {
                return Vec::new();
            }
            let mut shaders = vec![0 as GLuint; count as usize];
            gl::GetAttachedShaders(program, count, ptr::null_mut(), shaders.as_mut_ptr());
            shaders
        }
    }

    fn link_program(&self, program: u32) -> bool {
        unsafe {
            gl::LinkProgram(program);
            let mut status: GLint = 0;
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
            status != 0
        }
    }

    fn validate_program(&self, program: u32) -> bool {
        unsafe {
            gl::ValidateProgram(program);
            let mut status: GLint = 0;
            gl::GetProgramiv(program, gl::VALIDATE_STATUS, &mut status);
            status != 0
        }
    }

    fn program_info_log(&self, program: u32) -> String {
        program_log(program)
    }

    fn delete_program(&self, program: u32) {
        unsafe { gl::DeleteProgram(program) }
    }

    fn use_program(&self, program: u32) {
        unsafe { gl::UseProgram(program) }
    }

    fn bind_attrib_location(&self, program: u32, location: u32, name: &str) {
        let Ok(name) = CString::new(name) else { return };
        unsafe { gl::BindAttribLocation(program, location, name.as_ptr()) }
    }

    fn bind_frag_data_location(&self, program: u32, location: u32, name: &str) {
        let Ok(name) = CString::new(name) else { return };
        unsafe { gl::BindFragDataLocation(program, location, name.as_ptr()) }
    }

    fn uniform_location(&self, program: u32, name: &str) -> i32 {
        let Ok(name) = CString::new(name) else { return -1 };
        unsafe { gl::GetUniformLocation(program, name.as_ptr()) }
    }

    fn active_uniforms(&self, program: u32) -> Vec<ActiveUniform> {
        unsafe {
            let mut count: GLint = 0;
            gl::GetProgramInterfaceiv(
                program,
                gl::UNIFORM,
                gl::ACTIVE_RESOURCES,
                &mut count,
            );
            let props: [GLenum; 3] = [gl::NAME_LENGTH, gl::LOCATION, gl::BLOCK_INDEX];
            let mut uniforms = Vec::new();
            for index in 0..count.max(0) as GLuint {
                let mut results: [GLint; 3] = [0; 3];
                gl::GetProgramResourceiv(
                    program,
                    gl::UNIFORM,
                    index,
                    props.len() as GLsizei,
                    props.as_ptr(),
                    results.len() as GLsizei,
                    ptr::null_mut(),
                    results.as_mut_ptr(),
                );
                // Members of uniform blocks never land in the name table.
                if results[2] != -1 {
                    continue;
                }
                let name_len = results[0].max(1) as usize;
                let mut buf = vec![0u8; name_len];
                let mut written: GLsizei = 0;
                gl::GetProgramResourceName(
                    program,
                    gl::UNIFORM,
                    index,
                    buf.len() as GLsizei,
                    &mut written,
                    buf.as_mut_ptr() as *mut GLchar,
                );
                buf.truncate(written.max(0) as usize);
                uniforms.push(ActiveUniform {
                    name: String::from_utf8_lossy(&buf).into_owned(),
                    location: results[1],
                });
            }
            uniforms
        }
    }

    fn set_uniform(&self, program: u32, location: i32, value: &UniformValue) {
        unsafe {
            match value {
                UniformValue::Float(v) => gl::ProgramUniform1f(program, location, *v),
                UniformValue::Int(v) => gl::ProgramUniform1i(program, location, *v),
                UniformValue::UInt(v) => gl::ProgramUniform1ui(program, location, *v),
                UniformValue::Bool(v) => gl::ProgramUniform1i(program, location, *v as GLint),
                UniformValue::Vec2(v) => gl::ProgramUniform2f(program, location, v.x, v.y),
                UniformValue::Vec3(v) => gl::ProgramUniform3f(program, location, v.x, v.y, v.z),
                UniformValue::Vec4(v) => {
                    gl::ProgramUniform4f(program, location, v.x, v.y, v.z, v.w)
                }
                UniformValue::Mat3(m) => gl::ProgramUniformMatrix3fv(
                    program,
                    location,
                    1,
                    gl::FALSE,
                    m.to_cols_array().as_ptr(),
                ),
                UniformValue::Mat4(m) => gl::ProgramUniformMatrix4fv(
                    program,
                    location,
                    1,
                    gl::FALSE,
                    m.to_cols_array().as_ptr(),
                ),
            }
        }
    }

    fn create_pipeline(&self) -> u32 {
        unsafe {
            let mut pipeline: GLuint = 0;
            gl::GenProgramPipelines(1, &mut pipeline);
            pipeline
        }
    }

    fn use_program_stages(&self, pipeline: u32, stages: StageMask, program: u32) {
        unsafe { gl::UseProgramStages(pipeline, gl_stage_bits(stages), program) }
    }

    fn bind_pipeline(&self, pipeline: u32) {
        unsafe { gl::BindProgramPipeline(pipeline) }
    }

    fn validate_pipeline(&self, pipeline: u32) -> bool {
        unsafe {
            gl::ValidateProgramPipeline(pipeline);
            let mut status: GLint = 0;
            gl::GetProgramPipelineiv(pipeline, gl::VALIDATE_STATUS, &mut status);
            status != 0
        }
    }

    fn pipeline_info_log(&self, pipeline: u32) -> String {
        unsafe {
            let mut len: GLint = 0;
            gl::GetProgramPipelineiv(pipeline, gl::INFO_LOG_LENGTH, &mut len);
            if len <= 0 {
                return String::new();
            }
            let mut buf = vec![0u8; len as usize];
            let mut written: GLsizei = 0;
            gl::GetProgramPipelineInfoLog(
                pipeline,
                len,
                &mut written,
                buf.as_mut_ptr() as *mut GLchar,
            );
            buf.truncate(written.max(0) as usize);
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    fn delete_pipeline(&self, pipeline: u32) {
        unsafe { gl::DeleteProgramPipelines(1, &pipeline) }
    }

    fn poll_error(&self) -> Option<ContextError> {
        let code = unsafe { gl::GetError() };
        match code {
            gl::NO_ERROR => None,
            gl::INVALID_ENUM => Some(ContextError::InvalidEnum),
            gl::INVALID_VALUE => Some(ContextError::InvalidValue),
            gl::INVALID_OPERATION => Some(ContextError::InvalidOperation),
            gl::INVALID_FRAMEBUFFER_OPERATION => Some(ContextError::InvalidFramebufferOperation),
            gl::OUT_OF_MEMORY => Some(ContextError::OutOfMemory),
            other => Some(ContextError::Unknown(other)),
        }
    }

    fn info(&self) -> ContextInfo {
        ContextInfo {
            vendor: get_string(gl::VENDOR),
            renderer: get_string(gl::RENDERER),
            version: get_string(gl::VERSION),
            shading_language_version: get_string(gl::SHADING_LANGUAGE_VERSION),
        }
    }
}
