//! Lifecycle, uniform cache, and pipeline behavior against the headless
//! context.

use glam::{Mat4, Vec3};
use glsm_backend_headless::HeadlessContext;
use glsm_lib::{Error, ShaderManager, ShaderStage, StageMask};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manager() -> ShaderManager<HeadlessContext> {
    init_logger();
    ShaderManager::new(HeadlessContext::new())
}

const PASSTHROUGH_VERT: &str = r#"#version 460
layout(location = 0) in vec3 VertexPosition;
uniform mat4 MVP;
void main() {
    gl_Position = MVP * vec4(VertexPosition, 1.0);
}"#;

const SOLID_FRAG: &str = r#"#version 460
out vec4 FragColor;
void main() {
    FragColor = vec4(1.0, 0.0, 1.0, 1.0);
}"#;

const UNIFORMS_FRAG: &str = r#"#version 460
uniform float floatA;
uniform vec3 vec3B;
uniform mat4 mat4C;
out vec4 FragColor;
void main() {
    FragColor = mat4C * vec4(vec3B * floatA, 1.0);
}"#;

const BROKEN_FRAG: &str = r#"#version 460
out vec4 FragColor;
void main() {
    FragColor = vec4(1.0);
"#;

#[test]
fn compile_infers_stage_from_suffix() {
    let dir = std::env::temp_dir().join("glsm-suffix-test");
    std::fs::create_dir_all(&dir).unwrap();
    let vert = dir.join("basic.vert");
    let frag = dir.join("basic_frag.glsl");
    std::fs::write(&vert, PASSTHROUGH_VERT).unwrap();
    std::fs::write(&frag, SOLID_FRAG).unwrap();

    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_file(prog, &vert).unwrap();
    mgr.compile_file(prog, &frag).unwrap();

    let handle = mgr.program_handle(prog).unwrap();
    assert_eq!(mgr.gl().attached_count(handle), 2);
    let calls = mgr.gl().calls();
    assert!(calls.iter().any(|c| c.contains("create_shader(vertex)")));
    assert!(calls.iter().any(|c| c.contains("create_shader(fragment)")));
}

#[test]
fn unknown_extension_is_reported_and_leaves_program_untouched() {
    let dir = std::env::temp_dir().join("glsm-unknown-ext-test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("basic.hlsl");
    std::fs::write(&path, SOLID_FRAG).unwrap();

    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    let err = mgr.compile_file(prog, &path).unwrap_err();
    assert!(matches!(err, Error::UnknownExtension(_)), "{}", err);

    let handle = mgr.program_handle(prog).unwrap();
    assert_eq!(mgr.gl().attached_count(handle), 0);
}

#[test]
fn missing_file_is_a_distinct_error() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    let err = mgr
        .compile_file(prog, "no/such/dir/basic.vert")
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{}", err);
}

#[test]
fn compile_failure_carries_log_and_attaches_nothing() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    let err = mgr
        .compile_source(prog, BROKEN_FRAG, ShaderStage::Fragment, "broken.frag")
        .unwrap_err();
    match &err {
        Error::Compile { name, log } => {
            assert_eq!(name, "broken.frag");
            assert!(log.contains("error"), "{}", log);
        }
        other => panic!("expected compile error, got {}", other),
    }

    let handle = mgr.program_handle(prog).unwrap();
    assert_eq!(mgr.gl().attached_count(handle), 0);
    // The rejected shader object was deleted, not leaked.
    assert_eq!(mgr.gl().live_shaders(), 0);
}

#[test]
fn link_detaches_and_deletes_shader_objects() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.compile_source(prog, SOLID_FRAG, ShaderStage::Fragment, "test.frag")
        .unwrap();
    assert_eq!(mgr.gl().live_shaders(), 2);

    mgr.link(prog).unwrap();
    assert!(mgr.is_linked(prog).unwrap());

    let handle = mgr.program_handle(prog).unwrap();
    assert_eq!(mgr.gl().attached_count(handle), 0);
    assert_eq!(mgr.gl().live_shaders(), 0);
}

#[test]
fn link_twice_is_a_no_op() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.link(prog).unwrap();

    let links_before = mgr
        .gl()
        .calls()
        .iter()
        .filter(|c| c.starts_with("link_program"))
        .count();
    mgr.link(prog).unwrap();
    let links_after = mgr
        .gl()
        .calls()
        .iter()
        .filter(|c| c.starts_with("link_program"))
        .count();
    assert_eq!(links_before, links_after);
}

#[test]
fn link_failure_with_no_attached_shaders() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    let err = mgr.link(prog).unwrap_err();
    match err {
        Error::Link { log } => assert!(log.contains("no shader objects attached"), "{}", log),
        other => panic!("expected link error, got {}", other),
    }
    assert!(!mgr.is_linked(prog).unwrap());
}

#[test]
fn compile_after_link_does_not_corrupt_uniform_cache() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.link(prog).unwrap();
    let before = mgr.uniform_location(prog, "MVP").unwrap();
    assert!(before >= 0);

    // New source after link: attached, but never takes effect because the
    // manager never relinks a linked program.
    mgr.compile_source(prog, UNIFORMS_FRAG, ShaderStage::Fragment, "late.frag")
        .unwrap();
    mgr.link(prog).unwrap();
    assert_eq!(mgr.uniform_location(prog, "MVP").unwrap(), before);
    mgr.set_uniform(prog, "MVP", Mat4::IDENTITY).unwrap();
}

#[test]
fn uniform_cache_is_stable_across_lookups() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.compile_source(prog, UNIFORMS_FRAG, ShaderStage::Fragment, "test.frag")
        .unwrap();
    mgr.link(prog).unwrap();

    for name in ["floatA", "vec3B", "mat4C"] {
        let first = mgr.uniform_location(prog, name).unwrap();
        assert!(first >= 0, "{} not resolved", name);
        for _ in 0..3 {
            assert_eq!(mgr.uniform_location(prog, name).unwrap(), first, "{}", name);
        }
    }

    mgr.set_uniform(prog, "floatA", 2.0_f32).unwrap();
    mgr.set_uniform(prog, "vec3B", Vec3::ONE).unwrap();
    mgr.set_uniform(prog, "mat4C", Mat4::IDENTITY).unwrap();

    let handle = mgr.program_handle(prog).unwrap();
    let writes = mgr.gl().uniform_writes(handle);
    assert_eq!(writes.len(), 3);
    let float_a = mgr.uniform_location(prog, "floatA").unwrap();
    assert_eq!(writes[0].location, float_a);
}

#[test]
fn uniform_not_found_is_cached_and_non_fatal() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.link(prog).unwrap();

    let loc = mgr.uniform_location(prog, "NoSuchUniform").unwrap();
    assert!(loc < 0);
    // Set is a logged no-op; the frame goes on.
    mgr.set_uniform(prog, "NoSuchUniform", 1.0_f32).unwrap();
    assert_eq!(mgr.uniform_location(prog, "NoSuchUniform").unwrap(), loc);

    let handle = mgr.program_handle(prog).unwrap();
    assert!(mgr.gl().uniform_writes(handle).is_empty());
}

#[test]
fn set_uniform_requires_link() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    let err = mgr.set_uniform(prog, "MVP", Mat4::IDENTITY).unwrap_err();
    assert!(matches!(err, Error::NotLinked));
}

#[test]
fn validate_requires_link() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    assert!(matches!(mgr.validate(prog), Err(Error::NotLinked)));
    assert!(matches!(mgr.use_program(prog), Err(Error::NotLinked)));
}

#[test]
fn end_to_end_program_lifecycle() {
    let dir = std::env::temp_dir().join("glsm-e2e-test");
    std::fs::create_dir_all(&dir).unwrap();
    let vert = dir.join("test.vert");
    let frag = dir.join("test.frag");
    std::fs::write(&vert, PASSTHROUGH_VERT).unwrap();
    std::fs::write(&frag, SOLID_FRAG).unwrap();

    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_file(prog, &vert).unwrap();
    mgr.compile_file(prog, &frag).unwrap();
    mgr.link(prog).unwrap();
    mgr.validate(prog).unwrap();
    mgr.use_program(prog).unwrap();

    mgr.set_uniform(prog, "MVP", Mat4::IDENTITY).unwrap();
    let loc = mgr.uniform_location(prog, "MVP").unwrap();
    assert!(loc >= 0);
    assert_eq!(mgr.uniform_location(prog, "MVP").unwrap(), loc);

    let handle = mgr.program_handle(prog).unwrap();
    let writes = mgr.gl().uniform_writes(handle);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].location, loc);
}

#[test]
fn end_to_end_compile_failure_leaves_program_unlinked() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    let err = mgr
        .compile_source(prog, BROKEN_FRAG, ShaderStage::Fragment, "broken.frag")
        .unwrap_err();
    assert!(matches!(err, Error::Compile { .. }));

    let err = mgr.link(prog).unwrap_err();
    match err {
        Error::Link { log } => assert!(log.contains("no shader objects attached"), "{}", log),
        other => panic!("expected link error, got {}", other),
    }
    assert!(!mgr.is_linked(prog).unwrap());
}

#[test]
fn eager_uniform_extraction_matches_lazy_lookup() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.compile_source(prog, UNIFORMS_FRAG, ShaderStage::Fragment, "test.frag")
        .unwrap();
    mgr.link(prog).unwrap();
    mgr.cache_active_uniforms(prog).unwrap();

    // Cached locations must agree with what the context reports live.
    let handle = mgr.program_handle(prog).unwrap();
    for name in ["MVP", "floatA", "vec3B", "mat4C"] {
        use glsm_lib::GlContext;
        let live = mgr.gl().uniform_location(handle, name);
        assert_eq!(mgr.uniform_location(prog, name).unwrap(), live, "{}", name);
    }
}

#[test]
fn destroyed_program_reports_unknown() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    mgr.compile_source(prog, PASSTHROUGH_VERT, ShaderStage::Vertex, "test.vert")
        .unwrap();
    mgr.destroy_program(prog).unwrap();
    assert!(matches!(mgr.link(prog), Err(Error::UnknownProgram)));
    assert_eq!(mgr.gl().live_programs(), 0);
    assert_eq!(mgr.gl().live_shaders(), 0);
}

#[test]
fn pipeline_stage_swap_uses_most_recent_program() {
    let mut mgr = manager();

    let vert_a = mgr.create_program().unwrap();
    mgr.compile_source(
        vert_a,
        "#version 460\nuniform float StaticScale;\nvoid main() {}\n",
        ShaderStage::Vertex,
        "static.vert",
    )
    .unwrap();
    mgr.link(vert_a).unwrap();

    let vert_b = mgr.create_program().unwrap();
    mgr.compile_source(
        vert_b,
        "#version 460\nuniform float WaveTime;\nvoid main() {}\n",
        ShaderStage::Vertex,
        "wave.vert",
    )
    .unwrap();
    mgr.link(vert_b).unwrap();

    let frag = mgr.create_program().unwrap();
    mgr.compile_source(frag, SOLID_FRAG, ShaderStage::Fragment, "shared.frag")
        .unwrap();
    mgr.link(frag).unwrap();

    let pipeline = mgr.create_pipeline().unwrap();
    mgr.use_program_stages(pipeline, StageMask::FRAGMENT, frag)
        .unwrap();

    let handle_a = mgr.program_handle(vert_a).unwrap();
    let handle_b = mgr.program_handle(vert_b).unwrap();

    mgr.use_program_stages(pipeline, StageMask::VERTEX, vert_a)
        .unwrap();
    let last_assignment = mgr
        .gl()
        .calls()
        .iter()
        .rev()
        .find(|c| c.starts_with("use_program_stages"))
        .cloned()
        .unwrap();
    assert!(
        last_assignment.ends_with(&format!(", {})", handle_a)),
        "{}",
        last_assignment
    );

    assert_eq!(
        mgr.pipeline_stage(pipeline, ShaderStage::Vertex).unwrap(),
        Some(vert_a)
    );

    // Swap: B replaces A; F stays. Repeatable with no accumulated state.
    for _ in 0..2 {
        mgr.use_program_stages(pipeline, StageMask::VERTEX, vert_b)
            .unwrap();
        assert_eq!(
            mgr.pipeline_stage(pipeline, ShaderStage::Vertex).unwrap(),
            Some(vert_b)
        );
        assert_eq!(
            mgr.pipeline_stage(pipeline, ShaderStage::Fragment).unwrap(),
            Some(frag)
        );
        mgr.use_program_stages(pipeline, StageMask::VERTEX, vert_a)
            .unwrap();
        assert_eq!(
            mgr.pipeline_stage(pipeline, ShaderStage::Vertex).unwrap(),
            Some(vert_a)
        );
    }

    // Program-addressed uniforms land on the right program while the
    // pipeline is bound, no matter which vertex program fills the slot.
    mgr.bind_pipeline(pipeline).unwrap();
    assert_eq!(mgr.gl().current_program(), 0);
    mgr.use_program_stages(pipeline, StageMask::VERTEX, vert_b)
        .unwrap();
    mgr.set_uniform(vert_b, "WaveTime", 0.5_f32).unwrap();
    mgr.set_uniform(vert_a, "StaticScale", 2.0_f32).unwrap();
    assert_eq!(mgr.gl().uniform_writes(handle_b).len(), 1);
    assert_eq!(mgr.gl().uniform_writes(handle_a).len(), 1);

    mgr.validate_pipeline(pipeline).unwrap();
}

#[test]
fn pipeline_validation_reports_missing_stages() {
    let mut mgr = manager();
    let pipeline = mgr.create_pipeline().unwrap();
    let err = mgr.validate_pipeline(pipeline).unwrap_err();
    match err {
        Error::ValidatePipeline { log } => {
            assert!(log.contains("no vertex or fragment program bound"), "{}", log)
        }
        other => panic!("expected pipeline validation error, got {}", other),
    }
}

#[test]
fn unlinked_program_cannot_fill_a_pipeline_stage() {
    let mut mgr = manager();
    let prog = mgr.create_program().unwrap();
    let pipeline = mgr.create_pipeline().unwrap();
    let err = mgr
        .use_program_stages(pipeline, StageMask::VERTEX, prog)
        .unwrap_err();
    assert!(matches!(err, Error::NotLinked));
}

#[test]
fn side_channel_errors_are_logged_not_raised() {
    use glsm_lib::{check_errors, ContextError};

    let mgr = manager();
    mgr.gl().inject_error(ContextError::InvalidOperation);
    assert!(check_errors(mgr.gl()));
    assert!(!check_errors(mgr.gl()));
}
