//! A deliberately small GLSL front end.
//!
//! Enough syntax checking to produce believable compiler logs for broken
//! source, plus uniform declaration extraction with uniform-block members
//! excluded (block members are addressed through block bindings, never
//! through the per-name location table).

/// A default-block uniform declaration found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: String,
}

/// "Compile" shader source: check it for gross syntax errors and collect
/// its default-block uniform declarations. Returns the info log on failure.
pub fn compile(source: &str) -> Result<Vec<UniformDecl>, String> {
    let mut depth: i32 = 0;
    let mut uniforms = Vec::new();

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = strip_comment(line);
        let trimmed = line.trim();
        let depth_before = depth;

        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("0({}) : error : unmatched '}}'", line_no));
                    }
                }
                _ => {}
            }
        }

        if let Some(rest) = trimmed.strip_prefix("uniform ") {
            // Declarations inside any braces are block members (or locals in
            // malformed source) and never reach the default block. A line
            // that opens a brace is an interface block header itself.
            if depth_before > 0 || trimmed.contains('{') {
                continue;
            }
            if let Some(decl) = parse_declaration(rest) {
                uniforms.push(decl);
            } else {
                return Err(format!(
                    "0({}) : error : malformed uniform declaration",
                    line_no
                ));
            }
        }
    }

    if depth != 0 {
        return Err("0(?) : error : syntax error, unexpected end of source".to_string());
    }
    if !source.contains("void main") {
        return Err("0(?) : error : no entry point 'main' defined".to_string());
    }
    Ok(uniforms)
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Parse `<type> <name>[...];` after the `uniform` keyword.
fn parse_declaration(rest: &str) -> Option<UniformDecl> {
    let rest = rest.trim_end().strip_suffix(';')?;
    let mut parts = rest.split_whitespace();
    let _ty = parts.next()?;
    let name = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    // Array declarations resolve to the name of element zero.
    let name = match name.find('[') {
        Some(pos) => format!("{}[0]", &name[..pos]),
        None => name.to_string(),
    };
    Some(UniformDecl { name })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_VERT: &str = r#"#version 460
uniform mat4 MVP;
void main() {
    gl_Position = MVP * vec4(0.0);
}"#;

    #[test]
    fn accepts_minimal_source() {
        let uniforms = compile(MINIMAL_VERT).unwrap();
        assert_eq!(uniforms, vec![UniformDecl { name: "MVP".into() }]);
    }

    #[test]
    fn rejects_unbalanced_braces() {
        let log = compile("void main() {").unwrap_err();
        assert!(log.contains("syntax error"), "{}", log);
    }

    #[test]
    fn rejects_missing_entry_point() {
        let log = compile("uniform float x;").unwrap_err();
        assert!(log.contains("no entry point"), "{}", log);
    }

    #[test]
    fn skips_block_members() {
        let source = r#"
uniform Matrices {
    mat4 view;
    mat4 projection;
};
uniform vec3 Color;
void main() {}
"#;
        let uniforms = compile(source).unwrap();
        assert_eq!(uniforms, vec![UniformDecl { name: "Color".into() }]);
    }

    #[test]
    fn array_uniform_reports_element_zero() {
        let source = "uniform vec4 Lights[3];\nvoid main() {}";
        let uniforms = compile(source).unwrap();
        assert_eq!(uniforms[0].name, "Lights[0]");
    }
}
