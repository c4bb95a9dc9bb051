//! Shader pipeline stages and the filename suffix table used to infer them.

use std::fmt;
use std::ops::BitOr;
use std::path::Path;

/// A single programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
    TessControl,
    TessEvaluation,
    Compute,
}

impl ShaderStage {
    /// All stages, in pipeline order.
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::TessControl,
        ShaderStage::TessEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    /// The mask selecting only this stage.
    pub fn mask(self) -> StageMask {
        match self {
            ShaderStage::Vertex => StageMask::VERTEX,
            ShaderStage::Fragment => StageMask::FRAGMENT,
            ShaderStage::Geometry => StageMask::GEOMETRY,
            ShaderStage::TessControl => StageMask::TESS_CONTROL,
            ShaderStage::TessEvaluation => StageMask::TESS_EVALUATION,
            ShaderStage::Compute => StageMask::COMPUTE,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
            ShaderStage::TessControl => "tess-control",
            ShaderStage::TessEvaluation => "tess-evaluation",
            ShaderStage::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// A set of pipeline stages, used when assigning a separable program to a
/// pipeline's stage slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageMask(u32);

impl StageMask {
    pub const NONE: StageMask = StageMask(0);
    pub const VERTEX: StageMask = StageMask(1 << 0);
    pub const TESS_CONTROL: StageMask = StageMask(1 << 1);
    pub const TESS_EVALUATION: StageMask = StageMask(1 << 2);
    pub const GEOMETRY: StageMask = StageMask(1 << 3);
    pub const FRAGMENT: StageMask = StageMask(1 << 4);
    pub const COMPUTE: StageMask = StageMask(1 << 5);
    pub const ALL: StageMask = StageMask(0x3f);

    pub fn contains(self, stage: ShaderStage) -> bool {
        self.0 & stage.mask().0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Stages selected by this mask, in pipeline order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl BitOr for StageMask {
    type Output = StageMask;

    fn bitor(self, rhs: StageMask) -> StageMask {
        StageMask(self.0 | rhs.0)
    }
}

impl From<ShaderStage> for StageMask {
    fn from(stage: ShaderStage) -> StageMask {
        stage.mask()
    }
}

// Recognized shader source suffixes. Longer suffixes are listed before their
// shorter tails so `.vert.glsl` wins over `.glsl`-less matching by `ends_with`.
const SUFFIXES: &[(&str, ShaderStage)] = &[
    ("_vert.glsl", ShaderStage::Vertex),
    (".vert.glsl", ShaderStage::Vertex),
    (".vert", ShaderStage::Vertex),
    (".vs", ShaderStage::Vertex),
    (".geom.glsl", ShaderStage::Geometry),
    (".geom", ShaderStage::Geometry),
    (".gs", ShaderStage::Geometry),
    (".tcs.glsl", ShaderStage::TessControl),
    (".tcs", ShaderStage::TessControl),
    (".tes.glsl", ShaderStage::TessEvaluation),
    (".tes", ShaderStage::TessEvaluation),
    ("_frag.glsl", ShaderStage::Fragment),
    (".frag.glsl", ShaderStage::Fragment),
    (".frag", ShaderStage::Fragment),
    (".fs", ShaderStage::Fragment),
    (".cs.glsl", ShaderStage::Compute),
    (".cs", ShaderStage::Compute),
];

/// Infer the shader stage from the file name suffix. Returns `None` when the
/// suffix is not in the table.
pub fn stage_from_path(path: &Path) -> Option<ShaderStage> {
    let name = path.file_name()?.to_str()?;
    SUFFIXES
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, stage)| *stage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_table() {
        let cases = [
            ("basic.vs", ShaderStage::Vertex),
            ("basic.vert", ShaderStage::Vertex),
            ("basic_vert.glsl", ShaderStage::Vertex),
            ("basic.vert.glsl", ShaderStage::Vertex),
            ("basic.gs", ShaderStage::Geometry),
            ("basic.geom", ShaderStage::Geometry),
            ("basic.geom.glsl", ShaderStage::Geometry),
            ("basic.tcs", ShaderStage::TessControl),
            ("basic.tcs.glsl", ShaderStage::TessControl),
            ("basic.tes", ShaderStage::TessEvaluation),
            ("basic.tes.glsl", ShaderStage::TessEvaluation),
            ("basic.fs", ShaderStage::Fragment),
            ("basic.frag", ShaderStage::Fragment),
            ("basic_frag.glsl", ShaderStage::Fragment),
            ("basic.frag.glsl", ShaderStage::Fragment),
            ("basic.cs", ShaderStage::Compute),
            ("basic.cs.glsl", ShaderStage::Compute),
        ];
        for (name, stage) in cases {
            assert_eq!(stage_from_path(Path::new(name)), Some(stage), "{}", name);
        }
    }

    #[test]
    fn unknown_suffixes() {
        for name in ["basic.glsl", "basic.txt", "basic", "basic.vsx"] {
            assert_eq!(stage_from_path(Path::new(name)), None, "{}", name);
        }
    }

    #[test]
    fn mask_composition() {
        let mask = StageMask::VERTEX | StageMask::FRAGMENT;
        assert!(mask.contains(ShaderStage::Vertex));
        assert!(mask.contains(ShaderStage::Fragment));
        assert!(!mask.contains(ShaderStage::Geometry));
        assert_eq!(mask.stages().count(), 2);
        assert!(StageMask::NONE.is_empty());
    }
}
