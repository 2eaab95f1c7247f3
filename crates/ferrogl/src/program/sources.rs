/// A programmable pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
}

impl Stage {
    /// Pipeline order.
    pub const ALL: [Stage; 5] =
        [Stage::Vertex, Stage::TessControl, Stage::TessEvaluation, Stage::Geometry, Stage::Fragment];

    pub const fn gl_enum(self) -> u32 {
        match self {
            Stage::Vertex => glow::VERTEX_SHADER,
            Stage::TessControl => glow::TESS_CONTROL_SHADER,
            Stage::TessEvaluation => glow::TESS_EVALUATION_SHADER,
            Stage::Geometry => glow::GEOMETRY_SHADER,
            Stage::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    /// Title used in compiler diagnostics.
    pub const fn title(self) -> &'static str {
        match self {
            Stage::Vertex => "vertex_shader",
            Stage::TessControl => "tess_control_shader",
            Stage::TessEvaluation => "tess_evaluation_shader",
            Stage::Geometry => "geometry_shader",
            Stage::Fragment => "fragment_shader",
        }
    }
}

/// How captured varyings are laid out across transform feedback buffers.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum CaptureMode {
    /// Every varying goes to the first buffer, one record per vertex.
    #[default]
    Interleaved,
    /// Varying `i` goes to buffer `i`.
    Separate,
}

impl CaptureMode {
    pub(crate) fn gl_enum(self) -> u32 {
        match self {
            CaptureMode::Interleaved => glow::INTERLEAVED_ATTRIBS,
            CaptureMode::Separate => glow::SEPARATE_ATTRIBS,
        }
    }
}

/// Stage sources and transform feedback declarations for one program.
///
/// A program without a fragment stage is a transform program: it only runs
/// vertex processing, normally to capture varyings.
///
/// ```rust
/// use ferrogl::{CaptureMode, ShaderSources};
///
/// let sources = ShaderSources::new("void main() {}")
///     .varyings(&["out_pos"])
///     .capture(CaptureMode::Separate);
/// assert!(sources.is_transform());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: Option<String>,
    pub geometry: Option<String>,
    pub tess_control: Option<String>,
    pub tess_evaluation: Option<String>,
    pub varyings: Vec<String>,
    pub capture: CaptureMode,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>) -> Self {
        Self { vertex: vertex.into(), ..Default::default() }
    }

    pub fn fragment(mut self, source: impl Into<String>) -> Self {
        self.fragment = Some(source.into());
        self
    }

    pub fn geometry(mut self, source: impl Into<String>) -> Self {
        self.geometry = Some(source.into());
        self
    }

    pub fn tessellation(mut self, control: impl Into<String>, evaluation: impl Into<String>) -> Self {
        self.tess_control = Some(control.into());
        self.tess_evaluation = Some(evaluation.into());
        self
    }

    pub fn varyings(mut self, names: &[&str]) -> Self {
        self.varyings = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn capture(mut self, mode: CaptureMode) -> Self {
        self.capture = mode;
        self
    }

    /// Source of `stage`; empty sources count as absent.
    pub fn source(&self, stage: Stage) -> Option<&str> {
        let source = match stage {
            Stage::Vertex => Some(self.vertex.as_str()),
            Stage::TessControl => self.tess_control.as_deref(),
            Stage::TessEvaluation => self.tess_evaluation.as_deref(),
            Stage::Geometry => self.geometry.as_deref(),
            Stage::Fragment => self.fragment.as_deref(),
        };
        source.filter(|s| !s.trim().is_empty())
    }

    /// Present stages in pipeline order.
    pub fn stages(&self) -> impl Iterator<Item = (Stage, &str)> + '_ {
        Stage::ALL.into_iter().filter_map(|stage| self.source(stage).map(|s| (stage, s)))
    }

    pub fn is_transform(&self) -> bool {
        self.source(Stage::Fragment).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_pipeline_order() {
        let sources = ShaderSources::new("vs").fragment("fs").geometry("gs");
        let stages: Vec<Stage> = sources.stages().map(|(s, _)| s).collect();
        assert_eq!(stages, vec![Stage::Vertex, Stage::Geometry, Stage::Fragment]);
    }

    #[test]
    fn blank_sources_are_absent() {
        let sources = ShaderSources::new("vs").fragment("  \n");
        assert!(sources.is_transform());
        assert_eq!(sources.stages().count(), 1);
    }
}
