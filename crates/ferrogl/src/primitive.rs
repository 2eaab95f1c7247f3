//! Draw modes and the topology rules that relate them to geometry shaders.

/// Primitive mode of a draw call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    LinesAdjacency,
    LineStripAdjacency,
    TrianglesAdjacency,
    TriangleStripAdjacency,
    Patches,
}

/// Primitive family: what a geometry shader receives per invocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LinesAdjacency,
    Triangles,
    TrianglesAdjacency,
    Patches,
}

impl Primitive {
    pub const fn gl_enum(self) -> u32 {
        match self {
            Primitive::Points => glow::POINTS,
            Primitive::Lines => glow::LINES,
            Primitive::LineStrip => glow::LINE_STRIP,
            Primitive::LineLoop => glow::LINE_LOOP,
            Primitive::Triangles => glow::TRIANGLES,
            Primitive::TriangleStrip => glow::TRIANGLE_STRIP,
            Primitive::TriangleFan => glow::TRIANGLE_FAN,
            Primitive::LinesAdjacency => glow::LINES_ADJACENCY,
            Primitive::LineStripAdjacency => glow::LINE_STRIP_ADJACENCY,
            Primitive::TrianglesAdjacency => glow::TRIANGLES_ADJACENCY,
            Primitive::TriangleStripAdjacency => glow::TRIANGLE_STRIP_ADJACENCY,
            Primitive::Patches => glow::PATCHES,
        }
    }

    pub fn from_gl(mode: u32) -> Option<Self> {
        Some(match mode {
            glow::POINTS => Primitive::Points,
            glow::LINES => Primitive::Lines,
            glow::LINE_STRIP => Primitive::LineStrip,
            glow::LINE_LOOP => Primitive::LineLoop,
            glow::TRIANGLES => Primitive::Triangles,
            glow::TRIANGLE_STRIP => Primitive::TriangleStrip,
            glow::TRIANGLE_FAN => Primitive::TriangleFan,
            glow::LINES_ADJACENCY => Primitive::LinesAdjacency,
            glow::LINE_STRIP_ADJACENCY => Primitive::LineStripAdjacency,
            glow::TRIANGLES_ADJACENCY => Primitive::TrianglesAdjacency,
            glow::TRIANGLE_STRIP_ADJACENCY => Primitive::TriangleStripAdjacency,
            glow::PATCHES => Primitive::Patches,
            _ => return None,
        })
    }

    pub fn topology(self) -> Topology {
        match self {
            Primitive::Points => Topology::Points,
            Primitive::Lines | Primitive::LineStrip | Primitive::LineLoop => Topology::Lines,
            Primitive::Triangles | Primitive::TriangleStrip | Primitive::TriangleFan => Topology::Triangles,
            Primitive::LinesAdjacency | Primitive::LineStripAdjacency => Topology::LinesAdjacency,
            Primitive::TrianglesAdjacency | Primitive::TriangleStripAdjacency => Topology::TrianglesAdjacency,
            Primitive::Patches => Topology::Patches,
        }
    }

    /// Whether drawing with `self` can feed a geometry shader declared with
    /// `input`.
    pub fn feeds(self, input: Primitive) -> bool {
        self.topology() == input.topology()
    }

    /// Transform feedback primitive captured when `self` is the last
    /// primitive reaching the rasterizer stage. `None` for patches.
    pub(crate) fn feedback_primitive(self) -> Option<u32> {
        match self.topology() {
            Topology::Points => Some(glow::POINTS),
            Topology::Lines | Topology::LinesAdjacency => Some(glow::LINES),
            Topology::Triangles | Topology::TrianglesAdjacency => Some(glow::TRIANGLES),
            Topology::Patches => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fans_feed_triangle_inputs() {
        assert!(Primitive::TriangleFan.feeds(Primitive::Triangles));
        assert!(Primitive::LineLoop.feeds(Primitive::Lines));
        assert!(!Primitive::Lines.feeds(Primitive::Triangles));
        assert!(!Primitive::Triangles.feeds(Primitive::TrianglesAdjacency));
        assert!(Primitive::TriangleStripAdjacency.feeds(Primitive::TrianglesAdjacency));
    }

    #[test]
    fn native_enums_round_trip() {
        for mode in [Primitive::Points, Primitive::LineStripAdjacency, Primitive::Patches] {
            assert_eq!(Primitive::from_gl(mode.gl_enum()), Some(mode));
        }
        assert_eq!(Primitive::from_gl(0xdead), None);
    }

    #[test]
    fn feedback_collapses_to_basic_primitives() {
        assert_eq!(Primitive::LineStrip.feedback_primitive(), Some(glow::LINES));
        assert_eq!(Primitive::TrianglesAdjacency.feedback_primitive(), Some(glow::TRIANGLES));
        assert_eq!(Primitive::Patches.feedback_primitive(), None);
    }
}
