//! Declaration scanner standing in for the GLSL compiler and linker.
//!
//! It does not understand expressions. It reads top-level declarations
//! (`in`/`out`/`uniform`, uniform blocks, geometry layouts, subroutines) and
//! counts identifier uses, which is enough to answer every reflection query
//! the object layer makes.

use std::collections::HashSet;

use crate::gl::ActiveInfo;
use crate::program::types::{self, GlType};

// ── compiled interface ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct Decl {
    pub name: String,
    pub ty: &'static GlType,
    /// Array length; 1 for non-arrays.
    pub len: i32,
    pub location: Option<i32>,
}

#[derive(Debug, Clone)]
pub(crate) struct Block {
    pub name: String,
    pub members: Vec<Decl>,
    pub binding: Option<u32>,
}

/// What one compiled shader stage declares.
#[derive(Debug, Clone, Default)]
pub(crate) struct Interface {
    pub inputs: Vec<Decl>,
    pub outputs: Vec<Decl>,
    /// Default-block uniforms that are actually referenced.
    pub uniforms: Vec<Decl>,
    pub blocks: Vec<Block>,
    pub geometry_input: Option<u32>,
    pub geometry_output: Option<(u32, i32)>,
    pub subroutines: Vec<String>,
    pub subroutine_uniforms: Vec<String>,
}

// ── tokenizer ─────────────────────────────────────────────────────────────

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        let next = chars.peek().copied();
        match (c, next) {
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if c == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

fn tokenize(source: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    for (index, line) in strip_comments(source).lines().enumerate() {
        let trimmed = line.trim();
        if let Some(directive) = trimmed.strip_prefix('#') {
            if directive.trim_start().starts_with("error") {
                return Err(format!("0:{}: error: {}", index + 1, trimmed));
            }
            continue;
        }
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_ascii_whitespace() {
                i += 1;
            } else if c.is_ascii_alphanumeric() || c == b'_' {
                let start = i;
                let numeric = c.is_ascii_digit();
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric()
                        || bytes[i] == b'_'
                        || (numeric && bytes[i] == b'.'))
                {
                    i += 1;
                }
                tokens.push(line[start..i].to_string());
            } else {
                tokens.push((c as char).to_string());
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn is_ident(token: &str) -> bool {
    token
        .bytes()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == b'_')
}

fn matching_brace(tokens: &[String], open: usize) -> Result<usize, String> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token.as_str() {
            "{" => depth += 1,
            "}" => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => {}
        }
    }
    Err("0:0: error: unbalanced braces".to_string())
}

// ── declarations ──────────────────────────────────────────────────────────

type Qualifier<'a> = (&'a str, Option<i64>);

/// Splits a leading `layout(...)` off a statement.
fn split_layout<'a>(stmt: &'a [&'a str]) -> (Vec<Qualifier<'a>>, &'a [&'a str]) {
    if stmt.len() < 2 || stmt[0] != "layout" || stmt[1] != "(" {
        return (Vec::new(), stmt);
    }
    let Some(close) = stmt.iter().position(|t| *t == ")") else {
        return (Vec::new(), stmt);
    };
    let qualifiers = stmt[2..close]
        .split(|t| *t == ",")
        .filter_map(|q| match q {
            [name] => Some((*name, None)),
            [name, "=", value] => Some((*name, value.parse().ok())),
            _ => None,
        })
        .collect();
    (qualifiers, &stmt[close + 1..])
}

fn qualifier(qualifiers: &[Qualifier<'_>], name: &str) -> Option<i64> {
    qualifiers.iter().find(|(q, _)| *q == name).and_then(|(_, v)| *v)
}

const IGNORED_QUALIFIERS: &[&str] = &[
    "flat", "smooth", "noperspective", "centroid", "invariant", "highp", "mediump", "lowp",
    "patch", "sample",
];

/// Parses `type name[N], other;` into declarations. Unknown types are skipped.
fn parse_vars(rest: &[&str], location: Option<i32>) -> Vec<Decl> {
    let Some((ty_name, names)) = rest.split_first() else {
        return Vec::new();
    };
    let Some(ty) = types::by_glsl_name(ty_name) else {
        return Vec::new();
    };
    let mut next_location = location;
    let mut decls = Vec::new();
    for part in names.split(|t| *t == ",") {
        let Some(name) = part.first().filter(|n| is_ident(n)) else {
            continue;
        };
        let len = match part {
            [_, "[", n, "]", ..] => n.parse().unwrap_or(1),
            _ => 1,
        };
        decls.push(Decl { name: name.to_string(), ty, len, location: next_location });
        next_location = next_location.map(|l| l + len * ty.columns as i32);
    }
    decls
}

fn geometry_input(name: &str) -> Option<u32> {
    Some(match name {
        "points" => glow::POINTS,
        "lines" => glow::LINES,
        "lines_adjacency" => glow::LINES_ADJACENCY,
        "triangles" => glow::TRIANGLES,
        "triangles_adjacency" => glow::TRIANGLES_ADJACENCY,
        _ => return None,
    })
}

fn geometry_output(name: &str) -> Option<u32> {
    Some(match name {
        "points" => glow::POINTS,
        "line_strip" => glow::LINE_STRIP,
        "triangle_strip" => glow::TRIANGLE_STRIP,
        _ => return None,
    })
}

fn declare(stmt: &[&str], iface: &mut Interface) {
    let (qualifiers, rest) = split_layout(stmt);
    let rest: Vec<&str> = rest
        .iter()
        .copied()
        .filter(|t| !IGNORED_QUALIFIERS.contains(t))
        .collect();
    let Some((storage, tail)) = rest.split_first() else {
        return;
    };

    match *storage {
        "subroutine" => {
            if let ["uniform", _, name, ..] = tail {
                iface.subroutine_uniforms.push(name.to_string());
            }
        }
        "in" | "attribute" if tail.is_empty() => {
            iface.geometry_input = qualifiers.iter().find_map(|(q, _)| geometry_input(q));
        }
        "out" if tail.is_empty() => {
            let prim = qualifiers.iter().find_map(|(q, _)| geometry_output(q));
            let max = qualifier(&qualifiers, "max_vertices").unwrap_or(0) as i32;
            iface.geometry_output = prim.map(|p| (p, max));
        }
        "in" | "attribute" => {
            let location = qualifier(&qualifiers, "location").map(|l| l as i32);
            iface.inputs.extend(parse_vars(tail, location));
        }
        "out" | "varying" => iface.outputs.extend(parse_vars(tail, None)),
        "uniform" => iface.uniforms.extend(parse_vars(tail, None)),
        _ => {}
    }
}

fn parse_block(head: &[&str], body: &[String]) -> Option<Block> {
    let (qualifiers, rest) = split_layout(head);
    let name = match rest {
        ["uniform", name] => name.to_string(),
        _ => return None,
    };
    let mut members = Vec::new();
    let body: Vec<&str> = body.iter().map(String::as_str).collect();
    for member in body.split(|t| *t == ";") {
        let (_, member) = split_layout(member);
        members.extend(parse_vars(member, None));
    }
    let binding = qualifier(&qualifiers, "binding").map(|b| b as u32);
    Some(Block { name, members, binding })
}

/// Name of a `subroutine(Type) ret name(...)` definition.
fn subroutine_function(head: &[&str]) -> Option<String> {
    let (_, rest) = split_layout(head);
    if rest.first() != Some(&"subroutine") || rest.get(1) != Some(&"(") {
        return None;
    }
    let close = rest.iter().position(|t| *t == ")")?;
    let open = close + 1 + rest[close + 1..].iter().position(|t| *t == "(")?;
    rest.get(open - 1).map(|name| name.to_string())
}

/// "Compiles" one stage. The error string is the driver info log.
pub(crate) fn compile(source: &str) -> Result<Interface, String> {
    let tokens = tokenize(source)?;
    if !tokens.windows(3).any(|w| w[0] == "void" && w[1] == "main" && w[2] == "(") {
        return Err("0:1: error: missing entry point 'void main()'".to_string());
    }

    let mut iface = Interface::default();
    let mut stmt: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            ";" => {
                declare(&stmt, &mut iface);
                stmt.clear();
            }
            "{" => {
                let end = matching_brace(&tokens, i)?;
                if let Some(block) = parse_block(&stmt, &tokens[i + 1..end]) {
                    iface.blocks.push(block);
                    // skip the optional instance name
                    i = end + 1;
                    while i < tokens.len() && tokens[i] != ";" {
                        i += 1;
                    }
                } else {
                    if let Some(name) = subroutine_function(&stmt) {
                        iface.subroutines.push(name);
                    }
                    i = end;
                }
                stmt.clear();
            }
            token => stmt.push(token),
        }
        i += 1;
    }

    // A declaration alone is one occurrence; anything referenced has more.
    iface.uniforms.retain(|u| tokens.iter().filter(|t| **t == u.name).count() >= 2);
    Ok(iface)
}

// ── linking ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) struct LinkedBlock {
    pub name: String,
    pub size: i32,
    pub binding: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct StageSubroutines {
    pub stage: u32,
    pub subroutines: Vec<String>,
    pub uniforms: Vec<String>,
    pub selected: Vec<u32>,
}

/// A successfully linked program.
#[derive(Debug, Clone, Default)]
pub(crate) struct Linked {
    pub attributes: Vec<(ActiveInfo, i32)>,
    pub uniforms: Vec<(ActiveInfo, i32)>,
    pub blocks: Vec<LinkedBlock>,
    pub varyings: Vec<ActiveInfo>,
    /// (input primitive, output primitive, max vertices)
    pub geometry: Option<(u32, u32, i32)>,
    pub subroutines: Vec<StageSubroutines>,
}

fn array_name(decl: &Decl) -> String {
    if decl.len > 1 {
        format!("{}[0]", decl.name)
    } else {
        decl.name.clone()
    }
}

fn round_up(value: i32, align: i32) -> i32 {
    (value + align - 1) / align * align
}

/// std140 (alignment, size) of one declaration.
fn std140(decl: &Decl) -> (i32, i32) {
    let scalar = decl.ty.scalar.size() as i32;
    let rows = decl.ty.rows as i32;
    let vector_align = match rows {
        1 => scalar,
        2 => 2 * scalar,
        _ => 4 * scalar,
    };
    if decl.ty.is_matrix() || decl.len > 1 {
        let stride = round_up(rows * scalar, round_up(vector_align, 16));
        let count = decl.ty.columns as i32 * decl.len;
        (round_up(vector_align, 16), stride * count)
    } else {
        (vector_align, rows * scalar)
    }
}

fn block_size(block: &Block) -> i32 {
    let end = block.members.iter().fold(0, |offset, member| {
        let (align, size) = std140(member);
        round_up(offset, align) + size
    });
    round_up(end, 16)
}

/// Links compiled stages. `stages` is `(native stage enum, interface)`.
pub(crate) fn link(
    stages: &[(u32, &Interface)],
    varyings: &[String],
    version: u32,
) -> Result<Linked, String> {
    let stage = |kind: u32| stages.iter().find(|(s, _)| *s == kind).map(|(_, i)| *i);
    let vertex = stage(glow::VERTEX_SHADER)
        .ok_or_else(|| "error: program has no vertex shader".to_string())?;
    let mut linked = Linked::default();

    // attributes: explicit locations first, the rest packed around them
    let mut taken: HashSet<i32> = HashSet::new();
    for input in &vertex.inputs {
        if let Some(location) = input.location {
            taken.extend(location..location + input.len * input.ty.columns as i32);
        }
    }
    let mut next = 0;
    for input in &vertex.inputs {
        let span = input.len * input.ty.columns as i32;
        let location = match input.location {
            Some(location) => location,
            None => {
                while (next..next + span).any(|l| taken.contains(&l)) {
                    next += 1;
                }
                taken.extend(next..next + span);
                next
            }
        };
        let info = ActiveInfo { name: array_name(input), size: input.len, gl_type: input.ty.gl_type };
        linked.attributes.push((info, location));
    }

    // default-block uniforms, then block members at location -1
    let mut seen: HashSet<&str> = HashSet::new();
    let mut location = 0;
    for (_, iface) in stages {
        for uniform in &iface.uniforms {
            if seen.insert(&uniform.name) {
                let info = ActiveInfo {
                    name: array_name(uniform),
                    size: uniform.len,
                    gl_type: uniform.ty.gl_type,
                };
                linked.uniforms.push((info, location));
                location += uniform.len;
            }
        }
    }
    for (_, iface) in stages {
        for block in &iface.blocks {
            if linked.blocks.iter().any(|b| b.name == block.name) {
                continue;
            }
            for member in &block.members {
                let info = ActiveInfo {
                    name: array_name(member),
                    size: member.len,
                    gl_type: member.ty.gl_type,
                };
                linked.uniforms.push((info, -1));
            }
            linked.blocks.push(LinkedBlock {
                name: block.name.clone(),
                size: block_size(block),
                binding: block.binding.unwrap_or(0),
            });
        }
    }

    // transform feedback captures from the last vertex-processing stage
    let last = stage(glow::GEOMETRY_SHADER)
        .or_else(|| stage(glow::TESS_EVALUATION_SHADER))
        .unwrap_or(vertex);
    for name in varyings {
        let info = if name == "gl_Position" {
            ActiveInfo { name: name.clone(), size: 1, gl_type: glow::FLOAT_VEC4 }
        } else {
            let output = last.outputs.iter().find(|o| &o.name == name).ok_or_else(|| {
                format!("error: transform feedback varying '{name}' is not written by the last vertex stage")
            })?;
            ActiveInfo { name: name.clone(), size: output.len, gl_type: output.ty.gl_type }
        };
        linked.varyings.push(info);
    }

    if let Some(geometry) = stage(glow::GEOMETRY_SHADER) {
        let input = geometry
            .geometry_input
            .ok_or_else(|| "error: geometry shader has no input layout".to_string())?;
        let (output, max) = geometry
            .geometry_output
            .ok_or_else(|| "error: geometry shader has no output layout".to_string())?;
        linked.geometry = Some((input, output, max));
    }

    if version >= 400 {
        for (kind, iface) in stages {
            if iface.subroutines.is_empty() && iface.subroutine_uniforms.is_empty() {
                continue;
            }
            linked.subroutines.push(StageSubroutines {
                stage: *kind,
                subroutines: iface.subroutines.clone(),
                uniforms: iface.subroutine_uniforms.clone(),
                selected: vec![0; iface.subroutine_uniforms.len()],
            });
        }
    }

    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "
        #version 330
        in vec2 in_vert;
        layout(location = 4) in mat3 in_basis;
        uniform vec3 lights[4];
        uniform float unused; // never read
        layout(std140) uniform Camera { mat4 view; vec3 eye; } camera;
        out vec3 v_color;
        void main() {
            v_color = lights[0] + camera.eye;
            gl_Position = vec4(in_vert, 0.0, 1.0);
        }
    ";

    #[test]
    fn declarations_are_collected() {
        let iface = compile(VS).unwrap();
        assert_eq!(iface.inputs.len(), 2);
        assert_eq!(iface.inputs[1].location, Some(4));
        assert_eq!(iface.uniforms.len(), 1);
        assert_eq!(iface.uniforms[0].len, 4);
        assert_eq!(iface.blocks[0].name, "Camera");
        assert_eq!(iface.outputs[0].name, "v_color");
    }

    #[test]
    fn error_directive_fails_compilation() {
        let log = compile("#error broken\nvoid main() {}").unwrap_err();
        assert!(log.starts_with("0:1: error"), "{log}");
    }

    #[test]
    fn missing_main_fails_compilation() {
        assert!(compile("in vec2 a;").is_err());
    }

    #[test]
    fn matrices_take_a_location_per_column() {
        let iface = compile(VS).unwrap();
        let linked = link(&[(glow::VERTEX_SHADER, &iface)], &[], 330).unwrap();
        let locations: Vec<i32> = linked.attributes.iter().map(|(_, l)| *l).collect();
        assert_eq!(locations, vec![0, 4]);
    }

    #[test]
    fn arrays_report_first_element() {
        let iface = compile(VS).unwrap();
        let linked = link(&[(glow::VERTEX_SHADER, &iface)], &[], 330).unwrap();
        let (info, location) = &linked.uniforms[0];
        assert_eq!((info.name.as_str(), info.size, *location), ("lights[0]", 4, 0));
        assert!(linked.uniforms.iter().any(|(u, l)| u.name == "view" && *l == -1));
    }

    #[test]
    fn std140_block_size() {
        let iface = compile(VS).unwrap();
        let linked = link(&[(glow::VERTEX_SHADER, &iface)], &[], 330).unwrap();
        assert_eq!(linked.blocks[0].size, 64 + 16);
    }

    #[test]
    fn undeclared_varying_fails_link() {
        let iface = compile(VS).unwrap();
        let err = link(&[(glow::VERTEX_SHADER, &iface)], &["v_missing".into()], 330).unwrap_err();
        assert!(err.contains("v_missing"));
    }

    #[test]
    fn geometry_layout() {
        let gs = "layout(triangles) in; layout(line_strip, max_vertices = 6) out; void main() {}";
        let iface = compile(gs).unwrap();
        assert_eq!(iface.geometry_input, Some(glow::TRIANGLES));
        assert_eq!(iface.geometry_output, Some((glow::LINE_STRIP, 6)));
    }

    #[test]
    fn subroutines_need_version_400() {
        let fs = "
            subroutine vec4 Shade(vec3 c);
            subroutine(Shade) vec4 red(vec3 c) { return vec4(1.0); }
            subroutine(Shade) vec4 blue(vec3 c) { return vec4(0.0); }
            subroutine uniform Shade shade;
            void main() {}
        ";
        let vs = compile("void main() {}").unwrap();
        let fs = compile(fs).unwrap();
        assert_eq!(fs.subroutines, vec!["red", "blue"]);
        let stages = [(glow::VERTEX_SHADER, &vs), (glow::FRAGMENT_SHADER, &fs)];
        assert!(link(&stages, &[], 330).unwrap().subroutines.is_empty());
        let linked = link(&stages, &[], 410).unwrap();
        assert_eq!(linked.subroutines[0].uniforms, vec!["shade"]);
    }
}
