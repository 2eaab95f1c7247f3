//! Walks a linked program and builds the name-indexed member tables.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Weak;

use super::members::{Attribute, Subroutine, Uniform, UniformBlock, Varying};
use super::sources::Stage;
use super::types::{self, GlType};
use super::{Geometry, ProgramShared};
use crate::gl::{ActiveInfo, Gl, ACTIVE_SUBROUTINES, ACTIVE_SUBROUTINE_UNIFORMS};
use crate::error::{GlError, Result};
use crate::primitive::Primitive;

/// Subroutines by name, and each stage's subroutine uniforms.
pub(super) type Subroutines = (BTreeMap<String, Subroutine>, Vec<(Stage, Vec<String>)>);

/// Splits a trailing array subscript: `lights[2]` is `("lights", Some(2))`.
fn canonical_name(name: &str) -> (&str, Option<u32>) {
    let Some(open) = name.strip_suffix(']').and_then(|n| n.rfind('[')) else {
        return (name, None);
    };
    match name[open + 1..name.len() - 1].parse() {
        Ok(index) => (&name[..open], Some(index)),
        Err(_) => (name, None),
    }
}

/// One driver-reported member after canonicalization.
struct Active {
    name: String,
    ty: &'static GlType,
    length: u32,
}

/// Canonicalizes `info` and merges it into `table`. Entries reported per
/// element (`foo[0]`, `foo[3]`) collapse into one whose length covers both.
/// Returns whether a new entry was added.
fn merge(table: &mut BTreeMap<String, Active>, info: &ActiveInfo, what: &str) -> bool {
    let (name, index) = canonical_name(&info.name);
    let length = (info.size.max(1) as u32).max(index.map_or(0, |i| i + 1));
    if let Some(existing) = table.get_mut(name) {
        existing.length = existing.length.max(length);
        return false;
    }
    let Some(ty) = types::describe(info.gl_type) else {
        log::warn!("{what} {name} has unsupported type {:#x}; skipped", info.gl_type);
        return false;
    };
    table.insert(name.to_string(), Active { name: name.to_string(), ty, length });
    true
}

pub(super) fn attributes(gl: &dyn Gl, program: u32) -> BTreeMap<String, Attribute> {
    let mut active = BTreeMap::new();
    for index in 0..gl.active_attribute_count(program) {
        let Some(info) = gl.get_active_attribute(program, index) else { continue };
        if info.name.starts_with("gl_") {
            continue;
        }
        merge(&mut active, &info, "attribute");
    }
    active
        .into_values()
        .filter_map(|a| {
            let location = gl.get_attrib_location(program, &a.name);
            (location >= 0).then(|| {
                let attribute = Attribute { name: a.name.clone(), location: location as u32, ty: a.ty, array_length: a.length };
                (a.name, attribute)
            })
        })
        .collect()
}

/// Default-block uniforms. Block members and eliminated uniforms have no
/// location and are left out.
pub(super) fn uniforms(gl: &dyn Gl, program: u32, owner: &Weak<ProgramShared>) -> BTreeMap<String, Uniform> {
    let mut active = BTreeMap::new();
    for index in 0..gl.active_uniform_count(program) {
        let Some(info) = gl.get_active_uniform(program, index) else { continue };
        if info.name.starts_with("gl_") {
            continue;
        }
        merge(&mut active, &info, "uniform");
    }
    let mut out = BTreeMap::new();
    for a in active.into_values() {
        let base = gl.get_uniform_location(program, &a.name);
        if base < 0 {
            continue;
        }
        let locations: Vec<i32> = if a.length == 1 {
            vec![base]
        } else {
            (0..a.length)
                .map(|i| gl.get_uniform_location(program, &format!("{}[{i}]", a.name)))
                .take_while(|location| *location >= 0)
                .collect()
        };
        if locations.is_empty() {
            continue;
        }
        let shadow = vec![0; a.ty.element_size() * locations.len()];
        let uniform = Uniform {
            name: a.name.clone(),
            locations,
            ty: a.ty,
            shadow: RefCell::new(shadow),
            program: owner.clone(),
        };
        out.insert(a.name, uniform);
    }
    out
}

pub(super) fn uniform_blocks(gl: &dyn Gl, program: u32, owner: &Weak<ProgramShared>) -> BTreeMap<String, UniformBlock> {
    let mut out = BTreeMap::new();
    for index in 0..gl.active_uniform_block_count(program) {
        let reported = gl.get_active_uniform_block_name(program, index);
        let name = canonical_name(&reported).0.to_string();
        if out.contains_key(&name) {
            continue;
        }
        let size = gl.get_active_uniform_block_parameter_i32(program, index, glow::UNIFORM_BLOCK_DATA_SIZE);
        let binding = gl.get_active_uniform_block_parameter_i32(program, index, glow::UNIFORM_BLOCK_BINDING);
        let block = UniformBlock {
            name: name.clone(),
            index,
            size: size.max(0) as u32,
            binding: Cell::new(binding.max(0) as u32),
            program: owner.clone(),
        };
        out.insert(name, block);
    }
    out
}

pub(super) fn varyings(gl: &dyn Gl, program: u32) -> BTreeMap<String, Varying> {
    let mut out = BTreeMap::new();
    for number in 0..gl.transform_feedback_varying_count(program) {
        let Some(info) = gl.get_transform_feedback_varying(program, number) else { continue };
        let (name, _) = canonical_name(&info.name);
        let Some(ty) = types::describe(info.gl_type) else {
            log::warn!("varying {name} has unsupported type {:#x}; skipped", info.gl_type);
            continue;
        };
        let varying = Varying { name: name.to_string(), number, ty, array_length: info.size.max(1) as u32 };
        out.entry(name.to_string()).or_insert(varying);
    }
    out
}

/// Subroutines and, per stage, subroutine uniform names ordered by location.
/// Fails when the context has no subroutine support.
pub(super) fn subroutines(gl: &dyn Gl, program: u32, stages: &[Stage]) -> Result<Subroutines> {
    let unsupported = |message: String| GlError::invalid(format!("program {program}: {message}"));
    let mut functions = BTreeMap::new();
    let mut uniforms = Vec::new();
    for &stage in stages {
        let native = stage.gl_enum();
        let count = gl.get_program_stage_i32(program, native, ACTIVE_SUBROUTINES).map_err(unsupported)?;
        for index in 0..count.max(0) as u32 {
            let name = gl.get_active_subroutine_name(program, native, index).map_err(unsupported)?;
            functions.entry(name.clone()).or_insert(Subroutine { name, index, stage });
        }
        let count = gl.get_program_stage_i32(program, native, ACTIVE_SUBROUTINE_UNIFORMS).map_err(unsupported)?;
        if count > 0 {
            let names = (0..count as u32)
                .map(|i| gl.get_active_subroutine_uniform_name(program, native, i))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(unsupported)?;
            uniforms.push((stage, names));
        }
    }
    Ok((functions, uniforms))
}

pub(super) fn geometry(gl: &dyn Gl, program: u32) -> Option<Geometry> {
    let input = gl.get_program_parameter_i32(program, glow::GEOMETRY_INPUT_TYPE) as u32;
    let output = gl.get_program_parameter_i32(program, glow::GEOMETRY_OUTPUT_TYPE) as u32;
    let vertices = gl.get_program_parameter_i32(program, glow::GEOMETRY_VERTICES_OUT).max(0) as u32;
    match (Primitive::from_gl(input), Primitive::from_gl(output)) {
        (Some(input), Some(output)) => Some(Geometry { input, output, vertices }),
        _ => {
            log::warn!("geometry stage reports unknown primitives ({input:#x}, {output:#x})");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_subscripts_are_stripped() {
        assert_eq!(canonical_name("lights[2]"), ("lights", Some(2)));
        assert_eq!(canonical_name("lights[0]"), ("lights", Some(0)));
        assert_eq!(canonical_name("mvp"), ("mvp", None));
        assert_eq!(canonical_name("s[1].color"), ("s[1].color", None));
        assert_eq!(canonical_name("odd[x]"), ("odd[x]", None));
    }

    #[test]
    fn per_element_entries_collapse() {
        let mut table = BTreeMap::new();
        let info = |name: &str, size| ActiveInfo { name: name.into(), size, gl_type: glow::FLOAT_VEC3 };
        assert!(merge(&mut table, &info("lights[0]", 1), "uniform"));
        assert!(!merge(&mut table, &info("lights[3]", 1), "uniform"));
        assert_eq!(table["lights"].length, 4);
    }

    #[test]
    fn unknown_types_are_skipped() {
        let mut table = BTreeMap::new();
        let info = ActiveInfo { name: "atomic".into(), size: 1, gl_type: 0x92DB };
        assert!(!merge(&mut table, &info, "uniform"));
        assert!(table.is_empty());
    }
}
