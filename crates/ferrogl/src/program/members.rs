//! Reflection records of a linked program.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use bytemuck::Pod;

use super::sources::Stage;
use super::types::GlType;
use super::ProgramShared;
use crate::error::{GlError, Result};

/// A vertex shader input.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub(crate) name: String,
    pub(crate) location: u32,
    pub(crate) ty: &'static GlType,
    pub(crate) array_length: u32,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> u32 {
        self.location
    }

    pub fn gl_type(&self) -> &'static GlType {
        self.ty
    }

    pub fn array_length(&self) -> u32 {
        self.array_length
    }

    /// Components per location (`rows` of a matrix column).
    pub fn dimension(&self) -> u32 {
        self.ty.rows
    }

    /// `f`, `d`, `i` or `u`.
    pub fn shape(&self) -> char {
        self.ty.scalar.shape()
    }

    /// Consecutive locations the attribute occupies.
    pub fn location_span(&self) -> u32 {
        self.ty.columns * self.array_length
    }
}

/// A default-block uniform with a client shadow of its value.
pub struct Uniform {
    pub(crate) name: String,
    /// Location of each array element.
    pub(crate) locations: Vec<i32>,
    pub(crate) ty: &'static GlType,
    pub(crate) shadow: RefCell<Vec<u8>>,
    pub(crate) program: Weak<ProgramShared>,
}

impl fmt::Debug for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uniform")
            .field("name", &self.name)
            .field("location", &self.location())
            .field("type", &self.ty.glsl)
            .field("array_length", &self.array_length())
            .finish()
    }
}

impl Uniform {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> i32 {
        self.locations[0]
    }

    pub fn gl_type(&self) -> &'static GlType {
        self.ty
    }

    pub fn array_length(&self) -> u32 {
        self.locations.len() as u32
    }

    pub fn dimension(&self) -> u32 {
        self.ty.dimension()
    }

    /// Bytes of the whole uniform (every element) in client memory.
    pub fn size(&self) -> usize {
        self.ty.element_size() * self.locations.len()
    }

    fn program(&self) -> Rc<ProgramShared> {
        self.program
            .upgrade()
            .unwrap_or_else(|| panic!("uniform {} outlived its program", self.name))
    }

    /// Uploads `data`, a whole number of elements.
    ///
    /// Writing fewer elements than the array holds keeps the remaining
    /// elements: they are refreshed from the driver first and uploaded again.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let element = self.ty.element_size();
        if data.is_empty() || data.len() % element != 0 || data.len() > self.size() {
            return Err(GlError::invalid(format!(
                "uniform {}: {} bytes is not 1..={} elements of {element} bytes",
                self.name,
                data.len(),
                self.locations.len()
            )));
        }
        if data.len() < self.size() {
            self.read()?;
        }
        let program = self.program();
        let device = program.handle.device();
        let gl = device.gl();
        let mut shadow = self.shadow.borrow_mut();
        shadow[..data.len()].copy_from_slice(data);
        gl.use_program(program.handle.glo());
        gl.uniform_write(self.location(), self.ty.gl_type, self.locations.len() as i32, &shadow)
            .map_err(|message| GlError::invalid(format!("uniform {}: {message}", self.name)))?;
        device.check("uniform write");
        Ok(())
    }

    /// Reads every element back from the driver.
    pub fn read(&self) -> Result<Vec<u8>> {
        let program = self.program();
        let device = program.handle.device();
        let gl = device.gl();
        let element = self.ty.element_size();
        let mut shadow = self.shadow.borrow_mut();
        for (chunk, location) in shadow.chunks_exact_mut(element).zip(&self.locations) {
            gl.uniform_read(program.handle.glo(), *location, self.ty.gl_type, chunk)
                .map_err(|message| GlError::invalid(format!("uniform {}: {message}", self.name)))?;
        }
        Ok(shadow.clone())
    }

    /// Typed [`write`](Self::write).
    pub fn set<T: Pod>(&self, values: &[T]) -> Result<()> {
        self.write(bytemuck::cast_slice(values))
    }

    /// Typed [`read`](Self::read). `T` must evenly divide the element size.
    pub fn get<T: Pod>(&self) -> Result<Vec<T>> {
        Ok(bytemuck::pod_collect_to_vec(&self.read()?))
    }

    /// Last value written or read, without a driver round-trip.
    pub fn shadow(&self) -> Vec<u8> {
        self.shadow.borrow().clone()
    }
}

/// A named uniform block.
pub struct UniformBlock {
    pub(crate) name: String,
    pub(crate) index: u32,
    pub(crate) size: u32,
    pub(crate) binding: Cell<u32>,
    pub(crate) program: Weak<ProgramShared>,
}

impl fmt::Debug for UniformBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformBlock")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("size", &self.size)
            .field("binding", &self.binding.get())
            .finish()
    }
}

impl UniformBlock {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Data size in bytes as laid out by the driver.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn binding(&self) -> u32 {
        self.binding.get()
    }

    /// Sources the block from uniform buffer binding point `binding`.
    pub fn set_binding(&self, binding: u32) {
        let program = self
            .program
            .upgrade()
            .unwrap_or_else(|| panic!("uniform block {} outlived its program", self.name));
        let device = program.handle.device();
        device.gl().uniform_block_binding(program.handle.glo(), self.index, binding);
        self.binding.set(binding);
    }
}

/// A transform feedback output.
#[derive(Debug, Clone, PartialEq)]
pub struct Varying {
    pub(crate) name: String,
    pub(crate) number: u32,
    pub(crate) ty: &'static GlType,
    pub(crate) array_length: u32,
}

impl Varying {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the capture order.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn gl_type(&self) -> &'static GlType {
        self.ty
    }

    pub fn array_length(&self) -> u32 {
        self.array_length
    }

    pub fn dimension(&self) -> u32 {
        self.ty.dimension()
    }

    /// Bytes captured per vertex.
    pub fn size(&self) -> usize {
        self.ty.element_size() * self.array_length as usize
    }
}

/// A subroutine function selectable through a subroutine uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subroutine {
    pub(crate) name: String,
    pub(crate) index: u32,
    pub(crate) stage: Stage,
}

impl Subroutine {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index passed to subroutine selection.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

/// Any reflected program member, as returned by
/// [`Program::member`](super::Program::member).
#[derive(Debug, Clone, Copy)]
pub enum Member<'a> {
    Attribute(&'a Attribute),
    Uniform(&'a Uniform),
    UniformBlock(&'a UniformBlock),
    Varying(&'a Varying),
    Subroutine(&'a Subroutine),
}

impl Member<'_> {
    pub fn name(&self) -> &str {
        match self {
            Member::Attribute(m) => m.name(),
            Member::Uniform(m) => m.name(),
            Member::UniformBlock(m) => m.name(),
            Member::Varying(m) => m.name(),
            Member::Subroutine(m) => m.name(),
        }
    }
}
