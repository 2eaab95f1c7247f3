//! 4.0 entry points that `glow` does not wrap: shader subroutines and
//! double-precision uniforms. They are resolved through the same
//! `get_proc_address` function that builds the `glow::Context`.

use std::ffi::{c_char, c_void};

type GetProgramStageIv = unsafe extern "system" fn(u32, u32, u32, *mut i32);
type GetActiveName = unsafe extern "system" fn(u32, u32, u32, i32, *mut i32, *mut c_char);
type UniformSubroutinesUiv = unsafe extern "system" fn(u32, i32, *const u32);
type UniformDv = unsafe extern "system" fn(i32, i32, *const f64);
type UniformMatrixDv = unsafe extern "system" fn(i32, i32, u8, *const f64);
type GetUniformDv = unsafe extern "system" fn(u32, i32, *mut f64);

/// `glUniform{1,2,3,4}dv`, by component count.
const VECTORS: [&str; 4] = ["glUniform1dv", "glUniform2dv", "glUniform3dv", "glUniform4dv"];

/// `glUniformMatrix*dv`, by `(columns, rows)`.
const MATRICES: [((u32, u32), &str); 9] = [
    ((2, 2), "glUniformMatrix2dv"),
    ((3, 3), "glUniformMatrix3dv"),
    ((4, 4), "glUniformMatrix4dv"),
    ((2, 3), "glUniformMatrix2x3dv"),
    ((2, 4), "glUniformMatrix2x4dv"),
    ((3, 2), "glUniformMatrix3x2dv"),
    ((3, 4), "glUniformMatrix3x4dv"),
    ((4, 2), "glUniformMatrix4x2dv"),
    ((4, 3), "glUniformMatrix4x3dv"),
];

/// Resolved function pointers; `None` where the driver has no entry point.
#[derive(Default)]
pub(super) struct Procs {
    get_program_stage_iv: Option<GetProgramStageIv>,
    get_active_subroutine_name: Option<GetActiveName>,
    get_active_subroutine_uniform_name: Option<GetActiveName>,
    uniform_subroutines_uiv: Option<UniformSubroutinesUiv>,
    uniform_dv: [Option<UniformDv>; 4],
    uniform_matrix_dv: [Option<UniformMatrixDv>; 9],
    get_uniform_dv: Option<GetUniformDv>,
}

/// Looks `name` up and reinterprets the address as `T`.
///
/// # Safety
/// `T` must be the `extern "system"` function pointer type of `name`'s
/// prototype.
unsafe fn resolve<T: Copy>(load: &mut dyn FnMut(&str) -> *const c_void, name: &str) -> Option<T> {
    let address = load(name);
    // Some platform loaders return small sentinels instead of null.
    if (address as usize) < 4 || address as isize == -1 {
        return None;
    }
    debug_assert_eq!(size_of::<T>(), size_of::<*const c_void>());
    Some(unsafe { std::mem::transmute_copy::<*const c_void, T>(&address) })
}

impl Procs {
    /// Resolves every entry point. Call only for 4.0+ desktop contexts:
    /// older drivers may hand out addresses for functions they cannot run.
    pub(super) fn load(load: &mut dyn FnMut(&str) -> *const c_void) -> Self {
        // SAFETY: each type alias matches the prototype of the name it is
        // resolved with.
        unsafe {
            let mut procs = Procs {
                get_program_stage_iv: resolve(load, "glGetProgramStageiv"),
                get_active_subroutine_name: resolve(load, "glGetActiveSubroutineName"),
                get_active_subroutine_uniform_name: resolve(load, "glGetActiveSubroutineUniformName"),
                uniform_subroutines_uiv: resolve(load, "glUniformSubroutinesuiv"),
                get_uniform_dv: resolve(load, "glGetUniformdv"),
                ..Procs::default()
            };
            for (slot, name) in procs.uniform_dv.iter_mut().zip(VECTORS) {
                *slot = resolve(load, name);
            }
            for (slot, (_, name)) in procs.uniform_matrix_dv.iter_mut().zip(MATRICES) {
                *slot = resolve(load, name);
            }
            procs
        }
    }

    fn missing(name: &str) -> String {
        format!("{name} is not available; it needs a 4.0 context")
    }

    // ── subroutines ───────────────────────────────────────────────────────

    pub(super) fn program_stage(&self, program: u32, stage: u32, pname: u32) -> Result<i32, String> {
        let f = self.get_program_stage_iv.ok_or_else(|| Self::missing("glGetProgramStageiv"))?;
        let mut value = 0;
        // SAFETY: one GLint is written for the queried parameter.
        unsafe { f(program, stage, pname, &mut value) };
        Ok(value)
    }

    pub(super) fn subroutine_name(&self, program: u32, stage: u32, index: u32) -> Result<String, String> {
        let f = self.get_active_subroutine_name.ok_or_else(|| Self::missing("glGetActiveSubroutineName"))?;
        let capacity = self.program_stage(program, stage, super::ACTIVE_SUBROUTINE_MAX_LENGTH)?;
        Ok(active_name(f, program, stage, index, capacity))
    }

    pub(super) fn subroutine_uniform_name(&self, program: u32, stage: u32, index: u32) -> Result<String, String> {
        let f = self
            .get_active_subroutine_uniform_name
            .ok_or_else(|| Self::missing("glGetActiveSubroutineUniformName"))?;
        let capacity = self.program_stage(program, stage, super::ACTIVE_SUBROUTINE_UNIFORM_MAX_LENGTH)?;
        Ok(active_name(f, program, stage, index, capacity))
    }

    pub(super) fn select_subroutines(&self, stage: u32, indices: &[u32]) -> Result<(), String> {
        let f = self.uniform_subroutines_uiv.ok_or_else(|| Self::missing("glUniformSubroutinesuiv"))?;
        // SAFETY: the driver reads `indices.len()` indices.
        unsafe { f(stage, indices.len() as i32, indices.as_ptr()) };
        Ok(())
    }

    // ── doubles ───────────────────────────────────────────────────────────

    pub(super) fn uniform_doubles(
        &self,
        location: i32,
        (columns, rows): (u32, u32),
        count: i32,
        values: &[f64],
    ) -> Result<(), String> {
        if columns == 1 {
            let name = VECTORS.get(rows as usize - 1).copied().unwrap_or("glUniform*dv");
            let f = self
                .uniform_dv
                .get(rows as usize - 1)
                .copied()
                .flatten()
                .ok_or_else(|| Self::missing(name))?;
            // SAFETY: `values` holds `count` elements of `rows` doubles.
            unsafe { f(location, count, values.as_ptr()) };
            return Ok(());
        }
        let slot = MATRICES.iter().position(|(shape, _)| *shape == (columns, rows));
        let Some(slot) = slot else {
            return Err(format!("no double matrix upload for {columns}x{rows}"));
        };
        let f = self.uniform_matrix_dv[slot].ok_or_else(|| Self::missing(MATRICES[slot].1))?;
        // SAFETY: `values` holds `count` column-major matrices.
        unsafe { f(location, count, 0, values.as_ptr()) };
        Ok(())
    }

    pub(super) fn read_doubles(&self, program: u32, location: i32, out: &mut [f64]) -> Result<(), String> {
        let f = self.get_uniform_dv.ok_or_else(|| Self::missing("glGetUniformdv"))?;
        // SAFETY: `out` is sized for one element of the uniform's type.
        unsafe { f(program, location, out.as_mut_ptr()) };
        Ok(())
    }
}

fn active_name(f: GetActiveName, program: u32, stage: u32, index: u32, capacity: i32) -> String {
    let mut bytes = vec![0u8; capacity.max(1) as usize];
    let mut length = 0;
    // SAFETY: the driver writes at most `bytes.len()` bytes, NUL included.
    unsafe { f(program, stage, index, bytes.len() as i32, &mut length, bytes.as_mut_ptr().cast()) };
    bytes.truncate(length.clamp(0, bytes.len() as i32) as usize);
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static CALLS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    fn record(call: String) {
        CALLS.with(|c| c.borrow_mut().push(call));
    }

    fn take_calls() -> Vec<String> {
        CALLS.with(|c| c.take())
    }

    unsafe extern "system" fn program_stage(_: u32, _: u32, pname: u32, out: *mut i32) {
        let value = if pname == crate::gl::ACTIVE_SUBROUTINE_MAX_LENGTH { 16 } else { 2 };
        unsafe { *out = value };
    }

    unsafe extern "system" fn subroutine_name(_: u32, _: u32, index: u32, size: i32, len: *mut i32, out: *mut c_char) {
        let name = if index == 0 { b"red\0".as_slice() } else { b"blue\0".as_slice() };
        assert!(name.len() as i32 <= size);
        unsafe {
            std::ptr::copy_nonoverlapping(name.as_ptr().cast(), out, name.len());
            *len = name.len() as i32 - 1;
        }
    }

    unsafe extern "system" fn select(stage: u32, count: i32, indices: *const u32) {
        let indices = unsafe { std::slice::from_raw_parts(indices, count as usize) };
        record(format!("select({stage:#x}, {indices:?})"));
    }

    unsafe extern "system" fn uniform_3dv(location: i32, count: i32, values: *const f64) {
        let values = unsafe { std::slice::from_raw_parts(values, 3 * count as usize) };
        record(format!("uniform_3dv({location}, {values:?})"));
    }

    unsafe extern "system" fn uniform_matrix_2dv(location: i32, count: i32, transpose: u8, _: *const f64) {
        record(format!("uniform_matrix_2dv({location}, {count}, {transpose})"));
    }

    fn loader(name: &str) -> *const c_void {
        match name {
            "glGetProgramStageiv" => program_stage as *const c_void,
            "glGetActiveSubroutineName" => subroutine_name as *const c_void,
            "glUniformSubroutinesuiv" => select as *const c_void,
            "glUniform3dv" => uniform_3dv as *const c_void,
            "glUniformMatrix2dv" => uniform_matrix_2dv as *const c_void,
            _ => std::ptr::null(),
        }
    }

    fn procs() -> Procs {
        take_calls();
        Procs::load(&mut loader)
    }

    // ── subroutines ───────────────────────────────────────────────────────

    #[test]
    fn subroutine_queries_reach_the_driver() {
        let procs = procs();
        assert_eq!(procs.program_stage(1, glow::FRAGMENT_SHADER, crate::gl::ACTIVE_SUBROUTINES), Ok(2));
        assert_eq!(procs.subroutine_name(1, glow::FRAGMENT_SHADER, 1).as_deref(), Ok("blue"));
        procs.select_subroutines(glow::FRAGMENT_SHADER, &[1, 0]).unwrap();
        assert_eq!(take_calls(), [format!("select({:#x}, [1, 0])", glow::FRAGMENT_SHADER)]);
    }

    #[test]
    fn missing_entry_points_are_errors() {
        let procs = procs();
        let err = procs.subroutine_uniform_name(1, glow::VERTEX_SHADER, 0).unwrap_err();
        assert!(err.contains("glGetActiveSubroutineUniformName") && err.contains("4.0 context"), "{err}");

        let empty = Procs::default();
        assert!(empty.program_stage(1, glow::VERTEX_SHADER, crate::gl::ACTIVE_SUBROUTINES).is_err());
        assert!(empty.select_subroutines(glow::VERTEX_SHADER, &[0]).is_err());
    }

    #[test]
    fn sentinel_addresses_count_as_missing() {
        let procs = Procs::load(&mut |_: &str| 1usize as *const c_void);
        assert!(procs.select_subroutines(glow::VERTEX_SHADER, &[0]).is_err());
    }

    // ── doubles ───────────────────────────────────────────────────────────

    #[test]
    fn double_uniforms_pick_the_matching_upload() {
        let procs = procs();
        procs.uniform_doubles(4, (1, 3), 1, &[1.0, 2.0, 3.0]).unwrap();
        procs.uniform_doubles(5, (2, 2), 1, &[0.0; 4]).unwrap();
        assert_eq!(take_calls(), ["uniform_3dv(4, [1.0, 2.0, 3.0])", "uniform_matrix_2dv(5, 1, 0)"]);

        let err = procs.uniform_doubles(6, (4, 4), 1, &[0.0; 16]).unwrap_err();
        assert!(err.contains("glUniformMatrix4dv"), "{err}");
        assert!(procs.read_doubles(1, 0, &mut [0.0]).is_err());
    }
}
