//! The device boundary.
//!
//! Everything the renderer asks of the GPU goes through [`GlContext`], a
//! narrow GL-shaped call surface. Production implementations wrap a real
//! context; tests substitute a recording implementation.

use bitflags::bitflags;

bitflags! {
    /// Buffers affected by a clear.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearBits: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Device calls issued while recording resources and while executing the
/// batch chain. Single-threaded; shared as `Rc<RefCell<dyn GlContext>>`.
pub trait GlContext {
    fn max_texture_size(&self) -> i32;

    /// Resolve a uniform's location in a linked program. `None` when the
    /// program does not use the uniform (e.g. optimized out).
    fn uniform_location(&mut self, program: u32, name: &str) -> Option<i32>;
    fn use_program(&mut self, program: u32);
    fn delete_program(&mut self, program: u32);

    fn create_texture(&mut self, width: i32, height: i32) -> u32;
    fn delete_texture(&mut self, id: u32);

    fn create_framebuffer(&mut self) -> u32;
    /// Attach `texture` as the color attachment of `framebuffer`.
    fn attach_texture(&mut self, framebuffer: u32, texture: u32);
    fn bind_framebuffer(&mut self, id: u32);
    fn delete_framebuffer(&mut self, id: u32);

    fn viewport(&mut self, width: u16, height: u16);
    fn set_scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn clear_scissor(&mut self);

    fn bind_texture(&mut self, unit: u32, id: u32);
    fn clear(&mut self, bits: ClearBits);

    /// Upload the frame's vertex data in one shot before execution.
    fn upload_vertices(&mut self, data: &[u8]);
    fn draw_arrays(&mut self, first: u32, count: u32);

    fn push_debug_group(&mut self, message: &str);
    fn pop_debug_group(&mut self);

    fn uniform1f(&mut self, location: i32, v: f32);
    fn uniform2f(&mut self, location: i32, a: f32, b: f32);
    fn uniform3f(&mut self, location: i32, a: f32, b: f32, c: f32);
    fn uniform4f(&mut self, location: i32, a: f32, b: f32, c: f32, d: f32);
    fn uniform1i(&mut self, location: i32, v: i32);
    fn uniform1fv(&mut self, location: i32, values: &[f32]);
    fn uniform4fv(&mut self, location: i32, values: &[f32]);
    fn uniform_matrix4fv(&mut self, location: i32, values: &[f32; 16]);
}
