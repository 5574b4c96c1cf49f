//! A [`GlContext`] that records every device call, for structural
//! assertions in unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::gl::{ClearBits, GlContext};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    UseProgram(u32),
    DeleteProgram(u32),
    CreateTexture(i32, i32),
    DeleteTexture(u32),
    CreateFramebuffer(u32),
    AttachTexture(u32, u32),
    BindFramebuffer(u32),
    DeleteFramebuffer(u32),
    Viewport(u16, u16),
    SetScissor(i32, i32, i32, i32),
    ClearScissor,
    BindTexture(u32, u32),
    Clear(ClearBits),
    UploadVertices(usize),
    DrawArrays(u32, u32),
    PushDebugGroup(String),
    PopDebugGroup,
    Uniform1f(i32, f32),
    Uniform2f(i32, f32, f32),
    Uniform3f(i32, f32, f32, f32),
    Uniform4f(i32, f32, f32, f32, f32),
    Uniform1i(i32, i32),
    Uniform1fv(i32, Vec<f32>),
    Uniform4fv(i32, Vec<f32>),
    UniformMatrix4fv(i32, [f32; 16]),
}

pub(crate) struct RecordingContext {
    pub calls: Vec<Call>,
    /// Uniform names resolved as absent, to simulate linkers stripping
    /// unused uniforms.
    pub missing_uniforms: HashSet<String>,
    max_texture_size: i32,
    next_resource_id: u32,
    locations: HashMap<(u32, String), i32>,
    next_location: HashMap<u32, i32>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::with_max_texture_size(4096)
    }

    pub fn with_max_texture_size(max_texture_size: i32) -> Self {
        Self {
            calls: Vec::new(),
            missing_uniforms: HashSet::new(),
            max_texture_size,
            next_resource_id: 1,
            locations: HashMap::new(),
            next_location: HashMap::new(),
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_resource_id;
        self.next_resource_id += 1;
        id
    }
}

impl GlContext for RecordingContext {
    fn max_texture_size(&self) -> i32 {
        self.max_texture_size
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<i32> {
        if self.missing_uniforms.contains(name) {
            return None;
        }
        if let Some(location) = self.locations.get(&(program, name.to_owned())) {
            return Some(*location);
        }
        let next = self.next_location.entry(program).or_insert(0);
        let location = *next;
        *next += 1;
        self.locations.insert((program, name.to_owned()), location);
        Some(location)
    }

    fn use_program(&mut self, program: u32) {
        self.calls.push(Call::UseProgram(program));
    }

    fn delete_program(&mut self, program: u32) {
        self.calls.push(Call::DeleteProgram(program));
    }

    fn create_texture(&mut self, width: i32, height: i32) -> u32 {
        self.calls.push(Call::CreateTexture(width, height));
        self.next_id()
    }

    fn delete_texture(&mut self, id: u32) {
        self.calls.push(Call::DeleteTexture(id));
    }

    fn create_framebuffer(&mut self) -> u32 {
        let id = self.next_id();
        self.calls.push(Call::CreateFramebuffer(id));
        id
    }

    fn attach_texture(&mut self, framebuffer: u32, texture: u32) {
        self.calls.push(Call::AttachTexture(framebuffer, texture));
    }

    fn bind_framebuffer(&mut self, id: u32) {
        self.calls.push(Call::BindFramebuffer(id));
    }

    fn delete_framebuffer(&mut self, id: u32) {
        self.calls.push(Call::DeleteFramebuffer(id));
    }

    fn viewport(&mut self, width: u16, height: u16) {
        self.calls.push(Call::Viewport(width, height));
    }

    fn set_scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.calls.push(Call::SetScissor(x, y, width, height));
    }

    fn clear_scissor(&mut self) {
        self.calls.push(Call::ClearScissor);
    }

    fn bind_texture(&mut self, unit: u32, id: u32) {
        self.calls.push(Call::BindTexture(unit, id));
    }

    fn clear(&mut self, bits: ClearBits) {
        self.calls.push(Call::Clear(bits));
    }

    fn upload_vertices(&mut self, data: &[u8]) {
        self.calls.push(Call::UploadVertices(data.len()));
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        self.calls.push(Call::DrawArrays(first, count));
    }

    fn push_debug_group(&mut self, message: &str) {
        self.calls.push(Call::PushDebugGroup(message.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.calls.push(Call::PopDebugGroup);
    }

    fn uniform1f(&mut self, location: i32, v: f32) {
        self.calls.push(Call::Uniform1f(location, v));
    }

    fn uniform2f(&mut self, location: i32, a: f32, b: f32) {
        self.calls.push(Call::Uniform2f(location, a, b));
    }

    fn uniform3f(&mut self, location: i32, a: f32, b: f32, c: f32) {
        self.calls.push(Call::Uniform3f(location, a, b, c));
    }

    fn uniform4f(&mut self, location: i32, a: f32, b: f32, c: f32, d: f32) {
        self.calls.push(Call::Uniform4f(location, a, b, c, d));
    }

    fn uniform1i(&mut self, location: i32, v: i32) {
        self.calls.push(Call::Uniform1i(location, v));
    }

    fn uniform1fv(&mut self, location: i32, values: &[f32]) {
        self.calls.push(Call::Uniform1fv(location, values.to_vec()));
    }

    fn uniform4fv(&mut self, location: i32, values: &[f32]) {
        self.calls.push(Call::Uniform4fv(location, values.to_vec()));
    }

    fn uniform_matrix4fv(&mut self, location: i32, values: &[f32; 16]) {
        self.calls.push(Call::UniformMatrix4fv(location, *values));
    }
}

/// The recorder both as itself (for assertions) and as the trait object
/// the renderer consumes.
pub(crate) fn test_context() -> (Rc<RefCell<RecordingContext>>, Rc<RefCell<dyn GlContext>>) {
    let recorder = Rc::new(RefCell::new(RecordingContext::new()));
    let context: Rc<RefCell<dyn GlContext>> = recorder.clone();
    (recorder, context)
}
