//! The batching command queue.
//!
//! Draws are recorded into an append-only batch array and only hit the
//! device when [`CommandQueue::execute`] walks the chain at the end of the
//! frame. Batches link through an explicit `next` index so a merged batch
//! can be dropped from the chain without shifting the array. Merging is the
//! whole point: a draw that changes nothing relative to the previous one
//! (same program, viewport, framebuffer, no uniform changes, no texture
//! binds, contiguous vertices) extends the previous batch instead of
//! costing another draw call.

use std::cell::RefCell;
use std::rc::Rc;

use crate::geometry::Rect;

use super::attachments::AttachmentState;
use super::gl::{ClearBits, GlContext};
use super::uniforms::{UniformChange, UniformState, UniformValue};
use super::vertex::{DrawVertex, N_VERTICES};
use super::RenderError;

/// Sentinel for "no batch" in the `next` chain.
const NO_BATCH: i32 = -1;

/// A render target paired with its backing texture.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    pub framebuffer: u32,
    pub texture: u32,
    pub width: i32,
    pub height: i32,
}

/// One recorded texture-unit bind, applied before the draw it belongs to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextureBind {
    pub unit: u32,
    pub id: u32,
}

/// Payload of a draw batch: ranges into the per-frame vertex, uniform-change
/// and bind arrays. u32 ranges comfortably cover the per-frame limits
/// (tens of thousands of vertices, thousands of uniform changes).
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrawInfo {
    pub framebuffer: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub uniform_offset: u32,
    pub uniform_count: u32,
    pub bind_offset: u32,
    pub bind_count: u32,
}

#[derive(Debug, Clone)]
pub(crate) enum BatchKind {
    Clear { bits: ClearBits, framebuffer: u32 },
    /// Index into the queue's debug-message table.
    PushDebugGroup { message: u32 },
    PopDebugGroup,
    Draw(DrawInfo),
}

#[derive(Debug, Clone)]
pub(crate) struct Batch {
    pub program: u32,
    /// Index of the next batch in execution order, or [`NO_BATCH`].
    pub next: i32,
    pub viewport_width: u16,
    pub viewport_height: u16,
    pub kind: BatchKind,
}

// Batches are recorded in bulk; keep them compact.
const _: () = assert!(std::mem::size_of::<Batch>() <= 48);

pub struct CommandQueue {
    context: Rc<RefCell<dyn GlContext>>,
    uniforms: Rc<RefCell<UniformState>>,
    attachments: AttachmentState,
    saved_attachments: Vec<AttachmentState>,

    batches: Vec<Batch>,
    batch_uniforms: Vec<UniformChange>,
    batch_binds: Vec<TextureBind>,
    vertices: Vec<DrawVertex>,
    debug_messages: Vec<String>,
    /// Last enqueued batch, where the next one links in.
    tail_batch_index: i32,
    in_draw: bool,

    max_texture_size: i32,
    autorelease_framebuffers: Vec<u32>,
    autorelease_textures: Vec<u32>,
}

impl CommandQueue {
    pub fn new(context: Rc<RefCell<dyn GlContext>>, uniforms: Rc<RefCell<UniformState>>) -> Self {
        let max_texture_size = context.borrow().max_texture_size();
        Self {
            context,
            uniforms,
            attachments: AttachmentState::new(),
            saved_attachments: Vec::new(),
            batches: Vec::new(),
            batch_uniforms: Vec::new(),
            batch_binds: Vec::new(),
            vertices: Vec::new(),
            debug_messages: Vec::new(),
            tail_batch_index: NO_BATCH,
            in_draw: false,
            max_texture_size,
            autorelease_framebuffers: Vec::new(),
            autorelease_textures: Vec::new(),
        }
    }

    pub fn context(&self) -> &Rc<RefCell<dyn GlContext>> {
        &self.context
    }

    pub fn max_texture_size(&self) -> i32 {
        self.max_texture_size
    }

    /// Start recording a frame. The previous frame must have been executed
    /// and ended.
    pub fn begin_frame(&mut self) {
        assert!(self.batches.is_empty(), "previous frame was not ended");
        self.tail_batch_index = NO_BATCH;
    }

    /// Finish the frame: reset all per-frame arrays (keeping capacity) and
    /// release GPU objects whose lifetime ended with the frame.
    pub fn end_frame(&mut self) {
        assert!(
            self.saved_attachments.is_empty(),
            "attachment state saved but never restored"
        );
        assert!(!self.in_draw, "draw still open at end of frame");

        self.batches.clear();
        self.batch_uniforms.clear();
        self.batch_binds.clear();
        self.vertices.clear();
        self.debug_messages.clear();
        self.tail_batch_index = NO_BATCH;

        let mut context = self.context.borrow_mut();
        for framebuffer in self.autorelease_framebuffers.drain(..) {
            context.delete_framebuffer(framebuffer);
        }
        for texture in self.autorelease_textures.drain(..) {
            context.delete_texture(texture);
        }
    }

    fn enqueue_last_batch(&mut self) {
        let index = self.batches.len() as i32 - 1;
        if self.tail_batch_index != NO_BATCH {
            self.batches[self.tail_batch_index as usize].next = index;
        }
        self.tail_batch_index = index;
    }

    /// Open a draw bracket for `program`. Vertices and uniform values set
    /// until [`end_draw`](Self::end_draw) belong to this draw.
    pub fn begin_draw(&mut self, program: u32, viewport: &Rect) {
        assert!(!self.in_draw, "draw brackets cannot nest");
        self.in_draw = true;

        self.batches.push(Batch {
            program,
            next: NO_BATCH,
            viewport_width: viewport.width as u16,
            viewport_height: viewport.height as u16,
            kind: BatchKind::Draw(DrawInfo {
                framebuffer: 0,
                vertex_offset: self.vertices.len() as u32,
                vertex_count: 0,
                uniform_offset: 0,
                uniform_count: 0,
                bind_offset: 0,
                bind_count: 0,
            }),
        });
    }

    /// Append one quad's worth of vertices to the open draw.
    pub fn add_vertices(&mut self, vertices: [DrawVertex; N_VERTICES]) {
        assert!(self.in_draw, "vertices outside a draw bracket");
        self.vertices.extend_from_slice(&vertices);

        let batch = self.batches.last_mut().unwrap_or_else(|| unreachable!());
        match &mut batch.kind {
            BatchKind::Draw(draw) => draw.vertex_count += N_VERTICES as u32,
            _ => unreachable!("open draw is not a draw batch"),
        }
    }

    /// Close the draw bracket: snapshot the framebuffer, changed uniforms
    /// and changed texture binds, then merge into the previous batch or
    /// enqueue. Degenerate draws (no vertices) are discarded outright.
    pub fn end_draw(&mut self) {
        assert!(self.in_draw, "end_draw without begin_draw");
        self.in_draw = false;

        let program = self.batches.last().unwrap_or_else(|| unreachable!()).program;
        let draw = {
            let batch = self.batches.last_mut().unwrap_or_else(|| unreachable!());
            match &mut batch.kind {
                BatchKind::Draw(draw) => draw,
                _ => unreachable!("open draw is not a draw batch"),
            }
        };

        if draw.vertex_count == 0 {
            self.batches.pop();
            return;
        }

        draw.framebuffer = self.attachments.framebuffer.id;
        self.attachments.framebuffer.changed = false;

        let uniform_offset = self.batch_uniforms.len() as u32;
        let uniform_count = self
            .uniforms
            .borrow_mut()
            .snapshot(program, &mut self.batch_uniforms) as u32;

        let bind_offset = self.batch_binds.len() as u32;
        let mut bind_count = 0u32;
        for (unit, binding) in self.attachments.textures.iter_mut().enumerate() {
            if binding.changed && binding.id != 0 {
                binding.changed = false;
                self.batch_binds.push(TextureBind {
                    unit: unit as u32,
                    id: binding.id,
                });
                bind_count += 1;
            }
        }

        let draw = {
            let batch = self.batches.last_mut().unwrap_or_else(|| unreachable!());
            match &mut batch.kind {
                BatchKind::Draw(draw) => draw,
                _ => unreachable!(),
            }
        };
        draw.uniform_offset = uniform_offset;
        draw.uniform_count = uniform_count;
        draw.bind_offset = bind_offset;
        draw.bind_count = bind_count;

        if uniform_count == 0 && bind_count == 0 && self.try_merge_last_batch() {
            return;
        }

        self.enqueue_last_batch();
    }

    /// Extend the previous draw batch with the pending one when nothing
    /// about the device state differs between them.
    fn try_merge_last_batch(&mut self) -> bool {
        if self.batches.len() < 2 {
            return false;
        }

        let split = self.batches.len() - 1;
        let (head, tail) = self.batches.split_at_mut(split);
        let prev = head.last_mut().unwrap_or_else(|| unreachable!());
        let new = &tail[0];

        let new_draw = match &new.kind {
            BatchKind::Draw(draw) => *draw,
            _ => unreachable!(),
        };
        let prev_draw = match &mut prev.kind {
            BatchKind::Draw(draw) => draw,
            _ => return false,
        };

        if prev.program == new.program
            && prev.viewport_width == new.viewport_width
            && prev.viewport_height == new.viewport_height
            && prev_draw.framebuffer == new_draw.framebuffer
            && prev_draw.vertex_offset + prev_draw.vertex_count == new_draw.vertex_offset
        {
            prev_draw.vertex_count += new_draw.vertex_count;
            self.batches.pop();
            return true;
        }

        false
    }

    /// Record a clear of the currently bound framebuffer. Empty `bits`
    /// clears color, depth and stencil.
    pub fn clear(&mut self, bits: ClearBits, viewport: &Rect) {
        assert!(!self.in_draw, "clear inside a draw bracket");

        let bits = if bits.is_empty() {
            ClearBits::all()
        } else {
            bits
        };

        self.batches.push(Batch {
            program: 0,
            next: NO_BATCH,
            viewport_width: viewport.width as u16,
            viewport_height: viewport.height as u16,
            kind: BatchKind::Clear {
                bits,
                framebuffer: self.attachments.framebuffer.id,
            },
        });
        self.attachments.framebuffer.changed = false;
        self.enqueue_last_batch();
    }

    pub fn push_debug_group(&mut self, message: &str) {
        assert!(!self.in_draw, "debug group inside a draw bracket");
        let index = self.debug_messages.len() as u32;
        self.debug_messages.push(message.to_owned());
        self.batches.push(Batch {
            program: 0,
            next: NO_BATCH,
            viewport_width: 0,
            viewport_height: 0,
            kind: BatchKind::PushDebugGroup { message: index },
        });
        self.enqueue_last_batch();
    }

    pub fn pop_debug_group(&mut self) {
        assert!(!self.in_draw, "debug group inside a draw bracket");
        self.batches.push(Batch {
            program: 0,
            next: NO_BATCH,
            viewport_width: 0,
            viewport_height: 0,
            kind: BatchKind::PopDebugGroup,
        });
        self.enqueue_last_batch();
    }

    pub fn set_uniform1f(&mut self, program: u32, location: i32, v: f32) {
        self.uniforms
            .borrow_mut()
            .set(program, location, UniformValue::Float(v));
    }

    pub fn set_uniform2f(&mut self, program: u32, location: i32, a: f32, b: f32) {
        self.uniforms
            .borrow_mut()
            .set(program, location, UniformValue::Float2([a, b]));
    }

    pub fn set_uniform1i(&mut self, program: u32, location: i32, v: i32) {
        self.uniforms
            .borrow_mut()
            .set(program, location, UniformValue::Int(v));
    }

    pub fn set_uniform1fv(&mut self, program: u32, location: i32, values: &[f32]) {
        self.uniforms.borrow_mut().set(
            program,
            location,
            UniformValue::FloatArray(values.into()),
        );
    }

    pub fn set_uniform_matrix(&mut self, program: u32, location: i32, matrix: &crate::transform::Transform) {
        self.uniforms
            .borrow_mut()
            .set(program, location, UniformValue::Matrix(matrix.to_cols()));
    }

    pub fn set_uniform_color(&mut self, program: u32, location: i32, color: &crate::scene::Color) {
        self.uniforms
            .borrow_mut()
            .set(program, location, UniformValue::Color(color.to_array()));
    }

    pub fn set_uniform_rounded_rect(
        &mut self,
        program: u32,
        location: i32,
        rect: &crate::geometry::RoundedRect,
    ) {
        self.uniforms.borrow_mut().set(
            program,
            location,
            UniformValue::RoundedRect {
                rect: *rect,
                send_corners: !rect.is_rectilinear(),
            },
        );
    }

    /// Bind `texture` to `unit` and point the sampler uniform at it.
    pub fn set_uniform_texture(&mut self, program: u32, location: i32, unit: u32, texture: u32) {
        self.attachments.bind_texture(unit, texture);
        self.uniforms
            .borrow_mut()
            .set(program, location, UniformValue::Texture(unit as i32));
    }

    /// Record a framebuffer binding for subsequent clears and draws.
    pub fn bind_framebuffer(&mut self, framebuffer: u32) {
        self.attachments.bind_framebuffer(framebuffer);
    }

    pub(crate) fn save_attachments(&mut self) {
        self.saved_attachments.push(self.attachments.clone());
    }

    pub(crate) fn restore_attachments(&mut self) {
        let saved = self
            .saved_attachments
            .pop()
            .unwrap_or_else(|| panic!("restore without matching save"));
        self.attachments.restore_from(saved);
    }

    pub fn create_texture(&mut self, width: i32, height: i32) -> Result<u32, RenderError> {
        if width > self.max_texture_size || height > self.max_texture_size {
            return Err(RenderError::TextureTooLarge {
                width,
                height,
                max: self.max_texture_size,
            });
        }
        Ok(self.context.borrow_mut().create_texture(width, height))
    }

    pub fn create_framebuffer(&mut self) -> u32 {
        self.context.borrow_mut().create_framebuffer()
    }

    /// Allocate a texture-backed framebuffer. Creation talks to the device
    /// immediately, so recorded attachment state is saved around it.
    pub fn create_render_target(
        &mut self,
        width: i32,
        height: i32,
    ) -> Result<RenderTarget, RenderError> {
        self.save_attachments();
        let result = self.create_texture(width, height).map(|texture| {
            let framebuffer = self.context.borrow_mut().create_framebuffer();
            self.context.borrow_mut().attach_texture(framebuffer, texture);
            RenderTarget {
                framebuffer,
                texture,
                width,
                height,
            }
        });
        self.restore_attachments();
        result
    }

    /// Queue a framebuffer for deletion once the frame has executed.
    pub fn autorelease_framebuffer(&mut self, framebuffer: u32) {
        self.autorelease_framebuffers.push(framebuffer);
    }

    /// Queue a texture for deletion once the frame has executed.
    pub fn autorelease_texture(&mut self, texture: u32) {
        self.autorelease_textures.push(texture);
    }

    /// Delete a program on the device and forget its cached uniforms.
    pub fn delete_program(&mut self, program: u32) {
        self.context.borrow_mut().delete_program(program);
        self.uniforms.borrow_mut().clear_program(program);
    }

    /// Replay the recorded frame against the device. State (program,
    /// framebuffer, viewport, scissor) is tracked across batches and only
    /// re-applied when a batch actually needs something different.
    ///
    /// `scissor` is in logical surface coordinates and applies only when
    /// rendering to the default framebuffer; it is flipped to the device's
    /// bottom-left origin using `surface_height` and `scale_factor`.
    pub fn execute(&mut self, surface_height: u32, scale_factor: f32, scissor: Option<&Rect>) {
        assert!(!self.in_draw, "execute inside a draw bracket");

        if self.batches.is_empty() {
            return;
        }

        let mut context = self.context.borrow_mut();
        context.upload_vertices(bytemuck::cast_slice(&self.vertices));

        let mut current_program = 0u32;
        let mut current_framebuffer = u32::MAX;
        let mut current_width = 0u16;
        let mut current_height = 0u16;

        let apply_scissor = |context: &mut dyn GlContext, framebuffer: u32| {
            match scissor {
                // Intermediate targets render their full extent.
                Some(rect) if framebuffer == 0 => {
                    let x = rect.x * scale_factor;
                    let y = surface_height as f32 - (rect.y + rect.height) * scale_factor;
                    let width = rect.width * scale_factor;
                    let height = rect.height * scale_factor;
                    context.set_scissor(x as i32, y as i32, width as i32, height as i32);
                }
                _ => context.clear_scissor(),
            }
        };

        let mut next = 0i32;
        while next != NO_BATCH {
            let batch = &self.batches[next as usize];
            assert!(batch.next != next, "batch chain must not self-reference");

            match &batch.kind {
                BatchKind::Clear { bits, framebuffer } => {
                    if current_framebuffer != *framebuffer {
                        current_framebuffer = *framebuffer;
                        context.bind_framebuffer(*framebuffer);
                        apply_scissor(&mut *context, *framebuffer);
                    }
                    if current_width != batch.viewport_width
                        || current_height != batch.viewport_height
                    {
                        current_width = batch.viewport_width;
                        current_height = batch.viewport_height;
                        context.viewport(current_width, current_height);
                    }
                    context.clear(*bits);
                }
                BatchKind::PushDebugGroup { message } => {
                    context.push_debug_group(&self.debug_messages[*message as usize]);
                }
                BatchKind::PopDebugGroup => {
                    context.pop_debug_group();
                }
                BatchKind::Draw(draw) => {
                    if current_program != batch.program {
                        current_program = batch.program;
                        context.use_program(current_program);
                    }
                    if current_framebuffer != draw.framebuffer {
                        current_framebuffer = draw.framebuffer;
                        context.bind_framebuffer(current_framebuffer);
                        apply_scissor(&mut *context, current_framebuffer);
                    }
                    if current_width != batch.viewport_width
                        || current_height != batch.viewport_height
                    {
                        current_width = batch.viewport_width;
                        current_height = batch.viewport_height;
                        context.viewport(current_width, current_height);
                    }

                    let binds = draw.bind_offset as usize
                        ..(draw.bind_offset + draw.bind_count) as usize;
                    for bind in &self.batch_binds[binds] {
                        context.bind_texture(bind.unit, bind.id);
                    }

                    let changes = draw.uniform_offset as usize
                        ..(draw.uniform_offset + draw.uniform_count) as usize;
                    for change in &self.batch_uniforms[changes] {
                        apply_uniform(&mut *context, change);
                    }

                    context.draw_arrays(draw.vertex_offset, draw.vertex_count);
                }
            }

            next = batch.next;
        }
    }

    // Introspection for unit tests.
    #[cfg(test)]
    pub(crate) fn batches(&self) -> &[Batch] {
        &self.batches
    }

    #[cfg(test)]
    pub(crate) fn vertices(&self) -> &[DrawVertex] {
        &self.vertices
    }

    #[cfg(test)]
    pub(crate) fn uniform_changes(&self) -> &[UniformChange] {
        &self.batch_uniforms
    }
}

/// Issue the device call matching a recorded uniform change.
fn apply_uniform(context: &mut dyn GlContext, change: &UniformChange) {
    let location = change.location;
    match &change.value {
        UniformValue::Float(v) => context.uniform1f(location, *v),
        UniformValue::Float2([a, b]) => context.uniform2f(location, *a, *b),
        UniformValue::Float3([a, b, c]) => context.uniform3f(location, *a, *b, *c),
        UniformValue::Float4([a, b, c, d]) => context.uniform4f(location, *a, *b, *c, *d),
        UniformValue::Int(v) | UniformValue::Texture(v) => context.uniform1i(location, *v),
        UniformValue::FloatArray(values) => context.uniform1fv(location, values),
        UniformValue::Matrix(cols) => context.uniform_matrix4fv(location, cols),
        UniformValue::Color(rgba) => context.uniform4fv(location, rgba),
        UniformValue::RoundedRect { rect, send_corners } => {
            let floats = rect.to_floats();
            if *send_corners {
                context.uniform4fv(location, &floats);
            } else {
                context.uniform4fv(location, &floats[0..4]);
            }
        }
    }
}
