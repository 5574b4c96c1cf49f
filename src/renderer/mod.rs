//! The rendering backend: records a scene graph into batched draw commands
//! and replays them against a [`GlContext`].
//!
//! A frame goes through three layers. The [`RenderJob`](job) traverses the
//! scene, the [`CommandQueue`](command_queue) batches and merges the
//! resulting draws, and the [`Program`](program) layer routes uniform values
//! through a diffing cache so unchanged state never reaches the device.

mod attachments;
mod command_queue;
mod driver;
mod gl;
mod job;
mod program;
#[cfg(test)]
pub(crate) mod testing;
mod uniforms;
mod vertex;

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;

use crate::geometry::Rect;
use crate::scene::Node;

use self::job::RenderJob;

pub use self::command_queue::{CommandQueue, RenderTarget};
pub use self::driver::{Driver, ShaderPrograms};
pub use self::gl::{ClearBits, GlContext};
pub use self::program::Program;
pub use self::uniforms::{UniformState, UniformValue};
pub use self::vertex::{DrawVertex, N_VERTICES};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("texture size {width}x{height} exceeds device maximum {max}")]
    TextureTooLarge { width: i32, height: i32, max: i32 },
}

/// Which rendering backend to construct. Only the immediate GL-style
/// backend exists today; the variant keeps call sites ready for others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gl,
}

/// One renderer attached to a device context.
pub trait RenderBackend {
    fn begin_frame(&mut self);

    /// Record and execute a frame into `framebuffer`. `viewport` is in
    /// device pixels; `damage`, when given, limits the updated region.
    fn render(
        &mut self,
        root: &Node,
        viewport: &Rect,
        scale_factor: f32,
        damage: Option<&[Rect]>,
        framebuffer: u32,
    );

    /// Render into a fresh texture of the viewport's size and return it.
    /// The caller owns the texture.
    fn render_to_texture(&mut self, root: &Node, viewport: &Rect) -> Result<u32, RenderError>;

    fn end_frame(&mut self);
}

pub fn create_backend(
    backend: Backend,
    context: Rc<RefCell<dyn GlContext>>,
    shaders: &ShaderPrograms,
) -> Box<dyn RenderBackend> {
    match backend {
        Backend::Gl => Box::new(GlRenderer::new(context, shaders)),
    }
}

pub struct GlRenderer {
    driver: Driver,
}

impl GlRenderer {
    pub fn new(context: Rc<RefCell<dyn GlContext>>, shaders: &ShaderPrograms) -> Self {
        Self {
            driver: Driver::new(context, shaders),
        }
    }

    /// Share a uniform cache with other renderers on the same device.
    pub fn with_shared_uniforms(
        context: Rc<RefCell<dyn GlContext>>,
        shaders: &ShaderPrograms,
        uniforms: Rc<RefCell<UniformState>>,
    ) -> Self {
        Self {
            driver: Driver::with_shared_uniforms(context, shaders, uniforms),
        }
    }
}

impl RenderBackend for GlRenderer {
    fn begin_frame(&mut self) {
        self.driver.begin_frame();
    }

    fn render(
        &mut self,
        root: &Node,
        viewport: &Rect,
        scale_factor: f32,
        damage: Option<&[Rect]>,
        framebuffer: u32,
    ) {
        self.driver.assert_in_frame();
        let Driver {
            command_queue,
            programs,
            ..
        } = &mut self.driver;
        let mut job = RenderJob::new(
            command_queue,
            programs,
            viewport,
            scale_factor,
            damage,
            framebuffer,
            true,
        );
        job.render(root);
    }

    fn render_to_texture(&mut self, root: &Node, viewport: &Rect) -> Result<u32, RenderError> {
        self.driver.assert_in_frame();
        let width = viewport.width.ceil() as i32;
        let height = viewport.height.ceil() as i32;
        let target = self.driver.create_render_target(width, height)?;

        {
            let Driver {
                command_queue,
                programs,
                ..
            } = &mut self.driver;
            command_queue.bind_framebuffer(target.framebuffer);
            let mut job = RenderJob::new(
                command_queue,
                programs,
                viewport,
                1.0,
                None,
                target.framebuffer,
                false,
            );
            job.render(root);
        }

        Ok(self.driver.release_render_target(target))
    }

    fn end_frame(&mut self) {
        self.driver.end_frame();
    }
}
