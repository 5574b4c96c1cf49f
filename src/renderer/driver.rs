//! Shared GPU state for one device: the command queue, the uniform cache
//! and the built-in program set.

use std::cell::RefCell;
use std::rc::Rc;

use super::command_queue::{CommandQueue, RenderTarget};
use super::gl::GlContext;
use super::program::{
    Program, UNIFORM_COLOR_COLOR, UNIFORM_LINEAR_GRADIENT_COLOR_STOPS,
    UNIFORM_LINEAR_GRADIENT_END_POINT, UNIFORM_LINEAR_GRADIENT_NUM_COLOR_STOPS,
    UNIFORM_LINEAR_GRADIENT_START_POINT, UNIFORM_SHARED_ALPHA, UNIFORM_SHARED_CLIP_RECT,
    UNIFORM_SHARED_MODELVIEW, UNIFORM_SHARED_PROJECTION, UNIFORM_SHARED_SOURCE,
    UNIFORM_SHARED_VIEWPORT,
};
use super::uniforms::UniformState;
use super::RenderError;

/// Device ids of the externally compiled and linked shader programs.
///
/// Shader compilation is not this crate's concern; the embedder links the
/// programs against the documented uniform names and hands over the ids.
#[derive(Debug, Clone, Copy)]
pub struct ShaderPrograms {
    pub color: u32,
    pub linear_gradient: u32,
    pub blit: u32,
}

pub(crate) struct Programs {
    pub color: Program,
    pub linear_gradient: Program,
    pub blit: Program,
}

pub struct Driver {
    pub(crate) command_queue: CommandQueue,
    pub(crate) programs: Programs,
    in_frame: bool,
}

impl Driver {
    pub fn new(context: Rc<RefCell<dyn GlContext>>, shaders: &ShaderPrograms) -> Self {
        let uniforms = Rc::new(RefCell::new(UniformState::new()));
        Self::with_shared_uniforms(context, shaders, uniforms)
    }

    /// Build a driver sharing a uniform cache with other drivers on the
    /// same device, so cached program state stays coherent across renderers.
    pub fn with_shared_uniforms(
        context: Rc<RefCell<dyn GlContext>>,
        shaders: &ShaderPrograms,
        uniforms: Rc<RefCell<UniformState>>,
    ) -> Self {
        let programs = {
            let mut device = context.borrow_mut();
            let device = &mut *device;

            let mut color = Program::new("color", shaders.color);
            add_shared_uniforms(&mut color, device);
            color.add_uniform(device, "u_color", UNIFORM_COLOR_COLOR);

            let mut linear_gradient = Program::new("linear_gradient", shaders.linear_gradient);
            add_shared_uniforms(&mut linear_gradient, device);
            linear_gradient.add_uniform(
                device,
                "u_num_color_stops",
                UNIFORM_LINEAR_GRADIENT_NUM_COLOR_STOPS,
            );
            linear_gradient.add_uniform(
                device,
                "u_color_stops",
                UNIFORM_LINEAR_GRADIENT_COLOR_STOPS,
            );
            linear_gradient.add_uniform(
                device,
                "u_start_point",
                UNIFORM_LINEAR_GRADIENT_START_POINT,
            );
            linear_gradient.add_uniform(device, "u_end_point", UNIFORM_LINEAR_GRADIENT_END_POINT);

            let mut blit = Program::new("blit", shaders.blit);
            add_shared_uniforms(&mut blit, device);

            Programs {
                color,
                linear_gradient,
                blit,
            }
        };

        Self {
            command_queue: CommandQueue::new(context, uniforms),
            programs,
            in_frame: false,
        }
    }

    pub fn begin_frame(&mut self) {
        assert!(!self.in_frame, "frames cannot nest");
        self.in_frame = true;
        self.command_queue.begin_frame();
    }

    pub fn end_frame(&mut self) {
        self.assert_in_frame();
        self.command_queue.end_frame();
        self.in_frame = false;
    }

    pub(crate) fn assert_in_frame(&self) {
        assert!(self.in_frame, "not inside begin_frame/end_frame");
    }

    pub fn create_render_target(
        &mut self,
        width: i32,
        height: i32,
    ) -> Result<RenderTarget, RenderError> {
        self.command_queue.create_render_target(width, height)
    }

    /// Give up a render target, keeping its texture. The framebuffer is
    /// deleted after the current frame; the caller owns the returned
    /// texture id.
    pub fn release_render_target(&mut self, target: RenderTarget) -> u32 {
        self.command_queue.autorelease_framebuffer(target.framebuffer);
        target.texture
    }
}

fn add_shared_uniforms(program: &mut Program, device: &mut dyn GlContext) {
    program.add_uniform(device, "u_alpha", UNIFORM_SHARED_ALPHA);
    program.add_uniform(device, "u_source", UNIFORM_SHARED_SOURCE);
    program.add_uniform(device, "u_clip_rect", UNIFORM_SHARED_CLIP_RECT);
    program.add_uniform(device, "u_viewport", UNIFORM_SHARED_VIEWPORT);
    program.add_uniform(device, "u_projection", UNIFORM_SHARED_PROJECTION);
    program.add_uniform(device, "u_modelview", UNIFORM_SHARED_MODELVIEW);
}

#[cfg(test)]
mod tests {
    use super::super::testing::test_context;
    use super::*;

    const SHADERS: ShaderPrograms = ShaderPrograms {
        color: 1,
        linear_gradient: 2,
        blit: 3,
    };

    #[test]
    fn test_frame_bracket() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        driver.end_frame();
        driver.begin_frame();
        driver.end_frame();
    }

    #[test]
    #[should_panic(expected = "frames cannot nest")]
    fn test_nested_frames_panic() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        driver.begin_frame();
    }

    #[test]
    fn test_release_render_target_keeps_texture() {
        let (recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        let target = driver.create_render_target(32, 32).unwrap();
        let texture = driver.release_render_target(target);
        driver.end_frame();

        let calls = &recorder.borrow().calls;
        use super::super::testing::Call;
        assert!(calls.contains(&Call::DeleteFramebuffer(target.framebuffer)));
        assert!(!calls.contains(&Call::DeleteTexture(texture)));
    }
}
