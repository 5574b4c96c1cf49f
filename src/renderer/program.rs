//! Linked shader programs and their uniform tables.
//!
//! Uniforms are addressed by small crate-defined keys so callers never deal
//! in raw device locations. The five shared uniforms every program declares
//! get dedicated cached locations because they are set on every draw.

use crate::geometry::{Rect, RoundedRect};
use crate::scene::Color;
use crate::transform::Transform;

use super::command_queue::CommandQueue;
use super::gl::GlContext;

/// Keys for the uniforms shared by every program.
pub const UNIFORM_SHARED_ALPHA: u32 = 0;
pub const UNIFORM_SHARED_SOURCE: u32 = 1;
pub const UNIFORM_SHARED_CLIP_RECT: u32 = 2;
pub const UNIFORM_SHARED_VIEWPORT: u32 = 3;
pub const UNIFORM_SHARED_PROJECTION: u32 = 4;
pub const UNIFORM_SHARED_MODELVIEW: u32 = 5;
pub const UNIFORM_SHARED_LAST: u32 = 6;

/// Per-program keys start where the shared block ends.
pub const UNIFORM_COLOR_COLOR: u32 = UNIFORM_SHARED_LAST;

pub const UNIFORM_LINEAR_GRADIENT_NUM_COLOR_STOPS: u32 = UNIFORM_SHARED_LAST;
pub const UNIFORM_LINEAR_GRADIENT_COLOR_STOPS: u32 = UNIFORM_SHARED_LAST + 1;
pub const UNIFORM_LINEAR_GRADIENT_START_POINT: u32 = UNIFORM_SHARED_LAST + 2;
pub const UNIFORM_LINEAR_GRADIENT_END_POINT: u32 = UNIFORM_SHARED_LAST + 3;

/// Location value for a uniform the program does not use.
const NO_LOCATION: i32 = -1;

#[derive(Debug)]
pub struct Program {
    id: u32,
    name: String,
    /// Key -> device location, [`NO_LOCATION`] for unused uniforms.
    locations: Vec<i32>,
    viewport_location: i32,
    projection_location: i32,
    modelview_location: i32,
    clip_rect_location: i32,
    alpha_location: i32,
}

impl Program {
    pub fn new(name: impl Into<String>, id: u32) -> Self {
        Self {
            id,
            name: name.into(),
            locations: Vec::new(),
            viewport_location: NO_LOCATION,
            projection_location: NO_LOCATION,
            modelview_location: NO_LOCATION,
            clip_rect_location: NO_LOCATION,
            alpha_location: NO_LOCATION,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve `name` and register it under `key`. Returns false when the
    /// program has no such uniform; callers treat that as a soft miss since
    /// linkers drop unused uniforms.
    pub fn add_uniform(&mut self, context: &mut dyn GlContext, name: &str, key: u32) -> bool {
        let Some(location) = context.uniform_location(self.id, name) else {
            log::debug!("program {}: uniform {name} not present", self.name);
            return false;
        };

        let index = key as usize;
        if self.locations.len() <= index {
            self.locations.resize(index + 1, NO_LOCATION);
        }
        self.locations[index] = location;

        match key {
            UNIFORM_SHARED_VIEWPORT => self.viewport_location = location,
            UNIFORM_SHARED_PROJECTION => self.projection_location = location,
            UNIFORM_SHARED_MODELVIEW => self.modelview_location = location,
            UNIFORM_SHARED_CLIP_RECT => self.clip_rect_location = location,
            UNIFORM_SHARED_ALPHA => self.alpha_location = location,
            _ => {}
        }

        true
    }

    fn location(&self, key: u32) -> i32 {
        self.locations
            .get(key as usize)
            .copied()
            .unwrap_or(NO_LOCATION)
    }

    pub fn set_uniform1f(&self, queue: &mut CommandQueue, key: u32, v: f32) {
        let location = self.location(key);
        if location != NO_LOCATION {
            queue.set_uniform1f(self.id, location, v);
        }
    }

    pub fn set_uniform2f(&self, queue: &mut CommandQueue, key: u32, a: f32, b: f32) {
        let location = self.location(key);
        if location != NO_LOCATION {
            queue.set_uniform2f(self.id, location, a, b);
        }
    }

    pub fn set_uniform1i(&self, queue: &mut CommandQueue, key: u32, v: i32) {
        let location = self.location(key);
        if location != NO_LOCATION {
            queue.set_uniform1i(self.id, location, v);
        }
    }

    pub fn set_uniform1fv(&self, queue: &mut CommandQueue, key: u32, values: &[f32]) {
        let location = self.location(key);
        if location != NO_LOCATION {
            queue.set_uniform1fv(self.id, location, values);
        }
    }

    pub fn set_uniform_color(&self, queue: &mut CommandQueue, key: u32, color: &Color) {
        let location = self.location(key);
        if location != NO_LOCATION {
            queue.set_uniform_color(self.id, location, color);
        }
    }

    pub fn set_uniform_texture(
        &self,
        queue: &mut CommandQueue,
        key: u32,
        unit: u32,
        texture: u32,
    ) {
        let location = self.location(key);
        if location != NO_LOCATION {
            queue.set_uniform_texture(self.id, location, unit, texture);
        }
    }

    /// Set the shared per-draw uniforms and open the draw bracket.
    #[allow(clippy::too_many_arguments)]
    pub fn begin_draw(
        &self,
        queue: &mut CommandQueue,
        viewport: &Rect,
        projection: &Transform,
        modelview: &Transform,
        clip: &RoundedRect,
        alpha: f32,
    ) {
        if self.viewport_location != NO_LOCATION {
            queue.set_uniform2f(
                self.id,
                self.viewport_location,
                viewport.width,
                viewport.height,
            );
        }
        if self.projection_location != NO_LOCATION {
            queue.set_uniform_matrix(self.id, self.projection_location, projection);
        }
        if self.modelview_location != NO_LOCATION {
            queue.set_uniform_matrix(self.id, self.modelview_location, modelview);
        }
        if self.clip_rect_location != NO_LOCATION {
            queue.set_uniform_rounded_rect(self.id, self.clip_rect_location, clip);
        }
        if self.alpha_location != NO_LOCATION {
            queue.set_uniform1f(self.id, self.alpha_location, alpha);
        }

        queue.begin_draw(self.id, viewport);
    }

    pub fn end_draw(&self, queue: &mut CommandQueue) {
        queue.end_draw();
    }

    pub fn delete(&self, queue: &mut CommandQueue) {
        queue.delete_program(self.id);
    }
}
