//! One frame's traversal of the scene graph.
//!
//! The job walks the tree depth-first, turning nodes into recorded draws.
//! Plain translations accumulate in an offset applied directly to emitted
//! vertices; only transforms that actually need a matrix push a modelview
//! frame. Clips are intersected eagerly so subtrees outside the current
//! clip are culled without recording anything. Where the clip intersection
//! cannot be represented as a single rounded rect, or a General transform
//! wraps a subtree that is not transform-safe, the subtree is rendered to
//! an intermediate texture and composited as a quad.

use smallvec::SmallVec;

use crate::geometry::{intersect_rounded_rectilinear, Point, Rect, RoundedRect};
use crate::scene::{Color, ColorStop, Node, NodeKind};
use crate::transform::{Transform, TransformCategory};

use super::command_queue::CommandQueue;
use super::driver::Programs;
use super::gl::ClearBits;
use super::program::{
    UNIFORM_COLOR_COLOR, UNIFORM_LINEAR_GRADIENT_COLOR_STOPS, UNIFORM_LINEAR_GRADIENT_END_POINT,
    UNIFORM_LINEAR_GRADIENT_NUM_COLOR_STOPS, UNIFORM_LINEAR_GRADIENT_START_POINT,
    UNIFORM_SHARED_SOURCE,
};
use super::vertex::DrawVertex;

pub(crate) const ORTHO_NEAR_PLANE: f32 = -10000.0;
pub(crate) const ORTHO_FAR_PLANE: f32 = 10000.0;

/// Gradient stops the shader can take per draw.
pub(crate) const MAX_GRADIENT_STOPS: usize = 6;

struct ModelviewFrame {
    transform: Transform,
    scale_x: f32,
    scale_y: f32,
    offset_x_before: f32,
    offset_y_before: f32,
}

struct ClipFrame {
    rect: RoundedRect,
    is_rectilinear: bool,
}

pub(crate) struct RenderJob<'a> {
    queue: &'a mut CommandQueue,
    programs: &'a Programs,
    /// Target area in device pixels.
    viewport: Rect,
    projection: Transform,
    modelview: Vec<ModelviewFrame>,
    clip: Vec<ClipFrame>,
    /// Pending translation not yet folded into a modelview frame.
    offset_x: f32,
    offset_y: f32,
    /// Scale of the current modelview frame, for sizing offscreen targets.
    scale_x: f32,
    scale_y: f32,
    scale_factor: f32,
    framebuffer: u32,
    /// Damage extents in logical coordinates, scissored during execution.
    region: Option<Rect>,
}

fn ortho_projection(viewport: &Rect, flip_y: bool) -> Transform {
    let projection = Transform::ortho(
        viewport.x,
        viewport.x + viewport.width,
        viewport.y,
        viewport.y + viewport.height,
        ORTHO_NEAR_PLANE,
        ORTHO_FAR_PLANE,
    );
    if flip_y {
        Transform::scale_xy(1.0, -1.0).then(&projection)
    } else {
        projection
    }
}

impl<'a> RenderJob<'a> {
    /// `viewport` is in device pixels; `flip_y` is set when rendering to a
    /// surface (textures keep the device's Y direction).
    pub(crate) fn new(
        queue: &'a mut CommandQueue,
        programs: &'a Programs,
        viewport: &Rect,
        scale_factor: f32,
        damage: Option<&[Rect]>,
        framebuffer: u32,
        flip_y: bool,
    ) -> Self {
        let region = damage.and_then(|rects| {
            rects
                .iter()
                .copied()
                .reduce(|a, b| a.union(&b))
        });

        let mut job = Self {
            queue,
            programs,
            viewport: *viewport,
            projection: ortho_projection(viewport, flip_y),
            modelview: Vec::new(),
            clip: Vec::new(),
            offset_x: 0.0,
            offset_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            scale_factor,
            framebuffer,
            region,
        };

        job.set_modelview(Transform::scale(scale_factor));

        let clip_rect = match &job.region {
            Some(extents) => Rect::new(
                extents.x * scale_factor,
                extents.y * scale_factor,
                extents.width * scale_factor,
                extents.height * scale_factor,
            )
            .intersection(&job.viewport),
            None => job.viewport,
        };
        job.push_clip(RoundedRect::from_rect(clip_rect));

        job
    }

    /// Record and execute the whole frame.
    pub(crate) fn render(&mut self, root: &Node) {
        if self.framebuffer != 0 {
            self.queue.bind_framebuffer(self.framebuffer);
        }
        let viewport = self.viewport;
        self.queue.clear(ClearBits::empty(), &viewport);

        self.visit(root);

        self.queue.execute(
            self.viewport.height as u32,
            self.scale_factor,
            self.region.as_ref(),
        );
    }

    fn modelview_transform(&self) -> Transform {
        self.modelview
            .last()
            .map(|frame| frame.transform)
            .unwrap_or_default()
    }

    /// Push `transform` as-is, zeroing the offset accumulator. The popped
    /// frame restores the offsets that were pending.
    fn set_modelview(&mut self, transform: Transform) {
        let (scale_x, scale_y) = transform.scale_factors();
        self.modelview.push(ModelviewFrame {
            transform,
            scale_x,
            scale_y,
            offset_x_before: self.offset_x,
            offset_y_before: self.offset_y,
        });
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.scale_x = scale_x;
        self.scale_y = scale_y;
    }

    /// Compose `transform` onto the current frame, folding the pending
    /// offset in first.
    fn push_modelview(&mut self, transform: &Transform) {
        let composed = match self.modelview.last() {
            Some(head) => head
                .transform
                .then(&Transform::translate(self.offset_x, self.offset_y))
                .then(transform),
            None => *transform,
        };
        self.set_modelview(composed);
    }

    fn pop_modelview(&mut self) {
        let frame = self
            .modelview
            .pop()
            .unwrap_or_else(|| panic!("modelview stack underflow"));
        self.offset_x = frame.offset_x_before;
        self.offset_y = frame.offset_y_before;
        if let Some(head) = self.modelview.last() {
            self.scale_x = head.scale_x;
            self.scale_y = head.scale_y;
        }
    }

    fn push_clip(&mut self, rect: RoundedRect) {
        let is_rectilinear = rect.is_rectilinear();
        self.clip.push(ClipFrame {
            rect,
            is_rectilinear,
        });
    }

    fn pop_clip(&mut self) {
        if self.clip.pop().is_none() {
            panic!("clip stack underflow");
        }
    }

    fn current_clip(&self) -> &ClipFrame {
        self.clip
            .last()
            .unwrap_or_else(|| panic!("clip stack is empty"))
    }

    fn offset(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Bounds in device space: pending offset applied, then the modelview.
    fn transform_bounds(&self, rect: &Rect) -> Rect {
        let offset_rect = rect.offset(self.offset_x, self.offset_y);
        self.modelview_transform().transform_bounds(&offset_rect)
    }

    fn node_visible(&self, node: &Node) -> bool {
        let bounds = self.transform_bounds(node.bounds());
        self.current_clip().rect.bounds.intersects(&bounds)
    }

    /// Emit one quad at `rect` offset by the pending translation.
    fn draw_rect(&mut self, rect: &Rect) {
        let x0 = rect.x + self.offset_x;
        let y0 = rect.y + self.offset_y;
        let x1 = x0 + rect.width;
        let y1 = y0 + rect.height;

        self.queue.add_vertices([
            DrawVertex::new(x0, y0, 0.0, 0.0),
            DrawVertex::new(x0, y1, 0.0, 1.0),
            DrawVertex::new(x1, y0, 1.0, 0.0),
            DrawVertex::new(x1, y1, 1.0, 1.0),
            DrawVertex::new(x0, y1, 0.0, 1.0),
            DrawVertex::new(x1, y0, 1.0, 0.0),
        ]);
    }

    fn visit(&mut self, node: &Node) {
        if node.is_invisible() || !self.node_visible(node) {
            return;
        }

        match node.kind() {
            NodeKind::Container(children) => {
                for child in children {
                    self.visit(child);
                }
            }
            NodeKind::Debug { message, child } => {
                self.queue.push_debug_group(message);
                self.visit(child);
                self.queue.pop_debug_group();
            }
            NodeKind::Color(color) => self.visit_color(node.bounds(), *color),
            NodeKind::LinearGradient { start, end, stops } => {
                self.visit_linear_gradient(node.bounds(), *start, *end, stops)
            }
            NodeKind::Clip { clip, child } => {
                let local_clip = RoundedRect::from_rect(*clip);
                self.visit_clipped_child(child, &local_clip);
            }
            NodeKind::RoundedClip { clip, child } => {
                self.visit_clipped_child(child, &clip.clone());
            }
            NodeKind::Transform { transform, child } => {
                self.visit_transform(&transform.clone(), child)
            }
            // Remaining kinds are not drawn yet.
            _ => log::trace!("skipping unsupported node kind"),
        }
    }

    fn visit_color(&mut self, bounds: &Rect, color: Color) {
        let modelview = self.modelview_transform();
        let clip = self.current_clip().rect;
        let programs = self.programs;

        programs.color.begin_draw(
            self.queue,
            &self.viewport,
            &self.projection,
            &modelview,
            &clip,
            1.0,
        );
        programs
            .color
            .set_uniform_color(self.queue, UNIFORM_COLOR_COLOR, &color);
        self.draw_rect(bounds);
        programs.color.end_draw(self.queue);
    }

    fn visit_linear_gradient(&mut self, bounds: &Rect, start: Point, end: Point, stops: &[ColorStop]) {
        if stops.len() >= MAX_GRADIENT_STOPS {
            // Larger gradients need a dedicated path that is not built yet.
            log::debug!("skipping linear gradient with {} stops", stops.len());
            return;
        }

        let mut data: SmallVec<[f32; 30]> = SmallVec::new();
        for stop in stops {
            data.extend_from_slice(&[
                stop.offset,
                stop.color.r,
                stop.color.g,
                stop.color.b,
                stop.color.a,
            ]);
        }

        let modelview = self.modelview_transform();
        let clip = self.current_clip().rect;
        let programs = self.programs;

        programs.linear_gradient.begin_draw(
            self.queue,
            &self.viewport,
            &self.projection,
            &modelview,
            &clip,
            1.0,
        );
        programs.linear_gradient.set_uniform1i(
            self.queue,
            UNIFORM_LINEAR_GRADIENT_NUM_COLOR_STOPS,
            stops.len() as i32,
        );
        programs.linear_gradient.set_uniform1fv(
            self.queue,
            UNIFORM_LINEAR_GRADIENT_COLOR_STOPS,
            &data,
        );
        programs.linear_gradient.set_uniform2f(
            self.queue,
            UNIFORM_LINEAR_GRADIENT_START_POINT,
            start.x + self.offset_x,
            start.y + self.offset_y,
        );
        programs.linear_gradient.set_uniform2f(
            self.queue,
            UNIFORM_LINEAR_GRADIENT_END_POINT,
            end.x + self.offset_x,
            end.y + self.offset_y,
        );
        self.draw_rect(bounds);
        programs.linear_gradient.end_draw(self.queue);
    }

    fn visit_transform(&mut self, transform: &Transform, child: &Node) {
        match transform.category() {
            TransformCategory::Identity => self.visit(child),
            TransformCategory::Translate2d => {
                let (dx, dy) = transform.to_translate();
                self.offset(dx, dy);
                self.visit(child);
                self.offset(-dx, -dy);
            }
            TransformCategory::Affine2d => {
                self.push_modelview(transform);
                self.visit(child);
                self.pop_modelview();
            }
            TransformCategory::General => {
                if child.supports_transform() {
                    self.push_modelview(transform);
                    self.visit(child);
                    self.pop_modelview();
                } else if let Some(texture) = self.render_offscreen(child, None) {
                    self.push_modelview(transform);
                    self.draw_offscreen(child.bounds(), texture);
                    self.pop_modelview();
                }
            }
        }
    }

    /// Intersect the current clip with a clip given in node-local
    /// coordinates, per the representability rules, and visit the child
    /// under the result.
    fn visit_clipped_child(&mut self, child: &Node, local_clip: &RoundedRect) {
        let mut transformed = RoundedRect {
            bounds: self.transform_bounds(&local_clip.bounds),
            corner: local_clip.corner,
        };
        for corner in &mut transformed.corner {
            corner.width *= self.scale_x;
            corner.height *= self.scale_y;
        }

        if self.current_clip().is_rectilinear {
            // The new clip's radii survive; only the bounds tighten.
            let current_bounds = self.current_clip().rect.bounds;
            let result = RoundedRect {
                bounds: transformed.bounds.intersection(&current_bounds),
                corner: transformed.corner,
            };
            self.push_clip(result);
            self.visit(child);
            self.pop_clip();
        } else if transformed.is_rectilinear() {
            let current = self.current_clip().rect;
            match intersect_rounded_rectilinear(&transformed.bounds, &current) {
                Some(result) => {
                    self.push_clip(result);
                    self.visit(child);
                    self.pop_clip();
                }
                None => self.visit_clipped_offscreen(child, local_clip),
            }
        } else {
            let current = self.current_clip().rect;
            if transformed.inner_contains_rect(&current.bounds) {
                // The current clip is entirely inside the new one.
                self.visit(child);
            } else if current.inner_contains_rect(&transformed.bounds) {
                self.push_clip(transformed);
                self.visit(child);
                self.pop_clip();
            } else {
                self.visit_clipped_offscreen(child, local_clip);
            }
        }
    }

    fn visit_clipped_offscreen(&mut self, child: &Node, local_clip: &RoundedRect) {
        if let Some(texture) = self.render_offscreen(child, Some(local_clip)) {
            self.draw_offscreen(child.bounds(), texture);
        }
    }

    /// Render `node` into a fresh texture covering its bounds at the
    /// current scale. `local_clip`, when given, is applied inside the
    /// offscreen pass in the node's coordinate space. Returns the texture,
    /// valid until the end of the frame, or `None` when the target could
    /// not be allocated.
    fn render_offscreen(&mut self, node: &Node, local_clip: Option<&RoundedRect>) -> Option<u32> {
        let bounds = *node.bounds();
        let width = (bounds.width * self.scale_x).ceil().max(1.0) as i32;
        let height = (bounds.height * self.scale_y).ceil().max(1.0) as i32;

        let target = match self.queue.create_render_target(width, height) {
            Ok(target) => target,
            Err(err) => {
                log::warn!("skipping offscreen subtree: {err}");
                return None;
            }
        };

        let saved_viewport = self.viewport;
        let saved_projection = self.projection;

        self.viewport = Rect::new(0.0, 0.0, width as f32, height as f32);
        self.projection = ortho_projection(&self.viewport, false);

        self.queue.save_attachments();
        self.queue.bind_framebuffer(target.framebuffer);

        // Map the node's origin to the texture's origin at the scale the
        // texture was sized for.
        self.set_modelview(
            Transform::scale_xy(self.scale_x, self.scale_y)
                .then(&Transform::translate(-bounds.x, -bounds.y)),
        );

        let device_clip = match local_clip {
            Some(clip) => {
                let mut device_clip = RoundedRect {
                    bounds: Rect::new(
                        (clip.bounds.x - bounds.x) * self.scale_x,
                        (clip.bounds.y - bounds.y) * self.scale_y,
                        clip.bounds.width * self.scale_x,
                        clip.bounds.height * self.scale_y,
                    ),
                    corner: clip.corner,
                };
                for corner in &mut device_clip.corner {
                    corner.width *= self.scale_x;
                    corner.height *= self.scale_y;
                }
                device_clip
            }
            None => RoundedRect::from_rect(self.viewport),
        };
        self.push_clip(device_clip);

        let viewport = self.viewport;
        self.queue.clear(ClearBits::COLOR, &viewport);

        self.visit(node);

        self.pop_clip();
        self.pop_modelview();
        self.queue.restore_attachments();
        self.viewport = saved_viewport;
        self.projection = saved_projection;

        self.queue.autorelease_framebuffer(target.framebuffer);
        self.queue.autorelease_texture(target.texture);

        Some(target.texture)
    }

    /// Composite an offscreen texture back as a quad at `bounds`.
    fn draw_offscreen(&mut self, bounds: &Rect, texture: u32) {
        let modelview = self.modelview_transform();
        let clip = self.current_clip().rect;
        let programs = self.programs;

        programs.blit.begin_draw(
            self.queue,
            &self.viewport,
            &self.projection,
            &modelview,
            &clip,
            1.0,
        );
        programs
            .blit
            .set_uniform_texture(self.queue, UNIFORM_SHARED_SOURCE, 0, texture);
        self.draw_rect(bounds);
        programs.blit.end_draw(self.queue);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::super::command_queue::BatchKind;
    use super::super::driver::{Driver, ShaderPrograms};
    use super::super::gl::GlContext;
    use super::super::testing::{test_context, Call, RecordingContext};
    use super::super::uniforms::UniformValue;
    use super::*;
    use crate::geometry::CornerSize;

    const SHADERS: ShaderPrograms = ShaderPrograms {
        color: 1,
        linear_gradient: 2,
        blit: 3,
    };

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 100.0, 100.0);

    fn job_for(driver: &mut Driver) -> RenderJob<'_> {
        let Driver {
            command_queue,
            programs,
            ..
        } = driver;
        RenderJob::new(command_queue, programs, &VIEWPORT, 1.0, None, 0, true)
    }

    fn draw_batches(queue: &CommandQueue) -> Vec<super::super::command_queue::DrawInfo> {
        queue
            .batches()
            .iter()
            .filter_map(|batch| match &batch.kind {
                BatchKind::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_stack_symmetry() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let depth = job.modelview.len();
            let clips = job.clip.len();

            job.offset(10.0, 10.0);
            job.push_modelview(&Transform::scale(2.0));
            job.push_clip(RoundedRect::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
            assert_eq!(job.offset_x, 0.0);
            assert_eq!(job.scale_x, 2.0);

            job.pop_clip();
            job.pop_modelview();

            assert_eq!(job.modelview.len(), depth);
            assert_eq!(job.clip.len(), clips);
            assert_eq!((job.offset_x, job.offset_y), (10.0, 10.0));
            assert_eq!(job.scale_x, 1.0);
        }
        driver.end_frame();
    }

    #[test]
    fn test_translation_folds_into_offset() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::transform(
                Transform::translate(10.0, 10.0),
                Node::transform(
                    Transform::translate(5.0, -5.0),
                    Node::color(Rect::new(0.0, 0.0, 20.0, 20.0), Color::BLACK),
                ),
            );
            let depth = job.modelview.len();
            job.visit(&root);
            assert_eq!(job.modelview.len(), depth);
            assert_eq!((job.offset_x, job.offset_y), (0.0, 0.0));
        }
        let vertices = driver.command_queue.vertices();
        assert_eq!(vertices[0].position, [15.0, 5.0]);
        assert_eq!(draw_batches(&driver.command_queue).len(), 1);
        driver.end_frame();
    }

    #[test]
    fn test_invisible_subtree_prunes() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::container(vec![
                Node::color(Rect::new(0.0, 0.0, 0.0, 50.0), Color::BLACK),
                Node::color(Rect::new(0.0, 0.0, 10.0, f32::NAN), Color::BLACK),
            ]);
            job.visit(&root);
        }
        assert!(driver.command_queue.batches().is_empty());
        driver.end_frame();
    }

    #[test]
    fn test_clip_culls_outside_subtree() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            // The debug group would record a batch if the child were ever
            // visited.
            let root = Node::clip(
                Rect::new(0.0, 0.0, 10.0, 10.0),
                Node::debug(
                    "outside",
                    Node::color(Rect::new(50.0, 50.0, 20.0, 20.0), Color::BLACK),
                ),
            );
            job.visit(&root);
        }
        assert!(driver.command_queue.batches().is_empty());
        driver.end_frame();
    }

    #[test]
    fn test_opaque_fill_is_one_batch_one_uniform_no_binds() {
        // With the shared uniforms absent from the program, a plain fill
        // boils down to a single draw carrying only the color change.
        let recorder = Rc::new(RefCell::new(RecordingContext::new()));
        for name in [
            "u_alpha",
            "u_source",
            "u_clip_rect",
            "u_viewport",
            "u_projection",
            "u_modelview",
        ] {
            recorder
                .borrow_mut()
                .missing_uniforms
                .insert(name.to_owned());
        }
        let context: Rc<RefCell<dyn GlContext>> = recorder.clone();
        let mut driver = Driver::new(context, &SHADERS);

        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::color(Rect::new(0.0, 0.0, 100.0, 100.0), Color::WHITE);
            job.visit(&root);
        }
        let draws = draw_batches(&driver.command_queue);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].uniform_count, 1);
        assert_eq!(draws[0].bind_count, 0);
        driver.end_frame();
    }

    #[test]
    fn test_adjacent_fills_merge() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            // Second fill changes nothing: same program, same color, same
            // clip; its vertices are contiguous with the first.
            let root = Node::container(vec![
                Node::color(Rect::new(0.0, 0.0, 50.0, 100.0), Color::BLACK),
                Node::color(Rect::new(50.0, 0.0, 50.0, 100.0), Color::BLACK),
            ]);
            job.visit(&root);
        }
        assert_eq!(draw_batches(&driver.command_queue).len(), 1);
        driver.end_frame();
    }

    #[test]
    fn test_rounded_clip_radii_reach_the_shader() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::rounded_clip(
                RoundedRect::with_uniform_radius(Rect::new(0.0, 0.0, 80.0, 80.0), 12.0),
                Node::color(Rect::new(0.0, 0.0, 80.0, 80.0), Color::BLACK),
            );
            job.visit(&root);
        }
        let clip_change = driver
            .command_queue
            .uniform_changes()
            .iter()
            .find_map(|change| match &change.value {
                UniformValue::RoundedRect { rect, send_corners } => Some((*rect, *send_corners)),
                _ => None,
            });
        let (rect, send_corners) = clip_change.unwrap();
        assert!(send_corners);
        assert_eq!(rect.corner[0], CornerSize::new(12.0, 12.0));
        assert_eq!(rect.bounds, Rect::new(0.0, 0.0, 80.0, 80.0));
        driver.end_frame();
    }

    #[test]
    fn test_unrepresentable_clip_composites_offscreen() {
        let (recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            // Two rounded clips whose intersection is not a rounded rect:
            // neither inner rect contains the other's bounds.
            let root = Node::rounded_clip(
                RoundedRect::with_uniform_radius(Rect::new(0.0, 0.0, 100.0, 100.0), 20.0),
                Node::rounded_clip(
                    RoundedRect::with_uniform_radius(Rect::new(50.0, 50.0, 100.0, 100.0), 30.0),
                    Node::color(Rect::new(50.0, 50.0, 100.0, 100.0), Color::BLACK),
                ),
            );
            job.visit(&root);
        }

        assert!(recorder
            .borrow()
            .calls
            .iter()
            .any(|call| matches!(call, Call::CreateTexture(..))));

        // The composite draw binds the offscreen texture.
        let draws = draw_batches(&driver.command_queue);
        assert!(draws.iter().any(|draw| draw.bind_count == 1));
        driver.end_frame();
    }

    #[test]
    fn test_general_transform_safe_subtree_pushes_matrix() {
        let (recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::transform(
                Transform::rotate_degrees(45.0),
                Node::color(Rect::new(10.0, 10.0, 20.0, 20.0), Color::BLACK),
            );
            job.visit(&root);
            assert_eq!(job.modelview.len(), 1);
        }
        // Transform-safe content renders directly, no intermediate texture.
        assert!(!recorder
            .borrow()
            .calls
            .iter()
            .any(|call| matches!(call, Call::CreateTexture(..))));
        assert_eq!(draw_batches(&driver.command_queue).len(), 1);
        driver.end_frame();
    }

    #[test]
    fn test_general_transform_unsafe_subtree_goes_offscreen() {
        let (recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            // A clip is not transform-safe, so the rotated subtree must be
            // composited from a texture.
            let root = Node::transform(
                Transform::rotate_degrees(30.0),
                Node::clip(
                    Rect::new(0.0, 0.0, 40.0, 40.0),
                    Node::color(Rect::new(0.0, 0.0, 40.0, 40.0), Color::BLACK),
                ),
            );
            job.visit(&root);
            assert_eq!(job.modelview.len(), 1);
        }
        assert!(recorder
            .borrow()
            .calls
            .iter()
            .any(|call| matches!(call, Call::CreateTexture(..))));
        let draws = draw_batches(&driver.command_queue);
        assert!(draws.iter().any(|draw| draw.bind_count == 1));
        driver.end_frame();
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_offscreen_allocation_failure_degrades() {
        init_logging();
        let recorder = Rc::new(RefCell::new(RecordingContext::with_max_texture_size(16)));
        let context: Rc<RefCell<dyn GlContext>> = recorder.clone();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::transform(
                Transform::rotate_degrees(30.0),
                Node::clip(
                    Rect::new(0.0, 0.0, 40.0, 40.0),
                    Node::color(Rect::new(0.0, 0.0, 40.0, 40.0), Color::BLACK),
                ),
            );
            // The subtree is skipped, nothing panics, the stacks stay
            // balanced.
            job.visit(&root);
            assert_eq!(job.modelview.len(), 1);
            assert_eq!(job.clip.len(), 1);
        }
        assert!(draw_batches(&driver.command_queue).is_empty());
        driver.end_frame();
    }

    #[test]
    fn test_oversized_gradient_is_skipped() {
        init_logging();
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let stops = (0..8)
                .map(|i| ColorStop {
                    offset: i as f32 / 7.0,
                    color: Color::BLACK,
                })
                .collect();
            let root = Node::linear_gradient(
                Rect::new(0.0, 0.0, 50.0, 50.0),
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                stops,
            );
            job.visit(&root);
        }
        assert!(draw_batches(&driver.command_queue).is_empty());
        driver.end_frame();
    }

    #[test]
    fn test_gradient_uploads_stop_array() {
        let (_recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::linear_gradient(
                Rect::new(0.0, 0.0, 50.0, 50.0),
                Point::new(0.0, 0.0),
                Point::new(50.0, 0.0),
                vec![
                    ColorStop {
                        offset: 0.0,
                        color: Color::BLACK,
                    },
                    ColorStop {
                        offset: 1.0,
                        color: Color::WHITE,
                    },
                ],
            );
            job.visit(&root);
        }
        let has_stops = driver
            .command_queue
            .uniform_changes()
            .iter()
            .any(|change| match &change.value {
                UniformValue::FloatArray(values) => values.len() == 10,
                _ => false,
            });
        assert!(has_stops);
        assert_eq!(draw_batches(&driver.command_queue).len(), 1);
        driver.end_frame();
    }

    #[test]
    fn test_render_clears_and_executes() {
        let (recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::color(Rect::new(0.0, 0.0, 100.0, 100.0), Color::BLACK);
            job.render(&root);
        }
        driver.end_frame();

        let calls = &recorder.borrow().calls;
        assert!(calls.iter().any(|call| matches!(call, Call::Clear(_))));
        assert!(calls
            .iter()
            .any(|call| matches!(call, Call::DrawArrays(0, 6))));
    }

    #[test]
    fn test_debug_nodes_bracket_their_subtree() {
        let (recorder, context) = test_context();
        let mut driver = Driver::new(context, &SHADERS);
        driver.begin_frame();
        {
            let mut job = job_for(&mut driver);
            let root = Node::debug(
                "sidebar",
                Node::color(Rect::new(0.0, 0.0, 10.0, 10.0), Color::BLACK),
            );
            job.render(&root);
        }
        driver.end_frame();

        let calls = &recorder.borrow().calls;
        assert!(calls.contains(&Call::PushDebugGroup("sidebar".to_owned())));
        assert!(calls.contains(&Call::PopDebugGroup));
    }
}
