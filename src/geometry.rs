//! Axis-aligned rectangles and rounded rectangles used for culling and clipping.

/// A 2D point in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Closed-interval intersection test. Rects that merely share an edge
    /// still intersect, so clip culling never drops edge-adjacent content.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.x > other.x + other.width
            || self.x + self.width < other.x
            || self.y > other.y + other.height
            || self.y + self.height < other.y)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.x + other.width <= self.x + self.width
            && other.y >= self.y
            && other.y + other.height <= self.y + self.height
    }

    /// Intersection of two rects, clamped to non-negative dimensions.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let min_x = self.x.max(other.x);
        let min_y = self.y.max(other.y);
        let max_x = (self.x + self.width).min(other.x + other.width);
        let max_y = (self.y + self.height).min(other.y + other.height);

        Rect::new(
            min_x,
            min_y,
            (max_x - min_x).max(0.0),
            (max_y - min_y).max(0.0),
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let min_x = self.x.min(other.x);
        let min_y = self.y.min(other.y);
        let max_x = (self.x + self.width).max(other.x + other.width);
        let max_y = (self.y + self.height).max(other.y + other.height);

        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Axis-aligned bounding box of a set of points.
    pub fn from_points(points: &[(f32, f32)]) -> Rect {
        let (min_x, max_x, min_y, max_y) = points.iter().fold(
            (
                f32::INFINITY,
                f32::NEG_INFINITY,
                f32::INFINITY,
                f32::NEG_INFINITY,
            ),
            |(min_x, max_x, min_y, max_y), &(x, y)| {
                (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
            },
        );
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Corner indices for [`RoundedRect`], clockwise from top-left.
pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_RIGHT: usize = 2;
pub const BOTTOM_LEFT: usize = 3;

/// The horizontal and vertical radius of one rounded corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CornerSize {
    pub width: f32,
    pub height: f32,
}

impl CornerSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// A rectangle with four independently rounded corners.
///
/// A clip region is *rectilinear* iff all four corners have zero radius;
/// rectilinear clips are the cheap case throughout the clip algebra.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoundedRect {
    pub bounds: Rect,
    pub corner: [CornerSize; 4],
}

impl RoundedRect {
    /// A rectilinear rounded rect (all corner radii zero).
    pub const fn from_rect(bounds: Rect) -> Self {
        Self {
            bounds,
            corner: [CornerSize::new(0.0, 0.0); 4],
        }
    }

    pub const fn with_uniform_radius(bounds: Rect, radius: f32) -> Self {
        Self {
            bounds,
            corner: [CornerSize::new(radius, radius); 4],
        }
    }

    pub fn is_rectilinear(&self) -> bool {
        self.corner
            .iter()
            .all(|c| c.width == 0.0 && c.height == 0.0)
    }

    pub fn has_corner(&self, i: usize) -> bool {
        self.corner[i].width > 0.0 && self.corner[i].height > 0.0
    }

    /// Bounding rect of corner arc `i`.
    pub fn corner_rect(&self, i: usize) -> Rect {
        let b = &self.bounds;
        let c = &self.corner[i];
        match i {
            TOP_LEFT => Rect::new(b.x, b.y, c.width, c.height),
            TOP_RIGHT => Rect::new(b.x + b.width - c.width, b.y, c.width, c.height),
            BOTTOM_RIGHT => Rect::new(
                b.x + b.width - c.width,
                b.y + b.height - c.height,
                c.width,
                c.height,
            ),
            BOTTOM_LEFT => Rect::new(b.x, b.y + b.height - c.height, c.width, c.height),
            _ => unreachable!("invalid corner index {i}"),
        }
    }

    /// Conservative inscribed rectangle: bounds shrunk by the larger of each
    /// pair of adjacent corner radii. Anything inside it is unaffected by the
    /// corner arcs.
    pub fn inner_rect(&self) -> Rect {
        let offset_x = self.corner[TOP_LEFT]
            .width
            .max(self.corner[BOTTOM_LEFT].width);
        let offset_y = self.corner[TOP_LEFT]
            .height
            .max(self.corner[TOP_RIGHT].height);

        Rect::new(
            self.bounds.x + offset_x,
            self.bounds.y + offset_y,
            self.bounds.width
                - offset_x
                - self.corner[TOP_RIGHT]
                    .width
                    .max(self.corner[BOTTOM_RIGHT].width),
            self.bounds.height
                - offset_y
                - self.corner[BOTTOM_LEFT]
                    .height
                    .max(self.corner[BOTTOM_RIGHT].height),
        )
    }

    pub fn inner_contains_rect(&self, rect: &Rect) -> bool {
        self.inner_rect().contains_rect(rect)
    }

    /// Flat layout used for the rounded-rect shader uniform: bounds followed
    /// by the four corner sizes, three vec4s in total.
    pub fn to_floats(&self) -> [f32; 12] {
        [
            self.bounds.x,
            self.bounds.y,
            self.bounds.width,
            self.bounds.height,
            self.corner[TOP_LEFT].width,
            self.corner[TOP_LEFT].height,
            self.corner[TOP_RIGHT].width,
            self.corner[TOP_RIGHT].height,
            self.corner[BOTTOM_RIGHT].width,
            self.corner[BOTTOM_RIGHT].height,
            self.corner[BOTTOM_LEFT].width,
            self.corner[BOTTOM_LEFT].height,
        ]
    }
}

/// Intersect a rectilinear clip with a rounded clip.
///
/// Returns the intersection when it is representable as a single rounded
/// rect: the bounding boxes intersected, keeping the radii of the rounded
/// operand's corners that overlap `rect` and zeroing the rest. Returns `None`
/// when a corner arc straddles the rect edge, in which case the caller has to
/// fall back to offscreen composition.
pub fn intersect_rounded_rectilinear(rect: &Rect, rounded: &RoundedRect) -> Option<RoundedRect> {
    let mut overlaps = [false; 4];

    for i in 0..4 {
        overlaps[i] = rounded.has_corner(i) && rect.intersects(&rounded.corner_rect(i));
        if overlaps[i] && !rect.contains_rect(&rounded.corner_rect(i)) {
            return None;
        }
    }

    let mut result = RoundedRect::from_rect(rect.intersection(&rounded.bounds));
    for i in 0..4 {
        if overlaps[i] {
            result.corner[i] = rounded.corner[i];
        }
    }

    Some(result)
}
