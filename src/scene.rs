//! The immutable scene graph consumed by the renderer.
//!
//! Nodes are reference-counted and never mutated after construction; a frame
//! is described by handing the renderer the root of a tree.

use std::rc::Rc;

use crate::geometry::{Point, Rect, RoundedRect};
use crate::transform::Transform;

/// Straight-alpha RGBA color, components in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// One stop of a gradient, `offset` in 0..=1 along the gradient line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

/// A node in the scene graph: its bounds in the parent's coordinate space
/// plus what it draws.
#[derive(Debug)]
pub struct Node {
    bounds: Rect,
    kind: NodeKind,
}

#[derive(Debug)]
pub enum NodeKind {
    Container(Vec<Rc<Node>>),
    Debug {
        message: String,
        child: Rc<Node>,
    },
    Color(Color),
    LinearGradient {
        start: Point,
        end: Point,
        stops: Vec<ColorStop>,
    },
    Clip {
        clip: Rect,
        child: Rc<Node>,
    },
    RoundedClip {
        clip: RoundedRect,
        child: Rc<Node>,
    },
    Transform {
        transform: Transform,
        child: Rc<Node>,
    },
    // Kinds below are accepted but not drawn yet. The traversal skips them
    // instead of failing so partially supported scenes still render.
    Opacity {
        opacity: f32,
        child: Rc<Node>,
    },
    ColorMatrix {
        child: Rc<Node>,
    },
    Texture {
        texture: u32,
    },
    CrossFade {
        start: Rc<Node>,
        end: Rc<Node>,
        progress: f32,
    },
    Text {
        text: String,
        color: Color,
    },
    Border {
        outline: RoundedRect,
    },
    Blur {
        radius: f32,
        child: Rc<Node>,
    },
}

impl Node {
    pub fn bounds(&self) -> &Rect {
        &self.bounds
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// A node with no area draws nothing and prunes its subtree. NaN bounds
    /// count as invisible rather than poisoning downstream math.
    pub fn is_invisible(&self) -> bool {
        self.bounds.width == 0.0
            || self.bounds.height == 0.0
            || self.bounds.width.is_nan()
            || self.bounds.height.is_nan()
    }

    pub fn container(children: Vec<Rc<Node>>) -> Rc<Node> {
        let bounds = children
            .iter()
            .map(|c| c.bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Rc::new(Node {
            bounds,
            kind: NodeKind::Container(children),
        })
    }

    pub fn color(bounds: Rect, color: Color) -> Rc<Node> {
        Rc::new(Node {
            bounds,
            kind: NodeKind::Color(color),
        })
    }

    pub fn linear_gradient(
        bounds: Rect,
        start: Point,
        end: Point,
        stops: Vec<ColorStop>,
    ) -> Rc<Node> {
        Rc::new(Node {
            bounds,
            kind: NodeKind::LinearGradient { start, end, stops },
        })
    }

    pub fn clip(clip: Rect, child: Rc<Node>) -> Rc<Node> {
        Rc::new(Node {
            bounds: clip.intersection(&child.bounds),
            kind: NodeKind::Clip { clip, child },
        })
    }

    pub fn rounded_clip(clip: RoundedRect, child: Rc<Node>) -> Rc<Node> {
        Rc::new(Node {
            bounds: clip.bounds.intersection(&child.bounds),
            kind: NodeKind::RoundedClip { clip, child },
        })
    }

    pub fn transform(transform: Transform, child: Rc<Node>) -> Rc<Node> {
        Rc::new(Node {
            bounds: transform.transform_bounds(&child.bounds),
            kind: NodeKind::Transform { transform, child },
        })
    }

    pub fn debug(message: impl Into<String>, child: Rc<Node>) -> Rc<Node> {
        Rc::new(Node {
            bounds: child.bounds,
            kind: NodeKind::Debug {
                message: message.into(),
                child,
            },
        })
    }

    pub fn opacity(opacity: f32, child: Rc<Node>) -> Rc<Node> {
        Rc::new(Node {
            bounds: child.bounds,
            kind: NodeKind::Opacity { opacity, child },
        })
    }

    pub fn texture(bounds: Rect, texture: u32) -> Rc<Node> {
        Rc::new(Node {
            bounds,
            kind: NodeKind::Texture { texture },
        })
    }

    /// Whether this subtree renders identically under an arbitrary matrix,
    /// so a General transform can be pushed directly instead of compositing
    /// the subtree offscreen first.
    pub fn supports_transform(&self) -> bool {
        match &self.kind {
            NodeKind::Color(_)
            | NodeKind::LinearGradient { .. }
            | NodeKind::Opacity { .. }
            | NodeKind::ColorMatrix { .. }
            | NodeKind::Texture { .. }
            | NodeKind::CrossFade { .. }
            | NodeKind::Text { .. }
            | NodeKind::Debug { .. } => true,
            NodeKind::Transform { child, .. } => child.supports_transform(),
            _ => false,
        }
    }
}
