//! The vertex format shared by every draw.

use bytemuck::{Pod, Zeroable};

/// Vertices emitted per axis-aligned quad (two triangles).
pub const N_VERTICES: usize = 6;

/// One vertex: position in the node's coordinate space plus normalized
/// texture coordinates. Uploaded verbatim, so the layout is part of the
/// shader contract.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

impl DrawVertex {
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y],
            uv: [u, v],
        }
    }
}
