//! prism: a batching scene-graph renderer for OpenGL-style devices.
//!
//! The embedder builds an immutable [`scene::Node`] tree, links the shader
//! programs it documents, and hands both to a [`renderer::RenderBackend`].
//! The renderer culls and flattens the tree into merged draw batches and
//! replays them against the device, diffing uniforms and bindings so
//! redundant state changes never leave the CPU.
//!
//! ```no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use prism::geometry::Rect;
//! use prism::renderer::{create_backend, Backend, GlContext, ShaderPrograms};
//! use prism::scene::{Color, Node};
//!
//! # fn device() -> Rc<RefCell<dyn GlContext>> { unimplemented!() }
//! let context = device();
//! let shaders = ShaderPrograms { color: 1, linear_gradient: 2, blit: 3 };
//! let mut backend = create_backend(Backend::Gl, context, &shaders);
//!
//! let root = Node::color(Rect::new(0.0, 0.0, 800.0, 600.0), Color::WHITE);
//! backend.begin_frame();
//! backend.render(&root, &Rect::new(0.0, 0.0, 800.0, 600.0), 1.0, None, 0);
//! backend.end_frame();
//! ```

pub mod geometry;
pub mod renderer;
pub mod scene;
pub mod transform;

pub use geometry::{Point, Rect, RoundedRect};
pub use renderer::{Backend, GlContext, RenderBackend, RenderError, ShaderPrograms};
pub use scene::{Color, ColorStop, Node, NodeKind};
pub use transform::{Transform, TransformCategory};
