//! Viewer side of the event stream.
//!
//! The renderer itself is not part of this crate. What is here is the part
//! a renderer consumes:
//!
//! - [`ViewGraph`] - render model rebuilt from graph events
//! - [`Sprite`] - decorations driven by `ui.sprite.*` attributes
//! - [`StyleSheetLoader`] - hook receiving style sheet text
//! - [`Display`] / [`ThreadedDisplay`] - host a render model on its own thread
//! - [`ViewerPipe`] / [`ViewerListener`] - what the viewer reports back

pub mod display;
pub mod geom;
pub mod model;
pub mod pipe;
pub mod sprite;
pub mod style;

pub use display::{Display, ThreadedDisplay, ViewerCommand, ViewerHandle};
pub use geom::{Bounds, Point3};
pub use model::{is_rendering_attribute, ViewEdge, ViewGraph, ViewNode, ViewSnapshot};
pub use pipe::{ViewerListener, ViewerPipe};
pub use sprite::{Attachment, Sprite, SpritePosition, Units};
pub use style::{RawStyleSheet, StyleSheetLoader};
