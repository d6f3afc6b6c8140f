//! Attributed graph model.
//!
//! [`Graph`] owns nodes and edges, reports every change as events and can
//! itself consume events from another source. [`ReplayController`] re-emits
//! a graph's content for late subscribers.

pub mod core;
pub mod element;
pub mod listeners;
pub mod replay;
pub mod snapshot;

pub use self::core::Graph;
pub use element::{Attributes, Edge, Element, Node, NodeKind};
pub use listeners::GraphListeners;
pub use replay::ReplayController;
pub use snapshot::{EdgeSnapshot, GraphSnapshot, NodeSnapshot};
