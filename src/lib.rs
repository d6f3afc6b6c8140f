//! # graphvis-rs: attributed graphs with change events
//!
//! An in-memory graph of nodes, edges and attributes that reports every
//! change as an event to registered sinks, plus the consumer side of a
//! viewer fed across a thread boundary.
//!
//! ## Architecture
//!
//! - **Stream**: event vocabulary, reentrant broadcast dispatcher and the
//!   cross-thread proxy pipe
//! - **Graph**: nodes, edges and attributes; a graph is both a source and a
//!   sink of events, and can replay its content
//! - **View**: render model rebuilt from events, hosted on its own thread
//! - **Communication**: crossbeam channels between producer and viewer
//!
//! ## Example
//!
//! ```ignore
//! use graphvis_rs::{graph::{Element, Graph}, view::ThreadedDisplay};
//!
//! let graph = Graph::new("demo");
//! graph.add_node("a")?;
//! graph.add_node("b")?;
//! graph.add_edge("ab", "a", "b", false)?;
//!
//! let viewer = graph.display(&ThreadedDisplay::default())?;
//! graph.node("a").unwrap().set_attribute("ui.label", "A")?;
//! let snapshot = viewer.close()?;
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod stream;
pub mod value;
pub mod view;

// Re-export commonly used types
pub use config::Settings;
pub use error::{GraphError, Result};
pub use graph::{Edge, Element, Graph, Node, NodeKind};
pub use stream::{AttributeSink, ElementSink, Event, Sink, Source};
pub use value::Value;
pub use view::{Display, ThreadedDisplay, ViewGraph, ViewerCommand, ViewerListener, ViewerPipe};
