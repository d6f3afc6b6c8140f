//! Viewer hosting.
//!
//! A [`Display`] opens a viewer on a graph. [`ThreadedDisplay`] runs the
//! render model on its own thread, fed through a replaying proxy pipe, the
//! way a windowing shell would host its drawing loop.
//!
//! Interaction goes the other way: [`ViewerCommand`]s are applied to the
//! render model on the viewer thread, and what the view reports about them
//! comes back through a [`ViewerPipe`].

use crate::config::ViewConfig;
use crate::error::{GraphError, Result};
use crate::graph::element::Element;
use crate::graph::Graph;
use crate::stream::source::Source;
use crate::stream::thread::{thread_proxy_pipe, ProxyOutput, ProxySink, ThreadProxyPipe};
use crate::view::model::{ViewGraph, ViewSnapshot};
use crate::view::pipe::ViewerPipe;
use crate::view::style::{RawStyleSheet, StyleSheetLoader};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Something able to show a graph.
pub trait Display {
    type Viewer;

    /// Open a viewer on `graph`. `auto_layout` asks the viewer to compute
    /// positions itself.
    fn display(&self, graph: &Rc<Graph>, auto_layout: bool) -> Result<Self::Viewer>;
}

/// User interaction to apply to a running viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    /// Drag a node to a new position
    MoveNode { node: String, x: f64, y: f64, z: f64 },
    /// Mouse button pressed on a node
    Press { node: String },
    /// Mouse button released on a node
    Release { node: String },
    /// Pointer entered a node
    Hover { node: String },
    /// Pointer left a node
    Leave { node: String },
}

type LoaderFactory = Arc<dyn Fn() -> Box<dyn StyleSheetLoader> + Send + Sync>;

/// Hosts a [`ViewGraph`] on a dedicated thread.
pub struct ThreadedDisplay {
    config: ViewConfig,
    loader: LoaderFactory,
}

impl ThreadedDisplay {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            config,
            loader: Arc::new(|| Box::new(RawStyleSheet::new()) as Box<dyn StyleSheetLoader>),
        }
    }

    /// Build style sheet loaders with `factory`, called once on the viewer thread.
    pub fn with_style_loader<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn StyleSheetLoader> + Send + Sync + 'static,
    {
        self.loader = Arc::new(factory);
        self
    }
}

impl Default for ThreadedDisplay {
    fn default() -> Self {
        Self::new(ViewConfig::default())
    }
}

impl Display for ThreadedDisplay {
    type Viewer = ViewerHandle;

    fn display(&self, graph: &Rc<Graph>, auto_layout: bool) -> Result<ViewerHandle> {
        let view_id = format!("{}-view", graph.id());
        let (input, output) = thread_proxy_pipe(view_id.clone());
        let (back_input, back_output) = thread_proxy_pipe(format!("{}-viewer", graph.id()));
        let (command_tx, command_rx) = unbounded();

        let loader = self.loader.clone();
        let feedback_xyz = self.config.feedback_xyz;
        let timeout_ms = self.config.pump_timeout_ms;
        let thread = std::thread::Builder::new()
            .name(format!("viewer-{}", graph.id()))
            .spawn(move || -> Result<ViewSnapshot> {
                let pipe = output.into_pipe();
                let view = Rc::new(ViewGraph::with_style_loader(view_id.clone(), loader()));
                view.set_feedback_xyz(feedback_xyz);
                pipe.add_sink(view.clone())?;
                // Only what the view says itself goes back, not the graph's own events
                let back = back_input
                    .only_from(view_id)
                    .init(Some(view.clone() as Rc<dyn Source>), false)?;

                run_viewer(&pipe, &view, &command_rx, timeout_ms)?;

                debug!(view = view.id(), "viewer pipe closed");
                if let Err(e) = view.announce_closed() {
                    debug!("Could not announce closed view: {}", e);
                }
                back.close()?;
                Ok(view.snapshot())
            })?;

        let source: Rc<dyn Source> = graph.clone();
        let proxy = input.attach(source)?;
        info!(graph = graph.id(), auto_layout, "viewer started");

        Ok(ViewerHandle {
            graph: Rc::downgrade(graph),
            proxy: Some(proxy),
            back: Some(back_output),
            commands: command_tx,
            thread: Some(thread),
            auto_layout,
        })
    }
}

/// Viewer thread loop: mirror graph events and apply commands until the
/// graph side closes the pipe.
fn run_viewer(
    pipe: &ThreadProxyPipe,
    view: &ViewGraph,
    commands: &Receiver<ViewerCommand>,
    timeout_ms: u64,
) -> Result<()> {
    loop {
        let open = match pipe.blocking_pump(timeout_ms) {
            Ok(()) => true,
            Err(GraphError::Channel(_)) => false,
            Err(e) => return Err(e),
        };
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    // Graph events sent before the command must be in the view first
                    if open {
                        pipe.pump()?;
                    }
                    apply_command(view, command);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("viewer command channel disconnected");
                    break;
                }
            }
        }
        if !open {
            return Ok(());
        }
    }
}

fn apply_command(view: &ViewGraph, command: ViewerCommand) {
    let result = match &command {
        ViewerCommand::MoveNode { node, x, y, z } => view.move_node(node, *x, *y, *z),
        ViewerCommand::Press { node } => view.press_node(node),
        ViewerCommand::Release { node } => view.release_node(node),
        ViewerCommand::Hover { node } => view.hover_node(node),
        ViewerCommand::Leave { node } => view.leave_node(node),
    };
    if let Err(e) = result {
        warn!("Viewer command {:?} failed: {}", command, e);
    }
}

/// Owner-side handle of a running viewer.
///
/// Dropping the handle detaches the viewer without waiting for it.
pub struct ViewerHandle {
    graph: Weak<Graph>,
    proxy: Option<Rc<ProxySink>>,
    back: Option<ProxyOutput>,
    commands: Sender<ViewerCommand>,
    thread: Option<JoinHandle<Result<ViewSnapshot>>>,
    auto_layout: bool,
}

impl ViewerHandle {
    pub fn auto_layout(&self) -> bool {
        self.auto_layout
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Queue an interaction for the viewer thread.
    pub fn send_command(&self, command: ViewerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| GraphError::Channel("viewer is gone".to_string()))
    }

    /// Source of the events the viewer sends back, on this thread.
    ///
    /// There is a single back channel, so this succeeds once.
    pub fn new_viewer_pipe(&mut self) -> Result<ViewerPipe> {
        let output = self
            .back
            .take()
            .ok_or_else(|| GraphError::Channel("viewer pipe already taken".to_string()))?;
        ViewerPipe::new(output.into_pipe())
    }

    /// Detach from the graph and wait for the viewer to drain what it was
    /// sent. Returns the final render model.
    pub fn close(mut self) -> Result<ViewSnapshot> {
        self.release()?;
        let thread = self
            .thread
            .take()
            .ok_or_else(|| GraphError::Channel("viewer already closed".to_string()))?;
        let snapshot = thread
            .join()
            .map_err(|_| GraphError::Channel("viewer thread panicked".to_string()))??;
        info!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "viewer stopped"
        );
        Ok(snapshot)
    }

    /// Close the producer side of the pipe, which ends the viewer loop.
    ///
    /// The channel is closed even when called from inside a delivery pass
    /// of the graph, where the unbinding itself is deferred.
    fn release(&mut self) -> Result<()> {
        let Some(proxy) = self.proxy.take() else {
            return Ok(());
        };
        proxy.close()?;
        if let Some(graph) = self.graph.upgrade() {
            debug!(graph = graph.id(), "viewer detached");
        }
        Ok(())
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to detach viewer: {}", e);
        }
    }
}

impl std::fmt::Debug for ViewerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerHandle")
            .field("attached", &self.proxy.is_some())
            .field("pipe_taken", &self.back.is_none())
            .field("running", &self.is_running())
            .field("auto_layout", &self.auto_layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Element;
    use crate::value::Value;

    #[test]
    fn test_display_and_close() {
        let graph = Graph::new("g");
        graph.add_node("a").unwrap();
        graph.add_node("b").unwrap();
        graph.add_edge("ab", "a", "b", false).unwrap();

        let viewer = ThreadedDisplay::default().display(&graph, false).unwrap();
        graph
            .node("a")
            .unwrap()
            .set_attribute("xy", Value::from([1.0, 1.0]))
            .unwrap();
        graph.add_node("c").unwrap();

        let snapshot = viewer.close().unwrap();
        assert_eq!(snapshot.id, "g-view");
        assert_eq!(snapshot.nodes.len(), 3);
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.nodes["a"].position.x, 1.0);
        assert_eq!(graph.element_sink_count(), 0);
    }

    #[test]
    fn test_viewer_pipe_taken_once() {
        let graph = Graph::new("g");
        let mut viewer = ThreadedDisplay::default().display(&graph, false).unwrap();

        let pipe = viewer.new_viewer_pipe().unwrap();
        assert_eq!(pipe.id(), "g-viewer");
        assert!(viewer.new_viewer_pipe().is_err());
        viewer.close().unwrap();
    }

    #[test]
    fn test_unknown_node_command_is_skipped() {
        let graph = Graph::new("g");
        graph.add_node("a").unwrap();
        let viewer = ThreadedDisplay::default().display(&graph, false).unwrap();

        viewer
            .send_command(ViewerCommand::MoveNode {
                node: "ghost".to_string(),
                x: 1.0,
                y: 1.0,
                z: 1.0,
            })
            .unwrap();
        viewer
            .send_command(ViewerCommand::MoveNode {
                node: "a".to_string(),
                x: 2.0,
                y: 3.0,
                z: 0.0,
            })
            .unwrap();

        let snapshot = viewer.close().unwrap();
        assert!(!snapshot.nodes.contains_key("ghost"));
        assert_eq!(snapshot.nodes["a"].position.y, 3.0);
    }
}
