//! Replay of a graph's current state as a stream of additions.

use crate::error::{GraphError, Result};
use crate::graph::core::Graph;
use crate::graph::element::Element;
use crate::stream::event::{ElementRef, Event};
use crate::stream::sink::{AttributeSink, ElementSink};
use crate::stream::source::{ReplayControl, Source};
use crate::stream::source_base::SourceBase;
use std::rc::{Rc, Weak};

/// Source that re-emits a graph's content on demand.
///
/// Sinks added to the controller receive, in order: the graph attributes,
/// then each node followed by its attributes, then each edge followed by its
/// attributes. Hidden attributes are replayed too.
pub struct ReplayController {
    graph: Weak<Graph>,
    base: SourceBase,
}

impl ReplayController {
    pub(crate) fn new(graph: Weak<Graph>, graph_id: &str) -> Self {
        Self {
            graph,
            base: SourceBase::new(format!("{}replay", graph_id)),
        }
    }

    pub fn source_id(&self) -> &str {
        self.base.source_id()
    }

    fn graph(&self) -> Result<Rc<Graph>> {
        self.graph
            .upgrade()
            .ok_or_else(|| GraphError::ElementNotFound("replayed graph was dropped".to_string()))
    }

    fn emit(&self, source_id: &str, graph: &Graph) -> Result<()> {
        let mut count = 0usize;

        for (key, value) in graph.attributes().to_map() {
            self.send(&mut count, |t| {
                Event::attribute_added(source_id, t, ElementRef::Graph, key, value)
            })?;
        }

        for node in graph.nodes() {
            self.send(&mut count, |t| Event::node_added(source_id, t, node.id()))?;
            for (key, value) in node.attributes().to_map() {
                self.send(&mut count, |t| {
                    Event::attribute_added(
                        source_id,
                        t,
                        ElementRef::Node(node.id().to_string()),
                        key,
                        value,
                    )
                })?;
            }
        }

        for edge in graph.edges() {
            self.send(&mut count, |t| {
                Event::edge_added(
                    source_id,
                    t,
                    edge.id(),
                    edge.source().id(),
                    edge.target().id(),
                    edge.is_directed(),
                )
            })?;
            for (key, value) in edge.attributes().to_map() {
                self.send(&mut count, |t| {
                    Event::attribute_added(
                        source_id,
                        t,
                        ElementRef::Edge(edge.id().to_string()),
                        key,
                        value,
                    )
                })?;
            }
        }

        tracing::debug!(graph = graph.id(), replay = source_id, events = count, "graph replayed");
        Ok(())
    }

    /// Stamp an event with the next time id of the controller and send it.
    fn send(&self, count: &mut usize, build: impl FnOnce(i64) -> Event) -> Result<()> {
        *count += 1;
        self.base.send(build(self.base.new_event()))
    }
}

impl ReplayControl for ReplayController {
    fn replay(&self) -> Result<()> {
        let graph = self.graph()?;
        let source_id = graph.next_replay_id();
        self.emit(&source_id, &graph)
    }

    fn replay_as(&self, source_id: &str) -> Result<()> {
        let graph = self.graph()?;
        self.emit(source_id, &graph)
    }
}

impl Source for ReplayController {
    fn add_element_sink(&self, sink: Rc<dyn ElementSink>) -> Result<()> {
        self.base.add_element_sink(sink)
    }

    fn add_attribute_sink(&self, sink: Rc<dyn AttributeSink>) -> Result<()> {
        self.base.add_attribute_sink(sink)
    }

    fn remove_element_sink(&self, sink: &Rc<dyn ElementSink>) -> Result<()> {
        self.base.remove_element_sink(sink)
    }

    fn remove_attribute_sink(&self, sink: &Rc<dyn AttributeSink>) -> Result<()> {
        self.base.remove_attribute_sink(sink)
    }

    fn clear_element_sinks(&self) -> Result<()> {
        self.base.clear_element_sinks()
    }

    fn clear_attribute_sinks(&self) -> Result<()> {
        self.base.clear_attribute_sinks()
    }
}
