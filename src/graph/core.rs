//! The attributed graph.
//!
//! # Modes
//!
//! A strict graph reports structural misuse as errors (`IdAlreadyInUse`,
//! `ElementNotFound`, `EdgeRejected`). A relaxed graph absorbs the same
//! situations: adding an existing node returns it, operations on missing
//! elements return `None`. With auto-creation enabled, a relaxed graph adds
//! missing edge endpoints on the fly.
//!
//! # Events
//!
//! Every structural or attribute mutation is broadcast to the graph's sinks
//! through its [`GraphListeners`]. Removals are broadcast before the element
//! leaves the graph, additions after it joined.
//!
//! # Storage
//!
//! Nodes and edges live in dense vectors indexed by position, with an id
//! lookup table. Removing an element moves the last one into its slot.

use crate::config::GraphConfig;
use crate::error::{GraphError, Result, ResultExt};
use crate::graph::element::{Attributes, Edge, Element, Node, NodeKind};
use crate::graph::listeners::GraphListeners;
use crate::graph::replay::ReplayController;
use crate::graph::snapshot::GraphSnapshot;
use crate::stream::event::{AttributeChange, ElementRef, Event};
use crate::stream::sink::{AttributeSink, ElementSink};
use crate::stream::source::{ReplayControl, Replayable, Source};
use crate::value::Value;
use crate::view::display::Display;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

/// Dense, id-indexed element storage.
#[derive(Debug)]
struct ElementStore<T> {
    items: Vec<Rc<T>>,
    index: HashMap<String, usize>,
}

impl<T: Element> ElementStore<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get(&self, id: &str) -> Option<Rc<T>> {
        self.index.get(id).map(|&i| self.items[i].clone())
    }

    fn at(&self, i: usize) -> Option<Rc<T>> {
        self.items.get(i).cloned()
    }

    fn insert(&mut self, item: Rc<T>) {
        self.index.insert(item.id().to_string(), self.items.len());
        self.items.push(item);
    }

    fn remove(&mut self, id: &str) -> Option<Rc<T>> {
        let pos = self.index.remove(id)?;
        let removed = self.items.swap_remove(pos);
        if let Some(moved) = self.items.get(pos) {
            self.index.insert(moved.id().to_string(), pos);
        }
        Some(removed)
    }

    fn drain(&mut self) -> Vec<Rc<T>> {
        self.index.clear();
        std::mem::take(&mut self.items)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn to_vec(&self) -> Vec<Rc<T>> {
        self.items.clone()
    }
}

/// An attributed graph that broadcasts its changes.
///
/// Always handled as `Rc<Graph>`; elements keep a weak reference back to it.
pub struct Graph {
    id: String,
    self_ref: Weak<Graph>,
    strict: Cell<bool>,
    auto_create: Cell<bool>,
    default_kind: Cell<NodeKind>,
    step: Cell<f64>,
    replay_counter: Cell<u64>,
    attributes: Attributes,
    nodes: RefCell<ElementStore<Node>>,
    edges: RefCell<ElementStore<Edge>>,
    listeners: GraphListeners,
}

impl Graph {
    /// A strict graph without auto-creation.
    pub fn new(id: &str) -> Rc<Self> {
        Self::with_options(id, true, false)
    }

    pub fn with_options(id: &str, strict: bool, auto_create: bool) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            id: id.to_string(),
            self_ref: self_ref.clone(),
            strict: Cell::new(strict),
            auto_create: Cell::new(auto_create),
            default_kind: Cell::new(NodeKind::Multi),
            step: Cell::new(0.0),
            replay_counter: Cell::new(0),
            attributes: Attributes::new(),
            nodes: RefCell::new(ElementStore::new()),
            edges: RefCell::new(ElementStore::new()),
            listeners: GraphListeners::new(id),
        })
    }

    pub fn with_config(id: &str, config: &GraphConfig) -> Rc<Self> {
        let graph = Self::with_options(id, config.strict_checking, config.auto_create);
        graph.set_default_node_kind(config.node_kind);
        graph
    }

    // ── Settings ──

    pub fn is_strict(&self) -> bool {
        self.strict.get()
    }

    pub fn set_strict(&self, on: bool) {
        self.strict.set(on);
    }

    pub fn is_auto_create(&self) -> bool {
        self.auto_create.get()
    }

    pub fn set_auto_create(&self, on: bool) {
        self.auto_create.set(on);
    }

    pub fn default_node_kind(&self) -> NodeKind {
        self.default_kind.get()
    }

    pub fn set_default_node_kind(&self, kind: NodeKind) {
        self.default_kind.set(kind);
    }

    pub(crate) fn listeners(&self) -> &GraphListeners {
        &self.listeners
    }

    /// Strong handle on this graph.
    pub fn rc(&self) -> Result<Rc<Graph>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| GraphError::ElementNotFound(format!("graph '{}' was dropped", self.id)))
    }

    // ── Queries ──

    pub fn node(&self, id: &str) -> Option<Rc<Node>> {
        self.nodes.borrow().get(id)
    }

    pub fn edge(&self, id: &str) -> Option<Rc<Edge>> {
        self.edges.borrow().get(id)
    }

    pub fn node_at(&self, index: usize) -> Option<Rc<Node>> {
        self.nodes.borrow().at(index)
    }

    pub fn edge_at(&self, index: usize) -> Option<Rc<Edge>> {
        self.edges.borrow().at(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.borrow().len()
    }

    /// All nodes, by index.
    pub fn nodes(&self) -> Vec<Rc<Node>> {
        self.nodes.borrow().to_vec()
    }

    /// All edges, by index.
    pub fn edges(&self) -> Vec<Rc<Edge>> {
        self.edges.borrow().to_vec()
    }

    /// Last step announced with [`Graph::step_begins`].
    pub fn step(&self) -> f64 {
        self.step.get()
    }

    pub fn element_sink_count(&self) -> usize {
        self.listeners.base().element_sink_count()
    }

    pub fn attribute_sink_count(&self) -> usize {
        self.listeners.base().attribute_sink_count()
    }

    // ── Structure ──

    /// Add a node of the default kind.
    pub fn add_node(&self, id: &str) -> Result<Rc<Node>> {
        self.add_node_of_kind(id, self.default_kind.get())
    }

    pub fn add_node_of_kind(&self, id: &str, kind: NodeKind) -> Result<Rc<Node>> {
        if let Some(existing) = self.node(id) {
            if self.is_strict() {
                return Err(GraphError::IdAlreadyInUse(format!(
                    "id \"{}\" already in use. Cannot create a node.",
                    id
                )));
            }
            return Ok(existing);
        }

        let node = Rc::new(Node::new(id, kind, self.self_ref.clone()));
        self.nodes.borrow_mut().insert(node.clone());
        tracing::debug!(graph = %self.id, node = id, "node added");

        self.listeners.send_node_added(id)?;
        Ok(node)
    }

    /// Add an edge between two nodes given by id.
    ///
    /// Returns `None` where a relaxed graph declines the edge.
    pub fn add_edge(
        &self,
        id: &str,
        from: &str,
        to: &str,
        directed: bool,
    ) -> Result<Option<Rc<Edge>>> {
        if let Some(existing) = self.edge(id) {
            if self.is_strict() {
                return Err(GraphError::IdAlreadyInUse(format!(
                    "id \"{}\" already in use. Cannot create an edge.",
                    id
                )));
            }
            let same_endpoints = (existing.source().id() == from && existing.target().id() == to)
                || (!directed && existing.target().id() == from && existing.source().id() == to);
            return Ok(same_endpoints.then_some(existing));
        }

        let (source, target) = match (self.node(from), self.node(to)) {
            (Some(source), Some(target)) => (source, target),
            (source, target) => {
                if self.is_strict() {
                    let missing = if source.is_none() { from } else { to };
                    return Err(GraphError::ElementNotFound(format!(
                        "Cannot create edge {}[{}-{}{}]. Node '{}' does not exist.",
                        id,
                        from,
                        if directed { ">" } else { "-" },
                        to,
                        missing
                    )));
                }
                if !self.is_auto_create() {
                    return Ok(None);
                }
                let source = match source {
                    Some(node) => node,
                    None => self.add_node(from)?,
                };
                let target = match target {
                    Some(node) => node,
                    None => self.add_node(to)?,
                };
                (source, target)
            }
        };

        let edge = Rc::new(Edge::new(
            id,
            source.clone(),
            target.clone(),
            directed,
            self.self_ref.clone(),
        ));

        if !source.accept_edge(&edge) {
            return self.reject(id, from);
        }
        // A loop registers with its single endpoint once
        if !Rc::ptr_eq(&source, &target) && !target.accept_edge(&edge) {
            source.detach_edge(&edge);
            return self.reject(id, to);
        }

        self.edges.borrow_mut().insert(edge.clone());
        tracing::debug!(graph = %self.id, edge = id, from, to, directed, "edge added");

        self.listeners.send_edge_added(id, from, to, directed)?;
        Ok(Some(edge))
    }

    fn reject(&self, edge: &str, node: &str) -> Result<Option<Rc<Edge>>> {
        if self.is_strict() {
            return Err(GraphError::EdgeRejected {
                edge: edge.to_string(),
                node: node.to_string(),
            });
        }
        tracing::debug!(graph = %self.id, edge, node, "edge rejected");
        Ok(None)
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&self, id: &str) -> Result<Option<Rc<Node>>> {
        let Some(node) = self.node(id) else {
            return self.missing(id, "node");
        };

        for edge in node.edges() {
            self.detach_edge(&edge)?;
        }
        self.listeners.send_node_removed(id)?;

        node.mark_removed();
        self.nodes.borrow_mut().remove(id);
        tracing::debug!(graph = %self.id, node = id, "node removed");
        Ok(Some(node))
    }

    pub fn remove_edge(&self, id: &str) -> Result<Option<Rc<Edge>>> {
        let Some(edge) = self.edge(id) else {
            return self.missing(id, "edge");
        };
        self.detach_edge(&edge)?;
        Ok(Some(edge))
    }

    /// Remove the edge leading from `from` to `to` (see [`Node::edge_toward`]).
    pub fn remove_edge_between(&self, from: &str, to: &str) -> Result<Option<Rc<Edge>>> {
        let Some(source) = self.node(from) else {
            return self.missing(from, "node");
        };
        if self.node(to).is_none() {
            return self.missing(to, "node");
        }
        match source.edge_toward(to) {
            Some(edge) => {
                self.detach_edge(&edge)?;
                Ok(Some(edge))
            }
            None if self.is_strict() => Err(GraphError::ElementNotFound(format!(
                "There is no edge from \"{}\" to \"{}\". Cannot remove it.",
                from, to
            ))),
            None => Ok(None),
        }
    }

    fn missing<T>(&self, id: &str, what: &str) -> Result<Option<T>> {
        if self.is_strict() {
            return Err(GraphError::ElementNotFound(format!("{} \"{}\"", what, id)));
        }
        Ok(None)
    }

    fn detach_edge(&self, edge: &Rc<Edge>) -> Result<()> {
        self.listeners.send_edge_removed(edge.id())?;

        edge.source().detach_edge(edge);
        if !edge.is_loop() {
            edge.target().detach_edge(edge);
        }
        edge.mark_removed();
        self.edges.borrow_mut().remove(edge.id());
        tracing::debug!(graph = %self.id, edge = edge.id(), "edge removed");
        Ok(())
    }

    /// Remove every element and graph attribute.
    ///
    /// Sinks receive a single `graph_cleared`; nothing is reported per element.
    pub fn clear(&self) -> Result<()> {
        self.listeners.send_graph_cleared()?;

        let edges = self.edges.borrow_mut().drain();
        let nodes = self.nodes.borrow_mut().drain();
        for edge in &edges {
            edge.mark_removed();
        }
        for node in &nodes {
            node.mark_removed();
        }
        self.attributes.clear();
        tracing::debug!(
            graph = %self.id,
            nodes = nodes.len(),
            edges = edges.len(),
            "graph cleared"
        );
        Ok(())
    }

    pub fn step_begins(&self, step: f64) -> Result<()> {
        self.listeners.send_step_begins(step)?;
        self.step.set(step);
        Ok(())
    }

    // ── Replay, snapshot, display ──

    /// A controller replaying this graph's state to the sinks added to it.
    pub fn replay_controller(&self) -> ReplayController {
        ReplayController::new(self.self_ref.clone(), &self.id)
    }

    /// Next replay id, `<graph>-replay-<n in hex>`.
    pub(crate) fn next_replay_id(&self) -> String {
        let n = self.replay_counter.get();
        self.replay_counter.set(n + 1);
        format!("{}-replay-{:x}", self.id, n)
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::of(self)
    }

    /// Open a viewer with automatic layout.
    pub fn display<D: Display>(&self, display: &D) -> Result<D::Viewer> {
        self.display_with_layout(display, true)
    }

    pub fn display_with_layout<D: Display>(&self, display: &D, auto_layout: bool) -> Result<D::Viewer> {
        let graph = self.rc()?;
        display
            .display(&graph, auto_layout)
            .context("Cannot launch viewer")
    }
}

impl Element for Graph {
    fn id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attribute_changed(&self, attribute: &str, change: AttributeChange) -> Result<()> {
        self.listeners
            .send_attribute_changed(ElementRef::Graph, attribute, change)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("id", &self.id)
            .field("strict", &self.strict.get())
            .field("auto_create", &self.auto_create.get())
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("step", &self.step.get())
            .finish()
    }
}

// ── Source ──

impl Source for Graph {
    fn add_element_sink(&self, sink: Rc<dyn ElementSink>) -> Result<()> {
        self.listeners.base().add_element_sink(sink)
    }

    fn add_attribute_sink(&self, sink: Rc<dyn AttributeSink>) -> Result<()> {
        self.listeners.base().add_attribute_sink(sink)
    }

    fn remove_element_sink(&self, sink: &Rc<dyn ElementSink>) -> Result<()> {
        self.listeners.base().remove_element_sink(sink)
    }

    fn remove_attribute_sink(&self, sink: &Rc<dyn AttributeSink>) -> Result<()> {
        self.listeners.base().remove_attribute_sink(sink)
    }

    fn clear_element_sinks(&self) -> Result<()> {
        self.listeners.base().clear_element_sinks()
    }

    fn clear_attribute_sinks(&self) -> Result<()> {
        self.listeners.base().clear_attribute_sinks()
    }

    fn as_replayable(&self) -> Option<&dyn Replayable> {
        Some(self)
    }
}

impl Replayable for Graph {
    fn replay_controller(&self) -> Box<dyn ReplayControl> {
        Box::new(Graph::replay_controller(self))
    }
}

// ── Sink ──

impl ElementSink for Graph {
    fn node_added(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.listeners
            .receive(self, Event::node_added(source_id, time_id, node_id))
    }

    fn node_removed(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.listeners
            .receive(self, Event::node_removed(source_id, time_id, node_id))
    }

    fn edge_added(
        &self,
        source_id: &str,
        time_id: i64,
        edge_id: &str,
        from_node_id: &str,
        to_node_id: &str,
        directed: bool,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::edge_added(source_id, time_id, edge_id, from_node_id, to_node_id, directed),
        )
    }

    fn edge_removed(&self, source_id: &str, time_id: i64, edge_id: &str) -> Result<()> {
        self.listeners
            .receive(self, Event::edge_removed(source_id, time_id, edge_id))
    }

    fn graph_cleared(&self, source_id: &str, time_id: i64) -> Result<()> {
        self.listeners
            .receive(self, Event::graph_cleared(source_id, time_id))
    }

    fn step_begins(&self, source_id: &str, time_id: i64, step: f64) -> Result<()> {
        self.listeners
            .receive(self, Event::step_begins(source_id, time_id, step))
    }
}

impl AttributeSink for Graph {
    fn node_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_added(
                source_id,
                time_id,
                ElementRef::Node(node_id.to_string()),
                attribute,
                value.clone(),
            ),
        )
    }

    fn node_attribute_changed(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
        old_value: Option<&Value>,
        new_value: &Value,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_changed(
                source_id,
                time_id,
                ElementRef::Node(node_id.to_string()),
                attribute,
                old_value.cloned(),
                new_value.clone(),
            ),
        )
    }

    fn node_attribute_removed(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_removed(
                source_id,
                time_id,
                ElementRef::Node(node_id.to_string()),
                attribute,
            ),
        )
    }

    fn edge_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_added(
                source_id,
                time_id,
                ElementRef::Edge(edge_id.to_string()),
                attribute,
                value.clone(),
            ),
        )
    }

    fn edge_attribute_changed(
        &self,
        source_id: &str,
        time_id: i64,
        edge_id: &str,
        attribute: &str,
        old_value: Option<&Value>,
        new_value: &Value,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_changed(
                source_id,
                time_id,
                ElementRef::Edge(edge_id.to_string()),
                attribute,
                old_value.cloned(),
                new_value.clone(),
            ),
        )
    }

    fn edge_attribute_removed(
        &self,
        source_id: &str,
        time_id: i64,
        edge_id: &str,
        attribute: &str,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_removed(
                source_id,
                time_id,
                ElementRef::Edge(edge_id.to_string()),
                attribute,
            ),
        )
    }

    fn graph_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_added(source_id, time_id, ElementRef::Graph, attribute, value.clone()),
        )
    }

    fn graph_attribute_changed(
        &self,
        source_id: &str,
        time_id: i64,
        attribute: &str,
        old_value: Option<&Value>,
        new_value: &Value,
    ) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_changed(
                source_id,
                time_id,
                ElementRef::Graph,
                attribute,
                old_value.cloned(),
                new_value.clone(),
            ),
        )
    }

    fn graph_attribute_removed(&self, source_id: &str, time_id: i64, attribute: &str) -> Result<()> {
        self.listeners.receive(
            self,
            Event::attribute_removed(source_id, time_id, ElementRef::Graph, attribute),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_swap_remove_keeps_index() {
        let graph = Graph::with_options("g", false, false);
        for id in ["a", "b", "c"] {
            graph.add_node(id).unwrap();
        }
        graph.remove_node("a").unwrap();
        assert_eq!(graph.node_at(0).unwrap().id(), "c");
        assert_eq!(graph.node("c").unwrap().id(), "c");
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_strict_missing_endpoint() {
        let graph = Graph::new("g");
        graph.add_node("a").unwrap();
        let err = graph.add_edge("e", "a", "zz", true).unwrap_err();
        assert!(matches!(err, GraphError::ElementNotFound(ref msg) if msg.contains("'zz'")));
    }

    #[test]
    fn test_relaxed_duplicate_edge_same_endpoints() {
        let graph = Graph::with_options("g", false, true);
        let first = graph.add_edge("e", "a", "b", false).unwrap().unwrap();
        // Undirected: either orientation matches
        let again = graph.add_edge("e", "b", "a", false).unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        assert!(graph.add_edge("e", "a", "c", false).unwrap().is_none());
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_loop_edge_counts_once() {
        let graph = Graph::new("g");
        let a = graph.add_node("a").unwrap();
        let edge = graph.add_edge("loop", "a", "a", true).unwrap().unwrap();
        assert!(edge.is_loop());
        assert_eq!(a.degree(), 1);
        graph.remove_edge("loop").unwrap();
        assert_eq!(a.degree(), 0);
    }

    #[test]
    fn test_removed_node_is_detached() {
        let graph = Graph::new("g");
        let a = graph.add_node("a").unwrap();
        graph.add_node("b").unwrap();
        graph.add_edge("ab", "a", "b", false).unwrap();
        graph.remove_node("a").unwrap();

        assert!(a.is_removed());
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node("b").unwrap().degree(), 0);
        // Still writable, but no longer reported
        a.set_attribute("x", 1).unwrap();
        assert_eq!(a.attribute("x"), Some(Value::Int(1)));
    }

    #[test]
    fn test_replay_ids_are_hex() {
        let graph = Graph::new("g");
        for _ in 0..10 {
            graph.next_replay_id();
        }
        assert_eq!(graph.next_replay_id(), "g-replay-a");
    }

    #[test]
    fn test_clear_drops_graph_attributes() {
        let graph = Graph::new("g");
        graph.set_attribute("title", "t").unwrap();
        graph.add_node("a").unwrap();
        graph.clear().unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.attribute_count(), 0);
    }
}
