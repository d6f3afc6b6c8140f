//! Nodes, edges and the attribute behaviour they share with the graph.
//!
//! Elements are shared as `Rc<Node>` / `Rc<Edge>` and mutated through
//! `&self`. A node keeps weak references to its incident edges; an edge
//! keeps strong references to its two endpoints.

use crate::error::Result;
use crate::graph::core::Graph;
use crate::stream::event::{AttributeChange, ElementRef};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

/// Acceptance policy of a node's incidence structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Accepts every edge, parallel edges included.
    #[default]
    Multi,
    /// At most one edge toward any given opposite node.
    Single,
    /// At most `n` incident edges.
    Bounded(usize),
}

/// Sorted attribute map of one element.
#[derive(Debug, Default)]
pub struct Attributes {
    map: RefCell<BTreeMap<String, Value>>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.map.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.borrow().contains_key(name)
    }

    /// Store `value`, returning the previous one.
    pub fn insert(&self, name: &str, value: Value) -> Option<Value> {
        self.map.borrow_mut().insert(name.to_string(), value)
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.map.borrow_mut().remove(name)
    }

    pub fn keys(&self) -> Vec<String> {
        self.map.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.map.borrow_mut().clear();
    }

    /// Owned copy of the whole map.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.map.borrow().clone()
    }
}

/// Attribute access shared by the graph, its nodes and its edges.
///
/// Every mutation is reported through [`Element::attribute_changed`], which
/// forwards it to the owning graph's listeners.
pub trait Element {
    fn id(&self) -> &str;

    fn attributes(&self) -> &Attributes;

    /// Report an attribute mutation that already happened.
    fn attribute_changed(&self, attribute: &str, change: AttributeChange) -> Result<()>;

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes().get(name)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attributes().contains(name)
    }

    fn attribute_keys(&self) -> Vec<String> {
        self.attributes().keys()
    }

    fn attribute_count(&self) -> usize {
        self.attributes().len()
    }

    /// Add or replace an attribute. Replacing always reports a change, even
    /// with an equal value.
    fn set_attribute(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let change = match self.attributes().insert(name, value.clone()) {
            None => AttributeChange::Added { value },
            Some(old) => AttributeChange::Changed {
                old_value: Some(old),
                new_value: value,
            },
        };
        self.attribute_changed(name, change)
    }

    /// Set a valueless attribute, stored as `true`.
    fn set_flag(&self, name: &str) -> Result<()> {
        self.set_attribute(name, true)
    }

    /// Remove an attribute. The removal is reported before the value is
    /// dropped so sinks can still read it.
    fn remove_attribute(&self, name: &str) -> Result<Option<Value>> {
        if !self.has_attribute(name) {
            return Ok(None);
        }
        self.attribute_changed(name, AttributeChange::Removed)?;
        Ok(self.attributes().remove(name))
    }
}

// ── Node ──

/// A graph node.
#[derive(Debug)]
pub struct Node {
    id: String,
    kind: NodeKind,
    graph: Weak<Graph>,
    removed: Cell<bool>,
    attributes: Attributes,
    incidence: RefCell<Vec<Weak<Edge>>>,
}

impl Node {
    pub(crate) fn new(id: &str, kind: NodeKind, graph: Weak<Graph>) -> Self {
        Self {
            id: id.to_string(),
            kind,
            graph,
            removed: Cell::new(false),
            attributes: Attributes::new(),
            incidence: RefCell::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// True once the node has left its graph.
    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    pub fn degree(&self) -> usize {
        self.incidence
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Incident edges, in insertion order.
    pub fn edges(&self) -> Vec<Rc<Edge>> {
        self.incidence
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// An edge that can be followed from this node to `other_id`: leaving
    /// this node if directed, in either orientation otherwise.
    pub fn edge_toward(&self, other_id: &str) -> Option<Rc<Edge>> {
        self.edges().into_iter().find(|edge| {
            (edge.source().id() == self.id && edge.target().id() == other_id)
                || (!edge.is_directed()
                    && edge.target().id() == self.id
                    && edge.source().id() == other_id)
        })
    }

    pub fn has_edge_toward(&self, other_id: &str) -> bool {
        self.edge_toward(other_id).is_some()
    }

    /// Ids of the opposite endpoints of every incident edge (with repeats).
    pub fn neighbor_ids(&self) -> Vec<String> {
        self.edges()
            .iter()
            .filter_map(|edge| edge.opposite(&self.id).map(|n| n.id().to_string()))
            .collect()
    }

    /// Register `edge` if this node's kind allows it.
    pub(crate) fn accept_edge(&self, edge: &Rc<Edge>) -> bool {
        let accepted = match self.kind {
            NodeKind::Multi => true,
            NodeKind::Single => match edge.opposite(&self.id) {
                Some(opposite) => !self.edges().iter().any(|existing| {
                    existing
                        .opposite(&self.id)
                        .is_some_and(|other| other.id() == opposite.id())
                }),
                None => false,
            },
            NodeKind::Bounded(max) => self.degree() < max,
        };
        if accepted {
            self.incidence.borrow_mut().push(Rc::downgrade(edge));
        }
        accepted
    }

    pub(crate) fn detach_edge(&self, edge: &Rc<Edge>) {
        let mut incidence = self.incidence.borrow_mut();
        if let Some(pos) = incidence
            .iter()
            .position(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(edge)))
        {
            incidence.remove(pos);
        }
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
        self.incidence.borrow_mut().clear();
    }
}

impl Element for Node {
    fn id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attribute_changed(&self, attribute: &str, change: AttributeChange) -> Result<()> {
        if self.removed.get() {
            return Ok(());
        }
        match self.graph.upgrade() {
            Some(graph) => graph.listeners().send_attribute_changed(
                ElementRef::Node(self.id.clone()),
                attribute,
                change,
            ),
            None => Ok(()),
        }
    }
}

// ── Edge ──

/// A graph edge between two nodes of the same graph.
#[derive(Debug)]
pub struct Edge {
    id: String,
    source: Rc<Node>,
    target: Rc<Node>,
    directed: bool,
    graph: Weak<Graph>,
    removed: Cell<bool>,
    attributes: Attributes,
}

impl Edge {
    pub(crate) fn new(
        id: &str,
        source: Rc<Node>,
        target: Rc<Node>,
        directed: bool,
        graph: Weak<Graph>,
    ) -> Self {
        Self {
            id: id.to_string(),
            source,
            target,
            directed,
            graph,
            removed: Cell::new(false),
            attributes: Attributes::new(),
        }
    }

    pub fn source(&self) -> &Rc<Node> {
        &self.source
    }

    pub fn target(&self) -> &Rc<Node> {
        &self.target
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn is_loop(&self) -> bool {
        Rc::ptr_eq(&self.source, &self.target)
    }

    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    /// The endpoint that is not `node_id`; `None` if `node_id` is not an endpoint.
    pub fn opposite(&self, node_id: &str) -> Option<&Rc<Node>> {
        if self.source.id() == node_id {
            Some(&self.target)
        } else if self.target.id() == node_id {
            Some(&self.source)
        } else {
            None
        }
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.set(true);
    }
}

impl Element for Edge {
    fn id(&self) -> &str {
        &self.id
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn attribute_changed(&self, attribute: &str, change: AttributeChange) -> Result<()> {
        if self.removed.get() {
            return Ok(());
        }
        match self.graph.upgrade() {
            Some(graph) => graph.listeners().send_attribute_changed(
                ElementRef::Edge(self.id.clone()),
                attribute,
                change,
            ),
            None => Ok(()),
        }
    }
}
