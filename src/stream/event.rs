//! Event records for the graph change vocabulary.
//!
//! One `Event` per change: structural events (node/edge add and remove,
//! step markers, graph clear) and attribute events (add, change, remove on a
//! node, an edge or the graph itself). Every event carries the id of the
//! source that produced it and a time id that increases per source.
//!
//! Delivery to sinks goes through a single dispatch switch
//! ([`Event::deliver_to_element_sink`] / [`Event::deliver_to_attribute_sink`])
//! rather than one type per event kind.

use crate::error::Result;
use crate::stream::sink::{AttributeSink, ElementSink};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Which kind of element an attribute event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Node,
    Edge,
    Graph,
}

/// The element an attribute event applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementRef {
    Node(String),
    Edge(String),
    Graph,
}

impl ElementRef {
    pub fn element_type(&self) -> ElementType {
        match self {
            ElementRef::Node(_) => ElementType::Node,
            ElementRef::Edge(_) => ElementType::Edge,
            ElementRef::Graph => ElementType::Graph,
        }
    }

    /// Element id, `None` for the graph itself.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            ElementRef::Node(id) | ElementRef::Edge(id) => Some(id),
            ElementRef::Graph => None,
        }
    }
}

/// What happened to an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeChange {
    Added {
        value: Value,
    },
    Changed {
        old_value: Option<Value>,
        new_value: Value,
    },
    Removed,
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    NodeAdded {
        node_id: String,
    },
    NodeRemoved {
        node_id: String,
    },
    EdgeAdded {
        edge_id: String,
        from_node_id: String,
        to_node_id: String,
        directed: bool,
    },
    EdgeRemoved {
        edge_id: String,
    },
    GraphCleared,
    StepBegins {
        step: f64,
    },
    Attribute {
        element: ElementRef,
        attribute: String,
        change: AttributeChange,
    },
}

/// An immutable change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub source_id: String,
    pub time_id: i64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(source_id: impl Into<String>, time_id: i64, kind: EventKind) -> Self {
        Self {
            source_id: source_id.into(),
            time_id,
            kind,
        }
    }

    // ── Element events ──

    pub fn node_added(source_id: impl Into<String>, time_id: i64, node_id: impl Into<String>) -> Self {
        Self::new(
            source_id,
            time_id,
            EventKind::NodeAdded {
                node_id: node_id.into(),
            },
        )
    }

    pub fn node_removed(source_id: impl Into<String>, time_id: i64, node_id: impl Into<String>) -> Self {
        Self::new(
            source_id,
            time_id,
            EventKind::NodeRemoved {
                node_id: node_id.into(),
            },
        )
    }

    pub fn edge_added(
        source_id: impl Into<String>,
        time_id: i64,
        edge_id: impl Into<String>,
        from_node_id: impl Into<String>,
        to_node_id: impl Into<String>,
        directed: bool,
    ) -> Self {
        Self::new(
            source_id,
            time_id,
            EventKind::EdgeAdded {
                edge_id: edge_id.into(),
                from_node_id: from_node_id.into(),
                to_node_id: to_node_id.into(),
                directed,
            },
        )
    }

    pub fn edge_removed(source_id: impl Into<String>, time_id: i64, edge_id: impl Into<String>) -> Self {
        Self::new(
            source_id,
            time_id,
            EventKind::EdgeRemoved {
                edge_id: edge_id.into(),
            },
        )
    }

    pub fn graph_cleared(source_id: impl Into<String>, time_id: i64) -> Self {
        Self::new(source_id, time_id, EventKind::GraphCleared)
    }

    pub fn step_begins(source_id: impl Into<String>, time_id: i64, step: f64) -> Self {
        Self::new(source_id, time_id, EventKind::StepBegins { step })
    }

    // ── Attribute events ──

    pub fn attribute(
        source_id: impl Into<String>,
        time_id: i64,
        element: ElementRef,
        attribute: impl Into<String>,
        change: AttributeChange,
    ) -> Self {
        Self::new(
            source_id,
            time_id,
            EventKind::Attribute {
                element,
                attribute: attribute.into(),
                change,
            },
        )
    }

    pub fn attribute_added(
        source_id: impl Into<String>,
        time_id: i64,
        element: ElementRef,
        attribute: impl Into<String>,
        value: Value,
    ) -> Self {
        Self::attribute(
            source_id,
            time_id,
            element,
            attribute,
            AttributeChange::Added { value },
        )
    }

    pub fn attribute_changed(
        source_id: impl Into<String>,
        time_id: i64,
        element: ElementRef,
        attribute: impl Into<String>,
        old_value: Option<Value>,
        new_value: Value,
    ) -> Self {
        Self::attribute(
            source_id,
            time_id,
            element,
            attribute,
            AttributeChange::Changed {
                old_value,
                new_value,
            },
        )
    }

    pub fn attribute_removed(
        source_id: impl Into<String>,
        time_id: i64,
        element: ElementRef,
        attribute: impl Into<String>,
    ) -> Self {
        Self::attribute(source_id, time_id, element, attribute, AttributeChange::Removed)
    }

    /// True for events routed to element sinks.
    pub fn is_element_event(&self) -> bool {
        !self.is_attribute_event()
    }

    /// True for events routed to attribute sinks.
    pub fn is_attribute_event(&self) -> bool {
        matches!(self.kind, EventKind::Attribute { .. })
    }

    /// Invoke the matching element callback on `sink`. Attribute events are ignored.
    pub fn deliver_to_element_sink(&self, sink: &dyn ElementSink) -> Result<()> {
        let src = self.source_id.as_str();
        let t = self.time_id;
        match &self.kind {
            EventKind::NodeAdded { node_id } => sink.node_added(src, t, node_id),
            EventKind::NodeRemoved { node_id } => sink.node_removed(src, t, node_id),
            EventKind::EdgeAdded {
                edge_id,
                from_node_id,
                to_node_id,
                directed,
            } => sink.edge_added(src, t, edge_id, from_node_id, to_node_id, *directed),
            EventKind::EdgeRemoved { edge_id } => sink.edge_removed(src, t, edge_id),
            EventKind::GraphCleared => sink.graph_cleared(src, t),
            EventKind::StepBegins { step } => sink.step_begins(src, t, *step),
            EventKind::Attribute { .. } => Ok(()),
        }
    }

    /// Invoke one of the nine attribute callbacks on `sink`. Element events are ignored.
    pub fn deliver_to_attribute_sink(&self, sink: &dyn AttributeSink) -> Result<()> {
        let EventKind::Attribute {
            element,
            attribute,
            change,
        } = &self.kind
        else {
            return Ok(());
        };
        let src = self.source_id.as_str();
        let t = self.time_id;

        match (change, element) {
            (AttributeChange::Added { value }, ElementRef::Node(id)) => {
                sink.node_attribute_added(src, t, id, attribute, value)
            }
            (AttributeChange::Added { value }, ElementRef::Edge(id)) => {
                sink.edge_attribute_added(src, t, id, attribute, value)
            }
            (AttributeChange::Added { value }, ElementRef::Graph) => {
                sink.graph_attribute_added(src, t, attribute, value)
            }
            (
                AttributeChange::Changed {
                    old_value,
                    new_value,
                },
                ElementRef::Node(id),
            ) => sink.node_attribute_changed(src, t, id, attribute, old_value.as_ref(), new_value),
            (
                AttributeChange::Changed {
                    old_value,
                    new_value,
                },
                ElementRef::Edge(id),
            ) => sink.edge_attribute_changed(src, t, id, attribute, old_value.as_ref(), new_value),
            (
                AttributeChange::Changed {
                    old_value,
                    new_value,
                },
                ElementRef::Graph,
            ) => sink.graph_attribute_changed(src, t, attribute, old_value.as_ref(), new_value),
            (AttributeChange::Removed, ElementRef::Node(id)) => {
                sink.node_attribute_removed(src, t, id, attribute)
            }
            (AttributeChange::Removed, ElementRef::Edge(id)) => {
                sink.edge_attribute_removed(src, t, id, attribute)
            }
            (AttributeChange::Removed, ElementRef::Graph) => {
                sink.graph_attribute_removed(src, t, attribute)
            }
        }
    }
}
