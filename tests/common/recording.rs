//! Sink recording everything it receives

use graphvis_rs::stream::{AttributeSink, ElementRef, ElementSink, Event, EventKind};
use graphvis_rs::{Result, Value};
use std::cell::RefCell;

/// Keeps every received event, in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    events: RefCell<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Short labels such as `node_added:a` or `attr:node:a:x`.
    pub fn labels(&self) -> Vec<String> {
        self.events.borrow().iter().map(label).collect()
    }

    pub fn count(&self, predicate: impl Fn(&EventKind) -> bool) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| predicate(&e.kind))
            .count()
    }

    pub fn time_ids(&self) -> Vec<i64> {
        self.events.borrow().iter().map(|e| e.time_id).collect()
    }

    fn push(&self, event: Event) -> Result<()> {
        self.events.borrow_mut().push(event);
        Ok(())
    }
}

pub fn label(event: &Event) -> String {
    match &event.kind {
        EventKind::NodeAdded { node_id } => format!("node_added:{}", node_id),
        EventKind::NodeRemoved { node_id } => format!("node_removed:{}", node_id),
        EventKind::EdgeAdded { edge_id, .. } => format!("edge_added:{}", edge_id),
        EventKind::EdgeRemoved { edge_id } => format!("edge_removed:{}", edge_id),
        EventKind::GraphCleared => "graph_cleared".to_string(),
        EventKind::StepBegins { step } => format!("step:{}", step),
        EventKind::Attribute {
            element, attribute, ..
        } => match element {
            ElementRef::Node(id) => format!("attr:node:{}:{}", id, attribute),
            ElementRef::Edge(id) => format!("attr:edge:{}:{}", id, attribute),
            ElementRef::Graph => format!("attr:graph:{}", attribute),
        },
    }
}

impl ElementSink for RecordingSink {
    fn node_added(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.push(Event::node_added(source_id, time_id, node_id))
    }

    fn node_removed(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.push(Event::node_removed(source_id, time_id, node_id))
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
        self.push(Event::edge_added(
            source_id,
            time_id,
            edge_id,
            from_node_id,
            to_node_id,
            directed,
        ))
    }

    fn edge_removed(&self, source_id: &str, time_id: i64, edge_id: &str) -> Result<()> {
        self.push(Event::edge_removed(source_id, time_id, edge_id))
    }

    fn graph_cleared(&self, source_id: &str, time_id: i64) -> Result<()> {
        self.push(Event::graph_cleared(source_id, time_id))
    }

    fn step_begins(&self, source_id: &str, time_id: i64, step: f64) -> Result<()> {
        self.push(Event::step_begins(source_id, time_id, step))
    }
}

impl AttributeSink for RecordingSink {
    fn node_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.push(Event::attribute_added(
            source_id,
            time_id,
            ElementRef::Node(node_id.to_string()),
            attribute,
            value.clone(),
        ))
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
        self.push(Event::attribute_changed(
            source_id,
            time_id,
            ElementRef::Node(node_id.to_string()),
            attribute,
            old_value.cloned(),
            new_value.clone(),
        ))
    }

    fn node_attribute_removed(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
    ) -> Result<()> {
        self.push(Event::attribute_removed(
            source_id,
            time_id,
            ElementRef::Node(node_id.to_string()),
            attribute,
        ))
    }

    fn edge_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        edge_id: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.push(Event::attribute_added(
            source_id,
            time_id,
            ElementRef::Edge(edge_id.to_string()),
            attribute,
            value.clone(),
        ))
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
        self.push(Event::attribute_changed(
            source_id,
            time_id,
            ElementRef::Edge(edge_id.to_string()),
            attribute,
            old_value.cloned(),
            new_value.clone(),
        ))
    }

    fn edge_attribute_removed(
        &self,
        source_id: &str,
        time_id: i64,
        edge_id: &str,
        attribute: &str,
    ) -> Result<()> {
        self.push(Event::attribute_removed(
            source_id,
            time_id,
            ElementRef::Edge(edge_id.to_string()),
            attribute,
        ))
    }

    fn graph_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.push(Event::attribute_added(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
            value.clone(),
        ))
    }

    fn graph_attribute_changed(
        &self,
        source_id: &str,
        time_id: i64,
        attribute: &str,
        old_value: Option<&Value>,
        new_value: &Value,
    ) -> Result<()> {
        self.push(Event::attribute_changed(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
            old_value.cloned(),
            new_value.clone(),
        ))
    }

    fn graph_attribute_removed(&self, source_id: &str, time_id: i64, attribute: &str) -> Result<()> {
        self.push(Event::attribute_removed(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
        ))
    }
}
