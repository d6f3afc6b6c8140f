//! Event plumbing between a graph and the outside world.
//!
//! Outbound, the graph core reports its mutations through the `send_*`
//! methods, which stamp them with the graph id and a fresh time id and
//! broadcast them. Inbound, the graph acting as a sink hands every event to
//! [`GraphListeners::receive`], which applies it to the graph and forwards
//! it downstream under its original `(source_id, time_id)`.
//!
//! # Loop suppression
//!
//! Two graphs wired as each other's sinks must not ping-pong. Three
//! mechanisms prevent it:
//!
//! - time ids the graph generates itself are recorded in its [`SinkTime`],
//!   so an echo of its own event comes back stale and is dropped;
//! - while an inbound event is applied, a suppression flag mutes the
//!   outbound events the mutation would produce, and the event is forwarded
//!   once with its original identity instead;
//! - a node removed on behalf of an upstream source is reported with that
//!   source's identity.

use crate::error::Result;
use crate::graph::core::Graph;
use crate::graph::element::Element;
use crate::stream::event::{AttributeChange, ElementRef, Event, EventKind};
use crate::stream::source_base::SourceBase;
use crate::stream::time::SinkTime;
use crate::value::Value;
use std::cell::{Cell, RefCell};

/// Raises a flag for the lifetime of the guard, then restores its previous value.
struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

/// Installs a downstream identity for node removals, restoring the previous one on drop.
struct DownstreamGuard<'a> {
    slot: &'a RefCell<Option<(String, i64)>>,
    previous: Option<(String, i64)>,
}

impl<'a> DownstreamGuard<'a> {
    fn install(slot: &'a RefCell<Option<(String, i64)>>, source_id: &str, time_id: i64) -> Self {
        let previous = slot.replace(Some((source_id.to_string(), time_id)));
        Self { slot, previous }
    }
}

impl Drop for DownstreamGuard<'_> {
    fn drop(&mut self) {
        *self.slot.borrow_mut() = self.previous.take();
    }
}

/// Source side and sink side of a graph.
pub struct GraphListeners {
    base: SourceBase,
    sink_time: SinkTime,
    suppress: Cell<bool>,
    suppress_edge_added: Cell<bool>,
    downstream: RefCell<Option<(String, i64)>>,
}

impl GraphListeners {
    pub fn new(graph_id: &str) -> Self {
        Self {
            base: SourceBase::new(graph_id),
            sink_time: SinkTime::new(),
            suppress: Cell::new(false),
            suppress_edge_added: Cell::new(false),
            downstream: RefCell::new(None),
        }
    }

    pub fn base(&self) -> &SourceBase {
        &self.base
    }

    pub fn source_id(&self) -> &str {
        self.base.source_id()
    }

    pub fn sink_time(&self) -> &SinkTime {
        &self.sink_time
    }

    /// Fresh time id, also recorded as seen so echoes are recognised.
    pub fn new_event(&self) -> i64 {
        let time_id = self.base.new_event();
        self.sink_time.record(self.base.source_id(), time_id);
        time_id
    }

    // ── Outbound ──

    pub fn send_attribute_changed(
        &self,
        element: ElementRef,
        attribute: &str,
        change: AttributeChange,
    ) -> Result<()> {
        if self.suppress.get() || attribute.starts_with('.') {
            return Ok(());
        }
        let time_id = self.new_event();
        self.base.send(Event::attribute(
            self.source_id(),
            time_id,
            element,
            attribute,
            change,
        ))
    }

    pub fn send_node_added(&self, node_id: &str) -> Result<()> {
        if self.suppress.get() {
            return Ok(());
        }
        let time_id = self.new_event();
        self.base
            .send(Event::node_added(self.source_id(), time_id, node_id))
    }

    pub fn send_node_removed(&self, node_id: &str) -> Result<()> {
        let downstream = self.downstream.borrow().clone();
        match downstream {
            Some((source_id, time_id)) => self
                .base
                .send(Event::node_removed(source_id, time_id, node_id)),
            None => {
                let time_id = self.new_event();
                self.base
                    .send(Event::node_removed(self.source_id(), time_id, node_id))
            }
        }
    }

    pub fn send_edge_added(
        &self,
        edge_id: &str,
        from_node_id: &str,
        to_node_id: &str,
        directed: bool,
    ) -> Result<()> {
        if self.suppress_edge_added.get() {
            return Ok(());
        }
        let time_id = self.new_event();
        self.base.send(Event::edge_added(
            self.source_id(),
            time_id,
            edge_id,
            from_node_id,
            to_node_id,
            directed,
        ))
    }

    pub fn send_edge_removed(&self, edge_id: &str) -> Result<()> {
        if self.suppress.get() {
            return Ok(());
        }
        let time_id = self.new_event();
        self.base
            .send(Event::edge_removed(self.source_id(), time_id, edge_id))
    }

    pub fn send_graph_cleared(&self) -> Result<()> {
        if self.suppress.get() {
            return Ok(());
        }
        let time_id = self.new_event();
        self.base
            .send(Event::graph_cleared(self.source_id(), time_id))
    }

    pub fn send_step_begins(&self, step: f64) -> Result<()> {
        if self.suppress.get() {
            return Ok(());
        }
        let time_id = self.new_event();
        self.base
            .send(Event::step_begins(self.source_id(), time_id, step))
    }

    // ── Inbound ──

    /// Apply an event produced elsewhere to `graph` and forward it.
    ///
    /// Stale and duplicate events are dropped, as are events about
    /// elements `graph` does not have.
    pub fn receive(&self, graph: &Graph, event: Event) -> Result<()> {
        if !self.sink_time.is_new_event(&event.source_id, event.time_id) {
            tracing::trace!(
                graph = %self.source_id(),
                source = %event.source_id,
                time = event.time_id,
                "stale event dropped"
            );
            return Ok(());
        }

        match &event.kind {
            EventKind::NodeAdded { node_id } => {
                {
                    let _muted = FlagGuard::raise(&self.suppress);
                    graph.add_node(node_id)?;
                }
                self.base.send(event)
            }
            EventKind::NodeRemoved { node_id } => {
                if graph.node(node_id).is_none() {
                    return Ok(());
                }
                let _downstream =
                    DownstreamGuard::install(&self.downstream, &event.source_id, event.time_id);
                graph.remove_node(node_id)?;
                Ok(())
            }
            EventKind::EdgeAdded {
                edge_id,
                from_node_id,
                to_node_id,
                directed,
            } => {
                {
                    let _muted = FlagGuard::raise(&self.suppress_edge_added);
                    graph.add_edge(edge_id, from_node_id, to_node_id, *directed)?;
                }
                self.base.send(event)
            }
            EventKind::EdgeRemoved { edge_id } => {
                if graph.edge(edge_id).is_none() {
                    return Ok(());
                }
                let edge_id = edge_id.clone();
                self.base.send(event)?;
                let _muted = FlagGuard::raise(&self.suppress);
                graph.remove_edge(&edge_id)?;
                Ok(())
            }
            EventKind::GraphCleared => {
                self.base.send(event)?;
                let _muted = FlagGuard::raise(&self.suppress);
                graph.clear()
            }
            EventKind::StepBegins { step } => {
                {
                    let _muted = FlagGuard::raise(&self.suppress);
                    graph.step_begins(*step)?;
                }
                self.base.send(event)
            }
            EventKind::Attribute { .. } => self.receive_attribute(graph, event),
        }
    }

    fn receive_attribute(&self, graph: &Graph, event: Event) -> Result<()> {
        let Event {
            source_id,
            time_id,
            kind:
                EventKind::Attribute {
                    element,
                    attribute,
                    change,
                },
        } = event
        else {
            return Ok(());
        };

        let node;
        let edge;
        let target: &dyn AttributeTarget = match &element {
            ElementRef::Graph => graph,
            ElementRef::Node(id) => match graph.node(id) {
                Some(found) => {
                    node = found;
                    &*node
                }
                None => return Ok(()),
            },
            ElementRef::Edge(id) => match graph.edge(id) {
                Some(found) => {
                    edge = found;
                    &*edge
                }
                None => return Ok(()),
            },
        };
        self.apply_attribute(target, source_id, time_id, element, attribute, change)
    }

    fn apply_attribute(
        &self,
        target: &dyn AttributeTarget,
        source_id: String,
        time_id: i64,
        element: ElementRef,
        attribute: String,
        change: AttributeChange,
    ) -> Result<()> {
        match change {
            AttributeChange::Added { value } => {
                {
                    let _muted = FlagGuard::raise(&self.suppress);
                    target.put(&attribute, value.clone())?;
                }
                self.base.send(Event::attribute_added(
                    source_id, time_id, element, attribute, value,
                ))
            }
            AttributeChange::Changed {
                old_value,
                new_value,
            } => {
                let old_value = old_value.or_else(|| target.get(&attribute));
                {
                    let _muted = FlagGuard::raise(&self.suppress);
                    target.put(&attribute, new_value.clone())?;
                }
                self.base.send(Event::attribute_changed(
                    source_id, time_id, element, attribute, old_value, new_value,
                ))
            }
            AttributeChange::Removed => {
                self.base.send(Event::attribute_removed(
                    source_id,
                    time_id,
                    element,
                    attribute.clone(),
                ))?;
                let _muted = FlagGuard::raise(&self.suppress);
                target.take(&attribute)?;
                Ok(())
            }
        }
    }
}

/// Object-safe view of [`Element`] used to apply inbound attribute events.
trait AttributeTarget {
    fn get(&self, attribute: &str) -> Option<Value>;
    fn put(&self, attribute: &str, value: Value) -> Result<()>;
    fn take(&self, attribute: &str) -> Result<Option<Value>>;
}

impl<T: Element> AttributeTarget for T {
    fn get(&self, attribute: &str) -> Option<Value> {
        self.attribute(attribute)
    }

    fn put(&self, attribute: &str, value: Value) -> Result<()> {
        self.set_attribute(attribute, value)
    }

    fn take(&self, attribute: &str) -> Result<Option<Value>> {
        self.remove_attribute(attribute)
    }
}

impl std::fmt::Debug for GraphListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphListeners")
            .field("base", &self.base)
            .field("suppress", &self.suppress.get())
            .field("suppress_edge_added", &self.suppress_edge_added.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_guard_restores_previous() {
        let flag = Cell::new(false);
        {
            let _outer = FlagGuard::raise(&flag);
            {
                let _inner = FlagGuard::raise(&flag);
                assert!(flag.get());
            }
            // Inner guard must not lower a flag the outer one still holds
            assert!(flag.get());
        }
        assert!(!flag.get());
    }

    #[test]
    fn test_own_time_ids_are_stale() {
        let listeners = GraphListeners::new("g");
        let t = listeners.new_event();
        assert!(!listeners.sink_time().is_new_event("g", t));
        assert!(listeners.sink_time().is_new_event("g", t + 1));
    }

    #[test]
    fn test_hidden_attribute_not_sent() {
        let listeners = GraphListeners::new("g");
        listeners
            .send_attribute_changed(
                ElementRef::Graph,
                ".private",
                AttributeChange::Added {
                    value: Value::Int(1),
                },
            )
            .unwrap();
        // No time id consumed for a hidden attribute
        assert_eq!(listeners.base().time().current(), 0);
    }
}
