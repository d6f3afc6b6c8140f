//! Sink capability traits.
//!
//! A sink receives graph change notifications. Structural changes go to an
//! [`ElementSink`], attribute changes to an [`AttributeSink`]; [`Sink`] is
//! anything that is both. Every callback has a no-op default so an
//! implementor only overrides what it cares about.
//!
//! Callbacks take `&self`: sinks are shared as `Rc<dyn ...>` and keep their
//! mutable state behind `Cell`/`RefCell`. A callback may call back into the
//! source that is delivering to it; the source defers that call until the
//! current delivery pass is finished.

use crate::error::Result;
use crate::value::Value;
use std::rc::Rc;

/// Receiver of structural change events.
#[cfg_attr(test, mockall::automock)]
pub trait ElementSink {
    fn node_added(&self, _source_id: &str, _time_id: i64, _node_id: &str) -> Result<()> {
        Ok(())
    }

    fn node_removed(&self, _source_id: &str, _time_id: i64, _node_id: &str) -> Result<()> {
        Ok(())
    }

    fn edge_added(
        &self,
        _source_id: &str,
        _time_id: i64,
        _edge_id: &str,
        _from_node_id: &str,
        _to_node_id: &str,
        _directed: bool,
    ) -> Result<()> {
        Ok(())
    }

    fn edge_removed(&self, _source_id: &str, _time_id: i64, _edge_id: &str) -> Result<()> {
        Ok(())
    }

    fn graph_cleared(&self, _source_id: &str, _time_id: i64) -> Result<()> {
        Ok(())
    }

    fn step_begins(&self, _source_id: &str, _time_id: i64, _step: f64) -> Result<()> {
        Ok(())
    }
}

/// Receiver of attribute change events on nodes, edges and the graph.
pub trait AttributeSink {
    fn node_attribute_added(
        &self,
        _source_id: &str,
        _time_id: i64,
        _node_id: &str,
        _attribute: &str,
        _value: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn node_attribute_changed(
        &self,
        _source_id: &str,
        _time_id: i64,
        _node_id: &str,
        _attribute: &str,
        _old_value: Option<&Value>,
        _new_value: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn node_attribute_removed(
        &self,
        _source_id: &str,
        _time_id: i64,
        _node_id: &str,
        _attribute: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn edge_attribute_added(
        &self,
        _source_id: &str,
        _time_id: i64,
        _edge_id: &str,
        _attribute: &str,
        _value: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn edge_attribute_changed(
        &self,
        _source_id: &str,
        _time_id: i64,
        _edge_id: &str,
        _attribute: &str,
        _old_value: Option<&Value>,
        _new_value: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn edge_attribute_removed(
        &self,
        _source_id: &str,
        _time_id: i64,
        _edge_id: &str,
        _attribute: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn graph_attribute_added(
        &self,
        _source_id: &str,
        _time_id: i64,
        _attribute: &str,
        _value: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn graph_attribute_changed(
        &self,
        _source_id: &str,
        _time_id: i64,
        _attribute: &str,
        _old_value: Option<&Value>,
        _new_value: &Value,
    ) -> Result<()> {
        Ok(())
    }

    fn graph_attribute_removed(&self, _source_id: &str, _time_id: i64, _attribute: &str) -> Result<()> {
        Ok(())
    }
}

/// A sink for both event families.
pub trait Sink: ElementSink + AttributeSink {}

impl<T: ElementSink + AttributeSink + ?Sized> Sink for T {}

/// Identity of two shared sinks: same allocation, ignoring vtables.
pub fn same_sink<A: ?Sized, B: ?Sized>(a: &Rc<A>, b: &Rc<B>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;
    impl ElementSink for Nothing {}
    impl AttributeSink for Nothing {}

    #[test]
    fn test_default_callbacks_ignore_events() {
        let sink = Nothing;
        assert!(sink.node_added("g", 1, "a").is_ok());
        assert!(sink.graph_attribute_removed("g", 2, "x").is_ok());
    }

    #[test]
    fn test_same_sink_across_trait_objects() {
        let concrete = Rc::new(Nothing);
        let as_element: Rc<dyn ElementSink> = concrete.clone();
        let as_attribute: Rc<dyn AttributeSink> = concrete.clone();
        let other: Rc<dyn ElementSink> = Rc::new(Nothing);

        assert!(same_sink(&as_element, &as_attribute));
        assert!(!same_sink(&as_element, &other));
    }
}
