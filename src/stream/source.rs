//! Source and replay capabilities.

use crate::error::Result;
use crate::stream::sink::{AttributeSink, ElementSink, Sink};
use std::rc::Rc;

/// Anything sinks can subscribe to.
///
/// Registry changes requested while the source is delivering an event are
/// applied after that delivery, in request order.
pub trait Source {
    fn add_element_sink(&self, sink: Rc<dyn ElementSink>) -> Result<()>;

    fn add_attribute_sink(&self, sink: Rc<dyn AttributeSink>) -> Result<()>;

    fn remove_element_sink(&self, sink: &Rc<dyn ElementSink>) -> Result<()>;

    fn remove_attribute_sink(&self, sink: &Rc<dyn AttributeSink>) -> Result<()>;

    fn clear_element_sinks(&self) -> Result<()>;

    fn clear_attribute_sinks(&self) -> Result<()>;

    /// Remove every sink, element sinks first.
    fn clear_sinks(&self) -> Result<()> {
        self.clear_element_sinks()?;
        self.clear_attribute_sinks()
    }

    /// Register `sink` for both event families (attribute side first).
    fn add_sink<S: Sink + 'static>(&self, sink: Rc<S>) -> Result<()>
    where
        Self: Sized,
    {
        self.add_attribute_sink(sink.clone())?;
        self.add_element_sink(sink)
    }

    /// Unregister `sink` from both event families (attribute side first).
    fn remove_sink<S: Sink + 'static>(&self, sink: &Rc<S>) -> Result<()>
    where
        Self: Sized,
    {
        let as_attribute: Rc<dyn AttributeSink> = sink.clone();
        let as_element: Rc<dyn ElementSink> = sink.clone();
        self.remove_attribute_sink(&as_attribute)?;
        self.remove_element_sink(&as_element)
    }

    /// The replay capability, if this source has one.
    fn as_replayable(&self) -> Option<&dyn Replayable> {
        None
    }
}

/// A source able to re-emit its whole current state as events.
pub trait Replayable {
    /// A fresh controller; sinks added to it receive the replayed events.
    fn replay_controller(&self) -> Box<dyn ReplayControl>;
}

/// A short-lived source that emits the state of its owner on demand.
pub trait ReplayControl: Source {
    /// Replay under a freshly generated source id.
    fn replay(&self) -> Result<()>;

    /// Replay under the given source id.
    fn replay_as(&self, source_id: &str) -> Result<()>;
}
