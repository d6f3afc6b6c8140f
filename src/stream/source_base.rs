//! Reentrant broadcast dispatcher.
//!
//! # Dispatch protocol
//!
//! A `SourceBase` is either idle or dispatching. Every action (delivering an
//! event, changing the sink lists) is *admitted*:
//!
//! - when idle, the base switches to dispatching, drains anything left in the
//!   deferred queue, applies the action, drains the queue again, and goes
//!   back to idle;
//! - when dispatching, the action is appended to the deferred queue and the
//!   call returns immediately.
//!
//! A sink that calls back into the source during delivery therefore never
//! runs inline: its request is applied after the in-flight delivery, in the
//! order requests were made.
//!
//! # Failure
//!
//! A sink error aborts the pass: later sinks do not see the event and the
//! error is returned to whoever admitted the action. The phase is restored
//! by a drop guard, and whatever is still queued is drained at the start of
//! the next admitted action.

use crate::error::Result;
use crate::stream::event::Event;
use crate::stream::registry::SinkRegistry;
use crate::stream::sink::{AttributeSink, ElementSink};
use crate::stream::source::Source;
use crate::stream::time::SourceTime;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Dispatching,
}

/// An action waiting for the current pass to finish.
enum Pending {
    Deliver(Event),
    AddElementSink(Rc<dyn ElementSink>),
    AddAttributeSink(Rc<dyn AttributeSink>),
    RemoveElementSink(Rc<dyn ElementSink>),
    RemoveAttributeSink(Rc<dyn AttributeSink>),
    ClearElementSinks,
    ClearAttributeSinks,
}

impl Pending {
    fn label(&self) -> &'static str {
        match self {
            Pending::Deliver(_) => "deliver",
            Pending::AddElementSink(_) => "add_element_sink",
            Pending::AddAttributeSink(_) => "add_attribute_sink",
            Pending::RemoveElementSink(_) => "remove_element_sink",
            Pending::RemoveAttributeSink(_) => "remove_attribute_sink",
            Pending::ClearElementSinks => "clear_element_sinks",
            Pending::ClearAttributeSinks => "clear_attribute_sinks",
        }
    }
}

/// Resets the phase on every exit path of a pass.
struct DispatchGuard<'a>(&'a Cell<Phase>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(Phase::Idle);
    }
}

/// Sink registry, time counter and reentrancy protocol of one source.
pub struct SourceBase {
    source_id: String,
    time: SourceTime,
    registry: RefCell<SinkRegistry>,
    phase: Cell<Phase>,
    queue: RefCell<VecDeque<Pending>>,
}

impl SourceBase {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            time: SourceTime::new(),
            registry: RefCell::new(SinkRegistry::new()),
            phase: Cell::new(Phase::Idle),
            queue: RefCell::new(VecDeque::new()),
        }
    }

    /// A source named after the current thread and wall clock.
    pub fn with_default_id() -> Self {
        Self::new(default_source_id())
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Next time id of this source.
    pub fn new_event(&self) -> i64 {
        self.time.new_event()
    }

    pub fn time(&self) -> &SourceTime {
        &self.time
    }

    /// Broadcast `event` to the registered sinks.
    pub fn send(&self, event: Event) -> Result<()> {
        self.admit(Pending::Deliver(event))
    }

    pub fn is_dispatching(&self) -> bool {
        self.phase.get() == Phase::Dispatching
    }

    /// Number of deferred actions not applied yet.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn element_sinks(&self) -> Vec<Rc<dyn ElementSink>> {
        self.registry.borrow().element_sinks()
    }

    pub fn attribute_sinks(&self) -> Vec<Rc<dyn AttributeSink>> {
        self.registry.borrow().attribute_sinks()
    }

    pub fn element_sink_count(&self) -> usize {
        self.registry.borrow().element_sink_count()
    }

    pub fn attribute_sink_count(&self) -> usize {
        self.registry.borrow().attribute_sink_count()
    }

    // ── Protocol ──

    fn admit(&self, action: Pending) -> Result<()> {
        if self.is_dispatching() {
            tracing::trace!(source = %self.source_id, action = action.label(), "deferred");
            self.queue.borrow_mut().push_back(action);
            return Ok(());
        }

        self.phase.set(Phase::Dispatching);
        let _guard = DispatchGuard(&self.phase);

        self.drain()?;
        self.apply(action)?;
        self.drain()
    }

    fn drain(&self) -> Result<()> {
        while let Some(action) = self.pop_pending() {
            self.apply(action)?;
        }
        Ok(())
    }

    fn pop_pending(&self) -> Option<Pending> {
        self.queue.borrow_mut().pop_front()
    }

    fn apply(&self, action: Pending) -> Result<()> {
        match action {
            Pending::Deliver(event) => self.deliver(&event),
            Pending::AddElementSink(sink) => {
                self.registry.borrow_mut().add_element_sink(sink);
                Ok(())
            }
            Pending::AddAttributeSink(sink) => {
                self.registry.borrow_mut().add_attribute_sink(sink);
                Ok(())
            }
            Pending::RemoveElementSink(sink) => {
                self.registry.borrow_mut().remove_element_sink(&sink);
                Ok(())
            }
            Pending::RemoveAttributeSink(sink) => {
                self.registry.borrow_mut().remove_attribute_sink(&sink);
                Ok(())
            }
            Pending::ClearElementSinks => {
                self.registry.borrow_mut().clear_element_sinks();
                Ok(())
            }
            Pending::ClearAttributeSinks => {
                self.registry.borrow_mut().clear_attribute_sinks();
                Ok(())
            }
        }
    }

    fn deliver(&self, event: &Event) -> Result<()> {
        // Each sink is cloned out of the registry so no borrow is held
        // while it runs.
        let mut index = 0;
        if event.is_attribute_event() {
            while let Some(sink) = self.attribute_sink_at(index) {
                event.deliver_to_attribute_sink(sink.as_ref())?;
                index += 1;
            }
        } else {
            while let Some(sink) = self.element_sink_at(index) {
                event.deliver_to_element_sink(sink.as_ref())?;
                index += 1;
            }
        }
        Ok(())
    }

    fn element_sink_at(&self, index: usize) -> Option<Rc<dyn ElementSink>> {
        self.registry.borrow().element_sink_at(index)
    }

    fn attribute_sink_at(&self, index: usize) -> Option<Rc<dyn AttributeSink>> {
        self.registry.borrow().attribute_sink_at(index)
    }
}

impl Source for SourceBase {
    fn add_element_sink(&self, sink: Rc<dyn ElementSink>) -> Result<()> {
        self.admit(Pending::AddElementSink(sink))
    }

    fn add_attribute_sink(&self, sink: Rc<dyn AttributeSink>) -> Result<()> {
        self.admit(Pending::AddAttributeSink(sink))
    }

    fn remove_element_sink(&self, sink: &Rc<dyn ElementSink>) -> Result<()> {
        self.admit(Pending::RemoveElementSink(sink.clone()))
    }

    fn remove_attribute_sink(&self, sink: &Rc<dyn AttributeSink>) -> Result<()> {
        self.admit(Pending::RemoveAttributeSink(sink.clone()))
    }

    fn clear_element_sinks(&self) -> Result<()> {
        self.admit(Pending::ClearElementSinks)
    }

    fn clear_attribute_sinks(&self) -> Result<()> {
        self.admit(Pending::ClearAttributeSinks)
    }
}

impl std::fmt::Debug for SourceBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceBase")
            .field("source_id", &self.source_id)
            .field("phase", &self.phase.get())
            .field("pending", &self.pending())
            .field("registry", &*self.registry.borrow())
            .finish()
    }
}

/// `sourceOnThread#<thread>_<unix ms>`.
pub fn default_source_id() -> String {
    format!(
        "sourceOnThread#{:?}_{}",
        std::thread::current().id(),
        chrono::Utc::now().timestamp_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::stream::sink::MockElementSink;
    use std::cell::RefCell;

    /// Appends `(tag, node id)` to a shared log for every node added.
    struct Logger {
        tag: &'static str,
        log: Rc<RefCell<Vec<(&'static str, String)>>>,
    }

    impl ElementSink for Logger {
        fn node_added(&self, _source_id: &str, _time_id: i64, node_id: &str) -> Result<()> {
            self.log.borrow_mut().push((self.tag, node_id.to_string()));
            Ok(())
        }
    }

    /// On its first event, sends a follow-up event through the same base.
    struct Echo {
        base: Rc<SourceBase>,
        fired: Cell<bool>,
        log: Rc<RefCell<Vec<(&'static str, String)>>>,
    }

    impl ElementSink for Echo {
        fn node_added(&self, _source_id: &str, _time_id: i64, node_id: &str) -> Result<()> {
            self.log.borrow_mut().push(("echo", node_id.to_string()));
            if !self.fired.replace(true) {
                let t = self.base.new_event();
                self.base
                    .send(Event::node_added(self.base.source_id(), t, "follow-up"))?;
                assert!(self.base.pending() == 1);
            }
            Ok(())
        }
    }

    #[test]
    fn test_default_source_id_shape() {
        let id = default_source_id();
        assert!(id.starts_with("sourceOnThread#"));
        assert!(id.contains('_'));
    }

    #[test]
    fn test_send_reaches_sinks_in_registration_order() {
        let base = SourceBase::new("g");
        let mut first = MockElementSink::new();
        first
            .expect_node_added()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let mut second = MockElementSink::new();
        second
            .expect_node_added()
            .times(1)
            .returning(|_, _, _| Ok(()));

        base.add_element_sink(Rc::new(first)).unwrap();
        base.add_element_sink(Rc::new(second)).unwrap();
        let t = base.new_event();
        base.send(Event::node_added("g", t, "a")).unwrap();
        assert!(!base.is_dispatching());
    }

    #[test]
    fn test_reentrant_send_is_deferred() {
        let base = Rc::new(SourceBase::new("g"));
        let log = Rc::new(RefCell::new(Vec::new()));

        base.add_element_sink(Rc::new(Echo {
            base: base.clone(),
            fired: Cell::new(false),
            log: log.clone(),
        }))
        .unwrap();
        base.add_element_sink(Rc::new(Logger {
            tag: "logger",
            log: log.clone(),
        }))
        .unwrap();

        base.send(Event::node_added("g", base.new_event(), "a"))
            .unwrap();

        // The follow-up is delivered to everyone only after "a" reached every sink.
        let got: Vec<_> = log.borrow().clone();
        assert_eq!(
            got,
            vec![
                ("echo", "a".to_string()),
                ("logger", "a".to_string()),
                ("echo", "follow-up".to_string()),
                ("logger", "follow-up".to_string()),
            ]
        );
        assert_eq!(base.pending(), 0);
    }

    #[test]
    fn test_sink_error_stops_pass_and_recovers() {
        let base = SourceBase::new("g");
        let log = Rc::new(RefCell::new(Vec::new()));

        let mut failing = MockElementSink::new();
        failing
            .expect_node_added()
            .times(2)
            .returning(|_, _, _| Err(GraphError::Channel("boom".into())));
        let failing: Rc<dyn ElementSink> = Rc::new(failing);

        base.add_element_sink(failing.clone()).unwrap();
        base.add_element_sink(Rc::new(Logger {
            tag: "after",
            log: log.clone(),
        }))
        .unwrap();

        assert!(base.send(Event::node_added("g", 1, "a")).is_err());
        assert!(log.borrow().is_empty());
        assert!(!base.is_dispatching());

        // Still usable
        assert!(base.send(Event::node_added("g", 2, "b")).is_err());
        base.remove_element_sink(&failing).unwrap();
        base.send(Event::node_added("g", 3, "c")).unwrap();
        assert_eq!(log.borrow().as_slice(), &[("after", "c".to_string())]);
    }
}
