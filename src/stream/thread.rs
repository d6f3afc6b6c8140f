//! Cross-thread proxy pipe.
//!
//! Moves graph events from a producer thread to a consumer thread. The
//! producer side is a [`ProxySink`] registered on some source; every
//! callback becomes an [`Event`] posted on an unbounded crossbeam channel.
//! The consumer side is a [`ThreadProxyPipe`], a source of its own that
//! re-broadcasts the posted events, in order and with their original
//! `(source_id, time_id)`, whenever it is pumped.
//!
//! [`thread_proxy_pipe`] returns the two halves unbound so each can be moved
//! to the thread that will own it:
//!
//! ```ignore
//! let (input, output) = thread_proxy_pipe("viewer");
//! let viewer = std::thread::spawn(move || {
//!     let pipe = output.into_pipe();
//!     pipe.add_sink(Rc::new(ViewGraph::new("view")))?;
//!     pipe.blocking_pump(0)
//! });
//! let proxy = input.attach(graph.clone())?;
//! ```
//!
//! There is no backpressure: events accumulate until the consumer pumps.

use crate::error::{GraphError, Result};
use crate::stream::event::{ElementRef, Event};
use crate::stream::sink::{AttributeSink, ElementSink};
use crate::stream::source::Source;
use crate::stream::source_base::SourceBase;
use crate::value::Value;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Create the two unbound halves of a proxy pipe.
///
/// `id` becomes the source id of the consumer-side pipe.
pub fn thread_proxy_pipe(id: impl Into<String>) -> (ProxyInput, ProxyOutput) {
    let (tx, rx) = unbounded();
    let unregister = Arc::new(AtomicBool::new(false));
    (
        ProxyInput {
            tx,
            backlog: rx.clone(),
            unregister: unregister.clone(),
            only_from: None,
        },
        ProxyOutput {
            id: id.into(),
            rx,
            unregister,
        },
    )
}

// ── Producer side ──

/// Producer half before it is bound to a source.
pub struct ProxyInput {
    tx: Sender<Event>,
    backlog: Receiver<Event>,
    unregister: Arc<AtomicBool>,
    only_from: Option<String>,
}

impl ProxyInput {
    /// Only post events whose source id is `source_id`; relayed events are
    /// dropped.
    pub fn only_from(mut self, source_id: impl Into<String>) -> Self {
        self.only_from = Some(source_id.into());
        self
    }

    /// Build the proxy sink on the current thread and bind it to `source`.
    ///
    /// With `replay`, a replayable source first re-emits its current state
    /// into the sink.
    pub fn init(self, source: Option<Rc<dyn Source>>, replay: bool) -> Result<Rc<ProxySink>> {
        let sink = Rc::new_cyclic(|self_ref| ProxySink {
            tx: RefCell::new(Some(self.tx)),
            backlog: self.backlog,
            unregister: self.unregister,
            only_from: self.only_from,
            input: RefCell::new(None),
            self_ref: self_ref.clone(),
        });
        sink.init(source, replay)?;
        Ok(sink)
    }

    /// Bind to `source`, replaying its state if it is replayable.
    pub fn attach(self, source: Rc<dyn Source>) -> Result<Rc<ProxySink>> {
        let replay = source.as_replayable().is_some();
        self.init(Some(source), replay)
    }
}

/// Sink that posts every event it receives to the pipe's channel.
pub struct ProxySink {
    tx: RefCell<Option<Sender<Event>>>,
    backlog: Receiver<Event>,
    unregister: Arc<AtomicBool>,
    only_from: Option<String>,
    input: RefCell<Option<Weak<dyn Source>>>,
    self_ref: Weak<ProxySink>,
}

impl ProxySink {
    /// Rebind to another source.
    ///
    /// Detaches from the current source, discards events posted but not
    /// yet pumped, then attaches to `source` (replaying it if asked and
    /// possible).
    pub fn init(&self, source: Option<Rc<dyn Source>>, replay: bool) -> Result<()> {
        let previous = self.input.borrow_mut().take();
        if let Some(previous) = previous.and_then(|weak| weak.upgrade()) {
            self.detach_from(previous.as_ref())?;
        }

        let mut discarded = 0usize;
        while self.backlog.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "proxy re-initialised, dropped unconsumed events");
        }

        let Some(source) = source else {
            return Ok(());
        };
        *self.input.borrow_mut() = Some(Rc::downgrade(&source));

        let me = self.rc()?;
        source.add_attribute_sink(me.clone())?;
        source.add_element_sink(me.clone())?;

        if replay {
            if let Some(replayable) = source.as_replayable() {
                let controller = replayable.replay_controller();
                controller.add_attribute_sink(me.clone())?;
                controller.add_element_sink(me)?;
                controller.replay()?;
            }
        }
        Ok(())
    }

    /// Whether the proxy is currently bound to a live source.
    pub fn is_attached(&self) -> bool {
        self.input
            .borrow()
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Unbind from the current source, if any.
    pub fn detach(&self) -> Result<()> {
        let previous = self.input.borrow_mut().take();
        match previous.and_then(|weak| weak.upgrade()) {
            Some(source) => self.detach_from(source.as_ref()),
            None => Ok(()),
        }
    }

    /// Stop posting and unbind.
    ///
    /// The channel sender is dropped at once, so the consumer sees the
    /// disconnect after the events already posted even if the source is
    /// in a delivery pass and defers the unbinding.
    pub fn close(&self) -> Result<()> {
        if self.tx.borrow_mut().take().is_some() {
            tracing::debug!("proxy closed");
        }
        self.detach()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.borrow().is_none()
    }

    fn rc(&self) -> Result<Rc<ProxySink>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| GraphError::Channel("proxy sink already dropped".to_string()))
    }

    fn detach_from(&self, source: &dyn Source) -> Result<()> {
        let me = self.rc()?;
        let as_attribute: Rc<dyn AttributeSink> = me.clone();
        let as_element: Rc<dyn ElementSink> = me;
        source.remove_attribute_sink(&as_attribute)?;
        source.remove_element_sink(&as_element)
    }

    /// Honour a pending unregister request. Returns true if the current
    /// event must be dropped.
    fn maybe_unregister(&self) -> Result<bool> {
        if !self.unregister.load(Ordering::Acquire) {
            return Ok(false);
        }
        let input = self.input.borrow_mut().take();
        if let Some(source) = input.and_then(|weak| weak.upgrade()) {
            tracing::debug!("proxy unregistering from its source");
            self.detach_from(source.as_ref())?;
        }
        Ok(true)
    }

    fn post(&self, event: Event) -> Result<()> {
        if self.maybe_unregister()? {
            return Ok(());
        }
        if let Some(only) = &self.only_from {
            if event.source_id != *only {
                return Ok(());
            }
        }
        let tx = self.tx.borrow();
        let Some(tx) = tx.as_ref() else {
            tracing::trace!(source = %event.source_id, time = event.time_id, "post after close dropped");
            return Ok(());
        };
        tracing::trace!(source = %event.source_id, time = event.time_id, "post");
        tx.send(event)
            .map_err(|_| GraphError::Channel("proxy pipe consumer is gone".to_string()))
    }
}

impl ElementSink for ProxySink {
    fn node_added(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.post(Event::node_added(source_id, time_id, node_id))
    }

    fn node_removed(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.post(Event::node_removed(source_id, time_id, node_id))
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
        self.post(Event::edge_added(
            source_id,
            time_id,
            edge_id,
            from_node_id,
            to_node_id,
            directed,
        ))
    }

    fn edge_removed(&self, source_id: &str, time_id: i64, edge_id: &str) -> Result<()> {
        self.post(Event::edge_removed(source_id, time_id, edge_id))
    }

    fn graph_cleared(&self, source_id: &str, time_id: i64) -> Result<()> {
        self.post(Event::graph_cleared(source_id, time_id))
    }

    fn step_begins(&self, source_id: &str, time_id: i64, step: f64) -> Result<()> {
        self.post(Event::step_begins(source_id, time_id, step))
    }
}

impl AttributeSink for ProxySink {
    fn node_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.post(Event::attribute_added(
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
        self.post(Event::attribute_changed(
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
        self.post(Event::attribute_removed(
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
        self.post(Event::attribute_added(
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
        self.post(Event::attribute_changed(
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
        self.post(Event::attribute_removed(
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
        self.post(Event::attribute_added(
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
        self.post(Event::attribute_changed(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
            old_value.cloned(),
            new_value.clone(),
        ))
    }

    fn graph_attribute_removed(&self, source_id: &str, time_id: i64, attribute: &str) -> Result<()> {
        self.post(Event::attribute_removed(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
        ))
    }
}

// ── Consumer side ──

/// Consumer half before it is turned into a pipe.
pub struct ProxyOutput {
    id: String,
    rx: Receiver<Event>,
    unregister: Arc<AtomicBool>,
}

impl ProxyOutput {
    /// Build the consumer-side source on the current thread.
    pub fn into_pipe(self) -> ThreadProxyPipe {
        tracing::debug!(pipe = %self.id, "proxy pipe opened");
        ThreadProxyPipe {
            base: SourceBase::new(self.id),
            rx: self.rx,
            unregister: self.unregister,
        }
    }
}

/// Consumer-side source re-broadcasting the events posted by a [`ProxySink`].
pub struct ThreadProxyPipe {
    base: SourceBase,
    rx: Receiver<Event>,
    unregister: Arc<AtomicBool>,
}

impl ThreadProxyPipe {
    pub fn source_id(&self) -> &str {
        self.base.source_id()
    }

    /// Deliver every event currently available, in posting order.
    pub fn pump(&self) -> Result<()> {
        while let Ok(event) = self.rx.try_recv() {
            self.base.send(event)?;
        }
        Ok(())
    }

    /// Wait for at least one event, then [`pump`](Self::pump).
    ///
    /// `timeout_ms == 0` waits without limit. A timeout is not an error.
    /// Fails with [`GraphError::Channel`] once every producer is gone and
    /// nothing is left to deliver.
    pub fn blocking_pump(&self, timeout_ms: u64) -> Result<()> {
        let first = if timeout_ms == 0 {
            self.rx.recv().map_err(|_| disconnected())?
        } else {
            match self.rx.recv_timeout(Duration::from_millis(timeout_ms)) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => return Err(disconnected()),
            }
        };
        self.base.send(first)?;
        self.pump()
    }

    /// Broadcast an event of the pipe's own, e.g. to retract a relayed
    /// attribute. Deferred like any send made during a delivery pass.
    pub fn send(&self, event: Event) -> Result<()> {
        self.base.send(event)
    }

    /// Next time id of the pipe as a source.
    pub fn new_event(&self) -> i64 {
        self.base.new_event()
    }

    /// True if events are waiting to be pumped.
    pub fn has_post_remaining(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Ask the producer side to leave its source at its next event.
    ///
    /// Events already posted are still delivered by later pumps.
    pub fn unregister_from_source(&self) {
        self.unregister.store(true, Ordering::Release);
    }

    pub fn element_sink_count(&self) -> usize {
        self.base.element_sink_count()
    }

    pub fn attribute_sink_count(&self) -> usize {
        self.base.attribute_sink_count()
    }
}

fn disconnected() -> GraphError {
    GraphError::Channel("all proxy producers are gone".to_string())
}

impl Source for ThreadProxyPipe {
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
