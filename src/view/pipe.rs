//! Events coming back from a viewer.
//!
//! A [`ViewerPipe`] is the application-side end of the channel a viewer
//! thread reports on: node moves, clicks, hovering and the closing of the
//! view. It re-broadcasts those events like any source, so a graph can be
//! plugged in to receive them, and turns the `ui.*` interaction attributes
//! into [`ViewerListener`] calls.

use crate::error::Result;
use crate::stream::event::{ElementRef, Event};
use crate::stream::sink::{same_sink, AttributeSink, ElementSink};
use crate::stream::source::Source;
use crate::stream::thread::ThreadProxyPipe;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::debug;

/// Callbacks for what happens inside a viewer.
///
/// All methods default to doing nothing.
pub trait ViewerListener {
    /// The view named `view_id` was closed.
    fn view_closed(&self, _view_id: &str) {}

    fn button_pushed(&self, _id: &str) {}

    fn button_released(&self, _id: &str) {}

    fn mouse_over(&self, _id: &str) {}

    fn mouse_left(&self, _id: &str) {}
}

/// Application-side source of the events a viewer sends back.
pub struct ViewerPipe {
    pipe: Rc<ThreadProxyPipe>,
    relay: Rc<ListenerRelay>,
}

impl ViewerPipe {
    pub(crate) fn new(pipe: ThreadProxyPipe) -> Result<Self> {
        let pipe = Rc::new(pipe);
        let relay = Rc::new(ListenerRelay {
            pipe: Rc::downgrade(&pipe),
            listeners: RefCell::new(Vec::new()),
        });
        pipe.add_attribute_sink(relay.clone())?;
        Ok(Self { pipe, relay })
    }

    pub fn id(&self) -> &str {
        self.pipe.source_id()
    }

    /// Deliver every event the viewer has sent so far.
    pub fn pump(&self) -> Result<()> {
        self.pipe.pump()
    }

    /// Wait up to `timeout_ms` (0 for no limit) for the viewer, then pump.
    ///
    /// Fails with a channel error once the viewer thread has ended and its
    /// last events were delivered.
    pub fn blocking_pump(&self, timeout_ms: u64) -> Result<()> {
        self.pipe.blocking_pump(timeout_ms)
    }

    pub fn add_viewer_listener(&self, listener: Rc<dyn ViewerListener>) {
        self.relay.listeners.borrow_mut().push(listener);
    }

    pub fn remove_viewer_listener(&self, listener: &Rc<dyn ViewerListener>) {
        self.relay
            .listeners
            .borrow_mut()
            .retain(|l| !same_sink(l, listener));
    }

    pub fn viewer_listener_count(&self) -> usize {
        self.relay.listeners.borrow().len()
    }
}

impl Source for ViewerPipe {
    fn add_element_sink(&self, sink: Rc<dyn ElementSink>) -> Result<()> {
        self.pipe.add_element_sink(sink)
    }

    fn add_attribute_sink(&self, sink: Rc<dyn AttributeSink>) -> Result<()> {
        self.pipe.add_attribute_sink(sink)
    }

    fn remove_element_sink(&self, sink: &Rc<dyn ElementSink>) -> Result<()> {
        self.pipe.remove_element_sink(sink)
    }

    fn remove_attribute_sink(&self, sink: &Rc<dyn AttributeSink>) -> Result<()> {
        self.pipe.remove_attribute_sink(sink)
    }

    fn clear_element_sinks(&self) -> Result<()> {
        self.pipe.clear_element_sinks()
    }

    fn clear_attribute_sinks(&self) -> Result<()> {
        self.pipe.clear_attribute_sinks()
    }
}

impl std::fmt::Debug for ViewerPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerPipe")
            .field("id", &self.id())
            .field("listeners", &self.viewer_listener_count())
            .finish()
    }
}

/// First sink of the pipe. Maps interaction attributes to listener calls.
struct ListenerRelay {
    pipe: Weak<ThreadProxyPipe>,
    listeners: RefCell<Vec<Rc<dyn ViewerListener>>>,
}

impl ListenerRelay {
    fn notify(&self, call: impl Fn(&dyn ViewerListener)) {
        // Cloned so a listener may add or remove listeners
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            call(listener.as_ref());
        }
    }

    /// Take back a one-shot graph attribute once the listeners have seen it.
    fn retract(&self, attribute: &str) -> Result<()> {
        let Some(pipe) = self.pipe.upgrade() else {
            return Ok(());
        };
        let event = Event::attribute_removed(
            pipe.source_id(),
            pipe.new_event(),
            ElementRef::Graph,
            attribute,
        );
        pipe.send(event)
    }
}

impl AttributeSink for ListenerRelay {
    fn graph_attribute_added(
        &self,
        _source_id: &str,
        _time_id: i64,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        let Value::String(text) = value else {
            return Ok(());
        };
        match attribute {
            "ui.viewClosed" => {
                debug!(view = %text, "view closed");
                self.notify(|l| l.view_closed(text));
                self.retract(attribute)
            }
            "ui.clicked" => {
                self.notify(|l| l.button_pushed(text));
                self.retract(attribute)
            }
            _ => Ok(()),
        }
    }

    fn node_attribute_added(
        &self,
        _source_id: &str,
        _time_id: i64,
        node_id: &str,
        attribute: &str,
        _value: &Value,
    ) -> Result<()> {
        match attribute {
            "ui.clicked" => self.notify(|l| l.button_pushed(node_id)),
            "ui.mouseOver" => self.notify(|l| l.mouse_over(node_id)),
            _ => {}
        }
        Ok(())
    }

    fn node_attribute_removed(
        &self,
        _source_id: &str,
        _time_id: i64,
        node_id: &str,
        attribute: &str,
    ) -> Result<()> {
        match attribute {
            "ui.clicked" => self.notify(|l| l.button_released(node_id)),
            "ui.mouseOver" => self.notify(|l| l.mouse_left(node_id)),
            _ => {}
        }
        Ok(())
    }
}
