//! Event propagation core.
//!
//! - [`event`]: the change vocabulary and its dispatch switch
//! - [`sink`] / [`source`]: subscriber and publisher capabilities
//! - [`source_base`]: the reentrant broadcast dispatcher
//! - [`thread`]: the cross-thread proxy pipe

pub mod event;
pub mod registry;
pub mod sink;
pub mod source;
pub mod source_base;
pub mod thread;
pub mod time;

pub use event::{AttributeChange, ElementRef, ElementType, Event, EventKind};
pub use registry::SinkRegistry;
pub use sink::{same_sink, AttributeSink, ElementSink, Sink};
pub use source::{ReplayControl, Replayable, Source};
pub use source_base::SourceBase;
pub use thread::{thread_proxy_pipe, ProxyInput, ProxyOutput, ProxySink, ThreadProxyPipe};
pub use time::{SinkTime, SourceTime};
