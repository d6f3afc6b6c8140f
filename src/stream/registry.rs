//! Insertion-ordered sink lists of a source.

use crate::stream::sink::{same_sink, AttributeSink, ElementSink};
use std::rc::Rc;

/// The element and attribute sinks registered on one source.
///
/// Duplicates are allowed: a sink registered twice is called twice per
/// event. Removal takes out the first identical entry only.
#[derive(Default)]
pub struct SinkRegistry {
    element_sinks: Vec<Rc<dyn ElementSink>>,
    attribute_sinks: Vec<Rc<dyn AttributeSink>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element_sink(&mut self, sink: Rc<dyn ElementSink>) {
        self.element_sinks.push(sink);
    }

    pub fn add_attribute_sink(&mut self, sink: Rc<dyn AttributeSink>) {
        self.attribute_sinks.push(sink);
    }

    /// Remove the first entry identical to `sink`. Returns whether one was found.
    pub fn remove_element_sink(&mut self, sink: &Rc<dyn ElementSink>) -> bool {
        match self.element_sinks.iter().position(|s| same_sink(s, sink)) {
            Some(pos) => {
                self.element_sinks.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn remove_attribute_sink(&mut self, sink: &Rc<dyn AttributeSink>) -> bool {
        match self.attribute_sinks.iter().position(|s| same_sink(s, sink)) {
            Some(pos) => {
                self.attribute_sinks.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn clear_element_sinks(&mut self) {
        self.element_sinks.clear();
    }

    pub fn clear_attribute_sinks(&mut self) {
        self.attribute_sinks.clear();
    }

    pub fn element_sink_at(&self, index: usize) -> Option<Rc<dyn ElementSink>> {
        self.element_sinks.get(index).cloned()
    }

    pub fn attribute_sink_at(&self, index: usize) -> Option<Rc<dyn AttributeSink>> {
        self.attribute_sinks.get(index).cloned()
    }

    pub fn element_sinks(&self) -> Vec<Rc<dyn ElementSink>> {
        self.element_sinks.clone()
    }

    pub fn attribute_sinks(&self) -> Vec<Rc<dyn AttributeSink>> {
        self.attribute_sinks.clone()
    }

    pub fn element_sink_count(&self) -> usize {
        self.element_sinks.len()
    }

    pub fn attribute_sink_count(&self) -> usize {
        self.attribute_sinks.len()
    }
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("element_sinks", &self.element_sinks.len())
            .field("attribute_sinks", &self.attribute_sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;
    impl ElementSink for Dummy {}
    impl AttributeSink for Dummy {}

    #[test]
    fn test_duplicates_and_first_match_removal() {
        let mut reg = SinkRegistry::new();
        let a: Rc<dyn ElementSink> = Rc::new(Dummy);
        let b: Rc<dyn ElementSink> = Rc::new(Dummy);

        reg.add_element_sink(a.clone());
        reg.add_element_sink(b.clone());
        reg.add_element_sink(a.clone());
        assert_eq!(reg.element_sink_count(), 3);

        assert!(reg.remove_element_sink(&a));
        assert_eq!(reg.element_sink_count(), 2);
        // Order after removal: b, a
        assert!(same_sink(&reg.element_sink_at(0).unwrap(), &b));
        assert!(same_sink(&reg.element_sink_at(1).unwrap(), &a));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut reg = SinkRegistry::new();
        let a: Rc<dyn AttributeSink> = Rc::new(Dummy);
        assert!(!reg.remove_attribute_sink(&a));
        reg.add_attribute_sink(a.clone());
        reg.clear_attribute_sinks();
        assert_eq!(reg.attribute_sink_count(), 0);
    }
}
