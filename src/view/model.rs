//! Render model fed by graph events.
//!
//! [`ViewGraph`] sits at the end of a proxy pipe on the viewer thread. It
//! keeps only what a renderer needs: node positions, edge endpoints,
//! sprites and the `ui.*` attributes, and forwards every event it accepts
//! to its own sinks. Payloads it cannot interpret are logged and skipped.

use crate::error::{GraphError, Result};
use crate::stream::event::{AttributeChange, ElementRef, Event, EventKind};
use crate::stream::sink::{AttributeSink, ElementSink};
use crate::stream::source::Source;
use crate::stream::source_base::SourceBase;
use crate::stream::time::SinkTime;
use crate::value::Value;
use crate::view::geom::{Bounds, Point3};
use crate::view::sprite::{split_sprite_attribute, Attachment, Sprite, SpritePosition};
use crate::view::style::{RawStyleSheet, StyleSheetLoader};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

/// Whether an attribute matters to the renderer.
pub fn is_rendering_attribute(name: &str) -> bool {
    name.starts_with("ui.") || matches!(name, "x" | "y" | "z" | "xy" | "xyz" | "stylesheet")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewNode {
    pub position: Point3,
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewEdge {
    pub source: String,
    pub target: String,
    pub directed: bool,
    pub attributes: BTreeMap<String, Value>,
}

/// Serialisable copy of the render model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewSnapshot {
    pub id: String,
    pub step: f64,
    pub attributes: BTreeMap<String, Value>,
    pub nodes: BTreeMap<String, ViewNode>,
    pub edges: BTreeMap<String, ViewEdge>,
    pub sprites: BTreeMap<String, Sprite>,
}

impl ViewSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ViewGraph {
    base: SourceBase,
    sink_time: SinkTime,
    feedback_xyz: Cell<bool>,
    changed: Cell<bool>,
    step: Cell<f64>,
    attributes: RefCell<BTreeMap<String, Value>>,
    nodes: RefCell<BTreeMap<String, ViewNode>>,
    edges: RefCell<BTreeMap<String, ViewEdge>>,
    sprites: RefCell<BTreeMap<String, Sprite>>,
    style: RefCell<Box<dyn StyleSheetLoader>>,
}

impl ViewGraph {
    /// Empty render model keeping style sheets as raw text.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_style_loader(id, Box::new(RawStyleSheet::new()))
    }

    pub fn with_style_loader(id: impl Into<String>, loader: Box<dyn StyleSheetLoader>) -> Self {
        Self {
            base: SourceBase::new(id),
            sink_time: SinkTime::new(),
            feedback_xyz: Cell::new(true),
            changed: Cell::new(false),
            step: Cell::new(0.0),
            attributes: RefCell::new(BTreeMap::new()),
            nodes: RefCell::new(BTreeMap::new()),
            edges: RefCell::new(BTreeMap::new()),
            sprites: RefCell::new(BTreeMap::new()),
            style: RefCell::new(loader),
        }
    }

    pub fn id(&self) -> &str {
        self.base.source_id()
    }

    pub fn feedback_xyz(&self) -> bool {
        self.feedback_xyz.get()
    }

    /// Whether [`move_node`](Self::move_node) reports moves to the sinks.
    pub fn set_feedback_xyz(&self, on: bool) {
        self.feedback_xyz.set(on);
    }

    /// Something visible changed since the last [`reset_changed`](Self::reset_changed).
    pub fn has_changed(&self) -> bool {
        self.changed.get()
    }

    pub fn reset_changed(&self) {
        self.changed.set(false);
    }

    pub fn step(&self) -> f64 {
        self.step.get()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.borrow().len()
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.borrow().len()
    }

    pub fn node(&self, id: &str) -> Option<ViewNode> {
        self.nodes.borrow().get(id).cloned()
    }

    pub fn node_position(&self, id: &str) -> Option<Point3> {
        self.nodes.borrow().get(id).map(|node| node.position)
    }

    pub fn edge(&self, id: &str) -> Option<ViewEdge> {
        self.edges.borrow().get(id).cloned()
    }

    pub fn sprite(&self, id: &str) -> Option<Sprite> {
        self.sprites.borrow().get(id).cloned()
    }

    /// Graph-level rendering attribute.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    /// Nodes are keyed by id only.
    pub fn node_at(&self, index: usize) -> Result<ViewNode> {
        Err(GraphError::UnsupportedOperation(format!(
            "node_at({}) on a render model",
            index
        )))
    }

    /// Min/max corners over every node position.
    pub fn bounds(&self) -> Bounds {
        Bounds::of(self.nodes.borrow().values().map(|node| node.position))
    }

    /// Move a node, e.g. after the user dragged it. With feedback on, the
    /// move is reported to this model's sinks as an `xyz` change.
    pub fn move_node(&self, id: &str, x: f64, y: f64, z: f64) -> Result<()> {
        let old = {
            let mut nodes = self.nodes.borrow_mut();
            let node = nodes
                .get_mut(id)
                .ok_or_else(|| GraphError::ElementNotFound(id.to_string()))?;
            std::mem::replace(&mut node.position, Point3::new(x, y, z))
        };
        self.changed.set(true);

        if !self.feedback_xyz.get() {
            return Ok(());
        }
        self.emit(|source_id, t| {
            Event::attribute_changed(
                source_id,
                t,
                ElementRef::Node(id.to_string()),
                "xyz",
                Some(Value::from([old.x, old.y, old.z])),
                Value::from([x, y, z]),
            )
        })
    }

    /// A mouse button went down on a node: sets `ui.clicked`.
    pub fn press_node(&self, id: &str) -> Result<()> {
        self.set_node_flag(id, "ui.clicked", true)
    }

    /// Clears `ui.clicked`.
    pub fn release_node(&self, id: &str) -> Result<()> {
        self.set_node_flag(id, "ui.clicked", false)
    }

    /// The pointer entered a node: sets `ui.mouseOver`.
    pub fn hover_node(&self, id: &str) -> Result<()> {
        self.set_node_flag(id, "ui.mouseOver", true)
    }

    /// Clears `ui.mouseOver`.
    pub fn leave_node(&self, id: &str) -> Result<()> {
        self.set_node_flag(id, "ui.mouseOver", false)
    }

    /// Tell the sinks this view is going away, as a `ui.viewClosed` graph
    /// attribute holding the view id.
    pub fn announce_closed(&self) -> Result<()> {
        let view_id = self.id().to_string();
        self.emit(|source_id, t| {
            Event::attribute_added(
                source_id,
                t,
                ElementRef::Graph,
                "ui.viewClosed",
                Value::from(view_id),
            )
        })
    }

    fn set_node_flag(&self, id: &str, name: &str, on: bool) -> Result<()> {
        let toggled = {
            let mut nodes = self.nodes.borrow_mut();
            let node = nodes
                .get_mut(id)
                .ok_or_else(|| GraphError::ElementNotFound(id.to_string()))?;
            if on {
                node.attributes
                    .insert(name.to_string(), Value::Bool(true))
                    .is_none()
            } else {
                node.attributes.remove(name).is_some()
            }
        };
        if !toggled {
            return Ok(());
        }
        self.changed.set(true);

        let element = ElementRef::Node(id.to_string());
        self.emit(|source_id, t| {
            if on {
                Event::attribute_added(source_id, t, element, name, Value::Bool(true))
            } else {
                Event::attribute_removed(source_id, t, element, name)
            }
        })
    }

    /// Send an event originating in this view. Its id is recorded so the
    /// echo coming back from a mirrored graph is dropped.
    fn emit(&self, event: impl FnOnce(&str, i64) -> Event) -> Result<()> {
        let t = self.base.new_event();
        self.sink_time.record(self.base.source_id(), t);
        self.base.send(event(self.base.source_id(), t))
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            id: self.id().to_string(),
            step: self.step.get(),
            attributes: self.attributes.borrow().clone(),
            nodes: self.nodes.borrow().clone(),
            edges: self.edges.borrow().clone(),
            sprites: self.sprites.borrow().clone(),
        }
    }

    // ── Inbound ──

    fn receive(&self, event: Event) -> Result<()> {
        if !self.sink_time.is_new_event(&event.source_id, event.time_id) {
            return Ok(());
        }
        self.apply(&event);
        self.base.send(event)
    }

    fn apply(&self, event: &Event) {
        match &event.kind {
            EventKind::NodeAdded { node_id } => {
                self.ensure_node(node_id);
            }
            EventKind::NodeRemoved { node_id } => {
                if self.nodes.borrow_mut().remove(node_id).is_none() {
                    return;
                }
                let orphans: Vec<String> = self
                    .edges
                    .borrow()
                    .iter()
                    .filter(|(_, edge)| edge.source == *node_id || edge.target == *node_id)
                    .map(|(id, _)| id.clone())
                    .collect();
                for edge_id in orphans {
                    self.drop_edge(&edge_id);
                }
                self.detach_sprites(&Attachment::Node(node_id.clone()));
            }
            EventKind::EdgeAdded {
                edge_id,
                from_node_id,
                to_node_id,
                directed,
            } => {
                self.ensure_node(from_node_id);
                self.ensure_node(to_node_id);
                self.edges.borrow_mut().insert(
                    edge_id.clone(),
                    ViewEdge {
                        source: from_node_id.clone(),
                        target: to_node_id.clone(),
                        directed: *directed,
                        attributes: BTreeMap::new(),
                    },
                );
            }
            EventKind::EdgeRemoved { edge_id } => self.drop_edge(edge_id),
            EventKind::GraphCleared => {
                self.attributes.borrow_mut().clear();
                self.nodes.borrow_mut().clear();
                self.edges.borrow_mut().clear();
                self.sprites.borrow_mut().clear();
                self.style.borrow_mut().clear();
            }
            EventKind::StepBegins { step } => self.step.set(*step),
            EventKind::Attribute {
                element,
                attribute,
                change,
            } => {
                if !is_rendering_attribute(attribute) {
                    return;
                }
                let value = match change {
                    AttributeChange::Added { value } => Some(value),
                    AttributeChange::Changed { new_value, .. } => Some(new_value),
                    AttributeChange::Removed => None,
                };
                match element {
                    ElementRef::Graph => self.graph_attribute(attribute, value),
                    ElementRef::Node(id) => self.node_attribute(id, attribute, value),
                    ElementRef::Edge(id) => self.edge_attribute(id, attribute, value),
                }
            }
        }
        self.changed.set(true);
    }

    fn ensure_node(&self, id: &str) {
        self.nodes.borrow_mut().entry(id.to_string()).or_default();
    }

    fn drop_edge(&self, id: &str) {
        if self.edges.borrow_mut().remove(id).is_some() {
            self.detach_sprites(&Attachment::Edge(id.to_string()));
        }
    }

    fn graph_attribute(&self, name: &str, value: Option<&Value>) {
        if let Some((sprite_id, sprite_attribute)) = split_sprite_attribute(name) {
            match sprite_attribute {
                Some(attribute) => self.sprite_attribute(sprite_id, attribute, value),
                None => self.place_sprite(sprite_id, value),
            }
            return;
        }

        if name == "stylesheet" || name == "ui.stylesheet" {
            self.style_sheet(value);
        }
        if name.starts_with("ui.") {
            store(&mut self.attributes.borrow_mut(), name, value);
        }
    }

    fn style_sheet(&self, value: Option<&Value>) {
        let Some(value) = value else {
            self.style.borrow_mut().clear();
            return;
        };
        match value.as_str() {
            Some(text) => {
                if let Err(e) = self.style.borrow_mut().load(text) {
                    warn!("Error while parsing style sheet: {}", e);
                }
            }
            None => warn!(
                "Error with stylesheet specification, what to do with '{}' ({})?",
                value,
                value.kind()
            ),
        }
    }

    fn node_attribute(&self, id: &str, name: &str, value: Option<&Value>) {
        if !self.nodes.borrow().contains_key(id) {
            debug!(node = id, attribute = name, "attribute on unknown node ignored");
            return;
        }
        if let Some((sprite_id, None)) = split_sprite_attribute(name) {
            self.attach_sprite(sprite_id, Attachment::Node(id.to_string()), value);
            return;
        }

        let mut nodes = self.nodes.borrow_mut();
        let Some(node) = nodes.get_mut(id) else {
            return;
        };
        if matches!(name, "x" | "y" | "z" | "xy" | "xyz") {
            if let Some(value) = value {
                match parse_position(name, value, node.position) {
                    Ok(position) => node.position = position,
                    Err(reason) => warn!(node = id, "{}", reason),
                }
            }
            return;
        }
        if name.starts_with("ui.") {
            store(&mut node.attributes, name, value);
        }
    }

    fn edge_attribute(&self, id: &str, name: &str, value: Option<&Value>) {
        if !self.edges.borrow().contains_key(id) {
            debug!(edge = id, attribute = name, "attribute on unknown edge ignored");
            return;
        }
        if let Some((sprite_id, None)) = split_sprite_attribute(name) {
            self.attach_sprite(sprite_id, Attachment::Edge(id.to_string()), value);
            return;
        }
        if name.starts_with("ui.") {
            if let Some(edge) = self.edges.borrow_mut().get_mut(id) {
                store(&mut edge.attributes, name, value);
            }
        }
    }

    // ── Sprites ──

    fn place_sprite(&self, sprite_id: &str, value: Option<&Value>) {
        let mut sprites = self.sprites.borrow_mut();
        let Some(value) = value else {
            sprites.remove(sprite_id);
            return;
        };
        let sprite = sprites
            .entry(sprite_id.to_string())
            .or_insert_with(|| Sprite::new(sprite_id));
        position_sprite(sprite, value);
    }

    fn sprite_attribute(&self, sprite_id: &str, attribute: &str, value: Option<&Value>) {
        let mut sprites = self.sprites.borrow_mut();
        match value {
            Some(value) => {
                // Replays may deliver sprite attributes before the sprite itself
                sprites
                    .entry(sprite_id.to_string())
                    .or_insert_with(|| Sprite::new(sprite_id))
                    .attributes
                    .insert(attribute.to_string(), value.clone());
            }
            None => {
                if let Some(sprite) = sprites.get_mut(sprite_id) {
                    sprite.attributes.remove(attribute);
                }
            }
        }
    }

    fn attach_sprite(&self, sprite_id: &str, to: Attachment, value: Option<&Value>) {
        let mut sprites = self.sprites.borrow_mut();
        match value {
            Some(value) => {
                let sprite = sprites
                    .entry(sprite_id.to_string())
                    .or_insert_with(|| Sprite::new(sprite_id));
                sprite.attachment = Some(to);
                position_sprite(sprite, value);
            }
            None => {
                if let Some(sprite) = sprites.get_mut(sprite_id) {
                    if sprite.attachment.as_ref() == Some(&to) {
                        sprite.attachment = None;
                    }
                }
            }
        }
    }

    fn detach_sprites(&self, from: &Attachment) {
        for sprite in self.sprites.borrow_mut().values_mut() {
            if sprite.attachment.as_ref() == Some(from) {
                sprite.attachment = None;
            }
        }
    }
}

/// Booleans only create or attach, they never move a sprite.
fn position_sprite(sprite: &mut Sprite, value: &Value) {
    if value.as_bool().is_some() {
        return;
    }
    match SpritePosition::parse(value) {
        Ok(position) => sprite.position = position,
        Err(reason) => warn!(sprite = %sprite.id, "{}", reason),
    }
}

fn store(map: &mut BTreeMap<String, Value>, name: &str, value: Option<&Value>) {
    match value {
        Some(value) => {
            map.insert(name.to_string(), value.clone());
        }
        None => {
            map.remove(name);
        }
    }
}

/// New position after setting `name` (`x`, `y`, `z`, `xy` or `xyz`) to `value`.
fn parse_position(name: &str, value: &Value, current: Point3) -> std::result::Result<Point3, String> {
    let mut position = current;
    match name {
        "x" | "y" | "z" => {
            let n = value
                .as_number()
                .ok_or_else(|| format!("'{}' expects a number, got {}", name, value.kind()))?;
            match name {
                "x" => position.x = n,
                "y" => position.y = n,
                _ => position.z = n,
            }
        }
        _ => {
            let numbers: Option<Vec<f64>> = value
                .as_array()
                .and_then(|items| items.iter().map(Value::as_number).collect());
            match (name, numbers.as_deref()) {
                ("xy", Some([x, y])) | ("xyz", Some([x, y])) => {
                    position.x = *x;
                    position.y = *y;
                }
                ("xyz", Some([x, y, z])) => position = Point3::new(*x, *y, *z),
                _ => {
                    return Err(format!(
                        "cannot position from '{}' = {} ({})",
                        name,
                        value,
                        value.kind()
                    ))
                }
            }
        }
    }
    Ok(position)
}

impl std::fmt::Debug for ViewGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewGraph")
            .field("id", &self.id())
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("sprites", &self.sprite_count())
            .field("changed", &self.changed.get())
            .finish()
    }
}

impl Source for ViewGraph {
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

impl ElementSink for ViewGraph {
    fn node_added(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.receive(Event::node_added(source_id, time_id, node_id))
    }

    fn node_removed(&self, source_id: &str, time_id: i64, node_id: &str) -> Result<()> {
        self.receive(Event::node_removed(source_id, time_id, node_id))
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
        self.receive(Event::edge_added(
            source_id,
            time_id,
            edge_id,
            from_node_id,
            to_node_id,
            directed,
        ))
    }

    fn edge_removed(&self, source_id: &str, time_id: i64, edge_id: &str) -> Result<()> {
        self.receive(Event::edge_removed(source_id, time_id, edge_id))
    }

    fn graph_cleared(&self, source_id: &str, time_id: i64) -> Result<()> {
        self.receive(Event::graph_cleared(source_id, time_id))
    }

    fn step_begins(&self, source_id: &str, time_id: i64, step: f64) -> Result<()> {
        self.receive(Event::step_begins(source_id, time_id, step))
    }
}

impl AttributeSink for ViewGraph {
    fn node_attribute_added(
        &self,
        source_id: &str,
        time_id: i64,
        node_id: &str,
        attribute: &str,
        value: &Value,
    ) -> Result<()> {
        self.receive(Event::attribute_added(
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
        self.receive(Event::attribute_changed(
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
        self.receive(Event::attribute_removed(
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
        self.receive(Event::attribute_added(
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
        self.receive(Event::attribute_changed(
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
        self.receive(Event::attribute_removed(
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
        self.receive(Event::attribute_added(
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
        self.receive(Event::attribute_changed(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
            old_value.cloned(),
            new_value.clone(),
        ))
    }

    fn graph_attribute_removed(&self, source_id: &str, time_id: i64, attribute: &str) -> Result<()> {
        self.receive(Event::attribute_removed(
            source_id,
            time_id,
            ElementRef::Graph,
            attribute,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::sink::MockElementSink;

    /// Loader recording every call into a shared log.
    struct LoaderLog(Rc<RefCell<Vec<String>>>);

    impl StyleSheetLoader for LoaderLog {
        fn load(&mut self, source: &str) -> Result<()> {
            if source.contains("broken") {
                return Err(GraphError::StyleSheet("unexpected token".into()));
            }
            self.0.borrow_mut().push(source.to_string());
            Ok(())
        }

        fn clear(&mut self) {
            self.0.borrow_mut().push("<clear>".to_string());
        }
    }

    #[derive(Default)]
    struct AttrLog(RefCell<Vec<(String, String, Option<Value>, Value)>>);

    impl AttributeSink for AttrLog {
        fn node_attribute_changed(
            &self,
            source_id: &str,
            _time_id: i64,
            node_id: &str,
            _attribute: &str,
            old_value: Option<&Value>,
            new_value: &Value,
        ) -> Result<()> {
            self.0.borrow_mut().push((
                source_id.to_string(),
                node_id.to_string(),
                old_value.cloned(),
                new_value.clone(),
            ));
            Ok(())
        }
    }

    #[test]
    fn test_non_rendering_attributes_are_ignored() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.node_attribute_added("g", 2, "a", "weight", &Value::Int(3))
            .unwrap();
        view.node_attribute_added("g", 3, "a", "ui.label", &Value::from("A"))
            .unwrap();

        let node = view.node("a").unwrap();
        assert_eq!(node.attributes.len(), 1);
        assert_eq!(node.attributes.get("ui.label"), Some(&Value::from("A")));
    }

    #[test]
    fn test_positions() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.node_attribute_added("g", 2, "a", "xy", &Value::from([1.0, 2.0]))
            .unwrap();
        view.node_attribute_added("g", 3, "a", "z", &Value::Int(5)).unwrap();
        assert_eq!(view.node_position("a"), Some(Point3::new(1.0, 2.0, 5.0)));

        view.node_attribute_changed("g", 4, "a", "xyz", None, &Value::from([4.0, 5.0, 6.0]))
            .unwrap();
        assert_eq!(view.node_position("a"), Some(Point3::new(4.0, 5.0, 6.0)));
    }

    #[test]
    fn test_malformed_position_is_skipped() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.node_attribute_added("g", 2, "a", "xy", &Value::from("far away"))
            .unwrap();
        view.node_attribute_added("g", 3, "a", "xy", &Value::from([1.0, 2.0, 3.0]))
            .unwrap();
        assert_eq!(view.node_position("a"), Some(Point3::default()));
    }

    #[test]
    fn test_duplicate_event_dropped() {
        let view = ViewGraph::new("view");
        let mut sink = MockElementSink::new();
        sink.expect_node_added().times(1).returning(|_, _, _| Ok(()));
        view.add_element_sink(Rc::new(sink)).unwrap();

        view.node_added("g", 1, "a").unwrap();
        view.node_added("g", 1, "a").unwrap();
        assert_eq!(view.node_count(), 1);
    }

    #[test]
    fn test_removing_node_drops_incident_edges() {
        let view = ViewGraph::new("view");
        view.edge_added("g", 1, "ab", "a", "b", false).unwrap();
        view.edge_added("g", 2, "bc", "b", "c", true).unwrap();
        assert_eq!(view.node_count(), 3);

        view.node_removed("g", 3, "b").unwrap();
        assert_eq!(view.edge_count(), 0);
        assert_eq!(view.node_count(), 2);
    }

    #[test]
    fn test_style_sheet_routes_to_loader() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let view = ViewGraph::with_style_loader("view", Box::new(LoaderLog(log.clone())));

        view.graph_attribute_added("g", 1, "stylesheet", &Value::from("node { size: 3px; }"))
            .unwrap();
        view.graph_attribute_added("g", 2, "ui.stylesheet", &Value::Int(4))
            .unwrap();
        view.graph_attribute_changed("g", 3, "stylesheet", None, &Value::from("broken"))
            .unwrap();
        view.graph_attribute_removed("g", 4, "stylesheet").unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["node { size: 3px; }".to_string(), "<clear>".to_string()]
        );
    }

    #[test]
    fn test_repaint_marks_changed() {
        let view = ViewGraph::new("view");
        assert!(!view.has_changed());
        view.graph_attribute_added("g", 1, "ui.repaint", &Value::Bool(true))
            .unwrap();
        assert!(view.has_changed());
        view.reset_changed();
        view.graph_attribute_added("g", 2, "title", &Value::from("t"))
            .unwrap();
        assert!(!view.has_changed());
    }

    #[test]
    fn test_sprite_lifecycle() {
        let view = ViewGraph::new("view");
        view.edge_added("g", 1, "ab", "a", "b", false).unwrap();

        // Attribute first, then the sprite itself
        view.graph_attribute_added("g", 2, "ui.sprite.s1.ui.label", &Value::from("hi"))
            .unwrap();
        view.graph_attribute_added("g", 3, "ui.sprite.s1", &Value::from([1.0, 2.0, 0.0]))
            .unwrap();
        let sprite = view.sprite("s1").unwrap();
        assert_eq!(sprite.attributes.get("ui.label"), Some(&Value::from("hi")));
        assert!(matches!(sprite.position, SpritePosition::At { x, .. } if x == 1.0));

        view.edge_attribute_added("g", 4, "ab", "ui.sprite.s1", &Value::Float(0.5))
            .unwrap();
        let sprite = view.sprite("s1").unwrap();
        assert_eq!(sprite.attachment, Some(Attachment::Edge("ab".into())));
        assert_eq!(sprite.position, SpritePosition::Along(0.5));

        view.edge_attribute_removed("g", 5, "ab", "ui.sprite.s1").unwrap();
        assert!(!view.sprite("s1").unwrap().is_attached());

        view.graph_attribute_removed("g", 6, "ui.sprite.s1").unwrap();
        assert!(view.sprite("s1").is_none());
    }

    #[test]
    fn test_boolean_attaches_without_moving() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.graph_attribute_added("g", 2, "ui.sprite.s", &Value::Float(0.3))
            .unwrap();
        view.node_attribute_added("g", 3, "a", "ui.sprite.s", &Value::Bool(true))
            .unwrap();
        let sprite = view.sprite("s").unwrap();
        assert_eq!(sprite.attachment, Some(Attachment::Node("a".into())));
        assert_eq!(sprite.position, SpritePosition::Along(0.3));
    }

    #[test]
    fn test_move_node_feedback() {
        let view = ViewGraph::new("view");
        let log = Rc::new(AttrLog::default());
        view.add_attribute_sink(log.clone()).unwrap();
        view.node_added("g", 1, "a").unwrap();

        view.move_node("a", 1.0, 2.0, 3.0).unwrap();
        view.set_feedback_xyz(false);
        view.move_node("a", 4.0, 5.0, 6.0).unwrap();

        let calls = log.0.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "view");
        assert_eq!(calls[0].2, Some(Value::from([0.0, 0.0, 0.0])));
        assert_eq!(calls[0].3, Value::from([1.0, 2.0, 3.0]));
        assert_eq!(view.node_position("a"), Some(Point3::new(4.0, 5.0, 6.0)));
        assert!(view.move_node("ghost", 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_press_and_hover_flags() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();

        view.press_node("a").unwrap();
        view.press_node("a").unwrap();
        view.hover_node("a").unwrap();
        let node = view.node("a").unwrap();
        assert_eq!(node.attributes.get("ui.clicked"), Some(&Value::Bool(true)));
        assert_eq!(node.attributes.get("ui.mouseOver"), Some(&Value::Bool(true)));

        view.release_node("a").unwrap();
        view.leave_node("a").unwrap();
        assert!(view.node("a").unwrap().attributes.is_empty());
        assert!(matches!(
            view.press_node("ghost"),
            Err(GraphError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_own_interaction_echo_is_dropped() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.press_node("a").unwrap();
        view.release_node("a").unwrap();

        // A mirrored graph sends the press back under the view's id
        view.node_attribute_added("view", 1, "a", "ui.clicked", &Value::Bool(true))
            .unwrap();
        assert!(view.node("a").unwrap().attributes.is_empty());
    }

    #[test]
    fn test_announce_closed_leaves_model_alone() {
        let view = ViewGraph::new("view");
        view.announce_closed().unwrap();
        assert!(view.snapshot().attributes.is_empty());
    }

    #[test]
    fn test_node_at_unsupported() {
        let view = ViewGraph::new("view");
        assert!(matches!(
            view.node_at(0),
            Err(GraphError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_bounds_over_nodes() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.node_added("g", 2, "b").unwrap();
        view.node_attribute_added("g", 3, "b", "xyz", &Value::from([2.0, 4.0, 0.0]))
            .unwrap();
        let bounds = view.bounds();
        assert_eq!(bounds.lo, Point3::new(0.0, 0.0, -1.0));
        assert_eq!(bounds.hi, Point3::new(2.0, 4.0, 1.0));
    }

    #[test]
    fn test_snapshot_json() {
        let view = ViewGraph::new("view");
        view.node_added("g", 1, "a").unwrap();
        view.step_begins("g", 2, 3.0).unwrap();
        let snapshot = view.snapshot();
        assert_eq!(snapshot.step, 3.0);
        assert!(snapshot.to_json().unwrap().contains("\"a\""));
    }
}
