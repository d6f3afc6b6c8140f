//! Sprites: small decorations placed in the graph space or attached to an
//! element.
//!
//! Sprites are driven entirely by attributes:
//!
//! - `ui.sprite.<id>` on the graph creates or moves sprite `<id>`;
//! - `ui.sprite.<id>` on a node or edge attaches the sprite to it;
//! - `ui.sprite.<id>.<attr>` sets an attribute on the sprite.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SPRITE_PREFIX: &str = "ui.sprite.";

/// Units of a sprite position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Graph units.
    #[default]
    Gu,
    /// Pixels.
    Px,
    Percents,
}

impl Units {
    pub fn parse(text: &str) -> Option<Units> {
        match text.to_ascii_lowercase().as_str() {
            "gu" => Some(Units::Gu),
            "px" => Some(Units::Px),
            "percents" | "percent" | "%" => Some(Units::Percents),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpritePosition {
    /// Fraction along the attached edge (or first coordinate otherwise).
    Along(f64),
    At { x: f64, y: f64, z: f64, units: Units },
}

impl Default for SpritePosition {
    fn default() -> Self {
        SpritePosition::At {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            units: Units::Gu,
        }
    }
}

impl SpritePosition {
    /// Decode a position payload: a number, `[n]`, `[x, y, z]` or
    /// `[x, y, z, units]`.
    pub fn parse(value: &Value) -> Result<SpritePosition, String> {
        if let Some(n) = value.as_number() {
            return Ok(SpritePosition::Along(n));
        }
        let Some(items) = value.as_array() else {
            return Err(format!(
                "cannot place sprite with position '{}' ({})",
                value,
                value.kind()
            ));
        };

        let numbers: Vec<Option<f64>> = items.iter().map(Value::as_number).collect();
        match numbers.as_slice() {
            [Some(n)] => Ok(SpritePosition::Along(*n)),
            [Some(x), Some(y), Some(z)] => Ok(SpritePosition::At {
                x: *x,
                y: *y,
                z: *z,
                units: Units::Gu,
            }),
            [Some(x), Some(y), Some(z), None] => {
                match items[3].as_str().and_then(Units::parse) {
                    Some(units) => Ok(SpritePosition::At {
                        x: *x,
                        y: *y,
                        z: *z,
                        units,
                    }),
                    None => Err(format!("unknown sprite units '{}'", items[3])),
                }
            }
            [_] => Err("sprite position percent is not a number".to_string()),
            [_, _, _] | [_, _, _, _] => Err(format!(
                "cannot parse values[{}] for sprite position",
                items.len()
            )),
            _ => Err(format!(
                "cannot transform value '{}' (length={}) into a position",
                value,
                items.len()
            )),
        }
    }
}

/// What a sprite is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attachment {
    Node(String),
    Edge(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sprite {
    pub id: String,
    pub attachment: Option<Attachment>,
    pub position: SpritePosition,
    pub attributes: BTreeMap<String, Value>,
}

impl Sprite {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }
}

/// Split `ui.sprite.<id>[.<attr>]` into the sprite id and optional sprite
/// attribute. `None` if `attribute` is not a sprite attribute.
pub fn split_sprite_attribute(attribute: &str) -> Option<(&str, Option<&str>)> {
    let rest = attribute.strip_prefix(SPRITE_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    match rest.find('.') {
        Some(pos) if pos > 0 => Some((&rest[..pos], Some(&rest[pos + 1..]))),
        _ => Some((rest, None)),
    }
}
