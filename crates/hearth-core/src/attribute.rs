// crates/hearth-core/src/attribute.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoxId;

/// A geometric quantity of a layout box.
///
/// `Left`, `Top`, `Width` and `Height` are stored; every other attribute is
/// derived from them and decomposes into a linear combination of primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Left,
    Right,
    Top,
    Bottom,
    Width,
    Height,
    CenterX,
    CenterY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// The four stored quantities of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Left = 0,
    Top = 1,
    Width = 2,
    Height = 3,
}

impl Primitive {
    pub const ALL: [Primitive; 4] = [
        Primitive::Left,
        Primitive::Top,
        Primitive::Width,
        Primitive::Height,
    ];

    /// Slot of this primitive within a box's four solver variables.
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn attribute(self) -> Attribute {
        match self {
            Primitive::Left => Attribute::Left,
            Primitive::Top => Attribute::Top,
            Primitive::Width => Attribute::Width,
            Primitive::Height => Attribute::Height,
        }
    }

    pub fn is_size(self) -> bool {
        matches!(self, Primitive::Width | Primitive::Height)
    }
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::Left,
        Attribute::Right,
        Attribute::Top,
        Attribute::Bottom,
        Attribute::Width,
        Attribute::Height,
        Attribute::CenterX,
        Attribute::CenterY,
    ];

    pub fn axis(self) -> Axis {
        match self {
            Attribute::Left | Attribute::Right | Attribute::Width | Attribute::CenterX => {
                Axis::Horizontal
            }
            Attribute::Top | Attribute::Bottom | Attribute::Height | Attribute::CenterY => {
                Axis::Vertical
            }
        }
    }

    pub fn is_derived(self) -> bool {
        matches!(
            self,
            Attribute::Right | Attribute::Bottom | Attribute::CenterX | Attribute::CenterY
        )
    }

    pub fn is_size(self) -> bool {
        matches!(self, Attribute::Width | Attribute::Height)
    }

    /// Linear decomposition into primitives: `value = sum(coefficient * primitive)`.
    pub fn terms(self) -> &'static [(Primitive, f64)] {
        match self {
            Attribute::Left => &[(Primitive::Left, 1.0)],
            Attribute::Top => &[(Primitive::Top, 1.0)],
            Attribute::Width => &[(Primitive::Width, 1.0)],
            Attribute::Height => &[(Primitive::Height, 1.0)],
            Attribute::Right => &[(Primitive::Left, 1.0), (Primitive::Width, 1.0)],
            Attribute::Bottom => &[(Primitive::Top, 1.0), (Primitive::Height, 1.0)],
            Attribute::CenterX => &[(Primitive::Left, 1.0), (Primitive::Width, 0.5)],
            Attribute::CenterY => &[(Primitive::Top, 1.0), (Primitive::Height, 0.5)],
        }
    }

    /// The primitive a write to this attribute lands on when size is kept.
    pub fn position_primitive(self) -> Option<Primitive> {
        match self.axis() {
            _ if self.is_size() => None,
            Axis::Horizontal => Some(Primitive::Left),
            Axis::Vertical => Some(Primitive::Top),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Attribute::Left => "left",
            Attribute::Right => "right",
            Attribute::Top => "top",
            Attribute::Bottom => "bottom",
            Attribute::Width => "width",
            Attribute::Height => "height",
            Attribute::CenterX => "center_x",
            Attribute::CenterY => "center_y",
        }
    }

    /// Parse from the snake_case name used in layout programs.
    pub fn from_name(name: &str) -> Option<Self> {
        Attribute::ALL.into_iter().find(|attr| attr.name() == name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An attribute scoped to a specific box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeRef {
    pub box_id: BoxId,
    pub attribute: Attribute,
}

impl AttributeRef {
    pub fn new(box_id: BoxId, attribute: Attribute) -> Self {
        Self { box_id, attribute }
    }

    pub fn axis(&self) -> Axis {
        self.attribute.axis()
    }
}

impl fmt::Display for AttributeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.box_id, self.attribute)
    }
}

/// Shorthands for building attribute references off a box id.
impl BoxId {
    pub fn attr(self, attribute: Attribute) -> AttributeRef {
        AttributeRef::new(self, attribute)
    }

    pub fn left(self) -> AttributeRef {
        self.attr(Attribute::Left)
    }

    pub fn right(self) -> AttributeRef {
        self.attr(Attribute::Right)
    }

    pub fn top(self) -> AttributeRef {
        self.attr(Attribute::Top)
    }

    pub fn bottom(self) -> AttributeRef {
        self.attr(Attribute::Bottom)
    }

    pub fn width(self) -> AttributeRef {
        self.attr(Attribute::Width)
    }

    pub fn height(self) -> AttributeRef {
        self.attr(Attribute::Height)
    }

    pub fn center_x(self) -> AttributeRef {
        self.attr(Attribute::CenterX)
    }

    pub fn center_y(self) -> AttributeRef {
        self.attr(Attribute::CenterY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_families() {
        for attr in [Attribute::Left, Attribute::Right, Attribute::Width, Attribute::CenterX] {
            assert_eq!(attr.axis(), Axis::Horizontal);
        }
        for attr in [Attribute::Top, Attribute::Bottom, Attribute::Height, Attribute::CenterY] {
            assert_eq!(attr.axis(), Axis::Vertical);
        }
    }

    #[test]
    fn test_derived_terms_stay_on_axis() {
        for attr in Attribute::ALL {
            for (primitive, _) in attr.terms() {
                assert_eq!(primitive.attribute().axis(), attr.axis(), "{attr}");
            }
            assert_eq!(attr.is_derived(), attr.terms().len() > 1);
        }
    }

    #[test]
    fn test_name_round_trip() {
        assert_eq!(Attribute::from_name("center_x"), Some(Attribute::CenterX));
        assert_eq!(Attribute::from_name("bottom"), Some(Attribute::Bottom));
        assert_eq!(Attribute::from_name("middle"), None);
    }

    #[test]
    fn test_attribute_ref_display() {
        let id = BoxId::new(4);
        assert_eq!(id.center_y().to_string(), "#4.center_y");
        assert_eq!(Attribute::Right.position_primitive(), Some(Primitive::Left));
        assert_eq!(Attribute::Width.position_primitive(), None);
    }
}
