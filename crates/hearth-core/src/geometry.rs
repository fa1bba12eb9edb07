// crates/hearth-core/src/geometry.rs
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::{Attribute, Primitive};

/// Solved rectangle of a box in logical pixels, origin top-left, Y down.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn position(&self) -> DVec2 {
        DVec2::new(self.left, self.top)
    }

    pub fn size(&self) -> DVec2 {
        DVec2::new(self.width, self.height)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> DVec2 {
        DVec2::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn primitive(&self, primitive: Primitive) -> f64 {
        match primitive {
            Primitive::Left => self.left,
            Primitive::Top => self.top,
            Primitive::Width => self.width,
            Primitive::Height => self.height,
        }
    }

    pub fn set_primitive(&mut self, primitive: Primitive, value: f64) {
        match primitive {
            Primitive::Left => self.left = value,
            Primitive::Top => self.top = value,
            Primitive::Width => self.width = value,
            Primitive::Height => self.height = value,
        }
    }

    /// Value of any attribute, derived ones computed on demand.
    pub fn attribute(&self, attribute: Attribute) -> f64 {
        attribute
            .terms()
            .iter()
            .map(|&(primitive, coefficient)| coefficient * self.primitive(primitive))
            .sum()
    }

    /// Write an attribute. Derived attributes move the box along their axis
    /// and keep its size.
    pub fn set_attribute(&mut self, attribute: Attribute, value: f64) {
        match attribute.position_primitive() {
            None => {
                let primitive = attribute.terms()[0].0;
                self.set_primitive(primitive, value);
            }
            Some(position) => {
                let delta = value - self.attribute(attribute);
                let current = self.primitive(position);
                self.set_primitive(position, current + delta);
            }
        }
    }

    /// Inclusive on all four edges.
    pub fn contains_point(&self, point: DVec2) -> bool {
        self.left <= point.x
            && point.x <= self.right()
            && self.top <= point.y
            && point.y <= self.bottom()
    }

    pub fn approx_eq(&self, other: &Geometry, epsilon: f64) -> bool {
        Primitive::ALL
            .iter()
            .all(|&p| (self.primitive(p) - other.primitive(p)).abs() <= epsilon)
    }
}
