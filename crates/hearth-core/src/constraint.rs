// crates/hearth-core/src/constraint.rs
//! The constraint language: `lhs (==|<=|>=) multiplier * rhs + constant`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AttributeRef, BoxId, LayoutError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    #[serde(alias = "==")]
    Equal,
    #[serde(alias = "<=")]
    LessOrEqual,
    #[serde(alias = ">=")]
    GreaterOrEqual,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Equal => "==",
            Relation::LessOrEqual => "<=",
            Relation::GreaterOrEqual => ">=",
        })
    }
}

/// Constraint strength in `1..=1000`; `1000` is reserved for required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Priority(u16);

impl Priority {
    pub const REQUIRED: Priority = Priority(1000);
    pub const STRONG: Priority = Priority(750);
    pub const MEDIUM: Priority = Priority(500);
    pub const WEAK: Priority = Priority(250);
    pub const MIN: Priority = Priority(1);

    pub fn new(value: u16) -> Result<Self> {
        if (Self::MIN.0..=Self::REQUIRED.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(LayoutError::InvalidConstraint {
                reason: format!("priority {value} outside 1..=1000"),
            })
        }
    }

    pub fn value(self) -> u16 {
        self.0
    }

    pub fn is_required(self) -> bool {
        self == Self::REQUIRED
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl TryFrom<u16> for Priority {
    type Error = LayoutError;

    fn try_from(value: u16) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Priority> for u16 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_required() {
            f.write_str("required")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Assigned by the constraint graph on install. Ids grow monotonically, so
/// ordering by id is declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(u64);

impl ConstraintId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    /// Both sides on the same axis.
    Linear,
    /// Deliberate cross-axis size relation (`width == ratio * height`).
    AspectRatio,
}

/// Right-hand side operand accepted by [`ConstraintBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Attribute(AttributeRef),
    Constant(f64),
}

impl From<AttributeRef> for Target {
    fn from(attribute: AttributeRef) -> Self {
        Target::Attribute(attribute)
    }
}

impl From<f64> for Target {
    fn from(value: f64) -> Self {
        Target::Constant(value)
    }
}

/// Immutable linear relation between two attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    lhs: AttributeRef,
    relation: Relation,
    rhs: Option<AttributeRef>,
    multiplier: f64,
    constant: f64,
    priority: Priority,
    kind: ConstraintKind,
}

impl Constraint {
    pub fn build(lhs: AttributeRef) -> ConstraintBuilder {
        ConstraintBuilder::new(lhs)
    }

    /// `box.width == ratio * box.height`. The only constructor that may mix axes.
    pub fn aspect_ratio(box_id: BoxId, ratio: f64, priority: Priority) -> Result<Self> {
        Self::cross_axis(box_id.width(), box_id.height(), ratio, priority)
    }

    /// Size of one axis proportional to the size of the other axis, on any
    /// pair of boxes.
    pub fn cross_axis(
        lhs: AttributeRef,
        rhs: AttributeRef,
        ratio: f64,
        priority: Priority,
    ) -> Result<Self> {
        if !lhs.attribute.is_size() || !rhs.attribute.is_size() {
            return Err(LayoutError::InvalidConstraint {
                reason: format!("aspect ratio relates sizes only, got {lhs} and {rhs}"),
            });
        }
        if lhs.axis() == rhs.axis() {
            return Err(LayoutError::InvalidConstraint {
                reason: format!("aspect ratio needs one width and one height, got {lhs} and {rhs}"),
            });
        }
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(LayoutError::InvalidConstraint {
                reason: format!("aspect ratio must be positive and finite, got {ratio}"),
            });
        }
        Ok(Self {
            lhs,
            relation: Relation::Equal,
            rhs: Some(rhs),
            multiplier: ratio,
            constant: 0.0,
            priority,
            kind: ConstraintKind::AspectRatio,
        })
    }

    pub fn lhs(&self) -> AttributeRef {
        self.lhs
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    /// The attribute read by this constraint. `None` for fixed-value
    /// constraints, including the degenerate multiplier-zero case.
    pub fn rhs(&self) -> Option<AttributeRef> {
        if self.multiplier == 0.0 {
            None
        } else {
            self.rhs
        }
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_required(&self) -> bool {
        self.priority.is_required()
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    /// Boxes referenced on either side.
    pub fn boxes(&self) -> impl Iterator<Item = BoxId> {
        let rhs = self.rhs().map(|r| r.box_id).filter(|&id| id != self.lhs.box_id);
        std::iter::once(self.lhs.box_id).chain(rhs)
    }

    pub fn references(&self, box_id: BoxId) -> bool {
        self.boxes().any(|id| id == box_id)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.lhs, self.relation)?;
        match self.rhs() {
            Some(rhs) => {
                if self.multiplier != 1.0 {
                    write!(f, "{} * ", self.multiplier)?;
                }
                write!(f, "{rhs}")?;
                if self.constant != 0.0 {
                    write!(f, " + {}", self.constant)?;
                }
            }
            None => write!(f, "{}", self.constant)?,
        }
        write!(f, " @{}", self.priority)
    }
}

/// Builder for same-axis constraints.
///
/// ```
/// use hearth_core::{BoxId, Constraint, Priority};
///
/// let (child, parent) = (BoxId::new(1), BoxId::new(0));
/// let c = Constraint::build(child.left())
///     .equal_to(parent.left())
///     .constant(16.0)
///     .priority(Priority::STRONG)
///     .finish()
///     .unwrap();
/// assert_eq!(c.to_string(), "#1.left == #0.left + 16 @750");
/// ```
///
/// A multiplier of zero is accepted and turns the constraint into a
/// fixed-value one (`lhs op constant`); the right-hand attribute is then no
/// longer a dependency.
#[derive(Debug, Clone)]
pub struct ConstraintBuilder {
    lhs: AttributeRef,
    relation: Relation,
    target: Target,
    multiplier: f64,
    constant: f64,
    priority: Priority,
}

impl ConstraintBuilder {
    pub fn new(lhs: AttributeRef) -> Self {
        Self {
            lhs,
            relation: Relation::Equal,
            target: Target::Constant(0.0),
            multiplier: 1.0,
            constant: 0.0,
            priority: Priority::REQUIRED,
        }
    }

    pub fn relation(mut self, relation: Relation, target: impl Into<Target>) -> Self {
        self.relation = relation;
        match target.into() {
            Target::Constant(value) => {
                self.target = Target::Constant(0.0);
                self.constant = value;
            }
            attribute => self.target = attribute,
        }
        self
    }

    pub fn equal_to(self, target: impl Into<Target>) -> Self {
        self.relation(Relation::Equal, target)
    }

    pub fn at_most(self, target: impl Into<Target>) -> Self {
        self.relation(Relation::LessOrEqual, target)
    }

    pub fn at_least(self, target: impl Into<Target>) -> Self {
        self.relation(Relation::GreaterOrEqual, target)
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn constant(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Shorthand for an optional priority given as a raw value.
    pub fn strength(self, value: u16) -> Result<Self> {
        Ok(self.priority(Priority::new(value)?))
    }

    pub fn finish(self) -> Result<Constraint> {
        if !self.multiplier.is_finite() || !self.constant.is_finite() {
            return Err(LayoutError::InvalidConstraint {
                reason: format!(
                    "multiplier and constant must be finite (got {} and {}) on {}",
                    self.multiplier, self.constant, self.lhs
                ),
            });
        }
        let rhs = match self.target {
            Target::Attribute(rhs) => {
                if rhs.axis() != self.lhs.axis() {
                    return Err(LayoutError::IncompatibleDimension { lhs: self.lhs, rhs });
                }
                Some(rhs)
            }
            Target::Constant(_) => None,
        };
        let multiplier = if rhs.is_some() { self.multiplier } else { 0.0 };
        Ok(Constraint {
            lhs: self.lhs,
            relation: self.relation,
            rhs,
            multiplier,
            constant: self.constant,
            priority: self.priority,
            kind: ConstraintKind::Linear,
        })
    }
}

/// `lhs == value`, required.
pub fn fixed(lhs: AttributeRef, value: f64) -> Result<Constraint> {
    Constraint::build(lhs).equal_to(value).finish()
}

/// `lhs == rhs + offset`, required.
pub fn offset(lhs: AttributeRef, rhs: AttributeRef, offset: f64) -> Result<Constraint> {
    Constraint::build(lhs).equal_to(rhs).constant(offset).finish()
}
