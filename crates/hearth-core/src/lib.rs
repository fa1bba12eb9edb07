// crates/hearth-core/src/lib.rs
//! Core data model for the Hearth layout engine: attributes, geometry, the box
//! tree and the constraint language. Solving lives in `hearth-layout`.

pub mod attribute;
pub mod constraint;
pub mod geometry;
pub mod layout_box;

pub use attribute::*;
pub use constraint::*;
pub use geometry::*;
pub use layout_box::*;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutError {
    #[error("Invalid constraint: {reason}")]
    InvalidConstraint { reason: String },

    #[error(
        "Cannot relate {lhs} to {rhs}: horizontal and vertical attributes only mix \
         through an explicit aspect-ratio constraint"
    )]
    IncompatibleDimension {
        lhs: AttributeRef,
        rhs: AttributeRef,
    },

    #[error(
        "Constraint on {attribute} would close a cycle of required constraints through {}",
        id_list(.cycle)
    )]
    CyclicRequiredConstraint {
        attribute: AttributeRef,
        cycle: Vec<ConstraintId>,
    },

    #[error(
        "Required constraints cannot all be satisfied; conflicting set: {}",
        id_list(.conflicting)
    )]
    UnsatisfiableRequiredConstraints { conflicting: Vec<ConstraintId> },

    #[error("Box {box_id} would get a negative {attribute} ({value})")]
    NegativeDimension {
        box_id: BoxId,
        attribute: Attribute,
        value: f64,
    },

    #[error("Box not found: {0}")]
    UnknownBox(BoxId),

    #[error("Constraint not found: {0}")]
    UnknownConstraint(ConstraintId),

    #[error("Invalid size {width}x{height}: dimensions must be finite and non-negative")]
    InvalidSize { width: f64, height: f64 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl LayoutError {
    /// Constraint identifiers this error refers to, for host-side diagnostics.
    pub fn constraint_ids(&self) -> &[ConstraintId] {
        match self {
            LayoutError::CyclicRequiredConstraint { cycle, .. } => cycle,
            LayoutError::UnsatisfiableRequiredConstraints { conflicting } => conflicting,
            LayoutError::UnknownConstraint(id) => std::slice::from_ref(id),
            _ => &[],
        }
    }
}

fn id_list(ids: &[ConstraintId]) -> String {
    if ids.is_empty() {
        return "[fixed inputs only]".to_string();
    }
    let parts: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

pub type Result<T> = std::result::Result<T, LayoutError>;

/// Returns an error unless both dimensions are finite and non-negative.
pub fn validate_size(width: f64, height: f64) -> Result<()> {
    if width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidSize { width, height })
    }
}
