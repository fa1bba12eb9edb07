// crates/hearth-layout/src/anchors.rs
//! Shorthands for common arrangements. Each helper only builds ordinary
//! constraints; nothing here is known to the solver.

use hearth_core::{offset, Attribute, BoxId, Constraint, LayoutError, Priority, Result};

/// Center `child` on `parent` along both axes.
pub fn center_in(child: BoxId, parent: BoxId) -> Result<Vec<Constraint>> {
    Ok(vec![
        offset(child.center_x(), parent.center_x(), 0.0)?,
        offset(child.center_y(), parent.center_y(), 0.0)?,
    ])
}

/// Stretch `child` over `parent`, leaving `inset` on every side.
pub fn fill(child: BoxId, parent: BoxId, inset: f64) -> Result<Vec<Constraint>> {
    pin_edges(
        child,
        parent,
        &[Attribute::Left, Attribute::Top, Attribute::Right, Attribute::Bottom],
        inset,
    )
}

pub fn fixed_size(id: BoxId, width: f64, height: f64) -> Result<Vec<Constraint>> {
    if width < 0.0 || height < 0.0 {
        return Err(LayoutError::InvalidSize { width, height });
    }
    Ok(vec![
        Constraint::build(id.width()).equal_to(width).finish()?,
        Constraint::build(id.height()).equal_to(height).finish()?,
    ])
}

/// Give every box in `others` the same `attribute` as `leader`.
pub fn align(attribute: Attribute, leader: BoxId, others: &[BoxId]) -> Result<Vec<Constraint>> {
    others
        .iter()
        .map(|&id| offset(id.attr(attribute), leader.attr(attribute), 0.0))
        .collect()
}

/// Attach the given edges of `child` to the same edges of `parent`, `margin`
/// inward.
pub fn pin_edges(
    child: BoxId,
    parent: BoxId,
    edges: &[Attribute],
    margin: f64,
) -> Result<Vec<Constraint>> {
    edges
        .iter()
        .map(|&edge| {
            let inward = match edge {
                Attribute::Left | Attribute::Top => margin,
                Attribute::Right | Attribute::Bottom => -margin,
                other => {
                    return Err(LayoutError::InvalidConstraint {
                        reason: format!("{other} is not an edge"),
                    })
                }
            };
            offset(child.attr(edge), parent.attr(edge), inward)
        })
        .collect()
}

/// `width == ratio * height`.
pub fn aspect_ratio(id: BoxId, ratio: f64, priority: Priority) -> Result<Vec<Constraint>> {
    Ok(vec![Constraint::aspect_ratio(id, ratio, priority)?])
}

pub fn width_ratio(child: BoxId, parent: BoxId, ratio: f64) -> Result<Vec<Constraint>> {
    Ok(vec![proportion(child, parent, Attribute::Width, ratio)?])
}

pub fn height_ratio(child: BoxId, parent: BoxId, ratio: f64) -> Result<Vec<Constraint>> {
    Ok(vec![proportion(child, parent, Attribute::Height, ratio)?])
}

pub fn size_ratio(child: BoxId, parent: BoxId, ratio: f64) -> Result<Vec<Constraint>> {
    Ok(vec![
        proportion(child, parent, Attribute::Width, ratio)?,
        proportion(child, parent, Attribute::Height, ratio)?,
    ])
}

fn proportion(child: BoxId, parent: BoxId, size: Attribute, ratio: f64) -> Result<Constraint> {
    if !ratio.is_finite() || ratio < 0.0 {
        return Err(LayoutError::InvalidConstraint {
            reason: format!("size ratio must be finite and non-negative, got {ratio}"),
        });
    }
    Constraint::build(child.attr(size))
        .equal_to(parent.attr(size))
        .multiplier(ratio)
        .finish()
}

/// Vertical flow: each box starts `spacing` below the previous one.
pub fn stack_below(boxes: &[BoxId], spacing: f64) -> Result<Vec<Constraint>> {
    boxes
        .windows(2)
        .map(|pair| offset(pair[1].top(), pair[0].bottom(), spacing))
        .collect()
}
