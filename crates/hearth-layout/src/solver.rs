// crates/hearth-layout/src/solver.rs
//! Priority-ordered linear constraint solver.
//!
//! Every box contributes four variables (left, top, width, height). Equalities
//! live in an incremental row-echelon system; inequalities are kept as guard
//! rows and checked with the simplex in [`crate::simplex`]. Required rows go
//! first, then optional ones by descending priority, then the box defaults
//! (intrinsic size, zero offset from the parent) fill whatever is still free,
//! each at the nearest value the committed rows allow.

use glam::DVec2;
use hearth_core::{
    validate_size, Attribute, AttributeRef, BoxId, BoxTree, Constraint, ConstraintId, Geometry,
    LayoutError, Primitive, Priority, Relation, Result,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

use crate::graph::ConstraintGraph;
use crate::linear::{LinearExpr, LinearSystem, Outcome, Var};
use crate::simplex::{minimize, Minimum};

pub const DEFAULT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    /// Tolerance for every satisfiability comparison.
    pub epsilon: f64,
    /// Record a diagnostic for each optional constraint that is discarded
    /// or only approximately met.
    pub report_discarded: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: DEFAULT_EPSILON,
            report_discarded: true,
        }
    }
}

impl SolverConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon.abs();
        self
    }

    pub fn with_discard_reports(mut self, enabled: bool) -> Self {
        self.report_discarded = enabled;
        self
    }
}

/// External values the solve must honour exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedInputs {
    pub root: BoxId,
    pub viewport: DVec2,
    pub pins: BTreeMap<AttributeRef, f64>,
}

impl FixedInputs {
    pub fn new(root: BoxId, viewport: DVec2) -> Self {
        Self {
            root,
            viewport,
            pins: BTreeMap::new(),
        }
    }

    pub fn with_pin(mut self, attribute: AttributeRef, value: f64) -> Self {
        self.pins.insert(attribute, value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Contradicts equalities of equal or higher priority.
    Conflict,
    /// Would force this committed inequality to break.
    Inequality(ConstraintId),
    /// Would give this box a negative width or height.
    NegativeDimension(BoxId),
}

/// Non-fatal solver observations for layout authors.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutDiagnostic {
    OptionalDiscarded {
        constraint: ConstraintId,
        priority: Priority,
        reason: DiscardReason,
    },
    /// An optional inequality that could not hold was committed at the
    /// closest value the stronger constraints allow, missing by `shortfall`.
    OptionalRelaxed {
        constraint: ConstraintId,
        priority: Priority,
        shortfall: f64,
    },
}

impl fmt::Display for LayoutDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutDiagnostic::OptionalDiscarded { constraint, priority, reason } => {
                write!(f, "discarded optional constraint {constraint} (priority {priority}): ")?;
                match reason {
                    DiscardReason::Conflict => {
                        write!(f, "conflicts with higher-or-equal priority constraints")
                    }
                    DiscardReason::Inequality(id) => write!(f, "would violate {id}"),
                    DiscardReason::NegativeDimension(box_id) => {
                        write!(f, "would give {box_id} a negative size")
                    }
                }
            }
            LayoutDiagnostic::OptionalRelaxed { constraint, priority, shortfall } => {
                write!(f, "relaxed optional constraint {constraint} (priority {priority}): ")?;
                write!(f, "missed by {shortfall}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveStats {
    pub variables: usize,
    pub required_equations: usize,
    pub required_inequalities: usize,
    pub rank_after_required: usize,
    pub free_after_required: usize,
    pub optional_committed: usize,
    /// Committed at their nearest feasible value; also counted as committed.
    pub optional_relaxed: usize,
    pub optional_discarded: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub geometry: BTreeMap<BoxId, Geometry>,
    pub diagnostics: Vec<LayoutDiagnostic>,
    pub stats: SolveStats,
}

/// Seam between the layout session and the solving strategy.
pub trait LayoutSolver: fmt::Debug {
    fn solve(
        &mut self,
        tree: &BoxTree,
        graph: &ConstraintGraph,
        inputs: &FixedInputs,
    ) -> Result<Solution>;
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSolver {
    config: SolverConfig,
}

impl ConstraintSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

impl LayoutSolver for ConstraintSolver {
    fn solve(
        &mut self,
        tree: &BoxTree,
        graph: &ConstraintGraph,
        inputs: &FixedInputs,
    ) -> Result<Solution> {
        Pass::new(&self.config, tree, inputs)?.run(graph)
    }
}

/// Maps boxes to their four solver variables, in tree preorder.
struct Variables {
    slots: BTreeMap<BoxId, usize>,
    order: Vec<BoxId>,
}

impl Variables {
    fn new(tree: &BoxTree) -> Self {
        let order = tree.preorder();
        let slots = order.iter().enumerate().map(|(slot, &id)| (id, slot)).collect();
        Self { slots, order }
    }

    fn count(&self) -> usize {
        self.order.len() * Primitive::ALL.len()
    }

    fn var(&self, box_id: BoxId, primitive: Primitive) -> Result<Var> {
        self.slots
            .get(&box_id)
            .map(|slot| slot * Primitive::ALL.len() + primitive.slot())
            .ok_or(LayoutError::UnknownBox(box_id))
    }

    /// Attribute as a linear expression over primitives.
    fn expr(&self, attribute: AttributeRef) -> Result<LinearExpr> {
        let mut expr = LinearExpr::new();
        for &(primitive, coefficient) in attribute.attribute.terms() {
            expr.add_term(self.var(attribute.box_id, primitive)?, coefficient);
        }
        Ok(expr)
    }

    fn single(&self, box_id: BoxId, primitive: Primitive) -> Result<LinearExpr> {
        let mut expr = LinearExpr::new();
        expr.add_term(self.var(box_id, primitive)?, 1.0);
        Ok(expr)
    }
}

#[derive(Debug, Clone)]
enum Row {
    /// `expr == 0`
    Equality(LinearExpr),
    /// `expr <= 0`
    Inequality(LinearExpr),
}

impl Row {
    fn from_constraint(constraint: &Constraint, vars: &Variables) -> Result<Self> {
        // lhs - multiplier * rhs - constant
        let mut expr = vars.expr(constraint.lhs())?;
        if let Some(rhs) = constraint.rhs() {
            expr.add_scaled(&vars.expr(rhs)?, -constraint.multiplier());
        }
        expr.constant -= constraint.constant();
        Ok(match constraint.relation() {
            Relation::Equal => Row::Equality(expr),
            Relation::LessOrEqual => Row::Inequality(expr),
            Relation::GreaterOrEqual => Row::Inequality(expr.scaled(-1.0)),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum GuardSource {
    Constraint(ConstraintId),
    NonNegative(BoxId),
}

/// A committed inequality, `expr <= 0`.
#[derive(Debug, Clone)]
struct Guard {
    source: GuardSource,
    expr: LinearExpr,
}

/// State of a single solve.
struct Pass<'a> {
    config: &'a SolverConfig,
    tree: &'a BoxTree,
    vars: Variables,
    /// Fixed inputs only.
    background: LinearSystem,
    diagnostics: Vec<LayoutDiagnostic>,
    stats: SolveStats,
}

impl<'a> Pass<'a> {
    fn new(config: &'a SolverConfig, tree: &'a BoxTree, inputs: &FixedInputs) -> Result<Self> {
        validate_size(inputs.viewport.x, inputs.viewport.y)?;
        if !tree.contains(inputs.root) {
            return Err(LayoutError::UnknownBox(inputs.root));
        }
        let vars = Variables::new(tree);

        let mut fixed = vec![
            (inputs.root.left(), 0.0),
            (inputs.root.top(), 0.0),
            (inputs.root.width(), inputs.viewport.x),
            (inputs.root.height(), inputs.viewport.y),
        ];
        fixed.extend(inputs.pins.iter().map(|(&attribute, &value)| (attribute, value)));

        let mut background = LinearSystem::new(config.epsilon);
        for (attribute, value) in fixed {
            let mut expr = vars.expr(attribute)?;
            expr.constant -= value;
            if background.add(&expr) == Outcome::Inconsistent {
                warn!("Fixed input {} = {} contradicts other fixed inputs", attribute, value);
                return Err(LayoutError::UnsatisfiableRequiredConstraints {
                    conflicting: Vec::new(),
                });
            }
        }

        let stats = SolveStats {
            variables: vars.count(),
            ..SolveStats::default()
        };
        Ok(Self {
            config,
            tree,
            vars,
            background,
            diagnostics: Vec::new(),
            stats,
        })
    }

    fn run(mut self, graph: &ConstraintGraph) -> Result<Solution> {
        let mut required: Vec<(ConstraintId, Row)> = Vec::new();
        let mut optional: Vec<(ConstraintId, Priority, Row)> = Vec::new();

        for (id, constraint) in graph.iter() {
            let row = Row::from_constraint(constraint, &self.vars)?;
            if !constraint.is_required() {
                optional.push((id, constraint.priority(), row));
                continue;
            }
            match row {
                Row::Equality(_) => self.stats.required_equations += 1,
                Row::Inequality(_) => self.stats.required_inequalities += 1,
            }
            required.push((id, row));
        }

        let Some((mut system, mut guards)) = self.required(&required) else {
            let conflicting = self.conflict_witness(&required);
            warn!("Required constraints conflict: {:?}", conflicting);
            return Err(LayoutError::UnsatisfiableRequiredConstraints { conflicting });
        };
        self.stats.rank_after_required = system.rank();
        self.stats.free_after_required = system.free_vars(self.vars.count());
        debug!(
            "Required system leaves {} of {} variables free, {} guards",
            self.stats.free_after_required,
            self.vars.count(),
            guards.len()
        );

        self.non_negative(&system, &mut guards)?;

        // Highest priority first, earliest declared on ties.
        optional.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        for (id, priority, row) in optional {
            match row {
                Row::Equality(expr) => {
                    self.commit_equality(&mut system, &guards, id, priority, &expr)
                }
                Row::Inequality(expr) => {
                    self.commit_inequality(&mut system, &mut guards, id, priority, expr)
                }
            }
        }

        self.fill_defaults(&mut system, &guards)?;
        let values: Vec<f64> = (0..self.vars.count())
            .map(|var| {
                if !system.is_determined(var) {
                    warn!("Variable {} left undetermined after defaults", var);
                }
                system.value(var)
            })
            .collect();

        if let Some((box_id, attribute, value)) = self.negative_dimension(&values) {
            warn!("Solve would give {} a negative {} ({})", box_id, attribute, value);
            return Err(LayoutError::NegativeDimension {
                box_id,
                attribute,
                value,
            });
        }

        let geometry = self.publishable(&values)?;
        debug!(
            "Solved {} boxes: {} optional committed ({} relaxed), {} discarded",
            geometry.len(),
            self.stats.optional_committed,
            self.stats.optional_relaxed,
            self.stats.optional_discarded
        );
        Ok(Solution {
            geometry,
            diagnostics: self.diagnostics,
            stats: self.stats,
        })
    }

    /// Fixed inputs plus `rows`, or `None` when they cannot all hold.
    fn required(&self, rows: &[(ConstraintId, Row)]) -> Option<(LinearSystem, Vec<Guard>)> {
        let mut system = self.background.clone();
        let mut guards = Vec::new();
        for (id, row) in rows {
            match row {
                Row::Equality(expr) => {
                    if system.add(expr) == Outcome::Inconsistent {
                        return None;
                    }
                }
                Row::Inequality(expr) => guards.push(Guard {
                    source: GuardSource::Constraint(*id),
                    expr: expr.clone(),
                }),
            }
        }
        self.feasible(&system, &guards, None).then_some((system, guards))
    }

    /// Deletion filter over the required rows: drop each one, in id order,
    /// whenever the rest still cannot hold.
    fn conflict_witness(&self, rows: &[(ConstraintId, Row)]) -> Vec<ConstraintId> {
        let mut kept = rows.to_vec();
        let mut index = 0;
        while index < kept.len() {
            let mut trial = kept.clone();
            trial.remove(index);
            if self.required(&trial).is_none() {
                kept = trial;
            } else {
                index += 1;
            }
        }
        kept.into_iter().map(|(id, _)| id).collect()
    }

    /// Guard every width and height at zero, failing when the required rows
    /// already force one below it.
    fn non_negative(&self, system: &LinearSystem, guards: &mut Vec<Guard>) -> Result<()> {
        for &box_id in &self.vars.order {
            for primitive in [Primitive::Width, Primitive::Height] {
                let size = self.vars.single(box_id, primitive)?;
                let Some((_, largest)) = self.range(system, guards.iter(), &size) else {
                    continue;
                };
                if largest < -self.config.epsilon {
                    let attribute = primitive.attribute();
                    warn!("Required constraints force {} {} to {}", box_id, attribute, largest);
                    return Err(LayoutError::NegativeDimension {
                        box_id,
                        attribute,
                        value: largest,
                    });
                }
                guards.push(Guard {
                    source: GuardSource::NonNegative(box_id),
                    expr: size.scaled(-1.0),
                });
            }
        }
        Ok(())
    }

    fn commit_equality(
        &mut self,
        system: &mut LinearSystem,
        guards: &[Guard],
        id: ConstraintId,
        priority: Priority,
        expr: &LinearExpr,
    ) {
        let seeds: BTreeSet<Var> = system.reduce(expr).vars().collect();
        let mut trial = system.clone();
        if trial.add(expr) == Outcome::Inconsistent {
            self.discard(id, priority, DiscardReason::Conflict);
        } else if self.feasible(&trial, guards, Some(&seeds)) {
            *system = trial;
            self.stats.optional_committed += 1;
        } else {
            let reason = self.blocking(&trial, guards, &seeds);
            self.discard(id, priority, reason);
        }
    }

    /// Commit `expr <= 0` as a guard when it can hold; otherwise hold `expr`
    /// at the smallest value the committed rows allow.
    fn commit_inequality(
        &mut self,
        system: &mut LinearSystem,
        guards: &mut Vec<Guard>,
        id: ConstraintId,
        priority: Priority,
        expr: LinearExpr,
    ) {
        let Some((lowest, _)) = self.range(system, guards.iter(), &expr) else {
            self.discard(id, priority, DiscardReason::Conflict);
            return;
        };
        if lowest <= self.config.epsilon {
            guards.push(Guard {
                source: GuardSource::Constraint(id),
                expr,
            });
            self.stats.optional_committed += 1;
            return;
        }

        let mut tight = expr;
        tight.constant -= lowest;
        if system.add(&tight) == Outcome::Inconsistent {
            self.discard(id, priority, DiscardReason::Conflict);
            return;
        }
        self.stats.optional_committed += 1;
        self.stats.optional_relaxed += 1;
        self.report(LayoutDiagnostic::OptionalRelaxed {
            constraint: id,
            priority,
            shortfall: lowest,
        });
    }

    /// First guard, in commit order, whose removal would let `trial` hold.
    fn blocking(
        &self,
        trial: &LinearSystem,
        guards: &[Guard],
        seeds: &BTreeSet<Var>,
    ) -> DiscardReason {
        for skip in 0..guards.len() {
            let rest = guards
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != skip)
                .map(|(_, guard)| guard);
            if self.feasible(trial, rest, Some(seeds)) {
                return match guards[skip].source {
                    GuardSource::Constraint(id) => DiscardReason::Inequality(id),
                    GuardSource::NonNegative(box_id) => DiscardReason::NegativeDimension(box_id),
                };
            }
        }
        DiscardReason::Conflict
    }

    /// Width/height at intrinsic size, position at zero offset from the parent,
    /// each moved to the nearest value the committed rows allow. Parents come
    /// first, so every variable ends up determined.
    fn fill_defaults(&self, system: &mut LinearSystem, guards: &[Guard]) -> Result<()> {
        for &box_id in &self.vars.order {
            let Some(layout_box) = self.tree.get(box_id) else {
                continue;
            };
            let size = layout_box.intrinsic_size;
            let mut rows = Vec::with_capacity(Primitive::ALL.len());
            for (primitive, value) in [(Primitive::Width, size.x), (Primitive::Height, size.y)] {
                let mut expr = self.vars.single(box_id, primitive)?;
                expr.constant = -value;
                rows.push(expr);
            }
            for primitive in [Primitive::Left, Primitive::Top] {
                let mut expr = self.vars.single(box_id, primitive)?;
                if let Some(parent) = layout_box.parent {
                    expr.add_term(self.vars.var(parent, primitive)?, -1.0);
                }
                rows.push(expr);
            }

            for mut row in rows {
                let (lowest, highest) =
                    self.range(system, guards.iter(), &row).unwrap_or_default();
                let target = if lowest > 0.0 {
                    lowest
                } else if highest < 0.0 {
                    highest
                } else {
                    0.0
                };
                row.constant -= target;
                if system.add(&row) == Outcome::Inconsistent {
                    warn!("Default for {} contradicts committed constraints", box_id);
                }
            }
        }
        Ok(())
    }

    /// Smallest and largest value of `expr` under `system` and `guards`, or
    /// `None` when the guards cannot hold.
    fn range<'g>(
        &self,
        system: &LinearSystem,
        guards: impl IntoIterator<Item = &'g Guard>,
        expr: &LinearExpr,
    ) -> Option<(f64, f64)> {
        let target = system.reduce(expr);
        if target.terms.is_empty() {
            return Some((target.constant, target.constant));
        }
        let seeds: BTreeSet<Var> = target.vars().collect();
        let rows = self.active_rows(system, guards, Some(&seeds))?;
        let lowest = match minimize(&target, &rows, self.config.epsilon) {
            Minimum::Infeasible => return None,
            Minimum::Unbounded => f64::NEG_INFINITY,
            Minimum::Value(value) => value,
        };
        let highest = match minimize(&target.scaled(-1.0), &rows, self.config.epsilon) {
            Minimum::Infeasible => return None,
            Minimum::Unbounded => f64::INFINITY,
            Minimum::Value(value) => -value,
        };
        Some((lowest, highest))
    }

    fn feasible<'g>(
        &self,
        system: &LinearSystem,
        guards: impl IntoIterator<Item = &'g Guard>,
        seeds: Option<&BTreeSet<Var>>,
    ) -> bool {
        match self.active_rows(system, guards, seeds) {
            None => false,
            Some(rows) if rows.is_empty() => true,
            Some(rows) => {
                minimize(&LinearExpr::new(), &rows, self.config.epsilon) != Minimum::Infeasible
            }
        }
    }

    /// Guards reduced over the free variables. Rows that reduced to a
    /// constant are checked here and dropped; with `seeds`, only rows linked
    /// to those variables through shared variables are kept. `None` when a
    /// constant row is violated.
    fn active_rows<'g>(
        &self,
        system: &LinearSystem,
        guards: impl IntoIterator<Item = &'g Guard>,
        seeds: Option<&BTreeSet<Var>>,
    ) -> Option<Vec<LinearExpr>> {
        let mut rows = Vec::new();
        for guard in guards {
            let row = system.reduce(&guard.expr);
            if !row.terms.is_empty() {
                rows.push(row);
            } else if row.constant > self.config.epsilon {
                return None;
            }
        }
        let Some(seeds) = seeds else {
            return Some(rows);
        };

        let mut reached = seeds.clone();
        let mut linked = vec![false; rows.len()];
        let mut grew = true;
        while grew {
            grew = false;
            for (row, linked) in rows.iter().zip(linked.iter_mut()) {
                if !*linked && row.vars().any(|var| reached.contains(&var)) {
                    *linked = true;
                    reached.extend(row.vars());
                    grew = true;
                }
            }
        }
        Some(
            rows.into_iter()
                .zip(linked)
                .filter_map(|(row, linked)| linked.then_some(row))
                .collect(),
        )
    }

    fn negative_dimension(&self, values: &[f64]) -> Option<(BoxId, Attribute, f64)> {
        for &box_id in &self.vars.order {
            for primitive in [Primitive::Width, Primitive::Height] {
                let var = self.vars.var(box_id, primitive).ok()?;
                let value = values[var];
                if value < -self.config.epsilon {
                    return Some((box_id, primitive.attribute(), value));
                }
            }
        }
        None
    }

    fn publishable(&self, values: &[f64]) -> Result<BTreeMap<BoxId, Geometry>> {
        let mut geometry = BTreeMap::new();
        for &box_id in &self.vars.order {
            let mut g = Geometry::default();
            for primitive in Primitive::ALL {
                let value = values[self.vars.var(box_id, primitive)?];
                // Snap rounding noise so collapsed boxes report exactly zero.
                let value = if value.abs() <= self.config.epsilon { 0.0 } else { value };
                g.set_primitive(primitive, value);
            }
            geometry.insert(box_id, g);
        }
        debug_assert_eq!(geometry.len(), self.tree.len());
        Ok(geometry)
    }

    fn discard(&mut self, constraint: ConstraintId, priority: Priority, reason: DiscardReason) {
        self.stats.optional_discarded += 1;
        self.report(LayoutDiagnostic::OptionalDiscarded {
            constraint,
            priority,
            reason,
        });
    }

    fn report(&mut self, diagnostic: LayoutDiagnostic) {
        debug!("{}", diagnostic);
        if self.config.report_discarded {
            self.diagnostics.push(diagnostic);
        }
    }
}
