// crates/hearth-layout/src/session.rs
use glam::DVec2;
use hearth_core::{
    validate_size, AttributeRef, BoxId, BoxSpec, BoxTree, Constraint, ConstraintId, Geometry,
    LayoutError, Result,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::graph::ConstraintGraph;
use crate::solver::{
    ConstraintSolver, FixedInputs, LayoutDiagnostic, LayoutSolver, Solution, SolveStats,
    SolverConfig, DEFAULT_EPSILON,
};

/// Read-only copy of the published geometry, handed to rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutResult {
    pub viewport: DVec2,
    pub computed: BTreeMap<BoxId, Geometry>,
}

impl LayoutResult {
    pub fn get(&self, id: BoxId) -> Option<Geometry> {
        self.computed.get(&id).copied()
    }
}

/// Outcome of the most recent successful solve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutUpdate {
    /// Boxes whose published geometry moved by more than epsilon, in id order.
    pub changed: Vec<BoxId>,
    pub stats: SolveStats,
}

/// Owns the box tree and constraint graph and keeps the published geometry
/// in step with them. Every mutation re-solves; a mutation whose solve fails
/// is rolled back and the previous geometry stays published.
#[derive(Debug)]
pub struct LayoutSession {
    tree: BoxTree,
    graph: ConstraintGraph,
    solver: Box<dyn LayoutSolver>,
    /// Size most recently requested by the host.
    viewport: DVec2,
    /// Size the published geometry was solved for.
    layout_viewport: DVec2,
    pins: BTreeMap<AttributeRef, f64>,
    epsilon: f64,
    diagnostics: Vec<LayoutDiagnostic>,
    last_update: LayoutUpdate,
}

/// Pre-mutation state, restored when the follow-up solve fails.
struct Checkpoint {
    tree: BoxTree,
    graph: ConstraintGraph,
    pins: BTreeMap<AttributeRef, f64>,
}

impl LayoutSession {
    pub fn new(width: f64, height: f64) -> Result<Self> {
        Self::with_config(width, height, SolverConfig::default())
    }

    pub fn with_config(width: f64, height: f64, config: SolverConfig) -> Result<Self> {
        let solver = Box::new(ConstraintSolver::with_config(config));
        Self::build(width, height, solver, config.epsilon)
    }

    pub fn with_solver(width: f64, height: f64, solver: Box<dyn LayoutSolver>) -> Result<Self> {
        Self::build(width, height, solver, DEFAULT_EPSILON)
    }

    fn build(width: f64, height: f64, solver: Box<dyn LayoutSolver>, epsilon: f64) -> Result<Self> {
        validate_size(width, height)?;
        let viewport = DVec2::new(width, height);
        let mut session = Self {
            tree: BoxTree::new(viewport),
            graph: ConstraintGraph::new(),
            solver,
            viewport,
            layout_viewport: viewport,
            pins: BTreeMap::new(),
            epsilon,
            diagnostics: Vec::new(),
            last_update: LayoutUpdate::default(),
        };
        let solution = session.solve()?;
        let root = session.tree.root();
        session.publish(solution, BTreeSet::from([root]));
        Ok(session)
    }

    pub fn root(&self) -> BoxId {
        self.tree.root()
    }

    pub fn viewport(&self) -> DVec2 {
        self.viewport
    }

    /// Viewport of the published geometry. Lags behind [`Self::viewport`]
    /// after a failed resize.
    pub fn layout_viewport(&self) -> DVec2 {
        self.layout_viewport
    }

    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    pub fn pins(&self) -> &BTreeMap<AttributeRef, f64> {
        &self.pins
    }

    pub fn last_update(&self) -> &LayoutUpdate {
        &self.last_update
    }

    pub fn add_box(&mut self, parent: BoxId, spec: BoxSpec) -> Result<BoxId> {
        self.transact(|session| {
            let id = session.tree.insert(parent, spec)?;
            let scope = session.graph.boxes_affected_by_boxes([id], &session.tree);
            Ok((id, scope))
        })
    }

    /// Remove a box, its descendants, every constraint and pin that mentions
    /// them. Returns the retracted constraint ids.
    pub fn remove_box(&mut self, id: BoxId) -> Result<Vec<ConstraintId>> {
        self.transact(|session| {
            let removed = session.tree.subtree(id)?;
            if id == session.tree.root() {
                return Err(LayoutError::InvalidOperation(
                    "the root box cannot be removed".to_string(),
                ));
            }
            let mut scope = session
                .graph
                .boxes_affected_by_boxes(removed.iter().copied(), &session.tree);
            let mut retracted = Vec::new();
            for &box_id in &removed {
                retracted.extend(session.graph.retract_box(box_id));
            }
            session.pins.retain(|attribute, _| !removed.contains(&attribute.box_id));
            session.tree.remove(id)?;
            scope.retain(|box_id| session.tree.contains(*box_id));
            retracted.sort();
            retracted.dedup();
            Ok((retracted, scope))
        })
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId> {
        self.transact(|session| {
            session.check_boxes(&constraint)?;
            let scope = session.graph.boxes_affected_by(&constraint, &session.tree);
            let id = session.graph.install(constraint)?;
            Ok((id, scope))
        })
    }

    /// Install a group of constraints with a single solve. Either all of them
    /// are installed or none are.
    pub fn add_constraints(
        &mut self,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<Vec<ConstraintId>> {
        self.transact(|session| {
            let mut ids = Vec::new();
            let mut scope = BTreeSet::new();
            for constraint in constraints {
                session.check_boxes(&constraint)?;
                scope.extend(session.graph.boxes_affected_by(&constraint, &session.tree));
                ids.push(session.graph.install(constraint)?);
            }
            Ok((ids, scope))
        })
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Constraint> {
        self.transact(|session| {
            let constraint = session
                .graph
                .get(id)
                .ok_or(LayoutError::UnknownConstraint(id))?;
            let scope = session.graph.boxes_affected_by(constraint, &session.tree);
            let constraint = session
                .graph
                .retract(id)
                .ok_or(LayoutError::UnknownConstraint(id))?;
            Ok((constraint, scope))
        })
    }

    /// Change the size a box falls back to when its constraints leave it free.
    pub fn set_intrinsic_size(&mut self, id: BoxId, width: f64, height: f64) -> Result<()> {
        self.transact(|session| {
            session.tree.set_intrinsic_size(id, DVec2::new(width, height))?;
            let scope = session.graph.boxes_affected_by_boxes([id], &session.tree);
            Ok(((), scope))
        })
    }

    /// Fix `attribute` to `value` as an extra input alongside the viewport.
    pub fn pin(&mut self, attribute: AttributeRef, value: f64) -> Result<()> {
        self.transact(|session| {
            if !value.is_finite() {
                return Err(LayoutError::InvalidConstraint {
                    reason: format!("pin value for {attribute} must be finite, got {value}"),
                });
            }
            if !session.tree.contains(attribute.box_id) {
                return Err(LayoutError::UnknownBox(attribute.box_id));
            }
            session.pins.insert(attribute, value);
            let scope = session.graph.boxes_affected_by_boxes([attribute.box_id], &session.tree);
            Ok(((), scope))
        })
    }

    pub fn unpin(&mut self, attribute: AttributeRef) -> Result<Option<f64>> {
        self.transact(|session| {
            let previous = session.pins.remove(&attribute);
            let scope = session.graph.boxes_affected_by_boxes([attribute.box_id], &session.tree);
            Ok((previous, scope))
        })
    }

    /// Solve for a new display size.
    ///
    /// The viewport is updated even when the solve fails, so the next
    /// successful mutation lays out against the host's current size; the
    /// previously published geometry and its [`Self::layout_viewport`] are
    /// kept until then.
    pub fn on_resize(&mut self, width: f64, height: f64) -> Result<LayoutUpdate> {
        validate_size(width, height)?;
        let size = DVec2::new(width, height);
        if size != self.viewport {
            debug!("Viewport {:?} -> {:?}", self.viewport, size);
        }
        self.viewport = size;

        let root = self.tree.root();
        let scope = self.graph.boxes_affected_by_boxes([root], &self.tree);
        match self.solve() {
            Ok(solution) => {
                self.publish(solution, scope);
                Ok(self.last_update.clone())
            }
            Err(err) => {
                warn!("Resize to {}x{} failed, keeping last layout: {}", width, height, err);
                Err(err)
            }
        }
    }

    /// Re-solve without mutating anything.
    pub fn relayout(&mut self) -> Result<LayoutUpdate> {
        let root = self.tree.root();
        let scope = self.graph.boxes_affected_by_boxes([root], &self.tree);
        let solution = self.solve()?;
        self.publish(solution, scope);
        Ok(self.last_update.clone())
    }

    pub fn geometry(&self, id: BoxId) -> Option<Geometry> {
        self.tree.get(id).and_then(|b| b.geometry)
    }

    pub fn snapshot(&self) -> LayoutResult {
        let computed = self
            .tree
            .preorder()
            .into_iter()
            .filter_map(|id| self.geometry(id).map(|g| (id, g)))
            .collect();
        LayoutResult {
            viewport: self.layout_viewport,
            computed,
        }
    }

    /// Diagnostics from the last successful solve.
    pub fn diagnostics(&self) -> &[LayoutDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<LayoutDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn hit_test(&self, point: DVec2) -> Option<BoxId> {
        self.tree.hit_test(point)
    }

    fn check_boxes(&self, constraint: &Constraint) -> Result<()> {
        match constraint.boxes().find(|id| !self.tree.contains(*id)) {
            Some(missing) => Err(LayoutError::UnknownBox(missing)),
            None => Ok(()),
        }
    }

    fn solve(&mut self) -> Result<Solution> {
        let inputs = FixedInputs {
            root: self.tree.root(),
            viewport: self.viewport,
            pins: self.pins.clone(),
        };
        self.solver.solve(&self.tree, &self.graph, &inputs)
    }

    /// Apply `mutate`, re-solve, and publish; restore the checkpoint if
    /// either step fails.
    fn transact<T>(
        &mut self,
        mutate: impl FnOnce(&mut Self) -> Result<(T, BTreeSet<BoxId>)>,
    ) -> Result<T> {
        let checkpoint = Checkpoint {
            tree: self.tree.clone(),
            graph: self.graph.clone(),
            pins: self.pins.clone(),
        };

        let outcome = match mutate(self) {
            Ok((value, scope)) => self.solve().map(|solution| (value, scope, solution)),
            Err(err) => Err(err),
        };

        match outcome {
            Ok((value, scope, solution)) => {
                self.publish(solution, scope);
                Ok(value)
            }
            Err(err) => {
                warn!("Rejected layout mutation: {}", err);
                self.tree = checkpoint.tree;
                self.graph = checkpoint.graph;
                self.pins = checkpoint.pins;
                Err(err)
            }
        }
    }

    /// Publish the solved geometry of the boxes in `scope`. Boxes outside it
    /// are not connected to the mutation and keep their geometry.
    fn publish(&mut self, solution: Solution, scope: BTreeSet<BoxId>) {
        let epsilon = self.epsilon;
        debug_assert!(
            solution.geometry.iter().all(|(id, geometry)| {
                scope.contains(id)
                    || self.geometry(*id).map_or(true, |p| p.approx_eq(geometry, epsilon))
            }),
            "solve moved a box outside the mutation scope"
        );

        let mut changed = Vec::new();
        for (&id, &geometry) in &solution.geometry {
            let previous = self.geometry(id);
            if previous.is_some() && !scope.contains(&id) {
                continue;
            }
            if previous.is_some_and(|p| p.approx_eq(&geometry, epsilon)) {
                continue;
            }
            self.tree.set_geometry(id, geometry);
            changed.push(id);
        }

        info!(
            "Layout solved: {} boxes, {} in scope, {} changed, {} relaxed, {} discarded",
            solution.geometry.len(),
            scope.len(),
            changed.len(),
            solution.stats.optional_relaxed,
            solution.stats.optional_discarded
        );
        self.layout_viewport = self.viewport;
        self.diagnostics = solution.diagnostics;
        self.last_update = LayoutUpdate {
            changed,
            stats: solution.stats,
        };
    }
}
