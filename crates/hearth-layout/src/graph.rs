// crates/hearth-layout/src/graph.rs
//! Installed constraints plus the attribute dependency adjacency used for
//! cycle rejection and for scoping re-solves.

use hearth_core::{AttributeRef, BoxId, BoxTree, Constraint, ConstraintId, LayoutError, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    constraints: BTreeMap<ConstraintId, Constraint>,
    next_id: u64,
    /// attribute -> constraints that read it
    readers: BTreeMap<AttributeRef, BTreeSet<ConstraintId>>,
    /// attribute -> constraints that write it
    writers: BTreeMap<AttributeRef, BTreeSet<ConstraintId>>,
    by_box: BTreeMap<BoxId, BTreeSet<ConstraintId>>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(&id)
    }

    /// Installed constraints in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints.iter().map(|(&id, c)| (id, c))
    }

    pub fn constraints_on(&self, box_id: BoxId) -> impl Iterator<Item = ConstraintId> + '_ {
        self.by_box.get(&box_id).into_iter().flatten().copied()
    }

    pub fn readers_of(&self, attribute: AttributeRef) -> impl Iterator<Item = ConstraintId> + '_ {
        self.readers.get(&attribute).into_iter().flatten().copied()
    }

    pub fn writers_of(&self, attribute: AttributeRef) -> impl Iterator<Item = ConstraintId> + '_ {
        self.writers.get(&attribute).into_iter().flatten().copied()
    }

    /// Add a constraint. Rejects it, leaving the graph untouched, when it would
    /// close a cycle made only of required constraints.
    pub fn install(&mut self, constraint: Constraint) -> Result<ConstraintId> {
        if constraint.is_required() {
            if let Some(rhs) = constraint.rhs() {
                if let Some(cycle) = self.required_path(constraint.lhs(), rhs) {
                    return Err(LayoutError::CyclicRequiredConstraint {
                        attribute: constraint.lhs(),
                        cycle,
                    });
                }
            }
        }

        let id = ConstraintId::new(self.next_id);
        self.next_id += 1;

        self.writers.entry(constraint.lhs()).or_default().insert(id);
        if let Some(rhs) = constraint.rhs() {
            self.readers.entry(rhs).or_default().insert(id);
        }
        for box_id in constraint.boxes() {
            self.by_box.entry(box_id).or_default().insert(id);
        }
        debug!("Installed {} as {}", constraint, id);
        self.constraints.insert(id, constraint);
        Ok(id)
    }

    /// Remove a constraint and its edges. Unknown ids are ignored.
    pub fn retract(&mut self, id: ConstraintId) -> Option<Constraint> {
        let constraint = self.constraints.remove(&id)?;

        remove_edge(&mut self.writers, constraint.lhs(), id);
        if let Some(rhs) = constraint.rhs() {
            remove_edge(&mut self.readers, rhs, id);
        }
        for box_id in constraint.boxes() {
            remove_edge(&mut self.by_box, box_id, id);
        }
        debug!("Retracted {}", id);
        Some(constraint)
    }

    /// Retract every constraint that references `box_id`.
    pub fn retract_box(&mut self, box_id: BoxId) -> Vec<ConstraintId> {
        let ids: Vec<ConstraintId> = self.constraints_on(box_id).collect();
        for &id in &ids {
            self.retract(id);
        }
        ids
    }

    /// Required constraints leading from `from` to `to` along read→write edges.
    ///
    /// A new required constraint writing `from` and reading `to` closes a cycle
    /// exactly when such a path exists (or `from == to`).
    fn required_path(&self, from: AttributeRef, to: AttributeRef) -> Option<Vec<ConstraintId>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut previous: BTreeMap<AttributeRef, (AttributeRef, ConstraintId)> = BTreeMap::new();
        let mut queue = VecDeque::from([from]);
        let mut seen = BTreeSet::from([from]);

        while let Some(current) = queue.pop_front() {
            for id in self.readers_of(current) {
                let Some(constraint) = self.constraints.get(&id) else {
                    continue;
                };
                if !constraint.is_required() {
                    continue;
                }
                let next = constraint.lhs();
                if !seen.insert(next) {
                    continue;
                }
                previous.insert(next, (current, id));
                if next == to {
                    let mut path = Vec::new();
                    let mut cursor = to;
                    while let Some(&(prev, via)) = previous.get(&cursor) {
                        path.push(via);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Boxes whose geometry may change when `constraint` is installed or
    /// retracted: everything linked to its boxes through constraints, plus the
    /// descendants that default to parent-relative placement.
    pub fn boxes_affected_by(&self, constraint: &Constraint, tree: &BoxTree) -> BTreeSet<BoxId> {
        self.boxes_affected_by_boxes(constraint.boxes(), tree)
    }

    /// Same closure starting from arbitrary boxes (e.g. the root on resize).
    pub fn boxes_affected_by_boxes(
        &self,
        start: impl IntoIterator<Item = BoxId>,
        tree: &BoxTree,
    ) -> BTreeSet<BoxId> {
        let mut affected = BTreeSet::new();
        let mut queue: VecDeque<BoxId> = start.into_iter().collect();

        while let Some(box_id) = queue.pop_front() {
            if !tree.contains(box_id) || !affected.insert(box_id) {
                continue;
            }
            for id in self.constraints_on(box_id) {
                if let Some(constraint) = self.constraints.get(&id) {
                    queue.extend(constraint.boxes());
                }
            }
            queue.extend(tree.children(box_id).iter().copied());
        }
        affected
    }
}

fn remove_edge<K: Ord>(map: &mut BTreeMap<K, BTreeSet<ConstraintId>>, key: K, id: ConstraintId) {
    if let Some(set) = map.get_mut(&key) {
        set.remove(&id);
        if set.is_empty() {
            map.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;
    use hearth_core::{BoxSpec, Priority};

    fn tree_with(n: usize) -> (BoxTree, Vec<BoxId>) {
        let mut tree = BoxTree::new(DVec2::new(800.0, 600.0));
        let root = tree.root();
        let ids = (0..n).map(|_| tree.insert(root, BoxSpec::new()).unwrap()).collect();
        (tree, ids)
    }

    fn eq(lhs: AttributeRef, rhs: AttributeRef) -> Constraint {
        Constraint::build(lhs).equal_to(rhs).finish().unwrap()
    }

    #[test]
    fn test_required_cycle_rejected_without_side_effects() {
        let (_, ids) = tree_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let mut graph = ConstraintGraph::new();
        let ab = graph.install(eq(a.width(), b.width())).unwrap();
        let bc = graph.install(eq(b.width(), c.width())).unwrap();

        let err = graph.install(eq(c.width(), a.width())).unwrap_err();
        match err {
            LayoutError::CyclicRequiredConstraint { attribute, cycle } => {
                assert_eq!(attribute, c.width());
                assert_eq!(cycle, vec![bc, ab]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.readers_of(a.width()).count(), 0);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let (_, ids) = tree_with(1);
        let mut graph = ConstraintGraph::new();
        let twice = Constraint::build(ids[0].width())
            .equal_to(ids[0].width())
            .multiplier(2.0)
            .finish()
            .unwrap();
        assert!(matches!(
            graph.install(twice),
            Err(LayoutError::CyclicRequiredConstraint { .. })
        ));
    }

    #[test]
    fn test_mixed_priority_cycle_allowed() {
        let (_, ids) = tree_with(2);
        let (a, b) = (ids[0], ids[1]);
        let mut graph = ConstraintGraph::new();
        graph.install(eq(a.height(), b.height())).unwrap();
        let weak = Constraint::build(b.height())
            .equal_to(a.height())
            .priority(Priority::WEAK)
            .finish()
            .unwrap();
        assert!(graph.install(weak).is_ok());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_different_attributes_do_not_form_cycle() {
        let (_, ids) = tree_with(2);
        let (a, b) = (ids[0], ids[1]);
        let mut graph = ConstraintGraph::new();
        graph.install(eq(a.left(), b.right())).unwrap();
        assert!(graph.install(eq(b.left(), a.right())).is_ok());
    }

    #[test]
    fn test_retract_clears_edges() {
        let (_, ids) = tree_with(2);
        let (a, b) = (ids[0], ids[1]);
        let mut graph = ConstraintGraph::new();
        let id = graph.install(eq(a.top(), b.bottom())).unwrap();
        assert_eq!(graph.readers_of(b.bottom()).collect::<Vec<_>>(), vec![id]);
        assert_eq!(graph.writers_of(a.top()).collect::<Vec<_>>(), vec![id]);

        assert!(graph.retract(id).is_some());
        assert!(graph.retract(id).is_none());
        assert_eq!(graph.readers_of(b.bottom()).count(), 0);
        assert_eq!(graph.constraints_on(a).count(), 0);
        // Retracting broke the path, so the reverse is now acceptable.
        assert!(graph.install(eq(b.bottom(), a.top())).is_ok());
    }

    #[test]
    fn test_retract_box() {
        let (_, ids) = tree_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let mut graph = ConstraintGraph::new();
        let ab = graph.install(eq(a.left(), b.left())).unwrap();
        let bc = graph.install(eq(b.top(), c.top())).unwrap();
        let ca = graph.install(eq(c.width(), a.width())).unwrap();

        assert_eq!(graph.retract_box(b), vec![ab, bc]);
        assert_eq!(graph.iter().map(|(id, _)| id).collect::<Vec<_>>(), vec![ca]);
    }

    #[test]
    fn test_boxes_affected_by() {
        let (mut tree, ids) = tree_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        let nested = tree.insert(b, BoxSpec::new()).unwrap();
        let mut graph = ConstraintGraph::new();
        graph.install(eq(a.left(), b.left())).unwrap();

        let touching_a = Constraint::build(a.width()).equal_to(50.0).finish().unwrap();
        let affected = graph.boxes_affected_by(&touching_a, &tree);
        assert_eq!(affected, BTreeSet::from([a, b, nested]));
        assert!(!affected.contains(&c));
    }
}
