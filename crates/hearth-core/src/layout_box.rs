// crates/hearth-core/src/layout_box.rs
use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{validate_size, Geometry, LayoutError, Result};

/// Stable identifier of a box. Ids are never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoxId(u32);

impl BoxId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Authoring description of a box before it joins the tree.
#[derive(Debug, Clone, Default)]
pub struct BoxSpec {
    pub name: Option<String>,
    pub intrinsic_size: DVec2,
}

impl BoxSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Natural size used for width/height left free by constraints.
    pub fn intrinsic_size(mut self, width: f64, height: f64) -> Self {
        self.intrinsic_size = DVec2::new(width, height);
        self
    }
}

#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub id: BoxId,
    pub name: Option<String>,
    pub parent: Option<BoxId>,
    pub children: Vec<BoxId>,
    pub intrinsic_size: DVec2,
    /// Set only by a successful solve.
    pub geometry: Option<Geometry>,
}

/// Box hierarchy owned top-down. Parents own children; the parent link is an
/// id lookup, never a second owner.
#[derive(Debug, Clone)]
pub struct BoxTree {
    boxes: BTreeMap<BoxId, LayoutBox>,
    root: BoxId,
    next_id: u32,
}

impl BoxTree {
    pub fn new(root_size: DVec2) -> Self {
        let root = BoxId::new(0);
        let mut boxes = BTreeMap::new();
        boxes.insert(
            root,
            LayoutBox {
                id: root,
                name: Some("root".to_string()),
                parent: None,
                children: Vec::new(),
                intrinsic_size: root_size,
                geometry: None,
            },
        );
        Self {
            boxes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> BoxId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn contains(&self, id: BoxId) -> bool {
        self.boxes.contains_key(&id)
    }

    pub fn get(&self, id: BoxId) -> Option<&LayoutBox> {
        self.boxes.get(&id)
    }

    pub fn get_mut(&mut self, id: BoxId) -> Option<&mut LayoutBox> {
        self.boxes.get_mut(&id)
    }

    pub fn parent(&self, id: BoxId) -> Option<BoxId> {
        self.boxes.get(&id).and_then(|b| b.parent)
    }

    pub fn children(&self, id: BoxId) -> &[BoxId] {
        self.boxes.get(&id).map(|b| b.children.as_slice()).unwrap_or(&[])
    }

    pub fn find_by_name(&self, name: &str) -> Option<BoxId> {
        self.boxes
            .values()
            .find(|b| b.name.as_deref() == Some(name))
            .map(|b| b.id)
    }

    /// Append a new box as the last child of `parent`.
    pub fn insert(&mut self, parent: BoxId, spec: BoxSpec) -> Result<BoxId> {
        validate_size(spec.intrinsic_size.x, spec.intrinsic_size.y)?;
        let parent_box = self
            .boxes
            .get_mut(&parent)
            .ok_or(LayoutError::UnknownBox(parent))?;

        let id = BoxId::new(self.next_id);
        self.next_id += 1;
        parent_box.children.push(id);

        self.boxes.insert(
            id,
            LayoutBox {
                id,
                name: spec.name,
                parent: Some(parent),
                children: Vec::new(),
                intrinsic_size: spec.intrinsic_size,
                geometry: None,
            },
        );
        Ok(id)
    }

    /// Remove a box and its whole subtree. Returns the removed ids in preorder.
    pub fn remove(&mut self, id: BoxId) -> Result<Vec<BoxId>> {
        if id == self.root {
            return Err(LayoutError::InvalidOperation(
                "the root box is owned by the session and cannot be removed".to_string(),
            ));
        }
        let removed = self.subtree(id)?;
        if let Some(parent) = self.parent(id).and_then(|p| self.boxes.get_mut(&p)) {
            parent.children.retain(|&child| child != id);
        }
        for box_id in &removed {
            self.boxes.remove(box_id);
        }
        Ok(removed)
    }

    /// `id` and all of its descendants in preorder.
    pub fn subtree(&self, id: BoxId) -> Result<Vec<BoxId>> {
        if !self.contains(id) {
            return Err(LayoutError::UnknownBox(id));
        }
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            // Reverse so the first child is visited first.
            stack.extend(self.children(current).iter().rev());
        }
        Ok(order)
    }

    /// Every box in preorder from the root; parents always precede children.
    pub fn preorder(&self) -> Vec<BoxId> {
        self.subtree(self.root).unwrap_or_default()
    }

    pub fn set_intrinsic_size(&mut self, id: BoxId, size: DVec2) -> Result<()> {
        validate_size(size.x, size.y)?;
        let layout_box = self.boxes.get_mut(&id).ok_or(LayoutError::UnknownBox(id))?;
        layout_box.intrinsic_size = size;
        Ok(())
    }

    pub fn set_geometry(&mut self, id: BoxId, geometry: Geometry) {
        if let Some(layout_box) = self.boxes.get_mut(&id) {
            layout_box.geometry = Some(geometry);
        }
    }

    /// Deepest box containing `point`; later siblings are drawn on top and win.
    pub fn hit_test(&self, point: DVec2) -> Option<BoxId> {
        let root = self.boxes.get(&self.root)?;
        if !root.geometry.is_some_and(|g| g.contains_point(point)) {
            return None;
        }
        let mut current = self.root;
        'descend: loop {
            for &child in self.children(current).iter().rev() {
                let hit = self
                    .boxes
                    .get(&child)
                    .and_then(|b| b.geometry)
                    .is_some_and(|g| g.contains_point(point));
                if hit {
                    current = child;
                    continue 'descend;
                }
            }
            return Some(current);
        }
    }
}
