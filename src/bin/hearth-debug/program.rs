// src/bin/hearth-debug/program.rs
//! JSON layout programs: a box tree, its constraints, and resizes to replay.

use anyhow::{bail, Context, Result};
use hearth_core::{Attribute, BoxId, BoxSpec, Constraint, Priority, Relation};
use hearth_layout::{LayoutSession, SolverConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const ROOT_NAME: &str = "root";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxDecl {
    pub name: String,
    #[serde(default = "root_name")]
    pub parent: String,
    #[serde(default)]
    pub intrinsic: Option<Size>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDecl {
    #[serde(rename = "box")]
    pub box_name: String,
    pub attribute: Attribute,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintDecl {
    #[serde(rename = "box")]
    pub box_name: String,
    pub attribute: Attribute,
    #[serde(default = "equal")]
    pub relation: Relation,
    #[serde(default)]
    pub target: Option<AttributeDecl>,
    #[serde(default = "one")]
    pub multiplier: f64,
    #[serde(default)]
    pub constant: f64,
    #[serde(default)]
    pub priority: Priority,
    /// `width == ratio * height` on `box`; `attribute` must be `width`.
    #[serde(default)]
    pub aspect_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PinDecl {
    #[serde(rename = "box")]
    pub box_name: String,
    pub attribute: Attribute,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    pub viewport: Size,
    #[serde(default)]
    pub boxes: Vec<BoxDecl>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDecl>,
    #[serde(default)]
    pub pins: Vec<PinDecl>,
    #[serde(default)]
    pub resizes: Vec<Size>,
}

fn root_name() -> String {
    ROOT_NAME.to_string()
}

fn equal() -> Relation {
    Relation::Equal
}

fn one() -> f64 {
    1.0
}

/// A session built from a program, with box names resolved.
pub struct Loaded {
    pub session: LayoutSession,
    pub names: BTreeMap<String, BoxId>,
}

impl Loaded {
    pub fn name_of(&self, id: BoxId) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, &box_id)| box_id == id)
            .map(|(name, _)| name.as_str())
    }
}

impl Program {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout program: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid layout program: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declare every box and constraint against a fresh session.
    pub fn build(&self, viewport: Size, config: SolverConfig) -> Result<Loaded> {
        let session = LayoutSession::with_config(viewport.width, viewport.height, config)
            .context("Failed to create layout session")?;
        let mut names = BTreeMap::new();
        names.insert(ROOT_NAME.to_string(), session.root());
        let mut loaded = Loaded { session, names };

        for decl in &self.boxes {
            if loaded.names.contains_key(&decl.name) {
                bail!("Duplicate box name: {}", decl.name);
            }
            let parent = lookup(&loaded.names, &decl.parent)
                .with_context(|| format!("Parent of box '{}'", decl.name))?;
            let mut spec = BoxSpec::new().named(decl.name.clone());
            if let Some(size) = decl.intrinsic {
                spec = spec.intrinsic_size(size.width, size.height);
            }
            let id = loaded
                .session
                .add_box(parent, spec)
                .with_context(|| format!("Failed to add box '{}'", decl.name))?;
            loaded.names.insert(decl.name.clone(), id);
        }

        for (index, decl) in self.constraints.iter().enumerate() {
            let constraint = decl
                .to_constraint(&loaded.names)
                .with_context(|| format!("Constraint #{} on '{}'", index, decl.box_name))?;
            loaded
                .session
                .add_constraint(constraint)
                .with_context(|| format!("Failed to install constraint #{}", index))?;
        }

        for pin in &self.pins {
            let id = lookup(&loaded.names, &pin.box_name)?;
            loaded
                .session
                .pin(id.attr(pin.attribute), pin.value)
                .with_context(|| format!("Failed to pin {}.{}", pin.box_name, pin.attribute))?;
        }

        Ok(loaded)
    }
}

impl ConstraintDecl {
    fn to_constraint(&self, names: &BTreeMap<String, BoxId>) -> Result<Constraint> {
        let id = lookup(names, &self.box_name)?;

        if let Some(ratio) = self.aspect_ratio {
            if self.attribute != Attribute::Width || self.target.is_some() {
                bail!("aspect_ratio constraints take attribute \"width\" and no target");
            }
            return Ok(Constraint::aspect_ratio(id, ratio, self.priority)?);
        }

        let builder = Constraint::build(id.attr(self.attribute)).priority(self.priority);
        let builder = match &self.target {
            Some(target) => {
                let target_id = lookup(names, &target.box_name)?;
                builder
                    .relation(self.relation, target_id.attr(target.attribute))
                    .multiplier(self.multiplier)
            }
            None => builder.relation(self.relation, 0.0),
        };
        Ok(builder.constant(self.constant).finish()?)
    }
}

fn lookup(names: &BTreeMap<String, BoxId>, name: &str) -> Result<BoxId> {
    match names.get(name) {
        Some(&id) => Ok(id),
        None => bail!("Unknown box '{}' (boxes must be declared before use)", name),
    }
}
