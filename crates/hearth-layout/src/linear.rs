// crates/hearth-layout/src/linear.rs
//! Incremental linear equation system kept in reduced row-echelon form.
//!
//! Every row solves for one pivot variable in terms of variables that are
//! still free, so a variable is determined exactly when it is a pivot with no
//! free terms left.

use std::collections::BTreeMap;

pub type Var = usize;

/// `sum(coefficient * var) + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: BTreeMap<Var, f64>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: value,
        }
    }

    pub fn add_term(&mut self, var: Var, coefficient: f64) {
        let entry = self.terms.entry(var).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.terms.remove(&var);
        }
    }

    /// `self += scale * other`
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        for (&var, &coefficient) in &other.terms {
            self.add_term(var, coefficient * scale);
        }
        self.constant += other.constant * scale;
    }

    pub fn scaled(&self, scale: f64) -> LinearExpr {
        let mut out = LinearExpr::constant(0.0);
        out.add_scaled(self, scale);
        out
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(&var, &coefficient)| coefficient * values.get(var).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }

    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.terms.keys().copied()
    }

    fn prune(&mut self, epsilon: f64) {
        self.terms.retain(|_, coefficient| coefficient.abs() > epsilon);
    }
}

/// Result of adding an equation `expr == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Pinned a new pivot variable.
    Added(Var),
    /// Already implied by the system.
    Redundant,
    /// Contradicts the system.
    Inconsistent,
}

#[derive(Debug, Clone)]
struct Row {
    /// `pivot = rhs.evaluate(free vars)`; `rhs` never mentions a pivot.
    rhs: LinearExpr,
}

#[derive(Debug, Clone)]
pub struct LinearSystem {
    rows: BTreeMap<Var, Row>,
    epsilon: f64,
}

impl LinearSystem {
    pub fn new(epsilon: f64) -> Self {
        Self {
            rows: BTreeMap::new(),
            epsilon,
        }
    }

    pub fn rank(&self) -> usize {
        self.rows.len()
    }

    /// Rewrite `expr` so it only mentions free variables.
    pub fn reduce(&self, expr: &LinearExpr) -> LinearExpr {
        let mut out = LinearExpr::constant(expr.constant);
        for (&var, &coefficient) in &expr.terms {
            match self.rows.get(&var) {
                Some(row) => out.add_scaled(&row.rhs, coefficient),
                None => out.add_term(var, coefficient),
            }
        }
        out.prune(self.epsilon);
        out
    }

    /// Add `expr == 0`. Inconsistent equations are not applied.
    pub fn add(&mut self, expr: &LinearExpr) -> Outcome {
        let reduced = self.reduce(expr);
        if reduced.terms.is_empty() {
            return if reduced.constant.abs() <= self.epsilon {
                Outcome::Redundant
            } else {
                Outcome::Inconsistent
            };
        }

        let pivot = self.choose_pivot(&reduced);
        let pivot_coefficient = reduced.terms[&pivot];
        // pivot = -(reduced - pivot_coefficient * pivot) / pivot_coefficient
        let mut rhs = reduced.scaled(-1.0 / pivot_coefficient);
        rhs.terms.remove(&pivot);
        rhs.prune(self.epsilon);

        // Keep the form reduced: substitute the new pivot everywhere.
        for row in self.rows.values_mut() {
            if let Some(coefficient) = row.rhs.terms.remove(&pivot) {
                row.rhs.add_scaled(&rhs, coefficient);
                row.rhs.prune(self.epsilon);
            }
        }
        self.rows.insert(pivot, Row { rhs });
        Outcome::Added(pivot)
    }

    /// Largest magnitude coefficient, lowest variable on ties.
    fn choose_pivot(&self, reduced: &LinearExpr) -> Var {
        let mut best: Option<(Var, f64)> = None;
        for (&var, &coefficient) in &reduced.terms {
            match best {
                Some((_, magnitude)) if coefficient.abs() <= magnitude => {}
                _ => best = Some((var, coefficient.abs())),
            }
        }
        best.map(|(var, _)| var).unwrap_or_default()
    }

    pub fn is_determined(&self, var: Var) -> bool {
        self.rows.get(&var).is_some_and(|row| row.rhs.terms.is_empty())
    }

    /// Value of `var`, treating every remaining free variable as zero.
    pub fn value(&self, var: Var) -> f64 {
        self.rows.get(&var).map(|row| row.rhs.constant).unwrap_or(0.0)
    }

    pub fn free_vars(&self, count: usize) -> usize {
        (0..count).filter(|var| !self.is_determined(*var)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn expr(terms: &[(Var, f64)], constant: f64) -> LinearExpr {
        let mut e = LinearExpr::constant(constant);
        for &(var, coefficient) in terms {
            e.add_term(var, coefficient);
        }
        e
    }

    #[test]
    fn test_substitution_chain() {
        let mut system = LinearSystem::new(EPS);
        // x0 = 10, x1 = x0 + 5, x2 = 2 * x1
        assert_eq!(system.add(&expr(&[(0, 1.0)], -10.0)), Outcome::Added(0));
        assert!(matches!(system.add(&expr(&[(1, 1.0), (0, -1.0)], -5.0)), Outcome::Added(_)));
        assert!(matches!(system.add(&expr(&[(2, 1.0), (1, -2.0)], 0.0)), Outcome::Added(_)));

        for var in 0..3 {
            assert!(system.is_determined(var));
        }
        assert!((system.value(1) - 15.0).abs() < EPS);
        assert!((system.value(2) - 30.0).abs() < EPS);
    }

    #[test]
    fn test_back_substitution_keeps_rows_reduced() {
        let mut system = LinearSystem::new(EPS);
        // x0 + x1 = 100 leaves one free variable.
        system.add(&expr(&[(0, 1.0), (1, 1.0)], -100.0));
        assert_eq!(system.rank(), 1);
        assert!(!system.is_determined(0) || !system.is_determined(1));

        system.add(&expr(&[(1, 1.0)], -30.0));
        assert!(system.is_determined(0));
        assert!((system.value(0) - 70.0).abs() < EPS);
    }

    #[test]
    fn test_redundant_and_inconsistent() {
        let mut system = LinearSystem::new(EPS);
        system.add(&expr(&[(0, 1.0)], -10.0));
        assert_eq!(system.add(&expr(&[(0, 2.0)], -20.0)), Outcome::Redundant);
        assert_eq!(system.add(&expr(&[(0, 1.0)], -11.0)), Outcome::Inconsistent);
        assert_eq!(system.rank(), 1);
        assert!((system.value(0) - 10.0).abs() < EPS);
    }

    #[test]
    fn test_epsilon_absorbs_rounding() {
        let mut system = LinearSystem::new(1e-6);
        system.add(&expr(&[(0, 3.0)], -1.0));
        // 0.1 + 0.2 style rounding must not register as a conflict.
        let nearly = expr(&[(0, 3.0)], -(0.1 + 0.2) * (1.0 / 0.3));
        assert_eq!(system.add(&nearly), Outcome::Redundant);
    }

    #[test]
    fn test_pivot_tie_breaks_on_lowest_var() {
        let mut system = LinearSystem::new(EPS);
        assert_eq!(system.add(&expr(&[(4, 1.0), (2, -1.0)], 0.0)), Outcome::Added(2));
        let mut system = LinearSystem::new(EPS);
        assert_eq!(system.add(&expr(&[(4, 2.0), (2, -1.0)], 0.0)), Outcome::Added(4));
    }
}
