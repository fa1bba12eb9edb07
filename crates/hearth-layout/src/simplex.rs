// crates/hearth-layout/src/simplex.rs
//! Dense two-phase simplex for bounding a linear expression under `row <= 0`
//! constraints. Variables are unrestricted in sign; each one is split into a
//! positive and a negative part. Bland's rule keeps pivoting deterministic.

use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::linear::{LinearExpr, Var};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Minimum {
    Infeasible,
    Unbounded,
    Value(f64),
}

/// Smallest value of `objective` over every point satisfying all `rows`.
pub fn minimize(objective: &LinearExpr, rows: &[LinearExpr], epsilon: f64) -> Minimum {
    let vars: BTreeSet<Var> = objective
        .vars()
        .chain(rows.iter().flat_map(|row| row.vars()))
        .collect();
    let columns: BTreeMap<Var, usize> =
        vars.iter().enumerate().map(|(i, &var)| (var, i)).collect();

    let first_slack = 2 * columns.len();
    let first_artificial = first_slack + rows.len();
    let artificials = rows.iter().filter(|row| row.constant > 0.0).count();
    let width = first_artificial + artificials;

    let mut tableau = Tableau {
        rows: Vec::with_capacity(rows.len()),
        basis: Vec::with_capacity(rows.len()),
        width,
        epsilon,
    };
    let mut next_artificial = first_artificial;
    for (k, row) in rows.iter().enumerate() {
        // terms + slack = -constant
        let mut line = vec![0.0; width + 1];
        for (var, &coefficient) in &row.terms {
            if let Some(&column) = columns.get(var) {
                line[2 * column] = coefficient;
                line[2 * column + 1] = -coefficient;
            }
        }
        line[first_slack + k] = 1.0;
        line[width] = -row.constant;
        if line[width] < 0.0 {
            line.iter_mut().for_each(|value| *value = -*value);
            line[next_artificial] = 1.0;
            tableau.basis.push(next_artificial);
            next_artificial += 1;
        } else {
            tableau.basis.push(first_slack + k);
        }
        tableau.rows.push(line);
    }

    if artificials > 0 {
        let mut cost = vec![0.0; width];
        cost[first_artificial..].fill(1.0);
        let bounded = tableau.optimize(&cost, width).is_ok();
        if !bounded || tableau.objective(&cost) > epsilon {
            return Minimum::Infeasible;
        }
        tableau.drive_out(first_artificial);
    }

    let mut cost = vec![0.0; width];
    for (var, &coefficient) in &objective.terms {
        if let Some(&column) = columns.get(var) {
            cost[2 * column] = coefficient;
            cost[2 * column + 1] = -coefficient;
        }
    }
    match tableau.optimize(&cost, first_artificial) {
        Ok(()) => Minimum::Value(tableau.objective(&cost) + objective.constant),
        Err(Unbounded) => Minimum::Unbounded,
    }
}

struct Unbounded;

struct Tableau {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    /// Column count; the right-hand side lives at index `width`.
    width: usize,
    epsilon: f64,
}

impl Tableau {
    fn reduced_cost(&self, cost: &[f64], column: usize) -> f64 {
        cost[column]
            - self
                .rows
                .iter()
                .zip(&self.basis)
                .map(|(row, &basic)| cost[basic] * row[column])
                .sum::<f64>()
    }

    fn objective(&self, cost: &[f64]) -> f64 {
        self.rows
            .iter()
            .zip(&self.basis)
            .map(|(row, &basic)| cost[basic] * row[self.width])
            .sum()
    }

    /// Minimize `cost`, letting only columns below `enterable` join the basis.
    fn optimize(&mut self, cost: &[f64], enterable: usize) -> Result<(), Unbounded> {
        let limit = 50 * (self.width + self.rows.len() + 1);
        for _ in 0..limit {
            let entering = (0..enterable).find(|&column| {
                !self.basis.contains(&column) && self.reduced_cost(cost, column) < -self.epsilon
            });
            let Some(column) = entering else {
                return Ok(());
            };

            let mut leaving: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                if row[column] <= self.epsilon {
                    continue;
                }
                let ratio = row[self.width] / row[column];
                let better = match leaving {
                    None => true,
                    Some((best_row, best)) => {
                        ratio < best - self.epsilon
                            || (ratio <= best + self.epsilon
                                && self.basis[i] < self.basis[best_row])
                    }
                };
                if better {
                    leaving = Some((i, ratio));
                }
            }
            let Some((row, _)) = leaving else {
                return Err(Unbounded);
            };
            self.pivot(row, column);
        }
        warn!("Simplex stopped after {} pivots", limit);
        Ok(())
    }

    fn pivot(&mut self, pivot_row: usize, column: usize) {
        let divisor = self.rows[pivot_row][column];
        self.rows[pivot_row].iter_mut().for_each(|value| *value /= divisor);
        let pivot = self.rows[pivot_row].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == pivot_row {
                continue;
            }
            let factor = row[column];
            if factor != 0.0 {
                row.iter_mut().zip(&pivot).for_each(|(value, p)| *value -= factor * p);
            }
        }
        self.basis[pivot_row] = column;
    }

    /// Replace artificial columns still basic (at zero) after phase one.
    fn drive_out(&mut self, first_artificial: usize) {
        for i in 0..self.rows.len() {
            if self.basis[i] < first_artificial {
                continue;
            }
            let replacement = (0..first_artificial)
                .find(|&column| self.rows[i][column].abs() > self.epsilon);
            if let Some(column) = replacement {
                self.pivot(i, column);
            }
        }
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

    fn value(minimum: Minimum) -> f64 {
        match minimum {
            Minimum::Value(v) => v,
            other => panic!("expected a finite minimum, got {other:?}"),
        }
    }

    #[test]
    fn test_box_bounds() {
        // 100 <= x <= 300
        let rows = [expr(&[(0, -1.0)], 100.0), expr(&[(0, 1.0)], -300.0)];
        assert!((value(minimize(&expr(&[(0, 1.0)], 0.0), &rows, EPS)) - 100.0).abs() < 1e-9);
        assert!((value(minimize(&expr(&[(0, -1.0)], 0.0), &rows, EPS)) + 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_coupled_rows() {
        // x + y <= 10, x >= 2, y >= 3: min of -(x + 2y) is -(2 + 16)
        let rows = [
            expr(&[(0, 1.0), (1, 1.0)], -10.0),
            expr(&[(0, -1.0)], 2.0),
            expr(&[(1, -1.0)], 3.0),
        ];
        let objective = expr(&[(0, -1.0), (1, -2.0)], 0.0);
        assert!((value(minimize(&objective, &rows, EPS)) + 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_and_unbounded() {
        let clash = [expr(&[(0, 1.0)], -5.0), expr(&[(0, -1.0)], 8.0)];
        assert_eq!(minimize(&LinearExpr::new(), &clash, EPS), Minimum::Infeasible);

        let upper_only = [expr(&[(3, 1.0)], -5.0)];
        assert_eq!(minimize(&expr(&[(3, 1.0)], 0.0), &upper_only, EPS), Minimum::Unbounded);
        assert_eq!(minimize(&expr(&[(3, -1.0)], 1.0), &upper_only, EPS), Minimum::Value(-4.0));
    }

    #[test]
    fn test_no_rows() {
        assert_eq!(minimize(&expr(&[], 7.0), &[], EPS), Minimum::Value(7.0));
        assert_eq!(minimize(&expr(&[(1, 2.0)], 0.0), &[], EPS), Minimum::Unbounded);
    }
}
