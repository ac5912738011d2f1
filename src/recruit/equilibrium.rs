//! Mixed-strategy equilibrium of a two-player zero-sum game
//!
//! Rows are our unit types, columns the enemy's, entries how good the row
//! type is against the column type. The tableau pivoting method finds the
//! mix of rows that maximizes the worst case over enemy columns.
//!
//! Tableau layout: the payoff block, a right border of +1 per row, a foot
//! row of -1 per column and a corner of 0. Every pivot swaps one row label
//! with one column label; labels that end up below the tableau carry the
//! row strategy in the foot row.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::error::{MusterError, Result};
use crate::core::types::UnitTypeId;

/// Payoff table: `values[row][column]`
#[derive(Debug, Clone, Default, Serialize)]
pub struct EffectivenessTable {
    rows: Vec<UnitTypeId>,
    columns: Vec<UnitTypeId>,
    values: Vec<Vec<f64>>,
}

impl EffectivenessTable {
    /// All-zero table
    pub fn new(rows: Vec<UnitTypeId>, columns: Vec<UnitTypeId>) -> Self {
        let values = vec![vec![0.0; columns.len()]; rows.len()];
        Self {
            rows,
            columns,
            values,
        }
    }

    pub fn rows(&self) -> &[UnitTypeId] {
        &self.rows
    }

    pub fn columns(&self) -> &[UnitTypeId] {
        &self.columns
    }

    pub fn get(&self, row: usize, column: usize) -> f64 {
        self.values[row][column]
    }

    pub fn set(&mut self, row: usize, column: usize, value: f64) {
        self.values[row][column] = value;
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}

/// Row strategy of the equilibrium: probability per row type, summing to 1
///
/// Rows not played are absent.
pub fn find_equilibrium(
    table: &EffectivenessTable,
    max_pivots: usize,
) -> Result<BTreeMap<UnitTypeId, f64>> {
    if table.is_empty() {
        return Err(MusterError::Equilibrium("empty effectiveness table".into()));
    }
    let m = table.rows.len();
    let n = table.columns.len();

    // Strictly positive payoffs keep the game value positive
    let min = table
        .values
        .iter()
        .flatten()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let shift = if min <= 0.0 { 1.0 - min } else { 0.0 };

    let mut tableau = vec![vec![0.0; n + 1]; m + 1];
    for (i, row) in table.values.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            tableau[i][j] = value + shift;
        }
        tableau[i][n] = 1.0;
    }
    for j in 0..n {
        tableau[m][j] = -1.0;
    }

    // Row labels live left or below, column labels above or right
    let mut left: Vec<Option<usize>> = (0..m).map(Some).collect();
    let mut right: Vec<Option<usize>> = vec![None; m];
    let mut above: Vec<Option<usize>> = (0..n).map(Some).collect();
    let mut below: Vec<Option<usize>> = vec![None; n];
    let mut determinant = 1.0;

    for pivots in 0..=max_pivots {
        let solved = (0..m).all(|i| tableau[i][n] >= 0.0) && (0..n).all(|j| tableau[m][j] >= 0.0);
        if solved {
            tracing::debug!(pivots, "equilibrium found");
            return strategy(table, &tableau, &below, m);
        }
        if pivots == max_pivots {
            break;
        }

        let Some((pivot_row, pivot_column)) = choose_pivot(&tableau, m, n) else {
            return Err(MusterError::Equilibrium("no admissible pivot".into()));
        };
        let pivot = tableau[pivot_row][pivot_column];

        let previous = tableau.clone();
        for i in 0..=m {
            for j in 0..=n {
                tableau[i][j] = if i == pivot_row && j == pivot_column {
                    determinant
                } else if i == pivot_row {
                    previous[i][j]
                } else if j == pivot_column {
                    -previous[i][j]
                } else {
                    (previous[i][j] * pivot - previous[pivot_row][j] * previous[i][pivot_column])
                        / determinant
                };
            }
        }
        determinant = pivot;

        std::mem::swap(&mut left[pivot_row], &mut below[pivot_column]);
        std::mem::swap(&mut above[pivot_column], &mut right[pivot_row]);
    }

    Err(MusterError::Equilibrium(format!(
        "no equilibrium within {max_pivots} pivots"
    )))
}

/// Pivot column: negative foot, with the largest minimal ratio.
/// Pivot row: positive entry with the smallest ratio in that column.
fn choose_pivot(tableau: &[Vec<f64>], m: usize, n: usize) -> Option<(usize, usize)> {
    let mut best: Option<(f64, usize, usize)> = None;
    for j in 0..n {
        let foot = tableau[m][j];
        if foot >= 0.0 {
            continue;
        }
        let mut column_min: Option<(f64, usize)> = None;
        for (i, row) in tableau.iter().enumerate().take(m) {
            let entry = row[j];
            if entry <= 0.0 {
                continue;
            }
            let candidate = -(row[n] * foot) / entry;
            if column_min.map_or(true, |(min, _)| candidate < min) {
                column_min = Some((candidate, i));
            }
        }
        if let Some((candidate, i)) = column_min {
            if best.map_or(true, |(max, _, _)| candidate > max) {
                best = Some((candidate, i, j));
            }
        }
    }
    best.map(|(_, i, j)| (i, j))
}

fn strategy(
    table: &EffectivenessTable,
    tableau: &[Vec<f64>],
    below: &[Option<usize>],
    m: usize,
) -> Result<BTreeMap<UnitTypeId, f64>> {
    let mut strategy = BTreeMap::new();
    let mut sum = 0.0;
    for (j, label) in below.iter().enumerate() {
        if let Some(row) = label {
            let weight = tableau[m][j];
            strategy.insert(table.rows[*row].clone(), weight);
            sum += weight;
        }
    }
    if sum <= 0.0 {
        return Err(MusterError::Equilibrium("degenerate strategy".into()));
    }
    for weight in strategy.values_mut() {
        *weight /= sum;
    }
    Ok(strategy)
}
