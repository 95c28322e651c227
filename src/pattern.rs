//! Structural pattern detection and index occurrence extraction
//!
//! The canonicalizer erases concrete indices from every cell and checks that
//! the whole grid shares one template. The extractor then records, cell by
//! cell, the concrete indices at every reference slot of that template.

use log::{debug, info};

use crate::error::{KernelError, KernelResult, Lane};
use crate::matrix::NamedMatrix;

/// Distinct structural patterns of a matrix and the pattern id of every cell
#[derive(Debug, Clone, PartialEq)]
pub struct PatternTable {
    matrix: String,
    cols: usize,
    /// Distinct patterns in first-seen (row-major) order
    patterns: Vec<String>,
    /// Row-major pattern id per cell
    cell_ids: Vec<usize>,
}

impl PatternTable {
    /// Number of distinct patterns
    pub fn count(&self) -> usize {
        self.patterns.len()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn pattern_id(&self, row: usize, col: usize) -> usize {
        self.cell_ids[row * self.cols + col]
    }

    /// First cell, in row-major order, whose pattern differs from cell (0, 0)
    pub fn first_divergent_cell(&self) -> Option<(usize, usize)> {
        let rows = self.cell_ids.len() / self.cols;
        (0..rows)
            .flat_map(|i| (0..self.cols).map(move |j| (i, j)))
            .find(|&(i, j)| self.pattern_id(i, j) != self.pattern_id(0, 0))
    }

    /// The single pattern shared by every cell
    pub fn single(&self) -> KernelResult<&str> {
        match self.patterns.as_slice() {
            [only] => Ok(only.as_str()),
            _ => {
                if let Some((i, j)) = self.first_divergent_cell() {
                    debug!(
                        "Matrix {}: cell ({}, {}) has pattern {}",
                        self.matrix,
                        i,
                        j,
                        self.patterns[self.pattern_id(i, j)]
                    );
                }
                Err(KernelError::UnsupportedPattern {
                    matrix: self.matrix.clone(),
                    count: self.patterns.len(),
                })
            }
        }
    }
}

/// Compute the structural pattern table of a matrix
pub fn canonicalize(matrix: &NamedMatrix) -> PatternTable {
    let mut patterns: Vec<String> = Vec::new();
    let mut cell_ids = Vec::with_capacity(matrix.rows() * matrix.cols());

    for (_, cell) in matrix.iter_cells() {
        let pattern = cell.pattern();
        let id = match patterns.iter().position(|p| *p == pattern) {
            Some(id) => id,
            None => {
                patterns.push(pattern);
                patterns.len() - 1
            }
        };
        cell_ids.push(id);
    }

    info!(
        "Matrix {} has {} unique pattern{}",
        matrix.name(),
        patterns.len(),
        if patterns.len() > 1 { "s" } else { "" }
    );

    PatternTable {
        matrix: matrix.name().to_string(),
        cols: matrix.cols(),
        patterns,
        cell_ids,
    }
}

/// Observed index values of one reference slot across all output cells
#[derive(Debug, Clone, PartialEq)]
pub struct OccurrenceSlot {
    /// Matrix referenced at this slot
    pub matrix: String,
    /// Row index per output cell, row-major
    pub row_values: Vec<f64>,
    /// Column index per output cell, row-major
    pub col_values: Vec<f64>,
}

impl OccurrenceSlot {
    pub fn lane(&self, lane: Lane) -> &[f64] {
        match lane {
            Lane::Row => &self.row_values,
            Lane::Col => &self.col_values,
        }
    }
}

/// Output coordinates and per-slot index observations
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrences {
    /// Output row of every cell, row-major
    pub row_coords: Vec<f64>,
    /// Output column of every cell, row-major
    pub col_coords: Vec<f64>,
    pub slots: Vec<OccurrenceSlot>,
}

/// Record the concrete indices at every reference slot, cell by cell.
///
/// Callers check [`PatternTable::single`] first; every cell must yield as
/// many references as the representative cell (0, 0).
pub fn extract_occurrences(matrix: &NamedMatrix) -> KernelResult<Occurrences> {
    let n = matrix.rows() * matrix.cols();
    let representative = matrix.cell(0, 0).references();
    let mut slots: Vec<OccurrenceSlot> = representative
        .iter()
        .map(|r| OccurrenceSlot {
            matrix: r.matrix.clone(),
            row_values: Vec::with_capacity(n),
            col_values: Vec::with_capacity(n),
        })
        .collect();

    let mut row_coords = Vec::with_capacity(n);
    let mut col_coords = Vec::with_capacity(n);

    for ((i, j), cell) in matrix.iter_cells() {
        let refs = cell.references();
        if refs.len() != slots.len() {
            return Err(KernelError::malformed(
                matrix.name(),
                i,
                j,
                format!("expected {} references, found {}", slots.len(), refs.len()),
            ));
        }

        row_coords.push(i as f64);
        col_coords.push(j as f64);
        for (slot, r) in slots.iter_mut().zip(refs) {
            slot.row_values.push(r.row as f64);
            slot.col_values.push(r.col as f64);
        }
    }

    Ok(Occurrences {
        row_coords,
        col_coords,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_elementwise_single_pattern() {
        let a = NamedMatrix::new("A", 3, 4).unwrap();
        let b = NamedMatrix::new("B", 3, 4).unwrap();
        let m = a.add(&b).unwrap().scalar_mult(2.0).unwrap().exp().log().scalar_add(1.0).unwrap();

        let table = canonicalize(&m);
        assert_eq!(table.count(), 1);
        assert_eq!(table.first_divergent_cell(), None);
        assert_eq!(table.single().unwrap(), "log(exp((A[,]+B[,])*2))+1");
    }

    /// 1x2 matrix whose cells differ structurally: `A[0,0]` and `A[0,1]+1`
    fn two_pattern_matrix() -> NamedMatrix {
        let a = NamedMatrix::new("A", 1, 2).unwrap();
        let shifted = a.scalar_add(1.0).unwrap();
        NamedMatrix::from_exprs("M", 1, 2, vec![a.cell(0, 0).clone(), shifted.cell(0, 1).clone()])
            .unwrap()
    }

    #[test]
    fn test_two_patterns_rejected() {
        let table = canonicalize(&two_pattern_matrix());
        assert_eq!(table.count(), 2);
        assert_eq!(table.patterns(), &["A[,]".to_string(), "A[,]+1".to_string()]);
        assert_eq!(table.pattern_id(0, 0), 0);
        assert_eq!(table.pattern_id(0, 1), 1);
        assert_eq!(table.first_divergent_cell(), Some((0, 1)));
        assert!(matches!(
            table.single(),
            Err(KernelError::UnsupportedPattern { count: 2, .. })
        ));
    }

    #[test]
    fn test_matmul_single_pattern() {
        let a = NamedMatrix::new("A", 4, 3).unwrap();
        let b = NamedMatrix::new("B", 3, 5).unwrap();
        let c = a.multiply(&b).unwrap().transpose();
        assert_eq!(canonicalize(&c).count(), 1);
    }

    #[test]
    fn test_inconsistent_reference_count() {
        let m = NamedMatrix::from_exprs(
            "M",
            1,
            2,
            vec![
                Expr::reference("A", 0, 0),
                Expr::add(Expr::reference("A", 0, 1), Expr::reference("A", 0, 0)),
            ],
        )
        .unwrap();
        match extract_occurrences(&m) {
            Err(KernelError::MalformedExpression { matrix, row, col, .. }) => {
                assert_eq!((matrix.as_str(), row, col), ("M", 0, 1));
            }
            other => panic!("expected MalformedExpression, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_occurrences_matmul() {
        let a = NamedMatrix::new("A", 2, 3).unwrap();
        let b = NamedMatrix::new("B", 3, 2).unwrap();
        let c = a.multiply(&b).unwrap();

        let occ = extract_occurrences(&c).unwrap();
        assert_eq!(occ.row_coords.len(), 4);
        assert_eq!(occ.row_coords, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(occ.col_coords, vec![0.0, 1.0, 0.0, 1.0]);
        assert_eq!(occ.slots.len(), 6);

        // slot 1 is B[k=0, j]
        assert_eq!(occ.slots[1].matrix, "B");
        assert_eq!(occ.slots[1].lane(Lane::Row), &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(occ.slots[1].lane(Lane::Col), &[0.0, 1.0, 0.0, 1.0]);

        // slot 2 is A[i, k=1]
        assert_eq!(occ.slots[2].matrix, "A");
        assert_eq!(occ.slots[2].row_values, vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(occ.slots[2].col_values, vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_extract_transposed() {
        let a = NamedMatrix::new("A", 2, 3).unwrap();
        let occ = extract_occurrences(&a.transpose()).unwrap();
        assert_eq!(occ.slots.len(), 1);
        // out (i, j) reads A[j, i]
        assert_eq!(occ.slots[0].row_values, occ.col_coords);
        assert_eq!(occ.slots[0].col_values, occ.row_coords);
    }
}
