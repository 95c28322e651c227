//! Named symbolic matrices and the builders that derive new ones
//!
//! A [`NamedMatrix`] is an immutable grid of scalar [`Expr`] cells. Every
//! builder returns a fresh matrix, so a chain of builders forms a DAG rooted
//! at the declared inputs.

use std::fmt;

use crate::error::{KernelError, KernelResult};
use crate::expr::{format_number, Expr, UnaryFunc};

/// A symbolic 2D grid of scalar expressions with a code identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMatrix {
    name: String,
    rows: usize,
    cols: usize,
    /// Row-major cells
    cells: Vec<Expr>,
}

impl NamedMatrix {
    /// Declare an input matrix whose cells reference its own elements.
    ///
    /// The name becomes a kernel parameter, so it must be a C identifier.
    pub fn new(name: &str, rows: usize, cols: usize) -> KernelResult<Self> {
        if !is_identifier(name) {
            return Err(KernelError::invalid_op(format!(
                "'{}' is not a valid matrix identifier",
                name
            )));
        }
        if rows == 0 || cols == 0 {
            return Err(KernelError::dimension_mismatch(
                format!("declaration of {}", name),
                format!("({}, {})", rows, cols),
                "non-empty shape",
            ));
        }

        let cells = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| Expr::reference(name, i, j)))
            .collect();

        Ok(Self {
            name: name.to_string(),
            rows,
            cols,
            cells,
        })
    }

    /// Build a matrix from explicit row-major cells.
    ///
    /// Unlike the builders, nothing forces the cells to share a structure.
    pub fn from_exprs(name: &str, rows: usize, cols: usize, cells: Vec<Expr>) -> KernelResult<Self> {
        if rows == 0 || cols == 0 || cells.len() != rows * cols {
            return Err(KernelError::dimension_mismatch(
                format!("cells of {}", name),
                format!("({}, {})", rows, cols),
                format!("{} cells", cells.len()),
            ));
        }
        Ok(Self::from_cells(name.to_string(), rows, cols, cells))
    }

    fn from_cells(name: String, rows: usize, cols: usize, cells: Vec<Expr>) -> Self {
        debug_assert_eq!(cells.len(), rows * cols);
        Self {
            name,
            rows,
            cols,
            cells,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Cell at (row, col); panics when out of bounds, like slice indexing
    pub fn cell(&self, row: usize, col: usize) -> &Expr {
        assert!(row < self.rows && col < self.cols, "cell ({}, {}) out of bounds", row, col);
        &self.cells[row * self.cols + col]
    }

    /// Cells of one row
    pub fn row(&self, row: usize) -> &[Expr] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, col: usize) -> Vec<Expr> {
        (0..self.rows).map(|i| self.cell(i, col).clone()).collect()
    }

    /// Iterate over `((row, col), cell)` in row-major order
    pub fn iter_cells(&self) -> impl Iterator<Item = ((usize, usize), &Expr)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(k, cell)| ((k / cols, k % cols), cell))
    }

    /// Same cells under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::from_cells(name.into(), self.rows, self.cols, self.cells.clone())
    }

    fn map_cells(&self, name: String, f: impl Fn(&Expr) -> Expr) -> Self {
        let cells = self.cells.iter().map(f).collect();
        Self::from_cells(name, self.rows, self.cols, cells)
    }

    /// Elementwise sum
    pub fn add(&self, other: &NamedMatrix) -> KernelResult<Self> {
        if self.shape() != other.shape() {
            return Err(KernelError::dimension_mismatch(
                "add",
                format!("{} {:?}", self.name, self.shape()),
                format!("{} {:?}", other.name, other.shape()),
            ));
        }

        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| Expr::add(a.clone(), b.clone()))
            .collect();

        Ok(Self::from_cells(
            format!("{}+{}", self.name, other.name),
            self.rows,
            self.cols,
            cells,
        ))
    }

    /// Add a scalar to every cell
    pub fn scalar_add(&self, scalar: f64) -> KernelResult<Self> {
        check_finite(scalar, "scalar_add")?;
        Ok(self.map_cells(format!("{}+{}", self.name, format_number(scalar)), |cell| {
            Expr::add(cell.clone(), Expr::Literal(scalar))
        }))
    }

    /// Multiply every cell by a scalar
    pub fn scalar_mult(&self, scalar: f64) -> KernelResult<Self> {
        check_finite(scalar, "scalar_mult")?;
        Ok(self.map_cells(format!("({})*{}", self.name, format_number(scalar)), |cell| {
            Expr::mul(cell.clone(), Expr::Literal(scalar))
        }))
    }

    /// Elementwise exponential
    pub fn exp(&self) -> Self {
        self.unary(UnaryFunc::Exp)
    }

    /// Elementwise natural logarithm
    pub fn log(&self) -> Self {
        self.unary(UnaryFunc::Log)
    }

    fn unary(&self, func: UnaryFunc) -> Self {
        self.map_cells(format!("{}({})", func.name(), self.name), |cell| {
            Expr::unary(func, cell.clone())
        })
    }

    /// Swap row and column axes; cell contents are untouched
    pub fn transpose(&self) -> Self {
        let cells = (0..self.cols)
            .flat_map(|j| (0..self.rows).map(move |i| (i, j)))
            .map(|(i, j)| self.cell(i, j).clone())
            .collect();
        Self::from_cells(format!("({})_t", self.name), self.cols, self.rows, cells)
    }

    /// Matrix product: cell (i, j) is the dot product of row i and column j
    pub fn multiply(&self, other: &NamedMatrix) -> KernelResult<Self> {
        if self.cols != other.rows {
            return Err(KernelError::dimension_mismatch(
                "multiply",
                format!("{} {:?}", self.name, self.shape()),
                format!("{} {:?}", other.name, other.shape()),
            ));
        }

        let columns: Vec<Vec<Expr>> = (0..other.cols).map(|j| other.column(j)).collect();
        let mut cells = Vec::with_capacity(self.rows * other.cols);
        for i in 0..self.rows {
            for column in &columns {
                cells.push(dot_product(self.row(i), column)?);
            }
        }

        Ok(Self::from_cells(
            format!("({})X({})", self.name, other.name),
            self.rows,
            other.cols,
            cells,
        ))
    }

    /// One-line description: `Matrix: A, dim [10 x 10]`
    pub fn summary(&self) -> String {
        format!("Matrix: {}, dim [{} x {}]", self.name, self.rows, self.cols)
    }
}

impl fmt::Display for NamedMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            let row: Vec<String> = self.row(i).iter().map(|c| c.to_string()).collect();
            writeln!(f, "[{}]", row.join(", "))?;
        }
        Ok(())
    }
}

/// Sum of pairwise products `(a0) * (b0)+(a1) * (b1)+...`
pub fn dot_product(lhs: &[Expr], rhs: &[Expr]) -> KernelResult<Expr> {
    if lhs.len() != rhs.len() {
        return Err(KernelError::dimension_mismatch(
            "dot product",
            format!("length {}", lhs.len()),
            format!("length {}", rhs.len()),
        ));
    }

    let mut terms = lhs
        .iter()
        .zip(rhs)
        .map(|(a, b)| Expr::mul(a.clone(), b.clone()));
    let first = terms.next().ok_or_else(|| KernelError::invalid_op("empty dot product"))?;
    Ok(terms.fold(first, Expr::add))
}

/// Literals end up in kernel source, which has no spelling for inf or NaN
fn check_finite(scalar: f64, operation: &str) -> KernelResult<()> {
    if scalar.is_finite() {
        Ok(())
    } else {
        Err(KernelError::invalid_op(format!(
            "{} with non-finite scalar {}",
            operation, scalar
        )))
    }
}

/// Whether `name` can be used verbatim as a C identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn input(name: &str, rows: usize, cols: usize) -> NamedMatrix {
        NamedMatrix::new(name, rows, cols).unwrap()
    }

    #[test]
    fn test_new_populates_references() {
        let a = input("A", 2, 3);
        assert_eq!(a.shape(), (2, 3));
        assert_eq!(a.cell(1, 2), &Expr::reference("A", 1, 2));
        assert_eq!(a.summary(), "Matrix: A, dim [2 x 3]");
    }

    #[test]
    fn test_new_rejects_bad_declarations() {
        assert!(NamedMatrix::new("A", 0, 3).is_err());
        assert!(NamedMatrix::new("2A", 2, 3).is_err());
        assert!(NamedMatrix::new("A-B", 2, 3).is_err());
    }

    #[test]
    fn test_add() {
        let a = input("A", 2, 2);
        let b = input("B", 2, 2);
        let c = a.add(&b).unwrap();
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.cell(1, 0).to_string(), "A[1,0]+B[1,0]");
    }

    #[test]
    fn test_add_shape_mismatch() {
        let a = input("A", 2, 2);
        let b = input("B", 2, 3);
        assert!(matches!(a.add(&b), Err(KernelError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_multiply_shape() {
        let a = input("A", 2, 3);
        let b = input("B", 3, 4);
        let c = a.multiply(&b).unwrap();
        assert_eq!(c.shape(), (2, 4));
        assert_eq!(
            c.cell(1, 3).to_string(),
            "(A[1,0]) * (B[0,3])+(A[1,1]) * (B[1,3])+(A[1,2]) * (B[2,3])"
        );
    }

    #[test]
    fn test_multiply_mismatch() {
        let a = input("A", 2, 3);
        let b = input("B", 4, 5);
        assert!(matches!(a.multiply(&b), Err(KernelError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_dot_product_length_mismatch() {
        let a = input("A", 1, 3);
        let b = input("B", 1, 2);
        assert!(matches!(
            dot_product(a.row(0), b.row(0)),
            Err(KernelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_transpose() {
        let a = input("A", 2, 3);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.cell(2, 1), a.cell(1, 2));

        let tt = t.transpose();
        assert_eq!(tt.shape(), a.shape());
        for ((i, j), cell) in a.iter_cells() {
            assert_eq!(tt.cell(i, j).pattern(), cell.pattern());
        }
    }

    #[test]
    fn test_unary_builders_wrap_once() {
        let a = input("A", 3, 2);
        let wrapped = [
            (a.scalar_add(10.0).unwrap(), "A[2,1]+10"),
            (a.scalar_mult(2.0).unwrap(), "(A[2,1])*2"),
            (a.exp(), "exp(A[2,1])"),
            (a.log(), "log(A[2,1])"),
        ];
        for (m, expected) in &wrapped {
            assert_eq!(m.shape(), a.shape());
            assert_eq!(m.cell(2, 1).to_string(), *expected);
            for ((i, j), cell) in m.iter_cells() {
                let inner = match cell {
                    Expr::Binary { lhs, .. } => lhs.as_ref(),
                    Expr::Unary { arg, .. } => arg.as_ref(),
                    other => panic!("unexpected cell {:?}", other),
                };
                assert_eq!(inner, a.cell(i, j));
            }
        }
    }

    #[test]
    fn test_scalar_builders_reject_non_finite() {
        let a = input("A", 2, 2);
        for scalar in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(a.scalar_add(scalar), Err(KernelError::InvalidOperation { .. })));
            assert!(matches!(a.scalar_mult(scalar), Err(KernelError::InvalidOperation { .. })));
        }
    }

    #[test]
    fn test_derived_names() {
        let a = input("A", 2, 2);
        let b = input("B", 2, 2);
        assert_eq!(a.multiply(&b).unwrap().name(), "(A)X(B)");
        assert_eq!(a.transpose().name(), "(A)_t");
        assert_eq!(a.scalar_mult(2.0).unwrap().name(), "(A)*2");
        assert_eq!(a.exp().name(), "exp(A)");
    }

    #[test]
    fn test_from_exprs_checks_cell_count() {
        let cells = vec![Expr::reference("A", 0, 0), Expr::Literal(1.0)];
        assert!(NamedMatrix::from_exprs("M", 1, 2, cells.clone()).is_ok());
        assert!(matches!(
            NamedMatrix::from_exprs("M", 2, 2, cells),
            Err(KernelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_display() {
        let a = input("A", 2, 2);
        assert_eq!(a.to_string(), "[A[0,0], A[0,1]]\n[A[1,0], A[1,1]]\n");
    }
}
