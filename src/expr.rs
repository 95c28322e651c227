//! Scalar expression trees for symbolic matrix cells
//!
//! Every cell of a [`NamedMatrix`](crate::matrix::NamedMatrix) is an [`Expr`]:
//! a tree of element references, numeric literals, binary operators and
//! unary functions. Rendering follows the source syntax of the generated
//! kernels, e.g. `(A[0,1]) * (B[1,0])+10` or `(A[0,1])*2`.

use std::fmt;

/// Reference to a single element of a named matrix: `name[row,col]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub matrix: String,
    pub row: usize,
    pub col: usize,
}

impl ElementRef {
    pub fn new(matrix: impl Into<String>, row: usize, col: usize) -> Self {
        Self {
            matrix: matrix.into(),
            row,
            col,
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{}]", self.matrix, self.row, self.col)
    }
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Mul,
}

/// Unary elementwise functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryFunc {
    Exp,
    Log,
}

impl UnaryFunc {
    pub fn name(self) -> &'static str {
        match self {
            UnaryFunc::Exp => "exp",
            UnaryFunc::Log => "log",
        }
    }
}

/// Scalar expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Element of a matrix: `A[i,j]`
    Reference(ElementRef),

    /// Numeric literal
    Literal(f64),

    /// `lhs + rhs` or `(lhs) * (rhs)`
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// `exp(arg)` or `log(arg)`
    Unary { func: UnaryFunc, arg: Box<Expr> },
}

impl Expr {
    pub fn reference(matrix: impl Into<String>, row: usize, col: usize) -> Self {
        Expr::Reference(ElementRef::new(matrix, row, col))
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op: BinaryOp::Mul,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(func: UnaryFunc, arg: Expr) -> Self {
        Expr::Unary {
            func,
            arg: Box::new(arg),
        }
    }

    /// All element references in left-to-right order
    pub fn references(&self) -> Vec<&ElementRef> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a ElementRef>) {
        match self {
            Expr::Reference(r) => refs.push(r),
            Expr::Literal(_) => {}
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(refs);
                rhs.collect_references(refs);
            }
            Expr::Unary { arg, .. } => arg.collect_references(refs),
        }
    }

    /// The first leaf reached when reading the rendered text left to right
    pub fn leftmost(&self) -> &Expr {
        match self {
            Expr::Binary { lhs, .. } => lhs.leftmost(),
            Expr::Unary { arg, .. } => arg.leftmost(),
            leaf => leaf,
        }
    }

    /// Operands of a product are parenthesized unless they are literals
    pub(crate) fn is_bare_operand(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }

    /// Structural fingerprint: the rendered text with every index erased
    pub fn pattern(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, &mut |r: &ElementRef, out: &mut String| {
            out.push_str(&r.matrix);
            out.push_str("[,]");
        });
        out
    }

    /// Render with a caller-supplied rendering of element references
    fn render<F>(&self, out: &mut String, reference: &mut F)
    where
        F: FnMut(&ElementRef, &mut String),
    {
        match self {
            Expr::Reference(r) => reference(r, out),
            Expr::Literal(v) => out.push_str(&format_number(*v)),
            Expr::Binary { op: BinaryOp::Add, lhs, rhs } => {
                lhs.render(out, reference);
                out.push('+');
                rhs.render(out, reference);
            }
            Expr::Binary { op: BinaryOp::Mul, lhs, rhs } => {
                render_operand(lhs, out, reference);
                out.push_str(product_separator(rhs));
                render_operand(rhs, out, reference);
            }
            Expr::Unary { func, arg } => {
                out.push_str(func.name());
                out.push('(');
                arg.render(out, reference);
                out.push(')');
            }
        }
    }
}

/// `(x)*2` for a scalar factor, `(a) * (b)` between two subexpressions
pub(crate) fn product_separator(rhs: &Expr) -> &'static str {
    if rhs.is_bare_operand() {
        "*"
    } else {
        " * "
    }
}

fn render_operand<F>(expr: &Expr, out: &mut String, reference: &mut F)
where
    F: FnMut(&ElementRef, &mut String),
{
    if expr.is_bare_operand() {
        expr.render(out, reference);
    } else {
        out.push('(');
        expr.render(out, reference);
        out.push(')');
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.render(&mut out, &mut |r: &ElementRef, out: &mut String| {
            out.push_str(&r.to_string());
        });
        f.write_str(&out)
    }
}

/// Format a numeric literal the way it appears in kernel source.
///
/// Integral values drop the fractional part (`10`, not `10.0`).
pub fn format_number(value: f64) -> String {
    // normalizes -0.0
    let value = value + 0.0;
    format!("{}", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_reference() {
        assert_eq!(Expr::reference("A", 2, 3).to_string(), "A[2,3]");
    }

    #[test]
    fn test_render_dot_term() {
        let term = Expr::mul(Expr::reference("A", 0, 1), Expr::reference("B", 1, 0));
        let expr = Expr::add(term, Expr::Literal(10.0));
        assert_eq!(expr.to_string(), "(A[0,1]) * (B[1,0])+10");
    }

    #[test]
    fn test_render_scalar_product_and_unary() {
        let expr = Expr::unary(
            UnaryFunc::Log,
            Expr::mul(Expr::reference("A", 1, 1), Expr::Literal(2.5)),
        );
        assert_eq!(expr.to_string(), "log((A[1,1])*2.5)");
    }

    #[test]
    fn test_references_in_order() {
        let expr = Expr::add(
            Expr::mul(Expr::reference("A", 0, 0), Expr::reference("B", 0, 1)),
            Expr::unary(UnaryFunc::Exp, Expr::reference("C", 4, 2)),
        );
        let refs: Vec<String> = expr.references().iter().map(|r| r.to_string()).collect();
        assert_eq!(refs, vec!["A[0,0]", "B[0,1]", "C[4,2]"]);
    }

    #[test]
    fn test_pattern_erases_indices() {
        let a = Expr::add(Expr::reference("A", 0, 0), Expr::reference("B", 3, 7));
        let b = Expr::add(Expr::reference("A", 5, 1), Expr::reference("B", 0, 0));
        assert_eq!(a.pattern(), "A[,]+B[,]");
        assert_eq!(a.pattern(), b.pattern());
    }

    #[test]
    fn test_pattern_distinguishes_literals() {
        let a = Expr::add(Expr::reference("A", 0, 0), Expr::Literal(1.0));
        let b = Expr::add(Expr::reference("A", 0, 0), Expr::Literal(2.0));
        assert_ne!(a.pattern(), b.pattern());
    }

    #[test]
    fn test_leftmost() {
        let expr = Expr::add(
            Expr::Literal(1.0),
            Expr::mul(Expr::reference("A", 0, 0), Expr::Literal(2.0)),
        );
        assert_eq!(expr.leftmost(), &Expr::Literal(1.0));
        if let Expr::Binary { rhs, .. } = &expr {
            assert_eq!(rhs.leftmost(), &Expr::reference("A", 0, 0));
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
