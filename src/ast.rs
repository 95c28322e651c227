//! Abstract Syntax Tree definitions for host matrix expressions

/// A complete program consisting of statements
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A statement in the program
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Variable assignment: `X = expr`
    Assignment { target: String, value: HostExpr },
    /// Bare expression, used as the kernel output when last
    Expression(HostExpr),
}

impl Statement {
    pub fn value(&self) -> &HostExpr {
        match self {
            Statement::Assignment { value, .. } => value,
            Statement::Expression(value) => value,
        }
    }
}

/// Host-level expressions over whole matrices and scalars
#[derive(Debug, Clone, PartialEq)]
pub enum HostExpr {
    /// Matrix or scalar variable reference
    Variable(String),

    /// Scalar literal
    Scalar(f64),

    /// Matrix multiplication: `A @ B`
    MatMul(Box<HostExpr>, Box<HostExpr>),

    /// `A + B`, `A + 1`
    Add(Box<HostExpr>, Box<HostExpr>),

    /// `A - B`, `A - 1`
    Sub(Box<HostExpr>, Box<HostExpr>),

    /// Scalar product: `A * 2`
    Mul(Box<HostExpr>, Box<HostExpr>),

    /// Scalar quotient: `A / 2`
    Div(Box<HostExpr>, Box<HostExpr>),

    /// Negation: `-A`
    Neg(Box<HostExpr>),

    /// Matrix transpose: `A.T` or `np.transpose(A)`
    Transpose(Box<HostExpr>),

    /// Function call: `exp(A)`, `np.log(A)`, `np.dot(A, B)`
    FunctionCall { name: String, args: Vec<HostExpr> },
}
