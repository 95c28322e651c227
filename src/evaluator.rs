//! Evaluator turning host programs into symbolic matrices
//!
//! Declared inputs become [`NamedMatrix`] values; every statement is then
//! evaluated with the matrix builders. The value of the last statement is the
//! kernel output.

use std::collections::HashMap;

use log::debug;

use crate::ast::{HostExpr, Program, Statement};
use crate::error::{KernelError, KernelResult};
use crate::matrix::NamedMatrix;

/// Result of evaluating a host expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Matrix(NamedMatrix),
    Scalar(f64),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Matrix(_) => "matrix",
            Value::Scalar(_) => "scalar",
        }
    }
}

/// Output matrix of a program and the inputs it was built from
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub output: NamedMatrix,
    /// Inputs in declaration order
    pub inputs: Vec<NamedMatrix>,
}

impl Evaluation {
    pub fn input_refs(&self) -> Vec<&NamedMatrix> {
        self.inputs.iter().collect()
    }
}

/// Evaluator for host programs
pub struct Evaluator {
    /// Declared inputs, in declaration order
    inputs: Vec<NamedMatrix>,
    /// Values bound by name
    env: HashMap<String, Value>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// Declare an input matrix with known shape
    pub fn define_matrix(&mut self, name: &str, shape: (usize, usize)) -> KernelResult<()> {
        if self.inputs.iter().any(|m| m.name() == name) {
            return Err(KernelError::invalid_op(format!(
                "matrix '{}' is declared twice",
                name
            )));
        }
        let matrix = NamedMatrix::new(name, shape.0, shape.1)?;
        self.env.insert(name.to_string(), Value::Matrix(matrix.clone()));
        self.inputs.push(matrix);
        Ok(())
    }

    /// Evaluate every statement; the last one must produce a matrix
    pub fn evaluate(&mut self, program: &Program) -> KernelResult<Evaluation> {
        let mut last = None;

        for stmt in &program.statements {
            let value = self.evaluate_expr(stmt.value())?;
            let value = match (stmt, value) {
                (Statement::Assignment { target, .. }, Value::Matrix(m)) => {
                    debug!("{} = {}", target, m.summary());
                    Value::Matrix(m.renamed(target.as_str()))
                }
                (_, value) => value,
            };
            if let Statement::Assignment { target, .. } = stmt {
                self.env.insert(target.clone(), value.clone());
            }
            last = Some(value);
        }

        match last {
            Some(Value::Matrix(output)) => Ok(Evaluation {
                output,
                inputs: self.inputs.clone(),
            }),
            Some(Value::Scalar(_)) => Err(KernelError::invalid_op(
                "program result is a scalar, expected a matrix",
            )),
            None => Err(KernelError::invalid_op("program has no statements")),
        }
    }

    /// Evaluate an expression with the matrix builders.
    ///
    /// Folded scalars must stay finite, since they end up as kernel literals.
    fn evaluate_expr(&self, expr: &HostExpr) -> KernelResult<Value> {
        match self.evaluate_value(expr)? {
            Value::Scalar(s) if !s.is_finite() => Err(KernelError::invalid_op(format!(
                "scalar expression evaluates to {}",
                s
            ))),
            value => Ok(value),
        }
    }

    fn evaluate_value(&self, expr: &HostExpr) -> KernelResult<Value> {
        match expr {
            HostExpr::Variable(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| KernelError::undefined(name.clone())),

            HostExpr::Scalar(n) => Ok(Value::Scalar(*n)),

            HostExpr::MatMul(left, right) => {
                let left = self.evaluate_matrix(left, "@")?;
                let right = self.evaluate_matrix(right, "@")?;
                Ok(Value::Matrix(left.multiply(&right)?))
            }

            HostExpr::Add(left, right) => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                add(left, right)
            }

            HostExpr::Sub(left, right) => {
                let left = self.evaluate_expr(left)?;
                let right = negate(self.evaluate_expr(right)?)?;
                add(left, right)
            }

            HostExpr::Mul(left, right) => {
                let left = self.evaluate_expr(left)?;
                let right = self.evaluate_expr(right)?;
                multiply(left, right)
            }

            HostExpr::Div(left, right) => {
                let left = self.evaluate_expr(left)?;
                match self.evaluate_expr(right)? {
                    Value::Scalar(s) if s != 0.0 => multiply(left, Value::Scalar(1.0 / s)),
                    Value::Scalar(_) => Err(KernelError::invalid_op("division by zero")),
                    Value::Matrix(_) => Err(KernelError::invalid_op(
                        "elementwise division by a matrix is not supported",
                    )),
                }
            }

            HostExpr::Neg(inner) => negate(self.evaluate_expr(inner)?),

            HostExpr::Transpose(inner) => {
                let inner = self.evaluate_matrix(inner, "transpose")?;
                Ok(Value::Matrix(inner.transpose()))
            }

            HostExpr::FunctionCall { name, args } => self.evaluate_call(name, args),
        }
    }

    fn evaluate_matrix(&self, expr: &HostExpr, context: &str) -> KernelResult<NamedMatrix> {
        match self.evaluate_expr(expr)? {
            Value::Matrix(m) => Ok(m),
            other => Err(KernelError::invalid_op(format!(
                "{} expects a matrix operand, got a {}",
                context,
                other.kind()
            ))),
        }
    }

    /// Evaluate a function call such as `np.exp(A)` or `np.dot(A, B)`
    fn evaluate_call(&self, name: &str, args: &[HostExpr]) -> KernelResult<Value> {
        let func = name.strip_prefix("np.").unwrap_or(name);
        let arity = match func {
            "exp" | "log" | "transpose" => 1,
            "dot" | "matmul" => 2,
            _ => return Err(KernelError::invalid_op(format!("Unknown function: {}", name))),
        };
        if args.len() != arity {
            return Err(KernelError::invalid_op(format!(
                "{} expects {} argument{}, got {}",
                name,
                arity,
                if arity > 1 { "s" } else { "" },
                args.len()
            )));
        }

        match func {
            "exp" => match self.evaluate_expr(&args[0])? {
                Value::Matrix(m) => Ok(Value::Matrix(m.exp())),
                Value::Scalar(s) => Ok(Value::Scalar(s.exp())),
            },
            "log" => match self.evaluate_expr(&args[0])? {
                Value::Matrix(m) => Ok(Value::Matrix(m.log())),
                Value::Scalar(s) => Ok(Value::Scalar(s.ln())),
            },
            "transpose" => Ok(Value::Matrix(self.evaluate_matrix(&args[0], name)?.transpose())),
            _ => {
                let left = self.evaluate_matrix(&args[0], name)?;
                let right = self.evaluate_matrix(&args[1], name)?;
                Ok(Value::Matrix(left.multiply(&right)?))
            }
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn add(left: Value, right: Value) -> KernelResult<Value> {
    match (left, right) {
        (Value::Matrix(a), Value::Matrix(b)) => Ok(Value::Matrix(a.add(&b)?)),
        (Value::Matrix(m), Value::Scalar(s)) | (Value::Scalar(s), Value::Matrix(m)) => {
            Ok(Value::Matrix(m.scalar_add(s)?))
        }
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a + b)),
    }
}

fn multiply(left: Value, right: Value) -> KernelResult<Value> {
    match (left, right) {
        (Value::Matrix(m), Value::Scalar(s)) | (Value::Scalar(s), Value::Matrix(m)) => {
            Ok(Value::Matrix(m.scalar_mult(s)?))
        }
        (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a * b)),
        (Value::Matrix(a), Value::Matrix(b)) => Err(KernelError::invalid_op(format!(
            "elementwise product of {} and {} is not supported, use '@'",
            a.name(),
            b.name()
        ))),
    }
}

fn negate(value: Value) -> KernelResult<Value> {
    match value {
        Value::Matrix(m) => Ok(Value::Matrix(m.scalar_mult(-1.0)?)),
        Value::Scalar(s) => Ok(Value::Scalar(-s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn evaluate(source: &str, shapes: &[(&str, (usize, usize))]) -> KernelResult<Evaluation> {
        let program = Parser::new(source)?.parse_program()?;
        let mut evaluator = Evaluator::new();
        for (name, shape) in shapes {
            evaluator.define_matrix(name, *shape)?;
        }
        evaluator.evaluate(&program)
    }

    #[test]
    fn test_evaluate_matmul() {
        let result = evaluate("C = A @ B", &[("A", (2, 3)), ("B", (3, 4))]).unwrap();
        assert_eq!(result.output.shape(), (2, 4));
        assert_eq!(result.output.name(), "C");
        let names: Vec<&str> = result.inputs.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_evaluate_matmul_error() {
        let result = evaluate("C = A @ B", &[("A", (2, 3)), ("B", (4, 5))]);
        assert!(matches!(result, Err(KernelError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_evaluate_scalar_ops() {
        let result = evaluate("C = 2 * (A + 1) - 3", &[("A", (2, 2))]).unwrap();
        assert_eq!(result.output.cell(1, 0).to_string(), "(A[1,0]+1)*2+-3");
    }

    #[test]
    fn test_evaluate_scalar_folding() {
        let result = evaluate("s = 2 * 3; C = A / s", &[("A", (1, 1))]).unwrap();
        let expected = NamedMatrix::new("A", 1, 1).unwrap().scalar_mult(1.0 / 6.0).unwrap();
        assert_eq!(result.output.cell(0, 0), expected.cell(0, 0));
    }

    #[test]
    fn test_evaluate_functions() {
        let shapes = [("A", (2, 3)), ("B", (3, 2))];
        let result = evaluate("np.log(np.exp(np.dot(A, B)))", &shapes).unwrap();
        assert_eq!(result.output.shape(), (2, 2));
        assert!(result.output.cell(0, 0).to_string().starts_with("log(exp("));

        let result = evaluate("np.transpose(A) + B", &shapes).unwrap();
        assert_eq!(result.output.cell(2, 1).to_string(), "A[1,2]+B[2,1]");
    }

    #[test]
    fn test_evaluate_sub_matrices() {
        let result = evaluate("A - B", &[("A", (1, 2)), ("B", (1, 2))]).unwrap();
        assert_eq!(result.output.cell(0, 1).to_string(), "A[0,1]+(B[0,1])*-1");
    }

    #[test]
    fn test_evaluate_errors() {
        let a = [("A", (2, 2))];
        assert!(matches!(evaluate("C = A @ X", &a), Err(KernelError::UndefinedMatrix { .. })));
        assert!(matches!(evaluate("C = A * A", &a), Err(KernelError::InvalidOperation { .. })));
        assert!(matches!(evaluate("C = 1 + 2", &a), Err(KernelError::InvalidOperation { .. })));
        assert!(matches!(evaluate("C = sqrt(A)", &a), Err(KernelError::InvalidOperation { .. })));
        assert!(matches!(evaluate("C = np.dot(A)", &a), Err(KernelError::InvalidOperation { .. })));
        assert!(matches!(evaluate("C = A / 0", &a), Err(KernelError::InvalidOperation { .. })));
    }

    #[test]
    fn test_non_finite_scalars_rejected() {
        let a = [("A", (2, 2))];
        for source in [
            "C = A * 1e400",
            "C = A + np.exp(1000)",
            "C = A + np.log(0 - 1)",
            "C = A + log(0)",
            "C = A * (1e300 * 1e300)",
        ] {
            assert!(
                matches!(evaluate(source, &a), Err(KernelError::InvalidOperation { .. })),
                "{} was accepted",
                source
            );
        }
    }

    #[test]
    fn test_define_twice() {
        let mut evaluator = Evaluator::new();
        evaluator.define_matrix("A", (2, 2)).unwrap();
        assert!(evaluator.define_matrix("A", (3, 3)).is_err());
    }
}
