//! Index formula assembly and template substitution
//!
//! Fitted coefficients become small symbolic terms in the two thread
//! coordinates, each (row, col) pair is linearized with the referenced
//! matrix's column count, and the representative cell is rewritten with one
//! offset per reference.

use log::trace;

use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::expr::{format_number, product_separator, BinaryOp, Expr};
use crate::regression::AffineCoefficients;

/// Render one index lane, e.g. `global_id_0 + 3` or `2*global_id_1`.
///
/// Zero coefficients are dropped; the all-zero lane is `0`.
pub fn lane_formula(coefficients: &AffineCoefficients, config: &KernelConfig) -> String {
    let mut out = String::new();
    push_term(&mut out, coefficients.row, Some(config.row_coordinate()));
    push_term(&mut out, coefficients.col, Some(config.col_coordinate()));
    push_term(&mut out, coefficients.intercept, None);

    if out.is_empty() {
        out.push('0');
    }
    out
}

/// Append `coeff*symbol` (or the bare constant) with its sign
fn push_term(out: &mut String, coeff: f64, symbol: Option<&str>) {
    if coeff == 0.0 {
        return;
    }

    let magnitude = if out.is_empty() {
        if coeff < 0.0 {
            out.push('-');
        }
        coeff.abs()
    } else {
        out.push_str(if coeff < 0.0 { " - " } else { " + " });
        coeff.abs()
    };

    match symbol {
        Some(symbol) if magnitude == 1.0 => out.push_str(symbol),
        Some(symbol) => {
            out.push_str(&format_number(magnitude));
            out.push('*');
            out.push_str(symbol);
        }
        None => out.push_str(&format_number(magnitude)),
    }
}

/// Combine the row and column lanes of one reference into a buffer offset
pub fn offset_formula(matrix: &str, row: &str, col: &str) -> String {
    match (row, col) {
        ("0", "0") => "0".to_string(),
        ("0", col) => format!("({})", col),
        (row, "0") => format!("({})*{}cols", row, matrix),
        (row, col) => format!("({})*{}cols + ({})", row, matrix, col),
    }
}

/// Rewrite `template` replacing the k-th reference with `name[offsets[k]]`.
///
/// A line break precedes every added term that starts with a reference.
pub fn substitute(template: &Expr, offsets: &[String], matrix: &str) -> KernelResult<String> {
    let mut out = String::new();
    let used = substitute_into(template, offsets, 0, &mut out)
        .ok_or_else(|| reference_count_error(matrix, offsets.len()))?;

    if used != offsets.len() {
        return Err(reference_count_error(matrix, offsets.len()));
    }

    trace!("Substituted template of {}: {}", matrix, out);
    Ok(out)
}

fn reference_count_error(matrix: &str, offsets: usize) -> KernelError {
    KernelError::malformed(
        matrix,
        0,
        0,
        format!("template references do not match {} assembled offsets", offsets),
    )
}

/// Returns the index of the next unused offset, or `None` when they run out
fn substitute_into(expr: &Expr, offsets: &[String], next: usize, out: &mut String) -> Option<usize> {
    match expr {
        Expr::Reference(r) => {
            let offset = offsets.get(next)?;
            out.push_str(&r.matrix);
            out.push('[');
            out.push_str(offset);
            out.push(']');
            Some(next + 1)
        }
        Expr::Literal(v) => {
            out.push_str(&format_number(*v));
            Some(next)
        }
        Expr::Binary { op: BinaryOp::Add, lhs, rhs } => {
            let next = substitute_into(lhs, offsets, next, out)?;
            if matches!(rhs.leftmost(), Expr::Reference(_)) {
                out.push('\n');
            }
            out.push('+');
            substitute_into(rhs, offsets, next, out)
        }
        Expr::Binary { op: BinaryOp::Mul, lhs, rhs } => {
            let next = substitute_operand(lhs, offsets, next, out)?;
            out.push_str(product_separator(rhs));
            substitute_operand(rhs, offsets, next, out)
        }
        Expr::Unary { func, arg } => {
            out.push_str(func.name());
            out.push('(');
            let next = substitute_into(arg, offsets, next, out)?;
            out.push(')');
            Some(next)
        }
    }
}

fn substitute_operand(expr: &Expr, offsets: &[String], next: usize, out: &mut String) -> Option<usize> {
    if expr.is_bare_operand() {
        return substitute_into(expr, offsets, next, out);
    }
    out.push('(');
    let next = substitute_into(expr, offsets, next, out)?;
    out.push(')');
    Some(next)
}
