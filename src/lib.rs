//! Matrix Kernel Generator
//!
//! This library turns a symbolic matrix computation into one compact OpenCL
//! kernel addressed by two thread coordinates. Every output cell is inspected
//! for a shared structural template, the index at every element reference is
//! fitted as an affine function of the output coordinates, and the fitted
//! formulas are substituted back into a single kernel body.
//!
//! # Example
//!
//! ```rust
//! use matrix_kernel_gen::{build_kernel, KernelConfig, NamedMatrix};
//!
//! let a = NamedMatrix::new("A", 10, 10).unwrap();
//! let b = NamedMatrix::new("B", 10, 10).unwrap();
//! let c = a.multiply(&b).unwrap().scalar_add(10.0).unwrap().transpose();
//!
//! let kernel = build_kernel("mmult", &c, &[&a, &b], &KernelConfig::default()).unwrap();
//! println!("{}", kernel);
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod formula;
pub mod inference;
pub mod kernel;
pub mod lexer;
pub mod matrix;
pub mod parser;
pub mod pattern;
pub mod regression;

pub use config::{KernelConfig, OutputStride};
pub use error::{KernelError, KernelResult, Lane};
pub use evaluator::{Evaluation, Evaluator};
pub use expr::{ElementRef, Expr};
pub use inference::{infer, InferredPattern, SlotReport};
pub use kernel::{Kernel, KernelEmitter};
pub use matrix::NamedMatrix;
pub use parser::Parser;
pub use regression::{AffineCoefficients, AffineFit, AffineSolver};

/// Infer the index pattern of `output` and emit the kernel `name` reading
/// from `inputs` (buffer parameters in the given order)
pub fn build_kernel(
    name: &str,
    output: &NamedMatrix,
    inputs: &[&NamedMatrix],
    config: &KernelConfig,
) -> KernelResult<Kernel> {
    let pattern = infer(output, config)?;
    let emitter = KernelEmitter::new(config.clone());
    emitter.emit(name, &pattern, inputs)
}

/// Compile a host program with explicit input shapes into a kernel.
///
/// Inputs are declared in the order given; the last statement is the output.
pub fn compile(
    source: &str,
    shapes: &[(&str, (usize, usize))],
    kernel_name: &str,
    config: &KernelConfig,
) -> KernelResult<Kernel> {
    let program = Parser::new(source)?.parse_program()?;

    let mut evaluator = Evaluator::new();
    for (name, shape) in shapes {
        evaluator.define_matrix(name, *shape)?;
    }
    let evaluation = evaluator.evaluate(&program)?;

    build_kernel(kernel_name, &evaluation.output, &evaluation.input_refs(), config)
}
