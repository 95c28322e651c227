//! Kernel source emission
//!
//! Wraps an inferred formula into a complete OpenCL C kernel: dimension
//! constants, the buffer parameter list, the thread coordinate bindings and
//! the single output assignment.

use std::fmt;
use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::inference::{InferredPattern, SlotReport};
use crate::matrix::{is_identifier, NamedMatrix};

/// Indentation of statements in the kernel body
const INDENT: &str = "    ";

/// A `#define NAME VALUE` dimension constant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Define {
    pub name: String,
    pub value: usize,
}

/// A generated kernel and the inference results behind it
#[derive(Debug, Clone, Serialize)]
pub struct Kernel {
    pub name: String,
    /// Complete kernel source text
    pub source: String,
    pub defines: Vec<Define>,
    /// Buffer parameter names in declaration order, output last
    pub parameters: Vec<String>,
    pub output_shape: (usize, usize),
    /// Index-erased template shared by every output cell
    pub template: String,
    /// Right-hand side of the output assignment
    pub formula: String,
    pub slots: Vec<SlotReport>,
}

impl Kernel {
    /// Export the kernel and its inference report as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the kernel source to `path`, replacing any existing file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> KernelResult<()> {
        let path = path.as_ref();
        fs::write(path, &self.source).map_err(|source| KernelError::WriteFailure {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote kernel {} to {}", self.name, path.display());
        Ok(())
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Emits kernel source from inferred patterns
pub struct KernelEmitter {
    config: KernelConfig,
}

impl KernelEmitter {
    pub fn new(config: KernelConfig) -> Self {
        Self { config }
    }

    /// Emit the kernel `name` computing `pattern` from `inputs`.
    ///
    /// Inputs become buffer parameters in the given order; every matrix the
    /// formula reads must be among them.
    pub fn emit(&self, name: &str, pattern: &InferredPattern, inputs: &[&NamedMatrix]) -> KernelResult<Kernel> {
        self.validate(name, pattern, inputs)?;
        let config = &self.config;
        let (out_rows, out_cols) = pattern.shape();

        let mut defines = Vec::with_capacity(2 * inputs.len() + 2);
        for input in inputs {
            defines.push(Define {
                name: format!("{}rows", input.name()),
                value: input.rows(),
            });
            defines.push(Define {
                name: format!("{}cols", input.name()),
                value: input.cols(),
            });
        }
        defines.push(Define {
            name: format!("{}rows", config.output_name),
            value: out_rows,
        });
        defines.push(Define {
            name: format!("{}cols", config.output_name),
            value: out_cols,
        });

        let mut parameters: Vec<String> = inputs.iter().map(|m| m.name().to_string()).collect();
        parameters.push(config.output_name.clone());

        let mut source = String::new();
        for define in &defines {
            source.push_str(&format!("#define {} {}\n", define.name, define.value));
        }
        source.push('\n');

        source.push_str(&format!("{} void {}(\n", config.kernel_qualifier, name));
        let params: Vec<String> = parameters
            .iter()
            .map(|p| format!("{}{} {}* {}", INDENT, config.address_space, config.element_type, p))
            .collect();
        source.push_str(&params.join(",\n"));
        source.push_str(")\n{\n");

        for (dim, coord) in config.coordinate_names.iter().enumerate() {
            source.push_str(&format!("{}int {} = get_global_id({});\n", INDENT, coord, dim));
        }

        let body_indent = format!("\n{}{}", INDENT, INDENT);
        source.push_str(&format!(
            "{}{}[{}*{} + {}] ={}{};\n}}\n",
            INDENT,
            config.output_name,
            config.row_coordinate(),
            config.output_stride_define(),
            config.col_coordinate(),
            body_indent,
            pattern.formula().replace('\n', &body_indent),
        ));

        info!(
            "Emitted kernel {} for {} ({} reference slots)",
            name,
            pattern.matrix(),
            pattern.slots().len()
        );

        Ok(Kernel {
            name: name.to_string(),
            source,
            defines,
            parameters,
            output_shape: pattern.shape(),
            template: pattern.template().to_string(),
            formula: pattern.formula().to_string(),
            slots: pattern.slots().to_vec(),
        })
    }

    fn validate(&self, name: &str, pattern: &InferredPattern, inputs: &[&NamedMatrix]) -> KernelResult<()> {
        if !is_identifier(name) {
            return Err(KernelError::invalid_op(format!(
                "'{}' is not a valid kernel name",
                name
            )));
        }

        for (k, input) in inputs.iter().enumerate() {
            if input.name() == self.config.output_name {
                return Err(KernelError::invalid_op(format!(
                    "input '{}' collides with the output buffer",
                    input.name()
                )));
            }
            if !is_identifier(input.name()) {
                return Err(KernelError::invalid_op(format!(
                    "input '{}' is not a valid buffer name",
                    input.name()
                )));
            }
            if inputs[..k].iter().any(|other| other.name() == input.name()) {
                return Err(KernelError::invalid_op(format!(
                    "input '{}' is declared twice",
                    input.name()
                )));
            }
        }

        for slot in pattern.slots() {
            if !inputs.iter().any(|m| m.name() == slot.matrix) {
                return Err(KernelError::undefined(slot.matrix.clone()));
            }
        }

        Ok(())
    }
}
