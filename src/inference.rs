//! Index-pattern inference
//!
//! Runs the canonicalize → extract → fit → assemble → substitute chain over
//! one output matrix and produces the single parametrized formula the kernel
//! emitter consumes.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult, Lane};
use crate::formula::{lane_formula, offset_formula, substitute};
use crate::matrix::NamedMatrix;
use crate::pattern::{canonicalize, extract_occurrences};
use crate::regression::{AffineFit, AffineSolver};

/// Fitted access of one reference slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotReport {
    pub slot: usize,
    /// Matrix referenced at this slot
    pub matrix: String,
    pub row_fit: AffineFit,
    pub col_fit: AffineFit,
    pub row_formula: String,
    pub col_formula: String,
    /// Linear buffer offset combining both lanes
    pub offset: String,
}

/// The single parametrized formula of an output matrix.
///
/// Only [`infer`] constructs this, so holding one means every inference
/// stage succeeded for the matrix it names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferredPattern {
    matrix: String,
    rows: usize,
    cols: usize,
    template: String,
    slots: Vec<SlotReport>,
    formula: String,
}

impl InferredPattern {
    /// Name of the matrix the pattern was inferred from
    pub fn matrix(&self) -> &str {
        &self.matrix
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Index-erased structural template shared by every cell
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn slots(&self) -> &[SlotReport] {
        &self.slots
    }

    /// Representative cell with every reference replaced by its offset
    pub fn formula(&self) -> &str {
        &self.formula
    }
}

/// Infer one affine access per reference slot and substitute them into the
/// representative cell.
pub fn infer(matrix: &NamedMatrix, config: &KernelConfig) -> KernelResult<InferredPattern> {
    let template = canonicalize(matrix).single()?.to_string();
    let occurrences = extract_occurrences(matrix)?;
    let representative = matrix.cell(0, 0);
    let references = representative.references();
    let solver = AffineSolver::new(config);

    let mut slots = Vec::with_capacity(occurrences.slots.len());
    for (k, slot) in occurrences.slots.iter().enumerate() {
        let fit_lane = |lane: Lane| -> KernelResult<AffineFit> {
            let fit = solver.fit(slot.lane(lane), &occurrences.row_coords, &occurrences.col_coords);
            if !fit.fit_succeeded {
                return Err(KernelError::ImperfectFit {
                    matrix: matrix.name().to_string(),
                    slot: k,
                    lane,
                    reference: references[k].to_string(),
                    residual: fit.residual,
                });
            }
            Ok(fit)
        };

        let row_fit = fit_lane(Lane::Row)?;
        let col_fit = fit_lane(Lane::Col)?;
        let row_formula = lane_formula(&row_fit.coefficients, config);
        let col_formula = lane_formula(&col_fit.coefficients, config);
        let offset = offset_formula(&slot.matrix, &row_formula, &col_formula);

        debug!(
            "Slot {} ({}): row = {}, col = {}, offset = {}",
            k, references[k], row_formula, col_formula, offset
        );

        slots.push(SlotReport {
            slot: k,
            matrix: slot.matrix.clone(),
            row_fit,
            col_fit,
            row_formula,
            col_formula,
            offset,
        });
    }

    let offsets: Vec<String> = slots.iter().map(|s| s.offset.clone()).collect();
    let formula = substitute(representative, &offsets, matrix.name())?;

    Ok(InferredPattern {
        matrix: matrix.name().to_string(),
        rows: matrix.rows(),
        cols: matrix.cols(),
        template,
        slots,
        formula,
    })
}
