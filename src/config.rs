//! Configuration of the generated kernel source and the index solver

use serde::{Deserialize, Serialize};

/// Stride used to linearize the output coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStride {
    /// `global_id_0*outputrows + global_id_1`, the layout of existing kernels
    Rows,
    /// `global_id_0*outputcols + global_id_1`, plain row-major
    Cols,
}

impl OutputStride {
    /// Suffix of the output dimension constant used as the stride
    pub fn suffix(self) -> &'static str {
        match self {
            OutputStride::Rows => "rows",
            OutputStride::Cols => "cols",
        }
    }
}

/// Configuration for kernel generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Element type of every buffer
    pub element_type: String,
    /// Address space qualifier of every buffer
    pub address_space: String,
    /// Function qualifier of the kernel entry point
    pub kernel_qualifier: String,
    /// Name of the output buffer and prefix of its dimension constants
    pub output_name: String,
    /// Names bound to dimension 0 and 1 of the thread coordinate
    pub coordinate_names: [String; 2],
    pub output_stride: OutputStride,
    /// Largest sum of squared residuals accepted from the least-squares fit
    pub residual_tolerance: f64,
    /// Decimal digits kept when rounding fitted coefficients
    pub rounding_decimals: i32,
}

impl KernelConfig {
    pub fn new(element_type: &str, output_stride: OutputStride) -> Self {
        Self {
            element_type: element_type.to_string(),
            output_stride,
            ..Self::opencl()
        }
    }

    /// OpenCL C defaults
    pub fn opencl() -> Self {
        Self {
            element_type: "float".to_string(),
            address_space: "__global".to_string(),
            kernel_qualifier: "__kernel".to_string(),
            output_name: "output".to_string(),
            coordinate_names: ["global_id_0".to_string(), "global_id_1".to_string()],
            output_stride: OutputStride::Rows,
            residual_tolerance: 1e-4,
            rounding_decimals: 8,
        }
    }

    pub fn row_coordinate(&self) -> &str {
        &self.coordinate_names[0]
    }

    pub fn col_coordinate(&self) -> &str {
        &self.coordinate_names[1]
    }

    /// Dimension constant linearizing the output, e.g. `outputrows`
    pub fn output_stride_define(&self) -> String {
        format!("{}{}", self.output_name, self.output_stride.suffix())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::opencl()
    }
}
