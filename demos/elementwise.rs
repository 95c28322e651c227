//! Example: Elementwise Chains
//!
//! Compiles host programs that only touch one element per input,
//! including a transposed operand and a column-count output stride.
//!
//! Run with: cargo run --example elementwise

use matrix_kernel_gen::{compile, KernelConfig, OutputStride};

fn main() {
    println!("=== Elementwise Kernel Examples ===\n");

    let programs = [
        ("scale", "C = np.exp(A) * 2", vec![("A", (3, 5))]),
        ("blend", "C = np.log(A + B.T) - 1", vec![("A", (4, 2)), ("B", (2, 4))]),
    ];

    for stride in [OutputStride::Rows, OutputStride::Cols] {
        let config = KernelConfig::new("float", stride);

        for (name, source, shapes) in &programs {
            println!("Program: {}  ({:?} stride)", source, stride);

            match compile(source, shapes, name, &config) {
                Ok(kernel) => {
                    println!("Output shape: {:?}", kernel.output_shape);
                    println!("Template: {}\n", kernel.template);
                    println!("{}", kernel);
                }
                Err(e) => println!("Error: {}\n", e),
            }
        }
    }

    // Matrices of different sizes cannot be added
    let config = KernelConfig::default();
    let shapes = [("A", (2, 3)), ("B", (3, 2))];
    match compile("A + B", &shapes, "bad", &config) {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Expected failure: {}", e),
    }
}
