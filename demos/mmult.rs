//! Example: Transposed Matrix Product with Offset
//!
//! Builds `C = (A @ B + 10).T` over two 10x10 inputs, infers the index
//! pattern of every output cell, and writes one OpenCL kernel.
//!
//! Run with: cargo run --example mmult

use matrix_kernel_gen::{build_kernel, KernelConfig, KernelResult, NamedMatrix};

fn main() -> KernelResult<()> {
    println!("=== Matrix Product Kernel Example ===\n");

    let a = NamedMatrix::new("A", 10, 10)?;
    let b = NamedMatrix::new("B", 10, 10)?;
    println!("{}", a.summary());
    println!("{}\n", b.summary());

    let c = a.multiply(&b)?.scalar_add(10.0)?.transpose();
    println!("{}", c.summary());
    println!("C[0,0] = {}\n", c.cell(0, 0));

    let kernel = build_kernel("mmult", &c, &[&a, &b], &KernelConfig::default())?;

    println!("Inferred {} reference slot(s)", kernel.slots.len());
    for slot in kernel.slots.iter().take(2) {
        println!(
            "  slot {} ({}): row = {}, col = {}",
            slot.slot, slot.matrix, slot.row_formula, slot.col_formula
        );
    }
    println!();

    println!("Generated kernel:");
    println!("{}", "-".repeat(50));
    println!("{}", kernel);

    kernel.write_to_file("matmultTestKernel.kernel")?;
    println!("Wrote matmultTestKernel.kernel");

    Ok(())
}
