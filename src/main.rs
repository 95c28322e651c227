//! Matrix Kernel Generator CLI
//!
//! Usage:
//!   matgen "C = (A @ B + 10).T" --shape A=10x10 --shape B=10x10 -k mmult
//!   matgen -f program.mat -s A=4x4 -o scale.kernel
//!   matgen "np.exp(A) * 2" -s A=3x5 --json

use clap::Parser as ClapParser;
use colored::Colorize;
use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use matrix_kernel_gen::{compile, Kernel, KernelConfig, OutputStride};

#[derive(ClapParser, Debug)]
#[command(name = "matgen")]
#[command(version = "0.1.0")]
#[command(about = "Generates compact OpenCL kernels from symbolic matrix expressions")]
struct Args {
    /// Matrix program to compile (e.g., "C = (A @ B + 10).T")
    #[arg(value_name = "EXPR")]
    expression: Option<String>,

    /// Read the program from file
    #[arg(short = 'f', long = "file")]
    input_file: Option<String>,

    /// Declare an input matrix (e.g., "A=3x4"); order sets the parameter order
    #[arg(short = 's', long = "shape", value_parser = parse_shape, required = true)]
    shapes: Vec<(String, (usize, usize))>,

    /// Name of the generated kernel function
    #[arg(short = 'k', long = "kernel-name", default_value = "kernel")]
    kernel_name: String,

    /// Write the kernel source to this file (overwrites)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Linearize the output with its column count instead of its row count
    #[arg(long = "cols-stride")]
    cols_stride: bool,

    /// Buffer element type
    #[arg(long = "element-type", default_value = "float")]
    element_type: String,

    /// Print the kernel and inference report as JSON
    #[arg(short = 'j', long = "json")]
    json_output: bool,

    /// Verbose output (repeat for more detail)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_shape(s: &str) -> Result<(String, (usize, usize)), String> {
    let (name, dims) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid shape format: {}", s))?;

    let (rows, cols) = dims
        .split_once('x')
        .ok_or_else(|| format!("Invalid dimensions: {}", dims))?;

    let rows = rows
        .parse::<usize>()
        .map_err(|_| format!("Invalid row count: {}", rows))?;
    let cols = cols
        .parse::<usize>()
        .map_err(|_| format!("Invalid col count: {}", cols))?;

    Ok((name.to_string(), (rows, cols)))
}

fn main() -> ExitCode {
    let args = Args::parse();

    // warnings by default, -v for info, -vv for debug, -vvv for trace
    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .module("matrix_kernel_gen")
        .verbosity(1 + args.verbose as usize)
        .init()
    {
        eprintln!("{}: Failed to initialise logging: {}", "Warning".yellow(), e);
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}: {}", "Error".red(), message);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), String> {
    // Get program from argument, file, or stdin
    let source = if let Some(expr) = &args.expression {
        expr.clone()
    } else if let Some(file) = &args.input_file {
        fs::read_to_string(file).map_err(|e| format!("Failed to read file '{}': {}", file, e))?
    } else {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        buffer
    };

    let stride = if args.cols_stride {
        OutputStride::Cols
    } else {
        OutputStride::Rows
    };
    let config = KernelConfig::new(&args.element_type, stride);

    let shapes: Vec<(&str, (usize, usize))> = args
        .shapes
        .iter()
        .map(|(name, shape)| (name.as_str(), *shape))
        .collect();

    if args.verbose > 0 {
        println!("{}", "Matrix Kernel Generator".bold().blue());
        println!("{}", "=".repeat(35));
        println!("{}: {}", "Input".green(), source.trim());
        for (name, (rows, cols)) in &shapes {
            println!("{}: {} [{} x {}]", "Matrix".green(), name, rows, cols);
        }
        println!();
    }

    let kernel = compile(&source, &shapes, &args.kernel_name, &config)
        .map_err(|e| format!("Compilation failed: {}", e))?;

    if let Some(path) = &args.output {
        kernel.write_to_file(path).map_err(|e| e.to_string())?;
    }

    if args.json_output {
        let json = kernel
            .to_json()
            .map_err(|e| format!("Failed to serialize to JSON: {}", e))?;
        println!("{}", json);
    } else if args.output.is_none() || args.verbose > 0 {
        print_kernel(&kernel, args.verbose > 0);
    } else if let Some(path) = &args.output {
        println!("{} {} -> {}", "Wrote".green(), kernel.name.bold(), path);
    }

    Ok(())
}

fn print_kernel(kernel: &Kernel, verbose: bool) {
    if verbose {
        println!("{}", "Inference Results".bold().green());
        println!("{}", "-".repeat(50));
        println!("{}: {:?}", "Output shape".cyan(), kernel.output_shape);
        println!("{}: {}", "Template".cyan(), kernel.template);
        for slot in &kernel.slots {
            println!(
                "  {} {} ({}): row = {}, col = {}",
                "Slot".bold(),
                slot.slot,
                slot.matrix,
                slot.row_formula,
                slot.col_formula
            );
        }
        println!();
    }

    println!("{}", kernel.source);
}
