use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use smallcc::{generate, output_path, parse, tokenize_file, CompileResult, WriteOutputSnafu};
use snafu::ResultExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file to compile
    input: PathBuf,
    /// Where to write the assembly (default: input with its last character replaced by `s`)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Do not echo the assembly to stdout
    #[arg(short, long)]
    quiet: bool,
    #[arg(long)]
    dump_tokens: bool,
    #[arg(long)]
    dump_ast: bool,
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[ERROR]: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> CompileResult<()> {
    let tokens = tokenize_file(&args.input)?;
    if args.dump_tokens {
        for tok in &tokens {
            println!("{tok}");
        }
    }

    let program = parse(tokens)?;
    if args.dump_ast {
        print!("{program}");
    }

    let asm = generate(&program)?;
    if !args.quiet {
        print!("{asm}");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| output_path(&args.input));
    fs::write(&output, &asm).context(WriteOutputSnafu { path: &output })?;
    info!(output = %output.display(), "wrote assembly");

    Ok(())
}
