//! Argand compiler CLI
//!
//! The `argandc` command reads a source file (or standard input), runs
//! the compilation pipeline and writes the textual IR module to a file
//! (or standard output).

use clap::Parser;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "argandc")]
#[command(version = argand::VERSION)]
#[command(about = "The Argand compiler", long_about = None)]
struct Cli {
    /// Input file to compile; reads standard input if omitted
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file; writes standard output if omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit tokens instead of compiling (for debugging)
    #[arg(long)]
    emit_tokens: bool,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let source = match &cli.input {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| miette::miette!("Failed to read {}: {}", path.display(), e))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| miette::miette!("Failed to read standard input: {}", e))?;
            buffer
        }
    };

    if cli.emit_tokens {
        let tokens = argand::Lexer::new(&source)
            .tokenize()
            .map_err(|e| miette::miette!("{}", e))?;
        for token in tokens {
            println!("{:>4}  {:?}", token.line, token.kind);
        }
        return Ok(());
    }

    let module_name = cli
        .input
        .as_ref()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stdin".to_string());

    let mut sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            fs::File::create(path)
                .map_err(|e| miette::miette!("Failed to create {}: {}", path.display(), e))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    argand::compile(&module_name, &source, &mut sink)
        .map_err(|e| miette::miette!("{}\nCompilation failed!", e))
}
