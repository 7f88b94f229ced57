//! ssm CLI tool
//!
//! Command-line interface for compiling bible Markdown into SSM.
//!
//! ## Commands
//!
//! - `compile <input>`: One-shot compile, SSM to stdout or `-o`, diagnostics to stderr

use clap::{Parser, Subcommand};
use ssm_compiler::{
    codec::{CompileOptions, DocumentCompiler},
    config::CompilerConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ssm")]
#[command(author, version, about = "Compile Markdown reference documents into Structured Semantic Markup", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one Markdown document and report diagnostics
    Compile {
        /// Path to the Markdown document
        input: PathBuf,

        /// Where to write the SSM output (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Namespace of the document, used for redaction exemptions
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Leave secrets unredacted
        #[arg(long)]
        no_redact: bool,

        /// Configuration file path (TOML or YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Exit with a failure status when any ERROR diagnostic is reported
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            namespace,
            no_redact,
            config,
            strict,
        } => {
            let config = match config {
                Some(path) => CompilerConfig::from_path(path)?,
                None => CompilerConfig::default(),
            };
            let compiler = DocumentCompiler::new(config)?;
            let options = CompileOptions {
                namespace,
                redaction_enabled: !no_redact,
            };

            let bytes = std::fs::read(&input)?;
            let result = compiler.compile_bytes(&bytes, &options)?;

            for diagnostic in result.diagnostics.iter() {
                eprintln!("{diagnostic}");
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, &result.ssm_text)?;
                    tracing::info!("Wrote {} blocks to {}", result.blocks.len(), path.display());
                }
                None => print!("{}", result.ssm_text),
            }

            let errors = result.errors().count();
            if strict && errors > 0 {
                eprintln!(
                    "{}: {errors} error diagnostic(s) in strict mode",
                    input.display()
                );
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
