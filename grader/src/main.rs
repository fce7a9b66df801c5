use std::{
    io::{self, Read},
    path::PathBuf,
    process,
};

use clap::{Parser, Subcommand};
use grader::{GradeConfig, Grader};
use tracing_subscriber::EnvFilter;

/// Grade LaTeX answers by numeric evaluation.
#[derive(Parser)]
#[command(name = "grader", version, about = "Grade LaTeX answers by numeric evaluation")]
struct Cli {
    /// JSON file with grading settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for the parameter draws (overrides the config file)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and evaluate one boxed answer
    Parse {
        /// The LaTeX answer, e.g. '\boxed{x^2+1}'
        latex: String,
        /// Declared parameters, e.g. 'x, a, b'
        #[arg(long, default_value = "")]
        parameters: String,
    },

    /// Check a model response against a reference solution
    Eval {
        /// The reference answer in LaTeX
        #[arg(long)]
        solution: String,
        /// The model response text, or '-' to read it from stdin
        #[arg(long)]
        response: String,
        /// Declared parameters, e.g. 'x, a, b'
        #[arg(long, default_value = "")]
        parameters: String,
    },
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GradeConfig::load(path).unwrap_or_else(|e| fail(format!("{}: {e}", path.display()))),
        None => GradeConfig::default(),
    };
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    let mut grader = Grader::from_config(config);

    let json = match cli.command {
        Commands::Parse { latex, parameters } => {
            serde_json::to_string_pretty(&grader.parse(&latex, &parameters))
        }
        Commands::Eval {
            solution,
            response,
            parameters,
        } => {
            let response = if response == "-" {
                let mut text = String::new();
                if let Err(e) = io::stdin().read_to_string(&mut text) {
                    fail(format!("cannot read response from stdin: {e}"));
                }
                text
            } else {
                response
            };
            serde_json::to_string_pretty(&grader.evaluate_equivalence(&solution, &response, &parameters))
        }
    };

    match json {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}
