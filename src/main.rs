use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storygen::Grammar;

/// Procedural text generator driven by declarative JSON grammars
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the grammar JSON file
    #[arg(help = "Path to the grammar JSON file")]
    grammar_file: Option<PathBuf>,

    /// The starting symbol
    #[arg(help = "Starting symbol", default_value = "origin")]
    start_symbol: Option<String>,

    /// Number of texts to generate
    #[arg(help = "Number of texts to generate", default_value = "1")]
    count: Option<usize>,

    /// Seed for deterministic output
    #[arg(long, help = "Seed for deterministic output")]
    seed: Option<u64>,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example grammar file
    Example {
        /// Output file path
        #[arg(help = "Output file path")]
        output: Option<PathBuf>,
    },
}

const EXAMPLE_GRAMMAR: &str = r#"{
  "origin": ["{name.capitalize} found {animal.a} by the {place}."],
  "name": ["avery", "juno", "mira"],
  "animal": ["owl", "fox(40)", "unicorn(10)"],
  "place": ["river", "mountain", "old mill"]
}
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Commands::Example { output }) = cli.command {
        let output_path = output.unwrap_or_else(|| PathBuf::from("example_grammar.json"));
        std::fs::write(&output_path, EXAMPLE_GRAMMAR)?;
        println!("Created example grammar at: {}", output_path.display());
        return Ok(());
    }

    let grammar_file = cli.grammar_file.ok_or("Grammar file path required")?;
    let start_symbol = cli.start_symbol.unwrap_or_else(|| "origin".to_string());
    let count = cli.count.unwrap_or(1);

    println!("Loading grammar from {}...", grammar_file.display());
    let mut grammar = Grammar::from_json_file(&grammar_file)?;

    if let Some(seed) = cli.seed {
        grammar.set_seed(seed);
    }

    println!("Generating {} random samples:\n", count);

    for i in 0..count {
        let generated = grammar.flatten_from(&start_symbol)?;
        println!("{}. {}", i + 1, generated);
    }

    Ok(())
}
