use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use crossfill::{render_grid, Crossword, FillFailure, Solver, SolverOptions, ValueOrdering};

#[derive(Debug, Parser)]
#[command(about = "Fill a crossword structure with words from a word list")]
struct Cli {
    /// The grid structure: one line per row, `_` for an open cell and `#` for a block.
    structure: PathBuf,

    /// The word list, one word per line.
    words: PathBuf,

    /// If given, the filled grid is also written to this file.
    output: Option<PathBuf>,

    /// The order in which candidate words are tried.
    #[arg(long, value_enum, default_value_t)]
    value_ordering: ValueOrdering,

    /// Re-run arc consistency after every tentative choice.
    #[arg(long)]
    forward_checking: bool,

    /// Don't use the same word twice.
    #[arg(long)]
    distinct: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Cli::parse();

    let structure = fs::read_to_string(&args.structure)
        .with_context(|| format!("Error reading {}", args.structure.display()))?;
    let words = fs::read_to_string(&args.words)
        .with_context(|| format!("Error reading {}", args.words.display()))?;

    let crossword = Crossword::from_text(&structure, &words)
        .with_context(|| format!("Failed to parse structure from {}", args.structure.display()))?;

    let options = SolverOptions {
        value_ordering: args.value_ordering,
        forward_checking: args.forward_checking,
        distinct_words: args.distinct,
    };

    match Solver::new(&crossword, options).solve() {
        Ok(result) => {
            let display_grid = render_grid(&crossword, &result.assignment);
            println!("{}", display_grid);

            if let Some(output) = &args.output {
                fs::write(output, display_grid + "\n")
                    .with_context(|| format!("Unable to write {}", output.display()))?;
                info!("Written filled grid to {}", output.display());
            }
        }
        Err(failure) => {
            if let FillFailure::EmptyDomain { slot_id } = failure {
                info!("No candidates left for {:?}", crossword.slot(slot_id));
            }
            println!("No solution.");
        }
    }

    Ok(())
}
