mod utils;

use crate::utils::*;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pyramid_common::{action::format_actions, board::Board};
use pyramid_solver::SolveOptions;

use std::{
    io::{IsTerminal, Read, stdin},
    path::PathBuf,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Deal a shuffled deck from this seed
    #[arg(short, long, value_name = "SEED")]
    seed: Option<u32>,
    /// Max states to explore (~1 GB per 16 million states)
    #[arg(short, long, default_value_t = 100_000_000, value_name = "NUM")]
    max_states: u64,
    /// Explore every path, even through states already visited
    #[arg(long)]
    no_memo: bool,
    /// Preview the deal without solving
    #[arg(short, long)]
    preview: bool,
    /// Describe each move instead of printing the compact notation
    #[arg(long)]
    steps: bool,
    /// Path to a file holding the 52 cards of the deal (e.g. "jd 6h 4c ...")
    file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let Cli {
        seed,
        max_states,
        no_memo,
        preview,
        steps,
        file,
    } = Cli::parse();

    let board = if let Some(file) = file {
        let content = std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read '{}'", file.display()))?;
        Board::parse(&content).context("Failed to parse deal")?
    } else if let Some(seed) = seed {
        log::info!("dealing from seed {seed}");
        Board::new_from_seed(seed)
    } else if !stdin().is_terminal() {
        let mut content = String::new();
        stdin()
            .read_to_string(&mut content)
            .context("Failed to read from stdin")?;
        Board::parse(&content).context("Failed to parse deal")?
    } else {
        bail!("No deal `file` or `--seed` provided.");
    };
    if preview {
        println!("{}", board.pretty_print());
        return Ok(());
    }

    let options = SolveOptions {
        max_states,
        memoize: !no_memo,
    };
    let actions = do_solve(board.clone(), options)?;
    if steps {
        print_steps(board, &actions)?;
    } else {
        println!("{}", format_actions(&actions));
    }

    Ok(())
}
