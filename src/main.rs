use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use crossword_csp::{
    load_grid_config, load_word_list, render_grid, solve_with_domains, Domains, FillOptions,
};
use log::info;

/// Fill a crossword grid structure with words from a word list.
#[derive(Parser, Debug)]
#[command(name = "crossword-csp", version, about)]
struct Cli {
    /// Grid structure file, `_` for fillable cells and anything else for blocks.
    structure: PathBuf,

    /// Word list file, one word per line.
    words: PathBuf,

    /// Write the first solution to this file.
    output: Option<PathBuf>,

    /// Print every solution instead of stopping at the first one.
    #[arg(long)]
    all: bool,

    /// Stop searching after this many solutions.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let grid_config = load_grid_config(&cli.structure)?;
    let word_list = load_word_list(&cli.words)?;
    info!(
        "Loaded {} slots from {} and {} words from {}",
        grid_config.slot_count(),
        cli.structure.display(),
        word_list.len(),
        cli.words.display()
    );

    // Without --all there's no point searching past the first fill.
    let options = FillOptions {
        solution_limit: cli.limit.or(if cli.all { None } else { Some(1) }),
    };

    let result = solve_with_domains(
        &grid_config,
        &word_list,
        Domains::from_word_list(&grid_config, &word_list),
        &options,
    );
    info!("{:?}", result.statistics);

    let Some(first) = result.solutions.first() else {
        println!("No solution.");
        return Ok(());
    };

    if cli.all {
        for (idx, solution) in result.solutions.iter().enumerate() {
            println!("Solution {}:", idx + 1);
            println!("{}", render_grid(&grid_config, &word_list, solution));
            println!();
        }
    } else {
        println!("{}", render_grid(&grid_config, &word_list, first));
    }

    if let Some(output) = &cli.output {
        let mut rendered = render_grid(&grid_config, &word_list, first);
        rendered.push('\n');

        fs::write(output, rendered)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Wrote solution to {}", output.display());
    }

    Ok(())
}
