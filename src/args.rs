// Command-line argument parsing
use clap::Parser;

use crate::scoring::ScoringStrategy;
use crate::sort::{DEFAULT_MAX_RECORDS_IN_RAM, SortConfig};

#[derive(Parser, Debug)]
#[command(name = "dupsetrs", about = "Group BAM records into duplicate sets and flag duplicates")]
pub struct Args {
    #[arg(short, long)]
    pub input: String,
    #[arg(short, long)]
    pub output: String,
    /// Drop duplicate records instead of flagging them
    #[arg(short = 'r', long)]
    pub remove_duplicates: bool,
    /// Records held in memory before spilling a sorted chunk to disk
    #[arg(long, default_value_t = DEFAULT_MAX_RECORDS_IN_RAM)]
    pub max_records_in_ram: usize,
    #[arg(long)]
    pub tmp_dir: Option<std::path::PathBuf>,
    /// Input is already in duplicate order; skip the external sort
    #[arg(long)]
    pub presorted: bool,
    #[arg(long, value_enum, default_value_t = ScoringStrategy::TotalMappedReferenceLength)]
    pub scoring_strategy: ScoringStrategy,
    #[arg(short, long)]
    pub verbose: bool,
}

/// Sorter configuration from the spill-related arguments
pub fn sort_config(args: &Args) -> SortConfig {
    let config = SortConfig::new().max_records_in_ram(args.max_records_in_ram);
    match &args.tmp_dir {
        Some(dir) => config.tmp_dir(dir.clone()),
        None => config,
    }
}
