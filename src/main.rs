use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};
use noodles::bam;
use noodles::bgzf::io::Writer as BgzfWriter;
use roaring::RoaringBitmap;
use std::fs::File;
use std::io::Write;
use std::time::Instant;

#[cfg(not(windows))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use dupsetrs::args::{Args, sort_config};
use dupsetrs::io::{alignment_records, record_to_bytes, toggle_duplicate_flag, write_header};
use dupsetrs::{GroupingIterator, LibraryRegistry, OrderingPolicy};

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .format_timestamp(None)
        .format_target(false)
        .init();

    let total_start = Instant::now();

    let dup_mask = collect_duplicates(&args)?;
    write_output(&args, &dup_mask)?;

    info!("done in {:.1} sec", total_start.elapsed().as_secs_f64());
    Ok(())
}

/// First pass: group the input into duplicate sets and collect the file
/// indices of every record that ends up flagged as a duplicate.
fn collect_duplicates(args: &Args) -> Result<RoaringBitmap> {
    let find_start = Instant::now();
    info!("finding duplicate sets in {}...", args.input);

    let mut reader = bam::io::reader::Builder::default()
        .build_from_path(&args.input)
        .with_context(|| format!("failed to open {}", args.input))?;
    let header = reader.read_header()?;

    let libraries = LibraryRegistry::from_header(&header);
    info!("  {} libraries declared in the header", libraries.len());
    let policy = OrderingPolicy::new(libraries).with_scoring_strategy(args.scoring_strategy);

    let records = alignment_records(reader);
    let mut groups = if args.presorted {
        GroupingIterator::presorted(records, policy)?
    } else {
        GroupingIterator::sorting(records, policy, &sort_config(args))?
    };

    let mut dup_mask = RoaringBitmap::new();
    let mut record_count = 0u64;
    let mut largest_group = 0usize;
    while let Some(group) = groups.next() {
        let members = group?.into_members(groups.policy_mut())?;
        record_count += members.len() as u64;
        largest_group = largest_group.max(members.len());
        for record in members.iter().filter(|r| r.is_duplicate()) {
            let idx = u32::try_from(record.index())
                .context("input has more records than the duplicate mask can index")?;
            dup_mask.insert(idx);
        }
    }

    info!(
        "  {} records in {} duplicate sets (largest {})",
        record_count,
        groups.groups_emitted(),
        largest_group
    );
    info!("  found {} duplicates", dup_mask.len());
    info!(
        "collected duplicate positions in {:.1} sec",
        find_start.elapsed().as_secs_f64()
    );

    Ok(dup_mask)
}

/// Second pass: copy the input, setting the duplicate flag from `dup_mask`.
fn write_output(args: &Args, dup_mask: &RoaringBitmap) -> Result<()> {
    info!(
        "{} duplicates...",
        if args.remove_duplicates { "removing" } else { "marking" }
    );
    let write_start = Instant::now();

    let out_file =
        File::create(&args.output).with_context(|| format!("failed to create {}", args.output))?;
    let mut bgzf_writer = BgzfWriter::new(out_file);

    let mut reader = bam::io::reader::Builder::default().build_from_path(&args.input)?;
    let header = reader.read_header()?;
    write_header(&mut bgzf_writer, &header)?;

    let mut record_count = 0usize;
    let mut removed = 0usize;
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let is_dup = dup_mask.contains(idx as u32);
        if is_dup && args.remove_duplicates {
            removed += 1;
            continue;
        }

        let mut data = record_to_bytes(&header, &record)?;
        toggle_duplicate_flag(&mut data, is_dup);
        bgzf_writer.write_all(&data)?;
        record_count += 1;
    }
    bgzf_writer.finish()?;

    info!(
        "wrote {} records to {} in {:.1} sec",
        record_count,
        args.output,
        write_start.elapsed().as_secs_f64()
    );
    if args.remove_duplicates {
        info!("  removed {} duplicates", removed);
    }
    Ok(())
}
