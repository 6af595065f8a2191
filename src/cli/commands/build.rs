use crate::store::StoreWriter;
use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

#[derive(Args)]
pub struct BuildArgs {
    /// Sorted association TSV with a header line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output container path; the index is written alongside
    #[arg(short, long)]
    pub output: PathBuf,
}

pub fn run(args: BuildArgs) -> Result<()> {
    let reader = BufReader::new(
        File::open(&args.input)
            .with_context(|| format!("cannot open {}", args.input.display()))?,
    );
    let mut lines = reader.lines();
    let header = lines
        .next()
        .context("input is empty, expected a header line")??;

    let mut writer = StoreWriter::create(&args.output, &header)?;
    for line in lines {
        writer.write_line(&line?)?;
    }
    let records = writer.finish()?;

    println!(
        "Wrote {} records to {} (index alongside)",
        records,
        args.output.display()
    );
    Ok(())
}
