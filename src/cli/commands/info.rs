use crate::store::block::read_block;
use crate::store::{BinningIndex, DataFile};
use anyhow::Result;
use clap::Args;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;

#[derive(Args)]
pub struct InfoArgs {
    /// Container file to inspect
    #[arg(short, long)]
    pub file: PathBuf,
}

pub fn run(args: InfoArgs) -> Result<()> {
    let id = args
        .file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let data = DataFile::open(&id, &args.file, None, BTreeSet::new())?;

    println!("container:      {}", data.path.display());
    println!("format version: {}", data.format_version);
    println!("columns:        {}", data.header.replace('\t', ", "));

    let mut reader = File::open(&data.path)?;
    let mut offset = data.data_start;
    let mut blocks = 0u64;
    let mut raw_bytes = 0u64;
    while let Some(block) = read_block(&mut reader, &data.id, offset)? {
        blocks += 1;
        raw_bytes += block.payload.len() as u64;
        offset = block.next_offset;
    }
    println!("blocks:         {}", blocks);
    println!("payload bytes:  {}", raw_bytes);

    match BinningIndex::load(&data.index_path, &data.id) {
        Ok(index) => {
            let stats = index.stats();
            println!(
                "index:          {} chromosomes, {} bins, {} chunks",
                stats.chromosomes, stats.bins, stats.chunks
            );
        }
        Err(e) => println!("index:          unavailable ({})", e),
    }
    Ok(())
}
