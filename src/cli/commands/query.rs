use crate::dataset::{Dataset, DatasetConfig};
use crate::genome::{GenomicRange, Variant};
use crate::query::{QueryPlanner, QueryRequest};
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct QueryArgs {
    /// Dataset configuration (TOML)
    #[arg(short, long, env = "PHELIX_CONFIG")]
    pub config: PathBuf,

    /// Coordinate range, e.g. 1:1000000-2000000
    #[arg(long, conflicts_with_all = ["variant", "gene"])]
    pub region: Option<String>,

    /// Single variant, e.g. 1:12345:A:T
    #[arg(long, conflicts_with = "gene")]
    pub variant: Option<String>,

    /// Gene symbol resolved via the configured gene table
    #[arg(long)]
    pub gene: Option<String>,

    /// Bases added on both sides of a gene range
    #[arg(long, default_value_t = 0)]
    pub padding: u32,

    /// Comma-separated phenotype codes
    #[arg(short, long)]
    pub phenotypes: String,

    #[arg(long, default_value_t = 100)]
    pub page_size: usize,

    /// Continuation token from a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Emit the full response as JSON instead of TSV
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let config = DatasetConfig::load(&args.config)?;
    let dataset = Dataset::open(config)?;

    let phenotypes: Vec<String> = args
        .phenotypes
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();

    let mut request = if let Some(variant) = &args.variant {
        let variant: Variant = variant.parse()?;
        QueryRequest::for_variant(&variant, phenotypes)
    } else if let Some(gene) = &args.gene {
        let range = dataset.gene_range(gene, args.padding)?;
        QueryRequest::over_range(range, phenotypes)
    } else if let Some(region) = &args.region {
        QueryRequest::over_range(GenomicRange::parse(region)?, phenotypes)
    } else {
        bail!("one of --region, --variant, or --gene is required");
    };
    request = request.with_page_size(args.page_size);
    if let Some(cursor) = &args.cursor {
        request = request.with_cursor(cursor.clone());
    }

    let response = QueryPlanner::new(&dataset).execute(&request)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    for record in &response.records {
        println!("{}", record.to_tsv());
    }
    if !response.incomplete_sources.is_empty() {
        eprintln!("# incomplete sources: {}", response.incomplete_sources.join(","));
    }
    match &response.next_cursor {
        Some(cursor) => eprintln!("# next cursor: {}", cursor),
        None => eprintln!("# end of results"),
    }
    Ok(())
}
