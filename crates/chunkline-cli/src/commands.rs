use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use chunkline_store::{FsObjectStore, ObjectStore, StoreSink};
use chunkline_transformer::{ChainReader, ChainSummary, PayloadSizeLimiter, SplitterConfig};
use chunkline_types::{AccessIdentifiers, ContainerId, ObjectHeader, OwnerId};
use colored::Colorize;
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Split(args) => cmd_split(args, format),
        Command::Head(args) => cmd_head(args),
        Command::Cat(args) => cmd_cat(args, format),
        Command::Verify(args) => cmd_verify(args, format),
    }
}

#[derive(Serialize)]
struct SplitReport {
    #[serde(flatten)]
    ids: AccessIdentifiers,
    max_object_size: u64,
    summary: ChainSummary,
}

fn open_store(args: &StoreArgs) -> anyhow::Result<FsObjectStore> {
    FsObjectStore::open(&args.store)
        .with_context(|| format!("opening object store {}", args.store.display()))
}

fn splitter_config(args: &SplitArgs) -> anyhow::Result<SplitterConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SplitterConfig::from_toml_str(&text)?
        }
        None => SplitterConfig::default(),
    };
    if let Some(max) = args.max_size {
        config.max_object_size = max;
    }
    config.validate()?;
    Ok(config)
}

fn logical_header(args: &SplitArgs) -> ObjectHeader {
    let mut header = ObjectHeader::new(
        args.container.unwrap_or_else(|| ContainerId::derive(b"default")),
        args.owner.unwrap_or_default(),
    );
    header.attributes = args.attributes.clone();
    if header.attribute("FileName").is_none() {
        if let Some(name) = args.file.file_name() {
            header = header.with_attribute("FileName", name.to_string_lossy());
        }
    }
    header
}

fn split_file(args: &SplitArgs) -> anyhow::Result<SplitReport> {
    let config = splitter_config(args)?;
    let store: Arc<dyn ObjectStore> = Arc::new(open_store(&args.store)?);
    let file = File::open(&args.file).with_context(|| format!("opening {}", args.file.display()))?;

    let mut limiter = PayloadSizeLimiter::from_config(&config, StoreSink::factory(Arc::clone(&store)))?;
    limiter.write_header(logical_header(args))?;
    limiter.write_from(BufReader::new(file))?;
    let ids = limiter.close()?;

    let summary = ChainReader::new(&*store).verify(&ids.self_id)?;
    Ok(SplitReport {
        ids,
        max_object_size: config.max_object_size,
        summary,
    })
}

fn cmd_split(args: SplitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let report = split_file(&args)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Stored {} ({} bytes)",
        "✓".green().bold(),
        args.file.display().to_string().bold(),
        report.summary.payload_size
    );
    println!("  Id: {}", report.ids.self_id.to_hex().yellow());
    if let Some(parent) = report.ids.parent_id {
        println!("  Parent: {}", parent.to_hex().cyan());
    }
    println!(
        "  Chunks: {} (max {} bytes each)",
        report.summary.chunks.len().to_string().bold(),
        report.max_object_size
    );
    Ok(())
}

fn cmd_head(args: HeadArgs) -> anyhow::Result<()> {
    let store = open_store(&args.store)?;
    let Some(header) = store.head(&args.id)? else {
        bail!("object {} not found in {}", args.id, args.store.store.display());
    };
    println!("{}", serde_json::to_string_pretty(&header)?);
    Ok(())
}

fn cmd_cat(args: CatArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.store)?;
    let reader = ChainReader::new(&store);
    match &args.out {
        Some(path) => {
            let summary = assemble_to_file(&reader, &args, path)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{} Wrote {} bytes to {}",
                    "✓".green().bold(),
                    summary.payload_size,
                    path.display()
                );
            }
        }
        None => {
            reader.assemble_into(&args.id, io::stdout().lock())?;
        }
    }
    Ok(())
}

fn assemble_to_file(
    reader: &ChainReader<'_>,
    args: &CatArgs,
    path: &Path,
) -> anyhow::Result<ChainSummary> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    Ok(reader.assemble_into(&args.id, BufWriter::new(file))?)
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(&args.store)?;
    let summary = ChainReader::new(&store).verify(&args.id)?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} Object {} verified", "✓".green().bold(), args.id.short_hex().yellow());
    match summary.parent {
        Some(parent) => {
            println!("  Split-chain: {} chunks", summary.chunks.len().to_string().bold());
            println!("  Parent: {}", parent.to_hex().cyan());
            for (i, chunk) in summary.chunks.iter().enumerate() {
                println!("    {i:>4} {}", chunk.to_hex().dimmed());
            }
        }
        None => println!("  Single object"),
    }
    println!("  Payload: {} bytes", summary.payload_size);
    println!("  Checksums: {}", "sha256 tz".green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkline_transformer::assemble;
    use chunkline_types::Attribute;

    fn split_args(dir: &Path, data: &[u8], max: u64) -> SplitArgs {
        let file = dir.join("input.bin");
        std::fs::write(&file, data).unwrap();
        SplitArgs {
            file,
            store: StoreArgs {
                store: dir.join("objects"),
            },
            max_size: Some(max),
            config: None,
            container: None,
            owner: None,
            attributes: vec![Attribute::new("Type", "test")],
        }
    }

    #[test]
    fn split_then_assemble_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 97) as u8).collect();
        let args = split_args(dir.path(), &data, 1024);

        let report = split_file(&args).unwrap();
        assert_eq!(report.summary.chunks.len(), 5);
        assert_eq!(report.summary.header.attribute("FileName"), Some("input.bin"));
        assert_eq!(report.summary.header.attribute("Type"), Some("test"));

        let store = open_store(&args.store).unwrap();
        assert_eq!(assemble(&store, &report.ids.self_id).unwrap(), data);
    }

    #[test]
    fn config_file_sets_max_size() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("chunkline.toml");
        std::fs::write(&config, "max_object_size = 10\n").unwrap();

        let mut args = split_args(dir.path(), b"0123456789abcdef", 1);
        args.max_size = None;
        args.config = Some(config);
        assert_eq!(splitter_config(&args).unwrap().max_object_size, 10);

        let report = split_file(&args).unwrap();
        assert_eq!(report.summary.chunks.len(), 2);
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = split_args(dir.path(), b"x", 0);
        assert!(splitter_config(&args).is_err());
    }
}
