use std::path::PathBuf;

use chunkline_types::{Attribute, ContainerId, ObjectId, OwnerId};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chunkline",
    about = "Split large payloads into size-bounded, checksummed objects",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Split a file into objects and store them
    Split(SplitArgs),
    /// Print an object header as JSON
    Head(HeadArgs),
    /// Reassemble a payload from its id
    Cat(CatArgs),
    /// Verify an object or split-chain
    Verify(VerifyArgs),
}

#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    /// Object store directory
    #[arg(long, default_value = ".chunkline")]
    pub store: PathBuf,
}

#[derive(Args)]
pub struct SplitArgs {
    pub file: PathBuf,
    #[command(flatten)]
    pub store: StoreArgs,
    /// Maximum payload bytes per object (overrides --config)
    #[arg(long)]
    pub max_size: Option<u64>,
    /// TOML splitter configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Container id (hex)
    #[arg(long)]
    pub container: Option<ContainerId>,
    /// Owner id (hex)
    #[arg(long)]
    pub owner: Option<OwnerId>,
    /// Header attribute, repeatable
    #[arg(long = "attr", value_name = "KEY=VALUE", value_parser = parse_attribute)]
    pub attributes: Vec<Attribute>,
}

#[derive(Args)]
pub struct HeadArgs {
    pub id: ObjectId,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct CatArgs {
    pub id: ObjectId,
    #[command(flatten)]
    pub store: StoreArgs,
    /// Write the payload here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub id: ObjectId,
    #[command(flatten)]
    pub store: StoreArgs,
}

fn parse_attribute(s: &str) -> Result<Attribute, String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok(Attribute::new(key, value)),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}
