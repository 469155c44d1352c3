pub mod commands;

use crate::config::StatsFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flowrec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ingest pcapd flow exports into V3 record block files", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Replay pcapd captures into block files")]
    Ingest {
        #[arg(short, long, help = "Path to the YAML configuration")]
        config: PathBuf,

        #[arg(short, long, value_enum, help = "Statistics output format")]
        format: Option<StatsFormat>,

        #[arg(short, long, help = "Log every forwarded record")]
        print_records: bool,
    },
    #[command(about = "Print the records of a block file")]
    Dump {
        #[arg(help = "Block file written by ingest")]
        file: PathBuf,
    },
}
