use crate::cli::Commands;
use crate::config::{IngestConfig, StatsFormat};
use crate::ingest::{run_source, ExporterInfo, PipelineOptions, SourceReport};
use crate::metrics::StatsExporter;
use crate::render::render_record;
use crate::storage::read_block_file;
use crate::Result;
use flowrec_common::V3_RECORD_TYPE;
use std::path::Path;
use tracing::{info, warn};

pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Ingest {
            config,
            format,
            print_records,
        } => handle_ingest(&config, format, print_records).await,
        Commands::Dump { file } => handle_dump(&file),
    }
}

async fn handle_ingest(
    path: &Path,
    format: Option<StatsFormat>,
    print_records: bool,
) -> Result<()> {
    let config = IngestConfig::from_file(path)?;
    let options = PipelineOptions {
        print_records: print_records || config.print_records,
    };
    info!(
        "Ingesting {} sources, block capacity {} bytes",
        config.sources.len(),
        config.block_capacity
    );

    let tasks = config.sources.iter().cloned().map(|source| {
        let capacity = config.block_capacity;
        tokio::task::spawn_blocking(move || run_source(&source, capacity, options))
    });

    let mut reports = Vec::new();
    for (result, source) in futures::future::join_all(tasks)
        .await
        .into_iter()
        .zip(&config.sources)
    {
        match result? {
            Ok(report) => reports.push(report),
            Err(e) => warn!("[{}] Source failed: {}", source.ident, e),
        }
    }

    println!(
        "{}",
        format_reports(&reports, format.unwrap_or(config.stats_format))?
    );
    Ok(())
}

pub fn format_reports(reports: &[SourceReport], format: StatsFormat) -> Result<String> {
    match format {
        StatsFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
        StatsFormat::Prometheus => {
            let exporter = StatsExporter::new()?;
            for report in reports {
                exporter.observe(&report.ident, &report.stats);
            }
            exporter.encode()
        }
    }
}

fn handle_dump(path: &Path) -> Result<()> {
    let blocks = read_block_file(path)?;
    info!("{}: {} blocks", path.display(), blocks.len());

    for block in &blocks {
        for record in block.records() {
            let record = record?;
            match record.record_type {
                V3_RECORD_TYPE => println!("{}", render_record(record.bytes)?),
                ExporterInfo::RECORD_TYPE => {
                    let exporter = ExporterInfo::parse(record.bytes)?;
                    println!(
                        "Exporter: SysID {}, version {}, IP {}\n",
                        exporter.sysid, exporter.version, exporter.ip
                    );
                }
                other => println!("Record type {}: {} bytes\n", other, record.bytes.len()),
            }
        }
    }
    Ok(())
}
