mod cli;

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use rusty_chroma::report::{self, RunReport};
use rusty_chroma::{AnalysisConfig, Chromatogram};

use cli::{Cli, OutputFormat};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    let config = cli.apply_overrides(config);
    config.validate().context("invalid analysis parameters")?;

    let mut chromatogram = Chromatogram::load(&cli.input)
        .with_context(|| format!("loading trace {}", cli.input.display()))?;
    if let Some(channel) = chromatogram.metadata().channel() {
        info!("channel: {channel}");
    }

    chromatogram
        .detect_peaks(&config.detection)
        .context("detecting peaks")?;
    let rows = chromatogram
        .peak_table(config.flow_rate)
        .context("building peak table")?;

    let run = RunReport::new(&chromatogram, &rows, config.flow_rate);
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_report(&run, cli.format, BufWriter::new(file))?;
            info!("wrote {} peak(s) to {}", rows.len(), path.display());
        }
        None => write_report(&run, cli.format, io::stdout().lock())?,
    }
    Ok(())
}

fn write_report<W: Write>(run: &RunReport<'_>, format: OutputFormat, mut out: W) -> Result<()> {
    match format {
        OutputFormat::Text => {
            out.write_all(report::render_text(run.peaks, run.time_unit).as_bytes())?;
            out.flush()?;
        }
        OutputFormat::Csv => report::write_csv(run.peaks, out).context("writing CSV")?,
        OutputFormat::Json => {
            report::write_json(run, &mut out).context("writing JSON")?;
            writeln!(out)?;
            out.flush()?;
        }
    }
    Ok(())
}
