use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use tac_curve::{
    build_report, normalize, parse_pair, parse_raw, CurveLayout, Params, WindowResult,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Time-activity curve AUC comparison CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the four-window AUC/bias report for a Real/Combined curve pair
    Report(ReportArgs),
    /// Inspect curve text files for parse and normalization issues
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct ReportArgs {
    /// Curve text files: Real then Combined (a single file with --interleaved)
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// First analysis cutoff in minutes
    #[arg(long, default_value_t = 5.0)]
    cutoff_a: f64,

    /// Second analysis cutoff in minutes
    #[arg(long, default_value_t = 10.0)]
    cutoff_b: f64,

    /// Inputs use the historical 4-numbers-per-line interleaved layout
    #[arg(long, action = ArgAction::SetTrue)]
    interleaved: bool,

    /// Emit JSON instead of tab-separated values
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Curve text files to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output report path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Report(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
        Command::Inspect(args) => {
            if args.verbose {
                "debug"
            } else {
                "info"
            }
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Report(args) => handle_report(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn handle_report(args: ReportArgs) -> Result<()> {
    let expected = if args.interleaved { 1 } else { 2 };
    if args.inputs.len() != expected {
        return Err(anyhow!(
            "expected {} input file(s) for this layout, got {}",
            expected,
            args.inputs.len()
        ));
    }
    if !(args.cutoff_a > 0.0 && args.cutoff_a < args.cutoff_b) {
        return Err(anyhow!(
            "cutoffs must satisfy 0 < cutoff-a < cutoff-b, got {} and {}",
            args.cutoff_a,
            args.cutoff_b
        ));
    }

    let params = Params {
        cutoff_a: args.cutoff_a,
        cutoff_b: args.cutoff_b,
        layout: if args.interleaved {
            CurveLayout::Interleaved
        } else {
            CurveLayout::Separate
        },
    };

    let primary = read_input(&args.inputs[0])?;
    let secondary = if args.interleaved {
        None
    } else {
        Some(read_input(&args.inputs[1])?)
    };

    let (real, combined) = parse_pair(&primary, secondary.as_deref(), &params)?;
    log_warnings("Real", &real.warnings);
    log_warnings("Combined", &combined.warnings);
    info!(
        "Parsed curves: Real {} samples (end {} min), Combined {} samples (end {} min)",
        real.curve.len(),
        real.curve.end_time(),
        combined.curve.len(),
        combined.curve.end_time()
    );

    let report = build_report(&real.curve, &combined.curve, &params)?;

    let rendered = if args.json {
        let mut text = serde_json::to_string_pretty(&report)?;
        text.push('\n');
        text.into_bytes()
    } else {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        write_report_rows(&report, &mut writer)?;
        writer
            .into_inner()
            .map_err(|e| anyhow!("failed to finish report output: {}", e))?
    };
    write_output(&args.output, &rendered)?;
    if args.output.as_os_str() != "-" {
        info!("Wrote report: {}", args.output.display());
    }
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let mut report = String::new();

    for path in &args.inputs {
        let text = read_input(path)?;
        let points = parse_raw(&text);
        let (normalized, warnings) = normalize(&points);

        report.push_str(&format!("FILE: {}\n", path.display()));
        report.push_str(&format!("  points: {}\n", points.len()));
        report.push_str(&format!("  unique_times: {}\n", normalized.len()));
        if let (Some(first), Some(last)) = (normalized.first(), normalized.last()) {
            report.push_str(&format!(
                "  time_range_min: {:.3}..{:.3}\n",
                first.time, last.time
            ));
            report.push_str(&format!("  starts_at_zero: {}\n", first.time == 0.0));
        }
        if warnings.is_empty() {
            report.push_str("  warnings: none\n");
        } else {
            report.push_str("  warnings:\n");
            for warning in &warnings {
                report.push_str(&format!("    - {}\n", warning));
            }
        }
        report.push('\n');
    }

    write_output(&args.output, report.as_bytes())?;
    if args.output.as_os_str() != "-" {
        info!("Diagnostic report written: {}", args.output.display());
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if path.as_os_str() == "-" {
        io::stdout().write_all(bytes)?;
        Ok(())
    } else {
        fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn log_warnings(which: &str, warnings: &[String]) {
    for warning in warnings {
        warn!("{} curve: {}", which, warning);
    }
}

fn write_report_rows<W: Write>(rows: &[WindowResult], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["window", "combined_auc", "real_auc", "bias_pct"])?;
    for row in rows {
        writer.write_record([
            row.label.clone(),
            format!("{:.9}", row.combined_auc),
            format!("{:.9}", row.real_auc),
            bias_cell(row.bias_percent),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn bias_cell(bias: Option<f64>) -> String {
    bias.map(|v| format!("{:.9}", v))
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_cell_renders_dash_for_undefined() {
        assert_eq!(bias_cell(None), "-");
        assert_eq!(bias_cell(Some(12.5)), "12.500000000");
    }

    #[test]
    fn report_rows_are_tab_separated_with_fixed_precision() {
        let rows = vec![WindowResult {
            label: "Combined".to_string(),
            combined_auc: 1.0,
            real_auc: 2.0,
            bias_percent: Some(-50.0),
        }];
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        write_report_rows(&rows, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "window\tcombined_auc\treal_auc\tbias_pct\nCombined\t1.000000000\t2.000000000\t-50.000000000\n"
        );
    }
}
