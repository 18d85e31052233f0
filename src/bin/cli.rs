#![cfg(not(tarpaulin_include))]

use clap::Parser;
use daily_report::downloader::{self, ExportFormat};
use daily_report::loader::load_records;
use daily_report::metrics::BetRule;
use daily_report::progress::Stage;
use daily_report::report::build_report;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Build the daily user activity report for a spreadsheet on disk
#[derive(Parser, Debug)]
#[command(name = "report-cli", version)]
struct Args {
    /// Daily export (.xlsx, .xls, .xlsm, .xlsb, .ods, .csv)
    file: PathBuf,

    #[arg(long, value_enum, default_value_t = BetRule::Flag)]
    bet_rule: BetRule,

    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Write both detail tables as XLSX into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let s = Instant::now();
    let args = Args::parse();

    let source = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let records = load_records(&args.file)?;

    let mut progress = |stage: Stage| eprintln!("[{:>3}%] {}", stage.percent(), stage.message());
    let report = build_report(&source, &records, args.bet_rule, &mut progress)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)?;
        for table in [&report.new_users, &report.login_without_bet] {
            let path = dir.join(downloader::file_name(table, ExportFormat::Xlsx));
            fs::write(&path, downloader::to_xlsx(table)?)?;
            eprintln!("wrote {}", path.display());
        }
    }

    eprintln!("Total elapsed time: {:.1} seconds", s.elapsed().as_secs_f64());

    Ok(())
}
