//! synth-runner: headless batch runner for the payment dataset generator.
//!
//! Usage:
//!   synth-runner --seed 42 --count 1000000 --csv data/transactions.csv
//!   synth-runner --seed 7 --count 50000 --db run.db --calibration my_tables.json
//!   synth-runner --threads 4 --summary-json summary.json
//!
//! A run always goes to completion. Stopping early is a library feature
//! (`Generator::stream` with an abort flag); the runner never raises it.

use anyhow::{Context, Result};
use paysynth_core::{
    engine::RunStatus,
    record::TransactionRecord,
    store::DatasetStore,
    summary::{AucAccumulator, RunSummary},
    Calibration, GenerationConfig, Generator,
};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::AtomicBool;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let defaults = GenerationConfig::default();
    let config = GenerationConfig {
        seed: parse_arg(&args, "--seed", defaults.seed),
        transaction_count: parse_arg(&args, "--count", defaults.transaction_count),
    };
    let threads = parse_arg(&args, "--threads", 0usize);
    let calibration_path = arg_value(&args, "--calibration");
    let csv_path = arg_value(&args, "--csv");
    let db_path = arg_value(&args, "--db");
    let summary_path = arg_value(&args, "--summary-json");

    if threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Cannot size worker pool")?;
    }

    let calibration = match calibration_path {
        Some(path) => Calibration::load(path)?,
        None => Calibration::bundled()?,
    };
    let calibration_version = calibration.version.clone();

    println!("Payment dataset generator — synth-runner");
    println!("  seed:         {}", config.seed);
    println!("  transactions: {}", config.transaction_count);
    println!("  calibration:  {} ({})", calibration_path.unwrap_or("bundled"), calibration_version);
    println!("  csv:          {}", csv_path.unwrap_or("-"));
    println!("  db:           {}", db_path.unwrap_or("-"));
    println!();

    let generator = Generator::from_config(calibration, &config)?;
    log::info!(
        "merchant pool ready: top 1% of merchants hold {:.1}% of volume",
        generator.population().top_weight_share(0.01) * 100.0
    );

    let mut csv = match csv_path {
        Some(path) => Some(CsvSink::create(path)?),
        None => None,
    };
    let base_run_id = format!("run-{}-{}", config.seed, config.transaction_count);
    let (store, run_id) = match db_path {
        Some(path) => {
            let store = DatasetStore::open(path)?;
            store.migrate()?;
            // Repeat runs into the same database get a suffixed id.
            let run_id = store.next_run_id(&base_run_id)?;
            store.insert_run(&run_id, config.seed, &calibration_version, config.transaction_count)?;
            log::info!("recording run {run_id} in {path}");
            (Some(store), run_id)
        }
        None => (None, base_run_id),
    };

    let mut summary = RunSummary::default();
    let mut auc = AucAccumulator::with_capacity(config.transaction_count as usize);
    let never_abort = AtomicBool::new(false);

    let status = generator.stream(config.transaction_count, &never_abort, |batch| {
        for record in batch {
            summary.observe(record);
            auc.observe(record);
        }
        if let Some(sink) = csv.as_mut() {
            sink.write_batch(batch)?;
        }
        if let Some(store) = store.as_ref() {
            store.append_batch(&run_id, batch)?;
        }
        Ok(())
    })?;

    if let Some(sink) = csv {
        sink.finish()?;
    }
    let (status_label, written) = match status {
        RunStatus::Completed { transactions } => ("completed", transactions),
        RunStatus::Aborted { transactions } => ("aborted", transactions),
    };
    if let Some(store) = store.as_ref() {
        store.finish_run(&run_id, status_label, written)?;
    }

    let auc = auc.finish();
    print_summary(&summary, auc, status_label);

    if let Some(path) = summary_path {
        let json = serde_json::json!({
            "seed": config.seed,
            "calibration_version": calibration_version,
            "status": status_label,
            "summary": summary,
            "score_auc": auc,
        });
        std::fs::write(path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("Cannot write {path}"))?;
        log::info!("summary written to {path}");
    }
    Ok(())
}

/// Streams rows to a CSV file, header first.
struct CsvSink {
    writer: BufWriter<File>,
}

impl CsvSink {
    fn create(path: &str) -> Result<Self> {
        if let Some(dir) = std::path::Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).with_context(|| format!("Cannot create {}", dir.display()))?;
            }
        }
        let file = File::create(path).with_context(|| format!("Cannot create {path}"))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", TransactionRecord::csv_header())?;
        Ok(Self { writer })
    }

    fn write_batch(&mut self, batch: &[TransactionRecord<'_>]) -> std::io::Result<()> {
        for record in batch {
            writeln!(self.writer, "{}", record.csv_row())?;
        }
        Ok(())
    }

    fn finish(mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

fn print_summary(summary: &RunSummary, auc: Option<f64>, status: &str) {
    let n = summary.transactions;
    println!("{}", "=".repeat(55));
    println!("  Run status             : {status:>12}");
    println!("  Transactions generated : {n:>12}");
    println!(
        "  Failed transactions    : {:>12}  ({:.1}%)",
        summary.failed,
        summary.failure_rate() * 100.0
    );
    println!(
        "  Retryable failures     : {:>12}  ({:.1}%)",
        summary.retryable,
        summary.retryable_share() * 100.0
    );
    println!(
        "  Recovered on retry     : {:>12}  ({:.1}% of retryable)",
        summary.recovered,
        summary.recovery_rate() * 100.0
    );
    println!(
        "  Recoverable (leakage)  : {:>12}  ({:.1}%)",
        summary.recoverable,
        summary.recoverable_share() * 100.0
    );
    println!("  Revenue leakage (USD)  : ${:>11.0}", summary.revenue_leakage_usd);
    match summary.top_failing_category() {
        Some((name, count)) => println!("  Top failing category   : {name} ({count})"),
        None => println!("  Top failing category   : -"),
    }
    match auc {
        Some(v) => println!("  Risk score AUC         : {v:>12.4}"),
        None => println!("  Risk score AUC         :            -"),
    }
    println!("{}", "=".repeat(55));
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
