// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Drives a coalescer with many concurrent single-row inserts and reports
//! throughput, batch shape and per-insert latency.

mod metrics;

use std::{
	convert::Infallible,
	fmt::Display,
	fs,
	path::PathBuf,
	process::ExitCode,
	sync::Arc,
	time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use coalesce::{BatchWriter, CancellationToken, Coalescer, CoalescerConfig, Row, Value, row, writer_fn};
use coalesce_sqlite::{SqliteError, SqliteWriter, Table};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::metrics::{Metrics, latency_histogram};

#[derive(Debug, thiserror::Error)]
enum LoadTestError {
	#[error(transparent)]
	Config(#[from] coalesce::Error),
	#[error(transparent)]
	Sqlite(#[from] SqliteError),
	#[error("histogram: {0}")]
	Histogram(#[from] hdrhistogram::CreationError),
	#[error("report: {0}")]
	Io(#[from] std::io::Error),
	#[error("report: {0}")]
	Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
	/// Discards every batch; measures coalescing overhead only.
	Noop,
	/// Appends every batch to a SQLite table.
	Sqlite,
}

#[derive(Debug, Parser)]
#[command(name = "coalesce-load-test", about = "Load generator for the coalesce inserter")]
struct Args {
	/// Concurrent inserting tasks.
	#[arg(long, default_value_t = num_cpus::get() * 64)]
	workers: usize,
	/// How long to keep inserting, e.g. 10s or 500ms.
	#[arg(long, default_value = "10s", value_parser = parse_duration)]
	duration: Duration,
	#[arg(long, default_value_t = 1000)]
	max_batch_size: usize,
	#[arg(long, default_value = "10ms", value_parser = parse_duration)]
	period: Duration,
	/// Deadline for a single insert.
	#[arg(long, default_value = "5s", value_parser = parse_duration)]
	timeout: Duration,
	#[arg(long, value_enum, default_value_t = Backend::Noop)]
	backend: Backend,
	/// SQLite database file; in-memory when omitted.
	#[arg(long, value_name = "PATH")]
	database: Option<PathBuf>,
	/// Also write the report as JSON to this file.
	#[arg(long, value_name = "PATH")]
	json: Option<PathBuf>,
}

fn parse_duration(value: &str) -> Result<Duration, String> {
	let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
	let (amount, unit) = value.split_at(split);
	let amount: u64 = amount.parse().map_err(|err| format!("invalid duration '{value}': {err}"))?;
	match unit {
		"us" => Ok(Duration::from_micros(amount)),
		"ms" => Ok(Duration::from_millis(amount)),
		"s" | "" => Ok(Duration::from_secs(amount)),
		"m" => Ok(Duration::from_secs(amount * 60)),
		other => Err(format!("invalid duration unit '{other}' in '{value}'")),
	}
}

fn diffs_table() -> Table {
	Table::new("diffs").column("created_at", "INTEGER").column("usr", "TEXT").column("diff", "REAL")
}

#[tokio::main]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();
	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("load test failed: {err}");
			ExitCode::FAILURE
		}
	}
}

async fn run(args: Args) -> Result<(), LoadTestError> {
	let config = CoalescerConfig::new(args.max_batch_size, args.period);
	info!(
		workers = args.workers,
		duration = ?args.duration,
		max_batch_size = config.max_batch_size,
		period = ?config.period,
		backend = ?args.backend,
		"starting load test"
	);

	match args.backend {
		Backend::Noop => {
			let writer = writer_fn(|_rows: Vec<Row>| async { Ok::<_, Infallible>(()) });
			drive(writer, config, &args).await
		}
		Backend::Sqlite => {
			let writer = match &args.database {
				Some(path) => SqliteWriter::open(path, diffs_table())?,
				None => SqliteWriter::open_in_memory(diffs_table())?,
			};
			writer.ensure_table()?;
			drive(writer, config, &args).await
		}
	}
}

async fn drive<W>(writer: W, config: CoalescerConfig, args: &Args) -> Result<(), LoadTestError>
where
	W: BatchWriter<Row>,
	W::Error: Display,
{
	let lifetime = CancellationToken::new();
	let coalescer = Coalescer::with_config(writer, config, lifetime.clone())?;
	let metrics = Arc::new(Metrics::new()?);

	metrics.start();
	let deadline = Instant::now() + args.duration;

	let mut workers = Vec::with_capacity(args.workers);
	for _ in 0..args.workers {
		let coalescer = coalescer.clone();
		let metrics = metrics.clone();
		let timeout = args.timeout;
		let mut histogram = latency_histogram()?;
		workers.push(tokio::spawn(async move {
			let mut inserted = 0u64;
			while Instant::now() < deadline {
				let row = row![Value::now(), Uuid::new_v4(), rand::random::<f64>()];
				let started = Instant::now();
				match coalescer.insert_timeout(timeout, row).await {
					Ok(()) => {
						inserted += 1;
						histogram.saturating_record(started.elapsed().as_micros() as u64);
					}
					Err(err) => metrics.record_error(&err.to_string()),
				}
			}
			metrics.merge_worker(inserted, &histogram);
		}));
	}

	for worker in workers {
		if let Err(err) = worker.await {
			error!("worker failed: {err}");
		}
	}

	lifetime.cancel();
	coalescer.stopped().await;

	let summary = metrics.summary(coalescer.stats());
	summary.print();
	if let Some(path) = &args.json {
		fs::write(path, serde_json::to_vec_pretty(&summary)?)?;
		info!(path = %path.display(), "wrote report");
	}
	Ok(())
}
