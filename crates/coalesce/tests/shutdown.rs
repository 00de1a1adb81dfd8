// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Lifetime handling of the flush task.

use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use coalesce::{CancellationToken, Coalescer, InsertError, writer_fn};

async fn wait_until(mut condition: impl FnMut() -> bool) {
	for _ in 0..2000 {
		if condition() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(1)).await;
	}
	panic!("condition not reached in time");
}

fn recording() -> (Arc<Mutex<Vec<Vec<u32>>>>, impl coalesce::BatchWriter<u32, Error = String>) {
	let batches = Arc::new(Mutex::new(Vec::new()));
	let sink = batches.clone();
	let writer = writer_fn(move |rows: Vec<u32>| {
		let sink = sink.clone();
		async move {
			sink.lock().unwrap().push(rows);
			Ok(())
		}
	});
	(batches, writer)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_final_flush_delivers_parked_rows() {
	let (batches, writer) = recording();
	let lifetime = CancellationToken::new();
	let coalescer = Coalescer::new(writer, 100, Duration::from_secs(3600), lifetime.clone()).unwrap();
	let wait = CancellationToken::new();

	let handles: Vec<_> = (0..10u32)
		.map(|i| {
			let coalescer = coalescer.clone();
			let wait = wait.clone();
			tokio::spawn(async move { coalescer.insert(&wait, i).await })
		})
		.collect();

	wait_until(|| coalescer.queued() == 10).await;
	assert!(batches.lock().unwrap().is_empty());

	lifetime.cancel();
	coalescer.stopped().await;

	let stats = coalescer.stats();
	assert_eq!(stats.flushes, 1);
	assert_eq!(stats.rows_flushed, 10);

	for handle in handles {
		handle.await.unwrap().unwrap();
	}

	let batches = batches.lock().unwrap();
	assert_eq!(batches.len(), 1);
	let mut rows = batches[0].clone();
	rows.sort();
	assert_eq!(rows, (0..10).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rows_beyond_final_batch_are_closed() {
	let (batches, writer) = recording();
	let lifetime = CancellationToken::new();
	let coalescer = Coalescer::new(writer, 2, Duration::from_secs(3600), lifetime.clone()).unwrap();
	let wait = CancellationToken::new();

	let handles: Vec<_> = (0..5u32)
		.map(|i| {
			let coalescer = coalescer.clone();
			let wait = wait.clone();
			tokio::spawn(async move { coalescer.insert(&wait, i).await })
		})
		.collect();

	wait_until(|| coalescer.queued() == 5).await;
	lifetime.cancel();
	coalescer.stopped().await;

	let mut written = 0;
	let mut closed = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(()) => written += 1,
			Err(InsertError::Closed) => closed += 1,
			Err(other) => panic!("unexpected {other:?}"),
		}
	}
	assert_eq!(written, 2);
	assert_eq!(closed, 3);
	assert_eq!(batches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_shutdown_skips_writer() {
	let (batches, writer) = recording();
	let lifetime = CancellationToken::new();
	let coalescer = Coalescer::new(writer, 10, Duration::from_millis(1), lifetime.clone()).unwrap();

	tokio::time::sleep(Duration::from_millis(10)).await;
	lifetime.cancel();
	coalescer.stopped().await;

	assert!(batches.lock().unwrap().is_empty());
	assert_eq!(coalescer.stats().flushes, 0);
}

#[tokio::test]
async fn test_dropping_all_handles_stops_task() {
	let alive = Arc::new(());
	let witness = Arc::downgrade(&alive);
	let writer = writer_fn(move |_rows: Vec<u32>| {
		let _alive = &alive;
		async { Ok::<_, String>(()) }
	});

	let coalescer = Coalescer::new(writer, 10, Duration::from_millis(1), CancellationToken::new()).unwrap();
	coalescer.insert(&CancellationToken::new(), 1).await.unwrap();
	drop(coalescer);

	// The writer is owned by the flush task and goes away with it.
	wait_until(|| witness.upgrade().is_none()).await;
}

#[tokio::test]
async fn test_panicking_writer_releases_callers() {
	let writer = writer_fn(|rows: Vec<u32>| async move {
		assert!(rows.is_empty(), "driver crashed");
		Ok::<_, String>(())
	});

	let coalescer = Coalescer::new(writer, 10, Duration::from_millis(1), CancellationToken::new()).unwrap();
	let wait = CancellationToken::new();

	let result = coalescer.insert(&wait, 1).await;
	assert!(matches!(result, Err(InsertError::Closed)));

	coalescer.stopped().await;
	assert!(matches!(coalescer.insert(&wait, 2).await, Err(InsertError::Closed)));
}
