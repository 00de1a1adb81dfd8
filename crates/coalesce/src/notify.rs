// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Pooled single-slot result delivery.
//!
//! Each [`Insert`](crate::Coalescer::insert) borrows a slot from the
//! [`NotifyPool`]. The caller keeps the [`Pending`] side and hands a
//! [`Notifier`] to the engine together with its row. The engine writes exactly
//! one [`Delivery`] through the notifier; the caller reads it exactly once.
//!
//! A slot only goes back to the pool when the pending side is dropped and no
//! notifier for it is alive anymore, so a recycled slot can never receive a
//! late write from a previous use.

use std::{
	pin::pin,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// What the engine delivers to a waiting caller.
#[derive(Debug)]
pub(crate) enum Delivery<E> {
	/// The batch containing the row was written; carries the shared result.
	Written(std::result::Result<(), Arc<E>>),
	/// The notifier was dropped without a result, e.g. the engine stopped
	/// before draining the request.
	Abandoned,
}

struct Slot<E> {
	value: Mutex<Option<Delivery<E>>>,
	notify: Notify,
}

impl<E> Slot<E> {
	fn new() -> Self {
		Self {
			value: Mutex::new(None),
			notify: Notify::new(),
		}
	}

	fn deliver(&self, delivery: Delivery<E>) {
		*self.value.lock() = Some(delivery);
		self.notify.notify_waiters();
	}
}

/// Free list of reusable notification slots.
pub(crate) struct NotifyPool<E> {
	idle: Mutex<Vec<Arc<Slot<E>>>>,
	max_idle: usize,
	allocated: AtomicU64,
	reused: AtomicU64,
}

impl<E> NotifyPool<E> {
	pub(crate) fn new(max_idle: usize) -> Arc<Self> {
		Arc::new(Self {
			idle: Mutex::new(Vec::with_capacity(max_idle)),
			max_idle,
			allocated: AtomicU64::new(0),
			reused: AtomicU64::new(0),
		})
	}

	/// Takes an idle slot or allocates a fresh one.
	pub(crate) fn acquire(self: &Arc<Self>) -> Pending<E> {
		let slot = match self.idle.lock().pop() {
			Some(slot) => {
				self.reused.fetch_add(1, Ordering::Relaxed);
				slot
			}
			None => {
				self.allocated.fetch_add(1, Ordering::Relaxed);
				Arc::new(Slot::new())
			}
		};

		Pending {
			slot: Some(slot),
			pool: Arc::clone(self),
		}
	}

	fn release(&self, slot: Arc<Slot<E>>) {
		// A notifier still holds the slot; let it go with the last reference.
		if Arc::strong_count(&slot) != 1 {
			return;
		}
		slot.value.lock().take();

		let mut idle = self.idle.lock();
		if idle.len() < self.max_idle {
			idle.push(slot);
		}
	}

	pub(crate) fn idle(&self) -> usize {
		self.idle.lock().len()
	}

	pub(crate) fn allocated(&self) -> u64 {
		self.allocated.load(Ordering::Relaxed)
	}

	pub(crate) fn reused(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}
}

/// Caller side of a borrowed slot. Returns the slot to the pool on drop.
pub(crate) struct Pending<E> {
	slot: Option<Arc<Slot<E>>>,
	pool: Arc<NotifyPool<E>>,
}

impl<E> Pending<E> {
	/// Creates the engine side of this slot.
	pub(crate) fn notifier(&self) -> Notifier<E> {
		Notifier {
			slot: self.slot.clone(),
		}
	}

	/// Waits until the engine delivers a result.
	pub(crate) async fn wait(&self) -> Delivery<E> {
		let Some(slot) = self.slot.as_ref() else {
			return Delivery::Abandoned;
		};

		loop {
			let mut notified = pin!(slot.notify.notified());
			notified.as_mut().enable();

			let delivery = slot.value.lock().take();
			if let Some(delivery) = delivery {
				return delivery;
			}
			notified.await;
		}
	}
}

impl<E> Drop for Pending<E> {
	fn drop(&mut self) {
		if let Some(slot) = self.slot.take() {
			self.pool.release(slot);
		}
	}
}

/// Engine side of a borrowed slot. Writes at most one delivery.
pub(crate) struct Notifier<E> {
	slot: Option<Arc<Slot<E>>>,
}

impl<E> Notifier<E> {
	pub(crate) fn complete(mut self, result: std::result::Result<(), Arc<E>>) {
		if let Some(slot) = self.slot.take() {
			slot.deliver(Delivery::Written(result));
		}
	}

	/// Drops the notifier without delivering anything. Used when the caller
	/// withdraws its own request.
	pub(crate) fn disarm(mut self) {
		self.slot.take();
	}
}

impl<E> Drop for Notifier<E> {
	fn drop(&mut self) {
		if let Some(slot) = self.slot.take() {
			slot.deliver(Delivery::Abandoned);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::{sync::Arc, time::Duration};

	use super::{Delivery, NotifyPool};

	#[tokio::test]
	async fn test_complete_before_wait() {
		let pool = NotifyPool::<String>::new(4);
		let pending = pool.acquire();

		pending.notifier().complete(Ok(()));

		assert!(matches!(pending.wait().await, Delivery::Written(Ok(()))));
	}

	#[tokio::test]
	async fn test_complete_after_wait() {
		let pool = NotifyPool::<String>::new(4);
		let pending = pool.acquire();
		let notifier = pending.notifier();

		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			notifier.complete(Err(Arc::new("boom".to_string())));
		});

		match pending.wait().await {
			Delivery::Written(Err(err)) => assert_eq!(err.as_str(), "boom"),
			other => panic!("unexpected {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_dropped_notifier_abandons() {
		let pool = NotifyPool::<String>::new(4);
		let pending = pool.acquire();
		drop(pending.notifier());

		assert!(matches!(pending.wait().await, Delivery::Abandoned));
	}

	#[test]
	fn test_slot_is_reused() {
		let pool = NotifyPool::<String>::new(4);

		let pending = pool.acquire();
		pending.notifier().complete(Ok(()));
		drop(pending);
		assert_eq!(pool.idle(), 1);

		let pending = pool.acquire();
		assert_eq!(pool.idle(), 0);
		assert_eq!(pool.allocated(), 1);
		assert_eq!(pool.reused(), 1);
		drop(pending);
	}

	#[test]
	fn test_recycled_slot_is_empty() {
		let pool = NotifyPool::<String>::new(1);

		let pending = pool.acquire();
		pending.notifier().complete(Err(Arc::new("stale".to_string())));
		drop(pending);

		let pending = pool.acquire();
		let slot = pending.slot.as_ref().unwrap();
		assert!(slot.value.lock().is_none());
	}

	#[test]
	fn test_slot_with_live_notifier_is_not_recycled() {
		let pool = NotifyPool::<String>::new(4);

		let pending = pool.acquire();
		let notifier = pending.notifier();
		drop(pending);
		assert_eq!(pool.idle(), 0);

		notifier.complete(Ok(()));
		assert_eq!(pool.idle(), 0);
	}

	#[test]
	fn test_idle_is_bounded() {
		let pool = NotifyPool::<String>::new(2);
		let handles: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
		drop(handles);

		assert_eq!(pool.idle(), 2);
		assert_eq!(pool.allocated(), 5);
	}
}
