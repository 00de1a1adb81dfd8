// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::mem;

use crate::{notify::Notifier, queue::QueuedRequest};

/// Rows and notifiers collected for the next bulk write.
///
/// Owned by the flush task alone, hence no synchronization.
pub(crate) struct BatchBuffer<R, E> {
	rows: Vec<R>,
	notifiers: Vec<Notifier<E>>,
	capacity: usize,
}

impl<R, E> BatchBuffer<R, E> {
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			rows: Vec::with_capacity(capacity),
			notifiers: Vec::with_capacity(capacity),
			capacity,
		}
	}

	pub(crate) fn push(&mut self, request: QueuedRequest<R, E>) {
		debug_assert!(!self.is_full());
		self.rows.push(request.row);
		self.notifiers.push(request.notifier);
	}

	pub(crate) fn len(&self) -> usize {
		self.rows.len()
	}

	pub(crate) fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub(crate) fn is_full(&self) -> bool {
		self.rows.len() >= self.capacity
	}

	/// Hands out the collected batch and leaves the buffer empty with its
	/// full capacity reserved again.
	pub(crate) fn take(&mut self) -> (Vec<R>, Vec<Notifier<E>>) {
		let rows = mem::replace(&mut self.rows, Vec::with_capacity(self.capacity));
		let notifiers = mem::replace(&mut self.notifiers, Vec::with_capacity(self.capacity));
		(rows, notifiers)
	}
}
