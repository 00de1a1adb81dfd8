// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Hand-off queue between callers and the flush task.
//!
//! Callers park their request here until the flush task takes it. Until that
//! moment a caller may withdraw its own request, which is how cancellation is
//! resolved without ever touching the batch buffer. Requests are taken in
//! submission order.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{buffer::BatchBuffer, notify::Notifier};

/// A row waiting to be drained, paired with the caller's notifier.
pub(crate) struct QueuedRequest<R, E> {
	pub(crate) row: R,
	pub(crate) notifier: Notifier<E>,
}

/// Identifies a parked request so its caller can withdraw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Ticket(u64);

struct State<R, E> {
	requests: VecDeque<(Ticket, QueuedRequest<R, E>)>,
	next: u64,
	closed: bool,
}

pub(crate) struct HandOffQueue<R, E> {
	state: Mutex<State<R, E>>,
}

impl<R, E> HandOffQueue<R, E> {
	pub(crate) fn new() -> Self {
		Self {
			state: Mutex::new(State {
				requests: VecDeque::new(),
				next: 0,
				closed: false,
			}),
		}
	}

	/// Parks a request. Returns `None` once the queue is closed; the notifier
	/// is discarded without a delivery in that case.
	pub(crate) fn push(&self, row: R, notifier: Notifier<E>) -> Option<Ticket> {
		let mut state = self.state.lock();
		if state.closed {
			drop(state);
			notifier.disarm();
			return None;
		}

		let ticket = Ticket(state.next);
		state.next += 1;
		state.requests.push_back((
			ticket,
			QueuedRequest {
				row,
				notifier,
			},
		));
		Some(ticket)
	}

	/// Removes a parked request. Returns `false` if the flush task already
	/// took it, in which case a result will be delivered.
	pub(crate) fn withdraw(&self, ticket: Ticket) -> bool {
		let removed = {
			let mut state = self.state.lock();
			match state.requests.binary_search_by_key(&ticket, |(t, _)| *t) {
				Ok(idx) => state.requests.remove(idx),
				Err(_) => None,
			}
		};

		match removed {
			Some((_, request)) => {
				request.notifier.disarm();
				true
			}
			None => false,
		}
	}

	/// Moves parked requests into `buffer` until it is full or nothing is
	/// waiting. Never waits for new requests.
	pub(crate) fn drain_into(&self, buffer: &mut BatchBuffer<R, E>) -> usize {
		let mut state = self.state.lock();
		let mut moved = 0;

		while !buffer.is_full() {
			let Some((_, request)) = state.requests.pop_front() else {
				break;
			};
			buffer.push(request);
			moved += 1;
		}
		moved
	}

	/// Rejects all future pushes. Requests already parked stay drainable.
	pub(crate) fn close(&self) {
		self.state.lock().closed = true;
	}

	/// Drops every request still parked. Their callers observe
	/// [`InsertError::Closed`](crate::InsertError::Closed).
	pub(crate) fn abandon_all(&self) -> usize {
		let abandoned: Vec<_> = self.state.lock().requests.drain(..).collect();
		abandoned.len()
	}

	pub(crate) fn len(&self) -> usize {
		self.state.lock().requests.len()
	}
}
