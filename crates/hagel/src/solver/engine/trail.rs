//! This module contains the data structures used to trail values during the
//! search process. Changes made to trailed values are recorded in the central
//! [`Trail`] structure, if the search process needs to backtrack, then these
//! values can be restored to their previous state.

use std::mem;

use index_vec::IndexVec;
use tracing::trace;

use crate::{actions::TrailingActions, IntVal};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// The storage of a single trailed integer: its current value and the decision
/// level at which it was last written.
struct TrailedCell {
	/// The current value of the cell.
	value: IntVal,
	/// The decision level of the last write that was recorded on the trail.
	///
	/// A write at a level equal to `depth` does not need to be recorded again,
	/// since restoring the previous entry already yields the value the cell had
	/// when the level was entered.
	depth: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The central store of backtrackable integers.
pub(crate) struct Trail {
	/// The recorded changes, in the order in which they were made.
	trail: Vec<TrailEvent>,
	/// The length of the trail when previous decisions were made.
	prev_len: Vec<usize>,
	/// Stores the current value of trailed integer values.
	int_value: IndexVec<TrailedInt, TrailedCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An event that is recorded such that it can be undone.
pub(crate) struct TrailEvent {
	/// The trailed integer that was changed.
	cell: TrailedInt,
	/// The value the trailed integer had before the change.
	value: IntVal,
	/// The level at which the previous value was written.
	depth: u32,
}

impl Trail {
	/// Return the current decision level
	pub(crate) fn decision_level(&self) -> u32 {
		self.prev_len.len() as u32
	}

	/// Returns the number of recorded changes that can currently be undone.
	pub(crate) fn len(&self) -> usize {
		self.trail.len()
	}

	/// Notify the Trail of a backtracking operation.
	///
	/// The state of the trailed values is restored to the requested level.
	pub(crate) fn notify_backtrack(&mut self, level: usize) {
		if level >= self.prev_len.len() {
			return;
		}

		let len = self.prev_len[level];
		self.prev_len.truncate(level);
		debug_assert!(
			len <= self.trail.len(),
			"backtracking to level {level} length {len}, but trail is already at length {}",
			self.trail.len()
		);
		let undone = self.trail.len() - len;
		while self.trail.len() > len {
			let _ = self.undo();
		}
		trace!(level, undone, "restore trail");
	}

	/// Notify the Trail of a new decision level to which the trail can be restored.
	pub(crate) fn notify_new_decision_level(&mut self) {
		self.prev_len.push(self.trail.len());
	}

	/// Create a new trailed integer with initial value `val`
	pub(crate) fn track_int(&mut self, val: IntVal) -> TrailedInt {
		self.int_value.push(TrailedCell {
			value: val,
			depth: self.decision_level(),
		})
	}

	/// Internal method to undo the last change on the trail.
	///
	/// Note that his method will return `None` if the trail is empty.
	fn undo(&mut self) -> Option<TrailEvent> {
		let event = self.trail.pop()?;
		self.int_value[event.cell] = TrailedCell {
			value: event.value,
			depth: event.depth,
		};
		Some(event)
	}
}

impl Default for Trail {
	fn default() -> Self {
		Self {
			trail: Vec::new(),
			prev_len: Vec::new(),
			int_value: IndexVec::new(),
		}
	}
}

impl TrailingActions for Trail {
	fn get_trailed_int(&self, i: TrailedInt) -> IntVal {
		self.int_value[i].value
	}

	fn set_trailed_int(&mut self, i: TrailedInt, v: IntVal) -> IntVal {
		let level = self.decision_level();
		let cell = &mut self.int_value[i];
		if cell.value == v {
			return v;
		}
		let old = mem::replace(&mut cell.value, v);
		if cell.depth < level {
			// First write at this level: remember the value to restore
			self.trail.push(TrailEvent {
				cell: i,
				value: old,
				depth: mem::replace(&mut cell.depth, level),
			});
		}
		old
	}
}

index_vec::define_index_type! {
	/// Identifies an trailed integer tracked within [`Solver`]
	pub struct TrailedInt = u32;
}

#[cfg(test)]
mod tests {
	use crate::{actions::TrailingActions, solver::engine::trail::Trail, IntVal};

	#[test]
	fn test_trail_restore() {
		let mut trail = Trail::default();
		let cells: Vec<_> = [0, 1, -1, IntVal::MAX, IntVal::MIN]
			.into_iter()
			.map(|v| trail.track_int(v))
			.collect();

		trail.notify_new_decision_level();
		for (i, &c) in cells.iter().enumerate() {
			let _ = trail.set_trailed_int(c, i as IntVal * 10);
		}
		trail.notify_new_decision_level();
		let _ = trail.set_trailed_int(cells[0], 42);
		let _ = trail.add_trailed_int(cells[1], 5);
		assert_eq!(trail.get_trailed_int(cells[1]), 15);

		trail.notify_backtrack(1);
		assert_eq!(trail.get_trailed_int(cells[0]), 0);
		assert_eq!(trail.get_trailed_int(cells[1]), 10);
		trail.notify_backtrack(0);
		assert_eq!(
			cells
				.iter()
				.map(|&c| trail.get_trailed_int(c))
				.collect::<Vec<_>>(),
			vec![0, 1, -1, IntVal::MAX, IntVal::MIN]
		);
		assert_eq!(trail.len(), 0);
	}

	#[test]
	fn test_trail_first_write_per_level() {
		let mut trail = Trail::default();
		let x = trail.track_int(3);

		// Writes at the root level are permanent
		let _ = trail.set_trailed_int(x, 4);
		assert_eq!(trail.len(), 0);

		trail.notify_new_decision_level();
		for v in 5..100 {
			let _ = trail.set_trailed_int(x, v);
		}
		assert_eq!(trail.len(), 1);

		trail.notify_new_decision_level();
		let _ = trail.set_trailed_int(x, 7);
		let _ = trail.set_trailed_int(x, 8);
		assert_eq!(trail.len(), 2);

		trail.notify_backtrack(1);
		assert_eq!(trail.get_trailed_int(x), 99);
		// The level 1 entry is still in place, new writes are not recorded again
		let _ = trail.set_trailed_int(x, 1);
		assert_eq!(trail.len(), 1);

		trail.notify_backtrack(0);
		assert_eq!(trail.get_trailed_int(x), 4);
	}
}
