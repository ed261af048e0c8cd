//! This module contains the defitions for the priority queue used by [`Engine`]
//! to schedule the full propagation of propagators.

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
/// The priority levels at which propagators can be scheduled.
pub(crate) enum PriorityLevel {
	/// The lowest priority level, all other priority levels are more important
	Lowest,
	/// A higher level of priority than [`PriorityLevel::Lowest`]
	Low,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A priority queue for propagators.
pub(crate) struct PriorityQueue<E> {
	/// Internal storage of the queues for each priority level.
	storage: [Vec<E>; 2],
}

impl<E> PriorityQueue<E> {
	/// Remove all elements from the queue, calling `f` for every removed element.
	pub(crate) fn drain(&mut self, mut f: impl FnMut(E)) {
		for queue in self.storage.iter_mut() {
			queue.drain(..).for_each(&mut f);
		}
	}

	/// Inserts a propagator into the queue at the end of the given priority
	/// level.
	pub(crate) fn insert(&mut self, priority: PriorityLevel, elem: E) {
		let i = priority as usize;
		debug_assert!((0..=1).contains(&i));
		self.storage[i].push(elem);
	}

	/// Pops the highest priority propagator from the queue.
	pub(crate) fn pop(&mut self) -> Option<E> {
		for queue in self.storage.iter_mut().rev() {
			if !queue.is_empty() {
				return queue.pop();
			}
		}
		None
	}
}

impl<E> Default for PriorityQueue<E> {
	fn default() -> Self {
		Self {
			storage: [Vec::new(), Vec::new()],
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::solver::queue::{PriorityLevel, PriorityQueue};

	#[test]
	fn priority_order() {
		assert!(PriorityLevel::Low > PriorityLevel::Lowest);
	}

	#[test]
	fn test_pop_most_important_first() {
		let mut queue = PriorityQueue::default();
		queue.insert(PriorityLevel::Lowest, 'a');
		queue.insert(PriorityLevel::Low, 'b');
		queue.insert(PriorityLevel::Low, 'c');
		assert_eq!(queue.pop(), Some('c'));
		assert_eq!(queue.pop(), Some('b'));

		let mut drained = Vec::new();
		queue.insert(PriorityLevel::Low, 'd');
		queue.drain(|e| drained.push(e));
		assert_eq!(drained, vec!['a', 'd']);
		assert_eq!(queue.pop(), None);
	}
}
