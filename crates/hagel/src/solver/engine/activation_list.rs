//! Storage of the subscriptions of propagators to the events of an integer
//! variable.

use crate::{solver::engine::PropRef, IntVal};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// The list of propagators that watch an integer variable.
pub(crate) struct ActivationList {
	/// The watches in the order in which they were registered.
	watches: Vec<IntWatch>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// An event that has occurred on an integer variable.
pub(crate) enum IntEvent {
	/// The lower bound of the variable was raised.
	LowerBound,
	/// The upper bound of the variable was lowered.
	UpperBound,
	/// The variable has been assigned a single value.
	Fixed,
	/// A value strictly between the bounds was removed from the domain.
	Removal(IntVal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// Conditions on which a propagator is awoken for an integer variable.
pub(crate) enum IntPropCond {
	/// Awaken when the variable is assigned.
	Fixed,
	/// Awaken when the lower bound of the variable changes.
	LowerBound,
	/// Awaken when the upper bound of the variable changes.
	UpperBound,
	/// Awaken when either bound of the variable changes.
	Bounds,
	/// Awaken on any change to the domain of the variable.
	Domain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// A subscription of a propagator to an integer variable.
pub(crate) struct IntWatch {
	/// The propagator to be awoken.
	pub(crate) prop: PropRef,
	/// The index of the variable in the propagator's own list of variables.
	pub(crate) idx: u32,
	/// The events for which the propagator is awoken.
	pub(crate) condition: IntPropCond,
}

impl ActivationList {
	/// Add a subscription of `prop` to the variable.
	pub(crate) fn add(&mut self, prop: PropRef, idx: u32, condition: IntPropCond) {
		self.watches.push(IntWatch {
			prop,
			idx,
			condition,
		});
	}

	/// Return the `i`-th subscription.
	pub(crate) fn get(&self, i: usize) -> IntWatch {
		self.watches[i]
	}

	/// Returns the number of subscriptions.
	pub(crate) fn len(&self) -> usize {
		self.watches.len()
	}
}

impl IntPropCond {
	/// Whether a propagator subscribed with this condition is awoken by `event`.
	pub(crate) fn is_activated_by(self, event: IntEvent) -> bool {
		matches!(
			(self, event),
			(IntPropCond::Domain, _)
				| (IntPropCond::Fixed, IntEvent::Fixed)
				| (
					IntPropCond::LowerBound | IntPropCond::Bounds,
					IntEvent::LowerBound
				) | (
				IntPropCond::UpperBound | IntPropCond::Bounds,
				IntEvent::UpperBound
			)
		)
	}
}

#[cfg(test)]
mod tests {
	use crate::solver::engine::activation_list::{IntEvent, IntPropCond};

	#[test]
	fn test_activation_conditions() {
		let events = [
			IntEvent::LowerBound,
			IntEvent::UpperBound,
			IntEvent::Fixed,
			IntEvent::Removal(3),
		];
		let activated = |cond: IntPropCond| {
			events
				.iter()
				.map(|&e| cond.is_activated_by(e))
				.collect::<Vec<_>>()
		};
		assert_eq!(activated(IntPropCond::Fixed), [false, false, true, false]);
		assert_eq!(
			activated(IntPropCond::LowerBound),
			[true, false, false, false]
		);
		assert_eq!(
			activated(IntPropCond::UpperBound),
			[false, true, false, false]
		);
		assert_eq!(activated(IntPropCond::Bounds), [true, true, false, false]);
		assert_eq!(activated(IntPropCond::Domain), [true, true, true, true]);
	}
}
