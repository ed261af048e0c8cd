//! Traits that encapsulate different sets of actions that can be performed at
//! different phases and by different objects in the solving process.

use crate::{
	propagator::{BoxedPropagator, Contradiction},
	solver::{
		engine::{activation_list::IntPropCond, trail::TrailedInt, PropRef},
		queue::PriorityLevel,
	},
	IntVal, IntView,
};

/// Actions that change the domains of integer decision variables. These are
/// used both by the search process to make decisions and by propagators to
/// enforce their inferences.
///
/// Every action returns whether the domain was changed, or a [`Contradiction`]
/// if the change would empty the domain.
pub trait DecisionActions: InspectionActions {
	/// Enforce that an integer view takes a value that is greater or equal to
	/// `val`.
	fn set_int_lower_bound(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;

	/// Enforce that an integer view takes a value that is less or equal to
	/// `val`.
	fn set_int_upper_bound(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;

	/// Enforce that an integer view takes the value `val`.
	fn set_int_val(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;

	/// Enforce that an integer view cannot take the value `val`.
	///
	/// Note that values strictly between the bounds of a variable stored using
	/// [`crate::DomainStorage::Interval`] cannot be removed, and the domain is
	/// reported as unchanged.
	fn set_int_not_eq(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;
}

/// Actions that can generally be performed when the solver is (partially)
/// initialized.
pub trait InspectionActions: TrailingActions {
	/// Get the minimum value that an integer view is guaranteed to take (given
	/// the current search decisions).
	fn get_int_lower_bound(&self, var: IntView) -> IntVal;

	/// Get the maximum value that an integer view is guaranteed to take (given
	/// the current search decisions).
	fn get_int_upper_bound(&self, var: IntView) -> IntVal;

	/// Convenience method to get both the lower and upper bounds of an integer
	/// view.
	fn get_int_bounds(&self, var: IntView) -> (IntVal, IntVal) {
		(self.get_int_lower_bound(var), self.get_int_upper_bound(var))
	}

	/// Get the current value of an integer view, if it has been assigned.
	fn get_int_val(&self, var: IntView) -> Option<IntVal> {
		let (lb, ub) = self.get_int_bounds(var);
		if lb == ub {
			Some(lb)
		} else {
			None
		}
	}

	/// Check whether a given integer view can take a given value (given the
	/// current search decisions).
	fn check_int_in_domain(&self, var: IntView, val: IntVal) -> bool;

	/// Get the smallest value in the domain of an integer view that is strictly
	/// greater than `val`, or `None` if no such value exists.
	///
	/// Repeatedly calling this method starting from any value below the lower
	/// bound lists the domain in increasing order.
	fn get_int_next_value(&self, var: IntView, val: IntVal) -> Option<IntVal>;

	/// Get the largest value in the domain of an integer view that is strictly
	/// less than `val`, or `None` if no such value exists.
	fn get_int_prev_value(&self, var: IntView, val: IntVal) -> Option<IntVal>;

	/// Get the number of values in the domain of an integer view.
	fn get_int_domain_size(&self, var: IntView) -> usize;
}

/// Actions that can be performed during propagation.
pub trait PropagationActions: DecisionActions {
	/// Create the [`Contradiction`] signalling that the calling propagator has
	/// detected that its constraint cannot be satisfied.
	///
	/// The contradiction must be returned from the propagator.
	fn fail(&mut self) -> Contradiction;

	/// Request that the full propagation of the calling propagator is run once no
	/// more events are pending.
	fn schedule_propagate(&mut self);

	/// Mark the calling propagator as entailed: its constraint is guaranteed to
	/// be satisfied by any further narrowing of the domains. The propagator will
	/// not be awoken until the search backtracks to before this point.
	fn set_entailed(&mut self);
}

/// Actions that can be performed during the initialization of propagators.
pub(crate) trait PropagatorInitActions: DecisionActions {
	/// Add a propagator to the solver.
	///
	/// The full propagation of the propagator is scheduled.
	fn add_propagator(&mut self, propagator: BoxedPropagator, priority: PriorityLevel) -> PropRef;

	/// Create a new trailed integer value with the given initial value.
	fn new_trailed_int(&mut self, init: IntVal) -> TrailedInt;

	/// Enqueue a propagator to be awoken when an integer variable is changed
	/// according to the given propagation condition.
	///
	/// The index `idx` identifies the variable to the propagator's awaken
	/// handlers.
	fn enqueue_on_int_change(
		&mut self,
		prop: PropRef,
		var: IntView,
		idx: u32,
		condition: IntPropCond,
	);
}

/// Basic actions that can be performed when the trailing infrastructure is
/// available.
pub trait TrailingActions {
	/// Get the current value of a [`TrailedInt`].
	fn get_trailed_int(&self, i: TrailedInt) -> IntVal;

	/// Change the value of a [`TrailedInt`] in a way that can be undone if the
	/// solver backtracks to a previous state.
	///
	/// Returns the previous value.
	fn set_trailed_int(&mut self, i: TrailedInt, v: IntVal) -> IntVal;

	/// Add `delta` to the value of a [`TrailedInt`] in a way that can be undone
	/// if the solver backtracks to a previous state.
	///
	/// Returns the new value.
	fn add_trailed_int(&mut self, i: TrailedInt, delta: IntVal) -> IntVal {
		let v = self.get_trailed_int(i) + delta;
		let _ = self.set_trailed_int(i, v);
		v
	}
}
