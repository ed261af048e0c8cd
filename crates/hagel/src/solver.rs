//! Module containing the central solving infrastructure.

pub(crate) mod engine;
pub(crate) mod queue;
pub(crate) mod value;
pub(crate) mod view;

use delegate::delegate;
use thiserror::Error;
use tracing::debug;

use crate::{
	actions::{DecisionActions, InspectionActions, PropagatorInitActions, TrailingActions},
	propagator::{BoxedPropagator, Contradiction, Entailment},
	solver::{
		engine::{
			activation_list::IntPropCond,
			int_var::{DomainStorage, IntVar},
			trail::TrailedInt,
			Engine, PropRef, SearchStatistics,
		},
		queue::PriorityLevel,
		value::Valuation,
		view::IntViewInner,
	},
	IntSetVal, IntVal, IntView,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Statistics related to the initialization of the solver
pub struct InitStatistics {
	/// Number of (non-view) integer variables represented in the solver
	int_vars: usize,
	/// Number of propagators in the solver
	propagators: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A point in the search to which the [`Solver`] can be restored.
///
/// Created by [`Solver::checkpoint`].
pub struct Mark(u32);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
/// Error type used when a decision variable or a propagator cannot be created
/// from the given arguments.
pub enum ModelError {
	#[error("a decision variable cannot be created with an empty domain")]
	/// The domain of a new decision variable did not contain any values.
	EmptyDomain,
	#[error("an element constraint requires at least one candidate")]
	/// The array of an element constraint was empty.
	EmptyArray,
	#[error("a global cardinality constraint requires at least one cardinality variable")]
	/// No values were given to a global cardinality constraint.
	EmptyCardinality,
	#[error("the domain of {var:?} contains values outside of the range [{min}, {max}]")]
	/// A decision variable can take values outside the range of values that a
	/// constraint is defined on.
	ValueOutOfRange {
		/// The offending decision variable.
		var: IntView,
		/// The smallest value in the range.
		min: IntVal,
		/// The largest value in the range.
		max: IntVal,
	},
}

#[derive(Clone, Debug, Default)]
/// The main solver object: a store of decision variables connected by
/// propagators, which can be used by a search process to make decisions,
/// propagate them, and undo them.
pub struct Solver {
	/// The propagation engine, containing the decision variables and the
	/// propagators.
	pub(crate) engine: Engine,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
/// Structure holding the options using to configure the solver.
pub(crate) struct SolverConfiguration {
	/// Ask every propagator whether its constraint is entailed after it has been
	/// run, and stop awakening it when it is.
	pub(crate) check_entailment: bool,
}

impl InitStatistics {
	/// Number of integer variables present in the solver
	pub fn int_vars(&self) -> usize {
		self.int_vars
	}
	/// Number of propagators present in the solver
	pub fn propagators(&self) -> usize {
		self.propagators
	}
}

impl Solver {
	/// Check whether a complete assignment satisfies the constraints of all
	/// propagators in the solver.
	pub fn check_solution(&self, sol: &dyn Valuation) -> bool {
		self.engine.propagators.iter().all(|p| p.is_satisfied(sol))
	}

	/// Create a point in the search to which the solver can later be restored
	/// using [`Self::restore`].
	///
	/// A checkpoint is expected to be made when no more propagation is pending,
	/// i.e., after [`Self::propagate_all`] has returned successfully.
	pub fn checkpoint(&mut self) -> Mark {
		let mark = Mark(self.engine.state.decision_level());
		self.engine.state.notify_new_decision_level();
		mark
	}

	/// Access the initilization statistics of the [`Solver`] object.
	pub fn init_statistics(&self) -> InitStatistics {
		InitStatistics {
			int_vars: self.engine.state.int_vars.len(),
			propagators: self.engine.propagators.len(),
		}
	}

	/// Check whether the constraint of the given propagator is entailed by the
	/// current domains of its decision variables.
	pub fn is_entailed(&self, prop: PropRef) -> Entailment {
		self.engine.is_entailed(prop)
	}

	/// Create a new integer decision variable with the given domain.
	///
	/// The `storage` determines whether values can be removed from the domain
	/// strictly between the bounds. Domains that contain gaps are always stored
	/// as [`DomainStorage::Enumerated`].
	pub fn new_int_var(
		&mut self,
		domain: IntSetVal,
		storage: DomainStorage,
	) -> Result<IntView, ModelError> {
		IntVar::new_in(self, domain, storage)
	}

	/// Run the propagators until a fixpoint is reached, or return the
	/// contradiction that was detected.
	///
	/// Once a contradiction has been detected, the solver must be restored to an
	/// earlier [`Mark`] before propagation can resume.
	pub fn propagate_all(&mut self) -> Result<(), Contradiction> {
		self.engine.propagate_all()
	}

	/// Restore the solver to the state it was in when `mark` was created.
	///
	/// Restoring to a [`Mark`] created at or after the current point in the
	/// search does not change the solver.
	pub fn restore(&mut self, mark: Mark) {
		self.engine.state.notify_backtrack(mark.0);
	}

	/// Access the search statistics for the search process up to this point.
	pub fn search_statistics(&self) -> &SearchStatistics {
		&self.engine.state.statistics
	}

	/// Set whether the solver should ask propagators whether their constraint is
	/// entailed after they have been run.
	pub fn set_check_entailment(&mut self, enable: bool) {
		debug!(enable, "set check entailment");
		self.engine.state.config.check_entailment = enable;
	}
}

impl DecisionActions for Solver {
	delegate! {
		to self.engine.state {
			fn set_int_lower_bound(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;
			fn set_int_upper_bound(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;
			fn set_int_val(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;
			fn set_int_not_eq(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction>;
		}
	}
}

impl InspectionActions for Solver {
	delegate! {
		to self.engine.state {
			fn check_int_in_domain(&self, var: IntView, val: IntVal) -> bool;
			fn get_int_bounds(&self, var: IntView) -> (IntVal, IntVal);
			fn get_int_domain_size(&self, var: IntView) -> usize;
			fn get_int_lower_bound(&self, var: IntView) -> IntVal;
			fn get_int_next_value(&self, var: IntView, val: IntVal) -> Option<IntVal>;
			fn get_int_prev_value(&self, var: IntView, val: IntVal) -> Option<IntVal>;
			fn get_int_upper_bound(&self, var: IntView) -> IntVal;
			fn get_int_val(&self, var: IntView) -> Option<IntVal>;
		}
	}
}

impl PropagatorInitActions for Solver {
	fn add_propagator(&mut self, propagator: BoxedPropagator, priority: PriorityLevel) -> PropRef {
		let prop = self.engine.propagators.push(propagator);
		let state = &mut self.engine.state;
		let status = state.trail.track_int(0);
		let p = state.prop_status.push(status);
		debug_assert_eq!(prop, p);
		let p = state.propagator_priority.push(priority);
		debug_assert_eq!(prop, p);
		let p = state.enqueued.push(false);
		debug_assert_eq!(prop, p);
		state.enqueue_propagator(prop);
		debug!(prop = usize::from(prop), ?priority, "new propagator");
		prop
	}

	fn enqueue_on_int_change(
		&mut self,
		prop: PropRef,
		var: IntView,
		idx: u32,
		condition: IntPropCond,
	) {
		if let IntViewInner::VarRef(iv) = var.0 {
			self.engine.state.int_activation[iv].add(prop, idx, condition);
		}
	}

	fn new_trailed_int(&mut self, init: IntVal) -> TrailedInt {
		self.engine.state.trail.track_int(init)
	}
}

impl TrailingActions for Solver {
	delegate! {
		to self.engine.state {
			fn get_trailed_int(&self, x: TrailedInt) -> IntVal;
			fn set_trailed_int(&mut self, x: TrailedInt, v: IntVal) -> IntVal;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::ops::RangeInclusive;

	use expect_test::expect;
	use rangelist::RangeList;
	use tracing_test::traced_test;

	use crate::{
		actions::{DecisionActions, InspectionActions},
		Contradiction, DomainStorage, IntVal, IntView, ModelError, Solver,
	};

	#[test]
	#[traced_test]
	fn test_checkpoint_restore() {
		let mut slv = Solver::default();
		let x = slv
			.new_int_var(RangeList::from_iter([0..=9]), DomainStorage::Enumerated)
			.unwrap();
		let y = slv
			.new_int_var(RangeList::from_iter([0..=9]), DomainStorage::Interval)
			.unwrap();

		let root = slv.checkpoint();
		assert_eq!(slv.set_int_lower_bound(x, 3), Ok(true));
		assert_eq!(slv.set_int_not_eq(x, 5), Ok(true));
		let m1 = slv.checkpoint();
		assert_eq!(slv.set_int_val(x, 7), Ok(true));
		assert_eq!(slv.set_int_upper_bound(y, 4), Ok(true));
		// Restoring to a later mark than the current state is a no-op
		let m2 = slv.checkpoint();
		slv.restore(m2);
		slv.restore(m2);
		assert_eq!(slv.get_int_val(x), Some(7));

		slv.restore(m1);
		assert_eq!(slv.get_int_bounds(x), (3, 9));
		assert!(!slv.check_int_in_domain(x, 5));
		assert_eq!(slv.get_int_bounds(y), (0, 9));
		slv.restore(root);
		assert_eq!(slv.get_int_domain_size(x), 10);
		assert_eq!(slv.search_statistics().peak_depth(), 3);
		assert_eq!(slv.search_statistics().backtracks(), 3);
	}

	#[test]
	fn test_constant_views() {
		let mut slv = Solver::default();
		let c = IntView::from(4);
		assert_eq!(slv.get_int_bounds(c), (4, 4));
		assert_eq!(slv.get_int_next_value(c, 3), Some(4));
		assert_eq!(slv.get_int_next_value(c, 4), None);
		assert_eq!(slv.set_int_lower_bound(c, 2), Ok(false));
		assert_eq!(slv.set_int_not_eq(c, 5), Ok(false));
		assert_eq!(
			slv.set_int_upper_bound(c, 3),
			Err(Contradiction::ConstantMismatch(4))
		);
		// Singleton domains result in constants
		assert_eq!(
			slv.new_int_var(RangeList::from_iter([2..=2]), DomainStorage::Enumerated),
			Ok(IntView::from(2))
		);
	}

	#[test]
	fn test_model_errors() {
		let mut slv = Solver::default();
		let err = slv
			.new_int_var(
				RangeList::from_iter(Vec::<RangeInclusive<IntVal>>::new()),
				DomainStorage::Interval,
			)
			.unwrap_err();
		assert_eq!(err, ModelError::EmptyDomain);
		expect!["a decision variable cannot be created with an empty domain"]
			.assert_eq(&err.to_string());
		assert_eq!(slv.init_statistics().int_vars(), 0);
	}

	#[test]
	fn test_wipeout_until_restore() {
		let mut slv = Solver::default();
		let x = slv
			.new_int_var(RangeList::from_iter([1..=3]), DomainStorage::Interval)
			.unwrap();
		let m = slv.checkpoint();
		let Err(err) = slv.set_int_lower_bound(x, 4) else {
			panic!("expected a contradiction")
		};
		assert!(matches!(err, Contradiction::DomainWipeout(_)));
		assert_eq!(slv.propagate_all(), Err(err));
		slv.restore(m);
		assert_eq!(slv.propagate_all(), Ok(()));
		assert_eq!(slv.get_int_bounds(x), (1, 3));
		assert_eq!(slv.search_statistics().contradictions(), 1);
	}
}
