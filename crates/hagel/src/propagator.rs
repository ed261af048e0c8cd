//! Module containing the definitions for propagators and their implementations.

pub(crate) mod array_var_int_element;
pub(crate) mod global_cardinality;

use std::fmt::Debug;

use thiserror::Error;

use crate::{
	actions::PropagationActions,
	solver::{
		engine::{int_var::IntVarRef, PropRef, State},
		value::Valuation,
	},
	IntVal,
};

/// Type alias to represent a user [`Propagator`], stored in a [`Box`], that is
/// used by the [`crate::solver::engine::Engine`].
pub(crate) type BoxedPropagator = Box<dyn Propagator<State>>;

#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
/// Error type signalling that the current state of the solver cannot lead to
/// a solution.
///
/// A contradiction is recoverable: the search process is expected to restore
/// the solver to an earlier state and make a different decision.
pub enum Contradiction {
	#[error("the domain of integer variable {0:?} has become empty")]
	/// The last value was removed from the domain of a decision variable, or its
	/// bounds crossed.
	DomainWipeout(IntVarRef),
	#[error("the constant {0} cannot take a different value")]
	/// A constant view was required to take a value other than its own.
	ConstantMismatch(IntVal),
	#[error("propagator {0:?} detected that its constraint cannot be satisfied")]
	/// A propagator detected that its constraint cannot be satisfied.
	Failure(PropRef),
}

/// A trait to allow the cloning of boxed propagators.
///
/// This trait allows us to implement [`Clone`] for [`BoxedPropagator`].
pub(crate) trait DynPropClone {
	/// Clone the object and store it as a boxed trait object.
	fn clone_dyn_prop(&self) -> BoxedPropagator;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// The result of checking whether the constraint of a propagator is entailed.
pub enum Entailment {
	/// The constraint is satisfied by any assignment of the current domains.
	Entailed,
	/// The constraint is violated by any assignment of the current domains.
	Disentailed,
	/// Whether the constraint is satisfied depends on further decisions.
	Unknown,
}

/// A trait for a propagator that is called during the search process to filter
/// the domains of decision variables, and detect inconsistencies.
///
/// A propagator subscribes to the events of its variables using an index of
/// its own choosing. When such an event occurs, the engine calls the matching
/// `awake_on_*` method with this index. Unless overridden, these methods
/// schedule [`Propagator::propagate`] to run once no more events are pending.
///
/// A propagator signals that its constraint cannot be satisfied by returning
/// the [`crate::Contradiction`] returned by a failing domain change or by
/// [`PropagationActions::fail`]. It is not called again until the solver is
/// restored to an earlier state.
pub(crate) trait Propagator<P: PropagationActions>: Debug + DynPropClone {
	/// Called when the lower bound of the variable with index `idx` was raised.
	fn awake_on_inf(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		let _ = idx;
		actions.schedule_propagate();
		Ok(())
	}

	/// Called when the variable with index `idx` was assigned a value.
	fn awake_on_inst(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		let _ = idx;
		actions.schedule_propagate();
		Ok(())
	}

	/// Called when the value `val`, strictly between the bounds, was removed from
	/// the domain of the variable with index `idx`.
	fn awake_on_rem(&mut self, actions: &mut P, idx: u32, val: IntVal) -> Result<(), Contradiction> {
		let _ = (idx, val);
		actions.schedule_propagate();
		Ok(())
	}

	/// Called when the upper bound of the variable with index `idx` was lowered.
	fn awake_on_sup(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		let _ = idx;
		actions.schedule_propagate();
		Ok(())
	}

	/// Check whether the constraint of the propagator is guaranteed to be
	/// (un)satisfied given the current domains.
	fn is_entailed(&self, actions: &P) -> Entailment {
		let _ = actions;
		Entailment::Unknown
	}

	/// Check whether a complete assignment satisfies the constraint of the
	/// propagator.
	fn is_satisfied(&self, sol: &dyn Valuation) -> bool;

	/// The propagate method enforces the full consistency of the propagator from
	/// scratch.
	///
	/// Calling the method again without any intervening domain changes must not
	/// change any domain.
	fn propagate(&mut self, actions: &mut P) -> Result<(), Contradiction>;
}

impl Clone for BoxedPropagator {
	fn clone(&self) -> BoxedPropagator {
		self.clone_dyn_prop()
	}
}

impl<P: Propagator<State> + Clone + 'static> DynPropClone for P {
	fn clone_dyn_prop(&self) -> BoxedPropagator {
		Box::new(self.clone())
	}
}
