//! Module containing the main propagation engine of the solver.

pub(crate) mod activation_list;
pub(crate) mod int_var;
pub(crate) mod trail;

use std::collections::VecDeque;

use delegate::delegate;
use index_vec::IndexVec;
use tracing::{debug, trace};

use crate::{
	actions::{DecisionActions, InspectionActions, PropagationActions, TrailingActions},
	propagator::{BoxedPropagator, Contradiction, Entailment},
	solver::{
		engine::{
			activation_list::{ActivationList, IntEvent},
			int_var::{IntVar, IntVarRef},
			trail::{Trail, TrailedInt},
		},
		queue::{PriorityLevel, PriorityQueue},
		view::IntViewInner,
		SolverConfiguration,
	},
	IntVal, IntView,
};

#[derive(Debug, Default, Clone)]
/// The propagation engine: the propagators and the state they operate on.
pub(crate) struct Engine {
	/// Storage of the propagators.
	pub(crate) propagators: IndexVec<PropRef, BoxedPropagator>,
	/// Internal State representation of the propagation engine.
	pub(crate) state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
/// The (trailed) status of a propagator.
pub(crate) enum PropagatorStatus {
	/// The propagator is awoken by the events it is subscribed to.
	Active,
	/// The constraint of the propagator is guaranteed to be satisfied.
	Entailed,
	/// The propagator detected that its constraint cannot be satisfied.
	Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
/// Statistics collected by the propagation engine while it is used by a search
/// process.
pub struct SearchStatistics {
	/// Number of contradictions encountered
	contradictions: u64,
	/// Peak search depth
	peak_depth: u32,
	/// Number of times the full propagation of a propagator was run
	propagations: u64,
	/// Number of times an event handler of a propagator was called
	awakenings: u64,
	/// Number of restores of the solver state
	backtracks: u64,
}

#[derive(Clone, Debug)]
/// The state of the engine that is accessible to the propagators.
pub(crate) struct State {
	/// Solver configuration
	pub(crate) config: SolverConfiguration,

	// ---- Trailed Value Infrastructure (e.g., decision variables) ----
	/// Storage for the integer variables
	pub(crate) int_vars: IndexVec<IntVarRef, IntVar>,
	/// Trailed Storage
	/// Includes the bounds and the value sets of the integer variables, and the
	/// status of the propagators.
	pub(crate) trail: Trail,
	/// The status of each propagator (see [`PropagatorStatus`]).
	pub(crate) prop_status: IndexVec<PropRef, TrailedInt>,
	/// The contradiction that was detected, if any.
	///
	/// The solver remains in a failed state until it is restored to an earlier
	/// state.
	pub(crate) failed: Option<Contradiction>,

	// ---- Non-Trailed Infrastructure ----
	/// Solving statistics
	pub(crate) statistics: SearchStatistics,
	/// The propagator that is currently being run.
	pub(crate) active: PropRef,

	// ---- Queueing Infrastructure ----
	/// Integer variable enqueueing information
	pub(crate) int_activation: IndexVec<IntVarRef, ActivationList>,
	/// Events that have not yet been communicated to the propagators
	pub(crate) event_queue: VecDeque<(IntVarRef, IntEvent)>,
	/// Queue of propagators awaiting their full propagation
	pub(crate) propagator_queue: PriorityQueue<PropRef>,
	/// Priority within the queue for each propagator
	pub(crate) propagator_priority: IndexVec<PropRef, PriorityLevel>,
	/// Flag for whether a propagator is enqueued
	pub(crate) enqueued: IndexVec<PropRef, bool>,
}

impl Engine {
	/// Check whether the constraint of a propagator is entailed by the current
	/// state.
	pub(crate) fn is_entailed(&self, prop: PropRef) -> Entailment {
		match self.state.prop_status(prop) {
			PropagatorStatus::Entailed => Entailment::Entailed,
			PropagatorStatus::Failed => Entailment::Disentailed,
			PropagatorStatus::Active => self.propagators[prop].is_entailed(&self.state),
		}
	}

	/// Process the consequences of running a propagator.
	fn notify_result(
		&mut self,
		prop: PropRef,
		result: Result<(), Contradiction>,
	) -> Result<(), Contradiction> {
		let result = result.and_then(|()| {
			if !self.state.config.check_entailment || !self.state.is_active(prop) {
				return Ok(());
			}
			match self.propagators[prop].is_entailed(&self.state) {
				Entailment::Entailed => {
					trace!(prop = usize::from(prop), "propagator entailed");
					self.state.set_prop_status(prop, PropagatorStatus::Entailed);
					Ok(())
				}
				Entailment::Disentailed => Err(self
					.state
					.notify_contradiction(Contradiction::Failure(prop))),
				Entailment::Unknown => Ok(()),
			}
		});
		if let Err(contradiction) = &result {
			debug!(prop = usize::from(prop), %contradiction, "propagator failed");
			self.state.set_prop_status(prop, PropagatorStatus::Failed);
			self.state.clear_queues();
		}
		result
	}

	/// Run the propagators until no more events are pending and no propagator
	/// is scheduled, or until a contradiction is detected.
	///
	/// Events are communicated to the event handlers of the subscribed
	/// propagators in the order in which they occurred. The full propagation of
	/// scheduled propagators only runs when no events are pending.
	pub(crate) fn propagate_all(&mut self) -> Result<(), Contradiction> {
		if let Some(contradiction) = &self.state.failed {
			return Err(contradiction.clone());
		}
		loop {
			if let Some((iv, event)) = self.state.event_queue.pop_front() {
				// Note that the activation list does not change during propagation
				for i in 0..self.state.int_activation[iv].len() {
					let watch = self.state.int_activation[iv].get(i);
					if !watch.condition.is_activated_by(event) || !self.state.is_active(watch.prop) {
						continue;
					}
					self.state.active = watch.prop;
					self.state.statistics.awakenings += 1;
					let prop = &mut self.propagators[watch.prop];
					let state = &mut self.state;
					let result = match event {
						IntEvent::LowerBound => prop.awake_on_inf(state, watch.idx),
						IntEvent::UpperBound => prop.awake_on_sup(state, watch.idx),
						IntEvent::Fixed => prop.awake_on_inst(state, watch.idx),
						IntEvent::Removal(val) => prop.awake_on_rem(state, watch.idx, val),
					};
					self.notify_result(watch.prop, result)?;
				}
			} else if let Some(prop) = self.state.propagator_queue.pop() {
				self.state.enqueued[prop] = false;
				if !self.state.is_active(prop) {
					continue;
				}
				trace!(prop = usize::from(prop), "run propagator");
				self.state.active = prop;
				self.state.statistics.propagations += 1;
				let result = self.propagators[prop].propagate(&mut self.state);
				self.notify_result(prop, result)?;
			} else {
				debug!(
					level = self.state.decision_level(),
					trail = self.state.trail.len(),
					"fixpoint reached"
				);
				return Ok(());
			}
		}
	}
}

impl SearchStatistics {
	/// Returns the number of event handlers of propagators that were called.
	pub fn awakenings(&self) -> u64 {
		self.awakenings
	}
	/// Returns the number of times the solver state was restored.
	pub fn backtracks(&self) -> u64 {
		self.backtracks
	}
	/// Returns the number of contradictions encountered.
	pub fn contradictions(&self) -> u64 {
		self.contradictions
	}
	/// Returns the peak depth of the search tree.
	pub fn peak_depth(&self) -> u32 {
		self.peak_depth
	}
	/// Returns the number of full propagations performed by the propagators.
	pub fn propagations(&self) -> u64 {
		self.propagations
	}
}

impl State {
	/// Remove all pending events and scheduled propagators.
	fn clear_queues(&mut self) {
		self.event_queue.clear();
		let enqueued = &mut self.enqueued;
		self.propagator_queue.drain(|p| enqueued[p] = false);
	}

	/// Returns the current decision level of the solver.
	pub(crate) fn decision_level(&self) -> u32 {
		self.trail.decision_level()
	}

	/// Schedule the full propagation of a propagator, if it is not already
	/// scheduled.
	pub(crate) fn enqueue_propagator(&mut self, prop: PropRef) {
		if !self.enqueued[prop] && self.is_active(prop) {
			self.propagator_queue
				.insert(self.propagator_priority[prop], prop);
			self.enqueued[prop] = true;
		}
	}

	/// Returns whether the propagator is awoken by events.
	pub(crate) fn is_active(&self, prop: PropRef) -> bool {
		self.prop_status(prop) == PropagatorStatus::Active
	}

	/// Record a contradiction, returning it so it can be returned as an error.
	pub(crate) fn notify_contradiction(&mut self, contradiction: Contradiction) -> Contradiction {
		trace!(%contradiction, "contradiction");
		self.statistics.contradictions += 1;
		if self.failed.is_none() {
			self.failed = Some(contradiction.clone());
		}
		contradiction
	}

	/// Internal method called to restore the state to an earlier decision level.
	pub(crate) fn notify_backtrack(&mut self, level: u32) {
		if level >= self.decision_level() {
			return;
		}
		self.trail.notify_backtrack(level as usize);
		self.clear_queues();
		self.failed = None;
		self.statistics.backtracks += 1;
		debug!(level, "restore");
	}

	/// Register that the domain of an integer variable has changed.
	fn notify_int_event(&mut self, iv: IntVarRef, event: IntEvent) {
		trace!(int_var = usize::from(iv), ?event, "domain change");
		if self.int_activation[iv].len() > 0 {
			self.event_queue.push_back((iv, event));
		}
	}

	/// Internal method called to trigger a new decision level.
	pub(crate) fn notify_new_decision_level(&mut self) {
		self.trail.notify_new_decision_level();

		// Update peak decision level
		let new_level = self.decision_level();
		if new_level > self.statistics.peak_depth {
			self.statistics.peak_depth = new_level;
		}
		debug!(level = new_level, "checkpoint");
	}

	/// Returns the status of a propagator.
	fn prop_status(&self, prop: PropRef) -> PropagatorStatus {
		match self.trail.get_trailed_int(self.prop_status[prop]) {
			0 => PropagatorStatus::Active,
			1 => PropagatorStatus::Entailed,
			_ => PropagatorStatus::Failed,
		}
	}

	/// Change the status of a propagator (until the solver backtracks).
	fn set_prop_status(&mut self, prop: PropRef, status: PropagatorStatus) {
		let _ = self
			.trail
			.set_trailed_int(self.prop_status[prop], status as IntVal);
	}

	/// Record that the domain of an integer variable became empty.
	fn wipeout(&mut self, iv: IntVarRef) -> Contradiction {
		self.notify_contradiction(Contradiction::DomainWipeout(iv))
	}
}

impl Default for State {
	fn default() -> Self {
		Self {
			config: SolverConfiguration::default(),
			int_vars: IndexVec::new(),
			trail: Trail::default(),
			prop_status: IndexVec::new(),
			failed: None,
			statistics: SearchStatistics::default(),
			active: PropRef::new(0),
			int_activation: IndexVec::new(),
			event_queue: VecDeque::new(),
			propagator_queue: PriorityQueue::default(),
			propagator_priority: IndexVec::new(),
			enqueued: IndexVec::new(),
		}
	}
}

impl DecisionActions for State {
	fn set_int_lower_bound(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction> {
		let iv = match var.0 {
			IntViewInner::VarRef(iv) => iv,
			IntViewInner::Const(c) if c >= val => return Ok(false),
			IntViewInner::Const(c) => {
				return Err(self.notify_contradiction(Contradiction::ConstantMismatch(c)))
			}
		};
		let (lb, ub) = self.int_vars[iv].get_bounds(&self.trail);
		if val <= lb {
			return Ok(false);
		}
		let Some(new_lb) = self.int_vars[iv].first_value_from(&self.trail, val) else {
			return Err(self.wipeout(iv));
		};
		let _ = self.int_vars[iv].notify_lower_bound(&mut self.trail, new_lb);
		self.notify_int_event(iv, IntEvent::LowerBound);
		if new_lb == ub {
			self.notify_int_event(iv, IntEvent::Fixed);
		}
		Ok(true)
	}

	fn set_int_upper_bound(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction> {
		let iv = match var.0 {
			IntViewInner::VarRef(iv) => iv,
			IntViewInner::Const(c) if c <= val => return Ok(false),
			IntViewInner::Const(c) => {
				return Err(self.notify_contradiction(Contradiction::ConstantMismatch(c)))
			}
		};
		let (lb, ub) = self.int_vars[iv].get_bounds(&self.trail);
		if val >= ub {
			return Ok(false);
		}
		let Some(new_ub) = self.int_vars[iv].last_value_to(&self.trail, val) else {
			return Err(self.wipeout(iv));
		};
		let _ = self.int_vars[iv].notify_upper_bound(&mut self.trail, new_ub);
		self.notify_int_event(iv, IntEvent::UpperBound);
		if new_ub == lb {
			self.notify_int_event(iv, IntEvent::Fixed);
		}
		Ok(true)
	}

	fn set_int_val(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction> {
		let iv = match var.0 {
			IntViewInner::VarRef(iv) => iv,
			IntViewInner::Const(c) if c == val => return Ok(false),
			IntViewInner::Const(c) => {
				return Err(self.notify_contradiction(Contradiction::ConstantMismatch(c)))
			}
		};
		if !self.int_vars[iv].contains(&self.trail, val) {
			return Err(self.wipeout(iv));
		}
		let (lb, ub) = self.int_vars[iv].get_bounds(&self.trail);
		if lb == ub {
			return Ok(false);
		}
		if lb < val {
			let _ = self.int_vars[iv].notify_lower_bound(&mut self.trail, val);
			self.notify_int_event(iv, IntEvent::LowerBound);
		}
		if val < ub {
			let _ = self.int_vars[iv].notify_upper_bound(&mut self.trail, val);
			self.notify_int_event(iv, IntEvent::UpperBound);
		}
		self.notify_int_event(iv, IntEvent::Fixed);
		Ok(true)
	}

	fn set_int_not_eq(&mut self, var: IntView, val: IntVal) -> Result<bool, Contradiction> {
		let iv = match var.0 {
			IntViewInner::VarRef(iv) => iv,
			IntViewInner::Const(c) if c != val => return Ok(false),
			IntViewInner::Const(c) => {
				return Err(self.notify_contradiction(Contradiction::ConstantMismatch(c)))
			}
		};
		if !self.int_vars[iv].contains(&self.trail, val) {
			return Ok(false);
		}
		let (lb, ub) = self.int_vars[iv].get_bounds(&self.trail);
		if lb == ub {
			Err(self.wipeout(iv))
		} else if val == lb {
			self.set_int_lower_bound(var, val + 1)
		} else if val == ub {
			self.set_int_upper_bound(var, val - 1)
		} else if self.int_vars[iv].is_enumerated() {
			self.int_vars[iv].notify_removal(&mut self.trail, val);
			self.notify_int_event(iv, IntEvent::Removal(val));
			Ok(true)
		} else {
			// Holes cannot be represented in an interval domain
			Ok(false)
		}
	}
}

impl InspectionActions for State {
	fn check_int_in_domain(&self, var: IntView, val: IntVal) -> bool {
		match var.0 {
			IntViewInner::VarRef(iv) => self.int_vars[iv].contains(&self.trail, val),
			IntViewInner::Const(c) => c == val,
		}
	}

	fn get_int_domain_size(&self, var: IntView) -> usize {
		match var.0 {
			IntViewInner::VarRef(iv) => self.int_vars[iv].size(&self.trail),
			IntViewInner::Const(_) => 1,
		}
	}

	fn get_int_lower_bound(&self, var: IntView) -> IntVal {
		match var.0 {
			IntViewInner::VarRef(iv) => self.int_vars[iv].get_lower_bound(&self.trail),
			IntViewInner::Const(c) => c,
		}
	}

	fn get_int_next_value(&self, var: IntView, val: IntVal) -> Option<IntVal> {
		match var.0 {
			IntViewInner::VarRef(iv) => self.int_vars[iv].next_value(&self.trail, val),
			IntViewInner::Const(c) => (c > val).then_some(c),
		}
	}

	fn get_int_prev_value(&self, var: IntView, val: IntVal) -> Option<IntVal> {
		match var.0 {
			IntViewInner::VarRef(iv) => self.int_vars[iv].prev_value(&self.trail, val),
			IntViewInner::Const(c) => (c < val).then_some(c),
		}
	}

	fn get_int_upper_bound(&self, var: IntView) -> IntVal {
		match var.0 {
			IntViewInner::VarRef(iv) => self.int_vars[iv].get_upper_bound(&self.trail),
			IntViewInner::Const(c) => c,
		}
	}
}

impl PropagationActions for State {
	fn fail(&mut self) -> Contradiction {
		self.notify_contradiction(Contradiction::Failure(self.active))
	}

	fn schedule_propagate(&mut self) {
		self.enqueue_propagator(self.active);
	}

	fn set_entailed(&mut self) {
		trace!(prop = usize::from(self.active), "propagator entailed");
		self.set_prop_status(self.active, PropagatorStatus::Entailed);
	}
}

impl TrailingActions for State {
	delegate! {
		to self.trail {
			fn get_trailed_int(&self, x: TrailedInt) -> IntVal;
			fn set_trailed_int(&mut self, x: TrailedInt, v: IntVal) -> IntVal;
		}
	}
}

index_vec::define_index_type! {
	/// Identifies an propagator in a [`Solver`]
	pub struct PropRef = u32;
}
