//! Propagator for the `array_var_int_element` constraint, which enforces that
//! a value variable is equal to the element of an array of decision variables
//! selected by an index variable.

use std::iter::successors;

use crate::{
	actions::{InspectionActions, PropagationActions, PropagatorInitActions},
	propagator::{Contradiction, Entailment, Propagator},
	solver::{
		engine::{activation_list::IntPropCond, trail::TrailedInt, PropRef},
		queue::PriorityLevel,
		value::Valuation,
		view::IntViewInner,
	},
	IntVal, IntView, ModelError, Solver,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// Bounds consistent propagator for the constraint `value = array[index -
/// offset]`.
///
/// Holes are removed from the index and value variables when they are stored
/// as [`crate::DomainStorage::Enumerated`].
pub struct ArrayVarIntElement {
	/// The candidates from which the value is selected.
	array: Vec<IntView>,
	/// The variable selecting a candidate.
	index: IntView,
	/// The value of `index` that selects the first candidate.
	offset: IntVal,
	/// The variable equal to the selected candidate.
	value: IntView,
	/// Whether values can be removed from the domain of `value` between its
	/// bounds.
	value_holes: bool,
	/// Last seen lower bound of every candidate.
	seen_lb: Vec<TrailedInt>,
	/// Last seen upper bound of every candidate.
	seen_ub: Vec<TrailedInt>,
	/// Last seen lower bound of `index`.
	index_lb: TrailedInt,
	/// Last seen upper bound of `index`.
	index_ub: TrailedInt,
	/// Last seen lower bound of `value`.
	value_lb: TrailedInt,
	/// Last seen upper bound of `value`.
	value_ub: TrailedInt,
	/// Position of a candidate whose lower bound is the lower bound of `value`.
	min_support: TrailedInt,
	/// Position of a candidate whose upper bound is the upper bound of `value`.
	max_support: TrailedInt,
}

impl ArrayVarIntElement {
	/// Create a new [`ArrayVarIntElement`] propagator in the solver, enforcing
	/// that `value` is equal to the element of `array` at position `index -
	/// offset`.
	pub fn new_in(
		solver: &mut Solver,
		array: Vec<IntView>,
		index: IntView,
		offset: IntVal,
		value: IntView,
	) -> Result<PropRef, ModelError> {
		if array.is_empty() {
			return Err(ModelError::EmptyArray);
		}

		let mut seen_lb = Vec::with_capacity(array.len());
		let mut seen_ub = Vec::with_capacity(array.len());
		for &x in &array {
			let (lb, ub) = solver.get_int_bounds(x);
			seen_lb.push(solver.new_trailed_int(lb));
			seen_ub.push(solver.new_trailed_int(ub));
		}
		let (lb, ub) = solver.get_int_bounds(index);
		let index_lb = solver.new_trailed_int(lb);
		let index_ub = solver.new_trailed_int(ub);
		let (lb, ub) = solver.get_int_bounds(value);
		let value_lb = solver.new_trailed_int(lb);
		let value_ub = solver.new_trailed_int(ub);
		let min_support = solver.new_trailed_int(0);
		let max_support = solver.new_trailed_int(0);
		let value_holes = match value.0 {
			IntViewInner::VarRef(iv) => solver.engine.state.int_vars[iv].is_enumerated(),
			IntViewInner::Const(_) => false,
		};

		let n = array.len() as u32;
		let prop = solver.add_propagator(
			Box::new(Self {
				array: array.clone(),
				index,
				offset,
				value,
				value_holes,
				seen_lb,
				seen_ub,
				index_lb,
				index_ub,
				value_lb,
				value_ub,
				min_support,
				max_support,
			}),
			PriorityLevel::Low,
		);
		for (i, x) in array.into_iter().enumerate() {
			solver.enqueue_on_int_change(prop, x, i as u32, IntPropCond::Domain);
		}
		solver.enqueue_on_int_change(prop, index, n, IntPropCond::Domain);
		solver.enqueue_on_int_change(prop, value, n + 1, IntPropCond::Domain);
		Ok(prop)
	}

	/// Handle a change to the bounds of the candidate at position `pos`.
	fn candidate_bounds_changed<P: PropagationActions>(
		&self,
		actions: &mut P,
		pos: usize,
	) -> Result<(), Contradiction> {
		let (lb, ub) = actions.get_int_bounds(self.array[pos]);
		let lb_changed = actions.set_trailed_int(self.seen_lb[pos], lb) != lb;
		let ub_changed = actions.set_trailed_int(self.seen_ub[pos], ub) != ub;
		if !lb_changed && !ub_changed {
			return Ok(());
		}
		if let Some(fixed) = self.fixed_position(actions) {
			if fixed == pos {
				self.propagate_equality(actions, pos)?;
			}
			return Ok(());
		}
		if !self.in_index(actions, pos) {
			return Ok(());
		}

		self.filter_candidate(actions, pos)?;
		let min_support = actions.get_trailed_int(self.min_support) as usize;
		let max_support = actions.get_trailed_int(self.max_support) as usize;
		if (lb_changed && min_support == pos) || (ub_changed && max_support == pos) {
			let _ = self.update_value_bounds(actions)?;
		}
		if self.value_holes {
			actions.schedule_propagate();
		}
		Ok(())
	}

	/// Returns whether the domains of `a` and `b` share at least one value.
	fn domains_intersect<P: InspectionActions>(actions: &P, a: IntView, b: IntView) -> bool {
		let mut x = actions.get_int_lower_bound(a);
		let mut y = actions.get_int_lower_bound(b);
		loop {
			if x == y {
				return true;
			}
			let (var, from, to) = if x < y {
				(a, y, &mut x)
			} else {
				(b, x, &mut y)
			};
			match actions.get_int_next_value(var, from - 1) {
				Some(v) => *to = v,
				None => return false,
			}
		}
	}

	/// Remove the position of the candidate at `pos` from `index` if the
	/// candidate shares no value with `value`.
	fn filter_candidate<P: PropagationActions>(
		&self,
		actions: &mut P,
		pos: usize,
	) -> Result<(), Contradiction> {
		if !Self::domains_intersect(actions, self.array[pos], self.value) {
			let _ = actions.set_int_not_eq(self.index, self.index_value(pos))?;
		}
		Ok(())
	}

	/// Remove from `index` the positions of candidates that share no value with
	/// `value`.
	fn filter_index<P: PropagationActions>(&self, actions: &mut P) -> Result<bool, Contradiction> {
		let mut changed = false;
		for (pos, &x) in self.array.iter().enumerate() {
			if self.in_index(actions, pos) && !Self::domains_intersect(actions, x, self.value) {
				changed |= actions.set_int_not_eq(self.index, self.index_value(pos))?;
			}
		}
		Ok(changed)
	}

	/// Remove the bounds of `index` for as long as they select candidates that
	/// share no value with `value`.
	///
	/// Positions strictly between the bounds can only be removed from `index`
	/// when it is stored as [`crate::DomainStorage::Enumerated`], so the bounds
	/// are checked again whenever they move.
	fn filter_index_bounds<P: PropagationActions>(
		&self,
		actions: &mut P,
	) -> Result<(), Contradiction> {
		loop {
			let (lb, ub) = actions.get_int_bounds(self.index);
			let mut changed = false;
			for i in [lb, ub] {
				let pos = i - self.offset;
				if (0..self.array.len() as IntVal).contains(&pos)
					&& !Self::domains_intersect(actions, self.array[pos as usize], self.value)
				{
					changed |= actions.set_int_not_eq(self.index, i)?;
				}
			}
			if !changed {
				return Ok(());
			}
		}
	}

	/// Restrict `value` to the values of the candidates that can still be
	/// selected.
	fn filter_value<P: PropagationActions>(&self, actions: &mut P) -> Result<bool, Contradiction> {
		let mut changed = self.update_value_bounds(actions)?;
		if self.value_holes {
			for v in domain_values(actions, self.value) {
				let supported = (0..self.array.len()).any(|pos| {
					self.in_index(actions, pos) && actions.check_int_in_domain(self.array[pos], v)
				});
				if !supported {
					changed |= actions.set_int_not_eq(self.value, v)?;
				}
			}
		}
		Ok(changed)
	}

	/// Returns the position of the selected candidate if `index` is fixed to a
	/// value that selects a candidate.
	fn fixed_position<P: InspectionActions>(&self, actions: &P) -> Option<usize> {
		let i = actions.get_int_val(self.index)?;
		let pos = i - self.offset;
		(0..self.array.len() as IntVal)
			.contains(&pos)
			.then_some(pos as usize)
	}

	/// Returns whether `index` can select the candidate at position `pos`.
	fn in_index<P: InspectionActions>(&self, actions: &P, pos: usize) -> bool {
		actions.check_int_in_domain(self.index, self.index_value(pos))
	}

	/// Handle a change to the domain of `index`, where `removed` identifies the
	/// values of `index` that are no longer in its domain.
	fn index_changed<P: PropagationActions>(
		&self,
		actions: &mut P,
		removed: impl Fn(IntVal) -> bool,
	) -> Result<(), Contradiction> {
		if actions.get_int_val(self.index).is_some() {
			actions.schedule_propagate();
			return Ok(());
		}
		self.filter_index_bounds(actions)?;
		if actions.get_int_val(self.index).is_some() {
			actions.schedule_propagate();
			return Ok(());
		}
		let min_support = actions.get_trailed_int(self.min_support) as usize;
		let max_support = actions.get_trailed_int(self.max_support) as usize;
		if removed(self.index_value(min_support)) || removed(self.index_value(max_support)) {
			let _ = self.update_value_bounds(actions)?;
		}
		if self.value_holes {
			actions.schedule_propagate();
		}
		Ok(())
	}

	/// The value of `index` that selects the candidate at position `pos`.
	fn index_value(&self, pos: usize) -> IntVal {
		self.offset + pos as IntVal
	}

	/// Enforce that `value` is equal to the candidate at position `pos`, after
	/// `index` has been fixed.
	fn propagate_equality<P: PropagationActions>(
		&self,
		actions: &mut P,
		pos: usize,
	) -> Result<(), Contradiction> {
		let x = self.array[pos];
		loop {
			let (x_lb, x_ub) = actions.get_int_bounds(x);
			let (v_lb, v_ub) = actions.get_int_bounds(self.value);
			let (lb, ub) = (x_lb.max(v_lb), x_ub.min(v_ub));
			let mut changed = actions.set_int_lower_bound(x, lb)?;
			changed |= actions.set_int_lower_bound(self.value, lb)?;
			changed |= actions.set_int_upper_bound(x, ub)?;
			changed |= actions.set_int_upper_bound(self.value, ub)?;
			for (from, to) in [(x, self.value), (self.value, x)] {
				if has_holes(actions, from) {
					for v in domain_values(actions, to) {
						if !actions.check_int_in_domain(from, v) {
							changed |= actions.set_int_not_eq(to, v)?;
						}
					}
				}
			}
			if !changed {
				break;
			}
		}
		if actions.get_int_val(self.value).is_some() && actions.get_int_val(x).is_some() {
			actions.set_entailed();
		}
		Ok(())
	}

	/// Record the current bounds of all variables as seen.
	fn record_bounds<P: PropagationActions>(&self, actions: &mut P) {
		for (pos, &x) in self.array.iter().enumerate() {
			let (lb, ub) = actions.get_int_bounds(x);
			let _ = actions.set_trailed_int(self.seen_lb[pos], lb);
			let _ = actions.set_trailed_int(self.seen_ub[pos], ub);
		}
		for (var, lb_cell, ub_cell) in [
			(self.index, self.index_lb, self.index_ub),
			(self.value, self.value_lb, self.value_ub),
		] {
			let (lb, ub) = actions.get_int_bounds(var);
			let _ = actions.set_trailed_int(lb_cell, lb);
			let _ = actions.set_trailed_int(ub_cell, ub);
		}
	}

	/// Recompute the candidates supporting the bounds of `value`, and enforce
	/// these bounds.
	fn update_value_bounds<P: PropagationActions>(
		&self,
		actions: &mut P,
	) -> Result<bool, Contradiction> {
		let mut support: Option<((IntVal, usize), (IntVal, usize))> = None;
		for (pos, &x) in self.array.iter().enumerate() {
			if !self.in_index(actions, pos) {
				continue;
			}
			let (lb, ub) = actions.get_int_bounds(x);
			support = Some(match support {
				None => ((lb, pos), (ub, pos)),
				Some((min, max)) => (
					if lb < min.0 { (lb, pos) } else { min },
					if ub > max.0 { (ub, pos) } else { max },
				),
			});
		}
		let Some(((lb, min_pos), (ub, max_pos))) = support else {
			return Err(actions.fail());
		};
		let _ = actions.set_trailed_int(self.min_support, min_pos as IntVal);
		let _ = actions.set_trailed_int(self.max_support, max_pos as IntVal);
		let mut changed = actions.set_int_lower_bound(self.value, lb)?;
		changed |= actions.set_int_upper_bound(self.value, ub)?;
		Ok(changed)
	}

	/// Handle a change to the bounds of `value`.
	fn value_bounds_changed<P: PropagationActions>(
		&self,
		actions: &mut P,
	) -> Result<(), Contradiction> {
		let (lb, ub) = actions.get_int_bounds(self.value);
		let lb_changed = actions.set_trailed_int(self.value_lb, lb) != lb;
		let ub_changed = actions.set_trailed_int(self.value_ub, ub) != ub;
		if !lb_changed && !ub_changed {
			return Ok(());
		}
		if let Some(pos) = self.fixed_position(actions) {
			return self.propagate_equality(actions, pos);
		}
		for pos in 0..self.array.len() {
			if self.in_index(actions, pos) {
				self.filter_candidate(actions, pos)?;
			}
		}
		Ok(())
	}
}

impl<P: PropagationActions> Propagator<P> for ArrayVarIntElement {
	fn awake_on_inf(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		let n = self.array.len() as u32;
		match idx {
			i if i < n => self.candidate_bounds_changed(actions, i as usize),
			i if i == n => {
				let lb = actions.get_int_lower_bound(self.index);
				let old = actions.set_trailed_int(self.index_lb, lb);
				self.index_changed(actions, |v| (old..lb).contains(&v))
			}
			_ => self.value_bounds_changed(actions),
		}
	}

	fn awake_on_inst(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		if idx == self.array.len() as u32 {
			actions.schedule_propagate();
		}
		Ok(())
	}

	fn awake_on_rem(&mut self, actions: &mut P, idx: u32, val: IntVal) -> Result<(), Contradiction> {
		let n = self.array.len() as u32;
		match idx {
			i if i < n => match self.fixed_position(actions) {
				Some(pos) if pos == i as usize => {
					let _ = actions.set_int_not_eq(self.value, val)?;
				}
				Some(_) => {}
				None => {
					if self.in_index(actions, i as usize) {
						self.filter_candidate(actions, i as usize)?;
					}
					if self.value_holes {
						actions.schedule_propagate();
					}
				}
			},
			i if i == n => self.index_changed(actions, |v| v == val)?,
			_ => match self.fixed_position(actions) {
				Some(pos) => {
					let _ = actions.set_int_not_eq(self.array[pos], val)?;
				}
				None => actions.schedule_propagate(),
			},
		}
		Ok(())
	}

	fn awake_on_sup(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		let n = self.array.len() as u32;
		match idx {
			i if i < n => self.candidate_bounds_changed(actions, i as usize),
			i if i == n => {
				let ub = actions.get_int_upper_bound(self.index);
				let old = actions.set_trailed_int(self.index_ub, ub);
				self.index_changed(actions, |v| v > ub && v <= old)
			}
			_ => self.value_bounds_changed(actions),
		}
	}

	fn is_entailed(&self, actions: &P) -> Entailment {
		let Some(i) = actions.get_int_val(self.index) else {
			return Entailment::Unknown;
		};
		let Some(pos) = self.fixed_position(actions) else {
			debug_assert!(i < self.offset || i >= self.index_value(self.array.len()));
			return Entailment::Disentailed;
		};
		let x = self.array[pos];
		match (actions.get_int_val(x), actions.get_int_val(self.value)) {
			(Some(a), Some(b)) if a == b => Entailment::Entailed,
			_ if !Self::domains_intersect(actions, x, self.value) => Entailment::Disentailed,
			_ => Entailment::Unknown,
		}
	}

	fn is_satisfied(&self, sol: &dyn Valuation) -> bool {
		let pos = sol(self.index) - self.offset;
		(0..self.array.len() as IntVal).contains(&pos)
			&& sol(self.array[pos as usize]) == sol(self.value)
	}

	#[tracing::instrument(name = "array_var_int_element", level = "trace", skip(self, actions))]
	fn propagate(&mut self, actions: &mut P) -> Result<(), Contradiction> {
		let _ = actions.set_int_lower_bound(self.index, self.offset)?;
		let _ = actions.set_int_upper_bound(self.index, self.index_value(self.array.len() - 1))?;
		loop {
			if let Some(pos) = self.fixed_position(actions) {
				self.propagate_equality(actions, pos)?;
				break;
			}
			let mut changed = self.filter_index(actions)?;
			changed |= self.filter_value(actions)?;
			if !changed && actions.get_int_val(self.index).is_none() {
				break;
			}
		}
		self.record_bounds(actions);
		Ok(())
	}
}

/// Returns whether values are missing from the domain of `var` between its
/// bounds.
fn has_holes<P: InspectionActions>(actions: &P, var: IntView) -> bool {
	let (lb, ub) = actions.get_int_bounds(var);
	(actions.get_int_domain_size(var) as IntVal) < ub - lb + 1
}

/// Collect the values in the domain of `var` in increasing order.
fn domain_values<P: InspectionActions>(actions: &P, var: IntView) -> Vec<IntVal> {
	let lb = actions.get_int_lower_bound(var);
	successors(Some(lb), |&v| actions.get_int_next_value(var, v)).collect()
}

#[cfg(test)]
mod tests {
	use expect_test::expect;
	use itertools::Itertools;
	use rangelist::RangeList;
	use tracing_test::traced_test;

	use crate::{
		actions::{DecisionActions, InspectionActions},
		tests::{brute_force, range_values},
		ArrayVarIntElement, Contradiction, DomainStorage, Entailment, IntVal, IntView, ModelError,
		Solver,
	};

	/// Create the element constraint over the constant array `[1, 2, 0, 4, 3]`.
	fn constant_array(slv: &mut Solver, storage: DomainStorage) -> (IntView, IntView) {
		let index = slv
			.new_int_var(RangeList::from_iter([-3..=10]), storage)
			.unwrap();
		let value = slv
			.new_int_var(RangeList::from_iter([-20..=20]), storage)
			.unwrap();
		let array = [1, 2, 0, 4, 3].into_iter().map(IntView::from).collect();
		let _ = ArrayVarIntElement::new_in(slv, array, index, 0, value).unwrap();
		(index, value)
	}

	#[test]
	#[traced_test]
	fn test_element_constant_array() {
		let mut slv = Solver::default();
		let (index, value) = constant_array(&mut slv, DomainStorage::Interval);
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(index), (0, 4));
		assert_eq!(slv.get_int_bounds(value), (0, 4));

		slv.expect_solutions(
			&[index, value],
			expect![[r#"
			0, 1
			1, 2
			2, 0
			3, 4
			4, 3"#]],
		);
	}

	#[test]
	#[traced_test]
	fn test_element_fixed_index() {
		let mut slv = Solver::default();
		let (index, value) = constant_array(&mut slv, DomainStorage::Enumerated);
		assert_eq!(slv.set_int_val(index, 2), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(value), Some(0));
	}

	#[test]
	#[traced_test]
	fn test_element_fixed_value() {
		let mut slv = Solver::default();
		let (index, value) = constant_array(&mut slv, DomainStorage::Enumerated);
		slv.propagate_all().unwrap();
		let _ = slv.checkpoint();
		assert_eq!(slv.set_int_val(value, 4), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(index), Some(3));
		assert_eq!(
			slv.set_int_not_eq(index, 3),
			Err(Contradiction::DomainWipeout(index.var_ref().unwrap()))
		);
	}

	#[test]
	#[traced_test]
	fn test_element_value_holes() {
		let mut slv = Solver::default();
		let a = slv
			.new_int_var(RangeList::from_iter([1..=1, 3..=3]), DomainStorage::Enumerated)
			.unwrap();
		let b = slv
			.new_int_var(RangeList::from_iter([6..=7]), DomainStorage::Enumerated)
			.unwrap();
		let index = slv
			.new_int_var(RangeList::from_iter([1..=2]), DomainStorage::Enumerated)
			.unwrap();
		let value = slv
			.new_int_var(RangeList::from_iter([0..=10]), DomainStorage::Enumerated)
			.unwrap();
		let prop = ArrayVarIntElement::new_in(&mut slv, vec![a, b], index, 1, value).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(value), (1, 7));
		assert_eq!(slv.get_int_domain_size(value), 4);
		assert!(!slv.check_int_in_domain(value, 2));

		let _ = slv.checkpoint();
		assert_eq!(slv.set_int_upper_bound(value, 5), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(index), Some(1));
		assert_eq!(slv.get_int_domain_size(value), 2);
		assert_eq!(slv.is_entailed(prop), Entailment::Unknown);

		assert_eq!(slv.set_int_val(a, 3), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(value), Some(3));
		assert_eq!(slv.is_entailed(prop), Entailment::Entailed);
	}

	#[test]
	#[traced_test]
	fn test_element_variable_array() {
		let mut slv = Solver::default();
		let vars = [0..=1, 1..=2, 3..=3]
			.into_iter()
			.map(|r| {
				slv.new_int_var(RangeList::from_iter([r]), DomainStorage::Enumerated)
					.unwrap()
			})
			.collect::<Vec<_>>();
		let index = slv
			.new_int_var(RangeList::from_iter([0..=2]), DomainStorage::Enumerated)
			.unwrap();
		let value = slv
			.new_int_var(RangeList::from_iter([1..=2]), DomainStorage::Interval)
			.unwrap();
		let _ = ArrayVarIntElement::new_in(&mut slv, vars.clone(), index, 0, value).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(index), (0, 1));

		slv.expect_solutions(
			&[vars[0], vars[1], index, value],
			expect![[r#"
			0, 1, 1, 1
			0, 2, 1, 2
			1, 1, 0, 1
			1, 1, 1, 1
			1, 2, 0, 1
			1, 2, 1, 2"#]],
		);
	}

	#[test]
	#[traced_test]
	fn test_element_interval_index() {
		let mut slv = Solver::default();
		let x1 = slv
			.new_int_var(RangeList::from_iter([1..=4]), DomainStorage::Interval)
			.unwrap();
		let x2 = slv
			.new_int_var(RangeList::from_iter([1..=4]), DomainStorage::Interval)
			.unwrap();
		let index = slv
			.new_int_var(RangeList::from_iter([-1..=1]), DomainStorage::Interval)
			.unwrap();
		let value = slv
			.new_int_var(RangeList::from_iter([-1..=2]), DomainStorage::Interval)
			.unwrap();
		let array = vec![IntView::from(2), x1, x2];
		let _ = ArrayVarIntElement::new_in(&mut slv, array, index, -1, value).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(value), (1, 2));

		// The middle candidate no longer matches, but cannot be removed from the
		// interval index until the upper bound reaches it
		assert_eq!(slv.set_int_val(x1, 3), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(index), (-1, 1));
		assert_eq!(slv.set_int_val(x2, 3), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(index), Some(-1));
		assert_eq!(slv.get_int_val(value), Some(2));
	}

	#[test]
	fn test_element_brute_force() {
		let candidates: [&[(IntVal, IntVal)]; 4] =
			[&[(0, 1)], &[(1, 3)], &[(0, 0), (2, 2)], &[(2, 3)]];
		let indices: [&[(IntVal, IntVal)]; 3] = [&[(-1, 1)], &[(0, 2)], &[(0, 0), (2, 2)]];
		let values: [&[(IntVal, IntVal)]; 3] = [&[(0, 3)], &[(1, 2)], &[(0, 0), (3, 3)]];
		for storage in [DomainStorage::Interval, DomainStorage::Enumerated] {
			for array in (0..3).map(|_| candidates).multi_cartesian_product() {
				for (&index, &value) in indices.iter().cartesian_product(&values) {
					let mut slv = Solver::default();
					let mut new_var = |ranges: &[(IntVal, IntVal)]| {
						let ranges = ranges.iter().map(|&(lb, ub)| lb..=ub);
						slv.new_int_var(RangeList::from_iter(ranges), storage)
							.unwrap()
					};
					let mut vars = array.iter().map(|&d| new_var(d)).collect_vec();
					let index_var = new_var(index);
					let value_var = new_var(value);
					let _ =
						ArrayVarIntElement::new_in(&mut slv, vars.clone(), index_var, 0, value_var)
							.unwrap();
					vars.extend([index_var, value_var]);

					let domains = array
						.iter()
						.chain([&index, &value])
						.map(|d| range_values(d))
						.collect_vec();
					let expected = brute_force(&domains, |sol| {
						(0..3).contains(&sol[3]) && sol[sol[3] as usize] == sol[4]
					});
					assert_eq!(
						slv.branch_all(&vars),
						expected,
						"array {array:?}, index {index:?}, value {value:?}, {storage:?}"
					);
				}
			}
		}
	}

	#[test]
	fn test_element_empty_array() {
		let mut slv = Solver::default();
		let err =
			ArrayVarIntElement::new_in(&mut slv, Vec::new(), IntView::from(0), 0, IntView::from(0))
				.unwrap_err();
		assert_eq!(err, ModelError::EmptyArray);
	}
}
