//! Module containing the representation of integer variables within the solver.

use tracing::trace;

use crate::{
	actions::TrailingActions,
	solver::{
		engine::trail::{Trail, TrailedInt},
		view::IntViewInner,
		ModelError,
	},
	IntSetVal, IntVal, IntView, Solver,
};

/// Number of values stored in every trailed word of a bit set, such as a
/// [`ValueSet`].
pub(crate) const WORD_BITS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// The way in which the domain of an integer variable is stored.
pub enum DomainStorage {
	/// Only the bounds of the domain are kept. Values strictly between the
	/// bounds cannot be removed.
	#[default]
	Interval,
	/// Every value of the domain is kept, allowing the removal of values strictly
	/// between the bounds.
	Enumerated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The structure used to store information about an integer variable within
/// the solver.
pub(crate) struct IntVar {
	/// A trailed integer representing the current lower bound of the integer
	/// variable.
	lower_bound: TrailedInt,
	/// A trailed integer representing the current upper bound of the integer
	/// variable.
	upper_bound: TrailedInt,
	/// The values that remain in the domain, if the domain is enumerated.
	///
	/// Note that values outside of the current bounds might still be marked as
	/// present, the bounds take precedence.
	values: Option<ValueSet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A trailed bit set storing the values in the domain of an integer variable.
struct ValueSet {
	/// The value represented by the first bit of the first word.
	offset: IntVal,
	/// The words of the bit set, each storing [`WORD_BITS`] values.
	words: Vec<TrailedInt>,
}

index_vec::define_index_type! {
	/// Identifies an integer variable in a [`Solver`]
	pub struct IntVarRef = u32;
}

impl IntVar {
	/// Returns whether `val` is in the domain of the variable.
	pub(crate) fn contains(&self, trail: &impl TrailingActions, val: IntVal) -> bool {
		let (lb, ub) = self.get_bounds(trail);
		lb <= val
			&& val <= ub
			&& self
				.values
				.as_ref()
				.map_or(true, |set| set.contains(trail, val))
	}

	/// Returns the smallest value in the domain that is greater or equal to
	/// `val`.
	pub(crate) fn first_value_from(
		&self,
		trail: &impl TrailingActions,
		val: IntVal,
	) -> Option<IntVal> {
		let (lb, ub) = self.get_bounds(trail);
		let val = val.max(lb);
		if val > ub {
			return None;
		}
		match &self.values {
			None => Some(val),
			Some(set) => set.first_from(trail, val, ub),
		}
	}

	/// Returns the current bounds of the variable.
	pub(crate) fn get_bounds(&self, trail: &impl TrailingActions) -> (IntVal, IntVal) {
		(self.get_lower_bound(trail), self.get_upper_bound(trail))
	}

	/// Returns the current lower bound of the variable.
	pub(crate) fn get_lower_bound(&self, trail: &impl TrailingActions) -> IntVal {
		trail.get_trailed_int(self.lower_bound)
	}

	/// Returns the current upper bound of the variable.
	pub(crate) fn get_upper_bound(&self, trail: &impl TrailingActions) -> IntVal {
		trail.get_trailed_int(self.upper_bound)
	}

	/// Whether values strictly between the bounds can be removed.
	pub(crate) fn is_enumerated(&self) -> bool {
		self.values.is_some()
	}

	/// Returns the largest value in the domain that is less or equal to `val`.
	pub(crate) fn last_value_to(&self, trail: &impl TrailingActions, val: IntVal) -> Option<IntVal> {
		let (lb, ub) = self.get_bounds(trail);
		let val = val.min(ub);
		if val < lb {
			return None;
		}
		match &self.values {
			None => Some(val),
			Some(set) => set.last_to(trail, lb, val),
		}
	}

	/// Create a new integer variable within the given solver, with the given
	/// domain.
	///
	/// Domains that contain gaps are always stored as
	/// [`DomainStorage::Enumerated`]. A domain containing a single value results
	/// in a constant view.
	pub(crate) fn new_in(
		slv: &mut Solver,
		domain: IntSetVal,
		storage: DomainStorage,
	) -> Result<IntView, ModelError> {
		let (Some(&lb), Some(&ub)) = (domain.lower_bound(), domain.upper_bound()) else {
			return Err(ModelError::EmptyDomain);
		};
		if lb == ub {
			return Ok(IntView(IntViewInner::Const(lb)));
		}
		let storage = if domain.iter().count() > 1 {
			DomainStorage::Enumerated
		} else {
			storage
		};

		let state = &mut slv.engine.state;
		let lower_bound = state.trail.track_int(lb);
		let upper_bound = state.trail.track_int(ub);
		let values = match storage {
			DomainStorage::Interval => None,
			DomainStorage::Enumerated => Some(ValueSet::new(&mut state.trail, &domain)),
		};

		let iv = state.int_vars.push(Self {
			lower_bound,
			upper_bound,
			values,
		});
		// Create propagator activation list
		let r = state.int_activation.push(Default::default());
		debug_assert_eq!(iv, r);
		trace!(int_var = usize::from(iv), lb, ub, ?storage, "new integer variable");
		Ok(IntView(IntViewInner::VarRef(iv)))
	}

	/// Returns the smallest value in the domain that is strictly greater than
	/// `val`.
	pub(crate) fn next_value(&self, trail: &impl TrailingActions, val: IntVal) -> Option<IntVal> {
		self.first_value_from(trail, val.checked_add(1)?)
	}

	/// Set the lower bound of the variable to `val`, returning the previous lower
	/// bound.
	///
	/// # Warning
	/// The caller is responsible for ensuring that `val` is a value in the
	/// domain.
	pub(crate) fn notify_lower_bound(&self, trail: &mut Trail, val: IntVal) -> IntVal {
		debug_assert!(self.contains(trail, val));
		trail.set_trailed_int(self.lower_bound, val)
	}

	/// Set the upper bound of the variable to `val`, returning the previous upper
	/// bound.
	///
	/// # Warning
	/// The caller is responsible for ensuring that `val` is a value in the
	/// domain.
	pub(crate) fn notify_upper_bound(&self, trail: &mut Trail, val: IntVal) -> IntVal {
		debug_assert!(self.contains(trail, val));
		trail.set_trailed_int(self.upper_bound, val)
	}

	/// Remove a value strictly between the bounds of an enumerated domain.
	pub(crate) fn notify_removal(&self, trail: &mut Trail, val: IntVal) {
		debug_assert!({
			let (lb, ub) = self.get_bounds(trail);
			lb < val && val < ub
		});
		if let Some(set) = &self.values {
			set.remove(trail, val);
		}
	}

	/// Returns the largest value in the domain that is strictly less than `val`.
	pub(crate) fn prev_value(&self, trail: &impl TrailingActions, val: IntVal) -> Option<IntVal> {
		self.last_value_to(trail, val.checked_sub(1)?)
	}

	/// Returns the number of values in the domain.
	pub(crate) fn size(&self, trail: &impl TrailingActions) -> usize {
		let (lb, ub) = self.get_bounds(trail);
		match &self.values {
			None => (ub - lb) as usize + 1,
			Some(set) => set.count(trail, lb, ub),
		}
	}
}

impl ValueSet {
	/// Returns the position of `val` in the bit set.
	fn bit(&self, val: IntVal) -> usize {
		debug_assert!(val >= self.offset);
		(val - self.offset) as usize
	}

	/// Returns whether `val` is marked as present.
	fn contains(&self, trail: &impl TrailingActions, val: IntVal) -> bool {
		let i = self.bit(val);
		(self.word(trail, i / WORD_BITS) >> (i % WORD_BITS)) & 1 == 1
	}

	/// Count the values marked as present in `[from, to]`.
	fn count(&self, trail: &impl TrailingActions, from: IntVal, to: IntVal) -> usize {
		if from > to {
			return 0;
		}
		let (start, end) = (self.bit(from), self.bit(to));
		(start / WORD_BITS..=end / WORD_BITS)
			.map(|w| {
				let mut word = self.word(trail, w);
				if w == start / WORD_BITS {
					word &= u64::MAX << (start % WORD_BITS);
				}
				if w == end / WORD_BITS && end % WORD_BITS < WORD_BITS - 1 {
					word &= (1 << (end % WORD_BITS + 1)) - 1;
				}
				word.count_ones() as usize
			})
			.sum()
	}

	/// Returns the smallest value marked as present in `[from, to]`.
	fn first_from(&self, trail: &impl TrailingActions, from: IntVal, to: IntVal) -> Option<IntVal> {
		let end = self.bit(to);
		let mut i = self.bit(from);
		while i <= end {
			let word = self.word(trail, i / WORD_BITS) >> (i % WORD_BITS);
			if word != 0 {
				let j = i + word.trailing_zeros() as usize;
				return (j <= end).then_some(self.offset + j as IntVal);
			}
			i = (i / WORD_BITS + 1) * WORD_BITS;
		}
		None
	}

	/// Returns the largest value marked as present in `[from, to]`.
	fn last_to(&self, trail: &impl TrailingActions, from: IntVal, to: IntVal) -> Option<IntVal> {
		let start = self.bit(from);
		let mut i = self.bit(to);
		loop {
			let word = self.word(trail, i / WORD_BITS) << (WORD_BITS - 1 - i % WORD_BITS);
			if word != 0 {
				let j = i - word.leading_zeros() as usize;
				return (j >= start).then_some(self.offset + j as IntVal);
			}
			if i < WORD_BITS {
				return None;
			}
			i = (i / WORD_BITS) * WORD_BITS - 1;
			if i < start {
				return None;
			}
		}
	}

	/// Create a bit set in which exactly the values of `domain` are present.
	fn new(trail: &mut Trail, domain: &IntSetVal) -> Self {
		let (Some(&lb), Some(&ub)) = (domain.lower_bound(), domain.upper_bound()) else {
			unreachable!("enumerated domains are never empty")
		};
		let mut words = vec![0_u64; (ub - lb) as usize / WORD_BITS + 1];
		for r in domain.iter() {
			for v in *r.start()..=*r.end() {
				let i = (v - lb) as usize;
				words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
			}
		}
		Self {
			offset: lb,
			words: words
				.into_iter()
				.map(|w| trail.track_int(w as IntVal))
				.collect(),
		}
	}

	/// Mark `val` as no longer present.
	fn remove(&self, trail: &mut Trail, val: IntVal) {
		let i = self.bit(val);
		let word = self.word(trail, i / WORD_BITS) & !(1 << (i % WORD_BITS));
		let _ = trail.set_trailed_int(self.words[i / WORD_BITS], word as IntVal);
	}

	/// Returns the `w`-th word of the bit set.
	fn word(&self, trail: &impl TrailingActions, w: usize) -> u64 {
		trail.get_trailed_int(self.words[w]) as u64
	}
}

#[cfg(test)]
mod tests {
	use rangelist::RangeList;

	use crate::{
		actions::{DecisionActions, InspectionActions},
		solver::engine::int_var::DomainStorage,
		IntVal, Solver,
	};

	#[test]
	fn test_enumerated_domain_queries() {
		let mut slv = Solver::default();
		let x = slv
			.new_int_var(
				RangeList::from_iter([-3..=1, 60..=70, 130..=131]),
				DomainStorage::Enumerated,
			)
			.unwrap();
		assert_eq!(slv.get_int_bounds(x), (-3, 131));
		assert_eq!(slv.get_int_next_value(x, 1), Some(60));
		assert_eq!(slv.get_int_next_value(x, 70), Some(130));
		assert_eq!(slv.get_int_next_value(x, 131), None);
		assert_eq!(slv.get_int_prev_value(x, 130), Some(70));
		assert_eq!(slv.get_int_prev_value(x, 60), Some(1));
		assert_eq!(slv.get_int_prev_value(x, -3), None);
		assert!(!slv.check_int_in_domain(x, 2));
		assert_eq!(slv.get_int_domain_size(x), 18);

		assert_eq!(slv.set_int_not_eq(x, 65), Ok(true));
		assert_eq!(slv.set_int_not_eq(x, 65), Ok(false));
		assert_eq!(slv.get_int_next_value(x, 64), Some(66));
		assert_eq!(slv.get_int_domain_size(x), 17);

		// Raising the lower bound skips to the next remaining value
		assert_eq!(slv.set_int_lower_bound(x, 2), Ok(true));
		assert_eq!(slv.get_int_lower_bound(x), 60);
		assert_eq!(slv.set_int_upper_bound(x, 129), Ok(true));
		assert_eq!(slv.get_int_upper_bound(x), 70);
		let values: Vec<IntVal> =
			std::iter::successors(Some(60), |&v| slv.get_int_next_value(x, v)).collect();
		assert_eq!(values, vec![60, 61, 62, 63, 64, 66, 67, 68, 69, 70]);
	}

	#[test]
	fn test_interval_domain_removal() {
		let mut slv = Solver::default();
		let x = slv
			.new_int_var(RangeList::from_iter([1..=5]), DomainStorage::Interval)
			.unwrap();
		// Holes cannot be represented
		assert_eq!(slv.set_int_not_eq(x, 3), Ok(false));
		assert!(slv.check_int_in_domain(x, 3));
		// Removing a bound moves the bound
		assert_eq!(slv.set_int_not_eq(x, 1), Ok(true));
		assert_eq!(slv.set_int_not_eq(x, 5), Ok(true));
		assert_eq!(slv.get_int_bounds(x), (2, 4));
		assert_eq!(slv.get_int_domain_size(x), 3);
	}
}
