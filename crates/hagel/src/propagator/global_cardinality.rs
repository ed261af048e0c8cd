//! Propagator for the `global_cardinality` constraint, which enforces that the
//! number of decision variables taking each value in a range of values is equal
//! to the matching cardinality variable.
//!
//! Filtering of the bounds of the decision variables uses the algorithm of
//! Quimper et al. (2003) to detect Hall intervals: sets of consecutive values
//! that are saturated by the variables whose domains they contain. The
//! algorithm orders the critical bounds of all variables, and then assigns the
//! variables to the buckets between these bounds using a path-compressed
//! forest. The minimum numbers of occurrences are enforced in the same way,
//! assigning the variables to the buckets that still demand a value.

use itertools::Itertools;

use crate::{
	actions::{InspectionActions, PropagationActions, PropagatorInitActions},
	propagator::{Contradiction, Entailment, Propagator},
	solver::{
		engine::{activation_list::IntPropCond, int_var::WORD_BITS, trail::TrailedInt, PropRef},
		queue::PriorityLevel,
		value::Valuation,
	},
	IntVal, IntView, ModelError, Solver,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// Bounds consistent propagator for the constraint that, for every `k`, exactly
/// `cards[k]` of `vars` take the value `first_value + k`.
///
/// The decision variables are required to only take values in the range of
/// values covered by the cardinality variables.
pub struct GlobalCardinalityBounds {
	/// The decision variables of which the values are counted.
	vars: Vec<IntView>,
	/// The value counted by the first cardinality variable.
	first_value: IntVal,
	/// The number of decision variables taking each value.
	cards: Vec<IntView>,
	/// Number of decision variables fixed to each value.
	min_occ: Vec<TrailedInt>,
	/// Number of decision variables that can take each value.
	max_occ: Vec<TrailedInt>,
	/// Whether each decision variable is included in `min_occ`.
	counted_fixed: Vec<TrailedInt>,
	/// For each decision variable, `words` words of a bit set marking the values
	/// for which it is included in `max_occ`.
	counted_values: Vec<TrailedInt>,
	/// The number of words in the bit set of each decision variable.
	words: usize,
	/// Last seen lower bound of every decision variable.
	seen_lb: Vec<TrailedInt>,
	/// Last seen upper bound of every decision variable.
	seen_ub: Vec<TrailedInt>,
}

/// Prefix sums over a range of values, giving the sum over any range of values
/// in constant time.
struct PartialSum {
	/// The smallest value in the range.
	first: IntVal,
	/// `sums[i]` is the sum of the values smaller than `first + i`.
	sums: Vec<IntVal>,
}

/// The bounds of the decision variables, and their ordering along the critical
/// points at which the bounds of decision variables start or end.
struct SortedBounds {
	/// The critical points in increasing order, surrounded by a sentinel on
	/// either side.
	bounds: Vec<IntVal>,
	/// The lower bound of each decision variable.
	mins: Vec<IntVal>,
	/// The upper bound of each decision variable.
	maxs: Vec<IntVal>,
	/// The rank in `bounds` of the lower bound of each decision variable.
	minrank: Vec<usize>,
	/// The rank in `bounds` of the upper bound plus one of each decision
	/// variable.
	maxrank: Vec<usize>,
	/// The decision variables in increasing order of their lower bound.
	minsorted: Vec<usize>,
	/// The decision variables in increasing order of their upper bound.
	maxsorted: Vec<usize>,
}

impl GlobalCardinalityBounds {
	/// Create a new [`GlobalCardinalityBounds`] propagator in the solver.
	///
	/// The cardinality variable `cards[k]` counts the decision variables in
	/// `vars` taking the value `first_value + k`.
	pub fn new_in(
		solver: &mut Solver,
		vars: Vec<IntView>,
		first_value: IntVal,
		cards: Vec<IntView>,
	) -> Result<PropRef, ModelError> {
		if cards.is_empty() {
			return Err(ModelError::EmptyCardinality);
		}
		let last_value = first_value + cards.len() as IntVal - 1;
		for &var in &vars {
			let (lb, ub) = solver.get_int_bounds(var);
			if lb < first_value || ub > last_value {
				return Err(ModelError::ValueOutOfRange {
					var,
					min: first_value,
					max: last_value,
				});
			}
		}

		let words = cards.len().div_ceil(WORD_BITS);
		let mut occurrences = vec![(0, 0); cards.len()];
		let mut counted_fixed = Vec::with_capacity(vars.len());
		let mut counted_values = Vec::with_capacity(vars.len() * words);
		let mut seen_lb = Vec::with_capacity(vars.len());
		let mut seen_ub = Vec::with_capacity(vars.len());
		for &var in &vars {
			let (lb, ub) = solver.get_int_bounds(var);
			let mut bits = vec![0_u64; words];
			for v in (lb..=ub).filter(|&v| solver.check_int_in_domain(var, v)) {
				let k = (v - first_value) as usize;
				bits[k / WORD_BITS] |= 1 << (k % WORD_BITS);
				occurrences[k].1 += 1;
			}
			let fixed = solver.get_int_val(var);
			if let Some(v) = fixed {
				occurrences[(v - first_value) as usize].0 += 1;
			}
			counted_fixed.push(solver.new_trailed_int(fixed.is_some() as IntVal));
			for w in bits {
				counted_values.push(solver.new_trailed_int(w as IntVal));
			}
			seen_lb.push(solver.new_trailed_int(lb));
			seen_ub.push(solver.new_trailed_int(ub));
		}
		let (min_occ, max_occ) = occurrences
			.into_iter()
			.map(|(lo, hi)| (solver.new_trailed_int(lo), solver.new_trailed_int(hi)))
			.unzip();

		let n = vars.len() as u32;
		let prop = solver.add_propagator(
			Box::new(Self {
				vars: vars.clone(),
				first_value,
				cards: cards.clone(),
				min_occ,
				max_occ,
				counted_fixed,
				counted_values,
				words,
				seen_lb,
				seen_ub,
			}),
			PriorityLevel::Lowest,
		);
		for (i, var) in vars.into_iter().enumerate() {
			solver.enqueue_on_int_change(prop, var, i as u32, IntPropCond::Domain);
		}
		for (k, card) in cards.into_iter().enumerate() {
			solver.enqueue_on_int_change(prop, card, n + k as u32, IntPropCond::Bounds);
		}
		Ok(prop)
	}

	/// Apply the Hall interval reasoning on the bounds of the decision variables.
	fn filter_bounds<P: PropagationActions>(&self, actions: &mut P) -> Result<bool, Contradiction> {
		if self.vars.is_empty() {
			return Ok(false);
		}
		let last_value = self.first_value + self.cards.len() as IntVal - 1;
		let sorted = SortedBounds::new(actions, &self.vars, self.first_value, last_value);

		let (lbs, ubs): (Vec<_>, Vec<_>) = self
			.cards
			.iter()
			.map(|&c| actions.get_int_bounds(c))
			.unzip();
		// Values just outside the range are padded so that the sentinel buckets have
		// capacity, but no demand
		let upper = PartialSum::new(
			self.first_value - 2,
			[1, 1].into_iter().chain(ubs).chain([1, 1]),
		);
		let lower = PartialSum::new(
			self.first_value - 2,
			[0, 0].into_iter().chain(lbs).chain([0, 0]),
		);
		debug_assert_eq!(upper.first, lower.first);
		debug_assert_eq!(upper.last(), lower.last());
		debug_assert!(upper.first <= sorted.bounds[0]);
		debug_assert!(sorted.bounds[sorted.nb() + 1] <= upper.last() + 1);

		let mut new_min = sorted.mins.clone();
		let mut new_max = sorted.maxs.clone();
		sorted.filter_lower_max(actions, &upper, &mut new_min)?;
		sorted.filter_upper_max(actions, &upper, &mut new_max)?;
		let (starts, ends) = sorted.stable_intervals(actions, &lower)?;
		sorted.filter_lower_min(&starts, &mut new_min);
		sorted.filter_upper_min(&ends, &mut new_max);

		let mut changed = false;
		for (i, &var) in self.vars.iter().enumerate() {
			if new_min[i] > sorted.mins[i] {
				changed |= actions.set_int_lower_bound(var, new_min[i])?;
			}
			if new_max[i] < sorted.maxs[i] {
				changed |= actions.set_int_upper_bound(var, new_max[i])?;
			}
		}
		Ok(changed)
	}

	/// Instantiate every unfixed decision variable that can take `val` to `val`.
	fn fix_candidates<P: PropagationActions>(
		&self,
		actions: &mut P,
		val: IntVal,
	) -> Result<bool, Contradiction> {
		let mut changed = false;
		for (i, &var) in self.vars.iter().enumerate() {
			if actions.get_int_val(var).is_none() && actions.check_int_in_domain(var, val) {
				changed |= actions.set_int_val(var, val)?;
				self.forget_bounds(actions, i);
				self.count_fixed(actions, i);
			}
		}
		Ok(changed)
	}

	/// Count the decision variable at position `i` in `min_occ` once it is
	/// fixed.
	fn count_fixed<P: InspectionActions>(&self, actions: &mut P, i: usize) {
		if actions.get_trailed_int(self.counted_fixed[i]) != 0 {
			return;
		}
		if let Some(val) = actions.get_int_val(self.vars[i]) {
			let _ = actions.set_trailed_int(self.counted_fixed[i], 1);
			let _ = actions.add_trailed_int(self.min_occ[self.position(val)], 1);
		}
	}

	/// Stop counting the values outside the bounds of the decision variable at
	/// position `i` in `max_occ`.
	fn forget_bounds<P: InspectionActions>(&self, actions: &mut P, i: usize) {
		let (lb, ub) = actions.get_int_bounds(self.vars[i]);
		let seen_lb = actions.set_trailed_int(self.seen_lb[i], lb);
		let seen_ub = actions.set_trailed_int(self.seen_ub[i], ub);
		for v in (seen_lb..lb).chain(ub + 1..=seen_ub) {
			self.forget_value(actions, i, v);
		}
	}

	/// Stop counting `val` in `max_occ` for the decision variable at position
	/// `i`, if it is no longer in its domain.
	fn forget_value<P: InspectionActions>(&self, actions: &mut P, i: usize, val: IntVal) {
		if actions.check_int_in_domain(self.vars[i], val) {
			return;
		}
		let k = self.position(val);
		let word = self.counted_values[i * self.words + k / WORD_BITS];
		let bits = actions.get_trailed_int(word) as u64;
		let bit = 1 << (k % WORD_BITS);
		if bits & bit != 0 {
			let _ = actions.set_trailed_int(word, (bits & !bit) as IntVal);
			let _ = actions.add_trailed_int(self.max_occ[k], -1);
		}
	}

	/// Tighten the cardinality variable at position `k` to the number of decision
	/// variables that are fixed to, or can take, its value; and remove or fix the
	/// value when its cardinality is reached.
	fn filter_occurrences<P: PropagationActions>(
		&self,
		actions: &mut P,
		k: usize,
	) -> Result<bool, Contradiction> {
		let card = self.cards[k];
		let val = self.value(k);
		let min_occ = actions.get_trailed_int(self.min_occ[k]);
		let max_occ = actions.get_trailed_int(self.max_occ[k]);
		let mut changed = actions.set_int_lower_bound(card, min_occ)?;
		changed |= actions.set_int_upper_bound(card, max_occ)?;
		if min_occ < max_occ {
			let (lb, ub) = actions.get_int_bounds(card);
			if ub == min_occ {
				changed |= self.remove_from_unfixed(actions, val)?;
			} else if lb == max_occ {
				changed |= self.fix_candidates(actions, val)?;
			}
		}
		Ok(changed)
	}

	/// The position of the cardinality variable counting `val`.
	fn position(&self, val: IntVal) -> usize {
		debug_assert!(val >= self.first_value);
		(val - self.first_value) as usize
	}

	/// Bring the occurrence counters up to date with the domains of the decision
	/// variables, and filter the cardinality variables with them.
	fn propagate_occurrences<P: PropagationActions>(
		&self,
		actions: &mut P,
	) -> Result<bool, Contradiction> {
		for i in 0..self.vars.len() {
			self.forget_bounds(actions, i);
			self.count_fixed(actions, i);
		}
		let mut changed = false;
		for k in 0..self.cards.len() {
			changed |= self.filter_occurrences(actions, k)?;
		}
		Ok(changed)
	}

	/// Tighten the cardinality variables so that their sum can be equal to the
	/// number of decision variables.
	fn propagate_sum<P: PropagationActions>(&self, actions: &mut P) -> Result<bool, Contradiction> {
		let n = self.vars.len() as IntVal;
		let mut changed = false;
		loop {
			let (sum_lb, sum_ub) = self
				.cards
				.iter()
				.map(|&c| actions.get_int_bounds(c))
				.fold((0, 0), |(l, u), (lb, ub)| (l + lb, u + ub));
			if sum_lb > n || sum_ub < n {
				return Err(actions.fail());
			}
			let mut again = false;
			for &card in &self.cards {
				let (lb, ub) = actions.get_int_bounds(card);
				again |= actions.set_int_upper_bound(card, n - (sum_lb - lb))?;
				again |= actions.set_int_lower_bound(card, n - (sum_ub - ub))?;
			}
			if !again {
				return Ok(changed);
			}
			changed = true;
		}
	}

	/// Remove `val` from the domain of every unfixed decision variable.
	fn remove_from_unfixed<P: PropagationActions>(
		&self,
		actions: &mut P,
		val: IntVal,
	) -> Result<bool, Contradiction> {
		let mut changed = false;
		for (i, &var) in self.vars.iter().enumerate() {
			if actions.get_int_val(var).is_none() && actions.set_int_not_eq(var, val)? {
				changed = true;
				self.forget_value(actions, i, val);
				self.forget_bounds(actions, i);
				self.count_fixed(actions, i);
			}
		}
		Ok(changed)
	}

	/// The value counted by the cardinality variable at position `k`.
	fn value(&self, k: usize) -> IntVal {
		self.first_value + k as IntVal
	}
}

impl<P: PropagationActions> Propagator<P> for GlobalCardinalityBounds {
	fn awake_on_inf(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		if (idx as usize) < self.vars.len() {
			self.forget_bounds(actions, idx as usize);
		}
		actions.schedule_propagate();
		Ok(())
	}

	fn awake_on_inst(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		let i = idx as usize;
		if i >= self.vars.len() {
			return Ok(());
		}
		let Some(val) = actions.get_int_val(self.vars[i]) else {
			return Ok(());
		};
		self.forget_bounds(actions, i);
		self.count_fixed(actions, i);
		let _ = self.filter_occurrences(actions, self.position(val))?;
		Ok(())
	}

	fn awake_on_rem(&mut self, actions: &mut P, idx: u32, val: IntVal) -> Result<(), Contradiction> {
		let i = idx as usize;
		if i >= self.vars.len() {
			return Ok(());
		}
		self.forget_value(actions, i, val);
		let _ = self.filter_occurrences(actions, self.position(val))?;
		Ok(())
	}

	fn awake_on_sup(&mut self, actions: &mut P, idx: u32) -> Result<(), Contradiction> {
		if (idx as usize) < self.vars.len() {
			self.forget_bounds(actions, idx as usize);
		}
		actions.schedule_propagate();
		Ok(())
	}

	fn is_entailed(&self, actions: &P) -> Entailment {
		if !self
			.vars
			.iter()
			.chain(&self.cards)
			.all(|&v| actions.get_int_val(v).is_some())
		{
			return Entailment::Unknown;
		}
		if <Self as Propagator<P>>::is_satisfied(self, &|v| actions.get_int_lower_bound(v)) {
			Entailment::Entailed
		} else {
			Entailment::Disentailed
		}
	}

	fn is_satisfied(&self, sol: &dyn Valuation) -> bool {
		let values = self.vars.iter().map(|&v| sol(v)).collect_vec();
		let last_value = self.value(self.cards.len() - 1);
		values
			.iter()
			.all(|&v| (self.first_value..=last_value).contains(&v))
			&& self.cards.iter().enumerate().all(|(k, &c)| {
				let val = self.value(k);
				values.iter().filter(|&&v| v == val).count() as IntVal == sol(c)
			})
	}

	#[tracing::instrument(name = "global_cardinality", level = "trace", skip(self, actions))]
	fn propagate(&mut self, actions: &mut P) -> Result<(), Contradiction> {
		loop {
			let mut changed = self.propagate_sum(actions)?;
			changed |= self.propagate_occurrences(actions)?;
			if changed {
				continue;
			}
			if !self.filter_bounds(actions)? {
				return Ok(());
			}
		}
	}
}

impl PartialSum {
	/// Create the prefix sums of the `elements`, which are the values associated
	/// with `first`, `first + 1`, and so on.
	fn new(first: IntVal, elements: impl IntoIterator<Item = IntVal>) -> Self {
		let sums = [0]
			.into_iter()
			.chain(elements.into_iter().scan(0, |acc, e| {
				*acc += e;
				Some(*acc)
			}))
			.collect();
		Self { first, sums }
	}

	/// The largest value in the range.
	fn last(&self) -> IntVal {
		self.first + self.sums.len() as IntVal - 2
	}

	/// The sum of the values associated with `from..=to`, which is zero when the
	/// range is empty.
	fn sum(&self, from: IntVal, to: IntVal) -> IntVal {
		if from > to {
			return 0;
		}
		debug_assert!(from >= self.first && to <= self.last());
		self.sums[(to - self.first + 1) as usize] - self.sums[(from - self.first) as usize]
	}
}

impl SortedBounds {
	/// Order the bounds of the decision variables, which must take values in
	/// `first_value..=last_value`, along their critical points.
	fn new<P: InspectionActions>(
		actions: &P,
		vars: &[IntView],
		first_value: IntVal,
		last_value: IntVal,
	) -> Self {
		let n = vars.len();
		let (mins, maxs): (Vec<_>, Vec<_>) = vars.iter().map(|&v| actions.get_int_bounds(v)).unzip();
		let minsorted = (0..n).sorted_by_key(|&i| mins[i]).collect_vec();
		let maxsorted = (0..n).sorted_by_key(|&i| maxs[i]).collect_vec();

		let mut bounds = vec![first_value - 2];
		let mut minrank = vec![0; n];
		let mut maxrank = vec![0; n];
		let (mut i, mut j) = (0, 0);
		while j < n {
			if i < n && mins[minsorted[i]] <= maxs[maxsorted[j]] + 1 {
				let v = mins[minsorted[i]];
				if bounds.last() != Some(&v) {
					bounds.push(v);
				}
				minrank[minsorted[i]] = bounds.len() - 1;
				i += 1;
			} else {
				let v = maxs[maxsorted[j]] + 1;
				if bounds.last() != Some(&v) {
					bounds.push(v);
				}
				maxrank[maxsorted[j]] = bounds.len() - 1;
				j += 1;
			}
		}
		bounds.push(last_value + 3);
		debug_assert!(bounds.windows(2).all(|w| w[0] < w[1]));
		debug_assert!(minrank.iter().zip(&maxrank).all(|(l, u)| 1 <= *l && l < u));

		Self {
			bounds,
			mins,
			maxs,
			minrank,
			maxrank,
			minsorted,
			maxsorted,
		}
	}

	/// Raise the lower bounds of the decision variables that start in a Hall
	/// interval to the end of the interval.
	fn filter_lower_max<P: PropagationActions>(
		&self,
		actions: &mut P,
		capacity: &PartialSum,
		new_min: &mut [IntVal],
	) -> Result<(), Contradiction> {
		let nb = self.nb();
		let bounds = &self.bounds;
		let mut t = vec![0; nb + 2];
		let mut h = vec![0; nb + 2];
		let mut d = vec![0; nb + 2];
		for i in 1..=nb + 1 {
			t[i] = i - 1;
			h[i] = i - 1;
			d[i] = capacity.sum(bounds[i - 1], bounds[i] - 1);
		}
		// Buckets without capacity are saturated from the start
		for i in 1..=nb {
			if d[i] == 0 {
				let j = t[i];
				t[i] = i + 1;
				let z = path_max(&t, i + 1);
				t[z] = j;
			}
		}

		for &var in &self.maxsorted {
			let x = self.minrank[var];
			let y = self.maxrank[var];
			let mut z = path_max(&t, x + 1);
			let j = t[z];
			d[z] -= 1;
			if d[z] == 0 {
				t[z] = z + 1;
				z = path_max(&t, z + 1);
				t[z] = j;
			}
			path_set(&mut t, x + 1, z, z);
			let beyond = capacity.sum(bounds[y], bounds[z] - 1);
			if d[z] < beyond {
				return Err(actions.fail());
			}
			if h[x] > x {
				let w = path_max(&h, h[x]);
				new_min[var] = new_min[var].max(bounds[w]);
				path_set(&mut h, x, w, w);
			}
			if d[z] == beyond {
				let hy = h[y];
				path_set(&mut h, hy, j - 1, y);
				h[y] = j - 1;
			}
		}
		Ok(())
	}

	/// Lower the upper bounds of the decision variables that end in a Hall
	/// interval to the start of the interval.
	fn filter_upper_max<P: PropagationActions>(
		&self,
		actions: &mut P,
		capacity: &PartialSum,
		new_max: &mut [IntVal],
	) -> Result<(), Contradiction> {
		let nb = self.nb();
		let bounds = &self.bounds;
		let mut t = vec![0; nb + 2];
		let mut h = vec![0; nb + 2];
		let mut d = vec![0; nb + 2];
		for i in 0..=nb {
			t[i] = i + 1;
			h[i] = i + 1;
			d[i] = capacity.sum(bounds[i], bounds[i + 1] - 1);
		}
		// Buckets without capacity are saturated from the start
		for i in (1..=nb).rev() {
			if d[i] == 0 {
				let j = t[i];
				t[i] = i - 1;
				let z = path_min(&t, i - 1);
				t[z] = j;
			}
		}

		for &var in self.minsorted.iter().rev() {
			let x = self.maxrank[var];
			let y = self.minrank[var];
			let mut z = path_min(&t, x - 1);
			let j = t[z];
			d[z] -= 1;
			if d[z] == 0 {
				t[z] = z - 1;
				z = path_min(&t, z - 1);
				t[z] = j;
			}
			path_set(&mut t, x - 1, z, z);
			let beyond = capacity.sum(bounds[z], bounds[y] - 1);
			if d[z] < beyond {
				return Err(actions.fail());
			}
			if h[x] < x {
				let w = path_min(&h, h[x]);
				new_max[var] = new_max[var].min(bounds[w] - 1);
				path_set(&mut h, x, w, w);
			}
			if d[z] == beyond {
				let hy = h[y];
				path_set(&mut h, hy, j + 1, y);
				h[y] = j + 1;
			}
		}
		Ok(())
	}

	/// Raise the lower bounds of the decision variables that intersect a stable
	/// interval starting above them to the start of the interval.
	fn filter_lower_min(&self, starts: &[bool], new_min: &mut [IntVal]) {
		let nb = self.nb();
		let mut h = (0..=nb)
			.map(|p| if starts[p] || p == 0 { p } else { p - 1 })
			.collect_vec();
		for &var in &self.maxsorted {
			let x = self.minrank[var];
			let y = self.maxrank[var];
			let w = path_min(&h, y - 1);
			path_set(&mut h, y - 1, w, w);
			if w > x {
				new_min[var] = new_min[var].max(self.bounds[w]);
			}
		}
	}

	/// Lower the upper bounds of the decision variables that intersect a stable
	/// interval ending below them to the end of the interval.
	fn filter_upper_min(&self, ends: &[bool], new_max: &mut [IntVal]) {
		let nb = self.nb();
		let mut h = (0..=nb + 1)
			.map(|q| if ends[q] || q == nb + 1 { q } else { q + 1 })
			.collect_vec();
		for &var in self.minsorted.iter().rev() {
			let x = self.minrank[var];
			let y = self.maxrank[var];
			let w = path_max(&h, x + 1);
			path_set(&mut h, x + 1, w, w);
			if w < y {
				new_max[var] = new_max[var].min(self.bounds[w] - 1);
			}
		}
	}

	/// Fail when the decision variables cannot meet the minimum numbers of
	/// occurrences of the values, and otherwise find the stable intervals: the
	/// intervals of values that need every decision variable intersecting them.
	///
	/// Returns, for every critical point, whether a stable interval starts at it,
	/// and whether a stable interval ends just before it.
	fn stable_intervals<P: PropagationActions>(
		&self,
		actions: &mut P,
		demand: &PartialSum,
	) -> Result<(Vec<bool>, Vec<bool>), Contradiction> {
		let nb = self.nb();
		let n = self.mins.len();
		let bounds = &self.bounds;
		let mut t = vec![0; nb + 2];
		let mut d = vec![0; nb + 2];
		for i in 1..=nb + 1 {
			t[i] = i;
			d[i] = demand.sum(bounds[i - 1], bounds[i] - 1);
		}
		// No decision variable reaches the outer buckets
		if d[1] > 0 || d[nb + 1] > 0 {
			return Err(actions.fail());
		}
		// Buckets without demand are satisfied from the start
		for i in 2..=nb {
			if d[i] == 0 {
				t[i] = i + 1;
			}
		}
		for &var in &self.maxsorted {
			let x = self.minrank[var];
			let y = self.maxrank[var];
			let z = path_max(&t, x + 1);
			path_set(&mut t, x + 1, z, z);
			if z <= y {
				d[z] -= 1;
				if d[z] == 0 {
					t[z] = z + 1;
				}
			}
		}
		if d[2..=nb].iter().any(|&r| r > 0) {
			return Err(actions.fail());
		}

		// `below[p]`: variables ending before `bounds[p]`; `above[q]`: variables
		// starting at or after `bounds[q]`
		let mut below = vec![0; nb + 2];
		let mut above = vec![0; nb + 2];
		for var in 0..n {
			below[self.maxrank[var]] += 1;
			above[self.minrank[var]] += 1;
		}
		for p in 1..nb + 2 {
			below[p] += below[p - 1];
		}
		for q in (0..nb + 1).rev() {
			above[q] += above[q + 1];
		}
		// The variables intersecting `bounds[p]..bounds[q]` exceed its demand by
		// `reach[q] - need[p]`
		let demand_before = |p: usize| demand.sum(bounds[0], bounds[p] - 1);
		let reach = (0..=nb)
			.map(|q| (n - above[q]) as IntVal - demand_before(q))
			.collect_vec();
		let need = (0..=nb)
			.map(|p| below[p] as IntVal - demand_before(p))
			.collect_vec();

		let mut starts = vec![false; nb + 2];
		let mut min_reach = IntVal::MAX;
		for p in (1..nb).rev() {
			min_reach = min_reach.min(reach[p + 1]);
			if need[p] > min_reach {
				return Err(actions.fail());
			}
			starts[p] = need[p] == min_reach;
		}
		let mut ends = vec![false; nb + 2];
		let mut max_need = IntVal::MIN;
		for q in 2..=nb {
			max_need = max_need.max(need[q - 1]);
			ends[q] = reach[q] == max_need;
		}
		Ok((starts, ends))
	}

	/// The number of critical points, excluding the sentinels.
	fn nb(&self) -> usize {
		self.bounds.len() - 2
	}
}

/// Follow the pointers of `tree` from `i` while they point upwards.
fn path_max(tree: &[usize], mut i: usize) -> usize {
	while tree[i] > i {
		i = tree[i];
	}
	i
}

/// Follow the pointers of `tree` from `i` while they point downwards.
fn path_min(tree: &[usize], mut i: usize) -> usize {
	while tree[i] < i {
		i = tree[i];
	}
	i
}

/// Point all nodes on the path of `tree` from `start` to `end` to `to`.
fn path_set(tree: &mut [usize], start: usize, end: usize, to: usize) {
	let mut l = start;
	while l != end {
		let k = l;
		l = tree[k];
		tree[k] = to;
	}
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
		DomainStorage, GlobalCardinalityBounds, IntVal, IntView, ModelError, Solver,
	};

	/// Create a decision variable for each of the given ranges of values.
	fn new_vars(
		slv: &mut Solver,
		ranges: &[(IntVal, IntVal)],
		storage: DomainStorage,
	) -> Vec<IntView> {
		ranges
			.iter()
			.map(|&(lb, ub)| {
				slv.new_int_var(RangeList::from_iter([lb..=ub]), storage)
					.unwrap()
			})
			.collect()
	}

	#[test]
	#[traced_test]
	fn test_gcc_cardinality_exceeded() {
		let mut slv = Solver::default();
		let vars = new_vars(&mut slv, &[(0, 1); 3], DomainStorage::Enumerated);
		let cards = new_vars(&mut slv, &[(0, 2), (0, 3)], DomainStorage::Interval);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards).unwrap();
		for &v in &vars {
			assert_eq!(slv.set_int_val(v, 0), Ok(true));
		}
		assert!(slv.propagate_all().is_err());
	}

	#[test]
	#[traced_test]
	fn test_gcc_free_cardinalities() {
		let mut slv = Solver::default();
		let vars = new_vars(&mut slv, &[(0, 1); 2], DomainStorage::Enumerated);
		let cards = new_vars(&mut slv, &[(0, 2); 2], DomainStorage::Interval);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards.clone()).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(cards[0]), (0, 2));
		assert_eq!(slv.get_int_bounds(cards[1]), (0, 2));

		slv.expect_solutions(
			&[vars[0], vars[1], cards[0], cards[1]],
			expect![[r#"
			0, 0, 2, 0
			0, 1, 1, 1
			1, 0, 1, 1
			1, 1, 0, 2"#]],
		);
	}

	#[test]
	#[traced_test]
	fn test_gcc_hall_interval_lower() {
		let mut slv = Solver::default();
		let vars = new_vars(
			&mut slv,
			&[(0, 1), (0, 1), (0, 2), (3, 4)],
			DomainStorage::Enumerated,
		);
		let cards = new_vars(&mut slv, &[(0, 1); 5], DomainStorage::Interval);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(vars[2]), Some(2));

		slv.expect_solutions(
			&vars,
			expect![[r#"
			0, 1, 2, 3
			0, 1, 2, 4
			1, 0, 2, 3
			1, 0, 2, 4"#]],
		);
	}

	#[test]
	#[traced_test]
	fn test_gcc_hall_interval_upper() {
		let mut slv = Solver::default();
		let vars = new_vars(
			&mut slv,
			&[(3, 4), (3, 4), (2, 4), (0, 1)],
			DomainStorage::Interval,
		);
		let cards = new_vars(&mut slv, &[(0, 1); 5], DomainStorage::Interval);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(vars[2]), Some(2));
		assert_eq!(slv.get_int_bounds(vars[3]), (0, 1));
	}

	#[test]
	#[traced_test]
	fn test_gcc_minimum_occurrences() {
		let mut slv = Solver::default();
		let vars = new_vars(
			&mut slv,
			&[(0, 1), (0, 3), (2, 3)],
			DomainStorage::Enumerated,
		);
		let cards = new_vars(
			&mut slv,
			&[(1, 3), (1, 3), (0, 3), (0, 3)],
			DomainStorage::Interval,
		);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards).unwrap();
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(vars[1]), (0, 1));

		slv.expect_solutions(
			&vars,
			expect![[r#"
			0, 1, 2
			0, 1, 3
			1, 0, 2
			1, 0, 3"#]],
		);
	}

	#[test]
	#[traced_test]
	fn test_gcc_pigeonhole() {
		let mut slv = Solver::default();
		let vars = new_vars(&mut slv, &[(0, 1); 3], DomainStorage::Interval);
		let cards = new_vars(&mut slv, &[(0, 1); 2], DomainStorage::Interval);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards).unwrap();
		slv.assert_unsatisfiable(&vars);
		assert_eq!(slv.search_statistics().contradictions(), 1);
	}

	#[test]
	fn test_gcc_brute_force() {
		let var_domains: [&[(IntVal, IntVal)]; 5] =
			[&[(0, 0)], &[(0, 1)], &[(0, 2)], &[(1, 2)], &[(0, 0), (2, 2)]];
		let card_domains = [(0, 1), (1, 2), (0, 3)];
		for storage in [DomainStorage::Interval, DomainStorage::Enumerated] {
			for domains in var_domains.into_iter().combinations_with_replacement(3) {
				for cards in (0..3).map(|_| card_domains).multi_cartesian_product() {
					let mut slv = Solver::default();
					let vars = domains
						.iter()
						.map(|d| {
							let ranges = d.iter().map(|&(lb, ub)| lb..=ub);
							slv.new_int_var(RangeList::from_iter(ranges), storage)
								.unwrap()
						})
						.collect_vec();
					let counts = new_vars(&mut slv, &cards, storage);
					let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, counts.clone())
						.unwrap();

					let values = domains
						.iter()
						.map(|d| range_values(d))
						.chain(cards.iter().map(|&c| range_values(&[c])))
						.collect_vec();
					let expected = brute_force(&values, |sol| {
						(0..3).all(|k| {
							let count = sol[..3].iter().filter(|&&v| v == k).count();
							count as IntVal == sol[3 + k as usize]
						})
					});
					let all = vars.iter().chain(&counts).copied().collect_vec();
					assert_eq!(
						slv.branch_all(&all),
						expected,
						"domains {domains:?}, cardinalities {cards:?}, {storage:?}"
					);
				}
			}
		}
	}

	#[test]
	#[traced_test]
	fn test_gcc_occurrence_counts() {
		let mut slv = Solver::default();
		let vars = new_vars(&mut slv, &[(0, 3); 3], DomainStorage::Enumerated);
		let cards = new_vars(&mut slv, &[(0, 3); 4], DomainStorage::Interval);
		let _ = GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, cards.clone()).unwrap();
		slv.propagate_all().unwrap();

		let mark = slv.checkpoint();
		assert_eq!(slv.set_int_not_eq(vars[0], 2), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(cards[2]), (0, 2));
		// Raising the lower bound over the removed value only forgets the other
		// values
		assert_eq!(slv.set_int_lower_bound(vars[0], 1), Ok(true));
		assert_eq!(slv.set_int_lower_bound(vars[0], 3), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(vars[0]), Some(3));
		assert_eq!(slv.get_int_bounds(cards[2]), (0, 2));
		assert_eq!(slv.get_int_bounds(cards[3]), (1, 3));

		slv.restore(mark);
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(cards[2]), (0, 3));
		assert_eq!(slv.set_int_not_eq(vars[1], 2), Ok(true));
		assert_eq!(slv.set_int_not_eq(vars[2], 2), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_bounds(cards[2]), (0, 1));
		assert_eq!(slv.set_int_lower_bound(cards[2], 1), Ok(true));
		slv.propagate_all().unwrap();
		assert_eq!(slv.get_int_val(vars[0]), Some(2));
	}

	#[test]
	fn test_gcc_model_errors() {
		let mut slv = Solver::default();
		let vars = new_vars(&mut slv, &[(0, 5)], DomainStorage::Interval);
		assert_eq!(
			GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 0, Vec::new()),
			Err(ModelError::EmptyCardinality)
		);
		let cards = vec![IntView::from(0); 3];
		assert_eq!(
			GlobalCardinalityBounds::new_in(&mut slv, vars.clone(), 1, cards),
			Err(ModelError::ValueOutOfRange {
				var: vars[0],
				min: 1,
				max: 3,
			})
		);
		assert_eq!(slv.init_statistics().propagators(), 0);
	}
}
