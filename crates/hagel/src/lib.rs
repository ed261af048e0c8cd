//! # Hagel - A Propagation Engine for Global Constraints
//!
//! Hagel is the propagation core of a finite domain Constraint Programming
//! (CP) solver. It stores integer decision variables, and connects them using
//! propagators that remove values from their domains that cannot be part of a
//! solution. A search process (not part of this crate) can use the [`Solver`]
//! to make decisions, run the propagators until a fixpoint is reached, and
//! restore an earlier state when a [`Contradiction`] is detected.
//!
//! The crate contains propagators for the following global constraints:
//!
//! - [`GlobalCardinalityBounds`]: bounds consistent propagation of the global
//!   cardinality constraint, which counts the number of decision variables that
//!   take each value in a range of values.
//! - [`ArrayVarIntElement`]: propagation of the element constraint, which
//!   selects a decision variable from an array using an index variable.

pub mod actions;
pub(crate) mod propagator;
pub mod solver;

pub use crate::{
	propagator::{
		array_var_int_element::ArrayVarIntElement, global_cardinality::GlobalCardinalityBounds,
		Contradiction, Entailment,
	},
	solver::{
		engine::{
			int_var::{DomainStorage, IntVarRef},
			trail::TrailedInt,
			PropRef, SearchStatistics,
		},
		value::{IntSetVal, IntVal, Valuation},
		view::IntView,
		InitStatistics, Mark, ModelError, Solver,
	},
};
