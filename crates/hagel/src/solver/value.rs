//! Module containing the value types used to describe domains and to inspect
//! (candidate) solutions.

use rangelist::RangeList;

use crate::IntView;

/// Type alias for a set of integers parameter value.
pub type IntSetVal = RangeList<IntVal>;

/// Type alias for an parameter integer value.
pub type IntVal = i64;

/// A trait for a function that can be used to evaluate an [`IntView`] to the
/// value it takes in a (candidate) solution.
pub trait Valuation: Fn(IntView) -> IntVal {}

impl<F: Fn(IntView) -> IntVal> Valuation for F {}
