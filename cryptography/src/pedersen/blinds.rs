use super::{add_blinding_factors, BlindingFactor, CommitmentAlgebra};
use crate::Error;

/// Accumulates signed blinding factor contributions.
///
/// `add` and `sub` record contributions without performing any arithmetic. [Blinds::total]
/// computes `sum(positive) - sum(negative)` and may be called any number of times.
#[derive(Clone, Debug, Default)]
pub struct Blinds {
    positive: Vec<BlindingFactor>,
    negative: Vec<BlindingFactor>,
}

impl Blinds {
    /// Create an empty accumulator (whose total is zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a positive contribution.
    pub fn add(mut self, blind: BlindingFactor) -> Self {
        self.positive.push(blind);
        self
    }

    /// Record a negative contribution.
    pub fn sub(mut self, blind: BlindingFactor) -> Self {
        self.negative.push(blind);
        self
    }

    /// Returns the positive contributions in the order they were added.
    pub fn positive(&self) -> &[BlindingFactor] {
        &self.positive
    }

    /// Returns the negative contributions in the order they were added.
    pub fn negative(&self) -> &[BlindingFactor] {
        &self.negative
    }

    /// Compute the total using `algebra`.
    pub fn total<A: CommitmentAlgebra>(&self, algebra: &A) -> Result<BlindingFactor, Error> {
        add_blinding_factors(algebra, &self.positive, &self.negative)
    }
}
