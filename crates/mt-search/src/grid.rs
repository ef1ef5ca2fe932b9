//! Common interface of everything the search driver can sample from.

use mt_types::{HyperParams, TunerResult};

/// A source of hyperparameter assignments.
pub trait SearchGrid {
    /// Draw one complete assignment.
    fn pick(&mut self) -> TunerResult<HyperParams>;

    /// Rewind the random source to its configured seed, if any.
    fn reset_seed(&mut self);

    /// Human-readable grid name.
    fn name(&self) -> &str;
}
