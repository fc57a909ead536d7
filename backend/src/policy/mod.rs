//! Fixing Policy Module
//!
//! Decides what actually happens in an elapsed period of a replicate.
//!
//! # Overview
//!
//! After the model is solved at period `τ`, the plan's period-`τ` values are
//! committed: products as planned (inventory clamped at zero), secondary
//! materials through a recourse rule that reacts to the sampled
//! availability. The resulting [`FixingRecord`] becomes `LB = UB` bounds on
//! the model for the rest of the replicate.
//!
//! ```rust
//! use mps_simulator_core::policy::recourse_quantities;
//!
//! // Stock 2, 4 units offered, 10 still needed this horizon, 7 this period:
//! // scarce, so every offered unit is bought and 1 primary unit fills the gap.
//! let (secondary, primary) = recourse_quantities(2.0, 4.0, 10.0, 7.0);
//! assert_eq!((secondary, primary), (4.0, 1.0));
//! ```

pub mod fixing;

pub use fixing::{
    fix_product, material_recourse, plan_fixings, recourse_quantities, FixingRecord,
    MaterialRecourse, ProductFixing,
};
