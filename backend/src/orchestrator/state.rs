//! Replicate state machine
//!
//! The planning LP is one shared mutable resource. `ModelState` records
//! where a replicate is in its walk over the horizon and which periods have
//! already been fixed and pruned. Restore re-adds the constraints of exactly
//! the pruned periods, so a constraint that went missing any other way is
//! reported rather than silently put back.
//!
//! # Transitions
//!
//! ```text
//! Idle ──begin──▶ Solving ──▶ Fixing ──▶ Pruning ──▶ Advancing ─┬─▶ Solving   (τ < T)
//!                                                               └─▶ Done      (τ = T)
//! any ──▶ Restoring ──▶ Idle
//! ```
//!
//! `Solving → Restoring` is how a failed solve abandons a replicate.

use crate::orchestrator::SimulationError;
use serde::{Deserialize, Serialize};

/// Phase of the current replicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Model pristine, no replicate running
    Idle,
    /// About to optimize for the current period
    Solving,
    /// Applying realized values as fixed bounds
    Fixing,
    /// Removing the current period's constraints
    Pruning,
    /// Moving to the next period
    Advancing,
    /// All periods fixed
    Done,
    /// Returning the model to its pristine state
    Restoring,
}

impl Phase {
    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Solving)
                | (Solving, Fixing)
                | (Fixing, Pruning)
                | (Pruning, Advancing)
                | (Advancing, Solving)
                | (Advancing, Done)
                | (Restoring, Idle)
        ) || (next == Restoring && self != Idle && self != Restoring)
    }
}

/// Bookkeeping for the replicate in progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    phase: Phase,
    horizon: usize,
    period: usize,
    replicate: Option<usize>,
    fixed_periods: Vec<usize>,
    pruned_periods: Vec<usize>,
}

impl ModelState {
    pub fn new(horizon: usize) -> Self {
        Self {
            phase: Phase::Idle,
            horizon,
            period: 0,
            replicate: None,
            fixed_periods: Vec::new(),
            pruned_periods: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Current period `τ`
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn replicate(&self) -> Option<usize> {
        self.replicate
    }

    /// Periods whose variables carry fixed bounds
    pub fn fixed_periods(&self) -> &[usize] {
        &self.fixed_periods
    }

    /// Periods whose constraints have been removed from the model
    pub fn pruned_periods(&self) -> &[usize] {
        &self.pruned_periods
    }

    /// Whether the model may differ from its pristine state
    pub fn is_dirty(&self) -> bool {
        !self.fixed_periods.is_empty() || !self.pruned_periods.is_empty()
    }

    fn transition(&mut self, next: Phase) -> Result<(), SimulationError> {
        if !self.phase.can_transition_to(next) {
            return Err(SimulationError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// `Idle → Solving` at period 0 of `replicate`
    pub fn begin(&mut self, replicate: usize) -> Result<(), SimulationError> {
        self.transition(Phase::Solving)?;
        self.replicate = Some(replicate);
        self.period = 0;
        Ok(())
    }

    /// `Solving → Fixing` after an optimal solve
    pub fn solved(&mut self) -> Result<(), SimulationError> {
        self.transition(Phase::Fixing)
    }

    /// `Fixing → Pruning` once the period's bounds are fixed
    pub fn fixed(&mut self) -> Result<(), SimulationError> {
        self.transition(Phase::Pruning)?;
        self.fixed_periods.push(self.period);
        Ok(())
    }

    /// `Pruning → Advancing` once the period's constraints are removed
    pub fn pruned(&mut self) -> Result<(), SimulationError> {
        self.transition(Phase::Advancing)?;
        self.pruned_periods.push(self.period);
        Ok(())
    }

    /// `Advancing → Solving` for `τ + 1`, or `Advancing → Done` at the horizon
    pub fn advance(&mut self) -> Result<Phase, SimulationError> {
        let next = if self.period + 1 < self.horizon {
            Phase::Solving
        } else {
            Phase::Done
        };
        self.transition(next)?;
        self.period += 1;
        Ok(next)
    }

    /// `* → Restoring`
    pub fn begin_restore(&mut self) -> Result<(), SimulationError> {
        self.transition(Phase::Restoring)
    }

    /// `Restoring → Idle`, clearing all per-replicate bookkeeping
    pub fn restored(&mut self) -> Result<(), SimulationError> {
        self.transition(Phase::Idle)?;
        self.period = 0;
        self.replicate = None;
        self.fixed_periods.clear();
        self.pruned_periods.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk_period(state: &mut ModelState) -> Phase {
        state.solved().unwrap();
        state.fixed().unwrap();
        state.pruned().unwrap();
        state.advance().unwrap()
    }

    #[test]
    fn test_full_walk_reaches_done() {
        let mut state = ModelState::new(2);
        state.begin(0).unwrap();
        assert_eq!(walk_period(&mut state), Phase::Solving);
        assert_eq!(state.period(), 1);
        assert_eq!(walk_period(&mut state), Phase::Done);
        assert_eq!(state.period(), 2);
        assert_eq!(state.pruned_periods(), &[0, 1]);
    }

    #[test]
    fn test_restore_clears_bookkeeping() {
        let mut state = ModelState::new(3);
        state.begin(4).unwrap();
        walk_period(&mut state);
        state.begin_restore().unwrap();
        state.restored().unwrap();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.is_dirty());
        assert_eq!(state.replicate(), None);
    }

    #[test]
    fn test_failed_solve_can_restore() {
        let mut state = ModelState::new(3);
        state.begin(0).unwrap();
        state.begin_restore().unwrap();
        assert_eq!(state.phase(), Phase::Restoring);
    }

    #[test]
    fn test_skipping_fixing_is_rejected() {
        let mut state = ModelState::new(3);
        state.begin(0).unwrap();
        let err = state.pruned().unwrap_err();
        assert_eq!(
            err,
            SimulationError::InvalidTransition {
                from: Phase::Solving,
                to: Phase::Advancing
            }
        );
    }

    #[test]
    fn test_idle_cannot_restore_or_begin_twice() {
        let mut state = ModelState::new(1);
        assert!(state.begin_restore().is_err());
        state.begin(0).unwrap();
        assert!(state.begin(1).is_err());
    }
}
