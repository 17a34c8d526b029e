// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The verdict of a test evaluation.
//!
//! A [`Resolution`] starts out unset and is escalated as evidence is gathered. Severity is
//! ordered `unresolved` > `failed` > `passed`: the evaluator calls the setters as it scans, and
//! relies on escalation rather than on a single final decision.

use crate::errors::ResolutionTransitionError;
use mortem_metadata::ResolutionKind;
use std::fmt;

/// A resolution state machine.
///
/// Illegal transitions indicate a defect in the evaluator rather than in the test under
/// evaluation, and panic.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Resolution {
    state: Option<ResolutionKind>,
}

/// A resolution setter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum ResolutionTransition {
    /// [`Resolution::untested`].
    Untested,
    /// [`Resolution::unsupported`].
    Unsupported,
    /// [`Resolution::passed`].
    Passed,
    /// [`Resolution::failed`].
    Failed,
    /// [`Resolution::unresolved`].
    Unresolved,
}

impl ResolutionTransition {
    /// Returns the name of the setter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untested => "untested",
            Self::Unsupported => "unsupported",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Unresolved => "unresolved",
        }
    }
}

impl Resolution {
    /// Creates a new, unset resolution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state, or `None` if unset.
    pub fn kind(&self) -> Option<ResolutionKind> {
        self.state
    }

    /// Returns true if the resolution is passed or failed.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.state,
            Some(ResolutionKind::Passed | ResolutionKind::Failed)
        )
    }

    /// Returns true if the test was attempted: passed, failed or unresolved.
    pub fn is_attempted(&self) -> bool {
        self.state.is_some_and(ResolutionKind::is_attempted)
    }

    /// Marks the test as never attempted. Only legal when unset.
    pub fn untested(&mut self) {
        self.apply(ResolutionTransition::Untested);
    }

    /// Marks the test as unsupported. Only legal when unset.
    pub fn unsupported(&mut self) {
        self.apply(ResolutionTransition::Unsupported);
    }

    /// Marks the test as passed. Only legal when unset.
    pub fn passed(&mut self) {
        self.apply(ResolutionTransition::Passed);
    }

    /// Escalates to failed.
    ///
    /// An unresolved test stays unresolved: a failure detected later must not mask missing or
    /// truncated evidence.
    pub fn failed(&mut self) {
        self.apply(ResolutionTransition::Failed);
    }

    /// Escalates to unresolved. Legal from any attempted state, or when unset.
    pub fn unresolved(&mut self) {
        self.apply(ResolutionTransition::Unresolved);
    }

    /// Applies a transition, panicking if it is illegal from the current state.
    pub fn apply(&mut self, transition: ResolutionTransition) {
        if let Err(err) = self.try_apply(transition) {
            panic!("{err}");
        }
    }

    /// Applies a transition, returning an error and leaving the state untouched if it is
    /// illegal from the current state.
    pub fn try_apply(
        &mut self,
        transition: ResolutionTransition,
    ) -> Result<(), ResolutionTransitionError> {
        use ResolutionKind::*;

        let next = match (transition, self.state) {
            (ResolutionTransition::Untested, None) => Untested,
            (ResolutionTransition::Unsupported, None) => Unsupported,
            (ResolutionTransition::Passed, None) => Passed,
            (ResolutionTransition::Failed, None | Some(Passed | Failed)) => Failed,
            (ResolutionTransition::Failed, Some(Unresolved)) => Unresolved,
            (ResolutionTransition::Unresolved, None | Some(Passed | Failed | Unresolved)) => {
                Unresolved
            }
            (transition, from) => {
                return Err(ResolutionTransitionError::new(transition, from));
            }
        };
        self.state = Some(next);
        Ok(())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            Some(kind) => kind.fmt(f),
            None => f.write_str("unset"),
        }
    }
}

impl PartialEq<ResolutionKind> for Resolution {
    fn eq(&self, other: &ResolutionKind) -> bool {
        self.state == Some(*other)
    }
}
