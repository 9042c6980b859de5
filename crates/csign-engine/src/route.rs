//! # Approval Route Definitions
//!
//! A route is an ordered sequence of approver steps. Step numbers
//! must be positive, unique, and contiguous starting at 1 — the
//! engine advances `current_step` by increments of one, so any gap
//! would strand an application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use csign_core::{RouteId, UserId};

/// A single position in a route, bound to exactly one approver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    /// 1-based position in the route.
    pub step_number: u32,
    /// The identity that may act when this step is active.
    pub approver_id: UserId,
}

/// Errors in route definition.
#[derive(Error, Debug, PartialEq)]
pub enum RouteError {
    /// A route must have at least one step.
    #[error("route must have at least one step")]
    Empty,

    /// Step numbers must start at 1 and increase without gaps.
    #[error("route steps must be contiguous from 1: expected step {expected}, found {found}")]
    NonContiguous { expected: u32, found: u32 },

    /// The same step number appears more than once.
    #[error("duplicate step number: {step_number}")]
    DuplicateStep { step_number: u32 },
}

/// An approval route definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRoute {
    pub id: RouteId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Steps sorted by `step_number`, contiguous from 1.
    pub steps: Vec<RouteStep>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRoute {
    /// Create a new route, validating and normalizing the step sequence.
    pub fn new(
        name: String,
        description: Option<String>,
        mut steps: Vec<RouteStep>,
        created_by: UserId,
    ) -> Result<Self, RouteError> {
        validate_steps(&mut steps)?;
        let now = Utc::now();
        Ok(Self {
            id: RouteId::new(),
            name,
            description,
            steps,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace the step sequence, re-validating.
    pub fn set_steps(&mut self, mut steps: Vec<RouteStep>) -> Result<(), RouteError> {
        validate_steps(&mut steps)?;
        self.steps = steps;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Number of steps in the route.
    pub fn step_count(&self) -> u32 {
        self.steps.len() as u32
    }

    /// The approver bound to the given 1-based step, if it exists.
    pub fn approver_for(&self, step_number: u32) -> Option<UserId> {
        self.steps
            .iter()
            .find(|s| s.step_number == step_number)
            .map(|s| s.approver_id)
    }
}

/// Sort steps by number and enforce the contiguous-from-1 invariant.
fn validate_steps(steps: &mut [RouteStep]) -> Result<(), RouteError> {
    if steps.is_empty() {
        return Err(RouteError::Empty);
    }
    steps.sort_by_key(|s| s.step_number);
    for (i, step) in steps.iter().enumerate() {
        let expected = i as u32 + 1;
        if step.step_number == expected {
            continue;
        }
        if i > 0 && step.step_number == steps[i - 1].step_number {
            return Err(RouteError::DuplicateStep {
                step_number: step.step_number,
            });
        }
        return Err(RouteError::NonContiguous {
            expected,
            found: step.step_number,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: u32) -> RouteStep {
        RouteStep {
            step_number: n,
            approver_id: UserId::new(),
        }
    }

    #[test]
    fn test_single_step_route() {
        let route = ApprovalRoute::new("r".to_string(), None, vec![step(1)], UserId::new()).unwrap();
        assert_eq!(route.step_count(), 1);
    }

    #[test]
    fn test_steps_sorted_on_construction() {
        let route = ApprovalRoute::new(
            "r".to_string(),
            None,
            vec![step(3), step(1), step(2)],
            UserId::new(),
        )
        .unwrap();
        let numbers: Vec<u32> = route.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_route_rejected() {
        let err = ApprovalRoute::new("r".to_string(), None, vec![], UserId::new()).unwrap_err();
        assert_eq!(err, RouteError::Empty);
    }

    #[test]
    fn test_zero_step_rejected() {
        let err =
            ApprovalRoute::new("r".to_string(), None, vec![step(0)], UserId::new()).unwrap_err();
        assert_eq!(
            err,
            RouteError::NonContiguous {
                expected: 1,
                found: 0
            }
        );
    }

    #[test]
    fn test_gap_rejected() {
        let err = ApprovalRoute::new("r".to_string(), None, vec![step(1), step(3)], UserId::new())
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::NonContiguous {
                expected: 2,
                found: 3
            }
        );
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let err = ApprovalRoute::new(
            "r".to_string(),
            None,
            vec![step(1), step(2), step(2)],
            UserId::new(),
        )
        .unwrap_err();
        assert_eq!(err, RouteError::DuplicateStep { step_number: 2 });
    }

    #[test]
    fn test_not_starting_at_one_rejected() {
        let err = ApprovalRoute::new("r".to_string(), None, vec![step(2), step(3)], UserId::new())
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::NonContiguous {
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_approver_for() {
        let alice = UserId::new();
        let bob = UserId::new();
        let route = ApprovalRoute::new(
            "r".to_string(),
            None,
            vec![
                RouteStep {
                    step_number: 1,
                    approver_id: alice,
                },
                RouteStep {
                    step_number: 2,
                    approver_id: bob,
                },
            ],
            UserId::new(),
        )
        .unwrap();
        assert_eq!(route.approver_for(1), Some(alice));
        assert_eq!(route.approver_for(2), Some(bob));
        assert_eq!(route.approver_for(3), None);
    }
}
