//! Policy names shared by the system loader, the scheduler and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// How the scheduler picks the next (agent, intention) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingPolicy {
    #[default]
    RoundRobin,
    Priority,
}

/// How an agent picks its intended means among applicable plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    #[default]
    FirstMatch,
    RandomMatch,
    PriorityMatch,
}

/// What happens to a goal event for which no plan is applicable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoApplicablePolicy {
    #[default]
    DropEvent,
    FailIntention,
}

impl FromStr for SchedulingPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round-robin" | "roundrobin" | "rr" => Ok(Self::RoundRobin),
            "priority" => Ok(Self::Priority),
            other => Err(CoreError::InvalidPolicy {
                kind: "scheduling",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-match" | "first" => Ok(Self::FirstMatch),
            "random-match" | "random" => Ok(Self::RandomMatch),
            "priority-match" | "priority" => Ok(Self::PriorityMatch),
            other => Err(CoreError::InvalidPolicy {
                kind: "plan selection",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for NoApplicablePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drop-event" | "drop" => Ok(Self::DropEvent),
            "fail-intention" | "fail" => Ok(Self::FailIntention),
            other => Err(CoreError::InvalidPolicy {
                kind: "no applicable plan",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RoundRobin => "round-robin",
            Self::Priority => "priority",
        })
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstMatch => "first-match",
            Self::RandomMatch => "random-match",
            Self::PriorityMatch => "priority-match",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_names() {
        assert_eq!("rr".parse::<SchedulingPolicy>().unwrap(), SchedulingPolicy::RoundRobin);
        assert_eq!("random".parse::<SelectionPolicy>().unwrap(), SelectionPolicy::RandomMatch);
        assert_eq!(
            "fail".parse::<NoApplicablePolicy>().unwrap(),
            NoApplicablePolicy::FailIntention
        );
    }

    #[test]
    fn test_invalid_policy_names_kind() {
        let err = "sometimes".parse::<SelectionPolicy>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid policy 'sometimes' for plan selection");
    }
}
