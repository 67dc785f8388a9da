use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;

use mas_core::{SelectionPolicy, Unifier};
use mas_lang::Plan;

/// A relevant plan whose context holds, with the bindings that made it hold.
#[derive(Debug, Clone)]
pub struct ApplicablePlan {
    pub plan: Arc<Plan>,
    pub unifier: Unifier,
}

/// Picks the intended means among applicable plans.
pub trait PlanSelector: Send + Sync {
    fn policy(&self) -> SelectionPolicy;

    /// Index into `options`, or `None` when `options` is empty.
    fn select(&self, options: &[ApplicablePlan], rng: &mut StdRng) -> Option<usize>;
}

/// First applicable plan in source order.
pub struct FirstMatch;

impl PlanSelector for FirstMatch {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::FirstMatch
    }

    fn select(&self, options: &[ApplicablePlan], _rng: &mut StdRng) -> Option<usize> {
        (!options.is_empty()).then_some(0)
    }
}

/// Uniformly random applicable plan, drawn from the agent's seeded rng.
pub struct RandomMatch;

impl PlanSelector for RandomMatch {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::RandomMatch
    }

    fn select(&self, options: &[ApplicablePlan], rng: &mut StdRng) -> Option<usize> {
        if options.is_empty() {
            None
        } else {
            Some(rng.gen_range(0..options.len()))
        }
    }
}

/// Highest label priority; ties go to the earliest plan.
pub struct PriorityMatch;

impl PlanSelector for PriorityMatch {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::PriorityMatch
    }

    fn select(&self, options: &[ApplicablePlan], _rng: &mut StdRng) -> Option<usize> {
        options
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, i64)>, (idx, option)| {
                let priority = option.plan.priority();
                match best {
                    Some((_, p)) if p >= priority => best,
                    _ => Some((idx, priority)),
                }
            })
            .map(|(idx, _)| idx)
    }
}

pub fn selector_for(policy: SelectionPolicy) -> Box<dyn PlanSelector> {
    match policy {
        SelectionPolicy::FirstMatch => Box::new(FirstMatch),
        SelectionPolicy::RandomMatch => Box::new(RandomMatch),
        SelectionPolicy::PriorityMatch => Box::new(PriorityMatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mas_lang::parse_agent;
    use rand::SeedableRng;

    fn options(src: &str) -> Vec<ApplicablePlan> {
        parse_agent(src)
            .unwrap()
            .plans
            .into_iter()
            .map(|plan| ApplicablePlan {
                plan: Arc::new(plan),
                unifier: Unifier::new(),
            })
            .collect()
    }

    #[test]
    fn test_first_match() {
        let mut rng = StdRng::seed_from_u64(1);
        let opts = options("+!g <- a. +!g <- b.");
        assert_eq!(FirstMatch.select(&opts, &mut rng), Some(0));
        assert_eq!(FirstMatch.select(&[], &mut rng), None);
    }

    #[test]
    fn test_priority_match_prefers_highest_then_earliest() {
        let mut rng = StdRng::seed_from_u64(1);
        let opts = options(
            "@a +!g <- a. @b[priority(2)] +!g <- b. @c[priority(2)] +!g <- c.",
        );
        assert_eq!(PriorityMatch.select(&opts, &mut rng), Some(1));
    }

    #[test]
    fn test_random_match_is_reproducible() {
        let opts = options("+!g <- a. +!g <- b. +!g <- c. +!g <- d.");
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..16)
                .map(|_| RandomMatch.select(&opts, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(9), draw(9));
        assert!(draw(9).iter().all(|&i| i < 4));
    }

    #[test]
    fn test_selector_for_policy() {
        for policy in [
            SelectionPolicy::FirstMatch,
            SelectionPolicy::RandomMatch,
            SelectionPolicy::PriorityMatch,
        ] {
            assert_eq!(selector_for(policy).policy(), policy);
        }
    }
}
