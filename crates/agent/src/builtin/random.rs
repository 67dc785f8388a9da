use rand::Rng;

use mas_core::{Term, Unifier};

use super::{bind, expect_args, integer_arg, ActionContext, InternalAction, Outcome};
use crate::error::{AgentError, Result};

/// `.rand_int(X, Min, Max)`: uniform integer in `[Min, Max]`.
pub struct RandIntAction;

impl InternalAction for RandIntAction {
    fn name(&self) -> &'static str {
        "rand_int"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 3)?;
        let min = integer_arg(self.name(), un, &args[1])?;
        let max = integer_arg(self.name(), un, &args[2])?;
        if min > max {
            return Err(AgentError::invalid(
                self.name(),
                format!("empty range {}..{}", min, max),
            ));
        }
        let value = ctx.rng.gen_range(min..=max);
        bind(self.name(), un, &args[0], Term::number(value as f64))
    }
}

/// `.random(X)`: uniform number in `[0, 1)`.
pub struct RandomAction;

impl InternalAction for RandomAction {
    fn name(&self) -> &'static str {
        "random"
    }

    fn execute(&self, args: &[Term], un: &Unifier, ctx: &mut ActionContext<'_>) -> Result<Outcome> {
        expect_args(self.name(), args, 1)?;
        let value: f64 = ctx.rng.gen();
        bind(self.name(), un, &args[0], Term::number(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::Fixture;

    fn rand_int(fx: &mut Fixture, min: f64, max: f64) -> i64 {
        let args = vec![Term::var("X"), Term::number(min), Term::number(max)];
        fx.bound(&RandIntAction, args, "X").as_integer().unwrap()
    }

    #[test]
    fn test_rand_int_inclusive_range() {
        let mut fx = Fixture::new("a");
        for _ in 0..200 {
            let v = rand_int(&mut fx, 1.0, 3.0);
            assert!((1..=3).contains(&v));
        }
        assert_eq!(rand_int(&mut fx, 5.0, 5.0), 5);
    }

    #[test]
    fn test_rand_int_same_seed_same_values() {
        let mut a = Fixture::new("a");
        let mut b = Fixture::new("a");
        let xs: Vec<_> = (0..10).map(|_| rand_int(&mut a, 0.0, 1000.0)).collect();
        let ys: Vec<_> = (0..10).map(|_| rand_int(&mut b, 0.0, 1000.0)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_rand_int_empty_range() {
        let mut fx = Fixture::new("a");
        let args = vec![Term::var("X"), Term::number(3), Term::number(1)];
        assert!(fx.run(&RandIntAction, args).is_err());
    }

    #[test]
    fn test_random_unit_interval() {
        let mut fx = Fixture::new("a");
        let v = fx.bound(&RandomAction, vec![Term::var("R")], "R");
        let n = v.as_number().unwrap();
        assert!((0.0..1.0).contains(&n));
    }
}
