//! Grid movement: one step towards a target with sideways detours.

use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Location) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// What the movement rules need to know about a grid.
pub trait Occupancy {
    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// Inside the grid and neither blocked nor occupied.
    fn is_free(&self, at: Location) -> bool;
}

/// Probability of stepping towards rather than away from the target.
const TOWARDS_TARGET: f64 = 0.9;

/// Next location of a body at `from` heading for `target`.
///
/// The axis with the larger distance goes first (vertical on ties). With
/// probability 0.9 the step closes the distance, otherwise it opens it.
/// When that cell is not free, random perpendicular steps are tried, up to
/// the grid's width (or height) times. Horizontal steps wrap around;
/// vertical ones do not. Returns `from` when no move is possible.
pub fn step_towards<G, R>(grid: &G, from: Location, target: Location, rng: &mut R) -> Location
where
    G: Occupancy + ?Sized,
    R: Rng + ?Sized,
{
    let towards = rng.gen::<f64>() < TOWARDS_TARGET;
    let vertical_first = (from.y - target.y).abs() >= (from.x - target.x).abs();

    if vertical_first {
        let next = vertical_move(from, target, towards);
        if next != from && grid.is_free(next) {
            return next;
        }
        for _ in 0..grid.width() {
            let detour = horizontal_jitter(from, grid.width(), rng);
            if grid.is_free(detour) {
                return detour;
            }
        }
    } else {
        let next = horizontal_move(from, target, towards, grid.width());
        if next != from && grid.is_free(next) {
            return next;
        }
        for _ in 0..grid.height() {
            let detour = vertical_jitter(from, rng);
            if grid.is_free(detour) {
                return detour;
            }
        }
    }
    from
}

fn vertical_move(from: Location, target: Location, towards: bool) -> Location {
    let dir = (target.y - from.y).signum();
    let dy = if towards { dir } else { -dir };
    Location::new(from.x, from.y + dy)
}

fn horizontal_move(from: Location, target: Location, towards: bool, width: i32) -> Location {
    let dir = (target.x - from.x).signum();
    let dx = if towards { dir } else { -dir };
    Location::new((from.x + dx).rem_euclid(width), from.y)
}

fn horizontal_jitter<R: Rng + ?Sized>(from: Location, width: i32, rng: &mut R) -> Location {
    let dx = if rng.gen::<bool>() { 1 } else { -1 };
    Location::new((from.x + dx).rem_euclid(width), from.y)
}

fn vertical_jitter<R: Rng + ?Sized>(from: Location, rng: &mut R) -> Location {
    let dy = if rng.gen::<bool>() { 1 } else { -1 };
    Location::new(from.x, from.y + dy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeSet;

    struct TestGrid {
        size: i32,
        blocked: BTreeSet<Location>,
    }

    impl Occupancy for TestGrid {
        fn width(&self) -> i32 {
            self.size
        }

        fn height(&self) -> i32 {
            self.size
        }

        fn is_free(&self, at: Location) -> bool {
            (0..self.size).contains(&at.x)
                && (0..self.size).contains(&at.y)
                && !self.blocked.contains(&at)
        }
    }

    fn grid(blocked: &[(i32, i32)]) -> TestGrid {
        TestGrid {
            size: 5,
            blocked: blocked.iter().map(|&(x, y)| Location::new(x, y)).collect(),
        }
    }

    #[test]
    fn test_reaches_target_on_open_grid() {
        let g = grid(&[]);
        let mut rng = StdRng::seed_from_u64(7);
        let target = Location::new(4, 4);
        let mut at = Location::new(0, 0);
        for _ in 0..200 {
            if at == target {
                break;
            }
            at = step_towards(&g, at, target, &mut rng);
        }
        assert_eq!(at, target);
    }

    #[test]
    fn test_never_enters_blocked_cells() {
        let g = grid(&[(2, 1), (2, 2), (2, 3), (1, 2)]);
        let mut rng = StdRng::seed_from_u64(3);
        let mut at = Location::new(0, 0);
        for i in 0..500 {
            let target = Location::new((i * 3) % 5, (i * 7) % 5);
            at = step_towards(&g, at, target, &mut rng);
            assert!(g.is_free(at), "entered {}", at);
        }
    }

    #[test]
    fn test_detours_when_blocked() {
        // Both vertical neighbours are blocked; the only ways out are sideways.
        let g = grid(&[(2, 3), (2, 1)]);
        let mut rng = StdRng::seed_from_u64(11);
        let from = Location::new(2, 2);
        let next = step_towards(&g, from, Location::new(2, 4), &mut rng);
        assert_ne!(next, Location::new(2, 3));
        assert_eq!(next.y, 2);
    }

    #[test]
    fn test_horizontal_wraps() {
        assert_eq!(horizontal_jitter(Location::new(0, 1), 5, &mut WrapLeft), Location::new(4, 1));
        assert_eq!(
            horizontal_move(Location::new(4, 0), Location::new(0, 0), false, 5),
            Location::new(0, 0)
        );
    }

    /// Rng whose booleans are always `false`.
    struct WrapLeft;

    impl rand::RngCore for WrapLeft {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            dest.fill(0);
            Ok(())
        }
    }
}
