pub mod error;
pub mod factory;
pub mod movement;
pub mod world;

use tracing::info;

use mas_core::{Environment, Literal, NullEnvironment, Term};

pub use error::{EnvError, Result};
pub use factory::{FactoryEnvironment, DELIVERY, DELIVERY_ID, GRID_SIZE, TRUCK};
pub use movement::{step_towards, Location, Occupancy};
pub use world::{ActionHandler, WorldEnvironment, WorldState};

/// Builds the environment named by a system file.
///
/// `none` (or empty) gives a [`NullEnvironment`]; `world` a
/// [`WorldEnvironment`] whose arguments are initial global percepts; any
/// name containing `factory` (such as `env.FactoryEnv`) a
/// [`FactoryEnvironment`] seeded with `seed`.
pub fn create(kind: &str, args: &[Term], seed: u64) -> Result<Box<dyn Environment>> {
    let normalized = kind.trim().to_ascii_lowercase();
    let env: Box<dyn Environment> = match normalized.as_str() {
        "" | "none" | "null" => Box::new(NullEnvironment),
        "world" => {
            let mut world = WorldEnvironment::new();
            for arg in args {
                let percept = Literal::from_term(arg.clone())
                    .map_err(|e| EnvError::InvalidArgument(e.to_string()))?;
                world.state_mut().add_global(percept);
            }
            Box::new(world)
        }
        name if name.contains("factory") => Box::new(FactoryEnvironment::new(seed)),
        _ => return Err(EnvError::UnknownKind(kind.to_string())),
    };
    info!(kind, seed, "Environment created");
    Ok(env)
}
