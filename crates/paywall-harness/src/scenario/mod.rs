//! Scenario-based testing with a mandatory oracle.
//!
//! A scenario declares the page setup (config, networks, key fixtures,
//! capability, cached user) and a script of [`Step`]s, then must be given an
//! oracle before it can run. The oracle inspects the final [`World`] and
//! returns `Err` describing any violated expectation.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use world::World;

/// Verification run against the final world.
pub type OracleFn = Box<dyn FnOnce(&World) -> Result<(), String>>;
