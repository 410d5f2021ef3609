//! Name synchronization engine
//!
//! Keeps custom device names visible on every surface while the persisted
//! maps, the rendered device lists and the mixer's active devices all change
//! independently. The engine is an actor: every notification becomes a
//! command on one queue and is handled to completion before the next.

mod commands;
pub mod delay;
pub mod diff;
mod engine;
mod handle;
pub mod propagator;

pub use delay::DelayRegistry;
pub use diff::{generate_diff_update, generate_update_from_single_state, reverse_names_map, UpdateType};
pub use engine::{Collaborators, EngineState, SyncEngine};
pub use handle::EngineHandle;
pub use propagator::NamePropagator;
