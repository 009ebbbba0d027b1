//! Pure Rust runtime core for DragonBones 5.x skeletal animation data (unofficial).
//!
//! The crate evaluates armatures: it samples animation timelines, blends layered animation
//! states, composes the bone hierarchy, solves IK constraints and reports slot changes to an
//! engine-side [`SlotRenderer`]. Parsing asset files and drawing are left to the host.

#![forbid(unsafe_code)]

mod config;
mod error;
mod event;
mod factory;
mod frame_cache;
mod geometry;
mod model;
mod pool;
mod runtime;
mod timeline;
mod tween;
mod version;

pub use config::*;
pub use error::*;
pub use event::*;
pub use factory::*;
pub use frame_cache::*;
pub use geometry::*;
pub use model::*;
pub use pool::*;
pub use runtime::*;
pub use timeline::*;
pub use tween::*;
pub use version::*;



#[cfg(test)]
mod model_tests;


#[cfg(test)]
mod factory_tests;
