mod animation;
mod animation_state;
mod armature;
mod bone;
mod clock;
mod constraint;
mod slot;

pub use animation::*;
pub use animation_state::*;
pub use armature::*;
pub use bone::*;
pub use clock::*;
pub use constraint::*;
pub use slot::*;

#[cfg(test)]
mod animation_tests;




#[cfg(test)]
mod frame_cache_tests;
