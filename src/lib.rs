pub mod animation;
pub mod assets;
pub mod cli;
pub mod config;
pub mod ecs;
pub mod errors;
pub mod events;
pub mod signal;

pub use animation::{AnimationClip, PlaybackState, SpriteAnimator};
pub use assets::{AssetId, AssetRef, AssetRegistry};
pub use config::{AnimatorConfig, ClipDefinition};
pub use ecs::EcsWorld;
