//! Sprite animation clips and the component that plays them.

mod animator;
mod clip;
mod renderer;

pub use animator::SpriteAnimator;
pub use clip::{AnimationClip, PlaybackState};
pub use renderer::{FrameRenderer, FrameView, NullRenderer, RenderedSprite, SharedFrameTarget};
