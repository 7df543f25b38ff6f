use crate::animation::{RenderedSprite, SharedFrameTarget, SpriteAnimator};
use bevy_ecs::prelude::*;
use glam::Vec4;
use std::collections::BTreeMap;
use std::sync::Arc;

mod systems;
mod world;

pub use systems::{sys_apply_sprite_frames, sys_drive_sprite_clips};
pub use world::EcsWorld;

const FULL_UV: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

// ---------- Components ----------

/// What an entity currently displays, mirrored from its animator every update.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct Sprite {
    pub texture: Option<Arc<str>>,
    pub region: Option<Arc<str>>,
    pub uv: Vec4,
    pub frame: Option<usize>,
}

impl Default for Sprite {
    fn default() -> Self {
        Self { texture: None, region: None, uv: FULL_UV, frame: None }
    }
}

impl From<&RenderedSprite> for Sprite {
    fn from(rendered: &RenderedSprite) -> Self {
        Self {
            texture: rendered.texture.as_ref().map(|texture| Arc::clone(&texture.key)),
            region: rendered.region.clone(),
            uv: rendered.uv.unwrap_or(FULL_UV),
            frame: rendered.frame,
        }
    }
}

// ---------- Resources ----------

#[derive(Resource, Clone, Copy, Default)]
pub struct TimeDelta(pub f32);

pub struct AnimatorSlot {
    pub animator: SpriteAnimator,
    pub target: SharedFrameTarget,
}

/// Non-send resource holding each entity's animator. Animators share
/// `Rc` state with the asset registry, so they stay on the main thread.
#[derive(Default)]
pub struct SpriteAnimators {
    slots: BTreeMap<Entity, AnimatorSlot>,
}

impl SpriteAnimators {
    pub fn insert(&mut self, entity: Entity, slot: AnimatorSlot) {
        self.slots.insert(entity, slot);
    }

    pub fn remove(&mut self, entity: Entity) -> Option<AnimatorSlot> {
        self.slots.remove(&entity)
    }

    pub fn get(&self, entity: Entity) -> Option<&AnimatorSlot> {
        self.slots.get(&entity)
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut AnimatorSlot> {
        self.slots.get_mut(&entity)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut AnimatorSlot)> + '_ {
        self.slots.iter_mut().map(|(entity, slot)| (*entity, slot))
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.slots.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
