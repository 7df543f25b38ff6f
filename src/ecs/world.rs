use super::systems::{sys_apply_sprite_frames, sys_drive_sprite_clips};
use super::{AnimatorSlot, Sprite, SpriteAnimators, TimeDelta};
use crate::animation::{SharedFrameTarget, SpriteAnimator};
use crate::assets::AssetRegistry;
use crate::config::AnimatorConfig;
use crate::events::{EventBus, GameEvent};
use bevy_ecs::prelude::{Entity, IntoSystemConfigs, Schedule, World};
use bevy_ecs::schedule::ExecutorKind;
use log::debug;

// ---------- World container ----------
pub struct EcsWorld {
    pub world: World,
    schedule: Schedule,
    registry: AssetRegistry,
}

impl EcsWorld {
    pub fn new(registry: AssetRegistry) -> Self {
        let mut world = World::new();
        world.insert_resource(TimeDelta(0.0));
        world.insert_resource(EventBus::default());
        world.insert_non_send_resource(SpriteAnimators::default());

        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems((sys_drive_sprite_clips, sys_apply_sprite_frames).chain());

        Self { world, schedule, registry }
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Spawns an entity driven by a new animator built from `config`.
    pub fn spawn_animated(&mut self, config: &AnimatorConfig) -> Entity {
        let target = SharedFrameTarget::new();
        let animator = SpriteAnimator::from_config(config, self.registry.clone(), Box::new(target.clone()));
        let sprite = Sprite::from(&target.snapshot());
        let entity = self.world.spawn(sprite).id();
        debug!("[animator] spawned entity {} with clips {:?}", entity.index(), animator.clip_names());
        self.animators_mut().insert(entity, AnimatorSlot { animator, target });
        entity
    }

    /// Drops the entity's animator, which unbinds its clips, and despawns it.
    pub fn despawn_animated(&mut self, entity: Entity) -> bool {
        let Some(mut slot) = self.animators_mut().remove(entity) else {
            return false;
        };
        let pending = slot.animator.drain_events();
        drop(slot);
        {
            let mut bus = self.world.resource_mut::<EventBus>();
            for event in pending {
                bus.push(GameEvent::SpriteClip { entity, event });
            }
            bus.push(GameEvent::AnimatorRemoved { entity });
        }
        self.world.despawn(entity);
        true
    }

    pub fn animator(&self, entity: Entity) -> Option<&SpriteAnimator> {
        self.world.get_non_send_resource::<SpriteAnimators>()?.get(entity).map(|slot| &slot.animator)
    }

    pub fn animator_mut(&mut self, entity: Entity) -> Option<&mut SpriteAnimator> {
        self.animators_mut().get_mut(entity).map(|slot| &mut slot.animator)
    }

    pub fn animated_entities(&self) -> Vec<Entity> {
        self.world.get_non_send_resource::<SpriteAnimators>().map(SpriteAnimators::entities).unwrap_or_default()
    }

    pub fn sprite(&self, entity: Entity) -> Option<&Sprite> {
        self.world.get::<Sprite>(entity)
    }

    pub fn update(&mut self, dt: f32) {
        self.world.resource_mut::<TimeDelta>().0 = dt;
        self.schedule.run(&mut self.world);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.world.resource_mut::<EventBus>().drain()
    }

    fn animators_mut(&mut self) -> &mut SpriteAnimators {
        self.world.non_send_resource_mut::<SpriteAnimators>().into_inner()
    }
}
