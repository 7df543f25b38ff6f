use super::{Sprite, SpriteAnimators, TimeDelta};
use crate::events::{EventBus, GameEvent};
use bevy_ecs::prelude::{Entity, NonSend, NonSendMut, Query, Res, ResMut};

pub fn sys_drive_sprite_clips(
    dt: Res<TimeDelta>,
    mut animators: NonSendMut<SpriteAnimators>,
    mut events: ResMut<EventBus>,
) {
    for (entity, slot) in animators.iter_mut() {
        slot.animator.update(dt.0);
        for event in slot.animator.drain_events() {
            events.push(GameEvent::SpriteClip { entity, event });
        }
    }
}

pub fn sys_apply_sprite_frames(animators: NonSend<SpriteAnimators>, mut sprites: Query<(Entity, &mut Sprite)>) {
    for (entity, mut sprite) in &mut sprites {
        let Some(slot) = animators.get(entity) else {
            continue;
        };
        let next = Sprite::from(&slot.target.snapshot());
        if *sprite != next {
            *sprite = next;
        }
    }
}
