use bevy_ecs::prelude::{Entity, Resource};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipEventKind {
    Play,
    Pause,
    Resume,
    Stop,
    /// A non-looping clip ran past its last frame and stopped.
    End,
    /// A looping clip wrapped around.
    Loop,
}

impl ClipEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClipEventKind::Play => "play",
            ClipEventKind::Pause => "pause",
            ClipEventKind::Resume => "resume",
            ClipEventKind::Stop => "stop",
            ClipEventKind::End => "end",
            ClipEventKind::Loop => "loop",
        }
    }
}

/// A playback notification scoped by the clip that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipEvent {
    pub clip: Arc<str>,
    pub kind: ClipEventKind,
}

impl ClipEvent {
    pub fn new(clip: Arc<str>, kind: ClipEventKind) -> Self {
        Self { clip, kind }
    }
}

impl fmt::Display for ClipEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.clip)
    }
}

#[derive(Debug, Clone)]
pub enum GameEvent {
    SpriteClip { entity: Entity, event: ClipEvent },
    AnimatorRemoved { entity: Entity },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::SpriteClip { entity, event } => {
                write!(f, "SpriteClip entity={} clip={} event={}", entity.index(), event.clip, event.kind.as_str())
            }
            GameEvent::AnimatorRemoved { entity } => {
                write!(f, "AnimatorRemoved entity={}", entity.index())
            }
        }
    }
}

#[derive(Default, Resource)]
pub struct EventBus {
    events: Vec<GameEvent>,
}

impl EventBus {
    pub fn push(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
