use super::clip::AnimationClip;
use super::renderer::{FrameRenderer, FrameView};
use crate::assets::{AssetRegistry, AtlasTexture, BoundSprite};
use crate::config::{AnimatorConfig, ClipDefinition};
use crate::events::ClipEvent;
use crate::signal::{Signal, Subscription};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// State a clip reads from its owning animator.
pub(crate) struct AnimatorShared {
    current: RefCell<Option<AnimationClip>>,
    speed: Cell<f32>,
    renderer: RefCell<Box<dyn FrameRenderer>>,
}

impl AnimatorShared {
    pub(crate) fn speed(&self) -> f32 {
        self.speed.get()
    }

    pub(crate) fn is_current(&self, clip: &AnimationClip) -> bool {
        self.current.borrow().as_ref().is_some_and(|current| current.ptr_eq(clip))
    }

    pub(crate) fn show_frame(&self, sprite: &BoundSprite, frame: usize) {
        let view = FrameView { index: frame, key: sprite.resource.frame_key(frame), region: sprite.region(frame) };
        self.renderer.borrow_mut().show_frame(view);
    }

    pub(crate) fn set_texture(&self, texture: Option<&AtlasTexture>) {
        self.renderer.borrow_mut().set_texture(texture);
    }
}

struct ClipSlot {
    clip: AnimationClip,
    _forward: Subscription,
}

/// Owns a set of named clips and drives the one currently playing.
///
/// Clip events are re-fired through [`SpriteAnimator::on_event`] and queued
/// for [`SpriteAnimator::drain_events`].
pub struct SpriteAnimator {
    shared: Rc<AnimatorShared>,
    registry: AssetRegistry,
    clips: Vec<ClipSlot>,
    autoplay: Option<String>,
    enabled: bool,
    events: Signal<ClipEvent>,
    queue: Rc<RefCell<Vec<ClipEvent>>>,
}

impl SpriteAnimator {
    pub fn new(registry: AssetRegistry, renderer: Box<dyn FrameRenderer>) -> Self {
        Self {
            shared: Rc::new(AnimatorShared {
                current: RefCell::new(None),
                speed: Cell::new(1.0),
                renderer: RefCell::new(renderer),
            }),
            registry,
            clips: Vec::new(),
            autoplay: None,
            enabled: true,
            events: Signal::new(),
            queue: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn from_config(config: &AnimatorConfig, registry: AssetRegistry, renderer: Box<dyn FrameRenderer>) -> Self {
        let mut animator = Self::new(registry, renderer);
        animator.set_speed(config.speed);
        animator.autoplay = config.autoplay.clone();
        for definition in &config.clips {
            animator.add_clip(definition);
        }
        animator
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Creates a clip, replacing any clip with the same name.
    pub fn add_clip(&mut self, definition: &ClipDefinition) -> AnimationClip {
        self.remove_clip(&definition.name);
        let clip = AnimationClip::with_host(definition, &self.registry, Rc::downgrade(&self.shared));
        let events = self.events.clone();
        let queue = Rc::clone(&self.queue);
        let forward = clip.on_event(move |event| {
            queue.borrow_mut().push(event.clone());
            events.emit(event);
        });
        debug!("[animator] added clip '{}'", definition.name);
        self.clips.push(ClipSlot { clip: clip.clone(), _forward: forward });
        if self.autoplay.as_deref() == Some(definition.name.as_str()) {
            self.try_autoplay();
        }
        clip
    }

    /// Removes a clip and detaches its listeners. Removing the current clip
    /// leaves the animator without one.
    pub fn remove_clip(&mut self, name: &str) -> Option<AnimationClip> {
        let index = self.clips.iter().position(|slot| slot.clip.name().as_ref() == name)?;
        let slot = self.clips.remove(index);
        if self.shared.is_current(&slot.clip) {
            self.shared.current.replace(None);
            slot.clip.halt();
        }
        slot.clip.unbind();
        debug!("[animator] removed clip '{name}'");
        Some(slot.clip)
    }

    pub fn clip(&self, name: &str) -> Option<AnimationClip> {
        self.clips.iter().find(|slot| slot.clip.name().as_ref() == name).map(|slot| slot.clip.clone())
    }

    pub fn clip_names(&self) -> Vec<String> {
        self.clips.iter().map(|slot| slot.clip.name().to_string()).collect()
    }

    pub fn clips(&self) -> impl Iterator<Item = &AnimationClip> + '_ {
        self.clips.iter().map(|slot| &slot.clip)
    }

    pub fn current_clip(&self) -> Option<AnimationClip> {
        self.shared.current.borrow().clone()
    }

    /// Makes the named clip current and plays it. The previous current clip
    /// stops without raising an event.
    pub fn play(&mut self, name: &str) -> Option<AnimationClip> {
        let Some(clip) = self.clip(name) else {
            warn!("[animator] no clip named '{name}' to play");
            return None;
        };
        let previous = self.shared.current.replace(Some(clip.clone()));
        if let Some(previous) = previous {
            if !previous.ptr_eq(&clip) {
                previous.halt();
            }
        }
        clip.refresh_visuals();
        clip.play();
        Some(clip)
    }

    pub fn pause(&self) {
        if let Some(clip) = self.current_clip() {
            clip.pause();
        }
    }

    pub fn resume(&self) {
        if let Some(clip) = self.current_clip() {
            clip.resume();
        }
    }

    pub fn stop(&self) {
        if let Some(clip) = self.current_clip() {
            clip.stop();
        }
    }

    pub fn speed(&self) -> f32 {
        self.shared.speed.get()
    }

    pub fn set_speed(&mut self, speed: f32) {
        if speed.is_finite() {
            self.shared.speed.set(speed);
        } else {
            warn!("[animator] ignoring non-finite speed {speed}");
        }
    }

    pub fn autoplay_clip(&self) -> Option<&str> {
        self.autoplay.as_deref()
    }

    pub fn set_autoplay_clip(&mut self, name: Option<String>) {
        self.autoplay = name;
        self.try_autoplay();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        self.enabled = true;
        self.try_autoplay();
    }

    /// A disabled animator keeps its state but ignores [`SpriteAnimator::update`].
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn update(&mut self, dt: f32) {
        if !self.enabled {
            return;
        }
        if let Some(clip) = self.current_clip() {
            clip.advance(dt);
        }
    }

    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ClipEvent) + 'static,
    {
        self.events.connect(callback)
    }

    pub fn drain_events(&mut self) -> Vec<ClipEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    fn try_autoplay(&mut self) {
        if !self.enabled {
            return;
        }
        let Some(name) = self.autoplay.clone() else {
            return;
        };
        let Some(clip) = self.clip(&name) else {
            return;
        };
        let current_playing = self.current_clip().is_some_and(|current| current.is_playing());
        if !clip.is_playing() && !current_playing {
            self.play(&name);
        }
    }
}

impl Drop for SpriteAnimator {
    fn drop(&mut self) {
        self.shared.current.replace(None);
        for slot in &self.clips {
            slot.clip.unbind();
        }
    }
}

impl fmt::Debug for SpriteAnimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteAnimator")
            .field("clips", &self.clip_names())
            .field("current", &self.current_clip().map(|clip| clip.name()))
            .field("speed", &self.speed())
            .field("enabled", &self.enabled)
            .finish()
    }
}
