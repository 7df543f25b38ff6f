use super::animator::AnimatorShared;
use crate::assets::{AssetEvent, AssetId, AssetRef, AssetRegistry, AssetState, BoundSprite};
use crate::config::ClipDefinition;
use crate::events::{ClipEvent, ClipEventKind};
use crate::signal::{Signal, Subscription};
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// Absorbs float error so `time = frame / fps` maps back onto `frame`.
const FRAME_SNAP: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Listeners tying a clip to its sprite asset. Replacing or dropping the
/// value revokes all of them.
#[derive(Default)]
struct SpriteBinding {
    pending_add: Option<Subscription>,
    asset: Vec<Subscription>,
    atlas: Option<Subscription>,
}

struct ClipInner {
    name: Arc<str>,
    fps: f32,
    looped: bool,
    sprite_asset: Option<AssetId>,
    sprite: Option<BoundSprite>,
    time: f32,
    frame: usize,
    playing: bool,
    paused: bool,
    binding: SpriteBinding,
    meshes: Option<Subscription>,
    registry: AssetRegistry,
    host: Weak<AnimatorShared>,
    events: Signal<ClipEvent>,
}

impl ClipInner {
    fn frame_count(&self) -> usize {
        self.sprite.as_ref().map_or(0, BoundSprite::frame_count)
    }

    fn duration(&self) -> f32 {
        let count = self.frame_count();
        if count == 0 || self.fps <= 0.0 {
            0.0
        } else {
            count as f32 / self.fps
        }
    }

    /// Time-derived frames stop at the last frame index.
    fn frame_at(&self, time: f32) -> usize {
        let count = self.frame_count();
        let duration = self.duration();
        if count == 0 || duration <= 0.0 {
            return 0;
        }
        let raw = (count as f32 * time / duration + FRAME_SNAP).floor().max(0.0);
        (raw as usize).min(count - 1)
    }

    fn wrap_time(&self, time: f32) -> f32 {
        let duration = self.duration();
        if duration <= 0.0 || !time.is_finite() {
            return 0.0;
        }
        if time < 0.0 {
            if self.looped {
                time.rem_euclid(duration)
            } else {
                0.0
            }
        } else if time > duration {
            if self.looped {
                time % duration
            } else {
                duration
            }
        } else {
            time
        }
    }

    /// Explicit frame assignment keeps the inclusive `frame_count` bound.
    fn assign_frame(&mut self, frame: usize) {
        self.frame = if self.sprite.is_some() { frame.min(self.frame_count()) } else { 0 };
        let fps = if self.fps > 0.0 { self.fps } else { f32::MIN_POSITIVE };
        self.time = (self.frame as f32 / fps).clamp(0.0, self.duration());
    }

    fn assign_time(&mut self, time: f32) {
        self.time = self.wrap_time(time);
        self.frame = self.frame_at(self.time);
    }

    /// Brings time and frame back in line after the sprite or fps changed.
    fn resync(&mut self) {
        if self.sprite.is_none() {
            self.time = 0.0;
            self.frame = 0;
        } else if self.time > 0.0 && self.fps > 0.0 {
            self.assign_time(self.time);
        } else {
            self.assign_frame(self.frame);
        }
    }

    fn state(&self) -> PlaybackState {
        match (self.playing, self.paused) {
            (false, _) => PlaybackState::Stopped,
            (true, false) => PlaybackState::Playing,
            (true, true) => PlaybackState::Paused,
        }
    }
}

/// Cheap to clone; clones share state. A clip created by a
/// [`SpriteAnimator`](super::SpriteAnimator) reports to that animator's
/// renderer while it is the animator's current clip.
#[derive(Clone)]
pub struct AnimationClip {
    inner: Rc<RefCell<ClipInner>>,
}

impl AnimationClip {
    /// A clip without an owning animator. It plays at speed `1.0` and never
    /// reaches a renderer.
    pub fn new(definition: &ClipDefinition, registry: &AssetRegistry) -> Self {
        Self::with_host(definition, registry, Weak::new())
    }

    pub(crate) fn with_host(
        definition: &ClipDefinition,
        registry: &AssetRegistry,
        host: Weak<AnimatorShared>,
    ) -> Self {
        let clip = Self {
            inner: Rc::new(RefCell::new(ClipInner {
                name: Arc::from(definition.name.as_str()),
                fps: sanitize_fps(&definition.name, definition.fps),
                looped: definition.looped,
                sprite_asset: None,
                sprite: None,
                time: 0.0,
                frame: 0,
                playing: false,
                paused: false,
                binding: SpriteBinding::default(),
                meshes: None,
                registry: registry.clone(),
                host,
                events: Signal::new(),
            })),
        };
        clip.set_sprite_asset(definition.sprite_asset);
        clip
    }

    pub fn name(&self) -> Arc<str> {
        Arc::clone(&self.inner.borrow().name)
    }

    pub fn fps(&self) -> f32 {
        self.inner.borrow().fps
    }

    pub fn set_fps(&self, fps: f32) {
        let changed = {
            let mut inner = self.inner.borrow_mut();
            let previous = inner.frame;
            let fps = sanitize_fps(&inner.name, fps);
            inner.fps = fps;
            inner.resync();
            inner.frame != previous
        };
        if changed {
            self.render_frame();
        }
    }

    pub fn looped(&self) -> bool {
        self.inner.borrow().looped
    }

    pub fn set_looped(&self, looped: bool) {
        self.inner.borrow_mut().looped = looped;
    }

    pub fn sprite_asset(&self) -> Option<AssetId> {
        self.inner.borrow().sprite_asset
    }

    pub fn sprite(&self) -> Option<BoundSprite> {
        self.inner.borrow().sprite.clone()
    }

    pub fn time(&self) -> f32 {
        self.inner.borrow().time
    }

    pub fn frame(&self) -> usize {
        self.inner.borrow().frame
    }

    pub fn frame_count(&self) -> usize {
        self.inner.borrow().frame_count()
    }

    /// `frame_count / fps`, or `0` without frames or with `fps == 0`.
    pub fn duration(&self) -> f32 {
        self.inner.borrow().duration()
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.borrow().state()
    }

    pub fn is_playing(&self) -> bool {
        self.inner.borrow().playing
    }

    pub fn is_paused(&self) -> bool {
        self.inner.borrow().paused
    }

    pub fn is_active(&self) -> bool {
        self.host().is_some_and(|host| host.is_current(self))
    }

    pub fn definition(&self) -> ClipDefinition {
        let inner = self.inner.borrow();
        ClipDefinition {
            name: inner.name.to_string(),
            fps: inner.fps,
            looped: inner.looped,
            sprite_asset: inner.sprite_asset.map(AssetRef::Id),
        }
    }

    pub fn on_event<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ClipEvent) + 'static,
    {
        let events = self.inner.borrow().events.clone();
        events.connect(callback)
    }

    pub fn ptr_eq(&self, other: &AnimationClip) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------- Playback ----------

    pub fn play(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.playing && !inner.paused {
                return;
            }
            inner.playing = true;
            inner.paused = false;
        }
        self.set_frame(0);
        self.emit(ClipEventKind::Play);
    }

    pub fn pause(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.playing || inner.paused {
                return;
            }
            inner.paused = true;
        }
        self.emit(ClipEventKind::Pause);
    }

    pub fn resume(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.paused {
                return;
            }
            inner.paused = false;
        }
        self.emit(ClipEventKind::Resume);
    }

    pub fn stop(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.playing {
                return;
            }
            inner.playing = false;
            inner.paused = false;
            inner.time = 0.0;
        }
        self.set_frame(0);
        self.emit(ClipEventKind::Stop);
    }

    /// Stops without resetting or notifying; used when another clip takes over.
    pub(crate) fn halt(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.playing = false;
        inner.paused = false;
    }

    pub fn advance(&self, dt: f32) {
        let speed = self.host().map_or(1.0, |host| host.speed());
        let (frame_changed, event) = {
            let mut inner = self.inner.borrow_mut();
            if inner.fps == 0.0 || !inner.playing || inner.paused || !dt.is_finite() {
                return;
            }
            let duration = inner.duration();
            if duration <= 0.0 {
                return;
            }
            let mut time = inner.time + dt * speed;
            // Looping time stays below `duration`; a one-shot clip may rest on it.
            let past_end = if inner.looped { time >= duration } else { time > duration };
            let end = past_end || time < 0.0;
            if end {
                if inner.looped {
                    time = time.rem_euclid(duration);
                    if time >= duration {
                        time = 0.0;
                    }
                } else {
                    time = time.clamp(0.0, duration);
                    inner.playing = false;
                    inner.paused = false;
                }
            }
            inner.time = time;
            let frame = inner.frame_at(time);
            let changed = frame != inner.frame;
            inner.frame = frame;
            let event = end.then_some(if inner.looped { ClipEventKind::Loop } else { ClipEventKind::End });
            (changed, event)
        };
        if frame_changed {
            self.render_frame();
        }
        if let Some(kind) = event {
            self.emit(kind);
        }
    }

    // ---------- Frame / time ----------

    /// Sets the frame (clamped to `0..=frame_count`) and derives time from it.
    pub fn set_frame(&self, frame: usize) {
        self.inner.borrow_mut().assign_frame(frame);
        self.render_frame();
    }

    /// Sets the time (wrapped or clamped into `0..=duration`) and derives the frame from it.
    pub fn set_time(&self, time: f32) {
        self.inner.borrow_mut().assign_time(time);
        self.render_frame();
    }

    // ---------- Sprite binding ----------

    /// Binds the clip to a sprite asset, revoking every listener of the previous binding.
    pub fn set_sprite_asset(&self, asset: Option<AssetRef>) {
        let id = asset.map(|reference| reference.id());
        let stale = {
            let mut inner = self.inner.borrow_mut();
            if inner.sprite_asset == id {
                return;
            }
            inner.sprite_asset = id;
            std::mem::take(&mut inner.binding)
        };
        drop(stale);

        let Some(id) = id else {
            self.set_sprite(None);
            return;
        };
        let registry = self.registry();
        if registry.contains(id) {
            self.bind_asset(id);
            return;
        }
        debug!("[clip] '{}' waiting for sprite asset {id} to be added", self.name());
        self.set_sprite(None);
        let weak = self.downgrade();
        let pending = registry.once_added(id, move |added| {
            if let Some(clip) = AnimationClip::upgrade(&weak) {
                clip.on_sprite_asset_added(*added);
            }
        });
        self.inner.borrow_mut().binding.pending_add = Some(pending);
    }

    pub fn set_sprite(&self, sprite: Option<BoundSprite>) {
        let weak = self.downgrade();
        let meshes = sprite.as_ref().map(|bound| {
            bound.resource.on_meshes_changed(move |_| {
                if let Some(clip) = AnimationClip::upgrade(&weak) {
                    clip.render_frame();
                }
            })
        });
        let stale = {
            let mut inner = self.inner.borrow_mut();
            let previous = std::mem::replace(&mut inner.meshes, meshes);
            inner.sprite = sprite;
            inner.resync();
            previous
        };
        drop(stale);
        if self.is_active() {
            self.refresh_visuals();
        }
    }

    pub fn unbind(&self) {
        let stale = {
            let mut inner = self.inner.borrow_mut();
            (std::mem::take(&mut inner.binding), inner.meshes.take())
        };
        drop(stale);
    }

    fn bind_asset(&self, id: AssetId) {
        let registry = self.registry();
        let listeners: Vec<Subscription> = [AssetEvent::Load, AssetEvent::Change, AssetEvent::Remove]
            .into_iter()
            .filter_map(|event| {
                let weak = self.downgrade();
                registry.on_asset(id, event, move |asset| {
                    if let Some(clip) = AnimationClip::upgrade(&weak) {
                        clip.on_sprite_asset_event(event, *asset);
                    }
                })
            })
            .collect();
        self.inner.borrow_mut().binding.asset = listeners;

        if registry.is_loaded(id) {
            self.resolve_sprite_asset(id);
        } else if let Err(err) = registry.load(id) {
            warn!("[clip] '{}' failed to request sprite asset {id}: {err}", self.name());
        }
    }

    fn on_sprite_asset_added(&self, id: AssetId) {
        if self.sprite_asset() != Some(id) {
            trace!("[clip] '{}' ignoring stale add of {id}", self.name());
            return;
        }
        let pending = self.inner.borrow_mut().binding.pending_add.take();
        drop(pending);
        self.bind_asset(id);
    }

    fn on_sprite_asset_event(&self, event: AssetEvent, id: AssetId) {
        if self.sprite_asset() != Some(id) {
            trace!("[clip] '{}' ignoring stale {event:?} of {id}", self.name());
            return;
        }
        match event {
            AssetEvent::Load | AssetEvent::Change => self.resolve_sprite_asset(id),
            AssetEvent::Remove => {
                debug!("[clip] '{}' sprite asset {id} removed; keeping current sprite", self.name());
            }
        }
    }

    fn on_atlas_loaded(&self) {
        if let Some(id) = self.sprite_asset() {
            self.resolve_sprite_asset(id);
        }
    }

    fn resolve_sprite_asset(&self, id: AssetId) {
        let registry = self.registry();
        let Some(resource) = registry.sprite(id) else {
            if registry.resource(id).is_some() {
                warn!("[clip] '{}' asset {id} does not hold a sprite", self.name());
            }
            self.set_sprite(None);
            return;
        };
        let Some(atlas_id) = resource.atlas_asset() else {
            self.set_sprite(Some(BoundSprite::new(resource, None)));
            return;
        };
        if let Some(atlas) = registry.loaded_atlas(atlas_id) {
            let waiting = self.inner.borrow_mut().binding.atlas.take();
            drop(waiting);
            self.set_sprite(Some(BoundSprite::new(resource, Some(atlas))));
            return;
        }

        trace!("[clip] '{}' deferring sprite {id} until atlas {atlas_id} loads", self.name());
        let weak = self.downgrade();
        let waiting = registry.once_loaded(atlas_id, move |_| {
            if let Some(clip) = AnimationClip::upgrade(&weak) {
                clip.on_atlas_loaded();
            }
        });
        let stale = self.inner.borrow_mut().binding.atlas.replace(waiting);
        drop(stale);
        if registry.info(atlas_id).is_some_and(|info| info.state == AssetState::Unloaded) {
            if let Err(err) = registry.load(atlas_id) {
                warn!("[clip] '{}' failed to request atlas {atlas_id}: {err}", self.name());
            }
        }
    }

    // ---------- Renderer ----------

    /// Pushes texture and current frame to the renderer when this clip is active.
    pub(crate) fn refresh_visuals(&self) {
        let Some(host) = self.active_host() else {
            return;
        };
        let sprite = self.sprite();
        host.set_texture(sprite.as_ref().and_then(BoundSprite::texture));
        self.render_frame();
    }

    fn render_frame(&self) {
        let Some(host) = self.active_host() else {
            return;
        };
        let (sprite, frame) = {
            let inner = self.inner.borrow();
            (inner.sprite.clone(), inner.frame)
        };
        if let Some(sprite) = sprite {
            host.show_frame(&sprite, frame);
        }
    }

    // ---------- Plumbing ----------

    fn emit(&self, kind: ClipEventKind) {
        let (events, name) = {
            let inner = self.inner.borrow();
            (inner.events.clone(), Arc::clone(&inner.name))
        };
        events.emit(&ClipEvent::new(name, kind));
    }

    fn host(&self) -> Option<Rc<AnimatorShared>> {
        self.inner.borrow().host.upgrade()
    }

    fn active_host(&self) -> Option<Rc<AnimatorShared>> {
        self.host().filter(|host| host.is_current(self))
    }

    fn registry(&self) -> AssetRegistry {
        self.inner.borrow().registry.clone()
    }

    fn downgrade(&self) -> Weak<RefCell<ClipInner>> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<RefCell<ClipInner>>) -> Option<AnimationClip> {
        weak.upgrade().map(|inner| AnimationClip { inner })
    }
}

impl fmt::Debug for AnimationClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AnimationClip")
            .field("name", &inner.name)
            .field("fps", &inner.fps)
            .field("looped", &inner.looped)
            .field("sprite_asset", &inner.sprite_asset)
            .field("state", &inner.state())
            .field("time", &inner.time)
            .field("frame", &inner.frame)
            .finish()
    }
}

fn sanitize_fps(name: &str, fps: f32) -> f32 {
    if fps.is_finite() && fps >= 0.0 {
        fps
    } else {
        warn!("[clip] '{name}' has invalid fps {fps}; playback disabled");
        0.0
    }
}
