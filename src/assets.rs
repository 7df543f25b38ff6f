use crate::errors::{AssetError, Result};
use crate::signal::{Signal, Subscription};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

pub mod atlas;
pub mod sprite;

pub use atlas::{AtlasRegion, AtlasTexture, Rect, TextureAtlas};
pub use sprite::{BoundSprite, SpriteResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u32);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for AssetId {
    fn from(value: u32) -> Self {
        AssetId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetHandle {
    id: AssetId,
}

impl AssetHandle {
    pub fn id(&self) -> AssetId {
        self.id
    }
}

/// Either form a sprite asset may be referenced by. Serialized as a bare
/// number or as `{ "id": n }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssetRef {
    Id(AssetId),
    Handle(AssetHandle),
}

impl AssetRef {
    pub fn id(&self) -> AssetId {
        match self {
            AssetRef::Id(id) => *id,
            AssetRef::Handle(handle) => handle.id(),
        }
    }
}

impl From<AssetId> for AssetRef {
    fn from(value: AssetId) -> Self {
        AssetRef::Id(value)
    }
}

impl From<AssetHandle> for AssetRef {
    fn from(value: AssetHandle) -> Self {
        AssetRef::Handle(value)
    }
}

impl From<u32> for AssetRef {
    fn from(value: u32) -> Self {
        AssetRef::Id(AssetId(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Sprite,
    TextureAtlas,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Sprite => f.write_str("sprite"),
            AssetKind::TextureAtlas => f.write_str("texture atlas"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum AssetResource {
    Sprite(Rc<SpriteResource>),
    TextureAtlas(Rc<TextureAtlas>),
}

impl AssetResource {
    pub fn kind(&self) -> AssetKind {
        match self {
            AssetResource::Sprite(_) => AssetKind::Sprite,
            AssetResource::TextureAtlas(_) => AssetKind::TextureAtlas,
        }
    }
}

impl From<SpriteResource> for AssetResource {
    fn from(value: SpriteResource) -> Self {
        AssetResource::Sprite(Rc::new(value))
    }
}

impl From<TextureAtlas> for AssetResource {
    fn from(value: TextureAtlas) -> Self {
        AssetResource::TextureAtlas(Rc::new(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Unloaded,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub id: AssetId,
    pub name: String,
    pub kind: AssetKind,
    pub state: AssetState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetEvent {
    Load,
    Change,
    Remove,
}

pub enum LoadRequest {
    Ready(Option<AssetResource>),
    Pending,
}

pub trait AssetLoader {
    fn load(&mut self, asset: &AssetInfo) -> LoadRequest;
}

/// Leaves every load pending until the host calls [`AssetRegistry::finish_load`].
#[derive(Debug, Default)]
pub struct ManualLoader;

impl AssetLoader for ManualLoader {
    fn load(&mut self, _asset: &AssetInfo) -> LoadRequest {
        LoadRequest::Pending
    }
}

#[derive(Default)]
pub struct PreparedLoader {
    resources: HashMap<AssetId, AssetResource>,
}

impl PreparedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: AssetId, resource: impl Into<AssetResource>) {
        self.resources.insert(id, resource.into());
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl AssetLoader for PreparedLoader {
    fn load(&mut self, asset: &AssetInfo) -> LoadRequest {
        let resource = self.resources.get(&asset.id).cloned();
        if resource.is_none() {
            warn!("[assets] no prepared resource for {} '{}' {}", asset.kind, asset.name, asset.id);
        }
        LoadRequest::Ready(resource)
    }
}

struct AssetEntry {
    name: String,
    kind: AssetKind,
    state: AssetState,
    resource: Option<AssetResource>,
    on_load: Signal<AssetId>,
    on_change: Signal<AssetId>,
    on_remove: Signal<AssetId>,
}

impl AssetEntry {
    fn info(&self, id: AssetId) -> AssetInfo {
        AssetInfo { id, name: self.name.clone(), kind: self.kind, state: self.state }
    }

    fn signal(&self, event: AssetEvent) -> &Signal<AssetId> {
        match event {
            AssetEvent::Load => &self.on_load,
            AssetEvent::Change => &self.on_change,
            AssetEvent::Remove => &self.on_remove,
        }
    }
}

struct RegistryInner {
    assets: HashMap<AssetId, AssetEntry>,
    added: HashMap<AssetId, Signal<AssetId>>,
    loaded: HashMap<AssetId, Signal<AssetId>>,
    loader: Box<dyn AssetLoader>,
}

/// The asset collection sprite clips resolve against.
///
/// Cloning yields another handle to the same collection. Notifications are
/// dispatched after the internal borrow is released, so listeners may call
/// back into the registry.
#[derive(Clone)]
pub struct AssetRegistry {
    inner: Rc<RefCell<RegistryInner>>,
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::with_loader(ManualLoader)
    }

    pub fn with_loader(loader: impl AssetLoader + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                assets: HashMap::new(),
                added: HashMap::new(),
                loaded: HashMap::new(),
                loader: Box::new(loader),
            })),
        }
    }

    pub fn insert(&self, id: AssetId, name: impl Into<String>, kind: AssetKind) -> Result<AssetHandle> {
        self.register(id, name.into(), kind, None)?;
        self.emit_added(id);
        Ok(AssetHandle { id })
    }

    /// Registers an asset whose resource is already available. Both `added`
    /// and `loaded` listeners are notified.
    pub fn insert_loaded(
        &self,
        id: AssetId,
        name: impl Into<String>,
        resource: impl Into<AssetResource>,
    ) -> Result<AssetHandle> {
        let resource = resource.into();
        self.register(id, name.into(), resource.kind(), Some(resource))?;
        self.emit_added(id);
        self.emit_loaded(id);
        Ok(AssetHandle { id })
    }

    fn register(&self, id: AssetId, name: String, kind: AssetKind, resource: Option<AssetResource>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.assets.contains_key(&id) {
            return Err(AssetError::DuplicateAsset(id));
        }
        let state = if resource.is_some() { AssetState::Loaded } else { AssetState::Unloaded };
        debug!("[assets] registered {kind} '{name}' {id}");
        inner.assets.insert(
            id,
            AssetEntry {
                name,
                kind,
                state,
                resource,
                on_load: Signal::new(),
                on_change: Signal::new(),
                on_remove: Signal::new(),
            },
        );
        Ok(())
    }

    pub fn contains(&self, id: AssetId) -> bool {
        self.inner.borrow().assets.contains_key(&id)
    }

    pub fn info(&self, id: AssetId) -> Option<AssetInfo> {
        self.inner.borrow().assets.get(&id).map(|entry| entry.info(id))
    }

    pub fn find(&self, name: &str) -> Option<AssetId> {
        let inner = self.inner.borrow();
        let mut matches: Vec<AssetId> =
            inner.assets.iter().filter(|(_, entry)| entry.name == name).map(|(id, _)| *id).collect();
        matches.sort();
        matches.first().copied()
    }

    pub fn ids(&self) -> Vec<AssetId> {
        let mut ids: Vec<AssetId> = self.inner.borrow().assets.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().assets.is_empty()
    }

    pub fn is_loaded(&self, id: AssetId) -> bool {
        self.inner.borrow().assets.get(&id).is_some_and(|entry| entry.state == AssetState::Loaded)
    }

    pub fn resource(&self, id: AssetId) -> Option<AssetResource> {
        self.inner.borrow().assets.get(&id).and_then(|entry| entry.resource.clone())
    }

    pub fn sprite(&self, id: AssetId) -> Option<Rc<SpriteResource>> {
        match self.resource(id)? {
            AssetResource::Sprite(sprite) => Some(sprite),
            AssetResource::TextureAtlas(_) => None,
        }
    }

    /// The atlas behind `id`, only once its load has completed.
    pub fn loaded_atlas(&self, id: AssetId) -> Option<Rc<TextureAtlas>> {
        if !self.is_loaded(id) {
            return None;
        }
        match self.resource(id)? {
            AssetResource::TextureAtlas(atlas) => Some(atlas),
            AssetResource::Sprite(_) => None,
        }
    }

    /// Requests a load. Loaded or in-flight assets are left alone.
    pub fn load(&self, id: AssetId) -> Result<()> {
        let info = {
            let mut inner = self.inner.borrow_mut();
            let entry = inner.assets.get_mut(&id).ok_or(AssetError::UnknownAsset(id))?;
            match entry.state {
                AssetState::Loaded | AssetState::Loading => return Ok(()),
                AssetState::Unloaded | AssetState::Failed => {
                    entry.state = AssetState::Loading;
                    entry.info(id)
                }
            }
        };
        let request = self.inner.borrow_mut().loader.load(&info);
        match request {
            LoadRequest::Pending => {
                debug!("[assets] load of {} '{}' {} pending", info.kind, info.name, id);
                Ok(())
            }
            LoadRequest::Ready(resource) => self.finish_load(id, resource),
        }
    }

    /// Completes a pending load and notifies `load` listeners. A `None`
    /// resource marks the load as failed; listeners still run.
    pub fn finish_load(&self, id: AssetId, resource: Option<AssetResource>) -> Result<()> {
        {
            let mut inner = self.inner.borrow_mut();
            let entry = inner.assets.get_mut(&id).ok_or(AssetError::UnknownAsset(id))?;
            if entry.state != AssetState::Loading {
                return Err(AssetError::NotLoading(id));
            }
            if let Some(found) = resource.as_ref().map(AssetResource::kind) {
                if found != entry.kind {
                    return Err(AssetError::KindMismatch { id, expected: entry.kind, found });
                }
            }
            entry.state = if resource.is_some() { AssetState::Loaded } else { AssetState::Failed };
            entry.resource = resource;
            debug!("[assets] {} '{}' {} finished loading ({:?})", entry.kind, entry.name, id, entry.state);
        }
        self.emit_asset(id, AssetEvent::Load);
        self.emit_loaded(id);
        Ok(())
    }

    pub fn replace(&self, id: AssetId, resource: impl Into<AssetResource>) -> Result<()> {
        let resource = resource.into();
        {
            let mut inner = self.inner.borrow_mut();
            let entry = inner.assets.get_mut(&id).ok_or(AssetError::UnknownAsset(id))?;
            if resource.kind() != entry.kind {
                return Err(AssetError::KindMismatch { id, expected: entry.kind, found: resource.kind() });
            }
            entry.resource = Some(resource);
            entry.state = AssetState::Loaded;
        }
        self.emit_asset(id, AssetEvent::Change);
        Ok(())
    }

    /// Unregisters an asset. Its `remove` listeners run before the entry and
    /// every per-asset listener list is dropped.
    pub fn remove(&self, id: AssetId) -> Option<AssetInfo> {
        let entry = self.inner.borrow_mut().assets.remove(&id)?;
        debug!("[assets] removed {} '{}' {}", entry.kind, entry.name, id);
        entry.on_remove.emit(&id);
        Some(entry.info(id))
    }

    /// Listens to one asset's notifications. `None` when `id` is not registered.
    pub fn on_asset<F>(&self, id: AssetId, event: AssetEvent, callback: F) -> Option<Subscription>
    where
        F: Fn(&AssetId) + 'static,
    {
        let signal = self.inner.borrow().assets.get(&id).map(|entry| entry.signal(event).clone())?;
        Some(signal.connect(callback))
    }

    pub fn once_added<F>(&self, id: AssetId, callback: F) -> Subscription
    where
        F: Fn(&AssetId) + 'static,
    {
        let signal = self.inner.borrow_mut().added.entry(id).or_default().clone();
        let registry = Rc::downgrade(&self.inner);
        signal.connect_once(callback).on_disconnect(move || {
            if let Some(inner) = registry.upgrade() {
                prune_watches(&inner, id);
            }
        })
    }

    pub fn once_loaded<F>(&self, id: AssetId, callback: F) -> Subscription
    where
        F: Fn(&AssetId) + 'static,
    {
        let signal = self.inner.borrow_mut().loaded.entry(id).or_default().clone();
        let registry = Rc::downgrade(&self.inner);
        signal.connect_once(callback).on_disconnect(move || {
            if let Some(inner) = registry.upgrade() {
                prune_watches(&inner, id);
            }
        })
    }

    pub fn pending_watches(&self) -> usize {
        let inner = self.inner.borrow();
        inner.added.keys().chain(inner.loaded.keys()).collect::<HashSet<_>>().len()
    }

    fn emit_asset(&self, id: AssetId, event: AssetEvent) {
        let signal = self.inner.borrow().assets.get(&id).map(|entry| entry.signal(event).clone());
        if let Some(signal) = signal {
            signal.emit(&id);
        }
    }

    fn emit_added(&self, id: AssetId) {
        let signal = self.inner.borrow().added.get(&id).cloned();
        if let Some(signal) = signal {
            signal.emit(&id);
            self.prune(id);
        }
    }

    fn emit_loaded(&self, id: AssetId) {
        let signal = self.inner.borrow().loaded.get(&id).cloned();
        if let Some(signal) = signal {
            signal.emit(&id);
            self.prune(id);
        }
    }

    fn prune(&self, id: AssetId) {
        prune_watches(&self.inner, id);
    }
}

fn prune_watches(registry: &RefCell<RegistryInner>, id: AssetId) {
    // Revokes can run while the registry is mid-update; the next emit prunes then.
    let Ok(mut inner) = registry.try_borrow_mut() else {
        return;
    };
    if inner.added.get(&id).is_some_and(Signal::is_empty) {
        inner.added.remove(&id);
    }
    if inner.loaded.get(&id).is_some_and(Signal::is_empty) {
        inner.loaded.remove(&id);
    }
}

impl fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRegistry").field("assets", &self.len()).finish()
    }
}
