use super::atlas::{AtlasRegion, AtlasTexture, TextureAtlas};
use super::AssetId;
use crate::signal::{Signal, Subscription};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

const DEFAULT_PIXELS_PER_UNIT: f32 = 1.0;

/// Loaded sprite data: an ordered list of atlas frame keys and the atlas asset
/// those keys refer to.
#[derive(Debug)]
pub struct SpriteResource {
    frame_keys: Vec<Arc<str>>,
    atlas_asset: Option<AssetId>,
    pixels_per_unit: Cell<f32>,
    meshes_changed: Signal<()>,
}

impl SpriteResource {
    pub fn new<I, S>(frame_keys: I, atlas_asset: Option<AssetId>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            frame_keys: frame_keys.into_iter().map(Into::into).collect(),
            atlas_asset,
            pixels_per_unit: Cell::new(DEFAULT_PIXELS_PER_UNIT),
            meshes_changed: Signal::new(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_keys.len()
    }

    pub fn frame_keys(&self) -> &[Arc<str>] {
        &self.frame_keys
    }

    pub fn frame_key(&self, index: usize) -> Option<&Arc<str>> {
        self.frame_keys.get(index)
    }

    pub fn atlas_asset(&self) -> Option<AssetId> {
        self.atlas_asset
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit.get()
    }

    /// Changing the scale regenerates the frame meshes.
    pub fn set_pixels_per_unit(&self, value: f32) {
        if (self.pixels_per_unit.get() - value).abs() <= f32::EPSILON {
            return;
        }
        self.pixels_per_unit.set(value);
        self.rebuild_meshes();
    }

    pub fn rebuild_meshes(&self) {
        self.meshes_changed.emit(&());
    }

    pub fn on_meshes_changed<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&()) + 'static,
    {
        self.meshes_changed.connect(callback)
    }
}

/// A sprite resource together with the atlas it was resolved against.
#[derive(Debug, Clone)]
pub struct BoundSprite {
    pub resource: Rc<SpriteResource>,
    pub atlas: Option<Rc<TextureAtlas>>,
}

impl BoundSprite {
    pub fn new(resource: Rc<SpriteResource>, atlas: Option<Rc<TextureAtlas>>) -> Self {
        Self { resource, atlas }
    }

    pub fn frame_count(&self) -> usize {
        self.resource.frame_count()
    }

    pub fn texture(&self) -> Option<&AtlasTexture> {
        self.atlas.as_deref().map(TextureAtlas::texture)
    }

    pub fn region(&self, frame: usize) -> Option<&AtlasRegion> {
        let key = self.resource.frame_key(frame)?;
        self.atlas.as_deref()?.region(key)
    }
}
