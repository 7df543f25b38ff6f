use crate::errors::{AssetError, Result};
use glam::{UVec2, Vec4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtlasRegion {
    pub id: u16,
    pub rect: Rect,
    /// Normalised `(u0, v0, u1, v1)`.
    pub uv: Vec4,
}

/// The image an atlas samples from. Only its identity and size are tracked here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtlasTexture {
    pub key: Arc<str>,
    pub size: UVec2,
}

impl AtlasTexture {
    pub fn new(key: impl Into<Arc<str>>, width: u32, height: u32) -> Self {
        Self { key: key.into(), size: UVec2::new(width, height) }
    }
}

#[derive(Debug, Clone)]
pub struct TextureAtlas {
    texture: AtlasTexture,
    regions: HashMap<Arc<str>, AtlasRegion>,
}

impl TextureAtlas {
    pub fn new(texture: AtlasTexture) -> Self {
        Self { texture, regions: HashMap::new() }
    }

    /// Builds an atlas from named pixel rects, computing each region's UV.
    pub fn from_regions<I, S>(texture: AtlasTexture, regions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Rect)>,
        S: Into<Arc<str>>,
    {
        let mut atlas = Self::new(texture);
        for (name, rect) in regions {
            atlas.add_region(name, rect)?;
        }
        Ok(atlas)
    }

    /// Adds or replaces a region. Replacing keeps the region's id.
    pub fn add_region(&mut self, name: impl Into<Arc<str>>, rect: Rect) -> Result<u16> {
        let name = name.into();
        let uv = region_uv(rect, self.texture.size);
        if let Some(existing) = self.regions.get_mut(&name) {
            existing.rect = rect;
            existing.uv = uv;
            return Ok(existing.id);
        }
        let id = u16::try_from(self.regions.len())
            .map_err(|_| AssetError::AtlasFull(self.texture.key.to_string()))?;
        self.regions.insert(name, AtlasRegion { id, rect, uv });
        Ok(id)
    }

    pub fn texture(&self) -> &AtlasTexture {
        &self.texture
    }

    pub fn region(&self, name: &str) -> Option<&AtlasRegion> {
        self.regions.get(name)
    }

    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.keys().map(|name| name.as_ref().to_string()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn region_uv(rect: Rect, size: UVec2) -> Vec4 {
    if size.x == 0 || size.y == 0 {
        return Vec4::ZERO;
    }
    let (w, h) = (size.x as f32, size.y as f32);
    Vec4::new(
        rect.x as f32 / w,
        rect.y as f32 / h,
        (rect.x + rect.w) as f32 / w,
        (rect.y + rect.h) as f32 / h,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_get_normalised_uvs() {
        let atlas = TextureAtlas::from_regions(
            AtlasTexture::new("hero.png", 64, 32),
            [("idle_0", Rect { x: 0, y: 0, w: 32, h: 32 }), ("idle_1", Rect { x: 32, y: 0, w: 32, h: 16 })],
        )
        .expect("build atlas");
        let second = atlas.region("idle_1").expect("idle_1 region");
        assert_eq!(second.id, 1);
        assert_eq!(second.uv, Vec4::new(0.5, 0.0, 1.0, 0.5));
        assert_eq!(atlas.region_names(), vec!["idle_0".to_string(), "idle_1".to_string()]);
    }

    #[test]
    fn replacing_a_region_keeps_its_id() {
        let mut atlas = TextureAtlas::new(AtlasTexture::new("fx.png", 16, 16));
        let first = atlas.add_region("spark", Rect { x: 0, y: 0, w: 8, h: 8 }).unwrap();
        let again = atlas.add_region("spark", Rect { x: 8, y: 8, w: 8, h: 8 }).unwrap();
        assert_eq!(first, again);
        assert_eq!(atlas.len(), 1);
        assert_eq!(atlas.region("spark").unwrap().uv, Vec4::new(0.5, 0.5, 1.0, 1.0));
    }

    #[test]
    fn zero_sized_texture_yields_zero_uv() {
        let mut atlas = TextureAtlas::new(AtlasTexture::new("empty.png", 0, 0));
        atlas.add_region("a", Rect { x: 1, y: 1, w: 1, h: 1 }).unwrap();
        assert_eq!(atlas.region("a").unwrap().uv, Vec4::ZERO);
    }
}
