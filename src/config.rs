use crate::assets::{
    AssetId, AssetKind, AssetRef, AssetRegistry, AtlasTexture, PreparedLoader, Rect, SpriteResource, TextureAtlas,
};
use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// Serialized form of one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDefinition {
    pub name: String,
    #[serde(default = "ClipDefinition::default_fps")]
    pub fps: f32,
    #[serde(rename = "loop", default)]
    pub looped: bool,
    #[serde(rename = "spriteAsset", default, skip_serializing_if = "Option::is_none")]
    pub sprite_asset: Option<AssetRef>,
}

impl ClipDefinition {
    const fn default_fps() -> f32 {
        10.0
    }

    pub fn new(name: impl Into<String>, fps: f32, looped: bool) -> Self {
        Self { name: name.into(), fps, looped, sprite_asset: None }
    }

    pub fn with_sprite_asset(mut self, asset: impl Into<AssetRef>) -> Self {
        self.sprite_asset = Some(asset.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimatorConfig {
    #[serde(default = "AnimatorConfig::default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub autoplay: Option<String>,
    #[serde(default)]
    pub clips: Vec<ClipDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub speed: Option<f32>,
    pub autoplay: Option<String>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self { speed: Self::default_speed(), autoplay: None, clips: Vec::new() }
    }
}

impl AnimatorConfig {
    const fn default_speed() -> f32 {
        1.0
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read animator config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse animator config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("[animator] config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(speed) = overrides.speed {
            self.speed = speed;
        }
        if let Some(autoplay) = &overrides.autoplay {
            self.autoplay = Some(autoplay.clone());
        }
    }

    pub fn clip(&self, name: &str) -> Option<&ClipDefinition> {
        self.clips.iter().find(|clip| clip.name == name)
    }
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.speed.is_none() && self.autoplay.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.speed.is_some() {
            fields.push("speed");
        }
        if self.autoplay.is_some() {
            fields.push("autoplay");
        }
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasDefinition {
    pub id: AssetId,
    pub name: String,
    pub texture: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub regions: BTreeMap<String, Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteDefinition {
    pub id: AssetId,
    pub name: String,
    pub frames: Vec<String>,
    #[serde(default)]
    pub atlas: Option<AssetId>,
}

/// Everything the preview tool needs: an animator plus the atlases and
/// sprites its clips refer to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default)]
    pub animator: AnimatorConfig,
    #[serde(default)]
    pub atlases: Vec<AtlasDefinition>,
    #[serde(default)]
    pub sprites: Vec<SpriteDefinition>,
}

impl PreviewConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read preview config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse preview config {}", path.display()))?;
        Ok(cfg)
    }

    /// Registers every atlas and sprite as an unloaded asset served by a
    /// [`PreparedLoader`], so clips go through the regular load protocol.
    pub fn build_registry(&self) -> Result<AssetRegistry> {
        let mut loader = PreparedLoader::new();
        let mut seen = HashSet::new();
        let mut atlas_regions: BTreeMap<AssetId, &BTreeMap<String, Rect>> = BTreeMap::new();

        for atlas in &self.atlases {
            if !seen.insert(atlas.id) {
                bail!("Duplicate asset id {} (atlas '{}')", atlas.id, atlas.name);
            }
            let texture = AtlasTexture::new(atlas.texture.as_str(), atlas.width, atlas.height);
            let built = TextureAtlas::from_regions(
                texture,
                atlas.regions.iter().map(|(name, rect)| (name.as_str(), *rect)),
            )
            .with_context(|| format!("Failed to build atlas '{}'", atlas.name))?;
            loader.insert(atlas.id, built);
            atlas_regions.insert(atlas.id, &atlas.regions);
        }

        for sprite in &self.sprites {
            if !seen.insert(sprite.id) {
                bail!("Duplicate asset id {} (sprite '{}')", sprite.id, sprite.name);
            }
            if let Some(atlas_id) = sprite.atlas {
                match atlas_regions.get(&atlas_id) {
                    Some(regions) => {
                        for frame in sprite.frames.iter().filter(|frame| !regions.contains_key(frame.as_str())) {
                            warn!("[assets] sprite '{}' frame '{frame}' missing from atlas {atlas_id}", sprite.name);
                        }
                    }
                    None => warn!("[assets] sprite '{}' refers to undeclared atlas {atlas_id}", sprite.name),
                }
            }
            let frames = sprite.frames.iter().map(String::as_str);
            loader.insert(sprite.id, SpriteResource::new(frames, sprite.atlas));
        }

        let registry = AssetRegistry::with_loader(loader);
        for atlas in &self.atlases {
            registry
                .insert(atlas.id, atlas.name.as_str(), AssetKind::TextureAtlas)
                .with_context(|| format!("Failed to register atlas '{}'", atlas.name))?;
        }
        for sprite in &self.sprites {
            registry
                .insert(sprite.id, sprite.name.as_str(), AssetKind::Sprite)
                .with_context(|| format!("Failed to register sprite '{}'", sprite.name))?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn clip_definition_defaults_and_renames() {
        let def: ClipDefinition = serde_json::from_str(r#"{ "name": "idle" }"#).expect("parse clip");
        assert_eq!(def.fps, 10.0);
        assert!(!def.looped);
        assert!(def.sprite_asset.is_none());

        let def: ClipDefinition =
            serde_json::from_str(r#"{ "name": "run", "fps": 12, "loop": true, "spriteAsset": 7 }"#)
                .expect("parse clip");
        assert!(def.looped);
        assert_eq!(def.sprite_asset.map(|asset| asset.id()), Some(AssetId(7)));
    }

    #[test]
    fn sprite_asset_accepts_handle_form() {
        let def: ClipDefinition =
            serde_json::from_str(r#"{ "name": "run", "spriteAsset": { "id": 3 } }"#).expect("parse clip");
        assert!(matches!(def.sprite_asset, Some(AssetRef::Handle(_))));
        assert_eq!(def.sprite_asset.map(|asset| asset.id()), Some(AssetId(3)));
    }

    #[test]
    fn load_reads_animator_config() {
        let file = write_temp(
            r#"{ "speed": 2.0, "autoplay": "idle", "clips": [ { "name": "idle", "fps": 4, "loop": true } ] }"#,
        );
        let cfg = AnimatorConfig::load(file.path()).expect("load config");
        assert_eq!(cfg.speed, 2.0);
        assert_eq!(cfg.autoplay.as_deref(), Some("idle"));
        assert_eq!(cfg.clip("idle").map(|clip| clip.fps), Some(4.0));
    }

    #[test]
    fn load_or_default_falls_back_on_bad_json() {
        let file = write_temp("{ not json");
        let cfg = AnimatorConfig::load_or_default(file.path());
        assert_eq!(cfg, AnimatorConfig::default());
    }

    #[test]
    fn load_error_names_the_file() {
        let err = AnimatorConfig::load("/definitely/missing/animator.json").unwrap_err();
        assert!(err.to_string().contains("animator.json"));
    }

    #[test]
    fn overrides_replace_speed_and_autoplay() {
        let mut cfg = AnimatorConfig::default();
        let overrides = ConfigOverrides { speed: Some(0.5), autoplay: Some("run".to_string()) };
        assert_eq!(overrides.applied_fields(), vec!["speed", "autoplay"]);
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.speed, 0.5);
        assert_eq!(cfg.autoplay.as_deref(), Some("run"));
        assert!(ConfigOverrides::default().is_empty());
    }

    #[test]
    fn preview_registry_serves_assets_through_loader() {
        let json = r#"{
            "atlases": [ { "id": 1, "name": "hero", "texture": "hero.png", "width": 64, "height": 32,
                           "regions": { "a": { "x": 0, "y": 0, "w": 32, "h": 32 },
                                        "b": { "x": 32, "y": 0, "w": 32, "h": 32 } } } ],
            "sprites": [ { "id": 2, "name": "hero_run", "frames": ["a", "b"], "atlas": 1 } ]
        }"#;
        let preview: PreviewConfig = serde_json::from_str(json).expect("parse preview");
        let registry = preview.build_registry().expect("registry");
        assert_eq!(registry.len(), 2);
        assert!(!registry.is_loaded(AssetId(2)));
        registry.load(AssetId(2)).expect("load sprite");
        registry.load(AssetId(1)).expect("load atlas");
        let sprite = registry.sprite(AssetId(2)).expect("sprite loaded");
        assert_eq!(sprite.frame_count(), 2);
        let atlas = registry.loaded_atlas(AssetId(1)).expect("atlas loaded");
        assert_eq!(atlas.region_names(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn preview_rejects_duplicate_ids() {
        let json = r#"{
            "atlases": [ { "id": 1, "name": "hero", "texture": "hero.png", "width": 8, "height": 8 } ],
            "sprites": [ { "id": 1, "name": "hero_run", "frames": [] } ]
        }"#;
        let preview: PreviewConfig = serde_json::from_str(json).expect("parse preview");
        let err = preview.build_registry().unwrap_err();
        assert!(err.to_string().contains("Duplicate asset id"));
    }
}
