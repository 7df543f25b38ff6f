use crate::assets::{AtlasRegion, AtlasTexture};
use glam::Vec4;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub index: usize,
    pub key: Option<&'a Arc<str>>,
    /// `None` when the atlas lacks the frame key or the index is out of range.
    pub region: Option<&'a AtlasRegion>,
}

/// Visual side of a sprite animator. Only the animator's current clip calls into it.
pub trait FrameRenderer {
    fn show_frame(&mut self, frame: FrameView<'_>);

    /// `None` clears the texture parameters.
    fn set_texture(&mut self, texture: Option<&AtlasTexture>);
}

#[derive(Debug, Default)]
pub struct NullRenderer;

impl FrameRenderer for NullRenderer {
    fn show_frame(&mut self, _frame: FrameView<'_>) {}

    fn set_texture(&mut self, _texture: Option<&AtlasTexture>) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedSprite {
    pub texture: Option<AtlasTexture>,
    pub frame: Option<usize>,
    pub region: Option<Arc<str>>,
    pub uv: Option<Vec4>,
    pub frames_shown: u64,
}

/// Renderer that records the latest frame into shared state other code can read.
#[derive(Debug, Clone, Default)]
pub struct SharedFrameTarget {
    state: Rc<RefCell<RenderedSprite>>,
}

impl SharedFrameTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> RenderedSprite {
        self.state.borrow().clone()
    }

    pub fn frames_shown(&self) -> u64 {
        self.state.borrow().frames_shown
    }
}

impl FrameRenderer for SharedFrameTarget {
    fn show_frame(&mut self, frame: FrameView<'_>) {
        let mut state = self.state.borrow_mut();
        state.frame = Some(frame.index);
        state.region = frame.key.cloned();
        state.uv = frame.region.map(|region| region.uv);
        state.frames_shown += 1;
    }

    fn set_texture(&mut self, texture: Option<&AtlasTexture>) {
        self.state.borrow_mut().texture = texture.cloned();
    }
}
