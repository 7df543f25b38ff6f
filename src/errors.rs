//! Error types for the asset registry.
//!
//! Unresolved sprites, zero fps and missing atlases are ordinary clip states
//! and never surface here. [`AssetError`] only reports registry misuse.

use crate::assets::{AssetId, AssetKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// No asset with this id is registered.
    #[error("Asset not found: {0}")]
    UnknownAsset(AssetId),

    /// An asset with this id is already registered.
    #[error("Asset {0} is already registered")]
    DuplicateAsset(AssetId),

    /// The resource handed over does not match the asset's declared kind.
    #[error("Asset {id} expects a {expected} resource, got {found}")]
    KindMismatch { id: AssetId, expected: AssetKind, found: AssetKind },

    /// A load was completed for an asset that never requested one.
    #[error("Asset {0} has no pending load")]
    NotLoading(AssetId),

    /// Region ids are `u16`.
    #[error("Atlas '{0}' has more than 65535 regions")]
    AtlasFull(String),
}

/// Alias for `Result<T, AssetError>`.
pub type Result<T> = std::result::Result<T, AssetError>;
