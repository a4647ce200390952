//! Beacon Core
//!
//! Foundational value types and seams for the Beacon Desktop plugin runtime.
//! This crate has zero dependencies on application-level code (Tauri,
//! HTTP clients, process management, etc.).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `manifest` - `package.json` parsing, plugin id derivation and validation
//! - `entity` - The plugin entity shared by every provenance
//! - `action` - Actions, view modes and action-id namespacing
//! - `surface` - Rendering surface traits implemented by the host UI layer
//!
//! ## Design Principles
//!
//! 1. **Only serde/thiserror** - keeps build times minimal
//! 2. **Trait-based seams** - rendering surfaces can be faked in tests
//! 3. **Unidirectional dependency** - this crate depends on nothing else in the workspace

pub mod action;
pub mod entity;
pub mod error;
pub mod manifest;
pub mod surface;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Plugin Entities ────────────────────────────────────────────────────
pub use entity::{PluginEntity, PluginStatus, Provenance, RemotePackageRef, Validation};

// ── Manifest ───────────────────────────────────────────────────────────
pub use manifest::{plugin_id_from_name, validate_plugin_dir, PluginManifest, MANIFEST_FILE};

// ── Actions ────────────────────────────────────────────────────────────
pub use action::{
    matches_keyword, namespace_action_id, split_action_id, Action, ModuleAction, ViewMode,
    ACTION_SEPARATOR,
};

// ── Rendering Surfaces ─────────────────────────────────────────────────
pub use surface::{Bounds, RenderSurface, SurfaceFactory, Visibility};
