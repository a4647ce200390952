//! Rendering Surfaces
//!
//! Traits for the isolated viewports that host plugin UI. The application
//! implements them with webviews; tests implement them with recorders.

use serde::{Deserialize, Serialize};

use crate::error::CoreResult;

/// Placement of a surface inside its parent window, in logical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Whether a surface is attached to its parent window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Hidden,
    Shown,
}

/// An isolated viewport displaying plugin-provided content.
pub trait RenderSurface: Send + Sync {
    /// Load `url` into the surface.
    fn navigate(&self, url: &str) -> CoreResult<()>;

    /// Attach the surface to its parent within `bounds`.
    fn attach(&self, bounds: Bounds) -> CoreResult<()>;

    /// Detach the surface, keeping its page state alive.
    fn detach(&self) -> CoreResult<()>;

    /// Whether the inspector is currently open.
    fn is_devtools_open(&self) -> bool;

    /// Open or close the inspector.
    fn set_devtools_open(&self, open: bool) -> CoreResult<()>;

    /// Release every resource held by the surface.
    fn destroy(&self) -> CoreResult<()>;
}

/// Creates rendering surfaces.
pub trait SurfaceFactory: Send + Sync {
    /// Create a detached, empty surface registered under `view_id`.
    fn create(&self, view_id: &str) -> CoreResult<Box<dyn RenderSurface>>;
}
