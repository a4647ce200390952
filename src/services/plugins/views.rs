//! View Manager
//!
//! Owns every rendering surface that hosts plugin UI. Surfaces are keyed by
//! an opaque view id; nothing outside this module keeps a reference to one.
//!
//! Show, hide, destroy and devtools calls on an unknown id do nothing. A show
//! arriving after a destroy is an ordinary race, not an error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use beacon_core::{Bounds, RenderSurface, SurfaceFactory, Visibility};

use crate::utils::error::{AppError, AppResult};

struct ViewHandle {
    surface: Box<dyn RenderSurface>,
    bounds: Option<Bounds>,
    visibility: Visibility,
    owning_action: Option<String>,
    url: String,
}

/// Snapshot of a live view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewInfo {
    pub view_id: String,
    pub url: String,
    pub bounds: Option<Bounds>,
    pub visibility: Visibility,
    pub owning_action: Option<String>,
}

/// Registry of plugin rendering surfaces.
pub struct ViewManager {
    factory: Arc<dyn SurfaceFactory>,
    views: Mutex<HashMap<String, ViewHandle>>,
    devtools_allowed: bool,
}

impl ViewManager {
    pub fn new(factory: Arc<dyn SurfaceFactory>, devtools_allowed: bool) -> Self {
        Self {
            factory,
            views: Mutex::new(HashMap::new()),
            devtools_allowed,
        }
    }

    /// Create a hidden surface showing `url`.
    ///
    /// Re-using an id destroys the previous surface first. Returns the view
    /// id, generated when not supplied.
    pub async fn create_view(
        &self,
        view_id: Option<String>,
        url: &str,
        owning_action: Option<String>,
    ) -> AppResult<String> {
        let view_id = view_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut views = self.views.lock().await;
        if let Some(previous) = views.remove(&view_id) {
            tracing::debug!(view = %view_id, "replacing existing view");
            release(&view_id, previous);
        }

        let surface = self.factory.create(&view_id)?;
        if let Err(e) = surface.navigate(url) {
            let _ = surface.destroy();
            return Err(AppError::view(format!(
                "failed to load {} into view {}: {}",
                url, view_id, e
            )));
        }

        views.insert(
            view_id.clone(),
            ViewHandle {
                surface,
                bounds: None,
                visibility: Visibility::Hidden,
                owning_action,
                url: url.to_string(),
            },
        );
        tracing::info!(view = %view_id, url = %url, "plugin view created");
        Ok(view_id)
    }

    /// Attach a view within `bounds`.
    pub async fn show_view(&self, view_id: &str, bounds: Bounds) -> AppResult<()> {
        let mut views = self.views.lock().await;
        let Some(handle) = views.get_mut(view_id) else {
            tracing::debug!(view = %view_id, "show on unknown view ignored");
            return Ok(());
        };
        handle.surface.attach(bounds)?;
        handle.bounds = Some(bounds);
        handle.visibility = Visibility::Shown;
        Ok(())
    }

    /// Detach a view, keeping its page state.
    pub async fn hide_view(&self, view_id: &str) -> AppResult<()> {
        let mut views = self.views.lock().await;
        let Some(handle) = views.get_mut(view_id) else {
            return Ok(());
        };
        if handle.visibility == Visibility::Shown {
            handle.surface.detach()?;
            handle.visibility = Visibility::Hidden;
        }
        Ok(())
    }

    /// Release a view. Later calls with the id are no-ops.
    pub async fn destroy_view(&self, view_id: &str) {
        let removed = self.views.lock().await.remove(view_id);
        if let Some(handle) = removed {
            release(view_id, handle);
            tracing::info!(view = %view_id, "plugin view destroyed");
        }
    }

    /// Open or close the inspector of a view.
    ///
    /// Does nothing outside development contexts. Returns whether the
    /// inspector is open afterwards.
    pub async fn toggle_devtools(&self, view_id: &str) -> AppResult<bool> {
        if !self.devtools_allowed {
            tracing::debug!(view = %view_id, "devtools are disabled");
            return Ok(false);
        }
        let views = self.views.lock().await;
        let Some(handle) = views.get(view_id) else {
            return Ok(false);
        };
        let open = !handle.surface.is_devtools_open();
        handle.surface.set_devtools_open(open)?;
        Ok(open)
    }

    /// Destroy every view; runs when the window hosting them closes.
    pub async fn destroy_all_views(&self) -> usize {
        let drained: Vec<(String, ViewHandle)> = self.views.lock().await.drain().collect();
        let count = drained.len();
        for (view_id, handle) in drained {
            release(&view_id, handle);
        }
        if count > 0 {
            tracing::info!("destroyed {} plugin view(s)", count);
        }
        count
    }

    /// Snapshot of live views, sorted by id.
    pub async fn list_views(&self) -> Vec<ViewInfo> {
        let views = self.views.lock().await;
        let mut infos: Vec<ViewInfo> = views
            .iter()
            .map(|(id, handle)| ViewInfo {
                view_id: id.clone(),
                url: handle.url.clone(),
                bounds: handle.bounds,
                visibility: handle.visibility,
                owning_action: handle.owning_action.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.view_id.cmp(&b.view_id));
        infos
    }

    pub fn devtools_allowed(&self) -> bool {
        self.devtools_allowed
    }
}

fn release(view_id: &str, handle: ViewHandle) {
    if let Err(e) = handle.surface.destroy() {
        tracing::warn!(view = %view_id, "failed to destroy surface: {}", e);
    }
}

impl std::fmt::Debug for ViewManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewManager")
            .field("devtools_allowed", &self.devtools_allowed)
            .finish()
    }
}
