//! Webview Surfaces
//!
//! Child webviews of the main window used as plugin rendering surfaces.

use std::path::Path;

use tauri::{LogicalPosition, LogicalSize, Runtime, Webview, WebviewBuilder, WebviewUrl, Window};

use beacon_core::{Bounds, CoreError, CoreResult, RenderSurface, SurfaceFactory};

/// Label prefix of plugin webviews
pub const VIEW_LABEL_PREFIX: &str = "plugin-view-";

/// Creates child webviews inside one host window.
pub struct TauriSurfaceFactory<R: Runtime> {
    window: Window<R>,
}

impl<R: Runtime> TauriSurfaceFactory<R> {
    pub fn new(window: Window<R>) -> Self {
        Self { window }
    }
}

impl<R: Runtime> SurfaceFactory for TauriSurfaceFactory<R> {
    fn create(&self, view_id: &str) -> CoreResult<Box<dyn RenderSurface>> {
        let label = view_label(view_id);
        let blank = "about:blank"
            .parse()
            .map_err(|e| CoreError::surface(format!("invalid blank url: {}", e)))?;
        let builder = WebviewBuilder::new(&label, WebviewUrl::External(blank));

        let webview = self
            .window
            .add_child(builder, LogicalPosition::new(0.0, 0.0), LogicalSize::new(1.0, 1.0))
            .map_err(|e| CoreError::surface(format!("failed to create webview {}: {}", label, e)))?;
        webview
            .hide()
            .map_err(|e| CoreError::surface(format!("failed to hide webview {}: {}", label, e)))?;

        Ok(Box::new(WebviewSurface { webview }))
    }
}

struct WebviewSurface<R: Runtime> {
    webview: Webview<R>,
}

impl<R: Runtime> RenderSurface for WebviewSurface<R> {
    fn navigate(&self, location: &str) -> CoreResult<()> {
        let url = to_url(location)?;
        self.webview.navigate(url).map_err(surface_error)
    }

    fn attach(&self, bounds: Bounds) -> CoreResult<()> {
        self.webview
            .set_position(LogicalPosition::new(bounds.x, bounds.y))
            .map_err(surface_error)?;
        self.webview
            .set_size(LogicalSize::new(bounds.width, bounds.height))
            .map_err(surface_error)?;
        self.webview.show().map_err(surface_error)
    }

    fn detach(&self) -> CoreResult<()> {
        self.webview.hide().map_err(surface_error)
    }

    fn is_devtools_open(&self) -> bool {
        self.webview.is_devtools_open()
    }

    fn set_devtools_open(&self, open: bool) -> CoreResult<()> {
        if open {
            self.webview.open_devtools();
        } else {
            self.webview.close_devtools();
        }
        Ok(())
    }

    fn destroy(&self) -> CoreResult<()> {
        self.webview.close().map_err(surface_error)
    }
}

fn surface_error(e: tauri::Error) -> CoreError {
    CoreError::surface(e.to_string())
}

/// Webview label for a view id. Labels only allow a restricted alphabet.
fn view_label(view_id: &str) -> String {
    let sanitized: String = view_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}{}", VIEW_LABEL_PREFIX, sanitized)
}

/// Parse a view location, turning absolute file paths into `file://` URLs.
fn to_url(location: &str) -> CoreResult<url::Url> {
    let path = Path::new(location);
    if path.is_absolute() {
        return url::Url::from_file_path(path)
            .map_err(|_| CoreError::surface(format!("invalid view path: {}", location)));
    }
    url::Url::parse(location).map_err(|e| CoreError::surface(format!("invalid view url {}: {}", location, e)))
}
