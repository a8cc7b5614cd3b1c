//! Viewer configuration.

use crate::resolver::LoaderConfig;
use crate::viewport::ViewportConfig;

/// Configuration for a [`Viewer`](crate::Viewer).
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Pan and zoom tuning.
    pub viewport: ViewportConfig,
    /// Background resolver setup.
    pub loader: LoaderConfig,
    /// Width of the presentation container, in container pixels.
    pub container_width: f64,
    /// Height of the presentation container, in container pixels.
    pub container_height: f64,
    /// Suppress the checkerboard shown behind transparent pixels.
    pub hide_transparency: bool,
    /// Checkerboard tile edge at scale 1, in container pixels.
    /// Defaults to 20.
    pub checker_size: f64,
}

impl ViewerConfig {
    /// Set the container size.
    #[must_use]
    pub fn with_container_size(mut self, width: f64, height: f64) -> Self {
        self.container_width = width;
        self.container_height = height;
        self
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: ViewportConfig) -> Self {
        self.viewport = viewport;
        self
    }

    #[must_use]
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    /// Hide or show the transparency checkerboard.
    #[must_use]
    pub fn with_hide_transparency(mut self, hide: bool) -> Self {
        self.hide_transparency = hide;
        self
    }

    #[must_use]
    pub fn with_checker_size(mut self, size: f64) -> Self {
        self.checker_size = size;
        self
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            viewport: ViewportConfig::default(),
            loader: LoaderConfig::default(),
            container_width: 800.0,
            container_height: 600.0,
            hide_transparency: false,
            checker_size: 20.0,
        }
    }
}
