//! Multi-layer raster viewer.
//!
//! Horizon Texel displays a base image plus any number of overlay layers,
//! lets the user pan and zoom the presentation, and extracts pixel-exact
//! rasters (one layer, or every layer composited) that are unaffected by
//! the current pan and zoom.
//!
//! # Architecture
//!
//! - [`RasterSource`] / [`LayerSpec`] describe what each slot shows, and
//!   [`Dependencies`] decide when a slot is re-resolved.
//! - [`LayerSourceResolver`] fetches and decodes references and runs
//!   deferred [`Painter`]s on background threads.
//! - [`LayerStack`] holds one [`Surface`] per slot at the base layer's pixel
//!   size, and [`Compositor`] draws into and reads from it.
//! - [`Viewport`] turns pointer and wheel input into a
//!   [`PresentationTransform`] for the host's container.
//! - [`Viewer`] ties these together and listens to an
//!   [`InputRouter`](horizon_texel_input::InputRouter).
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use horizon_texel::{
//!     Dependencies, ExtractTarget, Layers, Painter, RasterSource, Viewer, ViewerConfig,
//! };
//! use horizon_texel_input::InputRouter;
//!
//! let router = InputRouter::new();
//! let mut viewer = Viewer::mount(&router, 1, ViewerConfig::default())?;
//!
//! let base = RasterSource::Blank { width: 4, height: 4 };
//! let grid = Painter::immediate(|surface| surface.put_pixel(0, 0, [255, 255, 255, 255]));
//! viewer.update(Layers::new(base, Dependencies::new()).overlay(grid, Dependencies::new()))?;
//! viewer.settle(Duration::from_secs(1));
//!
//! let merged = viewer.extract(ExtractTarget::Merged, None)?.expect("base is resolved");
//! assert_eq!(merged.pixel(0, 0), Some([255, 255, 255, 255]));
//! assert_eq!(merged.pixel(1, 0), Some([0, 0, 0, 0]));
//! # Ok::<(), horizon_texel::ViewerError>(())
//! ```

mod compositor;
mod config;
mod error;
pub mod logging;
mod pixels;
mod resolver;
mod source;
mod stack;
mod surface;
mod viewer;
mod viewport;

pub use compositor::{Compositor, ExtractTarget};
pub use config::ViewerConfig;
pub use error::{ViewerError, ViewerResult};
pub use pixels::{PixelData, PixelRect};
pub use resolver::{
    Completed, JobKey, JobOutput, LayerSourceResolver, LoaderConfig, LocalFetcher,
    ReferenceFetcher,
};
pub use source::{
    Dependencies, LayerSpec, Painter, Placement, RasterLayer, RasterSource, Resolution,
    ResolvedLayer, resolve_now,
};
pub use stack::{LayerStack, Slot, SlotStatus};
pub use surface::Surface;
pub use viewer::{CursorHint, Layers, Presentation, Viewer};
pub use viewport::{PresentationTransform, Viewport, ViewportConfig, ViewportState};

pub use horizon_texel_input as input;
