//! Tracing targets for the viewer crate.
//!
//! Horizon Texel uses the `tracing` crate for instrumentation. Install a
//! subscriber in the host application to see the output:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_texel=debug")
//!     .init();
//! ```

/// Target names for log filtering.
pub mod targets {
    /// Source resolution and background loading.
    pub const RESOLVER: &str = "horizon_texel::resolver";
    /// Slot configuration and generation tracking.
    pub const STACK: &str = "horizon_texel::stack";
    /// Surface drawing and extraction.
    pub const COMPOSITOR: &str = "horizon_texel::compositor";
    /// Pan and zoom.
    pub const VIEWPORT: &str = "horizon_texel::viewport";
    /// Viewer lifecycle and result application.
    pub const VIEWER: &str = "horizon_texel::viewer";
}
