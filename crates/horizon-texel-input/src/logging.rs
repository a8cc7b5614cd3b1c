//! Tracing targets for the input crate.
//!
//! Use these with `tracing` directives to filter logs by subsystem, e.g.
//! `RUST_LOG=horizon_texel_input::router=trace`.

/// Target names for log filtering.
pub mod targets {
    /// Key state transitions.
    pub const KEYS: &str = "horizon_texel_input::keys";
    /// Listener registration and event dispatch.
    pub const ROUTER: &str = "horizon_texel_input::router";
}
