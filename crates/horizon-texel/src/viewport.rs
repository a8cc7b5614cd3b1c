//! Pan and zoom state for the presentation container.
//!
//! The viewport never touches pixels. Its state turns into a
//! [`PresentationTransform`] that the host applies to the container that
//! stacks the layer surfaces, so extraction results are independent of
//! anything done here.

use crate::logging::targets;

/// Tuning for pan and zoom.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportConfig {
    /// Lowest reachable scale. Defaults to 0.05.
    pub min_scale: f64,
    /// Highest reachable scale. Unbounded by default.
    pub max_scale: Option<f64>,
    /// Scale multiplier per wheel step away from the user. Defaults to 1.05.
    pub zoom_in_factor: f64,
    /// Scale multiplier per wheel step toward the user. Defaults to 0.95.
    pub zoom_out_factor: f64,
    /// Key that must be held for pointer drags to pan. Defaults to space.
    pub pan_key: String,
    /// Key that must be held for the wheel to zoom. Defaults to `"Control"`.
    pub zoom_key: String,
}

impl ViewportConfig {
    /// Set the scale floor.
    #[must_use]
    pub fn with_min_scale(mut self, min_scale: f64) -> Self {
        self.min_scale = min_scale;
        self
    }

    /// Set a scale ceiling.
    #[must_use]
    pub fn with_max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = Some(max_scale);
        self
    }

    /// Set the per-step zoom multipliers.
    #[must_use]
    pub fn with_zoom_factors(mut self, zoom_in: f64, zoom_out: f64) -> Self {
        self.zoom_in_factor = zoom_in;
        self.zoom_out_factor = zoom_out;
        self
    }

    /// Set the pan and zoom modifier keys.
    #[must_use]
    pub fn with_keys(mut self, pan_key: impl Into<String>, zoom_key: impl Into<String>) -> Self {
        self.pan_key = pan_key.into();
        self.zoom_key = zoom_key.into();
        self
    }

    /// Clamp `scale` into the configured range.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        let scale = scale.max(self.min_scale);
        match self.max_scale {
            Some(max) => scale.min(max.max(self.min_scale)),
            None => scale,
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.05,
            max_scale: None,
            zoom_in_factor: 1.05,
            zoom_out_factor: 0.95,
            pan_key: " ".to_string(),
            zoom_key: "Control".to_string(),
        }
    }
}

/// Current scale and translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: f64,
    /// Horizontal translation in source pixels.
    pub translate_x: f64,
    /// Vertical translation in source pixels.
    pub translate_y: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

/// `scale(s) · translate(tx, ty)`, applied to the presentation container.
///
/// Translation is expressed in source pixels and applied before scaling,
/// so a point `p` lands at `s * (p + t)` relative to the transform origin.
///
/// ```
/// use horizon_texel::PresentationTransform;
///
/// let t = PresentationTransform::new(2.0, 5.0, -1.0);
/// assert_eq!(t.map_point(1.0, 1.0), (12.0, 0.0));
/// assert_eq!(t.unmap_point(12.0, 0.0), (1.0, 1.0));
/// assert_eq!(t.css(), "scale(2) translate(5px, -1px)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresentationTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl PresentationTransform {
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    #[inline]
    pub const fn new(scale: f64, translate_x: f64, translate_y: f64) -> Self {
        Self {
            scale,
            translate_x,
            translate_y,
        }
    }

    /// Map a source-pixel point into container space.
    #[inline]
    pub fn map_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.scale * (x + self.translate_x),
            self.scale * (y + self.translate_y),
        )
    }

    /// Map a container-space point back into source pixels.
    #[inline]
    pub fn unmap_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x / self.scale - self.translate_x,
            y / self.scale - self.translate_y,
        )
    }

    /// The transform as a CSS `transform` value.
    pub fn css(&self) -> String {
        format!(
            "scale({}) translate({}px, {}px)",
            self.scale, self.translate_x, self.translate_y
        )
    }
}

impl Default for PresentationTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<ViewportState> for PresentationTransform {
    fn from(state: ViewportState) -> Self {
        Self::new(state.scale, state.translate_x, state.translate_y)
    }
}

/// Pan/zoom state machine for one viewer.
#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewportConfig,
    state: ViewportState,
    container: (f64, f64),
}

impl Viewport {
    /// Create a viewport at scale 1 with no translation.
    pub fn new(config: ViewportConfig, container_width: f64, container_height: f64) -> Self {
        Self {
            config,
            state: ViewportState::default(),
            container: (container_width, container_height),
        }
    }

    #[inline]
    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> ViewportState {
        self.state
    }

    #[inline]
    pub fn container_size(&self) -> (f64, f64) {
        self.container
    }

    /// Update the container size. Takes effect at the next [`fit`](Self::fit).
    pub fn set_container_size(&mut self, width: f64, height: f64) {
        self.container = (width, height);
    }

    /// Reset translation and scale the base to fit the container.
    ///
    /// Degenerate sizes leave the scale unchanged.
    pub fn fit(&mut self, base_width: u32, base_height: u32) {
        self.state.translate_x = 0.0;
        self.state.translate_y = 0.0;
        let (cw, ch) = self.container;
        if base_width == 0 || base_height == 0 || cw <= 0.0 || ch <= 0.0 {
            return;
        }
        let fit = (cw / f64::from(base_width)).min(ch / f64::from(base_height));
        self.state.scale = self.config.clamp_scale(fit);
        tracing::debug!(
            target: targets::VIEWPORT,
            scale = self.state.scale,
            base_width,
            base_height,
            "viewport fit"
        );
    }

    /// Accumulate a pointer delta, given in container pixels, into the
    /// translation.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.state.translate_x += dx / self.state.scale;
        self.state.translate_y += dy / self.state.scale;
    }

    /// Apply one zoom step; `away` zooms in.
    pub fn zoom_step(&mut self, away: bool) {
        let factor = if away {
            self.config.zoom_in_factor
        } else {
            self.config.zoom_out_factor
        };
        self.state.scale = self.config.clamp_scale(self.state.scale * factor);
        tracing::trace!(target: targets::VIEWPORT, scale = self.state.scale, "zoom step");
    }

    /// Replace the state, clamping the scale.
    pub fn set_state(&mut self, state: ViewportState) {
        self.state = ViewportState {
            scale: self.config.clamp_scale(state.scale),
            ..state
        };
    }

    /// The transform to apply to the container.
    #[inline]
    pub fn transform(&self) -> PresentationTransform {
        self.state.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(ViewportConfig::default(), 800.0, 600.0)
    }

    #[test]
    fn test_fit_uses_smaller_ratio() {
        let mut vp = viewport();
        vp.pan_by(10.0, 10.0);
        vp.fit(400, 100);
        assert_eq!(vp.state().scale, 2.0);
        assert_eq!(vp.state().translate_x, 0.0);
        assert_eq!(vp.state().translate_y, 0.0);

        vp.fit(1600, 300);
        assert_eq!(vp.state().scale, 0.5);
    }

    #[test]
    fn test_fit_degenerate_keeps_scale() {
        let mut vp = viewport();
        vp.set_state(ViewportState {
            scale: 3.0,
            translate_x: 4.0,
            translate_y: 4.0,
        });
        vp.fit(0, 10);
        assert_eq!(vp.state().scale, 3.0);
        assert_eq!(vp.state().translate_x, 0.0);
    }

    #[test]
    fn test_pan_divides_by_scale() {
        let mut vp = viewport();
        vp.set_state(ViewportState {
            scale: 2.0,
            ..Default::default()
        });
        vp.pan_by(10.0, -6.0);
        assert_eq!(vp.state().translate_x, 5.0);
        assert_eq!(vp.state().translate_y, -3.0);
    }

    #[test]
    fn test_zoom_floor() {
        let mut vp = viewport();
        for _ in 0..500 {
            vp.zoom_step(false);
            assert!(vp.state().scale >= 0.05);
        }
        assert_eq!(vp.state().scale, 0.05);
    }

    #[test]
    fn test_zoom_ceiling() {
        let config = ViewportConfig::default().with_max_scale(1.2);
        let mut vp = Viewport::new(config, 100.0, 100.0);
        for _ in 0..20 {
            vp.zoom_step(true);
        }
        assert_eq!(vp.state().scale, 1.2);
    }

    #[test]
    fn test_zoom_in_then_out() {
        let mut vp = viewport();
        vp.zoom_step(true);
        assert!((vp.state().scale - 1.05).abs() < 1e-12);
        vp.zoom_step(false);
        assert!((vp.state().scale - 0.9975).abs() < 1e-12);
    }

    #[test]
    fn test_transform_round_trip() {
        let t = PresentationTransform::new(0.5, -20.0, 8.0);
        let (x, y) = t.map_point(3.0, 4.0);
        let (bx, by) = t.unmap_point(x, y);
        assert!((bx - 3.0).abs() < 1e-12);
        assert!((by - 4.0).abs() < 1e-12);
        assert_eq!(PresentationTransform::default().css(), "scale(1) translate(0px, 0px)");
    }
}
