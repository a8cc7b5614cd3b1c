//! The viewer: a layer stack, its background resolver, a viewport and an
//! input listener, driven from one thread.
//!
//! Hosts call [`Viewer::update`] whenever layer specs may have changed and
//! [`Viewer::poll`] once per frame (or [`Viewer::settle`] to block) to apply
//! finished background work. Dropping the viewer detaches its input
//! listener and abandons every in-flight job.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use horizon_texel_input::{
    InputListener, InputRouter, KeyState, ListenerGuard, PointerMoveEvent, TargetId, WheelEvent,
};
use parking_lot::Mutex;

use crate::compositor::{Compositor, ExtractTarget};
use crate::config::ViewerConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::logging::targets;
use crate::pixels::{PixelData, PixelRect};
use crate::resolver::{Completed, JobKey, JobOutput, LayerSourceResolver};
use crate::source::{
    Dependencies, LayerSpec, Painter, Placement, RasterSource, Resolution, ResolvedLayer,
    resolve_now,
};
use crate::stack::{LayerStack, SlotContent, SlotStatus};
use crate::surface::Surface;
use crate::viewport::{PresentationTransform, Viewport, ViewportState};

// ============================================================================
// Layer descriptions
// ============================================================================

/// Everything a viewer displays, supplied on every [`Viewer::update`].
///
/// # Example
///
/// ```
/// use horizon_texel::{Dependencies, Layers, Painter, RasterSource};
///
/// let albedo = RasterSource::reference("albedo.png");
/// let layers = Layers::new(albedo, Dependencies::new().with("albedo.png"))
///     .overlay(RasterSource::Empty, Dependencies::new())
///     .auxiliary(Painter::immediate(|_| {}), Dependencies::new());
/// assert_eq!(layers.overlay_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Layers {
    base: RasterSource,
    base_dependencies: Dependencies,
    overlays: Vec<(LayerSpec, Dependencies)>,
    auxiliary: Option<(Painter, Dependencies)>,
}

impl Layers {
    /// Start with the base layer.
    pub fn new(base: RasterSource, dependencies: Dependencies) -> Self {
        Self {
            base,
            base_dependencies: dependencies,
            overlays: Vec::new(),
            auxiliary: None,
        }
    }

    /// Add the next overlay, above every overlay added so far.
    #[must_use]
    pub fn overlay(mut self, spec: impl Into<LayerSpec>, dependencies: Dependencies) -> Self {
        self.overlays.push((spec.into(), dependencies));
        self
    }

    /// Set the draw step run on the base surface right after the base blit.
    #[must_use]
    pub fn auxiliary(mut self, painter: Painter, dependencies: Dependencies) -> Self {
        self.auxiliary = Some((painter, dependencies));
        self
    }

    /// Number of overlays added.
    pub fn overlay_count(&self) -> usize {
        self.overlays.len()
    }
}

// ============================================================================
// Presentation
// ============================================================================

/// Cursor the host should show over the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorHint {
    #[default]
    Default,
    /// The pan key is held.
    Grab,
    /// The zoom key is held.
    ZoomIn,
}

/// What the host needs to present the viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    /// Target id of the container; wheel events over it zoom.
    pub container: TargetId,
    /// Target id of each slot surface, bottom to top.
    pub surfaces: Vec<TargetId>,
    /// Pixel size of every surface; `(0, 0)` until the base resolves.
    pub size: (u32, u32),
    /// Transform applied to the container only.
    pub transform: PresentationTransform,
    /// Checkerboard tile edge in source pixels, or `None` when hidden.
    pub checker_tile: Option<f64>,
    pub cursor: CursorHint,
}

// ============================================================================
// Input
// ============================================================================

/// Routes pointer drags and wheel steps into a shared viewport.
struct ViewportInput {
    viewport: Arc<Mutex<Viewport>>,
    container: TargetId,
    base: TargetId,
}

impl InputListener for ViewportInput {
    fn pointer_moved(&self, event: &PointerMoveEvent, keys: &KeyState) -> bool {
        let mut viewport = self.viewport.lock();
        if !event.buttons.primary() || !keys.is_pressed(&viewport.config().pan_key) {
            return false;
        }
        viewport.pan_by(event.movement_x, event.movement_y);
        true
    }

    fn wheel(&self, event: &WheelEvent, keys: &KeyState) -> bool {
        let over_canvas = event
            .target
            .is_some_and(|target| target == self.container || target == self.base);
        // Horizontal-only steps carry no zoom direction.
        if !over_canvas || event.delta_y == 0.0 {
            return false;
        }
        let mut viewport = self.viewport.lock();
        if !keys.is_pressed(&viewport.config().zoom_key) {
            return false;
        }
        viewport.zoom_step(event.is_away());
        true
    }
}

// ============================================================================
// Viewer
// ============================================================================

/// A multi-layer raster viewer.
///
/// # Example
///
/// ```
/// use horizon_texel::{Dependencies, Layers, RasterSource, Viewer, ViewerConfig};
///
/// let mut viewer = Viewer::new(1, ViewerConfig::default()).unwrap();
/// let red = [255u8, 0, 0, 255].repeat(4);
/// let blue = [0u8, 0, 255, 255].repeat(4);
/// viewer
///     .update(
///         Layers::new(RasterSource::pixels(red, 2, 2), Dependencies::new().with(&1))
///             .overlay(RasterSource::pixels(blue.clone(), 2, 2), Dependencies::new().with(&1)),
///     )
///     .unwrap();
///
/// let merged = viewer.extract(horizon_texel::ExtractTarget::Merged, None).unwrap().unwrap();
/// assert_eq!(merged.as_bytes(), &blue[..]);
/// ```
pub struct Viewer {
    input: Option<ListenerGuard>,
    keys: Option<KeyState>,
    stack: LayerStack,
    resolver: LayerSourceResolver,
    viewport: Arc<Mutex<Viewport>>,
    auxiliary: Option<Painter>,
    auxiliary_dependencies: Dependencies,
    container: TargetId,
    surface_targets: Vec<TargetId>,
    hide_transparency: bool,
    checker_size: f64,
}

impl Viewer {
    /// Create a viewer with a base slot and `overlay_count` overlays.
    ///
    /// The viewer receives no input until [`attach_input`](Self::attach_input).
    pub fn new(overlay_count: usize, config: ViewerConfig) -> ViewerResult<Self> {
        let resolver = LayerSourceResolver::with_config(config.loader)?;
        let viewport = Viewport::new(
            config.viewport,
            config.container_width,
            config.container_height,
        );
        tracing::debug!(target: targets::VIEWER, overlay_count, "viewer created");
        Ok(Self {
            input: None,
            keys: None,
            stack: LayerStack::new(overlay_count),
            resolver,
            viewport: Arc::new(Mutex::new(viewport)),
            auxiliary: None,
            auxiliary_dependencies: Dependencies::new(),
            container: TargetId::new(),
            surface_targets: (0..=overlay_count).map(|_| TargetId::new()).collect(),
            hide_transparency: config.hide_transparency,
            checker_size: config.checker_size,
        })
    }

    /// Create a viewer and attach it to `router`.
    pub fn mount(
        router: &InputRouter,
        overlay_count: usize,
        config: ViewerConfig,
    ) -> ViewerResult<Self> {
        let mut viewer = Self::new(overlay_count, config)?;
        viewer.attach_input(router);
        Ok(viewer)
    }

    /// Listen to `router` for pan and zoom, replacing any earlier router.
    pub fn attach_input(&mut self, router: &InputRouter) {
        let listener = ViewportInput {
            viewport: Arc::clone(&self.viewport),
            container: self.container,
            base: self.surface_targets[0],
        };
        self.input = Some(router.attach(Arc::new(listener)));
        self.keys = Some(router.key_state());
    }

    /// Stop listening for input.
    pub fn detach_input(&mut self) {
        self.input = None;
        self.keys = None;
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    /// Apply a new set of layer specs.
    ///
    /// Slots whose spec and dependencies are unchanged are left alone.
    /// Supplying a different number of overlays than the viewer was created
    /// with fails with [`ViewerError::LayerCountMismatch`] and applies
    /// nothing.
    pub fn update(&mut self, layers: Layers) -> ViewerResult<()> {
        if layers.overlays.len() != self.stack.overlay_count() {
            return Err(ViewerError::LayerCountMismatch {
                expected: self.stack.overlay_count(),
                actual: layers.overlays.len(),
            });
        }

        let (auxiliary, auxiliary_dependencies) = match layers.auxiliary {
            Some((painter, deps)) => (Some(painter), deps),
            None => (None, Dependencies::new()),
        };
        let auxiliary_changed = auxiliary != self.auxiliary
            || auxiliary_dependencies != self.auxiliary_dependencies;
        self.auxiliary = auxiliary;
        self.auxiliary_dependencies = auxiliary_dependencies;

        let base_spec = LayerSpec::raster(layers.base);
        let base_changed = match self.stack.configure(0, base_spec, layers.base_dependencies) {
            Some(generation) => {
                self.resolve_slot(0, generation);
                true
            }
            None => false,
        };
        if auxiliary_changed && !base_changed {
            Compositor::redraw(&mut self.stack, 0, self.auxiliary.as_ref());
        }

        for (i, (spec, deps)) in layers.overlays.into_iter().enumerate() {
            let index = i + 1;
            if let Some(generation) = self.stack.configure(index, spec, deps) {
                self.resolve_slot(index, generation);
            }
        }
        Ok(())
    }

    fn resolve_slot(&mut self, index: usize, generation: u64) {
        let Some(spec) = self.stack.slot(index).map(|slot| slot.spec().clone()) else {
            return;
        };
        match spec {
            LayerSpec::Empty => {
                self.set_content(index, SlotContent::Absent, SlotStatus::Idle);
            }
            LayerSpec::Raster(layer) => match resolve_now(&layer.source) {
                Ok(Resolution::Ready(resolved)) => {
                    self.apply_resolved(index, layer.placement, resolved);
                }
                Ok(Resolution::Pending { uri }) => {
                    // The previous content stays visible until the load lands.
                    let key = JobKey {
                        slot: index,
                        generation,
                    };
                    match self.resolver.fetch(key, uri) {
                        Ok(()) => self.set_status(index, SlotStatus::Loading),
                        Err(e) => self.fail(index, e),
                    }
                }
                Err(e) => self.fail(index, e),
            },
            LayerSpec::Procedure(painter) => {
                let deferred = painter.is_deferred();
                let status = if deferred {
                    SlotStatus::Loading
                } else {
                    SlotStatus::Ready
                };
                self.set_content(index, SlotContent::Procedure(painter), status);
                if deferred {
                    self.dispatch_paint(index);
                }
            }
        }
    }

    fn apply_resolved(&mut self, index: usize, placement: Placement, resolved: ResolvedLayer) {
        if resolved.is_absent() {
            self.set_content(index, SlotContent::Absent, SlotStatus::Idle);
        } else {
            let content = SlotContent::Raster {
                layer: resolved,
                placement,
            };
            self.set_content(index, content, SlotStatus::Ready);
        }
    }

    fn fail(&mut self, index: usize, error: ViewerError) {
        tracing::warn!(target: targets::VIEWER, slot = index, %error, "layer failed to resolve");
        self.set_content(index, SlotContent::Absent, SlotStatus::Failed(error));
    }

    fn set_status(&mut self, index: usize, status: SlotStatus) {
        if let Some(slot) = self.stack.slot_mut(index) {
            slot.status = status;
        }
    }

    /// Replace a slot's content and bring its surface up to date.
    fn set_content(&mut self, index: usize, content: SlotContent, status: SlotStatus) {
        let Some(slot) = self.stack.slot_mut(index) else {
            return;
        };
        slot.content = content;
        slot.status = status;
        if index == 0 {
            self.refresh_base();
        } else {
            Compositor::redraw(&mut self.stack, index, self.auxiliary.as_ref());
        }
    }

    /// Resize the stack to the base content, redraw and refit.
    fn refresh_base(&mut self) {
        let size = self.stack.slot(0).and_then(|slot| match &slot.content {
            SlotContent::Raster { layer, .. } => Some((layer.width, layer.height)),
            _ => None,
        });
        if self.stack.set_base_size(size) {
            for index in 0..self.stack.len() {
                Compositor::redraw(&mut self.stack, index, self.auxiliary.as_ref());
            }
            for index in 1..self.stack.len() {
                self.dispatch_paint(index);
            }
        } else {
            Compositor::redraw(&mut self.stack, 0, self.auxiliary.as_ref());
        }
        if let Some((width, height)) = self.stack.base_size() {
            self.viewport.lock().fit(width, height);
        }
    }

    /// Send a slot's deferred painter to the resolver, if it has one and
    /// the base size is known.
    fn dispatch_paint(&mut self, index: usize) {
        let Some((width, height)) = self.stack.base_size() else {
            return;
        };
        let Some(slot) = self.stack.slot(index) else {
            return;
        };
        let Some(painter) = slot.deferred_painter().cloned() else {
            return;
        };
        let key = JobKey {
            slot: index,
            generation: slot.generation(),
        };
        match self.resolver.paint(key, painter, width, height) {
            Ok(()) => self.set_status(index, SlotStatus::Loading),
            Err(e) => self.fail(index, e),
        }
    }

    // ------------------------------------------------------------------------
    // Background results
    // ------------------------------------------------------------------------

    /// Apply every finished background job without blocking.
    ///
    /// Returns the number of results applied; stale results are dropped.
    pub fn poll(&mut self) -> usize {
        let completed = self.resolver.poll();
        self.apply_completed(completed)
    }

    /// Apply background results until nothing is in flight or `timeout`
    /// elapses. Returns `true` if the viewer settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.resolver.is_busy() {
            let completed = self.resolver.wait(deadline);
            if completed.is_empty() {
                break;
            }
            self.apply_completed(completed);
        }
        !self.resolver.is_busy()
    }

    /// Returns `true` while any background job is in flight.
    pub fn is_loading(&self) -> bool {
        self.resolver.is_busy()
    }

    fn apply_completed(&mut self, completed: Vec<Completed>) -> usize {
        let mut applied = 0;
        for Completed { key, output } in completed {
            let Some(slot) = self.stack.slot(key.slot) else {
                continue;
            };
            if slot.generation() != key.generation {
                tracing::debug!(
                    target: targets::VIEWER,
                    slot = key.slot,
                    generation = key.generation,
                    current = slot.generation(),
                    "discarding stale result"
                );
                continue;
            }
            match output {
                JobOutput::Resolved(Ok(resolved)) => {
                    let placement = match slot.spec() {
                        LayerSpec::Raster(layer) => layer.placement,
                        _ => Placement::default(),
                    };
                    self.apply_resolved(key.slot, placement, resolved);
                }
                JobOutput::Resolved(Err(e)) => self.fail(key.slot, e),
                JobOutput::Painted(painted) => {
                    if !self.apply_painted(key.slot, painted) {
                        continue;
                    }
                }
            }
            applied += 1;
        }
        applied
    }

    fn apply_painted(&mut self, index: usize, painted: ViewerResult<Surface>) -> bool {
        let base_size = self.stack.base_size();
        let Some(slot) = self.stack.slot_mut(index) else {
            return false;
        };
        if slot.deferred_painter().is_none() {
            return false;
        }
        match painted {
            Ok(surface) if Some(surface.dimensions()) == base_size => {
                slot.surface = surface;
                slot.status = SlotStatus::Ready;
            }
            Ok(_) => {
                tracing::debug!(
                    target: targets::VIEWER,
                    slot = index,
                    "discarding painted surface of outdated size"
                );
                return false;
            }
            // The painter stays configured so a new base size retries it.
            Err(error) => {
                tracing::warn!(
                    target: targets::VIEWER,
                    slot = index,
                    %error,
                    "deferred painter failed"
                );
                slot.surface.clear();
                slot.status = SlotStatus::Failed(error);
            }
        }
        true
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Read pixels from one slot or from the merged composite.
    ///
    /// See [`Compositor::extract`].
    pub fn extract(
        &self,
        target: ExtractTarget,
        rect: Option<PixelRect>,
    ) -> ViewerResult<Option<PixelData>> {
        Compositor::extract(&self.stack, target, rect)
    }

    /// Resolution status of slot `index`.
    pub fn status(&self, index: usize) -> Option<&SlotStatus> {
        self.stack.slot(index).map(|slot| slot.status())
    }

    /// Backing surface of slot `index`.
    pub fn surface(&self, index: usize) -> Option<&Surface> {
        self.stack.slot(index).map(|slot| slot.surface())
    }

    /// The underlying stack.
    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// Total number of slots, base included.
    pub fn layer_count(&self) -> usize {
        self.stack.len()
    }

    pub fn viewport_state(&self) -> ViewportState {
        self.viewport.lock().state()
    }

    /// Override pan and zoom. The scale is clamped to the configured range.
    pub fn set_viewport_state(&self, state: ViewportState) {
        self.viewport.lock().set_state(state);
    }

    /// Update the container size used by the next fit.
    pub fn set_container_size(&self, width: f64, height: f64) {
        self.viewport.lock().set_container_size(width, height);
    }

    /// Whether an input router is attached.
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Everything the host needs to lay out and draw the viewer.
    pub fn presentation(&self) -> Presentation {
        let viewport = self.viewport.lock();
        let transform = viewport.transform();
        let cursor = match &self.keys {
            Some(keys) if keys.is_pressed(&viewport.config().pan_key) => CursorHint::Grab,
            Some(keys) if keys.is_pressed(&viewport.config().zoom_key) => CursorHint::ZoomIn,
            _ => CursorHint::Default,
        };
        let checker_tile =
            (!self.hide_transparency).then(|| self.checker_size / transform.scale);
        Presentation {
            container: self.container,
            surfaces: self.surface_targets.clone(),
            size: self.stack.base_size().unwrap_or((0, 0)),
            transform,
            checker_tile,
            cursor,
        }
    }
}

impl fmt::Debug for Viewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewer")
            .field("layers", &self.stack.len())
            .field("base_size", &self.stack.base_size())
            .field("resolver", &self.resolver)
            .field("viewport", &self.viewport.lock().state())
            .field("has_input", &self.input.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_texel_input::PointerButtons;

    const RED: [u8; 4] = [255, 0, 0, 255];

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RasterSource {
        RasterSource::pixels(rgba.repeat((width * height) as usize), width, height)
    }

    fn viewer(overlays: usize) -> Viewer {
        let config = ViewerConfig::default().with_container_size(100.0, 100.0);
        Viewer::new(overlays, config).unwrap()
    }

    #[test]
    fn test_base_change_fits_viewport() {
        let mut viewer = viewer(0);
        viewer.set_viewport_state(ViewportState {
            scale: 3.0,
            translate_x: 7.0,
            translate_y: 7.0,
        });
        viewer
            .update(Layers::new(solid(50, 25, RED), Dependencies::new().with(&1)))
            .unwrap();
        assert_eq!(
            viewer.viewport_state(),
            ViewportState {
                scale: 2.0,
                translate_x: 0.0,
                translate_y: 0.0
            }
        );
        assert_eq!(viewer.presentation().size, (50, 25));
    }

    #[test]
    fn test_unchanged_update_keeps_viewport() {
        let mut viewer = viewer(0);
        let layers = Layers::new(solid(10, 10, RED), Dependencies::new().with(&1));
        viewer.update(layers.clone()).unwrap();
        viewer.set_viewport_state(ViewportState {
            scale: 4.0,
            translate_x: 1.0,
            translate_y: 2.0,
        });
        viewer.update(layers).unwrap();
        assert_eq!(viewer.viewport_state().scale, 4.0);
        assert_eq!(viewer.stack().slot(0).unwrap().generation(), 1);
    }

    #[test]
    fn test_auxiliary_change_redraws_base() {
        let mut viewer = viewer(0);
        let base = solid(2, 2, RED);
        let mark = Painter::immediate(|s| s.put_pixel(1, 1, [0, 0, 0, 255]));
        viewer
            .update(Layers::new(base.clone(), Dependencies::new()))
            .unwrap();
        let before = viewer.extract(ExtractTarget::Slot(0), None).unwrap().unwrap();
        assert_eq!(before.pixel(1, 1), Some(RED));

        viewer
            .update(
                Layers::new(base, Dependencies::new())
                    .auxiliary(mark, Dependencies::new().with(&1)),
            )
            .unwrap();
        let after = viewer.extract(ExtractTarget::Slot(0), None).unwrap().unwrap();
        assert_eq!(after.pixel(1, 1), Some([0, 0, 0, 255]));
        assert_eq!(after.pixel(0, 0), Some(RED));
    }

    #[test]
    fn test_checker_tile_follows_scale() {
        let mut viewer = viewer(0);
        viewer
            .update(Layers::new(solid(50, 50, RED), Dependencies::new()))
            .unwrap();
        assert_eq!(viewer.presentation().checker_tile, Some(10.0));

        let hidden = Viewer::new(0, ViewerConfig::default().with_hide_transparency(true)).unwrap();
        assert_eq!(hidden.presentation().checker_tile, None);
    }

    #[test]
    fn test_cursor_hint() {
        let router = InputRouter::new();
        let viewer = Viewer::mount(&router, 0, ViewerConfig::default()).unwrap();
        assert_eq!(viewer.presentation().cursor, CursorHint::Default);
        router.key_down("Control");
        assert_eq!(viewer.presentation().cursor, CursorHint::ZoomIn);
        router.key_down(" ");
        assert_eq!(viewer.presentation().cursor, CursorHint::Grab);
    }

    #[test]
    fn test_pan_requires_key_and_button() {
        let router = InputRouter::new();
        let viewer = Viewer::mount(&router, 0, ViewerConfig::default()).unwrap();
        viewer.set_viewport_state(ViewportState {
            scale: 2.0,
            ..Default::default()
        });

        let drag = PointerMoveEvent::new(10.0, 4.0, PointerButtons::PRIMARY);
        assert!(!router.pointer_moved(drag));
        router.key_down(" ");
        assert!(!router.pointer_moved(PointerMoveEvent::new(10.0, 4.0, PointerButtons::NONE)));
        assert!(router.pointer_moved(drag));

        let state = viewer.viewport_state();
        assert_eq!((state.translate_x, state.translate_y), (5.0, 2.0));
    }

    #[test]
    fn test_zoom_requires_key_and_target() {
        let router = InputRouter::new();
        let viewer = Viewer::mount(&router, 1, ViewerConfig::default()).unwrap();
        let presentation = viewer.presentation();

        let over_container = WheelEvent::new(1.0, Some(presentation.container));
        assert!(!router.wheel(over_container));
        router.key_down("Control");
        assert!(!router.wheel(WheelEvent::new(1.0, Some(TargetId::new()))));
        assert!(!router.wheel(WheelEvent::new(1.0, None)));
        assert!(router.wheel(over_container));
        assert!((viewer.viewport_state().scale - 1.05).abs() < 1e-12);

        assert!(router.wheel(WheelEvent::new(-1.0, Some(presentation.surfaces[0]))));
        assert!((viewer.viewport_state().scale - 0.9975).abs() < 1e-12);
    }
}
