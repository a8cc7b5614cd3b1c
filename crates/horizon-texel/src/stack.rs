//! The fixed-size stack of layer slots.
//!
//! Slot 0 is the base layer and determines the pixel size of every
//! surface in the stack; slots 1..N are overlays. Each slot records the
//! spec and dependency list it was last configured with, a generation
//! counter bumped on every change, its resolved content and its backing
//! surface.

use crate::error::ViewerError;
use crate::logging::targets;
use crate::source::{Dependencies, LayerSpec, Painter, Placement, ResolvedLayer};
use crate::surface::Surface;

/// Resolution progress of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotStatus {
    /// Nothing to draw.
    #[default]
    Idle,
    /// Waiting on a reference load or a deferred painter.
    Loading,
    /// The surface shows the current spec.
    Ready,
    /// Resolution failed; the slot stays empty until its spec or
    /// dependencies change.
    Failed(ViewerError),
}

/// Drawable content held by a slot.
#[derive(Debug, Clone, Default)]
pub(crate) enum SlotContent {
    #[default]
    Absent,
    Raster {
        layer: ResolvedLayer,
        placement: Placement,
    },
    Procedure(Painter),
}

/// One layer slot.
#[derive(Debug, Default)]
pub struct Slot {
    pub(crate) spec: LayerSpec,
    pub(crate) dependencies: Dependencies,
    pub(crate) generation: u64,
    pub(crate) content: SlotContent,
    pub(crate) status: SlotStatus,
    pub(crate) surface: Surface,
}

impl Slot {
    /// The spec this slot was last configured with.
    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    /// The dependency list this slot was last configured with.
    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    /// Number of spec/dependency changes seen so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current resolution status.
    pub fn status(&self) -> &SlotStatus {
        &self.status
    }

    /// The backing surface, at the base layer's pixel size.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// The painter to dispatch in the background, if this slot has one.
    pub(crate) fn deferred_painter(&self) -> Option<&Painter> {
        match &self.content {
            SlotContent::Procedure(painter) if painter.is_deferred() => Some(painter),
            _ => None,
        }
    }
}

/// Ordered, fixed-length collection of slots.
#[derive(Debug)]
pub struct LayerStack {
    slots: Vec<Slot>,
    base_size: Option<(u32, u32)>,
}

impl LayerStack {
    /// Create a stack with a base slot and `overlay_count` overlays.
    pub fn new(overlay_count: usize) -> Self {
        Self {
            slots: (0..=overlay_count).map(|_| Slot::default()).collect(),
            base_size: None,
        }
    }

    /// Total number of slots, base included.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of overlay slots.
    #[inline]
    pub fn overlay_count(&self) -> usize {
        self.slots.len() - 1
    }

    /// Always `false`; the base slot always exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Get a slot by index.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    /// Iterate slots bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    /// The base layer's resolved size, or `None` until it resolves.
    #[inline]
    pub fn base_size(&self) -> Option<(u32, u32)> {
        self.base_size
    }

    /// Record a new spec and dependency list for `index`.
    ///
    /// Returns the slot's new generation if anything changed, or `None` if
    /// both match what the slot already holds.
    pub(crate) fn configure(
        &mut self,
        index: usize,
        spec: LayerSpec,
        dependencies: Dependencies,
    ) -> Option<u64> {
        let slot = self.slots.get_mut(index)?;
        if slot.spec == spec && slot.dependencies == dependencies {
            return None;
        }
        slot.spec = spec;
        slot.dependencies = dependencies;
        slot.generation += 1;
        tracing::debug!(
            target: targets::STACK,
            slot = index,
            generation = slot.generation,
            "slot reconfigured"
        );
        Some(slot.generation)
    }

    /// Resize every surface to the new base size.
    ///
    /// Returns `true` if the size changed; surfaces are then blank and every
    /// slot needs redrawing.
    pub(crate) fn set_base_size(&mut self, size: Option<(u32, u32)>) -> bool {
        let size = size.filter(|(w, h)| *w > 0 && *h > 0);
        if size == self.base_size {
            return false;
        }
        let (width, height) = size.unwrap_or((0, 0));
        for slot in &mut self.slots {
            slot.surface = Surface::new(width, height);
        }
        tracing::debug!(target: targets::STACK, ?size, "base size changed");
        self.base_size = size;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RasterSource;

    #[test]
    fn test_slot_count() {
        let stack = LayerStack::new(3);
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.overlay_count(), 3);
        assert!(stack.slot(3).is_some());
        assert!(stack.slot(4).is_none());
        assert!(stack.iter().all(|s| s.surface().is_empty()));
    }

    #[test]
    fn test_configure_unchanged_is_noop() {
        let mut stack = LayerStack::new(1);
        let spec = LayerSpec::raster(RasterSource::Blank {
            width: 2,
            height: 2,
        });
        let deps = Dependencies::new().with(&1);
        assert_eq!(stack.configure(1, spec.clone(), deps.clone()), Some(1));
        assert_eq!(stack.configure(1, spec.clone(), deps), None);
        assert_eq!(stack.slot(1).unwrap().generation(), 1);
    }

    #[test]
    fn test_generation_increases_on_dependency_change() {
        let mut stack = LayerStack::new(0);
        let spec = LayerSpec::Empty;
        // The initial state is an empty spec with no dependencies.
        assert_eq!(stack.configure(0, spec.clone(), Dependencies::new()), None);
        assert_eq!(stack.configure(0, spec.clone(), Dependencies::new().with("a")), Some(1));
        assert_eq!(stack.configure(0, spec.clone(), Dependencies::new().with("b")), Some(2));
        assert_eq!(stack.configure(0, spec, Dependencies::new().with("a")), Some(3));
    }

    #[test]
    fn test_configure_out_of_range() {
        let mut stack = LayerStack::new(0);
        assert_eq!(stack.configure(1, LayerSpec::Empty, Dependencies::new().with(&0)), None);
    }

    #[test]
    fn test_base_size_resizes_all_surfaces() {
        let mut stack = LayerStack::new(2);
        assert!(stack.set_base_size(Some((4, 3))));
        assert!(stack.iter().all(|s| s.surface().dimensions() == (4, 3)));
        assert!(!stack.set_base_size(Some((4, 3))));

        assert!(stack.set_base_size(Some((0, 3))));
        assert_eq!(stack.base_size(), None);
        assert!(stack.iter().all(|s| s.surface().is_empty()));
    }
}
