//! Drawing resolved content into slot surfaces, and reading it back.
//!
//! Surfaces always hold source-resolution pixels; nothing here knows about
//! the viewport, so extraction is unaffected by pan and zoom.

use crate::error::{ViewerError, ViewerResult};
use crate::logging::targets;
use crate::pixels::{PixelData, PixelRect};
use crate::source::Painter;
use crate::stack::{LayerStack, Slot, SlotContent};
use crate::surface::Surface;

/// Which raster [`Compositor::extract`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractTarget {
    /// A single slot's surface.
    Slot(usize),
    /// Every slot composited bottom to top.
    Merged,
}

/// Stateless drawing and extraction over a [`LayerStack`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor;

impl Compositor {
    /// Clear slot `index` and draw its current content.
    ///
    /// Raster content is blitted with nearest-neighbor sampling, immediate
    /// painters run against the surface, and deferred painters are left to
    /// the background resolver. For the base slot, `auxiliary` runs right
    /// after the base content is drawn.
    pub fn redraw(stack: &mut LayerStack, index: usize, auxiliary: Option<&Painter>) {
        let Some(Slot {
            content, surface, ..
        }) = stack.slot_mut(index)
        else {
            return;
        };
        surface.clear();
        if surface.is_empty() {
            return;
        }

        match content {
            SlotContent::Absent => {}
            SlotContent::Raster { layer, placement } => {
                if let Some(image) = &layer.image {
                    let (width, height) = placement.size_for(image.width(), image.height());
                    surface.blit_nearest(
                        image,
                        placement.offset_x,
                        placement.offset_y,
                        width,
                        height,
                    );
                }
            }
            SlotContent::Procedure(painter) => {
                if !painter.is_deferred() {
                    painter.paint(surface);
                }
            }
        }

        if index == 0 {
            if let Some(auxiliary) = auxiliary {
                auxiliary.paint(surface);
            }
        }
        tracing::trace!(target: targets::COMPOSITOR, slot = index, "slot redrawn");
    }

    /// Read pixels from the stack.
    ///
    /// `rect` defaults to the full base size. Returns `Ok(None)` while the
    /// base layer has no surface.
    pub fn extract(
        stack: &LayerStack,
        target: ExtractTarget,
        rect: Option<PixelRect>,
    ) -> ViewerResult<Option<PixelData>> {
        if let ExtractTarget::Slot(index) = target {
            if index >= stack.len() {
                return Err(ViewerError::SlotOutOfRange {
                    index,
                    len: stack.len(),
                });
            }
        }
        let Some((width, height)) = stack.base_size() else {
            tracing::trace!(target: targets::COMPOSITOR, ?target, "no base surface yet");
            return Ok(None);
        };
        let rect = rect.unwrap_or(PixelRect::from_size(width, height));
        if rect.byte_len().is_none() {
            return Err(ViewerError::InvalidRect {
                width: rect.width,
                height: rect.height,
            });
        }

        let pixels = match target {
            ExtractTarget::Slot(index) => match stack.slot(index) {
                Some(slot) => slot.surface().read_rect(rect)?,
                None => Surface::empty().read_rect(rect)?,
            },
            ExtractTarget::Merged => {
                // Every slot surface is base sized, so compositing at the
                // base size covers everything the rect can see.
                let mut scratch = Surface::new(width, height);
                for slot in stack.iter() {
                    scratch.composite_over(slot.surface(), 0, 0);
                }
                scratch.read_rect(rect)?
            }
        };
        Ok(Some(pixels))
    }
}
