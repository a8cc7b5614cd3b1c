//! CPU-side backing surfaces.
//!
//! A [`Surface`] is the native-resolution pixel store behind one layer slot.
//! Every drawing operation here is pixel-exact: scaling uses
//! nearest-neighbor sampling only, and compositing uses straight-alpha
//! source-over with fast paths that leave opaque and fully transparent
//! pixels bit-identical.
//!
//! Procedural painters receive `&mut Surface` and draw with the same API.

use image::{Rgba, RgbaImage};

use crate::error::{ViewerError, ViewerResult};
use crate::pixels::{PixelData, PixelRect};

/// A row-major RGBA8 pixel surface.
#[derive(Clone, PartialEq, Eq)]
pub struct Surface {
    inner: RgbaImage,
}

impl Surface {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// Create a fully transparent surface.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: RgbaImage::new(width, height),
        }
    }

    /// Create a 0x0 surface, the state of every slot before the base resolves.
    #[inline]
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Create a surface from raw RGBA pixel data.
    ///
    /// The data must be exactly `width * height * 4` bytes, with pixels in
    /// row-major order, 4 bytes per pixel (R, G, B, A).
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> ViewerResult<Self> {
        let expected = rgba_len(width, height);
        let actual = data.len();
        if expected != Some(actual) {
            return Err(ViewerError::DimensionMismatch {
                width,
                height,
                expected: expected.unwrap_or(usize::MAX),
                actual,
            });
        }
        let inner = RgbaImage::from_raw(width, height, data).ok_or(
            ViewerError::DimensionMismatch {
                width,
                height,
                expected: actual,
                actual,
            },
        )?;
        Ok(Self { inner })
    }

    pub(crate) fn from_image(inner: RgbaImage) -> Self {
        Self { inner }
    }

    // ========================================================================
    // PROPERTIES
    // ========================================================================

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    /// The dimensions as a `(width, height)` tuple.
    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    /// Returns `true` if the surface has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// The raw RGBA8 bytes.
    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        self.inner.as_raw()
    }

    /// Mutable access to the raw RGBA8 bytes.
    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.inner
    }

    // ========================================================================
    // PIXEL ACCESS
    // ========================================================================

    /// Get the RGBA value at `(x, y)`, or `None` if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.inner.get_pixel_checked(x, y).map(|p| p.0)
    }

    /// Replace the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(p) = self.inner.get_pixel_mut_checked(x, y) {
            *p = Rgba(rgba);
        }
    }

    /// Composite `rgba` over the pixel at `(x, y)`. Out-of-bounds writes are
    /// ignored.
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if let Some(p) = self.inner.get_pixel_mut_checked(x, y) {
            *p = blend_over(*p, Rgba(rgba));
        }
    }

    /// Make every pixel fully transparent.
    pub fn clear(&mut self) {
        self.inner.fill(0);
    }

    /// Replace every pixel inside `rect` (clipped to the surface) with `rgba`.
    pub fn fill_rect(&mut self, rect: PixelRect, rgba: [u8; 4]) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.inner.put_pixel(x, y, Rgba(rgba));
            }
        }
    }

    // ========================================================================
    // COMPOSITION
    // ========================================================================

    /// Copy `src` into this surface at `(x, y)`, scaled to `width` x `height`
    /// with nearest-neighbor sampling. Destination pixels are replaced, not
    /// blended; anything falling outside this surface is clipped.
    ///
    /// Destination pixel `d` samples source pixel `floor((d + 0.5) * src / dst)`,
    /// so an unscaled blit copies bytes verbatim.
    pub fn blit_nearest(&mut self, src: &Surface, x: i64, y: i64, width: u32, height: u32) {
        if src.is_empty() || self.is_empty() {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip(PixelRect::new(x, y, width, height)) else {
            return;
        };
        let (src_w, src_h) = (src.width() as u64, src.height() as u64);

        for ty in y0..y1 {
            let dy = (ty as i64 - y) as u64;
            let sy = nearest(dy, height as u64, src_h);
            for tx in x0..x1 {
                let dx = (tx as i64 - x) as u64;
                let sx = nearest(dx, width as u64, src_w);
                let px = *src.inner.get_pixel(sx, sy);
                self.inner.put_pixel(tx, ty, px);
            }
        }
    }

    /// Composite `src` over this surface with its top-left corner at `(x, y)`.
    pub fn composite_over(&mut self, src: &Surface, x: i64, y: i64) {
        let Some((x0, y0, x1, y1)) =
            self.clip(PixelRect::new(x, y, src.width(), src.height()))
        else {
            return;
        };
        for ty in y0..y1 {
            let sy = (ty as i64 - y) as u32;
            for tx in x0..x1 {
                let sx = (tx as i64 - x) as u32;
                let s = *src.inner.get_pixel(sx, sy);
                let d = self.inner.get_pixel_mut(tx, ty);
                *d = blend_over(*d, s);
            }
        }
    }

    // ========================================================================
    // EXPORT
    // ========================================================================

    /// Read the pixels inside `rect`. Pixels outside the surface read as
    /// transparent.
    pub fn read_rect(&self, rect: PixelRect) -> ViewerResult<PixelData> {
        let too_large = || ViewerError::InvalidRect {
            width: rect.width,
            height: rect.height,
        };
        let byte_len = rect.byte_len().ok_or_else(too_large)?;
        let mut data = Vec::new();
        data.try_reserve_exact(byte_len).map_err(|_| too_large())?;
        data.resize(byte_len, 0);
        if let Some((x0, y0, x1, y1)) = self.clip(rect) {
            let stride = self.width() as usize * 4;
            let out_stride = rect.width as usize * 4;
            let len = (x1 - x0) as usize * 4;
            let raw = self.inner.as_raw();
            for sy in y0..y1 {
                let src = sy as usize * stride + x0 as usize * 4;
                let row = (sy as i64 - rect.y) as usize;
                let col = (x0 as i64 - rect.x) as usize;
                let dst = row * out_stride + col * 4;
                data[dst..dst + len].copy_from_slice(&raw[src..src + len]);
            }
        }
        Ok(PixelData::new(rect.width, rect.height, data))
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Intersect `rect` with the surface bounds, as `(x0, y0, x1, y1)`.
    fn clip(&self, rect: PixelRect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x.max(0);
        let y0 = rect.y.max(0);
        let x1 = rect.x.saturating_add(rect.width as i64).min(self.width() as i64);
        let y1 = rect.y.saturating_add(rect.height as i64).min(self.height() as i64);
        (x0 < x1 && y0 < y1).then(|| (x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Byte length of a `width` x `height` RGBA8 buffer, or `None` on overflow.
pub(crate) fn rgba_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .filter(|&n| n <= isize::MAX as usize)
}

/// Source index sampled by destination index `d` when `src` pixels are
/// stretched over `dst` pixels.
#[inline]
fn nearest(d: u64, dst: u64, src: u64) -> u32 {
    (((2 * d + 1) * src) / (2 * dst)).min(src - 1) as u32
}

/// Straight-alpha source-over.
fn blend_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let [sr, sg, sb, sa] = src.0;
    let [dr, dg, db, da] = dst.0;

    if sa == 0 {
        return dst;
    }
    if sa == 255 || da == 0 {
        return src;
    }

    let src_a = sa as f32 / 255.0;
    let dst_a = da as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    let channel = |s: u8, d: u8| {
        let c = (s as f32 * src_a + d as f32 * dst_a * (1.0 - src_a)) / out_a;
        c.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(sr, dr),
        channel(sg, dg),
        channel(sb, db),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
