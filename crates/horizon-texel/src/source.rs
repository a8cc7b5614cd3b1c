//! Layer descriptions and synchronous source resolution.
//!
//! A caller describes each slot with a [`LayerSpec`] plus a
//! [`Dependencies`] list. Raster specs carry a [`RasterSource`], which
//! resolves to a [`ResolvedLayer`]: immediately for in-memory sources, or
//! through the background [`LayerSourceResolver`](crate::LayerSourceResolver)
//! for references.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use crate::error::ViewerResult;
use crate::surface::Surface;

/// Where a layer's pixels come from.
#[derive(Clone, PartialEq, Eq)]
pub enum RasterSource {
    /// No content.
    Empty,
    /// Dimensions only, with no pixels. As a base source this sizes the
    /// stack so overlays can be drawn on an otherwise blank canvas.
    Blank { width: u32, height: u32 },
    /// Row-major RGBA8 pixels, as produced by a texture codec.
    Pixels {
        buffer: Arc<[u8]>,
        width: u32,
        height: u32,
    },
    /// An external image, fetched and decoded in the background.
    Reference { uri: String },
}

impl RasterSource {
    /// Create a pixel source from row-major RGBA8 bytes.
    pub fn pixels(buffer: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self::Pixels {
            buffer: buffer.into(),
            width,
            height,
        }
    }

    /// Create a reference source.
    pub fn reference(uri: impl Into<String>) -> Self {
        Self::Reference { uri: uri.into() }
    }

    /// Returns `true` for [`RasterSource::Empty`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for RasterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Blank { width, height } => f
                .debug_struct("Blank")
                .field("width", width)
                .field("height", height)
                .finish(),
            Self::Pixels {
                buffer,
                width,
                height,
            } => f
                .debug_struct("Pixels")
                .field("bytes", &buffer.len())
                .field("width", width)
                .field("height", height)
                .finish(),
            Self::Reference { uri } => f.debug_struct("Reference").field("uri", uri).finish(),
        }
    }
}

/// Where and how large a raster layer is drawn, in base-layer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub offset_x: i64,
    pub offset_y: i64,
    /// Target width; the content's native width if `None`.
    pub width: Option<u32>,
    /// Target height; the content's native height if `None`.
    pub height: Option<u32>,
}

impl Placement {
    /// The drawn size for content of the given native size.
    #[inline]
    pub fn size_for(&self, native_width: u32, native_height: u32) -> (u32, u32) {
        (
            self.width.unwrap_or(native_width),
            self.height.unwrap_or(native_height),
        )
    }
}

/// A raster overlay: a source plus its placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterLayer {
    pub placement: Placement,
    pub source: RasterSource,
}

impl RasterLayer {
    /// Draw `source` at the origin at its native size.
    pub fn new(source: RasterSource) -> Self {
        Self {
            placement: Placement::default(),
            source,
        }
    }

    /// Draw with the top-left corner at `(x, y)`.
    #[must_use]
    pub fn at(mut self, x: i64, y: i64) -> Self {
        self.placement.offset_x = x;
        self.placement.offset_y = y;
        self
    }

    /// Stretch the content to `width` x `height`.
    #[must_use]
    pub fn scaled_to(mut self, width: u32, height: u32) -> Self {
        self.placement.width = Some(width);
        self.placement.height = Some(height);
        self
    }
}

type PaintFn = dyn Fn(&mut Surface) + Send + Sync;

/// A procedural draw operation with direct write access to a surface.
///
/// Painters are compared by identity: clone a painter to keep it "the same
/// spec" across updates, or build a new one to force a redraw.
#[derive(Clone)]
pub enum Painter {
    /// Runs synchronously whenever the slot is redrawn.
    Immediate(Arc<PaintFn>),
    /// Runs on a loader worker against a fresh surface of the base size.
    /// The slot's surface is not current until it completes.
    Deferred(Arc<PaintFn>),
}

impl Painter {
    /// Create a painter that runs on the viewer thread.
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(&mut Surface) + Send + Sync + 'static,
    {
        Self::Immediate(Arc::new(f))
    }

    /// Create a painter that runs in the background.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&mut Surface) + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(f))
    }

    /// Returns `true` if this painter runs in the background.
    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Invoke the draw operation.
    pub fn paint(&self, surface: &mut Surface) {
        match self {
            Self::Immediate(f) | Self::Deferred(f) => f(surface),
        }
    }
}

impl PartialEq for Painter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Immediate(a), Self::Immediate(b)) | (Self::Deferred(a), Self::Deferred(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Painter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(_) => f.write_str("Painter::Immediate"),
            Self::Deferred(_) => f.write_str("Painter::Deferred"),
        }
    }
}

/// What a slot draws.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LayerSpec {
    /// Nothing; the slot's surface stays transparent.
    #[default]
    Empty,
    /// Raster content from a [`RasterSource`].
    Raster(RasterLayer),
    /// Procedural content.
    Procedure(Painter),
}

impl LayerSpec {
    /// Shorthand for a raster layer drawn at the origin at native size.
    pub fn raster(source: RasterSource) -> Self {
        Self::Raster(RasterLayer::new(source))
    }
}

impl From<RasterLayer> for LayerSpec {
    fn from(layer: RasterLayer) -> Self {
        Self::Raster(layer)
    }
}

impl From<RasterSource> for LayerSpec {
    fn from(source: RasterSource) -> Self {
        Self::raster(source)
    }
}

impl From<Painter> for LayerSpec {
    fn from(painter: Painter) -> Self {
        Self::Procedure(painter)
    }
}

/// The values a layer's resolution depends on.
///
/// Two lists are equal when they have the same length and every element
/// hashes equally. A slot re-resolves only when its spec or its dependency
/// list changes.
///
/// ```
/// use horizon_texel::Dependencies;
///
/// let a = Dependencies::new().with(&3u32).with("mip");
/// let b = Dependencies::new().with(&3u32).with("mip");
/// assert_eq!(a, b);
/// assert_ne!(a, Dependencies::new().with(&4u32).with("mip"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Dependencies(Vec<u64>);

impl Dependencies {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    #[must_use]
    pub fn with<T: Hash + ?Sized>(mut self, value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        self.0.push(hasher.finish());
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Concrete drawable content for one slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedLayer {
    pub width: u32,
    pub height: u32,
    /// The decoded pixels, or `None` for blank or absent content.
    pub image: Option<Arc<Surface>>,
}

impl ResolvedLayer {
    /// No content at all.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Dimensions without pixels.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            image: None,
        }
    }

    /// Decoded pixels.
    pub fn image(surface: Surface) -> Self {
        Self {
            width: surface.width(),
            height: surface.height(),
            image: Some(Arc::new(surface)),
        }
    }

    /// Returns `true` if there is nothing to draw and no size to report.
    pub fn is_absent(&self) -> bool {
        self.image.is_none() && (self.width == 0 || self.height == 0)
    }
}

/// Outcome of synchronous resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The source resolved without suspending.
    Ready(ResolvedLayer),
    /// The source must be fetched in the background.
    Pending { uri: String },
}

/// Resolve everything that does not need to suspend.
///
/// Pixel buffers are validated against `width * height * 4` and fail with
/// [`ViewerError::DimensionMismatch`](crate::ViewerError::DimensionMismatch)
/// otherwise. References are handed back as [`Resolution::Pending`].
pub fn resolve_now(source: &RasterSource) -> ViewerResult<Resolution> {
    match source {
        RasterSource::Empty => Ok(Resolution::Ready(ResolvedLayer::absent())),
        RasterSource::Blank { width, height } => {
            Ok(Resolution::Ready(ResolvedLayer::blank(*width, *height)))
        }
        RasterSource::Pixels {
            buffer,
            width,
            height,
        } => {
            let surface = Surface::from_rgba(buffer.to_vec(), *width, *height)?;
            Ok(Resolution::Ready(ResolvedLayer::image(surface)))
        }
        RasterSource::Reference { uri } => Ok(Resolution::Pending { uri: uri.clone() }),
    }
}
