use std::sync::Arc;
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::log_warn;

/// An 8-bit straight-alpha RGBA value.
pub type Color = Rgba<u8>;

// ============================================================================
// SURFACE - the pixel buffer a stroke paints into
// ============================================================================

/// Mutable 2D pixel buffer addressed by `(x, y)` with `x < width`, `y < height`.
///
/// Implementations must tolerate `set_pixel` being called only with in-range
/// coordinates; callers are expected to bounds-check first.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn get_pixel(&self, x: u32, y: u32) -> Color;
    fn set_pixel(&mut self, x: u32, y: u32, color: Color);
}

impl Surface for RgbaImage {
    fn width(&self) -> u32 {
        image::ImageBuffer::width(self)
    }

    fn height(&self) -> u32 {
        image::ImageBuffer::height(self)
    }

    fn get_pixel(&self, x: u32, y: u32) -> Color {
        *image::ImageBuffer::get_pixel(self, x, y)
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x < Surface::width(self) && y < Surface::height(self) {
            self.put_pixel(x, y, color);
        }
    }
}

// ============================================================================
// COMPOSITING
// ============================================================================

/// Composite `paint` over `base` using straight-alpha source-over.
///
/// ```text
/// outA = srcA + destA * (1 - srcA)
/// out  = (src * srcA + dest * destA * (1 - srcA)) / outA
/// ```
///
/// Every channel is rounded half away from zero (`f32::round`) and clamped to
/// `0..=255`. When both inputs are fully transparent the result is
/// `[0, 0, 0, 0]` instead of a division by zero.
pub fn blend_source_over(paint: Color, base: Color) -> Color {
    let src_a = paint[3] as f32 / 255.0;
    let dest_a = base[3] as f32 / 255.0;
    let out_a = src_a + dest_a * (1.0 - src_a);

    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |src: u8, dest: u8| -> u8 {
        let v = (src as f32 * src_a + dest as f32 * dest_a * (1.0 - src_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(paint[0], base[0]),
        channel(paint[1], base[1]),
        channel(paint[2], base[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// DIRTY RECT - integer pixel bounds, max is exclusive
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl DirtyRect {
    /// A rect covering exactly one pixel.
    pub fn pixel(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x + 1, max_y: y + 1 }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self { min_x: 0, min_y: 0, max_x: width, max_y: height }
    }

    pub fn union(self, other: DirtyRect) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow to cover pixel `(x, y)`.
    pub fn include(self, x: u32, y: u32) -> Self {
        self.union(Self::pixel(x, y))
    }

    pub fn width(&self) -> u32 { self.max_x.saturating_sub(self.min_x) }

    pub fn height(&self) -> u32 { self.max_y.saturating_sub(self.min_y) }
}

// ============================================================================
// TILED IMAGE – sparse 64×64 chunk storage (Vec-indexed for speed)
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// A pixel with zero alpha, returned by reference for missing chunks.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Largest surface accepted by [`TiledImage::new`] (pixels).
const MAX_PIXELS: u64 = 256_000_000;

/// Sparse tiled image backed by a flat `Vec<Option<Arc<RgbaImage>>>`.
/// Chunk coordinates are mapped to a flat index via `cy * chunks_per_row + cx`,
/// giving O(1) access with zero hashing overhead.
///
/// Chunks are wrapped in `Arc` for copy-on-write semantics: `clone()` only
/// bumps reference counts, and mutations via `put_pixel` use `Arc::make_mut`
/// to COW-clone only the touched chunk.
#[derive(Clone)]
pub struct TiledImage {
    pub width: u32,
    pub height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl TiledImage {
    // ---- construction -------------------------------------------------------

    /// Create an empty (fully transparent) tiled image.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = {
            let total = (width as u64) * (height as u64);
            if total > MAX_PIXELS || width == 0 || height == 0 {
                log_warn!("TiledImage::new: dimensions {}×{} out of range, clamped to 1×1", width, height);
                (1, 1)
            } else {
                (width, height)
            }
        };
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        let total = (chunks_per_row * chunks_per_col) as usize;
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; total],
        }
    }

    /// Fill the entire image with `color`.  A transparent fill costs nothing.
    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut img = Self::new(width, height);
        if color[3] > 0 {
            img.fill(color);
        }
        img
    }

    /// Import from a flat `RgbaImage`.  Only non-transparent chunks are stored.
    /// Chunk conversion is parallelised with rayon for faster import of large images.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let width = src.width();
        let height = src.height();
        let mut img = Self::new(width, height);
        if img.width != width || img.height != height {
            return img;
        }

        let chunks_x = img.chunks_per_row as usize;
        let chunks_y = height.div_ceil(CHUNK_SIZE) as usize;
        let total_chunks = chunks_x * chunks_y;
        let src_raw = src.as_raw();

        let chunk_results: Vec<(usize, Option<Arc<RgbaImage>>)> = (0..total_chunks)
            .into_par_iter()
            .map(|flat| {
                let cx = (flat % chunks_x) as u32;
                let cy = (flat / chunks_x) as u32;
                let base_x = cx * CHUNK_SIZE;
                let base_y = cy * CHUNK_SIZE;

                let cw = CHUNK_SIZE.min(width - base_x);
                let ch = CHUNK_SIZE.min(height - base_y);
                let chunk_stride = CHUNK_SIZE as usize * 4;
                let mut chunk_data = vec![0u8; chunk_stride * CHUNK_SIZE as usize];
                let mut has_content = false;

                for ly in 0..ch {
                    let src_start = ((base_y + ly) * width + base_x) as usize * 4;
                    let dst_start = ly as usize * chunk_stride;
                    let byte_len = cw as usize * 4;
                    chunk_data[dst_start..dst_start + byte_len]
                        .copy_from_slice(&src_raw[src_start..src_start + byte_len]);

                    if !has_content {
                        has_content = chunk_data[dst_start..dst_start + byte_len]
                            .chunks_exact(4)
                            .any(|px| px[3] != 0);
                    }
                }

                if has_content {
                    let chunk = RgbaImage::from_raw(CHUNK_SIZE, CHUNK_SIZE, chunk_data).map(Arc::new);
                    (flat, chunk)
                } else {
                    (flat, None)
                }
            })
            .collect();

        for (idx, chunk) in chunk_results {
            img.chunks[idx] = chunk;
        }
        img
    }

    /// Flatten back to a contiguous `RgbaImage`.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        let out_stride = self.width as usize * 4;
        let out_raw: &mut [u8] = &mut out;
        for (idx, slot) in self.chunks.iter().enumerate() {
            let Some(chunk) = slot else { continue };
            let cx = idx as u32 % self.chunks_per_row;
            let cy = idx as u32 / self.chunks_per_row;
            let base_x = cx * CHUNK_SIZE;
            let base_y = cy * CHUNK_SIZE;
            let cw = (CHUNK_SIZE.min(self.width.saturating_sub(base_x))) as usize;
            let ch = CHUNK_SIZE.min(self.height.saturating_sub(base_y));
            let chunk_raw = chunk.as_raw();
            let chunk_stride = CHUNK_SIZE as usize * 4;
            for ly in 0..ch as usize {
                let src_start = ly * chunk_stride;
                let dst_start = (base_y as usize + ly) * out_stride + base_x as usize * 4;
                out_raw[dst_start..dst_start + cw * 4]
                    .copy_from_slice(&chunk_raw[src_start..src_start + cw * 4]);
            }
        }
        out
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.chunks_per_row + cx) as usize
    }

    #[inline(always)]
    fn chunk_coord(x: u32, y: u32) -> (u32, u32) { (x / CHUNK_SIZE, y / CHUNK_SIZE) }

    #[inline(always)]
    fn local(x: u32, y: u32) -> (u32, u32) { (x % CHUNK_SIZE, y % CHUNK_SIZE) }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel (returns `&TRANSPARENT_PIXEL` for missing chunks).
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        if x >= self.width || y >= self.height { return &TRANSPARENT_PIXEL; }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        self.chunks[idx].as_ref()
            .map(|c| c.get_pixel(lx, ly))
            .unwrap_or(&TRANSPARENT_PIXEL)
    }

    /// Write a pixel (creates the chunk on demand, COW-clones if shared).
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height { return; }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
    }

    /// Number of populated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    // ---- bulk operations ----------------------------------------------------

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for slot in &mut self.chunks {
            let arc = slot.get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
            let chunk = Arc::make_mut(arc);
            for pixel in chunk.pixels_mut() {
                *pixel = color;
            }
        }
    }

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    /// Approximate memory usage in bytes.
    /// Chunks shared with a clone are counted at pointer cost only.
    pub fn memory_bytes(&self) -> usize {
        let chunk_byte_size = (CHUNK_SIZE * CHUNK_SIZE * 4) as usize;
        self.chunks.iter()
            .filter_map(|c| c.as_ref())
            .map(|arc| {
                if Arc::strong_count(arc) == 1 {
                    chunk_byte_size
                } else {
                    std::mem::size_of::<usize>() * 2
                }
            })
            .sum()
    }
}

impl Surface for TiledImage {
    fn width(&self) -> u32 { self.width }

    fn height(&self) -> u32 { self.height }

    fn get_pixel(&self, x: u32, y: u32) -> Color {
        *TiledImage::get_pixel(self, x, y)
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        self.put_pixel(x, y, color);
    }
}

// ============================================================================
// CANVAS STATE - one surface plus dirty tracking for the renderer / CLI
// ============================================================================

#[derive(Clone)]
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub pixels: TiledImage,
    /// Union of everything written since the last `take_dirty`.
    pub dirty_rect: Option<DirtyRect>,
    /// Bumped on every `mark_dirty`; lets observers detect changes cheaply.
    pub dirty_generation: u64,
}

impl CanvasState {
    /// Transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_tiled(TiledImage::new(width, height))
    }

    pub fn new_filled(width: u32, height: u32, color: Color) -> Self {
        Self::from_tiled(TiledImage::new_filled(width, height, color))
    }

    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        Self::from_tiled(TiledImage::from_rgba_image(img))
    }

    fn from_tiled(pixels: TiledImage) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
            dirty_rect: None,
            dirty_generation: 0,
        }
    }

    /// Merge `rect` (or the whole canvas for `None`) into the pending dirty region.
    pub fn mark_dirty(&mut self, rect: Option<DirtyRect>) {
        let new_rect = rect.unwrap_or(DirtyRect::full(self.width, self.height));
        self.dirty_rect = Some(match self.dirty_rect {
            Some(existing) => existing.union(new_rect),
            None => new_rect,
        });
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    /// Return and reset the pending dirty region.
    pub fn take_dirty(&mut self) -> Option<DirtyRect> {
        self.dirty_rect.take()
    }

    /// Flatten to a contiguous image for export.
    pub fn composite(&self) -> RgbaImage {
        self.pixels.to_rgba_image()
    }
}

impl Surface for CanvasState {
    fn width(&self) -> u32 { self.width }

    fn height(&self) -> u32 { self.height }

    fn get_pixel(&self, x: u32, y: u32) -> Color {
        *self.pixels.get_pixel(x, y)
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        self.pixels.put_pixel(x, y, color);
        self.mark_dirty(Some(DirtyRect::pixel(x, y)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_half_red_over_opaque_blue() {
        let out = blend_source_over(Rgba([255, 0, 0, 128]), Rgba([0, 0, 255, 255]));
        assert_eq!(out, Rgba([128, 0, 127, 255]));
    }

    #[test]
    fn blend_both_transparent_is_zero() {
        let out = blend_source_over(Rgba([200, 100, 50, 0]), Rgba([10, 20, 30, 0]));
        assert_eq!(out, Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn blend_opaque_paint_replaces_base() {
        let paint = Rgba([12, 34, 56, 255]);
        assert_eq!(blend_source_over(paint, Rgba([200, 200, 200, 90])), paint);
        assert_eq!(blend_source_over(paint, Rgba([0, 0, 0, 0])), paint);
    }

    #[test]
    fn blend_invisible_paint_keeps_base() {
        let base = Rgba([90, 180, 45, 200]);
        assert_eq!(blend_source_over(Rgba([255, 255, 255, 0]), base), base);
    }

    #[test]
    fn blend_over_transparent_keeps_paint_rgb() {
        let out = blend_source_over(Rgba([40, 80, 120, 100]), Rgba([255, 255, 255, 0]));
        assert_eq!(out, Rgba([40, 80, 120, 100]));
    }

    #[test]
    fn tiled_image_reads_transparent_for_missing_chunks() {
        let img = TiledImage::new(200, 100);
        assert_eq!(*img.get_pixel(150, 99), Rgba([0, 0, 0, 0]));
        assert_eq!(img.chunk_count(), 0);
    }

    #[test]
    fn tiled_image_ignores_out_of_range_writes() {
        let mut img = TiledImage::new(10, 10);
        img.put_pixel(10, 0, Rgba([1, 2, 3, 4]));
        img.put_pixel(0, 10, Rgba([1, 2, 3, 4]));
        assert_eq!(img.chunk_count(), 0);
    }

    #[test]
    fn tiled_image_matches_flat_image() {
        let mut flat = RgbaImage::new(130, 70);
        flat.put_pixel(0, 0, Rgba([1, 2, 3, 255]));
        flat.put_pixel(129, 69, Rgba([4, 5, 6, 7]));
        flat.put_pixel(64, 64, Rgba([8, 9, 10, 11]));

        let tiled = TiledImage::from_rgba_image(&flat);
        assert_eq!(*tiled.get_pixel(129, 69), Rgba([4, 5, 6, 7]));
        assert_eq!(tiled.chunk_count(), 3);
        assert_eq!(tiled.to_rgba_image(), flat);
    }

    #[test]
    fn clone_shares_chunks_until_written() {
        let mut a = TiledImage::new_filled(64, 64, Rgba([9, 9, 9, 255]));
        let b = a.clone();
        assert!(a.memory_bytes() < (CHUNK_SIZE * CHUNK_SIZE * 4) as usize);
        a.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        assert_eq!(*b.get_pixel(0, 0), Rgba([9, 9, 9, 255]));
        assert_eq!(a.memory_bytes(), (CHUNK_SIZE * CHUNK_SIZE * 4) as usize);
    }

    #[test]
    fn canvas_set_pixel_tracks_dirty_region() {
        let mut canvas = CanvasState::new(20, 20);
        canvas.set_pixel(3, 4, Rgba([1, 1, 1, 255]));
        canvas.set_pixel(10, 2, Rgba([1, 1, 1, 255]));
        canvas.set_pixel(25, 2, Rgba([1, 1, 1, 255]));
        assert_eq!(
            canvas.take_dirty(),
            Some(DirtyRect { min_x: 3, min_y: 2, max_x: 11, max_y: 5 })
        );
        assert_eq!(canvas.take_dirty(), None);
        assert_eq!(canvas.dirty_generation, 2);
    }
}
