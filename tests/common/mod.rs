//! Shared test helpers for integration tests
//!
//! Note: Functions may appear unused because each test file compiles separately.

#![allow(dead_code)]

use brushstroke::{Color, Surface};
use image::{Rgba, RgbaImage};

/// Surface that records every `set_pixel` call in order.
pub struct RecordingSurface {
    pub inner: RgbaImage,
    pub writes: Vec<(u32, u32, Color)>,
}

impl RecordingSurface {
    pub fn new(inner: RgbaImage) -> Self {
        Self { inner, writes: Vec::new() }
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.inner.width()
    }

    fn height(&self) -> u32 {
        self.inner.height()
    }

    fn get_pixel(&self, x: u32, y: u32) -> Color {
        *self.inner.get_pixel(x, y)
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        self.writes.push((x, y, color));
        self.inner.put_pixel(x, y, color);
    }
}

/// Image where every pixel differs, including a band of fully transparent
/// and half-transparent pixels.
pub fn varied_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let a = match y % 3 {
            0 => 0,
            1 => 128,
            _ => 255,
        };
        Rgba([
            (x * 37 % 256) as u8,
            (y * 53 % 256) as u8,
            ((x + y) * 11 % 256) as u8,
            a,
        ])
    })
}

/// Deterministic pseudo-random stamp positions, some off-canvas.
pub fn wandering_points(count: usize, seed: u32, span: i32) -> Vec<(i32, i32)> {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((state >> 16) as i32 % (span + 8)) - 4
    };
    (0..count).map(|_| (next(), next())).collect()
}

/// Count of distinct in-bounds pixels covered by square stamps.
pub fn covered_pixels(points: &[(i32, i32)], diameter: i32, width: u32, height: u32) -> usize {
    let mut covered = std::collections::HashSet::new();
    let radius = diameter / 2;
    for &(cx, cy) in points {
        for i in 0..diameter {
            for j in 0..diameter {
                let x = cx + i - radius;
                let y = cy + j - radius;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    covered.insert((x, y));
                }
            }
        }
    }
    covered.len()
}
