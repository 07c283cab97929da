use std::collections::{HashSet, VecDeque};
use std::ops::Range;

use crate::canvas::{blend_source_over, CanvasState, Color, DirtyRect, Surface};
use crate::{log_info, log_warn};

// ============================================================================
// COMMAND TRAIT
// ============================================================================

/// Trait for undoable/redoable commands.
pub trait Command: Send + Sync {
    fn undo(&self, canvas: &mut CanvasState);
    fn redo(&self, canvas: &mut CanvasState);
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;
}

// ============================================================================
// STROKE COMMAND - square-brush stroke with per-pixel undo log
// ============================================================================

/// Error raised when a stroke cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrokeError {
    InvalidArgument(String),
}

impl std::fmt::Display for StrokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrokeError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
        }
    }
}

impl std::error::Error for StrokeError {}

/// A pixel the stroke overwrote, with the value it held before.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverwrittenPixel {
    pub x: u32,
    pub y: u32,
    pub color: Color,
}

/// One continuous brush drag.
///
/// `stamp_at` blends the paint color into every pixel of a square footprint
/// the first time the stroke reaches it, recording the pixel's previous
/// value.  Pixels already reached earlier in the same stroke are left alone,
/// so overlapping stamps never darken the paint.
///
/// Replay is asymmetric: `redo` writes the flat paint color to every touched
/// pixel, `undo` restores the recorded originals in reverse touch order.
pub struct StrokeCommand {
    paint_color: Color,
    paint_alpha: f32,
    diameter: i32,
    surface_width: u32,
    surface_height: u32,
    touched: HashSet<(u32, u32)>,
    overwritten: Vec<OverwrittenPixel>,
    bounds: Option<DirtyRect>,
}

impl StrokeCommand {
    /// Start a stroke on `surface`.  Nothing is written until `stamp_at`.
    pub fn new<S: Surface + ?Sized>(
        surface: &S,
        paint_color: Color,
        diameter: i32,
    ) -> Result<Self, StrokeError> {
        if diameter <= 0 {
            log_warn!("StrokeCommand::new: rejected brush diameter {}", diameter);
            return Err(StrokeError::InvalidArgument(format!(
                "brush diameter must be positive, got {}",
                diameter
            )));
        }

        let width = surface.width();
        Ok(Self {
            paint_color,
            paint_alpha: paint_color[3] as f32 / 255.0,
            diameter,
            surface_width: width,
            surface_height: surface.height(),
            touched: HashSet::new(),
            overwritten: Vec::with_capacity(width as usize),
            bounds: None,
        })
    }

    /// Stamp one `diameter × diameter` square roughly centred on
    /// `(center_x, center_y)`.  Even diameters sit one pixel toward the top left.
    pub fn stamp_at<S: Surface + ?Sized>(&mut self, surface: &mut S, center_x: i32, center_y: i32) {
        if self.is_saturated() {
            return;
        }
        let (xs, ys) = self.footprint(center_x, center_y);
        for x in xs {
            for y in ys.clone() {
                self.paint_pixel(surface, x, y);
            }
        }
    }

    /// Columns and rows a stamp at `(center_x, center_y)` covers, clipped to
    /// the surface.  Both ranges grow monotonically with the centre, and an
    /// off-surface stamp yields an empty range pinned to the nearest edge.
    pub fn footprint(&self, center_x: i32, center_y: i32) -> (Range<u32>, Range<u32>) {
        (
            clip_span(center_x, self.diameter, self.surface_width),
            clip_span(center_y, self.diameter, self.surface_height),
        )
    }

    /// True once every pixel of the surface has been touched.
    pub fn is_saturated(&self) -> bool {
        self.touched.len() as u64 >= self.surface_width as u64 * self.surface_height as u64
    }

    fn paint_pixel<S: Surface + ?Sized>(&mut self, surface: &mut S, x: u32, y: u32) {
        if !self.touched.insert((x, y)) {
            return;
        }

        let old = surface.get_pixel(x, y);
        let new = blend_source_over(self.paint_color, old);
        self.overwritten.push(OverwrittenPixel { x, y, color: old });
        self.bounds = Some(match self.bounds {
            Some(b) => b.include(x, y),
            None => DirtyRect::pixel(x, y),
        });
        surface.set_pixel(x, y, new);
    }

    /// Paint every touched pixel with the flat paint color.
    pub fn redo<S: Surface + ?Sized>(&self, surface: &mut S) {
        for px in &self.overwritten {
            surface.set_pixel(px.x, px.y, self.paint_color);
        }
    }

    /// Restore every touched pixel, last-touched first.
    pub fn undo<S: Surface + ?Sized>(&self, surface: &mut S) {
        for px in self.overwritten.iter().rev() {
            surface.set_pixel(px.x, px.y, px.color);
        }
    }

    pub fn paint_color(&self) -> Color {
        self.paint_color
    }

    /// Paint alpha as a fraction in `0.0..=1.0`.
    pub fn paint_alpha(&self) -> f32 {
        self.paint_alpha
    }

    pub fn diameter(&self) -> i32 {
        self.diameter
    }

    pub fn touched_count(&self) -> usize {
        self.touched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    pub fn is_touched(&self, x: u32, y: u32) -> bool {
        self.touched.contains(&(x, y))
    }

    /// Original values in the order they were first touched.
    pub fn overwritten(&self) -> &[OverwrittenPixel] {
        &self.overwritten
    }

    /// Bounding rect of every touched pixel.
    pub fn bounds(&self) -> Option<DirtyRect> {
        self.bounds
    }
}

/// `[center - diameter/2, center - diameter/2 + diameter)` clamped to `0..limit`.
fn clip_span(center: i32, diameter: i32, limit: u32) -> Range<u32> {
    let start = center as i64 - (diameter / 2) as i64;
    let end = start + diameter as i64;
    start.clamp(0, limit as i64) as u32..end.clamp(0, limit as i64) as u32
}

impl Command for StrokeCommand {
    fn undo(&self, canvas: &mut CanvasState) {
        StrokeCommand::undo(self, canvas);
        log_info!("Undo brush stroke: restored {} pixels", self.overwritten.len());
    }

    fn redo(&self, canvas: &mut CanvasState) {
        StrokeCommand::redo(self, canvas);
        log_info!("Redo brush stroke: repainted {} pixels", self.overwritten.len());
    }

    fn description(&self) -> String {
        "Brush Stroke".to_string()
    }

    fn memory_size(&self) -> usize {
        // Log entry plus its hash-set key
        self.overwritten.len()
            * (std::mem::size_of::<OverwrittenPixel>() + std::mem::size_of::<(u32, u32)>())
    }
}

// ============================================================================
// HISTORY MANAGER - Manages undo/redo stacks with memory limits
// ============================================================================

/// Undo/redo history manager with memory limits.
pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size,
            max_memory_bytes: Some(100 * 1024 * 1024), // 100 MB default limit
            total_memory: 0,
        }
    }

    pub fn with_memory_limit(mut self, max_memory_bytes: Option<usize>) -> Self {
        self.max_memory_bytes = max_memory_bytes;
        self
    }

    pub fn push(&mut self, command: Box<dyn Command>) {
        // A new action invalidates everything that was undone
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);

        self.prune();
    }

    pub fn undo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        let command = self.undo_stack.pop_back()?;
        let description = command.description();
        command.undo(canvas);
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, canvas: &mut CanvasState) -> Option<String> {
        let command = self.redo_stack.pop_back()?;
        let description = command.description();
        command.redo(canvas);
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get all undo descriptions (most recent first)
    pub fn undo_history(&self) -> Vec<String> {
        self.undo_stack.iter().rev().map(|c| c.description()).collect()
    }

    /// Current memory usage of the history (O(1) via cached total)
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    fn prune(&mut self) {
        let mut dropped = 0usize;

        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                dropped += 1;
            }
        }

        // Never drop the most recent command for the memory cap
        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            log_info!("History: pruned {} oldest command(s), {} bytes retained", dropped, self.total_memory);
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Undo `count` steps, stopping early when the undo stack runs out.
    pub fn undo_to(&mut self, count: usize, canvas: &mut CanvasState) {
        for _ in 0..count {
            if self.undo(canvas).is_none() {
                break;
            }
        }
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}
