use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::canvas::CanvasState;
use crate::components::history::{HistoryManager, StrokeError};
use crate::components::tools::StrokeTracker;
use crate::{log_info, log_warn};

// ============================================================================
// STROKE RECORDINGS (.bsr)
// ============================================================================

const BSR_MAGIC_V1: &str = "BSR1";

/// Maximum strokes accepted from a recording file.
const MAX_STROKES: usize = 100_000;
/// Maximum points per recorded stroke.
const MAX_POINTS: usize = 1_000_000;

/// One recorded stroke: brush settings plus the dragged positions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StrokeRecording {
    pub color: [u8; 4],
    pub diameter: i32,
    pub points: Vec<(i32, i32)>,
}

/// Serializable recording file (v1)
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct RecordingFile {
    magic: String,
    pub width: u32,
    pub height: u32,
    pub strokes: Vec<StrokeRecording>,
}

impl RecordingFile {
    pub fn new(width: u32, height: u32, strokes: Vec<StrokeRecording>) -> Self {
        Self {
            magic: BSR_MAGIC_V1.to_string(),
            width,
            height,
            strokes,
        }
    }
}

/// Error type for recording file operations
#[derive(Debug)]
pub enum RecordingError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for RecordingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingError::Io(e) => write!(f, "I/O error: {}", e),
            RecordingError::Serialize(e) => write!(f, "Serialization error: {}", e),
            RecordingError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for RecordingError {}

impl From<std::io::Error> for RecordingError {
    fn from(e: std::io::Error) -> Self {
        RecordingError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for RecordingError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        RecordingError::Serialize(e.to_string())
    }
}

impl From<StrokeError> for RecordingError {
    fn from(e: StrokeError) -> Self {
        RecordingError::InvalidFormat(e.to_string())
    }
}

/// Write a recording file.
pub fn save_recording(recording: &RecordingFile, path: &Path) -> Result<(), RecordingError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, recording)?;
    writer.flush()?;
    log_info!("Saved {} stroke(s) to {}", recording.strokes.len(), path.display());
    Ok(())
}

/// Load and validate a recording file.
pub fn load_recording(path: &Path) -> Result<RecordingFile, RecordingError> {
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(RecordingError::InvalidFormat("File too small".into()));
    }

    // bincode writes a String as an 8-byte length prefix + UTF-8 data,
    // so the 4-char magic sits at bytes 8..12.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != BSR_MAGIC_V1 {
        return Err(RecordingError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let recording: RecordingFile = bincode::deserialize(&raw)?;

    if recording.strokes.len() > MAX_STROKES {
        return Err(RecordingError::InvalidFormat(format!(
            "{} strokes exceeds the limit of {}",
            recording.strokes.len(),
            MAX_STROKES
        )));
    }
    for (i, stroke) in recording.strokes.iter().enumerate() {
        if stroke.diameter <= 0 {
            return Err(RecordingError::InvalidFormat(format!(
                "stroke {} has non-positive diameter {}",
                i, stroke.diameter
            )));
        }
        if stroke.points.len() > MAX_POINTS {
            return Err(RecordingError::InvalidFormat(format!(
                "stroke {} has {} points (limit {})",
                i,
                stroke.points.len(),
                MAX_POINTS
            )));
        }
    }

    log_info!("Loaded {} stroke(s) from {}", recording.strokes.len(), path.display());
    Ok(recording)
}

/// Draw one recorded stroke onto `canvas` and push it to `history`.
/// Returns `false` if the stroke painted nothing.
pub fn draw_stroke(
    canvas: &mut CanvasState,
    history: &mut HistoryManager,
    stroke: &StrokeRecording,
) -> Result<bool, StrokeError> {
    let mut tracker = StrokeTracker::default();
    tracker.begin(canvas, Rgba(stroke.color), stroke.diameter, "Brush Stroke")?;
    for &(x, y) in &stroke.points {
        tracker.drag_to(canvas, x, y);
    }
    match tracker.finish() {
        Some(event) => {
            history.push(Box::new(event.command));
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Replay every stroke of `recording` in order.  Returns how many painted.
pub fn replay_recording(
    canvas: &mut CanvasState,
    history: &mut HistoryManager,
    recording: &RecordingFile,
) -> Result<usize, RecordingError> {
    if recording.width != canvas.width || recording.height != canvas.height {
        log_warn!(
            "Replaying a {}×{} recording onto a {}×{} canvas",
            recording.width, recording.height, canvas.width, canvas.height
        );
    }
    let mut painted = 0;
    for stroke in &recording.strokes {
        if draw_stroke(canvas, history, stroke)? {
            painted += 1;
        }
    }
    Ok(painted)
}

// ============================================================================
// IMAGE LOAD / SAVE (CLI / headless mode)
// ============================================================================

/// Load any format the `image` crate decodes into a [`CanvasState`].
pub fn load_image_sync(path: &Path) -> Result<CanvasState, String> {
    let img = image::open(path).map_err(|e| e.to_string())?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(format!("'{}' has no pixels", path.display()));
    }
    Ok(CanvasState::from_rgba_image(&img))
}

/// Encode the canvas; the format follows the file extension.
pub fn save_image(canvas: &CanvasState, path: &Path) -> Result<(), String> {
    canvas.composite().save(path).map_err(|e| e.to_string())
}
