//! Undoable square-brush strokes over RGBA surfaces.
//!
//! [`components::history::StrokeCommand`] is the core: it blends a paint
//! color into a surface stamp by stamp, remembers what it overwrote, and can
//! replay (`redo`) or reverse (`undo`) itself.  The rest of the crate is the
//! plumbing around it: a chunked surface, a history stack, a drag tracker,
//! stroke recordings, settings and the headless CLI.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod logger;
pub mod project;
pub mod settings;

pub use canvas::{blend_source_over, CanvasState, Color, DirtyRect, Surface, TiledImage};
pub use components::history::{Command, HistoryManager, StrokeCommand, StrokeError};
pub use components::tools::{StrokeEvent, StrokeTracker};
