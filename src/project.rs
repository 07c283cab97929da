use std::path::PathBuf;
use uuid::Uuid;

use crate::canvas::CanvasState;
use crate::components::history::{HistoryManager, StrokeCommand};
use crate::settings::StrokeSettings;

/// Single open document.
pub struct Project {
    pub id: Uuid,
    pub canvas_state: CanvasState,
    pub history: HistoryManager,
    /// `None` for unsaved/untitled files.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name (derived from path or "Untitled-X")
    pub name: String,
}

impl Project {
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32, settings: &StrokeSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            canvas_state: CanvasState::new(width, height),
            history: history_for(settings),
            path: None,
            is_dirty: false,
            name: format!("Untitled-{}", untitled_counter),
        }
    }

    pub fn from_file(path: PathBuf, canvas_state: CanvasState, settings: &StrokeSettings) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            id: Uuid::new_v4(),
            canvas_state,
            history: history_for(settings),
            path: Some(path),
            is_dirty: false,
            name,
        }
    }

    /// Record a stroke that has already been painted onto this canvas.
    pub fn apply_stroke(&mut self, command: StrokeCommand) {
        self.history.push(Box::new(command));
        self.mark_dirty();
    }

    pub fn undo(&mut self) -> Option<String> {
        let done = self.history.undo(&mut self.canvas_state);
        if done.is_some() {
            self.mark_dirty();
        }
        done
    }

    pub fn redo(&mut self) -> Option<String> {
        let done = self.history.redo(&mut self.canvas_state);
        if done.is_some() {
            self.mark_dirty();
        }
        done
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}

fn history_for(settings: &StrokeSettings) -> HistoryManager {
    HistoryManager::new(settings.max_undo_steps).with_memory_limit(settings.max_history_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Surface;
    use image::Rgba;

    #[test]
    fn stroke_undo_redo_tracks_dirty_state() {
        let mut project = Project::new_untitled(1, 6, 6, &StrokeSettings::default());
        assert_eq!(project.display_title(), "Untitled-1");

        let mut cmd = StrokeCommand::new(&project.canvas_state, Rgba([9, 9, 9, 255]), 2).unwrap();
        cmd.stamp_at(&mut project.canvas_state, 3, 3);
        project.apply_stroke(cmd);
        assert_eq!(project.display_title(), "Untitled-1*");

        project.mark_clean();
        assert_eq!(project.undo().as_deref(), Some("Brush Stroke"));
        assert!(project.is_dirty);
        assert_eq!(project.canvas_state.get_pixel(2, 2), Rgba([0, 0, 0, 0]));

        project.mark_clean();
        assert_eq!(project.undo(), None);
        assert!(!project.is_dirty);

        project.redo();
        assert_eq!(project.canvas_state.get_pixel(2, 2), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn name_comes_from_path() {
        let project = Project::from_file(
            PathBuf::from("shots/cat.png"),
            CanvasState::new(2, 2),
            &StrokeSettings::default(),
        );
        assert_eq!(project.name, "cat.png");
        assert_ne!(project.id, Uuid::nil());
    }
}
