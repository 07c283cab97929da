use std::path::{Path, PathBuf};

use crate::log_warn;

/// Settings that persist across runs
#[derive(Clone, Debug, PartialEq)]
pub struct StrokeSettings {
    /// Maximum number of undo steps
    pub max_undo_steps: usize,
    /// History memory cap in megabytes (0 = unlimited)
    pub max_history_mb: usize,
    /// Brush diameter used when none is given
    pub default_brush_size: i32,
    /// Paint color used when none is given
    pub default_color: [u8; 4],
    /// Write a session log file
    pub log_to_file: bool,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            max_undo_steps: 50,
            max_history_mb: 100,
            default_brush_size: 5,
            default_color: [0, 0, 0, 255],
            log_to_file: true,
        }
    }
}

impl StrokeSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/brushstroke/brushstroke_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\brushstroke\brushstroke_settings.cfg
    /// On macOS:   ~/Library/Application Support/brushstroke/brushstroke_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("brushstroke");
            return Some(config_dir.join("brushstroke_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("brushstroke").join("brushstroke_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("brushstroke")
                    .join("brushstroke_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join("brushstroke_settings.cfg")))
        }
    }

    /// Serialize a color as "r,g,b,a"
    pub fn color_to_str(c: [u8; 4]) -> String {
        format!("{},{},{},{}", c[0], c[1], c[2], c[3])
    }

    /// Parse a color from "r,g,b,a"
    pub fn str_to_color(s: &str) -> Option<[u8; 4]> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some([r, g, b, a])
        } else {
            None
        }
    }

    /// History memory cap in bytes, `None` when unlimited.
    pub fn max_history_bytes(&self) -> Option<usize> {
        (self.max_history_mb > 0).then(|| self.max_history_mb * 1024 * 1024)
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = format!(
            "max_undo_steps={}\n\
             max_history_mb={}\n\
             default_brush_size={}\n\
             default_color={}\n\
             log_to_file={}\n",
            self.max_undo_steps,
            self.max_history_mb,
            self.default_brush_size,
            Self::color_to_str(self.default_color),
            self.log_to_file,
        );
        std::fs::write(path, content)
    }

    /// Load settings from the default location (defaults if missing or corrupt)
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };

        let defaults = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().unwrap_or(defaults.max_undo_steps);
                }
                "max_history_mb" => {
                    s.max_history_mb = val.parse().unwrap_or(defaults.max_history_mb);
                }
                "default_brush_size" => {
                    s.default_brush_size = match val.parse::<i32>() {
                        Ok(v) if v > 0 => v,
                        _ => defaults.default_brush_size,
                    };
                }
                "default_color" => {
                    if let Some(c) = Self::str_to_color(val) { s.default_color = c; }
                }
                "log_to_file" => {
                    s.log_to_file = val == "true";
                }
                _ => log_warn!("Settings: ignoring unknown key '{}' in {}", key, path.display()),
            }
        }
        s
    }
}
