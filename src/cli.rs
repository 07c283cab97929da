// ============================================================================
// brushstroke CLI: paint strokes onto an image without a GUI
// ============================================================================
//
// Usage examples:
//   brushstroke -i photo.png -o out.png --color 255,0,0,128 --size 5 --stroke "10,10 40,12 80,30"
//   brushstroke -i photo.png --stroke "0,0 50,50" --record session.bsr
//   brushstroke -i photo.png --replay "sessions/*.bsr" --history undo,undo,redo
//
// All processing runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{
    draw_stroke, load_image_sync, load_recording, replay_recording, save_image, save_recording,
    RecordingFile, StrokeRecording,
};
use crate::project::Project;
use crate::settings::StrokeSettings;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Headless brush-stroke painter.
///
/// Paint square-brush strokes onto an image, replay recorded strokes, and
/// step through undo/redo before saving.
#[derive(Parser, Debug)]
#[command(
    name = "brushstroke",
    about = "Paint undoable brush strokes onto an image",
    long_about = "Paint square-brush strokes onto an image file, optionally replaying\n\
                  .bsr stroke recordings and stepping through undo/redo before the\n\
                  result is saved. Output format follows the output file extension.\n\n\
                  Example:\n  \
                  brushstroke -i photo.png -o out.png --color 255,0,0,128 --stroke \"10,10 40,12\""
)]
pub struct CliArgs {
    /// Image to paint on.
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output image. Defaults to "<input stem>_out.<ext>" next to the input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Paint color as "r,g,b,a" (0–255 each). Defaults to the saved setting.
    #[arg(short, long, value_name = "R,G,B,A")]
    pub color: Option<String>,

    /// Brush diameter in pixels. Defaults to the saved setting.
    #[arg(short, long, value_name = "PIXELS", allow_negative_numbers = true)]
    pub size: Option<i32>,

    /// One stroke as space-separated "x,y" positions. Repeat for more strokes.
    #[arg(long = "stroke", value_name = "X,Y ...")]
    pub strokes: Vec<String>,

    /// Stroke recording(s) to replay before any --stroke. Glob patterns accepted.
    #[arg(long, value_name = "FILE.bsr", num_args = 1..)]
    pub replay: Vec<String>,

    /// Save the --stroke strokes drawn in this run as a recording.
    #[arg(long, value_name = "FILE.bsr")]
    pub record: Option<PathBuf>,

    /// Undo/redo steps applied after painting, e.g. "undo,undo,redo".
    #[arg(long, value_delimiter = ',', value_name = "STEPS")]
    pub history: Vec<String>,

    /// Print per-step information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// A single undo/redo instruction from `--history`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryStep {
    Undo,
    Redo,
}

impl HistoryStep {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "undo" | "u" => Some(HistoryStep::Undo),
            "redo" | "r" => Some(HistoryStep::Redo),
            _ => None,
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs, settings: &StrokeSettings) -> ExitCode {
    let start = Instant::now();
    match run_project(&args, settings) {
        Ok(output) => {
            if args.verbose {
                println!(
                    "→ {} ({:.0}ms)",
                    output.display(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load, paint, replay history, save.  Returns the path written.
pub fn run_project(args: &CliArgs, settings: &StrokeSettings) -> Result<PathBuf, String> {
    // -- Validate everything before touching the image -------------------
    let color = match &args.color {
        Some(c) => StrokeSettings::str_to_color(c)
            .ok_or_else(|| format!("invalid color '{}', expected r,g,b,a", c))?,
        None => settings.default_color,
    };
    let diameter = args.size.unwrap_or(settings.default_brush_size);
    if diameter <= 0 {
        return Err(format!("brush size must be positive, got {}", diameter));
    }

    let steps = args
        .history
        .iter()
        .map(|s| HistoryStep::parse(s).ok_or_else(|| format!("unknown history step '{}'", s)))
        .collect::<Result<Vec<_>, _>>()?;

    let strokes = args
        .strokes
        .iter()
        .map(|s| {
            parse_points(s).map(|points| StrokeRecording { color, diameter, points })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let output = build_output_path(&args.input, args.output.as_deref())
        .ok_or_else(|| format!("cannot determine output path for '{}'", args.input.display()))?;

    // -- Step 1: Load ----------------------------------------------------
    let canvas = load_image_sync(&args.input)
        .map_err(|e| format!("load failed: {}", e))?;
    let mut project = Project::from_file(args.input.clone(), canvas, settings);
    log_info!(
        "Opened {} ({}×{}) as project {}",
        project.name, project.canvas_state.width, project.canvas_state.height, project.id
    );

    // -- Step 2: Replay recordings ---------------------------------------
    for path in resolve_inputs(&args.replay) {
        let recording = load_recording(&path)
            .map_err(|e| format!("replay '{}' failed: {}", path.display(), e))?;
        let painted = replay_recording(&mut project.canvas_state, &mut project.history, &recording)
            .map_err(|e| format!("replay '{}' failed: {}", path.display(), e))?;
        if painted > 0 {
            project.mark_dirty();
        }
        if args.verbose {
            println!("  replayed {} ({} stroke(s))", path.display(), painted);
        }
    }

    // -- Step 3: New strokes ---------------------------------------------
    for (i, stroke) in strokes.iter().enumerate() {
        let painted = draw_stroke(&mut project.canvas_state, &mut project.history, stroke)
            .map_err(|e| format!("stroke {}: {}", i + 1, e))?;
        if painted {
            project.mark_dirty();
        }
        if args.verbose {
            let state = if painted { "painted" } else { "off canvas" };
            println!("  stroke {} ({} point(s)) {}", i + 1, stroke.points.len(), state);
        }
    }

    // -- Step 4: Undo / redo ---------------------------------------------
    for step in steps {
        let done = match step {
            HistoryStep::Undo => project.undo(),
            HistoryStep::Redo => project.redo(),
        };
        match done {
            Some(desc) if args.verbose => println!("  {:?}: {}", step, desc),
            Some(_) => {}
            None => eprintln!("warning: nothing to {:?}", step),
        }
    }

    // -- Step 5: Save ----------------------------------------------------
    if let Some(path) = &args.record {
        let recording = RecordingFile::new(
            project.canvas_state.width,
            project.canvas_state.height,
            strokes,
        );
        save_recording(&recording, path)
            .map_err(|e| format!("record failed: {}", e))?;
    }

    save_image(&project.canvas_state, &output)
        .map_err(|e| format!("save failed: {}", e))?;
    project.mark_clean();
    log_info!("Saved {} to {}", project.name, output.display());

    Ok(output)
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse "x,y x,y ..." (spaces or semicolons between positions).
pub fn parse_points(s: &str) -> Result<Vec<(i32, i32)>, String> {
    s.split(|c: char| c.is_whitespace() || c == ';')
        .filter(|p| !p.is_empty())
        .map(|p| {
            let (x, y) = p
                .split_once(',')
                .ok_or_else(|| format!("invalid position '{}', expected x,y", p))?;
            let x = x.trim().parse::<i32>().map_err(|_| format!("invalid x in '{}'", p))?;
            let y = y.trim().parse::<i32>().map_err(|_| format!("invalid y in '{}'", p))?;
            Ok((x, y))
        })
        .collect()
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Explicit `--output`, otherwise "<stem>_out.<ext>" beside the input.
fn build_output_path(input: &Path, output: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_out.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_point_lists() {
        assert_eq!(parse_points("1,2 3,4;-5,6"), Ok(vec![(1, 2), (3, 4), (-5, 6)]));
        assert_eq!(parse_points("  "), Ok(vec![]));
        assert!(parse_points("1;2").is_err());
        assert!(parse_points("a,2").is_err());
    }

    #[test]
    fn parses_history_steps() {
        assert_eq!(HistoryStep::parse(" Undo "), Some(HistoryStep::Undo));
        assert_eq!(HistoryStep::parse("r"), Some(HistoryStep::Redo));
        assert_eq!(HistoryStep::parse("again"), None);
    }

    #[test]
    fn default_output_sits_beside_input() {
        assert_eq!(
            build_output_path(Path::new("dir/cat.png"), None),
            Some(PathBuf::from("dir/cat_out.png"))
        );
        assert_eq!(
            build_output_path(Path::new("cat.png"), Some(Path::new("x.bmp"))),
            Some(PathBuf::from("x.bmp"))
        );
    }

    #[test]
    fn clap_accepts_repeated_strokes() {
        let args = CliArgs::parse_from([
            "brushstroke", "-i", "in.png", "--stroke", "1,1 2,2", "--stroke", "3,3",
            "--history", "undo,redo", "-s", "3",
        ]);
        assert_eq!(args.strokes.len(), 2);
        assert_eq!(args.history, vec!["undo", "redo"]);
        assert_eq!(args.size, Some(3));
    }
}
