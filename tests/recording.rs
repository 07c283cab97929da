//! Stroke recordings: file format, validation and replay.

mod common;

use brushstroke::io::{
    draw_stroke, load_recording, replay_recording, save_recording, RecordingError, RecordingFile,
    StrokeRecording,
};
use brushstroke::{CanvasState, HistoryManager};
use common::wandering_points;
use image::Rgba;

fn sample_strokes() -> Vec<StrokeRecording> {
    vec![
        StrokeRecording { color: [255, 0, 0, 128], diameter: 3, points: wandering_points(20, 1, 30) },
        StrokeRecording { color: [0, 90, 255, 255], diameter: 6, points: vec![(2, 2), (25, 20)] },
    ]
}

#[test]
fn test_saved_recording_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.bsr");
    let recording = RecordingFile::new(30, 30, sample_strokes());

    save_recording(&recording, &path).unwrap();
    assert_eq!(load_recording(&path).unwrap(), recording);
}

#[test]
fn test_rejects_foreign_files() {
    let dir = tempfile::tempdir().unwrap();

    let tiny = dir.path().join("tiny.bsr");
    std::fs::write(&tiny, b"BSR1").unwrap();
    assert!(matches!(load_recording(&tiny), Err(RecordingError::InvalidFormat(_))));

    let png = dir.path().join("not_a_recording.bsr");
    image::RgbaImage::new(4, 4).save_with_format(&png, image::ImageFormat::Png).unwrap();
    assert!(matches!(load_recording(&png), Err(RecordingError::InvalidFormat(_))));

    let missing = dir.path().join("missing.bsr");
    assert!(matches!(load_recording(&missing), Err(RecordingError::Io(_))));
}

#[test]
fn test_rejects_truncated_body() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.bsr");
    save_recording(&RecordingFile::new(30, 30, sample_strokes()), &path).unwrap();

    let raw = std::fs::read(&path).unwrap();
    std::fs::write(&path, &raw[..raw.len() / 2]).unwrap();
    assert!(matches!(load_recording(&path), Err(RecordingError::Serialize(_))));
}

#[test]
fn test_rejects_non_positive_diameter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.bsr");
    let strokes = vec![StrokeRecording { color: [0, 0, 0, 255], diameter: 0, points: vec![(1, 1)] }];
    save_recording(&RecordingFile::new(8, 8, strokes), &path).unwrap();

    let err = load_recording(&path).unwrap_err();
    assert!(err.to_string().contains("non-positive diameter"), "{}", err);
}

#[test]
fn test_replay_matches_drawing_directly_and_undoes_cleanly() {
    let base = CanvasState::new_filled(30, 30, Rgba([20, 40, 60, 255]));

    let mut direct = base.clone();
    let mut direct_history = HistoryManager::default();
    for stroke in sample_strokes() {
        assert!(draw_stroke(&mut direct, &mut direct_history, &stroke).unwrap());
    }

    let mut replayed = base.clone();
    let mut history = HistoryManager::default();
    let painted =
        replay_recording(&mut replayed, &mut history, &RecordingFile::new(30, 30, sample_strokes()))
            .unwrap();
    assert_eq!(painted, 2);
    assert_eq!(replayed.composite(), direct.composite());
    assert_eq!(history.undo_count(), 2);

    history.undo_to(2, &mut replayed);
    assert_eq!(replayed.composite(), base.composite());
}

#[test]
fn test_off_canvas_stroke_is_not_pushed() {
    let mut canvas = CanvasState::new(10, 10);
    let mut history = HistoryManager::default();
    let stroke = StrokeRecording { color: [1, 2, 3, 255], diameter: 2, points: vec![(-50, -50)] };
    assert!(!draw_stroke(&mut canvas, &mut history, &stroke).unwrap());
    assert!(!history.can_undo());
}

#[cfg(target_os = "linux")]
#[test]
fn test_save_reports_failed_flush() {
    // /dev/full accepts the open and fails every write with ENOSPC
    let recording = RecordingFile::new(30, 30, sample_strokes());
    let result = save_recording(&recording, std::path::Path::new("/dev/full"));
    assert!(matches!(result, Err(RecordingError::Io(_))), "{:?}", result.err());
}

#[test]
fn test_huge_brush_and_distant_points_finish_on_small_canvas() {
    let mut canvas = CanvasState::new(4, 4);
    let mut history = HistoryManager::default();
    let strokes = vec![
        StrokeRecording { color: [0, 0, 0, 255], diameter: 3, points: vec![(0, 0), (300_000_000, 0)] },
        StrokeRecording {
            color: [255, 0, 0, 255],
            diameter: i32::MAX,
            points: vec![(i32::MIN, i32::MAX), (i32::MAX, i32::MIN), (2, 2)],
        },
    ];

    let painted = replay_recording(&mut canvas, &mut history, &RecordingFile::new(4, 4, strokes)).unwrap();
    assert_eq!(painted, 2);
    assert!(canvas.composite().pixels().all(|p| *p == Rgba([255, 0, 0, 255])));

    history.undo(&mut canvas);
    let img = canvas.composite();
    assert_eq!(*img.get_pixel(3, 1), Rgba([0, 0, 0, 255]));
    assert_eq!(*img.get_pixel(3, 2), Rgba([0, 0, 0, 0]));
}
