use crate::canvas::{CanvasState, Color};
use crate::components::history::{StrokeCommand, StrokeError};
use crate::log_warn;

/// Event emitted when a stroke completes
pub struct StrokeEvent {
    pub command: StrokeCommand,
    /// Every input position passed to `drag_to`, in order.
    pub points: Vec<(i32, i32)>,
    pub description: String,
}

/// Tracks stroke state between pointer-down and pointer-up.
///
/// Consecutive drag positions further than one pixel apart are joined with a
/// line of stamps so quick drags leave no gaps.
#[derive(Default)]
pub struct StrokeTracker {
    is_active: bool,
    command: Option<StrokeCommand>,
    last_pos: Option<(i32, i32)>,
    points: Vec<(i32, i32)>,
    description: String,
}

impl StrokeTracker {
    /// Start a new stroke.  An unfinished previous stroke is abandoned and its
    /// pixels stay painted.
    pub fn begin(
        &mut self,
        canvas: &CanvasState,
        color: Color,
        diameter: i32,
        description: &str,
    ) -> Result<(), StrokeError> {
        let command = StrokeCommand::new(canvas, color, diameter)?;
        if self.is_active {
            log_warn!("StrokeTracker: abandoning unfinished '{}'", self.description);
        }
        self.is_active = true;
        self.command = Some(command);
        self.last_pos = None;
        self.points.clear();
        self.description = description.to_string();
        Ok(())
    }

    /// Move the brush to `(x, y)`, stamping along the way.
    pub fn drag_to(&mut self, canvas: &mut CanvasState, x: i32, y: i32) {
        let Some(command) = self.command.as_mut() else { return };
        self.points.push((x, y));

        match self.last_pos {
            Some((lx, ly)) => stamp_line(command, canvas, (lx, ly), (x, y)),
            None => command.stamp_at(canvas, x, y),
        }

        self.last_pos = Some((x, y));
    }

    /// Whether a stroke is currently in progress.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Positions dragged through so far.
    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    /// End the stroke.  Returns `None` when nothing was painted.
    pub fn finish(&mut self) -> Option<StrokeEvent> {
        if !self.is_active {
            return None;
        }
        let command = self.command.take();
        let points = std::mem::take(&mut self.points);
        let description = std::mem::take(&mut self.description);
        self.reset();

        command
            .filter(|c| !c.is_empty())
            .map(|command| StrokeEvent { command, points, description })
    }

    /// Abort the stroke, restoring every pixel it painted.
    pub fn cancel(&mut self, canvas: &mut CanvasState) {
        if let Some(command) = self.command.take() {
            command.undo(canvas);
        }
        self.points.clear();
        self.description.clear();
        self.reset();
    }

    fn reset(&mut self) {
        self.is_active = false;
        self.command = None;
        self.last_pos = None;
    }
}

/// Stamp every integer step from `from` (exclusive) to `to` (inclusive).
///
/// Consecutive steps whose clipped footprint is identical paint nothing new,
/// so each run of them is stamped once and skipped over by binary search.
/// Every footprint edge is monotonic along the line, which keeps each run
/// contiguous and bounds the number of runs by the canvas size rather than
/// the distance travelled.
fn stamp_line(command: &mut StrokeCommand, canvas: &mut CanvasState, from: (i32, i32), to: (i32, i32)) {
    let dx = to.0 as i64 - from.0 as i64;
    let dy = to.1 as i64 - from.1 as i64;
    let steps = dx.abs().max(dy.abs());
    let point_at = |k: i64| {
        let t = k as f64 / steps as f64;
        (
            (from.0 as f64 + dx as f64 * t).round() as i32,
            (from.1 as f64 + dy as f64 * t).round() as i32,
        )
    };

    let mut k = 1;
    while k <= steps && !command.is_saturated() {
        let (px, py) = point_at(k);
        let footprint = command.footprint(px, py);

        let (mut lo, mut hi) = (k, steps);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            let (mx, my) = point_at(mid);
            if command.footprint(mx, my) == footprint {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }

        command.stamp_at(canvas, px, py);
        k = lo + 1;
    }
}
