//! Single-flight draw coordinator.
//!
//! At most one stroke-rendering worker thread is ever alive: launching a new
//! draw first joins the previous worker, so draws are strictly serialized and
//! the polling loop never blocks on rendering itself.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::agent::strokes::StrokeSet;
use crate::agent::AnswerBox;
use crate::platform::{InputError, PenDevice};
use crate::timing::TimingRegistry;

/// Answers longer than this cannot be drawn legibly in the answering box.
pub const MAX_ANSWER_LEN: usize = 8;

/// Failures at the draw boundary.
#[derive(Debug)]
pub enum DrawError {
    EmptyAnswer,
    TooLong(usize),
    /// The character has no stroke path in the loaded set.
    MissingStroke(char),
    /// No capture has established screen geometry yet.
    ScreenUnknown,
    Input(InputError),
}

impl fmt::Display for DrawError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawError::EmptyAnswer => write!(f, "answer is empty"),
            DrawError::TooLong(len) => {
                write!(f, "answer of {len} characters exceeds the maximum of {MAX_ANSWER_LEN}")
            }
            DrawError::MissingStroke(c) => write!(f, "no stroke path for character '{c}'"),
            DrawError::ScreenUnknown => {
                write!(f, "screen geometry unknown, capture a region first")
            }
            DrawError::Input(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DrawError {}

impl From<InputError> for DrawError {
    fn from(e: InputError) -> Self {
        DrawError::Input(e)
    }
}

/// Serializes answer drawing onto one worker thread at a time.
pub struct DrawCoordinator {
    pen: Arc<Mutex<Box<dyn PenDevice>>>,
    strokes: Arc<StrokeSet>,
    timing: Arc<TimingRegistry>,
    geometry: Arc<Mutex<Option<AnswerBox>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DrawCoordinator {
    pub fn new(
        pen: Box<dyn PenDevice>,
        strokes: Arc<StrokeSet>,
        timing: Arc<TimingRegistry>,
    ) -> Self {
        Self {
            pen: Arc::new(Mutex::new(pen)),
            strokes,
            timing,
            geometry: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
        }
    }

    /// Records the answering box once a capture has confirmed the screen.
    pub fn establish_geometry(&self, answer_box: AnswerBox) {
        if let Ok(mut geometry) = self.geometry.lock() {
            *geometry = Some(answer_box);
        }
    }

    /// True when no draw worker is running.
    pub fn is_idle(&self) -> bool {
        match self.worker.lock() {
            Ok(slot) => slot.as_ref().is_none_or(|handle| handle.is_finished()),
            Err(_) => false,
        }
    }

    /// Launches `answer` on a fresh worker thread, joining the previous one
    /// first so draws never overlap. Returns as soon as the worker is
    /// spawned. A safety trip terminates the process; other errors are
    /// logged, at warn level when `ignore_error` is set and error level
    /// otherwise.
    pub fn async_draw(&self, answer: String, ignore_error: bool) {
        let Ok(mut slot) = self.worker.lock() else {
            return;
        };
        if let Some(previous) = slot.take() {
            let _ = previous.join();
        }

        let pen = Arc::clone(&self.pen);
        let strokes = Arc::clone(&self.strokes);
        let timing = Arc::clone(&self.timing);
        let geometry = Arc::clone(&self.geometry);
        *slot = Some(std::thread::spawn(move || {
            let result = {
                let _scope = timing.scope("draw");
                draw_answer(&pen, &strokes, &geometry, &answer)
            };
            match result {
                Ok(()) => {}
                Err(DrawError::Input(InputError::SafetyTrip)) => {
                    crate::log("Fail-safe tripped during draw, terminating");
                    std::process::exit(1);
                }
                Err(e) if ignore_error => {
                    crate::log(&format!("Warning: draw of {answer:?} failed: {e}"));
                }
                Err(e) => {
                    crate::log(&format!("Error: draw of {answer:?} failed: {e}"));
                }
            }
        }));
    }

    /// Synchronous draw, used directly by tests and available to callers
    /// that want the error back.
    pub fn draw(&self, answer: &str) -> Result<(), DrawError> {
        draw_answer(&self.pen, &self.strokes, &self.geometry, answer)
    }
}

/// Validates the answer and replays each character's stroke path inside its
/// horizontal slice of the answering box.
fn draw_answer(
    pen: &Mutex<Box<dyn PenDevice>>,
    strokes: &StrokeSet,
    geometry: &Mutex<Option<AnswerBox>>,
    answer: &str,
) -> Result<(), DrawError> {
    let chars: Vec<char> = answer.chars().collect();
    if chars.is_empty() {
        return Err(DrawError::EmptyAnswer);
    }
    if chars.len() > MAX_ANSWER_LEN {
        return Err(DrawError::TooLong(chars.len()));
    }
    let answer_box = geometry
        .lock()
        .ok()
        .and_then(|g| *g)
        .ok_or(DrawError::ScreenUnknown)?;

    // Resolve every path before the pen touches the screen, so a missing
    // stroke cannot leave a half-drawn answer.
    let mut paths = Vec::with_capacity(chars.len());
    for &c in &chars {
        paths.push(strokes.get(c).ok_or(DrawError::MissingStroke(c))?);
    }

    let (lt, rb) = (answer_box.left_top, answer_box.right_bottom);
    let height = rb.1 - lt.1;
    let char_width = (rb.0 - lt.0) / chars.len() as i32;

    let Ok(mut pen) = pen.lock() else {
        return Err(DrawError::Input(InputError::Backend(
            "pen backend lock poisoned".into(),
        )));
    };
    let mut cur_x = lt.0;
    for path in paths {
        let mut last = (cur_x, lt.1);
        for (i, &(nx, ny)) in path.iter().enumerate() {
            let x = cur_x + (nx * char_width as f32) as i32;
            let y = lt.1 + (ny * height as f32) as i32;
            if i == 0 {
                pen.pen_down(x, y)?;
            } else {
                pen.pen_move(x, y)?;
            }
            last = (x, y);
        }
        pen.pen_up(last.0, last.1)?;
        cur_x += char_width;
    }
    Ok(())
}
