//! Per-tick state machine of the polling loop.
//!
//! Each tick flows one way: capture → brightness gate → recognize → solve →
//! dedup → draw/report. The dedup cache and the draw coordinator are the
//! only state that survives between ticks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::DynamicImage;

use crate::agent::draw::DrawCoordinator;
use crate::agent::{PenAgent, RegionStats, REGION_NEXT_QUESTION, REGION_THIS_QUESTION};
use crate::autoplay::cache::{LookaheadCache, TimeGateCache};
use crate::autoplay::config::{AppConfig, CachePolicy};
use crate::autoplay::runner;
use crate::recognizer::Recognizer;
use crate::solver;
use crate::timing::TimingRegistry;

/// Where the loop currently is within a tick, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayPhase {
    Idle,
    Capturing,
    Suppressed,
    Recognizing,
    Solved,
    Drawing,
}

impl std::fmt::Display for AutoplayPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutoplayPhase::Idle => write!(f, "idle"),
            AutoplayPhase::Capturing => write!(f, "capturing"),
            AutoplayPhase::Suppressed => write!(f, "suppressed"),
            AutoplayPhase::Recognizing => write!(f, "recognizing"),
            AutoplayPhase::Solved => write!(f, "solved"),
            AutoplayPhase::Drawing => write!(f, "drawing"),
        }
    }
}

/// What a tick did, so the runner knows whether to pause after a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Quiet,
    Drew,
}

/// A recognized question together with its solved, rendered answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionPair {
    pub question: String,
    pub answer: String,
}

enum Policy {
    Single(TimeGateCache<String>),
    Lookahead(LookaheadCache<QuestionPair>),
}

/// The question string minus its final glyph. The trailing unknown mark
/// repaints while an answer is being drawn, so it must not defeat dedup.
fn dedup_key(question: &str) -> String {
    let mut chars: Vec<char> = question.chars().collect();
    chars.pop();
    chars.into_iter().collect()
}

fn pair_key(pair: &QuestionPair) -> String {
    dedup_key(&pair.question)
}

/// Indicator text for a released pair, naming the queued look-ahead
/// question when one is waiting.
fn status_line(pair: &QuestionPair, next: Option<&QuestionPair>) -> String {
    match next {
        Some(n) => format!("{}\n{} (next: {})", pair.question, pair.answer, n.question),
        None => format!("{}\n{}", pair.question, pair.answer),
    }
}

/// Owns one tick's worth of pipeline plus the cross-tick state.
pub struct Autoplayer {
    agent: PenAgent,
    recognizer: Recognizer,
    coordinator: DrawCoordinator,
    policy: Policy,
    forbid_fractional: bool,
    bright_mean_above: f32,
    ink_min_below: u8,
    dark_release_below: u8,
    timing: Arc<TimingRegistry>,
    phase: AutoplayPhase,
}

impl Autoplayer {
    pub fn new(
        agent: PenAgent,
        recognizer: Recognizer,
        coordinator: DrawCoordinator,
        config: &AppConfig,
        timing: Arc<TimingRegistry>,
    ) -> Self {
        let expire = Duration::from_secs_f32(config.expire_secs);
        let policy = match config.cache_policy {
            CachePolicy::Single => Policy::Single(TimeGateCache::new(expire)),
            CachePolicy::Lookahead => Policy::Lookahead(LookaheadCache::new(expire, pair_key)),
        };
        Self {
            agent,
            recognizer,
            coordinator,
            policy,
            forbid_fractional: config.forbid_fractional,
            bright_mean_above: config.bright_mean_above,
            ink_min_below: config.ink_min_below,
            dark_release_below: config.dark_release_below,
            timing,
            phase: AutoplayPhase::Idle,
        }
    }

    pub fn phase(&self) -> AutoplayPhase {
        self.phase
    }

    /// Runs one tick of the loop. Errors propagate to the runner, which
    /// logs them and keeps polling.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        let single = matches!(self.policy, Policy::Single(_));

        // The single-slot deployment recognizes only between draws; the
        // lookahead deployment keeps recognizing while a draw runs.
        if single && !self.coordinator.is_idle() {
            self.phase = AutoplayPhase::Drawing;
            return Ok(TickOutcome::Quiet);
        }

        self.phase = AutoplayPhase::Capturing;
        let image = {
            let _scope = self.timing.scope("capture");
            self.agent.capture_region(Some(REGION_THIS_QUESTION))?
        };
        if let Some(answer_box) = self.agent.answer_box() {
            self.coordinator.establish_geometry(answer_box);
        }
        let stats = RegionStats::of(&image.to_luma8());
        let gate_open = stats.mean > self.bright_mean_above && stats.min < self.ink_min_below;

        if single {
            self.tick_single(&image, gate_open)
        } else {
            self.tick_lookahead(&image, stats, gate_open)
        }
    }

    fn tick_single(&mut self, image: &DynamicImage, gate_open: bool) -> Result<TickOutcome> {
        if !gate_open {
            self.phase = AutoplayPhase::Suppressed;
            return Ok(TickOutcome::Quiet);
        }

        self.phase = AutoplayPhase::Recognizing;
        let Some(question) = self.recognize_line(image)? else {
            return Ok(TickOutcome::Quiet);
        };

        let Policy::Single(cache) = &mut self.policy else {
            unreachable!("single tick with lookahead policy");
        };
        if !cache.update(dedup_key(&question)) {
            self.phase = AutoplayPhase::Suppressed;
            return Ok(TickOutcome::Quiet);
        }

        self.phase = AutoplayPhase::Solved;
        let answer = match solve_rendered(&question, self.forbid_fractional) {
            Ok(answer) => answer,
            Err(e) => {
                crate::log(&format!("Warning: cannot solve {question:?}: {e}"));
                return Ok(TickOutcome::Quiet);
            }
        };

        crate::log(&format!("Question: {question} (answer: {answer})"));
        runner::set_status_text(&format!("{question}\n{answer}"));
        self.phase = AutoplayPhase::Drawing;
        self.coordinator.async_draw(answer, true);
        Ok(TickOutcome::Drew)
    }

    fn tick_lookahead(
        &mut self,
        image: &DynamicImage,
        stats: RegionStats,
        gate_open: bool,
    ) -> Result<TickOutcome> {
        if gate_open {
            self.phase = AutoplayPhase::Recognizing;
            if let Some(question) = self.recognize_line(image)? {
                // A misread that does not solve must not poison the queue.
                match solve_rendered(&question, self.forbid_fractional) {
                    Ok(answer) => {
                        self.phase = AutoplayPhase::Solved;
                        let next = self.recognize_next_pair();
                        let Policy::Lookahead(cache) = &mut self.policy else {
                            unreachable!("lookahead tick with single policy");
                        };
                        cache.update(QuestionPair { question, answer }, next);
                    }
                    Err(e) => {
                        crate::log(&format!("Warning: cannot solve {question:?}: {e}"));
                    }
                }
            }
        } else {
            self.phase = AutoplayPhase::Suppressed;
        }

        let Policy::Lookahead(cache) = &mut self.policy else {
            unreachable!("lookahead tick with single policy");
        };
        let ready = self.coordinator.is_idle()
            && (cache.is_expired() || stats.min < self.dark_release_below);
        if ready {
            if let Some(pair) = cache.pop() {
                crate::log(&format!(
                    "Question: {} (answer: {})",
                    pair.question, pair.answer
                ));
                runner::set_status_text(&status_line(&pair, cache.peek_next()));
                self.phase = AutoplayPhase::Drawing;
                self.coordinator.async_draw(pair.answer, true);
                return Ok(TickOutcome::Drew);
            }
        }
        Ok(TickOutcome::Quiet)
    }

    /// Captures and solves the look-ahead question; failures only cost the
    /// look-ahead, never the tick.
    fn recognize_next_pair(&mut self) -> Option<QuestionPair> {
        let image = self
            .agent
            .capture_region(Some(REGION_NEXT_QUESTION))
            .ok()?;
        let question = self.recognize_line(&image).ok().flatten()?;
        let answer = solve_rendered(&question, self.forbid_fractional).ok()?;
        Some(QuestionPair { question, answer })
    }

    /// First recognized line of the region, if any.
    fn recognize_line(&self, image: &DynamicImage) -> Result<Option<String>> {
        let _scope = self.timing.scope("recognize");
        let mut lines = self.recognizer.recognize(image)?;
        if lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(lines.swap_remove(0)))
        }
    }
}

fn solve_rendered(question: &str, forbid_fractional: bool) -> Result<String, solver::SolveError> {
    solver::solve(question)?.render(forbid_fractional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::strokes::StrokeSet;
    use crate::platform::{InputError, PenDevice, ScreenGrab};
    use crate::recognizer::segment;
    use crate::recognizer::template::TemplateSet;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use image::{GrayImage, Luma, Rgba, RgbaImage};

    struct FakeGrab {
        frame: RgbaImage,
    }

    impl ScreenGrab for FakeGrab {
        fn grab(&mut self) -> Result<RgbaImage> {
            Ok(self.frame.clone())
        }
    }

    #[derive(Clone)]
    struct CountingPen {
        downs: Arc<Mutex<u32>>,
        /// Holds the pen on pen-up so the draw worker stays busy.
        up_delay: Duration,
    }

    impl PenDevice for CountingPen {
        fn pen_down(&mut self, _x: i32, _y: i32) -> Result<(), InputError> {
            *self.downs.lock().unwrap() += 1;
            Ok(())
        }

        fn pen_move(&mut self, _x: i32, _y: i32) -> Result<(), InputError> {
            Ok(())
        }

        fn pen_up(&mut self, _x: i32, _y: i32) -> Result<(), InputError> {
            std::thread::sleep(self.up_delay);
            Ok(())
        }
    }

    /// 6x6 glyph shapes; every row and column of the ink box carries ink so
    /// segmentation keeps each shape in one piece.
    fn shape_7() -> GrayImage {
        let mut img = GrayImage::from_pixel(6, 6, Luma([255]));
        for x in 0..6 {
            img.put_pixel(x, 0, Luma([0]));
        }
        for y in 0..6 {
            for x in 4..6 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    fn shape_u() -> GrayImage {
        let mut img = GrayImage::from_pixel(6, 6, Luma([255]));
        for y in 0..6 {
            for x in [0, 1, 4, 5] {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        for x in 0..6 {
            img.put_pixel(x, 5, Luma([0]));
        }
        img
    }

    fn shape_3() -> GrayImage {
        let mut img = GrayImage::from_pixel(6, 6, Luma([255]));
        for x in 0..6 {
            img.put_pixel(x, 0, Luma([0]));
            img.put_pixel(x, 2, Luma([0]));
            img.put_pixel(x, 5, Luma([0]));
        }
        for y in 0..6 {
            img.put_pixel(5, y, Luma([0]));
        }
        img
    }

    fn stamp_rgba(canvas: &mut RgbaImage, glyph: &GrayImage, at_x: u32, at_y: u32) {
        for (x, y, px) in glyph.enumerate_pixels() {
            let v = px.0[0];
            canvas.put_pixel(at_x + x, at_y + y, Rgba([v, v, v, 255]));
        }
    }

    fn segmented_template(shape: &GrayImage) -> GrayImage {
        let mut canvas = GrayImage::from_pixel(20, 10, Luma([255]));
        for (x, y, px) in shape.enumerate_pixels() {
            canvas.put_pixel(4 + x, 2 + y, *px);
        }
        let glyphs = segment::segment_glyphs(&canvas);
        assert_eq!(glyphs.len(), 1);
        glyphs.into_iter().next().unwrap().image
    }

    /// Full-screen frame with "7U3" typeset inside the this-question
    /// sub-region of the (100,100)-(300,200) monitored box.
    fn frame_with_question() -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(640, 480, Rgba([255, 255, 255, 255]));
        stamp_rgba(&mut frame, &shape_7(), 135, 119);
        stamp_rgba(&mut frame, &shape_u(), 155, 119);
        stamp_rgba(&mut frame, &shape_3(), 175, 119);
        frame
    }

    /// Adds a second "7U3" inside the next-question sub-region.
    fn frame_with_next_question(mut frame: RgbaImage) -> RgbaImage {
        stamp_rgba(&mut frame, &shape_7(), 145, 129);
        stamp_rgba(&mut frame, &shape_u(), 165, 129);
        stamp_rgba(&mut frame, &shape_3(), 185, 129);
        frame
    }

    fn build_player_with(
        frame: RgbaImage,
        config: AppConfig,
        up_delay: Duration,
    ) -> (Autoplayer, Arc<Mutex<u32>>) {
        let mut templates = BTreeMap::new();
        templates.insert('7', segmented_template(&shape_7()));
        templates.insert('U', segmented_template(&shape_u()));
        templates.insert('3', segmented_template(&shape_3()));
        let recognizer = Recognizer::with_templates(TemplateSet::from_images(templates), 0.9);

        let mut strokes = HashMap::new();
        strokes.insert('>', vec![(0.2, 0.2), (0.8, 0.5), (0.2, 0.8)]);
        let downs = Arc::new(Mutex::new(0));
        let pen = CountingPen {
            downs: Arc::clone(&downs),
            up_delay,
        };
        let timing = Arc::new(TimingRegistry::new());
        let coordinator = DrawCoordinator::new(
            Box::new(pen),
            Arc::new(StrokeSet::from_points(strokes)),
            Arc::clone(&timing),
        );

        let agent = PenAgent::new(Box::new(FakeGrab { frame }), (100, 100), (300, 200));
        let player = Autoplayer::new(agent, recognizer, coordinator, &config, timing);
        (player, downs)
    }

    fn build_player(frame: RgbaImage) -> (Autoplayer, Arc<Mutex<u32>>) {
        build_player_with(frame, AppConfig::default(), Duration::ZERO)
    }

    fn lookahead_config() -> AppConfig {
        AppConfig {
            cache_policy: CachePolicy::Lookahead,
            ..AppConfig::default()
        }
    }

    fn wait_for_draws(downs: &Mutex<u32>, want: u32) -> u32 {
        for _ in 0..500 {
            let n = *downs.lock().unwrap();
            if n >= want {
                return n;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("draw never ran");
    }

    #[test]
    fn test_dedup_key_strips_final_glyph() {
        assert_eq!(dedup_key("3A5EU"), "3A5E");
        assert_eq!(dedup_key("U"), "");
        assert_eq!(dedup_key(""), "");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(AutoplayPhase::Suppressed.to_string(), "suppressed");
        assert_eq!(AutoplayPhase::Drawing.to_string(), "drawing");
    }

    #[test]
    fn test_blank_screen_is_suppressed() {
        let frame = RgbaImage::from_pixel(640, 480, Rgba([255, 255, 255, 255]));
        let (mut player, downs) = build_player(frame);
        assert_eq!(player.tick().unwrap(), TickOutcome::Quiet);
        assert_eq!(player.phase(), AutoplayPhase::Suppressed);
        assert_eq!(*downs.lock().unwrap(), 0);
    }

    #[test]
    fn test_comparison_question_is_recognized_solved_and_drawn_once() {
        let (mut player, downs) = build_player(frame_with_question());

        assert_eq!(player.tick().unwrap(), TickOutcome::Drew);
        assert_eq!(player.phase(), AutoplayPhase::Drawing);
        assert_eq!(wait_for_draws(&downs, 1), 1);

        // Same question still on screen: once the draw worker exits, the
        // cache suppresses the retrigger.
        for _ in 0..500 {
            assert_eq!(player.tick().unwrap(), TickOutcome::Quiet);
            if player.phase() == AutoplayPhase::Suppressed {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(player.phase(), AutoplayPhase::Suppressed);
        assert_eq!(*downs.lock().unwrap(), 1);
    }

    #[test]
    fn test_status_line_names_queued_question() {
        let pair = QuestionPair {
            question: "3A5E".to_string(),
            answer: "8".to_string(),
        };
        let next = QuestionPair {
            question: "7U3".to_string(),
            answer: ">".to_string(),
        };
        assert_eq!(status_line(&pair, None), "3A5E\n8");
        assert_eq!(status_line(&pair, Some(&next)), "3A5E\n8 (next: 7U3)");
    }

    #[test]
    fn test_lookahead_recognizes_draws_and_pops_once() {
        let frame = frame_with_next_question(frame_with_question());
        let (mut player, downs) = build_player_with(frame, lookahead_config(), Duration::ZERO);

        // Ink in the region (min < dark_release_below) releases the pair on
        // the first tick.
        assert_eq!(player.tick().unwrap(), TickOutcome::Drew);
        assert_eq!(player.phase(), AutoplayPhase::Drawing);
        assert_eq!(wait_for_draws(&downs, 1), 1);

        // Same question still on screen: the popped slot stays empty while
        // the entry is fresh, so nothing else is drawn.
        for _ in 0..20 {
            assert_eq!(player.tick().unwrap(), TickOutcome::Quiet);
        }
        assert_eq!(*downs.lock().unwrap(), 1);
    }

    #[test]
    fn test_lookahead_pop_waits_for_draw_idle() {
        let mut config = lookahead_config();
        config.expire_secs = 0.05;
        let (mut player, downs) = build_player_with(
            frame_with_question(),
            config,
            Duration::from_millis(200),
        );

        assert_eq!(player.tick().unwrap(), TickOutcome::Drew);
        assert_eq!(wait_for_draws(&downs, 1), 1);

        // The entry has expired and re-armed, but the draw worker is still
        // holding the pen: the pop must wait for idleness.
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(player.tick().unwrap(), TickOutcome::Quiet);
        assert_eq!(*downs.lock().unwrap(), 1);

        // Once the worker exits, the re-armed pair is released.
        let mut drew_again = false;
        for _ in 0..500 {
            if player.tick().unwrap() == TickOutcome::Drew {
                drew_again = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(drew_again);
        assert_eq!(wait_for_draws(&downs, 2), 2);
    }

    #[test]
    fn test_lookahead_solve_failure_leaves_queue_empty() {
        // "73" recognizes but fails validation; the queue must stay unarmed
        // and the pen untouched.
        let mut frame = RgbaImage::from_pixel(640, 480, Rgba([255, 255, 255, 255]));
        stamp_rgba(&mut frame, &shape_7(), 135, 119);
        stamp_rgba(&mut frame, &shape_3(), 175, 119);
        let (mut player, downs) = build_player_with(frame, lookahead_config(), Duration::ZERO);

        for _ in 0..5 {
            assert_eq!(player.tick().unwrap(), TickOutcome::Quiet);
        }
        assert_eq!(*downs.lock().unwrap(), 0);
    }
}
