//! Screen agent: monitored-region capture, sub-region geometry and
//! brightness statistics.

pub mod draw;
pub mod strokes;

use anyhow::Result;
use image::{imageops, DynamicImage, GrayImage};

use crate::platform::ScreenGrab;

/// Corner-pair rectangle in fractions of the monitored region.
pub type FractionBox = ((f32, f32), (f32, f32));

/// Where the current question is typeset inside the monitored region.
pub const REGION_THIS_QUESTION: FractionBox = ((0.144, 0.171), (0.859, 0.266));
/// Where the look-ahead question is typeset.
pub const REGION_NEXT_QUESTION: FractionBox = ((0.209, 0.296), (0.791, 0.364));
/// Where answers are hand-drawn.
pub const REGION_ANSWERING: FractionBox = ((0.052, 0.449), (0.948, 0.916));

/// Absolute pixel rectangle the answer is drawn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerBox {
    pub left_top: (i32, i32),
    pub right_bottom: (i32, i32),
}

/// Mean and minimum intensity of a captured region, the cheap gate that
/// decides whether the expensive recognize/solve work runs this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub mean: f32,
    pub min: u8,
}

impl RegionStats {
    pub fn of(img: &GrayImage) -> Self {
        let mut sum = 0u64;
        let mut min = u8::MAX;
        let mut count = 0u64;
        for px in img.pixels() {
            sum += px.0[0] as u64;
            min = min.min(px.0[0]);
            count += 1;
        }
        let mean = if count > 0 {
            sum as f32 / count as f32
        } else {
            255.0
        };
        Self { mean, min }
    }
}

/// Watches one fixed screen region through the capture backend.
///
/// Remembers the full screen size after the first grab; drawing geometry is
/// a precondition violation until then.
pub struct PenAgent {
    grab: Box<dyn ScreenGrab>,
    left_top: (i32, i32),
    right_bottom: (i32, i32),
    screen_size: Option<(u32, u32)>,
}

impl PenAgent {
    pub fn new(grab: Box<dyn ScreenGrab>, left_top: (i32, i32), right_bottom: (i32, i32)) -> Self {
        Self {
            grab,
            left_top,
            right_bottom,
            screen_size: None,
        }
    }

    pub fn monitored_corners(&self) -> ((i32, i32), (i32, i32)) {
        (self.left_top, self.right_bottom)
    }

    pub fn screen_size(&self) -> Option<(u32, u32)> {
        self.screen_size
    }

    /// Captures the monitored region, optionally narrowed to a fractional
    /// sub-region of it.
    pub fn capture_region(&mut self, sub: Option<FractionBox>) -> Result<DynamicImage> {
        let frame = self.grab.grab()?;
        self.screen_size = Some(frame.dimensions());

        let mut region = crop_absolute(
            &DynamicImage::ImageRgba8(frame),
            self.left_top,
            self.right_bottom,
        );
        if let Some(fractions) = sub {
            region = crop_relative(&region, fractions);
        }
        Ok(region)
    }

    /// The absolute rectangle answers are drawn into, derived from the
    /// answering fractions of the monitored box. Geometry cannot be trusted
    /// before a capture has confirmed the screen.
    pub fn answer_box(&self) -> Option<AnswerBox> {
        self.screen_size?;
        let (lt, rb) = (self.left_top, self.right_bottom);
        let (w, h) = ((rb.0 - lt.0) as f32, (rb.1 - lt.1) as f32);
        let ((fx0, fy0), (fx1, fy1)) = REGION_ANSWERING;
        Some(AnswerBox {
            left_top: (lt.0 + (w * fx0) as i32, lt.1 + (h * fy0) as i32),
            right_bottom: (lt.0 + (w * fx1) as i32, lt.1 + (h * fy1) as i32),
        })
    }
}

fn crop_absolute(
    img: &DynamicImage,
    left_top: (i32, i32),
    right_bottom: (i32, i32),
) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    let x0 = (left_top.0.max(0) as u32).min(w);
    let y0 = (left_top.1.max(0) as u32).min(h);
    let x1 = (right_bottom.0.max(0) as u32).min(w);
    let y1 = (right_bottom.1.max(0) as u32).min(h);
    DynamicImage::ImageRgba8(
        imageops::crop_imm(&img.to_rgba8(), x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
            .to_image(),
    )
}

fn crop_relative(img: &DynamicImage, ((fx0, fy0), (fx1, fy1)): FractionBox) -> DynamicImage {
    let (w, h) = (img.width() as f32, img.height() as f32);
    crop_absolute(
        img,
        ((fx0 * w) as i32, (fy0 * h) as i32),
        ((fx1 * w) as i32, (fy1 * h) as i32),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    struct FakeGrab {
        frame: RgbaImage,
    }

    impl ScreenGrab for FakeGrab {
        fn grab(&mut self) -> Result<RgbaImage> {
            Ok(self.frame.clone())
        }
    }

    fn agent_with_frame(frame: RgbaImage) -> PenAgent {
        PenAgent::new(Box::new(FakeGrab { frame }), (100, 50), (300, 150))
    }

    #[test]
    fn test_capture_crops_monitored_region() {
        let frame = RgbaImage::from_fn(640, 480, |x, _| {
            // Monitored region painted dark, everything else white.
            if (100..300).contains(&x) {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let mut agent = agent_with_frame(frame);
        let region = agent.capture_region(None).unwrap();
        assert_eq!((region.width(), region.height()), (200, 100));
        assert_eq!(agent.screen_size(), Some((640, 480)));
        assert_eq!(region.to_luma8().get_pixel(0, 0).0[0], 20);
    }

    #[test]
    fn test_capture_applies_fractional_sub_region() {
        let frame = RgbaImage::from_pixel(640, 480, Rgba([200, 200, 200, 255]));
        let mut agent = agent_with_frame(frame);
        let region = agent
            .capture_region(Some(((0.25, 0.1), (0.75, 0.5))))
            .unwrap();
        // Half of 200 wide, 40% of 100 tall.
        assert_eq!((region.width(), region.height()), (100, 40));
    }

    #[test]
    fn test_answer_box_requires_capture_first() {
        let frame = RgbaImage::from_pixel(640, 480, Rgba([0, 0, 0, 255]));
        let mut agent = agent_with_frame(frame);
        assert!(agent.answer_box().is_none());

        agent.capture_region(None).unwrap();
        let answer_box = agent.answer_box().unwrap();
        // 200x100 monitored box, answering fractions of it.
        assert_eq!(answer_box.left_top, (100 + 10, 50 + 44));
        assert_eq!(answer_box.right_bottom, (100 + 189, 50 + 91));
    }

    #[test]
    fn test_region_stats() {
        let mut img = GrayImage::from_pixel(4, 1, Luma([200]));
        img.put_pixel(0, 0, Luma([8]));
        let stats = RegionStats::of(&img);
        assert_eq!(stats.min, 8);
        assert!((stats.mean - 152.0).abs() < 0.01);
    }
}
