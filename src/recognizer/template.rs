//! Glyph templates and normalized cross-correlation matching.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::GrayImage;

use super::segment::Glyph;

const IMAGE_EXTENSIONS: [&str; 2] = ["png", "jpg"];

/// Best correlation of one glyph against the template set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingResult {
    pub label: char,
    /// Zero-mean normalized cross-correlation, clamped to [-1, 1].
    pub confidence: f64,
    /// Pixel offset of the glyph within the recognized region.
    pub location: (u32, u32),
}

/// Labeled reference glyph images, immutable after load.
///
/// Labels come from file stems, so they are unique by construction; the map
/// keeps iteration deterministic.
pub struct TemplateSet {
    templates: BTreeMap<char, GrayImage>,
}

impl TemplateSet {
    /// Loads every `.png`/`.jpg` in `dir` whose stem is a single character,
    /// converting to grayscale and optionally normalizing to a common size.
    pub fn load(dir: &Path, norm_size: Option<(u32, u32)>) -> Result<Self> {
        let mut templates = BTreeMap::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading template directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let ext_matches = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
            if !ext_matches {
                continue;
            }
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
            let mut chars = stem.chars();
            let (Some(label), None) = (chars.next(), chars.next()) else {
                continue;
            };
            let mut img = image::open(&path)
                .with_context(|| format!("loading template {}", path.display()))?
                .to_luma8();
            if let Some((w, h)) = norm_size {
                if img.dimensions() != (w, h) {
                    img = imageops::resize(&img, w, h, FilterType::Triangle);
                }
            }
            templates.insert(label, img);
        }
        Ok(Self { templates })
    }

    #[cfg(test)]
    pub fn from_images(templates: BTreeMap<char, GrayImage>) -> Self {
        Self { templates }
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    fn iter(&self) -> impl Iterator<Item = (char, &GrayImage)> {
        self.templates.iter().map(|(label, img)| (*label, img))
    }
}

/// Zero-mean normalized cross-correlation of two same-sized images.
/// Flat images have no variance to correlate and score 0.
fn correlate(a: &GrayImage, b: &GrayImage) -> f64 {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let n = (a.width() * a.height()) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let mean_a = a.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
    let mean_b = b.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;

    let mut cross = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let da = pa.0[0] as f64 - mean_a;
        let db = pb.0[0] as f64 - mean_b;
        cross += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return 0.0;
    }
    (cross / (var_a * var_b).sqrt()).clamp(-1.0, 1.0)
}

/// Correlates a glyph against every template, resizing the glyph to each
/// template's footprint, and keeps the best score. Empty sets match nothing.
pub fn best_match(glyph: &Glyph, set: &TemplateSet) -> Option<MatchingResult> {
    let mut best: Option<MatchingResult> = None;
    for (label, template) in set.iter() {
        let (tw, th) = template.dimensions();
        let resized;
        let candidate = if glyph.image.dimensions() == (tw, th) {
            &glyph.image
        } else {
            resized = imageops::resize(&glyph.image, tw, th, FilterType::Triangle);
            &resized
        };
        let confidence = correlate(candidate, template);
        if best.is_none_or(|b| confidence > b.confidence) {
            best = Some(MatchingResult {
                label,
                confidence,
                location: (glyph.x, glyph.y),
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// 8x8 white image with a dark vertical bar at column range `xs`.
    fn bar(xs: std::ops::Range<u32>) -> GrayImage {
        let mut img = GrayImage::from_pixel(8, 8, Luma([255]));
        for y in 0..8 {
            for x in xs.clone() {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        img
    }

    fn glyph(image: GrayImage) -> Glyph {
        Glyph { image, x: 3, y: 1 }
    }

    #[test]
    fn test_correlate_identical_is_one() {
        let img = bar(2..4);
        assert!((correlate(&img, &img) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlate_flat_is_zero() {
        let flat = GrayImage::from_pixel(8, 8, Luma([128]));
        let img = bar(2..4);
        assert_eq!(correlate(&flat, &img), 0.0);
    }

    #[test]
    fn test_best_match_picks_closest_template() {
        let mut templates = BTreeMap::new();
        templates.insert('1', bar(3..5));
        templates.insert('7', bar(0..2));
        let set = TemplateSet::from_images(templates);

        let result = best_match(&glyph(bar(3..5)), &set).unwrap();
        assert_eq!(result.label, '1');
        assert!(result.confidence > 0.99);
        assert_eq!(result.location, (3, 1));
    }

    #[test]
    fn test_best_match_resizes_to_template_footprint() {
        let mut templates = BTreeMap::new();
        templates.insert('1', bar(3..5));
        let set = TemplateSet::from_images(templates);

        // Same bar shape at double resolution still correlates strongly.
        let mut big = GrayImage::from_pixel(16, 16, Luma([255]));
        for y in 0..16 {
            for x in 6..10 {
                big.put_pixel(x, y, Luma([0]));
            }
        }
        let result = best_match(&glyph(big), &set).unwrap();
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let set = TemplateSet::from_images(BTreeMap::new());
        assert!(best_match(&glyph(bar(2..4)), &set).is_none());
    }

    #[test]
    fn test_load_skips_multi_char_stems() {
        let dir = tempfile::tempdir().unwrap();
        bar(2..4).save(dir.path().join("7.png")).unwrap();
        bar(0..2).save(dir.path().join("ignore_me.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let set = TemplateSet::load(dir.path(), None).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_load_normalizes_size() {
        let dir = tempfile::tempdir().unwrap();
        bar(2..4).save(dir.path().join("1.png")).unwrap();
        let set = TemplateSet::load(dir.path(), Some((12, 12))).unwrap();
        let (_, img) = set.iter().next().unwrap();
        assert_eq!(img.dimensions(), (12, 12));
    }
}
