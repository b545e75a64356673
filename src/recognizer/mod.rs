//! Glyph recognition for the monitored question regions.
//!
//! Two interchangeable strategies behind one facade: template matching over
//! segmented glyphs, or delegation to an external text engine. The choice is
//! made at construction; the orchestration loop never branches on it.

pub mod engine;
pub mod segment;
pub mod setup;
pub mod template;

use anyhow::Result;
use image::DynamicImage;

use self::setup::EngineRuntime;
use self::template::TemplateSet;

enum Backend {
    Template {
        set: TemplateSet,
        min_confidence: f64,
    },
    Engine(EngineRuntime),
}

/// Turns a captured question region into recognized label strings.
pub struct Recognizer {
    backend: Backend,
}

impl Recognizer {
    pub fn with_templates(set: TemplateSet, min_confidence: f64) -> Self {
        Self {
            backend: Backend::Template {
                set,
                min_confidence,
            },
        }
    }

    pub fn with_engine(runtime: EngineRuntime) -> Self {
        Self {
            backend: Backend::Engine(runtime),
        }
    }

    /// Recognizes every glyph in the region, returning one string of labels
    /// per detected line. Zero confident glyphs yield an empty sequence,
    /// not an error.
    pub fn recognize(&self, image: &DynamicImage) -> Result<Vec<String>> {
        let gray = segment::to_luma(image)?;
        match &self.backend {
            Backend::Template {
                set,
                min_confidence,
            } => {
                let mut line = String::new();
                for glyph in segment::segment_glyphs(&gray) {
                    if let Some(result) = template::best_match(&glyph, set) {
                        if result.confidence >= *min_confidence {
                            line.push(result.label);
                        }
                    }
                }
                Ok(if line.is_empty() { Vec::new() } else { vec![line] })
            }
            Backend::Engine(runtime) => {
                engine::recognize_text(&gray, &runtime.executable, &runtime.tessdata)
            }
        }
    }
}
