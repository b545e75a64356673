//! Pen stroke paths, one ordered point list per drawable character.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Character → normalized pen path, loaded once from `assets/strokes.json`.
///
/// Points are (x, y) in [0,1]×[0,1]; the draw coordinator maps them into an
/// absolute per-character screen slice. A character absent from the set is a
/// draw-time lookup failure, not a load-time one.
pub struct StrokeSet {
    strokes: HashMap<char, Vec<(f32, f32)>>,
}

impl StrokeSet {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading stroke asset {}", path.display()))?;
        let raw: HashMap<String, Vec<(f32, f32)>> = serde_json::from_str(&contents)
            .with_context(|| format!("parsing stroke asset {}", path.display()))?;

        let mut strokes = HashMap::new();
        for (key, points) in raw {
            let mut chars = key.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                bail!("stroke key {key:?} is not a single character");
            };
            if points.is_empty() {
                bail!("stroke path for {key:?} has no points");
            }
            for &(x, y) in &points {
                if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
                    bail!("stroke point ({x}, {y}) for {key:?} is outside [0,1]");
                }
            }
            strokes.insert(c, points);
        }
        Ok(Self { strokes })
    }

    pub fn get(&self, c: char) -> Option<&[(f32, f32)]> {
        self.strokes.get(&c).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    #[cfg(test)]
    pub fn from_points(strokes: HashMap<char, Vec<(f32, f32)>>) -> Self {
        Self { strokes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_asset(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_and_lookup() {
        let file = write_asset(r#"{"1": [[0.5, 0.1], [0.5, 0.9]], "2": [[0.1, 0.1], [0.9, 0.1], [0.1, 0.9]]}"#);
        let set = StrokeSet::load(file.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get('1').unwrap().len(), 2);
        assert!(set.get('9').is_none());
    }

    #[test]
    fn test_load_rejects_out_of_range_point() {
        let file = write_asset(r#"{"1": [[0.5, 1.5]]}"#);
        assert!(StrokeSet::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_multi_char_key() {
        let file = write_asset(r#"{"12": [[0.5, 0.5]]}"#);
        assert!(StrokeSet::load(file.path()).is_err());
    }

    #[test]
    fn test_load_rejects_empty_path() {
        let file = write_asset(r#"{"1": []}"#);
        assert!(StrokeSet::load(file.path()).is_err());
    }
}
