//! External text-engine strategy: hand the region to a Tesseract subprocess
//! and clean its output onto the label alphabet.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use image::GrayImage;
use regex::Regex;
use tempfile::NamedTempFile;

/// Printed symbols the engine may emit for the problem layout.
const CHAR_WHITELIST: &str = "0123456789+-x*/=?";

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Runs the engine over a grayscale region and returns one cleaned string of
/// label-alphabet characters per detected line.
pub fn recognize_text(
    img: &GrayImage,
    executable: &Path,
    tessdata: &Path,
) -> Result<Vec<String>> {
    let temp_input = NamedTempFile::with_suffix(".png")?;
    img.save(temp_input.path())?;

    let output = Command::new(executable)
        .arg(temp_input.path())
        .arg("stdout")
        .arg("--tessdata-dir")
        .arg(tessdata)
        .arg("-l")
        .arg("eng")
        .arg("--psm")
        .arg("7") // single text line
        .arg("-c")
        .arg(format!("tessedit_char_whitelist={CHAR_WHITELIST}"))
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("text engine failed: {}", stderr.trim()));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(clean_output(&text))
}

/// Strips whitespace, maps printed symbols onto the label alphabet, and
/// splits on line breaks; lines left empty after cleanup are dropped.
pub fn clean_output(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            whitespace_re()
                .replace_all(line, "")
                .chars()
                .filter_map(normalize_char)
                .collect::<String>()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Maps one engine output character onto the label alphabet.
fn normalize_char(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        '+' => Some('A'),
        '-' | '−' => Some('M'),
        '×' | 'x' | 'X' | '*' => Some('T'),
        '÷' | '/' => Some('D'),
        '=' => Some('E'),
        '?' | '？' => Some('U'),
        _ => None,
    }
}
