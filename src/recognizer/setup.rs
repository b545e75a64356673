//! Discovery of the external text-recognition engine.
//!
//! Only consulted when the engine strategy is configured. Finds a Tesseract
//! executable and makes sure the English trained data exists, downloading it
//! into the local app-data directory if it is missing everywhere else.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Result};

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Resolved engine paths, handed to the recognizer at construction.
pub struct EngineRuntime {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Local directory for engine files: `<app data>/mathpen/tesseract`.
fn get_engine_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mathpen")
        .join("tesseract")
}

/// Locates the engine and ensures trained data is present.
pub fn ensure_engine() -> Result<EngineRuntime> {
    let executable = find_executable()?;
    let tessdata = ensure_tessdata()?;
    log(&format!(
        "Text engine ready: {} (data: {})",
        executable.display(),
        tessdata.display()
    ));
    Ok(EngineRuntime {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: local engine dir, then PATH, then the
/// well-known install locations.
fn find_executable() -> Result<PathBuf> {
    let local = get_engine_dir().join("tesseract.exe");
    if local.exists() {
        return Ok(local);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    let common_paths = [
        r"C:\Program Files\Tesseract-OCR\tesseract.exe",
        r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    ];
    for path in &common_paths {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR or switch the recognizer \
         strategy to \"template\" in config.json."
    ))
}

/// Finds or downloads `eng.traineddata`, returning its directory.
fn ensure_tessdata() -> Result<PathBuf> {
    let local_dir = get_engine_dir().join("tessdata");
    if local_dir.join("eng.traineddata").exists() {
        return Ok(local_dir);
    }

    let system_paths = [
        r"C:\Program Files\Tesseract-OCR\tessdata",
        r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    ];
    for path in &system_paths {
        let p = PathBuf::from(path);
        if p.join("eng.traineddata").exists() {
            return Ok(p);
        }
    }
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        for p in [PathBuf::from(&prefix), PathBuf::from(&prefix).join("tessdata")] {
            if p.join("eng.traineddata").exists() {
                return Ok(p);
            }
        }
    }

    download_tessdata(&local_dir)?;
    Ok(local_dir)
}

fn download_tessdata(tessdata_dir: &PathBuf) -> Result<()> {
    fs::create_dir_all(tessdata_dir)?;
    let url = format!("{}/eng.traineddata", TESSDATA_REPO);
    log("Downloading eng.traineddata...");

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;
    let response = client.get(&url).header("User-Agent", "mathpen").send()?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download eng.traineddata: HTTP {}",
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(tessdata_dir.join("eng.traineddata"))?;
    file.write_all(&bytes)?;
    log(&format!("Downloaded eng.traineddata ({} bytes)", bytes.len()));
    Ok(())
}
