use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the assets directory: `<exe_dir>/assets/`
pub fn get_assets_dir() -> PathBuf {
    get_exe_dir().join("assets")
}

/// Returns the glyph template directory: `<exe_dir>/assets/templates/`
pub fn get_template_dir() -> PathBuf {
    get_assets_dir().join("templates")
}

/// Returns the stroke asset file: `<exe_dir>/assets/strokes.json`
pub fn get_strokes_file() -> PathBuf {
    get_assets_dir().join("strokes.json")
}

/// Returns the config file: `<exe_dir>/config.json`
pub fn get_config_file() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_template_dir())?;
    Ok(())
}
