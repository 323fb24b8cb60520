use std::path::{Path, PathBuf};

/// File extensions the scanner considers 3D model content, without the
/// leading dot, compared case-insensitively. Exhaustive: anything else
/// is invisible to the scanner.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["stl", "obj", "3mf", "ply", "gcode"];

/// Fixed extension-to-mime classification table.
///
/// Deliberately has no catch-all arm beyond `None`: an unrecognized
/// extension must never be given a made-up type. Unreachable from the
/// walk (the extension filter runs first) but callers outside it, like
/// the upload path, classify archive entries through here too.
pub fn mime_type(extension: &str) -> Option<&'static str> {
    match extension {
        "stl" => Some("model/stl"),
        "obj" => Some("model/obj"),
        "3mf" => Some("model/3mf"),
        "ply" => Some("model/ply"),
        "gcode" => Some("text/x-gcode"),
        _ => None,
    }
}

/// The lowercase extension of a path, if it has one.
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

/// Whether a path passes the scanner's extension filter.
pub fn is_model_file(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// One file discovered under a library root: the scanner's output unit.
///
/// Ephemeral - consumed by reconciliation and then discarded, never
/// persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes from filesystem metadata.
    pub size: u64,
    /// Lowercase hex BLAKE3 digest of the full file contents.
    pub digest: String,
    /// Mime classification from the extension table.
    pub mime_type: Option<&'static str>,
}
