//! Utility functions for formatting, naming and MIME handling.
//!
//! This module provides general-purpose helpers used throughout the
//! squeeze-core library: byte formatting, `FFmpeg` time parsing, file name
//! manipulation and the previewable/text-like checks used by the router.

/// Formats bytes with appropriate binary units (B, KiB, MiB, GiB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    let bytes_f64 = bytes as f64;
    if bytes_f64 >= GIB {
        format!("{:.2} GiB", bytes_f64 / GIB)
    } else if bytes_f64 >= MIB {
        format!("{:.2} MiB", bytes_f64 / MIB)
    } else if bytes_f64 >= KIB {
        format!("{:.2} KiB", bytes_f64 / KIB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats a byte budget for user-facing messages ("1 MB", "512 KB").
#[must_use]
pub fn format_budget(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MB", bytes / (1024 * 1024))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{bytes} B")
    }
}

/// Parses `FFmpeg` time string (HH:MM:SS.MS) to seconds. Returns None if invalid.
#[must_use]
pub fn parse_ffmpeg_time(time: &str) -> Option<f64> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() == 3 {
        let hours = parts[0].parse::<f64>().ok()?;
        let minutes = parts[1].parse::<f64>().ok()?;
        let seconds = parts[2].parse::<f64>().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    } else {
        None
    }
}

/// Lower-cased extension of a file name, without the dot.
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// File name with its extension removed; "attachment" for empty names.
#[must_use]
pub fn file_stem(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return "attachment".to_string();
    }
    match extension_of(trimmed) {
        Some(ext) => trimmed[..trimmed.len() - ext.len() - 1].to_string(),
        None => trimmed.to_string(),
    }
}

/// Replaces (or appends) the extension of `name`.
#[must_use]
pub fn with_extension(name: &str, extension: &str) -> String {
    format!("{}.{extension}", file_stem(name))
}

/// MIME type without parameters, lower-cased (`"Text/Plain; charset=utf-8"` -> `"text/plain"`).
#[must_use]
pub fn base_mime(mime: &str) -> String {
    mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

/// Whether a MIME type renders inline and must therefore stay byte-exact.
#[must_use]
pub fn is_previewable_mime(mime: &str) -> bool {
    let mime = base_mime(mime);
    mime.starts_with("text/")
        || mime.contains("javascript")
        || mime.contains("json")
        || mime.contains("xml")
        || mime.contains("csv")
        || mime == "application/pdf"
}

const TEXT_LIKE_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "log", "csv", "tsv", "json", "yml", "yaml", "xml", "html", "css",
    "js", "ts", "tsx", "jsx", "c", "cc", "cpp", "h", "hpp", "go", "rs", "py", "rb", "php",
    "java", "kt", "swift", "sql", "sh", "bat", "ps1",
];

/// Whether a file looks like text or source code by MIME type or extension.
#[must_use]
pub fn is_text_like(name: &str, mime: &str) -> bool {
    if base_mime(mime).starts_with("text/") {
        return true;
    }
    extension_of(name).is_some_and(|ext| TEXT_LIKE_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a file is TIFF by MIME type or extension.
#[must_use]
pub fn is_tiff(name: &str, mime: &str) -> bool {
    let mime = base_mime(mime);
    mime == "image/tiff"
        || mime == "image/tif"
        || extension_of(name).is_some_and(|ext| ext == "tif" || ext == "tiff")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KiB");
        assert_eq!(format_bytes(1536), "1.50 KiB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MiB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GiB");
    }

    #[test]
    fn test_format_budget() {
        assert_eq!(format_budget(1_048_576), "1 MB");
        assert_eq!(format_budget(512 * 1024), "512 KB");
        assert_eq!(format_budget(100), "100 B");
    }

    #[test]
    fn test_parse_ffmpeg_time() {
        assert_eq!(parse_ffmpeg_time("00:00:10.50"), Some(10.5));
        assert_eq!(parse_ffmpeg_time("01:02:03.00"), Some(3723.0));
        assert_eq!(parse_ffmpeg_time("N/A"), None);
        assert_eq!(parse_ffmpeg_time("10.5"), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(extension_of("Clip.MOV"), Some("mov".to_string()));
        assert_eq!(extension_of("archive.tar.gz"), Some("gz".to_string()));
        assert_eq!(extension_of("README"), None);
        assert_eq!(extension_of(".bashrc"), None);
        assert_eq!(file_stem("holiday.mp4"), "holiday");
        assert_eq!(file_stem("   "), "attachment");
        assert_eq!(with_extension("scan.tiff", "jpg"), "scan.jpg");
        assert_eq!(with_extension("voice", "webm"), "voice.webm");
    }

    #[test]
    fn test_previewable_and_text_like() {
        assert!(is_previewable_mime("text/plain; charset=utf-8"));
        assert!(is_previewable_mime("application/json"));
        assert!(is_previewable_mime("application/pdf"));
        assert!(!is_previewable_mime("application/zip"));
        assert!(is_text_like("main.rs", "application/octet-stream"));
        assert!(is_text_like("notes", "text/markdown"));
        assert!(!is_text_like("data.bin", "application/octet-stream"));
    }

    #[test]
    fn test_is_tiff() {
        assert!(is_tiff("scan.TIF", ""));
        assert!(is_tiff("scan", "image/tiff"));
        assert!(!is_tiff("photo.jpg", "image/jpeg"));
    }
}
