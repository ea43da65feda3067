//! Path and name classification used by the decision checks.

/// The `/documents/` segment exempts a path from directory-fragment
/// matching: user-organized folders can legitimately contain names that
/// collide with app or messenger directories.
const DOCUMENTS_SEGMENT: &str = "/documents/";

/// Lowercases and slash-normalizes a path for fragment matching.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

/// True if the path lies inside the app's own output directory.
pub fn is_in_app_directory(path: &str, app_directory_name: &str) -> bool {
    let normalized = normalize_path(path);
    if normalized.contains(DOCUMENTS_SEGMENT) {
        return false;
    }
    let needle = format!("/{}/", app_directory_name.to_lowercase());
    normalized.contains(&needle)
}

/// True if the path lies inside a known messenger app media folder.
pub fn is_messenger_path(path: &str, messenger_folders: &[String]) -> bool {
    let normalized = normalize_path(path);
    if normalized.contains(DOCUMENTS_SEGMENT) {
        return false;
    }
    messenger_folders
        .iter()
        .any(|fragment| normalized.contains(&fragment.to_lowercase()))
}

/// Filename heuristic for screenshots.
pub fn is_screenshot_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("screenshot")
        || lower.contains("screen_shot")
        || lower.starts_with("scr_")
        || (lower.contains("screen") && lower.contains("shot"))
}

/// True if the display name marks the item as a renamed-original backup
/// artifact left behind by a previous run.
pub fn is_backup_artifact_name(name: &str, backup_marker: &str) -> bool {
    !backup_marker.is_empty() && name.to_lowercase().contains(&backup_marker.to_lowercase())
}

/// True if the display name carries the compressed-output suffix.
pub fn is_compressed_artifact_name(name: &str, compressed_suffix: &str) -> bool {
    !compressed_suffix.is_empty()
        && name
            .to_lowercase()
            .contains(&compressed_suffix.to_lowercase())
}

/// Output file name for an original: inserts the suffix before the
/// extension, or keeps the name unchanged in replace mode.
pub fn compressed_file_name(original_name: &str, suffix: &str, replace_mode: bool) -> String {
    if replace_mode {
        return original_name.to_string();
    }
    match original_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}{}.{}", stem, suffix, ext),
        None => format!("{}{}", original_name, suffix),
    }
}

/// First name of the form `base.ext`, `base_1.ext`, `base_2.ext`, ...
/// for which `taken` returns false.
pub fn unique_file_name<F: Fn(&str) -> bool>(base: &str, extension: &str, taken: F) -> String {
    let candidate = format!("{}{}", base, extension);
    if !taken(&candidate) {
        return candidate;
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{}_{}{}", base, counter, extension);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}
