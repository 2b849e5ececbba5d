use std::path::{Component, Path, PathBuf};

use crate::error::AppError;

const PROTECTED_ROOTS: &[&str] = &[
    "/Applications",
    "/bin",
    "/sbin",
    "/usr",
    "/System",
    "/Library",
    "/etc",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

pub fn validate_path(path: &str) -> Result<(), AppError> {
    if path.is_empty() {
        return Err(AppError::General("path is empty".to_string()));
    }
    if path.contains('\0') {
        return Err(AppError::General("path contains NUL byte".to_string()));
    }
    for component in Path::new(path).components() {
        if matches!(component, Component::ParentDir) {
            return Err(AppError::General(
                "path traversal (.. component) not allowed".to_string(),
            ));
        }
    }
    Ok(())
}

/// Lexically resolves `.` and `..` segments without touching the filesystem,
/// so a destination like `/tmp/safe/../../etc/passwd` is judged by where it
/// actually lands.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn is_protected_path(path: &str) -> bool {
    let normalized = normalize_for_match(path);
    PROTECTED_ROOTS.iter().any(|root| {
        let root_normalized = normalize_for_match(root);
        if is_windows_style_path(&root_normalized) {
            let normalized_lower = normalized.to_ascii_lowercase();
            let root_lower = root_normalized.to_ascii_lowercase();
            normalized_lower == root_lower
                || normalized_lower.starts_with(&format!("{root_lower}/"))
        } else {
            normalized == root_normalized || normalized.starts_with(&format!("{root_normalized}/"))
        }
    })
}

fn normalize_for_match(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }
    normalized
}

fn is_windows_style_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

/// Reduces an untrusted classification category to a single safe path
/// component: traversal segments, separators, and control characters are
/// stripped rather than rejected, since the category is advisory input.
pub fn sanitize_category(raw: &str) -> String {
    let cleaned: String = raw
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join(" ");
    let cleaned: String = cleaned
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string();
    if cleaned.is_empty() {
        "uncategorized".to_string()
    } else {
        cleaned
    }
}

/// Shortens a file name to at most `max_len` characters, keeping the
/// extension when the stem retains at least one character.
pub fn truncate_file_name(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len || max_len == 0 {
        return name.to_string();
    }
    let path = Path::new(name);
    let ext = path.extension().map(|e| e.to_string_lossy().to_string());
    match ext {
        Some(ext) if ext.chars().count() + 2 <= max_len => {
            let stem_budget = max_len - ext.chars().count() - 1;
            let stem: String = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
                .chars()
                .take(stem_budget)
                .collect();
            format!("{stem}.{ext}")
        }
        _ => name.chars().take(max_len).collect(),
    }
}

pub fn validate_not_protected(path: &str) -> Result<(), AppError> {
    if is_protected_path(path) {
        return Err(AppError::General(format!(
            "operation on protected path not allowed: {path}"
        )));
    }
    Ok(())
}
