//! Output and intermediate file naming.

use std::path::{Path, PathBuf};

use super::timecode::Timecode;

/// Longest file stem (before the extension) produced for trimmed outputs.
pub const MAX_STEM_CHARS: usize = 100;

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// Extension including the dot, or empty.
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

pub fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// `_<start>_to_<end>` using compact timecodes.
pub fn trim_suffix(start: &Timecode, end: &Timecode) -> String {
    format!("_{}_to_{}", start.compact(), end.compact())
}

/// Stem of a trimmed file, truncated so stem and suffix fit the limit.
pub fn trimmed_stem(stem: &str, suffix: &str) -> String {
    let budget = MAX_STEM_CHARS.saturating_sub(suffix.chars().count());
    let base: String = stem.chars().take(budget).collect();
    format!("{}{}", base, suffix)
}

/// `<source dir>/<stem>_temp<ext>`
pub fn intermediate_path(source: &Path, ext: &str) -> PathBuf {
    parent_dir(source).join(format!("{}_temp{}", file_stem(source), ext))
}

/// Returns `candidate`, or a sibling with `alt` appended to its stem when
/// `candidate` is the source itself.
pub fn avoid_source_collision(candidate: PathBuf, source: &Path, alt: &str) -> PathBuf {
    if !same_path(&candidate, source) {
        return candidate;
    }
    let ext = dotted_extension(&candidate);
    let stem = file_stem(&candidate);
    parent_dir(&candidate).join(format!("{}{}{}", stem, alt, ext))
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(s: &str) -> Timecode {
        s.parse().unwrap()
    }

    #[test]
    fn test_trim_suffix() {
        assert_eq!(
            trim_suffix(&tc("00:00:05:000"), &tc("00:01:10:500")),
            "_05_000_to_01_10_500"
        );
    }

    #[test]
    fn test_trimmed_stem_truncates() {
        let long = "x".repeat(150);
        let suffix = "_05_000_to_10_000";
        let stem = trimmed_stem(&long, suffix);
        assert_eq!(stem.chars().count(), MAX_STEM_CHARS);
        assert!(stem.ends_with(suffix));

        assert_eq!(trimmed_stem("clip", suffix), "clip_05_000_to_10_000");
    }

    #[test]
    fn test_trimmed_stem_multibyte() {
        let stem = trimmed_stem(&"é".repeat(120), "_a");
        assert_eq!(stem.chars().count(), MAX_STEM_CHARS);
    }

    #[test]
    fn test_intermediate_path() {
        assert_eq!(
            intermediate_path(Path::new("/videos/clip.mkv"), ".mkv"),
            PathBuf::from("/videos/clip_temp.mkv")
        );
        assert_eq!(
            intermediate_path(Path::new("clip.webm"), ".mp4"),
            PathBuf::from("./clip_temp.mp4")
        );
    }

    #[test]
    fn test_avoid_source_collision() {
        let source = Path::new("/videos/clip.mp4");
        assert_eq!(
            avoid_source_collision(PathBuf::from("/out/clip.mp4"), source, "_converted"),
            PathBuf::from("/out/clip.mp4")
        );
        assert_eq!(
            avoid_source_collision(PathBuf::from("/videos/clip.mp4"), source, "_converted"),
            PathBuf::from("/videos/clip_converted.mp4")
        );
    }
}
