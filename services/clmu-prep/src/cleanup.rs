//! Removal of the raw download cache and model case directories.

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};

/// What a cleanup pass removed.
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Requested directories that did not exist
    pub missing: Vec<PathBuf>,
    pub files: u64,
    pub bytes: u64,
}

/// Split `a;b;c` into case names.
///
/// Names must be a single path component so that removal stays below the
/// case root.
pub fn parse_case_names(list: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for name in list.split(';').map(str::trim).filter(|n| !n.is_empty()) {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => names.push(name.to_string()),
            _ => bail!("Invalid case name '{}'", name),
        }
    }
    Ok(names)
}

/// Remove a directory tree, counting what it held.
fn remove_tree(path: &Path, report: &mut CleanupReport) -> Result<()> {
    if !path.exists() {
        debug!(path = %path.display(), "Nothing to remove");
        report.missing.push(path.to_path_buf());
        return Ok(());
    }

    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.with_context(|| format!("Failed to scan {}", path.display()))?;
        if entry.file_type().is_file() {
            report.files += 1;
            report.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }

    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    info!(path = %path.display(), "Removed directory");
    report.removed.push(path.to_path_buf());
    Ok(())
}

/// Remove the cache directory (when given) and each case directory under
/// `case_root`.
pub fn clean(cache_dir: Option<&Path>, case_root: &Path, cases: &[String]) -> Result<CleanupReport> {
    let mut report = CleanupReport::default();

    if let Some(cache) = cache_dir {
        remove_tree(cache, &mut report)?;
    }
    for case in cases {
        remove_tree(&case_root.join(case), &mut report)?;
    }

    if !report.missing.is_empty() {
        warn!(count = report.missing.len(), "Some directories did not exist");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_names() {
        assert_eq!(
            parse_case_names("london; manchester;;").unwrap(),
            vec!["london", "manchester"]
        );
        assert!(parse_case_names("").unwrap().is_empty());
        assert!(parse_case_names("ok;../etc").is_err());
        assert!(parse_case_names("/abs").is_err());
        assert!(parse_case_names("a/b").is_err());
    }

    #[test]
    fn test_clean_removes_cache_and_cases() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("era5_data");
        let cases = dir.path().join("cases");
        std::fs::create_dir_all(cache.join("nested")).unwrap();
        std::fs::write(cache.join("a.nc"), b"12345").unwrap();
        std::fs::write(cache.join("nested").join("b.nc"), b"123").unwrap();
        std::fs::create_dir_all(cases.join("london")).unwrap();
        std::fs::create_dir_all(cases.join("keep")).unwrap();

        let names = parse_case_names("london;paris").unwrap();
        let report = clean(Some(&cache), &cases, &names).unwrap();

        assert_eq!(report.removed, vec![cache.clone(), cases.join("london")]);
        assert_eq!(report.missing, vec![cases.join("paris")]);
        assert_eq!(report.files, 2);
        assert_eq!(report.bytes, 8);
        assert!(!cache.exists());
        assert!(cases.join("keep").exists());
    }
}
