//! Zip extraction into a staging directory.

use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Name of the rules file expected at the root of every bundle.
pub const RULES_JSON_FILE: &str = "rules.json";

/// Extracts every entry of `zip_path` under `destination`.
///
/// Entries whose names would land outside `destination` abort the extraction.
pub fn extract(zip_path: &Path, destination: &Path) -> Result<usize, String> {
    let file = File::open(zip_path)
        .map_err(|e| format!("Failed to open {}: {}", zip_path.display(), e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| format!("Invalid zip archive: {}", e))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| format!("Failed to read zip entry {}: {}", index, e))?;

        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| format!("Zip entry '{}' escapes the extraction dir", entry.name()))?;
        let output = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&output)
                .map_err(|e| format!("Failed to create {}: {}", output.display(), e))?;
            continue;
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
        }

        let mut out_file = File::create(&output)
            .map_err(|e| format!("Failed to create {}: {}", output.display(), e))?;
        io::copy(&mut entry, &mut out_file)
            .map_err(|e| format!("Failed to extract {}: {}", output.display(), e))?;
    }

    Ok(archive.len())
}

/// Extracts the bundle and returns the contents of its root `rules.json`.
pub fn extract_rules_json(zip_path: &Path, destination: &Path) -> Result<String, String> {
    extract(zip_path, destination)?;

    let rules_path = destination.join(RULES_JSON_FILE);
    fs::read_to_string(&rules_path)
        .map_err(|e| format!("Bundle has no readable {}: {}", RULES_JSON_FILE, e))
}


#[cfg(test)]
mod tests {
    use super::test_support::zip_bytes;
    use super::*;

    #[test]
    fn test_extracts_rules_json() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let zip_path = tmp_dir.path().join("rules.zip");
        fs::write(
            &zip_path,
            zip_bytes(&[("rules.json", "{\"version\":1}"), ("assets/a.txt", "a")]),
        )
        .unwrap();

        let content = extract_rules_json(&zip_path, tmp_dir.path()).unwrap();
        assert_eq!(content, "{\"version\":1}");
        assert!(tmp_dir.path().join("assets").join("a.txt").exists());
    }

    #[test]
    fn test_missing_rules_json_fails() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let zip_path = tmp_dir.path().join("rules.zip");
        fs::write(&zip_path, zip_bytes(&[("nested/rules.json", "{}")])).unwrap();

        assert!(extract_rules_json(&zip_path, tmp_dir.path()).is_err());
    }

    #[test]
    fn test_not_a_zip_fails() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let zip_path = tmp_dir.path().join("rules.zip");
        fs::write(&zip_path, b"definitely not a zip").unwrap();

        assert!(extract(&zip_path, tmp_dir.path()).is_err());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let tmp_dir = tempfile::tempdir().unwrap();
        let staging = tmp_dir.path().join("staging");
        fs::create_dir_all(&staging).unwrap();
        let zip_path = staging.join("rules.zip");
        fs::write(&zip_path, zip_bytes(&[("../escaped.json", "{}")])).unwrap();

        assert!(extract(&zip_path, &staging).is_err());
        assert!(!tmp_dir.path().join("escaped.json").exists());
    }
}
