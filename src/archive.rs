use std::fs;
use std::io;
use std::path::Path;

use zip::ZipArchive;

use crate::error::FetchError;

/// Walk every entry once so a truncated or malformed archive fails before
/// any extraction starts.
pub fn validate_zip(zip_path: &Path) -> Result<(), FetchError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| FetchError::Archive(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| FetchError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| FetchError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        if entry.enclosed_name().is_none() {
            return Err(FetchError::Archive(
                "zip entry path traversal detected".to_string(),
            ));
        }
        io::copy(&mut entry, &mut io::sink()).map_err(|err| FetchError::Archive(err.to_string()))?;
    }
    Ok(())
}

/// Extract the entry whose file name matches `entry_name` to `destination`.
/// The entry may sit at any depth inside the archive. Returns `false` when
/// no such entry exists; the caller owns the artifact context for that.
pub fn extract_entry(
    zip_path: &Path,
    entry_name: &str,
    destination: &Path,
) -> Result<bool, FetchError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| FetchError::Archive(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| FetchError::Archive(err.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| FetchError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(FetchError::Archive(
                "zip entry path traversal detected".to_string(),
            ));
        };
        let matches = enclosed
            .file_name()
            .map(|name| name == entry_name)
            .unwrap_or(false);
        if !matches {
            continue;
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| FetchError::Filesystem(err.to_string()))?;
        }
        let mut outfile = fs::File::create(destination)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        io::copy(&mut entry, &mut outfile)
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn sample_zip(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer
            .start_file("sample/pff_metadata_10517.json", options)
            .unwrap();
        writer.write_all(b"{\"home\": \"ARG\"}").unwrap();
        writer.start_file("events.json", options).unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn validate_and_extract() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("sample.zip");
        sample_zip(&zip_path);

        validate_zip(&zip_path).unwrap();

        let dest = temp.path().join("metadata.json");
        let found = extract_entry(&zip_path, "pff_metadata_10517.json", &dest).unwrap();
        assert!(found);
        assert_eq!(fs::read(&dest).unwrap(), b"{\"home\": \"ARG\"}");

        let nested_dest = temp.path().join("events.json");
        assert!(extract_entry(&zip_path, "events.json", &nested_dest).unwrap());
    }

    #[test]
    fn extract_missing_entry() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("sample.zip");
        sample_zip(&zip_path);

        let dest = temp.path().join("missing.json");
        assert!(!extract_entry(&zip_path, "pff_9999.jsonl.bz2", &dest).unwrap());
    }

    #[test]
    fn validate_rejects_garbage() {
        let temp = tempfile::tempdir().unwrap();
        let zip_path = temp.path().join("broken.zip");
        fs::write(&zip_path, b"not a zip").unwrap();
        assert!(validate_zip(&zip_path).is_err());
    }
}
