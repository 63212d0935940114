// src/persist.rs

//! Atomic JSON snapshots: write to a temp file beside the target, flush, rename.
//! A failed write leaves the previous snapshot untouched.

use crate::error::StilResult;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> StilResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        if pretty {
            serde_json::to_writer_pretty(&mut writer, value)?;
        } else {
            serde_json::to_writer(&mut writer, value)?;
        }
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, "old").unwrap();

        write_json_atomic(&path, &vec!["neu"], false).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["neu"]"#);
        // only the snapshot remains in the directory
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
