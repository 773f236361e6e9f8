//! The CSV ledger: one row per processed image, keyed by file name.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{AnnotateError, Result};
use crate::retry::is_sentinel;
use crate::types::{AnnotationRecord, ImageFile};

pub const HEADER: [&str; 5] = [
    "filename",
    "short_description",
    "long_description",
    "tags",
    "orientation",
];

/// File names already recorded in the ledger at `path`.
///
/// An absent or empty file has no records.
pub fn load_completed(path: &Path) -> Result<HashSet<String>> {
    if !has_content(path)? {
        return Ok(HashSet::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let column = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == "filename")
        .unwrap_or(0);

    let mut done = HashSet::new();
    for row in reader.records() {
        let row = row?;
        if let Some(name) = row.get(column).filter(|n| !n.is_empty()) {
            done.insert(name.to_string());
        }
    }
    Ok(done)
}

/// Files from `files` not yet in `completed`, in scan order.
pub fn pending(files: Vec<ImageFile>, completed: &HashSet<String>) -> Vec<ImageFile> {
    files
        .into_iter()
        .filter(|f| !completed.contains(&f.filename))
        .collect()
}

/// Read every record of the ledger at `path`.
pub fn read_records(path: &Path) -> Result<Vec<AnnotationRecord>> {
    if !has_content(path)? {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Drop sentinel rows from the ledger so those files are analyzed again.
///
/// Surviving rows are written to a temporary file beside the ledger, which
/// then replaces it atomically. Returns the number of rows removed.
pub fn purge_failed(path: &Path) -> Result<usize> {
    let records = read_records(path)?;
    let (failed, kept): (Vec<_>, Vec<_>) = records.into_iter().partition(is_sentinel);
    if failed.is_empty() {
        return Ok(0);
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| AnnotateError::io(&dir, e))?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file());
        writer.write_record(HEADER)?;
        for record in &kept {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| AnnotateError::io(tmp.path(), e))?;
    }
    // The temp file is created 0600; keep the ledger's own mode.
    let permissions = std::fs::metadata(path)
        .map_err(|e| AnnotateError::io(path, e))?
        .permissions();
    tmp.as_file()
        .set_permissions(permissions)
        .map_err(|e| AnnotateError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| AnnotateError::io(tmp.path(), e))?;

    tmp.persist(path).map_err(|e| AnnotateError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;

    Ok(failed.len())
}

fn has_content(path: &Path) -> Result<bool> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(AnnotateError::io(path, e)),
    }
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path).map_err(|e| AnnotateError::io(path, e))?;
    file.seek(SeekFrom::End(-1))
        .map_err(|e| AnnotateError::io(path, e))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)
        .map_err(|e| AnnotateError::io(path, e))?;
    Ok(last[0] == b'\n')
}

/// Append-only writer that makes every record durable before returning.
pub struct LedgerWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl LedgerWriter {
    /// Open the ledger for appending, creating parent directories as
    /// needed. The header is written only if the file is new or empty.
    /// A ledger whose last row lacks a line terminator (e.g. after a hand
    /// edit) gets one before anything is appended.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AnnotateError::io(parent, e))?;
        }

        let write_header = !has_content(path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AnnotateError::io(path, e))?;

        if !write_header && !ends_with_newline(path)? {
            (&file)
                .write_all(b"\n")
                .map_err(|e| AnnotateError::io(path, e))?;
        }

        let mut ledger = Self {
            path: path.to_path_buf(),
            writer: csv::WriterBuilder::new().has_headers(false).from_writer(file),
        };

        if write_header {
            ledger.writer.write_record(HEADER)?;
            ledger.sync()?;
        }
        Ok(ledger)
    }

    /// Append one record, then flush and sync it to disk.
    pub fn append(&mut self, record: &AnnotationRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.sync()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| AnnotateError::io(&self.path, e))?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(|e| AnnotateError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::sentinel;
    use crate::types::{Analysis, MediaType, Orientation};

    fn record(name: &str) -> AnnotationRecord {
        AnnotationRecord::new(
            name,
            Analysis {
                short_description: "A tree, at dusk.".into(),
                long_description: "Line one.\nLine \"two\".".into(),
                tags: "tree, dusk".into(),
            },
            Some(Orientation::Landscape),
        )
    }

    fn image(name: &str) -> ImageFile {
        ImageFile {
            filename: name.to_string(),
            path: PathBuf::from(name),
            media_type: MediaType::Png,
        }
    }

    fn header_count(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| *l == HEADER.join(","))
            .count()
    }

    #[test]
    fn header_written_once_for_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("ledger.csv");

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("a.png")).unwrap();
        drop(writer);

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("b.png")).unwrap();
        drop(writer);

        assert_eq!(header_count(&path), 1);
        assert_eq!(read_records(&path).unwrap().len(), 2);
    }

    #[test]
    fn header_written_for_zero_byte_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, b"").unwrap();

        LedgerWriter::open(&path).unwrap();
        assert_eq!(header_count(&path), 1);
    }

    #[test]
    fn append_round_trips_quoted_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("a.png")).unwrap();
        writer
            .append(&AnnotationRecord::new("b.png", sentinel("boom"), None))
            .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records[0], record("a.png"));
        assert_eq!(records[1].orientation, None);
    }

    #[test]
    fn load_completed_tolerates_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        assert!(load_completed(&path).unwrap().is_empty());

        std::fs::write(&path, b"").unwrap();
        assert!(load_completed(&path).unwrap().is_empty());
    }

    #[test]
    fn load_completed_finds_filename_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, "tags,filename\n\"a, b\",one.png\nc,two.jpg\n").unwrap();

        let done = load_completed(&path).unwrap();
        assert_eq!(done.len(), 2);
        assert!(done.contains("one.png"));
        assert!(done.contains("two.jpg"));
    }

    #[test]
    fn pending_keeps_scan_order() {
        let files = vec![image("a.png"), image("b.png"), image("c.png")];
        let done: HashSet<String> = ["b.png".to_string()].into_iter().collect();
        let names: Vec<String> = pending(files, &done).into_iter().map(|f| f.filename).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
    }

    #[test]
    fn purge_failed_removes_only_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("a.png")).unwrap();
        writer
            .append(&AnnotationRecord::new("b.png", sentinel("429"), None))
            .unwrap();
        writer.append(&record("c.png")).unwrap();
        drop(writer);

        assert_eq!(purge_failed(&path).unwrap(), 1);

        let names: Vec<String> = read_records(&path)
            .unwrap()
            .into_iter()
            .map(|r| r.filename)
            .collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert_eq!(header_count(&path), 1);

        assert_eq!(purge_failed(&path).unwrap(), 0);
    }

    #[test]
    fn append_after_unterminated_last_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(
            &path,
            format!("{}\nold.png,s,l,t,portrait", HEADER.join(",")),
        )
        .unwrap();

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("a.png")).unwrap();
        drop(writer);

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].filename, "old.png");
        assert_eq!(records[0].orientation, Some(Orientation::Portrait));
        assert_eq!(records[1], record("a.png"));

        let done = load_completed(&path).unwrap();
        assert!(done.contains("old.png"));
        assert!(done.contains("a.png"));
        assert_eq!(header_count(&path), 1);
    }

    #[test]
    fn terminated_ledger_gets_no_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("a.png")).unwrap();
        drop(writer);
        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("b.png")).unwrap();
        drop(writer);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("\n\n"));
    }

    #[cfg(unix)]
    #[test]
    fn purge_failed_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut writer = LedgerWriter::open(&path).unwrap();
        writer.append(&record("a.png")).unwrap();
        writer
            .append(&AnnotationRecord::new("b.png", sentinel("500"), None))
            .unwrap();
        drop(writer);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(purge_failed(&path).unwrap(), 1);

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn purge_failed_on_missing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(purge_failed(&dir.path().join("none.csv")).unwrap(), 0);
    }
}
