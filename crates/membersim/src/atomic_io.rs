//! Atomic output files.
//!
//! Cohorts are streamed into a hidden sibling file and then renamed over
//! the target, so a reader never sees a half-written cohort.

use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use cap_std::fs::{Dir, File, OpenOptions};

use crate::cohort_cli::CliError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A buffered temp file that replaces its target on [`AtomicFile::commit`].
///
/// Dropping the file without committing removes the temp file and leaves
/// the target untouched.
pub(crate) struct AtomicFile<'d> {
    dir: &'d Dir,
    path: Utf8PathBuf,
    file_name: String,
    tmp_name: String,
    writer: Option<BufWriter<File>>,
}

impl<'d> AtomicFile<'d> {
    /// Opens a temp file next to `path` inside `dir`.
    ///
    /// `path` must be a bare file name; the caller opens its parent as `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::WriteError`] if `path` is not a file name or the
    /// temp file cannot be created.
    pub(crate) fn create(dir: &'d Dir, path: &Utf8Path) -> Result<Self, CliError> {
        let mut components = path.components();
        let (Some(Utf8Component::Normal(file_name)), None) =
            (components.next(), components.next())
        else {
            return Err(write_error(path, "output path must be a file name"));
        };

        let tmp_name = temp_name(file_name);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        let file = dir
            .open_with(&tmp_name, &options)
            .map_err(|err| write_error(path, err))?;

        Ok(Self {
            dir,
            path: path.to_path_buf(),
            file_name: file_name.to_owned(),
            tmp_name,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Flushes, syncs and renames the temp file over the target.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::WriteError`] if the data cannot be flushed or the
    /// rename fails. The temp file is removed in either case.
    pub(crate) fn commit(mut self) -> Result<(), CliError> {
        let Some(writer) = self.writer.take() else {
            return Err(write_error(&self.path, "output already closed"));
        };
        let file = writer
            .into_inner()
            .map_err(|err| write_error(&self.path, err.error()))?;
        file.sync_all().map_err(|err| write_error(&self.path, err))?;
        drop(file);

        replace_target(self.dir, &self.tmp_name, &self.file_name)
            .map_err(|err| write_error(&self.path, err))?;
        // Renamed; nothing left for Drop to discard.
        self.tmp_name.clear();
        sync_directory(self.dir);
        Ok(())
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| io::Error::other("output already closed"))
    }
}

impl Write for AtomicFile<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for AtomicFile<'_> {
    fn drop(&mut self) {
        drop(self.writer.take());
        if !self.tmp_name.is_empty() && self.dir.remove_file(&self.tmp_name).is_err() {
            // Leftover temp files are hidden and harmless.
        }
    }
}

fn write_error(path: &Utf8Path, message: impl ToString) -> CliError {
    CliError::WriteError {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn temp_name(file_name: &str) -> String {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    format!(".{file_name}.{}.{nanos}.{counter}.tmp", std::process::id())
}

#[cfg(windows)]
fn replace_target(dir: &Dir, tmp_name: &str, file_name: &str) -> io::Result<()> {
    // Rename does not overwrite on Windows.
    match dir.remove_file(file_name) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }
    dir.rename(tmp_name, dir, file_name)
}

#[cfg(not(windows))]
fn replace_target(dir: &Dir, tmp_name: &str, file_name: &str) -> io::Result<()> {
    dir.rename(tmp_name, dir, file_name)
}

fn sync_directory(dir: &Dir) {
    if dir.open(".").and_then(|handle| handle.sync_all()).is_err() {
        // Directory sync is best effort.
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use cap_std::ambient_authority;
    use rstest::rstest;

    use super::*;

    fn scratch_dir(name: &str) -> Dir {
        static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);
        let counter = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = format!(
            "target/membersim-tests/atomic-io-{name}-{}-{counter}",
            std::process::id()
        );
        let root = Dir::open_ambient_dir(".", ambient_authority()).expect("open workspace dir");
        root.create_dir_all(&path).expect("create scratch dir");
        root.open_dir(&path).expect("open scratch dir")
    }

    fn file_names(dir: &Dir) -> Vec<String> {
        let mut names: Vec<String> = dir
            .entries()
            .expect("list dir")
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn commit_replaces_existing_file() {
        let dir = scratch_dir("replace");
        dir.write("cohort.jsonl", "old\n").expect("seed file");

        let mut file = AtomicFile::create(&dir, Utf8Path::new("cohort.jsonl")).expect("create");
        file.write_all(b"new\n").expect("write");
        file.commit().expect("commit");

        let contents = dir.read_to_string("cohort.jsonl").expect("read back");
        assert_eq!(contents, "new\n");
        assert_eq!(file_names(&dir), vec!["cohort.jsonl".to_owned()]);
    }

    #[test]
    fn target_is_untouched_until_commit() {
        let dir = scratch_dir("pending");
        dir.write("cohort.jsonl", "old\n").expect("seed file");

        let mut file = AtomicFile::create(&dir, Utf8Path::new("cohort.jsonl")).expect("create");
        file.write_all(b"partial\n").expect("write");
        file.flush().expect("flush");

        let contents = dir.read_to_string("cohort.jsonl").expect("read back");
        assert_eq!(contents, "old\n");
        file.commit().expect("commit");
        let contents = dir.read_to_string("cohort.jsonl").expect("read back");
        assert_eq!(contents, "partial\n");
    }

    #[test]
    fn dropping_without_commit_discards_the_temp_file() {
        let dir = scratch_dir("abandon");
        dir.write("cohort.jsonl", "old\n").expect("seed file");

        {
            let mut file =
                AtomicFile::create(&dir, Utf8Path::new("cohort.jsonl")).expect("create");
            file.write_all(b"partial\n").expect("write");
        }

        assert_eq!(file_names(&dir), vec!["cohort.jsonl".to_owned()]);
        let contents = dir.read_to_string("cohort.jsonl").expect("read back");
        assert_eq!(contents, "old\n");
    }

    #[rstest]
    #[case("nested/cohort.jsonl")]
    #[case("../cohort.jsonl")]
    #[case("")]
    fn rejects_paths_that_are_not_file_names(#[case] path: &str) {
        let dir = scratch_dir("reject");

        let result = AtomicFile::create(&dir, Utf8Path::new(path));

        assert!(matches!(result, Err(CliError::WriteError { .. })));
    }
}
