// src/source.rs
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Sequential reader over one line-oriented input
pub trait LineSource {
    /// Next line without its terminator, or `None` once the source is exhausted
    fn next_line(&mut self) -> Option<String>;
    /// Number of lines returned so far
    fn line_number(&self) -> usize;
    fn is_exhausted(&self) -> bool;
    fn name(&self) -> &str;
}

/// Line source over any buffered reader
pub struct ReaderLineSource<R> {
    name: String,
    reader: R,
    line_number: usize,
    exhausted: bool,
    buffer: Vec<u8>,
}

impl<R: BufRead> ReaderLineSource<R> {
    pub fn new(name: impl Into<String>, reader: R) -> Self {
        ReaderLineSource {
            name: name.into(),
            reader,
            line_number: 0,
            exhausted: false,
            buffer: Vec::new(),
        }
    }
}

pub type FileLineSource = ReaderLineSource<BufReader<File>>;

impl FileLineSource {
    pub fn open(path: &Path, buffer_size: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(ReaderLineSource::new(
            path.display().to_string(),
            BufReader::with_capacity(buffer_size, file),
        ))
    }
}

impl<R: BufRead> LineSource for ReaderLineSource<R> {
    fn next_line(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }

        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => {
                self.exhausted = true;
                None
            }
            Ok(_) => {
                if self.buffer.last() == Some(&b'\n') {
                    self.buffer.pop();
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                }
                self.line_number += 1;
                Some(String::from_utf8_lossy(&self.buffer).into_owned())
            }
            Err(e) => {
                // Never retried: a failing source is done for this run
                warn!(
                    source = %self.name,
                    line = self.line_number,
                    error = %e,
                    "read failed, treating input as exhausted"
                );
                self.exhausted = true;
                None
            }
        }
    }

    fn line_number(&self) -> usize {
        self.line_number
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Open every input, warning about and skipping the ones that cannot be opened.
///
/// The path `-` reads standard input. Only its first occurrence is used.
pub fn open_sources(paths: &[PathBuf], buffer_size: usize) -> Vec<Box<dyn LineSource>> {
    let mut sources: Vec<Box<dyn LineSource>> = Vec::with_capacity(paths.len());
    let mut stdin_taken = false;

    for path in paths {
        if path.as_os_str() == "-" {
            if stdin_taken {
                warn!("standard input given more than once, skipping repeat");
                continue;
            }
            stdin_taken = true;
            sources.push(Box::new(ReaderLineSource::new(
                "<stdin>",
                BufReader::with_capacity(buffer_size, io::stdin()),
            )));
            continue;
        }

        match FileLineSource::open(path, buffer_size) {
            Ok(source) => sources.push(Box::new(source)),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to open input, skipping"),
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn drain(source: &mut dyn LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = source.next_line() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_strips_terminators_and_counts_lines() {
        let mut source = ReaderLineSource::new("test", Cursor::new("a\nb\r\nc"));
        assert_eq!(source.line_number(), 0);
        assert!(!source.is_exhausted());

        assert_eq!(drain(&mut source), vec!["a", "b", "c"]);
        assert_eq!(source.line_number(), 3);
        assert!(source.is_exhausted());
        assert_eq!(source.next_line(), None);
    }

    #[test]
    fn test_empty_lines_are_kept() {
        let mut source = ReaderLineSource::new("test", Cursor::new("\n\nx\n"));
        assert_eq!(drain(&mut source), vec!["", "", "x"]);
    }

    #[test]
    fn test_invalid_utf8_does_not_end_stream() {
        let bytes: &[u8] = b"ok\n\xff\xfe bad\nafter\n";
        let mut source = ReaderLineSource::new("bytes", Cursor::new(bytes));
        let lines = drain(&mut source);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with(" bad"));
        assert_eq!(lines[2], "after");
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
            }
            self.served = true;
            let data = b"first\n";
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }
    }

    #[test]
    fn test_read_error_exhausts_source() {
        let reader = BufReader::new(FailingReader { served: false });
        let mut source = ReaderLineSource::new("failing", reader);

        assert_eq!(source.next_line().as_deref(), Some("first"));
        assert_eq!(source.next_line(), None);
        assert!(source.is_exhausted());
        // Stays exhausted, no retry
        assert_eq!(source.next_line(), None);
        assert_eq!(source.line_number(), 1);
    }

    #[test]
    fn test_open_sources_skips_missing_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"line\n").unwrap();

        let paths = vec![
            PathBuf::from("/definitely/not/here.log"),
            file.path().to_path_buf(),
        ];
        let mut sources = open_sources(&paths, 1024);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), file.path().display().to_string());
        assert_eq!(sources[0].next_line().as_deref(), Some("line"));
    }

    #[test]
    fn test_open_sources_reads_stdin_once() {
        let paths = vec![PathBuf::from("-"), PathBuf::from("-")];
        let sources = open_sources(&paths, 1024);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name(), "<stdin>");
    }
}
