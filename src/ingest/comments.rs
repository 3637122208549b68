// src/ingest/comments.rs

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// How many leading lines are inspected when deciding whether to strip comments.
pub const COMMENT_SCAN_LINES: usize = 10;
pub const COMMENT_MARKER: &[u8] = b"//";

fn is_comment(line: &[u8]) -> bool {
    line.trim_ascii_start().starts_with(COMMENT_MARKER)
}

/// True when any of the first `COMMENT_SCAN_LINES` lines starts with `//`.
pub fn has_comment_lines<R: BufRead>(reader: R) -> io::Result<bool> {
    for line in reader.split(b'\n').take(COMMENT_SCAN_LINES) {
        if is_comment(&line?) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Line-oriented pass-through that drops `//` comment lines when `strip` is set.
///
/// The source is never rewritten; filtering happens on the byte stream handed to
/// the CSV tokenizer.
pub struct CommentFilter<R> {
    inner: R,
    line: Vec<u8>,
    pos: usize,
    strip: bool,
}

impl<R: BufRead> CommentFilter<R> {
    pub fn new(inner: R, strip: bool) -> Self {
        Self {
            inner,
            line: Vec::new(),
            pos: 0,
            strip,
        }
    }

    pub fn strips_comments(&self) -> bool {
        self.strip
    }
}

impl CommentFilter<BufReader<File>> {
    /// Open `path`, probing its head for comment lines first.
    pub fn open(path: &Path) -> io::Result<Self> {
        let strip = has_comment_lines(BufReader::new(File::open(path)?))?;
        Ok(Self::new(BufReader::new(File::open(path)?), strip))
    }
}

impl<R: BufRead> Read for CommentFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.line.len() {
            self.line.clear();
            self.pos = 0;
            if self.inner.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(0);
            }
            if self.strip && is_comment(&self.line) {
                self.line.clear();
            }
        }

        let n = (self.line.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.line[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
