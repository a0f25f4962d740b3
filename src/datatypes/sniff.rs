/// Content sniffing helpers
///
/// Reads bounded, gzip-aware prefixes of dataset files and splits leading
/// lines into header fields for metadata extraction.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Number of (decompressed) bytes examined when sniffing a file
pub const SNIFF_PREFIX_BYTES: usize = 1024 * 1024;

/// Default maximum number of header lines returned by [`get_headers`]
pub const DEFAULT_HEADER_COUNT: usize = 60;

/// Number of lines shown in a dataset peek
pub const PEEK_LINE_COUNT: usize = 5;

/// Maximum characters kept per peek line
pub const PEEK_WIDTH: usize = 256;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Leading content of a file used for format detection
#[derive(Debug, Clone)]
pub struct FilePrefix {
    raw: Vec<u8>,
    text: String,
    compressed: bool,
}

impl FilePrefix {
    /// Read the prefix of a file, transparently decompressing gzip content
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let mut head = Vec::with_capacity(2);
        File::open(path)?.take(2).read_to_end(&mut head)?;

        let compressed = head == GZIP_MAGIC;
        let file = File::open(path)?;
        let raw = if compressed {
            read_up_to(GzDecoder::new(file), SNIFF_PREFIX_BYTES)
        } else {
            read_up_to(file, SNIFF_PREFIX_BYTES)
        };

        Ok(Self::from_raw(raw, compressed))
    }

    /// Build a prefix from in-memory content (gzip content is decompressed)
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&GZIP_MAGIC) {
            Self::from_raw(read_up_to(GzDecoder::new(bytes), SNIFF_PREFIX_BYTES), true)
        } else {
            let end = bytes.len().min(SNIFF_PREFIX_BYTES);
            Self::from_raw(bytes[..end].to_vec(), false)
        }
    }

    fn from_raw(raw: Vec<u8>, compressed: bool) -> Self {
        let text = String::from_utf8_lossy(&raw).into_owned();
        Self {
            raw,
            text,
            compressed,
        }
    }

    pub fn starts_with(&self, needle: &str) -> bool {
        self.text.starts_with(needle)
    }

    /// Lines of the prefix without their terminators
    pub fn line_iterator(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Content containing NUL bytes is treated as binary
    pub fn is_binary(&self) -> bool {
        self.raw.contains(&0)
    }
}

/// Read at most `limit` bytes, keeping whatever was decoded before an error.
/// A truncated gzip member still yields its readable prefix.
fn read_up_to<R: Read>(reader: R, limit: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut reader = reader.take(limit as u64);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!("Stopped reading sniff prefix after {} bytes: {}", out.len(), e);
                break;
            }
        }
    }
    out
}

/// Open a file for line-wise reading, decompressing gzip content
pub fn open_text_reader(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let mut head = Vec::with_capacity(2);
    File::open(path)?.take(2).read_to_end(&mut head)?;

    let file = File::open(path)?;
    if head == GZIP_MAGIC {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read the next line (lossy UTF-8) without its line terminator
fn next_line(reader: &mut dyn BufRead, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(&['\n', '\r'][..]).to_string()))
}

/// Split leading lines of a file into header fields.
///
/// `sep` of `None` splits on runs of whitespace. Lines starting with the
/// comment designator are skipped and do not count toward `count`.
pub fn get_headers(
    path: &Path,
    sep: Option<&str>,
    count: usize,
    comment_designator: Option<&str>,
) -> io::Result<Vec<Vec<String>>> {
    let mut reader = open_text_reader(path)?;
    let mut buf = Vec::new();
    let mut headers = Vec::new();

    while let Some(line) = next_line(reader.as_mut(), &mut buf)? {
        if let Some(comment) = comment_designator.filter(|c| !c.is_empty()) {
            if line.starts_with(comment) {
                continue;
            }
        }

        let fields: Vec<String> = match sep {
            Some(sep) => line.split(sep).map(str::to_string).collect(),
            None => line.split_whitespace().map(str::to_string).collect(),
        };
        headers.push(fields);

        if headers.len() == count {
            break;
        }
    }

    Ok(headers)
}

/// First lines of a file for display, or "binary data"
pub fn get_file_peek(path: &Path) -> io::Result<String> {
    if FilePrefix::from_path(path)?.is_binary() {
        return Ok("binary data".to_string());
    }

    let mut reader = open_text_reader(path)?;
    let mut buf = Vec::new();
    let mut lines = Vec::with_capacity(PEEK_LINE_COUNT);

    while lines.len() < PEEK_LINE_COUNT {
        match next_line(reader.as_mut(), &mut buf)? {
            Some(line) => lines.push(line.chars().take(PEEK_WIDTH).collect::<String>()),
            None => break,
        }
    }

    Ok(lines.join("\n"))
}
