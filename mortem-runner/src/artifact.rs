// Copyright (c) The mortem Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loading on-disk artifacts and extracting facts from them.
//!
//! Artifacts are frequently missing, and are sometimes compressed after the fact. Every lookup
//! therefore returns an [`Option`]: absence is normal, and never an error.

use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use regex::bytes::{Regex, RegexBuilder};
use std::{cell::RefCell, collections::HashMap, fs, io::Read};
use tracing::debug;

/// The ways an artifact may be stored on disk, tried in order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ArtifactEncoding {
    /// Stored as-is.
    Plain,
    /// Compressed with gzip, with a `.gz` suffix.
    Gzip,
    /// Compressed with bzip2, with a `.bz2` suffix.
    Bzip2,
}

impl ArtifactEncoding {
    /// All encodings, in the order they are tried.
    pub const ALL: [Self; 3] = [Self::Plain, Self::Gzip, Self::Bzip2];

    /// The file name suffix for this encoding.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
        }
    }

    fn decode(self, raw: Vec<u8>) -> std::io::Result<Vec<u8>> {
        let mut decoded = Vec::new();
        match self {
            Self::Plain => return Ok(raw),
            Self::Gzip => {
                flate2::read::MultiGzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
            }
            Self::Bzip2 => {
                bzip2::read::MultiBzDecoder::new(raw.as_slice()).read_to_end(&mut decoded)?;
            }
        }
        Ok(decoded)
    }
}

/// A memoizing loader for the artifacts in an output directory.
///
/// Each path is probed at most once; that includes paths that turn out to be absent.
#[derive(Debug)]
pub struct ArtifactCache {
    output_directory: Utf8PathBuf,
    contents: RefCell<HashMap<Utf8PathBuf, Option<Bytes>>>,
}

impl ArtifactCache {
    /// Creates a new cache, resolving file names against `output_directory`.
    pub fn new(output_directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            output_directory: output_directory.into(),
            contents: RefCell::new(HashMap::new()),
        }
    }

    /// The directory file names are resolved against.
    pub fn output_directory(&self) -> &Utf8Path {
        &self.output_directory
    }

    /// Returns the contents of `path`, loading `path`, `path.gz` or `path.bz2`, whichever is
    /// found first.
    ///
    /// Returns `None` if none exist or the artifact can't be read or decoded.
    pub fn contents_of(&self, path: &Utf8Path) -> Option<Bytes> {
        if let Some(contents) = self.contents.borrow().get(path) {
            return contents.clone();
        }
        let contents = load(path);
        self.contents
            .borrow_mut()
            .insert(path.to_owned(), contents.clone());
        contents
    }

    /// Returns the contents of `file_name` in the output directory.
    pub fn file_contents(&self, file_name: &str) -> Option<Bytes> {
        self.contents_of(&self.output_directory.join(file_name))
    }

    /// Searches `file_name` in the output directory for `pattern`. See [`grep`].
    pub fn grub(&self, file_name: &str, pattern: &Regex) -> Option<String> {
        debug!("grubbing '{file_name}' for '{pattern}'");
        grep(&self.file_contents(file_name)?, pattern)
    }

    /// Searches `file_name` in the output directory for `pattern`, converting the match with
    /// `cast`. See [`grep_as`].
    pub fn grub_as<T>(
        &self,
        file_name: &str,
        pattern: &Regex,
        cast: impl FnOnce(&str) -> Option<T>,
    ) -> Option<T> {
        debug!("grubbing '{file_name}' for '{pattern}'");
        grep_as(&self.file_contents(file_name)?, pattern, cast)
    }
}

fn load(path: &Utf8Path) -> Option<Bytes> {
    debug!("loading contents of '{path}'");
    for encoding in ArtifactEncoding::ALL {
        let candidate = Utf8PathBuf::from(format!("{path}{}", encoding.suffix()));
        if !candidate.is_file() {
            continue;
        }
        debug!("loading '{candidate}' into cache");
        let decoded = fs::read(&candidate).and_then(|raw| encoding.decode(raw));
        return match decoded {
            Ok(contents) => {
                debug!("loaded {} bytes from '{candidate}'", contents.len());
                Some(contents.into())
            }
            Err(error) => {
                debug!("failed to load '{candidate}', treating it as missing: {error}");
                None
            }
        };
    }
    None
}

/// Searches `contents` for `pattern`, returning the text of the last capture group of the first
/// match, or the whole match if the pattern has no groups.
///
/// Returns `None` if there's no match.
pub fn grep(contents: &[u8], pattern: &Regex) -> Option<String> {
    grep_as(contents, pattern, |text| Some(text.to_owned()))
}

/// Like [`grep`], but converts the matched text with `cast`.
///
/// A failed conversion is treated the same as no match.
pub fn grep_as<T>(
    contents: &[u8],
    pattern: &Regex,
    cast: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let captures = pattern.captures(contents)?;
    let group = captures
        .get(captures.len() - 1)
        .or_else(|| captures.get(0))?;
    let text = String::from_utf8_lossy(group.as_bytes());
    debug!("grep '{pattern}' matched '{text}'");
    cast(&text)
}

/// Builds a multi-line, byte-oriented regex: `^` and `$` match at line boundaries, and character
/// classes match bytes rather than Unicode scalar values.
pub fn bytes_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .unicode(false)
        .build()
}
