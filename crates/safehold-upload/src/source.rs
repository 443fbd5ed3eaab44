// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload sources: what the validator needs to know about a candidate file.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// A candidate upload.  Only the first few bytes are ever read.
pub trait UploadSource {
    /// Name as supplied by the user.  Untrusted.
    fn file_name(&self) -> &str;
    /// MIME type as declared by the client.  Untrusted.
    fn declared_type(&self) -> &str;
    /// Size in bytes.
    fn size(&self) -> u64;
    /// Up to `len` leading bytes.
    fn read_head(&self, len: usize) -> io::Result<Vec<u8>>;
}

/// An upload already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryUpload {
    name: String,
    declared_type: String,
    bytes: Vec<u8>,
}

impl InMemoryUpload {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes,
        }
    }
}

impl UploadSource for InMemoryUpload {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn declared_type(&self) -> &str {
        &self.declared_type
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_head(&self, len: usize) -> io::Result<Vec<u8>> {
        Ok(self.bytes[..len.min(self.bytes.len())].to_vec())
    }
}

/// An upload backed by a file on disk.  The size comes from metadata taken
/// at open time; the head is read lazily.
#[derive(Debug, Clone)]
pub struct DiskUpload {
    path: PathBuf,
    name: String,
    declared_type: String,
    size: u64,
}

impl DiskUpload {
    /// Stat `path`.  The upload's name defaults to the path's final component.
    pub fn open(path: impl AsRef<Path>, declared_type: impl Into<String>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path,
            name,
            declared_type: declared_type.into(),
            size,
        })
    }

    /// Override the name reported to the validator.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UploadSource for DiskUpload {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn declared_type(&self) -> &str {
        &self.declared_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read_head(&self, len: usize) -> io::Result<Vec<u8>> {
        let mut head = Vec::with_capacity(len);
        File::open(&self.path)?
            .take(len as u64)
            .read_to_end(&mut head)?;
        Ok(head)
    }
}
