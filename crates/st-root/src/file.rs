//! TFile header parsing and top-level ROOT file interface.

use std::fs;
use std::path::{Path, PathBuf};

use crate::compress::decompress;
use crate::datasource::DataSource;
use crate::directory::{DIRECTORY_CLASSES, Directory, DirectoryRecord};
use crate::error::{Result, RootError};
use crate::histogram::Histogram;
use crate::key::{Key, KeyInfo};
use crate::objects;
use crate::rbuffer::RBuffer;

/// Magic bytes at the start of every ROOT file.
pub const ROOT_MAGIC: &[u8; 4] = b"root";

/// Smallest file that can hold a complete header.
const MIN_FILE_LEN: usize = 64;

/// Parsed ROOT file header.
#[derive(Debug, Clone, Copy)]
struct FileHeader {
    /// Format version (>= 1_000_000 means 64-bit seeks).
    version: u32,
    /// Offset of the first data record (the file's own TKey).
    begin: u64,
    /// Whether the file uses large (64-bit) seek pointers.
    is_large: bool,
    /// Offset where top-level directory keys are stored.
    seek_keys: u64,
}

/// A ROOT file opened for reading histograms and keyed objects.
pub struct RootFile {
    /// Raw file bytes (owned or memory-mapped).
    data: DataSource,
    header: FileHeader,
    path: PathBuf,
}

impl RootFile {
    /// Open and parse a ROOT file from disk using memory mapping.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = fs::File::open(&path)?;
        // SAFETY: the mapping is read-only; a file truncated by another
        // process while mapped is outside what this reader supports.
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        log::debug!("opened {} ({} bytes)", path.display(), mmap.len());
        Self::from_datasource(DataSource::Mmap(mmap), path)
    }

    /// Parse a ROOT file held in memory.
    pub fn from_bytes(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        Self::from_datasource(DataSource::Owned(data), path)
    }

    fn from_datasource(data: DataSource, path: PathBuf) -> Result<Self> {
        if data.len() < MIN_FILE_LEN || &data[0..4] != ROOT_MAGIC {
            return Err(RootError::BadMagic);
        }
        let header = Self::parse_header(&data)?;
        Ok(Self { data, header, path })
    }

    /// Parse the file-level header and the embedded top TDirectory.
    ///
    /// ROOT file header layout (small file, version < 1000000):
    /// ```text
    /// offset  size  field
    ///    0      4   magic "root"
    ///    4      4   fVersion
    ///    8      4   fBEGIN
    ///   12      4   fEND
    ///   16      4   fSeekFree
    ///   20      4   fNbytesFree
    ///   24      4   nfree
    ///   28      4   fNbytesName
    ///   32      1   fUnits
    ///   33      4   fCompress
    ///   37      4   fSeekInfo
    ///   41      4   fNbytesInfo
    ///   45     18   fUUID
    /// ```
    /// Large files widen fEND, fSeekFree and fSeekInfo to 8 bytes.
    /// The TDirectory streamer is located at `fBEGIN + fNbytesName`.
    fn parse_header(data: &[u8]) -> Result<FileHeader> {
        let mut r = RBuffer::new(data);
        r.skip(4)?;

        let version = r.read_u32()?;
        let is_large = version >= 1_000_000;
        let begin = r.read_u32()? as u64;
        if is_large {
            r.skip(16)?; // fEND, fSeekFree
        } else {
            r.skip(8)?;
        }
        let _nbytes_free = r.read_u32()?;
        let _nfree = r.read_u32()?;
        let nbytes_name = r.read_u32()? as u64;

        let dir_offset = begin + nbytes_name;
        if dir_offset >= data.len() as u64 {
            return Err(RootError::Deserialization("TDirectory offset past end of file".into()));
        }
        r.set_pos(dir_offset as usize);
        let dir = DirectoryRecord::read(&mut r)?;

        Ok(FileHeader { version, begin, is_large, seek_keys: dir.seek_keys })
    }

    /// Path this file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// ROOT format version from the header.
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// Whether file uses 64-bit seek pointers.
    pub fn is_large(&self) -> bool {
        self.header.is_large
    }

    /// Offset of the first data record.
    pub fn begin(&self) -> u64 {
        self.header.begin
    }

    /// List all keys in the top-level directory, in key-list order.
    pub fn list_keys(&self) -> Result<Vec<KeyInfo>> {
        let dir = self.read_top_directory()?;
        Ok(dir.keys().iter().map(KeyInfo::from_key).collect())
    }

    /// Raw top-level keys, in key-list order. Pair with [`Self::read_payload`]
    /// to stream many objects without re-reading the key list.
    pub fn top_keys(&self) -> Result<Vec<Key>> {
        Ok(self.read_top_directory()?.into_keys())
    }

    /// Top-level keys holding objects of `class_name`, in key-list order.
    pub fn keys_of_class(&self, class_name: &str) -> Result<Vec<KeyInfo>> {
        let dir = self.read_top_directory()?;
        Ok(dir.keys_of_class(class_name).map(KeyInfo::from_key).collect())
    }

    /// Get a histogram or profile by its full path (e.g. `"subdir/hist_name"`).
    pub fn get_histogram(&self, path: &str) -> Result<Histogram> {
        let key = self.resolve_key(path)?;
        let payload = self.read_payload(&key)?;
        objects::read_histogram(&payload, &key.class_name).map_err(|e| match e {
            RootError::Deserialization(msg) => {
                RootError::Deserialization(format!("{path}: {msg}"))
            }
            other => other,
        })
    }

    /// Decompressed payload of the object at `path`, with its key info.
    pub fn read_object(&self, path: &str) -> Result<(KeyInfo, Vec<u8>)> {
        let key = self.resolve_key(path)?;
        let payload = self.read_payload(&key)?;
        Ok((KeyInfo::from_key(&key), payload))
    }

    /// Decompressed payload of a specific cycle of a top-level key.
    pub fn read_object_cycle(&self, name: &str, cycle: u16) -> Result<Vec<u8>> {
        let dir = self.read_top_directory()?;
        let key = dir
            .keys()
            .iter()
            .find(|k| k.name == name && k.cycle == cycle)
            .ok_or_else(|| RootError::KeyNotFound(format!("{name};{cycle}")))?;
        self.read_payload(key)
    }

    fn read_top_directory(&self) -> Result<Directory> {
        Directory::read_key_list(&self.data, self.header.seek_keys as usize, self.header.is_large)
    }

    /// Walk `a/b/name` through subdirectories to the object key.
    fn resolve_key(&self, path: &str) -> Result<Key> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((&leaf, dirs)) = parts.split_last() else {
            return Err(RootError::KeyNotFound(path.to_string()));
        };

        let mut current = self.read_top_directory()?;
        for &part in dirs {
            let key = current
                .find_key(part)
                .ok_or_else(|| RootError::KeyNotFound(format!("{part} (in path {path})")))?;

            if !DIRECTORY_CLASSES.contains(&key.class_name.as_str()) {
                return Err(RootError::Deserialization(format!(
                    "'{}' is not a directory (class: {})",
                    part, key.class_name
                )));
            }

            let payload = self.read_payload(key)?;
            current = Directory::read_from_payload(&payload, self.header.is_large, &self.data)?;
        }

        current.find_key(leaf).cloned().ok_or_else(|| RootError::KeyNotFound(path.to_string()))
    }

    /// Read and decompress the payload of a TKey.
    pub fn read_payload(&self, key: &Key) -> Result<Vec<u8>> {
        read_key_payload_from(&self.data, key)
    }
}

pub(crate) fn read_key_payload_from(data: &[u8], key: &Key) -> Result<Vec<u8>> {
    let seek = key.seek_key as usize;
    let n_bytes = key.n_bytes as usize;
    let key_len = key.key_len as usize;
    if seek.saturating_add(n_bytes) > data.len() {
        return Err(RootError::BufferUnderflow {
            offset: seek,
            need: n_bytes,
            have: data.len().saturating_sub(seek),
        });
    }
    if key_len > n_bytes {
        return Err(RootError::Deserialization(format!(
            "key '{}' header ({key_len} bytes) larger than record ({n_bytes} bytes)",
            key.name
        )));
    }

    let stored = &data[seek + key_len..seek + n_bytes];
    if key.obj_len as usize != stored.len() {
        decompress(stored, key.obj_len as usize)
    } else {
        Ok(stored.to_vec())
    }
}
