//! TDirectory parsing and key-list navigation.

use crate::error::Result;
use crate::key::Key;
use crate::rbuffer::RBuffer;

/// Class names ROOT uses for directory keys.
pub const DIRECTORY_CLASSES: [&str; 2] = ["TDirectoryFile", "TDirectory"];

/// A parsed TDirectory: an ordered list of TKeys.
#[derive(Debug, Clone)]
pub struct Directory {
    keys: Vec<Key>,
}

/// Seek fields of a TDirectory streamer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Class version (> 1000 means 64-bit seeks).
    pub version: u16,
    /// Size of the key list.
    pub nbytes_keys: u32,
    /// Size of the directory's name record.
    pub nbytes_name: u32,
    /// Position of the directory itself.
    pub seek_dir: u64,
    /// Position of the parent directory.
    pub seek_parent: u64,
    /// Position of the key list.
    pub seek_keys: u64,
}

impl DirectoryRecord {
    /// Parse the TDirectory streamer at the reader's position.
    pub fn read(r: &mut RBuffer) -> Result<Self> {
        let version = r.read_u16()?;
        let _datime_c = r.read_u32()?;
        let _datime_m = r.read_u32()?;
        let nbytes_keys = r.read_u32()?;
        let nbytes_name = r.read_u32()?;

        let (seek_dir, seek_parent, seek_keys) = if version > 1000 {
            (r.read_u64()?, r.read_u64()?, r.read_u64()?)
        } else {
            (r.read_u32()? as u64, r.read_u32()? as u64, r.read_u32()? as u64)
        };

        Ok(Self { version, nbytes_keys, nbytes_name, seek_dir, seek_parent, seek_keys })
    }
}

impl Directory {
    /// Read the key list from the file at `seek_keys`.
    ///
    /// The key list starts with a TKey header for the list itself, then
    /// a u32 `nkeys`, followed by `nkeys` TKey records.
    pub fn read_key_list(file_data: &[u8], seek_keys: usize, is_large: bool) -> Result<Self> {
        let mut r = RBuffer::new(file_data);
        r.set_pos(seek_keys);

        let _list_key = Key::read(&mut r, is_large)?;
        let nkeys = r.read_u32()? as usize;

        // Each key header is at least 26 bytes; guards against corrupt counts.
        let mut keys = Vec::with_capacity(nkeys.min(r.remaining() / 26));
        for _ in 0..nkeys {
            keys.push(Key::read(&mut r, is_large)?);
        }

        log::debug!("directory at {seek_keys}: {} keys", keys.len());
        Ok(Directory { keys })
    }

    /// Read a directory from the decompressed payload of a TDirectoryFile key.
    pub fn read_from_payload(payload: &[u8], is_large: bool, file_data: &[u8]) -> Result<Self> {
        let record = DirectoryRecord::read(&mut RBuffer::new(payload))?;
        if record.seek_keys == 0 {
            return Ok(Directory { keys: Vec::new() });
        }
        Self::read_key_list(file_data, record.seek_keys as usize, is_large)
    }

    /// Access the list of keys.
    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    /// Take ownership of the key list.
    pub fn into_keys(self) -> Vec<Key> {
        self.keys
    }

    /// Find a key by name (returns the highest cycle).
    pub fn find_key(&self, name: &str) -> Option<&Key> {
        self.keys.iter().filter(|k| k.name == name).max_by_key(|k| k.cycle)
    }

    /// Keys holding objects of `class_name`, in key-list order.
    pub fn keys_of_class<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a Key> + 'a {
        self.keys.iter().filter(move |k| k.class_name == class_name)
    }
}
