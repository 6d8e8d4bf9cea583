//! Writing small-format ROOT files with a flat top-level directory.
//!
//! File layout produced here:
//! ```text
//! 0            file header ("root", version, fBEGIN = 100, ...)
//! 100          TFile key + name/title + top TDirectory record
//! ...          one TKey + payload per object, in put order
//! fSeekKeys    key list: list TKey, u32 nkeys, object TKeys
//! fEND
//! ```

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::compress::compress_zlib;
use crate::error::{Result, RootError};
use crate::histogram::Histogram;
use crate::key::Key;
use crate::objects;
use crate::wbuffer::WBuffer;

/// ROOT format version written into the header (6.24, 32-bit seeks).
pub const WRITER_FORMAT_VERSION: u32 = 62400;

/// fBEGIN: offset of the first record.
const BEGIN: u64 = 100;

/// TDirectory class version for 32-bit seeks.
const DIRECTORY_VERSION: u16 = 5;

/// Size of the TDirectory record: fixed fields, UUID and 12 pad bytes.
const DIRECTORY_RECORD_LEN: usize = 2 + 4 + 4 + 4 + 4 + 4 + 4 + 4 + 18 + 12;

/// Largest offset a small-format file can address.
const MAX_SMALL_FILE: u64 = i32::MAX as u64;

struct PendingObject {
    key: Key,
    stored: Vec<u8>,
}

/// Accumulates objects and serializes them as one ROOT file.
pub struct RootFileWriter {
    file_name: String,
    title: String,
    compression: u32,
    datime: u32,
    objects: Vec<PendingObject>,
}

impl RootFileWriter {
    /// New writer; `file_name` is recorded in the file's own key.
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            title: String::new(),
            compression: 0,
            datime: datime_now(),
            objects: Vec::new(),
        }
    }

    /// Set the file title.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// zlib level for payloads (0 stores them uncompressed, 1-9 compress).
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level.min(9);
        self
    }

    /// Fix the packed timestamp written into every key.
    pub fn with_datime(mut self, datime: u32) -> Self {
        self.datime = datime;
        self
    }

    /// Number of objects queued.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no objects are queued.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Queue a histogram or profile under its own name.
    pub fn put_histogram(&mut self, h: &Histogram) -> Result<u16> {
        let mut w = WBuffer::with_capacity(256 + 8 * h.raw_cells().len() * 3);
        objects::write_histogram(&mut w, h)?;
        let (name, title, class) = (h.name.clone(), h.title.clone(), h.kind().class_name());
        self.put_object(&name, class, &title, w.as_slice())
    }

    /// Queue an already-streamed object. Returns the cycle it was given.
    pub fn put_object(&mut self, name: &str, class_name: &str, title: &str, payload: &[u8]) -> Result<u16> {
        let cycle = self.objects.iter().filter(|o| o.key.name == name).count() + 1;
        let cycle = u16::try_from(cycle)
            .map_err(|_| RootError::Serialization(format!("too many cycles of '{name}'")))?;
        let obj_len = u32::try_from(payload.len())
            .map_err(|_| RootError::Serialization(format!("'{name}' payload too large")))?;

        let stored = match self.compression {
            0 => None,
            level => compress_zlib(payload, level)?,
        }
        .unwrap_or_else(|| payload.to_vec());

        let mut key = Key::new(class_name, name, title, cycle, self.datime);
        key.obj_len = obj_len;
        key.n_bytes = (key.key_len as usize + stored.len()) as u32;
        key.seek_pdir = BEGIN;
        self.objects.push(PendingObject { key, stored });
        Ok(cycle)
    }

    /// Serialize the file.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut file_key = Key::new("TFile", &self.file_name, &self.title, 1, self.datime);
        let mut names = WBuffer::new();
        names.write_string(&self.file_name)?;
        names.write_string(&self.title)?;
        let nbytes_name = file_key.key_len as usize + names.len();
        let file_record_len = nbytes_name + DIRECTORY_RECORD_LEN;

        // Object records follow the file record.
        let mut body = WBuffer::new();
        let mut pos = BEGIN + file_record_len as u64;
        let mut keys = Vec::with_capacity(self.objects.len());
        for PendingObject { mut key, stored } in self.objects {
            key.seek_key = pos;
            key.write(&mut body)?;
            body.write_bytes(&stored);
            pos += key.n_bytes as u64;
            keys.push(key);
        }

        // Key list.
        let seek_keys = pos;
        let mut list_key = Key::new("TFile", &self.file_name, &self.title, 1, self.datime);
        list_key.seek_key = seek_keys;
        list_key.seek_pdir = BEGIN;
        let list_len = list_key.key_len as usize
            + 4
            + keys.iter().map(Key::header_len).sum::<usize>();
        list_key.n_bytes = list_len as u32;
        list_key.obj_len = (list_len - list_key.key_len as usize) as u32;
        list_key.write(&mut body)?;
        body.write_u32(keys.len() as u32);
        for key in &keys {
            key.write(&mut body)?;
        }

        let end = seek_keys + list_len as u64;
        if end > MAX_SMALL_FILE {
            return Err(RootError::Serialization(format!(
                "{end} bytes exceeds the small-file format"
            )));
        }

        let mut out = WBuffer::with_capacity(end as usize);

        // File header.
        out.write_bytes(b"root");
        out.write_u32(WRITER_FORMAT_VERSION);
        out.write_u32(BEGIN as u32);
        out.write_u32(end as u32);
        out.write_u32(0); // fSeekFree
        out.write_u32(0); // fNbytesFree
        out.write_u32(0); // nfree
        out.write_u32(nbytes_name as u32);
        out.write_u8(4); // fUnits
        out.write_u32(if self.compression == 0 { 0 } else { 100 + self.compression });
        out.write_u32(0); // fSeekInfo
        out.write_u32(0); // fNbytesInfo
        out.write_u16(4); // UUID version
        out.write_bytes(&[0u8; 16]);
        out.write_bytes(&vec![0u8; BEGIN as usize - out.len()]);

        // File record: key, name/title, top directory.
        file_key.seek_key = BEGIN;
        file_key.n_bytes = file_record_len as u32;
        file_key.obj_len = (file_record_len - file_key.key_len as usize) as u32;
        file_key.write(&mut out)?;
        out.write_bytes(names.as_slice());
        out.write_u16(DIRECTORY_VERSION);
        out.write_u32(self.datime);
        out.write_u32(self.datime);
        out.write_u32(list_len as u32);
        out.write_u32(nbytes_name as u32);
        out.write_u32(BEGIN as u32); // fSeekDir
        out.write_u32(0); // fSeekParent
        out.write_u32(seek_keys as u32);
        out.write_u16(4);
        out.write_bytes(&[0u8; 16]);
        out.write_bytes(&[0u8; 12]);

        out.write_bytes(body.as_slice());
        debug_assert_eq!(out.len() as u64, end);

        log::debug!("serialized {} with {} keys, {end} bytes", self.file_name, keys.len());
        Ok(out.into_inner())
    }

    /// Serialize and write the file to `path`.
    pub fn write(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.into_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}

/// Current time as a packed ROOT `TDatime`.
fn datime_now() -> u32 {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    encode_datime(secs)
}

/// Pack a Unix timestamp (UTC) into ROOT's `TDatime` word:
/// `(year-1995)<<26 | month<<22 | day<<17 | hour<<12 | min<<6 | sec`.
pub fn encode_datime(unix_secs: u64) -> u32 {
    let days = (unix_secs / 86_400) as i64;
    let rem = unix_secs % 86_400;
    let (hour, min, sec) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    // Days since 1970-01-01 to civil date (proleptic Gregorian).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    let year = (year - 1995).clamp(0, 63) as u32;
    (year << 26)
        | ((month as u32) << 22)
        | ((day as u32) << 17)
        | ((hour as u32) << 12)
        | ((min as u32) << 6)
        | sec as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::RootFile;
    use std::path::PathBuf;

    #[test]
    fn datime_packing() {
        // 2000-01-01 00:00:00 UTC
        assert_eq!(encode_datime(946_684_800), (5 << 26) | (1 << 22) | (1 << 17));
        // 2021-03-14 15:09:26 UTC
        let packed = encode_datime(1_615_734_566);
        assert_eq!(packed >> 26, 26);
        assert_eq!((packed >> 22) & 0xF, 3);
        assert_eq!((packed >> 17) & 0x1F, 14);
        assert_eq!((packed >> 12) & 0x1F, 15);
        assert_eq!((packed >> 6) & 0x3F, 9);
        assert_eq!(packed & 0x3F, 26);
    }

    #[test]
    fn empty_file_opens() {
        let bytes = RootFileWriter::new("empty.root").into_bytes().unwrap();
        let f = RootFile::from_bytes(bytes, PathBuf::from("empty.root")).unwrap();
        assert!(f.list_keys().unwrap().is_empty());
        assert_eq!(f.version(), WRITER_FORMAT_VERSION);
        assert_eq!(f.begin(), 100);
    }

    #[test]
    fn repeated_names_get_new_cycles() {
        let mut w = RootFileWriter::new("cycles.root").with_datime(0);
        assert_eq!(w.put_object("cfg", "TObjString", "", b"one").unwrap(), 1);
        assert_eq!(w.put_object("cfg", "TObjString", "", b"two!").unwrap(), 2);
        let f = RootFile::from_bytes(w.into_bytes().unwrap(), PathBuf::from("cycles.root")).unwrap();

        let (info, payload) = f.read_object("cfg").unwrap();
        assert_eq!(info.cycle, 2);
        assert_eq!(payload, b"two!");
        assert_eq!(f.read_object_cycle("cfg", 1).unwrap(), b"one");
    }
}
