//! Integration tests: resolve `dir/name` paths through TDirectoryFile keys.
//!
//! The writer only produces flat files, so the nested key list and its
//! object record are appended by hand after the writer's output.

use approx::assert_relative_eq;
use st_root::objects::write_histogram;
use st_root::{Histogram, Key, RootError, RootFile, RootFileWriter, WBuffer};
use std::path::PathBuf;

const DATIME: u32 = 0x5A3C_1000;

/// Streamed TDirectory record (32-bit seeks) pointing at `seek_keys`.
fn directory_payload(seek_keys: u32) -> Vec<u8> {
    let mut w = WBuffer::new();
    w.write_u16(5);
    w.write_u32(DATIME);
    w.write_u32(DATIME);
    w.write_u32(0); // fNbytesKeys
    w.write_u32(0); // fNbytesName
    w.write_u32(0); // fSeekDir
    w.write_u32(100); // fSeekParent
    w.write_u32(seek_keys);
    w.into_inner()
}

fn top_level(sub_seek_keys: u32) -> Vec<u8> {
    let top = Histogram::new("h_top", "top level", 4, 0.0, 4.0).unwrap();
    let mut w = RootFileWriter::new("nested.root").with_datime(DATIME);
    w.put_histogram(&top).unwrap();
    w.put_object("sub", "TDirectoryFile", "subdirectory", &directory_payload(sub_seek_keys)).unwrap();
    w.put_object("empty", "TDirectoryFile", "", &directory_payload(0)).unwrap();
    w.into_bytes().unwrap()
}

/// A file whose `sub` directory holds one profile, `sub/shift_cos0_0`.
fn nested_file(profile: &Histogram) -> RootFile {
    // The directory payload has a fixed size, so the base offset does not
    // depend on the seek value written into it.
    let base = top_level(0).len();

    let mut payload = WBuffer::new();
    write_histogram(&mut payload, profile).unwrap();
    let payload = payload.into_inner();

    let mut object_key = Key::new("TProfile", &profile.name, &profile.title, 1, DATIME);
    object_key.obj_len = payload.len() as u32;
    object_key.n_bytes = (object_key.key_len as usize + payload.len()) as u32;
    object_key.seek_key = base as u64;

    let seek_keys = base + object_key.n_bytes as usize;
    let mut list_key = Key::new("TDirectoryFile", "sub", "subdirectory", 1, DATIME);
    list_key.seek_key = seek_keys as u64;
    list_key.n_bytes = (list_key.key_len as usize + 4 + object_key.header_len()) as u32;
    list_key.obj_len = list_key.n_bytes - list_key.key_len as u32;

    let mut bytes = top_level(seek_keys as u32);
    assert_eq!(bytes.len(), base);

    let mut tail = WBuffer::new();
    object_key.write(&mut tail).unwrap();
    tail.write_bytes(&payload);
    list_key.write(&mut tail).unwrap();
    tail.write_u32(1);
    object_key.write(&mut tail).unwrap();
    bytes.extend_from_slice(tail.as_slice());

    RootFile::from_bytes(bytes, PathBuf::from("nested.root")).unwrap()
}

fn shift_profile() -> Histogram {
    let mut p = Histogram::new_profile("shift_cos0_0", "<cos(k#Psi)>", 20, 0.5, 20.5).unwrap();
    for k in 1..=20 {
        p.fill_profile(k as f64, 0.01 * k as f64, 1.0).unwrap();
        p.fill_profile(k as f64, 0.03 * k as f64, 1.0).unwrap();
    }
    p
}

#[test]
fn histogram_in_subdirectory() {
    let file = nested_file(&shift_profile());

    let names: Vec<String> = file.list_keys().unwrap().into_iter().map(|k| k.name).collect();
    assert_eq!(names, ["h_top", "sub", "empty"]);

    let h = file.get_histogram("sub/shift_cos0_0").unwrap();
    assert_eq!(h.n_bins(), 20);
    for k in 1..=20 {
        assert_relative_eq!(h.bin_content(k), 0.02 * k as f64, epsilon = 1e-12);
    }

    // Empty segments are ignored.
    assert_eq!(file.get_histogram("/sub//shift_cos0_0").unwrap().n_bins(), 20);

    let (info, _) = file.read_object("sub/shift_cos0_0").unwrap();
    assert_eq!(info.class_name, "TProfile");
    assert_eq!(file.get_histogram("h_top").unwrap().n_bins(), 4);
}

#[test]
fn path_through_non_directory_fails() {
    let file = nested_file(&shift_profile());
    match file.get_histogram("h_top/shift_cos0_0") {
        Err(RootError::Deserialization(msg)) => {
            assert!(msg.contains("'h_top' is not a directory"), "{msg}");
            assert!(msg.contains("TH1D"), "{msg}");
        }
        other => panic!("expected Deserialization, got {other:?}"),
    }
}

#[test]
fn missing_keys_in_path() {
    let file = nested_file(&shift_profile());

    match file.get_histogram("sub/shift_cos9_9") {
        Err(RootError::KeyNotFound(name)) => assert_eq!(name, "sub/shift_cos9_9"),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
    match file.get_histogram("nosuch/shift_cos0_0") {
        Err(RootError::KeyNotFound(name)) => assert_eq!(name, "nosuch (in path nosuch/shift_cos0_0)"),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
    // A directory record without a key list reads as empty.
    assert!(matches!(file.get_histogram("empty/shift_cos0_0"), Err(RootError::KeyNotFound(_))));
    assert!(matches!(file.get_histogram("/"), Err(RootError::KeyNotFound(_))));
}
