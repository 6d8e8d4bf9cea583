//! Integration tests: write histograms and profiles to disk, read them back.

use approx::assert_relative_eq;
use st_root::{Histogram, HistogramKind, RootError, RootFile, RootFileWriter};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("st_root_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn recenter_profiles() -> Vec<Histogram> {
    let mut out = Vec::new();
    for cent in 0..3 {
        for vz in 0..2 {
            let name = format!("recenter_cos{cent}_{vz}");
            let mut p = Histogram::new_profile(&name, "<cos(n#phi)>", 20, 0.5, 20.5).unwrap();
            for n in 1..=20 {
                let y = 0.001 * (cent * 100 + vz * 10) as f64 + 1e-4 * n as f64;
                p.fill_profile(n as f64, y, 1.0).unwrap();
                p.fill_profile(n as f64, y, 1.0).unwrap();
            }
            out.push(p);
        }
    }
    out
}

fn write_and_open(level: u32, histos: &[Histogram], filename: &str) -> (RootFile, PathBuf) {
    let path = tmp_path(filename);
    let mut w = RootFileWriter::new(filename).with_title("recentering").with_compression(level);
    for h in histos {
        w.put_histogram(h).unwrap();
    }
    w.write(&path).unwrap();
    (RootFile::open(&path).expect("failed to open written ROOT file"), path)
}

#[test]
fn profiles_round_trip_uncompressed() {
    let histos = recenter_profiles();
    let (f, path) = write_and_open(0, &histos, "profiles_plain.root");

    let keys = f.list_keys().unwrap();
    assert_eq!(keys.len(), histos.len());
    assert!(keys.iter().all(|k| k.class_name == "TProfile"));
    assert_eq!(keys[0].name, "recenter_cos0_0");

    for h in &histos {
        let back = f.get_histogram(&h.name).unwrap();
        assert_eq!(&back, h, "{} differs", h.name);
    }

    let h = f.get_histogram("recenter_cos2_1").unwrap();
    assert_relative_eq!(h.bin_content(3), 0.21 + 3e-4, epsilon = 1e-12);

    std::fs::remove_file(path).ok();
}

#[test]
fn profiles_round_trip_zlib() {
    let histos = recenter_profiles();
    let (f, path) = write_and_open(6, &histos, "profiles_zlib.root");
    let plain_len = std::fs::metadata(&path).unwrap().len();
    assert!(plain_len > 0);

    for h in &histos {
        assert_eq!(&f.get_histogram(&h.name).unwrap(), h);
    }
    std::fs::remove_file(path).ok();
}

#[test]
fn mixed_classes_are_dispatched() {
    let mut h = Histogram::new("h_refmult", "reference multiplicity", 50, 0.0, 500.0).unwrap();
    for m in [12.0, 140.0, 140.0, 480.0, 600.0] {
        h.fill(m, 1.0).unwrap();
    }
    let (f, path) = write_and_open(1, &[h.clone()], "mixed.root");

    let back = f.get_histogram("h_refmult").unwrap();
    assert_eq!(back.kind(), HistogramKind::Th1D);
    assert_eq!(back.entries(), 5.0);
    assert_eq!(back.bin_content(15), 2.0);
    assert_eq!(back.bin_content(51), 1.0);
    std::fs::remove_file(path).ok();
}

#[test]
fn missing_histogram_names_the_key() {
    let (f, path) = write_and_open(0, &recenter_profiles(), "missing.root");
    match f.get_histogram("recenter_cos8_9") {
        Err(RootError::KeyNotFound(name)) => assert_eq!(name, "recenter_cos8_9"),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }
    std::fs::remove_file(path).ok();
}

#[test]
fn custom_objects_are_not_histograms() {
    let mut w = RootFileWriter::new("objects.root");
    w.put_object("evt0", "StPicoEvent", "", &[1, 2, 3, 4]).unwrap();
    let f = RootFile::from_bytes(w.into_bytes().unwrap(), PathBuf::from("objects.root")).unwrap();

    assert!(matches!(f.get_histogram("evt0"), Err(RootError::UnsupportedClass(_))));
    let events = f.keys_of_class("StPicoEvent").unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(f.read_object("evt0").unwrap().1, vec![1, 2, 3, 4]);
}
