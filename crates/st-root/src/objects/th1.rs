//! TH1D, TH1F and TProfile streamers.
//!
//! Serialization layout (TH1 class version 8):
//! ```text
//! TProfile (v7)
//!   └─ TH1D (v3) / TH1F (v3)
//!        ├─ TH1 (v8)
//!        │    ├─ TNamed (name, title)
//!        │    ├─ TAttLine, TAttFill, TAttMarker (byte-counted, skipped)
//!        │    ├─ fNcells (i32)
//!        │    ├─ fXaxis, fYaxis, fZaxis (TAxis v10)
//!        │    ├─ fBarOffset, fBarWidth (i16)
//!        │    ├─ fEntries, fTsumw, fTsumw2, fTsumwx, fTsumwx2 (f64)
//!        │    ├─ fMaximum, fMinimum (v >= 2), fNormFactor (v >= 3)
//!        │    ├─ fContour, fSumw2 (TArrayD)
//!        │    └─ fOption, fFunctions, fBuffer, fBinStatErrOpt, fStatOverflows
//!        └─ TArrayD / TArrayF (cells incl. under/overflow)
//!   ├─ fBinEntries (TArrayD)
//!   ├─ fErrorMode (i32), fYmin, fYmax, fTsumwy, fTsumwy2 (f64)
//!   └─ fBinSumw2 (TArrayD, v >= 7)
//! ```
//! Readers jump to each object's byte-count end, so fields after the ones
//! decoded here are tolerated.

use crate::error::{Result, RootError};
use crate::histogram::{Axis, Histogram, HistogramKind, ProfileCells, Stats};
use crate::rbuffer::RBuffer;
use crate::wbuffer::WBuffer;

const TH1_VERSION: u16 = 8;
const TH1D_VERSION: u16 = 3;
const TAXIS_VERSION: u16 = 10;
const TPROFILE_VERSION: u16 = 7;

/// Fields of the TH1 base class this reader keeps.
struct Th1Base {
    name: String,
    title: String,
    n_cells: usize,
    axis: Axis,
    stats: Stats,
    sumw2: Option<Vec<f64>>,
}

/// Read a histogram of the given class from decompressed object bytes.
pub fn read_histogram(data: &[u8], class_name: &str) -> Result<Histogram> {
    let mut r = RBuffer::new(data);
    match class_name {
        "TH1D" => {
            let (base, cells) = read_th1_array(&mut r, HistogramKind::Th1D)?;
            build(base, HistogramKind::Th1D, cells, None)
        }
        "TH1F" => {
            let (base, cells) = read_th1_array(&mut r, HistogramKind::Th1F)?;
            build(base, HistogramKind::Th1F, cells, None)
        }
        "TProfile" => read_tprofile(&mut r),
        _ => Err(RootError::UnsupportedClass(class_name.to_string())),
    }
}

/// Serialize a histogram with its own class streamer.
pub fn write_histogram(w: &mut WBuffer, h: &Histogram) -> Result<()> {
    match h.kind() {
        HistogramKind::Th1D | HistogramKind::Th1F => write_th1_array(w, h),
        HistogramKind::Profile => write_tprofile(w, h),
    }
}

fn build(
    base: Th1Base,
    kind: HistogramKind,
    cells: Vec<f64>,
    profile: Option<ProfileCells>,
) -> Result<Histogram> {
    if cells.len() != base.n_cells {
        return Err(RootError::Deserialization(format!(
            "{}: array size {} != fNcells {}",
            base.name,
            cells.len(),
            base.n_cells
        )));
    }
    Histogram::from_parts(
        base.name, base.title, kind, base.axis, cells, base.sumw2, profile, base.stats,
    )
}

// ── readers ─────────────────────────────────────────────────────

/// Read a TH1D/TH1F: TH1 base followed by the cell array.
fn read_th1_array(r: &mut RBuffer, kind: HistogramKind) -> Result<(Th1Base, Vec<f64>)> {
    let (ver, end) = r.read_version()?;
    if ver < 1 {
        return Err(RootError::Deserialization(format!(
            "unsupported {} version: {ver}",
            kind.class_name()
        )));
    }

    let base = read_th1_base(r)?;
    let cells = match kind {
        HistogramKind::Th1F => {
            let n = r.read_u32()? as usize;
            r.read_array_f32(n)?.into_iter().map(f64::from).collect()
        }
        _ => r.read_tarray_f64()?,
    };

    r.finish_object(end, kind.class_name())?;
    Ok((base, cells))
}

fn read_tprofile(r: &mut RBuffer) -> Result<Histogram> {
    let (ver, end) = r.read_version()?;
    let (base, cells) = read_th1_array(r, HistogramKind::Th1D)?;

    let bin_entries = r.read_tarray_f64()?;
    let error_mode = r.read_i32()?;
    let y_min = r.read_f64()?;
    let y_max = r.read_f64()?;
    let (tsumwy, tsumwy2) =
        if ver >= 4 { (r.read_f64()?, r.read_f64()?) } else { (0.0, 0.0) };
    let bin_sumw2 = if ver >= 7 { r.read_tarray_f64()? } else { Vec::new() };
    r.finish_object(end, "TProfile")?;

    let profile = ProfileCells { bin_entries, bin_sumw2, error_mode, y_min, y_max, tsumwy, tsumwy2 };
    build(base, HistogramKind::Profile, cells, Some(profile))
}

fn read_th1_base(r: &mut RBuffer) -> Result<Th1Base> {
    let (th1_ver, th1_end) = r.read_version()?;

    let (name, title) = r.read_tnamed()?;

    // TAttLine, TAttFill, TAttMarker
    r.skip_object()?;
    r.skip_object()?;
    r.skip_object()?;

    let n_cells = r.read_i32()?;
    if n_cells < 2 {
        return Err(RootError::Deserialization(format!("{name}: fNcells = {n_cells}")));
    }

    let axis = read_taxis(r)?;
    // fYaxis, fZaxis
    r.skip_object()?;
    r.skip_object()?;

    let _bar_offset = r.read_i16()?;
    let _bar_width = r.read_i16()?;
    let stats = Stats {
        entries: r.read_f64()?,
        tsumw: r.read_f64()?,
        tsumw2: r.read_f64()?,
        tsumwx: r.read_f64()?,
        tsumwx2: r.read_f64()?,
    };
    if th1_ver >= 2 {
        let _max = r.read_f64()?;
        let _min = r.read_f64()?;
    }
    if th1_ver >= 3 {
        let _norm = r.read_f64()?;
    }

    let contour_n = r.read_u32()? as usize;
    r.skip(contour_n.saturating_mul(8))?;

    let sumw2 = r.read_tarray_f64()?;
    let sumw2 = if sumw2.is_empty() { None } else { Some(sumw2) };

    // fOption, fFunctions, fBuffer and the stat options are not needed.
    r.finish_object(th1_end, "TH1")?;

    Ok(Th1Base { name, title, n_cells: n_cells as usize, axis, stats, sumw2 })
}

fn read_taxis(r: &mut RBuffer) -> Result<Axis> {
    let (_ver, end) = r.read_version()?;
    let (_name, _title) = r.read_tnamed()?;
    // TAttAxis
    r.skip_object()?;

    let n_bins = r.read_i32()?;
    if n_bins < 1 {
        return Err(RootError::Deserialization(format!("TAxis with {n_bins} bins")));
    }
    let x_min = r.read_f64()?;
    let x_max = r.read_f64()?;
    let edges = r.read_tarray_f64()?;
    r.finish_object(end, "TAxis")?;

    Ok(Axis { n_bins: n_bins as usize, x_min, x_max, edges })
}

// ── writers ─────────────────────────────────────────────────────

fn write_th1_array(w: &mut WBuffer, h: &Histogram) -> Result<()> {
    let tok = w.begin_object(TH1D_VERSION);
    write_th1_base(w, h)?;
    match h.kind() {
        HistogramKind::Th1F => {
            w.write_u32(h.raw_cells().len() as u32);
            for &v in h.raw_cells() {
                w.write_f32(v as f32);
            }
        }
        _ => w.write_tarray_f64(h.raw_cells())?,
    }
    w.end_object(tok)
}

fn write_tprofile(w: &mut WBuffer, h: &Histogram) -> Result<()> {
    let p = h.profile_cells().ok_or_else(|| {
        RootError::Serialization(format!("{}: profile without bin entries", h.name))
    })?;

    let tok = w.begin_object(TPROFILE_VERSION);
    write_th1_array(w, h)?;
    w.write_tarray_f64(&p.bin_entries)?;
    w.write_i32(p.error_mode);
    w.write_f64(p.y_min);
    w.write_f64(p.y_max);
    w.write_f64(p.tsumwy);
    w.write_f64(p.tsumwy2);
    w.write_tarray_f64(&p.bin_sumw2)?;
    w.end_object(tok)
}

fn write_th1_base(w: &mut WBuffer, h: &Histogram) -> Result<()> {
    let tok = w.begin_object(TH1_VERSION);
    w.write_tnamed(&h.name, &h.title)?;

    // TAttLine: color, style, width
    let att = w.begin_object(2);
    w.write_i16(602);
    w.write_i16(1);
    w.write_i16(1);
    w.end_object(att)?;
    // TAttFill: color, style
    let att = w.begin_object(2);
    w.write_i16(0);
    w.write_i16(1001);
    w.end_object(att)?;
    // TAttMarker: color, style, size
    let att = w.begin_object(2);
    w.write_i16(1);
    w.write_i16(1);
    w.write_f32(1.0);
    w.end_object(att)?;

    w.write_i32(h.raw_cells().len() as i32);

    let axis = h.axis();
    write_taxis(w, "xaxis", axis)?;
    let unit = Axis { n_bins: 1, x_min: 0.0, x_max: 1.0, edges: Vec::new() };
    write_taxis(w, "yaxis", &unit)?;
    write_taxis(w, "zaxis", &unit)?;

    w.write_i16(0);
    w.write_i16(1000);
    let s = h.stats();
    for v in [s.entries, s.tsumw, s.tsumw2, s.tsumwx, s.tsumwx2] {
        w.write_f64(v);
    }
    // fMaximum, fMinimum (-1111 = unset), fNormFactor
    w.write_f64(-1111.0);
    w.write_f64(-1111.0);
    w.write_f64(0.0);

    w.write_tarray_f64(&[])?;
    w.write_tarray_f64(h.sumw2().unwrap_or(&[]))?;
    w.write_string("")?;

    // fFunctions: an empty TList behind a class tag.
    let list = w.begin_tagged_object("TList")?;
    let body = w.begin_object(5);
    w.write_tobject();
    w.write_string("")?;
    w.write_i32(0);
    w.end_object(body)?;
    w.end_object(list)?;

    // fBufferSize, fBuffer (null), fBinStatErrOpt, fStatOverflows
    w.write_i32(0);
    w.write_u8(0);
    w.write_i32(0);
    w.write_i32(2);

    w.end_object(tok)
}

fn write_taxis(w: &mut WBuffer, name: &str, axis: &Axis) -> Result<()> {
    let tok = w.begin_object(TAXIS_VERSION);
    w.write_tnamed(name, "")?;

    // TAttAxis
    let att = w.begin_object(4);
    w.write_i32(510);
    w.write_i16(1);
    w.write_i16(1);
    w.write_i16(42);
    for v in [0.005f32, 0.035, 0.03, 1.0, 0.035] {
        w.write_f32(v);
    }
    w.write_i16(1);
    w.write_i16(42);
    w.end_object(att)?;

    w.write_i32(axis.n_bins as i32);
    w.write_f64(axis.x_min);
    w.write_f64(axis.x_max);
    w.write_tarray_f64(&axis.edges)?;
    // fFirst, fLast, fBits2, fTimeDisplay, fTimeFormat, fLabels, fModLabs
    w.write_i32(0);
    w.write_i32(0);
    w.write_u16(0);
    w.write_u8(0);
    w.write_string("")?;
    w.write_u32(0);
    w.write_u32(0);

    w.end_object(tok)
}
