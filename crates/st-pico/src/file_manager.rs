//! Pico file production and reading (`StFileManagerMaker`), plus the
//! upstream event source.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::Serialize;
use st_root::{Key, RootFile, RootFileWriter};

use crate::config::PicoConfig;
use crate::error::{PicoError, Result};
use crate::event::{PICO_EVENT_CLASS, PicoEvent};
use crate::maker::{EventContext, Maker, MakerStatus};
use crate::mudst::{MuDstReader, MuEvent};
use crate::named_array::NamedArrayI;
use crate::track::PicoTrack;

/// Name of the upstream-id to pico-index map.
pub const TRACK_ID_MAP: &str = "TrackIdMap";

/// Direction of a [`FileManagerMaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Convert upstream events and write a pico file.
    Write,
    /// Read pico events back.
    Read,
}

/// Per-run counters of a write-mode maker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProductionStats {
    pub events_seen: u64,
    pub events_written: u64,
    pub tracks_seen: u64,
    pub tracks_written: u64,
}

enum State {
    Idle,
    Writing(RootFileWriter),
    Reading { file: RootFile, keys: Vec<Key>, next: usize },
    Done,
}

/// Writes pico events to, or reads them from, a ROOT container.
///
/// Each event is one `StPicoEvent` object under key `evt<N>`.
pub struct FileManagerMaker {
    name: String,
    mode: FileMode,
    path: PathBuf,
    config: PicoConfig,
    state: State,
    track_map: NamedArrayI,
    stats: ProductionStats,
}

impl FileManagerMaker {
    pub fn new(name: &str, mode: FileMode, path: impl AsRef<Path>, config: PicoConfig) -> Self {
        let track_map = NamedArrayI::new(TRACK_ID_MAP, config.track_map_size);
        Self {
            name: name.to_string(),
            mode,
            path: path.as_ref().to_path_buf(),
            config,
            state: State::Idle,
            track_map,
            stats: ProductionStats::default(),
        }
    }

    /// Maker writing `path` with `config`.
    pub fn writer(path: impl AsRef<Path>, config: PicoConfig) -> Self {
        Self::new("PicoWriter", FileMode::Write, path, config)
    }

    /// Maker reading `path`.
    pub fn reader(path: impl AsRef<Path>) -> Self {
        Self::new("PicoReader", FileMode::Read, path, PicoConfig::default())
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upstream track id to pico index for the current event.
    pub fn track_map(&self) -> &NamedArrayI {
        &self.track_map
    }

    pub fn stats(&self) -> ProductionStats {
        self.stats
    }

    /// Apply event and track cuts. `None` when the event is rejected.
    /// Fills the track-id map for accepted tracks.
    pub fn convert(&mut self, mu: &MuEvent) -> Result<Option<PicoEvent>> {
        let cfg = &self.config;
        let vertex = mu.primary_vertex;
        if vertex.z.abs() >= cfg.vz_max || mu.vertex_r() >= cfg.vr_max {
            log::debug!(
                "event {}/{} rejected: vertex ({:.2}, {:.2}, {:.2})",
                mu.run_id,
                mu.event_id,
                vertex.x,
                vertex.y,
                vertex.z
            );
            return Ok(None);
        }

        let centrality = match mu.centrality {
            Some(c) if (0..9).contains(&c) => c as i16,
            Some(_) => -1,
            None => cfg.centrality_bin(mu.ref_mult),
        };

        self.track_map.clear();
        let mut tracks = Vec::with_capacity(mu.tracks.len());
        for t in &mu.tracks {
            self.stats.tracks_seen += 1;
            if t.n_hits_fit < cfg.min_n_hits_fit {
                continue;
            }
            let pico = PicoTrack::from_mu_track(t, vertex, mu.b_field);
            if pico.g_dca(vertex) > cfg.max_g_dca || pico.g_pt() < cfg.min_pt {
                continue;
            }
            match usize::try_from(t.id) {
                Ok(id) if id < self.track_map.len() => {
                    self.track_map.set(id, tracks.len() as i32)?;
                }
                _ => log::debug!("track id {} outside {TRACK_ID_MAP}", t.id),
            }
            tracks.push(pico);
        }
        self.stats.tracks_written += tracks.len() as u64;

        Ok(Some(PicoEvent {
            run_id: mu.run_id,
            event_id: mu.event_id,
            b_field: mu.b_field as f32,
            primary_vertex: vertex.to_f32(),
            ref_mult: mu.ref_mult,
            centrality,
            tracks,
        }))
    }

    fn make_write(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
        let mu = ctx
            .mu_event
            .as_ref()
            .ok_or_else(|| PicoError::Lifecycle(format!("{}: no MuDst event in context", self.name)))?;
        self.stats.events_seen += 1;
        let Some(event) = self.convert(mu)? else {
            return Ok(MakerStatus::Skip);
        };

        let State::Writing(writer) = &mut self.state else {
            return Err(PicoError::Lifecycle(format!("{}: make before init", self.name)));
        };
        let key = format!("evt{}", self.stats.events_written);
        let title = format!("run {} event {}", event.run_id, event.event_id);
        writer.put_object(&key, PICO_EVENT_CLASS, &title, &event.encode()?)?;
        self.stats.events_written += 1;
        ctx.pico_event = Some(event);
        Ok(MakerStatus::Ok)
    }

    fn make_read(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
        let State::Reading { file, keys, next } = &mut self.state else {
            return Err(PicoError::Lifecycle(format!("{}: make before init", self.name)));
        };
        let Some(key) = keys.get(*next) else {
            return Ok(MakerStatus::Eof);
        };
        let event = PicoEvent::decode(&file.read_payload(key)?)?;
        *next += 1;
        ctx.pico_event = Some(event);
        Ok(MakerStatus::Ok)
    }
}

impl Maker for FileManagerMaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<MakerStatus> {
        self.config.validate()?;
        self.stats = ProductionStats::default();
        self.state = match self.mode {
            FileMode::Write => {
                let file_name = self.path.file_name().map_or_else(
                    || "pico.root".to_string(),
                    |n| n.to_string_lossy().into_owned(),
                );
                log::info!("{}: writing {}", self.name, self.path.display());
                State::Writing(
                    RootFileWriter::new(&file_name)
                        .with_title("pico events")
                        .with_compression(self.config.compression),
                )
            }
            FileMode::Read => {
                let file = RootFile::open(&self.path)?;
                let keys: Vec<Key> =
                    file.top_keys()?.into_iter().filter(|k| k.class_name == PICO_EVENT_CLASS).collect();
                log::info!("{}: {} events in {}", self.name, keys.len(), self.path.display());
                State::Reading { file, keys, next: 0 }
            }
        };
        Ok(MakerStatus::Ok)
    }

    fn make(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
        match self.mode {
            FileMode::Write => self.make_write(ctx),
            FileMode::Read => self.make_read(ctx),
        }
    }

    fn clear(&mut self) -> Result<MakerStatus> {
        self.track_map.clear();
        Ok(MakerStatus::Ok)
    }

    fn finish(&mut self) -> Result<MakerStatus> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::Writing(writer) => {
                writer.write(&self.path)?;
                log::info!(
                    "{}: wrote {} of {} events ({} of {} tracks) to {}",
                    self.name,
                    self.stats.events_written,
                    self.stats.events_seen,
                    self.stats.tracks_written,
                    self.stats.tracks_seen,
                    self.path.display()
                );
                Ok(MakerStatus::Ok)
            }
            State::Reading { .. } | State::Done => Ok(MakerStatus::Ok),
            State::Idle => Err(PicoError::Lifecycle(format!("{}: finish before init", self.name))),
        }
    }
}

/// Feeds upstream events into the chain; `Eof` when the input runs out.
pub struct MuDstMaker<R> {
    reader: MuDstReader<R>,
    n_read: u64,
}

impl MuDstMaker<std::io::BufReader<std::fs::File>> {
    /// Source reading a JSON-lines file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(MuDstReader::open(path)?))
    }
}

impl<R: BufRead> MuDstMaker<R> {
    pub fn new(reader: MuDstReader<R>) -> Self {
        Self { reader, n_read: 0 }
    }

    /// Events delivered so far.
    pub fn n_read(&self) -> u64 {
        self.n_read
    }
}

impl<R: BufRead> Maker for MuDstMaker<R> {
    fn name(&self) -> &str {
        "MuDst"
    }

    fn make(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
        match self.reader.next() {
            Some(ev) => {
                ctx.mu_event = Some(ev?);
                self.n_read += 1;
                Ok(MakerStatus::Ok)
            }
            None => Ok(MakerStatus::Eof),
        }
    }
}

/// Read every pico event of a file in key order.
pub fn read_pico_events(path: impl AsRef<Path>) -> Result<Vec<PicoEvent>> {
    let file = RootFile::open(path)?;
    file.top_keys()?
        .iter()
        .filter(|k| k.class_name == PICO_EVENT_CLASS)
        .map(|k| PicoEvent::decode(&file.read_payload(k)?))
        .collect()
}
