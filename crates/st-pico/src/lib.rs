//! # st-pico
//!
//! Pico event production for heavy-ion analysis.
//!
//! Converts upstream ("MuDst") events into compact pico records, stores
//! them in ROOT containers via `st-root`, and drives per-event processing
//! through a maker chain with the `Init`/`Make`/`Clear`/`Finish` lifecycle.
//!
//! ## Example
//!
//! ```no_run
//! use st_pico::{Chain, FileManagerMaker, JetMaker, JetPtCut, MuDstMaker, PicoConfig};
//!
//! // MuDst JSON lines -> pico file
//! let mut source = MuDstMaker::open("events.jsonl").unwrap();
//! let mut writer = FileManagerMaker::writer("events.pico.root", PicoConfig::default());
//! let mut chain = Chain::new();
//! chain.add(&mut source).add(&mut writer);
//! let summary = chain.run().unwrap();
//! println!("{} events written, {} rejected", summary.processed, summary.skipped);
//!
//! // pico file -> jets
//! let mut reader = FileManagerMaker::reader("events.pico.root");
//! let mut jets = JetMaker::new("jets", 0.4);
//! jets.add_utility(Box::new(JetPtCut { min_pt: 5.0 }));
//! let mut chain = Chain::new();
//! chain.add(&mut reader).add(&mut jets);
//! chain.run().unwrap();
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod file_manager;
pub mod helix;
pub mod jet;
pub mod maker;
pub mod mudst;
pub mod named_array;
pub mod track;
pub mod vector;

pub use config::PicoConfig;
pub use error::{PicoError, Result};
pub use event::PicoEvent;
pub use file_manager::{FileManagerMaker, FileMode, MuDstMaker, ProductionStats, read_pico_events};
pub use helix::PhysicalHelix;
pub use jet::{Jet, JetEtaCut, JetMaker, JetPtCut, JetUtility, LeadingTrackCut};
pub use maker::{Chain, ChainSummary, EventContext, Maker, MakerStatus};
pub use mudst::{MuDstReader, MuEvent, MuTrack};
pub use named_array::NamedArrayI;
pub use track::PicoTrack;
pub use vector::ThreeVector;
