//! Maker lifecycle and the chain that drives it.
//!
//! A [`Chain`] calls `init` on every maker, then for each event `make` in
//! order followed by `clear` on all of them, and finally `finish`. Makers
//! exchange per-event data through [`EventContext`].

use serde::Serialize;

use crate::error::{PicoError, Result};
use crate::event::PicoEvent;
use crate::jet::Jet;
use crate::mudst::MuEvent;

/// Outcome of a lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakerStatus {
    /// Continue.
    Ok,
    /// Continue, but something noteworthy happened.
    Warn,
    /// Abandon the rest of this event.
    Skip,
    /// No more input; stop the event loop.
    Eof,
}

/// Per-event data shared by the makers of a chain.
#[derive(Debug, Default)]
pub struct EventContext {
    /// 0-based index of the event in this run.
    pub event_number: u64,
    pub mu_event: Option<MuEvent>,
    pub pico_event: Option<PicoEvent>,
    pub jets: Vec<Jet>,
}

impl EventContext {
    /// Reset per-event data.
    pub fn reset(&mut self, event_number: u64) {
        self.event_number = event_number;
        self.mu_event = None;
        self.pico_event = None;
        self.jets.clear();
    }

    /// The pico event, or a lifecycle error naming `maker`.
    pub fn require_pico(&self, maker: &str) -> Result<&PicoEvent> {
        self.pico_event
            .as_ref()
            .ok_or_else(|| PicoError::Lifecycle(format!("{maker}: no pico event in context")))
    }
}

/// A processing step with the `Init`/`Make`/`Clear`/`Finish` lifecycle.
pub trait Maker {
    fn name(&self) -> &str;

    fn init(&mut self) -> Result<MakerStatus> {
        Ok(MakerStatus::Ok)
    }

    /// Process one event.
    fn make(&mut self, ctx: &mut EventContext) -> Result<MakerStatus>;

    /// Drop per-event state. Called after every event, skipped or not.
    fn clear(&mut self) -> Result<MakerStatus> {
        Ok(MakerStatus::Ok)
    }

    fn finish(&mut self) -> Result<MakerStatus> {
        Ok(MakerStatus::Ok)
    }
}

/// Event counts from [`Chain::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainSummary {
    /// Events that went through every maker.
    pub processed: u64,
    /// Events abandoned by a `Skip`.
    pub skipped: u64,
}

/// Ordered makers run as one event loop.
///
/// Makers are borrowed so callers can inspect them after the run.
#[derive(Default)]
pub struct Chain<'a> {
    makers: Vec<&'a mut dyn Maker>,
    max_events: Option<u64>,
}

impl<'a> Chain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a maker.
    pub fn add(&mut self, maker: &'a mut dyn Maker) -> &mut Self {
        self.makers.push(maker);
        self
    }

    /// Stop after `n` events (processed or skipped).
    pub fn with_max_events(mut self, n: u64) -> Self {
        self.max_events = Some(n);
        self
    }

    pub fn len(&self) -> usize {
        self.makers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.makers.is_empty()
    }

    /// Run the event loop until a maker reports `Eof` or the event limit is
    /// reached. Any maker error aborts the run.
    pub fn run(&mut self) -> Result<ChainSummary> {
        let mut summary = ChainSummary::default();
        if self.makers.is_empty() {
            return Ok(summary);
        }

        for m in self.makers.iter_mut() {
            let status = m.init().map_err(|e| wrap(&**m, e))?;
            if status == MakerStatus::Warn {
                log::warn!("{}: init reported a warning", m.name());
            }
        }

        let mut ctx = EventContext::default();
        let mut event_number = 0u64;
        'events: loop {
            if self.max_events.is_some_and(|max| event_number >= max) {
                break;
            }
            ctx.reset(event_number);

            let mut outcome = MakerStatus::Ok;
            for m in self.makers.iter_mut() {
                match m.make(&mut ctx).map_err(|e| wrap(&**m, e))? {
                    MakerStatus::Ok => {}
                    MakerStatus::Warn => log::warn!("{}: warning in event {event_number}", m.name()),
                    MakerStatus::Skip => {
                        log::debug!("{}: skipped event {event_number}", m.name());
                        outcome = MakerStatus::Skip;
                        break;
                    }
                    MakerStatus::Eof => {
                        log::debug!("{}: end of input after {event_number} events", m.name());
                        outcome = MakerStatus::Eof;
                        break;
                    }
                }
            }

            for m in self.makers.iter_mut() {
                m.clear().map_err(|e| wrap(&**m, e))?;
            }

            match outcome {
                MakerStatus::Eof => break 'events,
                MakerStatus::Skip => summary.skipped += 1,
                _ => summary.processed += 1,
            }
            event_number += 1;
        }

        for m in self.makers.iter_mut() {
            m.finish().map_err(|e| wrap(&**m, e))?;
        }
        log::info!("chain done: {} processed, {} skipped", summary.processed, summary.skipped);
        Ok(summary)
    }
}

fn wrap(maker: &dyn Maker, e: PicoError) -> PicoError {
    PicoError::Maker { maker: maker.name().to_string(), source: Box::new(e) }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits `n` events, skipping every event number in `skip`.
    struct Source {
        n: u64,
        skip: Vec<u64>,
        calls: Vec<&'static str>,
    }

    impl Maker for Source {
        fn name(&self) -> &str {
            "source"
        }
        fn init(&mut self) -> Result<MakerStatus> {
            self.calls.push("init");
            Ok(MakerStatus::Ok)
        }
        fn make(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
            self.calls.push("make");
            if ctx.event_number >= self.n {
                return Ok(MakerStatus::Eof);
            }
            if self.skip.contains(&ctx.event_number) {
                return Ok(MakerStatus::Skip);
            }
            ctx.pico_event = Some(PicoEvent { event_id: ctx.event_number as i32, ..PicoEvent::default() });
            Ok(MakerStatus::Ok)
        }
        fn clear(&mut self) -> Result<MakerStatus> {
            self.calls.push("clear");
            Ok(MakerStatus::Ok)
        }
        fn finish(&mut self) -> Result<MakerStatus> {
            self.calls.push("finish");
            Ok(MakerStatus::Ok)
        }
    }

    #[derive(Default)]
    struct Sink {
        seen: Vec<i32>,
        fail_on: Option<i32>,
    }

    impl Maker for Sink {
        fn name(&self) -> &str {
            "sink"
        }
        fn make(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
            let id = ctx.require_pico("sink")?.event_id;
            if self.fail_on == Some(id) {
                return Err(PicoError::Validation(format!("bad event {id}")));
            }
            self.seen.push(id);
            Ok(MakerStatus::Ok)
        }
    }

    #[test]
    fn lifecycle_order_and_counts() {
        let mut src = Source { n: 4, skip: vec![1], calls: Vec::new() };
        let mut sink = Sink::default();
        let summary = {
            let mut chain = Chain::new();
            chain.add(&mut src).add(&mut sink);
            chain.run().unwrap()
        };
        assert_eq!(summary, ChainSummary { processed: 3, skipped: 1 });
        assert_eq!(sink.seen, vec![0, 2, 3]);
        assert_eq!(src.calls.first(), Some(&"init"));
        assert_eq!(src.calls.last(), Some(&"finish"));
        // Four events plus the Eof probe, each followed by a clear.
        assert_eq!(src.calls.iter().filter(|c| **c == "clear").count(), 5);
    }

    #[test]
    fn event_limit() {
        let mut src = Source { n: 100, skip: vec![], calls: Vec::new() };
        let mut chain = Chain::new().with_max_events(10);
        chain.add(&mut src);
        assert_eq!(chain.run().unwrap().processed, 10);
    }

    #[test]
    fn errors_name_the_maker() {
        let mut src = Source { n: 5, skip: vec![], calls: Vec::new() };
        let mut sink = Sink { fail_on: Some(2), ..Sink::default() };
        let mut chain = Chain::new();
        chain.add(&mut src).add(&mut sink);
        match chain.run() {
            Err(PicoError::Maker { maker, source }) => {
                assert_eq!(maker, "sink");
                assert!(matches!(*source, PicoError::Validation(_)));
            }
            other => panic!("expected maker error, got {other:?}"),
        }
    }

    #[test]
    fn sink_without_source_is_a_lifecycle_error() {
        let mut sink = Sink::default();
        let mut chain = Chain::new().with_max_events(1);
        chain.add(&mut sink);
        let err = chain.run().unwrap_err();
        assert!(matches!(err, PicoError::Maker { source, .. } if matches!(*source, PicoError::Lifecycle(_))));
    }

    #[test]
    fn empty_chain_does_nothing() {
        assert_eq!(Chain::new().run().unwrap(), ChainSummary::default());
    }
}
