//! Jets: anti-kt clustering of pico tracks and per-event jet utilities
//! (`StJetUtility`).

use std::fmt;

use serde::Serialize;

use crate::error::{PicoError, Result};
use crate::event::PicoEvent;
use crate::helix::wrap_angle;
use crate::maker::{EventContext, Maker, MakerStatus};

/// A clustered jet. `constituents` index into the event's track list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Jet {
    pub pt: f64,
    pub eta: f64,
    pub phi: f64,
    pub constituents: Vec<usize>,
}

impl Jet {
    /// Single-particle seed.
    pub fn seed(pt: f64, eta: f64, phi: f64, index: usize) -> Self {
        Self { pt, eta, phi, constituents: vec![index] }
    }

    /// Squared η-φ distance to `other`.
    pub fn delta_r2(&self, other: &Jet) -> f64 {
        let deta = self.eta - other.eta;
        let dphi = wrap_angle(self.phi - other.phi);
        deta * deta + dphi * dphi
    }

    /// pt-weighted recombination.
    fn merge(self, other: Jet) -> Jet {
        let pt = self.pt + other.pt;
        let w = if pt > 0.0 { other.pt / pt } else { 0.5 };
        let eta = self.eta + w * (other.eta - self.eta);
        let phi = wrap_angle(self.phi + w * wrap_angle(other.phi - self.phi));
        let mut constituents = self.constituents;
        constituents.extend(other.constituents);
        Jet { pt, eta, phi, constituents }
    }

    /// Highest constituent pt, looked up in `event` (primary momentum).
    pub fn leading_pt(&self, event: &PicoEvent) -> f64 {
        self.constituents
            .iter()
            .filter_map(|&i| event.tracks.get(i))
            .map(|t| t.p_pt())
            .fold(0.0, f64::max)
    }
}

struct Slot {
    jet: Jet,
    inv_pt2: f64,
    nn: Option<usize>,
    nn_dr2: f64,
}

/// Cluster `seeds` with the anti-kt algorithm, radius `radius`.
/// Returns jets sorted by descending pt.
///
/// `d_ij = min(1/pt_i², 1/pt_j²) ΔR²/R²`, `d_iB = 1/pt_i²`. Each slot
/// caches its nearest geometric neighbour within `R`; pairs farther apart
/// can never beat the harder particle's beam distance.
pub fn anti_kt(seeds: Vec<Jet>, radius: f64) -> Vec<Jet> {
    let r2 = radius * radius;
    let mut slots: Vec<Option<Slot>> = seeds
        .into_iter()
        .filter(|j| j.pt > 0.0)
        .map(|jet| {
            let inv_pt2 = 1.0 / (jet.pt * jet.pt);
            Some(Slot { jet, inv_pt2, nn: None, nn_dr2: r2 })
        })
        .collect();

    for i in 0..slots.len() {
        update_nn(&mut slots, i, r2);
    }

    let mut jets = Vec::new();
    loop {
        let mut best: Option<(usize, f64)> = None;
        for (i, slot) in slots.iter().enumerate() {
            let Some(s) = slot else { continue };
            let d = match s.nn.and_then(|j| slots[j].as_ref()) {
                Some(n) => s.inv_pt2.min(n.inv_pt2) * s.nn_dr2 / r2,
                None => s.inv_pt2,
            };
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        let Some((i, _)) = best else { break };

        let Some(si) = slots[i].take() else { break };
        match si.nn.and_then(|j| slots[j].take().map(|sj| (j, sj))) {
            Some((j, sj)) => {
                let jet = si.jet.merge(sj.jet);
                let inv_pt2 = 1.0 / (jet.pt * jet.pt);
                slots[i] = Some(Slot { jet, inv_pt2, nn: None, nn_dr2: r2 });
                refresh_after_removal(&mut slots, &[i, j], r2);
                update_nn(&mut slots, i, r2);
                offer_as_neighbour(&mut slots, i);
            }
            None => {
                jets.push(si.jet);
                refresh_after_removal(&mut slots, &[i], r2);
            }
        }
    }

    jets.sort_by(|a, b| b.pt.total_cmp(&a.pt));
    jets
}

/// Recompute slot `i`'s nearest neighbour from scratch.
fn update_nn(slots: &mut [Option<Slot>], i: usize, r2: f64) {
    let Some(si) = slots[i].as_ref() else { return };
    let mut nn = None;
    let mut nn_dr2 = r2;
    for (k, other) in slots.iter().enumerate() {
        if k == i {
            continue;
        }
        if let Some(o) = other {
            let dr2 = si.jet.delta_r2(&o.jet);
            if dr2 < nn_dr2 {
                nn = Some(k);
                nn_dr2 = dr2;
            }
        }
    }
    if let Some(si) = slots[i].as_mut() {
        si.nn = nn;
        si.nn_dr2 = nn_dr2;
    }
}

/// Rescan slots whose neighbour was one of `removed`.
fn refresh_after_removal(slots: &mut [Option<Slot>], removed: &[usize], r2: f64) {
    let stale: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(k, s)| s.as_ref().filter(|s| s.nn.is_some_and(|n| removed.contains(&n))).map(|_| k))
        .collect();
    for k in stale {
        update_nn(slots, k, r2);
    }
}

/// Let every other slot adopt the new jet at `i` if it is closer.
fn offer_as_neighbour(slots: &mut [Option<Slot>], i: usize) {
    let Some(new) = slots[i].as_ref().map(|s| s.jet.clone()) else { return };
    for (k, slot) in slots.iter_mut().enumerate() {
        if k == i {
            continue;
        }
        if let Some(s) = slot {
            let dr2 = s.jet.delta_r2(&new);
            if dr2 < s.nn_dr2 {
                s.nn = Some(i);
                s.nn_dr2 = dr2;
            }
        }
    }
}

/// A per-event hook that edits the jet list (`StJetUtility`).
pub trait JetUtility {
    fn name(&self) -> &str;

    /// Inspect or modify `jets` for `event`.
    fn apply(&mut self, event: &PicoEvent, jets: &mut Vec<Jet>) -> Result<()>;
}

/// Drop jets below a pt threshold.
#[derive(Debug, Clone)]
pub struct JetPtCut {
    pub min_pt: f64,
}

impl JetUtility for JetPtCut {
    fn name(&self) -> &str {
        "JetPtCut"
    }

    fn apply(&mut self, _event: &PicoEvent, jets: &mut Vec<Jet>) -> Result<()> {
        jets.retain(|j| j.pt >= self.min_pt);
        Ok(())
    }
}

/// Keep jets inside `|eta| <= max_abs_eta`.
#[derive(Debug, Clone)]
pub struct JetEtaCut {
    pub max_abs_eta: f64,
}

impl JetUtility for JetEtaCut {
    fn name(&self) -> &str {
        "JetEtaCut"
    }

    fn apply(&mut self, _event: &PicoEvent, jets: &mut Vec<Jet>) -> Result<()> {
        jets.retain(|j| j.eta.abs() <= self.max_abs_eta);
        Ok(())
    }
}

/// Keep jets whose hardest constituent reaches `min_pt`.
#[derive(Debug, Clone)]
pub struct LeadingTrackCut {
    pub min_pt: f64,
}

impl JetUtility for LeadingTrackCut {
    fn name(&self) -> &str {
        "LeadingTrackCut"
    }

    fn apply(&mut self, event: &PicoEvent, jets: &mut Vec<Jet>) -> Result<()> {
        jets.retain(|j| j.leading_pt(event) >= self.min_pt);
        Ok(())
    }
}

/// Clusters primary tracks of the current pico event into `ctx.jets`,
/// then runs its utilities in order.
pub struct JetMaker {
    name: String,
    radius: f64,
    min_track_pt: f64,
    max_track_eta: f64,
    utilities: Vec<Box<dyn JetUtility>>,
    n_jets: u64,
}

impl fmt::Debug for JetMaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JetMaker")
            .field("name", &self.name)
            .field("radius", &self.radius)
            .field("utilities", &self.utilities.iter().map(|u| u.name().to_string()).collect::<Vec<_>>())
            .finish()
    }
}

impl JetMaker {
    pub fn new(name: &str, radius: f64) -> Self {
        Self {
            name: name.to_string(),
            radius,
            min_track_pt: 0.2,
            max_track_eta: 1.0,
            utilities: Vec::new(),
            n_jets: 0,
        }
    }

    /// Track acceptance for clustering.
    pub fn with_track_cuts(mut self, min_pt: f64, max_abs_eta: f64) -> Self {
        self.min_track_pt = min_pt;
        self.max_track_eta = max_abs_eta;
        self
    }

    /// Append a utility; they run in insertion order.
    pub fn add_utility(&mut self, utility: Box<dyn JetUtility>) -> &mut Self {
        self.utilities.push(utility);
        self
    }

    /// Jets kept over all events so far.
    pub fn n_jets(&self) -> u64 {
        self.n_jets
    }

    /// Cluster one event and apply the utilities.
    pub fn find_jets(&mut self, event: &PicoEvent) -> Result<Vec<Jet>> {
        let seeds = event
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_primary())
            .filter_map(|(i, t)| {
                let p = t.p_mom();
                let (pt, eta) = (p.perp(), p.pseudo_rapidity());
                (pt >= self.min_track_pt && eta.abs() <= self.max_track_eta)
                    .then(|| Jet::seed(pt, eta, p.phi(), i))
            })
            .collect();

        let mut jets = anti_kt(seeds, self.radius);
        for u in self.utilities.iter_mut() {
            u.apply(event, &mut jets)?;
        }
        Ok(jets)
    }
}

impl Maker for JetMaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> Result<MakerStatus> {
        if self.radius.is_nan() || self.radius <= 0.0 {
            return Err(PicoError::Validation(format!(
                "jet radius must be positive, got {}",
                self.radius
            )));
        }
        log::debug!("{}: anti-kt R = {}, {} utilities", self.name, self.radius, self.utilities.len());
        Ok(MakerStatus::Ok)
    }

    fn make(&mut self, ctx: &mut EventContext) -> Result<MakerStatus> {
        let jets = {
            let event = ctx.require_pico(&self.name)?;
            self.find_jets(event)?
        };
        self.n_jets += jets.len() as u64;
        ctx.jets = jets;
        Ok(MakerStatus::Ok)
    }

    fn finish(&mut self) -> Result<MakerStatus> {
        log::info!("{}: {} jets", self.name, self.n_jets);
        Ok(MakerStatus::Ok)
    }
}
