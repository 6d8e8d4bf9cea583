//! stpico CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use st_calib::{
    BUILTIN_RECIPES, FlowCalibConfig, FlowCalibFiller, FlowCalibMaker, RecenterCorrection, Recipe, extract_recipe,
    render_header,
};
use st_pico::event::PICO_EVENT_CLASS;
use st_pico::{
    Chain, EventContext, FileManagerMaker, JetEtaCut, JetMaker, JetPtCut, LeadingTrackCut, Maker, MakerStatus,
    MuDstMaker, PicoConfig, read_pico_events,
};
use st_root::RootFile;
use st_root::objects::is_histogram_class;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stpico")]
#[command(about = "stpico - pico event production and flow calibration tables")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert MuDst events (JSON lines) into a pico file
    Produce {
        /// Input MuDst events, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Pico file to write
        #[arg(long)]
        pico: PathBuf,

        /// Production cuts (YAML). Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many events
        #[arg(long)]
        max_events: Option<u64>,

        /// Output file for the run summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the objects of a ROOT file
    Inspect {
        /// Input ROOT file
        #[arg(short, long)]
        input: PathBuf,

        /// Also summarise every pico event.
        #[arg(long)]
        events: bool,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cluster anti-kt jets in each event of a pico file
    Jets {
        /// Input pico file
        #[arg(short, long)]
        input: PathBuf,

        /// Jet radius
        #[arg(long, default_value = "0.4")]
        radius: f64,

        /// Minimum constituent track pt (GeV/c)
        #[arg(long, default_value = "0.2")]
        min_track_pt: f64,

        /// Minimum jet pt (GeV/c)
        #[arg(long)]
        min_jet_pt: Option<f64>,

        /// Maximum jet |eta|
        #[arg(long)]
        max_jet_eta: Option<f64>,

        /// Minimum leading constituent pt (GeV/c)
        #[arg(long)]
        min_leading_pt: Option<f64>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fill recentering (and, with --recenter, shift) profiles from a pico file
    CalibFill {
        /// Input pico file
        #[arg(short, long)]
        input: PathBuf,

        /// ROOT file to write the profiles to
        #[arg(long)]
        profiles: PathBuf,

        /// Profiles of an earlier pass; enables the shift profiles.
        #[arg(long)]
        recenter: Option<PathBuf>,

        /// Binning and track selection (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// zlib level of the profile file (0 = stored)
        #[arg(long, default_value = "1")]
        compression: u32,

        /// Output file for the fill summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract calibration tables from a ROOT file and write a C header
    CalibDump {
        /// Input ROOT file with the calibration histograms
        #[arg(short, long)]
        input: PathBuf,

        /// Built-in recipe name
        #[arg(long, conflicts_with = "recipe_file", required_unless_present = "recipe_file")]
        recipe: Option<String>,

        /// Custom recipe (YAML)
        #[arg(long)]
        recipe_file: Option<PathBuf>,

        /// Header to write. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the built-in calibration recipes
    Recipes,

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Produce { input, pico, config, max_events, output } => {
            cmd_produce(&input, &pico, config.as_ref(), max_events, output.as_ref())
        }
        Commands::Inspect { input, events, output } => cmd_inspect(&input, events, output.as_ref()),
        Commands::Jets { input, radius, min_track_pt, min_jet_pt, max_jet_eta, min_leading_pt, output } => {
            let cuts = JetCuts { min_track_pt, min_jet_pt, max_jet_eta, min_leading_pt };
            cmd_jets(&input, radius, &cuts, output.as_ref())
        }
        Commands::CalibFill { input, profiles, recenter, config, compression, output } => {
            cmd_calib_fill(&input, &profiles, recenter.as_ref(), config.as_ref(), compression, output.as_ref())
        }
        Commands::CalibDump { input, recipe, recipe_file, output } => {
            cmd_calib_dump(&input, recipe.as_deref(), recipe_file.as_ref(), output.as_ref())
        }
        Commands::Recipes => {
            let recipes = BUILTIN_RECIPES
                .iter()
                .map(|name| {
                    let r = Recipe::builtin(name)?;
                    let tables: Vec<_> = r
                        .tables
                        .iter()
                        .map(|t| json!({ "name": t.name, "prefix": t.prefix, "dims": t.dims }))
                        .collect();
                    Ok(json!({ "name": r.name, "guard": r.guard(), "tables": tables }))
                })
                .collect::<Result<Vec<_>>>()?;
            write_json(None, json!(recipes))
        }
        Commands::Version => {
            println!("stpico {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cmd_produce(
    input: &PathBuf,
    pico: &PathBuf,
    config: Option<&PathBuf>,
    max_events: Option<u64>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let config = match config {
        Some(path) => PicoConfig::from_path(path)?,
        None => PicoConfig::default(),
    };
    let mut source = MuDstMaker::open(input)?;
    let mut writer = FileManagerMaker::writer(pico, config);

    let summary = {
        let mut chain = Chain::new();
        if let Some(n) = max_events {
            chain = chain.with_max_events(n);
        }
        chain.add(&mut source).add(&mut writer);
        chain.run()?
    };
    let stats = writer.stats();
    tracing::info!(written = stats.events_written, read = source.n_read(), "production complete");

    write_json(
        output,
        json!({
            "input": input.display().to_string(),
            "pico": pico.display().to_string(),
            "chain": summary,
            "stats": stats,
        }),
    )
}

fn cmd_inspect(input: &PathBuf, events: bool, output: Option<&PathBuf>) -> Result<()> {
    let file = RootFile::open(input)?;
    let keys = file.list_keys()?;

    let mut histograms = Vec::new();
    for k in keys.iter().filter(|k| is_histogram_class(&k.class_name)) {
        let h = file.get_histogram(&k.name)?;
        histograms.push(json!({ "name": k.name, "n_bins": h.n_bins(), "entries": h.entries() }));
    }

    let mut out = json!({
        "file": input.display().to_string(),
        "keys": keys
            .iter()
            .map(|k| json!({ "name": k.name, "class": k.class_name, "title": k.title, "cycle": k.cycle }))
            .collect::<Vec<_>>(),
        "n_pico_events": keys.iter().filter(|k| k.class_name == PICO_EVENT_CLASS).count(),
        "histograms": histograms,
    });

    if events {
        let picos = read_pico_events(input)?;
        out["events"] = picos
            .iter()
            .map(|e| {
                json!({
                    "run_id": e.run_id,
                    "event_id": e.event_id,
                    "vz": e.primary_vertex[2],
                    "ref_mult": e.ref_mult,
                    "centrality": e.centrality,
                    "n_tracks": e.tracks.len(),
                    "n_primary": e.tracks.iter().filter(|t| t.is_primary()).count(),
                })
            })
            .collect::<Vec<_>>()
            .into();
    }
    tracing::info!(keys = keys.len(), "inspected {}", input.display());

    write_json(output, out)
}

struct JetCuts {
    min_track_pt: f64,
    min_jet_pt: Option<f64>,
    max_jet_eta: Option<f64>,
    min_leading_pt: Option<f64>,
}

/// Records the jets each event ends up with.
#[derive(Default)]
struct JetCollector {
    events: Vec<serde_json::Value>,
}

impl Maker for JetCollector {
    fn name(&self) -> &str {
        "JetCollector"
    }

    fn make(&mut self, ctx: &mut EventContext) -> st_pico::Result<MakerStatus> {
        let event = ctx.require_pico("JetCollector")?;
        self.events.push(json!({
            "run_id": event.run_id,
            "event_id": event.event_id,
            "centrality": event.centrality,
            "jets": ctx.jets,
        }));
        Ok(MakerStatus::Ok)
    }
}

fn cmd_jets(input: &PathBuf, radius: f64, cuts: &JetCuts, output: Option<&PathBuf>) -> Result<()> {
    let mut reader = FileManagerMaker::reader(input);
    let mut jets = JetMaker::new("jets", radius).with_track_cuts(cuts.min_track_pt, 1.0);
    if let Some(min_pt) = cuts.min_jet_pt {
        jets.add_utility(Box::new(JetPtCut { min_pt }));
    }
    if let Some(max_abs_eta) = cuts.max_jet_eta {
        jets.add_utility(Box::new(JetEtaCut { max_abs_eta }));
    }
    if let Some(min_pt) = cuts.min_leading_pt {
        jets.add_utility(Box::new(LeadingTrackCut { min_pt }));
    }
    let mut collector = JetCollector::default();

    let summary = {
        let mut chain = Chain::new();
        chain.add(&mut reader).add(&mut jets).add(&mut collector);
        chain.run()?
    };
    tracing::info!(events = summary.processed, jets = jets.n_jets(), "jet finding complete");

    write_json(
        output,
        json!({
            "radius": radius,
            "n_events": summary.processed,
            "n_jets": jets.n_jets(),
            "events": collector.events,
        }),
    )
}

fn cmd_calib_fill(
    input: &PathBuf,
    profiles: &PathBuf,
    recenter: Option<&PathBuf>,
    config: Option<&PathBuf>,
    compression: u32,
    output: Option<&PathBuf>,
) -> Result<()> {
    let config = match config {
        Some(path) => FlowCalibConfig::from_path(path)?,
        None => FlowCalibConfig::default(),
    };
    let mut filler = FlowCalibFiller::new(config)?;
    if let Some(path) = recenter {
        let correction = RecenterCorrection::from_file(&RootFile::open(path)?, filler.config())?;
        filler = filler.with_recenter(correction)?;
    }

    let mut reader = FileManagerMaker::reader(input);
    let mut calib = FlowCalibMaker::new(filler, profiles).with_compression(compression);
    let summary = {
        let mut chain = Chain::new();
        chain.add(&mut reader).add(&mut calib);
        chain.run()?
    };
    let stats = calib.filler().stats();
    tracing::info!(events = stats.events_used, planes = stats.planes_filled, "calibration pass complete");

    write_json(
        output,
        json!({
            "input": input.display().to_string(),
            "profiles": profiles.display().to_string(),
            "shift": calib.filler().fills_shift(),
            "chain": summary,
            "stats": stats,
        }),
    )
}

fn cmd_calib_dump(
    input: &PathBuf,
    recipe: Option<&str>,
    recipe_file: Option<&PathBuf>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let recipe = match (recipe, recipe_file) {
        (_, Some(path)) => Recipe::from_path(path)?,
        (Some(name), None) => Recipe::builtin(name)?,
        (None, None) => anyhow::bail!("either --recipe or --recipe-file is required"),
    };
    let file = RootFile::open(input)?;
    let tables = extract_recipe(&file, &recipe)?;
    let source = input.file_name().map_or_else(|| input.display().to_string(), |n| n.to_string_lossy().into_owned());
    let header = render_header(&recipe, &tables, &source)?;
    tracing::info!(recipe = %recipe.name, tables = tables.len(), "header rendered");

    if let Some(path) = output {
        std::fs::write(path, header)?;
    } else {
        print!("{header}");
    }
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
