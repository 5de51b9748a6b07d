mod settings;
mod store;

use anyhow::{bail, Context};
use avscript_core::collision::validate_track;
use avscript_core::import::{into_script, parse_csv, parse_srt};
use avscript_core::script::AvScript;
use avscript_core::{document_path, ExportBundle, TimelineDocument, TimelineSession};
use avscript_playback::{load_all, FfmpegProbe};
use avscript_sync::{sync_from_script, Autosaver, SaveGate, SaveStatus};
use settings::Settings;
use std::path::{Path, PathBuf};
use store::FileStore;

const USAGE: &str = "\
usage: avscript [--settings FILE] <command>

commands:
  import <script.csv|script.srt> <out.json>
  reconcile <script.json> <timeline.json> [--segment ID] [--episode ID]
  export <timeline.json> [out.json]
  check <timeline.json>
  probe <timeline.json>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = Args::new(std::env::args().skip(1));
    let settings_path = args.take_option("--settings")?.map(PathBuf::from);
    let settings = Settings::resolve(settings_path.as_deref())?;

    match args.next_positional().as_deref() {
        Some("import") => {
            let input = args.required("input file")?;
            let output = args.required("output file")?;
            import(Path::new(&input), Path::new(&output))
        }
        Some("reconcile") => {
            let segment = args.take_option("--segment")?;
            let episode = args.take_option("--episode")?;
            let script = args.required("script file")?;
            let timeline = args.required("timeline file")?;
            reconcile(
                Path::new(&script),
                Path::new(&timeline),
                segment.as_deref(),
                episode.as_deref(),
                &settings,
            )
            .await
        }
        Some("export") => {
            let timeline = args.required("timeline file")?;
            let output = args.next_positional();
            export(Path::new(&timeline), output.as_deref().map(Path::new))
        }
        Some("check") => {
            let timeline = args.required("timeline file")?;
            check(Path::new(&timeline))
        }
        Some("probe") => {
            let timeline = args.required("timeline file")?;
            probe(Path::new(&timeline), &settings).await
        }
        Some(other) => bail!("unknown command '{other}'\n\n{USAGE}"),
        None => bail!("{USAGE}"),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn import(input: &Path, output: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let is_srt = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("srt"));
    let report = if is_srt { parse_srt(&text) } else { parse_csv(&text) };
    if report.skipped > 0 {
        tracing::warn!(skipped = report.skipped, "Skipped malformed rows");
    }

    let script = into_script(&report.shots);
    let json = serde_json::to_string_pretty(&script)?;
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Imported {} shots in {} segments ({} skipped) -> {}",
        script.shot_count(),
        script.segments.len(),
        report.skipped,
        output.display()
    );
    Ok(())
}

async fn reconcile(
    script_path: &Path,
    timeline_path: &Path,
    segment_id: Option<&str>,
    episode_id: Option<&str>,
    settings: &Settings,
) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(script_path)
        .with_context(|| format!("reading {}", script_path.display()))?;
    let script: AvScript =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", script_path.display()))?;

    let segment = match segment_id {
        Some(id) => script
            .segment(id)
            .with_context(|| format!("segment '{id}' not found in script"))?,
        None => script.segments.first().context("script has no segments")?,
    };

    let timeline_path = &document_path(timeline_path);
    let doc = if timeline_path.exists() {
        TimelineDocument::load_from_file(timeline_path)
            .with_context(|| format!("loading {}", timeline_path.display()))?
    } else {
        tracing::info!(path = %timeline_path.display(), "No timeline yet, starting empty");
        TimelineDocument::new(episode_id.unwrap_or_default(), &segment.id)
    };
    let episode = episode_id.map(str::to_string).unwrap_or_else(|| doc.episode_id.clone());

    let mut session = TimelineSession::from_document(&doc, settings.engine.clone());
    let gate = SaveGate::new();
    let saver = Autosaver::spawn(FileStore::new(timeline_path), gate.clone(), settings.autosave.clone());

    let changed = sync_from_script(&mut session, &gate, segment).await?;
    if changed || !timeline_path.exists() {
        saver.request(session.to_document(&episode, &segment.id))?;
    }

    if let SaveStatus::Failed(reason) = saver.shutdown().await? {
        bail!("saving {} failed: {reason}", timeline_path.display());
    }

    let state = session.state();
    println!(
        "{} segment '{}': {} slides, {} audio tracks, {} total (revision {})",
        if changed { "Updated" } else { "Unchanged" },
        segment.id,
        state.slides.len(),
        state.audio_tracks.len(),
        state.total_duration(),
        session.revision()
    );
    Ok(())
}

fn export(timeline_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let doc = TimelineDocument::load_from_file(timeline_path)
        .with_context(|| format!("loading {}", timeline_path.display()))?;
    let json = ExportBundle::from_state(&doc.state()).to_json()?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "Exported timeline");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn check(timeline_path: &Path) -> anyhow::Result<()> {
    let doc = TimelineDocument::load_from_file(timeline_path)
        .with_context(|| format!("loading {}", timeline_path.display()))?;

    let mut problems = validate_track(&doc.slides);
    problems.extend(validate_track(&doc.audio_tracks));
    for problem in &problems {
        println!("  ✗ {problem}");
    }
    if !problems.is_empty() {
        bail!("{} problems in {}", problems.len(), timeline_path.display());
    }
    println!(
        "OK: {} slides, {} audio tracks",
        doc.slides.len(),
        doc.audio_tracks.len()
    );
    Ok(())
}

async fn probe(timeline_path: &Path, settings: &Settings) -> anyhow::Result<()> {
    let doc = TimelineDocument::load_from_file(timeline_path)
        .with_context(|| format!("loading {}", timeline_path.display()))?;
    let state = doc.state();

    let media = load_all(&FfmpegProbe, &state.audio_tracks, &settings.playback).await;
    for (track, m) in state.audio_tracks.iter().zip(&media) {
        println!(
            "{}  {}  {}{}",
            track.clip.id,
            m.duration,
            track.audio_url,
            if m.degraded { "  (fallback)" } else { "" }
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

struct Args {
    items: Vec<String>,
}

impl Args {
    fn new(items: impl IntoIterator<Item = String>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    /// Remove `name VALUE` from anywhere in the arguments.
    fn take_option(&mut self, name: &str) -> anyhow::Result<Option<String>> {
        let Some(pos) = self.items.iter().position(|a| a == name) else {
            return Ok(None);
        };
        if pos + 1 >= self.items.len() {
            bail!("{name} needs a value");
        }
        let value = self.items.remove(pos + 1);
        self.items.remove(pos);
        Ok(Some(value))
    }

    fn next_positional(&mut self) -> Option<String> {
        (!self.items.is_empty()).then(|| self.items.remove(0))
    }

    fn required(&mut self, what: &str) -> anyhow::Result<String> {
        self.next_positional()
            .with_context(|| format!("missing {what}\n\n{USAGE}"))
    }
}
