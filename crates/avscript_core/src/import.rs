//! CSV and SRT import into a flat shot list.
//!
//! Malformed rows and cues are skipped and counted, never fatal.

use crate::script::{AvScript, Segment, Shot};
use crate::types::TimeUs;
use std::collections::{BTreeMap, HashSet};

/// One row of imported script text.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedShot {
    pub scene_number: u32,
    pub take: String,
    pub audio: String,
    pub visual: String,
    pub duration: Option<TimeUs>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub shots: Vec<ImportedShot>,
    /// Rows or cues that could not be used.
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Scene,
    Take,
    Audio,
    Visual,
    Duration,
}

impl Column {
    fn from_header(cell: &str) -> Option<Self> {
        let name = cell.trim().to_ascii_lowercase();
        let name = name.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        match name {
            "scene" | "scene number" | "segment" => Some(Self::Scene),
            "take" | "shot" | "shot number" => Some(Self::Take),
            "audio" | "dialogue" | "dialog" | "text" | "voiceover" | "vo" => Some(Self::Audio),
            "visual" | "visuals" | "description" | "image" => Some(Self::Visual),
            "duration" | "time" | "runtime" | "length" => Some(Self::Duration),
            _ => None,
        }
    }
}

/// Columns assumed when the file has no header row.
const POSITIONAL: [Column; 5] = [
    Column::Scene,
    Column::Take,
    Column::Audio,
    Column::Visual,
    Column::Duration,
];

/// Parse CSV script text. The first record is a header when any of its
/// cells names a known column; otherwise columns are positional.
pub fn parse_csv(text: &str) -> ImportReport {
    let mut records = parse_records(text).into_iter();
    let mut report = ImportReport::default();

    let Some(first) = records.next() else {
        return report;
    };

    let header: Vec<Option<Column>> = first.iter().map(|c| Column::from_header(c)).collect();
    let (columns, pending) = if header.iter().any(Option::is_some) {
        (header, None)
    } else {
        (POSITIONAL.iter().copied().map(Some).collect(), Some(first))
    };

    for record in pending.into_iter().chain(records) {
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        match row_to_shot(&columns, &record) {
            Some(shot) => report.shots.push(shot),
            None => {
                tracing::debug!(?record, "Skipping CSV row without a scene number");
                report.skipped += 1;
            }
        }
    }

    tracing::info!(rows = report.shots.len(), skipped = report.skipped, "Parsed CSV import");
    report
}

fn row_to_shot(columns: &[Option<Column>], record: &[String]) -> Option<ImportedShot> {
    Some(ImportedShot {
        scene_number: parse_scene_number(cell(columns, record, Column::Scene))?,
        take: cell(columns, record, Column::Take).to_string(),
        audio: cell(columns, record, Column::Audio).to_string(),
        visual: cell(columns, record, Column::Visual).to_string(),
        duration: parse_duration(cell(columns, record, Column::Duration)),
    })
}

fn cell<'a>(columns: &[Option<Column>], record: &'a [String], wanted: Column) -> &'a str {
    columns
        .iter()
        .position(|c| *c == Some(wanted))
        .and_then(|i| record.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Split CSV text into records. Quoted fields may hold commas, doubled
/// quotes and newlines.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// First run of digits in the cell: "Scene 3", "SC03" and "3" all give 3.
fn parse_scene_number(cell: &str) -> Option<u32> {
    let digits: String = cell
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Seconds ("3.5", "3.5s"), "mm:ss" or "hh:mm:ss[.fff]". Anything else,
/// including negative values, is treated as missing.
pub fn parse_duration(cell: &str) -> Option<TimeUs> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    let seconds = if cell.contains(':') {
        let parts: Vec<&str> = cell.split(':').map(str::trim).collect();
        let (h, m, s) = match parts.as_slice() {
            [m, s] => ("0", *m, *s),
            [h, m, s] => (*h, *m, *s),
            _ => return None,
        };
        let h: f64 = h.parse().ok()?;
        let m: f64 = m.parse().ok()?;
        let s: f64 = s.parse().ok()?;
        h * 3600.0 + m * 60.0 + s
    } else {
        let number = cell
            .strip_suffix("secs")
            .or_else(|| cell.strip_suffix("sec"))
            .or_else(|| cell.strip_suffix('s'))
            .unwrap_or(cell);
        number.trim().parse().ok()?
    };

    (seconds.is_finite() && seconds >= 0.0).then(|| TimeUs::from_seconds(seconds))
}

// ---------------------------------------------------------------------------
// SRT
// ---------------------------------------------------------------------------

/// Parse SRT subtitles. Each cue becomes one shot of scene 1 whose audio is
/// the cue text and whose duration is the cue length.
pub fn parse_srt(text: &str) -> ImportReport {
    let mut report = ImportReport::default();
    let normalized = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");

    for block in normalized.split("\n\n") {
        let lines: Vec<&str> = block.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            continue;
        }

        let Some(timing_at) = lines.iter().position(|l| l.contains("-->")) else {
            tracing::debug!(block, "Skipping SRT block without timing line");
            report.skipped += 1;
            continue;
        };
        let Some((start, end)) = parse_cue_timing(lines[timing_at]) else {
            tracing::debug!(line = lines[timing_at], "Skipping SRT block with malformed timing");
            report.skipped += 1;
            continue;
        };

        let take = if timing_at > 0 {
            lines[0].to_string()
        } else {
            (report.shots.len() + 1).to_string()
        };
        report.shots.push(ImportedShot {
            scene_number: 1,
            take,
            audio: lines[timing_at + 1..].join("\n"),
            visual: String::new(),
            duration: Some(end - start),
        });
    }

    tracing::info!(cues = report.shots.len(), skipped = report.skipped, "Parsed SRT import");
    report
}

fn parse_cue_timing(line: &str) -> Option<(TimeUs, TimeUs)> {
    let (start, end) = line.split_once("-->")?;
    let start = parse_srt_timestamp(start.trim())?;
    // Cue settings may follow the end timestamp
    let end = parse_srt_timestamp(end.split_whitespace().next()?)?;
    (end > start).then_some((start, end))
}

/// `HH:MM:SS,mmm` (a `.` separator is accepted too).
fn parse_srt_timestamp(s: &str) -> Option<TimeUs> {
    let (clock, millis) = s.split_once([',', '.'])?;
    let parts: Vec<i64> = clock
        .split(':')
        .map(|p| p.parse().ok())
        .collect::<Option<Vec<i64>>>()?;
    let [h, m, sec] = parts.as_slice() else {
        return None;
    };
    let millis: i64 = millis.parse().ok()?;
    if *m >= 60 || *sec >= 60 || millis >= 1000 || *h < 0 || *m < 0 || *sec < 0 || millis < 0 {
        return None;
    }
    Some(TimeUs::from_millis(((h * 60 + m) * 60 + sec) * 1000 + millis))
}

// ---------------------------------------------------------------------------
// Into script
// ---------------------------------------------------------------------------

/// Group imported rows into segments by scene number.
///
/// Ids derive from scene number and take, so importing the same file twice
/// yields the same script and reconciles to no change.
pub fn into_script(shots: &[ImportedShot]) -> AvScript {
    let mut scenes: BTreeMap<u32, Vec<&ImportedShot>> = BTreeMap::new();
    for shot in shots {
        scenes.entry(shot.scene_number).or_default().push(shot);
    }

    let segments = scenes
        .into_iter()
        .map(|(number, rows)| {
            let mut used: HashSet<String> = HashSet::new();
            let shots = rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| {
                    let base = if row.take.is_empty() {
                        format!("scene-{number}-shot-{}", i + 1)
                    } else {
                        format!("scene-{number}-take-{}", slug(&row.take))
                    };
                    let mut id = base.clone();
                    let mut n = 2;
                    while !used.insert(id.clone()) {
                        id = format!("{base}-{n}");
                        n += 1;
                    }
                    Shot {
                        id,
                        shot_number: (i + 1) as u32,
                        take: row.take.clone(),
                        audio: row.audio.clone(),
                        visual: row.visual.clone(),
                        duration: row.duration.map(|d| d.as_seconds()),
                        ..Default::default()
                    }
                })
                .collect();
            Segment {
                id: format!("scene-{number}"),
                segment_number: number,
                title: format!("Scene {number}"),
                shots,
            }
        })
        .collect();

    AvScript { segments }
}

fn slug(take: &str) -> String {
    take.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
