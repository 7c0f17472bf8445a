//! Raid dump collection.
//!
//! A raid dump is a block of member lines bracketed by a start marker and
//! an end marker. Some servers never print the end marker, so collection
//! also finishes when a timer expires. Whichever fires first wins; the other
//! becomes a no-op.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fancy_regex::Regex;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::common::error::ConfigError;
use crate::common::{CharacterClass, RaidMember};

/// How long a dump may collect without an end marker.
pub const RAID_DUMP_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_START_MARKERS: [&str; 4] = [
    r"(?i)^Raid Members:",
    r"(?i)^Players on raid:",
    r"(?i)^#raidlist",
    r"(?i)^Raid roster",
];

const END_MARKERS: [&str; 3] = [r"(?i)^\d+ total raid members", r"(?i)^End of raid", r"(?i)^---"];

/// Bare names rejected as header/footer noise.
const STOP_WORDS: [&str; 8] = [
    "name", "player", "class", "level", "group", "raid", "members", "total",
];

/// Compile start marker patterns, falling back to the built-in list.
pub fn compile_start_markers(overrides: Option<&[String]>) -> Result<Vec<Regex>, ConfigError> {
    match overrides {
        Some(patterns) if !patterns.is_empty() => patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidRegex {
                    pattern: p.clone(),
                    message: e.to_string(),
                })
            })
            .collect(),
        _ => Ok(DEFAULT_START_MARKERS
            .iter()
            .map(|p| Regex::new(p).unwrap())
            .collect()),
    }
}

type Extractor = fn(&fancy_regex::Captures) -> RaidMember;

/// Member line grammar, tried in order; the first match wins.
struct MemberGrammar {
    rules: Vec<(Regex, Extractor)>,
}

impl MemberGrammar {
    fn new() -> Self {
        let rules: [(&str, Extractor); 5] = [
            // "1 | Name | 60 | Warrior"
            (
                r"^\s*(\d+)\s*\|\s*(\w+)\s*\|\s*(\d+)\s*\|\s*(\w[\w ]*\w)\s*$",
                group_first,
            ),
            // "Name 60 Warrior Group 1"
            (
                r"^\s*(\w+)\s+(\d+)\s+([\w ]+?)\s+(?:Group\s+)?(\d+)\s*$",
                group_last,
            ),
            // "Name (60 Warrior)"
            (r"^\s*(\w+)\s+\((\d+)\s+([\w ]+?)\)\s*$", parenthesised),
            // "[Group 1] Name 60 Warrior"
            (
                r"^\s*\[(?:Group\s+)?(\d+)\]\s*(\w+)\s+(\d+)\s+([\w ]+?)\s*$",
                group_first,
            ),
            // "Name"
            (r"^\s*(\w{2,})\s*$", bare_name),
        ];
        Self {
            rules: rules
                .into_iter()
                .map(|(pattern, extract)| (Regex::new(pattern).unwrap(), extract))
                .collect(),
        }
    }

    fn parse_line(&self, line: &str) -> Option<RaidMember> {
        for (pattern, extract) in &self.rules {
            let Ok(Some(caps)) = pattern.captures(line) else {
                continue;
            };
            let parsed = extract(&caps);
            if parsed.class.is_none()
                && STOP_WORDS.contains(&parsed.name.to_lowercase().as_str())
            {
                return None;
            }
            return Some(parsed);
        }
        None
    }
}

fn text(caps: &fancy_regex::Captures, index: usize) -> String {
    caps.get(index)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn number(caps: &fancy_regex::Captures, index: usize) -> u32 {
    text(caps, index).parse().unwrap_or(0)
}

fn class(caps: &fancy_regex::Captures, index: usize) -> Option<CharacterClass> {
    Some(CharacterClass::normalize(&text(caps, index)))
}

/// group, name, level, class
fn group_first(caps: &fancy_regex::Captures) -> RaidMember {
    RaidMember {
        name: text(caps, 2),
        level: number(caps, 3),
        class: class(caps, 4),
        group_number: number(caps, 1),
    }
}

/// name, level, class, group
fn group_last(caps: &fancy_regex::Captures) -> RaidMember {
    RaidMember {
        name: text(caps, 1),
        level: number(caps, 2),
        class: class(caps, 3),
        group_number: number(caps, 4),
    }
}

/// name, level, class
fn parenthesised(caps: &fancy_regex::Captures) -> RaidMember {
    RaidMember {
        name: text(caps, 1),
        level: number(caps, 2),
        class: class(caps, 3),
        group_number: 0,
    }
}

fn bare_name(caps: &fancy_regex::Captures) -> RaidMember {
    RaidMember::named(text(caps, 1))
}

/// Parse buffered dump lines into members, de-duplicated by
/// case-insensitive name. The first occurrence of a name wins.
pub fn parse_raid_dump<S: AsRef<str>>(lines: &[S]) -> Vec<RaidMember> {
    let grammar = MemberGrammar::new();
    let mut seen = HashSet::new();
    lines
        .iter()
        .filter_map(|line| grammar.parse_line(line.as_ref()))
        .filter(|m| seen.insert(m.name.to_lowercase()))
        .collect()
}

#[derive(Debug, Default)]
struct CollectorState {
    collecting: bool,
    lines: Vec<String>,
    /// Bumped on every finish so a stale timer can recognise itself.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// How a dump ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    EndMarker,
    Timeout,
}

/// Collects raid dump lines from the console and emits parsed member lists.
#[derive(Clone)]
pub struct RaidCollector {
    state: Arc<Mutex<CollectorState>>,
    results: mpsc::UnboundedSender<Vec<RaidMember>>,
    start_markers: Arc<Vec<Regex>>,
    end_markers: Arc<Vec<Regex>>,
    timeout: Duration,
}

impl RaidCollector {
    pub fn new(
        start_markers: Vec<Regex>,
        results: mpsc::UnboundedSender<Vec<RaidMember>>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CollectorState::default())),
            results,
            start_markers: Arc::new(start_markers),
            end_markers: Arc::new(END_MARKERS.iter().map(|p| Regex::new(p).unwrap()).collect()),
            timeout: RAID_DUMP_TIMEOUT,
        }
    }

    /// Whether a dump is currently being collected.
    pub fn is_collecting(&self) -> bool {
        self.state.lock().collecting
    }

    /// Feed one console line. Must be called from within a tokio runtime.
    pub fn process_line(&self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        if !state.collecting {
            if matches_any(&self.start_markers, trimmed) {
                info!("Raid dump started: {}", trimmed);
                state.collecting = true;
                state.lines.clear();
                self.arm_timer(&mut state);
            }
            return;
        }

        if matches_any(&self.end_markers, trimmed) {
            info!("Raid dump ended: {}", trimmed);
            self.finish(&mut state, FinishReason::EndMarker);
            return;
        }

        state.lines.push(trimmed.to_string());
    }

    fn arm_timer(&self, state: &mut CollectorState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        let generation = state.generation;
        let collector = self.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(collector.timeout).await;
            let mut state = collector.state.lock();
            if state.collecting && state.generation == generation {
                info!(
                    "Raid dump timed out, processing {} line(s)",
                    state.lines.len()
                );
                collector.finish(&mut state, FinishReason::Timeout);
            }
        }));
    }

    /// Finish the current dump. No-op when not collecting.
    fn finish(&self, state: &mut CollectorState, reason: FinishReason) {
        if !state.collecting {
            return;
        }
        state.collecting = false;
        state.generation += 1;
        let timer = state.timer.take();
        if reason == FinishReason::EndMarker {
            if let Some(timer) = timer {
                timer.abort();
            }
        }
        let lines = std::mem::take(&mut state.lines);

        if lines.is_empty() {
            warn!("Empty raid dump, ignoring");
            return;
        }
        let members = parse_raid_dump(&lines);
        if members.is_empty() {
            warn!("No raid members parsed from dump ({} lines)", lines.len());
            return;
        }

        info!("Parsed {} raid member(s) from dump", members.len());
        if self.results.send(members).is_err() {
            warn!("Raid result receiver dropped");
        }
    }
}

fn matches_any(patterns: &[Regex], line: &str) -> bool {
    patterns.iter().any(|p| p.is_match(line).unwrap_or(false))
}
