use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::RecognizerError;
use crate::peaks::level_peaks;
use crate::phoneme_set::REST;
use crate::timeline::{NodeId, NodeKind, Timeline};

// @module: Automatic phoneme alignment from a recognized stream

/// How recognized phonemes are spread across the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistributionMode {
    /// Infer word boundaries from timing peaks in the recognized stream.
    #[default]
    Peaks,
    /// Put everything into a single word spanning the whole sound.
    Even,
}

impl fmt::Display for DistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Peaks => write!(f, "peaks"),
            Self::Even => write!(f, "even"),
        }
    }
}

impl FromStr for DistributionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "peaks" => Ok(Self::Peaks),
            "even" => Ok(Self::Even),
            _ => Err(anyhow!("Invalid distribution mode: {}", s)),
        }
    }
}

/// One phoneme reported by a recognizer, with its timing in seconds.
#[derive(Debug, Clone)]
pub struct RecognizedPhoneme {
    pub symbol: String,
    pub start: f64,
    pub duration: f64,
}

impl RecognizedPhoneme {
    pub fn new(symbol: &str, start: f64, duration: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            start,
            duration,
        }
    }
}

/// External phoneme recognizer. Calls are expected to block; cancellation is
/// "discard the pending result", never mid-call interruption.
pub trait Recognizer {
    /// Short name of the backend, used to label the generated phrase.
    fn name(&self) -> &str;

    /// Recognizes the ordered phoneme stream of an audio file.
    fn recognize(&self, audio_path: &Path) -> Result<Vec<RecognizedPhoneme>, RecognizerError>;
}

/// Builds a Phrase/Word/Phoneme subtree from a recognized phoneme stream.
#[derive(Debug, Clone, Copy)]
pub struct AutoAligner {
    pub fps: u32,
    pub sound_duration: i64,
    pub mode: DistributionMode,
}

impl AutoAligner {
    pub fn new(fps: u32, sound_duration: i64, mode: DistributionMode) -> Self {
        Self {
            fps,
            sound_duration,
            mode,
        }
    }

    /// Derives the word boundary frames for a recognized stream.
    ///
    /// In peaks mode the inter-onset durations form the series handed to the
    /// peak detector; each peak maps back to the frame of the phoneme it
    /// belongs to. The result is strictly increasing and always contains 0
    /// and the sound duration as sentinels.
    pub fn segment(&self, results: &[RecognizedPhoneme]) -> Vec<i64> {
        let trivial = vec![0, self.sound_duration];
        if self.mode == DistributionMode::Even || results.is_empty() {
            return trivial;
        }

        let mut time_list = Vec::with_capacity(results.len() + 1);
        let mut prev_start = 0.0;
        for result in results {
            time_list.push(result.start - prev_start);
            prev_start = result.start;
        }
        time_list.push(self.sound_duration as f64 / self.fps as f64 - prev_start);

        let mut boundaries: Vec<i64> = level_peaks(&time_list)
            .into_iter()
            .filter(|peak| *peak < results.len())
            .map(|peak| (results[peak].start * self.fps as f64).round() as i64)
            .collect();
        boundaries.push(0);
        boundaries.push(self.sound_duration);
        boundaries.sort_unstable();
        boundaries.dedup();
        boundaries.retain(|b| (0..=self.sound_duration).contains(b));
        debug!("segmentation boundaries: {:?}", boundaries);
        boundaries
    }

    /// Consecutive increasing boundary pairs become the word intervals.
    pub fn word_intervals(boundaries: &[i64]) -> Vec<(i64, i64)> {
        boundaries
            .windows(2)
            .filter(|pair| pair[1] > pair[0])
            .map(|pair| (pair[0], pair[1]))
            .collect()
    }

    /// Splits `total` symbols across `intervals`, front to back: the last
    /// interval takes everything still in the queue, every other interval
    /// takes `min(width, max(1, remaining / remaining_intervals))`.
    pub fn distribute(intervals: &[(i64, i64)], total: usize) -> Vec<usize> {
        let mut counts = Vec::with_capacity(intervals.len());
        let mut remaining = total;
        for (i, (left, right)) in intervals.iter().enumerate() {
            let count = if i == intervals.len() - 1 {
                remaining
            } else {
                let remaining_intervals = intervals.len() - i;
                let share = (remaining / remaining_intervals).max(1);
                share.min((right - left) as usize).min(remaining)
            };
            counts.push(count);
            remaining -= count;
        }
        counts
    }

    /// Materializes the subtree for a recognized stream under `voice`:
    /// one synthetic phrase labeled after the recognizer, one word per
    /// interval, one front-packed phoneme per frame.
    ///
    /// When more symbols land in an interval than it has frames (only
    /// possible for the trailing interval), the word and the wrapping
    /// phrase are widened to cover the spill so no recognized symbol is
    /// dropped.
    pub fn build_phrase(
        &self,
        timeline: &mut Timeline,
        voice: NodeId,
        recognizer_name: &str,
        symbols: &[String],
        boundaries: &[i64],
    ) -> NodeId {
        let intervals = Self::word_intervals(boundaries);
        let label = format!("Auto detection {}", recognizer_name);
        let phrase = timeline.add_child(voice, NodeKind::Phrase, &label, 0, self.sound_duration);

        let counts = Self::distribute(&intervals, symbols.len());
        let mut queue = symbols.iter();
        let mut phrase_end = self.sound_duration;
        for ((left, right), count) in intervals.into_iter().zip(counts) {
            let assigned: Vec<String> = queue
                .by_ref()
                .take(count)
                .map(|s| normalize_symbol(s))
                .collect();
            let word_end = right.max(left + assigned.len() as i64);
            let word_text = assigned.join("|");
            let word = timeline.add_child(phrase, NodeKind::Word, &word_text, left, word_end);
            for (offset, symbol) in assigned.iter().enumerate() {
                let frame = left + offset as i64;
                timeline.add_child(word, NodeKind::Phoneme, symbol, frame, frame);
            }
            phrase_end = phrase_end.max(word_end);
        }
        if phrase_end > self.sound_duration {
            debug!(
                "recognized symbols spill {} frames past the sound end",
                phrase_end - self.sound_duration
            );
            timeline.set_frames(phrase, 0, phrase_end);
        }
        phrase
    }

    /// Full pipeline: segmentation, distribution, materialization.
    pub fn align(
        &self,
        timeline: &mut Timeline,
        voice: NodeId,
        recognizer_name: &str,
        results: &[RecognizedPhoneme],
    ) -> NodeId {
        // The generated phrase covers the whole sound, so it replaces
        // whatever the voice held before.
        timeline.clear_children(voice);
        let boundaries = self.segment(results);
        let symbols: Vec<String> = results.iter().map(|r| r.symbol.clone()).collect();
        info!(
            "aligning {} recognized phonemes into {} intervals",
            symbols.len(),
            Self::word_intervals(&boundaries).len()
        );
        self.build_phrase(timeline, voice, recognizer_name, &symbols, &boundaries)
    }
}

/// Recognized symbols are stored uppercase; "rest" stays as is.
fn normalize_symbol(symbol: &str) -> String {
    if symbol == REST {
        symbol.to_string()
    } else {
        symbol.to_uppercase()
    }
}
