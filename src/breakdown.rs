/*!
 * Text breakdown: turning a voice's prose into Phrase/Word/Phoneme subtrees.
 *
 * The pronunciation itself comes from an external resolver (dictionary or
 * rule based, per language); this module only consumes its output, converts
 * the canonical symbols into the active phoneme set and assigns a first
 * guess of frames across the sound duration.
 */

use anyhow::Result;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::BreakdownError;
use crate::phoneme_set::PhonemeSet;
use crate::timeline::{NodeId, NodeKind, Timeline};

// Punctuation that needs a following space so it cannot glue words together.
static PUNCTUATION_GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.,!?;/()\-])(\S)").expect("static punctuation regex"));

// Characters stripped from the edges of a word before lookup.
const STRIP_SYMBOLS: &[char] = &[
    '.', ',', '!', '?', ';', '-', '/', '(', ')', '"', '\u{BF}', '\'',
];

/// Resolves a word to its ordered canonical (CMU) phoneme symbols.
pub trait PronunciationResolver {
    fn resolve(&self, word: &str, language: &str) -> Result<Vec<String>, BreakdownError>;
}

/// Decides what to do with a word the resolver does not know. An interactive
/// frontend can prompt the user for phonemes in the active set; returning
/// `None` declines and the word contributes zero phonemes.
pub trait UnknownWordHandler {
    fn resolve_unknown(&self, word: &str, available_symbols: &[String]) -> Option<Vec<String>>;
}

/// Default handler: always decline.
pub struct DeclineUnknown;

impl UnknownWordHandler for DeclineUnknown {
    fn resolve_unknown(&self, _word: &str, _available_symbols: &[String]) -> Option<Vec<String>> {
        None
    }
}

/// Rebuilds the subtree of `voice` from its text.
///
/// Existing children are destroyed wholesale. One phrase per non-empty line,
/// one word per whitespace token; each word's canonical pronunciation is
/// mapped into `phoneme_set`, then every node gets a first-guess frame span
/// spread evenly over `frame_duration`.
pub fn breakdown_voice(
    timeline: &mut Timeline,
    voice: NodeId,
    language: &str,
    frame_duration: i64,
    phoneme_set: &PhonemeSet,
    resolver: &dyn PronunciationResolver,
    unknown_handler: &dyn UnknownWordHandler,
    progress: &mut dyn FnMut(u8),
) -> Result<()> {
    timeline.clear_children(voice);
    let text = normalize_punctuation(&timeline.node(voice).text);

    let lines: Vec<String> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    let total = lines.len().max(1);

    for (index, line) in lines.iter().enumerate() {
        let phrase = timeline.add_child(voice, NodeKind::Phrase, line, 0, 0);
        for token in line.split_whitespace() {
            let word = timeline.add_child(phrase, NodeKind::Word, token, 0, 0);
            breakdown_word(timeline, word, language, phoneme_set, resolver, unknown_handler)?;
        }
        progress(((index + 1) * 100 / total) as u8);
    }

    assign_first_guess_frames(timeline, voice, frame_duration);
    Ok(())
}

/// Fills a word node with phoneme children from its pronunciation.
fn breakdown_word(
    timeline: &mut Timeline,
    word: NodeId,
    language: &str,
    phoneme_set: &PhonemeSet,
    resolver: &dyn PronunciationResolver,
    unknown_handler: &dyn UnknownWordHandler,
) -> Result<()> {
    let text = timeline
        .node(word)
        .text
        .trim_matches(STRIP_SYMBOLS)
        .to_string();
    if text.is_empty() {
        return Ok(());
    }
    match resolver.resolve(&text, language) {
        Ok(raw) => {
            for raw_symbol in raw {
                // Dictionary entries carry stress digits the sets do not.
                let canonical = raw_symbol.trim_end_matches(|c: char| c.is_ascii_digit());
                match phoneme_set.from_canonical(canonical) {
                    Some(native) if !native.is_empty() => {
                        let native = native.to_string();
                        timeline.add_child(word, NodeKind::Phoneme, &native, 0, 0);
                    }
                    Some(_) => {}
                    None => debug!("unknown phoneme '{}' in word '{}'", raw_symbol, text),
                }
            }
            Ok(())
        }
        Err(BreakdownError::WordNotFound(_)) => {
            match unknown_handler.resolve_unknown(&text, &phoneme_set.symbols) {
                Some(symbols) => {
                    info!("user supplied pronunciation for '{}'", text);
                    for symbol in symbols {
                        timeline.add_child(word, NodeKind::Phoneme, &symbol, 0, 0);
                    }
                }
                // A declined word stays in the tree with zero phonemes.
                None => warn!("no pronunciation for '{}', leaving it empty", text),
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// First-guess frame alignment: divide the sound duration by the phoneme
/// count and hand every phoneme that many frames, in document order. A word
/// without phonemes gets a four-frame placeholder span.
fn assign_first_guess_frames(timeline: &mut Timeline, voice: NodeId, frame_duration: i64) {
    let phrases = timeline.node(voice).children().to_vec();

    let mut phoneme_count: i64 = 0;
    for phrase in &phrases {
        for word in timeline.node(*phrase).children().to_vec() {
            let n = timeline.node(word).children().len() as i64;
            phoneme_count += if n == 0 { 4 } else { n };
        }
    }

    let frames_per_phoneme = if frame_duration > 0 && phoneme_count > 0 {
        (frame_duration / phoneme_count).max(1)
    } else {
        1
    };

    let mut cur_frame: i64 = 0;
    for phrase in &phrases {
        let words = timeline.node(*phrase).children().to_vec();
        for word in &words {
            let phonemes = timeline.node(*word).children().to_vec();
            if phonemes.is_empty() {
                timeline.set_frames(*word, cur_frame, cur_frame + 3);
                cur_frame += 4;
                continue;
            }
            for phoneme in &phonemes {
                timeline.set_frames(*phoneme, cur_frame, cur_frame);
                cur_frame += frames_per_phoneme;
            }
            let first = timeline.node(phonemes[0]).start_frame();
            let last = timeline.node(*phonemes.last().expect("non-empty")).end_frame();
            // The word must stay at least one frame per phoneme wide, even
            // when the phonemes sit on consecutive frames.
            let tail = (frames_per_phoneme - 1).max(1);
            timeline.set_frames(*word, first, last + tail);
        }
        if let (Some(first), Some(last)) = (words.first(), words.last()) {
            let start = timeline.node(*first).start_frame();
            let end = timeline.node(*last).end_frame();
            timeline.set_frames(*phrase, start, end);
        }
    }
}

/// Makes sure every punctuation mark is followed by a space, so splitting on
/// whitespace cannot produce glued-together words.
fn normalize_punctuation(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let replaced = PUNCTUATION_GAP.replace_all(&current, "$1 $2").to_string();
        if replaced == current {
            return current;
        }
        current = replaced;
    }
}
