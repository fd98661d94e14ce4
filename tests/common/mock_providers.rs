/*!
 * Mock provider implementations for testing
 *
 * This module provides mock implementations of the external seams (phoneme
 * recognizer, pronunciation resolver, unknown word handler) so tests never
 * touch real audio backends or dictionary files.
 */

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use lipalign::auto_align::{RecognizedPhoneme, Recognizer};
use lipalign::breakdown::{PronunciationResolver, UnknownWordHandler};
use lipalign::errors::{BreakdownError, RecognizerError};

/// Mock recognizer returning a predetermined phoneme stream
pub struct MockRecognizer {
    /// Backend label used for the generated phrase
    pub backend: String,
    /// Phonemes to return
    pub phonemes: Vec<RecognizedPhoneme>,
    /// Should the next call fail
    pub should_fail: bool,
}

impl MockRecognizer {
    pub fn new(phonemes: Vec<RecognizedPhoneme>) -> Self {
        Self {
            backend: "Mock".to_string(),
            phonemes,
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            backend: "Mock".to_string(),
            phonemes: Vec::new(),
            should_fail: true,
        }
    }
}

impl Recognizer for MockRecognizer {
    fn name(&self) -> &str {
        &self.backend
    }

    fn recognize(&self, _audio_path: &Path) -> Result<Vec<RecognizedPhoneme>, RecognizerError> {
        if self.should_fail {
            return Err(RecognizerError::Failed("mock backend failure".to_string()));
        }
        Ok(self.phonemes.clone())
    }
}

/// Mock resolver backed by a small in-memory dictionary of canonical
/// pronunciations, case-insensitive like the real dictionaries
pub struct MockResolver {
    dictionary: HashMap<String, Vec<String>>,
}

impl MockResolver {
    /// Dictionary with the handful of words the tests use
    pub fn new() -> Self {
        let mut dictionary = HashMap::new();
        for (word, symbols) in [
            ("hello", vec!["HH", "AH0", "L", "OW1"]),
            ("world", vec!["W", "ER1", "L", "D"]),
            ("test", vec!["T", "EH1", "S", "T"]),
            ("a", vec!["AH0"]),
        ] {
            dictionary.insert(
                word.to_string(),
                symbols.into_iter().map(str::to_string).collect(),
            );
        }
        Self { dictionary }
    }
}

impl PronunciationResolver for MockResolver {
    fn resolve(&self, word: &str, language: &str) -> Result<Vec<String>, BreakdownError> {
        if language != "en" {
            return Err(BreakdownError::UnknownLanguage(language.to_string()));
        }
        self.dictionary
            .get(&word.to_lowercase())
            .cloned()
            .ok_or_else(|| BreakdownError::WordNotFound(word.to_string()))
    }
}

/// Handler that records which unknown words it was asked about and answers
/// with a fixed pronunciation
pub struct RecordingHandler {
    /// Pronunciation returned for every unknown word, None declines
    pub answer: Option<Vec<String>>,
    /// Words the handler was asked about
    pub asked: RefCell<Vec<String>>,
}

impl RecordingHandler {
    pub fn declining() -> Self {
        Self {
            answer: None,
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn answering(symbols: &[&str]) -> Self {
        Self {
            answer: Some(symbols.iter().map(|s| s.to_string()).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl UnknownWordHandler for RecordingHandler {
    fn resolve_unknown(&self, word: &str, _available_symbols: &[String]) -> Option<Vec<String>> {
        self.asked.borrow_mut().push(word.to_string());
        self.answer.clone()
    }
}
