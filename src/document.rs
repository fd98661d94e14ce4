use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::auto_align::{AutoAligner, DistributionMode, Recognizer};
use crate::breakdown::{PronunciationResolver, UnknownWordHandler, breakdown_voice};
use crate::errors::ProjectError;
use crate::file_utils::FileManager;
use crate::phoneme_set::{CANONICAL_SET, PhonemeSetRegistry, REST};
use crate::timeline::{FrameCursor, NodeId, NodeKind, RestPolicy, Timeline};

// @module: Document ownership, persistence and orchestration

/// Header line of the legacy project format.
const LEGACY_HEADER: &str = "lipsync version 1";

/// Version stamp of the structured interchange format.
const PROJECT_VERSION: u32 = 2;

/// Coarse percent-complete sink for the long-running operations.
pub type ProgressSink<'a> = &'a mut dyn FnMut(u8);

/// A lip-sync document: the timeline tree, its sound metadata and the name
/// of the phoneme set its phonemes are written in.
///
/// All operations are synchronous and single-threaded; serializing access
/// per document is the caller's responsibility.
#[derive(Debug)]
pub struct Document {
    pub name: String,
    pub path: Option<PathBuf>,
    pub sound_path: PathBuf,
    pub phoneme_set_name: String,
    timeline: Timeline,
    current_voice: Option<NodeId>,
    dirty: bool,
}

impl Document {
    pub fn new(name: &str) -> Self {
        // New documents start with the historical defaults: 24 fps and a
        // three second placeholder sound.
        Self {
            name: name.to_string(),
            path: None,
            sound_path: PathBuf::new(),
            phoneme_set_name: "preston_blair".to_string(),
            timeline: Timeline::new(name, 24, 72),
            current_voice: None,
            dirty: false,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    pub fn fps(&self) -> u32 {
        self.timeline.fps()
    }

    pub fn sound_duration(&self) -> i64 {
        self.timeline.sound_duration()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn voices(&self) -> Vec<NodeId> {
        self.timeline.node(self.timeline.root()).children().to_vec()
    }

    pub fn current_voice(&self) -> Option<NodeId> {
        self.current_voice
    }

    pub fn set_current_voice(&mut self, voice: NodeId) {
        self.current_voice = Some(voice);
    }

    /// Adds an empty voice under the project root and makes it current.
    pub fn add_voice(&mut self, name: &str) -> NodeId {
        let root = self.timeline.root();
        let voice = self.timeline.add_child(root, NodeKind::Voice, "", 0, 0);
        self.timeline.node_mut(voice).name = name.to_string();
        self.current_voice = Some(voice);
        self.dirty = true;
        voice
    }

    fn ensure_current_voice(&mut self) -> NodeId {
        match self.current_voice {
            Some(voice) => voice,
            None => match self.voices().first().copied() {
                Some(voice) => {
                    self.current_voice = Some(voice);
                    voice
                }
                None => self.add_voice("Voice 1"),
            },
        }
    }

    /// Breaks the current voice's text down into phrases, words and
    /// phonemes in the given phoneme set, replacing its previous subtree.
    pub fn breakdown(
        &mut self,
        language: &str,
        registry: &PhonemeSetRegistry,
        resolver: &dyn PronunciationResolver,
        unknown_handler: &dyn UnknownWordHandler,
        progress: ProgressSink<'_>,
    ) -> Result<()> {
        let set = registry
            .get(&self.phoneme_set_name)
            .ok_or_else(|| ProjectError::UnknownPhonemeSet(self.phoneme_set_name.clone()))?;
        let voice = self.ensure_current_voice();
        let frame_duration = self.sound_duration();
        breakdown_voice(
            &mut self.timeline,
            voice,
            language,
            frame_duration,
            set,
            resolver,
            unknown_handler,
            progress,
        )?;
        self.dirty = true;
        Ok(())
    }

    /// Runs the recognizer over the document's sound and attaches the
    /// aligned phrase to the current voice.
    ///
    /// A recognizer failure is logged and degrades to an empty phoneme list
    /// with the trivial whole-sound segmentation, so the document stays
    /// editable. Recognized phonemes are canonical, so the document's
    /// phoneme set switches to the canonical one.
    pub fn auto_align(
        &mut self,
        recognizer: &dyn Recognizer,
        mode: DistributionMode,
        progress: ProgressSink<'_>,
    ) -> Result<NodeId> {
        let voice = self.ensure_current_voice();
        progress(5);
        let results = match recognizer.recognize(&self.sound_path) {
            Ok(results) => results,
            Err(e) => {
                error!("auto recognition failed: {}", e);
                Vec::new()
            }
        };
        progress(80);
        let aligner = AutoAligner::new(self.fps(), self.sound_duration(), mode);
        let phrase = aligner.align(&mut self.timeline, voice, recognizer.name(), &results);
        self.phoneme_set_name = CANONICAL_SET.to_string();
        self.dirty = true;
        progress(100);
        Ok(phrase)
    }

    /// Rewrites every phoneme from the document's current set into
    /// `new_set` and selects it. Conversion misses fall back to "rest".
    pub fn convert_phoneme_set(
        &mut self,
        registry: &PhonemeSetRegistry,
        new_set: &str,
    ) -> Result<()> {
        if self.phoneme_set_name == new_set {
            return Ok(());
        }
        if registry.get(new_set).is_none() {
            return Err(ProjectError::UnknownPhonemeSet(new_set.to_string()).into());
        }
        let old_set = self.phoneme_set_name.clone();
        let root = self.timeline.root();
        let phonemes = self.timeline.leaves(root);
        for phoneme in phonemes {
            let converted =
                registry.convert(&self.timeline.node(phoneme).text, &old_set, new_set);
            self.timeline.node_mut(phoneme).text = converted;
        }
        info!("converted phonemes from set '{}' to '{}'", old_set, new_set);
        self.phoneme_set_name = new_set.to_string();
        self.dirty = true;
        Ok(())
    }

    /// The phoneme shown at `frame` in the current voice, under the
    /// configured rest policy.
    pub fn phoneme_at_frame(
        &self,
        cursor: &mut FrameCursor,
        frame: i64,
        policy: RestPolicy,
    ) -> String {
        match self.current_voice {
            Some(voice) => cursor.phoneme_at_frame(&self.timeline, voice, frame, policy),
            None => REST.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Legacy line-oriented persistence
    // ------------------------------------------------------------------

    /// Opens a project in the legacy line-oriented format.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)?;
        let mut doc = Self::parse_legacy(&content)
            .with_context(|| format!("Failed to open project: {}", path.display()))?;
        doc.path = Some(path.to_path_buf());
        doc.name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());
        doc.timeline.node_mut(doc.timeline.root()).name = doc.name.clone();
        doc.sound_path = FileManager::resolve_relative(path, &doc.sound_path);
        doc.dirty = false;
        Ok(doc)
    }

    fn parse_legacy(content: &str) -> Result<Self> {
        let mut reader = LineReader::new(content);
        let header = reader.next_line()?;
        if !header.starts_with("lipsync version") {
            return Err(ProjectError::Parse {
                line: 1,
                message: format!("not a lipsync project (header '{}')", header),
            }
            .into());
        }
        let sound_path = PathBuf::from(reader.next_line()?);
        let fps: u32 = reader.next_number("fps")?;
        let sound_duration: i64 = reader.next_number("sound duration")?;

        let mut doc = Document::new("Untitled");
        doc.sound_path = sound_path;
        doc.timeline.set_fps(fps);
        doc.timeline.set_sound_duration(sound_duration);

        let num_voices: usize = reader.next_number("voice count")?;
        for _ in 0..num_voices {
            let voice = doc.add_voice("");
            doc.timeline.node_mut(voice).name = reader.next_line()?.to_string();
            doc.timeline.node_mut(voice).text = reader.next_line()?.replace('|', "\n");
            let num_phrases: usize = reader.next_number("phrase count")?;
            for _ in 0..num_phrases {
                let text = reader.next_line()?.to_string();
                let start: i64 = reader.next_number("phrase start")?;
                let end: i64 = reader.next_number("phrase end")?;
                let phrase = doc
                    .timeline
                    .add_child(voice, NodeKind::Phrase, &text, start, end);
                let num_words: usize = reader.next_number("word count")?;
                for _ in 0..num_words {
                    let (line_no, line) = reader.next_numbered_line()?;
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    if fields.len() != 4 {
                        return Err(ProjectError::Parse {
                            line: line_no,
                            message: format!("expected 'text start end count', got '{}'", line),
                        }
                        .into());
                    }
                    let word = doc.timeline.add_child(
                        phrase,
                        NodeKind::Word,
                        fields[0],
                        parse_field(fields[1], line_no, "word start")?,
                        parse_field(fields[2], line_no, "word end")?,
                    );
                    let num_phonemes: usize =
                        parse_field(fields[3], line_no, "phoneme count")?;
                    for _ in 0..num_phonemes {
                        let (line_no, line) = reader.next_numbered_line()?;
                        let fields: Vec<&str> = line.split_whitespace().collect();
                        if fields.len() != 2 {
                            return Err(ProjectError::Parse {
                                line: line_no,
                                message: format!("expected 'frame text', got '{}'", line),
                            }
                            .into());
                        }
                        let frame: i64 = parse_field(fields[0], line_no, "phoneme frame")?;
                        doc.timeline
                            .add_child(word, NodeKind::Phoneme, fields[1], frame, frame);
                    }
                }
            }
        }
        doc.current_voice = doc.voices().first().copied();
        Ok(doc)
    }

    /// Saves the project in the legacy line-oriented format.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut out = String::new();
        let _ = writeln!(out, "{}", LEGACY_HEADER);
        let _ = writeln!(out, "{}", self.saved_sound_path(path));
        let _ = writeln!(out, "{}", self.fps());
        let _ = writeln!(out, "{}", self.sound_duration());
        let voices = self.voices();
        let _ = writeln!(out, "{}", voices.len());
        for voice in voices {
            self.write_voice_legacy(&mut out, voice);
        }
        FileManager::write_to_file(path, &out)?;
        self.path = Some(path.to_path_buf());
        self.name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone());
        self.timeline.node_mut(self.timeline.root()).name = self.name.clone();
        self.dirty = false;
        debug!("saved project to {}", path.display());
        Ok(())
    }

    fn write_voice_legacy(&self, out: &mut String, voice: NodeId) {
        let node = self.timeline.node(voice);
        let _ = writeln!(out, "    {}", node.name);
        let _ = writeln!(out, "    {}", node.text.replace('\n', "|"));
        let _ = writeln!(out, "    {}", node.children().len());
        for phrase in node.children() {
            let phrase_node = self.timeline.node(*phrase);
            let _ = writeln!(out, "        {}", phrase_node.text);
            let _ = writeln!(out, "        {}", phrase_node.start_frame());
            let _ = writeln!(out, "        {}", phrase_node.end_frame());
            let _ = writeln!(out, "        {}", phrase_node.children().len());
            for word in phrase_node.children() {
                let word_node = self.timeline.node(*word);
                let _ = writeln!(
                    out,
                    "            {} {} {} {}",
                    word_node.text,
                    word_node.start_frame(),
                    word_node.end_frame(),
                    word_node.children().len()
                );
                for phoneme in word_node.children() {
                    let phoneme_node = self.timeline.node(*phoneme);
                    let _ = writeln!(
                        out,
                        "                {} {}",
                        phoneme_node.start_frame(),
                        phoneme_node.text
                    );
                }
            }
        }
    }

    /// Sound path as stored in a saved project: just the file name when it
    /// sits next to the project file.
    fn saved_sound_path(&self, project_path: &Path) -> String {
        if self.sound_path.parent() == project_path.parent() {
            self.sound_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        } else {
            self.sound_path.to_string_lossy().to_string()
        }
    }

    // ------------------------------------------------------------------
    // Structured interchange format
    // ------------------------------------------------------------------

    /// Opens a project in the structured JSON interchange format.
    pub fn open_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)?;
        let file: ProjectFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse project: {}", path.display()))?;
        let mut doc = Self::from_project_file(file);
        doc.path = Some(path.to_path_buf());
        doc.name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "Untitled".to_string());
        doc.timeline.node_mut(doc.timeline.root()).name = doc.name.clone();
        doc.sound_path = FileManager::resolve_relative(path, &doc.sound_path);
        doc.dirty = false;
        Ok(doc)
    }

    /// Saves the project in the structured JSON interchange format.
    pub fn save_json<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = self.to_project_file(&self.saved_sound_path(path));
        let content =
            serde_json::to_string_pretty(&file).context("Failed to serialize project")?;
        FileManager::write_to_file(path, &content)?;
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    fn from_project_file(file: ProjectFile) -> Self {
        let mut doc = Document::new("Untitled");
        doc.sound_path = PathBuf::from(file.sound_path);
        doc.timeline.set_fps(file.fps);
        doc.timeline.set_sound_duration(file.sound_duration);
        doc.phoneme_set_name = file.phoneme_set;
        for voice_data in file.voices {
            let voice = doc.add_voice(&voice_data.name);
            doc.timeline.node_mut(voice).text = voice_data.text;
            for phrase_data in voice_data.phrases {
                let phrase = doc.timeline.add_child(
                    voice,
                    NodeKind::Phrase,
                    &phrase_data.text,
                    phrase_data.start_frame,
                    phrase_data.end_frame,
                );
                doc.timeline.node_mut(phrase).tags = phrase_data.tags;
                for word_data in phrase_data.words {
                    let word = doc.timeline.add_child(
                        phrase,
                        NodeKind::Word,
                        &word_data.text,
                        word_data.start_frame,
                        word_data.end_frame,
                    );
                    doc.timeline.node_mut(word).tags = word_data.tags;
                    for phoneme_data in word_data.phonemes {
                        let phoneme = doc.timeline.add_child(
                            word,
                            NodeKind::Phoneme,
                            &phoneme_data.text,
                            phoneme_data.frame,
                            phoneme_data.frame,
                        );
                        doc.timeline.node_mut(phoneme).tags = phoneme_data.tags;
                    }
                }
            }
        }
        doc.current_voice = doc.voices().first().copied();
        doc
    }

    fn to_project_file(&self, saved_sound_path: &str) -> ProjectFile {
        let voices: Vec<VoiceData> = self
            .voices()
            .into_iter()
            .map(|voice| self.voice_to_data(voice))
            .collect();
        ProjectFile {
            version: PROJECT_VERSION,
            sound_path: saved_sound_path.to_string(),
            fps: self.fps(),
            sound_duration: self.sound_duration(),
            phoneme_set: self.phoneme_set_name.clone(),
            num_voices: voices.len(),
            voices,
        }
    }

    fn voice_to_data(&self, voice: NodeId) -> VoiceData {
        let node = self.timeline.node(voice);
        let (start_frame, end_frame) = match (node.children().first(), node.children().last()) {
            (Some(first), Some(last)) => (
                self.timeline.node(*first).start_frame(),
                self.timeline.node(*last).end_frame(),
            ),
            _ => (0, 1),
        };
        let mut used_phonemes: Vec<String> = Vec::new();
        let mut phrases = Vec::new();
        for (phr_id, phrase) in node.children().iter().enumerate() {
            let phrase_node = self.timeline.node(*phrase);
            let mut words = Vec::new();
            for (wor_id, word) in phrase_node.children().iter().enumerate() {
                let word_node = self.timeline.node(*word);
                let mut phonemes = Vec::new();
                for (pho_id, phoneme) in word_node.children().iter().enumerate() {
                    let phoneme_node = self.timeline.node(*phoneme);
                    if !used_phonemes.contains(&phoneme_node.text) {
                        used_phonemes.push(phoneme_node.text.clone());
                    }
                    phonemes.push(PhonemeData {
                        id: pho_id,
                        text: phoneme_node.text.clone(),
                        frame: phoneme_node.start_frame(),
                        tags: phoneme_node.tags.clone(),
                    });
                }
                words.push(WordData {
                    id: wor_id,
                    text: word_node.text.clone(),
                    start_frame: word_node.start_frame(),
                    end_frame: word_node.end_frame(),
                    tags: word_node.tags.clone(),
                    phonemes,
                });
            }
            phrases.push(PhraseData {
                id: phr_id,
                text: phrase_node.text.clone(),
                start_frame: phrase_node.start_frame(),
                end_frame: phrase_node.end_frame(),
                tags: phrase_node.tags.clone(),
                words,
            });
        }
        VoiceData {
            name: node.name.clone(),
            text: node.text.clone(),
            start_frame,
            end_frame,
            num_children: self.timeline.descendants(voice).count(),
            phrases,
            used_phonemes,
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document {} ({} fps, {} frames, {} voices)",
            self.name,
            self.fps(),
            self.sound_duration(),
            self.voices().len()
        )
    }
}

// On-disk shape of the interchange format.

#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    sound_path: String,
    fps: u32,
    sound_duration: i64,
    #[serde(default = "default_phoneme_set")]
    phoneme_set: String,
    #[serde(default)]
    num_voices: usize,
    voices: Vec<VoiceData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct VoiceData {
    name: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    start_frame: i64,
    #[serde(default)]
    end_frame: i64,
    #[serde(default)]
    num_children: usize,
    phrases: Vec<PhraseData>,
    #[serde(default)]
    used_phonemes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PhraseData {
    #[serde(default)]
    id: usize,
    text: String,
    start_frame: i64,
    end_frame: i64,
    #[serde(default)]
    tags: Vec<String>,
    words: Vec<WordData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WordData {
    #[serde(default)]
    id: usize,
    text: String,
    start_frame: i64,
    end_frame: i64,
    #[serde(default)]
    tags: Vec<String>,
    phonemes: Vec<PhonemeData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PhonemeData {
    #[serde(default)]
    id: usize,
    text: String,
    frame: i64,
    #[serde(default)]
    tags: Vec<String>,
}

fn default_phoneme_set() -> String {
    "preston_blair".to_string()
}

/// Counting line reader for the legacy format.
struct LineReader<'a> {
    lines: std::str::Lines<'a>,
    line_no: usize,
}

impl<'a> LineReader<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines(),
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Result<&'a str, ProjectError> {
        self.next_numbered_line().map(|(_, line)| line)
    }

    fn next_numbered_line(&mut self) -> Result<(usize, &'a str), ProjectError> {
        self.line_no += 1;
        match self.lines.next() {
            Some(line) => Ok((self.line_no, line.trim())),
            None => Err(ProjectError::UnexpectedEof(self.line_no)),
        }
    }

    fn next_number<T: std::str::FromStr>(&mut self, what: &str) -> Result<T, ProjectError> {
        let (line_no, line) = self.next_numbered_line()?;
        parse_field(line, line_no, what)
    }
}

fn parse_field<T: std::str::FromStr>(
    text: &str,
    line: usize,
    what: &str,
) -> Result<T, ProjectError> {
    text.parse().map_err(|_| ProjectError::Parse {
        line,
        message: format!("invalid {}: '{}'", what, text),
    })
}
