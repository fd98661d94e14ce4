use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use walkdir::WalkDir;

// @module: Named phoneme vocabularies and cross-vocabulary conversion

/// The neutral mouth-at-rest symbol, returned whenever a conversion misses.
pub const REST: &str = "rest";

/// Name of the canonical reference vocabulary used as the conversion hub.
pub const CANONICAL_SET: &str = "CMU_39";

/// On-disk shape of a phoneme set file: the symbol list under
/// `phoneme_set`, the canonical table under `cmu_39_phoneme_conversion`,
/// and any other key is an alternate conversion table named after its
/// source vocabulary.
#[derive(Debug, Deserialize)]
struct PhonemeSetFile {
    phoneme_set: Vec<String>,
    #[serde(flatten)]
    tables: HashMap<String, HashMap<String, String>>,
}

/// A named phoneme vocabulary with its conversion tables.
#[derive(Debug, Clone)]
pub struct PhonemeSet {
    pub name: String,
    pub symbols: Vec<String>,
    // Canonical symbol -> native symbol.
    from_canonical: HashMap<String, String>,
    // Native symbol -> canonical symbol, inverted once at construction.
    to_canonical: HashMap<String, String>,
    // Direct tables keyed by "<source_set>_conversion".
    alternates: HashMap<String, HashMap<String, String>>,
}

impl PhonemeSet {
    /// Builds a set from its canonical table. For the canonical set itself
    /// the table is the identity over its symbols.
    pub fn new(
        name: &str,
        symbols: Vec<String>,
        from_canonical: HashMap<String, String>,
        alternates: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        let to_canonical = from_canonical
            .iter()
            .map(|(canonical, native)| (native.clone(), canonical.clone()))
            .collect();
        Self {
            name: name.to_string(),
            symbols,
            from_canonical,
            to_canonical,
            alternates,
        }
    }

    /// The canonical reference set, converting to itself one-to-one.
    pub fn canonical(symbols: Vec<String>) -> Self {
        let identity: HashMap<String, String> = symbols
            .iter()
            .map(|s| (s.clone(), s.clone()))
            .collect();
        Self::new(CANONICAL_SET, symbols, identity, HashMap::new())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Maps a canonical symbol into this vocabulary.
    pub fn from_canonical(&self, symbol: &str) -> Option<&str> {
        self.from_canonical.get(symbol).map(String::as_str)
    }

    /// Maps a native symbol back to the canonical vocabulary.
    pub fn to_canonical(&self, symbol: &str) -> Option<&str> {
        self.to_canonical.get(symbol).map(String::as_str)
    }

    /// Finds a direct conversion table from the given source set, if this
    /// set ships one. Table names start with the lowercased source name.
    fn alternate_from(&self, source: &str) -> Option<&HashMap<String, String>> {
        let prefix = source.to_lowercase();
        self.alternates
            .iter()
            .find(|(name, _)| name.starts_with(&prefix))
            .map(|(_, table)| table)
    }

    fn from_json(name: &str, text: &str) -> Result<Self> {
        let mut file: PhonemeSetFile = serde_json::from_str(text)
            .with_context(|| format!("Failed to parse phoneme set '{}'", name))?;
        let from_canonical = if name.eq_ignore_ascii_case(CANONICAL_SET) {
            file.tables.remove("cmu_39_phoneme_conversion");
            file.phoneme_set
                .iter()
                .map(|s| (s.clone(), s.clone()))
                .collect()
        } else {
            file.tables
                .remove("cmu_39_phoneme_conversion")
                .unwrap_or_default()
        };
        Ok(Self::new(name, file.phoneme_set, from_canonical, file.tables))
    }
}

/// Registry of the phoneme sets available to a document.
///
/// Explicitly constructed and passed by reference to whoever needs it; there
/// is no process-wide shared instance.
#[derive(Debug, Default)]
pub struct PhonemeSetRegistry {
    sets: HashMap<String, PhonemeSet>,
}

impl PhonemeSetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `*.json` vocabulary below `dir`, keyed by file stem.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut registry = Self::new();
        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read phoneme set directory entry")?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                continue;
            }
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read phoneme set file: {:?}", path))?;
            match PhonemeSet::from_json(&name, &text) {
                Ok(set) => {
                    debug!("loaded phoneme set '{}' ({} symbols)", name, set.symbols.len());
                    registry.insert(set);
                }
                Err(e) => warn!("skipping phoneme set '{}': {}", name, e),
            }
        }
        Ok(registry)
    }

    pub fn insert(&mut self, set: PhonemeSet) {
        self.sets.insert(set.name.clone(), set);
    }

    pub fn get(&self, name: &str) -> Option<&PhonemeSet> {
        self.sets.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Converts a symbol between two named vocabularies.
    ///
    /// A direct alternate table shipped by the destination set wins;
    /// otherwise conversion goes through the canonical hub. Any miss on the
    /// way, including an unknown set name, yields "rest".
    pub fn convert(&self, symbol: &str, from: &str, to: &str) -> String {
        if from == to {
            return symbol.to_string();
        }
        let (Some(from_set), Some(to_set)) = (self.get(from), self.get(to)) else {
            warn!("conversion between unknown sets '{}' -> '{}'", from, to);
            return REST.to_string();
        };
        if let Some(table) = to_set.alternate_from(from) {
            return table.get(symbol).cloned().unwrap_or_else(|| REST.to_string());
        }
        match from_set.to_canonical(symbol) {
            Some(canonical) => to_set
                .from_canonical(canonical)
                .unwrap_or(REST)
                .to_string(),
            None => REST.to_string(),
        }
    }
}
