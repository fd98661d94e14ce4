/*!
 * # LipAlign - Lip-Sync Timeline and Alignment Core
 *
 * A Rust library for building lip-sync animation data: a hierarchical
 * timeline of voices, phrases, words and phonemes, a constraint-based
 * layout engine for interactive editing, and an automatic
 * phoneme-alignment pipeline over recognized audio.
 *
 * ## Features
 *
 * - Voice/Phrase/Word/Phoneme timeline with ordering and containment
 *   invariants enforced by a constraint-based layout engine
 * - Text breakdown into phonemes through pluggable pronunciation resolvers
 * - Automatic alignment of recognized phoneme streams, with peak-based
 *   word segmentation
 * - Conversion between phoneme sets through a canonical hub set
 * - Legacy line-oriented and structured JSON project persistence
 * - Switch cue export for animation packages
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `timeline`: The timeline tree, frame queries and rest policy
 * - `layout`: Constraint solving for moves, resizes and redistribution
 * - `phoneme_set`: Phoneme set registry and conversion
 * - `peaks`: Plateau-tolerant local maxima detection
 * - `auto_align`: Recognized stream segmentation and placement
 * - `breakdown`: Text to phoneme breakdown and first-guess frames
 * - `document`: Document ownership, persistence and orchestration
 * - `export`: Switch cue export
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod timeline;
pub mod layout;
pub mod phoneme_set;
pub mod peaks;
pub mod auto_align;
pub mod breakdown;
pub mod document;
pub mod export;
pub mod file_utils;
pub mod errors;

// Re-export main types for easier usage
pub use app_config::Config;
pub use auto_align::{AutoAligner, DistributionMode, RecognizedPhoneme, Recognizer};
pub use breakdown::{DeclineUnknown, PronunciationResolver, UnknownWordHandler};
pub use document::Document;
pub use phoneme_set::{PhonemeSet, PhonemeSetRegistry};
pub use timeline::{FrameCursor, NodeId, NodeKind, RestPolicy, Timeline};
pub use errors::{AppError, BreakdownError, ProjectError, RecognizerError};
