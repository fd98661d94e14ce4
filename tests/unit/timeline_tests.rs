/*!
 * Tests for the timeline tree model and frame queries
 */

use anyhow::Result;
use lipalign::timeline::{FrameCursor, NodeKind, RestPolicy, Timeline};

use crate::common;

/// Test that a new timeline has only the project root
#[test]
fn test_new_withDefaults_shouldHaveOnlyRoot() {
    let timeline = Timeline::new("doc", 24, 72);
    assert_eq!(timeline.fps(), 24);
    assert_eq!(timeline.sound_duration(), 72);
    assert_eq!(timeline.node(timeline.root()).kind(), NodeKind::Project);
    assert!(timeline.node(timeline.root()).children().is_empty());
    assert_eq!(timeline.descendants(timeline.root()).count(), 0);
}

/// Test that a phoneme child always occupies exactly one frame
#[test]
fn test_add_child_withPhonemeSpan_shouldForceSingleFrame() {
    let mut timeline = Timeline::new("doc", 24, 72);
    let voice = timeline.add_child(timeline.root(), NodeKind::Voice, "", 0, 0);
    let phoneme = timeline.add_child(voice, NodeKind::Phoneme, "AI", 5, 30);
    assert_eq!(timeline.node(phoneme).start_frame(), 5);
    assert_eq!(timeline.node(phoneme).end_frame(), 5);
    assert_eq!(timeline.node(phoneme).frame_size(), 1);
}

/// Test that removing a subtree frees its handles and reuses the slots
#[test]
fn test_remove_subtree_withNestedChildren_shouldDetachAndReuseSlots() {
    let (mut timeline, voice) = common::build_voice(
        (0, 10),
        &[("hi", 0, 4, &[(0, "AI"), (2, "E")]), ("yo", 4, 8, &[(4, "O")])],
    );
    let phrase = timeline.node(voice).children()[0];
    let first_word = timeline.node(phrase).children()[0];

    timeline.remove_subtree(first_word);
    assert_eq!(timeline.node(phrase).children().len(), 1);

    // Freed slots come back for new nodes instead of growing the arena.
    let replacement = timeline.add_child(phrase, NodeKind::Word, "new", 0, 2);
    assert_eq!(timeline.node(replacement).text, "new");
    assert_eq!(timeline.leaves(phrase).len(), 1);
}

/// Test that descendants iterates in document order
#[test]
fn test_descendants_withTwoWords_shouldVisitPreOrder() {
    let (timeline, voice) = common::build_voice(
        (0, 10),
        &[("ab", 0, 4, &[(0, "AI"), (2, "E")]), ("c", 4, 8, &[(4, "O")])],
    );
    let texts: Vec<String> = timeline
        .descendants(voice)
        .map(|id| timeline.node(id).text.clone())
        .collect();
    assert_eq!(texts, vec!["test phrase", "ab", "AI", "E", "c", "O"]);
}

/// Test that ancestors walks from the parent up to the root
#[test]
fn test_ancestors_withPhoneme_shouldWalkToRoot() {
    let (timeline, voice) = common::build_voice((0, 10), &[("hi", 0, 4, &[(0, "AI")])]);
    let phoneme = timeline.leaves(voice)[0];
    let kinds: Vec<NodeKind> = timeline
        .ancestors(phoneme)
        .map(|id| timeline.node(id).kind())
        .collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Word,
            NodeKind::Phrase,
            NodeKind::Voice,
            NodeKind::Project
        ]
    );
}

/// Test that min_size counts descendant phonemes
#[test]
fn test_min_size_withThreePhonemes_shouldCountLeaves() {
    let (timeline, voice) = common::build_voice(
        (0, 10),
        &[("ab", 0, 4, &[(0, "AI"), (2, "E")]), ("c", 4, 8, &[(4, "O")])],
    );
    let phrase = timeline.node(voice).children()[0];
    assert_eq!(timeline.min_size(phrase), 3);
    let word = timeline.node(phrase).children()[0];
    assert_eq!(timeline.min_size(word), 2);
    let phoneme = timeline.leaves(voice)[0];
    assert_eq!(timeline.min_size(phoneme), 1);

    // The first word is wider than its two phonemes, the phoneme never is.
    assert!(timeline.has_shrink_room(word));
    assert!(!timeline.has_shrink_room(phoneme));
}

/// Test that validate accepts a well-formed tree and rejects overlap
#[test]
fn test_validate_withOverlappingSiblings_shouldFail() -> Result<()> {
    let (timeline, _) = common::build_voice(
        (0, 10),
        &[("ab", 0, 4, &[(0, "AI"), (2, "E")]), ("c", 4, 8, &[(4, "O")])],
    );
    timeline.validate()?;

    let (bad, _) = common::build_voice(
        (0, 10),
        &[("ab", 0, 6, &[(0, "AI"), (2, "E")]), ("c", 4, 8, &[(4, "O")])],
    );
    assert!(bad.validate().is_err());
    Ok(())
}

/// Test that an exact frame hit returns the phoneme and makes it sticky
#[test]
fn test_phoneme_at_frame_withExactHit_shouldReturnPhoneme() {
    let (timeline, voice) = common::build_voice((0, 10), &[("hi", 0, 6, &[(0, "AI"), (3, "E")])]);
    let mut cursor = FrameCursor::new();
    let policy = RestPolicy::default();
    assert_eq!(cursor.phoneme_at_frame(&timeline, voice, 3, policy), "E");
}

/// Test the policy table for a frame no phoneme starts at
#[test]
fn test_phoneme_at_frame_withGapFrame_shouldFollowRestPolicy() {
    let (timeline, voice) = common::build_voice((0, 10), &[("hi", 0, 6, &[(0, "AI"), (3, "E")])]);

    // Inside the word but off any phoneme start: rest_after_phonemes decides.
    let mut cursor = FrameCursor::new();
    let hold_inside = RestPolicy {
        rest_after_words: true,
        rest_after_phonemes: false,
    };
    assert_eq!(cursor.phoneme_at_frame(&timeline, voice, 0, hold_inside), "AI");
    assert_eq!(cursor.phoneme_at_frame(&timeline, voice, 1, hold_inside), "AI");

    let mut cursor = FrameCursor::new();
    let rest_inside = RestPolicy {
        rest_after_words: true,
        rest_after_phonemes: true,
    };
    assert_eq!(cursor.phoneme_at_frame(&timeline, voice, 1, rest_inside), "rest");

    // Outside any word with rest_after_words off: the last value holds.
    let mut cursor = FrameCursor::new();
    let hold_everywhere = RestPolicy {
        rest_after_words: false,
        rest_after_phonemes: false,
    };
    assert_eq!(cursor.phoneme_at_frame(&timeline, voice, 3, hold_everywhere), "E");
    assert_eq!(cursor.phoneme_at_frame(&timeline, voice, 9, hold_everywhere), "E");

    // Outside any word with rest_after_words on: rest.
    let mut cursor = FrameCursor::new();
    assert_eq!(
        cursor.phoneme_at_frame(&timeline, voice, 9, RestPolicy::default()),
        "rest"
    );
}

/// Test that layout mutations record change events for observers
#[test]
fn test_take_events_afterMove_shouldReportNewSpans() {
    let (mut timeline, voice) = common::build_voice((0, 10), &[("hi", 0, 6, &[(0, "AI"), (3, "E")])]);
    let phrase = timeline.node(voice).children()[0];
    let word = timeline.node(phrase).children()[0];
    timeline.take_events();

    timeline.move_node(word, 2);
    let events = timeline.take_events();
    assert!(!events.is_empty());
    assert!(events.iter().any(|e| e.node == word && e.start == 2));
    assert!(timeline.take_events().is_empty());
}
