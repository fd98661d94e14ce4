/*!
 * Round-trip tests for the two project file formats
 */

use anyhow::Result;
use lipalign::document::Document;
use lipalign::errors::ProjectError;
use lipalign::timeline::NodeKind;

use crate::common;

/// Document with one voice, one phrase and two laid-out words
fn sample_document(sound_path: std::path::PathBuf) -> Document {
    let mut doc = Document::new("demo");
    doc.sound_path = sound_path;
    let voice = doc.add_voice("Narrator");
    {
        let timeline = doc.timeline_mut();
        timeline.node_mut(voice).text = "hello world\nsecond line".to_string();
        let phrase = timeline.add_child(voice, NodeKind::Phrase, "hello world", 0, 40);
        let hello = timeline.add_child(phrase, NodeKind::Word, "hello", 0, 20);
        timeline.add_child(hello, NodeKind::Phoneme, "etc", 0, 0);
        timeline.add_child(hello, NodeKind::Phoneme, "AI", 5, 5);
        timeline.add_child(hello, NodeKind::Phoneme, "L", 10, 10);
        timeline.add_child(hello, NodeKind::Phoneme, "O", 15, 15);
        let world = timeline.add_child(phrase, NodeKind::Word, "world", 20, 40);
        timeline.add_child(world, NodeKind::Phoneme, "WQ", 20, 20);
        timeline.add_child(world, NodeKind::Phoneme, "E", 27, 27);
        timeline.add_child(world, NodeKind::Phoneme, "L", 33, 33);
        timeline.add_child(world, NodeKind::Phoneme, "etc", 38, 38);
    }
    doc
}

/// Collects (kind, text, start, end) for every node under the root
fn structure(doc: &Document) -> Vec<(String, String, i64, i64)> {
    let timeline = doc.timeline();
    timeline
        .descendants(timeline.root())
        .map(|id| {
            let node = timeline.node(id);
            (
                node.kind().to_string(),
                node.text.clone(),
                node.start_frame(),
                node.end_frame(),
            )
        })
        .collect()
}

/// Test that the legacy format round-trips the whole tree
#[test]
fn test_legacy_save_thenOpen_shouldPreserveTree() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let mut doc = sample_document(dir.join("take.wav"));
    let project_path = dir.join("demo.pgo");

    doc.save(&project_path)?;
    assert!(!doc.is_dirty());

    let reopened = Document::open(&project_path)?;
    assert_eq!(reopened.fps(), 24);
    assert_eq!(reopened.sound_duration(), 72);
    assert_eq!(reopened.sound_path, dir.join("take.wav"));
    assert_eq!(reopened.voices().len(), 1);

    let voice = reopened.voices()[0];
    assert_eq!(reopened.timeline().node(voice).name, "Narrator");
    assert_eq!(
        reopened.timeline().node(voice).text,
        "hello world\nsecond line"
    );
    assert_eq!(structure(&reopened), structure(&doc));
    reopened.timeline().validate()?;
    Ok(())
}

/// Test that a sound file next to the project is saved by bare file name
#[test]
fn test_legacy_save_withAdjacentSound_shouldStoreBareName() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let mut doc = sample_document(dir.join("take.wav"));
    let project_path = dir.join("demo.pgo");
    doc.save(&project_path)?;

    let content = std::fs::read_to_string(&project_path)?;
    let sound_line = content.lines().nth(1).unwrap();
    assert_eq!(sound_line, "take.wav");
    Ok(())
}

/// Test that a file without the expected header is rejected
#[test]
fn test_legacy_open_withWrongHeader_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "bogus.pgo",
        "definitely not a project\n",
    )?;

    let error = Document::open(&path).unwrap_err();
    match error.downcast_ref::<ProjectError>() {
        Some(ProjectError::Parse { line, .. }) => assert_eq!(*line, 1),
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

/// Test that a truncated file reports where the input ended
#[test]
fn test_legacy_open_withTruncatedFile_shouldReportEof() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "short.pgo",
        "lipsync version 1\ntake.wav\n24\n",
    )?;

    let error = Document::open(&path).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<ProjectError>(),
        Some(ProjectError::UnexpectedEof(_))
    ));
    Ok(())
}

/// Test that a malformed count line reports its line number
#[test]
fn test_legacy_open_withBadNumber_shouldReportLine() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        &temp_dir.path().to_path_buf(),
        "bad.pgo",
        "lipsync version 1\ntake.wav\n24\nseventy-two\n",
    )?;

    let error = Document::open(&path).unwrap_err();
    match error.downcast_ref::<ProjectError>() {
        Some(ProjectError::Parse { line, message }) => {
            assert_eq!(*line, 4);
            assert!(message.contains("seventy-two"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    Ok(())
}

/// Test that the structured format round-trips the tree and metadata
#[test]
fn test_json_save_thenOpen_shouldPreserveTree() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let mut doc = sample_document(dir.join("take.wav"));
    let project_path = dir.join("demo.json");

    doc.save_json(&project_path)?;
    let reopened = Document::open_json(&project_path)?;

    assert_eq!(reopened.phoneme_set_name, "preston_blair");
    assert_eq!(reopened.sound_path, dir.join("take.wav"));
    assert_eq!(structure(&reopened), structure(&doc));
    Ok(())
}

/// Test that tags survive the structured format
#[test]
fn test_json_roundTrip_withTags_shouldPreserveTags() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let dir = temp_dir.path().to_path_buf();
    let mut doc = sample_document(dir.join("take.wav"));
    let voice = doc.voices()[0];
    let phrase = doc.timeline().node(voice).children()[0];
    doc.timeline_mut().node_mut(phrase).tags = vec!["shouty".to_string()];

    let project_path = dir.join("demo.json");
    doc.save_json(&project_path)?;
    let reopened = Document::open_json(&project_path)?;

    let voice = reopened.voices()[0];
    let phrase = reopened.timeline().node(voice).children()[0];
    assert_eq!(reopened.timeline().node(phrase).tags, vec!["shouty"]);
    Ok(())
}
