/*!
 * Switch cue export: one "frame phoneme" row per mouth change, in the
 * MohoSwitch1 format animation packages import.
 */

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Result;
use log::debug;

use crate::file_utils::FileManager;
use crate::phoneme_set::REST;
use crate::timeline::{NodeId, RestPolicy, Timeline};

/// Renders the switch cues of one voice.
///
/// Frames are emitted one-based. A rest row precedes the first phoneme when
/// the voice does not start at frame zero, another rest row closes the file
/// two frames after the last phoneme, and under `rest_after_words` a rest
/// row is inserted into every inter-word gap wider than one frame.
pub fn switch_cues(timeline: &Timeline, voice: NodeId, policy: RestPolicy) -> String {
    let mut out = String::from("MohoSwitch1\n");
    let node = timeline.node(voice);
    let (start_frame, end_frame) = match (node.children().first(), node.children().last()) {
        (Some(first), Some(last)) => (
            timeline.node(*first).start_frame(),
            timeline.node(*last).end_frame(),
        ),
        _ => (0, 1),
    };
    if start_frame != 0 && !node.children().is_empty() {
        let _ = writeln!(out, "1 {}", REST);
    }

    let leaves = timeline.leaves(voice);
    let mut last: Option<NodeId> = leaves.first().copied();
    for phoneme in &leaves {
        let phoneme_node = timeline.node(*phoneme);
        if let Some(last_id) = last {
            let last_node = timeline.node(last_id);
            // A transition into "rest" gets its own row so the pause does
            // not inherit the previous mouth.
            if last_node.text != phoneme_node.text && phoneme_node.text == REST {
                let _ = writeln!(out, "{} {}", phoneme_node.start_frame(), phoneme_node.text);
            }
            if policy.rest_after_words
                && last_node.parent() != phoneme_node.parent()
                && last_node.start_frame() + 1 < phoneme_node.start_frame()
            {
                let _ = writeln!(out, "{} {}", last_node.start_frame() + 2, REST);
            }
        }
        last = Some(*phoneme);
        let _ = writeln!(out, "{} {}", phoneme_node.start_frame() + 1, phoneme_node.text);
    }
    let _ = writeln!(out, "{} {}", end_frame + 2, REST);
    out
}

/// Writes the switch cues of `voice` to `path`.
pub fn export_switch_cues<P: AsRef<Path>>(
    timeline: &Timeline,
    voice: NodeId,
    policy: RestPolicy,
    path: P,
) -> Result<()> {
    let content = switch_cues(timeline, voice, policy);
    FileManager::write_to_file(&path, &content)?;
    debug!("exported switch cues to {:?}", path.as_ref());
    Ok(())
}
