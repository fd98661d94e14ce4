use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::phoneme_set::REST;

// @module: Timeline tree model and invariant queries

/// Opaque handle to a node inside a [`Timeline`] arena.
///
/// Handles stay valid until the subtree owning the node is removed. Using a
/// stale handle is a caller bug and panics on access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The kind of a timeline node, from the document root down to single frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Project,
    Voice,
    Phrase,
    Word,
    Phoneme,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Project => "project",
            Self::Voice => "voice",
            Self::Phrase => "phrase",
            Self::Word => "word",
            Self::Phoneme => "phoneme",
        };
        write!(f, "{}", name)
    }
}

/// A single entity on the timeline: a project, voice, phrase, word or phoneme.
///
/// Frames are discrete units at the project fps. A phoneme always occupies
/// exactly one frame, so its start and end frame are kept equal.
#[derive(Debug, Clone)]
pub struct TimelineNode {
    kind: NodeKind,
    pub name: String,
    pub text: String,
    pub tags: Vec<String>,
    start_frame: i64,
    end_frame: i64,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    // Authoritative on the root only, read-through for descendants.
    fps: u32,
    sound_duration: i64,
}

impl TimelineNode {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn start_frame(&self) -> i64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> i64 {
        self.end_frame
    }

    /// Width of the node in frames; a phoneme is always one frame wide.
    pub fn frame_size(&self) -> i64 {
        if self.kind == NodeKind::Phoneme {
            1
        } else {
            self.end_frame - self.start_frame
        }
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// A layout change visible to an external observer (node and its new span).
///
/// The core has no presentation dependency; a UI layer consumes these to
/// update widget geometry after a layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub node: NodeId,
    pub start: i64,
    pub end: i64,
}

/// Frame lookup policy for gaps the phonemes do not cover.
///
/// `rest_after_words` and `rest_after_phonemes` are two independent settings;
/// their combination decides whether a gap reads as "rest" or as the last
/// returned phoneme.
#[derive(Debug, Clone, Copy)]
pub struct RestPolicy {
    pub rest_after_words: bool,
    pub rest_after_phonemes: bool,
}

impl Default for RestPolicy {
    fn default() -> Self {
        Self {
            rest_after_words: true,
            rest_after_phonemes: true,
        }
    }
}

/// Arena of timeline nodes addressed by opaque handles.
///
/// Children are an owned ordered list of handles, the parent link is a
/// non-owning back-reference, so the tree has no reference cycles. All
/// mutation goes through the arena, which records a [`ChangeEvent`] per
/// repositioned node.
#[derive(Debug)]
pub struct Timeline {
    slots: Vec<Option<TimelineNode>>,
    free: Vec<usize>,
    root: NodeId,
    events: Vec<ChangeEvent>,
}

impl Timeline {
    /// Creates a timeline with a single project root node.
    pub fn new(name: &str, fps: u32, sound_duration: i64) -> Self {
        let root_node = TimelineNode {
            kind: NodeKind::Project,
            name: name.to_string(),
            text: String::new(),
            tags: Vec::new(),
            start_frame: 0,
            end_frame: sound_duration,
            children: Vec::new(),
            parent: None,
            fps,
            sound_duration,
        };
        Timeline {
            slots: vec![Some(root_node)],
            free: Vec::new(),
            root: NodeId(0),
            events: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node. Panics if the handle is stale.
    pub fn node(&self, id: NodeId) -> &TimelineNode {
        self.slots[id.0].as_ref().expect("stale NodeId")
    }

    /// Mutably borrow a node. Frame spans stay private, so this only opens
    /// up the name, text and tags for editing. Panics if the handle is
    /// stale.
    pub fn node_mut(&mut self, id: NodeId) -> &mut TimelineNode {
        self.slots[id.0].as_mut().expect("stale NodeId")
    }

    /// Frames per second, read through from the root.
    pub fn fps(&self) -> u32 {
        self.node(self.root).fps
    }

    pub fn set_fps(&mut self, fps: u32) {
        self.node_mut(self.root).fps = fps;
    }

    /// Total sound duration in frames, read through from the root.
    pub fn sound_duration(&self) -> i64 {
        self.node(self.root).sound_duration
    }

    pub fn set_sound_duration(&mut self, frames: i64) {
        let root = self.root;
        let node = self.node_mut(root);
        node.sound_duration = frames;
        if node.end_frame < frames {
            node.end_frame = frames;
        }
    }

    /// Appends a new child node under `parent` and returns its handle.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        text: &str,
        start_frame: i64,
        end_frame: i64,
    ) -> NodeId {
        let end_frame = if kind == NodeKind::Phoneme {
            start_frame
        } else {
            end_frame
        };
        let node = TimelineNode {
            kind,
            name: String::new(),
            text: text.to_string(),
            tags: Vec::new(),
            start_frame,
            end_frame,
            children: Vec::new(),
            parent: Some(parent),
            fps: self.fps(),
            sound_duration: self.sound_duration(),
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };
        self.node_mut(parent).children.push(id);
        id
    }

    /// Removes a node and its whole subtree, freeing the slots.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.slots[current.0].take() {
                stack.extend(node.children);
                self.free.push(current.0);
            }
        }
    }

    /// Removes all children of a node, keeping the node itself.
    pub fn clear_children(&mut self, id: NodeId) {
        let kids = std::mem::take(&mut self.node_mut(id).children);
        for child in kids {
            // Parent link is already gone, free the subtree directly.
            let mut stack = vec![child];
            while let Some(current) = stack.pop() {
                if let Some(node) = self.slots[current.0].take() {
                    stack.extend(node.children);
                    self.free.push(current.0);
                }
            }
        }
    }

    /// Sets a node's frame span and records a change event.
    /// A phoneme's end frame is forced equal to its start frame.
    pub(crate) fn set_frames(&mut self, id: NodeId, start: i64, end: i64) {
        let node = self.node_mut(id);
        node.start_frame = start;
        node.end_frame = if node.kind == NodeKind::Phoneme {
            start
        } else {
            end
        };
        let event = ChangeEvent {
            node: id,
            start: node.start_frame,
            end: node.end_frame,
        };
        self.events.push(event);
    }

    /// Drains the change events accumulated since the last call.
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn left_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let siblings = &self.node(parent).children;
        let index = siblings.iter().position(|c| *c == id)?;
        if index > 0 { Some(siblings[index - 1]) } else { None }
    }

    pub fn right_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let siblings = &self.node(parent).children;
        let index = siblings.iter().position(|c| *c == id)?;
        siblings.get(index + 1).copied()
    }

    /// Pre-order traversal of the subtree below `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.node(id).children.to_vec();
        stack.reverse();
        Descendants {
            timeline: self,
            stack,
        }
    }

    /// Walks from a node's parent up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            timeline: self,
            current: self.node(id).parent,
        }
    }

    /// All phoneme descendants of `id` in document order.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .filter(|d| self.node(*d).kind == NodeKind::Phoneme)
            .collect()
    }

    /// Smallest frame span the node can occupy: the count of its descendant
    /// phonemes, since only one phoneme fits per frame. 1 for a phoneme.
    pub fn min_size(&self, id: NodeId) -> i64 {
        if self.node(id).kind == NodeKind::Phoneme {
            return 1;
        }
        self.descendants(id)
            .filter(|d| self.node(*d).kind == NodeKind::Phoneme)
            .count() as i64
    }

    pub fn frame_size(&self, id: NodeId) -> i64 {
        self.node(id).frame_size()
    }

    /// Whether the node is wider than its minimum size.
    pub fn has_shrink_room(&self, id: NodeId) -> bool {
        if self.node(id).kind == NodeKind::Phoneme {
            return false;
        }
        self.frame_size(id) > self.min_size(id)
    }

    /// Leftmost frame the node may move into without violating ordering.
    ///
    /// A phoneme keeps a one-frame gap from a phoneme neighbor; a container
    /// may extend to its left sibling's edge or its parent's start.
    pub fn left_max(&self, id: NodeId) -> i64 {
        if let Some(sibling) = self.left_sibling(id) {
            let sib = self.node(sibling);
            if sib.kind == NodeKind::Phoneme {
                sib.end_frame + 1
            } else {
                sib.end_frame
            }
        } else {
            match self.node(id).parent {
                Some(parent) => self.node(parent).start_frame,
                None => self.node(id).start_frame,
            }
        }
    }

    /// Rightmost frame the node may extend to without violating ordering.
    pub fn right_max(&self, id: NodeId) -> i64 {
        if let Some(sibling) = self.right_sibling(id) {
            return self.node(sibling).start_frame;
        }
        match self.node(id).parent {
            Some(parent) => {
                let parent_node = self.node(parent);
                match parent_node.kind {
                    NodeKind::Voice | NodeKind::Project => self.sound_duration(),
                    _ => parent_node.end_frame,
                }
            }
            None => self.sound_duration(),
        }
    }

    /// Whether any word descendant of `id` spans the given frame.
    pub fn frame_is_in_word(&self, id: NodeId, frame: i64) -> bool {
        self.descendants(id).any(|d| {
            let node = self.node(d);
            node.kind == NodeKind::Word
                && node.start_frame <= frame
                && frame <= node.end_frame
        })
    }

    /// Checks every tree invariant, returning the first violation found.
    ///
    /// Used by tests and by callers that want to assert a layout pass left
    /// the tree consistent before committing it.
    pub fn validate(&self) -> Result<()> {
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.kind == NodeKind::Phoneme && node.start_frame != node.end_frame {
                return Err(anyhow!(
                    "phoneme '{}' spans more than one frame ({}..{})",
                    node.text,
                    node.start_frame,
                    node.end_frame
                ));
            }
            if node.start_frame > node.end_frame {
                return Err(anyhow!(
                    "{} '{}' has start {} after end {}",
                    node.kind,
                    node.text,
                    node.start_frame,
                    node.end_frame
                ));
            }
            // Project and voice spans are derived from their children, so
            // the minimum-size rule binds the inner levels only.
            let span_bound = matches!(
                node.kind,
                NodeKind::Phrase | NodeKind::Word | NodeKind::Phoneme
            );
            if span_bound && self.frame_size(id) < self.min_size(id) {
                return Err(anyhow!(
                    "{} '{}' is narrower ({}) than its minimum size ({})",
                    node.kind,
                    node.text,
                    self.frame_size(id),
                    self.min_size(id)
                ));
            }
            for pair in node.children.windows(2) {
                let left = self.node(pair[0]);
                let right = self.node(pair[1]);
                if left.end_frame > right.start_frame {
                    return Err(anyhow!(
                        "siblings '{}' ({}..{}) and '{}' ({}..{}) overlap",
                        left.text,
                        left.start_frame,
                        left.end_frame,
                        right.text,
                        right.start_frame,
                        right.end_frame
                    ));
                }
            }
            stack.extend(node.children.iter().copied());
        }
        Ok(())
    }
}

/// Pre-order iterator over the descendants of a node.
pub struct Descendants<'a> {
    timeline: &'a Timeline,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let children = &self.timeline.node(id).children;
        for child in children.iter().rev() {
            self.stack.push(*child);
        }
        Some(id)
    }
}

/// Iterator from a node's parent up to the root.
pub struct Ancestors<'a> {
    timeline: &'a Timeline,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.timeline.node(id).parent;
        Some(id)
    }
}

/// Frame lookup with the sticky "last returned phoneme" the rest policy
/// needs. The cursor keeps the mutable lookup state so the timeline itself
/// stays immutable during queries.
#[derive(Debug, Clone)]
pub struct FrameCursor {
    last_returned: String,
}

impl FrameCursor {
    pub fn new() -> Self {
        Self {
            last_returned: REST.to_string(),
        }
    }

    /// Returns the phoneme text shown at `frame` within the subtree of `id`.
    ///
    /// A phoneme starting exactly at `frame` wins and becomes the sticky
    /// value; otherwise the rest policy decides between "rest" and the last
    /// returned text.
    pub fn phoneme_at_frame(
        &mut self,
        timeline: &Timeline,
        id: NodeId,
        frame: i64,
        policy: RestPolicy,
    ) -> String {
        for descendant in timeline.descendants(id) {
            let node = timeline.node(descendant);
            if node.kind == NodeKind::Phoneme && node.start_frame == frame {
                self.last_returned = node.text.clone();
                return node.text.clone();
            }
        }
        if policy.rest_after_words {
            if !timeline.frame_is_in_word(id, frame) {
                REST.to_string()
            } else if policy.rest_after_phonemes {
                REST.to_string()
            } else {
                self.last_returned.clone()
            }
        } else if policy.rest_after_phonemes {
            REST.to_string()
        } else {
            self.last_returned.clone()
        }
    }
}

impl Default for FrameCursor {
    fn default() -> Self {
        Self::new()
    }
}
