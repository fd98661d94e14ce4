/*!
 * Constraint-based layout for the timeline tree.
 *
 * Two operations keep the ordering and minimum-size invariants intact after
 * an edit: `reposition_to_left` collapses a subtree flush against its left
 * neighbor, and `reposition_descendants` redistributes children after a move
 * or resize. `move_node` / `resize_node` are the clamped entry points that
 * callers use; they never let an edit escape the bounds reported by
 * `left_max` / `right_max`.
 */

use log::debug;

use crate::timeline::{NodeId, NodeKind, Timeline};

impl Timeline {
    /// Collapses a node flush against its left sibling's end (or its
    /// parent's start when it has none) and rebuilds the minimal contiguous
    /// layout of its descendants. Used after a deletion or shrink to remove
    /// gaps.
    pub fn reposition_to_left(&mut self, id: NodeId) {
        let start = match self.left_sibling(id) {
            Some(sibling) => {
                let sib = self.node(sibling);
                if self.node(id).kind() == NodeKind::Phoneme {
                    // A phoneme sibling occupies its start frame, keep the
                    // one-frame gap.
                    sib.start_frame() + 1
                } else {
                    sib.end_frame()
                }
            }
            None => match self.node(id).parent() {
                Some(parent) => self.node(parent).start_frame(),
                None => self.node(id).start_frame(),
            },
        };
        if self.node(id).kind() == NodeKind::Phoneme {
            self.set_frames(id, start, start);
        } else {
            let end = start + self.min_size(id);
            self.set_frames(id, start, end);
            let kids = self.node(id).children().to_vec();
            for child in kids {
                self.reposition_to_left(child);
            }
        }
    }

    /// Re-lays out the subtree below `id` after an edit.
    ///
    /// Without a resize this is a pure translation of every descendant by
    /// `x_diff`. With a resize, a word redistributes its phonemes
    /// proportionally across the new width, and a phrase packs its words
    /// flush left and hands out the extra space frame by frame in
    /// round-robin order.
    pub fn reposition_descendants(&mut self, id: NodeId, did_resize: bool, x_diff: i64) {
        if !did_resize {
            if x_diff == 0 {
                return;
            }
            let all: Vec<NodeId> = self.descendants(id).collect();
            for node in all {
                let start = self.node(node).start_frame() + x_diff;
                let end = self.node(node).end_frame() + x_diff;
                self.set_frames(node, start, end);
            }
            return;
        }
        match self.node(id).kind() {
            NodeKind::Word => self.redistribute_word(id),
            NodeKind::Phrase => self.redistribute_phrase(id),
            NodeKind::Phoneme => {}
            _ => {
                let kids = self.node(id).children().to_vec();
                for child in kids {
                    self.reposition_to_left(child);
                }
            }
        }
    }

    /// Moves a node so it starts at `new_start`, clamped to the bounds of
    /// its neighbors, and translates all descendants with it. Returns the
    /// start frame actually applied.
    pub fn move_node(&mut self, id: NodeId, new_start: i64) -> i64 {
        let size = self.frame_size(id);
        let lower = self.left_max(id);
        let upper = self.right_max(id) - size;
        let clamped = new_start.clamp(lower, upper.max(lower));
        if clamped != new_start {
            debug!(
                "move of {} clamped from {} to {}",
                self.node(id).kind(),
                new_start,
                clamped
            );
        }
        let diff = clamped - self.node(id).start_frame();
        if diff != 0 {
            let start = self.node(id).start_frame() + diff;
            let end = self.node(id).end_frame() + diff;
            self.set_frames(id, start, end);
            self.reposition_descendants(id, false, diff);
        }
        clamped
    }

    /// Resizes a node to end at `new_end`, clamped so the node stays at
    /// least its minimum size and inside its right bound, then
    /// redistributes its descendants. Returns the end frame actually
    /// applied.
    pub fn resize_node(&mut self, id: NodeId, new_end: i64) -> i64 {
        let start = self.node(id).start_frame();
        let lower = start + self.min_size(id);
        let upper = self.right_max(id);
        let clamped = new_end.clamp(lower, upper.max(lower));
        if clamped != new_end {
            debug!(
                "resize of {} clamped from {} to {}",
                self.node(id).kind(),
                new_end,
                clamped
            );
        }
        if clamped != self.node(id).end_frame() {
            self.set_frames(id, start, clamped);
        }
        self.reposition_descendants(id, true, 0);
        clamped
    }

    /// Spreads a word's phonemes proportionally across its width: phoneme
    /// `i` lands at `round(start + (frame_size / min_size) * i)`.
    fn redistribute_word(&mut self, id: NodeId) {
        let min_size = self.min_size(id);
        if min_size == 0 {
            return;
        }
        let step = self.frame_size(id) as f64 / min_size as f64;
        let start = self.node(id).start_frame();
        let kids = self.node(id).children().to_vec();
        for (position, child) in kids.into_iter().enumerate() {
            let frame = (start as f64 + step * position as f64).round() as i64;
            self.set_frames(child, frame, frame);
        }
    }

    /// Packs a phrase's words flush left, then grows them one frame at a
    /// time in round-robin order until the extra space is used up. A full
    /// pass that makes no progress terminates the loop so an unsatisfiable
    /// configuration cannot spin forever.
    fn redistribute_phrase(&mut self, id: NodeId) {
        let mut extra_space = self.frame_size(id) - self.min_size(id);
        let kids = self.node(id).children().to_vec();

        for child in &kids {
            let start = match self.left_sibling(*child) {
                Some(sibling) => self.node(sibling).end_frame(),
                None => self.node(id).start_frame(),
            };
            let end = start + self.min_size(*child);
            self.set_frames(*child, start, end);
        }

        let mut last_position: isize = -1;
        let mut moved_child = false;
        while extra_space > 0 {
            if last_position == kids.len() as isize - 1 {
                last_position = -1;
            }
            if !moved_child {
                last_position = -1;
            }
            moved_child = false;
            let mut progressed = false;
            for (position, child) in kids.iter().enumerate() {
                let eligible = match self.left_sibling(*child) {
                    Some(sibling) => {
                        let sib_end = self.node(sibling).end_frame();
                        if self.node(*child).start_frame() < sib_end {
                            // Pushed underneath its neighbor by a previous
                            // award, shift right before growing anyone.
                            let start = self.node(*child).start_frame() + 1;
                            let end = self.node(*child).end_frame() + 1;
                            self.set_frames(*child, start, end);
                            progressed = true;
                            continue;
                        }
                        true
                    }
                    None => true,
                };
                if eligible
                    && extra_space > 0
                    && !moved_child
                    && position as isize > last_position
                {
                    let start = self.node(*child).start_frame();
                    let end = self.node(*child).end_frame() + 1;
                    self.set_frames(*child, start, end);
                    extra_space -= 1;
                    moved_child = true;
                    last_position = position as isize;
                    progressed = true;
                }
            }
            if !progressed {
                debug!("phrase redistribution stalled with {} frames left", extra_space);
                break;
            }
        }

        for child in kids {
            self.reposition_descendants(child, true, 0);
        }
    }
}
