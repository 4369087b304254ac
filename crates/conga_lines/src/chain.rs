//! Leader/follower resolution and conga-chain assembly.
//!
//! Links are derived state: they hold only until the next facing or position
//! change, so every decision point recomputes them with `resolve_links`
//! before any chain is walked.

use crate::board::{Board, BoardError, GotchiId};
use crate::grid::Direction;

impl Board {
    /// The gotchi directly ahead of `id`, unless the two are staring at each
    /// other. Two gotchis looking straight at one another never pair up.
    pub fn find_leader(&self, id: GotchiId) -> Option<GotchiId> {
        let gotchi = self.gotchi(id)?;
        let ahead = self.space().neighbor(gotchi.pos, gotchi.facing)?;
        let candidate_id = self.gotchi_at(ahead)?;
        let candidate = self.gotchi(candidate_id)?;
        if candidate.facing == gotchi.facing.opposite() {
            return None;
        }
        Some(candidate_id)
    }

    /// The follower of `id` on side `dir`: the neighbor there whose facing
    /// points back at us, skipped when we are staring straight back at it.
    /// Mirrors `find_leader` so the two relations stay symmetric.
    fn find_follower(&self, id: GotchiId, dir: Direction) -> Option<GotchiId> {
        let gotchi = self.gotchi(id)?;
        if gotchi.facing == dir {
            // We are looking at that neighbor ourselves: mutual stare.
            return None;
        }
        let side = self.space().neighbor(gotchi.pos, dir)?;
        let neighbor_id = self.gotchi_at(side)?;
        let neighbor = self.gotchi(neighbor_id)?;
        (neighbor.facing == dir.opposite()).then_some(neighbor_id)
    }

    /// Recomputes every gotchi's leader and follower slots from the current
    /// occupancy and facings. Call once per decision point, before any chain
    /// is assembled.
    pub fn resolve_links(&mut self) {
        let ids = self.gotchi_ids();
        let mut resolved = Vec::with_capacity(ids.len());
        for &id in &ids {
            let leader = self.find_leader(id);
            let mut followers = [None; 4];
            for dir in Direction::ALL {
                if let Some(slot) = followers.get_mut(dir.slot()) {
                    *slot = self.find_follower(id, dir);
                }
            }
            resolved.push((id, leader, followers));
        }
        for (id, leader, followers) in resolved {
            if let Some(gotchi) = self.gotchi_mut(id) {
                gotchi.leader = leader;
                gotchi.followers = followers;
            }
        }
    }

    /// Everything transitively following `root`, closest first: depth-first
    /// over the follower slots in fixed order (down, left, up, right).
    ///
    /// The occupancy invariant makes a follower loop impossible, but the
    /// links are plain indices, so traversal still marks visited gotchis and
    /// fails hard on a revisit instead of spinning forever.
    pub fn chain_from(&self, root: GotchiId) -> Result<Vec<GotchiId>, BoardError> {
        self.gotchi_or_err(root)?;
        let mut visited = vec![false; self.arena_len()];
        if let Some(slot) = visited.get_mut(root.index()) {
            *slot = true;
        }
        let mut chain = Vec::new();
        self.walk_followers(root, &mut chain, &mut visited)?;
        Ok(chain)
    }

    fn walk_followers(
        &self,
        id: GotchiId,
        chain: &mut Vec<GotchiId>,
        visited: &mut [bool],
    ) -> Result<(), BoardError> {
        let followers = self.gotchi_or_err(id)?.followers;
        for follower in followers.into_iter().flatten() {
            match visited.get_mut(follower.index()) {
                Some(seen) if *seen => return Err(BoardError::CycleDetected(follower)),
                Some(seen) => *seen = true,
                None => return Err(BoardError::NoSuchGotchi(follower)),
            }
            chain.push(follower);
            self.walk_followers(follower, chain, visited)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::board_from;

    #[test]
    fn mutual_stare_vetoes_both() {
        // A at (1,1) facing up, B at (0,1) facing down: staring contest.
        let (mut board, ids) = board_from(&[
            ".v.", //
            ".^.",
            "...",
        ]);
        let (b, a) = (ids[0], ids[1]);
        board.resolve_links();
        assert_eq!(board.find_leader(a), None);
        assert_eq!(board.find_leader(b), None);
        assert_eq!(board.gotchi(a).and_then(|g| g.leader), None);
        assert_eq!(board.gotchi(b).and_then(|g| g.leader), None);
        assert_eq!(board.gotchi(b).map(|g| g.followers), Some([None; 4]));
    }

    #[test]
    fn sideways_leader_links() {
        // A at (1,1) facing up, B at (0,1) facing left: no stare, so B leads A.
        let (mut board, ids) = board_from(&[
            ".<.", //
            ".^.",
            "...",
        ]);
        let (b, a) = (ids[0], ids[1]);
        board.resolve_links();
        assert_eq!(board.find_leader(a), Some(b));
        // A sits below B, so it fills B's down slot.
        assert_eq!(
            board.gotchi(b).and_then(|g| g.followers[Direction::Down.slot()]),
            Some(a)
        );
    }

    #[test]
    fn leader_must_be_a_gotchi() {
        let (mut board, ids) = board_from(&[
            ".#.", //
            ".^O",
            "...",
        ]);
        board.resolve_links();
        assert_eq!(board.find_leader(ids[0]), None, "blocks never lead");
        let edge = board_from(&["<.."]);
        assert_eq!(
            edge.0.find_leader(edge.1[0]),
            None,
            "facing off the grid edge finds nothing"
        );
    }

    #[test]
    fn follower_leader_symmetry() {
        let (mut board, ids) = board_from(&[
            ".<>", //
            ".^.",
            ">^.",
        ]);
        board.resolve_links();
        for &a in &ids {
            let leader = board.gotchi(a).and_then(|g| g.leader);
            for &b in &ids {
                for dir in Direction::ALL {
                    let follows_here =
                        board.gotchi(b).and_then(|g| g.followers[dir.slot()]) == Some(a);
                    let a_pos = board.gotchi(a).map(|g| g.pos);
                    let expected = leader == Some(b)
                        && board
                            .gotchi(b)
                            .and_then(|g| board.space().neighbor(g.pos, dir))
                            == a_pos;
                    assert_eq!(
                        follows_here, expected,
                        "slot {dir:?} of {b:?} disagrees with find_leader({a:?})"
                    );
                }
            }
        }
    }

    #[test]
    fn vertical_line_chain_order() {
        // Column of three: top faces left (the chain head), the two below
        // face up. Walking from the head yields middle then bottom; the tail
        // has no followers at all.
        let (mut board, ids) = board_from(&[
            ".<.", //
            ".^.",
            ".^.",
        ]);
        let (top, middle, bottom) = (ids[0], ids[1], ids[2]);
        board.resolve_links();
        assert_eq!(board.chain_from(top), Ok(vec![middle, bottom]));
        assert_eq!(board.chain_from(bottom), Ok(vec![]));
    }

    #[test]
    fn chain_order_is_deterministic_slot_order() {
        // Three followers around one head: down, left and right slots all
        // filled. Output must follow slot order down, left, up, right.
        let (mut board, ids) = board_from(&[
            ".v.", //
            ">^<",
            ".^.",
        ]);
        let (above, left, head, right, below) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        // The gotchi above stares straight back at the head, so it joins
        // nothing.
        let _ = above;
        board.resolve_links();
        let first = board.chain_from(head).expect("chain");
        assert_eq!(first, vec![below, left, right]);
        let second = board.chain_from(head).expect("chain");
        assert_eq!(first, second, "same state must give the same order");
    }

    #[test]
    fn branched_chain_recurses_before_next_slot() {
        // The head's down-slot follower has its own follower; that whole
        // branch is emitted before the head's right-slot follower.
        let (mut board, ids) = board_from(&[
            ".<<", //
            ".^.",
            ".^.",
        ]);
        let (head, first, mid, tail) = (ids[0], ids[1], ids[2], ids[3]);
        board.resolve_links();
        assert_eq!(board.chain_from(head), Ok(vec![mid, tail, first]));
    }

    #[test]
    fn corrupted_links_fail_loudly() {
        let (mut board, ids) = board_from(&[
            ".<.", //
            ".^.",
        ]);
        let (top, bottom) = (ids[0], ids[1]);
        board.resolve_links();
        // Force the invariant breach resolve_links can never produce.
        if let Some(gotchi) = board.gotchi_mut(bottom) {
            gotchi.followers[Direction::Up.slot()] = Some(top);
        }
        assert_eq!(
            board.chain_from(top),
            Err(BoardError::CycleDetected(top))
        );
    }
}
