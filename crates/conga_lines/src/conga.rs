//! The chain-movement state machine: one synchronized step of a conga line.
//!
//! A step is planned root-first, animated by the caller, then committed one
//! member at a time in plan order. Each member moves into the cell its
//! leader vacates, so committing in order can never double-occupy a cell.

use crate::board::{Board, BoardError, GotchiId, Occupant, PendingMove, Status};
use crate::grid::{Direction, GridPos};

/// What committing one member's step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Moved { to: GridPos },
    /// The destination held a portal: score the gotchi and destroy it.
    Absorbed { at: GridPos },
}

/// One member's share of a planned chain step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlannedStep {
    pub gotchi: GotchiId,
    pub from: GridPos,
    pub dest: GridPos,
    pub facing: Direction,
}

impl Board {
    /// Ready -> Chaining. The destination cell and arrival facing come from
    /// the advance planner.
    pub fn begin_advance(
        &mut self,
        id: GotchiId,
        dest: GridPos,
        facing: Direction,
    ) -> Result<(), BoardError> {
        if !self.space().contains(dest) {
            return Err(BoardError::OutOfBounds(dest));
        }
        let status = self.gotchi_or_err(id)?.status;
        if status != Status::Ready {
            return Err(BoardError::BadStatus(id, status, "begin a chain step"));
        }
        if let Some(gotchi) = self.gotchi_mut(id) {
            gotchi.status = Status::Chaining;
            gotchi.pending = Some(PendingMove { dest, facing });
        }
        Ok(())
    }

    /// Chaining -> Ready, committing occupancy and adopting the arrival
    /// facing. A portal destination is terminal: the gotchi leaves the board
    /// entirely and the caller credits the score.
    pub fn complete_advance(&mut self, id: GotchiId) -> Result<AdvanceOutcome, BoardError> {
        let gotchi = self.gotchi_or_err(id)?;
        let status = gotchi.status;
        if status != Status::Chaining {
            return Err(BoardError::BadStatus(id, status, "complete a chain step"));
        }
        let Some(PendingMove { dest, facing }) = gotchi.pending else {
            return Err(BoardError::BadStatus(id, status, "complete a chain step"));
        };
        let src = gotchi.pos;

        if self.portal_at(dest) {
            self.remove(src);
            return Ok(AdvanceOutcome::Absorbed { at: dest });
        }

        self.move_gotchi(id, dest)?;
        if let Some(gotchi) = self.gotchi_mut(id) {
            gotchi.facing = facing;
            gotchi.status = Status::Ready;
            gotchi.pending = None;
            gotchi.sway = gotchi.sway.flipped();
        }
        Ok(AdvanceOutcome::Moved { to: dest })
    }

    /// Starts the celebratory hop overlay. The current status is stashed and
    /// restored by `end_jump`; position, facing and occupancy are untouched.
    pub fn begin_jump(&mut self, id: GotchiId) -> Result<(), BoardError> {
        let status = self.gotchi_or_err(id)?.status;
        if status == Status::Jumping {
            return Err(BoardError::BadStatus(id, status, "begin another jump"));
        }
        if let Some(gotchi) = self.gotchi_mut(id) {
            gotchi.resume = Some(status);
            gotchi.status = Status::Jumping;
        }
        Ok(())
    }

    /// Ends the hop, restoring whatever status the jump interrupted.
    pub fn end_jump(&mut self, id: GotchiId) -> Result<(), BoardError> {
        let status = self.gotchi_or_err(id)?.status;
        if status != Status::Jumping {
            return Err(BoardError::BadStatus(id, status, "end a jump"));
        }
        if let Some(gotchi) = self.gotchi_mut(id) {
            gotchi.status = gotchi.resume.take().unwrap_or(Status::Ready);
        }
        Ok(())
    }

    /// Marks a blocked chain head. Harmless to repeat; anything mid-step is
    /// a contract violation.
    pub fn set_waiting(&mut self, id: GotchiId) -> Result<(), BoardError> {
        let status = self.gotchi_or_err(id)?.status;
        match status {
            Status::Ready | Status::Waiting => {
                if let Some(gotchi) = self.gotchi_mut(id) {
                    gotchi.status = Status::Waiting;
                }
                Ok(())
            }
            _ => Err(BoardError::BadStatus(id, status, "wait")),
        }
    }

    /// Waiting -> Ready once re-resolution finds the path clear.
    pub fn clear_waiting(&mut self, id: GotchiId) -> Result<(), BoardError> {
        let status = self.gotchi_or_err(id)?.status;
        match status {
            Status::Ready | Status::Waiting => {
                if let Some(gotchi) = self.gotchi_mut(id) {
                    gotchi.status = Status::Ready;
                }
                Ok(())
            }
            _ => Err(BoardError::BadStatus(id, status, "stop waiting")),
        }
    }

    /// Plans one synchronized step for the chain rooted at `root`: the root
    /// advances one cell along its facing, every follower slides into the
    /// cell its leader vacates and turns toward it.
    ///
    /// When the root's forward cell is neither open nor a portal the root is
    /// parked Waiting and the plan is empty. A vacated cell has only one
    /// seat: when several followers share a leader the first in chain order
    /// claims it and the rest sit the step out, still Ready, together with
    /// everything behind them. Every planned member is moved to Chaining
    /// before returning, so the caller can animate and then commit the
    /// returned steps in order.
    pub fn plan_chain_advance(&mut self, root: GotchiId) -> Result<Vec<PlannedStep>, BoardError> {
        let head = self.gotchi_or_err(root)?;
        let head_pos = head.pos;
        let head_facing = head.facing;

        let forward = self.space().neighbor(head_pos, head_facing);
        let can_enter = forward.is_some_and(|cell| self.is_open(cell) || self.portal_at(cell));
        let Some(forward) = forward.filter(|_| can_enter) else {
            self.set_waiting(root)?;
            return Ok(Vec::new());
        };
        self.clear_waiting(root)?;

        let chain = self.chain_from(root)?;
        let mut steps = vec![PlannedStep {
            gotchi: root,
            from: head_pos,
            dest: forward,
            facing: head_facing,
        }];
        let mut moving = vec![root];
        for member in chain {
            let gotchi = self.gotchi_or_err(member)?;
            let leader = gotchi.leader.ok_or(BoardError::NoSuchGotchi(member))?;
            // A member joins only behind a leader that is itself moving;
            // skipping a member strands its whole branch for this step.
            if !moving.contains(&leader) {
                continue;
            }
            // Nothing has moved yet, so the leader's current cell is exactly
            // the one it is about to vacate. First claimant in chain order
            // wins it.
            let dest = self.gotchi_or_err(leader)?.pos;
            if steps.iter().any(|step| step.dest == dest) {
                continue;
            }
            let from = gotchi.pos;
            let facing = Direction::between(from, dest).ok_or(BoardError::OutOfBounds(dest))?;
            moving.push(member);
            steps.push(PlannedStep {
                gotchi: member,
                from,
                dest,
                facing,
            });
        }

        // Every member must be able to start before anyone does.
        for step in &steps {
            let gotchi = self.gotchi_or_err(step.gotchi)?;
            if !matches!(gotchi.status, Status::Ready | Status::Waiting) {
                return Err(BoardError::BadStatus(step.gotchi, gotchi.status, "join a step"));
            }
        }
        for step in &steps {
            self.clear_waiting(step.gotchi)?;
            self.begin_advance(step.gotchi, step.dest, step.facing)?;
        }
        Ok(steps)
    }

    /// True when a portal sits somewhere along `id`'s facing line, with
    /// nothing but open cells or other gotchis in between. Gotchis are
    /// transient and can conga on ahead; blocks, milkshakes and grid edges
    /// end the line.
    pub fn leads_to_portal(&self, id: GotchiId) -> bool {
        let Some(gotchi) = self.gotchi(id) else {
            return false;
        };
        let mut cell = gotchi.pos;
        while let Some(next) = self.space().neighbor(cell, gotchi.facing) {
            match self.occupant(next) {
                Some(Occupant::Portal) => return true,
                Some(Occupant::Block | Occupant::Shake(_)) => return false,
                Some(Occupant::Gotchi(_)) | None => cell = next,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::board_from;
    use crate::grid::GridPos;

    #[test]
    fn advance_commits_atomically() {
        let (mut board, ids) = board_from(&[
            "...", //
            ".>.",
        ]);
        let id = ids[0];
        board
            .begin_advance(id, GridPos::new(1, 2), Direction::Up)
            .expect("begin");
        assert_eq!(board.gotchi(id).map(|g| g.status), Some(Status::Chaining));
        // Occupancy is untouched until completion.
        assert_eq!(board.gotchi_at(GridPos::new(1, 1)), Some(id));
        assert!(board.is_open(GridPos::new(1, 2)));

        let outcome = board.complete_advance(id).expect("complete");
        assert_eq!(outcome, AdvanceOutcome::Moved { to: GridPos::new(1, 2) });
        assert!(board.is_open(GridPos::new(1, 1)));
        assert_eq!(board.gotchi_at(GridPos::new(1, 2)), Some(id));
        assert_eq!(board.gotchi(id).map(|g| g.facing), Some(Direction::Up));
        assert_eq!(board.gotchi(id).map(|g| g.status), Some(Status::Ready));
    }

    #[test]
    fn begin_advance_requires_ready() {
        let (mut board, ids) = board_from(&[">."]);
        let id = ids[0];
        board
            .begin_advance(id, GridPos::new(0, 1), Direction::Right)
            .expect("begin");
        assert_eq!(
            board.begin_advance(id, GridPos::new(0, 1), Direction::Right),
            Err(BoardError::BadStatus(
                id,
                Status::Chaining,
                "begin a chain step"
            ))
        );
    }

    #[test]
    fn portal_arrival_is_terminal() {
        let (mut board, ids) = board_from(&[">O"]);
        let id = ids[0];
        board
            .begin_advance(id, GridPos::new(0, 1), Direction::Right)
            .expect("begin");
        let outcome = board.complete_advance(id).expect("complete");
        assert_eq!(outcome, AdvanceOutcome::Absorbed { at: GridPos::new(0, 1) });
        assert!(board.gotchi(id).is_none(), "absorbed gotchi is destroyed");
        assert!(board.is_open(GridPos::new(0, 0)), "source cell is vacated");
        assert!(board.portal_at(GridPos::new(0, 1)), "the portal remains");
    }

    #[test]
    fn jump_restores_prior_status_and_touches_nothing() {
        let (mut board, ids) = board_from(&["v."]);
        let id = ids[0];
        board.set_waiting(id).expect("wait");
        board.begin_jump(id).expect("jump");
        assert_eq!(board.gotchi(id).map(|g| g.status), Some(Status::Jumping));
        assert_eq!(
            board.begin_jump(id),
            Err(BoardError::BadStatus(
                id,
                Status::Jumping,
                "begin another jump"
            ))
        );
        board.end_jump(id).expect("land");
        assert_eq!(board.gotchi(id).map(|g| g.status), Some(Status::Waiting));
        assert_eq!(board.gotchi(id).map(|g| g.pos), Some(GridPos::new(0, 0)));
        assert_eq!(board.gotchi(id).map(|g| g.facing), Some(Direction::Down));
    }

    #[test]
    fn blocked_root_waits_then_recovers() {
        let (mut board, ids) = board_from(&[
            ">#.", //
        ]);
        let id = ids[0];
        board.resolve_links();
        assert_eq!(board.plan_chain_advance(id), Ok(vec![]));
        assert_eq!(board.gotchi(id).map(|g| g.status), Some(Status::Waiting));

        // The block goes away; the next resolution pass frees the head.
        board.remove(GridPos::new(0, 1));
        board.resolve_links();
        let steps = board.plan_chain_advance(id).expect("plan");
        assert_eq!(steps.len(), 1);
        assert_eq!(board.gotchi(id).map(|g| g.status), Some(Status::Chaining));
    }

    #[test]
    fn waiting_at_grid_edge_not_an_error() {
        let (mut board, ids) = board_from(&["<."]);
        board.resolve_links();
        assert_eq!(board.plan_chain_advance(ids[0]), Ok(vec![]));
        assert_eq!(
            board.gotchi(ids[0]).map(|g| g.status),
            Some(Status::Waiting)
        );
    }

    #[test]
    fn chain_steps_into_vacated_cells() {
        // Head at the top facing a portal, two followers beneath it.
        let (mut board, ids) = board_from(&[
            "O..", //
            "^..",
            "^..",
            "^..",
        ]);
        let (head, mid, tail) = (ids[0], ids[1], ids[2]);
        board.resolve_links();
        let steps = board.plan_chain_advance(head).expect("plan");
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].gotchi, head);
        assert_eq!(steps[0].dest, GridPos::new(0, 0));
        assert_eq!(steps[1].gotchi, mid);
        assert_eq!(steps[1].dest, GridPos::new(1, 0), "mid takes the head's cell");
        assert_eq!(steps[2].gotchi, tail);
        assert_eq!(steps[2].dest, GridPos::new(2, 0), "tail takes mid's cell");

        // Committing in plan order never trips the occupancy invariant.
        assert_eq!(
            board.complete_advance(head),
            Ok(AdvanceOutcome::Absorbed { at: GridPos::new(0, 0) })
        );
        assert_eq!(
            board.complete_advance(mid),
            Ok(AdvanceOutcome::Moved { to: GridPos::new(1, 0) })
        );
        assert_eq!(
            board.complete_advance(tail),
            Ok(AdvanceOutcome::Moved { to: GridPos::new(2, 0) })
        );
        assert_eq!(board.gotchi_count(), 2);
    }

    #[test]
    fn competing_followers_yield_to_chain_order() {
        // The down-slot and right-slot followers both want the head's cell.
        // Only the first in chain order gets a seat; the loser and its own
        // follower sit the step out and stay Ready.
        let (mut board, ids) = board_from(&[
            "O..", //
            "^<<",
            "^..",
        ]);
        let (head, side, side_tail, below) = (ids[0], ids[1], ids[2], ids[3]);
        board.resolve_links();
        let steps = board.plan_chain_advance(head).expect("plan");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].gotchi, below);
        assert_eq!(steps[1].dest, GridPos::new(1, 0));
        assert_eq!(board.gotchi(side).map(|g| g.status), Some(Status::Ready));
        assert_eq!(
            board.gotchi(side_tail).map(|g| g.status),
            Some(Status::Ready)
        );

        // No two steps share a destination, so commits cannot collide.
        assert_eq!(
            board.complete_advance(head),
            Ok(AdvanceOutcome::Absorbed { at: GridPos::new(0, 0) })
        );
        assert_eq!(
            board.complete_advance(below),
            Ok(AdvanceOutcome::Moved { to: GridPos::new(1, 0) })
        );
        assert_eq!(board.gotchi_at(GridPos::new(1, 1)), Some(side));
    }

    #[test]
    fn leads_to_portal_walks_the_facing_line() {
        let (board, ids) = board_from(&[">.O"]);
        assert!(board.leads_to_portal(ids[0]));
        let (board, ids) = board_from(&[">O."]);
        assert!(board.leads_to_portal(ids[0]));
        let (board, ids) = board_from(&[">vO"]);
        assert!(
            board.leads_to_portal(ids[0]),
            "gotchis in the way can conga on ahead"
        );
        let (board, ids) = board_from(&[">#O"]);
        assert!(!board.leads_to_portal(ids[0]), "a block ends the line");
        let (board, ids) = board_from(&[">MO"]);
        assert!(!board.leads_to_portal(ids[0]), "a milkshake ends the line");
        let (board, ids) = board_from(&[">.."]);
        assert!(
            !board.leads_to_portal(ids[0]),
            "no portal along the facing, no march"
        );
    }

    #[test]
    fn follower_turns_toward_vacated_cell() {
        // A follower hanging off the side turns to face the cell it enters.
        let (mut board, ids) = board_from(&[
            "O..", //
            "^<.",
        ]);
        let (head, side) = (ids[0], ids[1]);
        board.resolve_links();
        let steps = board.plan_chain_advance(head).expect("plan");
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].gotchi, side);
        assert_eq!(steps[1].dest, GridPos::new(1, 0));
        assert_eq!(steps[1].facing, Direction::Left);
    }

    #[test]
    fn sway_flips_only_on_completed_moves() {
        let (mut board, ids) = board_from(&[">.."]);
        let id = ids[0];
        let before = board.gotchi(id).map(|g| g.sway).expect("sway");
        board
            .begin_advance(id, GridPos::new(0, 1), Direction::Right)
            .expect("begin");
        board.complete_advance(id).expect("complete");
        assert_eq!(
            board.gotchi(id).map(|g| g.sway),
            Some(before.flipped()),
            "one step, one sway flip"
        );
    }
}
