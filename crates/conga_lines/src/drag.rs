//! Drag-to-reposition: one grid object, one axis, at most one cell.
//!
//! A session locks to whichever screen axis the pointer first favors, lets
//! the sprite travel up to one cell toward any open neighbor, and commits a
//! cell change only on release. The clamp and the release-time rounding use
//! the same cell math, so the sprite can never appear in one cell while
//! occupancy records another. Gotchis and milkshakes share the protocol;
//! only the commit differs.

use bevy::prelude::*;

use crate::board::{Board, BoardError, GotchiId, ShakeId, Status};
use crate::grid::{Direction, GridPos};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragAxis {
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragOutcome {
    Moved { from: GridPos, to: GridPos },
    /// Released over the origin cell: nothing committed, nothing charged.
    Returned,
}

/// What a drag session is holding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragTarget {
    Gotchi(GotchiId),
    Shake(ShakeId),
}

/// State of one in-flight drag.
#[derive(Clone, Copy, Debug)]
pub struct DragSession {
    target: DragTarget,
    origin_cell: GridPos,
    origin_world: Vec2,
    axis: Option<DragAxis>,
}

impl DragSession {
    /// Picks up a gotchi. Ready and Waiting gotchis may be dragged; Waiting
    /// is a blocked park, not a lock, and a successful drag frees it.
    pub fn begin(board: &Board, id: GotchiId) -> Result<Self, BoardError> {
        let gotchi = board.gotchi_or_err(id)?;
        if !matches!(gotchi.status, Status::Ready | Status::Waiting) {
            return Err(BoardError::BadStatus(id, gotchi.status, "be dragged"));
        }
        Ok(Self::at(DragTarget::Gotchi(id), gotchi.pos, board))
    }

    /// Picks up a milkshake.
    pub fn begin_shake(board: &Board, id: ShakeId) -> Result<Self, BoardError> {
        let shake = board.shake_or_err(id)?;
        Ok(Self::at(DragTarget::Shake(id), shake.pos, board))
    }

    fn at(target: DragTarget, pos: GridPos, board: &Board) -> Self {
        Self {
            target,
            origin_cell: pos,
            origin_world: board.space().cell_to_world(pos),
            axis: None,
        }
    }

    pub const fn target(&self) -> DragTarget {
        self.target
    }

    pub const fn axis(&self) -> Option<DragAxis> {
        self.axis
    }

    /// Feeds one pointer sample and returns where the sprite should sit.
    /// The first sample locks the axis for the rest of the session; ties go
    /// vertical.
    pub fn update(&mut self, board: &Board, pointer: Vec2) -> Vec2 {
        if self.axis.is_none() {
            let displacement = pointer - self.origin_world;
            self.axis = Some(if displacement.x.abs() > displacement.y.abs() {
                DragAxis::Horizontal
            } else {
                DragAxis::Vertical
            });
        }
        self.clamped(board, pointer)
    }

    /// Ends the session. The final visual position is converted back to a
    /// cell; only a changed cell commits occupancy.
    pub fn release(self, board: &mut Board, pointer: Vec2) -> Result<DragOutcome, BoardError> {
        let visual = self.clamped(board, pointer);
        let Some(cell) = board.space().world_to_cell(visual) else {
            // The clamp keeps the sprite on the grid; an off-grid result
            // means the session state is garbage, so commit nothing.
            return Ok(DragOutcome::Returned);
        };
        if cell == self.origin_cell {
            return Ok(DragOutcome::Returned);
        }
        match self.target {
            DragTarget::Gotchi(id) => {
                board.move_gotchi(id, cell)?;
                // The drag moved it somewhere new; any blocked park is over.
                board.clear_waiting(id)?;
            }
            DragTarget::Shake(id) => board.move_shake(id, cell)?,
        }
        Ok(DragOutcome::Moved {
            from: self.origin_cell,
            to: cell,
        })
    }

    /// Clamps a pointer position to the legal range on the locked axis. A
    /// side whose neighboring cell is occupied or off-grid pins the limit at
    /// the origin; the perpendicular coordinate always stays at the origin.
    fn clamped(&self, board: &Board, pointer: Vec2) -> Vec2 {
        let cell = board.space().cell_size();
        let origin = self.origin_world;
        match self.axis {
            Some(DragAxis::Horizontal) => {
                let min = if self.side_open(board, Direction::Left) {
                    origin.x - cell
                } else {
                    origin.x
                };
                let max = if self.side_open(board, Direction::Right) {
                    origin.x + cell
                } else {
                    origin.x
                };
                Vec2::new(pointer.x.clamp(min, max), origin.y)
            }
            Some(DragAxis::Vertical) => {
                // Rows grow downward, so the cell below bounds world y from
                // beneath and the cell above bounds it from above.
                let min = if self.side_open(board, Direction::Down) {
                    origin.y - cell
                } else {
                    origin.y
                };
                let max = if self.side_open(board, Direction::Up) {
                    origin.y + cell
                } else {
                    origin.y
                };
                Vec2::new(origin.x, pointer.y.clamp(min, max))
            }
            None => origin,
        }
    }

    fn side_open(&self, board: &Board, dir: Direction) -> bool {
        board
            .space()
            .neighbor(self.origin_cell, dir)
            .is_some_and(|pos| board.is_open(pos))
    }
}
