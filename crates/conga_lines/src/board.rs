use bevy::prelude::*;
use thiserror::Error;

use crate::grid::{Direction, GridPos, GridSpace};

/// Stable handle into the board's gotchi arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GotchiId(usize);

impl GotchiId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Stable handle into the board's milkshake arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShakeId(usize);

impl ShakeId {
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occupant {
    Gotchi(GotchiId),
    Shake(ShakeId),
    Portal,
    Block,
}

/// Per-gotchi movement status. `Jumping` is a visual overlay that remembers
/// and restores whatever status it interrupted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Chaining,
    Jumping,
    Waiting,
}

/// Which way a gotchi tilts during its next conga step. Alternates on every
/// completed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwaySide {
    Left,
    Right,
}

impl SwaySide {
    pub fn random() -> Self {
        if fastrand::bool() { Self::Left } else { Self::Right }
    }

    pub const fn flipped(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Destination and arrival facing for an in-flight conga step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingMove {
    pub dest: GridPos,
    pub facing: Direction,
}

#[derive(Clone, Debug)]
pub struct Gotchi {
    pub pos: GridPos,
    pub facing: Direction,
    pub status: Status,
    /// Derived relation, only valid until the next facing or position
    /// change. Recomputed by `resolve_links`.
    pub leader: Option<GotchiId>,
    /// One slot per direction, indexed by `Direction::slot`.
    pub followers: [Option<GotchiId>; 4],
    pub pending: Option<PendingMove>,
    pub sway: SwaySide,
    /// Status stashed while a jump overlay runs.
    pub resume: Option<Status>,
}

/// A milkshake: a draggable lure with no facing or chain state. It only
/// moves when the player drags it.
#[derive(Clone, Copy, Debug)]
pub struct Shake {
    pub pos: GridPos,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("cell ({}, {}) is outside the grid", .0.row, .0.col)]
    OutOfBounds(GridPos),
    #[error("cell ({}, {}) is already occupied", .0.row, .0.col)]
    CellOccupied(GridPos),
    #[error("gotchi slot {} holds no gotchi", .0.index())]
    NoSuchGotchi(GotchiId),
    #[error("shake slot {} holds no milkshake", .0.index())]
    NoSuchShake(ShakeId),
    #[error("gotchi {0:?} is {1:?}, cannot {2}")]
    BadStatus(GotchiId, Status, &'static str),
    #[error("follower links loop back to gotchi {}", .0.index())]
    CycleDetected(GotchiId),
}

/// The authoritative level state: one occupant per cell, plus the gotchi
/// records the occupancy entries point at.
#[derive(Resource)]
pub struct Board {
    space: GridSpace,
    cells: Vec<Option<Occupant>>,
    gotchis: Vec<Option<Gotchi>>,
    shakes: Vec<Option<Shake>>,
}

impl Board {
    pub fn new(space: GridSpace) -> Self {
        Self {
            space,
            cells: vec![None; space.rows() * space.cols()],
            gotchis: Vec::new(),
            shakes: Vec::new(),
        }
    }

    pub const fn space(&self) -> &GridSpace {
        &self.space
    }

    fn cell_index(&self, pos: GridPos) -> usize {
        pos.col + pos.row * self.space.cols()
    }

    pub fn occupant(&self, pos: GridPos) -> Option<Occupant> {
        if !self.space.contains(pos) {
            return None;
        }
        self.cells.get(self.cell_index(pos)).copied().flatten()
    }

    /// In bounds and vacant. Out-of-bounds cells are never open.
    pub fn is_open(&self, pos: GridPos) -> bool {
        self.space.contains(pos) && self.occupant(pos).is_none()
    }

    pub fn gotchi_at(&self, pos: GridPos) -> Option<GotchiId> {
        match self.occupant(pos) {
            Some(Occupant::Gotchi(id)) => Some(id),
            _ => None,
        }
    }

    pub fn shake_at(&self, pos: GridPos) -> Option<ShakeId> {
        match self.occupant(pos) {
            Some(Occupant::Shake(id)) => Some(id),
            _ => None,
        }
    }

    pub fn portal_at(&self, pos: GridPos) -> bool {
        matches!(self.occupant(pos), Some(Occupant::Portal))
    }

    pub fn gotchi(&self, id: GotchiId) -> Option<&Gotchi> {
        self.gotchis.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn gotchi_mut(&mut self, id: GotchiId) -> Option<&mut Gotchi> {
        self.gotchis.get_mut(id.0).and_then(Option::as_mut)
    }

    pub(crate) fn gotchi_or_err(&self, id: GotchiId) -> Result<&Gotchi, BoardError> {
        self.gotchi(id).ok_or(BoardError::NoSuchGotchi(id))
    }

    /// Handles of every gotchi still on the board.
    pub fn gotchi_ids(&self) -> Vec<GotchiId> {
        self.gotchis
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| GotchiId(i)))
            .collect()
    }

    pub fn gotchi_count(&self) -> usize {
        self.gotchis.iter().filter(|slot| slot.is_some()).count()
    }

    pub(crate) fn arena_len(&self) -> usize {
        self.gotchis.len()
    }

    pub fn shake(&self, id: ShakeId) -> Option<&Shake> {
        self.shakes.get(id.0).and_then(Option::as_ref)
    }

    pub(crate) fn shake_or_err(&self, id: ShakeId) -> Result<&Shake, BoardError> {
        self.shake(id).ok_or(BoardError::NoSuchShake(id))
    }

    fn claim_cell(&mut self, pos: GridPos, occupant: Occupant) -> Result<(), BoardError> {
        if !self.space.contains(pos) {
            return Err(BoardError::OutOfBounds(pos));
        }
        if self.occupant(pos).is_some() {
            return Err(BoardError::CellOccupied(pos));
        }
        let index = self.cell_index(pos);
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = Some(occupant);
        }
        Ok(())
    }

    fn release_cell(&mut self, pos: GridPos) {
        let index = self.cell_index(pos);
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = None;
        }
    }

    pub fn spawn_gotchi(&mut self, pos: GridPos, facing: Direction) -> Result<GotchiId, BoardError> {
        let id = GotchiId(self.gotchis.len());
        self.claim_cell(pos, Occupant::Gotchi(id))?;
        self.gotchis.push(Some(Gotchi {
            pos,
            facing,
            status: Status::Ready,
            leader: None,
            followers: [None; 4],
            pending: None,
            sway: SwaySide::random(),
            resume: None,
        }));
        Ok(id)
    }

    pub fn spawn_shake(&mut self, pos: GridPos) -> Result<ShakeId, BoardError> {
        let id = ShakeId(self.shakes.len());
        self.claim_cell(pos, Occupant::Shake(id))?;
        self.shakes.push(Some(Shake { pos }));
        Ok(id)
    }

    pub fn place_portal(&mut self, pos: GridPos) -> Result<(), BoardError> {
        self.claim_cell(pos, Occupant::Portal)
    }

    pub fn place_block(&mut self, pos: GridPos) -> Result<(), BoardError> {
        self.claim_cell(pos, Occupant::Block)
    }

    /// Clears a cell. A gotchi or shake occupant is also destroyed in its
    /// arena so the occupancy entry and the record never outlive each other.
    pub fn remove(&mut self, pos: GridPos) -> Option<Occupant> {
        let occupant = self.occupant(pos)?;
        self.release_cell(pos);
        match occupant {
            Occupant::Gotchi(id) => {
                if let Some(slot) = self.gotchis.get_mut(id.0) {
                    *slot = None;
                }
            }
            Occupant::Shake(id) => {
                if let Some(slot) = self.shakes.get_mut(id.0) {
                    *slot = None;
                }
            }
            Occupant::Portal | Occupant::Block => {}
        }
        Some(occupant)
    }

    /// Moves a gotchi to a vacant cell: the destination is validated before
    /// anything mutates, then source and destination swap in one step.
    pub fn move_gotchi(&mut self, id: GotchiId, dest: GridPos) -> Result<(), BoardError> {
        let src = self.gotchi_or_err(id)?.pos;
        if !self.space.contains(dest) {
            return Err(BoardError::OutOfBounds(dest));
        }
        if self.occupant(dest).is_some() {
            return Err(BoardError::CellOccupied(dest));
        }
        self.release_cell(src);
        let index = self.cell_index(dest);
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = Some(Occupant::Gotchi(id));
        }
        if let Some(gotchi) = self.gotchi_mut(id) {
            gotchi.pos = dest;
        }
        Ok(())
    }

    /// Moves a milkshake to a vacant cell, with the same validate-then-swap
    /// discipline as `move_gotchi`.
    pub fn move_shake(&mut self, id: ShakeId, dest: GridPos) -> Result<(), BoardError> {
        let src = self.shake_or_err(id)?.pos;
        if !self.space.contains(dest) {
            return Err(BoardError::OutOfBounds(dest));
        }
        if self.occupant(dest).is_some() {
            return Err(BoardError::CellOccupied(dest));
        }
        self.release_cell(src);
        let index = self.cell_index(dest);
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = Some(Occupant::Shake(id));
        }
        if let Some(shake) = self.shakes.get_mut(id.0).and_then(Option::as_mut) {
            shake.pos = dest;
        }
        Ok(())
    }

    /// Turns a gotchi 90 degrees and returns the new facing for the caller's
    /// facing animation. Rejected mid-chain or mid-jump; a Waiting gotchi may
    /// rotate free and comes back Ready, since the new facing invalidates
    /// the blocked-path park.
    pub fn rotate(&mut self, id: GotchiId, clockwise: bool) -> Result<Direction, BoardError> {
        let status = self.gotchi_or_err(id)?.status;
        if !matches!(status, Status::Ready | Status::Waiting) {
            return Err(BoardError::BadStatus(id, status, "rotate"));
        }
        let gotchi = self.gotchi_mut(id).ok_or(BoardError::NoSuchGotchi(id))?;
        gotchi.facing = if clockwise {
            gotchi.facing.rotated_cw()
        } else {
            gotchi.facing.rotated_acw()
        };
        gotchi.status = Status::Ready;
        Ok(gotchi.facing)
    }

    /// Level-load shuffle of a gotchi's facing.
    pub fn random_facing(&mut self, id: GotchiId) -> Result<Direction, BoardError> {
        let gotchi = self.gotchi_mut(id).ok_or(BoardError::NoSuchGotchi(id))?;
        gotchi.facing = Direction::random();
        Ok(gotchi.facing)
    }
}
