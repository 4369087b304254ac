//! Pointer routing: raw press/hold/release samples become small commands
//! that a single dispatcher applies to the board. The router only filters;
//! the dispatcher re-validates everything against current state before it
//! mutates or charges budget.

use bevy::prelude::*;
use game_helpers::input::{
    just_pressed_world_position, just_released_world_position, pressed_world_position,
};

use crate::board::Board;
use crate::drag::{DragOutcome, DragSession, DragTarget};
use crate::grid::GridPos;
use crate::stats::{PlayerStats, StatKind};
use crate::{GotchiVisual, ShakeVisual};

/// A press/release pair faster than this is a click, not a drag.
pub const CLICK_THRESHOLD_SECS: f32 = 0.2;

#[derive(Event, Clone, Copy, Debug, PartialEq)]
pub enum GridCommand {
    Rotate { cell: GridPos },
    PlacePortal { cell: GridPos },
    BeginDrag { cell: GridPos },
    UpdateDrag { pointer: Vec2 },
    EndDrag { pointer: Vec2 },
}

#[derive(Resource, Default)]
pub struct ActiveDrag(pub Option<DragSession>);

/// Where and when the pointer last went down.
#[derive(Resource, Default)]
pub struct PointerState {
    down_at: f32,
    down_cell: Option<GridPos>,
}

/// Click semantics: rotate a gotchi that sat in the pressed cell the whole
/// time, otherwise open a portal on an empty cell. The press cell decides
/// whether the gotchi "stayed put", so an aborted drag never rotates.
pub(crate) fn click_command(
    board: &Board,
    down_cell: Option<GridPos>,
    up_cell: Option<GridPos>,
) -> Option<GridCommand> {
    let up = up_cell?;
    if board.gotchi_at(up).is_some() {
        (down_cell == Some(up)).then_some(GridCommand::Rotate { cell: up })
    } else if board.is_open(up) {
        Some(GridCommand::PlacePortal { cell: up })
    } else {
        None
    }
}

pub fn route_pointer(
    window: Query<&Window>,
    camera: Query<(&Camera, &GlobalTransform)>,
    mouse_button_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    time: Res<Time>,
    board: Res<Board>,
    active_drag: Res<ActiveDrag>,
    mut pointer: ResMut<PointerState>,
    mut out: EventWriter<GridCommand>,
) {
    if let Some(world_position) =
        just_pressed_world_position(&mouse_button_input, &touch_input, &window, &camera)
    {
        pointer.down_at = time.elapsed_secs();
        pointer.down_cell = board.space().world_to_cell(world_position);
        if let Some(cell) = pointer.down_cell {
            if board.gotchi_at(cell).is_some() || board.shake_at(cell).is_some() {
                out.send(GridCommand::BeginDrag { cell });
            }
        }
    }

    if active_drag.0.is_some() {
        if let Some(world_position) =
            pressed_world_position(&mouse_button_input, &touch_input, &window, &camera)
        {
            out.send(GridCommand::UpdateDrag {
                pointer: world_position,
            });
        }
    }

    if let Some(world_position) =
        just_released_world_position(&mouse_button_input, &touch_input, &window, &camera)
    {
        if active_drag.0.is_some() {
            out.send(GridCommand::EndDrag {
                pointer: world_position,
            });
        }
        let elapsed = time.elapsed_secs() - pointer.down_at;
        if elapsed < CLICK_THRESHOLD_SECS {
            let up_cell = board.space().world_to_cell(world_position);
            if let Some(command) = click_command(&board, pointer.down_cell, up_cell) {
                out.send(command);
            }
        }
    }
}

pub fn apply_commands(
    mut events: EventReader<GridCommand>,
    mut commands: Commands,
    mut board: ResMut<Board>,
    mut stats: ResMut<PlayerStats>,
    mut active_drag: ResMut<ActiveDrag>,
    mut gotchis: Query<(&GotchiVisual, &mut Transform), Without<ShakeVisual>>,
    mut shakes: Query<(&ShakeVisual, &mut Transform), Without<GotchiVisual>>,
) {
    for &command in events.read() {
        match command {
            GridCommand::BeginDrag { cell } => {
                if active_drag.0.is_some() {
                    continue;
                }
                if let Some(id) = board.gotchi_at(cell) {
                    if !stats.has(StatKind::MoveGotchi) {
                        continue;
                    }
                    match DragSession::begin(&board, id) {
                        Ok(session) => active_drag.0 = Some(session),
                        Err(error) => info!("drag refused: {error}"),
                    }
                } else if let Some(id) = board.shake_at(cell) {
                    if !stats.has(StatKind::MoveShake) {
                        continue;
                    }
                    match DragSession::begin_shake(&board, id) {
                        Ok(session) => active_drag.0 = Some(session),
                        Err(error) => info!("drag refused: {error}"),
                    }
                }
            }
            GridCommand::UpdateDrag { pointer } => {
                if let Some(session) = active_drag.0.as_mut() {
                    let visual = session.update(&board, pointer);
                    match session.target() {
                        DragTarget::Gotchi(id) => {
                            for (gotchi, mut transform) in &mut gotchis {
                                if gotchi.id == id {
                                    transform.translation.x = visual.x;
                                    transform.translation.y = visual.y;
                                }
                            }
                        }
                        DragTarget::Shake(id) => {
                            for (shake, mut transform) in &mut shakes {
                                if shake.id == id {
                                    transform.translation.x = visual.x;
                                    transform.translation.y = visual.y;
                                }
                            }
                        }
                    }
                }
            }
            GridCommand::EndDrag { pointer } => {
                if let Some(session) = active_drag.0.take() {
                    let kind = match session.target() {
                        DragTarget::Gotchi(_) => StatKind::MoveGotchi,
                        DragTarget::Shake(_) => StatKind::MoveShake,
                    };
                    match session.release(&mut board, pointer) {
                        Ok(DragOutcome::Moved { from, to }) => {
                            stats.spend(kind);
                            info!(
                                "moved {kind} ({}, {}) -> ({}, {})",
                                from.row, from.col, to.row, to.col
                            );
                        }
                        // Snapped back to the origin cell: charge nothing.
                        Ok(DragOutcome::Returned) => {}
                        Err(error) => warn!("drag commit failed: {error}"),
                    }
                }
            }
            GridCommand::Rotate { cell } => {
                if !stats.has(StatKind::Rotate) {
                    continue;
                }
                let Some(id) = board.gotchi_at(cell) else {
                    continue;
                };
                match board.rotate(id, true) {
                    Ok(facing) => {
                        stats.spend(StatKind::Rotate);
                        info!("rotated gotchi to {facing:?}");
                    }
                    Err(error) => info!("rotate refused: {error}"),
                }
            }
            GridCommand::PlacePortal { cell } => {
                if !stats.has(StatKind::Portal) {
                    continue;
                }
                match board.place_portal(cell) {
                    Ok(()) => {
                        stats.spend(StatKind::Portal);
                        crate::spawn_portal_sprite(&mut commands, board.space(), cell);
                    }
                    Err(error) => info!("portal refused: {error}"),
                }
            }
        }
    }
}
