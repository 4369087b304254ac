use bevy::prelude::*;
use game_helpers::FONT;
use game_helpers::floating_score::{animate_floating_scores, spawn_floating_score};
use game_helpers::welcome_screen::{despawn_welcome_screen, spawn_welcome_screen_text};
use strum::IntoEnumIterator;

use crate::board::{Board, GotchiId, ShakeId, Status, SwaySide};
use crate::conga::AdvanceOutcome;
use crate::drag::DragTarget;
use crate::grid::{Direction, GridPos, GridSpace};
use crate::input::{ActiveDrag, GridCommand, PointerState, apply_commands, route_pointer};
use crate::stats::{PlayerStats, StatKind};

pub mod board;
pub mod chain;
pub mod conga;
pub mod drag;
pub mod grid;
pub mod input;
pub mod stats;

const CELL_SIZE: f32 = 40.0;
const GOTCHI_SIZE: f32 = CELL_SIZE * 0.78;
const MARKER_SIZE: f32 = CELL_SIZE * 0.18;
const CELL_GAP: f32 = 2.0;

const SLIDE_SPEED: f32 = 2.5; // cells / sec
const CONGA_STEP_SECS: f32 = 1.6;
const JUMP_SECS: f32 = 0.3;
const JUMP_HEIGHT: f32 = CELL_SIZE * 0.35;
const SWAY_RADIANS: f32 = 0.17;
const RESULT_SECS: f32 = 2.5;

const PORTAL_SCORE: u32 = 20;
const MOVE_BUDGET: u32 = 8;
const SHAKE_BUDGET: u32 = 4;
const ROTATE_BUDGET: u32 = 8;
const PORTAL_BUDGET: u32 = 2;

const BODY_COLOR: Color = Color::srgb(0.55, 0.4, 0.85);
const HAPPY_COLOR: Color = Color::srgb(0.85, 0.55, 0.95);
const WAITING_COLOR: Color = Color::srgb(0.4, 0.4, 0.5);
const MARKER_COLOR: Color = Color::srgb(0.95, 0.95, 0.95);
const PORTAL_COLOR: Color = Color::srgb(0.2, 0.85, 0.8);
const BLOCK_COLOR: Color = Color::srgb(0.35, 0.3, 0.25);
const SHAKE_COLOR: Color = Color::srgb(0.95, 0.75, 0.55);
const TILE_COLOR: Color = Color::srgb(0.16, 0.16, 0.2);
const TILE_FRAME_COLOR: Color = Color::srgb(0.28, 0.28, 0.34);

/// Starting layout: `^v<>` gotchis by facing, `O` portal, `#` block,
/// `M` milkshake.
const LEVEL: &[&str] = &[
    "......", //
    "..O...",
    "....M.",
    "..^...",
    ".>^...",
    "..^.#.",
    "......",
    "......",
];

#[derive(States, Default, Debug, Clone, PartialEq, Eq, Hash)]
enum GameState {
    #[default]
    Init,
    Welcome,
    Game,
    Result,
}

/// StandBy between chain steps, Sliding while one is animating.
#[derive(States, Default, Debug, Clone, PartialEq, Eq, Hash)]
enum StepState {
    #[default]
    StandBy,
    Sliding,
}

#[derive(Component)]
struct MainCamera;

#[derive(Component)]
struct LifespanGame;

/// Sprite mirroring one gotchi on the board.
#[derive(Component, Clone, Copy)]
pub struct GotchiVisual {
    pub id: GotchiId,
}

/// Sprite mirroring one milkshake on the board.
#[derive(Component, Clone, Copy)]
pub struct ShakeVisual {
    pub id: ShakeId,
}

/// Child sprite showing which way its parent gotchi faces.
#[derive(Component)]
struct FacingMarker;

#[derive(Component)]
struct ScoreText;

#[derive(Component)]
struct BudgetText;

#[derive(Component)]
struct CongaJump {
    timer: Timer,
}

#[derive(Component)]
struct ResultCountdown {
    timer: Timer,
}

#[derive(Resource, Default)]
struct Score(u32);

#[derive(Resource)]
struct TurnTimer(Timer);

/// The chain step currently animating, in commit order.
#[derive(Resource, Default)]
struct ActiveConga {
    steps: Vec<conga::PlannedStep>,
    alpha: f32,
}

pub fn run() {
    game_helpers::get_default_app(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .init_state::<GameState>()
        .init_state::<StepState>()
        .add_event::<GridCommand>()
        .init_resource::<Score>()
        .init_resource::<ActiveConga>()
        .init_resource::<ActiveDrag>()
        .init_resource::<PointerState>()
        .insert_resource(TurnTimer(Timer::from_seconds(
            CONGA_STEP_SECS,
            TimerMode::Repeating,
        )))
        .add_systems(OnEnter(GameState::Init), init_enter)
        .add_systems(OnEnter(GameState::Welcome), welcome_enter)
        .add_systems(OnExit(GameState::Welcome), despawn_welcome_screen)
        .add_systems(OnEnter(GameState::Game), spawn_level)
        .add_systems(OnEnter(GameState::Result), result_enter)
        .add_systems(
            Update,
            (
                welcome_input.run_if(in_state(GameState::Welcome)),
                (route_pointer, apply_commands)
                    .chain()
                    .run_if(in_state(GameState::Game)),
                conga_tick
                    .run_if(in_state(GameState::Game))
                    .run_if(in_state(StepState::StandBy)),
                conga_slide
                    .run_if(in_state(GameState::Game))
                    .run_if(in_state(StepState::Sliding)),
                (sync_visuals, animate_jumps)
                    .chain()
                    .run_if(in_state(GameState::Game)),
                update_hud.run_if(in_state(GameState::Game)),
                check_level_clear.run_if(in_state(GameState::Game)),
                animate_floating_scores,
                result_countdown.run_if(in_state(GameState::Result)),
            ),
        )
        .run();
}

const fn facing_offset(dir: Direction) -> Vec2 {
    match dir {
        Direction::Down => Vec2::new(0.0, -1.0),
        Direction::Left => Vec2::new(-1.0, 0.0),
        Direction::Up => Vec2::new(0.0, 1.0),
        Direction::Right => Vec2::new(1.0, 0.0),
    }
}

fn init_enter(mut commands: Commands, mut next_state: ResMut<NextState<GameState>>) {
    commands.spawn(Camera2d).insert(MainCamera);
    next_state.set(GameState::Welcome);
}

fn welcome_enter(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    clear_query: Query<Entity, With<LifespanGame>>,
) {
    for entity in clear_query.iter() {
        commands.entity(entity).despawn_recursive();
    }
    spawn_welcome_screen_text(&mut commands, &asset_server, "Conga Lines", "Tap to start");
}

fn welcome_input(
    mouse_button_input: Res<ButtonInput<MouseButton>>,
    touch_input: Res<Touches>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if mouse_button_input.just_pressed(MouseButton::Left) || touch_input.any_just_pressed() {
        next_state.set(GameState::Game);
    }
}

fn parse_level(rows: &[&str]) -> Board {
    let height = rows.len();
    let width = rows.first().map_or(0, |row| row.chars().count());
    let mut board = Board::new(GridSpace::centered(height, width, CELL_SIZE));
    for (row, line) in rows.iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            let pos = GridPos::new(row, col);
            let result = match ch {
                '^' => board.spawn_gotchi(pos, Direction::Up).map(|_| ()),
                'v' => board.spawn_gotchi(pos, Direction::Down).map(|_| ()),
                '<' => board.spawn_gotchi(pos, Direction::Left).map(|_| ()),
                '>' => board.spawn_gotchi(pos, Direction::Right).map(|_| ()),
                'O' => board.place_portal(pos),
                '#' => board.place_block(pos),
                'M' => board.spawn_shake(pos).map(|_| ()),
                _ => Ok(()),
            };
            if let Err(error) = result {
                error!("bad level cell ({row}, {col}): {error}");
            }
        }
    }
    board
}

fn spawn_level(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    clear_query: Query<Entity, With<LifespanGame>>,
    mut turn_timer: ResMut<TurnTimer>,
    mut active_conga: ResMut<ActiveConga>,
    mut active_drag: ResMut<ActiveDrag>,
    mut next_step: ResMut<NextState<StepState>>,
) {
    for entity in clear_query.iter() {
        commands.entity(entity).despawn_recursive();
    }

    let board = parse_level(LEVEL);
    let space = *board.space();

    spawn_tiles(&mut commands, &space);
    for row in 0..space.rows() {
        for col in 0..space.cols() {
            let pos = GridPos::new(row, col);
            match board.occupant(pos) {
                Some(board::Occupant::Gotchi(id)) => {
                    let facing = board
                        .gotchi(id)
                        .map_or(Direction::Down, |gotchi| gotchi.facing);
                    spawn_gotchi_sprite(&mut commands, &space, pos, id, facing);
                }
                Some(board::Occupant::Shake(id)) => {
                    spawn_shake_sprite(&mut commands, &space, pos, id);
                }
                Some(board::Occupant::Portal) => spawn_portal_sprite(&mut commands, &space, pos),
                Some(board::Occupant::Block) => {
                    let center = space.cell_to_world(pos);
                    commands.spawn((
                        Sprite::from_color(BLOCK_COLOR, Vec2::splat(CELL_SIZE - CELL_GAP)),
                        Transform::from_xyz(center.x, center.y, 1.0),
                        LifespanGame,
                    ));
                }
                None => {}
            }
        }
    }
    spawn_hud(&mut commands, &asset_server, &space);

    commands.insert_resource(board);
    commands.insert_resource(PlayerStats::new(
        MOVE_BUDGET,
        SHAKE_BUDGET,
        ROTATE_BUDGET,
        PORTAL_BUDGET,
    ));
    commands.insert_resource(Score(0));
    turn_timer.0.reset();
    active_conga.steps.clear();
    active_conga.alpha = 0.0;
    active_drag.0 = None;
    next_step.set(StepState::StandBy);
}

fn spawn_tiles(commands: &mut Commands, space: &GridSpace) {
    let inner = Vec2::splat(CELL_SIZE - CELL_GAP);
    for row in 0..space.rows() {
        for col in 0..space.cols() {
            let center = space.cell_to_world(GridPos::new(row, col));
            commands
                .spawn((
                    Sprite::from_color(TILE_FRAME_COLOR, Vec2::splat(CELL_SIZE)),
                    Transform::from_xyz(center.x, center.y, -10.0),
                    LifespanGame,
                ))
                .with_children(|parent| {
                    parent.spawn(Sprite::from_color(TILE_COLOR, inner));
                });
        }
    }
}

fn spawn_gotchi_sprite(
    commands: &mut Commands,
    space: &GridSpace,
    pos: GridPos,
    id: GotchiId,
    facing: Direction,
) {
    let center = space.cell_to_world(pos);
    let marker_offset = facing_offset(facing) * CELL_SIZE * 0.28;
    commands
        .spawn((
            Sprite::from_color(BODY_COLOR, Vec2::splat(GOTCHI_SIZE)),
            Transform::from_xyz(center.x, center.y, 3.0),
            GotchiVisual { id },
            LifespanGame,
        ))
        .with_children(|parent| {
            parent.spawn((
                Sprite::from_color(MARKER_COLOR, Vec2::splat(MARKER_SIZE)),
                Transform::from_xyz(marker_offset.x, marker_offset.y, 1.0),
                FacingMarker,
            ));
        });
}

fn spawn_shake_sprite(commands: &mut Commands, space: &GridSpace, pos: GridPos, id: ShakeId) {
    let center = space.cell_to_world(pos);
    commands
        .spawn((
            Sprite::from_color(SHAKE_COLOR, Vec2::splat(GOTCHI_SIZE * 0.85)),
            Transform::from_xyz(center.x, center.y, 2.0),
            ShakeVisual { id },
            LifespanGame,
        ))
        .with_children(|parent| {
            // The straw.
            parent.spawn((
                Sprite::from_color(Color::WHITE, Vec2::new(MARKER_SIZE * 0.5, MARKER_SIZE * 1.6)),
                Transform::from_xyz(CELL_SIZE * 0.1, CELL_SIZE * 0.22, 1.0),
            ));
        });
}

pub(crate) fn spawn_portal_sprite(commands: &mut Commands, space: &GridSpace, pos: GridPos) {
    let center = space.cell_to_world(pos);
    commands
        .spawn((
            Sprite::from_color(PORTAL_COLOR, Vec2::splat(CELL_SIZE - CELL_GAP)),
            Transform::from_xyz(center.x, center.y, 1.0),
            LifespanGame,
        ))
        .with_children(|parent| {
            parent.spawn((
                Sprite::from_color(Color::BLACK, Vec2::splat(CELL_SIZE * 0.5)),
                Transform::from_xyz(0.0, 0.0, 1.0),
            ));
        });
}

fn spawn_hud(commands: &mut Commands, asset_server: &Res<AssetServer>, space: &GridSpace) {
    let grid_top = space.cell_to_world(GridPos::new(0, 0)).y + CELL_SIZE;
    commands.spawn((
        Text2d::new("Score: 0"),
        TextFont {
            font: asset_server.load(FONT),
            font_size: 24.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Transform::from_xyz(0.0, grid_top + 40.0, 10.0),
        ScoreText,
        LifespanGame,
    ));
    commands.spawn((
        Text2d::new(""),
        TextFont {
            font: asset_server.load(FONT),
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Transform::from_xyz(0.0, grid_top + 12.0, 10.0),
        BudgetText,
        LifespanGame,
    ));
}

/// On each beat: refresh links, release any Waiting gotchi whose path has
/// opened, then start the first chain that can actually move. One chain per
/// beat keeps commits from racing each other into the same cell.
fn conga_tick(
    time: Res<Time>,
    mut timer: ResMut<TurnTimer>,
    mut board: ResMut<Board>,
    active_drag: Res<ActiveDrag>,
    mut active_conga: ResMut<ActiveConga>,
    mut next_step: ResMut<NextState<StepState>>,
) {
    timer.0.tick(time.delta());
    if !timer.0.just_finished() {
        return;
    }
    // The beat skips while the player is holding a gotchi.
    if active_drag.0.is_some() {
        return;
    }

    board.resolve_links();
    let ids = board.gotchi_ids();

    for &id in &ids {
        let Some(gotchi) = board.gotchi(id) else {
            continue;
        };
        if gotchi.status != Status::Waiting {
            continue;
        }
        let forward = board.space().neighbor(gotchi.pos, gotchi.facing);
        if forward.is_some_and(|cell| board.is_open(cell) || board.portal_at(cell)) {
            if let Err(error) = board.clear_waiting(id) {
                warn!("could not release {id:?}: {error}");
            }
        }
    }

    for &id in &ids {
        let Some(gotchi) = board.gotchi(id) else {
            continue;
        };
        if gotchi.leader.is_some() {
            continue;
        }
        if !matches!(gotchi.status, Status::Ready | Status::Waiting) {
            continue;
        }
        // The conga only marches toward a goal: a head with no portal along
        // its facing line stays put.
        if !board.leads_to_portal(id) {
            continue;
        }
        match board.plan_chain_advance(id) {
            Ok(steps) if steps.is_empty() => {}
            Ok(steps) => {
                active_conga.steps = steps;
                active_conga.alpha = 0.0;
                next_step.set(StepState::Sliding);
                return;
            }
            Err(error) => warn!("chain from {id:?} failed to start: {error}"),
        }
    }
}

/// Slides every member of the active step in lockstep, then commits the
/// whole step in plan order. Portal arrivals score, despawn and send the
/// rest of the chain into a celebratory hop.
fn conga_slide(
    mut commands: Commands,
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    mut board: ResMut<Board>,
    mut active_conga: ResMut<ActiveConga>,
    mut score: ResMut<Score>,
    mut gotchis: Query<(Entity, &GotchiVisual, &mut Transform)>,
    mut next_step: ResMut<NextState<StepState>>,
) {
    active_conga.alpha = (active_conga.alpha + time.delta_secs() * SLIDE_SPEED).min(1.0);
    let alpha = active_conga.alpha;
    let space = *board.space();

    for step in &active_conga.steps {
        let src = space.cell_to_world(step.from);
        let dst = space.cell_to_world(step.dest);
        let sway = board
            .gotchi(step.gotchi)
            .map_or(SwaySide::Left, |gotchi| gotchi.sway);
        for (_, visual, mut transform) in &mut gotchis {
            if visual.id != step.gotchi {
                continue;
            }
            let at = src.lerp(dst, alpha);
            transform.translation.x = at.x;
            transform.translation.y = at.y;
            let tilt = match sway {
                SwaySide::Left => SWAY_RADIANS,
                SwaySide::Right => -SWAY_RADIANS,
            };
            transform.rotation = Quat::from_rotation_z(tilt * alpha);
        }
    }

    if alpha < 1.0 {
        return;
    }

    let steps = core::mem::take(&mut active_conga.steps);
    let mut absorbed = Vec::new();
    for step in &steps {
        match board.complete_advance(step.gotchi) {
            Ok(AdvanceOutcome::Moved { .. }) => {}
            Ok(AdvanceOutcome::Absorbed { at }) => {
                score.0 += PORTAL_SCORE;
                spawn_floating_score(
                    &mut commands,
                    space.cell_to_world(at),
                    "+20",
                    bevy::color::palettes::css::LIMEGREEN,
                    &asset_server,
                );
                absorbed.push(step.gotchi);
            }
            Err(error) => warn!("chain commit for {:?} failed: {error}", step.gotchi),
        }
    }

    for (entity, visual, _) in gotchis.iter() {
        if absorbed.contains(&visual.id) {
            commands.entity(entity).despawn_recursive();
        }
    }
    if !absorbed.is_empty() {
        for step in &steps {
            if absorbed.contains(&step.gotchi) {
                continue;
            }
            if board.begin_jump(step.gotchi).is_ok() {
                for (entity, visual, _) in gotchis.iter() {
                    if visual.id == step.gotchi {
                        commands.entity(entity).insert(CongaJump {
                            timer: Timer::from_seconds(JUMP_SECS, TimerMode::Once),
                        });
                    }
                }
            }
        }
    }
    next_step.set(StepState::StandBy);
}

/// Keeps resting sprites snapped to their cells and tinted by status. Sprites
/// mid-slide, mid-jump or held by the pointer are animated elsewhere.
fn sync_visuals(
    board: Res<Board>,
    active_drag: Res<ActiveDrag>,
    mut bodies: Query<
        (&GotchiVisual, &mut Transform, &mut Sprite),
        (Without<FacingMarker>, Without<ShakeVisual>),
    >,
    mut shakes: Query<
        (&ShakeVisual, &mut Transform),
        (Without<FacingMarker>, Without<GotchiVisual>),
    >,
    mut markers: Query<
        (&Parent, &mut Transform),
        (With<FacingMarker>, Without<GotchiVisual>, Without<ShakeVisual>),
    >,
    parents: Query<&GotchiVisual>,
) {
    let held = active_drag.0.as_ref().map(drag::DragSession::target);
    for (visual, mut transform) in &mut shakes {
        let Some(shake) = board.shake(visual.id) else {
            continue;
        };
        if held == Some(DragTarget::Shake(visual.id)) {
            continue;
        }
        let center = board.space().cell_to_world(shake.pos);
        transform.translation.x = center.x;
        transform.translation.y = center.y;
    }
    for (visual, mut transform, mut sprite) in &mut bodies {
        let Some(gotchi) = board.gotchi(visual.id) else {
            continue;
        };
        if held == Some(DragTarget::Gotchi(visual.id)) {
            continue;
        }
        match gotchi.status {
            Status::Ready | Status::Waiting => {
                let center = board.space().cell_to_world(gotchi.pos);
                transform.translation.x = center.x;
                transform.translation.y = center.y;
                sprite.color = if gotchi.status == Status::Waiting {
                    WAITING_COLOR
                } else {
                    BODY_COLOR
                };
            }
            Status::Chaining | Status::Jumping => {}
        }
    }

    for (parent, mut transform) in &mut markers {
        let Ok(visual) = parents.get(parent.get()) else {
            continue;
        };
        let Some(gotchi) = board.gotchi(visual.id) else {
            continue;
        };
        let offset = facing_offset(gotchi.facing) * CELL_SIZE * 0.28;
        transform.translation.x = offset.x;
        transform.translation.y = offset.y;
    }
}

fn animate_jumps(
    mut commands: Commands,
    time: Res<Time>,
    mut board: ResMut<Board>,
    mut query: Query<(Entity, &GotchiVisual, &mut Transform, &mut Sprite, &mut CongaJump)>,
) {
    for (entity, visual, mut transform, mut sprite, mut jump) in &mut query {
        jump.timer.tick(time.delta());
        let Some(gotchi) = board.gotchi(visual.id) else {
            commands.entity(entity).remove::<CongaJump>();
            continue;
        };
        let center = board.space().cell_to_world(gotchi.pos);
        let lift = JUMP_HEIGHT * (jump.timer.fraction() * core::f32::consts::PI).sin();
        transform.translation.x = center.x;
        transform.translation.y = center.y + lift;
        transform.rotation = Quat::IDENTITY;
        sprite.color = HAPPY_COLOR;

        if jump.timer.finished() {
            sprite.color = BODY_COLOR;
            if let Err(error) = board.end_jump(visual.id) {
                warn!("landing {:?} failed: {error}", visual.id);
            }
            commands.entity(entity).remove::<CongaJump>();
        }
    }
}

fn update_hud(
    score: Res<Score>,
    stats: Res<PlayerStats>,
    mut score_text: Query<&mut Text2d, (With<ScoreText>, Without<BudgetText>)>,
    mut budget_text: Query<&mut Text2d, (With<BudgetText>, Without<ScoreText>)>,
) {
    for mut text in &mut score_text {
        text.0 = format!("Score: {}", score.0);
    }
    let budgets = StatKind::iter()
        .map(|kind| format!("{kind} {}", stats.get(kind)))
        .collect::<Vec<_>>()
        .join("   ");
    for mut text in &mut budget_text {
        text.0 = budgets.clone();
    }
}

fn check_level_clear(
    board: Res<Board>,
    step_state: Res<State<StepState>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if *step_state.get() == StepState::StandBy && board.gotchi_count() == 0 {
        next_state.set(GameState::Result);
    }
}

fn result_enter(mut commands: Commands, asset_server: Res<AssetServer>, score: Res<Score>) {
    commands.spawn((
        Text2d::new(format!("Level clear!\nScore: {}", score.0)),
        TextFont {
            font: asset_server.load(FONT),
            font_size: 36.0,
            ..default()
        },
        TextColor(Color::WHITE),
        TextLayout::new_with_justify(JustifyText::Center),
        Transform::from_xyz(0.0, 0.0, 20.0),
        ResultCountdown {
            timer: Timer::from_seconds(RESULT_SECS, TimerMode::Once),
        },
        LifespanGame,
    ));
}

fn result_countdown(
    time: Res<Time>,
    mut query: Query<&mut ResultCountdown>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    for mut countdown in &mut query {
        countdown.timer.tick(time.delta());
        if countdown.timer.finished() {
            next_state.set(GameState::Welcome);
        }
    }
}
