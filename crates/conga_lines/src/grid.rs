use bevy::prelude::*;

/// A cell on the level grid. Row 0 is the top row, column 0 the left column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub row: usize,
    pub col: usize,
}

impl GridPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// The four facings a gotchi can take. The declaration order doubles as the
/// follower slot order used when walking a conga chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Down,
    Left,
    Up,
    Right,
}

impl Direction {
    /// Fixed slot order: down, left, up, right.
    pub const ALL: [Self; 4] = [Self::Down, Self::Left, Self::Up, Self::Right];

    pub const fn slot(self) -> usize {
        match self {
            Self::Down => 0,
            Self::Left => 1,
            Self::Up => 2,
            Self::Right => 3,
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Down => Self::Up,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Right => Self::Left,
        }
    }

    /// Row/column offset of the adjacent cell in this direction.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Down => (1, 0),
            Self::Left => (0, -1),
            Self::Up => (-1, 0),
            Self::Right => (0, 1),
        }
    }

    pub const fn rotated_cw(self) -> Self {
        match self {
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            Self::Left => Self::Up,
        }
    }

    pub const fn rotated_acw(self) -> Self {
        match self {
            Self::Up => Self::Left,
            Self::Left => Self::Down,
            Self::Down => Self::Right,
            Self::Right => Self::Up,
        }
    }

    /// Direction from one cell toward an adjacent one, `None` when the two
    /// cells are not orthogonal neighbors.
    pub fn between(from: GridPos, to: GridPos) -> Option<Self> {
        let drow = to.row as i32 - from.row as i32;
        let dcol = to.col as i32 - from.col as i32;
        Self::ALL.into_iter().find(|d| d.delta() == (drow, dcol))
    }

    pub fn random() -> Self {
        match fastrand::usize(0..4) {
            0 => Self::Down,
            1 => Self::Left,
            2 => Self::Up,
            _ => Self::Right,
        }
    }
}

/// Pure cell/world coordinate math for one level. Row 0 sits at the top of
/// the play field, so world y decreases as rows grow.
#[derive(Clone, Copy, Debug)]
pub struct GridSpace {
    rows: usize,
    cols: usize,
    cell_size: f32,
    origin: Vec2,
}

impl GridSpace {
    /// `origin` is the world position of the center of cell (0, 0).
    pub const fn new(rows: usize, cols: usize, cell_size: f32, origin: Vec2) -> Self {
        Self {
            rows,
            cols,
            cell_size,
            origin,
        }
    }

    /// A grid centered on the world origin.
    pub fn centered(rows: usize, cols: usize, cell_size: f32) -> Self {
        let origin = Vec2::new(
            -((cols as f32 - 1.0) * 0.5) * cell_size,
            ((rows as f32 - 1.0) * 0.5) * cell_size,
        );
        Self::new(rows, cols, cell_size, origin)
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn cols(&self) -> usize {
        self.cols
    }

    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub const fn contains(&self, pos: GridPos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// The adjacent cell in `dir`, `None` past a grid edge.
    pub fn neighbor(&self, pos: GridPos, dir: Direction) -> Option<GridPos> {
        let (drow, dcol) = dir.delta();
        let row = pos.row as i32 + drow;
        let col = pos.col as i32 + dcol;
        if row < 0 || col < 0 {
            return None;
        }
        let next = GridPos::new(row as usize, col as usize);
        self.contains(next).then_some(next)
    }

    pub fn cell_to_world(&self, pos: GridPos) -> Vec2 {
        Vec2::new(
            (pos.col as f32).mul_add(self.cell_size, self.origin.x),
            (pos.row as f32).mul_add(-self.cell_size, self.origin.y),
        )
    }

    /// The cell whose center is nearest to a world position, `None` when the
    /// position falls outside the grid.
    pub fn world_to_cell(&self, world: Vec2) -> Option<GridPos> {
        let col = ((world.x - self.origin.x) / self.cell_size).round() as i32;
        let row = ((self.origin.y - world.y) / self.cell_size).round() as i32;
        if row < 0 || col < 0 {
            return None;
        }
        let pos = GridPos::new(row as usize, col as usize);
        self.contains(pos).then_some(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> GridSpace {
        GridSpace::new(4, 3, 10.0, Vec2::new(0.0, 0.0))
    }

    #[test]
    fn opposite_pairs() {
        assert_eq!(Direction::Down.opposite(), Direction::Up);
        assert_eq!(Direction::Up.opposite(), Direction::Down);
        assert_eq!(Direction::Left.opposite(), Direction::Right);
        assert_eq!(Direction::Right.opposite(), Direction::Left);
    }

    #[test]
    fn rotation_cycles() {
        let mut dir = Direction::Up;
        for _ in 0..4 {
            dir = dir.rotated_cw();
        }
        assert_eq!(dir, Direction::Up, "four cw turns return to start");
        assert_eq!(
            Direction::Up.rotated_cw().rotated_acw(),
            Direction::Up,
            "acw undoes cw"
        );
    }

    #[test]
    fn between_neighbors() {
        let mid = GridPos::new(1, 1);
        assert_eq!(
            Direction::between(mid, GridPos::new(0, 1)),
            Some(Direction::Up)
        );
        assert_eq!(
            Direction::between(mid, GridPos::new(1, 2)),
            Some(Direction::Right)
        );
        assert_eq!(Direction::between(mid, GridPos::new(3, 1)), None);
        assert_eq!(Direction::between(mid, mid), None);
    }

    #[test]
    fn neighbor_rejects_edges() {
        let space = space();
        assert_eq!(
            space.neighbor(GridPos::new(0, 0), Direction::Up),
            None,
            "no cell above the top row"
        );
        assert_eq!(
            space.neighbor(GridPos::new(0, 0), Direction::Left),
            None,
            "no cell left of column zero"
        );
        assert_eq!(
            space.neighbor(GridPos::new(3, 2), Direction::Down),
            None,
            "no cell below the last row"
        );
        assert_eq!(
            space.neighbor(GridPos::new(1, 1), Direction::Down),
            Some(GridPos::new(2, 1))
        );
    }

    #[test]
    fn world_round_trip() {
        let space = space();
        for row in 0..4 {
            for col in 0..3 {
                let pos = GridPos::new(row, col);
                let world = space.cell_to_world(pos);
                assert_eq!(space.world_to_cell(world), Some(pos));
            }
        }
    }

    #[test]
    fn world_to_cell_outside_grid() {
        let space = space();
        assert_eq!(space.world_to_cell(Vec2::new(-8.0, 0.0)), None);
        assert_eq!(space.world_to_cell(Vec2::new(0.0, 8.0)), None);
        assert_eq!(space.world_to_cell(Vec2::new(100.0, -100.0)), None);
    }

    #[test]
    fn rounding_matches_nearest_center() {
        let space = space();
        // 4.9 is still nearest to column 0, 5.1 tips over to column 1.
        assert_eq!(
            space.world_to_cell(Vec2::new(4.9, 0.0)),
            Some(GridPos::new(0, 0))
        );
        assert_eq!(
            space.world_to_cell(Vec2::new(5.1, 0.0)),
            Some(GridPos::new(0, 1))
        );
    }
}
