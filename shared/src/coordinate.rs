//! Grid-discrete positions and the four cardinal movement directions.

use std::ops::{Add, Sub};

/// Integer cell position on the arena grid.
///
/// `x` grows to the right and `y` grows downwards, matching terminal rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two cells
    pub fn distance(&self, other: Coordinate) -> f64 {
        let dx = (other.x - self.x) as f64;
        let dy = (other.y - self.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns the cell one step away in `direction`
    pub fn step(&self, direction: Direction) -> Coordinate {
        *self + direction.unit()
    }
}

impl Add for Coordinate {
    type Output = Coordinate;

    fn add(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Coordinate {
    type Output = Coordinate;

    fn sub(self, rhs: Coordinate) -> Coordinate {
        Coordinate::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Movement and firing direction. `Stop` never changes a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Stop,
}

impl Direction {
    pub const CARDINALS: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit vector for one cell of movement
    pub fn unit(self) -> Coordinate {
        match self {
            Direction::Up => Coordinate::new(0, -1),
            Direction::Down => Coordinate::new(0, 1),
            Direction::Left => Coordinate::new(-1, 0),
            Direction::Right => Coordinate::new(1, 0),
            Direction::Stop => Coordinate::new(0, 0),
        }
    }

    pub fn is_stop(self) -> bool {
        self == Direction::Stop
    }

    /// Direction of a single-cell step from `from` to `to`, if they are
    /// orthogonal neighbours.
    pub fn between(from: Coordinate, to: Coordinate) -> Option<Direction> {
        Direction::CARDINALS
            .into_iter()
            .find(|direction| from.step(*direction) == to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_coordinate_addition() {
        let a = Coordinate::new(2, 3);
        let b = Coordinate::new(-1, 4);
        assert_eq!(a + b, Coordinate::new(1, 7));
        assert_eq!(a - b, Coordinate::new(3, -1));
    }

    #[test]
    fn test_coordinate_distance() {
        let origin = Coordinate::new(0, 0);
        assert_approx_eq!(origin.distance(Coordinate::new(3, 4)), 5.0, 1e-9);
        assert_approx_eq!(origin.distance(origin), 0.0, 1e-9);
        assert_approx_eq!(
            Coordinate::new(1, 1).distance(Coordinate::new(2, 2)),
            std::f64::consts::SQRT_2,
            1e-9
        );
    }

    #[test]
    fn test_direction_units_are_cardinal() {
        for direction in Direction::CARDINALS {
            let unit = direction.unit();
            assert_eq!(unit.x.abs() + unit.y.abs(), 1);
        }
        assert_eq!(Direction::Stop.unit(), Coordinate::new(0, 0));
    }

    #[test]
    fn test_step() {
        let c = Coordinate::new(5, 5);
        assert_eq!(c.step(Direction::Up), Coordinate::new(5, 4));
        assert_eq!(c.step(Direction::Down), Coordinate::new(5, 6));
        assert_eq!(c.step(Direction::Left), Coordinate::new(4, 5));
        assert_eq!(c.step(Direction::Right), Coordinate::new(6, 5));
        assert_eq!(c.step(Direction::Stop), c);
    }

    #[test]
    fn test_direction_between_neighbours() {
        let c = Coordinate::new(1, 1);
        assert_eq!(
            Direction::between(c, Coordinate::new(1, 0)),
            Some(Direction::Up)
        );
        assert_eq!(
            Direction::between(c, Coordinate::new(2, 1)),
            Some(Direction::Right)
        );
        assert_eq!(Direction::between(c, Coordinate::new(2, 2)), None);
        assert_eq!(Direction::between(c, c), None);
    }
}
