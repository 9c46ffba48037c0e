//! Static arena layout: walls and spawn points, parsed once and never mutated.

use crate::coordinate::Coordinate;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use thiserror::Error;

const WALL: char = '#';
const SPAWN: char = 'S';

/// Layout used when no custom map is supplied.
const DEFAULT_ARENA: [&str; 21] = [
    "############################################",
    "#S                    ##                  S#",
    "#                     ##                   #",
    "#    ######                      ######    #",
    "#    #                                #    #",
    "#    #          S          S          #    #",
    "#                   ######                 #",
    "#        ##                      ##        #",
    "#        ##                      ##        #",
    "#                                          #",
    "#S   ####        ##########        ####   S#",
    "#                                          #",
    "#        ##                      ##        #",
    "#        ##                      ##        #",
    "#                   ######                 #",
    "#    #          S          S          #    #",
    "#    #                                #    #",
    "#    ######                      ######    #",
    "#                     ##                   #",
    "#S                    ##                  S#",
    "############################################",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("map has no rows")]
    Empty,
    #[error("map row {row} has width {width}, expected {expected}")]
    Ragged {
        row: usize,
        width: usize,
        expected: usize,
    },
    #[error("map has no spawn points")]
    NoSpawnPoints,
}

/// Immutable arena grid.
///
/// Safe to share between threads without locking: nothing mutates a map after
/// [`GameMap::parse`] returns.
#[derive(Debug, Clone)]
pub struct GameMap {
    walls: HashSet<Coordinate>,
    spawn_points: Vec<Coordinate>,
    width: i32,
    height: i32,
}

impl GameMap {
    /// Parses a rectangular ASCII layout. `#` is a wall, `S` a spawn point and
    /// any other character an empty cell. Spawn points keep row-major order.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, MapError> {
        let expected = match rows.first() {
            Some(row) => row.as_ref().chars().count(),
            None => return Err(MapError::Empty),
        };

        let mut walls = HashSet::new();
        let mut spawn_points = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            let width = row.as_ref().chars().count();
            if width != expected {
                return Err(MapError::Ragged {
                    row: y,
                    width,
                    expected,
                });
            }

            for (x, cell) in row.as_ref().chars().enumerate() {
                let position = Coordinate::new(x as i32, y as i32);
                match cell {
                    WALL => {
                        walls.insert(position);
                    }
                    SPAWN => spawn_points.push(position),
                    _ => {}
                }
            }
        }

        if spawn_points.is_empty() {
            return Err(MapError::NoSpawnPoints);
        }

        Ok(Self {
            walls,
            spawn_points,
            width: expected as i32,
            height: rows.len() as i32,
        })
    }

    pub fn default_arena() -> Self {
        Self::parse(&DEFAULT_ARENA).expect("default arena layout is valid")
    }

    pub fn walls(&self) -> &HashSet<Coordinate> {
        &self.walls
    }

    pub fn is_wall(&self, position: Coordinate) -> bool {
        self.walls.contains(&position)
    }

    /// Spawn points in row-major map order. Never empty.
    pub fn spawn_points(&self) -> &[Coordinate] {
        &self.spawn_points
    }

    /// `(width, height)` in cells
    pub fn dimensions(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn contains(&self, position: Coordinate) -> bool {
        position.x >= 0 && position.y >= 0 && position.x < self.width && position.y < self.height
    }

    /// A cell nothing may enter: a wall or anything outside the grid.
    pub fn is_blocked(&self, position: Coordinate) -> bool {
        !self.contains(position) || self.is_wall(position)
    }

    /// Uniformly random spawn point, used when a player joins.
    pub fn random_spawn_point(&self) -> Coordinate {
        self.spawn_points
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or_default()
    }

    /// The spawn point with the greatest distance from `from`.
    pub fn furthest_spawn_point(&self, from: Coordinate) -> Coordinate {
        let mut best = self.spawn_points[0];
        for candidate in &self.spawn_points[1..] {
            if candidate.distance(from) > best.distance(from) {
                best = *candidate;
            }
        }
        best
    }
}
