//! Road-constrained motion.
//!
//! A dog may stand anywhere inside the corridor of at least one road. Movement that
//! would leave every corridor the dog currently occupies is cut short at the
//! furthest reachable corridor edge and the dog stops there.

use crate::geom::{Bounds, Position, Velocity};
use crate::map::Map;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub position: Position,
    /// Set when the move was clamped; the caller must stop the dog.
    pub obstructed: bool,
}

/// Corridors of every road whose area contains `position`.
pub fn containing_corridors(map: &Map, position: &Position) -> Vec<Bounds> {
    map.roads()
        .iter()
        .map(|road| road.corridor())
        .filter(|corridor| corridor.contains(position))
        .collect()
}

pub fn move_along_roads(map: &Map, from: Position, velocity: Velocity, dt: Duration) -> MoveOutcome {
    let target = from.advanced(velocity, dt);
    let corridors = containing_corridors(map, &from);

    if corridors.iter().any(|corridor| corridor.contains(&target)) {
        return MoveOutcome {
            position: target,
            obstructed: false,
        };
    }

    let mut best = from;
    for corridor in &corridors {
        if !corridor.contains_x(target.x) {
            best.x = nearer_edge(best.x, target.x, corridor.min_x, corridor.max_x);
        }
        if !corridor.contains_y(target.y) {
            best.y = nearer_edge(best.y, target.y, corridor.min_y, corridor.max_y);
        }
    }

    MoveOutcome {
        position: best,
        obstructed: true,
    }
}

/// Picks the corridor edge closest to `target`, keeping `current` unless the edge is
/// strictly closer.
fn nearer_edge(current: f64, target: f64, min: f64, max: f64) -> f64 {
    let edge = if (min - target).abs() < (max - target).abs() {
        min
    } else {
        max
    };
    if (edge - target).abs() < (current - target).abs() {
        edge
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::map::{MapId, Road};
    use assert_approx_eq::assert_approx_eq;

    // An L-shaped network: east along y = 0, then south along x = 10.
    fn l_map() -> Map {
        let mut map = Map::new(MapId::new("l"), "L");
        map.add_road(Road::horizontal(Point::new(0, 0), 10));
        map.add_road(Road::vertical(Point::new(10, 0), 10));
        map
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_free_move_lands_on_target() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(2.0, 0.0), Velocity::new(1.5, 0.0), secs(2.0));
        assert!(!outcome.obstructed);
        assert_approx_eq!(outcome.position.x, 5.0, 1e-12);
        assert_approx_eq!(outcome.position.y, 0.0, 1e-12);
    }

    #[test]
    fn test_move_past_road_end_clamps() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(2.0, 0.0), Velocity::new(-1.0, 0.0), secs(5.0));
        assert!(outcome.obstructed);
        assert_approx_eq!(outcome.position.x, -0.4, 1e-12);
        assert_approx_eq!(outcome.position.y, 0.0, 1e-12);
    }

    #[test]
    fn test_sideways_move_clamps_to_corridor_width() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(5.0, 0.0), Velocity::new(0.0, 1.0), secs(1.0));
        assert!(outcome.obstructed);
        assert_approx_eq!(outcome.position.x, 5.0, 1e-12);
        assert_approx_eq!(outcome.position.y, 0.4, 1e-12);
    }

    #[test]
    fn test_turn_onto_crossing_road() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(10.0, 0.0), Velocity::new(0.0, 1.0), secs(3.0));
        assert!(!outcome.obstructed);
        assert_approx_eq!(outcome.position.y, 3.0, 1e-12);
    }

    #[test]
    fn test_corner_overshoot_stops_at_edge() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(10.0, 0.0), Velocity::new(2.0, 0.0), secs(1.0));
        assert!(outcome.obstructed);
        assert_approx_eq!(outcome.position.x, 10.4, 1e-12);
        assert_approx_eq!(outcome.position.y, 0.0, 1e-12);
    }

    #[test]
    fn test_edge_target_counts_as_inside() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(10.0, 0.0), Velocity::new(0.4, 0.0), secs(1.0));
        assert!(!outcome.obstructed);
        assert_approx_eq!(outcome.position.x, 10.4, 1e-12);
    }

    #[test]
    fn test_stationary_dog_stays_put() {
        let map = l_map();
        let outcome = move_along_roads(&map, Position::new(3.0, 0.2), Velocity::default(), secs(1.0));
        assert!(!outcome.obstructed);
        assert_eq!(outcome.position, Position::new(3.0, 0.2));
    }

    #[test]
    fn test_containing_corridors_at_crossing() {
        let map = l_map();
        assert_eq!(containing_corridors(&map, &Position::new(10.0, 0.0)).len(), 2);
        assert_eq!(containing_corridors(&map, &Position::new(5.0, 0.0)).len(), 1);
        assert!(containing_corridors(&map, &Position::new(5.0, 5.0)).is_empty());
    }
}
