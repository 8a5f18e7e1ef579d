//! Swept collision detection between moving gatherers and static items.
//!
//! A gatherer travels along a straight segment during one tick. An item is collected
//! when that segment passes within the sum of both radii of the item's center. The
//! detector reports every such contact together with the fraction of the tick at
//! which the gatherer is closest to the item, so callers can resolve contention in
//! the order events actually happened.

use crate::geom::Position;
use crate::EPSILON;

/// Static circular target: a loot item or an office zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Item {
    pub position: Position,
    pub radius: f64,
}

/// Moving circular collector: a dog's sweep for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gatherer {
    pub id: u32,
    pub start: Position,
    pub end: Position,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GatheringEvent {
    pub item_index: usize,
    pub gatherer_index: usize,
    pub sq_distance: f64,
    /// Fraction of the tick, in `[0, 1]`, at which the contact happens.
    pub time: f64,
}

/// Closest approach of a point to a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionResult {
    pub sq_distance: f64,
    pub proj_ratio: f64,
}

impl CollectionResult {
    pub fn is_collected(&self, collect_radius: f64) -> bool {
        self.sq_distance <= collect_radius * collect_radius + EPSILON
    }
}

/// Projects `c` onto segment `a`-`b`, clamping the projection to the segment.
///
/// A zero-length segment projects everything onto `a`.
pub fn try_collect_point(a: Position, b: Position, c: Position) -> CollectionResult {
    let v_x = b.x - a.x;
    let v_y = b.y - a.y;
    let v_len2 = v_x * v_x + v_y * v_y;

    let proj_ratio = if v_len2 == 0.0 {
        0.0
    } else {
        let u_dot_v = (c.x - a.x) * v_x + (c.y - a.y) * v_y;
        (u_dot_v / v_len2).clamp(0.0, 1.0)
    };

    let closest = Position::new(a.x + v_x * proj_ratio, a.y + v_y * proj_ratio);
    CollectionResult {
        sq_distance: closest.sq_distance(&c),
        proj_ratio,
    }
}

/// Finds every gatherer/item contact, ordered by the time it happens.
///
/// Events are emitted gatherer-major, item-minor and then stably sorted by time, so
/// simultaneous contacts keep that emission order.
pub fn find_gather_events(items: &[Item], gatherers: &[Gatherer]) -> Vec<GatheringEvent> {
    let mut events = Vec::new();

    for (gatherer_index, gatherer) in gatherers.iter().enumerate() {
        for (item_index, item) in items.iter().enumerate() {
            let result = try_collect_point(gatherer.start, gatherer.end, item.position);
            if result.is_collected(gatherer.radius + item.radius) {
                events.push(GatheringEvent {
                    item_index,
                    gatherer_index,
                    sq_distance: result.sq_distance,
                    time: result.proj_ratio,
                });
            }
        }
    }

    events.sort_by(|lhs, rhs| lhs.time.total_cmp(&rhs.time));
    events
}
