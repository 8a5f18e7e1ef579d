use crate::dog::{BagItem, Direction, Dog, DogId};
use crate::geom::Position;
use crate::loot_gen::{LootGenConfig, LootGenerator};
use crate::map::{Map, MapId};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type LootId = u32;

/// A collectible lying on a road.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LootItem {
    pub id: LootId,
    pub item_type: usize,
    pub position: Position,
}

/// Summary of a dog removed for inactivity, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Retirement {
    pub dog_id: DogId,
    pub map_id: MapId,
    pub name: String,
    pub score: u32,
    pub play_time: Duration,
}

/// Settings every session of a game shares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub loot_gen: LootGenConfig,
    pub retirement_after: Duration,
    pub randomize_spawn: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("dog {0} already exists in session")]
    DuplicateDog(DogId),
    #[error("dog {dog_id} carries {carried} items but bag capacity is {capacity}")]
    BagOverflow {
        dog_id: DogId,
        carried: usize,
        capacity: usize,
    },
    #[error("loot {0} already exists in session")]
    DuplicateLoot(LootId),
    #[error("id {0} leaves no room for further ids")]
    IdExhausted(u32),
}

/// Persisted state of a dog being put back into a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredDog {
    pub id: DogId,
    pub name: String,
    pub position: Position,
    pub speed: f64,
    pub direction: Direction,
    pub score: u32,
    pub bag: Vec<BagItem>,
}

/// Live state of a single map: its dogs, the loot lying around and id counters.
#[derive(Debug)]
pub struct GameSession {
    map: Arc<Map>,
    dogs: BTreeMap<DogId, Dog>,
    loot: Vec<LootItem>,
    loot_gen: LootGenerator,
    next_dog_id: DogId,
    next_loot_id: LootId,
    retirement_after: Duration,
    randomize_spawn: bool,
    rng: StdRng,
}

impl GameSession {
    pub fn new(map: Arc<Map>, config: &SessionConfig) -> Self {
        Self {
            map,
            dogs: BTreeMap::new(),
            loot: Vec::new(),
            loot_gen: LootGenerator::new(config.loot_gen),
            next_dog_id: 0,
            next_loot_id: 0,
            retirement_after: config.retirement_after,
            randomize_spawn: config.randomize_spawn,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the session RNG with a seeded one for reproducible placement.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_loot_generator(mut self, loot_gen: LootGenerator) -> Self {
        self.loot_gen = loot_gen;
        self
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn map_id(&self) -> &MapId {
        self.map.id()
    }

    pub fn dogs(&self) -> &BTreeMap<DogId, Dog> {
        &self.dogs
    }

    pub fn dogs_mut(&mut self) -> impl Iterator<Item = &mut Dog> {
        self.dogs.values_mut()
    }

    pub fn dog(&self, id: DogId) -> Option<&Dog> {
        self.dogs.get(&id)
    }

    pub fn dog_mut(&mut self, id: DogId) -> Option<&mut Dog> {
        self.dogs.get_mut(&id)
    }

    pub fn loot(&self) -> &[LootItem] {
        &self.loot
    }

    pub fn next_dog_id(&self) -> DogId {
        self.next_dog_id
    }

    pub fn next_loot_id(&self) -> LootId {
        self.next_loot_id
    }

    /// Creates a dog with the map's speed and bag capacity and returns its id.
    pub fn add_dog(&mut self, name: &str) -> DogId {
        let position = if self.randomize_spawn {
            self.random_road_position()
        } else {
            self.map
                .roads()
                .first()
                .map(|road| Position::from(road.start()))
                .unwrap_or_default()
        };

        let id = self.next_dog_id;
        self.next_dog_id += 1;

        let dog = Dog::new(
            id,
            name,
            position,
            self.map.dog_speed(),
            self.map.bag_capacity(),
            self.retirement_after,
        );
        info!(
            "Dog {} ({}) joined map {} at ({:.2}, {:.2})",
            id,
            name,
            self.map.id(),
            position.x,
            position.y
        );
        self.dogs.insert(id, dog);
        id
    }

    /// Puts a previously saved dog back, keeping its id and stopping it.
    ///
    /// The bag capacity comes from the current map, so a bag saved under a larger
    /// capacity is rejected rather than silently truncated.
    pub fn restore_dog(&mut self, restored: RestoredDog) -> Result<(), SessionError> {
        if self.dogs.contains_key(&restored.id) {
            return Err(SessionError::DuplicateDog(restored.id));
        }
        let next_id = restored
            .id
            .checked_add(1)
            .ok_or(SessionError::IdExhausted(restored.id))?;
        let capacity = self.map.bag_capacity();
        if restored.bag.len() > capacity {
            return Err(SessionError::BagOverflow {
                dog_id: restored.id,
                carried: restored.bag.len(),
                capacity,
            });
        }

        let mut dog = Dog::new(
            restored.id,
            restored.name,
            restored.position,
            restored.speed,
            capacity,
            self.retirement_after,
        );
        dog.set_direction(restored.direction);
        dog.add_score(restored.score);
        for item in restored.bag {
            dog.put_in_bag(item);
        }

        self.next_dog_id = self.next_dog_id.max(next_id);
        self.dogs.insert(restored.id, dog);
        Ok(())
    }

    pub fn restore_loot(&mut self, item: LootItem) -> Result<(), SessionError> {
        if self.loot.iter().any(|l| l.id == item.id) {
            return Err(SessionError::DuplicateLoot(item.id));
        }
        let next_id = item
            .id
            .checked_add(1)
            .ok_or(SessionError::IdExhausted(item.id))?;
        self.next_loot_id = self.next_loot_id.max(next_id);
        self.loot.push(item);
        Ok(())
    }

    /// Spawns loot for the elapsed `interval` and returns how many items appeared.
    pub fn generate_new_loot(&mut self, interval: Duration, item_type_count: usize) -> usize {
        let count = self
            .loot_gen
            .generate(interval, self.loot.len(), self.dogs.len());
        if count == 0 || item_type_count == 0 {
            return 0;
        }

        for _ in 0..count {
            let position = self.random_road_position();
            let item_type = self.rng.gen_range(0..item_type_count);
            let id = self.next_loot_id;
            self.next_loot_id += 1;
            self.loot.push(LootItem {
                id,
                item_type,
                position,
            });
        }
        debug!("Spawned {} loot items on map {}", count, self.map.id());
        count
    }

    /// Converts the dog's bag into score. Returns the score gained, or `None` for an
    /// unknown dog.
    pub fn exchange_item_for_score(&mut self, dog_id: DogId) -> Option<u32> {
        let map = &self.map;
        let dog = self.dogs.get_mut(&dog_id)?;
        let gained = dog
            .take_bag()
            .iter()
            .map(|item| map.loot_value(item.item_type))
            .fold(0u32, u32::saturating_add);
        dog.add_score(gained);
        Some(gained)
    }

    /// Removes loot by index. Indices are applied from the highest down so earlier
    /// removals never shift later ones.
    pub fn remove_collected_items(&mut self, indices: &BTreeSet<usize>) {
        for &index in indices.iter().rev() {
            if index < self.loot.len() {
                self.loot.remove(index);
            }
        }
    }

    /// Removes a dog and returns the summary to persist.
    pub fn delete_dog(&mut self, dog_id: DogId, play_time: Duration) -> Option<Retirement> {
        let dog = self.dogs.remove(&dog_id)?;
        info!(
            "Dog {} ({}) retired from map {} with score {}",
            dog_id,
            dog.name(),
            self.map.id(),
            dog.score()
        );
        Some(Retirement {
            dog_id,
            map_id: self.map.id().clone(),
            name: dog.name().to_string(),
            score: dog.score(),
            play_time,
        })
    }

    fn random_road_position(&mut self) -> Position {
        let roads = self.map.roads();
        if roads.is_empty() {
            return Position::default();
        }
        let road = roads[self.rng.gen_range(0..roads.len())];
        let (start, end) = (road.start(), road.end());
        let x = self
            .rng
            .gen_range(f64::from(start.x.min(end.x))..=f64::from(start.x.max(end.x)));
        let y = self
            .rng
            .gen_range(f64::from(start.y.min(end.y))..=f64::from(start.y.max(end.y)));
        Position::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Road;
    use crate::geom::Point;

    fn test_map() -> Arc<Map> {
        let mut map = Map::new(MapId::new("1"), "test");
        map.add_road(Road::horizontal(Point::new(0, 0), 20));
        map.add_loot_value(10);
        map.add_loot_value(20);
        map.set_bag_capacity(2);
        Arc::new(map)
    }

    fn config(randomize_spawn: bool) -> SessionConfig {
        SessionConfig {
            loot_gen: LootGenConfig {
                period: Duration::from_millis(500),
                probability: 1.0,
            },
            retirement_after: Duration::from_secs(60),
            randomize_spawn,
        }
    }

    fn session() -> GameSession {
        GameSession::new(test_map(), &config(false)).with_seed(7)
    }

    #[test]
    fn test_no_dogs_no_loot() {
        let mut session = session();
        assert!(session.loot().is_empty());
        assert_eq!(session.generate_new_loot(Duration::from_secs(1), 4), 0);
        assert_eq!(session.generate_new_loot(Duration::from_secs(100), 4), 0);
        assert!(session.loot().is_empty());
    }

    #[test]
    fn test_one_dog_one_loot() {
        let mut session = session();
        session.add_dog("dog1");
        session.generate_new_loot(Duration::from_secs(1), 4);
        assert_eq!(session.loot().len(), 1);
    }

    #[test]
    fn test_loot_count_matches_dogs() {
        let mut session = session();
        for i in 0..10 {
            session.add_dog(&i.to_string());
        }
        session.generate_new_loot(Duration::from_secs(1), 4);
        assert_eq!(session.loot().len(), session.dogs().len());
    }

    #[test]
    fn test_loot_ids_increase_and_types_in_range() {
        let mut session = session();
        for i in 0..10 {
            session.add_dog(&i.to_string());
        }
        session.generate_new_loot(Duration::from_secs(1), 4);

        let loot = session.loot();
        for pair in loot.windows(2) {
            assert_eq!(pair[1].id, pair[0].id + 1);
        }
        assert!(loot.iter().all(|l| l.item_type < 4));
        assert!(loot
            .iter()
            .all(|l| (0.0..=20.0).contains(&l.position.x) && l.position.y == 0.0));
        assert_eq!(session.next_loot_id(), 10);
    }

    #[test]
    fn test_add_dog_uses_map_defaults() {
        let mut session = session();
        let id = session.add_dog("Rex");
        let dog = session.dog(id).unwrap();
        assert_eq!(dog.position(), Position::new(0.0, 0.0));
        assert_eq!(dog.bag_capacity(), 2);
        assert_eq!(dog.speed(), 1.0);
    }

    #[test]
    fn test_dog_ids_never_reused() {
        let mut session = session();
        let first = session.add_dog("a");
        session.delete_dog(first, Duration::ZERO);
        let second = session.add_dog("b");
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }

    #[test]
    fn test_random_spawn_stays_on_road() {
        let mut session = GameSession::new(test_map(), &config(true)).with_seed(3);
        for i in 0..20 {
            let id = session.add_dog(&format!("dog{}", i));
            let pos = session.dog(id).unwrap().position();
            assert!((0.0..=20.0).contains(&pos.x));
            assert_eq!(pos.y, 0.0);
        }
    }

    #[test]
    fn test_exchange_item_for_score() {
        let mut session = session();
        let id = session.add_dog("Rex");
        {
            let dog = session.dog_mut(id).unwrap();
            dog.put_in_bag(BagItem { id: 0, item_type: 0 });
            dog.put_in_bag(BagItem { id: 1, item_type: 1 });
        }
        assert_eq!(session.exchange_item_for_score(id), Some(30));
        let dog = session.dog(id).unwrap();
        assert_eq!(dog.score(), 30);
        assert!(dog.bag().is_empty());

        assert_eq!(session.exchange_item_for_score(id), Some(0));
        assert_eq!(session.dog(id).unwrap().score(), 30);
        assert_eq!(session.exchange_item_for_score(42), None);
    }

    #[test]
    fn test_remove_collected_items_by_index() {
        let mut session = session();
        for id in 0..5 {
            session
                .restore_loot(LootItem {
                    id,
                    item_type: 0,
                    position: Position::new(id as f64, 0.0),
                })
                .unwrap();
        }
        session.remove_collected_items(&BTreeSet::from([0, 2, 4]));
        let ids: Vec<LootId> = session.loot().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_delete_dog_returns_summary() {
        let mut session = session();
        let id = session.add_dog("Rex");
        session.dog_mut(id).unwrap().add_score(15);

        let retirement = session.delete_dog(id, Duration::from_millis(1500)).unwrap();

        assert_eq!(retirement.name, "Rex");
        assert_eq!(retirement.score, 15);
        assert_eq!(retirement.play_time, Duration::from_millis(1500));
        assert_eq!(retirement.map_id, MapId::new("1"));
        assert!(session.dog(id).is_none());
        assert!(session.delete_dog(id, Duration::ZERO).is_none());
    }

    #[test]
    fn test_restore_dog_advances_counter() {
        let mut session = session();
        session
            .restore_dog(RestoredDog {
                id: 7,
                name: "Old".to_string(),
                position: Position::new(3.0, 0.0),
                speed: 2.5,
                direction: Direction::West,
                score: 40,
                bag: vec![BagItem { id: 1, item_type: 1 }],
            })
            .unwrap();

        let dog = session.dog(7).unwrap();
        assert_eq!(dog.direction(), Direction::West);
        assert!(dog.is_stopped());
        assert_eq!(dog.score(), 40);
        assert_eq!(dog.bag().len(), 1);
        assert_eq!(session.next_dog_id(), 8);
        assert_eq!(session.add_dog("New"), 8);
    }

    #[test]
    fn test_restore_rejects_last_possible_id() {
        let mut session = session();
        let err = session
            .restore_dog(RestoredDog {
                id: DogId::MAX,
                name: "Last".to_string(),
                position: Position::default(),
                speed: 1.0,
                direction: Direction::North,
                score: 0,
                bag: Vec::new(),
            })
            .unwrap_err();
        assert_eq!(err, SessionError::IdExhausted(DogId::MAX));
        assert!(session.dogs().is_empty());
        assert_eq!(session.next_dog_id(), 0);

        let err = session
            .restore_loot(LootItem {
                id: LootId::MAX,
                item_type: 0,
                position: Position::default(),
            })
            .unwrap_err();
        assert_eq!(err, SessionError::IdExhausted(LootId::MAX));
        assert!(session.loot().is_empty());
        assert_eq!(session.next_loot_id(), 0);
    }

    #[test]
    fn test_injected_random_source_suppresses_loot() {
        let generator = LootGenerator::with_random(config(false).loot_gen, Box::new(|| 0.0));
        let mut session = session().with_loot_generator(generator);
        session.add_dog("Rex");
        session.add_dog("Fido");

        assert_eq!(session.generate_new_loot(Duration::from_secs(10), 2), 0);
        assert!(session.loot().is_empty());

        let generator = LootGenerator::with_random(config(false).loot_gen, Box::new(|| 0.5));
        let mut session = session.with_loot_generator(generator);
        // A shortage of 2 scaled by 0.5 is one item.
        assert_eq!(session.generate_new_loot(Duration::from_secs(10), 2), 1);
    }

    #[test]
    fn test_restore_dog_rejects_bag_overflow() {
        let mut session = session();
        let err = session
            .restore_dog(RestoredDog {
                id: 0,
                name: "Heavy".to_string(),
                position: Position::default(),
                speed: 1.0,
                direction: Direction::North,
                score: 0,
                bag: (0..3).map(|id| BagItem { id, item_type: 0 }).collect(),
            })
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::BagOverflow {
                dog_id: 0,
                carried: 3,
                capacity: 2
            }
        );
        assert!(session.dogs().is_empty());
    }

    #[test]
    fn test_restore_loot_advances_counter() {
        let mut session = session();
        session
            .restore_loot(LootItem {
                id: 9,
                item_type: 1,
                position: Position::new(1.0, 0.0),
            })
            .unwrap();
        assert_eq!(session.next_loot_id(), 10);
        assert!(session
            .restore_loot(LootItem {
                id: 9,
                item_type: 0,
                position: Position::default(),
            })
            .is_err());
    }
}
