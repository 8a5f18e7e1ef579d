use crate::collision::{find_gather_events, Gatherer, Item};
use crate::dog::{BagItem, DogId};
use crate::game::Game;
use crate::movement::move_along_roads;
use crate::session::{GameSession, Retirement};
use crate::{DOG_RADIUS, LOOT_RADIUS, OFFICE_RADIUS};
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Advances every session by `delta` and returns the dogs retired during the step.
pub fn tick(game: &mut Game, delta: Duration) -> Vec<Retirement> {
    game.sessions_mut()
        .iter_mut()
        .flat_map(|session| tick_session(session, delta))
        .collect()
}

/// One simulation step of a single session.
///
/// Loot spawns first, then every dog moves and its sweep is checked against the
/// loot (indices below the loot count) followed by the offices. Contacts are
/// applied in the order they happen: each loot item goes to the first dog with
/// room in its bag, and an office contact empties the bag into the score.
/// Inactivity is evaluated last, after movement has stopped any blocked dog.
pub fn tick_session(session: &mut GameSession, delta: Duration) -> Vec<Retirement> {
    let map = Arc::clone(session.map());
    session.generate_new_loot(delta, map.item_type_count());

    let gatherers = move_dogs(session, delta);

    let loot_count = session.loot().len();
    let items: Vec<Item> = session
        .loot()
        .iter()
        .map(|loot| Item {
            position: loot.position,
            radius: LOOT_RADIUS,
        })
        .chain(map.offices().iter().map(|office| Item {
            position: office.position.into(),
            radius: OFFICE_RADIUS,
        }))
        .collect();

    let mut collected = BTreeSet::new();
    for event in find_gather_events(&items, &gatherers) {
        let dog_id = gatherers[event.gatherer_index].id;

        if event.item_index >= loot_count {
            session.exchange_item_for_score(dog_id);
            continue;
        }
        if collected.contains(&event.item_index) {
            continue;
        }

        let loot = session.loot()[event.item_index];
        let Some(dog) = session.dog_mut(dog_id) else {
            continue;
        };
        if dog.put_in_bag(BagItem {
            id: loot.id,
            item_type: loot.item_type,
        }) {
            debug!("Dog {} picked up loot {}", dog_id, loot.id);
            collected.insert(event.item_index);
        }
    }
    session.remove_collected_items(&collected);

    let retiring: Vec<(DogId, Duration)> = session
        .dogs_mut()
        .filter_map(|dog| {
            dog.advance_inactivity(delta)
                .map(|play_time| (dog.id(), play_time))
        })
        .collect();

    retiring
        .into_iter()
        .filter_map(|(dog_id, play_time)| session.delete_dog(dog_id, play_time))
        .collect()
}

fn move_dogs(session: &mut GameSession, delta: Duration) -> Vec<Gatherer> {
    let map = Arc::clone(session.map());
    session
        .dogs_mut()
        .map(|dog| {
            let start = dog.position();
            let outcome = move_along_roads(&map, start, dog.velocity(), delta);
            dog.set_position(outcome.position);
            if outcome.obstructed {
                dog.stop();
            }
            Gatherer {
                id: dog.id(),
                start,
                end: outcome.position,
                radius: DOG_RADIUS,
            }
        })
        .collect()
}
