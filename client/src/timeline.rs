//! Newest-first sequences mixing in-flight creations with server entities.

use redline_shared::{Comment, Correction, Post};

/// Server identity of an entity.
pub trait Keyed {
    fn key(&self) -> i64;
}

impl Keyed for Post {
    fn key(&self) -> i64 {
        self.id
    }
}

impl Keyed for Comment {
    fn key(&self) -> i64 {
        self.id
    }
}

impl Keyed for Correction {
    fn key(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T, D> {
    /// Issued, waiting for the server.
    Pending { ticket: u64, draft: D },
    /// Canonical server entity. `ticket` is set when it was created locally
    /// and has not yet been seen in a full load.
    Confirmed { ticket: Option<u64>, item: T },
}

#[derive(Debug, Clone)]
pub struct Timeline<T, D> {
    entries: Vec<Entry<T, D>>,
}

impl<T, D> Default for Timeline<T, D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: Keyed + Clone, D> Timeline<T, D> {
    /// Record a request that was just issued. Tickets grow with issue order,
    /// so the newest request is always in front.
    pub fn begin(&mut self, ticket: u64, draft: D) {
        self.entries.insert(0, Entry::Pending { ticket, draft });
    }

    /// Swap the pending entry for the server's entity, keeping its position.
    pub fn confirm(&mut self, ticket: u64, item: T) {
        let key = item.key();
        self.entries.retain(|e| match e {
            Entry::Confirmed { item, .. } => item.key() != key,
            Entry::Pending { .. } => true,
        });

        let slot = self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Pending { ticket: t, .. } if *t == ticket));
        let confirmed = Entry::Confirmed {
            ticket: Some(ticket),
            item,
        };
        match slot {
            Some(index) => self.entries[index] = confirmed,
            None => self.entries.insert(0, confirmed),
        }
    }

    /// Drop a pending entry whose request failed.
    pub fn abandon(&mut self, ticket: u64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e, Entry::Pending { ticket: t, .. } if *t == ticket));
        self.entries.len() != before
    }

    /// Install a freshly loaded list. In-flight entries and local creations
    /// the load did not include yet stay in front.
    pub fn replace_confirmed(&mut self, items: Vec<T>) {
        let loaded: Vec<i64> = items.iter().map(Keyed::key).collect();
        self.entries.retain(|e| match e {
            Entry::Pending { .. } => true,
            Entry::Confirmed {
                ticket: Some(_),
                item,
            } => !loaded.contains(&item.key()),
            Entry::Confirmed { ticket: None, .. } => false,
        });
        self.entries.extend(
            items
                .into_iter()
                .map(|item| Entry::Confirmed { ticket: None, item }),
        );
    }

    /// Patch one confirmed entity. Returns false if it is not here.
    pub fn update(&mut self, key: i64, f: impl FnOnce(&mut T)) -> bool {
        for entry in &mut self.entries {
            if let Entry::Confirmed { item, .. } = entry {
                if item.key() == key {
                    f(item);
                    return true;
                }
            }
        }
        false
    }

    pub fn get(&self, key: i64) -> Option<&T> {
        self.entries.iter().find_map(|e| match e {
            Entry::Confirmed { item, .. } if item.key() == key => Some(item),
            _ => None,
        })
    }

    /// Confirmed entities, newest first.
    pub fn items(&self) -> Vec<T> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                Entry::Confirmed { item, .. } => Some(item.clone()),
                Entry::Pending { .. } => None,
            })
            .collect()
    }

    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, Entry::Pending { .. }))
            .count()
    }

    pub fn entries(&self) -> &[Entry<T, D>] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64, &'static str);

    impl Keyed for Item {
        fn key(&self) -> i64 {
            self.0
        }
    }

    fn keys(timeline: &Timeline<Item, &'static str>) -> Vec<i64> {
        timeline.items().iter().map(|i| i.0).collect()
    }

    #[test]
    fn out_of_order_confirmation_keeps_issue_order() {
        let mut timeline: Timeline<Item, &str> = Timeline::default();
        timeline.replace_confirmed(vec![Item(1, "old")]);
        timeline.begin(1, "first");
        timeline.begin(2, "second");

        // The second request's response arrives first.
        timeline.confirm(2, Item(10, "second"));
        timeline.confirm(1, Item(11, "first"));

        assert_eq!(keys(&timeline), vec![10, 11, 1]);
        assert_eq!(timeline.pending(), 0);
    }

    #[test]
    fn abandon_restores_previous_state() {
        let mut timeline: Timeline<Item, &str> = Timeline::default();
        timeline.replace_confirmed(vec![Item(1, "old")]);
        let before = timeline.entries().to_vec();

        timeline.begin(7, "doomed");
        assert!(timeline.abandon(7));
        assert_eq!(timeline.entries(), before.as_slice());
        assert!(!timeline.abandon(7));
    }

    #[test]
    fn reload_keeps_in_flight_and_unseen_local_entries() {
        let mut timeline: Timeline<Item, &str> = Timeline::default();
        timeline.replace_confirmed(vec![Item(1, "old")]);
        timeline.begin(1, "local");
        timeline.confirm(1, Item(5, "local"));
        timeline.begin(2, "in flight");

        // A load issued before item 5 existed.
        timeline.replace_confirmed(vec![Item(2, "other"), Item(1, "old")]);
        assert_eq!(timeline.pending(), 1);
        assert_eq!(keys(&timeline), vec![5, 2, 1]);

        // Once a load includes it, the server's copy wins.
        timeline.replace_confirmed(vec![Item(5, "local"), Item(2, "other"), Item(1, "old")]);
        assert_eq!(keys(&timeline), vec![5, 2, 1]);
        assert!(matches!(
            timeline.entries()[1],
            Entry::Confirmed { ticket: None, .. }
        ));
    }

    #[test]
    fn confirm_replaces_a_copy_already_loaded() {
        let mut timeline: Timeline<Item, &str> = Timeline::default();
        timeline.begin(3, "racing");
        timeline.replace_confirmed(vec![Item(9, "racing")]);
        timeline.confirm(3, Item(9, "racing"));
        assert_eq!(keys(&timeline), vec![9]);
    }

    #[test]
    fn update_touches_only_the_target() {
        let mut timeline: Timeline<Item, &str> = Timeline::default();
        timeline.replace_confirmed(vec![Item(1, "a"), Item(2, "b")]);
        assert!(timeline.update(2, |i| i.1 = "patched"));
        assert!(!timeline.update(3, |i| i.1 = "nope"));
        assert_eq!(timeline.get(2), Some(&Item(2, "patched")));
        assert_eq!(timeline.get(1), Some(&Item(1, "a")));
    }
}
