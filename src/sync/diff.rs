use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Point-in-time mapping of namespaced keys to values
pub type Snapshot = BTreeMap<String, String>;

/// Changes leading from one snapshot to another
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Keys to write, with the value they must end up holding
    pub puts: Snapshot,
    /// Keys to remove; never overlaps `puts`
    pub deletes: BTreeSet<String>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.puts.len() + self.deletes.len()
    }

    /// Applies puts then deletes on a copy of `previous`
    pub fn apply(
        &self,
        previous: &Snapshot,
    ) -> Snapshot {
        let mut next = previous.clone();
        for (key, value) in &self.puts {
            next.insert(key.clone(), value.clone());
        }
        for key in &self.deletes {
            next.remove(key);
        }
        next
    }
}

/// Computes the changes turning `previous` into `current`.
///
/// Every entry of `previous` that is not present unchanged in `current` is a delete
/// candidate. A candidate that is also a put target (its value changed) resolves to
/// the put alone, so one key never yields both events in the same cycle.
pub fn diff(
    previous: &Snapshot,
    current: &Snapshot,
) -> Diff {
    let puts: Snapshot = current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let deletes = previous
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(*value))
        .map(|(key, _)| key)
        .filter(|key| !puts.contains_key(*key))
        .cloned()
        .collect();

    Diff { puts, deletes }
}
