use std::{collections::HashMap, hash::Hash};

/// Open transactions. A sub transaction hangs off its parent and is closed together with it.
#[derive(Debug, Clone)]
pub struct Forest<Id, T> {
    data: HashMap<Id, T>,
    parents: HashMap<Id, Id>,
    children: HashMap<Id, Vec<Id>>,
}

impl<Id, T> Default for Forest<Id, T> {
    fn default() -> Self {
        Self {
            data: HashMap::default(),
            parents: HashMap::default(),
            children: HashMap::default(),
        }
    }
}

impl<Id: Eq + Hash + Clone, T> Forest<Id, T> {
    /// Removes `id` and everything below it. Data is returned with `id`'s own first.
    pub fn close(&mut self, id: &Id) -> Option<Vec<T>> {
        let root = self.data.remove(id)?;
        if let Some(parent) = self.parents.remove(id) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.retain(|sibling| sibling != id);
            }
        }

        let mut closed = vec![root];
        let mut pending = self.children.remove(id).unwrap_or_default();
        while let Some(child) = pending.pop() {
            self.parents.remove(&child);
            closed.extend(self.data.remove(&child));
            pending.extend(self.children.remove(&child).into_iter().flatten());
        }
        Some(closed)
    }

    pub fn is_open(&self, id: &Id) -> bool {
        self.data.contains_key(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

impl<Id: Eq + Hash + Clone, T: Default> Forest<Id, T> {
    /// Data of `id`, opened if needed. `parent` equals `id` for top level transactions; a parent
    /// that isn't open yet is opened as a root.
    pub fn open(&mut self, id: Id, parent: Id) -> &mut T {
        if id != parent && !self.data.contains_key(&id) {
            if !self.data.contains_key(&parent) {
                self.data.insert(parent.clone(), T::default());
            }
            self.parents.insert(id.clone(), parent.clone());
            self.children.entry(parent).or_default().push(id.clone());
        }
        self.data.entry(id).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_takes_descendants() {
        let mut forest = Forest::<u32, Vec<u8>>::default();
        forest.open(1, 1).push(1);
        forest.open(2, 2).push(2);
        forest.open(3, 1).push(3);
        forest.open(4, 3).push(4);
        assert_eq!(forest.len(), 4);

        let mut closed = forest.close(&1).unwrap();
        assert_eq!(closed[0], vec![1]);
        closed.sort();
        assert_eq!(closed, vec![vec![1], vec![3], vec![4]]);
        assert!(!forest.is_open(&4));
        assert!(forest.is_open(&2));
        assert_eq!(forest.close(&1), None);
    }

    #[test]
    fn test_child_opens_missing_parent() {
        let mut forest = Forest::<u32, Vec<u8>>::default();
        forest.open(2, 1).push(2);
        assert!(forest.is_open(&1));
        assert_eq!(forest.close(&1).unwrap(), vec![vec![], vec![2]]);
        assert_eq!(forest.len(), 0);
    }

    #[test]
    fn test_close_child_only() {
        let mut forest = Forest::<u32, Vec<u8>>::default();
        forest.open(1, 1).push(1);
        forest.open(2, 1).push(2);
        assert_eq!(forest.close(&2).unwrap(), vec![vec![2]]);
        assert_eq!(forest.close(&1).unwrap(), vec![vec![1]]);
        assert_eq!(forest.values().count(), 0);
    }
}
