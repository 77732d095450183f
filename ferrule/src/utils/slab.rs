/// Indexed storage with reusable keys.
///
/// `insert` hands back a small integer key that stays valid until the entry
/// is removed; freed keys are reused by later insertions.
pub(crate) struct Slab<T> {
    entries: Vec<Option<T>>,

    /// Keys of vacant entries.
    free: Vec<usize>,

    len: usize,
}

impl<T> Slab<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores `item` and returns its key.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let key = match self.free.pop() {
            Some(key) => {
                self.entries[key] = Some(item);
                key
            }
            None => {
                self.entries.push(Some(item));
                self.entries.len() - 1
            }
        };

        self.len += 1;
        key
    }

    /// Removes the entry at `key`, if occupied.
    pub(crate) fn remove(&mut self, key: usize) -> Option<T> {
        let item = self.entries.get_mut(key)?.take()?;

        self.free.push(key);
        self.len -= 1;
        Some(item)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Removes every entry, in key order.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let items: Vec<T> = self.entries.drain(..).flatten().collect();

        self.free.clear();
        self.len = 0;
        items
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}
