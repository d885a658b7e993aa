/// Keeps only the last `capacity` pushed items
///
/// Once full, each push overwrites the oldest slot (`next % capacity`).
/// Iteration is always oldest to newest.
#[derive(Debug, Clone)]
pub struct RecentRing<T> {
    slots: Vec<T>,
    capacity: usize,
    next: usize,
    total: u64,
}

impl<T> RecentRing<T> {
    /// A zero `capacity` is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            total: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.next] = item;
        }
        self.next = (self.next + 1) % self.capacity;
        self.total = self.total.saturating_add(1);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items ever pushed, including overwritten ones
    pub fn total_pushed(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        // Oldest item sits at `next` once the ring has wrapped.
        let oldest = if self.slots.len() < self.capacity {
            0
        } else {
            self.next
        };
        let (newest, rest) = self.slots.split_at(oldest);
        rest.iter().chain(newest.iter())
    }
}

impl<T> Extend<T> for RecentRing<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

#[cfg(feature = "serde")]
impl<T> ::serde::Serialize for RecentRing<T>
where
    T: ::serde::Serialize,
{
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: ::serde::Serializer,
    {
        s.collect_seq(self.iter())
    }
}
