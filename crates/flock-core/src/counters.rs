use std::ops;

/// Running totals of store mutations within one run
///
/// Store operations return a delta; the caller folds it in with `+=`.
/// Addition saturates, so totals never go backwards.
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub inserted: u64,
    pub updated: u64,
    pub removed: u64,
    pub history_inserted: u64,
}

impl RunCounters {
    pub fn inserted(n: u64) -> Self {
        Self {
            inserted: n,
            ..Self::default()
        }
    }

    pub fn updated(n: u64) -> Self {
        Self {
            updated: n,
            ..Self::default()
        }
    }

    /// Rows moved from the live table into history
    pub fn archived(n: u64) -> Self {
        Self {
            removed: n,
            history_inserted: n,
            ..Self::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl ops::AddAssign for RunCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted = self.inserted.saturating_add(rhs.inserted);
        self.updated = self.updated.saturating_add(rhs.updated);
        self.removed = self.removed.saturating_add(rhs.removed);
        self.history_inserted = self.history_inserted.saturating_add(rhs.history_inserted);
    }
}

impl ops::Add for RunCounters {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}
