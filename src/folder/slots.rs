//! Free-slot index
//!
//! Bitmap of occupied slots, grown lazily: words past the end of the vector
//! are implicitly free, so a huge, mostly empty folder costs nothing.

/// Tracks which slots of one folder hold a live sector
#[derive(Debug, Clone, Default)]
pub struct FreeSlots {
    words: Vec<u64>,
    capacity: u64,
    used: u64,
    /// Word index where the next scan starts
    cursor: usize,
}

impl FreeSlots {
    pub fn new(capacity: u64) -> Self {
        Self {
            words: Vec::new(),
            capacity,
            used: 0,
            cursor: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Occupied slots
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn free(&self) -> u64 {
        self.capacity - self.used
    }

    pub fn is_full(&self) -> bool {
        self.used >= self.capacity
    }

    pub fn is_used(&self, index: u64) -> bool {
        let (word, bit) = Self::locate(index);
        self.words
            .get(word)
            .map(|w| (w >> bit) & 1 == 1)
            .unwrap_or(false)
    }

    /// Mark `index` occupied. Returns false if it already was or is out of range.
    pub fn mark_used(&mut self, index: u64) -> bool {
        if index >= self.capacity || self.is_used(index) {
            return false;
        }
        let (word, bit) = Self::locate(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
        self.used += 1;
        true
    }

    /// Mark `index` free. Returns false if it already was.
    pub fn mark_free(&mut self, index: u64) -> bool {
        if !self.is_used(index) {
            return false;
        }
        let (word, bit) = Self::locate(index);
        self.words[word] &= !(1 << bit);
        self.used -= 1;
        if word < self.cursor {
            self.cursor = word;
        }
        true
    }

    /// Next unused slot, scanning forward from the cursor and wrapping once
    pub fn next_free(&mut self) -> Option<u64> {
        if self.is_full() {
            return None;
        }

        let total_words = Self::word_count(self.capacity);
        let start = self.cursor.min(total_words.saturating_sub(1));
        for word in (start..total_words).chain(0..start) {
            let bits = self.words.get(word).copied().unwrap_or(0);
            if bits == u64::MAX {
                continue;
            }
            let index = word as u64 * 64 + bits.trailing_ones() as u64;
            if index < self.capacity {
                self.cursor = word;
                return Some(index);
            }
        }
        None
    }

    /// Lowest unused slot below `limit`
    pub fn first_free_below(&self, limit: u64) -> Option<u64> {
        let limit = limit.min(self.capacity);
        (0..Self::word_count(limit)).find_map(|word| {
            let bits = self.words.get(word).copied().unwrap_or(0);
            let index = word as u64 * 64 + bits.trailing_ones() as u64;
            (bits != u64::MAX && index < limit).then_some(index)
        })
    }

    /// Occupied slot indices `>= start`, ascending
    pub fn used_from(&self, start: u64) -> Vec<u64> {
        let mut out = Vec::new();
        for (word, bits) in self.words.iter().enumerate() {
            let mut bits = *bits;
            while bits != 0 {
                let bit = bits.trailing_zeros() as u64;
                let index = word as u64 * 64 + bit;
                if index >= start {
                    out.push(index);
                }
                bits &= bits - 1;
            }
        }
        out
    }

    /// Change the capacity. Shrinking fails with the first occupied index
    /// that would fall outside the new range.
    pub fn resize(&mut self, capacity: u64) -> Result<(), u64> {
        if capacity < self.capacity {
            if let Some(&index) = self.used_from(capacity).first() {
                return Err(index);
            }
            self.words.truncate(Self::word_count(capacity));
        }
        self.capacity = capacity;
        self.cursor = self.cursor.min(Self::word_count(capacity).saturating_sub(1));
        Ok(())
    }

    fn locate(index: u64) -> (usize, u64) {
        ((index / 64) as usize, index % 64)
    }

    fn word_count(capacity: u64) -> usize {
        capacity.div_ceil(64) as usize
    }
}
