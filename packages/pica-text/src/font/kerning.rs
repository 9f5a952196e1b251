//! Compact sorted kerning table
//!
//! Pairs are packed into a single 63-bit word per entry:
//! `first(21) | second(21) | amount(21, signed)`. The table is sorted by the
//! top 42 bits (the pair) and binary-searched with a zero-amount probe, so a
//! lookup touches one contiguous allocation and never chases pointers.

const FIELD_BITS: u32 = 21;
const FIELD_MASK: u64 = (1 << FIELD_BITS) - 1;
const PAIR_MASK: u64 = !FIELD_MASK;

#[inline]
fn pack_pair(first: u32, second: u32) -> u64 {
    ((first as u64 & FIELD_MASK) << (2 * FIELD_BITS)) | ((second as u64 & FIELD_MASK) << FIELD_BITS)
}

#[inline]
fn unpack_amount(entry: u64) -> i32 {
    // Sign-extend the low 21 bits.
    (((entry & FIELD_MASK) as i64) << 43 >> 43) as i32
}

/// Sorted, allocation-free-at-lookup kerning table.
///
/// Amounts are stored in raw descriptor units; the owning font applies its
/// `pixels_per_point` scale when answering queries.
#[derive(Debug, Clone, Default)]
pub struct KerningTable {
    entries: Vec<u64>,
}

impl KerningTable {
    /// Build the table from `(first, second, amount)` triples.
    ///
    /// Zero amounts are never stored; duplicate pairs drop later entries.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32, i32)>) -> Self {
        let mut entries: Vec<u64> = Vec::new();
        let mut order = 0usize;
        // Keep (pair, first-seen order, packed word) so the stable duplicate
        // rule survives sorting.
        let mut staged: Vec<(u64, usize, u64)> = pairs
            .into_iter()
            .filter(|&(_, _, amount)| amount != 0)
            .map(|(first, second, amount)| {
                let pair = pack_pair(first, second);
                let word = pair | (amount as u64 & FIELD_MASK);
                order += 1;
                (pair, order, word)
            })
            .collect();
        staged.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        staged.dedup_by_key(|e| e.0);
        entries.extend(staged.into_iter().map(|e| e.2));
        Self { entries }
    }

    /// Signed kerning amount between two glyph ids, in descriptor units.
    /// Unknown pairs answer 0.
    pub fn amount(&self, first: u32, second: u32) -> i32 {
        let probe = pack_pair(first, second);
        match self.entries.binary_search(&probe) {
            Ok(i) => unpack_amount(self.entries[i]),
            Err(i) => {
                // The stored word carries a nonzero amount in its low bits, so
                // the probe always lands just below it; verify the pair bits.
                if i < self.entries.len() && self.entries[i] & PAIR_MASK == probe {
                    unpack_amount(self.entries[i])
                } else {
                    0
                }
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
