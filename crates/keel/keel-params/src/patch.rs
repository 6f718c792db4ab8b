#![forbid(unsafe_code)]

// A Patch is the full set of parameters the realtime side renders with.
// It is copied whole on every push, so it stays plain data: no heap, fixed size.

/// MIDI-style note number.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NoteId(pub u8);

/// Maximum number of notes a patch can hold at once.
pub const MAX_HELD_NOTES: usize = 8;

/// Fixed-capacity set of held notes, in press order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct NoteSet {
    notes: [NoteId; MAX_HELD_NOTES],
    len: u8,
}

impl NoteSet {
    pub const fn new() -> Self {
        Self {
            notes: [NoteId(0); MAX_HELD_NOTES],
            len: 0,
        }
    }

    /// Adds `note`. Returns false if it is already held or the set is full.
    pub fn press(&mut self, note: NoteId) -> bool {
        if self.contains(note) || self.len() == MAX_HELD_NOTES {
            return false;
        }
        self.notes[self.len()] = note;
        self.len += 1;
        true
    }

    /// Removes `note`, keeping the order of the rest. Returns false if it was
    /// not held.
    pub fn release(&mut self, note: NoteId) -> bool {
        let Some(pos) = self.as_slice().iter().position(|&n| n == note) else {
            return false;
        };
        let len = self.len();
        self.notes.copy_within(pos + 1..len, pos);
        self.len -= 1;
        self.notes[self.len()] = NoteId(0);
        true
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn contains(&self, note: NoteId) -> bool {
        self.as_slice().contains(&note)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[NoteId] {
        &self.notes[..self.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.as_slice().iter().copied()
    }
}

/// Synth parameters shared from the control thread to the audio thread.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Patch {
    /// Bumped by the editor on every commit.
    pub revision: u64,
    /// Linear output gain, 0.0 ..= 1.0
    pub gain: f32,
    pub cutoff_hz: f32,
    /// Filter resonance, 0.0 ..= 1.0
    pub resonance: f32,
    pub held: NoteSet,
}

impl Patch {
    pub const MIN_CUTOFF_HZ: f32 = 20.0;
    pub const MAX_CUTOFF_HZ: f32 = 20_000.0;
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            revision: 0,
            gain: 0.8,
            cutoff_hz: 1_000.0,
            resonance: 0.1,
            held: NoteSet::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    /// A push copies the whole patch, so it should stay within one cache line.
    #[test]
    fn patch_fits_a_cache_line() {
        assert!(size_of::<Patch>() <= 64, "Patch grew to {} bytes", size_of::<Patch>());
    }

    #[test]
    fn note_id_is_one_byte() {
        assert_eq!(size_of::<NoteId>(), 1);
    }

    #[test]
    fn press_rejects_duplicates_and_overflow() {
        let mut set = NoteSet::new();
        assert!(set.press(NoteId(60)));
        assert!(!set.press(NoteId(60)));
        for n in 61..(60 + MAX_HELD_NOTES as u8) {
            assert!(set.press(NoteId(n)));
        }
        assert_eq!(set.len(), MAX_HELD_NOTES);
        assert!(!set.press(NoteId(100)));
    }

    #[test]
    fn release_keeps_press_order() {
        let mut set = NoteSet::new();
        for n in [60, 64, 67, 72] {
            set.press(NoteId(n));
        }
        assert!(set.release(NoteId(64)));
        assert!(!set.release(NoteId(64)));
        assert_eq!(set.as_slice(), &[NoteId(60), NoteId(67), NoteId(72)]);
    }

    #[test]
    fn released_sets_compare_equal_to_fresh_ones() {
        let mut a = NoteSet::new();
        a.press(NoteId(1));
        a.press(NoteId(2));
        a.release(NoteId(2));

        let mut b = NoteSet::new();
        b.press(NoteId(1));
        assert_eq!(a, b);

        a.clear();
        assert!(a.is_empty());
        assert_eq!(a, NoteSet::default());
    }
}
