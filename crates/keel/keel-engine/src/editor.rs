use keel_latest::OwnedProducer;
use keel_params::{NoteId, Patch};

/// Control-thread side: edits a working copy of the patch and commits it.
///
/// Edits are invisible to the processor until [`Editor::commit`].
pub struct Editor {
    producer: OwnedProducer<Patch>,
    dirty: bool,
}

impl Editor {
    pub(crate) fn new(producer: OwnedProducer<Patch>) -> Self {
        Self {
            producer,
            dirty: false,
        }
    }

    /// The working copy, including uncommitted edits.
    pub fn patch(&self) -> &Patch {
        &self.producer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.producer.gain = gain.clamp(0.0, 1.0);
        self.dirty = true;
    }

    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.producer.cutoff_hz = cutoff_hz.clamp(Patch::MIN_CUTOFF_HZ, Patch::MAX_CUTOFF_HZ);
        self.dirty = true;
    }

    pub fn set_resonance(&mut self, resonance: f32) {
        self.producer.resonance = resonance.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Returns false if the note was already held or no room was left.
    pub fn press(&mut self, note: NoteId) -> bool {
        let pressed = self.producer.held.press(note);
        self.dirty |= pressed;
        pressed
    }

    pub fn release(&mut self, note: NoteId) -> bool {
        let released = self.producer.held.release(note);
        self.dirty |= released;
        released
    }

    /// Bumps the revision and hands the patch to the processor.
    ///
    /// Returns the committed revision.
    pub fn commit(&mut self) -> u64 {
        self.producer.revision += 1;
        self.producer.push();
        self.dirty = false;

        let revision = self.producer.revision;
        tracing::debug!(
            revision,
            gain = self.producer.gain,
            cutoff_hz = self.producer.cutoff_hz,
            held = self.producer.held.len(),
            "patch committed"
        );
        revision
    }
}
