// Processor — the realtime side of the editor/processor pair.
//
// Runs once per audio block. It must not block, lock or allocate, so all it
// does with the bridge is poll the pending bit and, when set, adopt the newest
// patch. Before adopting, the notes started from the old patch are released;
// after adopting, the notes held in the new patch are started again. The
// adopted patch is then read in place until the next adoption.

use keel_latest::OwnedConsumer;
use keel_params::{NoteSet, Patch};

/// Running totals over the processor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub blocks: u64,
    pub adoptions: u64,
    /// Revision of the most recently adopted patch.
    pub last_revision: u64,
    pub notes_released: u64,
    pub notes_retriggered: u64,
}

/// What happened in one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockReport {
    /// Revision of the patch the block was rendered with.
    pub revision: u64,
    /// Whether a new patch was adopted at the start of the block.
    pub adopted: bool,
    pub released: usize,
    pub retriggered: usize,
    /// Output level of the block: gain times sounding notes.
    pub level: f32,
}

pub struct Processor {
    consumer: OwnedConsumer<Patch>,
    sounding: NoteSet,
    stats: ProcessorStats,
}

impl Processor {
    pub(crate) fn new(consumer: OwnedConsumer<Patch>) -> Self {
        Self {
            consumer,
            sounding: NoteSet::new(),
            stats: ProcessorStats::default(),
        }
    }

    /// Runs one block, adopting a newer patch first if one was committed.
    #[inline]
    pub fn process_block(&mut self) -> BlockReport {
        self.stats.blocks += 1;

        let mut released = 0;
        let mut retriggered = 0;
        let adopted = self.consumer.has_update();
        if adopted {
            released = self.sounding.len();
            self.sounding.clear();

            let patch = self.consumer.adopt();
            self.sounding = patch.held;
            retriggered = self.sounding.len();

            self.stats.adoptions += 1;
            self.stats.last_revision = patch.revision;
            self.stats.notes_released += released as u64;
            self.stats.notes_retriggered += retriggered as u64;
        }

        let (revision, gain) = self
            .consumer
            .adopted()
            .map_or((0, 0.0), |patch| (patch.revision, patch.gain));

        BlockReport {
            revision,
            adopted,
            released,
            retriggered,
            level: gain * self.sounding.len() as f32,
        }
    }

    /// The patch blocks are currently rendered with.
    pub fn current(&self) -> Option<&Patch> {
        self.consumer.adopted()
    }

    pub fn sounding(&self) -> &NoteSet {
        &self.sounding
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }
}
