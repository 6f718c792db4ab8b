pub mod patch;
pub use patch::{MAX_HELD_NOTES, NoteId, NoteSet, Patch};
