//! Rundown entities: Rundown → Segment → Part → Piece.

pub mod part;
pub mod piece;
pub mod rundown;
pub mod segment;

pub use part::{AutoNext, EndState, InTransition, OutTransition, Part, PartTimings};
pub use piece::{Piece, PieceLifespan, PieceTransition};
pub use rundown::{
    ActivationState, ActivePlayout, Cursor, CursorOwner, PlayedPart, Rundown, RundownSummary,
};
pub use segment::Segment;
