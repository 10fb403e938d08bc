//! Transition timing between consecutive Parts.
//!
//! [`calculate_part_timings`] derives, for a Part about to play, how long its
//! pieces are held back, how long the previous Part keeps running into it,
//! where an in-transition starts, and how much post-roll the Part itself
//! needs. Pure and infallible: missing values count as zero.

use crate::model::{InTransition, Part, PartTimings, Piece};
use crate::types::Millis;

/// Largest pre-roll over `pieces`, 0 when there are none.
pub fn max_pre_roll(pieces: &[Piece]) -> Millis {
    pieces
        .iter()
        .filter_map(|p| p.pre_roll)
        .fold(0, Ord::max)
}

/// Largest post-roll over pieces without a fixed duration.
///
/// A fixed duration already determines where a piece visibly ends, so its
/// post-roll never extends the Part.
pub fn max_post_roll(pieces: &[Piece]) -> Millis {
    pieces
        .iter()
        .filter(|p| p.duration.is_none())
        .filter_map(|p| p.post_roll)
        .fold(0, Ord::max)
}

/// Compute timings for `part` when it follows `previous` (or nothing).
///
/// Priority when a previous Part exists:
/// 1. previous has auto-next with an overlap: no transition, the overlap
///    becomes the keep-alive of the previous Part;
/// 2. previous allows next in-transitions and `part` defines one: transition;
/// 3. otherwise: plain cut, padded by the previous out-transition.
pub fn calculate_part_timings(part: &Part, previous: Option<&Part>) -> PartTimings {
    let pre_roll = max_pre_roll(&part.pieces);
    let post_roll = max_post_roll(&part.pieces);

    let Some(previous) = previous else {
        return cut_timings(pre_roll, post_roll, 0, 0);
    };

    let previous_keep_alive = previous.out_transition.map_or(0, |t| t.keep_alive);
    let previous_post_roll = max_post_roll(&previous.pieces);

    let overlap = previous.auto_next.and_then(|a| a.overlap);
    let (transition, allowed) = match (overlap, part.in_transition) {
        (Some(overlap), _) => (
            InTransition {
                keep_previous_alive: overlap,
                delay_pieces: 0,
            },
            false,
        ),
        (None, Some(in_transition)) if !previous.disable_next_in_transition => {
            (in_transition, true)
        }
        _ => {
            return cut_timings(pre_roll, post_roll, previous_keep_alive, previous_post_roll);
        }
    };

    let previous_out_duration = (previous_keep_alive - transition.keep_previous_alive).max(0);
    let pre_roll_considering_delay = pre_roll - transition.delay_pieces;
    let base = previous_out_duration.max(pre_roll_considering_delay).max(0);

    PartTimings {
        in_transition_start: allowed.then_some(base),
        delay_start_of_pieces_duration: base + transition.delay_pieces,
        post_roll_duration: post_roll,
        previous_part_continue_into_part_duration: base
            + transition.keep_previous_alive
            + previous_post_roll,
    }
}

/// Timings for a switch without an in-transition.
fn cut_timings(
    pre_roll: Millis,
    post_roll: Millis,
    previous_keep_alive: Millis,
    previous_post_roll: Millis,
) -> PartTimings {
    let delay = previous_keep_alive.max(pre_roll).max(0);
    PartTimings {
        in_transition_start: None,
        delay_start_of_pieces_duration: delay,
        post_roll_duration: post_roll,
        previous_part_continue_into_part_duration: delay + previous_post_roll,
    }
}
