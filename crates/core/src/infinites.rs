//! Resolution of infinite (spanning) pieces.
//!
//! A piece with a spanning lifespan stays live past its own Part until a
//! later Part places something on the same layer, or until its segment or
//! rundown boundary is crossed. Scans are last-write-wins in rank order, so
//! the piece from the Part closest to the target wins its layer.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{Part, Piece, PieceLifespan, Rundown};
use crate::types::LayerId;

/// Spanning pieces from the Parts ranked strictly before `target`.
///
/// Only lifespans that span the segment are considered; pieces on
/// `ignored_layers` are skipped. At most one piece per layer is returned.
pub fn spanning_before_part_in_segment(
    parts: &[Part],
    target: &Part,
    ignored_layers: &BTreeSet<LayerId>,
) -> Vec<Piece> {
    let mut before: Vec<&Part> = parts.iter().filter(|p| p.rank < target.rank).collect();
    before.sort_by(|a, b| a.rank.total_cmp(&b.rank));

    collect_by_layer(before, ignored_layers, PieceLifespan::spans_segment)
        .into_values()
        .cloned()
        .collect()
}

/// Pieces spanning until the end of the rundown, over `parts` as given.
///
/// `parts` must already be in rundown order (segment rank, then part rank).
pub fn spanning_across_whole_rundown<'a>(
    parts: impl IntoIterator<Item = &'a Part>,
    ignored_layers: &BTreeSet<LayerId>,
) -> Vec<Piece> {
    collect_by_layer(parts, ignored_layers, PieceLifespan::spans_rundown)
        .into_values()
        .cloned()
        .collect()
}

/// Infinite pieces live while `part_id` is on-air, keyed by layer.
///
/// Combines, in increasing precedence: rundown-spanning pieces from earlier
/// segments, segment-spanning pieces from earlier Parts of the same segment,
/// and the Part's own infinite pieces. Layers the Part itself uses are never
/// inherited. Unknown parts resolve to nothing.
pub fn resolve_live_infinites(rundown: &Rundown, part_id: &str) -> BTreeMap<LayerId, Piece> {
    let Some(segment) = rundown.segment_of_part(part_id) else {
        return BTreeMap::new();
    };
    let Some(target) = segment.part(part_id) else {
        return BTreeMap::new();
    };
    let own_layers = target.layers();

    let mut live: BTreeMap<LayerId, Piece> = BTreeMap::new();
    let earlier = rundown.parts_before_segment(&segment.id);
    for piece in spanning_across_whole_rundown(earlier, &own_layers) {
        live.insert(piece.layer.clone(), piece);
    }
    for piece in spanning_before_part_in_segment(&segment.parts, target, &own_layers) {
        live.insert(piece.layer.clone(), piece);
    }
    for piece in target.pieces.iter().filter(|p| p.lifespan.is_infinite()) {
        live.insert(piece.layer.clone(), piece.clone());
    }
    live
}

fn collect_by_layer<'a>(
    parts: impl IntoIterator<Item = &'a Part>,
    ignored_layers: &BTreeSet<LayerId>,
    carried: fn(PieceLifespan) -> bool,
) -> BTreeMap<&'a str, &'a Piece> {
    let mut by_layer = BTreeMap::new();
    for part in parts {
        for piece in &part.pieces {
            if carried(piece.lifespan) && !ignored_layers.contains(&piece.layer) {
                by_layer.insert(piece.layer.as_str(), piece);
            }
        }
    }
    by_layer
}
