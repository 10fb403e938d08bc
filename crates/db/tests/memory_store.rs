//! Repository behaviour against the in-memory store.

use std::sync::Arc;

use assert_matches::assert_matches;
use rundown_core::error::CoreError;
use rundown_core::model::{Part, Piece, PieceLifespan, Rundown, Segment};
use rundown_core::timeline::Timeline;
use rundown_db::memory::InMemoryStore;
use rundown_db::repositories::{
    AggregateRepository, PartRepository, PieceRepository, RundownRepository, SegmentRepository,
    TimelineRepository,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn news() -> Rundown {
    Rundown::new("news", "Evening News")
        .with_segment(
            Segment::new("intro", "news", 1.0)
                .with_part(
                    Part::new("headlines", "intro", 1.0)
                        .with_piece(Piece::new("cam1", "headlines", "camera", PieceLifespan::WithinPart)),
                )
                .with_part(Part::new("weather", "intro", 2.0)),
        )
        .with_segment(Segment::new("sport", "news", 2.0).with_part(Part::new("football", "sport", 1.0)))
}

async fn seeded() -> (Arc<InMemoryStore>, AggregateRepository) {
    let store = Arc::new(InMemoryStore::new());
    store.create(&news()).await.unwrap();
    let children = AggregateRepository::new(store.clone());
    (store, children)
}

// ---------------------------------------------------------------------------
// Rundowns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_rejects_duplicates() {
    let (store, _) = seeded().await;
    let err = store.create(&news()).await.unwrap_err();
    assert_matches!(err, CoreError::AlreadyExists { entity: "Rundown", .. });
}

#[tokio::test]
async fn lookups_by_child_id() {
    let (store, _) = seeded().await;
    assert_eq!(store.get_by_segment_id("sport").await.unwrap().id, "news");
    assert_eq!(store.get_by_part_id("weather").await.unwrap().id, "news");
    assert_matches!(
        store.get_by_part_id("missing").await,
        Err(CoreError::NotFound { entity: "Part", .. })
    );
}

#[tokio::test]
async fn list_basic_reports_activation() {
    let (store, _) = seeded().await;
    store.save(&Rundown::new("late", "Late Show")).await.unwrap();

    let summaries = store.list_basic().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].id, "late");
    assert!(summaries.iter().all(|s| !s.active));
}

#[tokio::test]
async fn delete_missing_is_not_found() {
    let store = InMemoryStore::new();
    assert_matches!(
        store.delete("nope").await,
        Err(CoreError::NotFound { entity: "Rundown", .. })
    );
}

#[tokio::test]
async fn timelines_round_trip() {
    let store = InMemoryStore::new();
    let timeline = Timeline::empty("news", chrono::Utc::now());
    store.save_timeline(&timeline).await.unwrap();
    assert_eq!(store.get_timeline("news").await.unwrap(), timeline);
    assert_matches!(
        store.get_timeline("other").await,
        Err(CoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Children
// ---------------------------------------------------------------------------

#[tokio::test]
async fn segment_save_overwrites_in_place() {
    let (store, children) = seeded().await;
    let mut sport = children.get_segment("sport").await.unwrap();
    sport.name = "Sport".into();
    children.save_segment(&sport).await.unwrap();

    let rundown = store.get("news").await.unwrap();
    assert_eq!(rundown.segments.len(), 2);
    assert_eq!(rundown.segment("sport").unwrap().name, "Sport");
}

#[tokio::test]
async fn part_save_can_move_segments() {
    let (store, children) = seeded().await;
    children
        .save_part(&Part::new("weather", "sport", 2.0))
        .await
        .unwrap();

    let rundown = store.get("news").await.unwrap();
    assert_eq!(rundown.segment_of_part("weather").unwrap().id, "sport");
    assert_eq!(rundown.segment("intro").unwrap().parts.len(), 1);
}

#[tokio::test]
async fn piece_crud() {
    let (_, children) = seeded().await;
    children
        .save_piece(&Piece::new("vt", "weather", "video", PieceLifespan::WithinPart))
        .await
        .unwrap();
    assert_eq!(children.get_piece("weather", "vt").await.unwrap().layer, "video");

    children.delete_piece("weather", "vt").await.unwrap();
    assert_matches!(
        children.delete_piece("weather", "vt").await,
        Err(CoreError::NotFound { entity: "Piece", .. })
    );
}

#[tokio::test]
async fn delete_unsynced_removes_only_unsynced() {
    let (store, children) = seeded().await;
    let mut rundown = store.get("news").await.unwrap();
    let copy = rundown.part("weather").unwrap().unsynced_copy();
    rundown.segment_mut("intro").unwrap().insert_part(Part { rank: 3.0, ..copy }).unwrap();
    let stale = Segment {
        rank: 3.0,
        ..rundown.segment("sport").unwrap().unsynced_copy(&[])
    };
    rundown.insert_segment(stale).unwrap();
    store.save(&rundown).await.unwrap();

    assert_eq!(children.delete_unsynced_parts("news").await.unwrap(), 1);
    assert_eq!(children.delete_unsynced_segments("news").await.unwrap(), 1);
    assert_eq!(children.delete_unsynced_pieces("news").await.unwrap(), 0);

    let rundown = store.get("news").await.unwrap();
    assert!(rundown.part("weather_unsynced").is_none());
    assert!(rundown.part("weather").is_some());
    assert!(rundown.segment("sport_unsynced").is_none());
}
