use super::*;
use crate::database::Payload;
use crate::ingest::SegmentMetadata;
use tempfile::TempDir;

fn point(id: u64, score: f32, text: &str) -> ScoredPoint {
    ScoredPoint {
        id,
        score,
        payload: Payload {
            page_content: text.to_string(),
            metadata: SegmentMetadata::default(),
        },
    }
}

fn payload(text: &str) -> Payload {
    Payload {
        page_content: text.to_string(),
        metadata: SegmentMetadata {
            file_name: "doc.txt".to_string(),
            ..SegmentMetadata::default()
        },
    }
}

#[test]
fn merge_keeps_best_across_sources() {
    let points = vec![
        point(1, 0.2, "a1"),
        point(2, 0.9, "a2"),
        point(3, 0.4, "a3"),
        point(1, 0.8, "b1"),
        point(2, 0.1, "b2"),
        point(3, 0.5, "b3"),
    ];

    let merged = merge_ranked(points, 3);
    let texts: Vec<&str> = merged.iter().map(|p| p.payload.page_content.as_str()).collect();
    assert_eq!(texts, vec!["a2", "b1", "b3"]);
}

#[test]
fn merge_with_fewer_points_than_top_n() {
    let merged = merge_ranked(vec![point(1, 0.3, "x"), point(2, 0.6, "y")], 10);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].payload.page_content, "y");
}

#[test]
fn join_uses_separator() {
    let points = vec![point(1, 0.9, "first"), point(2, 0.5, "second")];
    assert_eq!(join_context(&points), "first\n---\nsecond");
    assert_eq!(join_context(&[]), "");
}

#[tokio::test]
async fn context_from_two_collections() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path(), 3)
        .await
        .expect("should open store");

    for name in ["left", "right"] {
        store.get_or_create(name).await.expect("should create collection");
    }
    store
        .upsert(
            "left",
            &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
            &[payload("left exact"), payload("left far"), payload("left other")],
        )
        .await
        .expect("should upsert");
    store
        .upsert(
            "right",
            &[vec![0.9, 0.1, 0.0], vec![0.0, 0.2, 1.0], vec![0.1, 1.0, 0.0]],
            &[payload("right close"), payload("right far"), payload("right other")],
        )
        .await
        .expect("should upsert");

    let context = build_context(
        &store,
        &["left".to_string(), "right".to_string()],
        &[1.0, 0.0, 0.0],
        3,
    )
    .await
    .expect("should build context");

    assert_eq!(context.points.len(), 3);
    assert!(context.points.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(context.points[0].payload.page_content, "left exact");
    assert_eq!(context.points[1].payload.page_content, "right close");
    assert_eq!(
        context.text.split(CONTEXT_SEPARATOR).count(),
        3,
        "three chunks joined by the separator"
    );
    assert!(context.text.starts_with("left exact\n---\nright close"));
}

#[tokio::test]
async fn missing_collection_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path(), 3)
        .await
        .expect("should open store");

    let result = build_context(&store, &["nope".to_string()], &[1.0, 0.0, 0.0], 3).await;
    assert!(result.is_err());
}
