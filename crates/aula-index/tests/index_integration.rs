use std::time::Duration;

use aula_index::document::{Chunk, Document, DocumentMetadata};
use aula_index::{Chunker, ChunkerConfig, DistanceMetric, Embedder, EmbeddingIndex, IndexError};
use aula_llm::mock::MockProvider;

/// Embeds the first two characters' code points, so queries can target known chunks.
fn char_embedder() -> MockProvider {
    MockProvider::default().with_embedder(|t| {
        let mut chars = t.chars();
        let a = chars.next().map_or(0.0, |c| f32::from(u8::try_from(c).unwrap_or(0)));
        let b = chars.next().map_or(0.0, |c| f32::from(u8::try_from(c).unwrap_or(0)));
        vec![a, b]
    })
}

fn chunk(content: &str, i: usize) -> Chunk {
    Chunk {
        content: content.into(),
        metadata: DocumentMetadata::new("bncc.txt", "text/plain"),
        chunk_index: i,
        offset: i,
    }
}

#[tokio::test]
async fn five_vectors_k3_with_ties() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let mock = char_embedder();
    let embedder = Embedder::new(&mock, Duration::from_secs(1));

    // Distances from "AA" (65,65): "AA"=0, "AB"=1, "BA"=1, "AC"=4, "ZZ"=1250.
    let chunks = ["ZZ", "AB", "AC", "BA", "AA"]
        .iter()
        .enumerate()
        .map(|(i, c)| chunk(c, i))
        .collect();
    let index = EmbeddingIndex::build(&embedder, chunks, DistanceMetric::L2, &path)
        .await
        .unwrap();

    let hits = index.search(&embedder, "AA", 3).await.unwrap();
    let found: Vec<&str> = hits.iter().map(|h| h.chunk.content.as_str()).collect();
    assert_eq!(found, vec!["AA", "AB", "BA"]);
    assert!((hits[0].distance).abs() < f32::EPSILON);
    assert!((hits[1].distance - hits[2].distance).abs() < f32::EPSILON);
}

#[tokio::test]
async fn persisted_index_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("current_index/index.json");
    let mock = char_embedder();
    let embedder = Embedder::new(&mock, Duration::from_secs(1));

    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: 12,
        chunk_overlap: 3,
    })
    .unwrap();
    let doc = Document {
        content: "Prismas e pirâmides.\n\nVolume de prismas.\nÁrea de superfície.".into(),
        metadata: DocumentMetadata::new("bncc.txt", "text/plain"),
    };
    let chunks = chunker.split(&doc);
    let built = EmbeddingIndex::build(&embedder, chunks, DistanceMetric::Cosine, &path)
        .await
        .unwrap();

    let loaded = EmbeddingIndex::load(&embedder, &path).await.unwrap();
    assert_eq!(loaded.len(), built.len());
    assert_eq!(loaded.dimension(), built.dimension());
    assert_eq!(loaded.metric(), DistanceMetric::Cosine);
    assert!(loaded.entries().eq(built.entries()));

    for query in ["Pr", "Vo", "Ár"] {
        let a = built.search(&embedder, query, 2).await.unwrap();
        let b = loaded.search(&embedder, query, 2).await.unwrap();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn load_before_build_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mock = char_embedder();
    let embedder = Embedder::new(&mock, Duration::from_secs(1));

    let err = EmbeddingIndex::load(&embedder, &dir.path().join("index.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::NotFound(_)));
}

#[tokio::test]
async fn load_with_different_dimension_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let two_dim = char_embedder();
    EmbeddingIndex::build(
        &Embedder::new(&two_dim, Duration::from_secs(1)),
        vec![chunk("AA", 0)],
        DistanceMetric::L2,
        &path,
    )
    .await
    .unwrap();

    let three_dim = MockProvider::default().with_embedder(|_| vec![0.0; 3]);
    let err = EmbeddingIndex::load(&Embedder::new(&three_dim, Duration::from_secs(1)), &path)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::Corrupt { .. }));
}

#[tokio::test]
async fn truncated_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let mock = char_embedder();
    let embedder = Embedder::new(&mock, Duration::from_secs(1));
    EmbeddingIndex::build(&embedder, vec![chunk("AA", 0)], DistanceMetric::L2, &path)
        .await
        .unwrap();

    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    let err = EmbeddingIndex::load(&embedder, &path).await.unwrap_err();
    assert!(matches!(err, IndexError::Corrupt { .. }));
}

#[tokio::test]
async fn rebuild_overwrites_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let mock = char_embedder();
    let embedder = Embedder::new(&mock, Duration::from_secs(1));

    EmbeddingIndex::build(&embedder, vec![chunk("AA", 0), chunk("AB", 1)], DistanceMetric::L2, &path)
        .await
        .unwrap();
    EmbeddingIndex::build(&embedder, vec![chunk("ZZ", 0)], DistanceMetric::L2, &path)
        .await
        .unwrap();

    let loaded = EmbeddingIndex::load(&embedder, &path).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.entries().next().unwrap().chunk.content, "ZZ");
}
