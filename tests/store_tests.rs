//! Property tests for vector store search ordering and bounds.

use proptest::prelude::*;

use support_rag::{ChunkInput, LocalVectorStore, MAX_TOP_K, VectorStore};

const DIM: usize = 16;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk input paired with a normalized embedding.
fn arb_record(dim: usize) -> impl Strategy<Value = (ChunkInput, Vec<f32>)> {
    ("[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(|(text, embedding)| {
        (
            ChunkInput {
                text,
                source_document: "doc.txt".to_string(),
                chunk_index: 0,
                total_chunks: 1,
            },
            embedding,
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// For any set of stored chunks, search returns results ordered by
    /// descending score (ascending distance), and the result count is at
    /// most `top_k`, at most the index size, and at most `MAX_TOP_K`.
    #[test]
    fn results_ordered_descending_and_bounded(
        records in proptest::collection::vec(arb_record(DIM), 1..30),
        query in arb_normalized_embedding(DIM),
        top_k in 1usize..40,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let results = rt.block_on(async {
            let store = LocalVectorStore::in_memory(DIM);
            let (chunks, embeddings): (Vec<_>, Vec<_>) = records.into_iter().unzip();
            let count = chunks.len();
            store.add(&chunks, &embeddings).await.unwrap();
            let results = store.search(&query, top_k).await.unwrap();
            (results, count)
        });

        let (results, stored_count) = results;

        prop_assert!(results.len() <= top_k);
        prop_assert!(results.len() <= stored_count);
        prop_assert!(results.len() <= MAX_TOP_K);

        for window in results.windows(2) {
            prop_assert!(
                window[0].score >= window[1].score,
                "results not in descending order: {} < {}",
                window[0].score,
                window[1].score,
            );
        }

        for result in &results {
            prop_assert!(result.distance >= -1e-5, "negative distance: {}", result.distance);
            prop_assert!(
                (result.score - (1.0 - result.distance)).abs() < 1e-6,
                "score is not 1 - distance",
            );
        }
    }
}

#[tokio::test]
async fn top_k_is_clamped_to_the_hard_ceiling() {
    let store = LocalVectorStore::in_memory(2);
    let chunks: Vec<ChunkInput> = (0..MAX_TOP_K + 5)
        .map(|i| ChunkInput {
            text: format!("chunk {i}"),
            source_document: "doc.txt".to_string(),
            chunk_index: i,
            total_chunks: MAX_TOP_K + 5,
        })
        .collect();
    let embeddings: Vec<Vec<f32>> = (0..MAX_TOP_K + 5)
        .map(|i| {
            let angle = i as f32 * 0.1;
            vec![angle.cos(), angle.sin()]
        })
        .collect();
    store.add(&chunks, &embeddings).await.unwrap();

    let results = store.search(&[1.0, 0.0], 50).await.unwrap();
    assert_eq!(results.len(), MAX_TOP_K);
}
