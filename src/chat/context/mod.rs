#[cfg(test)]
mod tests;

use tracing::{debug, trace};

use crate::DocQaError;
use crate::database::{ScoredPoint, VectorStore};

/// Placed between chunk texts in the assembled context
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Best-scoring chunks across the searched collections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub points: Vec<ScoredPoint>,
    pub text: String,
}

/// Sort by descending score and keep the best `top_n`
#[inline]
pub fn merge_ranked(mut points: Vec<ScoredPoint>, top_n: usize) -> Vec<ScoredPoint> {
    points.sort_by(|a, b| b.score.total_cmp(&a.score));
    points.truncate(top_n);
    points
}

#[inline]
pub fn join_context(points: &[ScoredPoint]) -> String {
    points
        .iter()
        .map(|point| point.payload.page_content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Search every collection for `top_n` hits and keep the global best `top_n`
#[inline]
pub async fn build_context(
    store: &VectorStore,
    collections: &[String],
    query_vector: &[f32],
    top_n: usize,
) -> Result<RetrievedContext, DocQaError> {
    let mut candidates = Vec::new();
    for collection in collections {
        let hits = store.search(collection, query_vector, top_n).await?;
        debug!("Collection {} returned {} hits", collection, hits.len());
        candidates.extend(hits);
    }

    let points = merge_ranked(candidates, top_n);
    let text = join_context(&points);
    trace!("Context: {}", text);

    Ok(RetrievedContext { points, text })
}
