use crate::metric::DistanceMetric;
use crate::types::{SearchQuery, SearchResult, VectorEntry};

/// Brute-force search over in-process entries
///
/// Filters first, scores the survivors, drops those under the threshold,
/// then sorts by similarity and truncates to the query limit.
pub(crate) fn linear_scan<'a, I>(
    entries: I,
    query: &SearchQuery,
    metric: DistanceMetric,
) -> Vec<SearchResult>
where
    I: IntoIterator<Item = &'a VectorEntry>,
{
    if query.limit == 0 {
        return Vec::new();
    }

    let mut results: Vec<SearchResult> = entries
        .into_iter()
        .filter(|entry| query.matches(&entry.metadata))
        .filter_map(|entry| {
            let (similarity, distance) = metric.score(&query.vector, entry.vector());
            query.passes_threshold(similarity).then(|| {
                SearchResult::new(entry.id.clone(), similarity, distance, entry.metadata.clone())
            })
        })
        .collect();

    results.sort_by(SearchResult::ranking);
    results.truncate(query.limit);
    results
}
