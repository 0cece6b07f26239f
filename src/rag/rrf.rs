//! Reciprocal rank fusion.
//!
//! Each document's fused score is `Σ 1/(k + rank_i)` over the ranked lists
//! it appears in (1-indexed ranks). `k = 60`, matching `kb-service`'s
//! hardcoded value — kept as a constant rather than a per-agent knob.

pub const RRF_K: f64 = 60.0;

/// Fuse two rank-ordered id lists (best-first) into a single ranking.
///
/// Returns ids ordered by descending fused score. Ties keep the order they
/// were first encountered in (semantic list first, then lexical).
pub fn fuse(semantic: &[String], lexical: &[String]) -> Vec<(String, f64)> {
    let mut scores: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (rank, id) in semantic.iter().enumerate() {
        *scores.entry(id.clone()).or_insert_with(|| {
            order.push(id.clone());
            0.0
        }) += 1.0 / (RRF_K + (rank + 1) as f64);
    }
    for (rank, id) in lexical.iter().enumerate() {
        if !scores.contains_key(id) {
            order.push(id.clone());
        }
        *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (RRF_K + (rank + 1) as f64);
    }

    let mut fused: Vec<(String, f64)> = order
        .into_iter()
        .map(|id| {
            let score = scores[&id];
            (id, score)
        })
        .collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_semantic_when_lexical_empty() {
        let semantic = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let fused = fuse(&semantic, &[]);
        let ids: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn items_in_both_lists_rank_higher() {
        let semantic = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let lexical = vec!["c".to_string(), "a".to_string()];
        let fused = fuse(&semantic, &lexical);
        assert_eq!(fused[0].0, "a");
    }

    #[test]
    fn score_matches_rrf_formula() {
        let semantic = vec!["a".to_string()];
        let fused = fuse(&semantic, &[]);
        assert!((fused[0].1 - 1.0 / 61.0).abs() < 1e-12);
    }
}
