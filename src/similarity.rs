use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;
use strsim::normalized_levenshtein;

use crate::models::{CanonicalRetailer, ClusterSimilarity, PhoneGroup, SimilarityPair};

/// Keeps only the digits of a phone number. Placeholders such as `nan` come out empty.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn sort_tokens(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Word-order-insensitive similarity in [0, 100], based on normalized
/// Levenshtein distance between the sorted token sequences.
pub fn token_sort_ratio(left: &str, right: &str) -> f64 {
    let left = sort_tokens(left);
    let right = sort_tokens(right);
    normalized_levenshtein(&left, &right) * 100.0
}

/// Similarity of two retailer names; a missing or blank name scores 0.
pub fn name_similarity(left: Option<&str>, right: Option<&str>) -> f64 {
    match (left, right) {
        (Some(l), Some(r)) if !l.trim().is_empty() && !r.trim().is_empty() => token_sort_ratio(l, r),
        _ => 0.0,
    }
}

fn similar_name_pairs(members: &[&CanonicalRetailer], threshold: f64) -> Vec<SimilarityPair> {
    let mut pairs = Vec::new();
    for (i, first) in members.iter().enumerate() {
        for second in &members[i + 1..] {
            let similarity = name_similarity(first.buyer_name.as_deref(), second.buyer_name.as_deref());
            if similarity >= threshold {
                pairs.push(SimilarityPair {
                    retailer1: first.display_name().to_string(),
                    retailer2: second.display_name().to_string(),
                    id1: first.buyer_id.clone(),
                    id2: second.buyer_id.clone(),
                    similarity,
                });
            }
        }
    }
    pairs
}

fn shared_phone_groups(members: &[&CanonicalRetailer]) -> Vec<PhoneGroup> {
    let mut by_phone: BTreeMap<String, PhoneGroup> = BTreeMap::new();
    for retailer in members {
        let phone = normalize_phone(&retailer.buyer_phone);
        if phone.is_empty() {
            continue;
        }
        let group = by_phone.entry(phone.clone()).or_insert_with(|| PhoneGroup {
            phone,
            retailers: Vec::new(),
            ids: Vec::new(),
        });
        if !group.ids.contains(&retailer.buyer_id) {
            group.retailers.push(retailer.display_name().to_string());
            group.ids.push(retailer.buyer_id.clone());
        }
    }
    by_phone.into_values().filter(|group| group.ids.len() > 1).collect()
}

/// Compares every pair of members of one cluster by name and groups shared phones.
pub fn analyze_cluster(cluster_id: usize, members: &[&CanonicalRetailer], threshold: f64) -> ClusterSimilarity {
    if members.len() < 2 {
        return ClusterSimilarity {
            cluster_id,
            ..ClusterSimilarity::default()
        };
    }

    let name_pairs = similar_name_pairs(members, threshold);
    let phone_groups = shared_phone_groups(members);
    let max_similarity = name_pairs.iter().map(|pair| pair.similarity).fold(0.0, f64::max);

    ClusterSimilarity {
        cluster_id,
        similar_name_pair_count: name_pairs.len(),
        phone_duplicate_group_count: phone_groups.len(),
        max_similarity,
        name_pairs,
        phone_groups,
    }
}

/// Runs [`analyze_cluster`] for every cluster in parallel. The result is keyed
/// by cluster id, so it does not depend on scheduling.
pub fn analyze_clusters(
    retailers: &[CanonicalRetailer],
    groups: &BTreeMap<usize, Vec<usize>>,
    threshold: f64,
) -> BTreeMap<usize, ClusterSimilarity> {
    let jobs: Vec<(usize, &Vec<usize>)> = groups.iter().map(|(id, members)| (*id, members)).collect();
    jobs.par_iter()
        .map(|(cluster_id, indices)| {
            let members: Vec<&CanonicalRetailer> = indices.iter().map(|&idx| &retailers[idx]).collect();
            (*cluster_id, analyze_cluster(*cluster_id, &members, threshold))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedCluster {
    pub cluster_id: usize,
    pub similar_names_count: usize,
    pub phone_duplicates_count: usize,
    pub max_name_similarity: f64,
}

/// Clusters with at least one similar-name pair or shared phone.
pub fn flagged_clusters<'a, I>(results: I) -> Vec<FlaggedCluster>
where
    I: IntoIterator<Item = &'a ClusterSimilarity>,
{
    results
        .into_iter()
        .filter(|result| result.similar_name_pair_count > 0 || result.phone_duplicate_group_count > 0)
        .map(|result| FlaggedCluster {
            cluster_id: result.cluster_id,
            similar_names_count: result.similar_name_pair_count,
            phone_duplicates_count: result.phone_duplicate_group_count,
            max_name_similarity: result.max_similarity,
        })
        .collect()
}
