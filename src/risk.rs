use crate::models::{ClusterSimilarity, ClusterStats, RiskLevel, RiskScore};

pub const MAX_SCORE: u32 = 100;
pub const SINGLE_TRADER_POINTS: u32 = 25;
pub const PAIR_POINTS: u32 = 15;
pub const PAIR_POINTS_CAP: u32 = 30;
pub const SHARED_PHONE_POINTS: u32 = 15;

pub fn size_points(retailer_count: usize) -> u32 {
    match retailer_count {
        0..=1 => 0,
        2 => 10,
        3..=4 => 20,
        _ => 30,
    }
}

pub fn similarity_points(similar_name_pairs: usize) -> u32 {
    let pairs = u32::try_from(similar_name_pairs).unwrap_or(u32::MAX);
    pairs.saturating_mul(PAIR_POINTS).min(PAIR_POINTS_CAP)
}

/// True when any entry, blank ones included, repeats in the cluster's phone list.
pub fn has_shared_phone(phone_numbers: &[String]) -> bool {
    let distinct: std::collections::HashSet<&str> =
        phone_numbers.iter().map(String::as_str).collect();
    distinct.len() < phone_numbers.len()
}

pub fn risk_level(score: u32) -> RiskLevel {
    match score {
        60..=u32::MAX => RiskLevel::High,
        30..=59 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Scores one cluster. Missing similarity results count as no similar names.
pub fn score_cluster(stats: &ClusterStats, similarity: Option<&ClusterSimilarity>) -> RiskScore {
    let mut score = size_points(stats.retailer_count);

    if stats.trader_count == 1 {
        score += SINGLE_TRADER_POINTS;
    }

    score += similarity_points(similarity.map_or(0, |s| s.similar_name_pair_count));

    if has_shared_phone(&stats.phone_numbers) {
        score += SHARED_PHONE_POINTS;
    }

    let score = score.min(MAX_SCORE);
    RiskScore {
        score,
        level: risk_level(score),
    }
}
