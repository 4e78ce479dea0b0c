use std::io::Write;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::engine::AnalysisResult;
use crate::error::EngineResult;
use crate::models::{ClusterReport, RiskLevel, VisitRecord};

#[derive(Debug, Serialize)]
struct ClusterSummaryRow {
    cluster_id: usize,
    retailer_count: usize,
    trader_count: usize,
    center_lat: f64,
    center_lon: f64,
    risk_score: u32,
    risk_level: RiskLevel,
    similar_name_pairs: usize,
    phone_duplicate_groups: usize,
    max_name_similarity: f64,
    retailer_names: String,
    phone_numbers: String,
}

#[derive(Debug, Serialize)]
struct FlaggedVisitRow<'a> {
    cluster_id: usize,
    risk_score: u32,
    risk_level: RiskLevel,
    buyer_id: &'a str,
    buyer_name: &'a str,
    buyer_phone: &'a str,
    trader_id: &'a str,
    trader_name: &'a str,
    site_name: &'a str,
    visited_at: Option<NaiveDateTime>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    visit_count: usize,
}

/// One CSV row per given cluster, joined with its risk score.
pub fn write_cluster_summary<'a, I, W>(clusters: I, out: W) -> EngineResult<usize>
where
    I: IntoIterator<Item = &'a ClusterReport>,
    W: Write,
{
    let mut writer = csv::Writer::from_writer(out);
    let mut written = 0usize;
    for report in clusters {
        let stats = &report.stats;
        writer.serialize(ClusterSummaryRow {
            cluster_id: stats.cluster_id,
            retailer_count: stats.retailer_count,
            trader_count: stats.trader_count,
            center_lat: stats.center_lat,
            center_lon: stats.center_lon,
            risk_score: report.risk.score,
            risk_level: report.risk.level,
            similar_name_pairs: report.similarity.similar_name_pair_count,
            phone_duplicate_groups: report.similarity.phone_duplicate_group_count,
            max_name_similarity: report.similarity.max_similarity,
            retailer_names: stats.retailer_names.join("; "),
            phone_numbers: stats.phone_numbers.join("; "),
        })?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Every visit whose retailer sits in a cluster, with that cluster's risk.
pub fn write_flagged_visits<W: Write>(
    result: &AnalysisResult,
    records: &[VisitRecord],
    out: W,
) -> EngineResult<usize> {
    let mut writer = csv::Writer::from_writer(out);
    let mut written = 0usize;

    for (record, label) in records.iter().zip(result.visit_labels(records)) {
        let Some(cluster_id) = label.cluster_id() else {
            continue;
        };
        let Some(report) = result.cluster(cluster_id) else {
            continue;
        };
        let visit_count = result
            .retailer(&record.buyer_id)
            .map_or(1, |retailer| retailer.visit_count);

        writer.serialize(FlaggedVisitRow {
            cluster_id,
            risk_score: report.risk.score,
            risk_level: report.risk.level,
            buyer_id: record.buyer_id.trim(),
            buyer_name: record.buyer_name.as_deref().unwrap_or(""),
            buyer_phone: &record.buyer_phone,
            trader_id: &record.trader_id,
            trader_name: &record.trader_name,
            site_name: &record.site_name,
            visited_at: record.visited_at,
            latitude: record.latitude,
            longitude: record.longitude,
            visit_count,
        })?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::engine::run_analysis;

    fn visit(buyer: &str, lat: f64) -> VisitRecord {
        VisitRecord {
            buyer_id: buyer.to_string(),
            buyer_name: Some(format!("Store {buyer}")),
            buyer_phone: "9876543210".to_string(),
            trader_id: "T1".to_string(),
            trader_name: "Asha".to_string(),
            site_name: "BTM".to_string(),
            visited_at: None,
            latitude: Some(lat),
            longitude: Some(77.59),
            selfie: None,
            verification_doc: None,
            remarks: None,
        }
    }

    fn records() -> Vec<VisitRecord> {
        vec![visit("B1", 12.97), visit("B2", 12.97), visit("B1", 12.97), visit("B3", 13.5)]
    }

    #[test]
    fn summary_has_one_row_per_cluster() {
        let result = run_analysis(&records(), &AnalysisConfig::default()).unwrap();
        let mut buffer = Vec::new();
        let rows = write_cluster_summary(&result.clusters, &mut buffer).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "cluster_id,retailer_count,trader_count,center_lat,center_lon,risk_score,risk_level,similar_name_pairs,phone_duplicate_groups,max_name_similarity,retailer_names,phone_numbers"
        );
        assert!(lines.next().unwrap().starts_with("0,2,1,"));
        // two retailers, one trader, shared phone
        assert!(text.contains(",50,Medium,"));
    }

    #[test]
    fn summary_only_writes_selected_levels() {
        let result = run_analysis(&records(), &AnalysisConfig::default()).unwrap();
        let mut buffer = Vec::new();
        let rows = write_cluster_summary(result.clusters_at_levels(&[RiskLevel::High]), &mut buffer).unwrap();
        assert_eq!(rows, 0);
        assert!(String::from_utf8(buffer).unwrap().is_empty());
    }

    #[test]
    fn flagged_visits_skip_noise() {
        let records = records();
        let result = run_analysis(&records, &AnalysisConfig::default()).unwrap();
        let mut buffer = Vec::new();
        let rows = write_flagged_visits(&result, &records, &mut buffer).unwrap();
        assert_eq!(rows, 3);

        let text = String::from_utf8(buffer).unwrap();
        assert!(!text.contains("B3"));
        assert_eq!(text.lines().filter(|line| line.contains(",B1,")).count(), 2);
    }
}
