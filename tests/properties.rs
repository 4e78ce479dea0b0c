use std::collections::HashSet;

use proptest::prelude::*;
use retailer_cluster_guard::clustering::cluster_points;
use retailer_cluster_guard::geodesy::distance_matrix;
use retailer_cluster_guard::models::{ClusterLabel, RiskLevel};
use retailer_cluster_guard::risk::risk_level;
use retailer_cluster_guard::similarity::token_sort_ratio;
use retailer_cluster_guard::{run_analysis, AnalysisConfig, VisitRecord};

fn visit(buyer: usize, name: &str, phone: &str, trader: usize, day: u32, lat: f64, lon: f64) -> VisitRecord {
    VisitRecord {
        buyer_id: format!("B{buyer}"),
        buyer_name: Some(name.to_string()),
        buyer_phone: phone.to_string(),
        trader_id: format!("T{trader}"),
        trader_name: format!("Trader {trader}"),
        site_name: "Malleshwaram".to_string(),
        visited_at: chrono::NaiveDate::from_ymd_opt(2024, 6, day).and_then(|d| d.and_hms_opt(12, 0, 0)),
        latitude: Some(lat),
        longitude: Some(lon),
        selfie: None,
        verification_doc: None,
        remarks: None,
    }
}

prop_compose! {
    // a small neighbourhood so that clusters actually form
    fn arb_visit()(
        buyer in 0usize..12,
        name in prop::sample::select(vec!["Raj Traders", "Traders Raj", "Lakshmi Stores", "Balaji Kirana", "Kirana Balaji"]),
        phone in prop::sample::select(vec!["9876543210", "9123456780", "", "nan"]),
        trader in 0usize..3,
        day in 1u32..28,
        lat_offset in 0.0f64..0.0005,
        lon_offset in 0.0f64..0.0005,
    ) -> VisitRecord {
        visit(buyer, name, phone, trader, day, 12.97 + lat_offset, 77.59 + lon_offset)
    }
}

fn arb_config() -> impl Strategy<Value = AnalysisConfig> {
    (5.0f64..60.0, 1usize..5, 50.0f64..100.0)
        .prop_map(|(radius, min_samples, threshold)| AnalysisConfig::new(radius, min_samples, threshold))
}

proptest! {
    #[test]
    fn runs_are_deterministic(visits in prop::collection::vec(arb_visit(), 0..40), config in arb_config()) {
        let first = run_analysis(&visits, &config).unwrap();
        let second = run_analysis(&visits, &config).unwrap();
        prop_assert_eq!(&first.labels, &second.labels);
        prop_assert_eq!(&first.clusters, &second.clusters);
        prop_assert_eq!(&first.retailers, &second.retailers);
    }

    #[test]
    fn every_retailer_gets_exactly_one_label(visits in prop::collection::vec(arb_visit(), 0..40), config in arb_config()) {
        let result = run_analysis(&visits, &config).unwrap();
        prop_assert_eq!(result.labels.len(), result.retailers.len());

        let mut seen = HashSet::new();
        for report in &result.clusters {
            for member in result.members(report.stats.cluster_id) {
                prop_assert!(seen.insert(member.buyer_id.clone()));
            }
            prop_assert_eq!(report.stats.retailer_count, result.members(report.stats.cluster_id).len());
        }
        for retailer in result.noise() {
            prop_assert!(seen.insert(retailer.buyer_id.clone()));
        }
        prop_assert_eq!(seen.len(), result.retailers.len());
    }

    #[test]
    fn canonical_visit_is_latest_and_counts_match(visits in prop::collection::vec(arb_visit(), 1..40)) {
        let result = run_analysis(&visits, &AnalysisConfig::default()).unwrap();
        for retailer in &result.retailers {
            let group: Vec<&VisitRecord> = visits.iter().filter(|v| v.buyer_id == retailer.buyer_id).collect();
            prop_assert_eq!(retailer.visit_count, group.len());
            let latest = group.iter().filter_map(|v| v.visited_at).max();
            prop_assert_eq!(retailer.visited_at, latest);
        }
    }

    #[test]
    fn scores_stay_in_bounds(visits in prop::collection::vec(arb_visit(), 0..40), config in arb_config()) {
        let result = run_analysis(&visits, &config).unwrap();
        for report in &result.clusters {
            prop_assert!(report.risk.score <= 100);
            prop_assert_eq!(report.risk.level, risk_level(report.risk.score));
        }
    }

    #[test]
    fn min_samples_one_never_yields_noise(points in prop::collection::vec((-60.0f64..60.0, -170.0f64..170.0), 0..30)) {
        let clustering = cluster_points(&points, 10.0, 1);
        prop_assert!(clustering.labels.iter().all(|label| *label != ClusterLabel::Noise));
    }

    #[test]
    fn name_similarity_is_symmetric(left in "[a-z]{1,8}( [a-z]{1,8}){0,3}", right in "[a-z]{1,8}( [a-z]{1,8}){0,3}") {
        let forward = token_sort_ratio(&left, &right);
        let backward = token_sort_ratio(&right, &left);
        prop_assert_eq!(forward, backward);
        prop_assert!((0.0..=100.0).contains(&forward));
    }

    #[test]
    fn name_similarity_ignores_word_order(words in prop::collection::vec("[a-z]{1,8}", 1..5)) {
        let forward = words.join(" ");
        let reversed: Vec<&str> = words.iter().rev().map(String::as_str).collect();
        prop_assert_eq!(token_sort_ratio(&forward, &reversed.join(" ")), 100.0);
    }

    #[test]
    fn distance_matrix_is_symmetric(visits in prop::collection::vec(arb_visit(), 2..20)) {
        let result = run_analysis(&visits, &AnalysisConfig::new(100.0, 1, 90.0)).unwrap();
        let retailers: Vec<_> = result.retailers.iter().collect();
        let matrix = distance_matrix(&retailers);
        if retailers.len() < 2 {
            prop_assert!(matrix.is_empty());
        } else {
            for i in 0..matrix.len() {
                prop_assert_eq!(matrix.meters[i][i], 0.0);
                for j in 0..matrix.len() {
                    prop_assert_eq!(matrix.meters[i][j], matrix.meters[j][i]);
                }
            }
        }
    }
}

#[test]
fn level_thresholds_at_the_boundaries() {
    assert_eq!(risk_level(29), RiskLevel::Low);
    assert_eq!(risk_level(30), RiskLevel::Medium);
    assert_eq!(risk_level(59), RiskLevel::Medium);
    assert_eq!(risk_level(60), RiskLevel::High);
}
