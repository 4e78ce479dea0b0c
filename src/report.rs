use std::fmt::Write;

use crate::engine::AnalysisResult;
use crate::models::{ClusterReport, RiskLevel};
use crate::similarity::flagged_clusters;

const TOP_CLUSTERS: usize = 10;
const TOP_TRADERS: usize = 10;

/// Clusters ordered by risk score, highest first; ties by cluster id.
pub fn ranked_clusters(result: &AnalysisResult) -> Vec<&ClusterReport> {
    let mut ranked: Vec<&ClusterReport> = result.clusters.iter().collect();
    ranked.sort_by(|a, b| {
        b.risk
            .score
            .cmp(&a.risk.score)
            .then(a.stats.cluster_id.cmp(&b.stats.cluster_id))
    });
    ranked
}

fn write_cluster(output: &mut String, report: &ClusterReport) {
    let stats = &report.stats;
    let _ = writeln!(
        output,
        "### Cluster {} ({} risk, score {}/100)",
        stats.cluster_id, report.risk.level, report.risk.score
    );
    let _ = writeln!(
        output,
        "- {} retailers visited by {} trader(s) around ({:.6}, {:.6})",
        stats.retailer_count, stats.trader_count, stats.center_lat, stats.center_lon
    );
    let _ = writeln!(output, "- Retailers: {}", stats.retailer_names.join(", "));

    for pair in &report.similarity.name_pairs {
        let _ = writeln!(
            output,
            "- Similar names: \"{}\" ({}) / \"{}\" ({}) at {:.1}%",
            pair.retailer1, pair.id1, pair.retailer2, pair.id2, pair.similarity
        );
    }
    for group in &report.similarity.phone_groups {
        let _ = writeln!(
            output,
            "- Phone {} shared by {} retailers: {}",
            group.phone,
            group.count(),
            group.retailers.join(", ")
        );
    }
    let _ = writeln!(output);
}

pub fn build_report(result: &AnalysisResult) -> String {
    let summary = result.summary();
    let config = &result.config;
    let mut output = String::new();

    let _ = writeln!(output, "# Duplicate Retailer Report");
    let _ = writeln!(
        output,
        "Run {} generated {} (radius {}m, min samples {}, name threshold {}%)",
        result.run_id,
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        config.radius_meters,
        config.min_samples,
        config.name_threshold
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Unique retailers: {}", summary.unique_retailers);
    let _ = writeln!(output, "- Clusters found: {}", summary.clusters_found);
    let _ = writeln!(output, "- High risk clusters: {}", summary.high_risk_clusters);
    let _ = writeln!(output, "- Retailers in clusters: {}", summary.clustered_retailers);
    let _ = writeln!(output, "- Traders involved: {}", summary.traders_involved);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");
    if result.clusters.is_empty() {
        let _ = writeln!(output, "No clusters found with the current settings.");
    } else {
        for (level, count) in [
            (RiskLevel::High, summary.risk_distribution.high),
            (RiskLevel::Medium, summary.risk_distribution.medium),
            (RiskLevel::Low, summary.risk_distribution.low),
        ] {
            let _ = writeln!(output, "- {}: {} clusters", level, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Highest Risk Clusters");
    if result.clusters.is_empty() {
        let _ = writeln!(output, "No clusters to review.");
        let _ = writeln!(output);
    } else {
        let _ = writeln!(output);
        for report in ranked_clusters(result).into_iter().take(TOP_CLUSTERS) {
            write_cluster(&mut output, report);
        }
    }

    let _ = writeln!(output, "## Similarity Findings");
    let flagged = flagged_clusters(result.clusters.iter().map(|c| &c.similarity));
    if flagged.is_empty() {
        let _ = writeln!(output, "No similar names or shared phones inside any cluster.");
    } else {
        let _ = writeln!(
            output,
            "| Cluster | Similar name pairs | Shared phones | Max name similarity |"
        );
        let _ = writeln!(output, "| --- | --- | --- | --- |");
        for row in &flagged {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {:.1}% |",
                row.cluster_id, row.similar_names_count, row.phone_duplicates_count, row.max_name_similarity
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Traders By Cluster Count");
    let traders = result.trader_cluster_counts(TOP_TRADERS);
    if traders.is_empty() {
        let _ = writeln!(output, "No traders linked to clusters.");
    } else {
        for entry in traders {
            let _ = writeln!(output, "- {}: {} clusters", entry.trader_name, entry.cluster_count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Data Quality");
    if result.issues.is_empty() {
        let _ = writeln!(output, "All visits had usable coordinates.");
    } else {
        let _ = writeln!(
            output,
            "{} visits were excluded from clustering:",
            summary.excluded_records
        );
        for issue in result.issues.iter().take(20) {
            let _ = writeln!(output, "- row {} ({}): {}", issue.row, issue.buyer_id, issue.kind);
        }
    }

    output
}
