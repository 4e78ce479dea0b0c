use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use log::info;

use retailer_cluster_guard::filters::{self, VisitFilter};
use retailer_cluster_guard::models::RiskLevel;
use retailer_cluster_guard::{export, ingest, report, run_analysis, AnalysisConfig, VisitRecord};

#[derive(Parser)]
#[command(name = "retailer-cluster-guard")]
#[command(about = "Detects duplicate retailer identities created at the same location", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct AnalysisArgs {
    /// Visit export to analyse
    #[arg(long)]
    csv: PathBuf,
    #[arg(long, env = "RCG_RADIUS_METERS", default_value_t = 10.0)]
    radius_meters: f64,
    #[arg(long, env = "RCG_MIN_SAMPLES", default_value_t = 2)]
    min_samples: usize,
    #[arg(long, env = "RCG_NAME_THRESHOLD", default_value_t = 90.0)]
    name_threshold: f64,
    /// Only keep visits from these sites (repeatable)
    #[arg(long = "site")]
    sites: Vec<String>,
    /// Only keep visits by these traders (repeatable)
    #[arg(long = "trader")]
    traders: Vec<String>,
    /// Earliest visit time, e.g. 2024-03-01 or 2024-03-01 09:00:00
    #[arg(long, value_parser = parse_bound)]
    from: Option<NaiveDateTime>,
    #[arg(long, value_parser = parse_bound)]
    to: Option<NaiveDateTime>,
}

impl AnalysisArgs {
    fn config(&self) -> AnalysisConfig {
        AnalysisConfig::new(self.radius_meters, self.min_samples, self.name_threshold)
    }

    fn filter(&self) -> VisitFilter {
        VisitFilter {
            sites: self.sites.clone(),
            traders: self.traders.clone(),
            from: self.from,
            to: self.to,
        }
    }

    fn load(&self) -> anyhow::Result<Vec<VisitRecord>> {
        let visits = ingest::read_visits(&self.csv)
            .with_context(|| format!("failed to load visits from {}", self.csv.display()))?;
        let filter = self.filter();
        if filter.is_empty() {
            return Ok(visits);
        }
        let kept = filters::apply(&visits, &filter);
        info!("Filters kept {} of {} visits", kept.len(), visits.len());
        Ok(kept)
    }
}

fn parse_bound(value: &str) -> Result<NaiveDateTime, String> {
    ingest::parse_timestamp(value).ok_or_else(|| format!("unrecognised date or time: {value}"))
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster retailers, score every cluster and write a markdown report
    Analyze {
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Only list and export clusters at these risk levels (repeatable)
        #[arg(long = "risk-level", value_enum, ignore_case = true)]
        risk_levels: Vec<RiskLevel>,
        /// Also write the full analysis result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        /// Write one CSV row per cluster
        #[arg(long)]
        summary_csv: Option<PathBuf>,
        /// Write every visit that fell into a cluster, with its risk
        #[arg(long)]
        flagged_csv: Option<PathBuf>,
    },
    /// Show the retailers, findings and distance matrix of one cluster
    Cluster {
        #[command(flatten)]
        analysis: AnalysisArgs,
        #[arg(long)]
        id: usize,
    },
    /// List the sites, traders and date range available for filtering
    Options {
        #[arg(long)]
        csv: PathBuf,
    },
}

fn create(path: &Path) -> anyhow::Result<File> {
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            analysis,
            out,
            risk_levels,
            json,
            summary_csv,
            flagged_csv,
        } => {
            let visits = analysis.load()?;
            let result = run_analysis(&visits, &analysis.config()).context("analysis failed")?;
            let summary = result.summary();

            if result.clusters.is_empty() {
                println!("No clusters found. Try a larger radius or fewer filters.");
            } else {
                println!(
                    "{} clusters across {} retailers ({} high risk).",
                    summary.clusters_found, summary.unique_retailers, summary.high_risk_clusters
                );
                let selected: Vec<_> = report::ranked_clusters(&result)
                    .into_iter()
                    .filter(|c| risk_levels.is_empty() || risk_levels.contains(&c.risk.level))
                    .collect();
                if selected.is_empty() {
                    println!("No clusters at the selected risk levels.");
                }
                for cluster in selected.iter().take(10) {
                    println!(
                        "- cluster {}: {} retailers, {} trader(s), score {} ({})",
                        cluster.stats.cluster_id,
                        cluster.stats.retailer_count,
                        cluster.stats.trader_count,
                        cluster.risk.score,
                        cluster.risk.level
                    );
                }
            }
            if summary.excluded_records > 0 {
                println!(
                    "{} visits skipped for bad coordinates.",
                    summary.excluded_records
                );
            }

            std::fs::write(&out, report::build_report(&result))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = json {
                serde_json::to_writer_pretty(create(&path)?, &result)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("JSON written to {}.", path.display());
            }
            if let Some(path) = summary_csv {
                let rows = export::write_cluster_summary(
                    result.clusters_at_levels(&risk_levels),
                    create(&path)?,
                )?;
                println!("Wrote {rows} cluster rows to {}.", path.display());
            }
            if let Some(path) = flagged_csv {
                let rows = export::write_flagged_visits(&result, &visits, create(&path)?)?;
                println!("Wrote {rows} flagged visits to {}.", path.display());
            }
        }
        Commands::Cluster { analysis, id } => {
            let visits = analysis.load()?;
            let result = run_analysis(&visits, &analysis.config()).context("analysis failed")?;
            let details = result.cluster_details(id)?;
            let matrix = result.distance_matrix(id)?;

            if let Some(cluster) = result.cluster(id) {
                println!(
                    "Cluster {}: {} risk, score {}/100, centre ({:.6}, {:.6})",
                    id,
                    cluster.risk.level,
                    cluster.risk.score,
                    cluster.stats.center_lat,
                    cluster.stats.center_lon
                );
                for pair in &cluster.similarity.name_pairs {
                    println!(
                        "  similar: {} ({}) ~ {} ({}) {:.1}%",
                        pair.retailer1, pair.id1, pair.retailer2, pair.id2, pair.similarity
                    );
                }
                for group in &cluster.similarity.phone_groups {
                    println!("  phone {} shared by {}", group.phone, group.ids.join(", "));
                }
            }

            println!("Retailers:");
            for detail in &details {
                let latest = detail
                    .latest_visit
                    .map(|at| at.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "- {} ({}) phone {} by {} at {}, latest {}, {} visit(s), selfie {}, document {}",
                    detail.buyer_name,
                    detail.buyer_id,
                    detail.buyer_phone,
                    detail.trader_name,
                    detail.site_name,
                    latest,
                    detail.visit_count,
                    if detail.has_selfie { "yes" } else { "no" },
                    if detail.has_verification { "yes" } else { "no" }
                );
            }

            if !matrix.is_empty() {
                println!("Distances (m):");
                for (row, buyer_id) in matrix.meters.iter().zip(&matrix.buyer_ids) {
                    let cells: Vec<String> = row.iter().map(|m| format!("{m:8.1}")).collect();
                    println!("{buyer_id:>12} {}", cells.join(" "));
                }
            }
        }
        Commands::Options { csv } => {
            let visits = ingest::read_visits(&csv)
                .with_context(|| format!("failed to load visits from {}", csv.display()))?;
            let options = filters::filter_options(&visits);
            println!("Sites: {}", options.sites.join(", "));
            println!("Traders: {}", options.traders.join(", "));
            match options.date_range {
                Some((first, last)) => println!("Visits from {first} to {last}"),
                None => println!("No dated visits."),
            }
        }
    }

    Ok(())
}
