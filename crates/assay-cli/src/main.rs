//! Assay evaluation runner.
//!
//! Loads a ratings file (relevance judgments plus per-version ranked hit
//! lists for every query), drives the evaluation tree the same way a
//! server-side connector would, and prints the finished metric tree.
//!
//! # Usage
//!
//! ```bash
//! # Human-readable report
//! cargo run -p assay-cli -- ratings.json
//!
//! # JSON report for dashboards
//! cargo run -p assay-cli -- ratings.json --json
//!
//! # Engine tracing
//! RUST_LOG=assay_core=debug cargo run -p assay-cli -- ratings.json
//! ```
//!
//! # Ratings format
//!
//! ```json
//! {
//!   "evaluation": "nightly",
//!   "corpus": "electronics",
//!   "topics": [{
//!     "name": "cables",
//!     "query_groups": [{
//!       "name": "hdmi",
//!       "queries": [{
//!         "name": "4k hdmi cable",
//!         "judgments": { "doc1": 3, "doc4": 1 },
//!         "versions": {
//!           "v1.0": { "total_hits": 42, "hits": [{ "_id": "doc1" }] }
//!         }
//!       }]
//!     }]
//!   }]
//! }
//! ```

use anyhow::{Context, Result};
use assay_core::{EvaluationTree, Judgments, MemberId, SearchHit};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "assay")]
#[command(about = "Evaluate search relevance from a ratings file")]
struct Args {
    /// Path to the ratings JSON file
    ratings: PathBuf,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,
}

// =============================================================================
// Ratings input
// =============================================================================

#[derive(Debug, Deserialize)]
struct RatingsFile {
    #[serde(default = "default_evaluation_name")]
    evaluation: String,
    corpus: String,
    topics: Vec<TopicRatings>,
}

fn default_evaluation_name() -> String {
    "evaluation".to_string()
}

#[derive(Debug, Deserialize)]
struct TopicRatings {
    name: String,
    query_groups: Vec<GroupRatings>,
}

#[derive(Debug, Deserialize)]
struct GroupRatings {
    name: String,
    queries: Vec<QueryRatings>,
}

#[derive(Debug, Deserialize)]
struct QueryRatings {
    name: String,
    #[serde(default)]
    judgments: Judgments,
    /// BTreeMap keeps version evaluation order stable across runs.
    versions: BTreeMap<String, VersionRatings>,
}

#[derive(Debug, Deserialize)]
struct VersionRatings {
    /// Total reported by the search system; defaults to the hit count.
    total_hits: Option<u64>,
    hits: Vec<SearchHit>,
}

// =============================================================================
// Report output
// =============================================================================

#[derive(Debug, Serialize)]
struct NodeReport {
    name: String,
    kind: String,
    metrics: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeReport>,
}

fn build_report(tree: &EvaluationTree, id: MemberId) -> Result<NodeReport> {
    let metrics = tree
        .metrics_snapshot(id)?
        .into_iter()
        .map(|(metric, by_version)| {
            let by_version = by_version
                .into_iter()
                .map(|(version, value)| (version, value.to_f64()))
                .collect();
            (metric, by_version)
        })
        .collect();
    let children = tree
        .children(id)?
        .into_iter()
        .map(|child| build_report(tree, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(NodeReport {
        name: tree.name(id)?,
        kind: tree.kind(id)?.to_string(),
        metrics,
        children,
    })
}

fn print_text(node: &NodeReport, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{} [{}]", node.name, node.kind);
    for (metric, by_version) in &node.metrics {
        let values: Vec<String> = by_version
            .iter()
            .map(|(version, value)| format!("{version}={value:.4}"))
            .collect();
        println!("{indent}  {metric}: {}", values.join("  "));
    }
    for child in &node.children {
        print_text(child, depth + 1);
    }
}

// =============================================================================
// Evaluation
// =============================================================================

fn evaluate(ratings: RatingsFile) -> Result<EvaluationTree> {
    let tree = EvaluationTree::new(ratings.evaluation);
    let corpus = tree.find_or_create(tree.root(), &ratings.corpus)?;

    let mut queries = 0_usize;
    for topic in ratings.topics {
        let topic_id = tree.find_or_create(corpus, &topic.name)?;
        for group in topic.query_groups {
            let group_id = tree.find_or_create(topic_id, &group.name)?;
            for query in group.queries {
                let query_id = tree.find_or_create(group_id, &query.name)?;
                tree.set_judgments(query_id, query.judgments)?;
                for (version, run) in query.versions {
                    let total = run.total_hits.unwrap_or(run.hits.len() as u64);
                    tree.set_total_hits(query_id, &version, total)?;
                    for (index, hit) in run.hits.into_iter().enumerate() {
                        tree.collect(query_id, hit, index as u64 + 1, &version)?;
                    }
                }
                tree.notify_collected_metrics(query_id)?;
                queries += 1;
            }
        }
    }
    info!(queries, "evaluation complete");
    Ok(tree)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let raw = fs::read_to_string(&args.ratings)
        .with_context(|| format!("reading {}", args.ratings.display()))?;
    let ratings: RatingsFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.ratings.display()))?;

    let tree = evaluate(ratings)?;
    let report = build_report(&tree, tree.root())?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report, 0);
    }
    Ok(())
}
