use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kgsearch::cache::RetrievalCache;
use kgsearch::config::validate_retrieve_options;
use kgsearch::graph::{MetaGraph, MetaGraphPlanner, PlanOutcome, QueryPlanner};
use kgsearch::knowledge::{CachedKnowledgeClient, HttpKnowledgeClient, KnowledgeClient};
use kgsearch::llm::OpenAiCompatibleGenerator;
use kgsearch::{Config, GraphRetriever, RetrieveOptions};
use serde::Serialize;
use std::sync::Arc;

/// LLM-guided iterative retrieval over a knowledge graph service.
#[derive(Parser, Debug)]
#[command(name = "kgsearch")]
#[command(about = "Assemble the subgraph of a knowledge base needed to answer a question")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a full retrieval session and print the resulting graph as JSON.
    Search {
        query: String,

        /// Results per similarity search (overrides retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum similarity score (overrides retrieval.similarity_threshold).
        #[arg(long)]
        threshold: Option<f32>,

        /// Neighbor expansion depth (overrides retrieval.max_depth).
        #[arg(long)]
        max_depth: Option<usize>,

        /// Maximum evaluation rounds (overrides retrieval.max_iterations).
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Attach a per-phase trace to the output.
        #[arg(long)]
        trace: bool,

        /// Skip evaluation and return everything from the initial queries.
        #[arg(long)]
        no_optimization: bool,

        #[arg(long)]
        pretty: bool,
    },
    /// Print the meta-graph planned for a query without retrieving anything.
    Plan {
        query: String,

        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Serialize)]
struct PlanReport<'a> {
    fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    meta_graph: &'a MetaGraph,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

/// Knowledge client from config, behind an LRU cache when cache_capacity > 0.
fn build_knowledge_client(config: &Config) -> Result<Arc<dyn KnowledgeClient>> {
    let client = HttpKnowledgeClient::from_config(&config.knowledge)?;
    if config.knowledge.cache_capacity > 0 {
        let cache = Arc::new(RetrievalCache::new(config.knowledge.cache_capacity));
        Ok(Arc::new(CachedKnowledgeClient::new(client, cache)))
    } else {
        Ok(Arc::new(client))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    // Logs go to stderr; stdout carries only JSON
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.kgsearch.log_level),
    )
    .init();

    let generator = Arc::new(OpenAiCompatibleGenerator::from_config(&config.llm)?);

    match args.command {
        Command::Search {
            query,
            top_k,
            threshold,
            max_depth,
            max_iterations,
            trace,
            no_optimization,
            pretty,
        } => {
            let defaults = config.retrieve_options();
            let options = RetrieveOptions {
                top_k: top_k.unwrap_or(defaults.top_k),
                similarity_threshold: threshold.unwrap_or(defaults.similarity_threshold),
                max_depth: max_depth.unwrap_or(defaults.max_depth),
                max_iterations: max_iterations.unwrap_or(defaults.max_iterations),
                enable_tracing: trace || defaults.enable_tracing,
                enable_optimization: defaults.enable_optimization && !no_optimization,
                ..defaults
            };
            validate_retrieve_options(&options).context("Invalid search options")?;

            let knowledge = build_knowledge_client(&config)?;
            let retriever = GraphRetriever::from_generator(generator, knowledge);
            let output = retriever.retrieve(&query, &options).await?;
            print_json(&output, pretty)?;
        }
        Command::Plan { query, pretty } => {
            let outcome = MetaGraphPlanner::new(generator).plan(&query).await;
            let report = match &outcome {
                PlanOutcome::Generated(meta_graph) => PlanReport {
                    fallback: false,
                    reason: None,
                    meta_graph,
                },
                PlanOutcome::Fallback { meta_graph, reason } => PlanReport {
                    fallback: true,
                    reason: Some(reason.as_str()),
                    meta_graph,
                },
            };
            print_json(&report, pretty)?;
        }
    }

    Ok(())
}
