use semantic_sql::config::AppConfig;
use semantic_sql::db::PostgresBackend;
use semantic_sql::intent::{QueryIntent, SortDirection, TimeRange};
use semantic_sql::llm::describe_schema;
use semantic_sql::schema::{Schema, SchemaSpec};
use semantic_sql::{QueryService, SchemaIntrospector};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "semsql")]
#[command(about = "Schema-grounded natural language to SQL")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question against a configured database
    Ask {
        /// The question in natural language
        question: String,

        /// Database name from the registry (default: DEFAULT_DATABASE)
        #[arg(short, long)]
        database: Option<String>,

        /// Have the model produce an intent and compile it, instead of writing SQL
        #[arg(long)]
        semantic: bool,
    },
    /// Resolve and compile an intent without executing it
    Plan {
        #[arg(long)]
        entity: String,

        /// Metric name (default: Count)
        #[arg(long, default_value = "Count")]
        metric: String,

        /// last_month, all_time or none
        #[arg(long, default_value = "none")]
        time_range: String,

        #[arg(long)]
        limit: Option<u32>,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        #[command(flatten)]
        source: SchemaSource,
    },
    /// Validate SQL text against a schema
    Validate {
        sql: String,

        #[command(flatten)]
        source: SchemaSource,
    },
    /// Print the introspected schema of a database
    Schema {
        #[command(flatten)]
        source: SchemaSource,

        /// Print the prompt listing instead of JSON
        #[arg(long)]
        prompt: bool,
    },
}

#[derive(clap::Args)]
struct SchemaSource {
    /// Read the schema from a JSON file instead of introspecting
    #[arg(long)]
    schema_file: Option<PathBuf>,

    /// Database name from the registry (default: DEFAULT_DATABASE)
    #[arg(short, long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    match args.command {
        Commands::Ask { question, database, semantic } => {
            let database = database.unwrap_or_else(|| config.default_database.clone());
            let service = QueryService::from_config(&config)?;
            let response = if semantic {
                service.ask_semantic(&database, &question).await?
            } else {
                service.ask(&database, &question).await?
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Plan { entity, metric, time_range, limit, asc, source } => {
            let schema = load_schema(&source, &config).await?;
            let direction = if asc { SortDirection::Asc } else { SortDirection::Desc };
            let intent = QueryIntent::new(&entity, &metric, TimeRange::parse(&time_range)?, limit)?
                .with_direction(direction);
            let semantics = config.semantic_catalog()?;
            let plan = semantic_sql::resolve(&intent, &semantics, &schema)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            println!("{}", semantic_sql::compile(&plan));
        }
        Commands::Validate { sql, source } => {
            let schema = load_schema(&source, &config).await?;
            match semantic_sql::validate(&sql, &schema) {
                Ok(()) => println!("valid"),
                Err(err) => anyhow::bail!("{} ({})", err, err.kind()),
            }
        }
        Commands::Schema { source, prompt } => {
            let schema = load_schema(&source, &config).await?;
            if prompt {
                print!("{}", describe_schema(&schema));
            } else {
                println!("{}", serde_json::to_string_pretty(&SchemaSpec::from(&schema))?);
            }
        }
    }

    Ok(())
}

async fn load_schema(source: &SchemaSource, config: &AppConfig) -> Result<Schema> {
    if let Some(path) = &source.schema_file {
        info!("Loading schema from {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file {:?}", path))?;
        let spec: SchemaSpec = serde_json::from_str(&content)
            .with_context(|| format!("Invalid schema file {:?}", path))?;
        return Ok(Schema::from(spec));
    }

    let database = source
        .database
        .clone()
        .unwrap_or_else(|| config.default_database.clone());
    let db = config
        .databases
        .get(&database)
        .with_context(|| format!("Unknown database: {}", database))?;
    info!("Introspecting database '{}'", database);
    Ok(PostgresBackend::from_config(db).introspect().await?)
}
