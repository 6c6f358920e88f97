//! # ThemisDB CLI Entry Point
//!
//! Main binary for talking to a sharded ThemisDB cluster. Every command prints
//! raw JSON to stdout; errors go to stderr with a non-zero exit code.
//!
//! ## Usage
//!
//! ```bash
//! # Check the health of the first bootstrap node
//! themis -e http://127.0.0.1:8765 health
//!
//! # Show the shard topology
//! themis -e http://127.0.0.1:8765 topology
//!
//! # Write and read an entity
//! themis -e http://127.0.0.1:8765 put relational users 42 '{"name": "Alice"}'
//! themis -e http://127.0.0.1:8765 get relational users 42
//!
//! # Run a query with parameters
//! themis -e http://127.0.0.1:8765 query 'FOR u IN users FILTER u.age > @age RETURN u' -p age=30
//!
//! # Vector search
//! themis -e http://127.0.0.1:8765 search '[0.1, 0.2, 0.3]' -k 5
//! ```
//!
//! Endpoints may also come from `THEMIS_ENDPOINTS` (comma-separated).

use anyhow::Result;
use argh::FromArgs;
use serde::Serialize;
use serde_json::json;
use themis_cli::settings::{
    parse_json, parse_param, parse_value, parse_vector, validate_http_url, ConnectionSettings,
    ENDPOINTS_ENV,
};
use themis_client::{BatchOptions, QueryOptions, ThemisClient, VectorSearchOptions};

/// Main CLI structure parsed from command-line arguments.
///
/// Connection flags come before the subcommand and apply to all of them.
#[derive(FromArgs)]
/// ThemisDB - command-line client for sharded clusters
struct Cli {
    /// bootstrap endpoint URL
    ///
    /// Can be specified multiple times. Falls back to THEMIS_ENDPOINTS when absent.
    /// Must include the http:// prefix; TLS endpoints are not supported.
    #[argh(option, short = 'e', long = "endpoint")]
    endpoints: Vec<String>,

    /// namespace used to build entity keys (default: "default")
    #[argh(option, short = 'n')]
    namespace: Option<String>,

    /// metadata endpoint: an absolute URL or a path on the first endpoint
    #[argh(option, long = "metadata-endpoint")]
    metadata_endpoint: Option<String>,

    /// attempts per request, including the first (default: 3)
    #[argh(option, long = "max-retries")]
    max_retries: Option<usize>,

    /// per-request timeout in milliseconds (default: 30000)
    #[argh(option, long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// concurrent requests for batch commands (default: 4)
    #[argh(option, long = "max-workers")]
    max_workers: Option<usize>,

    #[argh(subcommand)]
    command: Commands,
}

impl Cli {
    fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            endpoints: self.endpoints.clone(),
            namespace: self.namespace.clone(),
            metadata_endpoint: self.metadata_endpoint.clone(),
            max_retries: self.max_retries,
            timeout_ms: self.timeout_ms,
            max_workers: self.max_workers,
        }
    }
}

/// Available CLI subcommands.
#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Health(HealthArgs),
    Topology(TopologyArgs),
    Get(GetArgs),
    Put(PutArgs),
    Delete(DeleteArgs),
    BatchGet(BatchGetArgs),
    BatchDelete(BatchDeleteArgs),
    Query(QueryArgs),
    Search(SearchArgs),
    Traverse(TraverseArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "health")]
/// check the health of a node
struct HealthArgs {
    /// node to check instead of the first bootstrap endpoint
    #[argh(option)]
    node: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "topology")]
/// fetch and print the shard topology
struct TopologyArgs {}

/// Arguments for reading a single entity.
///
/// Prints the stored value, or `null` when the entity does not exist.
#[derive(FromArgs)]
#[argh(subcommand, name = "get")]
/// read an entity
struct GetArgs {
    /// data model (relational, graph, vector, document, ...)
    #[argh(positional)]
    model: String,

    /// collection or table name
    #[argh(positional)]
    collection: String,

    /// entity id
    #[argh(positional)]
    id: String,
}

/// Arguments for writing a single entity.
///
/// The value must be valid JSON unless `--raw` is given, in which case the
/// text is stored verbatim.
#[derive(FromArgs)]
#[argh(subcommand, name = "put")]
/// write an entity
struct PutArgs {
    /// data model
    #[argh(positional)]
    model: String,

    /// collection or table name
    #[argh(positional)]
    collection: String,

    /// entity id
    #[argh(positional)]
    id: String,

    /// value to store
    #[argh(positional)]
    value: String,

    /// store the value as a plain string
    #[argh(switch)]
    raw: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "delete")]
/// delete an entity
struct DeleteArgs {
    /// data model
    #[argh(positional)]
    model: String,

    /// collection or table name
    #[argh(positional)]
    collection: String,

    /// entity id
    #[argh(positional)]
    id: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "batch-get")]
/// read many entities of one collection
struct BatchGetArgs {
    /// data model
    #[argh(positional)]
    model: String,

    /// collection or table name
    #[argh(positional)]
    collection: String,

    /// entity ids
    #[argh(positional)]
    ids: Vec<String>,

    /// abort on the first failed item instead of recording it
    #[argh(switch, long = "fail-fast")]
    fail_fast: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "batch-delete")]
/// delete many entities of one collection
struct BatchDeleteArgs {
    /// data model
    #[argh(positional)]
    model: String,

    /// collection or table name
    #[argh(positional)]
    collection: String,

    /// entity ids
    #[argh(positional)]
    ids: Vec<String>,

    /// abort on the first failed item instead of recording it
    #[argh(switch, long = "fail-fast")]
    fail_fast: bool,
}

/// Arguments for running an AQL query.
///
/// Queries that mention a `urn:themis:` resource go to a single shard; all
/// other queries are sent to every shard and their results concatenated.
#[derive(FromArgs)]
#[argh(subcommand, name = "query")]
/// run an AQL query
struct QueryArgs {
    /// query text
    #[argh(positional)]
    aql: String,

    /// bind parameter as name=value; the value is parsed as JSON when possible
    #[argh(option, short = 'p', long = "param")]
    params: Vec<String>,

    /// server-side batch size
    #[argh(option, long = "batch-size")]
    batch_size: Option<u32>,

    /// request cursor-based pagination
    #[argh(switch, long = "use-cursor")]
    use_cursor: bool,

    /// cursor returned by a previous page
    #[argh(option)]
    cursor: Option<String>,
}

/// Arguments for vector similarity search.
///
/// The vector may be a JSON array (`[0.1, 0.2]`) or comma-separated numbers.
#[derive(FromArgs)]
#[argh(subcommand, name = "search")]
/// run a vector similarity search across all shards
struct SearchArgs {
    /// query vector
    #[argh(positional)]
    vector: String,

    /// number of results to return
    #[argh(option, short = 'k', default = "10")]
    k: usize,

    /// metadata filter as a JSON object
    #[argh(option, short = 'f')]
    filter: Option<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "traverse")]
/// traverse the graph from a start node
struct TraverseArgs {
    /// start node id or URN
    #[argh(positional)]
    start: String,

    /// maximum traversal depth
    #[argh(option, long = "max-depth", default = "3")]
    max_depth: u32,

    /// only follow edges of this type
    #[argh(option, long = "edge-type")]
    edge_type: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Default to WARN so stdout stays parseable JSON; RUST_LOG overrides.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli
        .connection_settings()
        .into_config(std::env::var(ENDPOINTS_ENV).ok())?;
    tracing::debug!("Bootstrap endpoints: {:?}", config.endpoints);
    let client = ThemisClient::new(config)?;

    run(&client, cli.command).await
}

/// Dispatches a parsed subcommand against the client.
async fn run(client: &ThemisClient, command: Commands) -> Result<()> {
    match command {
        Commands::Health(args) => {
            if let Some(node) = &args.node {
                validate_http_url(node, "node address")?;
            }
            print_json(&client.health(args.node.as_deref()).await?)
        }
        Commands::Topology(_) => {
            let topology = client.refresh_topology().await?;
            print_json(&json!({
                "version": topology.version,
                "shards": topology.shards,
            }))
        }
        Commands::Get(args) => {
            let value = client.get(&args.model, &args.collection, &args.id).await?;
            print_json(&value)
        }
        Commands::Put(args) => {
            let value = parse_value(&args.value, args.raw)?;
            let stored = client
                .put(&args.model, &args.collection, &args.id, &value)
                .await?;
            print_json(&json!({ "stored": stored }))
        }
        Commands::Delete(args) => {
            let deleted = client.delete(&args.model, &args.collection, &args.id).await?;
            print_json(&json!({ "deleted": deleted }))
        }
        Commands::BatchGet(args) => {
            let result = client
                .batch_get(&args.model, &args.collection, args.ids, batch_options(args.fail_fast))
                .await?;
            print_json(&result)
        }
        Commands::BatchDelete(args) => {
            let result = client
                .batch_delete(&args.model, &args.collection, args.ids, batch_options(args.fail_fast))
                .await?;
            print_json(&result)
        }
        Commands::Query(args) => run_query(client, args).await,
        Commands::Search(args) => {
            let vector = parse_vector(&args.vector)?;
            let options = VectorSearchOptions {
                filter: args
                    .filter
                    .as_deref()
                    .map(|raw| parse_json(raw, "filter"))
                    .transpose()?,
                ..Default::default()
            };
            let result = client.vector_search(&vector, args.k, &options).await?;
            print_json(&result.results)
        }
        Commands::Traverse(args) => {
            let nodes = client
                .graph_traverse(&args.start, args.max_depth, args.edge_type.as_deref())
                .await?;
            print_json(&nodes)
        }
    }
}

/// Executes the `query` subcommand.
///
/// Prints the merged items together with the pagination state.
async fn run_query(client: &ThemisClient, args: QueryArgs) -> Result<()> {
    let mut options = QueryOptions::new();
    for raw in &args.params {
        let (name, value) = parse_param(raw)?;
        options = options.param(name, value);
    }
    if let Some(batch_size) = args.batch_size {
        options = options.batch_size(batch_size);
    }
    if args.use_cursor {
        options = options.with_cursor();
    }
    if let Some(cursor) = args.cursor {
        options = options.cursor(cursor);
    }

    let result = client.query(&args.aql, &options).await?;
    print_json(&json!({
        "items": result.items,
        "has_more": result.has_more,
        "next_cursor": result.next_cursor,
    }))
}

fn batch_options(fail_fast: bool) -> BatchOptions {
    if fail_fast {
        BatchOptions::raise_on_error()
    } else {
        BatchOptions::default()
    }
}

/// Outputs raw JSON (no pretty-printing) to stdout.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
