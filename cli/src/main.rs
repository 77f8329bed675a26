use std::io::Write;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use datafetch_core::{
    Config, DatasourceApi, DatasourceId, DatasourceStore, Transport, UreqTransport, DEFAULT_LIMIT,
    DEFAULT_SKIP,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datafetch", about = "Manage datasources through the datafetch REST API")]
struct Cli {
    /// Backend base URL. Overrides DATAFETCH_API_BASE_URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Log requests and responses to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// List datasources.
    List {
        #[arg(long, default_value_t = DEFAULT_SKIP)]
        skip: u64,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u64,
    },
    /// Show one datasource.
    Get { id: DatasourceId },
    /// Create a datasource from a JSON object.
    Create { json: String },
    /// Update a datasource with a JSON object.
    Update { id: DatasourceId, json: String },
    /// Delete a datasource.
    Delete { id: DatasourceId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::from_env().context("failed to read configuration")?;
    if let Some(base_url) = cli.base_url {
        config.api_base_url = base_url;
    }
    tracing::debug!(base_url = %config.api_base_url, "using backend");

    let store = DatasourceStore::new(DatasourceApi::from_config(&config, UreqTransport::new()));
    run(&store, cli.command, &mut std::io::stdout().lock()).await
}

async fn run<T, W>(store: &DatasourceStore<T>, command: Command, out: &mut W) -> anyhow::Result<()>
where
    T: Transport,
    W: Write,
{
    match command {
        Command::List { skip, limit } => {
            store.fetch_datasources_page(skip, limit).await;
            check(store)?;
            print_json(out, &store.datasources())
        }
        Command::Get { id } => {
            let datasource = store.fetch_datasource_by_id(id).await;
            check(store)?;
            print_json(out, &datasource)
        }
        Command::Create { json } => {
            let payload = parse_payload(&json)?;
            let created = store.create_datasource(&payload).await;
            check(store)?;
            print_json(out, &created)
        }
        Command::Update { id, json } => {
            let payload = parse_payload(&json)?;
            let updated = store.update_datasource(id, &payload).await;
            check(store)?;
            print_json(out, &updated)
        }
        Command::Delete { id } => {
            if !store.delete_datasource(id).await {
                check(store)?;
                bail!("failed to delete datasource {id}");
            }
            writeln!(out, "deleted datasource {id}")?;
            Ok(())
        }
    }
}

fn check<T: Transport>(store: &DatasourceStore<T>) -> anyhow::Result<()> {
    match store.error() {
        Some(err) => bail!("{} error: {}", err.kind, err.message),
        None => Ok(()),
    }
}

fn parse_payload(raw: &str) -> anyhow::Result<Value> {
    let payload: Value = serde_json::from_str(raw).context("payload is not valid JSON")?;
    if !payload.is_object() {
        bail!("payload must be a JSON object");
    }
    Ok(payload)
}

fn print_json<W: Write, V: Serialize>(out: &mut W, value: &V) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use datafetch_core::{ApiError, DatasourceClient, HttpRequest, HttpResponse};

    /// Answers every request with the same response.
    struct Canned(u16, &'static str);

    impl Transport for Canned {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, ApiError> {
            Ok(HttpResponse::new(self.0, self.1))
        }
    }

    fn store(status: u16, body: &'static str) -> DatasourceStore<Canned> {
        DatasourceStore::new(DatasourceApi::new(
            DatasourceClient::new("http://backend.test"),
            Canned(status, body),
        ))
    }

    async fn output(store: &DatasourceStore<Canned>, command: Command) -> anyhow::Result<String> {
        let mut out = Vec::new();
        run(store, command, &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_uses_default_page() {
        let cli = Cli::try_parse_from(["datafetch", "list"]).unwrap();
        assert_eq!(cli.command, Command::List { skip: 0, limit: 100 });
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["datafetch", "get", "3", "--base-url", "http://x", "-v"]).unwrap();
        assert_eq!(cli.command, Command::Get { id: 3 });
        assert_eq!(cli.base_url.as_deref(), Some("http://x"));
        assert!(cli.verbose);
    }

    #[test]
    fn update_takes_id_and_json() {
        let cli = Cli::try_parse_from(["datafetch", "update", "4", r#"{"name":"x"}"#]).unwrap();
        assert_eq!(
            cli.command,
            Command::Update {
                id: 4,
                json: r#"{"name":"x"}"#.to_string()
            }
        );
    }

    #[test]
    fn payload_must_be_object() {
        assert!(parse_payload(r#"{"name":"x"}"#).is_ok());
        assert!(parse_payload("[1,2]").is_err());
        assert!(parse_payload("{nope").is_err());
    }

    #[tokio::test]
    async fn list_prints_datasources() {
        let store = store(200, r#"[{"id":1,"name":"a"}]"#);
        let out = output(&store, Command::List { skip: 0, limit: 100 }).await.unwrap();
        let printed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(printed, serde_json::json!([{"id": 1, "name": "a"}]));
    }

    #[tokio::test]
    async fn get_reports_backend_detail() {
        let store = store(404, r#"{"detail":"not found"}"#);
        let err = output(&store, Command::Get { id: 9 }).await.unwrap_err();
        assert_eq!(err.to_string(), "status error: not found");
    }

    #[tokio::test]
    async fn delete_confirms() {
        let store = store(204, "");
        let out = output(&store, Command::Delete { id: 2 }).await.unwrap();
        assert_eq!(out, "deleted datasource 2\n");
    }
}
