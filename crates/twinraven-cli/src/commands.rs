use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use twinraven_sdk::{Client, MiningConfig};

use crate::args::{Cli, Commands, ExportCommand, ScanCommand};
use crate::output::{self, ok, warn};

pub async fn run(cli: Cli) -> Result<()> {
    let client = match &cli.workspace {
        Some(path) => Client::open(path).context("opening workspace")?,
        None => Client::builder().build().context("opening workspace")?,
    };

    match cli.command {
        Commands::Init => {
            println!(
                "{} {}",
                ok("workspace ready:"),
                client.workspace_path().display()
            );
            Ok(())
        }

        Commands::Mine {
            min_support,
            min_confidence,
            max_chain_length,
        } => {
            let config = MiningConfig {
                min_support,
                min_confidence,
                max_chain_length,
                ..MiningConfig::default()
            };
            let candidates = client.mine(&config)?;
            output::render(cli.format, &candidates, |candidates| {
                if candidates.is_empty() {
                    println!("{}", warn("no candidate chains found"));
                }
                for chain in candidates {
                    println!(
                        "{}  support={:.3} confidence={:.3} failure_rate={:.3}",
                        chain.tools.join(" -> "),
                        chain.support,
                        chain.confidence,
                        chain.failure_rate
                    );
                }
            })
        }

        Commands::Candidates { since } => {
            let since = parse_timestamp(&since)?;
            let candidates = client.candidates_since(since)?;
            output::render(cli.format, &candidates, |candidates| {
                for chain in candidates {
                    println!(
                        "{}  discovered_at={}",
                        chain.tools.join(" -> "),
                        chain.discovered_at
                    );
                }
            })
        }

        Commands::Tools { state } => {
            let tools = client.list_tools(state.map(Into::into))?;
            output::render(cli.format, &tools, |tools| {
                for tool in tools {
                    let status = match tool.retirement_reason {
                        Some(reason) => warn(&format!("retired ({:?})", reason)),
                        None => ok("promoted"),
                    };
                    println!("{}  v{}  {}", tool.slug, tool.current_version, status);
                }
            })
        }

        Commands::ToolHistory { slug } => {
            let history = client.tool_version_history(&slug)?;
            output::render(cli.format, &history, |history| {
                for version in history {
                    let status = if version.superseded_at.is_some() {
                        "superseded"
                    } else {
                        "current"
                    };
                    println!(
                        "v{}  {}  pass={} mean_equivalence={:.3}",
                        version.version,
                        status,
                        version.validation.pass,
                        version.validation.equivalence.mean
                    );
                }
            })
        }

        Commands::Retire { slug, reason } => {
            client.retire_tool(&slug, reason.into()).await?;
            println!("{} {}", ok("retired:"), slug);
            Ok(())
        }

        Commands::Scan { kind } => run_scan(&client, cli.format, kind).await,

        Commands::Export { kind } => run_export(&client, kind),
    }
}

async fn run_scan(
    client: &Client,
    format: crate::args::OutputFormat,
    kind: ScanCommand,
) -> Result<()> {
    match kind {
        ScanCommand::Staleness => {
            let slugs = client.staleness_scan().await?;
            output::render(format, &slugs, |slugs| {
                for slug in slugs {
                    println!("{} {}", warn("stale:"), slug);
                }
            })
        }
        ScanCommand::FailureSpike => {
            let slugs = client.failure_spike_scan().await?;
            output::render(format, &slugs, |slugs| {
                for slug in slugs {
                    println!("{} {}", warn("failure spike:"), slug);
                }
            })
        }
        ScanCommand::Drift { since } => {
            let since = parse_timestamp(&since)?;
            let flags = client.drift_scan(since).await?;
            output::render(format, &flags, |flags| {
                for flag in flags {
                    println!("{} {}  ratio={:.3}", warn("drift:"), flag.slug, flag.ratio);
                }
            })
        }
    }
}

fn run_export(client: &Client, kind: ExportCommand) -> Result<()> {
    match kind {
        ExportCommand::Ndjson { path } => {
            let count = client.export_ndjson(std::path::Path::new(&path))?;
            println!("{} {} events -> {}", ok("exported"), count, path);
            Ok(())
        }
        ExportCommand::Columnar { path, batch_rows } => {
            let count = client.export_columnar(std::path::Path::new(&path), batch_rows)?;
            println!("{} {} events -> {}", ok("exported"), count, path);
            Ok(())
        }
        ExportCommand::Spans { path } => {
            let spans = client.spans()?;
            let count = spans.len();
            let json = serde_json::to_vec(&spans.iter().map(span_json).collect::<Vec<_>>())?;
            std::fs::write(&path, json)?;
            println!("{} {} spans -> {}", ok("exported"), count, path);
            Ok(())
        }
    }
}

fn span_json(span: &twinraven_sdk::Span) -> serde_json::Value {
    serde_json::json!({
        "trace_id": hex(&span.trace_id),
        "span_id": hex(&span.span_id),
        "link": span.link.map(|l| hex(&l)),
        "name": span.name,
        "status": format!("{:?}", span.status),
        "attributes": span.attributes,
    })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("parsing timestamp `{}`", raw))
}
