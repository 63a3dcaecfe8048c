//! Provision a space from a CSV file and optionally capture a rendered plot.
//!
//! ```text
//! cargo run --example create_space -- \
//!     --cookie "sessionid=..." --name "stocks" --data ./stocks.csv \
//!     --type "Name=title" --type "Description=semantic" \
//!     --plot "Market Cap,Volume" --out plot.png
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use strata_sdk::{ClientConfig, CreateSpaceRequest, DatasetSource, SemanticType, SpaceClient};

#[derive(Debug, Parser)]
#[command(name = "create-space", about = "Provision a Strata space from a CSV")]
struct Cli {
    /// Path prefix the backend API is mounted under
    #[arg(long, default_value = "/api/proxy")]
    api_root: String,

    /// Session cookie header value
    #[arg(long, env = "STRATA_COOKIE")]
    cookie: String,

    /// Name of the space to create
    #[arg(long)]
    name: String,

    /// CSV dataset to upload
    #[arg(long)]
    data: std::path::PathBuf,

    /// column=type pair; repeat per column. Types: title, semantic, numeric,
    /// categoric, date, links. Unmapped columns are dropped server-side.
    #[arg(long = "type", value_parser = parse_type)]
    types: Vec<(String, SemanticType)>,

    /// Capture this "x,y" column pair as a plot after provisioning
    #[arg(long)]
    plot: Option<String>,

    /// Where the captured plot is written
    #[arg(long, default_value = "plot.png")]
    out: std::path::PathBuf,
}

fn parse_type(raw: &str) -> Result<(String, SemanticType), String> {
    let (column, ty) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected column=type, got {raw:?}"))?;
    let ty = match ty {
        "title" => SemanticType::Title,
        "semantic" => SemanticType::Semantic,
        "numeric" => SemanticType::Numeric,
        "categoric" => SemanticType::Categoric,
        "date" => SemanticType::Date,
        "links" => SemanticType::Links,
        other => return Err(format!("unknown semantic type {other:?}")),
    };
    Ok((column.to_string(), ty))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata_sdk=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let client = SpaceClient::new(&cli.api_root, &cli.cookie, ClientConfig::from_env())?;

    let request = CreateSpaceRequest::new(
        &cli.name,
        DatasetSource::file(&cli.data),
        cli.types.into_iter().collect(),
    );
    let space_id = client.create_space(request).await?;
    println!("space {space_id} provisioned");

    if let Some(plot) = cli.plot {
        let (x, y) = plot.split_once(',').context("--plot expects \"x,y\"")?;
        let mut space = client.open_space(space_id).await?;
        let captured = space.render_plot(x.trim(), y.trim()).await;
        space.close().await;
        std::fs::write(&cli.out, captured?)?;
        println!("wrote {}", cli.out.display());
    }

    Ok(())
}
