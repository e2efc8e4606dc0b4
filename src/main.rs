use clap::Parser;
use serde::Serialize;
use solc_recompiler::{compare, init_logs, MatchType, RecompilationResult, Recompiler, Settings};

mod cli;

#[derive(Serialize)]
struct Output {
    #[serde(flatten)]
    result: RecompilationResult,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    match_type: Option<MatchType>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = cli::Args::parse();
    let settings = Settings::new()?;
    init_logs(&settings.tracing)?;

    let metadata = cli::read_metadata(&args.metadata).await?;
    let sources = cli::read_sources(&args.sources).await?;

    let recompiler = Recompiler::from_settings(&settings)?;
    let result = recompiler.recompile(&metadata, &sources).await?;
    let match_type = args
        .reference
        .as_deref()
        .map(|reference| compare(&result.deployed_bytecode, reference));

    println!(
        "{}",
        serde_json::to_string_pretty(&Output { result, match_type })?
    );
    Ok(())
}
