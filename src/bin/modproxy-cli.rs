use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use modproxy::module::{ModuleIdentity, ModuleVersion, RequestKind};

#[derive(Parser)]
#[command(name = "modproxy-cli")]
#[command(about = "Query a running Go module proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080", env = "MODPROXY_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List known versions of a module
    Versions { module: String },
    /// Show the latest version of a module
    Latest { module: String },
    /// Show version metadata
    Info { module: String, version: String },
    /// Print the go.mod of a version
    Mod { module: String, version: String },
    /// Download the source archive of a version
    Zip {
        module: String,
        version: String,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let (module, kind) = match &cli.command {
        Commands::Versions { module } => (
            ModuleIdentity::new(module, ModuleVersion::None)?,
            RequestKind::VersionList,
        ),
        Commands::Latest { module } => (
            ModuleIdentity::new(module, ModuleVersion::Latest)?,
            RequestKind::Latest,
        ),
        Commands::Info { module, version } => (
            ModuleIdentity::exact(module, version.as_str())?,
            RequestKind::VersionInfo,
        ),
        Commands::Mod { module, version } => (
            ModuleIdentity::exact(module, version.as_str())?,
            RequestKind::Manifest,
        ),
        Commands::Zip { module, version, .. } => (
            ModuleIdentity::exact(module, version.as_str())?,
            RequestKind::Archive,
        ),
    };

    let url = format!("{}/{}", base, module.relative_path(kind)?);
    let res = client.get(&url).send().await?;
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: {module} {kind} returned status {status}");
        if let Ok(text) = res.text().await {
            eprintln!("{}", text.trim_end());
        }
        std::process::exit(1);
    }

    match cli.command {
        Commands::Zip { output, .. } => {
            let mut file = tokio::fs::File::create(&output).await?;
            let mut written = 0u64;
            let mut body = res.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                written += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            println!("Wrote {written} bytes to {}", output.display());
        }
        Commands::Info { .. } | Commands::Latest { .. } => print_json(res).await?,
        Commands::Versions { .. } | Commands::Mod { .. } => {
            let text = res.text().await?;
            println!("{}", text.trim_end());
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
