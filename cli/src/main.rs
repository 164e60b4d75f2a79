use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trellis::{codegen, server, Config, Context};

/// Graph-shaped query gateway for relational databases.
#[derive(Debug, Parser)]
#[command(name = "trellis", version)]
struct Args {
    /// Create a new project in the given directory.
    #[arg(long, value_name = "DIR")]
    init: Option<PathBuf>,

    /// Introspect the database and write db.json plus the model stub.
    #[arg(long)]
    build: bool,

    /// Environment defined in config.yaml.
    #[arg(long, env = "TRELLIS_ENV", default_value = "local")]
    env: String,

    /// Port to serve on.
    #[arg(long, env = "TRELLIS_PORT", default_value_t = 40000)]
    port: u16,

    /// Project directory; defaults to the working directory.
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "parsed arguments");
    let project_dir = match &args.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    if let Some(dir) = &args.init {
        codegen::scaffold(dir)?;
        println!("BUILD SUCCESS!");
        println!(
            "Check the database environment in config.yaml and run a build. \
             (ex: trellis --build --env local)"
        );
        return Ok(());
    }

    if args.build {
        let config = Config::load(&project_dir)?;
        let schema = codegen::build(&project_dir, &args.env, &config).await?;
        println!(
            "Introspected {} tables into db.json and {}.",
            schema.tables.len(),
            codegen::MODELS_FILENAME
        );
        return Ok(());
    }

    let ctx = Context::initialize(&project_dir, &args.env).await?;
    server::run(Arc::new(ctx), args.port).await?;
    Ok(())
}
