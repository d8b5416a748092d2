use std::path::PathBuf;
use clap::Parser;
use serde_json::json;
use fruit_grade::common::{GradeImage, PipelineConfig, Preset};
use fruit_grade::data::FsAccess;
use fruit_grade::detection_runners::CancelToken;
use fruit_grade::init_orchestrator;

#[derive(Parser, Debug)]
#[command(name = "grade_fruit")]
#[command(about = "Grades fruit photographs and prints one JSON line per image")]
struct Cli {
    /// Pipeline configuration (JSON), laid over the preset.
    /// Defaults to pipeline.json in the user configuration directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base preset: standard, variety-aware or compact
    #[arg(short, long, default_value = "standard")]
    preset: Preset,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Images to grade
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let base = PipelineConfig::preset(cli.preset);

    let config_path = match cli.config {
        Some(path) => Some(path),
        None => FsAccess::default_config_file().filter(|p| p.exists()),
    };
    let config = match &config_path {
        Some(path) => {
            log::info!("Using configuration {}", path.display());
            PipelineConfig::from_json_file_over(path, &base)?
        }
        None => base,
    };

    if let Some(path) = cli.dump_config {
        config.to_json_file(&path)?;
        log::info!("Configuration written to {}", path.display());
        return Ok(());
    }

    if cli.images.is_empty() {
        anyhow::bail!("no images given");
    }

    let orchestrator = init_orchestrator(&config)?;
    let cancel = CancelToken::new();

    for path in &cli.images {
        let line = match GradeImage::open(path) {
            Err(err) => json!({ "image": path, "error": format!("{err:#}") }),
            Ok(image) => match orchestrator.analyze(&image, &cancel).await {
                Ok(result) => json!({ "image": path, "result": result }),
                Err(err) => json!({ "image": path, "error": err.to_string() }),
            },
        };
        println!("{line}");
    }

    Ok(())
}
