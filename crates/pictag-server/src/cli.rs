use clap::Parser;
use pictag_vision::DeviceSpec;

#[derive(Parser, Debug)]
#[command(name = "pictag-server")]
#[command(
    author,
    version,
    about = "Image classification service with a browser upload page",
    long_about = None
)]
pub struct Cli {
    /// Configuration file path (ignored if it does not exist)
    #[arg(short, long, default_value = "pictag.yaml")]
    pub config: String,

    /// Model identifier: local directory or Hugging Face repository id
    #[arg(short, long, env = "MODEL_ID")]
    pub model_id: Option<String>,

    /// Hugging Face revision for hub model ids
    #[arg(long)]
    pub revision: Option<String>,

    /// Inference device: auto, cpu, cuda[:N] or metal[:N]
    #[arg(short, long)]
    pub device: Option<DeviceSpec>,

    /// Listen address
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Maximum request body size in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
