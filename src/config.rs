use std::path::PathBuf;

use clap::Parser;

/// Server settings, read from flags, the environment or a `.env` file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Glucose Level Prediction API", long_about = None)]
pub struct Settings {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Number of HTTP workers (defaults to the number of CPUs)
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    /// Regression model artifact (.onnx or .json)
    #[arg(long, env = "MODEL_PATH", default_value = "models/best_model.onnx")]
    pub model_path: PathBuf,

    /// Feature scaler artifact (.json or .onnx); skipped when absent
    #[arg(long, env = "SCALER_PATH", default_value = "models/scaler.json")]
    pub scaler_path: PathBuf,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Exit at startup if the model cannot be loaded
    #[arg(long, env = "REQUIRE_MODEL", default_value_t = false)]
    pub require_model: bool,
}

impl Settings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.filter(|w| *w > 0).unwrap_or_else(num_cpus::get)
    }
}
