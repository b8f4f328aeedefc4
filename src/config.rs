use crate::model::default_thread_count;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct Config {
    #[arg(long, env, default_value = "0.0.0.0:5000")]
    pub bind_addr: String,
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: String,
    /// Inference threads; half of the available CPUs when unset.
    #[arg(long, env)]
    pub n_threads: Option<i32>,
    #[arg(long, env, default_value_t = 0)]
    pub n_gpu_layers: u32,
    /// Serve Prometheus metrics on this address when set.
    #[arg(long, env)]
    pub metrics_addr: Option<String>,
}

impl Config {
    pub fn thread_count(&self) -> i32 {
        match self.n_threads {
            Some(n) if n > 0 => n,
            _ => default_thread_count(),
        }
    }
}
