use candle_core::{utils::cuda_is_available, Device};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::cli::Cli;

pub fn setup_tracing(verbose: bool) {
  let subscriber = FmtSubscriber::builder()
    .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
    .with_target(false)
    .finish();

  tracing::subscriber::set_global_default(subscriber).expect("Setting default subscriber failed");
}

pub fn setup_args(args: &Cli) -> Result<Device, &'static str> {
  if args.batch == 0 || args.size == 0 {
    return Err("Probe batch and size must be positive");
  }

  if args.use_cpu {
    return Ok(Device::Cpu);
  }

  if !cuda_is_available() {
    tracing::warn!("Built without CUDA support, falling back to CPU...");
    return Ok(Device::Cpu);
  }

  Device::new_cuda(0).map_err(|_| "Failed to open CUDA device 0")
}
