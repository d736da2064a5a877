mod cli;
mod setup;

use std::process::ExitCode;

use candle_core::{DType, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Parser;
use mulres_unet::AssembledGraph;

use crate::{
  cli::{Cli, Variant},
  setup::{setup_args, setup_tracing},
};

fn run(args: &Cli) -> Result<(), Box<dyn std::error::Error>> {
  let device = setup_args(args)?;

  let varmap = VarMap::new();
  let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
  let (n, s) = (args.batch, args.size);

  let (graph, probe): (AssembledGraph, Vec<usize>) = match &args.variant {
    Variant::Multires3d(variant) => {
      let model = variant.config()?.init(vb)?;
      let topology = model.topology();

      if s % topology.spatial_multiple() != 0 {
        tracing::warn!(
          "Size {s} is not divisible by {}, the output extent may differ from the input",
          topology.spatial_multiple()
        );
      }

      for level in &topology.levels {
        tracing::info!(
          "depth {}: in {} -> encoder {} (+ skip {}) -> decoder {}",
          level.depth,
          level.input_width,
          level.encoder.total(),
          level.skip_width,
          level.decoder.total()
        );
      }

      let probe = vec![n, topology.input_channels, s, s, s];
      (model.into(), probe)
    }

    Variant::Plain2d(variant) => {
      let model = variant.config()?.init(vb)?;
      let topology = model.topology();

      for level in topology.levels.iter().chain(&topology.extra) {
        tracing::info!(
          "depth {}: in {} -> block {} -> out {}",
          level.depth,
          level.input_width,
          level.block_width,
          level.output_width
        );
      }

      let probe = vec![n, topology.input_channels, s, s];
      (model.into(), probe)
    }
  };

  let params: usize = varmap.all_vars().iter().map(|v| v.elem_count()).sum();
  tracing::info!("Assembled graph with {params} parameters");

  let x = Tensor::zeros(probe.as_slice(), DType::F32, &device)?;
  let y = graph.evaluate(&x)?;

  tracing::info!("Probe {:?} -> output {:?}", x.dims(), y.dims());

  Ok(())
}

fn main() -> ExitCode {
  let args = Cli::parse();
  setup_tracing(args.verbose);

  if let Err(err) = run(&args) {
    tracing::error!("{err}");
    return ExitCode::FAILURE;
  }

  ExitCode::SUCCESS
}
