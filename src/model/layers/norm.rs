use std::str::FromStr;

use candle_core::{Module, Tensor};
use candle_nn::{batch_norm, BatchNorm, ModuleT, VarBuilder};

use crate::Error;

pub const NORM_EPS: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormKind {
  #[default]
  Instance,
  Batch,
  None,
}

impl FromStr for NormKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "instance" => Ok(Self::Instance),
      "batch" => Ok(Self::Batch),
      "none" => Ok(Self::None),
      other => Err(Error::config(format!(
        "unknown normalization `{other}`, expected one of instance, batch, none"
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy)]
pub struct InstanceNorm {
  eps: f64,
}

impl Default for InstanceNorm {
  fn default() -> Self {
    Self { eps: NORM_EPS }
  }
}

impl Module for InstanceNorm {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let mean = x.mean_keepdim((2, 3))?;
    let centered = x.broadcast_sub(&mean)?;
    let var = centered.sqr()?.mean_keepdim((2, 3))?;

    centered.broadcast_div(&(var + self.eps)?.sqrt()?)
  }
}

#[derive(Debug, Clone)]
pub enum Norm {
  Instance(InstanceNorm),
  Batch(BatchNorm),
}

impl Norm {
  pub fn new(
    kind: NormKind,
    channels: usize,
    vb: VarBuilder,
  ) -> Result<Option<Self>, candle_core::Error> {
    Ok(match kind {
      NormKind::Instance => Some(Self::Instance(InstanceNorm::default())),
      NormKind::Batch => Some(Self::Batch(batch_norm(channels, NORM_EPS, vb)?)),
      NormKind::None => None,
    })
  }
}

impl Module for Norm {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    match self {
      Self::Instance(m) => m.forward(x),
      // running statistics
      Self::Batch(m) => m.forward_t(x, false),
    }
  }
}
