use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

use crate::model::layers::{ActFun, Norm, NormKind, PadMode, PaddedConv2d};

#[derive(Debug, Clone)]
pub struct PlainConvBlock {
  conv1: PaddedConv2d,
  norm1: Option<Norm>,
  conv2: PaddedConv2d,
  norm2: Option<Norm>,
  act: ActFun,
}

impl PlainConvBlock {
  pub fn new(
    in_channels: usize,
    out_channels: usize,
    norm: NormKind,
    bias: bool,
    pad: PadMode,
    act: ActFun,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    Ok(Self {
      conv1: PaddedConv2d::new(in_channels, out_channels, 3, pad, bias, vb.pp("conv1"))?,
      norm1: Norm::new(norm, out_channels, vb.pp("norm1"))?,
      conv2: PaddedConv2d::new(out_channels, out_channels, 3, pad, bias, vb.pp("conv2"))?,
      norm2: Norm::new(norm, out_channels, vb.pp("norm2"))?,
      act,
    })
  }
}

impl Module for PlainConvBlock {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let mut z = self.conv1.forward(x)?;
    if let Some(norm) = &self.norm1 {
      z = norm.forward(&z)?;
    }
    z = self.act.forward(&z)?;

    z = self.conv2.forward(&z)?;
    if let Some(norm) = &self.norm2 {
      z = norm.forward(&z)?;
    }
    self.act.forward(&z)
  }
}
