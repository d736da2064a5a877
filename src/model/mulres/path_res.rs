use candle_core::{Module, Tensor};
use candle_nn::{batch_norm, BatchNorm, ModuleT, VarBuilder};

use super::ConvBnAct3d;
use crate::model::layers::{ActFun, NORM_EPS};

#[derive(Debug, Clone)]
pub struct SkipPathBlock {
  conv3x3: ConvBnAct3d,
  conv1x1: ConvBnAct3d,
  bn: BatchNorm,
  act: ActFun,
  out_channels: usize,
}

impl SkipPathBlock {
  pub fn new(
    in_channels: usize,
    out_channels: usize,
    act: ActFun,
    bias: bool,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    Ok(Self {
      conv3x3: ConvBnAct3d::new(in_channels, out_channels, 3, 1, bias, act, vb.pp("conv3x3"))?,
      conv1x1: ConvBnAct3d::new(in_channels, out_channels, 1, 1, bias, act, vb.pp("conv1x1"))?,
      bn: batch_norm(out_channels, NORM_EPS, vb.pp("bn"))?,
      act,
      out_channels,
    })
  }

  pub fn out_channels(&self) -> usize {
    self.out_channels
  }
}

impl Module for SkipPathBlock {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let z = (self.conv1x1.forward(x)? + self.conv3x3.forward(x)?)?;
    let z = self.act.forward(&z)?;
    self.bn.forward_t(&z, false)
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device, Module, Tensor};
  use candle_nn::{VarBuilder, VarMap};

  use super::SkipPathBlock;
  use crate::model::layers::ActFun;

  #[test]
  fn projects_to_skip_width_keeping_extent() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let block = SkipPathBlock::new(6, 4, ActFun::ELU, true, vb).unwrap();

    let x = Tensor::randn(0f32, 1., (2, 6, 5, 4, 3), &Device::Cpu).unwrap();
    let y = block.forward(&x).unwrap();

    assert_eq!(block.out_channels(), 4);
    assert_eq!(y.dims(), &[2, 4, 5, 4, 3]);
  }
}
