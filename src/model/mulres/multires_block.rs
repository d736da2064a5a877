use candle_core::{Module, Tensor};
use candle_nn::{batch_norm, BatchNorm, ModuleT, VarBuilder};

use crate::model::{
  channels::BranchWidths,
  layers::{conv3d, conv3d_no_bias, ActFun, Conv3d, Conv3dConfig, NORM_EPS},
};

#[derive(Debug, Clone)]
pub struct ConvBnAct3d {
  conv: Conv3d,
  bn: BatchNorm,
  act: ActFun,
}

impl ConvBnAct3d {
  pub fn new(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    bias: bool,
    act: ActFun,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let config = Conv3dConfig {
      padding: (kernel_size - 1) / 2,
      stride,
    };

    let conv = if bias { conv3d } else { conv3d_no_bias }(
      in_channels,
      out_channels,
      kernel_size,
      config,
      vb.pp("conv"),
    )?;

    let bn = batch_norm(out_channels, NORM_EPS, vb.pp("bn"))?;

    Ok(Self { conv, bn, act })
  }
}

impl Module for ConvBnAct3d {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let z = self.conv.forward(x)?;
    let z = self.bn.forward_t(&z, false)?;
    self.act.forward(&z)
  }
}

/// Multi-resolution residual block.
///
/// Three cascaded 3x3x3 convolutions see growing receptive fields; their
/// outputs are concatenated (`w1 + w2 + w3` channels) and added to a 1x1x1
/// shortcut projection of the input.
#[derive(Debug, Clone)]
pub struct MultiResBlock {
  shortcut: ConvBnAct3d,
  conv3x3: ConvBnAct3d,
  conv5x5: ConvBnAct3d,
  conv7x7: ConvBnAct3d,
  bn1: BatchNorm,
  bn2: BatchNorm,
  act: ActFun,
  widths: BranchWidths,
}

impl MultiResBlock {
  pub fn new(
    in_channels: usize,
    widths: BranchWidths,
    act: ActFun,
    bias: bool,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let BranchWidths { w1, w2, w3 } = widths;
    let out_dim = widths.total();

    Ok(Self {
      shortcut: ConvBnAct3d::new(in_channels, out_dim, 1, 1, bias, act, vb.pp("shortcut"))?,
      conv3x3: ConvBnAct3d::new(in_channels, w1, 3, 1, bias, act, vb.pp("conv3x3"))?,
      conv5x5: ConvBnAct3d::new(w1, w2, 3, 1, bias, act, vb.pp("conv5x5"))?,
      conv7x7: ConvBnAct3d::new(w2, w3, 3, 1, bias, act, vb.pp("conv7x7"))?,
      bn1: batch_norm(out_dim, NORM_EPS, vb.pp("bn1"))?,
      bn2: batch_norm(out_dim, NORM_EPS, vb.pp("bn2"))?,
      act,
      widths,
    })
  }

  pub fn widths(&self) -> BranchWidths {
    self.widths
  }

  pub fn out_dim(&self) -> usize {
    self.widths.total()
  }
}

impl Module for MultiResBlock {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let out1 = self.conv3x3.forward(x)?;
    let out2 = self.conv5x5.forward(&out1)?;
    let out3 = self.conv7x7.forward(&out2)?;

    let mut out = Tensor::cat(&[&out1, &out2, &out3], 1)?;
    out = self.bn1.forward_t(&out, false)?;
    out = (self.shortcut.forward(x)? + out)?;
    out = self.act.forward(&out)?;

    self.bn2.forward_t(&out, false)
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device, Module, Tensor};
  use candle_nn::{VarBuilder, VarMap};

  use super::MultiResBlock;
  use crate::model::{channels::BranchWidths, layers::ActFun};

  #[test]
  fn output_width_is_the_branch_sum() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

    let widths = BranchWidths::new(8, 1.67);
    let block = MultiResBlock::new(3, widths, ActFun::LeakyReLU, true, vb).unwrap();
    assert_eq!(block.out_dim(), 12);

    let x = Tensor::randn(0f32, 1., (1, 3, 4, 6, 5), &Device::Cpu).unwrap();
    let y = block.forward(&x).unwrap();

    assert_eq!(y.dims(), &[1, 12, 4, 6, 5]);
  }

  #[test]
  fn registers_parameters_per_branch() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

    let widths = BranchWidths::new(4, 1.67);
    MultiResBlock::new(2, widths, ActFun::ReLU, false, vb.pp("block")).unwrap();

    let data = varmap.data().lock().unwrap();
    assert_eq!(data["block.conv3x3.conv.weight"].dims(), &[1, 2, 3, 3, 3]);
    assert_eq!(data["block.conv5x5.conv.weight"].dims(), &[2, 1, 3, 3, 3]);
    assert_eq!(data["block.conv7x7.conv.weight"].dims(), &[3, 2, 3, 3, 3]);
    assert_eq!(data["block.shortcut.conv.weight"].dims(), &[6, 2, 1, 1, 1]);
    assert!(!data.contains_key("block.shortcut.conv.bias"));
  }
}
