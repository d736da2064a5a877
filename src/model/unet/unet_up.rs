use candle_core::{Module, Tensor};
use candle_nn::{
  conv_transpose2d, conv_transpose2d_no_bias, ConvTranspose2d, ConvTranspose2dConfig, VarBuilder,
};

use super::PlainConvBlock;
use crate::{
  model::layers::{join::concat_fitted, ActFun, NormKind, PadMode, PaddedConv2d, Upsample, UpsampleMode},
  Result,
};

#[derive(Debug, Clone)]
enum UpPath {
  Deconv(ConvTranspose2d),
  Resample(Upsample, PaddedConv2d),
}

impl Module for UpPath {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    match self {
      UpPath::Deconv(m) => m.forward(x),
      UpPath::Resample(up, conv) => conv.forward(&up.forward(x)?),
    }
  }
}

#[derive(Debug, Clone)]
pub struct UNetUp {
  up: UpPath,
  conv: PlainConvBlock,
}

impl UNetUp {
  pub fn new(
    in_channels: usize,
    skip_channels: usize,
    out_channels: usize,
    mode: UpsampleMode,
    bias: bool,
    pad: PadMode,
    act: ActFun,
    vb: VarBuilder,
  ) -> Result<Self> {
    let up = match mode.interpolation() {
      Some(upsample) => UpPath::Resample(
        upsample,
        PaddedConv2d::new(in_channels, out_channels, 3, pad, bias, vb.pp("up"))?,
      ),
      None => UpPath::Deconv(if bias {
        conv_transpose2d
      } else {
        conv_transpose2d_no_bias
      }(
        in_channels,
        out_channels,
        4,
        ConvTranspose2dConfig {
          padding: 1,
          output_padding: 0,
          stride: 2,
          dilation: 1,
        },
        vb.pp("up"),
      )?),
    };

    let conv = PlainConvBlock::new(
      out_channels + skip_channels,
      out_channels,
      NormKind::None,
      bias,
      pad,
      act,
      vb.pp("conv"),
    )?;

    Ok(Self { up, conv })
  }

  pub fn forward(&self, x: &Tensor, skip: &Tensor) -> Result<Tensor> {
    let x = self.up.forward(x)?;
    let joined = concat_fitted("decoder skip join", &x, skip)?;

    Ok(self.conv.forward(&joined)?)
  }
}
