use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

use super::PlainConvBlock;
use crate::model::layers::{ActFun, NormKind, PadMode};

#[derive(Debug, Clone)]
pub struct UNetDown {
  conv: PlainConvBlock,
}

impl UNetDown {
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
      conv: PlainConvBlock::new(in_channels, out_channels, norm, bias, pad, act, vb.pp("conv"))?,
    })
  }
}

pub(crate) fn pool_halved(x: &Tensor, avg: bool) -> Result<Tensor, candle_core::Error> {
  let (_, _, h, w) = x.dims4()?;

  if h < 2 || w < 2 {
    return Err(
      candle_core::Error::Msg(format!("pool2d: extent {h}x{w} cannot be halved")).bt(),
    );
  }

  if avg {
    x.avg_pool2d(2)
  } else {
    x.max_pool2d(2)
  }
}

impl Module for UNetDown {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    self.conv.forward(&pool_halved(x, false)?)
  }
}
