use std::str::FromStr;

use candle_core::{Module, Tensor};
use candle_nn::{conv2d, conv2d_no_bias, Conv2d, Conv2dConfig, VarBuilder};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PadMode {
  #[default]
  Zero,
  Replication,
  /// Valid convolution, every conv shrinks the extent by `kernel - 1`.
  None,
}

impl FromStr for PadMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "zero" => Ok(Self::Zero),
      "replication" => Ok(Self::Replication),
      "none" => Ok(Self::None),
      other => Err(Error::config(format!(
        "unknown padding `{other}`, expected one of zero, replication, none"
      ))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct PaddedConv2d {
  conv: Conv2d,
  replicate: usize,
}

impl PaddedConv2d {
  pub fn new(
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    pad: PadMode,
    bias: bool,
    vb: VarBuilder,
  ) -> Result<Self, candle_core::Error> {
    let to_pad = (kernel_size - 1) / 2;

    let config = Conv2dConfig {
      padding: if pad == PadMode::Zero { to_pad } else { 0 },
      ..Default::default()
    };

    let conv = if bias { conv2d } else { conv2d_no_bias }(
      in_channels,
      out_channels,
      kernel_size,
      config,
      vb,
    )?;

    let replicate = if pad == PadMode::Replication {
      to_pad
    } else {
      0
    };

    Ok(Self { conv, replicate })
  }
}

impl Module for PaddedConv2d {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let (_, _, h, w) = x.dims4()?;
    let (_, _, kh, kw) = self.conv.weight().dims4()?;
    let pad = self.conv.config().padding + self.replicate;

    if h + 2 * pad < kh || w + 2 * pad < kw {
      return Err(
        candle_core::Error::Msg(format!(
          "conv2d: extent {h}x{w} with padding {pad} is smaller than kernel {kh}x{kw}"
        ))
        .bt(),
      );
    }

    if self.replicate == 0 {
      return self.conv.forward(x);
    }

    let r = self.replicate;
    let x = x.pad_with_same(2, r, r)?.pad_with_same(3, r, r)?;

    self.conv.forward(&x)
  }
}
