mod unet_conv;
mod unet_down;
mod unet_up;

use candle_core::{Module, Tensor};
use candle_nn::{ops::sigmoid, VarBuilder};
use smallvec::SmallVec;

pub use unet_conv::*;
pub use unet_down::*;
pub use unet_up::*;

use crate::{
  model::layers::{join::concat_exact, ActFun, NormKind, PadMode, PaddedConv2d, UpsampleMode},
  Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UNet2dConfig {
  pub num_input_channels: usize,
  pub num_output_channels: usize,
  /// `filters[0]` is the start block, `filters[d]` the d-th pooled level.
  pub filters: Vec<usize>,
  pub more_layers: usize,
  pub concat_x: bool,
  pub act_fun: ActFun,
  pub upsample_mode: UpsampleMode,
  pub pad: PadMode,
  pub norm: NormKind,
  pub need_sigmoid: bool,
  pub need_bias: bool,
}

impl Default for UNet2dConfig {
  fn default() -> Self {
    Self {
      num_input_channels: 3,
      num_output_channels: 3,
      filters: vec![16, 32, 64, 128, 256],
      more_layers: 0,
      concat_x: false,
      act_fun: ActFun::ReLU,
      upsample_mode: UpsampleMode::Deconv,
      pad: PadMode::Zero,
      norm: NormKind::Instance,
      need_sigmoid: true,
      need_bias: true,
    }
  }
}

impl UNet2dConfig {
  pub fn new(filters: Vec<usize>) -> Self {
    Self {
      filters,
      ..Default::default()
    }
  }

  pub fn with_input_channels(mut self, channels: usize) -> Self {
    self.num_input_channels = channels;
    self
  }

  pub fn with_output_channels(mut self, channels: usize) -> Self {
    self.num_output_channels = channels;
    self
  }

  pub fn with_more_layers(mut self, more_layers: usize) -> Self {
    self.more_layers = more_layers;
    self
  }

  pub fn with_concat_x(mut self, concat_x: bool) -> Self {
    self.concat_x = concat_x;
    self
  }

  pub fn with_act_fun(mut self, act_fun: ActFun) -> Self {
    self.act_fun = act_fun;
    self
  }

  pub fn with_upsample_mode(mut self, mode: UpsampleMode) -> Self {
    self.upsample_mode = mode;
    self
  }

  pub fn with_pad(mut self, pad: PadMode) -> Self {
    self.pad = pad;
    self
  }

  pub fn with_norm(mut self, norm: NormKind) -> Self {
    self.norm = norm;
    self
  }

  pub fn with_sigmoid(mut self, need_sigmoid: bool) -> Self {
    self.need_sigmoid = need_sigmoid;
    self
  }

  pub fn with_bias(mut self, need_bias: bool) -> Self {
    self.need_bias = need_bias;
    self
  }

  pub fn plan(&self) -> Result<Topology2d> {
    if self.filters.is_empty() {
      return Err(Error::config("at least one filter width is required"));
    }

    if self.num_input_channels == 0 || self.num_output_channels == 0 {
      return Err(Error::config("input and output channel counts must be positive"));
    }

    let raw_width = if self.concat_x {
      self.num_input_channels
    } else {
      0
    };

    let block_width = |depth: usize, width: usize| {
      if width > raw_width {
        Ok(width - raw_width)
      } else {
        Err(Error::config(format!(
          "filter width {width} at depth {depth} leaves no channels besides the {raw_width} raw input channels"
        )))
      }
    };

    let mut levels = Vec::with_capacity(self.filters.len());
    let mut input_width = self.num_input_channels;

    for (depth, &width) in self.filters.iter().enumerate() {
      levels.push(PlainLevel {
        depth,
        input_width,
        block_width: block_width(depth, width)?,
        output_width: width,
      });
      input_width = width;
    }

    let deepest = input_width;
    let mut extra = Vec::with_capacity(self.more_layers);

    for k in 0..self.more_layers {
      let depth = self.filters.len() + k;
      extra.push(PlainLevel {
        depth,
        input_width: deepest,
        block_width: block_width(depth, deepest)?,
        output_width: deepest,
      });
    }

    Ok(Topology2d {
      input_channels: self.num_input_channels,
      raw_width,
      levels,
      extra,
      output_channels: self.num_output_channels,
    })
  }

  pub fn init(&self, vb: VarBuilder) -> Result<UNet2d> {
    let topology = self.plan()?;
    let (norm, bias, pad, act) = (self.norm, self.need_bias, self.pad, self.act_fun);

    let start = PlainConvBlock::new(
      topology.input_channels,
      topology.levels[0].block_width,
      norm,
      bias,
      pad,
      act,
      vb.pp("start"),
    )?;

    let mut downs = Vec::with_capacity(topology.levels.len() - 1);
    let mut ups = Vec::with_capacity(topology.levels.len() - 1);

    for pair in topology.levels.windows(2) {
      let (shallow, deep) = (&pair[0], &pair[1]);

      tracing::debug!(
        depth = deep.depth,
        input_width = deep.input_width,
        block_width = deep.block_width,
        output_width = deep.output_width,
        "assembling level"
      );

      downs.push(UNetDown::new(
        deep.input_width,
        deep.block_width,
        norm,
        bias,
        pad,
        act,
        vb.pp(format!("down{}", deep.depth)),
      )?);

      ups.push(UNetUp::new(
        deep.output_width,
        shallow.output_width,
        shallow.output_width,
        self.upsample_mode,
        bias,
        pad,
        act,
        vb.pp(format!("up{}", deep.depth)),
      )?);
    }

    let mut more_downs = Vec::with_capacity(topology.extra.len());
    let mut more_ups = Vec::with_capacity(topology.extra.len());

    for (k, level) in topology.extra.iter().enumerate() {
      tracing::debug!(
        depth = level.depth,
        width = level.output_width,
        "assembling bottleneck level"
      );

      more_downs.push(UNetDown::new(
        level.input_width,
        level.block_width,
        norm,
        bias,
        pad,
        act,
        vb.pp(format!("more_downs.{k}")),
      )?);

      more_ups.push(UNetUp::new(
        level.output_width,
        level.input_width,
        level.input_width,
        self.upsample_mode,
        bias,
        pad,
        act,
        vb.pp(format!("more_ups.{k}")),
      )?);
    }

    let last = PaddedConv2d::new(
      topology.levels[0].output_width,
      topology.output_channels,
      1,
      pad,
      bias,
      vb.pp("final"),
    )?;

    tracing::info!(
      levels = topology.levels.len(),
      more_layers = topology.extra.len(),
      concat_x = self.concat_x,
      "assembled plain U-Net"
    );

    Ok(UNet2d {
      start,
      downs,
      more_downs,
      more_ups,
      ups,
      last,
      concat_x: self.concat_x,
      need_sigmoid: self.need_sigmoid,
      topology,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainLevel {
  pub depth: usize,
  pub input_width: usize,
  pub block_width: usize,
  // block_width plus raw_width
  pub output_width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology2d {
  pub input_channels: usize,
  pub raw_width: usize,
  pub levels: Vec<PlainLevel>,
  pub extra: Vec<PlainLevel>,
  pub output_channels: usize,
}

impl Topology2d {
  pub fn poolings(&self) -> usize {
    self.levels.len() - 1 + self.extra.len()
  }
}

#[derive(Debug, Clone)]
pub struct UNet2d {
  start: PlainConvBlock,
  downs: Vec<UNetDown>,
  more_downs: Vec<UNetDown>,
  more_ups: Vec<UNetUp>,
  /// `ups[d - 1]` brings depth `d` back to depth `d - 1`.
  ups: Vec<UNetUp>,
  last: PaddedConv2d,
  concat_x: bool,
  need_sigmoid: bool,
  topology: Topology2d,
}

impl UNet2d {
  pub fn topology(&self) -> &Topology2d {
    &self.topology
  }

  fn with_raw(&self, site: &'static str, x: Tensor, raw: &[Tensor], depth: usize) -> Result<Tensor> {
    if !self.concat_x {
      return Ok(x);
    }

    concat_exact(site, &x, &raw[depth])
  }

  pub fn evaluate(&self, x: &Tensor) -> Result<Tensor> {
    let mut raw: SmallVec<[Tensor; 8]> = SmallVec::new();

    if self.concat_x {
      raw.push(x.clone());
      for _ in 0..self.topology.poolings() {
        let next = pool_halved(&raw[raw.len() - 1], true)?;
        raw.push(next);
      }
    }

    let mut encoded: SmallVec<[Tensor; 8]> = SmallVec::new();

    let start = self.start.forward(x)?;
    encoded.push(self.with_raw("raw input join", start, &raw, 0)?);

    for (i, down) in self.downs.iter().enumerate() {
      let z = down.forward(&encoded[i])?;
      encoded.push(self.with_raw("raw input join", z, &raw, i + 1)?);
    }

    let Some(deepest) = encoded.last().cloned() else {
      return Err(Error::config("graph has no encoder levels"));
    };

    let mut prevs: SmallVec<[Tensor; 8]> = SmallVec::new();
    prevs.push(deepest);

    for (k, down) in self.more_downs.iter().enumerate() {
      let z = down.forward(&prevs[k])?;
      prevs.push(self.with_raw("raw input join", z, &raw, self.downs.len() + 1 + k)?);
    }

    let mut up = prevs[prevs.len() - 1].clone();

    for (k, stored) in bottleneck_unwind(self.more_ups.len()) {
      up = self.more_ups[k].forward(&up, &prevs[stored])?;
    }

    for (d, step) in self.ups.iter().enumerate().rev() {
      up = step.forward(&up, &encoded[d])?;
    }

    let mut z = self.last.forward(&up)?;

    if self.need_sigmoid {
      z = sigmoid(&z)?;
    }

    Ok(z)
  }
}

// (more_ups index, stored activation index), deepest pair first
fn bottleneck_unwind(n: usize) -> impl Iterator<Item = (usize, usize)> {
  (0..n).rev().map(|k| (k, k))
}

#[cfg(test)]
mod tests {
  use super::{bottleneck_unwind, UNet2dConfig};
  use crate::Error;

  #[test]
  fn bottleneck_unwinds_last_in_first_out() {
    assert_eq!(bottleneck_unwind(2).collect::<Vec<_>>(), vec![(1, 1), (0, 0)]);
    assert_eq!(
      bottleneck_unwind(3).collect::<Vec<_>>(),
      vec![(2, 2), (1, 1), (0, 0)]
    );
    assert_eq!(bottleneck_unwind(0).count(), 0);
  }

  #[test]
  fn default_plan_follows_filters() {
    let topology = UNet2dConfig::default().plan().unwrap();
    let widths: Vec<_> = topology.levels.iter().map(|l| l.output_width).collect();

    assert_eq!(widths, vec![16, 32, 64, 128, 256]);
    assert_eq!(topology.levels[0].input_width, 3);
    assert_eq!(topology.levels[3].input_width, 64);
    assert_eq!(topology.poolings(), 4);
  }

  #[test]
  fn concat_x_reserves_raw_channels() {
    let topology = UNet2dConfig::new(vec![8, 16])
      .with_input_channels(2)
      .with_concat_x(true)
      .with_more_layers(1)
      .plan()
      .unwrap();

    let blocks: Vec<_> = topology.levels.iter().map(|l| l.block_width).collect();
    assert_eq!(blocks, vec![6, 14]);
    assert_eq!(topology.extra[0].block_width, 14);
    assert_eq!(topology.extra[0].output_width, 16);
  }

  #[test]
  fn concat_x_rejects_filters_not_wider_than_input() {
    let err = UNet2dConfig::new(vec![3, 16])
      .with_input_channels(3)
      .with_concat_x(true)
      .plan()
      .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
  }

  #[test]
  fn rejects_empty_or_zero_configuration() {
    assert!(UNet2dConfig::new(vec![]).plan().is_err());
    assert!(UNet2dConfig::new(vec![8, 0]).plan().is_err());
    assert!(UNet2dConfig::new(vec![8]).with_output_channels(0).plan().is_err());
  }
}
