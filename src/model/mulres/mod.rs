mod level;
mod multires_block;
mod path_res;

use candle_core::{Module, Tensor};
use candle_nn::{ops::sigmoid, VarBuilder};

pub use level::*;
pub use multires_block::*;
pub use path_res::*;

use crate::{
  model::{
    channels::BranchWidths,
    layers::{conv3d, conv3d_no_bias, ActFun, Conv3d, Conv3dConfig, UpsampleMode, UpsampleModes},
  },
  Error, Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct MulResUNet3dConfig {
  pub num_input_channels: usize,
  pub num_output_channels: usize,
  pub num_channels_down: Vec<usize>,
  pub num_channels_up: Vec<usize>,
  /// One entry per depth below the input level, zero disables that skip.
  pub num_channels_skip: Vec<usize>,
  pub alpha: f64,
  pub need_sigmoid: bool,
  pub need_bias: bool,
  pub upsample_mode: UpsampleModes,
  pub act_fun: ActFun,
}

impl Default for MulResUNet3dConfig {
  fn default() -> Self {
    Self {
      num_input_channels: 1,
      num_output_channels: 3,
      num_channels_down: vec![16, 32, 64, 128, 256],
      num_channels_up: vec![16, 32, 64, 128, 256],
      num_channels_skip: vec![16, 32, 64, 128],
      alpha: 1.67,
      need_sigmoid: false,
      need_bias: true,
      upsample_mode: UpsampleModes::All(UpsampleMode::Nearest),
      act_fun: ActFun::LeakyReLU,
    }
  }
}

impl MulResUNet3dConfig {
  pub fn new(
    num_channels_down: Vec<usize>,
    num_channels_up: Vec<usize>,
    num_channels_skip: Vec<usize>,
  ) -> Self {
    Self {
      num_channels_down,
      num_channels_up,
      num_channels_skip,
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

  pub fn with_alpha(mut self, alpha: f64) -> Self {
    self.alpha = alpha;
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

  pub fn with_upsample_mode(mut self, mode: impl Into<UpsampleModes>) -> Self {
    self.upsample_mode = mode.into();
    self
  }

  pub fn with_act_fun(mut self, act_fun: ActFun) -> Self {
    self.act_fun = act_fun;
    self
  }

  pub fn plan(&self) -> Result<Topology3d> {
    let down = &self.num_channels_down;
    let up = &self.num_channels_up;
    let skip = &self.num_channels_skip;

    if down.is_empty() || down.len() != up.len() || up.len() != skip.len() + 1 {
      return Err(Error::config(format!(
        "expected len(down) == len(up) == len(skip) + 1 >= 1, got {}, {}, {}",
        down.len(),
        up.len(),
        skip.len()
      )));
    }

    if self.num_input_channels == 0 || self.num_output_channels == 0 {
      return Err(Error::config("input and output channel counts must be positive"));
    }

    if let Some(depth) = down.iter().chain(up).position(|&w| w == 0) {
      return Err(Error::config(format!(
        "nominal widths must be positive, entry {depth} of down ++ up is zero"
      )));
    }

    let n_scales = down.len();
    let modes = self.upsample_mode.resolve(n_scales)?;

    let input = BranchWidths::checked(down[0], self.alpha)?;
    let mut input_depth = input.total();
    let mut levels = Vec::with_capacity(n_scales - 1);

    for i in 1..n_scales {
      let Some(upsample) = modes[i].interpolation() else {
        return Err(Error::config(format!(
          "upsample mode `{}` at depth {i} is not available for volumetric graphs",
          modes[i]
        )));
      };

      let encoder = BranchWidths::checked(down[i], self.alpha)?;
      let decoder = BranchWidths::checked(up[i - 1], self.alpha)?;

      levels.push(LevelPlan {
        depth: i,
        input_width: input_depth,
        encoder,
        deeper_width: encoder.total(),
        skip_width: skip[i - 1],
        decoder,
        upsample,
      });

      input_depth = encoder.total();
    }

    for i in 1..levels.len() {
      levels[i - 1].deeper_width = levels[i].decoder.total();
    }

    Ok(Topology3d {
      input_channels: self.num_input_channels,
      input,
      levels,
      output_channels: self.num_output_channels,
    })
  }

  pub fn init(&self, vb: VarBuilder) -> Result<MulResUNet3d> {
    let topology = self.plan()?;
    let (act, bias) = (self.act_fun, self.need_bias);

    let input = MultiResBlock::new(
      topology.input_channels,
      topology.input,
      act,
      bias,
      vb.pp("input"),
    )?;

    let mut level = None;

    for plan in topology.levels.iter().rev() {
      tracing::debug!(
        depth = plan.depth,
        input_width = plan.input_width,
        encoder_width = plan.encoder.total(),
        skip_width = plan.skip_width,
        deeper_width = plan.deeper_width,
        decoder_width = plan.decoder.total(),
        "assembling level"
      );

      level = Some(Box::new(Level3d::new(
        plan,
        level.take(),
        act,
        bias,
        vb.pp(format!("level{}", plan.depth)),
      )?));
    }

    let output = if bias { conv3d } else { conv3d_no_bias }(
      topology.head_width(),
      topology.output_channels,
      3,
      Conv3dConfig::same(3),
      vb.pp("output"),
    )?;

    tracing::info!(
      scales = topology.n_scales(),
      head_width = topology.head_width(),
      "assembled volumetric multi-resolution U-Net"
    );

    Ok(MulResUNet3d {
      input,
      level,
      output,
      need_sigmoid: self.need_sigmoid,
      topology,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topology3d {
  pub input_channels: usize,
  pub input: BranchWidths,
  /// Depths `1..n_scales`, shallowest first.
  pub levels: Vec<LevelPlan>,
  pub output_channels: usize,
}

impl Topology3d {
  pub fn n_scales(&self) -> usize {
    self.levels.len() + 1
  }

  pub fn head_width(&self) -> usize {
    self
      .levels
      .first()
      .map_or(self.input.total(), |level| level.decoder.total())
  }

  /// Input extent has to be divisible by this to come back unchanged.
  pub fn spatial_multiple(&self) -> usize {
    1 << self.levels.len()
  }
}

#[derive(Debug, Clone)]
pub struct MulResUNet3d {
  input: MultiResBlock,
  level: Option<Box<Level3d>>,
  output: Conv3d,
  need_sigmoid: bool,
  topology: Topology3d,
}

impl MulResUNet3d {
  pub fn topology(&self) -> &Topology3d {
    &self.topology
  }

  pub fn input_block(&self) -> &MultiResBlock {
    &self.input
  }

  pub fn level(&self) -> Option<&Level3d> {
    self.level.as_deref()
  }

  pub fn evaluate(&self, x: &Tensor) -> Result<Tensor> {
    let mut z = self.input.forward(x)?;

    if let Some(level) = &self.level {
      z = level.forward(&z)?;
    }

    z = self.output.forward(&z)?;

    if self.need_sigmoid {
      z = sigmoid(&z)?;
    }

    Ok(z)
  }
}
