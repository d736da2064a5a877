use candle_core::{Module, Tensor};
use candle_nn::VarBuilder;

use super::{ConvBnAct3d, MultiResBlock, SkipPathBlock};
use crate::{
  model::{
    channels::BranchWidths,
    layers::{join::concat_cropped, ActFun, Upsample},
  },
  Result,
};

#[derive(Debug, Clone, PartialEq)]
pub struct LevelPlan {
  pub depth: usize,
  pub input_width: usize,
  pub encoder: BranchWidths,
  /// Width of the deeper branch after upsampling: the next depth's decoder
  /// output, or the encoder output at the deepest depth.
  pub deeper_width: usize,
  pub skip_width: usize,
  pub decoder: BranchWidths,
  pub upsample: Upsample,
}

impl LevelPlan {
  pub fn decoder_input(&self) -> usize {
    self.deeper_width + self.skip_width
  }
}

#[derive(Debug, Clone)]
pub struct Level3d {
  depth: usize,
  down: ConvBnAct3d,
  encoder: MultiResBlock,
  child: Option<Box<Level3d>>,
  upsample: Upsample,
  skip: Option<SkipPathBlock>,
  decoder: MultiResBlock,
}

impl Level3d {
  pub fn new(
    plan: &LevelPlan,
    child: Option<Box<Level3d>>,
    act: ActFun,
    bias: bool,
    vb: VarBuilder,
  ) -> Result<Self> {
    let down = ConvBnAct3d::new(
      plan.input_width,
      plan.input_width,
      3,
      2,
      bias,
      act,
      vb.pp("down"),
    )?;

    let encoder = MultiResBlock::new(plan.input_width, plan.encoder, act, bias, vb.pp("encoder"))?;

    let skip = if plan.skip_width != 0 {
      Some(SkipPathBlock::new(
        plan.input_width,
        plan.skip_width,
        act,
        bias,
        vb.pp("skip"),
      )?)
    } else {
      None
    };

    let decoder = MultiResBlock::new(
      plan.decoder_input(),
      plan.decoder,
      act,
      bias,
      vb.pp("decoder"),
    )?;

    Ok(Self {
      depth: plan.depth,
      down,
      encoder,
      child,
      upsample: plan.upsample,
      skip,
      decoder,
    })
  }

  pub fn depth(&self) -> usize {
    self.depth
  }

  pub fn child(&self) -> Option<&Level3d> {
    self.child.as_deref()
  }

  pub fn encoder(&self) -> &MultiResBlock {
    &self.encoder
  }

  pub fn decoder(&self) -> &MultiResBlock {
    &self.decoder
  }

  pub fn skip(&self) -> Option<&SkipPathBlock> {
    self.skip.as_ref()
  }

  pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
    let mut deeper = self.down.forward(x)?;
    deeper = self.encoder.forward(&deeper)?;

    if let Some(child) = &self.child {
      deeper = child.forward(&deeper)?;
    }

    deeper = self.upsample.forward(&deeper)?;

    let joined = match &self.skip {
      Some(skip) => concat_cropped("skip/deeper join", &[skip.forward(x)?, deeper])?,
      None => deeper,
    };

    Ok(self.decoder.forward(&joined)?)
  }
}
