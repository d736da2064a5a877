pub mod channels;
pub mod layers;
pub mod mulres;
pub mod unet;

use candle_core::{Module, Tensor};

pub use channels::BranchWidths;
pub use mulres::{MulResUNet3d, MulResUNet3dConfig, Topology3d};
pub use unet::{Topology2d, UNet2d, UNet2dConfig};

use crate::Result;

#[derive(Debug, Clone)]
pub enum AssembledGraph {
  MultiRes3d(MulResUNet3d),
  Plain2d(UNet2d),
}

impl AssembledGraph {
  pub fn evaluate(&self, x: &Tensor) -> Result<Tensor> {
    match self {
      AssembledGraph::MultiRes3d(m) => m.evaluate(x),
      AssembledGraph::Plain2d(m) => m.evaluate(x),
    }
  }
}

impl From<MulResUNet3d> for AssembledGraph {
  fn from(m: MulResUNet3d) -> Self {
    Self::MultiRes3d(m)
  }
}

impl From<UNet2d> for AssembledGraph {
  fn from(m: UNet2d) -> Self {
    Self::Plain2d(m)
  }
}

impl Module for AssembledGraph {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    self.evaluate(x).map_err(|err| match err {
      crate::Error::Tensor(err) => err,
      other => candle_core::Error::wrap(other),
    })
  }
}
