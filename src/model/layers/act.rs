use std::{fmt, str::FromStr};

use candle_core::{Module, Tensor};
use candle_nn::ops::leaky_relu;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActFun {
  ReLU,
  #[default]
  LeakyReLU,
  Tanh,
  ELU,
}

impl ActFun {
  pub const LEAKY_SLOPE: f64 = 0.2;
  pub const ELU_ALPHA: f64 = 1.0;

  pub fn name(self) -> &'static str {
    match self {
      Self::ReLU => "ReLU",
      Self::LeakyReLU => "LeakyReLU",
      Self::Tanh => "Tanh",
      Self::ELU => "ELU",
    }
  }
}

impl Module for ActFun {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    match self {
      Self::ReLU => x.relu(),
      Self::LeakyReLU => leaky_relu(x, Self::LEAKY_SLOPE),
      Self::Tanh => x.tanh(),
      Self::ELU => x.elu(Self::ELU_ALPHA),
    }
  }
}

impl FromStr for ActFun {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "ReLU" => Ok(Self::ReLU),
      "LeakyReLU" => Ok(Self::LeakyReLU),
      "Tanh" => Ok(Self::Tanh),
      "ELU" => Ok(Self::ELU),
      other => Err(Error::config(format!(
        "unknown activation `{other}`, expected one of ReLU, LeakyReLU, Tanh, ELU"
      ))),
    }
  }
}

impl fmt::Display for ActFun {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{Device, Module, Tensor};

  use super::ActFun;
  use crate::Error;

  #[test]
  fn parses_every_known_name() {
    for act in [ActFun::ReLU, ActFun::LeakyReLU, ActFun::Tanh, ActFun::ELU] {
      assert_eq!(act.name().parse::<ActFun>().unwrap(), act);
    }
  }

  #[test]
  fn rejects_unknown_name() {
    let err = "Swish".parse::<ActFun>().unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));

    // names are matched exactly
    assert!("relu".parse::<ActFun>().is_err());
  }

  #[test]
  fn leaky_relu_uses_fixed_slope() {
    let x = Tensor::new(&[-1f32, 0., 2.], &Device::Cpu).unwrap();
    let y = ActFun::LeakyReLU.forward(&x).unwrap().to_vec1::<f32>().unwrap();

    assert!((y[0] + 0.2).abs() < 1e-6);
    assert_eq!(&y[1..], &[0., 2.]);
  }

  #[test]
  fn relu_clamps_negatives() {
    let x = Tensor::new(&[-3f32, 4.], &Device::Cpu).unwrap();
    let y = ActFun::ReLU.forward(&x).unwrap().to_vec1::<f32>().unwrap();

    assert_eq!(y, vec![0., 4.]);
  }
}
