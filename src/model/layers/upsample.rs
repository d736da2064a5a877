use std::{fmt, str::FromStr};

use candle_core::{Module, Tensor};
use smallvec::{smallvec, SmallVec};

use crate::{utils::TensorExt, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsampleMode {
  #[default]
  Nearest,
  Bilinear,
  Deconv,
}

impl UpsampleMode {
  pub fn name(self) -> &'static str {
    match self {
      Self::Nearest => "nearest",
      Self::Bilinear => "bilinear",
      Self::Deconv => "deconv",
    }
  }

  pub fn interpolation(self) -> Option<Upsample> {
    match self {
      Self::Nearest => Some(Upsample::Nearest),
      Self::Bilinear => Some(Upsample::Linear),
      Self::Deconv => None,
    }
  }
}

impl FromStr for UpsampleMode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "nearest" => Ok(Self::Nearest),
      "bilinear" => Ok(Self::Bilinear),
      "deconv" => Ok(Self::Deconv),
      other => Err(Error::config(format!(
        "unknown upsample mode `{other}`, expected one of nearest, bilinear, deconv"
      ))),
    }
  }
}

impl fmt::Display for UpsampleMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsampleModes {
  All(UpsampleMode),
  PerDepth(Vec<UpsampleMode>),
}

impl Default for UpsampleModes {
  fn default() -> Self {
    Self::All(UpsampleMode::default())
  }
}

impl From<UpsampleMode> for UpsampleModes {
  fn from(mode: UpsampleMode) -> Self {
    Self::All(mode)
  }
}

impl From<Vec<UpsampleMode>> for UpsampleModes {
  fn from(modes: Vec<UpsampleMode>) -> Self {
    Self::PerDepth(modes)
  }
}

impl UpsampleModes {
  pub fn resolve(&self, n_scales: usize) -> Result<SmallVec<[UpsampleMode; 8]>, Error> {
    match self {
      Self::All(mode) => Ok(smallvec![*mode; n_scales]),
      Self::PerDepth(modes) if modes.len() == n_scales => Ok(modes.iter().copied().collect()),
      Self::PerDepth(modes) => Err(Error::config(format!(
        "{} upsample modes given for {n_scales} scales",
        modes.len()
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsample {
  Nearest,
  /// Bilinear in 2D, trilinear in 3D.
  Linear,
}

impl Module for Upsample {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let mut z = x.clone();

    for dim in 2..x.rank() {
      z = match self {
        Self::Nearest => z.repeat_twice(dim)?,
        Self::Linear => z.lerp_twice(dim)?,
      };
    }

    Ok(z)
  }
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device, Module, Tensor};

  use super::{Upsample, UpsampleMode, UpsampleModes};

  #[test]
  fn doubles_every_spatial_axis_of_a_volume() {
    let x = Tensor::zeros((1, 2, 3, 4, 5), DType::F32, &Device::Cpu).unwrap();

    for up in [Upsample::Nearest, Upsample::Linear] {
      assert_eq!(up.forward(&x).unwrap().dims(), &[1, 2, 6, 8, 10]);
    }
  }

  #[test]
  fn linear_keeps_constant_fields_constant() {
    let x = Tensor::full(3f32, (1, 1, 2, 2, 2), &Device::Cpu).unwrap();
    let y = Upsample::Linear.forward(&x).unwrap();
    let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();

    assert!(values.iter().all(|v| (v - 3.).abs() < 1e-6));
  }

  #[test]
  fn scalar_mode_expands_to_every_depth() {
    let modes = UpsampleModes::from(UpsampleMode::Bilinear).resolve(3).unwrap();
    assert_eq!(modes.as_slice(), &[UpsampleMode::Bilinear; 3]);
  }

  #[test]
  fn per_depth_modes_must_cover_each_scale() {
    let modes = UpsampleModes::from(vec![UpsampleMode::Nearest, UpsampleMode::Bilinear]);

    assert!(modes.resolve(2).is_ok());
    assert!(modes.resolve(3).is_err());
  }

  #[test]
  fn parses_mode_names() {
    assert_eq!("nearest".parse::<UpsampleMode>().unwrap(), UpsampleMode::Nearest);
    assert_eq!("deconv".parse::<UpsampleMode>().unwrap(), UpsampleMode::Deconv);
    assert!("trilinear".parse::<UpsampleMode>().is_err());
  }
}
