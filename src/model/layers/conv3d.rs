use candle_core::{Module, Tensor};
use candle_nn::{init, Init, VarBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv3dConfig {
  pub padding: usize,
  pub stride: usize,
}

impl Default for Conv3dConfig {
  fn default() -> Self {
    Self {
      padding: 0,
      stride: 1,
    }
  }
}

impl Conv3dConfig {
  pub fn same(kernel_size: usize) -> Self {
    Self {
      padding: (kernel_size - 1) / 2,
      stride: 1,
    }
  }

  pub fn out_size(&self, size: usize, kernel_size: usize) -> usize {
    (size + 2 * self.padding - kernel_size) / self.stride + 1
  }
}

#[derive(Debug, Clone)]
pub struct Conv3d {
  weight: Tensor,
  bias: Option<Tensor>,
  config: Conv3dConfig,
}

impl Conv3d {
  pub fn new(weight: Tensor, bias: Option<Tensor>, config: Conv3dConfig) -> Self {
    Self {
      weight,
      bias,
      config,
    }
  }

  pub fn config(&self) -> &Conv3dConfig {
    &self.config
  }

  pub fn weight(&self) -> &Tensor {
    &self.weight
  }

  pub fn bias(&self) -> Option<&Tensor> {
    self.bias.as_ref()
  }
}

impl Module for Conv3d {
  fn forward(&self, x: &Tensor) -> Result<Tensor, candle_core::Error> {
    let (n, c_in, d, h, w) = x.dims5()?;
    let (c_out, _, kd, _, _) = self.weight.dims5()?;
    let Conv3dConfig { padding, stride } = self.config;

    if d + 2 * padding < kd {
      return Err(
        candle_core::Error::Msg(format!(
          "conv3d: depth {d} with padding {padding} is smaller than kernel {kd}"
        ))
        .bt(),
      );
    }

    let x = if padding > 0 {
      x.pad_with_zeros(2, padding, padding)?
    } else {
      x.clone()
    };

    let d_out = self.config.out_size(d, kd);

    let mut out: Option<Tensor> = None;

    for kz in 0..kd {
      let taps: Vec<u32> = (0..d_out).map(|od| (od * stride + kz) as u32).collect();
      let taps = Tensor::new(taps.as_slice(), x.device())?;

      let planes = x
        .index_select(&taps, 2)?
        .permute((0, 2, 1, 3, 4))?
        .reshape((n * d_out, c_in, h, w))?;

      let kernel = self.weight.narrow(2, kz, 1)?.squeeze(2)?.contiguous()?;

      let y = planes.conv2d(&kernel, padding, stride, 1, 1)?;
      let (_, _, h_out, w_out) = y.dims4()?;
      let y = y
        .reshape((n, d_out, c_out, h_out, w_out))?
        .permute((0, 2, 1, 3, 4))?;

      out = Some(match out {
        Some(acc) => (acc + y)?,
        None => y,
      });
    }

    let Some(out) = out else {
      return Err(candle_core::Error::Msg("conv3d: empty kernel".to_owned()).bt());
    };

    match &self.bias {
      Some(bias) => out.broadcast_add(&bias.reshape((1, c_out, 1, 1, 1))?),
      None => out.contiguous(),
    }
  }
}

pub fn conv3d(
  in_channels: usize,
  out_channels: usize,
  kernel_size: usize,
  config: Conv3dConfig,
  vb: VarBuilder,
) -> Result<Conv3d, candle_core::Error> {
  let weight = vb.get_with_hints(
    (out_channels, in_channels, kernel_size, kernel_size, kernel_size),
    "weight",
    init::DEFAULT_KAIMING_NORMAL,
  )?;

  let bound = 1. / (in_channels as f64).sqrt();
  let bias = vb.get_with_hints(
    out_channels,
    "bias",
    Init::Uniform {
      lo: -bound,
      up: bound,
    },
  )?;

  Ok(Conv3d::new(weight, Some(bias), config))
}

pub fn conv3d_no_bias(
  in_channels: usize,
  out_channels: usize,
  kernel_size: usize,
  config: Conv3dConfig,
  vb: VarBuilder,
) -> Result<Conv3d, candle_core::Error> {
  let weight = vb.get_with_hints(
    (out_channels, in_channels, kernel_size, kernel_size, kernel_size),
    "weight",
    init::DEFAULT_KAIMING_NORMAL,
  )?;

  Ok(Conv3d::new(weight, None, config))
}

#[cfg(test)]
mod tests {
  use candle_core::{DType, Device, Module, Tensor};

  use candle_nn::{VarBuilder, VarMap};

  use super::{conv3d, conv3d_no_bias, Conv3d, Conv3dConfig};

  fn ones(shape: (usize, usize, usize, usize, usize)) -> Tensor {
    Tensor::ones(shape, DType::F32, &Device::Cpu).unwrap()
  }

  #[test]
  fn same_padding_counts_neighbours() {
    let conv = Conv3d::new(ones((1, 1, 3, 3, 3)), None, Conv3dConfig::same(3));
    let y = conv.forward(&ones((1, 1, 3, 3, 3))).unwrap();

    assert_eq!(y.dims(), &[1, 1, 3, 3, 3]);

    let values = y.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    // corner sees 2x2x2 inputs, centre sees all 27
    assert_eq!(values[0], 8.);
    assert_eq!(values[13], 27.);
    assert_eq!(values[26], 8.);
  }

  #[test]
  fn constructors_register_kernel_and_optional_bias() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let config = Conv3dConfig {
      padding: 1,
      stride: 2,
    };

    let with_bias = conv3d(2, 4, 3, config, vb.pp("a")).unwrap();
    assert_eq!(with_bias.weight().dims(), &[4, 2, 3, 3, 3]);
    assert_eq!(with_bias.bias().unwrap().dims(), &[4]);
    assert_eq!(with_bias.config(), &config);

    let without = conv3d_no_bias(2, 4, 1, Conv3dConfig::default(), vb.pp("b")).unwrap();
    assert_eq!(without.weight().dims(), &[4, 2, 1, 1, 1]);
    assert!(without.bias().is_none());
    assert_eq!(without.config().stride, 1);

    assert_eq!(varmap.all_vars().len(), 3);
  }

  #[test]
  fn stride_two_halves_every_axis() {
    let config = Conv3dConfig {
      padding: 1,
      stride: 2,
    };
    let conv = Conv3d::new(ones((2, 3, 3, 3, 3)), None, config);
    let y = conv.forward(&ones((1, 3, 8, 6, 4))).unwrap();

    assert_eq!(y.dims(), &[1, 2, 4, 3, 2]);
  }

  #[test]
  fn odd_extent_rounds_up_under_stride_two() {
    let config = Conv3dConfig {
      padding: 1,
      stride: 2,
    };
    assert_eq!(config.out_size(15, 3), 8);
    assert_eq!(config.out_size(16, 3), 8);
  }

  #[test]
  fn bias_is_added_per_output_channel() {
    let bias = Tensor::new(&[1f32, -1.], &Device::Cpu).unwrap();
    let conv = Conv3d::new(ones((2, 1, 1, 1, 1)), Some(bias), Conv3dConfig::default());
    let y = conv.forward(&ones((1, 1, 2, 2, 2))).unwrap();

    let channels = y.flatten_from(2).unwrap().to_vec3::<f32>().unwrap();
    assert_eq!(channels[0][0], vec![2.; 8]);
    assert_eq!(channels[0][1], vec![0.; 8]);
  }

  #[test]
  fn each_depth_tap_uses_its_own_kernel_plane() {
    // kernel depth taps weighted 1, 10, 100 with a single-voxel spatial extent
    let kernel = Tensor::new(&[1f32, 10., 100.], &Device::Cpu)
      .unwrap()
      .reshape((1, 1, 3, 1, 1))
      .unwrap();
    let input = Tensor::new(&[1f32, 2., 3.], &Device::Cpu)
      .unwrap()
      .reshape((1, 1, 3, 1, 1))
      .unwrap();

    let conv = Conv3d::new(kernel, None, Conv3dConfig::default());
    let y = conv.forward(&input).unwrap();

    assert_eq!(y.flatten_all().unwrap().to_vec1::<f32>().unwrap(), vec![321.]);
  }
}
