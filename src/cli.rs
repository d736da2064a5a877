use clap::{Args, Parser, Subcommand};
use mulres_unet::{
  layers::{ActFun, NormKind, PadMode, UpsampleMode, UpsampleModes},
  MulResUNet3dConfig, Result, UNet2dConfig,
};

#[derive(Parser)]
#[command(version, author)]
#[command(about = "Assemble a U-Net topology and probe it with a zero tensor", long_about = None)]
pub struct Cli {
  #[command(subcommand)]
  pub variant: Variant,

  #[arg(short = 'C', long, global = true, help = "Use CPU instead of GPU for inference")]
  pub use_cpu: bool,

  #[arg(short, long, global = true, help = "Log every assembled level")]
  pub verbose: bool,

  #[arg(short, long, global = true, help = "Batch size of the probe tensor")]
  #[arg(value_name = "BATCH", default_value = "1")]
  pub batch: usize,

  #[arg(short, long, global = true, help = "Spatial extent of the probe tensor along every axis")]
  #[arg(value_name = "SIZE", default_value = "32")]
  pub size: usize,
}

#[derive(Subcommand)]
pub enum Variant {
  /// Volumetric multi-resolution U-Net
  Multires3d(MultiRes3dArgs),
  /// Plain 2D U-Net
  Plain2d(Plain2dArgs),
}

#[derive(Args)]
pub struct MultiRes3dArgs {
  #[arg(long, value_name = "CHANNELS", default_value = "1")]
  pub input_channels: usize,

  #[arg(long, value_name = "CHANNELS", default_value = "3")]
  pub output_channels: usize,

  #[arg(long, help = "Encoder widths per depth", value_delimiter = ',')]
  #[arg(default_value = "16,32,64,128,256")]
  pub down: Vec<usize>,

  #[arg(long, help = "Decoder widths per depth", value_delimiter = ',')]
  #[arg(default_value = "16,32,64,128,256")]
  pub up: Vec<usize>,

  #[arg(long, help = "Skip widths per depth below the input, 0 disables", value_delimiter = ',')]
  #[arg(default_value = "16,32,64,128")]
  pub skip: Vec<usize>,

  #[arg(long, help = "Multi-resolution width scale factor", default_value = "1.67")]
  pub alpha: f64,

  #[arg(long, help = "Squash the output with a sigmoid")]
  pub sigmoid: bool,

  #[arg(long, help = "Disable convolution biases")]
  pub no_bias: bool,

  #[arg(long, help = "nearest/bilinear, once or per depth", value_delimiter = ',')]
  #[arg(default_value = "nearest")]
  pub upsample: Vec<String>,

  #[arg(long, help = "ReLU/LeakyReLU/Tanh/ELU", default_value = "LeakyReLU")]
  pub act_fun: String,
}

impl MultiRes3dArgs {
  pub fn config(&self) -> Result<MulResUNet3dConfig> {
    let modes = self
      .upsample
      .iter()
      .map(|s| s.parse())
      .collect::<Result<Vec<UpsampleMode>>>()?;

    let upsample_mode = match modes.as_slice() {
      [mode] => UpsampleModes::All(*mode),
      _ => UpsampleModes::PerDepth(modes),
    };

    Ok(
      MulResUNet3dConfig::new(self.down.clone(), self.up.clone(), self.skip.clone())
        .with_input_channels(self.input_channels)
        .with_output_channels(self.output_channels)
        .with_alpha(self.alpha)
        .with_sigmoid(self.sigmoid)
        .with_bias(!self.no_bias)
        .with_upsample_mode(upsample_mode)
        .with_act_fun(self.act_fun.parse::<ActFun>()?),
    )
  }
}

#[derive(Args)]
pub struct Plain2dArgs {
  #[arg(long, value_name = "CHANNELS", default_value = "3")]
  pub input_channels: usize,

  #[arg(long, value_name = "CHANNELS", default_value = "3")]
  pub output_channels: usize,

  #[arg(long, help = "Widths per depth", value_delimiter = ',')]
  #[arg(default_value = "16,32,64,128,256")]
  pub filters: Vec<usize>,

  #[arg(long, help = "Extra bottleneck levels", default_value = "0")]
  pub more_layers: usize,

  #[arg(long, help = "Concatenate the downsampled input at every level")]
  pub concat_x: bool,

  #[arg(long, help = "ReLU/LeakyReLU/Tanh/ELU", default_value = "ReLU")]
  pub act_fun: String,

  #[arg(long, help = "deconv/nearest/bilinear", default_value = "deconv")]
  pub upsample: String,

  #[arg(long, help = "zero/replication/none", default_value = "zero")]
  pub pad: String,

  #[arg(long, help = "instance/batch/none", default_value = "instance")]
  pub norm: String,

  #[arg(long, help = "Keep the output unbounded instead of applying a sigmoid")]
  pub no_sigmoid: bool,

  #[arg(long, help = "Disable convolution biases")]
  pub no_bias: bool,
}

impl Plain2dArgs {
  pub fn config(&self) -> Result<UNet2dConfig> {
    Ok(
      UNet2dConfig::new(self.filters.clone())
        .with_input_channels(self.input_channels)
        .with_output_channels(self.output_channels)
        .with_more_layers(self.more_layers)
        .with_concat_x(self.concat_x)
        .with_act_fun(self.act_fun.parse::<ActFun>()?)
        .with_upsample_mode(self.upsample.parse::<UpsampleMode>()?)
        .with_pad(self.pad.parse::<PadMode>()?)
        .with_norm(self.norm.parse::<NormKind>()?)
        .with_sigmoid(!self.no_sigmoid)
        .with_bias(!self.no_bias),
    )
  }
}
