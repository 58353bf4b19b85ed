use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;

use burn::module::Module;
use burn::tensor::{Distribution, Tensor};
use burn_ndarray::NdArray;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use convnet::{ActorCriticConfig, DEFAULT_PRECURSOR_WIDTH, InputSpace};

type Backend = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(
    name = "summary",
    about = "Build the convolutional actor-critic network and report its shapes",
    version
)]
struct Args {
    /// Input channels per sample
    #[arg(long, default_value_t = 3)]
    channels: usize,

    /// Input height per sample
    #[arg(long, default_value_t = 32)]
    height: usize,

    /// Input width per sample
    #[arg(long, default_value_t = 32)]
    width: usize,

    /// Number of policy categories
    #[arg(long, default_value_t = 4)]
    outputs: usize,

    /// Width of the shared precursor layers
    #[arg(long, default_value_t = DEFAULT_PRECURSOR_WIDTH)]
    precursor_width: usize,

    /// Dropout probability applied before every dense layer
    #[arg(long, default_value_t = 0.0)]
    dropout: f64,

    /// Batch size of the random probe input
    #[arg(long, default_value_t = 2)]
    batch: usize,

    /// JSON network configuration; overrides the shape flags above
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<ActorCriticConfig, Box<dyn Error>> {
    if let Some(path) = &args.config {
        let raw = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&raw)?);
    }
    let space = InputSpace::new(args.channels, args.height, args.width)?;
    Ok(ActorCriticConfig::new(space, args.outputs)
        .with_precursor_width(args.precursor_width)
        .with_dropout(args.dropout))
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    if args.batch == 0 {
        return Err("batch size must be positive".into());
    }
    let config = load_config(&args)?;
    let device = Default::default();
    let network = config.init::<Backend>(&device)?;

    let space = config.input_space;
    let input = Tensor::<Backend, 4>::random(
        [args.batch, space.channels, space.height, space.width],
        Distribution::Default,
        &device,
    );
    let (value, policy) = network.forward(input)?;

    println!("input space:     {space}");
    println!("feature space:   {}", config.feature_space()?);
    println!("feature size:    {}", network.feature_size()?);
    println!("parameters:      {}", network.num_params());
    println!("value shape:     {:?}", value.dims());
    println!("policy shape:    {:?}", policy.dims());
    Ok(())
}
