use clap::Args;
use ritual_core::{Config, ParticleField};

#[derive(Args)]
pub struct ParticlesArgs {
    /// Field seed (defaults to particles.seed)
    #[arg(long)]
    seed: Option<u64>,
    /// Number of particles (defaults to particles.count)
    #[arg(long)]
    count: Option<u32>,
}

pub fn run(args: ParticlesArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut spec = config.particle_spec();
    if let Some(count) = args.count {
        spec.count = count;
    }
    let seed = args.seed.unwrap_or(config.particles.seed);

    let field = ParticleField::generate(seed, &spec);
    println!("{}", serde_json::to_string_pretty(&field)?);
    Ok(())
}
