use camino::Utf8PathBuf;
use clap::Parser;
use modstats::Result;
use modstats::config::Config;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file [default: one of modstats.[toml|yml|yaml|json] ]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

pub fn validate_config(args: &ValidateArgs) -> Result<()> {
    let base_dir = Utf8PathBuf::from(".");
    let (config, warnings) = Config::load(&base_dir, args.config.as_ref())?;

    match &args.config {
        Some(path) => println!("Configuration {path} is well-formed"),
        None => println!("Configuration is well-formed"),
    }
    println!("  statistics database:  {}", config.stats_db);
    println!("  dependency database:  {}", config.dependencies_db);
    println!("  max file length:      {} bytes", config.max_file_length);

    if warnings.is_empty() {
        return Ok(());
    }

    eprintln!("\nConfiguration warnings:");
    for warning in &warnings {
        eprintln!("   {warning}");
    }

    ohno::bail!("{} configuration warnings", warnings.len())
}
