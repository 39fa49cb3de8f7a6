//! Setup shared by the subcommands that touch the data directory.

use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Args;
use clap::ValueEnum;
use directories::ProjectDirs;
use modstats::Result;
use modstats::api::{CurseForgeClient, ModpackIndexClient, Pacer};
use modstats::config::Config;
use modstats::deps::{BoundedFetcher, DependencyResolver, DependencyStore, ResolverOptions};
use modstats::storage::{DataDirLockGuard, SqliteSaveHandler, acquire_data_dir_lock};
use ohno::{IntoAppError, app_err, bail};
use std::fs;
use std::sync::Arc;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Arguments shared by the subcommands that touch the data directory
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// CurseForge API key
    #[arg(long, value_name = "KEY", env = "CURSEFORGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to configuration file [default: one of modstats.[toml|yml|yaml|json] ]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the databases [default: the platform data directory]
    #[arg(long, value_name = "PATH")]
    pub data_dir: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

pub struct Common {
    pub config: Config,
    pub data_dir: Utf8PathBuf,
    api_key: Option<String>,
    _lock: DataDirLockGuard,
}

impl Common {
    /// Set up logging, load the configuration, and lock the data directory
    pub async fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level);

        let (config, warnings) = Config::load(&Utf8PathBuf::from("."), args.config.as_ref())?;

        if !warnings.is_empty() {
            eprintln!("\n⚠️  Configuration validation warnings:");
            for warning in &warnings {
                eprintln!("   {warning}");
            }
            eprintln!();
        }

        let data_dir = if let Some(data_dir) = &args.data_dir {
            data_dir.clone()
        } else {
            let dirs = ProjectDirs::from("", "", "modstats").into_app_err("Failed to determine data directory")?;
            Utf8PathBuf::from_path_buf(dirs.data_dir().to_path_buf())
                .map_err(|p| app_err!("data directory '{}' is not valid UTF-8", p.display()))?
        };

        fs::create_dir_all(&data_dir).into_app_err_with(|| format!("unable to create data directory '{data_dir}'"))?;
        let lock = acquire_data_dir_lock(data_dir.as_std_path()).await?;

        Ok(Self {
            config,
            data_dir,
            api_key: args.api_key.clone(),
            _lock: lock,
        })
    }

    pub fn dependency_store(&self) -> Result<DependencyStore> {
        DependencyStore::open(self.config.dependencies_db_path(&self.data_dir))
    }

    /// Open the statistics database, stamping new rows with the current time
    pub fn stats_handler(&self) -> Result<SqliteSaveHandler> {
        SqliteSaveHandler::open(self.config.stats_db_path(&self.data_dir), Utc::now().timestamp())
    }

    /// Build a resolver whose outbound requests all share one pacer
    pub fn resolver(&self) -> Result<DependencyResolver> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("a CurseForge API key is required: pass --api-key or set CURSEFORGE_API_KEY");
        };

        let config = &self.config;
        let pacer = Pacer::new(config.request_interval());
        let timeout = config.request_timeout();

        let curseforge = CurseForgeClient::new(api_key, config.curseforge_base_url.clone(), timeout, Arc::clone(&pacer))?;
        let modpack_index = ModpackIndexClient::new(config.modpack_index_base_url.clone(), timeout, Arc::clone(&pacer))?;
        let fetcher = BoundedFetcher::new(timeout, pacer)?;

        let options = ResolverOptions {
            scratch_dir: config.scratch_dir_path(&self.data_dir).into_std_path_buf(),
            max_file_length: config.max_file_length,
            skip_zero_downloads: config.skip_zero_downloads,
        };

        Ok(DependencyResolver::new(
            curseforge,
            modpack_index,
            fetcher,
            self.dependency_store()?,
            options,
        ))
    }
}

/// Initialize logger based on log level
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}
