use super::common::{Common, CommonArgs};
use clap::Parser;
use modstats::Result;
use modstats::deps::SkipReason;

#[derive(Parser, Debug)]
pub struct RetryArgs {
    /// Retry files skipped for this reason
    #[arg(long, value_name = "REASON")]
    pub reason: SkipReason,

    /// Size ceiling for the retry, in bytes [default: `retry_max_file_length` from the configuration]
    #[arg(long, value_name = "BYTES")]
    pub max_file_length: Option<u64>,

    /// Only retry files skipped at exactly this Unix timestamp
    #[arg(long, value_name = "UNIX")]
    pub timestamp: Option<i64>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn retry(args: &RetryArgs) -> Result<()> {
    let common = Common::new(&args.common).await?;
    let resolver = common.resolver()?;

    let max_file_length = args.max_file_length.unwrap_or(common.config.retry_max_file_length);
    let summary = resolver.retry_skipped(args.reason, max_file_length, args.timestamp).await?;

    println!("Resolved {} of {} files skipped with reason {}", summary.resolved, summary.attempted, args.reason);
    Ok(())
}
