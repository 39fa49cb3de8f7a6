use super::common::{Common, CommonArgs};
use chrono::DateTime;
use clap::Parser;
use modstats::Result;
use modstats::deps::SkipReason;

#[derive(Parser, Debug)]
pub struct SkippedArgs {
    /// Only list files skipped for this reason
    #[arg(long, value_name = "REASON")]
    pub reason: Option<SkipReason>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn list_skipped(args: &SkippedArgs) -> Result<()> {
    let common = Common::new(&args.common).await?;
    let store = common.dependency_store()?;

    let skipped = match args.reason {
        Some(reason) => store.list_skipped(reason, None)?,
        None => store.list_all_skipped()?,
    };

    if skipped.is_empty() {
        println!("No skipped files");
        return Ok(());
    }

    for entry in &skipped {
        let when = DateTime::from_timestamp(entry.timestamp, 0).map_or_else(|| entry.timestamp.to_string(), |t| t.to_rfc3339());
        println!("{:<16} {:<20} {when} ({}) {}", entry.file.to_string(), entry.reason.to_string(), entry.timestamp, entry.url);
    }

    println!("\n{} skipped files", skipped.len());
    Ok(())
}
