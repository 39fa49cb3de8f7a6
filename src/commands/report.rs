use super::common::{Common, CommonArgs};
use chrono::DateTime;
use clap::Parser;
use modstats::Result;

#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// CurseForge project to report on
    #[arg(long, value_name = "ID")]
    pub project: u64,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn report(args: &ReportArgs) -> Result<()> {
    let common = Common::new(&args.common).await?;
    let stats = common.stats_handler()?;

    let dependents = stats.project_dependents(args.project)?;
    println!("Project {} is bundled by {} projects", args.project, dependents.len());
    for dependent in &dependents {
        println!("  {:>10}  {}", dependent.project_id, dependent.name);
    }

    let composition = stats.download_composition(args.project)?;
    if composition.is_empty() {
        println!("\nNo download history with dependents");
        return Ok(());
    }

    println!("\n{:<25} {:>14} {:>14} {:>14}", "Collected", "Total", "Via modpacks", "Direct");
    for row in &composition {
        let when = DateTime::from_timestamp(row.timestamp, 0).map_or_else(|| row.timestamp.to_string(), |t| t.to_rfc3339());
        println!("{when:<25} {:>14} {:>14} {:>14}", row.total, row.via_dependents, row.direct);
    }

    Ok(())
}
