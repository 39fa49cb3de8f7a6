use super::common::{Common, CommonArgs};
use modstats::Result;
use modstats::collector::DataCollector;
use modstats::storage::{NullSaveHandler, SaveHandler};
use ohno::bail;

const LOG_TARGET: &str = "   collect";

#[derive(clap::Parser, Debug)]
pub struct CollectArgs {
    /// CurseForge project to collect (repeatable)
    #[arg(long = "project", value_name = "ID", required = true)]
    pub projects: Vec<u64>,

    /// Collect even when the stored data is current
    #[arg(long)]
    pub force: bool,

    /// Resolve and report without writing statistics
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn collect(args: &CollectArgs) -> Result<()> {
    let common = Common::new(&args.common).await?;
    let collector = DataCollector::new(common.resolver()?);

    let mut handler: Box<dyn SaveHandler> = if args.dry_run {
        Box::new(NullSaveHandler)
    } else {
        Box::new(common.stats_handler()?)
    };

    let mut failed = 0;
    for &project_id in &args.projects {
        handler.begin()?;

        match collector.collect_data(handler.as_mut(), project_id, args.force).await {
            Ok(true) => {
                handler.commit()?;
                println!("Collected project {project_id}");
            }
            Ok(false) => {
                handler.rollback()?;
                println!("Nothing collected for project {project_id}");
            }
            Err(e) => {
                handler.rollback()?;
                log::error!(target: LOG_TARGET, "Collecting project {project_id} failed: {e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} projects could not be collected", args.projects.len());
    }

    Ok(())
}
