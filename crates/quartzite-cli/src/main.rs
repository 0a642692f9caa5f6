//! Demo harness for `quartzite-core` — registers a couple of sample job
//! classes, schedules them per CLI flags, and runs until interrupted.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use quartzite_core::{
    config, CronTrigger, Job, JobDataMap, JobDetail, JobExecutionContext, JobExecutionError, JobRegistry, Key,
    Scheduler, SimpleTrigger, Trigger, TriggerSchedule,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "quartzite", about = "Run the quartzite job scheduler", version)]
struct Cli {
    /// Path to a SchedulerOptions TOML file. Defaults to `QUARTZITE_CONFIG`
    /// or `~/.quartzite/quartzite.toml`.
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schedule the built-in demo jobs and run until Ctrl+C.
    Run {
        /// Repeat interval in milliseconds for the heartbeat demo job.
        #[arg(long, default_value_t = 5_000)]
        every_ms: i64,
        /// Cron expression (six-field) for the periodic-report demo job.
        #[arg(long, default_value = "0 0 * * * *")]
        cron: String,
    },
    /// Print the resolved scheduler configuration as JSON and exit.
    PrintConfig,
}

struct HeartbeatJob;
impl Job for HeartbeatJob {
    fn execute(&self, ctx: &mut JobExecutionContext) -> Result<(), JobExecutionError> {
        info!(fire_instance_id = %ctx.fire_instance_id, "heartbeat");
        Ok(())
    }
}

struct ReportJob;
impl Job for ReportJob {
    fn execute(&self, ctx: &mut JobExecutionContext) -> Result<(), JobExecutionError> {
        let note = ctx.merged_data.get_str("note").unwrap_or("periodic report");
        info!(fire_instance_id = %ctx.fire_instance_id, note, "report job fired");
        Ok(())
    }
}

fn load_options(path: Option<std::path::PathBuf>) -> quartzite_core::SchedulerOptions {
    match path {
        Some(p) => config::load_from_path(&p).unwrap_or_else(|e| {
            eprintln!("error: failed to load {}: {e}", p.display());
            std::process::exit(1);
        }),
        None => config::load_default(),
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::PrintConfig => {
            let options = load_options(cli.config);
            println!("{}", serde_json::to_string_pretty(&options).unwrap_or_default());
        }
        Commands::Run { every_ms, cron } => {
            let options = load_options(cli.config);
            let registry = Arc::new(JobRegistry::new());
            registry.register("demo.heartbeat", || Box::new(HeartbeatJob) as Box<dyn Job>);
            registry.register("demo.report", || Box::new(ReportJob) as Box<dyn Job>);

            let scheduler = Scheduler::new(options, registry);

            let heartbeat_job = JobDetail::new(Key::new("heartbeat"), "demo.heartbeat").durable(true);
            let heartbeat_trigger = Trigger::new(
                Key::new("heartbeat-trigger"),
                Key::new("heartbeat"),
                TriggerSchedule::Simple(SimpleTrigger::repeat_forever(every_ms)),
            );
            if let Err(e) = scheduler.schedule_job(heartbeat_job, heartbeat_trigger) {
                eprintln!("error: failed to schedule heartbeat job: {e}");
                std::process::exit(1);
            }

            match CronTrigger::utc(&cron) {
                Ok(cron_schedule) => {
                    let report_job = JobDetail::new(Key::new("report"), "demo.report")
                        .durable(true)
                        .with_data({
                            let mut data = JobDataMap::new();
                            data.insert("note", "hourly report");
                            data
                        });
                    let report_trigger = Trigger::new(
                        Key::new("report-trigger"),
                        Key::new("report"),
                        TriggerSchedule::Cron(cron_schedule),
                    );
                    if let Err(e) = scheduler.schedule_job(report_job, report_trigger) {
                        eprintln!("error: failed to schedule report job: {e}");
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("error: invalid cron expression {cron:?}: {e}");
                    std::process::exit(1);
                }
            }

            if let Err(e) = scheduler.start() {
                eprintln!("error: failed to start scheduler: {e}");
                std::process::exit(1);
            }
            info!("scheduler running, press Ctrl+C to stop");

            let shutdown_scheduler = Arc::clone(&scheduler);
            ctrlc::set_handler(move || {
                info!("shutdown requested");
                let _ = shutdown_scheduler.shutdown(true);
                std::process::exit(0);
            })
            .expect("failed to install Ctrl+C handler");

            loop {
                std::thread::sleep(std::time::Duration::from_secs(3600));
            }
        }
    }
}
