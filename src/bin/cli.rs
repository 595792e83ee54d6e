//! osu-schedule CLI
//!
//! Queries the schedule service through the cached client and prints JSON.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use osu_schedule::{
    error::Result,
    models::Config,
    services::{ScheduleClient, client},
};

/// osu-schedule - University class schedule client
#[derive(Parser, Debug)]
#[command(
    name = "osu-schedule",
    version,
    about = "Cached client for the university class schedule",
    after_help = "With the default memory cache backend every run starts with an empty cache. \
                  Set cache.backend = \"redis\" (feature `redis`) to share entries between runs."
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "osu-schedule.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Drop the cached entry before querying (only useful with a shared cache backend)
    #[arg(long, global = true)]
    refresh: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List faculties
    Faculties,

    /// List courses of a faculty
    Courses {
        #[arg(long)]
        faculty: i64,
    },

    /// List groups of a course
    Groups {
        #[arg(long)]
        faculty: i64,
        #[arg(long)]
        course: i64,
    },

    /// List departments of a faculty
    Departments {
        #[arg(long)]
        faculty: i64,
    },

    /// List teachers of a department
    Teachers {
        #[arg(long)]
        department: i64,
    },

    /// Show a group's schedule
    StudentSchedule {
        #[arg(long)]
        group: i64,
        /// First day to show (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day to show (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Show a teacher's schedule
    TeacherSchedule {
        #[arg(long)]
        teacher: i64,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging from the verbosity flag or the configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn refresh(client: &ScheduleClient, enabled: bool, name: &str, args: &[i64]) -> Result<()> {
    if enabled {
        log::info!("Refreshing {}{:?}", name, args);
        client.cache().invalidate(name, args).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let config = if config_found {
        Config::load(&cli.config)?
    } else {
        Config::default()
    };
    init_logging(cli.verbose, &config.logging.level);

    if config_found {
        log::debug!("Loaded configuration from {}", cli.config.display());
    } else {
        log::warn!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
    }

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK");
        return Ok(());
    }

    config.validate()?;
    if cli.refresh && !config.cache.backend.is_shared() {
        log::warn!("--refresh has no effect with the memory cache backend: every run starts empty");
    }
    let schedule_client = ScheduleClient::from_config(&config).await?;
    let c = &schedule_client;
    let r = cli.refresh;

    match cli.command {
        Command::Faculties => {
            refresh(c, r, client::FACULTIES, &[]).await?;
            print_json(&c.faculties().await?)?;
        }
        Command::Courses { faculty } => {
            refresh(c, r, client::COURSES, &[faculty]).await?;
            print_json(&c.courses(faculty).await?)?;
        }
        Command::Groups { faculty, course } => {
            refresh(c, r, client::GROUPS, &[faculty, course]).await?;
            print_json(&c.groups(faculty, course).await?)?;
        }
        Command::Departments { faculty } => {
            refresh(c, r, client::DEPARTMENTS, &[faculty]).await?;
            print_json(&c.departments(faculty).await?)?;
        }
        Command::Teachers { department } => {
            refresh(c, r, client::TEACHERS, &[department]).await?;
            print_json(&c.teachers(department).await?)?;
        }
        Command::StudentSchedule { group, from, to } => {
            refresh(c, r, client::STUDENT_SCHEDULE, &[group]).await?;
            let schedule = c.student_schedule(group).await?;
            print_json(&schedule.between(from, to))?;
        }
        Command::TeacherSchedule { teacher, from, to } => {
            refresh(c, r, client::TEACHER_SCHEDULE, &[teacher]).await?;
            let schedule = c.teacher_schedule(teacher).await?;
            print_json(&schedule.between(from, to))?;
        }
        Command::Validate => {}
    }

    Ok(())
}
