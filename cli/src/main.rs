use std::{
    env::current_exe,
    fs,
    io::{Write, stderr, stdout},
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use fern::Dispatch;
use log::{LevelFilter, info};
use patrol::{Candidate, Database, PriorityRule, Route, Settings, parse_rules, select_by_priority};

#[derive(Parser, Debug)]
#[command(name = "patrol")]
#[command(about = "Manage patrol routes and try out collectible priority rules")]
struct Cli {
    /// Database file, defaults to local.db next to the executable
    #[arg(long)]
    database: Option<PathBuf>,
    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage stored routes
    Route {
        #[command(subcommand)]
        command: RouteCommands,
    },
    /// Show or reset navigation and priority settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Work with priority rule files
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Select candidates from a JSON file with the stored priority settings
    Select {
        #[arg(long)]
        candidates: PathBuf,
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Priority list 1 to use instead of the stored one, one rule per line
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Pick newly available candidates first
        #[arg(long, default_value_t = false)]
        new: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RouteCommands {
    /// Insert or replace a route from a JSON file
    Import { file: PathBuf },
    List,
    Show { name: String },
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum SettingsCommands {
    Show,
    Reset,
}

#[derive(Subcommand, Debug)]
enum RulesCommands {
    /// Print the rules as they will be matched
    Check { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logger(cli.log_file.as_deref())?;
    log_panics::init();

    let path = match cli.database {
        Some(path) => path,
        None => current_exe()?
            .parent()
            .ok_or_else(|| anyhow!("executable has no parent directory"))?
            .join("local.db"),
    };
    let database = Database::open(&path)
        .with_context(|| format!("failed to open database {}", path.display()))?;

    run(&database, cli.command, &mut stdout().lock())
}

fn setup_logger(log_file: Option<&Path>) -> Result<()> {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(stderr());
    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }
    dispatch.apply()?;
    Ok(())
}

fn run(database: &Database, command: Commands, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Route { command } => run_route(database, command, out),
        Commands::Settings { command } => run_settings(database, command, out),
        Commands::Rules {
            command: RulesCommands::Check { file },
        } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            for (index, rule) in parse_rules(&text).iter().enumerate() {
                match PriorityRule::parse(rule) {
                    Some(PriorityRule::Bare(text)) => writeln!(out, "{}\tbare\t{text}", index + 1)?,
                    Some(rule) => writeln!(out, "{}\tcategory\t{rule}", index + 1)?,
                    None => (),
                }
            }
            Ok(())
        }
        Commands::Select {
            candidates,
            count,
            rules,
            new,
        } => {
            let json = fs::read_to_string(&candidates)
                .with_context(|| format!("failed to read {}", candidates.display()))?;
            let candidates = serde_json::from_str::<Vec<Candidate>>(&json)?;
            let mut config = database.query_or_upsert_settings()?.priority;
            if let Some(rules) = rules {
                config.priority_1 = parse_rules(&fs::read_to_string(&rules)?);
            }
            if new {
                config.consider_new = true;
            }

            let selected = select_by_priority(&candidates, count, &config);
            writeln!(out, "{}", serde_json::to_string_pretty(&selected)?)?;
            Ok(())
        }
    }
}

fn run_route(database: &Database, command: RouteCommands, out: &mut impl Write) -> Result<()> {
    match command {
        RouteCommands::Import { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let mut route = serde_json::from_str::<Route>(&json)?;
            route.id = None;
            database.upsert_route(&mut route)?;
            info!(target: "cli", "imported route {} with {} waypoints", route.name, route.len());
            writeln!(out, "{}", route.name)?;
        }
        RouteCommands::List => {
            for route in database.query_routes()? {
                writeln!(out, "{}\t{}\t{}", route.name, route.area, route.len())?;
            }
        }
        RouteCommands::Show { name } => {
            let route = find_route(database, &name)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&route)?)?;
        }
        RouteCommands::Delete { name } => {
            let route = find_route(database, &name)?;
            database.delete_route(&route)?;
            info!(target: "cli", "deleted route {name}");
        }
    }
    Ok(())
}

fn run_settings(
    database: &Database,
    command: SettingsCommands,
    out: &mut impl Write,
) -> Result<()> {
    let mut settings = database.query_or_upsert_settings()?;
    if let SettingsCommands::Reset = command {
        settings = Settings {
            id: settings.id,
            ..Settings::default()
        };
        database.upsert_settings(&mut settings)?;
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&settings)?)?;
    Ok(())
}

fn find_route(database: &Database, name: &str) -> Result<Route> {
    database
        .route_by_name(name)?
        .ok_or_else(|| anyhow!("route {name} does not exist"))
}
