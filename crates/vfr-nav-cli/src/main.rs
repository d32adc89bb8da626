// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};
use std::fs;
use std::path::PathBuf;
use vfr_nav_core::keys::plan_key;
use vfr_nav_core::navigation::{
    self, format_base_factor, format_course, format_eta, format_minutes,
};
use vfr_nav_core::{
    FileStore, FlightPlanRepository, KeyValueStore, Leg, LegPatch, PlanError, Reorder,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the planner's data
    #[arg(long, env = "VFR_NAV_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Flight plan to work on (defaults to the last selected one)
    #[arg(short, long, global = true)]
    plan: Option<String>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored flight plans
    List,
    /// Print the navigation log of the plan
    Show,
    /// Create a flight plan and select it
    Create { name: String },
    /// Select a flight plan
    Select { name: String },
    /// Rename the plan
    Rename { name: String },
    /// Delete the plan
    Delete,
    /// Set aircraft registration and cruise speed (kt)
    Aircraft {
        #[arg(long)]
        registration: Option<String>,
        #[arg(long, value_parser = parse_number)]
        speed: Option<f64>,
    },
    /// Set departure and arrival ICAO codes
    Route {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Set the start of the navigation ("now", RFC 3339 or "YYYY-MM-DD HH:MM" local)
    Date { value: String },
    /// Shift the start time so that leg N ends now (or at --at)
    Rebase {
        leg: usize,
        #[arg(long)]
        at: Option<String>,
    },
    /// Show or hide the wind columns
    ToggleWind,
    /// Edit legs
    #[command(subcommand)]
    Leg(LegCommand),
    /// Replace the plan with a JSON export
    Import { file: PathBuf },
    /// Write the plan as JSON
    Export {
        /// Target directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum LegCommand {
    /// Append a leg continuing the last one
    Add {
        /// Start from a blank leg instead
        #[arg(long)]
        blank: bool,
    },
    /// Insert a blank leg before leg N
    Insert { leg: usize },
    /// Remove legs by number
    Remove {
        #[arg(required = true)]
        legs: Vec<usize>,
    },
    /// Move leg FROM to position TO
    Move { from: usize, to: usize },
    /// Change fields of leg N ("-" or "" empties a number)
    Set {
        leg: usize,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_number)]
        desired: Option<f64>,
        #[arg(long, value_parser = parse_number)]
        minimal: Option<f64>,
        #[arg(long, value_parser = parse_number)]
        route: Option<f64>,
        #[arg(long, value_parser = parse_number)]
        distance: Option<f64>,
        #[arg(long, value_parser = parse_number)]
        wind_dir: Option<f64>,
        #[arg(long, value_parser = parse_number)]
        wind_speed: Option<f64>,
    },
}

/// Accepts an empty value as an unfilled field.
fn parse_number(raw: &str) -> Result<f64, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "-" {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|_| format!("{:?} is not a number", raw))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("now") {
        return Ok(Utc::now());
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Ok(date.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .with_context(|| format!("Unrecognized date {:?}", raw))?;
    match Local.from_local_datetime(&naive).single() {
        Some(local) => Ok(local.with_timezone(&Utc)),
        None => bail!("{:?} is ambiguous in the local time zone", raw),
    }
}

/// Leg numbers are 1-based on the command line; 0 never matches a leg.
fn leg_index(number: usize) -> usize {
    number.checked_sub(1).unwrap_or(usize::MAX)
}

/// Position for `leg insert`. Numbers past the end append.
fn insert_position(number: usize) -> Result<usize> {
    match number.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("Leg numbers start at 1"),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let config = ConfigBuilder::new().set_time_level(LevelFilter::Off).build();
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

fn open_repository(store: FileStore, plan: Option<&str>) -> Result<FlightPlanRepository<FileStore>, PlanError> {
    match plan {
        Some(name) => {
            let key = plan_key(name);
            if !store.keys()?.contains(&key) {
                return Err(PlanError::Storage(anyhow::anyhow!(
                    "No flight plan named {:?}",
                    name
                )));
            }
            FlightPlanRepository::open_at(store, &key)
        }
        None => FlightPlanRepository::open(store),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let store = match &cli.config_dir {
        Some(dir) => FileStore::new(dir.join("plans")),
        None => FileStore::open_default(),
    };

    let mut repo = match open_repository(store.clone(), cli.plan.as_deref()) {
        Ok(repo) => repo,
        Err(PlanError::CorruptedData { key, errors }) if matches!(cli.command, Commands::Delete) => {
            // An unreadable plan can still be thrown away
            let mut store = store;
            store.remove(&key)?;
            println!("Deleted corrupted plan {} ({} invalid fields)", key, errors.len());
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    match cli.command {
        Commands::List => {
            for (key, name) in repo.plans() {
                let marker = if key == repo.active_key() { "*" } else { " " };
                println!("{} {}", marker, name);
            }
        }
        Commands::Show => print_plan(&repo),
        Commands::Create { name } => {
            repo.create(&name)?;
            println!("Selected {}", repo.active_name());
        }
        Commands::Select { name } => {
            if !repo.plans().contains_key(&plan_key(&name)) {
                bail!("No flight plan named {:?}", name);
            }
            repo.switch_to_name(&name)?;
            println!("Selected {}", repo.active_name());
        }
        Commands::Rename { name } => {
            repo.rename(&name)?;
            println!("Renamed to {}", repo.active_name());
        }
        Commands::Delete => {
            let deleted = repo.active_name().to_string();
            repo.delete_active()?;
            println!("Deleted {}, now on {}", deleted, repo.active_name());
        }
        Commands::Aircraft {
            registration,
            speed,
        } => {
            if let Some(registration) = registration {
                repo.set_aircraft_registration(&registration)?;
            }
            if let Some(speed) = speed {
                repo.set_cruise_speed(speed)?;
            }
            print_plan(&repo);
        }
        Commands::Route { from, to } => {
            if let Some(from) = from {
                repo.set_departure_icao(&from.to_uppercase())?;
            }
            if let Some(to) = to {
                repo.set_arrival_icao(&to.to_uppercase())?;
            }
            print_plan(&repo);
        }
        Commands::Date { value } => {
            repo.set_date(parse_date(&value)?)?;
            print_plan(&repo);
        }
        Commands::Rebase { leg, at } => {
            let at = match at {
                Some(raw) => parse_date(&raw)?,
                None => Utc::now(),
            };
            if !repo.rebase_on_waypoint(leg_index(leg), at)? {
                bail!("Leg {} has no known time to rebase on", leg);
            }
            print_plan(&repo);
        }
        Commands::ToggleWind => {
            repo.toggle_hide_wind()?;
            print_plan(&repo);
        }
        Commands::Leg(command) => {
            run_leg_command(&mut repo, command)?;
            print_plan(&repo);
        }
        Commands::Import { file } => {
            let key = repo.active_key().to_string();
            repo.import_file(&key, &file)?;
            println!("Imported {} into {}", file.display(), repo.active_name());
        }
        Commands::Export { out } => {
            let exported = repo.export()?;
            fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create {}", out.display()))?;
            let path = out.join(&exported.filename);
            fs::write(&path, &exported.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
    }

    Ok(())
}

fn run_leg_command(repo: &mut FlightPlanRepository<FileStore>, command: LegCommand) -> Result<()> {
    match command {
        LegCommand::Add { blank: true } => repo.append_leg(None)?,
        LegCommand::Add { blank: false } => repo.append_following_leg()?,
        LegCommand::Insert { leg } => repo.insert_legs(insert_position(leg)?, vec![Leg::new()])?,
        LegCommand::Remove { legs } => {
            let indexes: Vec<usize> = legs.into_iter().map(leg_index).collect();
            if repo.remove_legs(&indexes)? == 0 {
                bail!("No such leg");
            }
        }
        LegCommand::Move { from, to } => {
            let reorder = Reorder {
                from: leg_index(from),
                to: leg_index(to),
            };
            if !repo.reorder_leg(reorder)? {
                bail!("Cannot move leg {} to {}", from, to);
            }
        }
        LegCommand::Set {
            leg,
            name,
            desired,
            minimal,
            route,
            distance,
            wind_dir,
            wind_speed,
        } => {
            let mut patch = LegPatch::new();
            if let Some(name) = name {
                patch = patch.name(name);
            }
            if let Some(desired) = desired {
                patch = patch.desired_altitude(desired);
            }
            if let Some(minimal) = minimal {
                patch = patch.minimal_altitude(minimal);
            }
            if let Some(route) = route {
                patch = patch.magnetic_route(route);
            }
            if let Some(distance) = distance {
                patch = patch.distance(distance);
            }
            if let Some(direction) = wind_dir {
                patch = patch.wind_direction(direction);
            }
            if let Some(velocity) = wind_speed {
                patch = patch.wind_velocity(velocity);
            }
            if patch.is_empty() {
                bail!("Nothing to change");
            }
            if !repo.set_leg(leg_index(leg), &patch)? {
                bail!("No leg {}", leg);
            }
        }
    }
    Ok(())
}

fn number(value: f64) -> String {
    if value.is_finite() {
        format!("{}", value)
    } else {
        "-".to_string()
    }
}

fn print_plan(repo: &FlightPlanRepository<FileStore>) {
    let plan = repo.plan();
    println!(
        "{}  {}  Vp {} kt  Fb {}  {} -> {}  {}",
        repo.active_name(),
        plan.aircraft.registration,
        number(plan.aircraft.cruise_speed),
        format_base_factor(repo.base_factor()),
        plan.departure_airfield.icao,
        plan.arrival_airfield.icao,
        plan.date.with_timezone(&Local).format("%d.%m.%Y %H:%M")
    );
    println!();

    let mut header = format!(
        "{:>2}  {:<16} {:>11} {:>6} {:>7} {:>6} {:>7} {:>7} {:>5}",
        "#", "Name", "Alt/Min ft", "Rm", "Cm", "D", "T", "Tc", "ETA"
    );
    if !plan.hide_wind {
        header.push_str(&format!(" {:>5} {:>4}", "W°", "Wkt"));
    }
    println!("{}", header);

    for (index, computed) in repo.compute_legs().iter().enumerate() {
        let leg = computed.leg;
        let c = &computed.computation;
        let mut line = format!(
            "{:>2}  {:<16} {:>11} {:>6} {:>7} {:>6} {:>7} {:>7} {:>5}",
            index + 1,
            leg.name,
            format!("{}/{}", number(leg.alt.desired), number(leg.alt.minimal)),
            number(leg.magnetic_route),
            format_course(c.magnetic_course),
            number(leg.distance),
            format_minutes(c.duration),
            format_minutes(c.corrected_duration),
            format_eta(c.reach_date)
        );
        if !plan.hide_wind {
            line.push_str(&format!(
                " {:>5} {:>4}",
                number(leg.wind.direction),
                number(leg.wind.velocity)
            ));
        }
        println!("{}", line);
    }

    println!();
    println!(
        "Total {} NM  {} min",
        number(navigation::total_distance(plan)),
        format_minutes(navigation::total_time(plan))
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_accepts_empty() {
        assert!(parse_number("").unwrap().is_nan());
        assert!(parse_number("-").unwrap().is_nan());
        assert_eq!(parse_number(" 12.5 ").unwrap(), 12.5);
        assert!(parse_number("abc").is_err());
    }

    #[test]
    fn test_leg_numbers_are_one_based() {
        assert_eq!(leg_index(1), 0);
        assert_eq!(leg_index(0), usize::MAX);
    }

    #[test]
    fn test_insert_refuses_leg_zero() {
        assert!(insert_position(0).is_err());
        assert_eq!(insert_position(1).unwrap(), 0);
        assert_eq!(insert_position(9).unwrap(), 8);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2026-10-19T08:30:00Z").unwrap(),
            Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap()
        );
        assert!(parse_date("2026-10-19 10:30").is_ok());
        assert!(parse_date("tomorrow").is_err());
    }

    #[test]
    fn test_cli_parses_leg_set() {
        let cli = Cli::try_parse_from([
            "vfr-nav", "--plan", "Tours", "leg", "set", "2", "--distance", "", "--wind-dir", "270",
        ])
        .unwrap();
        assert_eq!(cli.plan.as_deref(), Some("Tours"));
        match cli.command {
            Commands::Leg(LegCommand::Set {
                leg,
                distance,
                wind_dir,
                ..
            }) => {
                assert_eq!(leg, 2);
                assert!(distance.unwrap().is_nan());
                assert_eq!(wind_dir, Some(270.0));
            }
            _ => panic!("expected leg set"),
        }
    }
}
