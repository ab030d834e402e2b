use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;
use vaxtrack_core::engine::{AdministerOptions, VaccinationEngine};
use vaxtrack_core::store::JsonlLedgerStore;
use vaxtrack_core::*;

#[derive(Parser)]
#[command(name = "vaxtrack")]
#[command(about = "Pediatric vaccination eligibility and scheduling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at info level instead of warn
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a vaccine's prerequisites are satisfied
    CheckPrereqs {
        #[arg(long)]
        child: String,
        #[arg(long)]
        vaccine: String,
    },

    /// Check whether a child has reached a vaccine's minimum age
    CheckAge {
        #[arg(long)]
        child: String,
        #[arg(long)]
        vaccine: String,
        /// Reference date (default: today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Show recorded doses against the maximum allowed
    CheckMax {
        #[arg(long)]
        child: String,
        #[arg(long)]
        vaccine: String,
    },

    /// Show booster progress for a vaccine
    RappelStatus {
        #[arg(long)]
        child: String,
        #[arg(long)]
        vaccine: String,
        /// Also report whether a dose was given on or after this date
        #[arg(long)]
        since: Option<NaiveDate>,
    },

    /// Record an administration
    Administer {
        #[arg(long)]
        child: String,
        #[arg(long)]
        vaccine: String,
        /// Administration date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Proceed even if recommended prerequisites are missing
        #[arg(long)]
        accept_recommended: bool,
    },

    /// Record a booster of an already started vaccine
    #[command(group(
        ArgGroup::new("rappel")
            .required(true)
            .args(["rappel_vaccine", "rappel_index", "rappel_delay"])
    ))]
    MarkRappel {
        #[arg(long)]
        child: String,
        /// Parent vaccine
        #[arg(long)]
        vaccine: String,
        /// Booster identified by its linked catalog vaccine
        #[arg(long)]
        rappel_vaccine: Option<String>,
        /// Booster identified by position in the schedule
        #[arg(long)]
        rappel_index: Option<usize>,
        /// Booster identified by its delay in days
        #[arg(long)]
        rappel_delay: Option<u32>,
        /// Administration date (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Remove an administration record
    Revoke {
        #[arg(long)]
        child: String,
        #[arg(long)]
        record: Uuid,
    },

    /// List overdue doses for a child
    Overdue {
        #[arg(long)]
        child: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// List doses falling due soon
    Upcoming {
        #[arg(long)]
        child: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Look-ahead window in days (default from config)
        #[arg(long)]
        horizon: Option<u32>,
    },

    /// Show administered vaccines with booster progress
    History {
        #[arg(long)]
        child: String,
    },

    /// Count children with at least one dose of a vaccine
    Coverage {
        #[arg(long)]
        vaccine: String,
    },

    /// List every child with overdue doses
    OverdueAll {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Show a vaccine's catalog entry with its prerequisites, suites and rappels
    VaccineInfo {
        #[arg(long)]
        vaccine: String,
    },

    /// Validate a catalog file (default: configured catalog or built-in)
    ValidateCatalog { path: Option<PathBuf> },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    vaxtrack_core::logging::init_with_level(if cli.verbose { "info" } else { "warn" });

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            if e.is_rule_violation() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir.clone() {
        config = config.with_data_dir(data_dir);
    }

    if let Commands::ValidateCatalog { path } = &cli.command {
        return cmd_validate_catalog(&config, path.clone(), cli.json);
    }

    let engine = VaccinationEngine::open(&config)?;
    let out = Output { json: cli.json };
    let today = chrono::Local::now().date_naive();

    match cli.command {
        Commands::CheckPrereqs { child, vaccine } => {
            let check = engine.check_prerequisites(&child, &vaccine)?;
            out.emit(&check, || {
                println!("{}", check.message);
                for missing in &check.missing {
                    println!("  - {} ({}) [{:?}]", missing.name, missing.vaccine_id, missing.requirement);
                }
            })
        }
        Commands::CheckAge { child, vaccine, as_of } => {
            let check = engine.check_age(&child, &vaccine, as_of.unwrap_or(today))?;
            out.emit(&check, || {
                let verdict = if check.eligible { "eligible" } else { "not yet eligible" };
                println!(
                    "{}: {} (minimum age {}, eligible from {}, child is {}y {}m {}d)",
                    check.vaccine_id,
                    verdict,
                    check.min_age,
                    check.eligible_from,
                    check.age.years,
                    check.age.months,
                    check.age.days
                );
            })
        }
        Commands::CheckMax { child, vaccine } => {
            let check = engine.check_max_doses(&child, &vaccine)?;
            out.emit(&check, || {
                println!(
                    "{}: {} of {} doses{}",
                    check.vaccine_id,
                    check.current_count,
                    check.max_allowed,
                    if check.max_reached { " (maximum reached)" } else { "" }
                );
            })
        }
        Commands::RappelStatus { child, vaccine, since } => {
            cmd_rappel_status(&engine, &out, &child, &vaccine, since)
        }
        Commands::Administer {
            child,
            vaccine,
            date,
            accept_recommended,
        } => {
            let options = AdministerOptions {
                accept_missing_recommended: accept_recommended,
            };
            let record = engine.administer_vaccine(&child, &vaccine, date.unwrap_or(today), options)?;
            out.emit(&record, || {
                println!(
                    "✓ Recorded {} for {} on {} ({})",
                    record.vaccine_id, record.child_id, record.date_administered, record.id
                );
            })
        }
        Commands::MarkRappel {
            child,
            vaccine,
            rappel_vaccine,
            rappel_index,
            rappel_delay,
            date,
        } => {
            let target = match (rappel_vaccine, rappel_index, rappel_delay) {
                (Some(id), _, _) => RappelTarget::Vaccine(id),
                (None, Some(index), _) => RappelTarget::Index(index),
                (None, None, Some(delay)) => RappelTarget::DelayDays(delay),
                (None, None, None) => {
                    return Err(Error::Other("a rappel reference is required".into()))
                }
            };
            let record =
                engine.mark_rappel_administered(&child, &vaccine, &target, date.unwrap_or(today))?;
            out.emit(&record, || {
                println!(
                    "✓ Recorded rappel of {} for {} on {} ({})",
                    record.vaccine_id, record.child_id, record.date_administered, record.id
                );
            })
        }
        Commands::Revoke { child, record } => {
            let removed = engine.revoke_administration(&child, &record)?;
            out.emit(&removed, || {
                println!(
                    "✓ Removed {} given to {} on {}",
                    removed.vaccine_id, removed.child_id, removed.date_administered
                );
            })
        }
        Commands::Overdue { child, as_of } => {
            let entries = engine.overdue(&child, as_of.unwrap_or(today))?;
            out.emit(&entries, || {
                if entries.is_empty() {
                    println!("Nothing overdue.");
                }
                for entry in &entries {
                    println!(
                        "  {} ({}): due {}, {} days overdue [{}]",
                        entry.name,
                        entry.vaccine_id,
                        entry.due_date,
                        entry.days_overdue,
                        describe_reason(&entry.reason)
                    );
                }
            })
        }
        Commands::Upcoming { child, as_of, horizon } => {
            let horizon = horizon.unwrap_or(config.schedule.upcoming_horizon_days);
            let entries = engine.upcoming(&child, as_of.unwrap_or(today), horizon)?;
            out.emit(&entries, || {
                if entries.is_empty() {
                    println!("Nothing due in the next {} days.", horizon);
                }
                for entry in &entries {
                    println!(
                        "  {} ({}): due {} in {} days [{}, {:?}]",
                        entry.name,
                        entry.vaccine_id,
                        entry.due_date,
                        entry.days_remaining,
                        describe_reason(&entry.reason),
                        entry.requirement
                    );
                }
            })
        }
        Commands::History { child } => {
            let history = engine.administered(&child)?;
            out.emit(&history, || {
                if history.is_empty() {
                    println!("No administrations recorded.");
                }
                for vaccine in &history {
                    let status = if vaccine.fully_administered { "complete" } else { "in progress" };
                    println!("{} ({}) - {}", vaccine.name, vaccine.vaccine_id, status);
                    for dose in &vaccine.doses {
                        println!("  dose {} ({})", dose.date_administered, dose.id);
                    }
                    for rappel in &vaccine.rappels {
                        match rappel.administered_on {
                            Some(on) => println!("  rappel {} given {}", rappel.index, on),
                            None => println!("  rappel {} due {}", rappel.index, rappel.due_date),
                        }
                    }
                }
            })
        }
        Commands::Coverage { vaccine } => {
            let count = engine.count_children_vaccinated(&vaccine)?;
            let report = json!({
                "vaccine_id": vaccine,
                "children_vaccinated": count,
                "children_registered": engine.children().len(),
            });
            out.emit(&report, || {
                println!(
                    "{}: {} of {} children vaccinated",
                    vaccine,
                    count,
                    engine.children().len()
                );
            })
        }
        Commands::OverdueAll { as_of } => {
            let overdue = engine.children_with_overdue(as_of.unwrap_or(today))?;
            out.emit(&overdue, || {
                if overdue.is_empty() {
                    println!("No child has overdue doses.");
                }
                for child in &overdue {
                    println!("{}:", child.child_id);
                    for entry in &child.overdue {
                        println!("  {} - {} days overdue", entry.vaccine_id, entry.days_overdue);
                    }
                }
            })
        }
        Commands::VaccineInfo { vaccine } => cmd_vaccine_info(engine.catalog(), &out, &vaccine),
        Commands::ValidateCatalog { .. } => Ok(()),
    }
}

/// Prints either JSON or the human-readable rendering
struct Output {
    json: bool,
}

impl Output {
    fn emit<T: serde::Serialize>(&self, value: &T, human: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human();
        }
        Ok(())
    }
}

fn describe_reason(reason: &projector::DueReason) -> String {
    match reason {
        projector::DueReason::AgeThreshold => "age".to_string(),
        projector::DueReason::Suite { from_vaccine_id } => format!("after {}", from_vaccine_id),
        projector::DueReason::Rappel { index } => format!("rappel {}", index),
    }
}

fn cmd_vaccine_info(catalog: &Catalog, out: &Output, vaccine_id: &str) -> Result<()> {
    let vaccine = catalog.require_vaccine(vaccine_id)?;
    let prerequisites: Vec<_> = catalog.prerequisites_of(vaccine_id).collect();
    let required_by = catalog.required_by(vaccine_id);
    let suites: Vec<_> = catalog
        .suites_from(vaccine_id)
        .filter(|e| e.kind == SuiteKind::FollowUp)
        .collect();
    let pre_suites = catalog.pre_suites_of(vaccine_id);
    let rappels = catalog.rappels_of(vaccine_id);

    let report = json!({
        "vaccine": vaccine,
        "prerequisites": prerequisites,
        "required_by": required_by,
        "suites": suites,
        "pre_suites": pre_suites,
        "rappels": rappels,
        "max_doses": catalog.max_doses(vaccine_id),
    });
    out.emit(&report, || {
        println!("{} ({}), minimum age {}", vaccine.name, vaccine.id, vaccine.min_age);
        for edge in &prerequisites {
            println!("  requires {} [{:?}]", edge.prerequisite_id, edge.requirement);
        }
        for edge in &required_by {
            println!("  required by {} [{:?}]", edge.vaccine_id, edge.requirement);
        }
        for edge in &suites {
            println!("  followed by {} after {} days", edge.next_vaccine_id, edge.delay_days);
        }
        for edge in &pre_suites {
            println!("  follows {} after {} days", edge.vaccine_id, edge.delay_days);
        }
        for rappel in rappels {
            println!("  rappel {} at {} days: {}", rappel.index(), rappel.delay_days, rappel.description);
        }
    })
}

fn cmd_rappel_status(
    engine: &VaccinationEngine<JsonlLedgerStore>,
    out: &Output,
    child: &str,
    vaccine: &str,
    since: Option<NaiveDate>,
) -> Result<()> {
    let status = engine.check_rappel_status(child, vaccine)?;
    let completion = engine.check_all_rappels_administered(child, vaccine)?;
    let next_index = engine.next_expected_rappel_index(child, vaccine)?;
    let administered_since = match since {
        Some(date) => Some(engine.rappel_administered_since(child, vaccine, date)?),
        None => None,
    };

    let report = json!({
        "vaccine_id": vaccine,
        "is_rappel": status.is_rappel,
        "parent_vaccine_id": status.parent_vaccine_id,
        "next_expected_rappel_index": next_index,
        "administered_doses": completion.administered_doses,
        "total_allowed_doses": completion.total_allowed_doses,
        "all_administered": completion.all_administered,
        "administered_since": administered_since,
    });

    out.emit(&report, || {
        if let Some(parent) = &status.parent_vaccine_id {
            println!("{} is a rappel of {}", vaccine, parent);
        }
        println!(
            "{}: {} of {} doses, next rappel index {}",
            vaccine, completion.administered_doses, completion.total_allowed_doses, next_index
        );
        if let (Some(date), Some(given)) = (since, administered_since) {
            println!("  dose since {}: {}", date, if given { "yes" } else { "no" });
        }
    })
}

fn cmd_validate_catalog(config: &Config, path: Option<PathBuf>, json: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| config.catalog_path());
    let catalog = if path.exists() {
        Catalog::load_from(&path)?
    } else {
        tracing::info!("No catalog at {:?}, validating built-in schedule", path);
        build_default_catalog()?
    };

    let report = json!({
        "valid": true,
        "vaccines": catalog.len(),
        "suites": catalog.suites().len(),
        "warnings": catalog.warnings(),
    });
    Output { json }.emit(&report, || {
        println!("✓ Catalog valid: {} vaccines", catalog.len());
        for warning in catalog.warnings() {
            println!("  warning: {}", warning);
        }
    })
}
