mod cli;
mod output;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command};
use mulch_core::{
    ExpertiseRecord, Mulch, MulchError, Outcome, RecordAction, RecordFilter, Result,
};
use output::{CommandEvent, OutputHandler};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

/// `--root`, else `$MULCH_ROOT`, else the current directory.
fn resolve_root(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(root);
    }
    match std::env::var_os("MULCH_ROOT") {
        Some(root) if !root.is_empty() => Ok(PathBuf::from(root)),
        _ => Ok(std::env::current_dir()?),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// Records piped to `record --stdin`: a JSON array or one object per line.
fn read_stdin_records() -> Result<Vec<ExpertiseRecord>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let trimmed = input.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| MulchError::InvalidInput(format!("stdin: {}", e)));
    }
    trimmed
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| MulchError::InvalidInput(format!("stdin line {}: {}", n + 1, e)))
        })
        .collect()
}

/// Every requested domain with its records, in config order.
fn collect_domains(
    mulch: &Mulch,
    domain: Option<&str>,
    filter: &RecordFilter,
) -> Result<Vec<(String, Vec<ExpertiseRecord>)>> {
    let names: Vec<String> = match domain {
        Some(d) => vec![d.to_string()],
        None => mulch.domains().to_vec(),
    };
    names
        .into_iter()
        .map(|name| {
            let records = mulch.query(&name, filter)?;
            Ok((name, records))
        })
        .collect()
}

fn run(cli: Cli, output: &OutputHandler) -> Result<ExitCode> {
    let root = resolve_root(cli.root)?;

    let load = || Mulch::load(&root);

    match cli.command {
        Command::Init => {
            let (_, created) = Mulch::init(&root)?;
            output.emit_event(CommandEvent::Initialized { created });
        }
        Command::Add { domain } => {
            let added = load()?.add_domain(&domain)?;
            output.emit_event(CommandEvent::DomainAdded {
                domain: &domain,
                added,
            });
        }
        Command::Record {
            domain,
            fields,
            stdin,
            force,
        } => {
            let mulch = load()?;
            let results = if stdin {
                mulch.record_batch(&domain, read_stdin_records()?, force)?
            } else {
                vec![mulch.record(&domain, fields.to_record()?, force)?]
            };
            if results.iter().any(|r| r.action == RecordAction::Skipped) {
                output.diagnostic(
                    "identical record already present; use --force to store it anyway",
                );
            }
            output.emit_event(CommandEvent::Recorded {
                domain: &domain,
                results: &results,
            });
        }
        Command::Edit { domain, id, fields } => {
            let record = load()?.edit(&domain, &id, &fields.to_patch())?;
            output.emit_event(CommandEvent::Edited {
                domain: &domain,
                record: &record,
            });
        }
        Command::Delete { domain, id } => {
            let record = load()?.delete(&domain, &id)?;
            output.emit_event(CommandEvent::Deleted {
                domain: &domain,
                record: &record,
            });
        }
        Command::Outcome {
            domain,
            id,
            status,
            agent,
            notes,
            duration,
            test_results,
        } => {
            let mut outcome = Outcome::new(status);
            outcome.agent = agent;
            outcome.notes = notes;
            outcome.duration = duration;
            outcome.test_results = test_results;
            let result = load()?.append_outcome(&domain, &id, outcome)?;
            output.emit_event(CommandEvent::OutcomeAppended {
                domain: &domain,
                result: &result,
            });
        }
        Command::Query { domain, filter } => {
            let filter = filter.to_filter();
            let records: Vec<(String, ExpertiseRecord)> =
                collect_domains(&load()?, domain.as_deref(), &filter)?
                    .into_iter()
                    .flat_map(|(d, records)| records.into_iter().map(move |r| (d.clone(), r)))
                    .collect();
            output.emit_records(&records);
        }
        Command::Search {
            query,
            domains,
            record_type,
            tag,
        } => {
            let filter = RecordFilter {
                record_type,
                tag,
                ..RecordFilter::default()
            };
            let hits = load()?.search(&query, &domains, &filter)?;
            output.emit_search(&query, &hits);
        }
        Command::Status => {
            output.emit_status(&load()?.status(Utc::now())?);
        }
        Command::Validate => {
            if !output.emit_validation(&load()?.validate()?) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Prune { dry_run } => {
            let reports = load()?.prune(Utc::now(), dry_run)?;
            output.emit_event(CommandEvent::Pruned {
                reports: &reports,
                dry_run,
            });
        }
        Command::Compact {
            domain,
            ids,
            analyze,
            summary,
        } => {
            if analyze {
                let groups = load()?.compact_candidates(&domain, Utc::now())?;
                output.emit_candidates(&domain, &groups);
            } else {
                let result = load()?.compact(&domain, &ids, summary.to_record()?)?;
                output.emit_event(CommandEvent::Compacted {
                    domain: &domain,
                    result: &result,
                });
            }
        }
        Command::Ready { since } => {
            output.emit_records(&load()?.ready(since)?);
        }
        Command::Prime { domain } => {
            let domains =
                collect_domains(&load()?, domain.as_deref(), &RecordFilter::default())?;
            output.emit_prime(&domains);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = OutputHandler::new(cli.json, cli.quiet);

    match run(cli, &output) {
        Ok(code) => code,
        Err(e) => {
            log::debug!("command failed: {:?}", e);
            output.emit_error(&e);
            ExitCode::FAILURE
        }
    }
}
