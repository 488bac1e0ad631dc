//! An interactive CLI for labeling records in a shared dataset.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password};
use labeler_common::batch::BatchSelector;
use labeler_common::config::LabelerConfig;
use labeler_common::db_util::{self, PgStore};
use labeler_common::error::StoreError;
use labeler_common::session::{Command, Outcome, Session};
use labeler_common::store::LabelStore;
use labeler_common::{CLIENT_VERSION, LEADERBOARD_SIZE, Label};
use log::{debug, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The name recorded alongside every label you upload
    #[arg(short, long, env = "LABELER_USERNAME")]
    username: Option<String>,

    /// Postgres connection URL, prompted for if not set
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Show the raw record under each prompt
    #[arg(short, long, env = "LABELER_VERBOSE")]
    verbose: bool,

    #[command(flatten)]
    config: LabelerConfig,
}

fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Ask for a username and database URL until a connection succeeds.
/// Values given on the command line are tried first.
fn login(cli: &Cli, theme: &ColorfulTheme) -> Result<(PgStore, String)> {
    let mut username = cli
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let mut database_url = cli.database_url.clone();

    loop {
        let contributor = match username.take() {
            Some(name) => name,
            None => Input::<String>::with_theme(theme)
                .with_prompt("Username")
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.trim().is_empty() {
                        Err("the username cannot be empty")
                    } else {
                        Ok(())
                    }
                })
                .interact_text()?
                .trim()
                .to_string(),
        };
        let url = match database_url.take() {
            Some(url) => url,
            None => Password::with_theme(theme)
                .with_prompt("Database URL")
                .interact()?,
        };

        match PgStore::connect(&url, &cli.config) {
            Ok(store) => return Ok((store, contributor)),
            Err(err) if err.is_login_error() => {
                println!("{} {err}", "Login failed:".red().bold());
                if matches!(err, StoreError::NotFound(_)) {
                    println!(
                        "Check that {} and {} exist and are shared with you.",
                        cli.config.qualified_dataset_table(),
                        cli.config.qualified_label_table()
                    );
                }
                // keep the username, only the URL is asked for again
                username = Some(contributor);
            }
            Err(err) => return Err(err).context("Could not open the dataset"),
        }
    }
}

fn show_instructions(config: &LabelerConfig, theme: &ColorfulTheme) -> Result<()> {
    clear_screen();
    println!("{}", "Labeling instructions".bold().underline());
    println!();
    println!("You will be shown one record at a time. Label the sentiment of each one:");
    println!("  {}  positive", "d".green().bold());
    println!("  {}  negative", "a".red().bold());
    println!("  {}  neutral", "x".yellow().bold());
    println!("Move between records with {} (previous) and {} (next).", "w".bold(), "s".bold());
    println!(
        "Press {} to upload your labels and fetch a new batch, {} to quit.",
        "u".bold(),
        "q".bold()
    );
    println!("Labels are only saved once uploaded.");
    println!();
    println!(
        "The first {} records are shown to every contributor so that agreement can be measured.",
        config.num_overlap
    );
    println!();
    Input::<String>::with_theme(theme)
        .with_prompt("Press enter to start")
        .allow_empty(true)
        .interact_text()?;
    Ok(())
}

fn show_status<S: LabelStore + ?Sized>(store: &mut S, config: &LabelerConfig) -> Result<()> {
    let status = store.status().context("Could not fetch labeling status")?;
    let leaderboard = store
        .leaderboard(LEADERBOARD_SIZE)
        .context("Could not fetch the leaderboard")?;

    println!("{}", status.to_string().bold());
    println!(
        "The first {} records overlap with other contributors.",
        config.num_overlap
    );
    if !leaderboard.is_empty() {
        println!();
        println!("{}", "Top contributors".underline());
        for (rank, entry) in leaderboard.iter().enumerate() {
            println!("  {}. {} ({})", rank + 1, entry.contributor, entry.num_labels);
        }
    }
    println!();
    Ok(())
}

fn styled_label(label: Label) -> String {
    let text = label.to_string();
    match label {
        Label::Positive => text.green().bold().to_string(),
        Label::Negative => text.red().bold().to_string(),
        Label::Neutral => text.yellow().bold().to_string(),
        Label::Unset => text.dimmed().to_string(),
    }
}

fn render(session: &Session, verbose: bool) {
    clear_screen();
    println!(
        "{} | labeled this batch: {}",
        session.contributor().bold(),
        session.newly_labeled()
    );
    println!();

    let Some(record) = session.current() else {
        println!("{}", "Nothing left to label right now.".yellow());
        println!("Press u to check for new records or q to quit.");
        return;
    };

    let overlap = if record.in_overlap { " (overlap)" } else { "" };
    println!(
        "Record {}/{}{overlap}",
        session.position() + 1,
        session.batch().len()
    );
    println!("{}", "-".repeat(40).dimmed());
    println!("{}", record.body);
    println!("{}", "-".repeat(40).dimmed());
    println!("Label: {}", styled_label(session.current_label()));
    if verbose {
        match serde_json::to_string_pretty(record) {
            Ok(json) => println!("{}", json.dimmed()),
            Err(e) => warn!("Could not serialize record: {e}"),
        }
    }
    println!();
    println!("w: previous  s: next  d: positive  a: negative  x: neutral  u: upload  q: quit");
}

fn upload<S: LabelStore + ?Sized>(session: &mut Session, store: &mut S, config: &LabelerConfig) {
    let pending = session.pending_entries().len();
    println!("Uploading {pending} labeled samples...");
    match session.upload(store) {
        Ok(report) => {
            debug!("Upload finished: {report:?}");
            println!(
                "Uploaded {} labels, {} records now have a consensus label.",
                report.uploaded, report.records_with_consensus
            );
            if let Err(e) = show_status(store, config) {
                warn!("{e:#}");
            }
        }
        Err(e) => {
            println!("{} {e}", "Upload failed:".red().bold());
            println!("Your labels are kept, press u to try again.");
        }
    }
}

fn run_session<S: LabelStore + ?Sized>(
    session: &mut Session,
    store: &mut S,
    cli: &Cli,
    theme: &ColorfulTheme,
) -> Result<()> {
    let mut message: Option<String> = None;
    loop {
        render(session, cli.verbose);
        if let Some(msg) = message.take() {
            println!("{msg}");
        }

        let input: String = Input::with_theme(theme)
            .with_prompt("Command")
            .allow_empty(true)
            .interact_text()?;
        let Some(command) = Command::parse(&input) else {
            message = Some(format!("{} {input:?}", "Invalid input:".red()));
            continue;
        };

        match session.apply(command) {
            Ok(Outcome::Continue) => {}
            Ok(Outcome::UploadRequested) => {
                upload(session, store, &cli.config);
                Input::<String>::with_theme(theme)
                    .with_prompt("Press enter to continue")
                    .allow_empty(true)
                    .interact_text()?;
            }
            Ok(Outcome::QuitRequested) => {
                let discarded = session.pending_entries().len();
                let prompt = if discarded == 0 {
                    "Really quit?".to_string()
                } else {
                    format!("Really quit? {discarded} labels have not been uploaded")
                };
                if Confirm::with_theme(theme)
                    .with_prompt(prompt)
                    .default(false)
                    .interact()?
                {
                    return Ok(());
                }
            }
            Err(e) => message = Some(format!("{} {e}", "Cannot do that:".red())),
        }
    }
}

fn main() -> Result<()> {
    // Pick up DATABASE_URL and friends from .env before clap reads the environment
    db_util::load_env();
    let cli = Cli::parse();
    env_logger::init();

    cli.config.validate().context("Invalid configuration")?;
    debug!("Labeler client v{CLIENT_VERSION} with {:?}", cli.config);

    let theme = ColorfulTheme::default();
    let (mut store, contributor) = login(&cli, &theme)?;
    show_instructions(&cli.config, &theme)?;

    clear_screen();
    show_status(&mut store, &cli.config)?;
    let selector = BatchSelector::from_config(&cli.config);
    let mut session = Session::start(&mut store, selector, &contributor)
        .context("Could not draw a batch")?;

    run_session(&mut session, &mut store, &cli, &theme)?;
    println!("Goodbye, {contributor}!");
    Ok(())
}
