//! Command implementations for techcarectl

use crate::cli::{CleanCommands, Cli, Commands, Every, PlanCommands, RepairCommands, UserCommands};
use crate::client::TechcareClient;
use crate::display;
use crate::errors::CliError;
use crate::session::session_path;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveTime, Weekday};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use techcare_shared::advice;
use techcare_shared::api::{
    ChatMessageRequest, ChatReply, ChatSessionCreated, CleanRequest, CleanSummary,
    CleanupAnalysis, CreateRepairPlanRequest, GuideStatus, GuideSummary, HealthResponse,
    MaintenanceRun, Preferences, RegisterRequest, StartGuideRequest, StepUpdate, Theme, UpdateUserRequest,
    UserView,
};
use techcare_shared::guide::GuideKind;
use techcare_shared::repair::RepairPlan;
use techcare_shared::report::{DiagnosticReport, DiagnosticSummary};
use techcare_shared::schedule::{CleaningKind, Frequency, MaintenancePlan, PlanDraft};
use techcare_shared::Role;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const SERVER_ENV: &str = "TECHCARE_SERVER";
pub const PASSWORD_ENV: &str = "TECHCARE_PASSWORD";

/// Run one parsed command
pub async fn run(cli: Cli) -> Result<()> {
    let server = cli
        .server
        .or_else(|| std::env::var(SERVER_ENV).ok().filter(|s| !s.is_empty()));
    let mut client = TechcareClient::new(server, session_path())?;

    match cli.command {
        Commands::Status { json } => status(&client, json).await,
        Commands::Login { username, password } => login(&mut client, &username, password).await,
        Commands::Logout => {
            if client.logout()? {
                println!("Logged out.");
            } else {
                println!("No saved session.");
            }
            Ok(())
        }
        Commands::Register {
            username,
            email,
            password,
            role,
        } => register(&mut client, username, email, password, role).await,
        Commands::Diagnose { json } => diagnose(&mut client, json).await,
        Commands::History { limit } => history(&mut client, limit).await,
        Commands::Show { id, json, markdown } => show(&mut client, &id, json, markdown).await,
        Commands::Clean { action } => clean(&mut client, action).await,
        Commands::Repair { action } => repair(&mut client, action).await,
        Commands::Plans { action } => plans(&mut client, action).await,
        Commands::Chat => chat(&mut client).await,
        Commands::Guides => {
            let guides: Vec<GuideSummary> = client.get_public("/v1/guides").await?;
            display::print_guides(&guides);
            Ok(())
        }
        Commands::Theme { theme, font_scale } => set_theme(&mut client, &theme, font_scale).await,
        Commands::Users { action } => users(&mut client, action).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// `--password`, then `$TECHCARE_PASSWORD`, then a prompt
fn resolve_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("reading password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("a password is required");
    }
    Ok(password)
}

async fn status(client: &TechcareClient, json: bool) -> Result<()> {
    let health: HealthResponse = client.get_public("/v1/health").await?;
    if json {
        return print_json(&health);
    }
    display::print_health(&health);
    match client.session() {
        Some(s) => display::print_kv("logged in", &format!("{} ({})", s.username, s.role)),
        None => display::print_kv("logged in", "no"),
    }
    Ok(())
}

async fn login(client: &mut TechcareClient, username: &str, password: Option<String>) -> Result<()> {
    let password = resolve_password(password)?;
    let tokens = client.login(username, &password).await?;
    println!(
        "Logged in as {} ({}). Dashboard: {}",
        tokens.user.username.bold(),
        tokens.role,
        tokens.dashboard_path
    );
    Ok(())
}

async fn register(
    client: &mut TechcareClient,
    username: String,
    email: String,
    password: Option<String>,
    role: Option<String>,
) -> Result<()> {
    let role = match role {
        Some(r) => Some(Role::parse(&r).ok_or_else(|| anyhow!("unknown role: {}", r))?),
        None => None,
    };
    let req = RegisterRequest {
        username,
        email,
        password: resolve_password(password)?,
        role,
    };
    let user: UserView = client.post_optional_auth("/v1/auth/register", &req).await?;
    println!("Created {} with role {}", user.username.bold(), user.role);
    Ok(())
}

async fn diagnose(client: &mut TechcareClient, json: bool) -> Result<()> {
    let pb = spinner("Running diagnostic...");
    let result: std::result::Result<DiagnosticReport, CliError> =
        client.post("/v1/diagnostics/run", &json!({})).await;
    pb.finish_and_clear();
    let report = result.context("diagnostic failed")?;
    if json {
        return print_json(&report);
    }
    display::print_report(&report);
    Ok(())
}

async fn history(client: &mut TechcareClient, limit: Option<usize>) -> Result<()> {
    let path = match limit {
        Some(n) => format!("/v1/diagnostics?limit={}", n),
        None => "/v1/diagnostics".to_string(),
    };
    let items: Vec<DiagnosticSummary> = client.get(&path).await?;
    display::print_history(&items);
    Ok(())
}

async fn show(client: &mut TechcareClient, id: &str, json: bool, markdown: bool) -> Result<()> {
    let path = if id == "latest" {
        "/v1/diagnostics/latest".to_string()
    } else {
        format!("/v1/diagnostics/{}", id)
    };
    let report: DiagnosticReport = client.get(&path).await?;
    if json {
        return print_json(&report);
    }
    if markdown {
        print!("{}", advice::format_markdown(&report.recommendations));
        return Ok(());
    }
    display::print_report(&report);
    Ok(())
}

pub fn parse_kinds(kinds: &[String]) -> Result<Vec<CleaningKind>> {
    kinds
        .iter()
        .map(|k| CleaningKind::parse(k).ok_or_else(|| anyhow!("unknown cleaning kind: {}", k)))
        .collect()
}

fn hours_to_secs(hours: u64) -> u64 {
    hours.saturating_mul(3600)
}

async fn clean(client: &mut TechcareClient, action: CleanCommands) -> Result<()> {
    match action {
        CleanCommands::Analyze { json } => {
            let pb = spinner("Scanning...");
            let result: std::result::Result<CleanupAnalysis, CliError> =
                client.get("/v1/cleaner/analyze").await;
            pb.finish_and_clear();
            let analysis = result?;
            if json {
                return print_json(&analysis);
            }
            display::print_analysis(&analysis);
        }
        CleanCommands::Run {
            kinds,
            dry_run,
            older_than_hours,
        } => {
            let req = CleanRequest {
                kinds: parse_kinds(&kinds)?,
                dry_run,
                older_than_secs: older_than_hours.map(hours_to_secs),
            };
            let pb = spinner("Cleaning...");
            let result: std::result::Result<CleanSummary, CliError> =
                client.post("/v1/cleaner/clean", &req).await;
            pb.finish_and_clear();
            display::print_clean_summary(&result?);
        }
    }
    Ok(())
}

async fn repair(client: &mut TechcareClient, action: RepairCommands) -> Result<()> {
    match action {
        RepairCommands::Plan { diagnostic_id } => {
            let plan: RepairPlan = client
                .post("/v1/repair/plans", &CreateRepairPlanRequest { diagnostic_id })
                .await?;
            display::print_repair_plan(&plan);
        }
        RepairCommands::List => {
            let plans: Vec<RepairPlan> = client.get("/v1/repair/plans").await?;
            display::print_repair_plans(&plans);
        }
        RepairCommands::Show { plan } => {
            let plan: RepairPlan = client.get(&format!("/v1/repair/plans/{}", plan)).await?;
            display::print_repair_plan(&plan);
        }
        RepairCommands::Done { plan, step } => {
            let path = format!("/v1/repair/plans/{}/steps/{}/complete", plan, step);
            let update: StepUpdate = client.post(&path, &json!({})).await?;
            print_step_update(&update);
        }
        RepairCommands::Skip { plan, step } => {
            let path = format!("/v1/repair/plans/{}/steps/{}/skip", plan, step);
            let update: StepUpdate = client.post(&path, &json!({})).await?;
            print_step_update(&update);
        }
    }
    Ok(())
}

fn print_step_update(update: &StepUpdate) {
    println!(
        "{} {} ({}/{} done, {}%)",
        update.step.id.dimmed(),
        update.step.title,
        update.progress.completed,
        update.progress.total,
        update.progress.percent
    );
    if update.finished {
        println!("{}", "All steps handled.".bright_green());
    }
}

/// Build a plan draft from `plans add` arguments
pub fn plan_draft(
    name: String,
    kinds: &[String],
    every: Every,
    weekday: Option<String>,
    day: Option<u32>,
    at: &str,
    disabled: bool,
) -> Result<PlanDraft> {
    let frequency = match every {
        Every::Daily => Frequency::Daily,
        Every::Weekly => {
            let weekday = weekday.ok_or_else(|| anyhow!("weekly plans need --weekday"))?;
            let weekday: Weekday = weekday
                .parse()
                .map_err(|_| anyhow!("unknown weekday: {}", weekday))?;
            Frequency::Weekly { weekday }
        }
        Every::Monthly => Frequency::Monthly {
            day: day.ok_or_else(|| anyhow!("monthly plans need --day"))?,
        },
    };
    let time = NaiveTime::parse_from_str(at, "%H:%M")
        .with_context(|| format!("invalid time {}, expected HH:MM", at))?;
    Ok(PlanDraft {
        name,
        cleaning: parse_kinds(kinds)?,
        frequency,
        time,
        enabled: !disabled,
    })
}

async fn plans(client: &mut TechcareClient, action: PlanCommands) -> Result<()> {
    match action {
        PlanCommands::List => {
            let plans: Vec<MaintenancePlan> = client.get("/v1/maintenance/plans").await?;
            display::print_maintenance_plans(&plans);
        }
        PlanCommands::Add {
            name,
            kinds,
            every,
            weekday,
            day,
            at,
            disabled,
        } => {
            let draft = plan_draft(name, &kinds, every, weekday, day, &at, disabled)?;
            let plan: MaintenancePlan = client.post("/v1/maintenance/plans", &draft).await?;
            println!("Created plan {}", plan.id);
            display::print_maintenance_plans(&[plan]);
        }
        PlanCommands::Rm { id } => {
            client
                .delete(&format!("/v1/maintenance/plans/{}", id))
                .await?;
            println!("Deleted plan {}", id);
        }
        PlanCommands::Runs { limit } => {
            let path = match limit {
                Some(limit) => format!("/v1/maintenance/runs?limit={}", limit),
                None => "/v1/maintenance/runs".to_string(),
            };
            let runs: Vec<MaintenanceRun> = client.get(&path).await?;
            display::print_maintenance_runs(&runs);
        }
    }
    Ok(())
}

async fn set_theme(client: &mut TechcareClient, theme: &str, font_scale: Option<f32>) -> Result<()> {
    let theme = Theme::parse(theme)
        .ok_or_else(|| anyhow!("unknown theme: {} (light, dark, high-contrast)", theme))?;
    let mut prefs: Preferences = client.get("/v1/me/preferences").await?;
    prefs.theme = theme;
    if let Some(scale) = font_scale {
        prefs.font_scale = scale;
    }
    let saved: Preferences = client.put("/v1/me/preferences", &prefs).await?;
    println!("Theme {:?}, font scale {:.2}", saved.theme, saved.font_scale);
    Ok(())
}

async fn users(client: &mut TechcareClient, action: UserCommands) -> Result<()> {
    let (id, update) = match action {
        UserCommands::List => {
            let users: Vec<UserView> = client.get("/v1/admin/users").await?;
            display::print_users(&users);
            return Ok(());
        }
        UserCommands::SetRole { id, role } => {
            let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?;
            (
                id,
                UpdateUserRequest {
                    role: Some(role),
                    active: None,
                },
            )
        }
        UserCommands::Disable { id } => (
            id,
            UpdateUserRequest {
                role: None,
                active: Some(false),
            },
        ),
        UserCommands::Enable { id } => (
            id,
            UpdateUserRequest {
                role: None,
                active: Some(true),
            },
        ),
    };
    let user: UserView = client
        .put(&format!("/v1/admin/users/{}", id), &update)
        .await?;
    display::print_users(&[user]);
    Ok(())
}

/// One line typed into the chat REPL
#[derive(Debug, PartialEq)]
pub enum ChatInput {
    Message(String),
    Guide(GuideKind),
    Next,
    Previous,
    Done,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_chat_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Message(line.to_string());
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));
    match name {
        "quit" | "exit" | "q" => ChatInput::Quit,
        "next" => ChatInput::Next,
        "prev" | "previous" | "back" => ChatInput::Previous,
        "done" => ChatInput::Done,
        "help" => ChatInput::Help,
        "guide" => match GuideKind::parse(arg) {
            Some(kind) => ChatInput::Guide(kind),
            None => ChatInput::Unknown(line.to_string()),
        },
        _ => ChatInput::Unknown(line.to_string()),
    }
}

fn print_chat_help() {
    let kinds: Vec<&str> = GuideKind::ALL.iter().map(|k| k.as_str()).collect();
    println!("{}", "Commands:".bold());
    println!("  /guide <kind>   start a guide ({})", kinds.join(", "));
    println!("  /next /prev     move between guide steps");
    println!("  /done           mark the current step done");
    println!("  /quit           leave");
}

async fn chat(client: &mut TechcareClient) -> Result<()> {
    let session: ChatSessionCreated = client.post("/v1/chat/sessions", &json!({})).await?;
    let base = format!("/v1/chat/sessions/{}", session.id);
    println!("{} {}", "assistant>".bright_cyan(), session.greeting);
    println!("{}", "Type /help for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "you>".bold());
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let result = match parse_chat_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => {
                print_chat_help();
                continue;
            }
            ChatInput::Unknown(input) => {
                println!("Unknown command: {} (try /help)", input);
                continue;
            }
            ChatInput::Message(text) => client
                .post::<ChatReply, _>(&format!("{}/messages", base), &ChatMessageRequest { text })
                .await
                .map(|r| println!("{} {}", "assistant>".bright_cyan(), r.reply)),
            ChatInput::Guide(kind) => client
                .post::<GuideStatus, _>(&format!("{}/guide", base), &StartGuideRequest { kind })
                .await
                .map(|s| display::print_guide_status(&s)),
            ChatInput::Next => guide_step(client, &base, "next").await,
            ChatInput::Previous => guide_step(client, &base, "previous").await,
            ChatInput::Done => guide_step(client, &base, "complete").await,
        };

        match result {
            Ok(()) => {}
            Err(e @ CliError::Unavailable { .. }) | Err(e @ CliError::Unauthorized { .. }) => {
                return Err(e.into())
            }
            Err(e) => println!("{}", e.to_string().yellow()),
        }
    }
    let _ = client.delete(&base).await;
    Ok(())
}

async fn guide_step(
    client: &mut TechcareClient,
    base: &str,
    action: &str,
) -> std::result::Result<(), CliError> {
    let status: GuideStatus = client
        .post(&format!("{}/guide/{}", base, action), &json!({}))
        .await?;
    display::print_guide_status(&status);
    Ok(())
}
