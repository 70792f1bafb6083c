//! Application state for the pontuae CLI.
//!
//! `App` owns the configuration, the session and the API client. Its lifecycle
//! is explicit: `init` opens the credential store, `restore` settles the
//! session, `run` executes one command and `teardown` saves the config.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use pontuae_core::dashboard::{MonthlyHistory, WeekBoard};
use pontuae_core::models::{
    validate_registration, IdentityUpdate, PasswordChange, ProfileUpdate, Task, TaskDraft,
    TaskFilter,
};
use pontuae_core::{ApiClient, Config, CredentialStore, Session, SessionEvent, SessionState};

use crate::commands::Command;
use crate::utils::{format_date, format_score, progress_bar, truncate_string};

/// Column width for task titles in listings.
const TITLE_WIDTH: usize = 28;

pub struct App {
    config: Config,
    session: Arc<Session>,
    api: ApiClient,
    events: broadcast::Receiver<SessionEvent>,
    today: NaiveDate,
}

impl App {
    /// With `ephemeral`, credentials live only in memory for this run.
    pub fn init(config: Config, ephemeral: bool) -> Result<Self> {
        let store = if ephemeral {
            Arc::new(CredentialStore::in_memory())
        } else {
            Arc::new(config.credential_store()?)
        };
        let base_url = config.base_url();
        debug!(base_url = %base_url, "Initializing session");

        let session = Arc::new(Session::new(store, base_url).context("Failed to build HTTP client")?);
        let api = ApiClient::new(Arc::clone(&session));
        let events = session.events();

        Ok(Self {
            config,
            session,
            api,
            events,
            today: Local::now().date_naive(),
        })
    }

    pub async fn restore(&mut self) -> SessionState {
        let state = self.session.restore(&self.api).await;
        info!(?state, "Session restored");
        state
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        if command.needs_session() {
            self.require_session()?;
        }

        let result = match command {
            Command::Login { email } => self.login(email).await,
            Command::Register => self.register().await,
            Command::Logout => {
                self.session.logout();
                println!("Logged out.");
                Ok(())
            }
            Command::Whoami => {
                self.whoami();
                Ok(())
            }
            Command::Tasks { week } => self.list_tasks(week).await,
            Command::Add {
                title,
                goal,
                category,
                description,
            } => self.add_task(title, goal, category, description).await,
            Command::Edit {
                id,
                title,
                goal,
                description,
            } => self.edit_task(id, title, goal, description).await,
            Command::Delete { id } => self.delete_task(id).await,
            Command::Inc { id } => self.step_progress(id, true).await,
            Command::Dec { id } => self.step_progress(id, false).await,
            Command::History { month, year } => self.history(month, year).await,
            Command::Profile { name, email } => self.update_profile(name, email).await,
            Command::Passwd => self.change_password().await,
        };

        self.drain_events();
        result
    }

    /// Fail unless restore left an authenticated session.
    ///
    /// Stored credentials without a session mean the server could not be
    /// reached during restore; they are kept, so logging in is not the fix.
    fn require_session(&self) -> Result<()> {
        if self.session.state() == SessionState::Authenticated {
            return Ok(());
        }
        if self.session.credentials().is_some() {
            bail!(
                "Could not reach the server at {}. Your session was kept; try again later.",
                self.session.base_url()
            );
        }
        bail!("Not logged in. Run `pontuae login` first.");
    }

    pub fn teardown(self) -> Result<()> {
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
        debug!("App shut down");
        Ok(())
    }

    /// Report a session that ended underneath a command.
    fn drain_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::Expired) => {
                    eprintln!("Your session has expired. Run `pontuae login` to sign in again.");
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    async fn login(&mut self, email: Option<String>) -> Result<()> {
        let email = match email {
            Some(email) => email,
            None => Self::prompt_line("Email", self.config.last_email.as_deref())?,
        };
        let password = Self::prompt_password("Password: ")?;

        println!("\nAuthenticating...");
        if let Err(e) = self.session.login(&email, &password).await {
            bail!("{}", e.user_message());
        }

        self.config.last_email = Some(email);
        self.greet();
        Ok(())
    }

    async fn register(&mut self) -> Result<()> {
        let name = Self::prompt_line("Name", None)?;
        let email = Self::prompt_line("Email", None)?;
        let password = Self::prompt_password("Password: ")?;
        let confirm = Self::prompt_password("Confirm password: ")?;
        validate_registration(&name, &email, &password, &confirm)?;

        if let Err(e) = self.session.register(name.trim(), email.trim(), &password).await {
            bail!("{}", e.user_message());
        }

        self.config.last_email = Some(email.trim().to_string());
        println!("Account created.");
        self.greet();
        Ok(())
    }

    fn whoami(&self) {
        match (self.session.state(), self.session.identity()) {
            (SessionState::Authenticated, Some(identity)) => {
                if identity.email.is_empty() {
                    println!("{}", identity.name);
                } else {
                    println!("{} <{}>", identity.name, identity.email);
                }
            }
            _ => println!("Not logged in."),
        }
    }

    fn greet(&self) {
        if let Some(identity) = self.session.identity() {
            println!("Welcome, {}!", identity.name);
        }
    }

    fn prompt_line(label: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(default) => print!("{} [{}]: ", label, default),
            None => print!("{}: ", label),
        }
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        let line = line.trim();
        Ok(match (line.is_empty(), default) {
            (true, Some(default)) => default.to_string(),
            _ => line.to_string(),
        })
    }

    fn prompt_password(prompt: &str) -> Result<String> {
        let password = rpassword::prompt_password(prompt)?;
        Ok(password)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    async fn list_tasks(&self, week: Option<u32>) -> Result<()> {
        let mut board = WeekBoard::for_date(self.today);
        if let Some(week) = week {
            board.select_week(week);
        }
        let filter = board.filter();
        board.load(&self.api).await.map_err(|e| anyhow::anyhow!(e.user_message()))?;

        println!(
            "Week {} of {:02}/{}",
            filter.week_of_month, filter.month, filter.year
        );
        if board.tasks().is_empty() {
            println!("No tasks yet. Add one with `pontuae add <title> <goal>`.");
            return Ok(());
        }
        for task in board.tasks() {
            println!("{}", Self::task_line(task));
        }

        let stats = board.stats();
        println!();
        println!("Weekly points:  {}", stats.points);
        println!("Weekly average: {}", format_score(stats.average));
        println!("Active tasks:   {}", board.tasks().len());
        Ok(())
    }

    async fn add_task(
        &self,
        title: String,
        goal: i32,
        category: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let mut draft = TaskDraft::new(title.trim(), goal, self.today);
        if let Some(category) = category {
            draft = draft.with_category(category);
        }
        if let Some(description) = description {
            draft = draft.with_description(description);
        }
        let created = self
            .api
            .create_task(&draft)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("Task created (id {}).", created.id);
        Ok(())
    }

    async fn edit_task(
        &self,
        id: i64,
        title: String,
        goal: i32,
        description: Option<String>,
    ) -> Result<()> {
        let existing = self
            .api
            .get_task(id)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        let mut draft = TaskDraft::from_task(&existing, self.today);
        draft.title = title.trim().to_string();
        draft.weekly_goal = goal;
        if let Some(description) = description {
            draft = draft.with_description(description);
        }

        self.api
            .update_task(id, &draft)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("Task updated.");
        Ok(())
    }

    async fn delete_task(&self, id: i64) -> Result<()> {
        self.api
            .delete_task(id)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("Task deleted.");
        Ok(())
    }

    async fn step_progress(&self, id: i64, increment: bool) -> Result<()> {
        let mut task = self
            .api
            .get_task(id)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        task.id = Some(id);

        let filter = match task.week_of_month {
            Some(week) => TaskFilter::new(week, self.today.month(), self.today.year()),
            None => TaskFilter::for_date(self.today),
        };
        let mut board = WeekBoard::with_tasks(filter, vec![task]);
        let result = if increment {
            board.increment(&self.api, id).await
        } else {
            board.decrement(&self.api, id).await
        };
        let task = result.map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("{}", Self::task_line(task));
        Ok(())
    }

    async fn history(&self, month: Option<u32>, year: Option<i32>) -> Result<()> {
        let month = month.unwrap_or_else(|| self.today.month());
        let year = year.unwrap_or_else(|| self.today.year());
        let history = MonthlyHistory::load(&self.api, month, year).await;
        let summary = history.summary();

        println!("History for {:02}/{}", month, year);
        println!("Monthly points:  {}", summary.points);
        println!("Monthly average: {}", format_score(summary.average));
        println!();
        for week in &history.weeks {
            println!(
                "  Week {}: {:>2} tasks  {:>4} pts  avg {}",
                week.week,
                week.task_count,
                week.stats.points,
                format_score(week.stats.average)
            );
        }
        Ok(())
    }

    fn task_line(task: &Task) -> String {
        let id = task.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        let done = if task.is_completed() { "done" } else { "" };
        format!(
            "{:>4}  {:<width$}  {}  {}  {}  {}",
            id,
            truncate_string(task.title_display(), TITLE_WIDTH),
            progress_bar(task.progress, task.weekly_goal),
            format_score(task.score()),
            format_date(task.start_date_parsed()),
            done,
            width = TITLE_WIDTH
        )
    }

    // =========================================================================
    // Profile
    // =========================================================================

    async fn update_profile(&mut self, name: String, email: String) -> Result<()> {
        let update = ProfileUpdate::new(&name, &email);
        self.api
            .update_profile(&update)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;

        self.session.update_identity(IdentityUpdate {
            name: Some(update.name.clone()),
            email: Some(update.email.clone()),
        });
        self.config.last_email = Some(update.email);
        println!("Profile updated.");
        Ok(())
    }

    async fn change_password(&self) -> Result<()> {
        let change = PasswordChange {
            password: Self::prompt_password("Current password: ")?,
            new_password: Self::prompt_password("New password: ")?,
            confirm: Self::prompt_password("Confirm new password: ")?,
        };
        self.api
            .change_password(&change)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
        println!("Password changed.");
        Ok(())
    }
}
