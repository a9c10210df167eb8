//! Command dispatch: authenticate, load, act, sign out.

use anyhow::{Context, Result, anyhow, bail};
use time::{OffsetDateTime, UtcOffset};
use todo_sync_app::{AppConfig, StoreError, TaskStore};
use todo_sync_core::{MonthKey, Task};
use todo_sync_remote::{AuthClient, Backend, Credentials, RestStore, SignUpOutcome};
use tracing::{debug, warn};

use crate::{Command, ListFormat, view};

const SIGN_IN_HINT: &str = "sign-in required: pass --email/--password or --access-token";

/// Credentials gathered from flags and the environment.
#[derive(Default)]
pub struct Login {
    pub email: Option<String>,
    pub password: Option<String>,
    pub access_token: Option<String>,
}

impl Login {
    fn credentials(&self) -> Option<Credentials> {
        match (&self.email, &self.password) {
            (Some(email), Some(password)) => Some(Credentials::new(email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

/// Run one command against the configured backend.
pub async fn run(cmd: Command, config: &AppConfig, offset: UtcOffset, login: Login) -> Result<()> {
    let backend = Backend::from_config(&config.backend).context("backend configuration")?;
    let auth = AuthClient::new(backend.clone());

    if matches!(cmd, Command::Signup) {
        return signup(&auth, &login).await;
    }

    authenticate(&auth, &login).await?;
    let store = TaskStore::with_provider(RestStore::new(backend, config.backend.table()), &auth, offset);
    let outcome = match store.start().await {
        Ok(transition) => {
            debug!(?transition, tasks = store.len(), "store ready");
            dispatch(cmd, &store, config, offset).await
        }
        Err(err) => Err(describe(err)),
    };

    if let Err(err) = auth.sign_out().await {
        warn!(error = %err, "sign-out failed");
    }
    outcome
}

async fn signup(auth: &AuthClient, login: &Login) -> Result<()> {
    let credentials = login
        .credentials()
        .ok_or_else(|| anyhow!("sign-up needs --email and --password"))?;
    match auth.sign_up(&credentials).await? {
        SignUpOutcome::SignedIn(identity) => {
            println!("Account created, signed in as {}", identity.user_id);
            if let Err(err) = auth.sign_out().await {
                warn!(error = %err, "sign-out failed");
            }
        }
        SignUpOutcome::ConfirmationPending(_) => {
            println!("Account created; confirm {} before signing in", credentials.email());
        }
    }
    Ok(())
}

async fn authenticate(auth: &AuthClient, login: &Login) -> Result<()> {
    if let Some(token) = &login.access_token {
        auth.restore(token.as_str()).await.context("restore session")?;
        return Ok(());
    }
    let credentials = login.credentials().ok_or_else(|| anyhow!(SIGN_IN_HINT))?;
    auth.sign_in(&credentials).await.context("sign in")?;
    Ok(())
}

fn describe(err: StoreError) -> anyhow::Error {
    if err.is_auth_required() {
        anyhow!(SIGN_IN_HINT)
    } else {
        anyhow::Error::new(err)
    }
}

fn print_task(verb: &str, task: &Task) {
    let state = if task.completed { "done" } else { "pending" };
    println!("{verb} {} ({state}): {}", task.id, task.text);
}

async fn dispatch(cmd: Command, store: &TaskStore<RestStore>, config: &AppConfig, offset: UtcOffset) -> Result<()> {
    match cmd {
        Command::Signup => {}
        Command::List { format } => match format {
            ListFormat::Text => print!("{}", store.with_tasks(|tasks| view::list(tasks, offset))),
            ListFormat::Json => println!("{}", serde_json::to_string_pretty(&store.tasks())?),
        },
        Command::Add { text } => {
            let task = store.add(&text).await.map_err(describe)?;
            print_task("Added", &task);
        }
        Command::Toggle { id } => {
            let task = store.toggle_completion(id).await.map_err(describe)?;
            print_task("Updated", &task);
        }
        Command::Edit { id, text } => {
            let task = store.update_text(id, &text).await.map_err(describe)?;
            print_task("Updated", &task);
        }
        Command::Remove { id, yes } => {
            if !yes {
                bail!("refusing to delete task {id} without --yes");
            }
            store.remove(id).await.map_err(describe)?;
            println!("Deleted {id}");
        }
        Command::Stats { months } => {
            let window = store.dashboard(months.unwrap_or(config.display.dashboard_months));
            print!("{}", view::dashboard(&window, &store.overall_stats()));
        }
        Command::Today => {
            let stats = store.today_stats(OffsetDateTime::now_utc());
            let tasks = store.tasks_on_sorted(stats.day);
            print!("{}", view::day(&stats, &tasks, offset));
        }
        Command::Day { date } => {
            let stats = store.daily_stats(date);
            print!("{}", view::day(&stats, &store.tasks_on_sorted(date), offset));
        }
        Command::Calendar { month } => {
            let month = month.unwrap_or_else(|| MonthKey::of(OffsetDateTime::now_utc().to_offset(offset).date()));
            print!("{}", view::calendar(&store.month_grid(month)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_both_fields() {
        let login = Login {
            email: Some("me@example.invalid".to_owned()),
            ..Login::default()
        };
        assert!(login.credentials().is_none());

        let login = Login {
            email: Some("me@example.invalid".to_owned()),
            password: Some("pw".to_owned()),
            access_token: None,
        };
        assert_eq!(login.credentials().map(|c| c.email().to_owned()).as_deref(), Some("me@example.invalid"));
    }

    #[test]
    fn auth_errors_become_a_hint() {
        assert_eq!(describe(StoreError::AuthRequired).to_string(), SIGN_IN_HINT);
        let err = describe(StoreError::NotFound(todo_sync_core::TaskId(4)));
        assert_eq!(err.to_string(), "task 4 not found");
    }
}
