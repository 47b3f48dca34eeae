//! Orchestrator: turns commands into page reads, completions, and history.
//!
//! A RUN walks `Idle → FetchingPage → BuildingPrompt → CallingModel →
//! PersistingHistory → Done`. Any step may end in `Failed`; only the failing
//! step's message is reported and nothing before it needs undoing, since
//! history is the only durable write and it comes last.

pub mod command;

pub use command::{Command, CommandResponse, RunOutcome};

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::CommandError;
use crate::llm::CompletionClient;
use crate::page::{PageProvider, domain_of};
use crate::prompt::{Mode, build_prompt};
use crate::store::{CredentialStore, HistoryEntry, HistoryStore, KeyValueStore};

/// Progress of a single RUN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    FetchingPage,
    BuildingPrompt,
    CallingModel,
    PersistingHistory,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::FetchingPage => "fetching_page",
            RunState::BuildingPrompt => "building_prompt",
            RunState::CallingModel => "calling_model",
            RunState::PersistingHistory => "persisting_history",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "RUN transition");
    *state = next;
}

/// Dependencies are injected so tests can swap in fakes.
pub struct Orchestrator {
    pages: Arc<dyn PageProvider>,
    llm: Arc<dyn CompletionClient>,
    history: HistoryStore,
    credentials: CredentialStore,
}

impl Orchestrator {
    pub fn new(
        pages: Arc<dyn PageProvider>,
        llm: Arc<dyn CompletionClient>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            pages,
            llm,
            history: HistoryStore::new(Arc::clone(&store)),
            credentials: CredentialStore::new(store),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Handle a raw message. Never fails: errors become `{ok:false, error}`.
    pub async fn handle(&self, message: Value) -> CommandResponse {
        let result = match Command::parse(message) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Command failed");
            CommandResponse::error(&e)
        })
    }

    /// Execute a decoded command.
    pub async fn dispatch(&self, command: Command) -> Result<CommandResponse, CommandError> {
        debug!(command = command.kind(), "Dispatching command");
        match command {
            Command::Run { mode } => self.run(mode).await.map(CommandResponse::run),
            Command::SaveKey { api_key } => {
                let key = api_key.unwrap_or_else(|| SecretString::from(""));
                self.credentials.set(&key).await?;
                info!("API key saved");
                Ok(CommandResponse::ok())
            }
            Command::GetHistory { domain } => {
                let history = self.history.get(&domain).await?;
                Ok(CommandResponse::history(history))
            }
        }
    }

    /// One full RUN for the active page.
    pub async fn run(&self, mode: Mode) -> Result<RunOutcome, CommandError> {
        let span = info_span!("run", request_id = %Uuid::new_v4(), mode = %mode);

        async move {
            let mut state = RunState::Idle;
            match self.run_steps(mode, &mut state).await {
                Ok(outcome) => {
                    advance(&mut state, RunState::Done);
                    info!(domain = %outcome.domain, "RUN complete");
                    Ok(outcome)
                }
                Err(e) => {
                    warn!(failed_in = %state, error = %e, "RUN failed");
                    advance(&mut state, RunState::Failed);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_steps(&self, mode: Mode, state: &mut RunState) -> Result<RunOutcome, CommandError> {
        let api_key = self
            .credentials
            .get()
            .await?
            .ok_or(CommandError::MissingCredential)?;

        advance(state, RunState::FetchingPage);
        let tab = self.pages.active_tab().await?;
        let page = self.pages.snapshot(tab).await?;

        advance(state, RunState::BuildingPrompt);
        let domain = domain_of(&page.url)?;
        let prompt = build_prompt(mode, &page);

        advance(state, RunState::CallingModel);
        let output = self.llm.complete(&api_key, &prompt).await?;

        advance(state, RunState::PersistingHistory);
        let entry = HistoryEntry::new(mode, &page.title, &page.url, &output);
        self.history.append(&domain, entry).await?;

        Ok(RunOutcome {
            domain,
            result: output,
            title: page.title,
            url: page.url,
        })
    }
}
