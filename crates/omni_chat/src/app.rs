use std::path::Path;
use std::time::Duration;

use omni_api::{BrainCatalog, ExecuteRequest};
use omni_stream::config::DEFAULT_BRAIN;
use omni_stream::{Applied, EnvConfig, Frame, Interpreter, Session};
use omni_transport::TurnId;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};

/// Error returned by [`HostOps::open_turn`] while another connection is live.
pub const ERROR_TURN_ALREADY_ACTIVE: &str = "Turn already active";

const MSG_TURN_IN_PROGRESS: &str = "A reply is still streaming. Use /cancel to stop it.";
const MSG_CANCELLING: &str = "Cancelling the previous reply, please wait.";
const MSG_CLOSED_EARLY: &str = "connection closed before the reply finished";
const DEFAULT_VISION_PROMPT: &str = "Describe this image.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    Idle,
    Streaming { turn_id: TurnId },
    Failed(String),
}

/// Side effects the app asks of whoever owns the connections.
pub trait HostOps {
    fn open_turn(&mut self, message: String, brain: String) -> Result<TurnId, String>;

    fn cancel_turn(&mut self, turn_id: TurnId);

    fn request_stop(&mut self);
}

/// Conversation state plus the turn discipline around it.
///
/// Transport events reach the app through the `on_turn_*` handlers. Events
/// for any turn other than the streaming one are dropped, so a late frame from
/// a cancelled or timed-out connection never touches the session.
pub struct App {
    session: Session,
    interpreter: Interpreter,
    pub status: TurnStatus,
    cancelling_turn: Option<TurnId>,
    brain: String,
    notices: Vec<String>,
    pub should_exit: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_session(Session::new(), Interpreter::default(), DEFAULT_BRAIN)
    }

    pub fn from_config(config: &EnvConfig) -> Self {
        Self::with_session(
            Session::new(),
            Interpreter::new(config.fence_marker.clone()),
            config.brain.clone(),
        )
    }

    pub fn with_session(session: Session, interpreter: Interpreter, brain: impl Into<String>) -> Self {
        Self {
            session,
            interpreter,
            status: TurnStatus::Idle,
            cancelling_turn: None,
            brain: brain.into(),
            notices: Vec::new(),
            should_exit: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn brain(&self) -> &str {
        &self.brain
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        match self.status {
            TurnStatus::Streaming { turn_id } => Some(turn_id),
            _ => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.active_turn().is_some()
    }

    pub fn cancelling_turn(&self) -> Option<TurnId> {
        self.cancelling_turn
    }

    /// Feedback that is printed but never stored in the transcript.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Replaces the default brain with the first installed one.
    ///
    /// A brain chosen explicitly through configuration is kept.
    pub fn select_initial_brain(&mut self, catalog: &BrainCatalog) {
        if self.brain != DEFAULT_BRAIN {
            return;
        }
        if let Some(brain) = catalog.first_installed() {
            info!(brain, "selected first installed brain");
            self.brain = brain.to_string();
        }
    }

    pub fn on_submit(&mut self, input: &str, host: &mut dyn HostOps, backend: &mut dyn Backend) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }

        match parse_slash_command(input) {
            Some(command) => self.on_command(command, host, backend),
            None => self.submit_prompt(input.to_string(), host),
        }
    }

    pub fn submit_prompt(&mut self, prompt: String, host: &mut dyn HostOps) {
        if self.is_streaming() {
            self.notify(MSG_TURN_IN_PROGRESS);
            return;
        }
        if self.cancelling_turn.is_some() {
            self.notify(MSG_CANCELLING);
            return;
        }

        match host.open_turn(prompt.clone(), self.brain.clone()) {
            Ok(turn_id) => {
                self.interpreter.begin_turn(&mut self.session, prompt);
                self.status = TurnStatus::Streaming { turn_id };
                info!(turn_id, brain = %self.brain, "turn started");
            }
            Err(error) if error == ERROR_TURN_ALREADY_ACTIVE => {
                self.notify(MSG_TURN_IN_PROGRESS);
            }
            Err(error) => {
                warn!(%error, "failed to start turn");
                self.session.push_user(prompt);
                self.session.push_system(format!("Error: {error}"));
                self.status = TurnStatus::Failed(error);
            }
        }
    }

    pub fn on_cancel(&mut self, host: &mut dyn HostOps) {
        let Some(turn_id) = self.active_turn() else {
            self.notify("Nothing to cancel.");
            return;
        };

        self.cancelling_turn = Some(turn_id);
        self.interpreter.reset();
        self.session.cancel_turn();
        self.status = TurnStatus::Idle;
        self.session.push_system("Reply cancelled");
        info!(turn_id, "turn cancelled");
        host.cancel_turn(turn_id);
    }

    pub fn on_quit(&mut self, host: &mut dyn HostOps) {
        if self.is_streaming() {
            self.on_cancel(host);
        }
        self.should_exit = true;
        host.request_stop();
    }

    pub fn on_turn_opened(&mut self, turn_id: TurnId) {
        if !self.is_active_turn(turn_id) {
            return;
        }
        debug!(turn_id, "connection opened");
        self.session.start_stream();
    }

    pub fn on_frame(&mut self, turn_id: TurnId, frame: Frame) {
        if !self.is_active_turn(turn_id) {
            debug!(turn_id, kind = frame.kind(), "dropping frame from inactive turn");
            return;
        }

        match self.interpreter.apply(&mut self.session, frame) {
            Ok(Applied::Done) => {
                self.status = TurnStatus::Idle;
                info!(
                    turn_id,
                    loc_session = self.session.counters().loc_session(),
                    artifacts = self.session.artifacts().len(),
                    "turn complete"
                );
            }
            Ok(Applied::Continue) => {}
            Err(error) => warn!(turn_id, %error, "ignoring frame"),
        }
    }

    pub fn on_malformed(&mut self, turn_id: TurnId, raw: &str, error: &str) {
        if self.is_active_turn(turn_id) {
            warn!(turn_id, %error, raw, "skipped malformed frame");
        }
    }

    pub fn on_turn_closed(&mut self, turn_id: TurnId) {
        if self.finish_cancelling(turn_id) {
            return;
        }
        if self.is_active_turn(turn_id) {
            self.fail_active_turn(MSG_CLOSED_EARLY.to_string());
        }
    }

    pub fn on_turn_failed(&mut self, turn_id: TurnId, error: &str) {
        if self.finish_cancelling(turn_id) {
            return;
        }
        if self.is_active_turn(turn_id) {
            self.fail_active_turn(error.to_string());
        }
    }

    pub fn on_turn_cancelled(&mut self, turn_id: TurnId) {
        self.finish_cancelling(turn_id);
    }

    /// Fails the streaming turn after `waited` without traffic.
    ///
    /// The caller is responsible for signalling cancellation to the transport;
    /// its terminal event then clears the cancelling marker.
    pub fn on_idle_timeout(&mut self, turn_id: TurnId, waited: Duration) {
        if !self.is_active_turn(turn_id) {
            return;
        }
        self.cancelling_turn = Some(turn_id);
        self.fail_active_turn(format!("no response from the backend for {}s", waited.as_secs()));
    }

    fn on_command(&mut self, command: SlashCommand, host: &mut dyn HostOps, backend: &mut dyn Backend) {
        match command {
            SlashCommand::Help => self.notify(HELP_TEXT),
            SlashCommand::Clear => {
                if self.is_streaming() {
                    self.notify("Cancel the streaming reply before clearing.");
                } else {
                    self.interpreter.reset();
                    self.session.clear();
                    self.status = TurnStatus::Idle;
                    self.notify("Transcript cleared.");
                }
            }
            SlashCommand::Cancel => self.on_cancel(host),
            SlashCommand::Quit => self.on_quit(host),
            SlashCommand::Brains => self.list_brains(backend),
            SlashCommand::Brain(None) => self.notify(format!("Current brain: {}", self.brain)),
            SlashCommand::Brain(Some(brain)) => {
                self.notify(format!("Brain set to {brain}"));
                self.brain = brain;
            }
            SlashCommand::Artifacts => self.list_artifacts(),
            SlashCommand::Run => self.run_entry_point(backend),
            SlashCommand::Chat(text) => self.one_shot_chat(text, backend),
            SlashCommand::Vision { path, prompt } => self.describe_image(&path, prompt, backend),
            SlashCommand::Voice(path) => self.voice_prompt(&path, host, backend),
            SlashCommand::Speak { text, out } => self.speak(&text, &out, backend),
            SlashCommand::Stats => {
                let counters = self.session.counters();
                self.notify(format!(
                    "agent: {}  brain: {}  lines this turn: {}  lines total: {}  artifacts: {}",
                    counters.active_agent(),
                    self.brain,
                    counters.loc_session(),
                    counters.loc_total(),
                    self.session.artifacts().len()
                ));
            }
            SlashCommand::Usage(usage) => self.notify(format!("Usage: {usage}")),
            SlashCommand::Unknown(command) => {
                self.notify(format!("Unknown command {command}. Type /help for a list."))
            }
        }
    }

    fn list_artifacts(&mut self) {
        let artifacts = self.session.artifacts();
        if artifacts.is_empty() {
            self.notify("No artifacts yet.");
            return;
        }

        let entry = artifacts.entry_point().map(|artifact| artifact.filename.clone());
        let lines: Vec<String> = artifacts
            .all()
            .iter()
            .map(|artifact| {
                let marker = if Some(&artifact.filename) == entry.as_ref() {
                    "*"
                } else {
                    " "
                };
                let language = if artifact.language.is_empty() {
                    "?"
                } else {
                    artifact.language.as_str()
                };
                format!("{marker} {} ({language}) {}", artifact.filename, artifact.path)
                    .trim_end()
                    .to_string()
            })
            .collect();
        self.notify(lines.join("\n"));
    }

    /// Backend calls block while the app lock is held.
    fn refuse_while_streaming(&mut self) -> bool {
        if self.is_streaming() {
            self.notify(MSG_TURN_IN_PROGRESS);
            return true;
        }
        false
    }

    fn list_brains(&mut self, backend: &mut dyn Backend) {
        if self.refuse_while_streaming() {
            return;
        }

        match backend.brains() {
            Ok(catalog) => self.notify(format!(
                "Installed brains: {}\nAvailable personas: {}",
                join_or_none(&catalog.installed),
                join_or_none(&catalog.available)
            )),
            Err(error) => self.notify(format!("Could not list brains: {error}")),
        }
    }

    fn speak(&mut self, text: &str, out: &str, backend: &mut dyn Backend) {
        if self.refuse_while_streaming() {
            return;
        }

        match backend.speak_to_file(text, Path::new(out)) {
            Ok(bytes) => self.notify(format!("Wrote {bytes} bytes of audio to {out}")),
            Err(error) => self.notify(format!("Speech failed: {error}")),
        }
    }

    fn run_entry_point(&mut self, backend: &mut dyn Backend) {
        if self.refuse_while_streaming() {
            return;
        }

        let Some(entry) = self.session.artifacts().entry_point() else {
            self.notify("No runnable artifact.");
            return;
        };

        let request = ExecuteRequest::from(entry);
        match backend.execute(&request) {
            Ok(log) => self.notify(format!("$ {}\n{}", request.filename, log.trim_end())),
            Err(error) => self.notify(format!("Run failed: {error}")),
        }
    }

    fn one_shot_chat(&mut self, text: String, backend: &mut dyn Backend) {
        if self.refuse_while_streaming() {
            return;
        }

        let reply = backend.chat(&text, &self.brain);
        self.session.push_user(text);
        match reply {
            Ok(reply) => self.session.push_assistant(reply),
            Err(error) => self.session.push_system(format!("Error: {error}")),
        }
    }

    fn describe_image(&mut self, path: &str, prompt: Option<String>, backend: &mut dyn Backend) {
        if self.refuse_while_streaming() {
            return;
        }

        let prompt = prompt.unwrap_or_else(|| DEFAULT_VISION_PROMPT.to_string());
        let reply = backend.describe_image(Path::new(path), &prompt);
        self.session.push_user(format!("[image {path}] {prompt}"));
        match reply {
            Ok(description) => self.session.push_assistant(description),
            Err(error) => self.session.push_system(format!("Error: {error}")),
        }
    }

    fn voice_prompt(&mut self, path: &str, host: &mut dyn HostOps, backend: &mut dyn Backend) {
        if self.refuse_while_streaming() {
            return;
        }

        match backend.transcribe(Path::new(path)) {
            Ok(text) if text.trim().is_empty() => self.notify("No speech detected."),
            Ok(text) => {
                let text = text.trim().to_string();
                self.notify(format!("Heard: {text}"));
                self.submit_prompt(text, host);
            }
            Err(error) => self.notify(format!("Transcription failed: {error}")),
        }
    }

    fn is_active_turn(&self, turn_id: TurnId) -> bool {
        self.active_turn() == Some(turn_id)
    }

    fn finish_cancelling(&mut self, turn_id: TurnId) -> bool {
        if self.cancelling_turn == Some(turn_id) {
            self.cancelling_turn = None;
            debug!(turn_id, "cancelled connection finished");
            return true;
        }
        false
    }

    fn fail_active_turn(&mut self, reason: String) {
        warn!(%reason, "turn failed");
        self.interpreter.reset();
        self.session.fail_turn(&reason);
        self.status = TurnStatus::Failed(reason);
    }

    fn notify(&mut self, notice: impl Into<String>) {
        self.notices.push(notice.into());
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}
