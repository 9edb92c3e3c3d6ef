//! Interactive chat loop.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use crate::error::{GascError, Result};
use crate::session::{ConversationSession, Message};

const HELP: &str = "Commands:\n  /reset    clear the conversation history\n  /history  show the conversation so far\n  /help     show this help\n  /exit     leave the chat (also /quit)";

/// Input and output surface of the chat loop.
///
/// Not `Send`: terminal editors hold thread-bound state.
#[async_trait(?Send)]
pub trait ChatIo {
    /// Next line of user input. `None` ends the loop.
    async fn read_input(&mut self) -> Result<Option<String>>;

    /// Render a history entry.
    fn show_message(&mut self, message: &Message);

    fn begin_reply(&mut self);

    fn show_chunk(&mut self, chunk: &str);

    fn end_reply(&mut self);

    fn show_error(&mut self, error: &GascError);

    fn show_notice(&mut self, notice: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Reset,
    History,
    Help,
    Exit,
}

impl Command {
    fn parse(line: &str) -> Option<std::result::Result<Self, String>> {
        let name = line.strip_prefix('/')?;
        Some(match name.trim().to_ascii_lowercase().as_str() {
            "reset" | "clear" => Ok(Command::Reset),
            "history" => Ok(Command::History),
            "help" | "?" => Ok(Command::Help),
            "exit" | "quit" => Ok(Command::Exit),
            other => Err(other.to_string()),
        })
    }
}

/// Reads user input, submits turns and forwards reply chunks.
pub struct ChatLoop {
    session: ConversationSession,
}

impl ChatLoop {
    pub fn new(session: ConversationSession) -> Self {
        Self { session }
    }

    /// Run until the input ends or the user exits.
    ///
    /// Turn errors are shown to the user and the loop continues.
    pub async fn run(&self, io: &mut dyn ChatIo) -> Result<()> {
        info!(session = %self.session.id(), "Chat loop started");
        self.render_history(io).await;

        while let Some(line) = io.read_input().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match Command::parse(line) {
                Some(Ok(Command::Exit)) => break,
                Some(Ok(command)) => self.run_command(command, io).await,
                Some(Err(unknown)) => {
                    io.show_notice(&format!("Unknown command: /{} (try /help)", unknown))
                }
                None => self.turn(line, io).await,
            }
        }

        info!(session = %self.session.id(), "Chat loop ended");
        Ok(())
    }

    async fn render_history(&self, io: &mut dyn ChatIo) {
        for message in self.session.history().await {
            io.show_message(&message);
        }
    }

    async fn run_command(&self, command: Command, io: &mut dyn ChatIo) {
        debug!(?command, "Chat command");
        match command {
            Command::Reset => match self.session.reset_history().await {
                Ok(()) => io.show_notice("History cleared."),
                Err(e) => io.show_error(&e),
            },
            Command::History => {
                if self.session.history().await.is_empty() {
                    io.show_notice("No messages yet.");
                } else {
                    self.render_history(io).await;
                }
            }
            Command::Help => io.show_notice(HELP),
            Command::Exit => {}
        }
    }

    async fn turn(&self, input: &str, io: &mut dyn ChatIo) {
        let mut stream = match self.session.submit_turn(input).await {
            Ok(stream) => stream,
            Err(e) => {
                io.show_error(&e);
                return;
            }
        };

        io.begin_reply();
        let mut failure = None;
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => io.show_chunk(&chunk),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        io.end_reply();

        if let Some(e) = failure {
            io.show_error(&e);
        }
    }
}
