//! Terminal front end for the chat loop (rustyline input, stdout output).

use std::io::Write;

use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::{GascError, Result};
use crate::session::{Message, Role};

use super::ChatIo;

/// Line-edited terminal session. Replies stream to stdout as they arrive.
pub struct TerminalIo {
    editor: DefaultEditor,
    assistant_name: String,
}

impl TerminalIo {
    pub fn new(assistant_name: impl Into<String>) -> Result<Self> {
        let editor = DefaultEditor::new()
            .map_err(|e| GascError::Config(format!("terminal unavailable: {}", e)))?;
        Ok(Self {
            editor,
            assistant_name: assistant_name.into(),
        })
    }

    fn flush() {
        let _ = std::io::stdout().flush();
    }
}

#[async_trait(?Send)]
impl ChatIo for TerminalIo {
    async fn read_input(&mut self) -> Result<Option<String>> {
        // rustyline blocks the thread; keep the runtime's other tasks moving
        let line = tokio::task::block_in_place(|| self.editor.readline("you> "));
        match line {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(GascError::Io(std::io::Error::other(e.to_string()))),
        }
    }

    fn show_message(&mut self, message: &Message) {
        match message.role {
            Role::User => println!("you> {}", message.content),
            Role::Assistant => println!("{}> {}\n", self.assistant_name, message.content),
        }
    }

    fn begin_reply(&mut self) {
        print!("{}> ", self.assistant_name);
        Self::flush();
    }

    fn show_chunk(&mut self, chunk: &str) {
        print!("{}", chunk);
        Self::flush();
    }

    fn end_reply(&mut self) {
        println!("\n");
    }

    fn show_error(&mut self, error: &GascError) {
        eprintln!("error: {}", error);
    }

    fn show_notice(&mut self, notice: &str) {
        println!("{}", notice);
    }
}
