//! Terminal prompter for headless playback.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use sesh_prompt::{Prompt, Prompter};
use tracing::warn;

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompter;

#[async_trait]
impl Prompter for ConsolePrompter {
    async fn alert(&self, prompt: &Prompt) {
        eprintln!("{}\n{}", prompt.title, prompt.message);
    }

    async fn confirm(&self, prompt: &Prompt) -> bool {
        let prompt = prompt.clone();
        let answer = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            ask(&prompt, &mut stdin.lock(), &mut io::stderr())
        })
        .await;

        match answer {
            Ok(Ok(yes)) => yes,
            Ok(Err(e)) => {
                warn!(error = %e, "failed to read answer, treating as no");
                false
            }
            Err(e) => {
                warn!(error = %e, "prompt task failed, treating as no");
                false
            }
        }
    }
}

/// Print `prompt` and read a y/n answer. End of input counts as no.
fn ask(prompt: &Prompt, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    writeln!(output, "{}\n{}", prompt.title, prompt.message)?;
    loop {
        write!(output, "[y/N] ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}
