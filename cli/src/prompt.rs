use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use runner::Confirm;

/// Asks on the terminal. Anything but an explicit yes declines, including
/// end of input.
pub struct StdinConfirm;

#[async_trait]
impl Confirm for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || ask(&prompt))
            .await
            .unwrap_or(false)
    }
}

fn ask(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => is_yes(&answer),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "execute"
    )
}
