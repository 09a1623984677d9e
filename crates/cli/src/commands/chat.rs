//! `alterego chat` — Interactive chat with streamed answers.

use std::future::Future;
use std::io::Write;
use alterego_core::error::Error;
use alterego_core::message::Transcript;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let agent = super::build_loop(&config)?;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          AlterEgo — Interactive Chat         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Persona:   {}", agent.persona().name());
    println!("  Model:     {}", config.model);
    println!("  Tools:     record_user_details, record_unknown_question");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C cancels an answer (or quits at the prompt), '/reset' clears history.");
    println!();

    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = next_input(&mut lines, super::ctrl_c()).await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }
        if input == "/reset" {
            transcript.clear();
            println!("  (conversation cleared)\n");
            continue;
        }

        println!();
        print!("  {} > ", agent.persona().name());
        std::io::stdout().flush()?;

        let cancel = CancellationToken::new();
        let stream = agent.respond_streaming(input, transcript.messages(), cancel.clone());
        let outcome = stream_answer(stream, &cancel, super::ctrl_c, |suffix| {
            print!("{suffix}");
            let _ = std::io::stdout().flush();
        })
        .await;
        println!();

        match outcome {
            Ok(answer) => {
                transcript.push_turn(input, answer);
                tracing::debug!(
                    turns = transcript.turns(),
                    history_tokens = transcript.estimated_tokens(),
                    "Turn recorded"
                );
            }
            Err(e) => {
                tracing::debug!(turns = transcript.turns(), "Turn failed, transcript unchanged");
                eprintln!("  [Error] {e}");
            }
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Read the next visitor line. `None` on end of input or on `interrupt`.
async fn next_input<R>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => Ok(None),
    }
}

/// Drain one streamed answer, handing each new suffix to `print_suffix`.
///
/// An interrupt cancels the turn; the stream then ends with `Error::Cancelled`.
async fn stream_answer<I, F>(
    mut stream: BoxStream<'_, Result<String, Error>>,
    cancel: &CancellationToken,
    mut interrupt: I,
    mut print_suffix: impl FnMut(&str),
) -> Result<String, Error>
where
    I: FnMut() -> F,
    F: Future<Output = ()>,
{
    let mut answer = String::new();
    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = interrupt(), if !cancel.is_cancelled() => {
                cancel.cancel();
                continue;
            }
        };

        match item {
            None => return Ok(answer),
            Some(Ok(prefix)) => {
                print_suffix(&prefix[answer.len()..]);
                answer = prefix;
            }
            Some(Err(e)) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use futures::stream;

    #[tokio::test]
    async fn reads_lines_until_end_of_input() {
        let mut lines = BufReader::new(&b"hello\nbye\n"[..]).lines();

        assert_eq!(next_input(&mut lines, std::future::pending()).await.unwrap().as_deref(), Some("hello"));
        assert_eq!(next_input(&mut lines, std::future::pending()).await.unwrap().as_deref(), Some("bye"));
        assert_eq!(next_input(&mut lines, std::future::pending()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn interrupt_at_prompt_ends_input() {
        // Keep the writer alive so the read never completes
        let (reader, _writer) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();

        let line = next_input(&mut lines, async {}).await.unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn prints_only_new_suffixes() {
        let prefixes = vec![Ok("Hi".to_string()), Ok("Hi there".to_string()), Ok("Hi there!".to_string())];
        let cancel = CancellationToken::new();
        let mut printed = Vec::new();

        let answer = stream_answer(
            stream::iter(prefixes).boxed(),
            &cancel,
            || std::future::pending::<()>(),
            |s| printed.push(s.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(answer, "Hi there!");
        assert_eq!(printed, vec!["Hi", " there", "!"]);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn interrupt_mid_answer_cancels_turn() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let answer = stream::iter(vec![Ok("Once upon".to_string())])
            .chain(stream::once(async move {
                token.cancelled().await;
                Err(Error::Cancelled)
            }))
            .boxed();
        let mut printed = String::new();

        let err = stream_answer(
            answer,
            &cancel,
            || tokio::time::sleep(Duration::from_millis(10)),
            |s| printed.push_str(s),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(cancel.is_cancelled());
        assert_eq!(printed, "Once upon");
    }
}
