//! halal-ask - terminal client for the ruling server
//!
//! Type a question to get a ruling. Once a ruling is shown, further input is
//! sent as a follow-up; after a clarifying question it is sent as the answer.
//!
//! Commands: `/new [question]`, `/retry`, `/reset`, `/quit`.

use halal_check::client::{ConvState, ConversationView, HttpTransport, Round, Session};
use halal_check::ruling::Ruling;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Prints the explanation as it streams in
struct Renderer<W> {
    out: W,
    ruling_shown: Option<Ruling>,
    printed_chars: usize,
}

impl<W: Write> Renderer<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            ruling_shown: None,
            printed_chars: 0,
        }
    }

    fn update(&mut self, view: &ConversationView) -> std::io::Result<()> {
        // The finalized ruling shown while a follow-up starts is not streaming
        if !view.streaming {
            return Ok(());
        }
        let Some(partial) = &view.ruling else {
            return Ok(());
        };

        if let Some(ruling) = partial.ruling.filter(|r| r.is_concrete()) {
            if self.ruling_shown != Some(ruling) {
                writeln!(self.out, "\n== {} ==", ruling.label())?;
                self.ruling_shown = Some(ruling);
                self.printed_chars = 0;
            }
        }

        if let Some(explanation) = &partial.explanation {
            let total = explanation.chars().count();
            if total > self.printed_chars {
                let fresh: String = explanation.chars().skip(self.printed_chars).collect();
                write!(self.out, "{fresh}")?;
                self.out.flush()?;
                self.printed_chars = total;
            }
        }
        Ok(())
    }

    fn finish(&mut self, view: &ConversationView) -> std::io::Result<()> {
        if self.ruling_shown.is_some() {
            writeln!(self.out)?;
        }

        if let Some(error) = &view.error {
            writeln!(self.out, "error: {error} (type /retry to try again)")?;
        } else if let Some(question) = &view.clarifying_question {
            writeln!(self.out, "? {question}")?;
        } else if let Some(result) = &view.ruling {
            // Nothing streamed, e.g. the whole ruling arrived in one chunk
            if self.ruling_shown.is_none() {
                if let Some(ruling) = result.ruling {
                    writeln!(self.out, "== {} ==", ruling.label())?;
                }
                if let Some(explanation) = &result.explanation {
                    writeln!(self.out, "{explanation}")?;
                }
            }
            for (i, reference) in result.references.iter().flatten().enumerate() {
                writeln!(self.out, "  [{}] {reference}", i + 1)?;
            }
        }

        self.ruling_shown = None;
        self.printed_chars = 0;
        Ok(())
    }
}

/// What plain input means in the current state
#[derive(Clone, Copy)]
enum InputKind {
    Question,
    Answer,
    FollowUp,
}

impl InputKind {
    fn of(state: &ConvState) -> Self {
        let round = match state {
            ConvState::AwaitingClarificationResponse { .. } => return InputKind::Answer,
            ConvState::Ruled { .. } => return InputKind::FollowUp,
            ConvState::Failed { submission, .. } => &submission.round,
            ConvState::Idle | ConvState::AwaitingRuling { .. } => return InputKind::Question,
        };
        // After a failure, new input replaces the failed turn
        match round {
            Round::Initial => InputKind::Question,
            Round::ClarificationAnswer { .. } => InputKind::Answer,
            Round::FollowUp { .. } => InputKind::FollowUp,
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            InputKind::Question => "ask> ",
            InputKind::Answer => "answer> ",
            InputKind::FollowUp => "follow-up> ",
        }
    }
}

fn show<W: Write>(renderer: &mut Renderer<W>, view: &ConversationView) {
    if let Err(e) = renderer.update(view) {
        tracing::warn!(error = %e, "Failed to render partial ruling");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halal_check=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let transport = HttpTransport::from_env()?;
    println!("Connected to {}", transport.endpoint());
    println!("Ask whether something is halal. Commands: /new [question], /retry, /reset, /quit");

    let mut session = Session::new(transport);
    let mut renderer = Renderer::new(std::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", InputKind::of(session.state()).prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        let result = match input.split_once(' ').unwrap_or((input, "")) {
            ("", _) => continue,
            ("/quit", _) => break,
            ("/reset", _) | ("/new", "") => {
                session.start_over();
                println!("Started over.");
                continue;
            }
            ("/new", question) => {
                session.start_over();
                session.submit_query(question, |v| show(&mut renderer, v)).await
            }
            ("/retry", _) => session.retry(|v| show(&mut renderer, v)).await,
            _ => {
                let on_update = |v: &ConversationView| show(&mut renderer, v);
                match InputKind::of(session.state()) {
                    InputKind::Question => session.submit_query(input, on_update).await,
                    InputKind::Answer => session.answer_clarification(input, on_update).await,
                    InputKind::FollowUp => session.follow_up(input, on_update).await,
                }
            }
        };

        match result {
            Ok(()) => renderer.finish(&session.view())?,
            Err(e) => println!("{e}"),
        }
    }

    Ok(())
}
