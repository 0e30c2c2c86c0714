use log::info;
use std::error::Error;
use std::future::Future;
use std::io::Write;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::mpsc;

use crate::config::{ AI_NAME, CLEAR_CHAT_TEXT, INPUT_PLACEHOLDER, SUGGESTED_QUESTIONS, TAGLINE };
use crate::conversation::StreamUpdate;
use crate::models::chat::{ ChatStatus, Message, Role };
use crate::session::{ ChatSession, SessionError, SessionEvent, StopHandle, SubmitOutcome };

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Suggested(usize),
    Clear,
    Help,
    Quit,
    Nothing,
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.trim() {
        "" => Command::Nothing,
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        cmd if cmd.starts_with('/') => {
            match cmd[1..].parse::<usize>() {
                Ok(n) if (1..=SUGGESTED_QUESTIONS.len()).contains(&n) => Command::Suggested(n - 1),
                _ => Command::Help,
            }
        }
        _ => Command::Send(line.to_string()),
    }
}

fn print_message(message: &Message) {
    let who = match message.role {
        Role::User => "You",
        Role::Assistant => AI_NAME,
        Role::System => "System",
    };
    println!("{}: {}\n", who, message.text());
}

fn print_intro() {
    println!("Welcome to {} • {}", AI_NAME, TAGLINE);
    println!("Try one of these:");
    for (i, q) in SUGGESTED_QUESTIONS.iter().enumerate() {
        println!("  /{}  {}", i + 1, q);
    }
    println!();
}

fn print_help() {
    println!("Type a question and press Enter. {}", INPUT_PLACEHOLDER);
    println!("  /1../{}  ask a suggested question", SUGGESTED_QUESTIONS.len());
    println!("  /clear   start a new conversation");
    println!("  /quit    leave (Ctrl-D works too)");
    println!("  Ctrl-C   stop the reply being generated (it does not quit)\n");
}

fn render(event: SessionEvent) {
    match event {
        SessionEvent::Status(ChatStatus::Submitted) => {
            print!("{}: ", AI_NAME);
        }
        SessionEvent::Delta { update: StreamUpdate::TextDelta(text), .. } => {
            print!("{}", text);
        }
        SessionEvent::Finished(SubmitOutcome::Stopped { .. }) => {
            println!("\n[stopped]");
        }
        SessionEvent::Finished(SubmitOutcome::Completed { .. }) => {
            println!();
        }
        _ => {}
    }
    let _ = std::io::stdout().flush();
}

/// Renders events until `submit` resolves. The first `interrupt` stops the
/// generation; it is awaited once for the whole exchange.
async fn drive<F, I>(
    submit: F,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    stop: &StopHandle,
    interrupt: I
) -> F::Output
where
    F: Future,
    I: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(submit);
    tokio::pin!(interrupt);
    let mut interrupted = false;
    loop {
        tokio::select! {
            res = &mut submit => break res,
            Some(event) = events.recv() => render(event),
            res = &mut interrupt, if !interrupted => {
                interrupted = true;
                if res.is_ok() {
                    stop.stop();
                }
            }
        }
    }
}

async fn send(
    session: &mut ChatSession,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    text: &str
) {
    let stop = session.stop_handle();
    let result = drive(session.submit(text), events, &stop, tokio::signal::ctrl_c()).await;
    while let Ok(event) = events.try_recv() {
        render(event);
    }

    match result {
        Ok(SubmitOutcome::Completed { reply_id: Some(id) }) => {
            if let Some(ms) = session.conversation().duration_of(&id) {
                println!("(answered in {:.1}s)\n", (ms as f64) / 1000.0);
            }
        }
        Ok(_) => println!(),
        Err(SessionError::Transport(e)) => {
            println!("\nSomething went wrong: {}. Your question is kept; send it again to retry.\n", e);
        }
        Err(e) => println!("{}\n", e),
    }
}

/// Line-oriented chat front-end over stdin/stdout.
pub async fn run(
    mut session: ChatSession,
    mut events: mpsc::UnboundedReceiver<SessionEvent>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    session.initialize().await;
    for message in session.conversation().messages() {
        print_message(message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if session.conversation().shows_intro() {
            print_intro();
        }
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            Command::Nothing => {}
            Command::Help => print_help(),
            Command::Quit => break,
            Command::Clear => {
                session.clear().await;
                println!("{}\n", CLEAR_CHAT_TEXT);
                session.initialize().await;
                for message in session.conversation().messages() {
                    print_message(message);
                }
            }
            Command::Suggested(idx) => {
                let question = SUGGESTED_QUESTIONS[idx];
                println!("You: {}\n", question);
                send(&mut session, &mut events, question).await;
            }
            Command::Send(text) => {
                send(&mut session, &mut events, &text).await;
            }
        }
    }

    info!("Session ended with status {}", session.status());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Conversation;
    use crate::history::MemoryHistoryStore;
    use crate::transport::{ ChatRequest, ChatTransport, TransportError, UpdateStream };
    use async_trait::async_trait;
    use futures::{ stream, StreamExt };
    use std::sync::Arc;
    use std::time::Duration;

    /// One chunk, then silence until stopped.
    struct SlowTransport;

    #[async_trait]
    impl ChatTransport for SlowTransport {
        async fn send(&self, _request: ChatRequest) -> Result<UpdateStream, TransportError> {
            let first = stream::iter(vec![Ok(StreamUpdate::TextDelta("Partial".into()))]);
            Ok(Box::pin(first.chain(stream::pending())))
        }
    }

    async fn slow_session() -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(MemoryHistoryStore::new("chat-messages"));
        let mut session = ChatSession::new(
            Conversation::new(store, "Namaste!"),
            Arc::new(SlowTransport)
        ).with_events(tx);
        session.initialize().await;
        (session, rx)
    }

    #[tokio::test]
    async fn interrupt_stops_the_reply_once() {
        let (mut session, mut events) = slow_session().await;
        let stop = session.stop_handle();
        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        };

        let outcome = drive(session.submit("hi"), &mut events, &stop, interrupt).await;
        assert!(matches!(outcome, Ok(SubmitOutcome::Stopped { reply_id: Some(_) })));
        assert_eq!(session.status(), ChatStatus::Ready);

        // a later exchange gets its own interrupt
        let interrupt = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        };
        let outcome = drive(session.submit("again"), &mut events, &stop, interrupt).await;
        assert!(matches!(outcome, Ok(SubmitOutcome::Stopped { .. })));
    }

    #[tokio::test]
    async fn failed_interrupt_listener_is_not_polled_again() {
        let (mut session, mut events) = slow_session().await;
        let stop = session.stop_handle();
        let interrupt = async { Err(std::io::Error::other("no signal handler")) };

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            drive(session.submit("hi"), &mut events, &stop, interrupt)
        ).await;
        // nothing stopped the reply, so it is still streaming when abandoned
        assert!(outcome.is_err());
        assert_eq!(session.status(), ChatStatus::Ready);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/clear"), Command::Clear);
        assert_eq!(parse_command("  \n"), Command::Nothing);
        assert_eq!(parse_command("/2"), Command::Suggested(1));
        assert_eq!(parse_command("/9"), Command::Help);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("What is Udyam?\r\n"), Command::Send("What is Udyam?".into()));
    }
}
