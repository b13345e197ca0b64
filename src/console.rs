use crate::models::chat::{ ChatMessage, MessageId, Sender };
use crate::status::StatusPoller;
use crate::sync::{ ConversationSynchronizer, SendOutcome, SyncView };
use log::{ debug, info, warn };
use std::collections::HashSet;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader };
use tokio::sync::watch;

const THINKING_NOTICE: &str = "Assistant is thinking...";

pub async fn run_chat(sync: Arc<ConversationSynchronizer>) -> Result<(), Box<dyn Error + Send + Sync>> {
    chat_loop(sync, BufReader::new(tokio::io::stdin()), tokio::signal::ctrl_c()).await
}

/// Submits each input line until EOF or `interrupt` resolves. The interrupt
/// also cuts short a send that is still waiting on the gateway.
async fn chat_loop<R, F>(
    sync: Arc<ConversationSynchronizer>,
    input: R,
    interrupt: F
) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin, F: Future
{
    let printer = tokio::spawn(print_timeline(sync.watch()));
    let mut lines = input.lines();
    tokio::pin!(interrupt);
    info!("Chat ready. Type a message and press Enter; Ctrl-D to quit.");

    loop {
        let text = tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(text) => text,
                    None => {
                        info!("Input closed");
                        break;
                    }
                }
            }
            _ = &mut interrupt => {
                info!("Interrupted");
                break;
            }
        };

        sync.set_draft(text);
        tokio::select! {
            outcome = sync.submit() => {
                match outcome {
                    SendOutcome::Ignored(reason) => debug!("Input ignored: {:?}", reason),
                    SendOutcome::NotPersisted => {
                        warn!("Message was not saved; it is kept as the current draft");
                    }
                    outcome => debug!("Send finished: {:?}", outcome),
                }
            }
            _ = &mut interrupt => {
                info!("Interrupted while waiting for a reply");
                break;
            }
        }
    }

    sync.shutdown();
    printer.abort();
    Ok(())
}

pub async fn run_status(mut poller: StatusPoller) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut status = poller.subscribe();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = status.borrow_and_update().clone();
                let marker = if report.is_normal() { "ok" } else { "!!" };
                println!(
                    "[{}] Predicted Fault: {} | Confidence: {}",
                    marker,
                    report.prediction,
                    report.confidence
                );
            }
            _ = &mut interrupt => {
                info!("Interrupted");
                break;
            }
        }
    }
    poller.stop();
    Ok(())
}

async fn print_timeline(mut view: watch::Receiver<SyncView>) {
    let mut printed: HashSet<MessageId> = HashSet::new();
    let mut was_loading = false;
    loop {
        let current = view.borrow_and_update().clone();
        for message in &current.messages {
            if let Some(id) = message.id {
                if printed.insert(id) {
                    println!("{}", render(message));
                }
            }
        }
        if current.loading && !was_loading {
            println!("{}", THINKING_NOTICE);
        }
        was_loading = current.loading;

        if view.changed().await.is_err() {
            break;
        }
    }
}

fn render(message: &ChatMessage) -> String {
    let label = match message.sender {
        Sender::User => "You",
        Sender::Assistant => "MechaMind",
    };
    format!("{}: {}", label, message.content)
}
