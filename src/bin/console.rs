//! Console host for the chat widget
//!
//! Reads lines from stdin and prints the conversation as it changes. Useful
//! for poking at a real assistant backend without a browser.
//!
//! Commands: `/open`, `/close`, `/quit`; anything else is sent as a message.

use chat_widget::{
    launch, next_event, Message, Origin, Phase, WidgetConfig, WidgetEvent, WidgetHandle,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the transcript
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_widget=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Fails fast when CHAT_WIDGET_API_URL is missing
    let config = WidgetConfig::from_env()?;

    let handle = launch(&config).await?;
    tracing::info!(tenant = %handle.tenant_id(), "Console host started");

    let renderer = tokio::spawn(render(handle.clone()));
    handle.activate_icon()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/open" => handle.activate_icon()?,
            "/close" => handle.close()?,
            _ => handle.submit(line.as_str())?,
        }
    }

    handle.shutdown();
    renderer.abort();
    Ok(())
}

/// Print the tail of the transcript whenever the widget reports a change
async fn render(handle: WidgetHandle) {
    let mut events = handle.subscribe();
    let mut printer = TranscriptPrinter::default();

    // A lagging renderer skips ahead; the next change re-reads the snapshot
    while let Some(event) = next_event(&mut events).await {
        let result = match event {
            WidgetEvent::StateChanged { phase, awaiting_reply } => {
                if phase != Phase::Open {
                    println!("[{phase:?}]");
                } else if !awaiting_reply {
                    println!();
                }
                Ok(())
            }
            WidgetEvent::TranscriptChanged { .. } => match handle.snapshot().messages {
                Some(messages) => printer.print(
                    &mut std::io::stdout().lock(),
                    &messages,
                    handle.status().awaiting_reply,
                ),
                None => Ok(()),
            },
            WidgetEvent::ScrollToLatest | WidgetEvent::InputCleared => Ok(()),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to write transcript");
            break;
        }
    }
}

/// Prints each message once, streaming the growing reply in place
#[derive(Debug, Default)]
struct TranscriptPrinter {
    /// Messages fully printed so far
    printed: usize,
    /// Characters of the streaming reply already printed
    streaming_len: usize,
}

impl TranscriptPrinter {
    fn print<W: Write>(
        &mut self,
        out: &mut W,
        messages: &[Message],
        awaiting_reply: bool,
    ) -> std::io::Result<()> {
        for (i, message) in messages.iter().enumerate().skip(self.printed) {
            let last = i + 1 == messages.len();
            match message.origin {
                Origin::User => {
                    writeln!(out, "you> {}", message.text)?;
                    self.printed = i + 1;
                }
                Origin::Assistant if last && awaiting_reply => {
                    if self.streaming_len == 0 {
                        write!(out, "bot> ")?;
                    }
                    write!(out, "{}", self.fresh(&message.text))?;
                    // The line is still open; push it out now
                    out.flush()?;
                    self.streaming_len = message.text.chars().count();
                }
                Origin::Assistant => {
                    if self.streaming_len == 0 {
                        writeln!(out, "bot> {}", message.text)?;
                    } else {
                        writeln!(out, "{}", self.fresh(&message.text))?;
                    }
                    self.streaming_len = 0;
                    self.printed = i + 1;
                }
            }
        }
        Ok(())
    }

    fn fresh(&self, text: &str) -> String {
        text.chars().skip(self.streaming_len).collect()
    }
}
