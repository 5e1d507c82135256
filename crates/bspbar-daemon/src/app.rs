//! Panel event loop
//!
//! Drives the desktop strip from subscription events and stdin commands,
//! writing a frame after every visible change.

use anyhow::Result;
use bspbar_ipc::{BspwmClient, ConnectionState, EventReceiver, SubscriptionEvent, Transport};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::PanelCommand;
use crate::output::{write_frame, PanelFrame};
use crate::panel::DesktopStrip;

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Cancelled,
    /// The subscription ended and closed its channel
    SubscriptionEnded,
    Quit,
}

pub struct PanelApp<T: Transport, W> {
    strip: DesktopStrip,
    client: BspwmClient<T>,
    output: W,
}

impl<T, W> PanelApp<T, W>
where
    T: Transport,
    W: AsyncWrite + Unpin,
{
    pub fn new(strip: DesktopStrip, client: BspwmClient<T>, output: W) -> Self {
        Self {
            strip,
            client,
            output,
        }
    }

    pub fn strip(&self) -> &DesktopStrip {
        &self.strip
    }

    /// Run until cancelled, told to quit, or the subscription ends
    ///
    /// End of input only stops command processing; events keep flowing.
    pub async fn run<R>(
        &mut self,
        mut events: EventReceiver,
        input: R,
        cancel: CancellationToken,
    ) -> Result<Exit>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut commands = LinesStream::new(input.lines());
        let mut input_open = true;

        // Announce the initial (empty, stale) panel
        self.emit().await?;

        loop {
            tokio::select! {
                // Reports before commands, so a click sees the latest strip
                biased;
                _ = cancel.cancelled() => return Ok(Exit::Cancelled),
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => return Ok(Exit::SubscriptionEnded),
                },
                line = commands.next(), if input_open => match line {
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match line.parse::<PanelCommand>() {
                            Ok(PanelCommand::Quit) => return Ok(Exit::Quit),
                            Ok(command) => self.handle_command(command).await?,
                            Err(e) => warn!(error = %e, "Ignoring command"),
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Failed to read command input");
                        input_open = false;
                    }
                    None => {
                        debug!("Command input closed");
                        input_open = false;
                    }
                },
            }
        }
    }

    async fn handle_event(&mut self, event: SubscriptionEvent) -> Result<()> {
        let dirty = match event {
            SubscriptionEvent::Connection { state } => {
                if let ConnectionState::Error(reason) = &state {
                    debug!(reason = %reason, "bspwm unreachable");
                }
                self.strip.set_stale(state != ConnectionState::Connected)
            }
            SubscriptionEvent::Report { report, changes } => {
                self.strip.apply(&report, &changes)
            }
            SubscriptionEvent::ParseError { line, reason } => {
                debug!(line = %line, reason = %reason, "Report line skipped");
                false
            }
        };

        if dirty {
            self.emit().await?;
        }
        Ok(())
    }

    async fn handle_command(&mut self, command: PanelCommand) -> Result<()> {
        match command {
            PanelCommand::Click(slot) => match self.strip.click_target(slot) {
                Some(index) => {
                    info!(slot, index, "Focusing desktop");
                    if let Err(e) = self.client.focus_desktop(index).await {
                        warn!(slot, error = %e, "Failed to focus desktop");
                    }
                }
                None => warn!(slot, "Click on a slot that does not exist"),
            },
            PanelCommand::Refresh => self.emit().await?,
            PanelCommand::Quit => {}
        }
        Ok(())
    }

    async fn emit(&mut self) -> Result<()> {
        write_frame(&mut self.output, &PanelFrame::from_strip(&self.strip)).await
    }
}
