//! Panel frames written to stdout
//!
//! One JSON object per line, emitted whenever the strip changes:
//!
//! ```json
//! {"revision":4,"monitor":"eDP-1","visible":true,"stale":false,
//!  "slots":[{"slot":1,"label":"–1–","classes":["focused","occupied"],"revision":4}]}
//! ```

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::panel::{DesktopStrip, Slot};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PanelFrame<'a> {
    pub revision: u64,
    pub monitor: Option<&'a str>,
    pub visible: bool,
    pub stale: bool,
    pub slots: Vec<SlotFrame>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SlotFrame {
    /// 1-based position, the argument of a `click` command
    pub slot: usize,
    pub label: String,
    pub classes: Vec<&'static str>,
    pub revision: u64,
}

impl SlotFrame {
    fn new(position: usize, slot: &Slot) -> Self {
        Self {
            slot: position + 1,
            label: slot.label(),
            classes: slot.classes(),
            revision: slot.revision,
        }
    }
}

impl<'a> PanelFrame<'a> {
    pub fn from_strip(strip: &'a DesktopStrip) -> Self {
        Self {
            revision: strip.revision(),
            monitor: strip.monitor(),
            visible: strip.is_visible(),
            stale: strip.is_stale(),
            slots: strip
                .slots()
                .iter()
                .enumerate()
                .map(|(position, slot)| SlotFrame::new(position, slot))
                .collect(),
        }
    }
}

/// Write `frame` as one JSON line and flush
pub async fn write_frame<W>(writer: &mut W, frame: &PanelFrame<'_>) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
