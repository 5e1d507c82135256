//! Commands read from stdin, one per line
//!
//! - `click <slot>`: focus the desktop shown in 1-based `slot`
//! - `refresh`: write the current frame again
//! - `quit`: stop the daemon

use anyhow::{anyhow, bail, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    Click(usize),
    Refresh,
    Quit,
}

impl std::str::FromStr for PanelCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some("click") => {
                let slot = words
                    .next()
                    .ok_or_else(|| anyhow!("click needs a slot number"))?;
                let slot: usize = slot
                    .parse()
                    .map_err(|_| anyhow!("Invalid slot number: {}", slot))?;
                if slot == 0 {
                    bail!("Slots are numbered from 1");
                }
                Self::Click(slot)
            }
            Some("refresh") => Self::Refresh,
            Some("quit") => Self::Quit,
            Some(other) => bail!("Unknown command: {}", other),
            None => bail!("Empty command"),
        };

        if let Some(extra) = words.next() {
            bail!("Unexpected argument: {}", extra);
        }
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("click 3".parse::<PanelCommand>().unwrap(), PanelCommand::Click(3));
        assert_eq!("  click\t1 ".parse::<PanelCommand>().unwrap(), PanelCommand::Click(1));
        assert_eq!("refresh".parse::<PanelCommand>().unwrap(), PanelCommand::Refresh);
        assert_eq!("quit".parse::<PanelCommand>().unwrap(), PanelCommand::Quit);
    }

    #[test]
    fn test_invalid_commands() {
        for line in ["", "click", "click 0", "click x", "click 1 2", "scroll up"] {
            assert!(
                line.parse::<PanelCommand>().is_err(),
                "{:?} should be rejected",
                line
            );
        }
    }
}
