//! Desktop strip model
//!
//! Headless counterpart of a bar's desktop buttons. The strip shows the
//! desktops of one monitor as positional slots and follows the change list
//! the subscriber publishes: a changed desktop updates its slot in place,
//! new desktops are appended and removed ones dropped from the tail. A slot
//! that no change touches keeps its `revision`, so a renderer only redraws
//! what moved.

use bspbar_ipc::{Desktop, Monitor, NodeState, Occupancy, Report, ReportChange, SlotPlan};

/// Marker wrapped around the focused desktop's name
const FOCUS_MARK: char = '\u{2013}';

/// One desktop button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub desktop: Desktop,
    /// Strip revision at which this slot last changed
    pub revision: u64,
}

impl Slot {
    /// Button text; the focused desktop reads `–name–`
    pub fn label(&self) -> String {
        if self.desktop.is_focused() {
            format!("{FOCUS_MARK}{}{FOCUS_MARK}", self.desktop.name)
        } else {
            self.desktop.name.clone()
        }
    }

    /// Style classes in a fixed order
    pub fn classes(&self) -> Vec<&'static str> {
        let mut classes = Vec::new();
        if self.desktop.is_focused() {
            classes.push("focused");
        }
        match self.desktop.occupancy {
            Occupancy::Free => {}
            Occupancy::Occupied => classes.push("occupied"),
            Occupancy::Urgent => {
                classes.push("occupied");
                classes.push("urgent");
            }
        }
        classes
    }
}

#[derive(Debug)]
pub struct DesktopStrip {
    /// Configured monitor; the first reported monitor when `None`
    preferred: Option<String>,
    hide_on_fullscreen: bool,
    displayed: Option<String>,
    slots: Vec<Slot>,
    /// Desktops on monitors before the displayed one
    offset: usize,
    visible: bool,
    stale: bool,
    revision: u64,
}

impl DesktopStrip {
    pub fn new(preferred: Option<String>, hide_on_fullscreen: bool) -> Self {
        Self {
            preferred,
            hide_on_fullscreen,
            displayed: None,
            slots: Vec::new(),
            offset: 0,
            visible: true,
            stale: true,
            revision: 0,
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn monitor(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Mark the strip as (not) reflecting a live connection
    ///
    /// Returns `true` if the flag flipped.
    pub fn set_stale(&mut self, stale: bool) -> bool {
        if self.stale == stale {
            return false;
        }
        self.stale = stale;
        self.revision += 1;
        true
    }

    /// Bring the strip up to date with a published report
    ///
    /// Returns `true` if anything visible changed.
    pub fn apply(&mut self, report: &Report, changes: &[ReportChange]) -> bool {
        let target = match &self.preferred {
            Some(name) => report.monitor(name),
            None => report.monitors.first(),
        };
        let next = self.revision + 1;
        let mut dirty = false;

        match target {
            None => {
                if self.displayed.take().is_some() || !self.slots.is_empty() {
                    tracing::debug!("Displayed monitor is gone, clearing strip");
                    self.slots.clear();
                    dirty = true;
                }
            }
            Some(monitor) if self.displayed.as_deref() == Some(monitor.name.as_str()) => {
                dirty |= self.follow_changes(&monitor.name, changes, next);
                if !self.matches(monitor) {
                    tracing::warn!(
                        monitor = %monitor.name,
                        "Desktop strip diverged from report, resyncing"
                    );
                    dirty |= self.sync(monitor, next);
                }
            }
            Some(monitor) => {
                tracing::info!(monitor = %monitor.name, "Showing desktops of monitor");
                self.displayed = Some(monitor.name.clone());
                self.sync(monitor, next);
                dirty = true;
            }
        }

        let offset = target.map_or(0, |monitor| {
            report
                .monitors
                .iter()
                .take_while(|m| m.name != monitor.name)
                .map(|m| m.desktops.len())
                .sum()
        });
        self.offset = offset;

        let fullscreen = target
            .and_then(Monitor::focus_detail)
            .is_some_and(|detail| detail.state == Some(NodeState::Fullscreen));
        let visible = !(self.hide_on_fullscreen && fullscreen);
        if visible != self.visible {
            self.visible = visible;
            dirty = true;
        }

        if dirty {
            self.revision = next;
        }
        dirty
    }

    /// bspwm desktop index (`^N`) for a 1-based slot, if the slot exists
    pub fn click_target(&self, slot: usize) -> Option<usize> {
        if slot == 0 || slot > self.slots.len() {
            return None;
        }
        Some(self.offset + slot)
    }

    fn follow_changes(&mut self, monitor: &str, changes: &[ReportChange], revision: u64) -> bool {
        let mut dirty = false;
        for change in changes {
            match change {
                ReportChange::DesktopChanged {
                    monitor: m,
                    desktop,
                } if m == monitor => {
                    if let Some(slot) = self.slots.get_mut(desktop.index.wrapping_sub(1)) {
                        slot.desktop = desktop.clone();
                        slot.revision = revision;
                        dirty = true;
                    }
                }
                ReportChange::DesktopAdded {
                    monitor: m,
                    desktop,
                } if m == monitor => {
                    self.slots.push(Slot {
                        desktop: desktop.clone(),
                        revision,
                    });
                    dirty = true;
                }
                ReportChange::DesktopRemoved { monitor: m, slot } if m == monitor => {
                    if *slot == self.slots.len() {
                        self.slots.pop();
                        dirty = true;
                    }
                }
                _ => {}
            }
        }
        dirty
    }

    /// Rebuild against `monitor`, reusing slots by position
    fn sync(&mut self, monitor: &Monitor, revision: u64) -> bool {
        let plan = SlotPlan::new(self.slots.len(), monitor.desktops.len());
        let mut dirty = plan.append > 0 || plan.remove > 0;

        for (slot, desktop) in self.slots.iter_mut().zip(&monitor.desktops) {
            if slot.desktop != *desktop {
                slot.desktop = desktop.clone();
                slot.revision = revision;
                dirty = true;
            }
        }
        self.slots.truncate(plan.keep);
        self.slots
            .extend(monitor.desktops[plan.keep..].iter().map(|desktop| Slot {
                desktop: desktop.clone(),
                revision,
            }));
        dirty
    }

    fn matches(&self, monitor: &Monitor) -> bool {
        self.slots.len() == monitor.desktops.len()
            && self
                .slots
                .iter()
                .zip(&monitor.desktops)
                .all(|(slot, desktop)| slot.desktop == *desktop)
    }
}
