//! Desktop/monitor model built from bspwm reports
//!
//! A `Report` is one full snapshot of the window manager's monitors and
//! their desktops. Reports are immutable once published; consumers get
//! them behind an `Arc`.

use serde::Serialize;

/// Whether a desktop holds windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    Free,
    Occupied,
    Urgent,
}

/// Tiling layout of the focused desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    Tiling,
    Monocle,
}

/// State of the focused node on the focused desktop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Tiled,
    PseudoTiled,
    Floating,
    Fullscreen,
    Sticky,
}

/// Extra state only carried by a focused desktop
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FocusDetail {
    pub layout: Option<Layout>,
    pub state: Option<NodeState>,
}

/// A desktop within a monitor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Desktop {
    /// 1-based position within its monitor
    pub index: usize,
    pub name: String,
    pub occupancy: Occupancy,
    /// Present exactly when the desktop is the monitor's focused desktop
    pub focus: Option<FocusDetail>,
}

impl Desktop {
    pub fn is_focused(&self) -> bool {
        self.focus.is_some()
    }
}

/// A monitor and its ordered desktops
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Monitor {
    pub name: String,
    pub has_focus: bool,
    /// Index into `desktops` of the focused desktop
    pub focused_desktop: Option<usize>,
    pub desktops: Vec<Desktop>,
}

impl Monitor {
    pub fn new(name: impl Into<String>, has_focus: bool) -> Self {
        Self {
            name: name.into(),
            has_focus,
            focused_desktop: None,
            desktops: Vec::new(),
        }
    }

    /// The monitor's focused desktop, if one was reported
    pub fn focused_desktop(&self) -> Option<&Desktop> {
        self.focused_desktop.and_then(|i| self.desktops.get(i))
    }

    /// The focused desktop's detail, if any
    pub fn focus_detail(&self) -> Option<&FocusDetail> {
        self.focused_desktop().and_then(|d| d.focus.as_ref())
    }
}

/// One full snapshot of the window manager state
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Report {
    pub monitors: Vec<Monitor>,
}

impl Report {
    /// The monitor holding input focus
    pub fn focused_monitor(&self) -> Option<&Monitor> {
        self.monitors.iter().find(|m| m.has_focus)
    }

    pub fn monitor(&self, name: &str) -> Option<&Monitor> {
        self.monitors.iter().find(|m| m.name == name)
    }

    /// Total number of desktops across all monitors
    pub fn desktop_count(&self) -> usize {
        self.monitors.iter().map(|m| m.desktops.len()).sum()
    }
}
