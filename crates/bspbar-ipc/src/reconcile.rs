//! Report reconciliation
//!
//! Compares consecutive reports and produces the minimal ordered list of
//! changes. Desktops are identified positionally: slot `n` of monitor
//! `name` is the same slot across reports, whatever it is called. When a
//! monitor's desktop count changes, slots are appended at or removed from
//! the tail; existing slots are never reordered.
//!
//! Change order within one reconciliation:
//!
//! 1. `MonitorRemoved` for monitors that disappeared
//! 2. per monitor, in the new report's order: `MonitorAdded`, then
//!    `DesktopChanged` for common slots, `DesktopAdded` (ascending) or
//!    `DesktopRemoved` (descending, from the tail)
//! 3. `MonitorsReordered` if monitors present in both reports swapped places
//! 4. `FocusedMonitorChanged`

use serde::Serialize;

use super::types::{Desktop, Monitor, Report};

/// A single difference between two reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportChange {
    MonitorAdded {
        monitor: String,
        position: usize,
    },
    MonitorRemoved {
        monitor: String,
    },
    DesktopAdded {
        monitor: String,
        desktop: Desktop,
    },
    DesktopRemoved {
        monitor: String,
        /// 1-based slot that was removed
        slot: usize,
    },
    /// Name, occupancy, focus, layout or state of a slot differs
    DesktopChanged {
        monitor: String,
        desktop: Desktop,
    },
    /// Monitors kept from the previous report changed relative order
    MonitorsReordered {
        /// Monitor names in the new report's order
        order: Vec<String>,
    },
    FocusedMonitorChanged {
        from: Option<String>,
        to: Option<String>,
    },
}

/// Structural edit needed to bring a slot list to a new length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    /// Slots kept in place (and possibly updated)
    pub keep: usize,
    /// Slots to append at the tail
    pub append: usize,
    /// Slots to drop from the tail
    pub remove: usize,
}

impl SlotPlan {
    pub fn new(current: usize, wanted: usize) -> Self {
        Self {
            keep: current.min(wanted),
            append: wanted.saturating_sub(current),
            remove: current.saturating_sub(wanted),
        }
    }
}

/// Diff `next` against `previous` (none on the first report)
pub fn reconcile(previous: Option<&Report>, next: &Report) -> Vec<ReportChange> {
    let empty = Report::default();
    let previous = previous.unwrap_or(&empty);

    if previous == next {
        return Vec::new();
    }

    let mut changes = Vec::new();

    for old in &previous.monitors {
        if next.monitor(&old.name).is_none() {
            changes.push(ReportChange::MonitorRemoved {
                monitor: old.name.clone(),
            });
        }
    }

    for (position, monitor) in next.monitors.iter().enumerate() {
        match previous.monitor(&monitor.name) {
            Some(old) => diff_desktops(old, monitor, &mut changes),
            None => {
                changes.push(ReportChange::MonitorAdded {
                    monitor: monitor.name.clone(),
                    position,
                });
                diff_desktops(&Monitor::new(monitor.name.clone(), false), monitor, &mut changes);
            }
        }
    }

    let kept_before = previous
        .monitors
        .iter()
        .filter(|m| next.monitor(&m.name).is_some())
        .map(|m| m.name.as_str());
    let kept_after = next
        .monitors
        .iter()
        .filter(|m| previous.monitor(&m.name).is_some())
        .map(|m| m.name.as_str());
    if !kept_before.eq(kept_after) {
        changes.push(ReportChange::MonitorsReordered {
            order: next.monitors.iter().map(|m| m.name.clone()).collect(),
        });
    }

    let from = previous.focused_monitor().map(|m| m.name.clone());
    let to = next.focused_monitor().map(|m| m.name.clone());
    if from != to {
        changes.push(ReportChange::FocusedMonitorChanged { from, to });
    }

    changes
}

fn diff_desktops(old: &Monitor, new: &Monitor, changes: &mut Vec<ReportChange>) {
    let plan = SlotPlan::new(old.desktops.len(), new.desktops.len());

    for (before, after) in old.desktops.iter().zip(&new.desktops) {
        if before != after {
            changes.push(ReportChange::DesktopChanged {
                monitor: new.name.clone(),
                desktop: after.clone(),
            });
        }
    }

    for desktop in new.desktops.iter().skip(plan.keep) {
        changes.push(ReportChange::DesktopAdded {
            monitor: new.name.clone(),
            desktop: desktop.clone(),
        });
    }

    for slot in (plan.keep + 1..=plan.keep + plan.remove).rev() {
        changes.push(ReportChange::DesktopRemoved {
            monitor: new.name.clone(),
            slot,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_report_line;

    fn report(line: &str) -> Report {
        parse_report_line(line.as_bytes()).unwrap().report
    }

    #[test]
    fn test_identical_reports_yield_nothing() {
        let a = report("WMeDP-1:o1:F2:LT:TT:mHDMI-1:o3");
        let b = report("WMeDP-1:o1:F2:LT:TT:mHDMI-1:o3");
        assert!(reconcile(Some(&a), &b).is_empty());
        assert!(reconcile(Some(&a), &a).is_empty());
    }

    #[test]
    fn test_first_report_adds_everything() {
        let next = report("WMeDP-1:o1:F2");
        let changes = reconcile(None, &next);

        assert_eq!(changes.len(), 4);
        assert_eq!(
            changes[0],
            ReportChange::MonitorAdded {
                monitor: "eDP-1".into(),
                position: 0
            }
        );
        assert!(matches!(
            &changes[1],
            ReportChange::DesktopAdded { desktop, .. } if desktop.index == 1
        ));
        assert!(matches!(
            &changes[2],
            ReportChange::DesktopAdded { desktop, .. } if desktop.index == 2
        ));
        assert_eq!(
            changes[3],
            ReportChange::FocusedMonitorChanged {
                from: None,
                to: Some("eDP-1".into())
            }
        );
    }

    #[test]
    fn test_focus_move_changes_two_slots() {
        let a = report("WMeDP-1:o1:F2:f3");
        let b = report("WMeDP-1:o1:f2:F3");
        let changes = reconcile(Some(&a), &b);

        let slots: Vec<usize> = changes
            .iter()
            .map(|c| match c {
                ReportChange::DesktopChanged { desktop, .. } => desktop.index,
                other => panic!("unexpected change {:?}", other),
            })
            .collect();
        assert_eq!(slots, vec![2, 3]);
    }

    #[test]
    fn test_layout_change_is_desktop_change() {
        let a = report("WMeDP-1:F1:LT:TT");
        let b = report("WMeDP-1:F1:LM:TT");
        let changes = reconcile(Some(&a), &b);
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], ReportChange::DesktopChanged { desktop, .. } if desktop.index == 1));
    }

    #[test]
    fn test_growth_appends_at_tail_only() {
        let a = report("WMeDP-1:F1:o2");
        let b = report("WMeDP-1:F1:o2:f3:f4");
        let changes = reconcile(Some(&a), &b);

        assert_eq!(changes.len(), 2);
        for (change, expected) in changes.iter().zip([3, 4]) {
            match change {
                ReportChange::DesktopAdded { desktop, .. } => assert_eq!(desktop.index, expected),
                other => panic!("expected append, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_rename_in_place_does_not_reorder() {
        // Inserting a desktop in the middle shows up as in-place changes
        // plus one tail append, never a move.
        let a = report("WMeDP-1:Fa:oc");
        let b = report("WMeDP-1:Fa:ob:oc");
        let changes = reconcile(Some(&a), &b);

        assert_eq!(changes.len(), 2);
        assert!(matches!(
            &changes[0],
            ReportChange::DesktopChanged { desktop, .. } if desktop.index == 2 && desktop.name == "b"
        ));
        assert!(matches!(
            &changes[1],
            ReportChange::DesktopAdded { desktop, .. } if desktop.index == 3 && desktop.name == "c"
        ));
    }

    #[test]
    fn test_shrink_removes_from_tail_descending() {
        let a = report("WMeDP-1:F1:o2:f3:f4");
        let b = report("WMeDP-1:F1:o2");
        let changes = reconcile(Some(&a), &b);
        assert_eq!(
            changes,
            vec![
                ReportChange::DesktopRemoved {
                    monitor: "eDP-1".into(),
                    slot: 4
                },
                ReportChange::DesktopRemoved {
                    monitor: "eDP-1".into(),
                    slot: 3
                },
            ]
        );
    }

    #[test]
    fn test_monitor_unplug_and_focus_change() {
        let a = report("WmeDP-1:o1:MHDMI-1:F2");
        let b = report("WMeDP-1:O1");
        let changes = reconcile(Some(&a), &b);

        assert_eq!(
            changes[0],
            ReportChange::MonitorRemoved {
                monitor: "HDMI-1".into()
            }
        );
        assert!(matches!(&changes[1], ReportChange::DesktopChanged { monitor, .. } if monitor == "eDP-1"));
        assert_eq!(
            changes[2],
            ReportChange::FocusedMonitorChanged {
                from: Some("HDMI-1".into()),
                to: Some("eDP-1".into())
            }
        );
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_monitor_reorder_is_reported() {
        let a = report("WMeDP-1:F1:mHDMI-1:o2");
        let b = report("WmHDMI-1:o2:MeDP-1:F1");
        assert_eq!(
            reconcile(Some(&a), &b),
            vec![ReportChange::MonitorsReordered {
                order: vec!["HDMI-1".into(), "eDP-1".into()]
            }]
        );
    }

    #[test]
    fn test_plugging_a_monitor_is_not_a_reorder() {
        let a = report("WMeDP-1:F1");
        let b = report("WmDP-2:o1:MeDP-1:F1");
        let changes = reconcile(Some(&a), &b);
        assert!(matches!(&changes[0], ReportChange::MonitorAdded { position: 0, .. }));
        assert!(!changes
            .iter()
            .any(|c| matches!(c, ReportChange::MonitorsReordered { .. })));
    }

    #[test]
    fn test_slot_plan() {
        assert_eq!(
            SlotPlan::new(2, 5),
            SlotPlan {
                keep: 2,
                append: 3,
                remove: 0
            }
        );
        assert_eq!(
            SlotPlan::new(4, 1),
            SlotPlan {
                keep: 1,
                append: 0,
                remove: 3
            }
        );
        assert_eq!(
            SlotPlan::new(3, 3),
            SlotPlan {
                keep: 3,
                append: 0,
                remove: 0
            }
        );
    }
}
