//! Check outcomes and their aggregation.

use std::fmt;

/// Outcome of one check.
///
/// Ordered from best to worst, so the aggregate of a report is the maximum.
/// `Fail` means the check ran and the device failed it; `Error` means the
/// check itself could not be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Ok,
    Warning,
    Fail,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::Warning => f.write_str("WARNING"),
            Status::Fail => f.write_str("FAIL"),
            Status::Error => f.write_str("ERROR"),
        }
    }
}

/// How serious a non-OK outcome is. Decides the exit flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Minor => f.write_str("minor"),
            Severity::Major => f.write_str("major"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// The outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// What was checked, e.g. `synthesizer lock of board A`.
    pub action: String,
    pub status: Status,
    pub severity: Severity,
    pub message: String,
    /// Whether the caller should stop after this item.
    pub exit: bool,
    /// What to do about it. Empty only for OK items.
    pub resolution: String,
}

impl Item {
    pub fn ok(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            status: Status::Ok,
            severity: Severity::Info,
            message: message.into(),
            exit: false,
            resolution: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.action, self.message)?;
        if !self.is_ok() {
            for line in self.resolution.lines() {
                write!(f, "\n[RESOLUTION] {line}")?;
            }
        }
        Ok(())
    }
}

/// An ordered list of check outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    items: Vec<Item>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Append every item of `other`, keeping order.
    pub fn merge(&mut self, other: Report) {
        self.items.extend(other.items);
    }

    /// The worst status of any item, `Ok` for an empty report.
    pub fn status(&self) -> Status {
        self.items
            .iter()
            .map(|i| i.status)
            .max()
            .unwrap_or(Status::Ok)
    }

    /// True if any item asks the caller to stop.
    pub fn exit(&self) -> bool {
        self.items.iter().any(|i| i.exit)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items that are not OK.
    pub fn problems(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|i| !i.is_ok())
    }
}

impl From<Item> for Report {
    fn from(item: Item) -> Self {
        Self { items: vec![item] }
    }
}

impl FromIterator<Item> for Report {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Report {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Report {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, item) in self.items.iter().enumerate() {
            if n > 0 {
                writeln!(f)?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(action: &str, status: Status, exit: bool) -> Item {
        Item {
            action: action.into(),
            status,
            severity: Severity::Major,
            message: "bad".into(),
            exit,
            resolution: "Check your hardware\nThen try again".into(),
        }
    }

    #[test]
    fn empty_report_is_ok() {
        let report = Report::new();
        assert_eq!(report.status(), Status::Ok);
        assert!(!report.exit());
        assert_eq!(report.to_string(), "");
    }

    #[test]
    fn aggregate_is_worst_status() {
        let report: Report = [
            Item::ok("a", "fine"),
            failed("b", Status::Warning, false),
            failed("c", Status::Fail, true),
            Item::ok("d", "fine"),
        ]
        .into_iter()
        .collect();
        assert_eq!(report.status(), Status::Fail);
        assert!(report.exit());
        assert_eq!(report.problems().count(), 2);

        let mut with_error = report.clone();
        with_error.push(failed("e", Status::Error, false));
        assert_eq!(with_error.status(), Status::Error);
    }

    #[test]
    fn rendering() {
        let mut report = Report::from(Item::ok("synthesizer lock of board A", "locked"));
        report.push(failed("IF level of board B", Status::Warning, false));
        assert_eq!(
            report.to_string(),
            "[OK] synthesizer lock of board A: locked\n\
             [WARNING] IF level of board B: bad\n\
             [RESOLUTION] Check your hardware\n\
             [RESOLUTION] Then try again"
        );
    }

    #[test]
    fn merge_keeps_order() {
        let mut first = Report::from(Item::ok("a", ""));
        first.merge(Report::from(Item::ok("b", "")));
        let actions: Vec<_> = first.iter().map(|i| i.action.as_str()).collect();
        assert_eq!(actions, ["a", "b"]);
    }
}
