//! Worker target parsing.

/// Marker distinguishing a queue group reference from a literal queue name.
pub const GROUP_MARKER: char = '@';

/// What a worker was told to drain: one concrete queue, or a queue group
/// whose member is chosen per cycle by the selection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueTarget {
    /// A plain queue, drained directly.
    Literal(String),
    /// A queue group, written with a leading `@` as in `@mailings`.
    Group(String),
}

impl QueueTarget {
    /// Parses a target string. Anything starting with `@` names a group;
    /// everything else is a literal queue name.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(GROUP_MARKER) {
            Some(group) => QueueTarget::Group(group.to_string()),
            None => QueueTarget::Literal(raw.to_string()),
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, QueueTarget::Group(_))
    }
}

impl std::fmt::Display for QueueTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueTarget::Literal(name) => write!(f, "{}", name),
            QueueTarget::Group(group) => write!(f, "{}{}", GROUP_MARKER, group),
        }
    }
}
