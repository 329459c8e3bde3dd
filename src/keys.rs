//! Store key layout shared by the registry, the policies, and the scheduler.
//!
//! All scheduling state lives in the external store under these keys. The
//! payload list and the global queue set mirror the conventional
//! `queue:{name}` / `queues` layout; everything else is scheduling metadata
//! keyed so that retiring a queue deletes every record for it.

/// Set of every queue name known to the store.
pub const QUEUES: &str = "queues";

/// Hash mapping a queue name to its owning group (the lookup record read by
/// the closing invariant).
pub const GROUP_LOOKUP: &str = "queue-groups";

/// FIFO list of freshly activated queue names consumed by quick start.
pub const NEW_QUEUES: &str = "queue-new";

/// List holding a queue's payloads.
pub fn queue(name: &str) -> String {
    format!("queue:{}", name)
}

/// Set of a group's active member queues.
pub fn group_members(group: &str) -> String {
    format!("queue-group:{}", group)
}

/// Hash mapping a group's queues to their work-done counters.
pub fn group_work(group: &str) -> String {
    format!("queue-work:{}", group)
}

/// Hash mapping a group's queues to their JSON metadata records.
pub fn group_meta(group: &str) -> String {
    format!("queue-meta:{}", group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(queue("mailer-42"), "queue:mailer-42");
        assert_eq!(group_members("mailings"), "queue-group:mailings");
        assert_eq!(group_work("mailings"), "queue-work:mailings");
        assert_eq!(group_meta("mailings"), "queue-meta:mailings");
    }
}
