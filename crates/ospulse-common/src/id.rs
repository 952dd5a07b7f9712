use uuid::Uuid;

/// Generate a correlation id for one scheduled task invocation.
///
/// Every record written by a task run carries this id in its `task_id`
/// field so samples can be traced back to the invocation that produced
/// them.
pub fn next_task_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_next_task_id_returns_unique_ids() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = next_task_id();
            assert!(!id.is_empty());
            assert!(ids.insert(id), "Duplicate task id generated");
        }
    }

    #[test]
    fn test_next_task_id_is_hyphenated_uuid() {
        let id = next_task_id();
        assert_eq!(id.len(), 36);
        assert_eq!(id.matches('-').count(), 4);
    }
}
