use crate::RecentTest;

pub const RECENT_TESTS_LIMIT: usize = 6;

/// Puts `entry` first, drops any older entry with the same test id and keeps
/// at most [`RECENT_TESTS_LIMIT`] entries.
pub fn push_recent(list: Vec<RecentTest>, entry: RecentTest) -> Vec<RecentTest> {
    let mut next = Vec::with_capacity(RECENT_TESTS_LIMIT);
    let test_id = entry.test_id.clone();
    next.push(entry);
    next.extend(list.into_iter().filter(|r| r.test_id != test_id));
    next.truncate(RECENT_TESTS_LIMIT);
    next
}

#[cfg(test)]
mod tests {
    use super::{push_recent, RECENT_TESTS_LIMIT};
    use crate::RecentTest;

    fn entry(id: &str) -> RecentTest {
        RecentTest {
            test_id: id.to_string(),
            url: None,
            title: None,
            run_at: None,
        }
    }

    #[test]
    fn newest_first_without_duplicates() {
        let list = push_recent(vec![entry("a"), entry("b")], entry("b"));
        let ids: Vec<_> = list.iter().map(|r| r.test_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn capped_at_limit() {
        let mut list = Vec::new();
        for i in 0..10 {
            list = push_recent(list, entry(&i.to_string()));
        }
        assert_eq!(list.len(), RECENT_TESTS_LIMIT);
        assert_eq!(list[0].test_id, "9");
        assert_eq!(list[RECENT_TESTS_LIMIT - 1].test_id, "4");
    }
}
