use std::collections::HashMap;

use crate::api::ResultRow;

/// Rows of one forum thread, with the thread metadata of its first row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadGroup {
    pub thread_id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub cover_image: Option<String>,
    pub description: Option<String>,
    pub links: Vec<ResultRow>,
}

impl ThreadGroup {
    fn seeded_from(row: &ResultRow) -> Self {
        Self {
            thread_id: row.thread_id.clone(),
            title: row.thread_title.clone(),
            url: row.thread_url.clone(),
            category: row.forum_category.clone(),
            cover_image: row.cover_image.clone(),
            description: row.description.clone(),
            links: Vec::new(),
        }
    }

    /// True when the group should render the "no cover" placeholder.
    pub fn lacks_cover(&self) -> bool {
        self.cover_image.as_deref().map_or(true, str::is_empty)
    }
}

/// Groups rows by `thread_id`.
///
/// Groups come out in the order their thread first appears and keep their
/// rows in input order. Thread metadata is taken from the first row seen for
/// each thread; later rows never overwrite it.
pub fn group(rows: &[ResultRow]) -> Vec<ThreadGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<ThreadGroup> = Vec::new();

    for row in rows {
        let slot = *index.entry(row.thread_id.as_str()).or_insert_with(|| {
            groups.push(ThreadGroup::seeded_from(row));
            groups.len() - 1
        });
        groups[slot].links.push(row.clone());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(thread: &str, link: &str) -> ResultRow {
        ResultRow {
            thread_id: thread.into(),
            thread_title: Some(format!("Thread {thread}")),
            link: link.into(),
            ..ResultRow::default()
        }
    }

    #[test]
    fn empty_input_gives_no_groups() {
        assert!(group(&[]).is_empty());
    }

    #[test]
    fn first_seen_thread_order_wins() {
        let rows = vec![row("B", "b1"), row("A", "a1"), row("B", "b2")];
        let groups = group(&rows);
        let ids: Vec<_> = groups.iter().map(|g| g.thread_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A"]);
        let b_links: Vec<_> = groups[0].links.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(b_links, vec!["b1", "b2"]);
    }

    #[test]
    fn every_row_lands_in_exactly_one_group() {
        let rows: Vec<_> = (0..25)
            .map(|i| row(&format!("t{}", i % 4), &format!("link{i}")))
            .collect();
        let groups = group(&rows);
        let total: usize = groups.iter().map(|g| g.links.len()).sum();
        assert_eq!(total, rows.len());
        let mut seen: Vec<_> = groups
            .iter()
            .flat_map(|g| g.links.iter().map(|r| r.link.clone()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), rows.len());
    }

    #[test]
    fn metadata_comes_from_first_row() {
        let mut first = row("T", "one");
        first.forum_category = Some("Manga".into());
        first.cover_image = None;
        let mut second = row("T", "two");
        second.thread_title = Some("Renamed".into());
        second.forum_category = Some("Anime".into());
        second.cover_image = Some("covers/late.jpg".into());

        let groups = group(&[first, second]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title.as_deref(), Some("Thread T"));
        assert_eq!(groups[0].category.as_deref(), Some("Manga"));
        assert_eq!(groups[0].cover_image, None);
        assert!(groups[0].lacks_cover());
    }

    #[test]
    fn reordering_within_a_thread_keeps_group_order_and_metadata() {
        let mut b1 = row("B", "b1");
        b1.forum_category = Some("Manga".into());
        let mut b2 = row("B", "b2");
        b2.forum_category = Some("Manga".into());
        let a1 = row("A", "a1");
        let mut b3 = row("B", "b3");
        b3.forum_category = Some("Manga".into());

        let original = group(&[b1.clone(), a1.clone(), b2.clone(), b3.clone()]);
        let permuted = group(&[b1, a1, b3, b2]);

        let ids = |groups: &[ThreadGroup]| -> Vec<String> {
            groups.iter().map(|g| g.thread_id.clone()).collect()
        };
        assert_eq!(ids(&original), ids(&permuted));
        for (left, right) in original.iter().zip(&permuted) {
            assert_eq!(left.title, right.title);
            assert_eq!(left.category, right.category);
            assert_eq!(left.cover_image, right.cover_image);
            assert_eq!(left.links.len(), right.links.len());
        }
        let links: Vec<_> = permuted[0].links.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(links, vec!["b1", "b3", "b2"]);
    }

    #[test]
    fn cover_value_passes_through_unmodified() {
        let mut only = row("T", "one");
        only.cover_image = Some(String::new());
        let groups = group(&[only]);
        assert_eq!(groups[0].cover_image.as_deref(), Some(""));
        assert!(groups[0].lacks_cover());
    }
}
