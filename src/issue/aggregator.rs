//! Pure aggregation over fetched feed rows: vote tallies, comment counts,
//! filtering, and sorting. Nothing here touches the database; the service
//! fetches raw rows and hands them over.

use std::collections::BTreeSet;

use uuid::Uuid;

use super::model::{
    CommentsCountMap, FeedFilters, FeedSort, IssueRecord, VoteBreakdown, VoteCounts, VoteMap,
    VoteRow,
};
use crate::district::model::DistrictLevel;

/// Sum vote values into a net score per issue and count the +1/-1 sides
/// separately. Every listed issue gets an entry, zero votes included.
/// Vote rows for unknown issue ids are ignored.
pub fn tally_votes(issue_ids: &[Uuid], votes: &[VoteRow]) -> (VoteMap, VoteBreakdown) {
    let mut net: VoteMap = VoteMap::with_capacity(issue_ids.len());
    let mut breakdown: VoteBreakdown = VoteBreakdown::with_capacity(issue_ids.len());
    for id in issue_ids {
        net.insert(*id, 0);
        breakdown.insert(*id, VoteCounts::default());
    }

    for vote in votes {
        let total = match net.get_mut(&vote.issue_id) {
            Some(total) => total,
            None => continue,
        };
        *total += i64::from(vote.value);
        if let Some(counts) = breakdown.get_mut(&vote.issue_id) {
            if vote.value == 1 {
                counts.upvotes += 1;
            }
            if vote.value == -1 {
                counts.downvotes += 1;
            }
        }
    }

    (net, breakdown)
}

/// Count comments per issue. Issues with no comments are present with 0,
/// and comment rows for unknown issue ids are ignored.
pub fn count_comments(issue_ids: &[Uuid], comment_issue_ids: &[Uuid]) -> CommentsCountMap {
    let mut counts: CommentsCountMap = CommentsCountMap::with_capacity(issue_ids.len());
    for id in issue_ids {
        counts.insert(*id, 0);
    }
    for issue_id in comment_issue_ids {
        if let Some(count) = counts.get_mut(issue_id) {
            *count += 1;
        }
    }
    counts
}

/// Whether an issue passes every active filter.
///
/// The level filter matches when the issue is tagged with that level OR
/// carries a non-empty district value for it. A non-empty search term
/// decides the outcome by itself once the other filters have passed.
pub fn matches_filters(issue: &IssueRecord, filters: &FeedFilters) -> bool {
    if let Some(issue_type) = &filters.issue_type {
        if issue.issue_type != *issue_type {
            return false;
        }
    }

    if let Some(level) = filters.government_level {
        let matches_level = issue.government_level.as_deref() == Some(level.as_str());
        let has_district_scope = issue.district_for(level).map_or(false, |d| !d.is_empty());
        if !matches_level && !has_district_scope {
            return false;
        }
    }

    if let (Some(district), Some(level)) = (&filters.district, filters.government_level) {
        if issue.district_for(level) != Some(district.as_str()) {
            return false;
        }
    }

    if let Some(role) = &filters.author_role {
        if issue.author_role.as_deref() != Some(role.as_str()) {
            return false;
        }
    }

    let search = filters.search.as_deref().unwrap_or("").trim();
    if !search.is_empty() {
        let query = search.to_lowercase();
        let contains = |field: Option<&str>| -> bool {
            field.map_or(false, |value| value.to_lowercase().contains(&query))
        };
        return contains(issue.address.as_deref())
            || contains(Some(&issue.narrative))
            || contains(Some(&issue.title))
            || contains(issue.author_username.as_deref());
    }

    true
}

/// Controversy score: absolute distance between upvotes and downvotes.
/// Lower means more evenly contested; an issue with no recorded breakdown
/// sorts last.
pub fn controversy_score(breakdown: &VoteBreakdown, issue_id: Uuid) -> i64 {
    breakdown
        .get(&issue_id)
        .map(|counts| (counts.upvotes - counts.downvotes).abs())
        .unwrap_or(i64::MAX)
}

/// Sort issues in place by the selected mode.
pub fn sort_issues(
    issues: &mut [IssueRecord],
    sort: FeedSort,
    votes: &VoteMap,
    breakdown: &VoteBreakdown,
) {
    match sort {
        FeedSort::New => issues.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        FeedSort::Popular => issues.sort_by_key(|issue| {
            std::cmp::Reverse(votes.get(&issue.id).copied().unwrap_or(0))
        }),
        FeedSort::Controversial => {
            issues.sort_by_key(|issue| controversy_score(breakdown, issue.id))
        }
    }
}

/// The distinct issue types present, sorted lexicographically.
pub fn available_types(issues: &[IssueRecord]) -> Vec<String> {
    issues
        .iter()
        .map(|issue| issue.issue_type.clone())
        .filter(|issue_type| !issue_type.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The distinct district values present for the selected level, sorted
/// lexicographically. With no level selected the municipal field is used.
pub fn available_districts(issues: &[IssueRecord], level: Option<DistrictLevel>) -> Vec<String> {
    issues
        .iter()
        .filter_map(|issue| match level {
            Some(level) => issue.district_for(level),
            None => issue.municipal_district.as_deref(),
        })
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Everything the feed needs, computed from raw rows in one pass: the
/// count maps over all fetched issues, the option lists, and the filtered
/// and sorted issue list.
pub struct FilteredFeed {
    pub issues: Vec<IssueRecord>,
    pub votes: VoteMap,
    pub vote_breakdown: VoteBreakdown,
    pub comments_count: CommentsCountMap,
    pub available_types: Vec<String>,
    pub available_districts: Vec<String>,
}

pub fn aggregate(
    issues: Vec<IssueRecord>,
    votes: &[VoteRow],
    comment_issue_ids: &[Uuid],
    filters: &FeedFilters,
    sort: FeedSort,
) -> FilteredFeed {
    let issue_ids: Vec<Uuid> = issues.iter().map(|issue| issue.id).collect();
    let (vote_map, vote_breakdown) = tally_votes(&issue_ids, votes);
    let comments_count = count_comments(&issue_ids, comment_issue_ids);

    let types = available_types(&issues);
    let districts = available_districts(&issues, filters.government_level);

    let mut filtered: Vec<IssueRecord> = issues
        .into_iter()
        .filter(|issue| matches_filters(issue, filters))
        .collect();
    sort_issues(&mut filtered, sort, &vote_map, &vote_breakdown);

    FilteredFeed {
        issues: filtered,
        votes: vote_map,
        vote_breakdown,
        comments_count,
        available_types: types,
        available_districts: districts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn issue(id: Uuid) -> IssueRecord {
        IssueRecord {
            id,
            title: "Pothole on Saint-Denis".to_string(),
            issue_type: "Problem".to_string(),
            narrative: "The intersection floods every spring.".to_string(),
            media_url: None,
            media_type: None,
            author_id: Uuid::new_v4(),
            topic: None,
            government_level: None,
            federal_district: None,
            provincial_district: None,
            municipal_district: None,
            location_lat: None,
            location_lng: None,
            address: None,
            created_at: Utc::now(),
            author_username: Some("marie".to_string()),
            author_role: Some("resident".to_string()),
            author_avatar_url: None,
            author_city: None,
            author_province: None,
        }
    }

    fn vote(issue_id: Uuid, value: i16) -> VoteRow {
        VoteRow { issue_id, value }
    }

    #[test]
    fn net_score_equals_upvotes_minus_downvotes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let votes = vec![
            vote(a, 1),
            vote(a, 1),
            vote(a, -1),
            vote(b, -1),
            vote(b, -1),
        ];

        let (net, breakdown) = tally_votes(&[a, b], &votes);

        for id in [a, b] {
            let counts = breakdown[&id];
            assert_eq!(net[&id], counts.upvotes - counts.downvotes);
        }
        assert_eq!(net[&a], 1);
        assert_eq!(net[&b], -2);
        assert_eq!(breakdown[&a], VoteCounts { upvotes: 2, downvotes: 1 });
    }

    #[test]
    fn votes_for_unknown_issues_are_ignored() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let votes = vec![vote(known, 1), vote(unknown, 1), vote(unknown, -1)];

        let (net, breakdown) = tally_votes(&[known], &votes);

        assert_eq!(net.len(), 1);
        assert_eq!(net[&known], 1);
        assert!(!breakdown.contains_key(&unknown));
    }

    #[test]
    fn issues_without_votes_still_have_entries() {
        let voted = Uuid::new_v4();
        let silent = Uuid::new_v4();

        let (net, breakdown) = tally_votes(&[voted, silent], &[vote(voted, 1)]);

        assert_eq!(net[&silent], 0);
        assert_eq!(breakdown[&silent], VoteCounts::default());
    }

    #[test]
    fn zero_comment_issues_are_present_not_absent() {
        let with_comments = Uuid::new_v4();
        let without = Uuid::new_v4();
        let comment_rows = vec![with_comments, with_comments, with_comments];

        let counts = count_comments(&[with_comments, without], &comment_rows);

        assert_eq!(counts[&with_comments], 3);
        assert_eq!(counts[&without], 0);
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn comments_for_unknown_issues_are_ignored() {
        let known = Uuid::new_v4();
        let counts = count_comments(&[known], &[known, Uuid::new_v4()]);
        assert_eq!(counts[&known], 1);
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn type_filter_is_exact() {
        let mut record = issue(Uuid::new_v4());
        record.issue_type = "Idea".to_string();

        let filters = FeedFilters {
            issue_type: Some("Idea".to_string()),
            ..Default::default()
        };
        assert!(matches_filters(&record, &filters));

        let filters = FeedFilters {
            issue_type: Some("Problem".to_string()),
            ..Default::default()
        };
        assert!(!matches_filters(&record, &filters));
    }

    #[test]
    fn level_filter_accepts_level_tag_or_district_scope() {
        // Tagged municipal, no district value.
        let mut tagged = issue(Uuid::new_v4());
        tagged.government_level = Some("municipal".to_string());

        // Tagged federal but carrying a municipal district value; the OR
        // semantics deliberately let this match a municipal filter.
        let mut cross_scoped = issue(Uuid::new_v4());
        cross_scoped.government_level = Some("federal".to_string());
        cross_scoped.municipal_district = Some("Ville-Marie".to_string());

        // Neither tag nor district.
        let unscoped = issue(Uuid::new_v4());

        let filters = FeedFilters {
            government_level: Some(DistrictLevel::Municipal),
            ..Default::default()
        };

        assert!(matches_filters(&tagged, &filters));
        assert!(matches_filters(&cross_scoped, &filters));
        assert!(!matches_filters(&unscoped, &filters));
    }

    #[test]
    fn empty_district_value_does_not_count_as_scope() {
        let mut record = issue(Uuid::new_v4());
        record.municipal_district = Some(String::new());

        let filters = FeedFilters {
            government_level: Some(DistrictLevel::Municipal),
            ..Default::default()
        };
        assert!(!matches_filters(&record, &filters));
    }

    #[test]
    fn district_filter_requires_exact_match_within_level() {
        let mut record = issue(Uuid::new_v4());
        record.government_level = Some("municipal".to_string());
        record.municipal_district = Some("Ville-Marie".to_string());

        let included = FeedFilters {
            government_level: Some(DistrictLevel::Municipal),
            district: Some("Ville-Marie".to_string()),
            ..Default::default()
        };
        assert!(matches_filters(&record, &included));

        let excluded = FeedFilters {
            government_level: Some(DistrictLevel::Municipal),
            district: Some("Outremont".to_string()),
            ..Default::default()
        };
        assert!(!matches_filters(&record, &excluded));
    }

    #[test]
    fn district_filter_without_level_is_inert() {
        let record = issue(Uuid::new_v4());
        let filters = FeedFilters {
            district: Some("Outremont".to_string()),
            ..Default::default()
        };
        assert!(matches_filters(&record, &filters));
    }

    #[test]
    fn author_role_filter_is_exact() {
        let record = issue(Uuid::new_v4());
        let official = FeedFilters {
            author_role: Some("official".to_string()),
            ..Default::default()
        };
        assert!(!matches_filters(&record, &official));

        let resident = FeedFilters {
            author_role: Some("resident".to_string()),
            ..Default::default()
        };
        assert!(matches_filters(&record, &resident));
    }

    #[test]
    fn search_matches_across_fields_case_insensitively() {
        let mut record = issue(Uuid::new_v4());
        record.address = Some("4500 Rue Saint-Denis".to_string());

        for query in ["saint-denis", "FLOODS", "pothole", "MARIE"] {
            let filters = FeedFilters {
                search: Some(query.to_string()),
                ..Default::default()
            };
            assert!(matches_filters(&record, &filters), "query {:?}", query);
        }

        let filters = FeedFilters {
            search: Some("snow removal".to_string()),
            ..Default::default()
        };
        assert!(!matches_filters(&record, &filters));
    }

    #[test]
    fn search_short_circuits_other_checks_once_present() {
        // Passes the type filter but the search term misses every field:
        // the search verdict alone decides.
        let record = issue(Uuid::new_v4());
        let filters = FeedFilters {
            issue_type: Some("Problem".to_string()),
            search: Some("zzz-no-match".to_string()),
            ..Default::default()
        };
        assert!(!matches_filters(&record, &filters));
    }

    #[test]
    fn blank_search_is_no_filter() {
        let record = issue(Uuid::new_v4());
        let filters = FeedFilters {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches_filters(&record, &filters));
    }

    #[test]
    fn sort_new_is_descending_by_creation() {
        let now = Utc::now();
        let mut older = issue(Uuid::new_v4());
        older.created_at = now - Duration::hours(2);
        let mut newer = issue(Uuid::new_v4());
        newer.created_at = now;

        let mut issues = vec![older.clone(), newer.clone()];
        sort_issues(
            &mut issues,
            FeedSort::New,
            &VoteMap::new(),
            &VoteBreakdown::new(),
        );

        assert_eq!(issues[0].id, newer.id);
        assert_eq!(issues[1].id, older.id);
    }

    #[test]
    fn sort_popular_is_descending_by_net_score() {
        let a = issue(Uuid::new_v4());
        let b = issue(Uuid::new_v4());
        let c = issue(Uuid::new_v4());

        let mut net = VoteMap::new();
        net.insert(a.id, -2);
        net.insert(b.id, 5);
        // c has no entry and counts as 0

        let mut issues = vec![a.clone(), b.clone(), c.clone()];
        sort_issues(&mut issues, FeedSort::Popular, &net, &VoteBreakdown::new());

        assert_eq!(issues[0].id, b.id);
        assert_eq!(issues[1].id, c.id);
        assert_eq!(issues[2].id, a.id);
    }

    #[test]
    fn sort_controversial_puts_evenly_contested_first() {
        let a = issue(Uuid::new_v4());
        let b = issue(Uuid::new_v4());

        let mut breakdown = VoteBreakdown::new();
        breakdown.insert(
            a.id,
            VoteCounts {
                upvotes: 10,
                downvotes: 9,
            },
        );
        breakdown.insert(
            b.id,
            VoteCounts {
                upvotes: 5,
                downvotes: 0,
            },
        );

        let mut issues = vec![b.clone(), a.clone()];
        sort_issues(
            &mut issues,
            FeedSort::Controversial,
            &VoteMap::new(),
            &breakdown,
        );

        assert_eq!(issues[0].id, a.id, "abs diff 1 sorts before abs diff 5");
        assert_eq!(issues[1].id, b.id);
    }

    #[test]
    fn missing_breakdown_sorts_last_in_controversial() {
        let contested = issue(Uuid::new_v4());
        let unknown = issue(Uuid::new_v4());

        let mut breakdown = VoteBreakdown::new();
        breakdown.insert(
            contested.id,
            VoteCounts {
                upvotes: 3,
                downvotes: 3,
            },
        );

        let mut issues = vec![unknown.clone(), contested.clone()];
        sort_issues(
            &mut issues,
            FeedSort::Controversial,
            &VoteMap::new(),
            &breakdown,
        );

        assert_eq!(issues[0].id, contested.id);
        assert_eq!(issues[1].id, unknown.id);
    }

    #[test]
    fn option_lists_are_distinct_and_sorted() {
        let mut a = issue(Uuid::new_v4());
        a.issue_type = "Question".to_string();
        a.municipal_district = Some("Ville-Marie".to_string());
        let mut b = issue(Uuid::new_v4());
        b.issue_type = "Idea".to_string();
        b.municipal_district = Some("Outremont".to_string());
        let mut c = issue(Uuid::new_v4());
        c.issue_type = "Idea".to_string();
        c.municipal_district = Some("Ville-Marie".to_string());

        let issues = vec![a, b, c];
        assert_eq!(available_types(&issues), vec!["Idea", "Question"]);
        assert_eq!(
            available_districts(&issues, None),
            vec!["Outremont", "Ville-Marie"]
        );
    }

    #[test]
    fn district_options_follow_selected_level() {
        let mut a = issue(Uuid::new_v4());
        a.federal_district = Some("Toronto—Danforth".to_string());
        a.municipal_district = Some("Ville-Marie".to_string());

        assert_eq!(
            available_districts(&[a.clone()], Some(DistrictLevel::Federal)),
            vec!["Toronto—Danforth"]
        );
        assert_eq!(
            available_districts(&[a], Some(DistrictLevel::Provincial)),
            Vec::<String>::new()
        );
    }

    #[test]
    fn aggregate_end_to_end_district_scenario() {
        // Issue 42: municipal issue in Ville-Marie.
        let mut forty_two = issue(Uuid::new_v4());
        forty_two.government_level = Some("municipal".to_string());
        forty_two.municipal_district = Some("Ville-Marie".to_string());
        let id = forty_two.id;

        let included = aggregate(
            vec![forty_two.clone()],
            &[],
            &[],
            &FeedFilters {
                government_level: Some(DistrictLevel::Municipal),
                district: Some("Ville-Marie".to_string()),
                ..Default::default()
            },
            FeedSort::New,
        );
        assert_eq!(included.issues.len(), 1);
        assert_eq!(included.issues[0].id, id);
        assert_eq!(included.comments_count[&id], 0);
        assert_eq!(included.votes[&id], 0);

        let excluded = aggregate(
            vec![forty_two],
            &[],
            &[],
            &FeedFilters {
                government_level: Some(DistrictLevel::Municipal),
                district: Some("Outremont".to_string()),
                ..Default::default()
            },
            FeedSort::New,
        );
        assert!(excluded.issues.is_empty());
        // Count maps still cover the fetched issue.
        assert_eq!(excluded.votes[&id], 0);
    }

    #[test]
    fn aggregate_keeps_count_maps_over_all_fetched_issues() {
        let mut kept = issue(Uuid::new_v4());
        kept.issue_type = "Idea".to_string();
        let dropped = issue(Uuid::new_v4());

        let votes = vec![vote(dropped.id, 1), vote(dropped.id, 1)];
        let feed = aggregate(
            vec![kept.clone(), dropped.clone()],
            &votes,
            &[dropped.id],
            &FeedFilters {
                issue_type: Some("Idea".to_string()),
                ..Default::default()
            },
            FeedSort::New,
        );

        assert_eq!(feed.issues.len(), 1);
        assert_eq!(feed.votes[&dropped.id], 2);
        assert_eq!(feed.comments_count[&dropped.id], 1);
    }
}
