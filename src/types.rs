use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque ID types for type safety
pub type PollId = String;
pub type ConnectionId = String;

/// Mapping from option index to accumulated vote count
pub type Tally = BTreeMap<usize, u32>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Queued,
    Active,
    Completed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Queued => "queued",
            PollStatus::Active => "active",
            PollStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(PollStatus::Queued),
            "active" => Some(PollStatus::Active),
            "completed" => Some(PollStatus::Completed),
            _ => None,
        }
    }
}

/// A question posed to the session, as persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub duration_secs: u32,
    /// Assigned on the transition into `Active`, never at creation of a queued poll
    pub start_time: Option<DateTime<Utc>>,
    pub status: PollStatus,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    pub fn is_active(&self) -> bool {
        self.status == PollStatus::Active
    }

    /// Whole seconds since activation, `None` if the poll never started
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.start_time.map(|start| (now - start).num_seconds())
    }

    /// Voting window is inclusive: a vote at exactly `duration_secs` is still accepted
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_secs(now)
            .is_some_and(|elapsed| elapsed > i64::from(self.duration_secs))
    }

    /// A tally with every option present at zero
    pub fn empty_tally(&self) -> Tally {
        (0..self.options.len()).map(|i| (i, 0)).collect()
    }

    /// Aggregate persisted votes into a tally covering every option
    pub fn tally_from<'a>(&self, votes: impl IntoIterator<Item = &'a Vote>) -> Tally {
        let mut tally = self.empty_tally();
        for vote in votes {
            *tally.entry(vote.option_index).or_insert(0) += 1;
        }
        tally
    }

    pub fn snapshot(&self, votes: Tally) -> PollSnapshot {
        PollSnapshot {
            id: self.id.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
            duration_secs: self.duration_secs,
            start_time: self.start_time,
            status: self.status,
            is_active: self.is_active(),
            votes,
        }
    }
}

/// One voter's choice on one poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vote {
    pub poll_id: PollId,
    pub voter_name: String,
    pub option_index: usize,
    pub cast_at: DateTime<Utc>,
}

/// Teacher input for a new poll, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<String>,
    pub duration: u32,
}

impl PollDraft {
    /// Trim the question and options, dropping blank options
    pub fn normalize(self) -> Result<PollDraft, String> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err("Question cannot be blank".to_string());
        }

        let options: Vec<String> = self
            .options
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if options.len() < 2 {
            return Err("A poll needs at least two non-empty options".to_string());
        }

        if self.duration == 0 {
            return Err("Duration must be at least one second".to_string());
        }

        Ok(PollDraft {
            question,
            options,
            duration: self.duration,
        })
    }
}

/// Public view of a poll with its tally, used for live events and history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollSnapshot {
    pub id: PollId,
    pub question: String,
    pub options: Vec<String>,
    pub duration_secs: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub status: PollStatus,
    pub is_active: bool,
    pub votes: Tally,
}

/// Share of `count` in `total` as a whole percentage, 0 when nobody voted
pub fn percent(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((f64::from(count) * 100.0) / f64::from(total)).round() as u32
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll(duration_secs: u32, start_time: Option<DateTime<Utc>>) -> Poll {
        Poll {
            id: "p1".to_string(),
            question: "Q?".to_string(),
            options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
            duration_secs,
            start_time,
            status: PollStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let start = Utc::now();
        let p = poll(10, Some(start));

        assert!(!p.is_expired(start + Duration::seconds(10)));
        assert!(p.is_expired(start + Duration::seconds(11)));
    }

    #[test]
    fn test_queued_poll_never_expires() {
        let p = poll(1, None);
        assert!(!p.is_expired(Utc::now() + Duration::days(1)));
        assert_eq!(p.elapsed_secs(Utc::now()), None);
    }

    #[test]
    fn test_tally_includes_zero_options() {
        let p = poll(10, Some(Utc::now()));
        let votes = vec![Vote {
            poll_id: "p1".to_string(),
            voter_name: "Alice".to_string(),
            option_index: 2,
            cast_at: Utc::now(),
        }];

        let tally = p.tally_from(&votes);
        assert_eq!(tally.len(), 3);
        assert_eq!(tally[&0], 0);
        assert_eq!(tally[&1], 0);
        assert_eq!(tally[&2], 1);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 5), 100);
    }

    #[test]
    fn test_draft_normalize_drops_blank_options() {
        let draft = PollDraft {
            question: "  Favourite colour? ".to_string(),
            options: vec!["Red".to_string(), "  ".to_string(), " Blue ".to_string()],
            duration: 30,
        };

        let normalized = draft.normalize().unwrap();
        assert_eq!(normalized.question, "Favourite colour?");
        assert_eq!(normalized.options, vec!["Red", "Blue"]);
    }

    #[test]
    fn test_draft_rejects_bad_input() {
        let blank_question = PollDraft {
            question: " ".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            duration: 30,
        };
        assert!(blank_question.normalize().is_err());

        let one_option = PollDraft {
            question: "Q".to_string(),
            options: vec!["A".to_string(), "".to_string()],
            duration: 30,
        };
        assert!(one_option
            .normalize()
            .unwrap_err()
            .contains("two non-empty options"));

        let zero_duration = PollDraft {
            question: "Q".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            duration: 0,
        };
        assert!(zero_duration.normalize().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&PollStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert_eq!(PollStatus::parse("completed"), Some(PollStatus::Completed));
        assert_eq!(PollStatus::parse("bogus"), None);
    }
}
