//! Per-user summary statistics over tasks, notes and chat messages.
//!
//! [`summarize`] is pure: the caller supplies "today" and the time zone in
//! which calendar days are compared.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, ChatRole, Note, Task, TaskStatus};

/// Length of the trailing activity window, today included.
pub const WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub total_notes: usize,
    /// Messages the user sent, assistant replies excluded.
    pub total_chats: usize,
    /// `completed / total * 100`; 0 without tasks.
    pub completion_rate: f64,
    pub tasks_by_priority: Vec<PriorityBucket>,
    pub tasks_over_time: Vec<DayActivity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriorityBucket {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayActivity {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub created: usize,
    pub completed: usize,
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn summarize<Tz: TimeZone>(
    tasks: &[Task],
    notes: &[Note],
    messages: &[ChatMessage],
    today: NaiveDate,
    tz: &Tz,
) -> Analytics {
    let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
    let total_tasks = tasks.len();
    let completed_tasks = count(TaskStatus::Completed);

    let completion_rate = if total_tasks == 0 {
        0.0
    } else {
        completed_tasks as f64 / total_tasks as f64 * 100.0
    };

    let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
    for task in tasks {
        *by_priority
            .entry(capitalize(task.priority.as_str()))
            .or_default() += 1;
    }

    let local_day = |dt: &chrono::DateTime<chrono::Utc>| dt.with_timezone(tz).date_naive();
    let tasks_over_time = (0..WINDOW_DAYS)
        .rev()
        .map(|back| today - Duration::days(back))
        .map(|day| DayActivity {
            date: day.format("%Y-%m-%d").to_string(),
            created: tasks.iter().filter(|t| local_day(&t.created_at) == day).count(),
            completed: tasks
                .iter()
                .filter(|t| t.completed_at.as_ref().is_some_and(|c| local_day(c) == day))
                .count(),
        })
        .collect();

    Analytics {
        total_tasks,
        completed_tasks,
        pending_tasks: count(TaskStatus::Pending),
        in_progress_tasks: count(TaskStatus::InProgress),
        total_notes: notes.len(),
        total_chats: messages.iter().filter(|m| m.role == ChatRole::User).count(),
        completion_rate,
        tasks_by_priority: by_priority
            .into_iter()
            .map(|(name, value)| PriorityBucket { name, value })
            .collect(),
        tasks_over_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use chrono::{DateTime, FixedOffset, Utc};
    use uuid::Uuid;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn task(
        priority: TaskPriority,
        status: TaskStatus,
        created: &str,
        completed: Option<&str>,
    ) -> Task {
        Task {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            project_id: None,
            title: "t".to_string(),
            description: None,
            status,
            priority,
            ai_priority: None,
            due_date: None,
            completed_at: completed.map(at),
            tags: vec![],
            created_at: at(created),
            updated_at: at(created),
        }
    }

    fn message(role: ChatRole) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            role,
            content: "hi".to_string(),
            model: "gpt-4".to_string(),
            created_at: Utc::now(),
        }
    }

    fn bucket(name: &str, value: usize) -> PriorityBucket {
        PriorityBucket {
            name: name.to_string(),
            value,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn empty_input_has_zero_rate_and_full_window() {
        let stats = summarize(&[], &[], &[], today(), &Utc);
        assert_eq!(stats.completion_rate, 0.0);
        assert!(stats.tasks_by_priority.is_empty());
        assert_eq!(stats.tasks_over_time.len(), 7);
        assert_eq!(stats.tasks_over_time[0].date, "2025-03-04");
        assert_eq!(stats.tasks_over_time[6].date, "2025-03-10");
    }

    #[test]
    fn counts_statuses_priorities_and_chats() {
        let tasks = vec![
            task(
                TaskPriority::High,
                TaskStatus::Completed,
                "2025-03-09T10:00:00Z",
                Some("2025-03-10T09:00:00Z"),
            ),
            task(TaskPriority::High, TaskStatus::Pending, "2025-03-10T10:00:00Z", None),
            task(TaskPriority::Low, TaskStatus::InProgress, "2025-01-01T10:00:00Z", None),
            task(TaskPriority::Urgent, TaskStatus::Pending, "2025-03-01T10:00:00Z", None),
        ];
        let messages = vec![
            message(ChatRole::User),
            message(ChatRole::Assistant),
            message(ChatRole::User),
        ];

        let stats = summarize(&tasks, &[], &messages, today(), &Utc);

        assert_eq!(stats.total_tasks, 4);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.pending_tasks, 2);
        assert_eq!(stats.in_progress_tasks, 1);
        assert_eq!(stats.completion_rate, 25.0);
        assert_eq!(stats.total_chats, 2);
        assert_eq!(
            stats.tasks_by_priority,
            vec![
                bucket("High", 2),
                bucket("Low", 1),
                bucket("Urgent", 1),
            ]
        );

        let last = &stats.tasks_over_time[6];
        assert_eq!((last.created, last.completed), (1, 1));
        let yesterday = &stats.tasks_over_time[5];
        assert_eq!((yesterday.created, yesterday.completed), (1, 0));
    }

    #[test]
    fn days_follow_the_given_time_zone() {
        // 23:30 UTC on the 9th is already the 10th at UTC+2.
        let tasks = vec![task(
            TaskPriority::Medium,
            TaskStatus::Pending,
            "2025-03-09T23:30:00Z",
            None,
        )];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();

        let utc = summarize(&tasks, &[], &[], today(), &Utc);
        let shifted = summarize(&tasks, &[], &[], today(), &plus_two);

        assert_eq!(utc.tasks_over_time[5].created, 1);
        assert_eq!(shifted.tasks_over_time[6].created, 1);
        assert_eq!(shifted.tasks_over_time[5].created, 0);
    }
}
