//! Achievement and sticker evaluation.
//!
//! ## Key Responsibilities
//! - Hold the static achievement table and the level-indexed sticker table
//! - Compute a child's metrics from current state (approved tasks only)
//! - Mint badges for every not-yet-owned definition whose metric passes
//!   its threshold
//!
//! The evaluator is pure: it returns the newly earned badges and never
//! mutates the child. The store merges them in and owns deduplication at
//! the write side; the checks here against already-owned badges make the
//! evaluation idempotent on its own.

use chrono::{DateTime, Utc};

use crate::domain::models::{Badge, Child, Task, TaskStatus};

/// Which metric an achievement watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    TasksCompleted,
    StreakDays,
    LifetimePoints,
    Level,
    MailMeter,
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub check: CheckKind,
    pub threshold: u32,
}

const fn def(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
    check: CheckKind,
    threshold: u32,
) -> AchievementDef {
    AchievementDef { id, name, description, icon, check, threshold }
}

/// The full achievement catalog, in display order.
pub static ACHIEVEMENTS: &[AchievementDef] = &[
    def("first-task", "First Steps", "Finish your very first task", "🎯", CheckKind::TasksCompleted, 1),
    def("tasks-10", "Task Tackler", "Finish 10 tasks", "🧹", CheckKind::TasksCompleted, 10),
    def("tasks-25", "Chore Champion", "Finish 25 tasks", "🏅", CheckKind::TasksCompleted, 25),
    def("tasks-100", "Century Helper", "Finish 100 tasks", "💯", CheckKind::TasksCompleted, 100),
    def("streak-3", "On a Roll", "Check in 3 days in a row", "🔥", CheckKind::StreakDays, 3),
    def("streak-7", "Week Warrior", "Check in 7 days in a row", "📅", CheckKind::StreakDays, 7),
    def("streak-30", "Habit Hero", "Check in 30 days in a row", "🗓️", CheckKind::StreakDays, 30),
    def("points-500", "Point Collector", "Earn 500 lifetime points", "⭐", CheckKind::LifetimePoints, 500),
    def("points-2500", "Point Prodigy", "Earn 2500 lifetime points", "🌟", CheckKind::LifetimePoints, 2_500),
    def("points-5000", "Point Legend", "Earn 5000 lifetime points", "✨", CheckKind::LifetimePoints, 5_000),
    def("level-5", "High Flyer", "Reach level 5", "🚀", CheckKind::Level, 5),
    def("level-10", "Superstar", "Reach level 10", "🏆", CheckKind::Level, 10),
    def("mail-meter-full", "Mailbox Filler", "Fill the mail meter", "📬", CheckKind::MailMeter, 100),
];

/// Mascot stickers granted at level milestones. Stickers carry generated
/// ids, so uniqueness hangs on the name.
pub static STICKERS: &[(u32, &'static str, &'static str)] = &[
    (2, "Posty's Paper Plane", "🛩️"),
    (3, "Stamp Collector Posty", "📮"),
    (5, "Golden Envelope Posty", "💌"),
    (8, "Captain Posty", "🧭"),
    (10, "Posty the Magnificent", "🎩"),
];

/// A child's achievement-relevant metrics at one point in time.
#[derive(Debug, Clone, Copy)]
pub struct ChildMetrics {
    pub tasks_completed: u32,
    pub streak_days: u32,
    pub total_points: u32,
    pub level: u32,
    pub mail_meter: u8,
}

impl ChildMetrics {
    /// Only approved tasks count as completed here; a child marking a task
    /// done does not move achievement metrics until a parent approves it.
    pub fn collect(child: &Child, tasks: &[Task]) -> ChildMetrics {
        let tasks_completed = tasks
            .iter()
            .filter(|t| t.child_id == child.id && t.status == TaskStatus::Approved)
            .count() as u32;

        ChildMetrics {
            tasks_completed,
            streak_days: child.streak_days,
            total_points: child.total_points,
            level: child.level,
            mail_meter: child.mail_meter_progress,
        }
    }

    fn value(&self, check: CheckKind) -> u32 {
        match check {
            CheckKind::TasksCompleted => self.tasks_completed,
            CheckKind::StreakDays => self.streak_days,
            CheckKind::LifetimePoints => self.total_points,
            CheckKind::Level => self.level,
            CheckKind::MailMeter => self.mail_meter as u32,
        }
    }
}

/// Evaluate the catalog against a child's current state and return the
/// badges earned right now but not yet owned. Owned badges (by id or by
/// name) are never minted twice.
pub fn check_achievements(child: &Child, tasks: &[Task], now: DateTime<Utc>) -> Vec<Badge> {
    let metrics = ChildMetrics::collect(child, tasks);
    let mut minted: Vec<Badge> = Vec::new();

    for def in ACHIEVEMENTS {
        if child.has_badge(def.id) || child.has_badge_named(def.name) {
            continue;
        }
        if metrics.value(def.check) >= def.threshold {
            minted.push(Badge::new(
                def.id.to_string(),
                child.id.clone(),
                def.name.to_string(),
                def.description.to_string(),
                def.icon.to_string(),
                now,
            ));
        }
    }

    for (milestone, name, icon) in STICKERS {
        if metrics.level >= *milestone && !child.has_badge_named(name) {
            minted.push(Badge::new(
                Badge::generate_id(now.timestamp_millis() as u64),
                child.id.clone(),
                name.to_string(),
                format!("Sticker for reaching level {}", milestone),
                icon.to_string(),
                now,
            ));
        }
    }

    minted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Gender, TaskCategory, TaskProof};
    use chrono::NaiveDate;

    fn test_child() -> Child {
        Child::new("Alex".to_string(), 9, Gender::Other, Utc::now())
    }

    fn approved_task(child_id: &str, n: u32) -> Task {
        let now = Utc::now();
        Task {
            id: format!("task-{}", n),
            child_id: child_id.to_string(),
            title: format!("Task {}", n),
            description: String::new(),
            category: TaskCategory::Chores,
            points: 10,
            status: TaskStatus::Approved,
            due_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            is_custom: false,
            proof: TaskProof::None,
            no_points_reason: None,
            completed_at: Some(now),
            approved_at: Some(now),
            verified_at: Some(now),
            created_at: now,
        }
    }

    #[test]
    fn test_first_approved_task_mints_first_steps() {
        let child = test_child();
        let tasks = vec![approved_task(&child.id, 1)];

        let minted = check_achievements(&child, &tasks, Utc::now());
        assert!(minted.iter().any(|b| b.id == "first-task"));
    }

    #[test]
    fn test_owned_badges_are_not_minted_twice() {
        let mut child = test_child();
        let tasks = vec![approved_task(&child.id, 1)];

        let first_pass = check_achievements(&child, &tasks, Utc::now());
        assert!(!first_pass.is_empty());
        child.badges.extend(first_pass);

        let second_pass = check_achievements(&child, &tasks, Utc::now());
        assert!(second_pass.is_empty());
    }

    #[test]
    fn test_unapproved_tasks_do_not_count() {
        let child = test_child();
        let mut task = approved_task(&child.id, 1);
        task.status = TaskStatus::Completed;

        let minted = check_achievements(&child, &[task], Utc::now());
        assert!(minted.iter().all(|b| b.id != "first-task"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut child = test_child();
        child.total_points = 499;
        assert!(check_achievements(&child, &[], Utc::now())
            .iter()
            .all(|b| b.id != "points-500"));

        child.total_points = 500;
        assert!(check_achievements(&child, &[], Utc::now())
            .iter()
            .any(|b| b.id == "points-500"));
    }

    #[test]
    fn test_streak_badges() {
        let mut child = test_child();
        child.streak_days = 7;

        let minted = check_achievements(&child, &[], Utc::now());
        assert!(minted.iter().any(|b| b.id == "streak-3"));
        assert!(minted.iter().any(|b| b.id == "streak-7"));
        assert!(minted.iter().all(|b| b.id != "streak-30"));
    }

    #[test]
    fn test_stickers_mint_at_level_milestones_once() {
        let mut child = test_child();
        child.level = 5;

        let minted = check_achievements(&child, &[], Utc::now());
        let sticker_names: Vec<&str> = minted
            .iter()
            .filter(|b| b.name.contains("Posty"))
            .map(|b| b.name.as_str())
            .collect();
        assert!(sticker_names.contains(&"Posty's Paper Plane"));
        assert!(sticker_names.contains(&"Golden Envelope Posty"));
        assert!(!sticker_names.contains(&"Captain Posty"));

        child.badges.extend(minted);
        let again = check_achievements(&child, &[], Utc::now());
        assert!(again.iter().all(|b| !b.name.contains("Posty")));
    }

    #[test]
    fn test_mail_meter_badge() {
        let mut child = test_child();
        child.mail_meter_progress = 100;

        let minted = check_achievements(&child, &[], Utc::now());
        assert!(minted.iter().any(|b| b.id == "mail-meter-full"));
    }

    #[test]
    fn test_catalog_ids_and_names_are_unique() {
        use std::collections::HashSet;

        let ids: HashSet<&str> = ACHIEVEMENTS.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), ACHIEVEMENTS.len());

        let names: HashSet<&str> = ACHIEVEMENTS
            .iter()
            .map(|d| d.name)
            .chain(STICKERS.iter().map(|(_, name, _)| *name))
            .collect();
        assert_eq!(names.len(), ACHIEVEMENTS.len() + STICKERS.len());
    }
}
