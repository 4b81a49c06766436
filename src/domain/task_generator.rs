//! Daily task generation.
//!
//! Picks a random, non-repeating sample from a static per-age-group template
//! table. Generation is pure apart from the PRNG and the "today" lookup;
//! `generate_for_date` takes the date explicitly so tests stay deterministic.

use std::collections::HashMap;

use chrono::{Local, NaiveDate, Utc};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;

use crate::domain::models::{AgeGroup, Task, TaskCategory, TaskProof, TaskStatus};

#[derive(Debug, Clone, Copy)]
struct TaskTemplate {
    title: &'static str,
    description: &'static str,
    category: TaskCategory,
    points: u32,
}

const fn template(
    title: &'static str,
    description: &'static str,
    category: TaskCategory,
    points: u32,
) -> TaskTemplate {
    TaskTemplate { title, description, category, points }
}

/// Age-appropriate task templates. Point values scale with age group so
/// older children work toward the same levels at comparable effort.
static TEMPLATES: Lazy<HashMap<AgeGroup, Vec<TaskTemplate>>> = Lazy::new(|| {
    use TaskCategory::*;

    let mut table = HashMap::new();

    table.insert(
        AgeGroup::FiveToSeven,
        vec![
            template("Make your bed", "Pull up the covers and put your pillow on top", Chores, 5),
            template("Put away your toys", "Everything back in its box before bedtime", Chores, 5),
            template("Brush your teeth", "Morning and night, two minutes each", Health, 5),
            template("Read a picture book", "Read one book, or have someone read it with you", Learning, 10),
            template("Draw a picture for someone", "Make a drawing for a person you love", Creativity, 10),
            template("Help set the table", "Put out plates, cups and cutlery for dinner", Chores, 5),
            template("Say something kind", "Tell a family member something nice about them", Kindness, 5),
            template("Practice counting", "Count as high as you can without help", Learning, 10),
        ],
    );

    table.insert(
        AgeGroup::EightToEleven,
        vec![
            template("Tidy your room", "Make the bed and clear the floor", Chores, 10),
            template("Read for 20 minutes", "Any book you like, set a timer", Learning, 15),
            template("Help with the dishes", "Load, dry or put away after a meal", Chores, 10),
            template("Play outside", "At least 30 minutes of fresh air", Health, 10),
            template("Write a thank-you note", "Thank someone for something they did for you", Kindness, 15),
            template("Practice your hobby", "Instrument, drawing, building - 20 minutes", Creativity, 15),
            template("Pack your school bag", "Everything ready for tomorrow before bed", Chores, 10),
            template("Help a sibling", "Help a brother or sister with one of their jobs", Kindness, 10),
        ],
    );

    table.insert(
        AgeGroup::TwelveToFourteen,
        vec![
            template("Vacuum a room", "Furniture moved back, corners included", Chores, 15),
            template("Homework without reminders", "30 focused minutes, no prompting needed", Learning, 20),
            template("Help cook a meal", "Prep or cook part of dinner with an adult", Chores, 20),
            template("Exercise for 30 minutes", "Sport, bike ride, workout - your pick", Health, 15),
            template("Help a neighbor or relative", "Offer and do one helpful job for them", Kindness, 20),
            template("Creative project time", "30 minutes on something you are making", Creativity, 15),
            template("Trash and recycling", "All bins out, sorted correctly", Chores, 10),
            template("Teach the table something", "Learn one new fact and explain it at dinner", Learning, 15),
        ],
    );

    table.insert(
        AgeGroup::FifteenToSeventeen,
        vec![
            template("Do a load of laundry", "Wash, dry, fold and put away", Chores, 20),
            template("Cook dinner", "Plan and cook a meal for the family", Chores, 25),
            template("Study session", "45 minutes of focused study", Learning, 20),
            template("Workout or run", "At least 30 minutes, phone away", Health, 15),
            template("Tutor a younger sibling", "Help with homework or reading", Kindness, 20),
            template("Personal project", "An hour on your portfolio, code or art", Creativity, 20),
            template("Clean the kitchen", "Counters, sink and floor after dinner", Chores, 15),
            template("Plan your week", "Write out commitments and study blocks", Learning, 15),
        ],
    );

    table
});

/// Generate up to `count` distinct tasks for today.
pub fn generate(child_id: &str, age_group: AgeGroup, count: usize) -> Vec<Task> {
    generate_for_date(child_id, age_group, count, Local::now().date_naive())
}

/// Generate up to `count` distinct tasks due on `due_date`. A template is
/// never repeated within one batch; if the pool is smaller than `count`
/// the whole pool is returned.
pub fn generate_for_date(
    child_id: &str,
    age_group: AgeGroup,
    count: usize,
    due_date: NaiveDate,
) -> Vec<Task> {
    let pool = match TEMPLATES.get(&age_group) {
        Some(pool) => pool,
        None => return Vec::new(),
    };

    let mut picks: Vec<&TaskTemplate> = pool.iter().collect();
    picks.shuffle(&mut rand::rng());

    let now = Utc::now();
    picks
        .into_iter()
        .take(count)
        .map(|t| Task {
            id: Task::generate_id(now.timestamp_millis() as u64),
            child_id: child_id.to_string(),
            title: t.title.to_string(),
            description: t.description.to_string(),
            category: t.category,
            points: t.points,
            status: TaskStatus::Pending,
            due_date,
            is_custom: false,
            proof: TaskProof::None,
            no_points_reason: None,
            completed_at: None,
            approved_at: None,
            verified_at: None,
            created_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_age_group_has_a_pool() {
        for group in [
            AgeGroup::FiveToSeven,
            AgeGroup::EightToEleven,
            AgeGroup::TwelveToFourteen,
            AgeGroup::FifteenToSeventeen,
        ] {
            let pool = TEMPLATES.get(&group).expect("missing template pool");
            assert!(pool.len() >= 6, "pool for {} too small", group);

            let categories: HashSet<TaskCategory> = pool.iter().map(|t| t.category).collect();
            assert!(categories.len() >= 3, "pool for {} lacks variety", group);
        }
    }

    #[test]
    fn test_generate_produces_count_pending_tasks() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let tasks = generate_for_date("child::1", AgeGroup::EightToEleven, 5, date);

        assert_eq!(tasks.len(), 5);
        for task in &tasks {
            assert_eq!(task.child_id, "child::1");
            assert_eq!(task.status, TaskStatus::Pending);
            assert_eq!(task.proof, TaskProof::None);
            assert_eq!(task.due_date, date);
            assert!(!task.is_custom);
            assert!(task.points > 0);
        }
    }

    #[test]
    fn test_generate_never_repeats_a_template() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let tasks = generate_for_date("child::1", AgeGroup::FiveToSeven, 8, date);

        let titles: HashSet<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles.len(), tasks.len());
    }

    #[test]
    fn test_generate_caps_at_pool_size() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let pool_size = TEMPLATES.get(&AgeGroup::FifteenToSeventeen).unwrap().len();
        let tasks = generate_for_date("child::1", AgeGroup::FifteenToSeventeen, 50, date);

        assert_eq!(tasks.len(), pool_size);
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let tasks = generate_for_date("child::1", AgeGroup::TwelveToFourteen, 5, date);

        let ids: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids.len(), tasks.len());
    }
}
