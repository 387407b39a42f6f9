use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{ProductionPlan, Todo};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
  Overdue,
  Today,
  Tomorrow,
  Future,
}

impl Priority {
  pub fn label(self) -> &'static str {
    match self {
      Priority::Overdue => "Ueberfaellig",
      Priority::Today => "Heute",
      Priority::Tomorrow => "Morgen",
      Priority::Future => "Geplant",
    }
  }
}

/// Dates are compared as `YYYY-MM-DD` strings, which order like the dates.
pub fn priority(due: &str, today: NaiveDate) -> Priority {
  let today_str = today.format("%Y-%m-%d").to_string();
  let tomorrow_str = (today + Duration::days(1)).format("%Y-%m-%d").to_string();
  if due < today_str.as_str() {
    Priority::Overdue
  } else if due == today_str {
    Priority::Today
  } else if due == tomorrow_str {
    Priority::Tomorrow
  } else {
    Priority::Future
  }
}

pub fn default_due_date(today: NaiveDate) -> String {
  (today + Duration::days(1)).format("%Y-%m-%d").to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TodoView {
  #[serde(flatten)]
  pub todo: Todo,
  pub priority: Priority,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlanView {
  #[serde(flatten)]
  pub plan: ProductionPlan,
  pub priority: Priority,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TaskCounts {
  pub done: usize,
  pub open: usize,
  pub overdue: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TodoBoard {
  pub items: Vec<TodoView>,
  pub counts: TaskCounts,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlanBoard {
  pub items: Vec<PlanView>,
  pub counts: TaskCounts,
}

/// Open tasks first, then by due date; same-day tasks show the newest first.
pub fn todo_board(todos: &[Todo], today: NaiveDate) -> TodoBoard {
  let mut sorted: Vec<&Todo> = todos.iter().collect();
  sorted.sort_by(|a, b| {
    a.done
      .cmp(&b.done)
      .then_with(|| a.date.cmp(&b.date))
      .then_with(|| b.created_at.cmp(&a.created_at))
  });

  let items = sorted
    .into_iter()
    .map(|todo| TodoView {
      priority: priority(&todo.date, today),
      todo: todo.clone(),
    })
    .collect();

  TodoBoard {
    items,
    counts: counts(todos.iter().map(|todo| (todo.done, todo.date.as_str())), today),
  }
}

pub fn plan_board(plans: &[ProductionPlan], today: NaiveDate) -> PlanBoard {
  let mut sorted: Vec<&ProductionPlan> = plans.iter().collect();
  sorted.sort_by(|a, b| a.done.cmp(&b.done).then_with(|| a.deadline.cmp(&b.deadline)));

  let items = sorted
    .into_iter()
    .map(|plan| PlanView {
      priority: priority(&plan.deadline, today),
      plan: plan.clone(),
    })
    .collect();

  PlanBoard {
    items,
    counts: counts(plans.iter().map(|plan| (plan.done, plan.deadline.as_str())), today),
  }
}

fn counts<'a>(tasks: impl Iterator<Item = (bool, &'a str)>, today: NaiveDate) -> TaskCounts {
  let mut counts = TaskCounts::default();
  for (done, due) in tasks {
    if done {
      counts.done += 1;
    } else {
      counts.open += 1;
      if priority(due, today) == Priority::Overdue {
        counts.overdue += 1;
      }
    }
  }
  counts
}
