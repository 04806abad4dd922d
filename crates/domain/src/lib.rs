//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod reminder;
mod schedule;

pub use reminder::{ReminderFrequency, ReminderPolicy};
pub use schedule::{FireRule, ReminderSchedule};
