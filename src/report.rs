//! End-of-run summary: per-worker counts, leftovers and timing.

use std::fmt;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::worker::{Consumer, Item, Producer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProducerReport {
    pub id: usize,
    pub target: usize,
    pub enqueued: usize,
}

impl From<&Producer> for ProducerReport {
    fn from(producer: &Producer) -> Self {
        Self {
            id: producer.id,
            target: producer.target,
            enqueued: producer.added,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerReport {
    pub id: usize,
    pub target: usize,
    pub dequeued: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Vec<Item>>,
}

impl From<Consumer> for ConsumerReport {
    fn from(consumer: Consumer) -> Self {
        Self {
            id: consumer.id,
            target: consumer.target,
            dequeued: consumer.removed,
            received: consumer.received,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub status: RunStatus,
    pub capacity: usize,
    pub producers: Vec<ProducerReport>,
    pub consumers: Vec<ConsumerReport>,
    /// Items still in the buffer after every thread joined.
    pub remaining: usize,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn new(
        status: RunStatus,
        capacity: usize,
        producers: Vec<ProducerReport>,
        consumers: Vec<ConsumerReport>,
        remaining: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            status,
            capacity,
            producers,
            consumers,
            remaining,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn total_enqueued(&self) -> usize {
        self.producers.iter().map(|p| p.enqueued).sum()
    }

    pub fn total_dequeued(&self) -> usize {
        self.consumers.iter().map(|c| c.dequeued).sum()
    }

    /// Everything that went in either came out or is still queued.
    pub fn is_conserved(&self) -> bool {
        self.total_enqueued() == self.total_dequeued() + self.remaining
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_colored(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n", "------------".dimmed()));
        for p in &self.producers {
            out.push_str(&format!(
                "User {} created a total of {}\n",
                p.id.to_string().cyan(),
                p.enqueued.to_string().bold()
            ));
        }
        for c in &self.consumers {
            out.push_str(&format!(
                "Consumer {} consumed a total of {} elements\n",
                c.id.to_string().cyan(),
                c.dequeued.to_string().bold()
            ));
        }
        out.push_str(&format!("{}\n", "--------------------------".dimmed()));
        let remaining = if self.remaining == 0 {
            self.remaining.to_string().green()
        } else {
            self.remaining.to_string().red()
        };
        out.push_str(&format!("Buffer has {} elements remaining\n", remaining));
        out.push_str(&format!("{}\n", "--------------------------".dimmed()));
        out.push_str(&format!("Program took {} milliseconds to complete\n", self.elapsed_ms));
        if self.status == RunStatus::Interrupted {
            out.push_str(&format!("{}\n", "Run was interrupted before completion".yellow()));
        }
        out
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------------")?;
        for p in &self.producers {
            writeln!(f, "User {} created a total of {}", p.id, p.enqueued)?;
        }
        for c in &self.consumers {
            writeln!(f, "Consumer {} consumed a total of {} elements", c.id, c.dequeued)?;
        }
        writeln!(f, "--------------------------")?;
        writeln!(f, "Buffer has {} elements remaining", self.remaining)?;
        writeln!(f, "--------------------------")?;
        write!(f, "Program took {} milliseconds to complete", self.elapsed_ms)?;
        if self.status == RunStatus::Interrupted {
            write!(f, "\nRun was interrupted before completion")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunReport {
        RunReport::new(
            RunStatus::Completed,
            10,
            vec![
                ProducerReport { id: 1, target: 3, enqueued: 3 },
                ProducerReport { id: 2, target: 2, enqueued: 2 },
            ],
            vec![ConsumerReport {
                id: 1,
                target: 5,
                dequeued: 4,
                received: None,
            }],
            1,
            Duration::from_millis(42),
        )
    }

    #[test]
    fn test_totals_and_conservation() {
        let report = sample();
        assert_eq!(report.total_enqueued(), 5);
        assert_eq!(report.total_dequeued(), 4);
        assert!(report.is_conserved());

        let broken = RunReport { remaining: 0, ..sample() };
        assert!(!broken.is_conserved());
    }

    #[test]
    fn test_plain_rendering() {
        let text = sample().to_string();
        assert!(text.contains("User 1 created a total of 3"));
        assert!(text.contains("User 2 created a total of 2"));
        assert!(text.contains("Consumer 1 consumed a total of 4 elements"));
        assert!(text.contains("Buffer has 1 elements remaining"));
        assert!(text.ends_with("Program took 42 milliseconds to complete"));
    }

    #[test]
    fn test_colored_rendering_has_same_lines() {
        colored::control::set_override(false);
        let text = sample().render_colored();
        assert!(text.contains("Consumer 1 consumed a total of 4 elements"));
        assert!(text.contains("Program took 42 milliseconds to complete"));
    }

    #[test]
    fn test_interrupted_is_flagged() {
        let report = RunReport {
            status: RunStatus::Interrupted,
            ..sample()
        };
        assert!(report.to_string().contains("interrupted"));
    }

    #[test]
    fn test_json_shape() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["remaining"], 1);
        assert_eq!(value["elapsed_ms"], 42);
        assert_eq!(value["producers"][1]["enqueued"], 2);
        assert!(value["consumers"][0].get("received").is_none());
    }
}
