//! Echo tasks: number each input and print it back.

use crate::task::{ItemFactory, WorkItem};

/// Makes [`EchoTask`]s numbered from 1 in input order.
#[derive(Debug, Default)]
pub struct EchoFactory {
    count: u64,
}

impl EchoFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItemFactory for EchoFactory {
    type Item = EchoTask;

    fn make(&mut self, raw: String) -> EchoTask {
        self.count += 1;
        EchoTask {
            id: self.count,
            line: raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoTask {
    pub id: u64,
    pub line: String,
}

impl WorkItem for EchoTask {
    fn process(&mut self) {}

    fn result(&self) -> (String, bool) {
        (format!("{}: {}", self.id, self.line), true)
    }
}
