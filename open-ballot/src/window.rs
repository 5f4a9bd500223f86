use serde::{Deserialize, Serialize};

/// Voting period of a poll, inclusive on both ends, in unix seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingWindow {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    NotStarted,
    Active,
    Finished,
}

/// Result of a voting period check as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VotingStatus {
    pub open: bool,
    pub msg: &'static str,
}

impl VotingStatus {
    pub const CLOSED: VotingStatus = VotingStatus {
        open: false,
        msg: "No",
    };
    pub const OPEN: VotingStatus = VotingStatus {
        open: true,
        msg: "Yes",
    };
}

impl Default for VotingStatus {
    fn default() -> Self {
        Self::CLOSED
    }
}

impl VotingWindow {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_open(&self, now: u64) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn check(&self, now: u64) -> VotingStatus {
        if self.is_open(now) {
            VotingStatus::OPEN
        } else {
            VotingStatus::CLOSED
        }
    }

    pub fn status(&self, now: u64) -> Status {
        if now < self.start {
            Status::NotStarted
        } else if now <= self.end {
            Status::Active
        } else {
            Status::Finished
        }
    }

    /// Length of the voting period; 0 for an inverted window.
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }
}
