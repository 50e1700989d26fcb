//! Per-run session
//!
//! A [`Session`] owns the parameter client for the duration of one commissioning or verification
//! run, and keeps a journal of every completed step so that the caller can report progress up to
//! the point of failure.

use safecan_common::StatusResult;

/// Outcome of one step of a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// Human readable description of the step
    pub description: String,
    /// True if the step succeeded
    pub ok: bool,
}

impl core::fmt::Display for StepRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let outcome = if self.ok { "OK" } else { "Failed" };
        write!(f, "{} : {}", self.description, outcome)
    }
}

/// The context of one run against one node
///
/// Create one session per run, and pass it by `&mut` to
/// [`commission`](crate::commission::commission) or [`verify`](crate::verify::verify).
#[derive(Debug)]
pub struct Session<C> {
    pub(crate) client: C,
    journal: Vec<StepRecord>,
}

impl<C> Session<C> {
    /// Create a new session using `client` for every remote call
    pub fn new(client: C) -> Self {
        Self {
            client,
            journal: Vec::new(),
        }
    }

    /// Get a reference to the client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get a mutable reference to the client
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// End the session and return the client
    pub fn into_client(self) -> C {
        self.client
    }

    /// The steps completed so far, in order, including the failing step if any
    pub fn journal(&self) -> &[StepRecord] {
        &self.journal
    }

    /// Remove all entries from the journal
    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    /// Add an entry to the journal
    pub(crate) fn record(&mut self, description: String, ok: bool) {
        let record = StepRecord { description, ok };
        if ok {
            log::info!("{record}");
        } else {
            log::error!("{record}");
        }
        self.journal.push(record);
    }

    /// Add an entry for the result of a remote call, and pass the result through
    pub(crate) fn record_call<T>(
        &mut self,
        description: String,
        result: StatusResult<T>,
    ) -> StatusResult<T> {
        if let Err(status) = &result {
            log::error!("{description} returned {status}");
        }
        self.record(description, result.is_ok());
        result
    }
}
