use std::sync::Arc;
use std::time::Duration;

use sniffer_sdk::{DecodeError, Field, Row, SnifferApi, SnifferError};
use thiserror::Error;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Sniffer(#[from] SnifferError),
    #[error("message {id} does not match schema: {source}")]
    Decode {
        id: u64,
        #[source]
        source: DecodeError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Batch(Vec<Row>),
    Empty,
}

impl FetchOutcome {
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            FetchOutcome::Batch(rows) => rows,
            FetchOutcome::Empty => Vec::new(),
        }
    }
}

/// The first tick always fires; later ticks only while capture is active.
pub fn should_poll(first: bool, capturing: bool) -> bool {
    first || capturing
}

/// Polls one service for rows newer than a watermark.
///
/// Cheap to clone; each tick runs on its own clone inside a spawned task so a
/// slow response never delays the next tick.
#[derive(Clone)]
pub struct FetchLoop {
    api: Arc<dyn SnifferApi>,
    service: Arc<str>,
    schema: Arc<[Field]>,
    interval: Duration,
}

impl FetchLoop {
    pub fn new(
        api: Arc<dyn SnifferApi>,
        service: impl Into<Arc<str>>,
        schema: impl Into<Arc<[Field]>>,
        interval: Duration,
    ) -> Self {
        Self {
            api,
            service: service.into(),
            schema: schema.into(),
            interval,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn schema(&self) -> &[Field] {
        &self.schema
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Tick source. The first tick completes immediately.
    pub fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    pub async fn fetch_once(&self, watermark: Option<u64>) -> Result<FetchOutcome, FetchError> {
        trace!(
            target = "slate::fetch",
            service = %self.service,
            watermark = ?watermark,
            "fetching messages"
        );
        let raw = self.api.get_messages(&self.service, watermark).await?;
        if raw.is_empty() {
            return Ok(FetchOutcome::Empty);
        }
        let rows = raw
            .iter()
            .map(|message| {
                Row::decode(message, &self.schema).map_err(|source| FetchError::Decode {
                    id: message.id(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            target = "slate::fetch",
            service = %self.service,
            rows = rows.len(),
            first = rows.first().map(|r| r.id),
            last = rows.last().map(|r| r.id),
            "fetched batch"
        );
        Ok(FetchOutcome::Batch(rows))
    }
}
