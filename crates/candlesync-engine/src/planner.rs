//! Fetch-window planning.
//!
//! Given what is already persisted and what the exchange is known not to have,
//! the planner narrows a requested range down to the window that actually
//! needs fetching.

use candlesync_store::{FloorTracker, StoreAdapter};
use candlesync_types::{
    DataFloor, Interval, PlanningError, SeriesCoverage, SeriesKey, TimeRange,
};
use chrono::{DateTime, Utc};

use crate::{Result, SyncConfig};

/// A request to bring `key` up to date over `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// The series.
    pub key: SeriesKey,
    /// The requested half-open range.
    pub range: TimeRange,
}

impl SyncRequest {
    /// Creates a request.
    #[must_use]
    pub const fn new(key: SeriesKey, range: TimeRange) -> Self {
        Self { key, range }
    }

    /// Builds a request from UTC bounds.
    ///
    /// # Errors
    ///
    /// Returns [`PlanningError::EmptyRange`] if `start >= end`.
    pub fn between(
        symbol: impl Into<String>,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> std::result::Result<Self, PlanningError> {
        Ok(Self::new(
            SeriesKey::new(symbol, interval),
            TimeRange::new(start, end)?,
        ))
    }

    /// Builds a request from RFC 3339 bounds.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanningError`] if either bound lacks an offset or cannot be
    /// parsed, or the range is empty.
    pub fn parse(
        symbol: impl Into<String>,
        interval: Interval,
        start: &str,
        end: &str,
    ) -> std::result::Result<Self, PlanningError> {
        Ok(Self::new(
            SeriesKey::new(symbol, interval),
            TimeRange::parse(start, end)?,
        ))
    }
}

/// The remote window the executor should walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWindow {
    /// The series.
    pub key: SeriesKey,
    /// First instant to request.
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
    /// False if nothing needs fetching.
    pub should_fetch: bool,
}

impl FetchWindow {
    const fn fetch(key: SeriesKey, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            key,
            start,
            end,
            should_fetch: true,
        }
    }

    const fn skip(key: SeriesKey, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            key,
            start,
            end,
            should_fetch: false,
        }
    }
}

/// Output of [`plan_window`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// The window to fetch.
    pub window: FetchWindow,
    /// A floor inferred while planning, to be recorded by the caller.
    pub new_floor: Option<DataFloor>,
    /// True if the window reaches back before the persisted data.
    pub backfill: bool,
    /// True if the window extends past the persisted data.
    pub forward_fill: bool,
}

/// Decides the fetch window for `request` without touching any I/O.
///
/// `coverage` is the persisted extent of the series and `floor` its recorded
/// data floor, if any.
#[must_use]
pub fn plan_window(
    request: &SyncRequest,
    coverage: Option<&SeriesCoverage>,
    floor: Option<&DataFloor>,
    config: &SyncConfig,
) -> Plan {
    let key = request.key.clone();
    let step = key.interval.duration();
    let tolerance = config.overlap_tolerance();
    let floor_at = floor.map(|f| f.earliest_known_timestamp);
    let req_end = request.range.end;
    let mut req_start = request.range.start;

    let skip = |key, start, end| Plan {
        window: FetchWindow::skip(key, start, end),
        new_floor: None,
        backfill: false,
        forward_fill: false,
    };

    if let Some(floor_at) = floor_at {
        if req_start < floor_at {
            req_start = floor_at;
            if req_start >= req_end {
                return skip(key, req_start, req_end);
            }
        }
    }

    let Some(coverage) = coverage else {
        return Plan {
            window: FetchWindow::fetch(key, req_start, req_end),
            new_floor: None,
            backfill: true,
            forward_fill: true,
        };
    };
    let first_local = coverage.first_timestamp;
    let last_local = coverage.last_timestamp;

    let backfill_exhausted = floor_at.is_some_and(|f| first_local - f <= step);
    let mut backfill = first_local - req_start > tolerance && !backfill_exhausted;
    let forward_fill = req_end - last_local > step;

    let mut new_floor = None;
    if backfill && first_local - req_start > config.max_historical_gap() {
        backfill = false;
        new_floor = Some(DataFloor::new(key.clone(), first_local));
    }

    if !backfill && !forward_fill {
        let effective_start = req_start.max(first_local);
        if coverage.spans(effective_start, req_end) {
            let mut plan = skip(key, effective_start, req_end);
            plan.new_floor = new_floor;
            return plan;
        }
    }

    let mut start = if backfill {
        req_start
    } else {
        last_local - step
    };
    if let Some(floor_at) = floor_at {
        start = start.max(floor_at);
    }

    Plan {
        window: FetchWindow::fetch(key, start, req_end),
        new_floor,
        backfill,
        forward_fill,
    }
}

/// Plans the fetch window for `request` against a live store and floor
/// tracker, recording any floor inferred on the way.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the floor file cannot be
/// rewritten.
pub async fn plan<S: StoreAdapter + ?Sized>(
    store: &S,
    floors: &FloorTracker,
    request: &SyncRequest,
    config: &SyncConfig,
) -> Result<FetchWindow> {
    let coverage = store.coverage(&request.key).await?;
    let floor = floors.get(&request.key).await;
    let plan = plan_window(request, coverage.as_ref(), floor.as_ref(), config);

    if let Some(new_floor) = &plan.new_floor {
        floors.record(new_floor).await?;
    }

    tracing::debug!(
        target: "candlesync::planner",
        series = %request.key,
        start = %plan.window.start,
        end = %plan.window.end,
        should_fetch = plan.window.should_fetch,
        backfill = plan.backfill,
        forward_fill = plan.forward_fill,
        "planned fetch window"
    );
    Ok(plan.window)
}
