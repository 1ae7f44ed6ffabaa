//! Read path feeding the statistics engine.
//!
//! For every `(day, type)` the archived snapshot is authoritative. When the
//! archive has no snapshot for that pair, the live flight cache's records for
//! that day are used instead. The two sources are never mixed for the same
//! pair, so a flight is never counted twice.

use chrono::NaiveDate;
use log::warn;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::db::repository::HistoricalRepository;
use crate::db::PersistentFlightCache;
use crate::models::time::days_inclusive;
use crate::models::{FlightRecord, FlightType};

#[derive(Clone)]
pub struct FlightHistory {
    archive: Arc<dyn HistoricalRepository>,
    cache: Arc<PersistentFlightCache>,
}

impl FlightHistory {
    pub fn new(archive: Arc<dyn HistoricalRepository>, cache: Arc<PersistentFlightCache>) -> Self {
        Self { archive, cache }
    }

    /// All flights of `airport_code` on `date`, both directions.
    pub async fn flights_for_day(&self, airport_code: &str, date: NaiveDate) -> Vec<FlightRecord> {
        let mut flights = Vec::new();
        for flight_type in FlightType::ALL {
            match self.archive.get_data_for_date(airport_code, date, flight_type).await {
                Ok(Some(snapshot)) => flights.extend(snapshot.flights),
                Ok(None) => {
                    flights.extend(self.cache.get_flights_for_date(airport_code, flight_type, date))
                }
                Err(e) => {
                    warn!(
                        "Archive lookup failed for {} {} {}, using live cache: {}",
                        airport_code, date, flight_type, e
                    );
                    flights.extend(self.cache.get_flights_for_date(airport_code, flight_type, date))
                }
            }
        }
        flights
    }

    /// Flights of `airport_code` for every day in `[from, to]`.
    ///
    /// Every day of the range has an entry, possibly empty.
    pub async fn flights_by_day(
        &self,
        airport_code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> BTreeMap<NaiveDate, Vec<FlightRecord>> {
        let mut by_day: BTreeMap<NaiveDate, Vec<FlightRecord>> =
            days_inclusive(from, to).map(|d| (d, Vec::new())).collect();
        if by_day.is_empty() {
            return by_day;
        }

        let snapshots = match self
            .archive
            .get_data_for_range(airport_code, from, to, None)
            .await
        {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(
                    "Archive range lookup failed for {} {}..{}, using live cache: {}",
                    airport_code, from, to, e
                );
                Vec::new()
            }
        };

        let mut archived: HashSet<(NaiveDate, FlightType)> = HashSet::new();
        for snapshot in snapshots {
            archived.insert((snapshot.date, snapshot.flight_type));
            by_day.entry(snapshot.date).or_default().extend(snapshot.flights);
        }

        for flight_type in FlightType::ALL {
            for record in self.cache.get_flight_data(airport_code, flight_type) {
                let date = record.scheduled_date();
                if archived.contains(&(date, flight_type)) {
                    continue;
                }
                if let Some(day) = by_day.get_mut(&date) {
                    day.push(record);
                }
            }
        }
        by_day
    }
}
