use crate::core::conflict::has_overlap;
use crate::domain::model::{ClassDefinition, NewReservation, Reservation};
use crate::domain::ports::{ReservationStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable file-backed store used as the fallback tier.
///
/// Each subject/date pair lives in its own JSON file named
/// `{subject}_{YYYY-MM-DD}.json` under the base directory (see `key_path`).
/// Writes are serialized and re-check overlap, so the store itself never
/// accepts two overlapping reservations for the same key.
#[derive(Debug)]
pub struct LocalReservationStore {
    base_path: PathBuf,
    classes: Vec<ClassDefinition>,
    timezone: Tz,
    write_lock: Mutex<()>,
}

fn unavailable(context: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", context, e))
}

impl LocalReservationStore {
    pub fn new(base_path: impl Into<PathBuf>, classes: Vec<ClassDefinition>) -> Self {
        Self {
            base_path: base_path.into(),
            classes,
            timezone: Tz::UTC,
            write_lock: Mutex::new(()),
        }
    }

    /// Zone used to derive the calendar date a reservation is filed under.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Plain ids made of ASCII letters, digits and `-` are used as-is; any
    /// other id is hex-encoded behind a `~` marker so distinct subjects never
    /// share a file.
    fn key_path(&self, subject_id: &str, date: NaiveDate) -> PathBuf {
        let plain = !subject_id.is_empty()
            && subject_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        let subject = if plain {
            subject_id.to_string()
        } else {
            format!("~{}", hex::encode(subject_id.as_bytes()))
        };
        self.base_path
            .join(format!("{}_{}.json", subject, date.format("%Y-%m-%d")))
    }

    async fn read_key(&self, path: &Path) -> StoreResult<Vec<Reservation>> {
        match tokio::fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| unavailable(&format!("corrupted file {}", path.display()), e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(unavailable(&format!("read {}", path.display()), e)),
        }
    }

    async fn write_key(&self, path: &Path, reservations: &[Reservation]) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| unavailable("create store directory", e))?;

        let data = serde_json::to_vec_pretty(reservations)
            .map_err(|e| unavailable("serialize reservations", e))?;

        // write-then-rename keeps the previous file intact on a crash
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| unavailable(&format!("write {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| unavailable(&format!("rename {}", tmp.display()), e))?;
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for LocalReservationStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_classes(&self) -> StoreResult<Vec<ClassDefinition>> {
        Ok(self.classes.clone())
    }

    async fn list_reservations(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Reservation>> {
        let rows = self.read_key(&self.key_path(subject_id, date)).await?;
        Ok(rows
            .into_iter()
            .filter(|r| r.subject_id == subject_id)
            .collect())
    }

    async fn create_reservation(&self, candidate: NewReservation) -> StoreResult<Reservation> {
        let _guard = self.write_lock.lock().await;

        let date = candidate
            .start_instant
            .with_timezone(&self.timezone)
            .date_naive();
        let path = self.key_path(&candidate.subject_id, date);
        let mut reservations = self.read_key(&path).await?;

        // only the candidate's own timeline counts
        let intervals: Vec<_> = reservations
            .iter()
            .filter(|r| r.subject_id == candidate.subject_id)
            .map(Reservation::interval)
            .collect();
        if has_overlap(candidate.start_instant, candidate.end_instant, &intervals) {
            return Err(StoreError::Conflict(format!(
                "{} already holds an overlapping reservation on {}",
                candidate.subject_id, date
            )));
        }

        let id = format!(
            "local-{}-{}-{}",
            candidate.subject_id,
            date.format("%Y%m%d"),
            intervals.len() + 1
        );
        let reservation = candidate.with_id(id);
        reservations.push(reservation.clone());
        self.write_key(&path, &reservations).await?;

        tracing::debug!(
            "Stored reservation {} in {}",
            reservation.id,
            path.display()
        );
        Ok(reservation)
    }
}
