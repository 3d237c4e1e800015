//! Persistence coordinator: the only writer of assessment documents.
//!
//! Creates documents, loads them by `(id, partitionKey)` and applies step
//! saves with whole-document replace semantics.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AssessmentError, DatabaseError};
use crate::store::AssessmentStore;

use super::model::{Assessment, AssessmentKey, PersonalInfo};
use super::steps::STEP_COUNT;

/// Mediates every read and write between the wizard and the store.
pub struct PersistenceCoordinator {
    store: Arc<dyn AssessmentStore>,
}

impl PersistenceCoordinator {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    /// Allocate both identifiers and persist a fresh document at page 0.
    pub async fn create_assessment(
        &self,
        initial_personal: Option<PersonalInfo>,
    ) -> Result<AssessmentKey, AssessmentError> {
        let customer_id = Uuid::new_v4().to_string();
        let mut doc = Assessment::new(customer_id);
        doc.personal_info = initial_personal;

        let stored = self
            .store
            .create(&doc)
            .await
            .map_err(|e| AssessmentError::from_store(e, doc.id, &doc.customer_id))?;

        info!(id = %stored.id, customer_id = %stored.customer_id, "Assessment created");
        Ok(stored.key())
    }

    /// Point read. A missing document or a partition mismatch is `NotFound`.
    pub async fn load_assessment(
        &self,
        id: Uuid,
        customer_id: &str,
    ) -> Result<Assessment, AssessmentError> {
        self.store
            .read(id, customer_id)
            .await
            .map_err(|e| AssessmentError::from_store(e, id, customer_id))?
            .ok_or_else(|| AssessmentError::NotFound {
                id,
                customer_id: customer_id.to_string(),
            })
    }

    /// Persist a step transition.
    ///
    /// The section payloads of `snapshot` replace the stored ones; progress
    /// comes from `target_page` / `is_final`. Completion is sticky: once a
    /// document is complete, later saves keep `currentPage`, `isComplete`
    /// and `completedAt` as they are. A save that changes nothing is not
    /// written and returns the stored document.
    ///
    /// Every write is conditional on the version it was computed from.
    /// Without `expected_version` a lost race is recomputed against the
    /// fresh document once, so sections stay last-write-wins while the
    /// completion flags never regress.
    pub async fn save_step(
        &self,
        id: Uuid,
        customer_id: &str,
        snapshot: &Assessment,
        target_page: u32,
        is_final: bool,
        expected_version: Option<i64>,
    ) -> Result<Assessment, AssessmentError> {
        check_target(target_page, is_final)?;

        let attempts = if expected_version.is_some() { 1 } else { 2 };
        let mut attempt = 0;
        loop {
            attempt += 1;
            let stored = self.load_assessment(id, customer_id).await?;
            let next = apply_step(&stored, snapshot, target_page, is_final);

            if next.same_content(&stored) {
                debug!(id = %id, "Save carries no changes, skipping write");
                return Ok(stored);
            }

            let expected = expected_version.unwrap_or(stored.version);
            if expected != stored.version {
                return Err(AssessmentError::VersionConflict { id, expected });
            }

            match self.store.replace(&next, Some(expected)).await {
                Ok(saved) => {
                    info!(
                        id = %id,
                        current_page = saved.current_page,
                        is_complete = saved.is_complete,
                        version = saved.version,
                        "Assessment saved"
                    );
                    return Ok(saved);
                }
                Err(DatabaseError::VersionConflict { .. }) if attempt < attempts => {
                    debug!(id = %id, expected, "Concurrent write, recomputing save");
                }
                Err(e) => return Err(AssessmentError::from_store(e, id, customer_id)),
            }
        }
    }
}

/// The document a step save would store on top of `stored`.
fn apply_step(stored: &Assessment, snapshot: &Assessment, target_page: u32, is_final: bool) -> Assessment {
    let mut next = stored.clone();
    next.replace_sections_from(snapshot);
    if !stored.is_complete {
        next.current_page = target_page;
        if is_final {
            next.is_complete = true;
            next.completed_at = Some(Utc::now());
        }
    }
    next
}

/// `target_page == STEP_COUNT` is reserved for the final save, and the final
/// save must land exactly there.
fn check_target(target_page: u32, is_final: bool) -> Result<(), AssessmentError> {
    let page = target_page as usize;
    if page > STEP_COUNT {
        return Err(AssessmentError::OutOfRange {
            index: page,
            reason: format!("page beyond last step ({STEP_COUNT})"),
        });
    }
    if is_final && page != STEP_COUNT {
        return Err(AssessmentError::OutOfRange {
            index: page,
            reason: format!("finishing must target page {STEP_COUNT}"),
        });
    }
    if !is_final && page == STEP_COUNT {
        return Err(AssessmentError::OutOfRange {
            index: page,
            reason: "the final page is only reachable by finishing".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::model::VehicleInfo;
    use crate::store::{DocumentFilter, LibSqlBackend};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Store that lets another writer finish the document just before the
    /// first replace goes through.
    struct RacingStore {
        inner: LibSqlBackend,
        raced: AtomicBool,
    }

    #[async_trait]
    impl AssessmentStore for RacingStore {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            self.inner.run_migrations().await
        }

        async fn create(&self, doc: &Assessment) -> Result<Assessment, DatabaseError> {
            self.inner.create(doc).await
        }

        async fn read(&self, id: Uuid, customer_id: &str) -> Result<Option<Assessment>, DatabaseError> {
            self.inner.read(id, customer_id).await
        }

        async fn replace(
            &self,
            doc: &Assessment,
            expected_version: Option<i64>,
        ) -> Result<Assessment, DatabaseError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut other = self.inner.read(doc.id, &doc.customer_id).await?.unwrap();
                other.current_page = STEP_COUNT as u32;
                other.is_complete = true;
                other.completed_at = Some(Utc::now());
                self.inner.replace(&other, None).await?;
            }
            self.inner.replace(doc, expected_version).await
        }

        async fn query(&self, filter: &DocumentFilter) -> Result<Vec<Assessment>, DatabaseError> {
            self.inner.query(filter).await
        }
    }

    async fn coordinator() -> (PersistenceCoordinator, Arc<dyn AssessmentStore>) {
        let store: Arc<dyn AssessmentStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        (PersistenceCoordinator::new(Arc::clone(&store)), store)
    }

    fn vehicle() -> VehicleInfo {
        VehicleInfo {
            brand: "Hyundai".into(),
            model: "Kona".into(),
            year: Some(2020),
        }
    }

    #[tokio::test]
    async fn create_allocates_identifiers() {
        let (coord, store) = coordinator().await;
        let a = coord.create_assessment(None).await.unwrap();
        let b = coord.create_assessment(None).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.customer_id, b.customer_id);

        let doc = coord.load_assessment(a.id, &a.customer_id).await.unwrap();
        assert_eq!(doc.current_page, 0);
        assert!(!doc.is_complete);
        assert_eq!(store.query(&DocumentFilter::all()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_keeps_initial_personal_section() {
        let (coord, _) = coordinator().await;
        let personal = PersonalInfo {
            first_name: "Ivo".into(),
            ..Default::default()
        };
        let key = coord.create_assessment(Some(personal.clone())).await.unwrap();
        let doc = coord.load_assessment(key.id, &key.customer_id).await.unwrap();
        assert_eq!(doc.personal_info, Some(personal));
    }

    #[tokio::test]
    async fn load_with_wrong_partition_is_not_found() {
        let (coord, _) = coordinator().await;
        let key = coord.create_assessment(None).await.unwrap();
        let err = coord.load_assessment(key.id, "someone-else").await.unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn save_step_replaces_sections_and_page() {
        let (coord, _) = coordinator().await;
        let key = coord.create_assessment(None).await.unwrap();
        let mut snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();
        snapshot.vehicle_info = Some(vehicle());

        let saved = coord
            .save_step(key.id, &key.customer_id, &snapshot, 2, false, None)
            .await
            .unwrap();
        assert_eq!(saved.current_page, 2);
        assert_eq!(saved.vehicle_brand(), Some("Hyundai"));
        assert_eq!(saved.version, 2);
    }

    #[tokio::test]
    async fn identical_save_is_not_written() {
        let (coord, _) = coordinator().await;
        let key = coord.create_assessment(None).await.unwrap();
        let mut snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();
        snapshot.vehicle_info = Some(vehicle());

        let first = coord
            .save_step(key.id, &key.customer_id, &snapshot, 1, false, None)
            .await
            .unwrap();
        let second = coord
            .save_step(key.id, &key.customer_id, &snapshot, 1, false, Some(1))
            .await
            .unwrap();
        assert_eq!(first.version, second.version);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let (coord, _) = coordinator().await;
        let key = coord.create_assessment(None).await.unwrap();
        let snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();

        coord
            .save_step(key.id, &key.customer_id, &snapshot, 1, false, Some(1))
            .await
            .unwrap();
        let err = coord
            .save_step(key.id, &key.customer_id, &snapshot, 2, false, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::VersionConflict { expected: 1, .. }));
    }

    #[tokio::test]
    async fn final_save_sets_completion_once() {
        let (coord, _) = coordinator().await;
        let key = coord.create_assessment(None).await.unwrap();
        let snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();

        let done = coord
            .save_step(key.id, &key.customer_id, &snapshot, STEP_COUNT as u32, true, None)
            .await
            .unwrap();
        assert!(done.is_complete);
        assert_eq!(done.current_page, STEP_COUNT as u32);
        let completed_at = done.completed_at.unwrap();
        assert!(done.check_invariants().is_ok());

        let mut edited = done.clone();
        edited.vehicle_info = Some(vehicle());
        let after = coord
            .save_step(key.id, &key.customer_id, &edited, 2, false, None)
            .await
            .unwrap();
        assert!(after.is_complete);
        assert_eq!(after.current_page, STEP_COUNT as u32);
        assert_eq!(after.completed_at, Some(completed_at));
        assert_eq!(after.vehicle_brand(), Some("Hyundai"));
    }

    #[tokio::test]
    async fn out_of_range_targets_are_rejected() {
        let (coord, _) = coordinator().await;
        let key = coord.create_assessment(None).await.unwrap();
        let snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();

        for (page, is_final) in [(7, false), (7, true), (6, false), (3, true)] {
            let err = coord
                .save_step(key.id, &key.customer_id, &snapshot, page, is_final, None)
                .await
                .unwrap_err();
            assert!(
                matches!(err, AssessmentError::OutOfRange { .. }),
                "page {page} final {is_final}"
            );
        }
        let doc = coord.load_assessment(key.id, &key.customer_id).await.unwrap();
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn save_for_missing_document_is_not_found() {
        let (coord, _) = coordinator().await;
        let snapshot = Assessment::new("nobody");
        let err = coord
            .save_step(snapshot.id, "nobody", &snapshot, 1, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn completion_survives_a_concurrent_unconditional_save() {
        let store = Arc::new(RacingStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            raced: AtomicBool::new(false),
        });
        let coord = PersistenceCoordinator::new(Arc::clone(&store) as Arc<dyn AssessmentStore>);
        let key = coord.create_assessment(None).await.unwrap();
        let mut snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();
        snapshot.vehicle_info = Some(vehicle());

        let saved = coord
            .save_step(key.id, &key.customer_id, &snapshot, 2, false, None)
            .await
            .unwrap();
        assert!(saved.is_complete);
        assert_eq!(saved.current_page, STEP_COUNT as u32);
        assert!(saved.completed_at.is_some());
        assert_eq!(saved.vehicle_brand(), Some("Hyundai"));
        assert!(saved.check_invariants().is_ok());
    }

    #[tokio::test]
    async fn concurrent_save_with_version_is_conflict() {
        let store = Arc::new(RacingStore {
            inner: LibSqlBackend::new_memory().await.unwrap(),
            raced: AtomicBool::new(false),
        });
        let coord = PersistenceCoordinator::new(Arc::clone(&store) as Arc<dyn AssessmentStore>);
        let key = coord.create_assessment(None).await.unwrap();
        let snapshot = coord.load_assessment(key.id, &key.customer_id).await.unwrap();

        let err = coord
            .save_step(key.id, &key.customer_id, &snapshot, 2, false, Some(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AssessmentError::VersionConflict { expected: 1, .. }));
        let doc = coord.load_assessment(key.id, &key.customer_id).await.unwrap();
        assert!(doc.is_complete);
        assert_eq!(doc.current_page, STEP_COUNT as u32);
    }
}
