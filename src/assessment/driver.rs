//! Wizard driver: runs a `WizardSession` against the coordinator.
//!
//! Each transition is applied to a copy of the session, persisted, and
//! only then committed. A refused transition or a failed save leaves the
//! session exactly as it was.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AssessmentError, ProgressionError};

use super::coordinator::PersistenceCoordinator;
use super::model::{Assessment, AssessmentKey, PersonalInfo, SectionPayload};
use super::progression::{StepView, Transition, WizardPosition, WizardSession};

pub struct WizardDriver {
    coordinator: Arc<PersistenceCoordinator>,
    session: WizardSession,
}

impl WizardDriver {
    /// Create a new document and start the wizard on the first step.
    pub async fn begin(
        coordinator: Arc<PersistenceCoordinator>,
        initial_personal: Option<PersonalInfo>,
    ) -> Result<Self, AssessmentError> {
        let key = coordinator.create_assessment(initial_personal).await?;
        let doc = coordinator
            .load_assessment(key.id, &key.customer_id)
            .await?;
        let mut session = WizardSession::new(doc);
        session.start()?;
        Ok(Self {
            coordinator,
            session,
        })
    }

    /// Continue a stored assessment.
    pub async fn resume(
        coordinator: Arc<PersistenceCoordinator>,
        id: Uuid,
        customer_id: &str,
    ) -> Result<Self, AssessmentError> {
        let doc = coordinator.load_assessment(id, customer_id).await?;
        Ok(Self {
            coordinator,
            session: WizardSession::resume(doc),
        })
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn document(&self) -> &Assessment {
        self.session.document()
    }

    pub fn key(&self) -> AssessmentKey {
        self.session.document().key()
    }

    pub fn position(&self) -> WizardPosition {
        self.session.position()
    }

    pub fn step_views(&self) -> Vec<StepView> {
        self.session.step_views()
    }

    /// Local edit; persisted with the next transition.
    pub fn edit(&mut self, payload: SectionPayload) -> Result<(), ProgressionError> {
        self.session.edit(payload)
    }

    pub async fn advance(&mut self) -> Result<Transition, AssessmentError> {
        self.apply(WizardSession::advance).await
    }

    pub async fn retreat(&mut self) -> Result<Transition, AssessmentError> {
        self.apply(WizardSession::retreat).await
    }

    pub async fn jump_to(&mut self, index: usize) -> Result<Transition, AssessmentError> {
        self.apply(|s| s.jump_to(index)).await
    }

    pub async fn finish(&mut self) -> Result<Transition, AssessmentError> {
        self.apply(WizardSession::finish).await
    }

    async fn apply<F>(&mut self, op: F) -> Result<Transition, AssessmentError>
    where
        F: FnOnce(&mut WizardSession) -> Result<Transition, ProgressionError>,
    {
        let mut next = self.session.clone();
        let transition = op(&mut next)?;

        let stored = self.persist(&next, &transition).await?;
        next.apply_stored(&stored);
        self.session = next;

        debug!(
            id = %stored.id,
            from = %transition.from,
            to = %transition.to,
            "Wizard transition committed"
        );
        Ok(transition)
    }

    /// Save with one retry on a transient store failure. The retry is safe
    /// because an already applied identical save is a no-op.
    async fn persist(
        &self,
        next: &WizardSession,
        transition: &Transition,
    ) -> Result<Assessment, AssessmentError> {
        let doc = next.document();
        let expected = Some(self.session.document().version);

        let save = || {
            self.coordinator.save_step(
                doc.id,
                &doc.customer_id,
                doc,
                transition.target_page,
                transition.is_final,
                expected,
            )
        };

        match save().await {
            Err(e) if e.is_transient() => {
                warn!(id = %doc.id, error = %e, "Save failed, retrying once");
                save().await
            }
            other => other,
        }
    }
}
