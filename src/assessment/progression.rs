//! Wizard progression state machine.
//!
//! A `WizardSession` is the explicit value object holding one user's
//! in-progress survey: the local document snapshot, the current position,
//! the furthest step reached and which steps were confirmed by a save.
//! Transitions are plain methods returning a `Transition` that the caller
//! persists; a refused transition leaves the session untouched.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ProgressionError;

use super::model::{Assessment, SectionPayload};
use super::steps::{self, FieldIssue, STEP_COUNT, Step, StepFailure};

/// Where the wizard currently is.
///
/// Progresses: NotStarted → AtStep(0) → … → AtStep(STEP_COUNT - 1) → Finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum WizardPosition {
    #[default]
    NotStarted,
    AtStep(usize),
    Finished,
}

impl WizardPosition {
    /// Numeric index: -1 before start, the step index, or `STEP_COUNT` when finished.
    pub fn index(&self) -> isize {
        match self {
            Self::NotStarted => -1,
            Self::AtStep(k) => *k as isize,
            Self::Finished => STEP_COUNT as isize,
        }
    }
}

impl std::fmt::Display for WizardPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::AtStep(k) => write!(f, "at step {k}"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Derived per-step status, shared by the wizard UI and drop-off reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step being shown.
    Active,
    /// Behind the current step and its predicate does not hold.
    Skipped,
    /// Behind the current step, valid and confirmed by a save.
    Saved,
    /// Behind the current step, valid but edited without a save.
    Attention,
    /// Ahead of the current step.
    Inactive,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Skipped => "skipped",
            Self::Saved => "saved",
            Self::Attention => "attention",
            Self::Inactive => "inactive",
        };
        write!(f, "{s}")
    }
}

/// Status of step `step_index` when the wizard stands at `current_index`.
pub fn derive_status(
    step_index: usize,
    current_index: isize,
    predicate_holds: bool,
    was_confirmed: bool,
) -> StepStatus {
    let step = step_index as isize;
    if step == current_index {
        StepStatus::Active
    } else if step > current_index {
        StepStatus::Inactive
    } else if !predicate_holds {
        StepStatus::Skipped
    } else if was_confirmed {
        StepStatus::Saved
    } else {
        StepStatus::Attention
    }
}

/// An accepted transition, ready to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub from: WizardPosition,
    pub to: WizardPosition,
    /// `currentPage` to store with this transition.
    pub target_page: u32,
    /// Whether this is the terminal completion transition.
    pub is_final: bool,
}

/// One row of the wizard's step list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub index: usize,
    pub step: Step,
    pub title: &'static str,
    pub status: StepStatus,
    pub confirmed: bool,
    pub issues: Vec<FieldIssue>,
}

/// A single user's wizard state.
#[derive(Debug, Clone)]
pub struct WizardSession {
    document: Assessment,
    position: WizardPosition,
    /// Highest step index reached; `STEP_COUNT` once finished.
    max_reached: usize,
    confirmed: [bool; STEP_COUNT],
}

impl WizardSession {
    /// A session for a freshly created document, before `start()`.
    pub fn new(document: Assessment) -> Self {
        Self {
            document,
            position: WizardPosition::default(),
            max_reached: 0,
            confirmed: [false; STEP_COUNT],
        }
    }

    /// Rebuild a session from a stored document.
    ///
    /// Steps below `currentPage` were left through a save, so they count as
    /// confirmed. A complete document resumes as finished.
    pub fn resume(document: Assessment) -> Self {
        if document.is_complete {
            return Self {
                document,
                position: WizardPosition::Finished,
                max_reached: STEP_COUNT,
                confirmed: [true; STEP_COUNT],
            };
        }

        let page = (document.current_page as usize).min(STEP_COUNT - 1);
        let mut confirmed = [false; STEP_COUNT];
        for flag in confirmed.iter_mut().take(page) {
            *flag = true;
        }
        Self {
            document,
            position: WizardPosition::AtStep(page),
            max_reached: page,
            confirmed,
        }
    }

    pub fn document(&self) -> &Assessment {
        &self.document
    }

    pub fn position(&self) -> WizardPosition {
        self.position
    }

    pub fn max_reached(&self) -> usize {
        self.max_reached
    }

    pub fn is_confirmed(&self, step: Step) -> bool {
        self.confirmed[step.index()]
    }

    /// `NotStarted → AtStep(0)`.
    pub fn start(&mut self) -> Result<Transition, ProgressionError> {
        if self.position != WizardPosition::NotStarted {
            return Err(self.refuse("start"));
        }
        let from = self.position;
        self.position = WizardPosition::AtStep(0);
        Ok(self.transition(from, false))
    }

    /// Confirm the current step and move forward. On the last step this is
    /// the finish transition and carries its validation gate.
    ///
    /// Leaving a step does not require its predicate to hold; an invalid
    /// step left behind shows up as `skipped`.
    pub fn advance(&mut self) -> Result<Transition, ProgressionError> {
        let k = match self.position {
            WizardPosition::AtStep(k) => k,
            _ => return Err(self.refuse("advance")),
        };
        if k == STEP_COUNT - 1 {
            return self.finish();
        }

        let from = self.position;
        self.confirmed[k] = true;
        self.position = WizardPosition::AtStep(k + 1);
        self.max_reached = self.max_reached.max(k + 1);
        self.document.current_page = self.max_reached as u32;
        Ok(self.transition(from, false))
    }

    /// Move one step back. Always allowed above the first step.
    pub fn retreat(&mut self) -> Result<Transition, ProgressionError> {
        let k = match self.position {
            WizardPosition::AtStep(k) => k,
            _ => return Err(self.refuse("retreat")),
        };
        if k == 0 {
            return Err(ProgressionError::OutOfRange {
                index: 0,
                reason: "already at the first step".to_string(),
            });
        }

        let from = self.position;
        self.position = WizardPosition::AtStep(k - 1);
        Ok(self.transition(from, false))
    }

    /// Jump directly to an already reached step.
    pub fn jump_to(&mut self, index: usize) -> Result<Transition, ProgressionError> {
        if index >= STEP_COUNT {
            return Err(ProgressionError::OutOfRange {
                index,
                reason: format!("there are only {STEP_COUNT} steps"),
            });
        }
        if !matches!(self.position, WizardPosition::AtStep(_)) {
            return Err(self.refuse("jump"));
        }
        if index > self.max_reached {
            return Err(ProgressionError::OutOfRange {
                index,
                reason: format!("step not reached yet (furthest is {})", self.max_reached),
            });
        }

        let from = self.position;
        self.position = WizardPosition::AtStep(index);
        Ok(self.transition(from, false))
    }

    /// Terminal transition from the last step. Every step's predicate must
    /// hold; otherwise the failing steps are returned and nothing changes.
    pub fn finish(&mut self) -> Result<Transition, ProgressionError> {
        if self.position != WizardPosition::AtStep(STEP_COUNT - 1) {
            return Err(self.refuse("finish"));
        }
        let failures = self.finish_failures();
        if !failures.is_empty() {
            return Err(ProgressionError::ValidationFailed { failures });
        }

        let from = self.position;
        self.confirmed[STEP_COUNT - 1] = true;
        self.position = WizardPosition::Finished;
        self.max_reached = STEP_COUNT;
        self.document.current_page = STEP_COUNT as u32;
        self.document.is_complete = true;
        if self.document.completed_at.is_none() {
            self.document.completed_at = Some(Utc::now());
        }
        Ok(self.transition(from, true))
    }

    /// Replace one section payload. Only reached steps may be edited, and
    /// editing clears the step's confirmation until it is saved again.
    pub fn edit(&mut self, payload: SectionPayload) -> Result<(), ProgressionError> {
        if !matches!(self.position, WizardPosition::AtStep(_)) {
            return Err(self.refuse("edit"));
        }
        let step = payload.step();
        if step.index() > self.max_reached {
            return Err(ProgressionError::OutOfRange {
                index: step.index(),
                reason: format!("step not reached yet (furthest is {})", self.max_reached),
            });
        }
        self.document.set_section(payload);
        self.confirmed[step.index()] = false;
        Ok(())
    }

    /// Steps that would block `finish()` right now.
    pub fn finish_failures(&self) -> Vec<StepFailure> {
        steps::validate_all(&self.document)
    }

    pub fn status_of(&self, step: Step) -> StepStatus {
        derive_status(
            step.index(),
            self.position.index(),
            step.is_valid(&self.document),
            self.confirmed[step.index()],
        )
    }

    /// Per-step rows for rendering.
    pub fn step_views(&self) -> Vec<StepView> {
        Step::ALL
            .iter()
            .map(|&step| {
                let issues = step.issues(&self.document);
                StepView {
                    index: step.index(),
                    step,
                    title: step.title(),
                    status: derive_status(
                        step.index(),
                        self.position.index(),
                        issues.is_empty(),
                        self.confirmed[step.index()],
                    ),
                    confirmed: self.confirmed[step.index()],
                    issues,
                }
            })
            .collect()
    }

    /// Adopt the document returned by the store after a save (server
    /// timestamps, version, completion time).
    pub fn apply_stored(&mut self, stored: &Assessment) {
        self.document = stored.clone();
    }

    fn transition(&self, from: WizardPosition, is_final: bool) -> Transition {
        Transition {
            from,
            to: self.position,
            target_page: self.document.current_page,
            is_final,
        }
    }

    fn refuse(&self, action: &str) -> ProgressionError {
        ProgressionError::InvalidTransition {
            action: action.to_string(),
            position: self.position.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::model::{
        Address, ChargerLocationInfo, ChargerSpec, ElectricalPanelInfo, EvChargerInfo, HomeInfo,
        PersonalInfo, VehicleInfo,
    };
    use rust_decimal_macros::dec;

    fn all_sections() -> Vec<SectionPayload> {
        vec![
            SectionPayload::Personal(PersonalInfo {
                first_name: "Jana".into(),
                last_name: "Kovac".into(),
                email: "jana@example.com".into(),
                phone: "0641234567".into(),
            }),
            SectionPayload::Vehicle(VehicleInfo {
                brand: "Renault".into(),
                model: "Zoe".into(),
                year: Some(2021),
            }),
            SectionPayload::ElectricalPanel(ElectricalPanelInfo {
                location: "Garage".into(),
                main_breaker_capacity: Some(dec!(63)),
                number_of_open_slots: Some(2),
            }),
            SectionPayload::ChargerLocation(ChargerLocationInfo {
                location: "Garage".into(),
                distance_from_panel: Some(dec!(3)),
            }),
            SectionPayload::Home(HomeInfo {
                address: Address {
                    country: "Germany".into(),
                    city: "Munich".into(),
                    street: "Leopoldstrasse".into(),
                    street_number: "4".into(),
                    postal_code: "80802".into(),
                },
                number_of_high_energy_devices: Some(1),
            }),
            SectionPayload::EvCharger(EvChargerInfo {
                has_charger: Some(true),
                wants_to_buy: None,
                charger: ChargerSpec {
                    brand: "Easee".into(),
                    model: "One".into(),
                    power_kw: Some(dec!(22)),
                },
            }),
        ]
    }

    fn started() -> WizardSession {
        let mut session = WizardSession::new(Assessment::new("cust"));
        session.start().unwrap();
        session
    }

    /// Fill and save every step up to (not including) finish.
    fn filled_to_last_step() -> WizardSession {
        let mut session = started();
        for payload in all_sections() {
            session.edit(payload).unwrap();
            if session.position() != WizardPosition::AtStep(STEP_COUNT - 1) {
                session.advance().unwrap();
            }
        }
        session
    }

    #[test]
    fn derive_status_table() {
        assert_eq!(derive_status(2, 2, false, false), StepStatus::Active);
        assert_eq!(derive_status(3, 2, true, true), StepStatus::Inactive);
        assert_eq!(derive_status(1, 2, false, true), StepStatus::Skipped);
        assert_eq!(derive_status(1, 2, true, true), StepStatus::Saved);
        assert_eq!(derive_status(1, 2, true, false), StepStatus::Attention);
        assert_eq!(derive_status(0, -1, true, true), StepStatus::Inactive);
        assert_eq!(
            derive_status(5, STEP_COUNT as isize, true, true),
            StepStatus::Saved
        );
    }

    #[test]
    fn start_only_from_not_started() {
        let mut session = WizardSession::new(Assessment::new("c"));
        assert_eq!(session.position(), WizardPosition::NotStarted);
        assert_eq!(WizardPosition::default().index(), -1);
        let t = session.start().unwrap();
        assert_eq!(t.from, WizardPosition::NotStarted);
        assert_eq!(t.to, WizardPosition::AtStep(0));
        assert_eq!(t.target_page, 0);
        assert!(matches!(
            session.start(),
            Err(ProgressionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn advance_allows_skipping_incomplete_steps() {
        let mut session = started();
        let t = session.advance().unwrap();
        assert_eq!(t.to, WizardPosition::AtStep(1));
        assert_eq!(t.target_page, 1);
        assert!(!t.is_final);
        assert_eq!(session.document().current_page, 1);
        assert_eq!(session.status_of(Step::Personal), StepStatus::Skipped);
        assert_eq!(session.status_of(Step::Vehicle), StepStatus::Active);
        assert_eq!(session.status_of(Step::Home), StepStatus::Inactive);
    }

    #[test]
    fn advance_before_start_is_refused() {
        let mut session = WizardSession::new(Assessment::new("c"));
        assert!(matches!(
            session.advance(),
            Err(ProgressionError::InvalidTransition { .. })
        ));
        assert_eq!(session.position(), WizardPosition::NotStarted);
    }

    #[test]
    fn retreat_keeps_max_reached() {
        let mut session = started();
        session.advance().unwrap();
        session.advance().unwrap();
        let t = session.retreat().unwrap();
        assert_eq!(t.to, WizardPosition::AtStep(1));
        assert_eq!(t.target_page, 2);
        assert_eq!(session.max_reached(), 2);
        assert_eq!(session.status_of(Step::ElectricalPanel), StepStatus::Inactive);
    }

    #[test]
    fn retreat_from_first_step_is_out_of_range() {
        let mut session = started();
        assert!(matches!(
            session.retreat(),
            Err(ProgressionError::OutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn jump_only_to_reached_steps() {
        let mut session = started();
        session.advance().unwrap();
        session.advance().unwrap();
        session.advance().unwrap();

        assert!(session.jump_to(1).is_ok());
        assert_eq!(session.position(), WizardPosition::AtStep(1));
        assert!(session.jump_to(3).is_ok());

        let err = session.jump_to(4).unwrap_err();
        assert!(matches!(err, ProgressionError::OutOfRange { index: 4, .. }));
        let err = session.jump_to(STEP_COUNT).unwrap_err();
        assert!(matches!(err, ProgressionError::OutOfRange { .. }));
        assert_eq!(session.position(), WizardPosition::AtStep(3));
    }

    #[test]
    fn finish_refused_lists_failing_steps_and_keeps_state() {
        let mut session = started();
        for _ in 0..STEP_COUNT - 1 {
            session.advance().unwrap();
        }
        session.edit(all_sections().remove(0)).unwrap();
        let before = session.clone();

        let err = session.finish().unwrap_err();
        match err {
            ProgressionError::ValidationFailed { failures } => {
                let names: Vec<Step> = failures.iter().map(|f| f.step).collect();
                assert_eq!(
                    names,
                    vec![
                        Step::Vehicle,
                        Step::ElectricalPanel,
                        Step::ChargerLocation,
                        Step::Home,
                        Step::EvCharger
                    ]
                );
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
        assert_eq!(session.position(), before.position());
        assert_eq!(session.document(), before.document());
    }

    #[test]
    fn advance_on_last_step_is_gated_finish() {
        let mut session = started();
        for _ in 0..STEP_COUNT - 1 {
            session.advance().unwrap();
        }
        assert!(matches!(
            session.advance(),
            Err(ProgressionError::ValidationFailed { .. })
        ));
        assert_eq!(
            session.position(),
            WizardPosition::AtStep(STEP_COUNT - 1)
        );
    }

    #[test]
    fn finish_succeeds_when_every_step_valid() {
        let mut session = filled_to_last_step();
        assert!(session.finish_failures().is_empty());

        let t = session.finish().unwrap();
        assert!(t.is_final);
        assert_eq!(t.to, WizardPosition::Finished);
        assert_eq!(t.target_page, STEP_COUNT as u32);

        let doc = session.document();
        assert!(doc.is_complete);
        assert!(doc.completed_at.is_some());
        assert!(doc.check_invariants().is_ok());
        assert!(session
            .step_views()
            .iter()
            .all(|v| v.status == StepStatus::Saved));
    }

    #[test]
    fn finish_only_from_last_step() {
        let mut session = started();
        assert!(matches!(
            session.finish(),
            Err(ProgressionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn nothing_moves_after_finish() {
        let mut session = filled_to_last_step();
        session.finish().unwrap();
        assert!(session.advance().is_err());
        assert!(session.retreat().is_err());
        assert!(session.jump_to(0).is_err());
        assert!(session.edit(all_sections().remove(0)).is_err());
    }

    #[test]
    fn edit_ahead_of_reached_step_is_refused() {
        let mut session = started();
        let err = session.edit(all_sections().remove(3)).unwrap_err();
        assert!(matches!(err, ProgressionError::OutOfRange { index: 3, .. }));
        assert!(session.document().charger_location.is_none());
    }

    #[test]
    fn editing_a_saved_step_needs_attention() {
        let mut doc = Assessment::new("c");
        doc.current_page = 3;
        doc.electrical_panel = Some(ElectricalPanelInfo {
            location: "Garage".into(),
            main_breaker_capacity: Some(dec!(63)),
            number_of_open_slots: Some(2),
        });
        let mut session = WizardSession::resume(doc);
        assert_eq!(session.position(), WizardPosition::AtStep(3));
        assert_eq!(session.status_of(Step::ElectricalPanel), StepStatus::Saved);

        session
            .edit(SectionPayload::ElectricalPanel(ElectricalPanelInfo {
                location: "Garage".into(),
                main_breaker_capacity: Some(dec!(40)),
                number_of_open_slots: Some(2),
            }))
            .unwrap();
        assert_eq!(
            session.status_of(Step::ElectricalPanel),
            StepStatus::Attention
        );

        session.jump_to(2).unwrap();
        session.advance().unwrap();
        assert_eq!(session.status_of(Step::ElectricalPanel), StepStatus::Saved);
    }

    #[test]
    fn resume_positions() {
        let session = WizardSession::resume(Assessment::new("c"));
        assert_eq!(session.position(), WizardPosition::AtStep(0));
        assert_eq!(session.max_reached(), 0);

        let mut doc = Assessment::new("c");
        doc.current_page = 4;
        let session = WizardSession::resume(doc);
        assert_eq!(session.position(), WizardPosition::AtStep(4));
        assert!(session.is_confirmed(Step::ChargerLocation));
        assert!(!session.is_confirmed(Step::Home));

        let mut session = filled_to_last_step();
        session.finish().unwrap();
        let resumed = WizardSession::resume(session.document().clone());
        assert_eq!(resumed.position(), WizardPosition::Finished);
    }

    #[test]
    fn position_serde_and_index() {
        let json = serde_json::to_value(WizardPosition::AtStep(2)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "at_step", "step": 2}));
        let json = serde_json::to_value(WizardPosition::Finished).unwrap();
        assert_eq!(json, serde_json::json!({"state": "finished"}));
        assert_eq!(WizardPosition::NotStarted.index(), -1);
        assert_eq!(WizardPosition::Finished.index(), STEP_COUNT as isize);
    }

    #[test]
    fn step_views_carry_issues() {
        let session = started();
        let views = session.step_views();
        assert_eq!(views.len(), STEP_COUNT);
        assert_eq!(views[0].status, StepStatus::Active);
        assert!(!views[0].issues.is_empty());
        assert_eq!(views[0].title, "Personal");
    }
}
