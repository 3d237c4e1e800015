//! Assessment engine: the six-step survey wizard.
//!
//! A `WizardSession` walks the steps locally; the `PersistenceCoordinator`
//! writes the document after every transition. `WizardDriver` pairs the two
//! for callers that want persist-or-roll-back semantics.

pub mod coordinator;
pub mod driver;
pub mod model;
pub mod progression;
pub mod routes;
pub mod steps;

pub use coordinator::PersistenceCoordinator;
pub use driver::WizardDriver;
pub use model::{Assessment, AssessmentKey, Classification, SectionPayload};
pub use progression::{StepStatus, StepView, Transition, WizardPosition, WizardSession};
pub use routes::{AssessmentRouteState, assessment_routes};
pub use steps::{STEP_COUNT, Step, StepFailure};
