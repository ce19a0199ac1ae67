use thiserror::Error;

use crate::error::GenerationError;
use crate::models::{Persona, ReferenceImage, StoryBatch};

const CREDENTIAL_NOTICE: &str = "Valid API Key is required to generate content.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Analyzing,
    Planning,
    Generating,
    Success,
    Error,
}

impl Phase {
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Analyzing | Phase::Planning | Phase::Generating)
    }
}

/// What the user is told after a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub message: String,
    /// The remedy is to add or update the API key.
    pub credential_problem: bool,
}

impl ErrorNotice {
    pub fn from_failure(err: &GenerationError, context: &str) -> Self {
        if err.is_credential_problem() {
            return ErrorNotice {
                message: CREDENTIAL_NOTICE.to_string(),
                credential_problem: true,
            };
        }
        let detail = err.to_string();
        let message = if detail.is_empty() {
            context.to_string()
        } else {
            format!("{context} ({detail})")
        };
        ErrorNotice {
            message,
            credential_problem: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// User picked a photo: it becomes the reference right away.
    PhotoSelected(ReferenceImage),
    /// User submitted the creator form: the old identity is discarded.
    CreatorSubmitted,
    ReferenceGenerated(ReferenceImage),
    PersonaReady(Persona),
    StoryRequested,
    StoryPlanned,
    StudioRequested,
    BatchCompleted(StoryBatch),
    /// Timer fired for the success banner with this epoch.
    SuccessElapsed { epoch: u64 },
    Failed(ErrorNotice),
    CredentialChecked { present: bool },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::PhotoSelected(_) => "photo_selected",
            Action::CreatorSubmitted => "creator_submitted",
            Action::ReferenceGenerated(_) => "reference_generated",
            Action::PersonaReady(_) => "persona_ready",
            Action::StoryRequested => "story_requested",
            Action::StoryPlanned => "story_planned",
            Action::StudioRequested => "studio_requested",
            Action::BatchCompleted(_) => "batch_completed",
            Action::SuccessElapsed { .. } => "success_elapsed",
            Action::Failed(_) => "failed",
            Action::CredentialChecked { .. } => "credential_checked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("another operation is already running ({0:?})")]
    Busy(Phase),
    #[error("{action} is not valid while {phase:?}")]
    Unexpected { action: &'static str, phase: Phase },
    #[error("a persona, a reference image and an API key are required first")]
    NotReady,
}

/// Application state. Only [`AppModel::apply`] changes it; a rejected action
/// leaves it untouched.
#[derive(Debug, Clone, Default)]
pub struct AppModel {
    pub phase: Phase,
    pub reference: Option<ReferenceImage>,
    pub persona: Option<Persona>,
    /// Newest first.
    pub stories: Vec<StoryBatch>,
    pub error: Option<ErrorNotice>,
    pub has_credential: bool,
    /// Bumped on every completed batch so stale success timers are ignored.
    pub success_epoch: u64,
}

impl AppModel {
    pub fn new(has_credential: bool) -> Self {
        AppModel {
            has_credential,
            ..AppModel::default()
        }
    }

    pub fn can_generate(&self) -> bool {
        self.persona.is_some() && self.reference.is_some() && self.has_credential
    }

    fn begin_user_action(&self) -> Result<(), TransitionError> {
        if self.phase.is_busy() {
            Err(TransitionError::Busy(self.phase))
        } else {
            Ok(())
        }
    }

    fn expect_phase(&self, phase: Phase, action: &'static str) -> Result<(), TransitionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(TransitionError::Unexpected {
                action,
                phase: self.phase,
            })
        }
    }

    pub fn apply(&mut self, action: Action) -> Result<(), TransitionError> {
        match action {
            Action::PhotoSelected(reference) => {
                self.begin_user_action()?;
                self.reference = Some(reference);
                self.persona = None;
                self.stories.clear();
                self.error = None;
                self.phase = Phase::Analyzing;
            }
            Action::CreatorSubmitted => {
                self.begin_user_action()?;
                self.reference = None;
                self.persona = None;
                self.stories.clear();
                self.error = None;
                self.phase = Phase::Analyzing;
            }
            Action::ReferenceGenerated(reference) => {
                self.expect_phase(Phase::Analyzing, "reference_generated")?;
                self.reference = Some(reference);
            }
            Action::PersonaReady(persona) => {
                if self.phase != Phase::Analyzing || self.reference.is_none() {
                    return Err(TransitionError::Unexpected {
                        action: "persona_ready",
                        phase: self.phase,
                    });
                }
                self.persona = Some(persona);
                self.phase = Phase::Idle;
            }
            Action::StoryRequested | Action::StudioRequested => {
                self.begin_user_action()?;
                if !self.can_generate() {
                    return Err(TransitionError::NotReady);
                }
                self.error = None;
                self.phase = if matches!(action, Action::StoryRequested) {
                    Phase::Planning
                } else {
                    Phase::Generating
                };
            }
            Action::StoryPlanned => {
                self.expect_phase(Phase::Planning, action.name())?;
                self.phase = Phase::Generating;
            }
            Action::BatchCompleted(batch) => {
                self.expect_phase(Phase::Generating, "batch_completed")?;
                self.stories.insert(0, batch);
                self.success_epoch += 1;
                self.phase = Phase::Success;
            }
            Action::SuccessElapsed { epoch } => {
                if self.phase == Phase::Success && epoch == self.success_epoch {
                    self.phase = Phase::Idle;
                }
            }
            Action::Failed(notice) => {
                if !self.phase.is_busy() {
                    return Err(TransitionError::Unexpected {
                        action: "failed",
                        phase: self.phase,
                    });
                }
                if notice.credential_problem {
                    self.has_credential = false;
                }
                self.error = Some(notice);
                self.phase = Phase::Error;
            }
            Action::CredentialChecked { present } => {
                self.has_credential = present;
                if present {
                    self.error = None;
                    if self.phase == Phase::Error {
                        self.phase = Phase::Idle;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::fake::{image_for, sample_persona, sample_reference};
    use crate::models::BatchKind;

    fn ready_model() -> AppModel {
        let mut model = AppModel::new(true);
        model.apply(Action::PhotoSelected(sample_reference())).unwrap();
        model.apply(Action::PersonaReady(sample_persona())).unwrap();
        model
    }

    fn batch(label: &str) -> StoryBatch {
        StoryBatch::new(BatchKind::Story, label, vec![(image_for("p0"), "p0".to_string())], Vec::new())
    }

    #[test]
    fn photo_flow_analyzes_then_idles() {
        let mut model = AppModel::new(true);
        model.apply(Action::PhotoSelected(sample_reference())).unwrap();
        assert_eq!(model.phase, Phase::Analyzing);
        assert!(model.reference.is_some());
        assert!(model.persona.is_none());

        model.apply(Action::PersonaReady(sample_persona())).unwrap();
        assert_eq!(model.phase, Phase::Idle);
        assert!(model.can_generate());
    }

    #[test]
    fn creator_flow_clears_identity_until_image_arrives() {
        let mut model = ready_model();
        model.apply(Action::CreatorSubmitted).unwrap();
        assert!(model.reference.is_none() && model.persona.is_none());

        let early = model.apply(Action::PersonaReady(sample_persona()));
        assert!(matches!(early, Err(TransitionError::Unexpected { .. })));

        model
            .apply(Action::ReferenceGenerated(sample_reference()))
            .unwrap();
        model.apply(Action::PersonaReady(sample_persona())).unwrap();
        assert_eq!(model.phase, Phase::Idle);
    }

    #[test]
    fn story_walks_planning_generating_success_idle() {
        let mut model = ready_model();
        model.apply(Action::StoryRequested).unwrap();
        assert_eq!(model.phase, Phase::Planning);
        model.apply(Action::StoryPlanned).unwrap();
        assert_eq!(model.phase, Phase::Generating);
        model.apply(Action::BatchCompleted(batch("first"))).unwrap();
        assert_eq!(model.phase, Phase::Success);

        model
            .apply(Action::SuccessElapsed {
                epoch: model.success_epoch,
            })
            .unwrap();
        assert_eq!(model.phase, Phase::Idle);
    }

    #[test]
    fn studio_skips_planning() {
        let mut model = ready_model();
        model.apply(Action::StudioRequested).unwrap();
        assert_eq!(model.phase, Phase::Generating);
        assert!(matches!(
            model.apply(Action::StoryPlanned),
            Err(TransitionError::Unexpected { .. })
        ));
    }

    #[test]
    fn batches_are_kept_newest_first() {
        let mut model = ready_model();
        for label in ["first", "second"] {
            model.apply(Action::StudioRequested).unwrap();
            model.apply(Action::BatchCompleted(batch(label))).unwrap();
        }
        let labels: Vec<&str> = model.stories.iter().map(|b| b.scenario.as_str()).collect();
        assert_eq!(labels, vec!["second", "first"]);
    }

    #[test]
    fn new_identity_discards_previous_batches() {
        let mut model = ready_model();
        model.apply(Action::StudioRequested).unwrap();
        model.apply(Action::BatchCompleted(batch("old face"))).unwrap();

        model.apply(Action::PhotoSelected(ReferenceImage::new(image_for("second photo")))).unwrap();
        assert!(model.stories.is_empty());
        assert!(model.persona.is_none());

        model.apply(Action::PersonaReady(sample_persona())).unwrap();
        model.apply(Action::StudioRequested).unwrap();
        model.apply(Action::BatchCompleted(batch("new face"))).unwrap();
        model.apply(Action::CreatorSubmitted).unwrap();
        assert!(model.stories.is_empty());
        assert!(model.reference.is_none());
    }

    #[test]
    fn generation_requires_persona_reference_and_key() {
        let mut model = AppModel::new(true);
        assert_eq!(
            model.apply(Action::StoryRequested),
            Err(TransitionError::NotReady)
        );

        let mut model = ready_model();
        model.apply(Action::CredentialChecked { present: false }).unwrap();
        assert_eq!(
            model.apply(Action::StudioRequested),
            Err(TransitionError::NotReady)
        );
        assert_eq!(model.phase, Phase::Idle);
    }

    #[test]
    fn user_actions_are_rejected_while_busy() {
        let mut model = ready_model();
        model.apply(Action::StoryRequested).unwrap();
        assert_eq!(
            model.apply(Action::PhotoSelected(sample_reference())),
            Err(TransitionError::Busy(Phase::Planning))
        );
        assert_eq!(
            model.apply(Action::CreatorSubmitted),
            Err(TransitionError::Busy(Phase::Planning))
        );
        assert!(model.persona.is_some());
    }

    #[test]
    fn failure_moves_to_error_until_next_user_action() {
        let mut model = ready_model();
        model.apply(Action::StoryRequested).unwrap();
        let notice = ErrorNotice::from_failure(
            &GenerationError::GenerationFailed("no images".into()),
            "Failed to generate story.",
        );
        model.apply(Action::Failed(notice)).unwrap();
        assert_eq!(model.phase, Phase::Error);
        assert_eq!(
            model.error.as_ref().map(|n| n.message.as_str()),
            Some("Failed to generate story. (no images)")
        );

        model.apply(Action::StoryRequested).unwrap();
        assert_eq!(model.phase, Phase::Planning);
        assert!(model.error.is_none());
    }

    #[test]
    fn credential_failure_drops_key_flag_and_update_clears_error() {
        let mut model = ready_model();
        model.apply(Action::StudioRequested).unwrap();
        let notice = ErrorNotice::from_failure(&GenerationError::InvalidCredential, "ignored");
        assert!(notice.credential_problem);
        model.apply(Action::Failed(notice)).unwrap();
        assert!(!model.has_credential);

        model.apply(Action::CredentialChecked { present: true }).unwrap();
        assert_eq!(model.phase, Phase::Idle);
        assert!(model.error.is_none());
        assert!(model.can_generate());
    }

    #[test]
    fn stale_success_timer_is_ignored() {
        let mut model = ready_model();
        model.apply(Action::StudioRequested).unwrap();
        model.apply(Action::BatchCompleted(batch("first"))).unwrap();
        let stale = model.success_epoch;
        model.apply(Action::StudioRequested).unwrap();
        model.apply(Action::BatchCompleted(batch("second"))).unwrap();

        model.apply(Action::SuccessElapsed { epoch: stale }).unwrap();
        assert_eq!(model.phase, Phase::Success);
    }

    #[test]
    fn failed_is_only_valid_in_flight() {
        let mut model = ready_model();
        let notice = ErrorNotice::from_failure(&GenerationError::CredentialMissing, "x");
        assert!(matches!(
            model.apply(Action::Failed(notice)),
            Err(TransitionError::Unexpected { .. })
        ));
    }
}
