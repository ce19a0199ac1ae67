use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::credentials::CredentialProvider;
use crate::error::{GenerationError, InputError};
use crate::llm::media::read_image_file;
use crate::llm::GenerationClient;
use crate::models::{
    BatchKind, CameraSettings, CreatorAttributes, Persona, ReferenceImage, StoryBatch,
    STUDIO_LABEL,
};
use crate::pipeline::persona::{persona_from_attributes, persona_from_photo};
use crate::pipeline::story::run_story;
use crate::pipeline::studio::run_studio;
use crate::state::{Action, AppModel, ErrorNotice, Phase, TransitionError};
use crate::utils::timing::{complete_operation_timer, start_operation_timer};

const ANALYZE_FAILED: &str = "Could not analyze persona.";
const CREATE_FAILED: &str = "Failed to create persona.";
const STORY_FAILED: &str = "Failed to generate story.";
const STUDIO_FAILED: &str = "Failed to generate studio shot.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Read-only view of the session for rendering.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub reference: Option<ReferenceImage>,
    pub stories: Vec<StoryBatch>,
    pub error: Option<ErrorNotice>,
    pub has_credential: bool,
}

impl SessionSnapshot {
    /// The current error is fixed by adding or updating the API key.
    pub fn needs_credential_update(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|notice| notice.credential_problem)
    }
}

/// Drives the pipelines and feeds their results into the [`AppModel`].
///
/// The model lock is never held across an await; every transition goes through
/// [`Session::dispatch`].
#[derive(Clone)]
pub struct Session {
    model: Arc<Mutex<AppModel>>,
    client: Arc<dyn GenerationClient>,
    credentials: CredentialProvider,
    success_hold: Duration,
}

impl Session {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        credentials: CredentialProvider,
        success_hold: Duration,
    ) -> Self {
        let model = AppModel::new(credentials.has_credential());
        Session {
            model: Arc::new(Mutex::new(model)),
            client,
            credentials,
            success_hold,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let model = self.model.lock();
        SessionSnapshot {
            phase: model.phase,
            reference: model.reference.clone(),
            stories: model.stories.clone(),
            error: model.error.clone(),
            has_credential: model.has_credential,
        }
    }

    pub fn dispatch(&self, action: Action) -> Result<(), TransitionError> {
        let mut model = self.model.lock();
        let from = model.phase;
        let result = model.apply(action);
        match &result {
            Ok(()) => debug!(from = ?from, to = ?model.phase, "State transition"),
            Err(err) => warn!(phase = ?from, error = %err, "Rejected state transition"),
        }
        result
    }

    /// Moves the model to `Error` and hands the original failure back.
    fn fail(&self, err: GenerationError, context: &str) -> SessionError {
        let notice = ErrorNotice::from_failure(&err, context);
        warn!(error = %err, notice = %notice.message, "Operation failed");
        // Failed is only rejected outside an operation, which cannot happen here.
        let _ = self.dispatch(Action::Failed(notice));
        SessionError::Generation(err)
    }

    pub async fn upload_photo_file(&self, path: &Path) -> Result<Persona, SessionError> {
        let reference = read_image_file(path).await?;
        self.upload_photo(reference).await
    }

    /// Makes the photo the new identity and derives a persona from it.
    pub async fn upload_photo(&self, reference: ReferenceImage) -> Result<Persona, SessionError> {
        self.dispatch(Action::PhotoSelected(reference.clone()))?;

        let mut timer = start_operation_timer(
            "analyze_photo",
            Some(reference.payload().mime_type.as_str()),
        );
        let result = persona_from_photo(self.client.as_ref(), &reference).await;
        complete_operation_timer(&mut timer, &result);

        let persona = result.map_err(|err| self.fail(err, ANALYZE_FAILED))?;
        self.dispatch(Action::PersonaReady(persona.clone()))?;
        info!(nickname = %persona.nickname, "Persona ready from photo");
        Ok(persona)
    }

    /// Synthesizes a reference portrait from attributes and analyzes it. The
    /// portrait becomes the session reference as soon as it exists, so it is
    /// kept when the analysis fails.
    pub async fn create_persona(
        &self,
        attrs: &CreatorAttributes,
    ) -> Result<(ReferenceImage, Persona), SessionError> {
        attrs.validate()?;
        self.dispatch(Action::CreatorSubmitted)?;

        let summary = format!(
            "{} {} {}cm {}kg",
            attrs.gender, attrs.age, attrs.height_cm, attrs.weight_kg
        );
        let mut timer = start_operation_timer("create_persona", Some(&summary));
        let result = persona_from_attributes(self.client.as_ref(), attrs, |reference| {
            if let Err(err) = self.dispatch(Action::ReferenceGenerated(reference.clone())) {
                warn!(error = %err, "Reference generated outside of analysis");
            }
        })
        .await;
        complete_operation_timer(&mut timer, &result);

        let (reference, persona) = result.map_err(|err| self.fail(err, CREATE_FAILED))?;
        self.dispatch(Action::PersonaReady(persona.clone()))?;
        info!(nickname = %persona.nickname, "Persona ready from attributes");
        Ok((reference, persona))
    }

    fn identity(&self) -> Result<(ReferenceImage, Persona), SessionError> {
        let model = self.model.lock();
        match (&model.reference, &model.persona) {
            (Some(reference), Some(persona)) => Ok((reference.clone(), persona.clone())),
            _ => Err(TransitionError::NotReady.into()),
        }
    }

    pub async fn generate_story(&self, scenario: Option<&str>) -> Result<StoryBatch, SessionError> {
        self.dispatch(Action::StoryRequested)?;
        let (reference, persona) = self.identity()?;

        let mut timer = start_operation_timer("story", scenario);
        let result = run_story(
            self.client.as_ref(),
            &reference,
            &persona,
            scenario,
            |frames| {
                info!(frames, "Rendering planned story");
                if let Err(err) = self.dispatch(Action::StoryPlanned) {
                    warn!(error = %err, "Story planned outside of planning phase");
                }
            },
        )
        .await;
        complete_operation_timer(&mut timer, &result);

        let batch = result.map_err(|err| self.fail(err, STORY_FAILED))?;
        self.complete_batch(batch.clone())?;
        Ok(batch)
    }

    pub async fn generate_studio(
        &self,
        settings: &CameraSettings,
    ) -> Result<StoryBatch, SessionError> {
        settings.validate()?;
        self.dispatch(Action::StudioRequested)?;
        let (reference, persona) = self.identity()?;

        let mut timer = start_operation_timer("studio", None);
        let result = run_studio(self.client.as_ref(), &reference, &persona, settings).await;
        complete_operation_timer(&mut timer, &result);

        let shot = result.map_err(|err| self.fail(err, STUDIO_FAILED))?;
        let batch = StoryBatch::new(
            BatchKind::Studio,
            STUDIO_LABEL,
            vec![(shot.image, shot.prompt)],
            Vec::new(),
        );
        self.complete_batch(batch.clone())?;
        Ok(batch)
    }

    /// Records the batch and schedules the return to `Idle`.
    fn complete_batch(&self, batch: StoryBatch) -> Result<(), SessionError> {
        let epoch = {
            let mut model = self.model.lock();
            model.apply(Action::BatchCompleted(batch))?;
            model.success_epoch
        };

        let model = Arc::clone(&self.model);
        let hold = self.success_hold;
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            let mut model = model.lock();
            if let Err(err) = model.apply(Action::SuccessElapsed { epoch }) {
                warn!(error = %err, "Failed to clear success state");
            }
        });
        Ok(())
    }

    pub async fn save_credential(&self, value: &str) -> Result<bool> {
        self.credentials.save(value).await?;
        Ok(self.check_credential())
    }

    pub async fn clear_credential(&self) -> Result<bool> {
        self.credentials.clear().await?;
        Ok(self.check_credential())
    }

    /// Re-queries the provider and pushes the result into the model.
    pub fn check_credential(&self) -> bool {
        let present = self.credentials.has_credential();
        // CredentialChecked is accepted in every phase.
        let _ = self.dispatch(Action::CredentialChecked { present });
        present
    }
}
