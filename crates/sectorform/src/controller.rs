//! Form/view controller.
//!
//! Owns the list/edit view state, binds the form draft to the validator and
//! the choice repository, and keeps the sector index used to render options.
//! Store failures never escape: they become [`Notice`]s and the view stays
//! where it was.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::choices::ChoiceRepository;
use crate::config::Config;
use crate::error::Error;
use crate::model::{Choice, ChoiceDraft};
use crate::sectors::{SectorIndex, SectorIndexBuilder};
use crate::store::DocumentStore;
use crate::validation::{ValidationErrors, Validator};

/// Severity of a user-visible notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// An operation completed.
    Info,
    /// An operation failed.
    Error,
}

/// A non-blocking user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Whether this notice reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// The form being edited and its latest field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    /// Current field values.
    pub draft: ChoiceDraft,
    /// Errors from the last rejected submit.
    pub errors: ValidationErrors,
}

impl Form {
    fn new(draft: ChoiceDraft) -> Self {
        Self {
            draft,
            errors: ValidationErrors::default(),
        }
    }

    /// Whether the form creates a new record rather than editing one.
    #[must_use]
    pub fn is_create(&self) -> bool {
        self.draft.is_new()
    }
}

/// What the controller is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum View {
    /// The table of saved choices.
    #[default]
    List,
    /// The choice form.
    Edit(Form),
}

impl View {
    /// Whether the list is showing.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List)
    }
}

/// Result of the initial load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Both loads finished and their results were applied.
    Completed,
    /// Shutdown was requested first; nothing was applied.
    Cancelled,
}

/// Result of a user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The choice was saved under this id and the list is showing.
    Saved(String),
    /// The choice with this id was deleted.
    Deleted(String),
    /// Validation rejected the form; the errors are on the form.
    Invalid,
    /// The action failed; an error notice was raised.
    Failed,
    /// The action does not apply to the current view.
    Ignored,
}

/// Drives the sector/choice form.
#[derive(Debug)]
pub struct FormController {
    sectors: SectorIndexBuilder,
    repository: ChoiceRepository,
    validator: Validator,
    index: SectorIndex,
    view: View,
    notices: Vec<Notice>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl FormController {
    /// Create a controller in the list view with an empty sector index.
    #[must_use]
    pub fn new(sectors: SectorIndexBuilder, repository: ChoiceRepository) -> Self {
        Self {
            sectors,
            repository,
            validator: Validator::default(),
            index: SectorIndex::default(),
            view: View::List,
            notices: Vec::new(),
            shutdown: None,
        }
    }

    /// Create a controller over one store using the loaded configuration.
    #[must_use]
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self::new(
            SectorIndexBuilder::from_config(Arc::clone(&store), &config.sectors),
            ChoiceRepository::from_config(store, &config.choices),
        )
    }

    /// Use a custom validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    /// Watch a shutdown signal; once it reads `true`, in-flight loads are
    /// dropped without applying their results.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The current view.
    #[must_use]
    pub fn view(&self) -> &View {
        &self.view
    }

    /// The form being edited, if any.
    #[must_use]
    pub fn form(&self) -> Option<&Form> {
        match &self.view {
            View::Edit(form) => Some(form),
            View::List => None,
        }
    }

    /// The sector index from the last successful load.
    #[must_use]
    pub fn sector_index(&self) -> &SectorIndex {
        &self.index
    }

    /// The cached choice list.
    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        self.repository.choices()
    }

    /// Drain pending notifications, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
        self.notices.push(notice);
    }

    fn notify_refresh_error(&mut self, refresh_error: Option<Error>) {
        if let Some(e) = refresh_error {
            self.notify(Notice::error(format!("Could not refresh choices: {e}")));
        }
    }

    /// Load sectors and choices concurrently.
    ///
    /// Each side applies independently: a failed sector load keeps the old
    /// index while a successful choice listing still replaces the cache, and
    /// the other way round.
    pub async fn initial_load(&mut self) -> LoadOutcome {
        let shutdown = self.shutdown.clone();
        let sectors = self.sectors.load();
        let choices = self.repository.list_choices();
        let load = async { tokio::join!(sectors, choices) };

        let (sectors, choices) = match shutdown {
            Some(mut shutdown) => tokio::select! {
                biased;
                () = shutdown_requested(&mut shutdown) => {
                    debug!("Initial load cancelled");
                    return LoadOutcome::Cancelled;
                }
                results = load => results,
            },
            None => load.await,
        };

        match sectors {
            Ok(index) => self.index = index,
            Err(e) => self.notify(Notice::error(format!("Could not load sectors: {e}"))),
        }
        match choices {
            Ok(choices) => self.repository.replace(choices),
            Err(e) => self.notify(Notice::error(format!("Could not load choices: {e}"))),
        }
        LoadOutcome::Completed
    }

    /// Open an empty form for a new choice.
    pub fn create(&mut self) -> bool {
        if !self.view.is_list() {
            debug!("Ignoring create outside the list view");
            return false;
        }
        self.view = View::Edit(Form::default());
        true
    }

    /// Open the form on a saved choice.
    ///
    /// An unknown id raises an error notice and leaves the list showing.
    pub fn edit(&mut self, id: &str) -> bool {
        if !self.view.is_list() {
            debug!("Ignoring edit outside the list view");
            return false;
        }
        let Some(choice) = self.repository.find(id) else {
            self.notify(Notice::error(format!("No choice with id {id}")));
            return false;
        };
        self.view = View::Edit(Form::new(ChoiceDraft::from(choice)));
        true
    }

    /// Leave the form, discarding edits. No store interaction.
    pub fn cancel(&mut self) -> bool {
        if self.view.is_list() {
            return false;
        }
        self.view = View::List;
        true
    }

    /// Set the user field of the open form.
    pub fn set_user(&mut self, user: impl Into<String>) {
        if let View::Edit(form) = &mut self.view {
            form.draft.user = user.into();
        }
    }

    /// Set the selected sector ids of the open form.
    pub fn set_chosen_ids(&mut self, chosen_ids: Vec<String>) {
        if let View::Edit(form) = &mut self.view {
            form.draft.chosen_ids = chosen_ids;
        }
    }

    /// Set the terms checkbox of the open form.
    pub fn set_agree_to_terms(&mut self, agree: bool) {
        if let View::Edit(form) = &mut self.view {
            form.draft.agree_to_terms = agree;
        }
    }

    /// Validate and save the open form.
    ///
    /// A rejected form stays open with its field errors and nothing reaches
    /// the store. A failed write raises a notice and keeps the form open. A
    /// confirmed write always returns to the list, even if the reload after
    /// it fails.
    pub async fn submit(&mut self) -> Outcome {
        let View::Edit(form) = &mut self.view else {
            debug!("Ignoring submit outside the edit view");
            return Outcome::Ignored;
        };

        let validated = self.validator.validate(&form.draft);
        let choice = match validated {
            Ok(choice) => {
                form.errors = ValidationErrors::default();
                choice
            }
            Err(Error::Validation(errors)) => {
                debug!("Form rejected: {}", errors);
                form.errors = errors;
                return Outcome::Invalid;
            }
            Err(e) => {
                self.notify(Notice::error(format!("Could not save choice: {e}")));
                return Outcome::Failed;
            }
        };

        match self.repository.save_choice(choice).await {
            Ok(written) => {
                self.view = View::List;
                self.notify(Notice::info(format!("Saved choice {}", written.id)));
                self.notify_refresh_error(written.refresh_error);
                Outcome::Saved(written.id)
            }
            Err(e) => {
                self.notify(Notice::error(format!("Could not save choice: {e}")));
                Outcome::Failed
            }
        }
    }

    /// Delete a listed choice. No confirmation.
    pub async fn delete(&mut self, id: &str) -> Outcome {
        if !self.view.is_list() {
            debug!("Ignoring delete outside the list view");
            return Outcome::Ignored;
        }
        if self.repository.find(id).is_none() {
            self.notify(Notice::error(format!("No choice with id {id}")));
            return Outcome::Failed;
        }

        match self.repository.delete_choice(id).await {
            Ok(written) => {
                self.notify(Notice::info(format!("Deleted choice {}", written.id)));
                self.notify_refresh_error(written.refresh_error);
                Outcome::Deleted(written.id)
            }
            Err(e) => {
                self.notify(Notice::error(format!("Could not delete choice {id}: {e}")));
                Outcome::Failed
            }
        }
    }
}

/// Resolves once the signal reads `true`; never resolves if the sender is
/// gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
