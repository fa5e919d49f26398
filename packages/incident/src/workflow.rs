//! Status transitions.
//!
//! Guarded transitions are declared in [`Operation`]: the statuses each one
//! starts from and the status it produces. Every status change is saved by
//! one shared step that is told its [`Mode`] explicitly. A strict mode
//! enforces the table; the two override modes skip it and differ only in
//! who may invoke them.

use chrono::Utc;
use geoinfo_incident_models::{Incident, IncidentStatus, ProfessionalProfile, User};
use strum_macros::{AsRefStr, Display};

use crate::{IncidentWorkflow, TransitionRejection, WorkflowError};

/// Every status. Used by transitions with no predecessor restriction.
const ANY: &[IncidentStatus] = IncidentStatus::all();

/// A guarded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// Moderation accepts a drafted incident.
    Validate,
    /// Moderation refuses a drafted incident.
    Reject,
    /// A professional takes a validated incident.
    Acknowledge,
    /// The assigned professional starts work.
    StartProcessing,
    /// The assigned professional resolves the incident.
    Complete,
    /// The assigned professional reports an impediment.
    Block,
    /// The assigned professional resumes work.
    Unblock,
}

impl Operation {
    /// Statuses this transition starts from.
    #[must_use]
    pub const fn from(self) -> &'static [IncidentStatus] {
        match self {
            Self::Validate | Self::Reject => &[IncidentStatus::Redige],
            Self::Acknowledge => &[IncidentStatus::Valide],
            Self::StartProcessing => &[IncidentStatus::PrisEnCompte],
            Self::Complete => &[IncidentStatus::EnCoursDeTraitement],
            Self::Block => ANY,
            Self::Unblock => &[IncidentStatus::Bloque],
        }
    }

    /// Status this transition produces.
    #[must_use]
    pub const fn target(self) -> IncidentStatus {
        match self {
            Self::Validate => IncidentStatus::Valide,
            Self::Reject => IncidentStatus::Rejete,
            Self::Acknowledge => IncidentStatus::PrisEnCompte,
            Self::StartProcessing | Self::Unblock => IncidentStatus::EnCoursDeTraitement,
            Self::Complete => IncidentStatus::Traite,
            Self::Block => IncidentStatus::Bloque,
        }
    }

    /// Whether only the assigned professional may perform it.
    #[must_use]
    pub const fn requires_assignment(self) -> bool {
        matches!(
            self,
            Self::StartProcessing | Self::Complete | Self::Block | Self::Unblock
        )
    }

    fn check(self, incident: &Incident) -> Result<(), WorkflowError> {
        let expected = self.from();
        if expected.contains(&incident.status) {
            Ok(())
        } else {
            Err(WorkflowError::rejected(
                incident.id,
                TransitionRejection::WrongStatus {
                    expected,
                    found: incident.status,
                },
            ))
        }
    }
}

/// How a status change is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A guarded transition. The current status must be one the operation
    /// starts from.
    Strict(Operation),
    /// Any status to any status, by a professional of the incident's
    /// sector. Treated and blocked statuses need a comment.
    SectorOverride {
        /// Acting professional.
        professional_id: i64,
    },
    /// Any status to any status with no actor or comment check.
    AdministratorOverride,
}

impl Mode {
    const fn is_override(self) -> bool {
        !matches!(self, Self::Strict(_))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict(operation) => write!(f, "{operation}"),
            Self::SectorOverride { professional_id } => {
                write!(f, "override by professional {professional_id}")
            }
            Self::AdministratorOverride => {
                f.write_str("administrator override, no actor or sector check")
            }
        }
    }
}

/// Parses a status token such as `PRIS_EN_COMPTE`.
///
/// # Errors
///
/// Returns [`WorkflowError::Validation`] for an unknown token.
pub fn parse_status(token: &str) -> Result<IncidentStatus, WorkflowError> {
    token
        .parse()
        .map_err(|_| WorkflowError::Validation(format!("Unknown status '{token}'")))
}

/// Trims `text` and fails if nothing is left.
pub(crate) fn required(text: Option<&str>, what: &str) -> Result<String, WorkflowError> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| WorkflowError::Validation(format!("A {what} is required")))
}

pub(crate) fn optional(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}

fn require_assigned(incident: &Incident, professional_id: i64) -> Result<(), WorkflowError> {
    if incident.is_assigned_to(professional_id) {
        Ok(())
    } else {
        Err(WorkflowError::rejected(
            incident.id,
            TransitionRejection::NotAssigned { professional_id },
        ))
    }
}

impl IncidentWorkflow {
    async fn load(&self, id: i64) -> Result<Incident, WorkflowError> {
        self.store
            .incident(id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Incident", id))
    }

    /// Loads a user and its professional attachment.
    async fn professional(
        &self,
        incident_id: i64,
        user_id: i64,
    ) -> Result<(User, ProfessionalProfile), WorkflowError> {
        let user = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| WorkflowError::not_found("Professional", user_id))?;
        let Some(profile) = user.professional().cloned() else {
            return Err(WorkflowError::rejected(
                incident_id,
                TransitionRejection::NotAProfessional { user_id },
            ));
        };
        Ok((user, profile))
    }

    /// Moves a loaded incident to `target` and saves it.
    ///
    /// Callers have already run every check `mode` implies. This stamps
    /// the modification time, and the resolution time when entering
    /// [`IncidentStatus::Traite`].
    async fn transition(
        &self,
        mut incident: Incident,
        target: IncidentStatus,
        mode: Mode,
    ) -> Result<Incident, WorkflowError> {
        let from = incident.status;
        let now = Utc::now();

        incident.status = target;
        incident.modified_at = now;
        if target == IncidentStatus::Traite {
            incident.resolved_at = Some(now);
        }

        let saved = self.store.update_incident(incident).await?;

        if mode.is_override() {
            log::warn!("Incident {}: {from} -> {target} ({mode})", saved.id);
        } else {
            log::info!("Incident {}: {from} -> {target} ({mode})", saved.id);
        }

        Ok(saved)
    }

    /// Publishes a drafted incident.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    /// * [`WorkflowError::InvalidTransition`] unless the incident is
    ///   [`IncidentStatus::Redige`]
    pub async fn validate(&self, id: i64) -> Result<Incident, WorkflowError> {
        let incident = self.load(id).await?;
        Operation::Validate.check(&incident)?;
        self.transition(
            incident,
            Operation::Validate.target(),
            Mode::Strict(Operation::Validate),
        )
        .await
    }

    /// Rejects a drafted incident with a reason.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::Validation`] if `reason` is blank
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    /// * [`WorkflowError::InvalidTransition`] unless the incident is
    ///   [`IncidentStatus::Redige`]
    pub async fn reject(&self, id: i64, reason: &str) -> Result<Incident, WorkflowError> {
        let reason = required(Some(reason), "rejection reason")?;
        let mut incident = self.load(id).await?;
        Operation::Reject.check(&incident)?;
        incident.reason = Some(reason);
        self.transition(
            incident,
            Operation::Reject.target(),
            Mode::Strict(Operation::Reject),
        )
        .await
    }

    /// Attaches an active professional to an incident without changing
    /// its status.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the incident or user does not exist
    /// * [`WorkflowError::InvalidTransition`] if the user is not a
    ///   professional or is inactive
    pub async fn assign(&self, id: i64, professional_id: i64) -> Result<Incident, WorkflowError> {
        let mut incident = self.load(id).await?;
        let (user, _) = self.professional(id, professional_id).await?;
        if !user.active {
            return Err(WorkflowError::rejected(
                id,
                TransitionRejection::ProfessionalInactive { professional_id },
            ));
        }

        incident.assigned_professional_id = Some(professional_id);
        incident.modified_at = Utc::now();
        let saved = self.store.update_incident(incident).await?;
        log::info!("Incident {id}: assigned to professional {professional_id}");
        Ok(saved)
    }

    /// A professional takes a validated incident and becomes its
    /// assignee.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the incident or user does not exist
    /// * [`WorkflowError::InvalidTransition`] if the user is not a
    ///   professional, or the incident is not [`IncidentStatus::Valide`]
    pub async fn acknowledge(
        &self,
        id: i64,
        professional_id: i64,
    ) -> Result<Incident, WorkflowError> {
        let mut incident = self.load(id).await?;
        self.professional(id, professional_id).await?;
        Operation::Acknowledge.check(&incident)?;
        incident.assigned_professional_id = Some(professional_id);
        self.transition(
            incident,
            Operation::Acknowledge.target(),
            Mode::Strict(Operation::Acknowledge),
        )
        .await
    }

    /// The assigned professional starts work on an acknowledged incident.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    /// * [`WorkflowError::InvalidTransition`] if `professional_id` is not
    ///   the assignee, or the incident is not
    ///   [`IncidentStatus::PrisEnCompte`]
    pub async fn start_processing(
        &self,
        id: i64,
        professional_id: i64,
    ) -> Result<Incident, WorkflowError> {
        self.assigned_step(id, professional_id, Operation::StartProcessing, |_| {})
            .await
    }

    /// The assigned professional resolves an incident in progress.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::Validation`] if `notes` is blank
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    /// * [`WorkflowError::InvalidTransition`] if `professional_id` is not
    ///   the assignee, or the incident is not
    ///   [`IncidentStatus::EnCoursDeTraitement`]
    pub async fn complete(
        &self,
        id: i64,
        professional_id: i64,
        notes: &str,
    ) -> Result<Incident, WorkflowError> {
        let notes = required(Some(notes), "resolution note")?;
        self.assigned_step(id, professional_id, Operation::Complete, |incident| {
            incident.resolution_notes = Some(notes);
        })
        .await
    }

    /// The assigned professional blocks an incident, whatever its status.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::Validation`] if `reason` is blank
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    /// * [`WorkflowError::InvalidTransition`] if `professional_id` is not
    ///   the assignee
    pub async fn block(
        &self,
        id: i64,
        professional_id: i64,
        reason: &str,
    ) -> Result<Incident, WorkflowError> {
        let reason = required(Some(reason), "blocking reason")?;
        self.assigned_step(id, professional_id, Operation::Block, |incident| {
            incident.reason = Some(reason);
        })
        .await
    }

    /// The assigned professional resumes a blocked incident.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    /// * [`WorkflowError::InvalidTransition`] if `professional_id` is not
    ///   the assignee, or the incident is not [`IncidentStatus::Bloque`]
    pub async fn unblock(&self, id: i64, professional_id: i64) -> Result<Incident, WorkflowError> {
        self.assigned_step(id, professional_id, Operation::Unblock, |_| {})
            .await
    }

    /// Runs a transition reserved to the assignee. The assignment is
    /// checked before the status.
    async fn assigned_step(
        &self,
        id: i64,
        professional_id: i64,
        operation: Operation,
        apply: impl FnOnce(&mut Incident) + Send,
    ) -> Result<Incident, WorkflowError> {
        debug_assert!(operation.requires_assignment());
        let mut incident = self.load(id).await?;
        require_assigned(&incident, professional_id)?;
        operation.check(&incident)?;
        apply(&mut incident);
        self.transition(incident, operation.target(), Mode::Strict(operation))
            .await
    }

    /// Sets any status on behalf of a professional of the incident's
    /// sector, bypassing the transition table.
    ///
    /// A comment is required for [`IncidentStatus::Traite`] and
    /// [`IncidentStatus::Bloque`]. The professional becomes the assignee if
    /// nobody is assigned yet.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::Validation`] if a required comment is blank
    /// * [`WorkflowError::NotFound`] if the incident or user does not exist
    /// * [`WorkflowError::InvalidTransition`] if the user is not a
    ///   professional of the incident's sector
    pub async fn force_set_status(
        &self,
        id: i64,
        professional_id: i64,
        target: IncidentStatus,
        comment: Option<&str>,
    ) -> Result<Incident, WorkflowError> {
        let comment = if target.requires_comment() {
            Some(required(comment, &format!("comment for status {target}"))?)
        } else {
            optional(comment)
        };

        let mut incident = self.load(id).await?;
        let (_, profile) = self.professional(id, professional_id).await?;
        if profile.sector_id != incident.sector_id {
            return Err(WorkflowError::rejected(
                id,
                TransitionRejection::SectorMismatch {
                    professional_sector: profile.sector_id,
                    incident_sector: incident.sector_id,
                },
            ));
        }

        if incident.assigned_professional_id.is_none() {
            incident.assigned_professional_id = Some(professional_id);
        }
        attach_comment(&mut incident, target, comment);

        self.transition(incident, target, Mode::SectorOverride { professional_id })
            .await
    }

    /// Sets any status with no actor, sector or comment check.
    ///
    /// This is the administrator path. Reaching it is an authorization
    /// decision of the caller; nothing here narrows it. A comment is kept
    /// only for [`IncidentStatus::Traite`] (as resolution notes) and
    /// [`IncidentStatus::Bloque`] (as the reason); for any other target it
    /// is dropped, so existing notes survive a reopening.
    ///
    /// # Errors
    ///
    /// * [`WorkflowError::NotFound`] if the incident does not exist
    pub async fn admin_set_status(
        &self,
        id: i64,
        target: IncidentStatus,
        comment: Option<&str>,
    ) -> Result<Incident, WorkflowError> {
        let mut incident = self.load(id).await?;
        attach_admin_comment(&mut incident, target, optional(comment));
        self.transition(incident, target, Mode::AdministratorOverride)
            .await
    }

    /// Applies `mode` to move incident `id` to `target`.
    ///
    /// Strict modes ignore `target` in favor of the operation's own and
    /// take `actor` as the acting professional where one is needed.
    ///
    /// # Errors
    ///
    /// As the operation `mode` resolves to. A strict operation that needs
    /// an actor fails with [`WorkflowError::Validation`] without one.
    pub async fn apply(
        &self,
        id: i64,
        mode: Mode,
        actor: Option<i64>,
        target: IncidentStatus,
        text: Option<&str>,
    ) -> Result<Incident, WorkflowError> {
        let acting = || {
            actor.ok_or_else(|| {
                WorkflowError::Validation("An acting professional is required".to_string())
            })
        };
        let text_or_blank = text.unwrap_or_default();

        match mode {
            Mode::Strict(Operation::Validate) => self.validate(id).await,
            Mode::Strict(Operation::Reject) => self.reject(id, text_or_blank).await,
            Mode::Strict(Operation::Acknowledge) => self.acknowledge(id, acting()?).await,
            Mode::Strict(Operation::StartProcessing) => {
                self.start_processing(id, acting()?).await
            }
            Mode::Strict(Operation::Complete) => {
                self.complete(id, acting()?, text_or_blank).await
            }
            Mode::Strict(Operation::Block) => self.block(id, acting()?, text_or_blank).await,
            Mode::Strict(Operation::Unblock) => self.unblock(id, acting()?).await,
            Mode::SectorOverride { professional_id } => {
                self.force_set_status(id, professional_id, target, text).await
            }
            Mode::AdministratorOverride => self.admin_set_status(id, target, text).await,
        }
    }
}

/// Treated incidents keep the comment as resolution notes, blocked ones as
/// the reason. Other statuses keep it as notes.
fn attach_comment(incident: &mut Incident, target: IncidentStatus, comment: Option<String>) {
    let Some(comment) = comment else {
        return;
    };
    if target == IncidentStatus::Bloque {
        incident.reason = Some(comment);
    } else {
        incident.resolution_notes = Some(comment);
    }
}

/// The administrator override only records comments that explain a
/// resolution or an impediment.
fn attach_admin_comment(incident: &mut Incident, target: IncidentStatus, comment: Option<String>) {
    let Some(comment) = comment else {
        return;
    };
    match target {
        IncidentStatus::Traite => incident.resolution_notes = Some(comment),
        IncidentStatus::Bloque => incident.reason = Some(comment),
        _ => log::debug!(
            "Incident {}: comment ignored for administrator override to {target}",
            incident.id
        ),
    }
}
