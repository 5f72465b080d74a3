/// Polymorphic references to moderated records
use crate::{
    account::{AccountManager, User},
    admin::{reports::Report, warnings::Warning, ReportManager, WarningManager},
    error::{KoiError, KoiResult},
    events::{Category, CategoryManager, Event, EventManager},
};
use serde::{Deserialize, Serialize};

/// Reference to a record of one of the moderated kinds
///
/// Serialized as `{"targetType": "...", "targetId": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "targetType", content = "targetId", rename_all = "lowercase")]
pub enum TargetRef {
    Event(String),
    User(String),
    Category(String),
    Report(String),
    Warning(String),
}

impl TargetRef {
    pub fn target_type(&self) -> &'static str {
        match self {
            TargetRef::Event(_) => "event",
            TargetRef::User(_) => "user",
            TargetRef::Category(_) => "category",
            TargetRef::Report(_) => "report",
            TargetRef::Warning(_) => "warning",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TargetRef::Event(id)
            | TargetRef::User(id)
            | TargetRef::Category(id)
            | TargetRef::Report(id)
            | TargetRef::Warning(id) => id,
        }
    }

    /// Rebuild a reference from its stored discriminator and id
    pub fn from_parts(target_type: &str, id: &str) -> KoiResult<Self> {
        let id = id.to_string();
        match target_type.to_lowercase().as_str() {
            "event" => Ok(TargetRef::Event(id)),
            "user" => Ok(TargetRef::User(id)),
            "category" => Ok(TargetRef::Category(id)),
            "report" => Ok(TargetRef::Report(id)),
            "warning" => Ok(TargetRef::Warning(id)),
            _ => Err(KoiError::Validation(format!(
                "Invalid target type: {}",
                target_type
            ))),
        }
    }
}

/// A loaded target record
#[derive(Debug, Clone)]
pub enum TargetRecord {
    Event(Event),
    User(User),
    Category(Category),
    Report(Report),
    Warning(Warning),
}

/// Resolves `TargetRef`s by dispatching on the tag to the owning store
#[derive(Clone)]
pub struct TargetResolver {
    accounts: AccountManager,
    events: EventManager,
    categories: CategoryManager,
    reports: ReportManager,
    warnings: WarningManager,
}

impl TargetResolver {
    pub fn new(
        accounts: AccountManager,
        events: EventManager,
        categories: CategoryManager,
        reports: ReportManager,
        warnings: WarningManager,
    ) -> Self {
        Self {
            accounts,
            events,
            categories,
            reports,
            warnings,
        }
    }

    /// Load the referenced record, or `NotFound`
    pub async fn resolve(&self, target: &TargetRef) -> KoiResult<TargetRecord> {
        match target {
            TargetRef::Event(id) => self.events.get_event(id).await.map(TargetRecord::Event),
            TargetRef::User(id) => self.accounts.get_user(id).await.map(TargetRecord::User),
            TargetRef::Category(id) => self
                .categories
                .get_category(id)
                .await
                .map(TargetRecord::Category),
            TargetRef::Report(id) => self.reports.get_report(id).await.map(TargetRecord::Report),
            TargetRef::Warning(id) => self
                .warnings
                .get_warning(id)
                .await
                .map(TargetRecord::Warning),
        }
    }

    pub async fn exists(&self, target: &TargetRef) -> KoiResult<bool> {
        match self.resolve(target).await {
            Ok(_) => Ok(true),
            Err(KoiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
