/// Admin and Moderation System
///
/// Reports, warnings, the audit log and the moderation service that ties
/// them to events, categories and accounts.

pub mod audit;
pub mod moderation;
pub mod reports;
pub mod target;
pub mod warnings;

pub use audit::{Actor, AdminAction, AdminLog, AuditLog, AuditLogFilter, LogSeverity, NewAdminLog};
pub use moderation::{
    AuditOutcome, CategoryDecision, EventAction, EventModeration, Moderated, ModerationManager,
    ReportDecision,
};
pub use reports::{
    ensure_reportable, Report, ReportCategory, ReportManager, ReportPriority, ReportStatus,
    ResolutionAction,
};
pub use target::{TargetRecord, TargetRef, TargetResolver};
pub use warnings::{
    NewWarning, Warning, WarningCategory, WarningManager, WarningSeverity, WarningStatus,
};
