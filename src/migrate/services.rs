use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::db::{self, Stores};
use crate::migrate::password::hash_password;
use crate::migrate::repo;
use crate::migrate::repo_types::{NewUser, Role, UpsertOutcome};
use crate::migrate::source::{self, SourceDoc};

/// Chunk size for progress reporting. Chunking has no transactional
/// meaning; every record is still committed independently.
const BATCH_SIZE: usize = 10;

const DEFAULT_NAME: &str = "Unknown User";
const DEFAULT_DEPARTMENT: &str = "General";
const DEFAULT_BASE_SALARY: i64 = 8000;

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@company.com";
/// Placeholder credential for the synthesized admin. Hashed before storage
/// and loudly flagged at runtime so it gets rotated.
const DEFAULT_ADMIN_PASSWORD: &str = "ChangeMe123!";

const BUILTIN_ADMIN_ALLOWLIST: &[&str] = &["admin@company.com", "hr@company.com"];

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Decides which migrated accounts become admins.
///
/// Precedence: allow-list membership, then an explicit `admin` role on the
/// source record, then a substring match on the email. The substring match
/// is a heuristic inherited from the legacy data and is logged as a warning
/// whenever it is the deciding factor.
pub struct RolePolicy {
    allowlist: Vec<String>,
}

impl RolePolicy {
    /// Build from an optional comma-separated override (the
    /// `ADMIN_ALLOWLIST` env var); falls back to the built-in list.
    pub fn new(overrides: Option<&str>) -> Self {
        let allowlist = match overrides {
            Some(raw) => raw
                .split(',')
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            None => BUILTIN_ADMIN_ALLOWLIST
                .iter()
                .map(|e| e.to_string())
                .collect(),
        };
        Self { allowlist }
    }

    /// Resolve the role for an already-lowercased email.
    pub fn resolve(&self, email: &str, source_role: Option<&str>) -> Role {
        if self.allowlist.iter().any(|a| a == email) {
            return Role::Admin;
        }
        if let Some(role) = source_role {
            if role.trim().eq_ignore_ascii_case("admin") {
                return Role::Admin;
            }
        }
        if email.contains("admin") {
            warn!(email, "admin role assigned by email substring heuristic");
            return Role::Admin;
        }
        Role::User
    }
}

/// Counts for one migration run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSummary {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub admins: usize,
    pub users: usize,
}

impl MigrationSummary {
    pub fn migrated(&self) -> usize {
        self.created + self.updated
    }

    fn tally(&mut self, outcome: UpsertOutcome, role: Role) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
        match role {
            Role::Admin => self.admins += 1,
            Role::User => self.users += 1,
        }
    }
}

impl fmt::Display for MigrationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "migrated {} (created {}, updated {}, admins {}, users {}), skipped {}, errors {}",
            self.migrated(),
            self.created,
            self.updated,
            self.admins,
            self.users,
            self.skipped,
            self.errors
        )
    }
}

/// Map one legacy document onto the strict target record.
///
/// Returns `None` when the document lacks an email or a password; such an
/// account could never authenticate and is skipped rather than treated as
/// an error. All coercion and defaulting happens here, once; downstream
/// code only ever sees the fully-resolved record.
pub fn map_source_user(
    doc: &SourceDoc,
    policy: &RolePolicy,
    now: OffsetDateTime,
) -> Option<NewUser> {
    let email = doc.str_field(&["email"])?.to_lowercase();
    let password_hash = doc.str_field(&["password"])?;

    let source_role = doc.str_field(&["role"]);
    let role = policy.resolve(&email, source_role.as_deref());

    let created_at = doc.date_field(&["createdAt"]).unwrap_or(now);
    let joining_date = doc
        .date_field(&["joiningDate"])
        .or_else(|| doc.date_field(&["createdAt"]))
        .unwrap_or(now);

    Some(NewUser {
        name: doc
            .str_field(&["name", "username"])
            .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        department: doc
            .str_field(&["department"])
            .unwrap_or_else(|| DEFAULT_DEPARTMENT.to_string()),
        role,
        employee_id: doc.str_field(&["employeeId"]).or_else(|| doc.raw_id()),
        joining_date,
        is_active: doc.bool_field(&["isActive"]).unwrap_or(true),
        base_salary: doc
            .number_field(&["baseSalary"])
            .map(|v| v.round() as i64)
            .unwrap_or(DEFAULT_BASE_SALARY),
        created_at,
        updated_at: now,
        email,
        password_hash,
    })
}

/// Reconcile every source account into the target store, sequentially.
///
/// Record-level failures are caught, logged with the offending email, and
/// counted; only a store-level failure aborts the run. With `dry_run` the
/// create/update decision is still made against the target but nothing is
/// written.
pub async fn migrate_users(
    stores: &Stores,
    policy: &RolePolicy,
    dry_run: bool,
) -> anyhow::Result<MigrationSummary> {
    let docs = source::fetch_all_users(&stores.source).await?;
    info!(total = docs.len(), "fetched source users");

    let now = OffsetDateTime::now_utc();
    let mut summary = MigrationSummary::default();

    for (batch_no, batch) in docs.chunks(BATCH_SIZE).enumerate() {
        info!(batch = batch_no + 1, size = batch.len(), "processing batch");
        for doc in batch {
            let Some(user) = map_source_user(doc, policy, now) else {
                summary.skipped += 1;
                continue;
            };
            if !is_valid_email(&user.email) {
                warn!(email = %user.email, "email looks implausible, migrating anyway");
            }
            if dry_run {
                let outcome = match repo::find_by_email(&stores.target, &user.email).await? {
                    Some(_) => UpsertOutcome::Updated,
                    None => UpsertOutcome::Created,
                };
                summary.tally(outcome, user.role);
                continue;
            }
            match repo::upsert(&stores.target, &user).await {
                Ok(outcome) => summary.tally(outcome, user.role),
                Err(e) => {
                    warn!(email = %user.email, error = %e, "record failed");
                    summary.errors += 1;
                }
            }
        }
    }

    Ok(summary)
}

/// Destructive variant: wipe the target store, rebuild the schema, migrate,
/// then make sure at least one admin account exists.
pub async fn reset_and_migrate(
    stores: &Stores,
    policy: &RolePolicy,
    dry_run: bool,
) -> anyhow::Result<MigrationSummary> {
    if dry_run {
        info!("dry run: leaving target tables in place");
    } else {
        warn!("dropping all target tables");
        repo::drop_all_tables(&stores.target).await;
        db::apply_schema(&stores.target).await?;
    }

    let mut summary = migrate_users(stores, policy, dry_run).await?;

    if dry_run {
        if summary.admins == 0 {
            warn!(
                email = DEFAULT_ADMIN_EMAIL,
                "no admin among migrated accounts; a default admin would be synthesized"
            );
        }
        return Ok(summary);
    }

    if repo::count_admins(&stores.target).await? == 0 {
        warn!(
            email = DEFAULT_ADMIN_EMAIL,
            "no admin account exists; synthesizing one with a placeholder password, rotate it immediately"
        );
        let admin = default_admin(OffsetDateTime::now_utc())?;
        repo::upsert(&stores.target, &admin).await?;
        summary.tally(UpsertOutcome::Created, Role::Admin);
    }

    Ok(summary)
}

fn default_admin(now: OffsetDateTime) -> anyhow::Result<NewUser> {
    Ok(NewUser {
        email: DEFAULT_ADMIN_EMAIL.to_string(),
        password_hash: hash_password(DEFAULT_ADMIN_PASSWORD)?,
        name: "System Administrator".to_string(),
        department: "Administration".to_string(),
        role: Role::Admin,
        employee_id: None,
        joining_date: now,
        is_active: true,
        base_salary: DEFAULT_BASE_SALARY,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn policy() -> RolePolicy {
        RolePolicy::new(None)
    }

    fn doc(value: serde_json::Value) -> SourceDoc {
        SourceDoc(value)
    }

    const NOW: OffsetDateTime = datetime!(2024-06-01 12:00 UTC);

    #[test]
    fn skips_record_missing_email() {
        let d = doc(json!({"password": "$2b$10$abc"}));
        assert!(map_source_user(&d, &policy(), NOW).is_none());
    }

    #[test]
    fn skips_record_missing_password() {
        let d = doc(json!({"email": "x@y.com"}));
        assert!(map_source_user(&d, &policy(), NOW).is_none());
    }

    #[test]
    fn maps_minimal_record_with_defaults() {
        let d = doc(json!({"email": "Jo@Example.COM", "password": "$2b$10$abc", "_id": 42}));
        let user = map_source_user(&d, &policy(), NOW).expect("should map");
        assert_eq!(user.email, "jo@example.com");
        assert_eq!(user.password_hash, "$2b$10$abc");
        assert_eq!(user.name, "Unknown User");
        assert_eq!(user.department, "General");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.employee_id, Some("42".to_string()));
        assert_eq!(user.base_salary, 8000);
        assert!(user.is_active);
        assert_eq!(user.joining_date, NOW);
        assert_eq!(user.created_at, NOW);
        assert_eq!(user.updated_at, NOW);
    }

    #[test]
    fn username_backfills_missing_name() {
        let d = doc(json!({"email": "a@b.co", "password": "h", "username": "asha"}));
        let user = map_source_user(&d, &policy(), NOW).expect("should map");
        assert_eq!(user.name, "asha");
    }

    #[test]
    fn explicit_employee_id_wins_over_raw_identifier() {
        let d = doc(json!({
            "email": "a@b.co", "password": "h",
            "employeeId": "EMP-7", "_id": {"$oid": "64f0"}
        }));
        let user = map_source_user(&d, &policy(), NOW).expect("should map");
        assert_eq!(user.employee_id, Some("EMP-7".to_string()));
    }

    #[test]
    fn joining_date_falls_back_to_created_at_then_now() {
        let with_created = doc(json!({
            "email": "a@b.co", "password": "h",
            "createdAt": "2022-01-15T08:00:00Z"
        }));
        let user = map_source_user(&with_created, &policy(), NOW).expect("should map");
        assert_eq!(user.joining_date, user.created_at);
        assert_eq!(user.created_at, datetime!(2022-01-15 08:00 UTC));
        assert_eq!(user.updated_at, NOW);

        let bare = doc(json!({"email": "a@b.co", "password": "h"}));
        let user = map_source_user(&bare, &policy(), NOW).expect("should map");
        assert_eq!(user.joining_date, NOW);
    }

    #[test]
    fn joining_date_preferred_when_present() {
        let d = doc(json!({
            "email": "a@b.co", "password": "h",
            "joiningDate": "2021-03-01",
            "createdAt": "2022-01-15T08:00:00Z"
        }));
        let user = map_source_user(&d, &policy(), NOW).expect("should map");
        assert_eq!(user.joining_date, datetime!(2021-03-01 00:00 UTC));
    }

    #[test]
    fn coerces_salary_and_active_flag_from_strings() {
        let d = doc(json!({
            "email": "a@b.co", "password": "h",
            "baseSalary": "12000", "isActive": "false"
        }));
        let user = map_source_user(&d, &policy(), NOW).expect("should map");
        assert_eq!(user.base_salary, 12000);
        assert!(!user.is_active);
    }

    #[test]
    fn role_from_allowlist_is_case_insensitive() {
        let d = doc(json!({"email": "ADMIN@Company.com", "password": "h"}));
        let user = map_source_user(&d, &policy(), NOW).expect("should map");
        assert_eq!(user.role, Role::Admin);
    }

    #[test]
    fn role_from_source_role_field() {
        let p = policy();
        assert_eq!(p.resolve("plain@x.co", Some("Admin")), Role::Admin);
        assert_eq!(p.resolve("plain@x.co", Some("user")), Role::User);
        assert_eq!(p.resolve("plain@x.co", None), Role::User);
    }

    #[test]
    fn role_from_email_substring_heuristic() {
        let p = policy();
        assert_eq!(p.resolve("sysadmin@x.co", None), Role::Admin);
        assert_eq!(p.resolve("adminauser@x.co", None), Role::Admin);
        assert_eq!(p.resolve("amin@x.co", None), Role::User);
    }

    #[test]
    fn allowlist_override_replaces_builtin() {
        let p = RolePolicy::new(Some("Boss@Corp.io, ops@corp.io"));
        assert_eq!(p.resolve("boss@corp.io", None), Role::Admin);
        assert_eq!(p.resolve("ops@corp.io", None), Role::Admin);
        // the built-in entry no longer applies (substring heuristic still does)
        assert_eq!(p.resolve("hr@company.com", None), Role::User);
    }

    #[test]
    fn summary_display_and_tally() {
        let mut s = MigrationSummary::default();
        s.tally(UpsertOutcome::Created, Role::Admin);
        s.tally(UpsertOutcome::Updated, Role::User);
        s.skipped = 2;
        assert_eq!(s.migrated(), 2);
        assert_eq!(
            s.to_string(),
            "migrated 2 (created 1, updated 1, admins 1, users 1), skipped 2, errors 0"
        );
    }

    #[test]
    fn default_admin_record_shape() {
        let admin = default_admin(NOW).expect("hashing should succeed");
        assert_eq!(admin.email, DEFAULT_ADMIN_EMAIL);
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.password_hash.starts_with("$argon2"));
        assert_ne!(admin.password_hash, DEFAULT_ADMIN_PASSWORD);
    }

    #[test]
    fn email_plausibility_check() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@c.co"));
    }
}
