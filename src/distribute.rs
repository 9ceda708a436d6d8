//! Bulk distribution: one spreadsheet row → one file placed into the folder
//! its code matches.
//!
//! ## Setup (fatal on error)
//!
//! 1. Locate the required columns and check the fixed file / lookup dir.
//! 2. Resolve the default base path (creating segments if asked to), and in
//!    month scope the month folders under it.
//! 3. Resolve every distinct per-row base override once. A broken override
//!    only fails the rows that use it.
//!
//! ## Per row (never fatal)
//!
//! ```text
//! code empty? ──▶ Skipped    local file absent? ──▶ Skipped
//!      │
//!      ▼
//! for each target parent: match code ──▶ upload (or plan, in dry-run)
//!      │
//!      ▼
//! no match anywhere ──▶ Failed(FolderNotMatched)
//! some targets failed ──▶ Failed(PartialDelivery), landed uploads kept
//! ```
//!
//! Children listings are cached per parent for the whole run, so a batch of
//! a thousand rows under one base lists that base once.

use crate::config::CourierConfig;
use crate::error::{CourierError, RemoteError, RowError};
use crate::orchestrate::{process_rows, RowLabel, RowOutcome};
use crate::output::{Delivery, DistributionReport, RowDeliveries};
use crate::remote::{DriveItem, RemoteTree};
use crate::resolve::{match_folder, path_segments, select_months, walk_path};
use crate::table::{digits_only, Table};
use crate::upload::upload_file;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Where each row's local file comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// The same file for every row.
    SameFile(PathBuf),
    /// A column holding a path per row.
    PathColumn(String),
    /// A column holding a certificate number, looked up under `dir`.
    Lookup {
        column: String,
        dir: PathBuf,
        /// Without the leading dot, e.g. `pdf`.
        extension: String,
    },
}

/// Which folders the code is matched in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetScope {
    /// Directly under the base folder.
    #[default]
    Base,
    /// Under every configured month folder present in the base folder.
    Months,
}

/// Everything a distribution run needs besides the remote tree.
#[derive(Debug, Clone)]
pub struct DistributionPlan {
    pub code_column: String,
    /// Optional per-row base path override.
    pub base_column: Option<String>,
    pub file_source: FileSource,
    pub scope: TargetScope,
    /// Base used when a row has no override.
    pub default_base: String,
    /// Ordered month folder names, used in [`TargetScope::Months`].
    pub months: Vec<String>,
}

/// One parsed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRow {
    pub code: String,
    /// Path or certificate number, depending on the file source; empty for
    /// [`FileSource::SameFile`].
    pub file_token: String,
    pub base: Option<String>,
}

impl RowLabel for DistributionRow {
    fn label(&self) -> String {
        if self.code.is_empty() {
            "(no code)".to_string()
        } else {
            self.code.clone()
        }
    }
}

/// A folder a code is matched inside.
#[derive(Debug, Clone)]
struct Target {
    item: DriveItem,
    path: String,
}

/// A resolved base and the parents that codes are matched under.
#[derive(Debug, Clone)]
struct BaseTargets {
    display: String,
    parents: Vec<Target>,
}

fn join_display(parent: &str, name: &str) -> String {
    if parent == "/" {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn display_path(path: &str) -> String {
    let segments = path_segments(path);
    if segments.is_empty() {
        "/".to_string()
    } else {
        segments.join("/")
    }
}

fn base_key(path: &str) -> String {
    path_segments(path).join("/").to_lowercase()
}

async fn resolve_targets<T: RemoteTree>(
    tree: &T,
    path: &str,
    scope: TargetScope,
    months: &[String],
    create: bool,
) -> Result<BaseTargets, RemoteError> {
    let base = walk_path(tree, path, create).await?;
    let shown = display_path(path);
    let parents = match scope {
        TargetScope::Base => vec![Target {
            item: base,
            path: shown.clone(),
        }],
        TargetScope::Months => {
            let children = tree.list_children(&base).await?;
            let picked = select_months(&children, months);
            if picked.is_empty() {
                warn!("None of the configured month folders exist under '{shown}'");
            } else {
                debug!(
                    "Month folders under '{shown}': {}",
                    picked.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ")
                );
            }
            picked
                .into_iter()
                .map(|m| Target {
                    path: join_display(&shown, &m.name),
                    item: m,
                })
                .collect()
        }
    };
    Ok(BaseTargets { display: shown, parents })
}

fn fatal_base_error(path: &str, err: RemoteError) -> CourierError {
    match err {
        RemoteError::CreationConflict { name, parent } => {
            CourierError::CreationConflict { name, parent }
        }
        e if e.is_not_found() => CourierError::BasePathNotFound {
            path: display_path(path),
            detail: e.to_string(),
        },
        e => CourierError::Remote(e),
    }
}

fn row_base_error(path: &str, err: RemoteError) -> RowError {
    if err.is_not_found() {
        RowError::BasePathNotFound {
            path: display_path(path),
            detail: err.to_string(),
        }
    } else {
        RowError::RemoteLookupFailed {
            detail: err.to_string(),
        }
    }
}

/// First file for certificate `number` under `dir`.
///
/// `{dir}/{number}.{extension}` is tried first; otherwise the tree under
/// `dir` is walked in name order and the first file whose name contains
/// `number` and whose extension matches (case-insensitive) wins.
pub fn find_local_file(dir: &Path, number: &str, extension: &str) -> Option<PathBuf> {
    let direct = dir.join(format!("{number}.{extension}"));
    if direct.is_file() {
        return Some(direct);
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .find(|e| {
            let ext_ok = e
                .path()
                .extension()
                .map(|x| x.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            ext_ok && e.file_name().to_string_lossy().contains(number)
        })
        .map(|e| e.into_path())
}

struct LocalFile {
    path: PathBuf,
    name: String,
}

struct Distributor<'a, T> {
    tree: &'a T,
    plan: &'a DistributionPlan,
    config: &'a CourierConfig,
    default: BaseTargets,
    overrides: HashMap<String, Result<BaseTargets, RowError>>,
    children: Mutex<HashMap<String, Arc<Vec<DriveItem>>>>,
}

impl<'a, T: RemoteTree> Distributor<'a, T> {
    async fn children_of(&self, parent: &DriveItem) -> Result<Arc<Vec<DriveItem>>, RemoteError> {
        if let Some(hit) = self.cached(&parent.id) {
            return Ok(hit);
        }
        let listed = Arc::new(self.tree.list_children(parent).await?);
        if let Ok(mut cache) = self.children.lock() {
            cache.insert(parent.id.clone(), listed.clone());
        }
        Ok(listed)
    }

    fn cached(&self, id: &str) -> Option<Arc<Vec<DriveItem>>> {
        self.children.lock().ok()?.get(id).cloned()
    }

    fn targets_for(&self, base: Option<&str>) -> Result<&BaseTargets, RowError> {
        match base.map(base_key) {
            Some(key) if !key.is_empty() && key != base_key(&self.plan.default_base) => self
                .overrides
                .get(&key)
                .ok_or_else(|| RowError::RemoteLookupFailed {
                    detail: format!("base '{key}' was not resolved"),
                })?
                .as_ref()
                .map_err(Clone::clone),
            _ => Ok(&self.default),
        }
    }

    fn local_file(&self, row: &DistributionRow) -> Result<LocalFile, RowOutcome<RowDeliveries>> {
        let path = match &self.plan.file_source {
            FileSource::SameFile(path) => path.clone(),
            FileSource::PathColumn(column) => {
                if row.file_token.is_empty() {
                    return Err(RowOutcome::Skipped(RowError::RowDataIncomplete {
                        detail: format!("empty '{column}'"),
                    }));
                }
                let path = PathBuf::from(&row.file_token);
                if !path.is_file() {
                    return Err(RowOutcome::Skipped(RowError::LocalFileMissing {
                        path: row.file_token.clone(),
                    }));
                }
                path
            }
            FileSource::Lookup {
                column,
                dir,
                extension,
            } => {
                let number = digits_only(&row.file_token);
                if number.is_empty() {
                    return Err(RowOutcome::Skipped(RowError::RowDataIncomplete {
                        detail: format!("no digits in '{column}' value '{}'", row.file_token),
                    }));
                }
                find_local_file(dir, &number, extension).ok_or_else(|| {
                    RowOutcome::Skipped(RowError::LocalFileMissing {
                        path: dir.join(format!("{number}.{extension}")).display().to_string(),
                    })
                })?
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(LocalFile { path, name })
    }

    async fn handle(&self, row: DistributionRow) -> RowOutcome<RowDeliveries> {
        if row.code.is_empty() {
            return RowOutcome::Skipped(RowError::RowDataIncomplete {
                detail: format!("empty '{}'", self.plan.code_column),
            });
        }
        let local = match self.local_file(&row) {
            Ok(local) => local,
            Err(outcome) => return outcome,
        };
        let targets = match self.targets_for(row.base.as_deref()) {
            Ok(t) => t,
            Err(e) => return RowOutcome::Failed(e),
        };

        let mut deliveries = Vec::new();
        let mut failures = Vec::new();
        for parent in &targets.parents {
            let children = match self.children_of(&parent.item).await {
                Ok(c) => c,
                Err(e) => {
                    failures.push(RowError::RemoteLookupFailed {
                        detail: format!("{}: {e}", parent.path),
                    });
                    continue;
                }
            };
            let Some(found) = match_folder(&children, &row.code) else {
                debug!("'{}' has no match in {}", row.code, parent.path);
                continue;
            };
            let target_path = join_display(&parent.path, &found.item.name);
            debug!("'{}' matched '{target_path}' ({:?})", row.code, found.strategy);

            if self.config.dry_run {
                info!("[dry-run] would copy '{}' → {target_path}", local.name);
                deliveries.push(Delivery {
                    file_name: local.name.clone(),
                    target_path,
                    item_id: None,
                    web_url: None,
                    dry_run: true,
                });
                continue;
            }

            match upload_file(self.tree, found.item, &local.path, &local.name, self.config).await {
                Ok(item) => deliveries.push(Delivery {
                    file_name: local.name.clone(),
                    target_path,
                    item_id: Some(item.id),
                    web_url: item.web_url,
                    dry_run: false,
                }),
                Err(e) => failures.push(RowError::RemoteUploadFailed {
                    file: local.name.clone(),
                    detail: format!("{target_path}: {e}"),
                }),
            }
        }

        settle(row.code, local.name, &targets.display, deliveries, failures)
    }
}

/// Fold one row's deliveries and per-target failures into its outcome.
///
/// Uploads that landed are never dropped: if any target failed after others
/// succeeded the row fails with [`RowError::PartialDelivery`] carrying them.
fn settle(
    code: String,
    file: String,
    parent: &str,
    deliveries: Vec<Delivery>,
    mut failures: Vec<RowError>,
) -> RowOutcome<RowDeliveries> {
    if failures.is_empty() {
        return if deliveries.is_empty() {
            RowOutcome::Failed(RowError::FolderNotMatched {
                code,
                parent: parent.to_string(),
            })
        } else {
            RowOutcome::Succeeded(RowDeliveries { deliveries })
        };
    }
    if deliveries.is_empty() && failures.len() == 1 {
        if let Some(only) = failures.pop() {
            return RowOutcome::Failed(only);
        }
    }
    let detail = failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if deliveries.is_empty() {
        RowOutcome::Failed(RowError::RemoteUploadFailed { file, detail })
    } else {
        warn!("'{file}' reached {} target(s) only", deliveries.len());
        RowOutcome::Failed(RowError::PartialDelivery {
            file,
            detail,
            delivered: deliveries,
        })
    }
}

/// Read the rows of `table` according to `plan`, failing on missing columns.
pub fn collect_rows(
    table: &Table,
    plan: &DistributionPlan,
) -> Result<Vec<DistributionRow>, CourierError> {
    let code_idx = table.require_column(&plan.code_column)?;
    let file_idx = match &plan.file_source {
        FileSource::SameFile(_) => None,
        FileSource::PathColumn(column) | FileSource::Lookup { column, .. } => {
            Some(table.require_column(column)?)
        }
    };
    let base_idx = plan
        .base_column
        .as_deref()
        .map(|c| table.require_column(c))
        .transpose()?;

    Ok((0..table.len())
        .map(|i| DistributionRow {
            code: table.cell(i, code_idx).to_string(),
            file_token: file_idx.map(|c| table.cell(i, c).to_string()).unwrap_or_default(),
            base: base_idx
                .map(|c| table.cell(i, c).to_string())
                .filter(|b| !b.is_empty()),
        })
        .collect())
}

fn check_file_source(source: &FileSource) -> Result<(), CourierError> {
    match source {
        FileSource::SameFile(path) if !path.is_file() => Err(CourierError::LocalPathMissing {
            path: path.clone(),
        }),
        FileSource::Lookup { dir, .. } if !dir.is_dir() => Err(CourierError::LocalPathMissing {
            path: dir.clone(),
        }),
        _ => Ok(()),
    }
}

/// Run a distribution over every row of `table`.
///
/// # Errors
/// Fatal conditions only: missing columns, a missing fixed file or lookup
/// directory, an empty month list in month scope, or an unresolvable
/// default base. Every per-row problem ends up in the report.
pub async fn distribute<T: RemoteTree>(
    tree: &T,
    table: &Table,
    plan: &DistributionPlan,
    config: &CourierConfig,
) -> Result<DistributionReport, CourierError> {
    let rows = collect_rows(table, plan)?;
    check_file_source(&plan.file_source)?;
    if plan.scope == TargetScope::Months && plan.months.iter().all(|m| m.trim().is_empty()) {
        return Err(CourierError::InvalidConfig(
            "month scope needs a non-empty month list".into(),
        ));
    }

    let create = config.create_missing && !config.dry_run;
    info!(
        "Distributing {} row(s) under '{}' ({:?} scope{})",
        rows.len(),
        display_path(&plan.default_base),
        plan.scope,
        if config.dry_run { ", dry-run" } else { "" }
    );

    let default = resolve_targets(tree, &plan.default_base, plan.scope, &plan.months, create)
        .await
        .map_err(|e| fatal_base_error(&plan.default_base, e))?;

    let default_key = base_key(&plan.default_base);
    let mut overrides: HashMap<String, Result<BaseTargets, RowError>> = HashMap::new();
    for base in rows.iter().filter_map(|r| r.base.as_deref()) {
        let key = base_key(base);
        if key.is_empty() || key == default_key || overrides.contains_key(&key) {
            continue;
        }
        let resolved = resolve_targets(tree, base, plan.scope, &plan.months, create)
            .await
            .map_err(|e| row_base_error(base, e));
        if let Err(e) = &resolved {
            warn!("Base override unusable: {e}");
        }
        overrides.insert(key, resolved);
    }

    let distributor = Distributor {
        tree,
        plan,
        config,
        default,
        overrides,
        children: Mutex::new(HashMap::new()),
    };
    let d = &distributor;
    Ok(process_rows(rows, config.progress_callback.as_ref(), move |_, row| d.handle(row)).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_paths() {
        assert_eq!(display_path(""), "/");
        assert_eq!(display_path("/LJC//2025/"), "LJC/2025");
        assert_eq!(join_display("/", "JUL"), "JUL");
        assert_eq!(join_display("LJC/2025", "JUL"), "LJC/2025/JUL");
    }

    #[test]
    fn base_keys_ignore_case_and_slashes() {
        assert_eq!(base_key("/LJC/2025/"), base_key("ljc/2025"));
    }

    #[test]
    fn rows_read_from_columns() {
        let table = Table::from_rows(
            ["CARPETA", "NRO", "BASE"],
            [["0701-0057", "00123", ""], ["", "456", "LJC/2024"]],
        );
        let plan = DistributionPlan {
            code_column: "carpeta".into(),
            base_column: Some("base".into()),
            file_source: FileSource::Lookup {
                column: "nro".into(),
                dir: PathBuf::from("/tmp"),
                extension: "pdf".into(),
            },
            scope: TargetScope::Base,
            default_base: "LJC/2025".into(),
            months: Vec::new(),
        };
        let rows = collect_rows(&table, &plan).unwrap();
        assert_eq!(rows[0].code, "0701-0057");
        assert_eq!(rows[0].file_token, "00123");
        assert_eq!(rows[0].base, None);
        assert_eq!(rows[1].base.as_deref(), Some("LJC/2024"));
        assert_eq!(rows[1].label(), "(no code)");
    }

    #[test]
    fn missing_column_is_fatal() {
        let table = Table::from_rows(["CARPETA"], [["x"]]);
        let plan = DistributionPlan {
            code_column: "CARPETA".into(),
            base_column: None,
            file_source: FileSource::PathColumn("RUTA".into()),
            scope: TargetScope::Base,
            default_base: String::new(),
            months: Vec::new(),
        };
        let err = collect_rows(&table, &plan).unwrap_err();
        assert!(matches!(err, CourierError::MissingColumn { ref column, .. } if column == "RUTA"));
    }

    #[test]
    fn lookup_prefers_exact_name_then_contains() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/const_123_x.PDF"), b"a").unwrap();
        std::fs::write(dir.path().join("123.txt"), b"b").unwrap();

        let found = find_local_file(dir.path(), "123", "pdf").unwrap();
        assert!(found.ends_with("sub/const_123_x.PDF"));

        std::fs::write(dir.path().join("123.pdf"), b"c").unwrap();
        let found = find_local_file(dir.path(), "123", "pdf").unwrap();
        assert_eq!(found, dir.path().join("123.pdf"));

        assert!(find_local_file(dir.path(), "999", "pdf").is_none());
    }

    fn landed(target: &str) -> Delivery {
        Delivery {
            file_name: "a.pdf".into(),
            target_path: target.into(),
            item_id: Some("f1".into()),
            web_url: None,
            dry_run: false,
        }
    }

    fn upload_failed(target: &str) -> RowError {
        RowError::RemoteUploadFailed {
            file: "a.pdf".into(),
            detail: format!("{target}: HTTP 500"),
        }
    }

    #[test]
    fn settle_keeps_landed_uploads_when_a_target_fails() {
        let outcome = settle(
            "0701-0057".into(),
            "a.pdf".into(),
            "LJC",
            vec![landed("LJC/ENERO/0701-0057_BCP")],
            vec![upload_failed("LJC/MARZO/0701-0057_BCP")],
        );
        match outcome {
            RowOutcome::Failed(RowError::PartialDelivery { delivered, detail, .. }) => {
                assert_eq!(delivered.len(), 1);
                assert_eq!(delivered[0].target_path, "LJC/ENERO/0701-0057_BCP");
                assert!(detail.contains("MARZO"), "got: {detail}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn settle_single_failure_passes_through() {
        let outcome = settle(
            "0701-0057".into(),
            "a.pdf".into(),
            "LJC",
            Vec::new(),
            vec![upload_failed("LJC/JUL/0701-0057_BCP")],
        );
        assert_eq!(outcome, RowOutcome::Failed(upload_failed("LJC/JUL/0701-0057_BCP")));
    }

    #[test]
    fn settle_without_matches_is_not_matched() {
        let outcome = settle("0999".into(), "a.pdf".into(), "LJC", Vec::new(), Vec::new());
        assert!(matches!(outcome, RowOutcome::Failed(RowError::FolderNotMatched { .. })));
    }
}
