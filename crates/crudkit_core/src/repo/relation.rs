//! Referential-integrity policies applied when a parent row is deleted.
//!
//! # Responsibility
//! - Name, per relationship, what happens to dependent rows on delete.
//! - Execute that policy inside the caller's delete transaction.
//!
//! # Invariants
//! - Policies run before the parent row is removed, in the same
//!   transaction, so a failed policy leaves parent and dependents intact.
//! - `ClearReference` requires a nullable foreign key and an `updated_at`
//!   column on the dependent table.

use crate::error::{CrudError, CrudResult};
use crate::mapper::{id_to_storage, now_millis};
use crate::model::EntityId;
use log::debug;
use rusqlite::{params, Connection};

/// What happens to dependent rows when their parent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Delete every dependent row.
    Cascade,
    /// Keep dependents and set their foreign key to NULL.
    ClearReference,
    /// Refuse the delete with `Conflict` while any dependent exists.
    Block,
}

/// Whether deleting a missing id is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Missing id is `NotFound`; the deleted entity is returned.
    RequireExisting,
    /// Missing id is a no-op reported as `deleted: false`.
    Idempotent,
}

/// One declared parent -> dependent relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub child_resource: &'static str,
    pub child_table: &'static str,
    pub foreign_key: &'static str,
    pub policy: DeletePolicy,
}

impl Relation {
    /// Applies this policy for `parent_id` and returns the number of
    /// dependent rows seen (blocked, deleted or cleared).
    ///
    /// # Errors
    /// - `Conflict` under `Block` when dependents exist.
    pub fn apply(
        &self,
        conn: &Connection,
        parent_resource: &'static str,
        parent_id: EntityId,
    ) -> CrudResult<usize> {
        let parent = id_to_storage(parent_id);
        let affected = match self.policy {
            DeletePolicy::Block => {
                let dependents: i64 = conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {} WHERE {} = ?1;",
                        self.child_table, self.foreign_key
                    ),
                    [parent.as_str()],
                    |row| row.get(0),
                )?;
                if dependents > 0 {
                    return Err(CrudError::conflict(
                        parent_resource,
                        format!(
                            "{dependents} {} row(s) still reference {parent_id}",
                            self.child_resource
                        ),
                    ));
                }
                0
            }
            DeletePolicy::Cascade => conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1;",
                    self.child_table, self.foreign_key
                ),
                [parent.as_str()],
            )?,
            DeletePolicy::ClearReference => conn.execute(
                &format!(
                    "UPDATE {table}
                     SET {fk} = NULL,
                         updated_at = ?2
                     WHERE {fk} = ?1;",
                    table = self.child_table,
                    fk = self.foreign_key
                ),
                params![parent.as_str(), now_millis()],
            )?,
        };

        debug!(
            "event=delete_policy module=repo status=ok parent={} child={} policy={:?} affected={}",
            parent_resource, self.child_resource, self.policy, affected
        );
        Ok(affected)
    }
}
