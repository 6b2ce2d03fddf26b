//! The write set of one reconciliation pass.
//!
//! The engine computes a [`Changeset`] entirely in memory and hands it to
//! [`SiftDb::apply_changeset`], which applies every write inside one
//! transaction. Any failure rolls the whole pass back.

use libsql::Connection;

use sift_core::entities::{EntityState, ItemRef, List, ShadowEntity};
use sift_core::enums::{Controller, MissingPolicy, Provider};

use crate::SiftDb;
use crate::error::DatabaseError;
use crate::repos::account::set_problem;
use crate::repos::item::{
    NewItem, apply_item_update, insert_item, read_membership, remove_item, write_membership,
};
use crate::repos::list::insert_list;
use crate::repos::shadow::{delete_shadow, find_shadow, upsert_shadow};
use crate::updates::item::{ItemUpdate, ItemUpdateBuilder};

/// What to do with the core item behind one remote entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemWrite {
    Create(NewItem),
    Update { item_id: String, update: ItemUpdate },
    Unchanged { item_id: String },
}

/// One reconciled remote entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityWrite {
    pub account_id: String,
    pub native_key: String,
    pub state: EntityState,
    /// Whether the memoized state differs from the stored shadow row.
    /// New entities are always written.
    pub shadow_changed: bool,
    pub item: ItemWrite,
}

impl EntityWrite {
    const fn is_noop(&self) -> bool {
        !self.shadow_changed && matches!(self.item, ItemWrite::Unchanged { .. })
    }
}

/// A tracked entity confirmed gone upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub account_id: String,
    pub native_key: String,
    pub item_id: String,
    pub policy: MissingPolicy,
}

/// The ordered remote membership of one list, by native key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipWrite {
    pub list_id: String,
    pub account_id: String,
    pub keys: Vec<String>,
}

/// A credential problem to record on an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProblem {
    pub account_id: String,
    pub problem: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub provider: Provider,
    pub new_lists: Vec<List>,
    pub problems: Vec<AccountProblem>,
    pub entities: Vec<EntityWrite>,
    pub removals: Vec<Removal>,
    pub memberships: Vec<MembershipWrite>,
}

impl Changeset {
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self {
            provider,
            new_lists: Vec::new(),
            problems: Vec::new(),
            entities: Vec::new(),
            removals: Vec::new(),
            memberships: Vec::new(),
        }
    }

    /// True when applying this changeset could not change any row.
    ///
    /// Memberships are compared against storage at commit time, so any
    /// membership write keeps the changeset non-empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_lists.is_empty()
            && self.problems.is_empty()
            && self.removals.is_empty()
            && self.memberships.is_empty()
            && self.entities.iter().all(EntityWrite::is_noop)
    }
}

/// What a committed changeset actually wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub created: Vec<ItemRef>,
    pub updated: Vec<ItemRef>,
    pub unchanged: usize,
    pub shadows_written: usize,
    pub deleted: usize,
    pub detached: usize,
    pub memberships_written: usize,
    pub lists_created: usize,
    pub problems_flagged: usize,
}

impl CommitSummary {
    /// The item written for `(account_id, native_key)`, if this commit created
    /// or updated one.
    #[must_use]
    pub fn item_for(&self, account_id: &str, native_key: &str) -> Option<&ItemRef> {
        self.created
            .iter()
            .chain(&self.updated)
            .find(|r| r.account_id == account_id && r.native_key == native_key)
    }

    /// Total number of rows this commit changed.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.created.len()
            + self.updated.len()
            + self.shadows_written
            + self.deleted
            + self.detached
            + self.memberships_written
            + self.lists_created
            + self.problems_flagged
    }
}

async fn write_entity(
    conn: &Connection,
    provider: Provider,
    write: &EntityWrite,
    summary: &mut CommitSummary,
) -> Result<(), DatabaseError> {
    let item_ref = |item_id: &str| ItemRef {
        item_id: item_id.to_string(),
        account_id: write.account_id.clone(),
        native_key: write.native_key.clone(),
    };

    let (item_id, is_new) = match &write.item {
        ItemWrite::Create(new) => {
            // A concurrent writer may have created the entity since the
            // engine read the shadow table; converge onto its item.
            match find_shadow(conn, provider, &write.account_id, &write.native_key).await? {
                Some(existing) => {
                    apply_item_update(conn, &existing.item_id, &new.as_update()).await?;
                    summary.updated.push(item_ref(&existing.item_id));
                    (existing.item_id, false)
                }
                None => {
                    let item = insert_item(conn, new).await?;
                    summary.created.push(item_ref(&item.id));
                    (item.id, true)
                }
            }
        }
        ItemWrite::Update { item_id, update } => {
            if apply_item_update(conn, item_id, update).await? {
                summary.updated.push(item_ref(item_id));
            } else {
                summary.unchanged += 1;
            }
            (item_id.clone(), false)
        }
        ItemWrite::Unchanged { item_id } => {
            summary.unchanged += 1;
            (item_id.clone(), false)
        }
    };

    if is_new || write.shadow_changed {
        upsert_shadow(
            conn,
            &ShadowEntity {
                provider,
                account_id: write.account_id.clone(),
                native_key: write.native_key.clone(),
                item_id,
                done_at: write.state.done_at,
                memo: write.state.memo.clone(),
            },
        )
        .await?;
        summary.shadows_written += 1;
    }
    Ok(())
}

async fn write_removal(
    conn: &Connection,
    provider: Provider,
    removal: &Removal,
    summary: &mut CommitSummary,
) -> Result<(), DatabaseError> {
    let removed = delete_shadow(conn, provider, &removal.account_id, &removal.native_key).await?;
    if removed == 0 {
        return Ok(());
    }

    match removal.policy {
        MissingPolicy::Delete => {
            remove_item(conn, &removal.item_id).await?;
            summary.deleted += 1;
        }
        MissingPolicy::Detach => {
            let update = ItemUpdateBuilder::new().controller(Controller::Manual).build();
            apply_item_update(conn, &removal.item_id, &update).await?;
            conn.execute(
                "DELETE FROM list_items WHERE item_id = ?1",
                [removal.item_id.as_str()],
            )
            .await?;
            summary.detached += 1;
        }
    }
    Ok(())
}

async fn write_membership_for_keys(
    conn: &Connection,
    provider: Provider,
    membership: &MembershipWrite,
    summary: &mut CommitSummary,
) -> Result<(), DatabaseError> {
    let mut item_ids: Vec<String> = Vec::with_capacity(membership.keys.len());
    for key in &membership.keys {
        // keys whose entity was skipped this pass have no shadow yet
        if let Some(shadow) = find_shadow(conn, provider, &membership.account_id, key).await?
            && !item_ids.contains(&shadow.item_id)
        {
            item_ids.push(shadow.item_id);
        }
    }

    if read_membership(conn, &membership.list_id).await? != item_ids {
        write_membership(conn, &membership.list_id, &item_ids).await?;
        summary.memberships_written += 1;
    }
    Ok(())
}

async fn write_changeset(
    conn: &Connection,
    changeset: &Changeset,
) -> Result<CommitSummary, DatabaseError> {
    let provider = changeset.provider;
    let mut summary = CommitSummary::default();

    for list in &changeset.new_lists {
        insert_list(conn, list).await?;
        summary.lists_created += 1;
    }
    for problem in &changeset.problems {
        set_problem(conn, &problem.account_id, Some(problem.problem.as_str())).await?;
        summary.problems_flagged += 1;
    }
    for write in &changeset.entities {
        write_entity(conn, provider, write, &mut summary).await?;
    }
    for removal in &changeset.removals {
        write_removal(conn, provider, removal, &mut summary).await?;
    }
    for membership in &changeset.memberships {
        write_membership_for_keys(conn, provider, membership, &mut summary).await?;
    }
    Ok(summary)
}

impl SiftDb {
    /// Apply every write of one reconciliation pass atomically.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if any statement fails; nothing is written in
    /// that case.
    pub async fn apply_changeset(
        &self,
        changeset: &Changeset,
    ) -> Result<CommitSummary, DatabaseError> {
        if changeset.is_empty() {
            return Ok(CommitSummary {
                unchanged: changeset.entities.len(),
                ..CommitSummary::default()
            });
        }

        let txn = self.begin().await?;
        let result = write_changeset(txn.conn(), changeset).await;
        let summary = txn.finish(result).await?;

        tracing::debug!(
            provider = %changeset.provider,
            created = summary.created.len(),
            updated = summary.updated.len(),
            deleted = summary.deleted,
            detached = summary.detached,
            memberships = summary.memberships_written,
            "changeset committed"
        );
        Ok(summary)
    }
}
