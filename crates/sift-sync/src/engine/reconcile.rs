//! Storage half of a pass: diff prepared entities against the stored shadow
//! rows and items, and record only what changed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sift_core::entities::{Account, Item, ItemDetail, List, ShadowEntity};
use sift_core::enums::{Controller, MissingPolicy, Provider};
use sift_db::changeset::{Changeset, EntityWrite, ItemWrite, MembershipWrite, Removal};
use sift_db::repos::item::NewItem;
use sift_db::updates::item::{ItemUpdate, ItemUpdateBuilder};

use super::fetch::{AccountFetch, Prepared};

/// Stored state of one account, loaded before its remote half ran.
pub(crate) struct Stored<'a> {
    pub account: &'a Account,
    pub lists: &'a [List],
    pub shadows: &'a [ShadowEntity],
    pub items: &'a [Item],
}

/// Fold one account's fetch into the pass changeset.
pub(crate) fn reconcile_account(
    changeset: &mut Changeset,
    stored: &Stored<'_>,
    fetch: AccountFetch,
    policy: MissingPolicy,
    now: DateTime<Utc>,
) {
    let provider = changeset.provider;
    let shadows: HashMap<&str, &ShadowEntity> = stored
        .shadows
        .iter()
        .map(|shadow| (shadow.native_key.as_str(), shadow))
        .collect();
    let items: HashMap<&str, &Item> = stored.items.iter().map(|item| (item.id.as_str(), item)).collect();

    for prepared in fetch.entities {
        let previous = shadows.get(prepared.key.as_str()).copied();
        let stored_item = previous.and_then(|shadow| items.get(shadow.item_id.as_str()).copied());
        if previous.is_some() && stored_item.is_none() {
            tracing::warn!(account_id = %stored.account.id, key = %prepared.key, "shadow entity without an item");
            continue;
        }
        if let Some(write) = entity_write(provider, stored, previous, stored_item, prepared, now) {
            changeset.entities.push(write);
        }
    }

    for key in fetch.missing {
        if let Some(shadow) = shadows.get(key.as_str()) {
            tracing::debug!(account_id = %stored.account.id, key = %key, %policy, "remote entity gone");
            changeset.removals.push(Removal {
                account_id: stored.account.id.clone(),
                native_key: key,
                item_id: shadow.item_id.clone(),
                policy,
            });
        }
    }

    for (list_id, keys) in fetch.memberships {
        changeset.memberships.push(MembershipWrite {
            list_id,
            account_id: stored.account.id.clone(),
            keys,
        });
    }
}

fn entity_write(
    provider: Provider,
    stored: &Stored<'_>,
    previous: Option<&ShadowEntity>,
    item: Option<&Item>,
    prepared: Prepared,
    now: DateTime<Utc>,
) -> Option<EntityWrite> {
    let controller = if prepared.lists.is_empty() {
        Controller::Service
    } else {
        Controller::ServiceList
    };
    let detail = ItemDetail::Service {
        provider,
        url: prepared.params.url.clone(),
    };

    let (item_write, shadow_changed) = match (previous, item) {
        (Some(shadow), Some(item)) => {
            let update = item_update(item, &prepared, controller, &detail);
            let write = if update.is_empty() {
                ItemWrite::Unchanged {
                    item_id: item.id.clone(),
                }
            } else {
                ItemWrite::Update {
                    item_id: item.id.clone(),
                    update,
                }
            };
            (write, shadow.state() != prepared.state)
        }
        (None, _) => {
            let due = prepared.params.due.or_else(|| list_due(stored.lists, &prepared.lists, now));
            let new = NewItem {
                user_id: stored.account.user_id.clone(),
                summary: prepared.params.summary,
                fields: prepared.params.fields,
                due,
                done: prepared.params.done,
                controller,
                detail,
            };
            (ItemWrite::Create(new), true)
        }
        (Some(_), None) => return None,
    };

    Some(EntityWrite {
        account_id: stored.account.id.clone(),
        native_key: prepared.key,
        state: prepared.state,
        shadow_changed,
        item: item_write,
    })
}

/// The fields of `item` that differ from the prepared remote state.
///
/// A missing remote due keeps whatever due the item already has.
fn item_update(item: &Item, prepared: &Prepared, controller: Controller, detail: &ItemDetail) -> ItemUpdate {
    let params = &prepared.params;
    let mut builder = ItemUpdateBuilder::new();
    if item.summary != params.summary {
        builder = builder.summary(params.summary.clone());
    }
    if item.fields != params.fields {
        builder = builder.fields(params.fields.clone());
    }
    if params.due.is_some() && item.due != params.due {
        builder = builder.due(params.due);
    }
    if item.done != params.done {
        builder = builder.done(params.done);
    }
    if item.controller != controller {
        builder = builder.controller(controller);
    }
    if &item.detail != detail {
        builder = builder.detail(detail.clone());
    }
    builder.build()
}

/// Due from the first list carrying a due offset, resolved against `now`.
fn list_due(lists: &[List], list_ids: &[String], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    list_ids.iter().find_map(|id| {
        lists
            .iter()
            .find(|list| &list.id == id)
            .and_then(|list| list.due_offset.as_ref())
            .map(|offset| offset.resolve(now))
    })
}
