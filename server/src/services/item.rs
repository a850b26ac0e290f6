//! Item operations and the list-level writes shared by users and groups.
//!
//! Every write recomputes the owning list's totals inside the same unit of
//! work. Group lists also emit `list_*` events once committed.

use crate::core::{AppError, Database, UnitOfWork};
use crate::dtos::{
    ClearedListDTO, CreateItemDTO, ItemDTO, ItemMutationDTO, ListDTO, PriceChange, UpdateItemDTO,
    UserSnippet,
};
use crate::entities::{Item, ItemStatus, ListOwner, User};
use crate::events::{DomainEvent, EventBus, ListClearedNotice, ListItemNotice};
use crate::repositories::{
    Create, Delete, ItemRepository, ListRepository, NewItem, Read, UserRepository,
};
use crate::services::ledger::{self, Totals};
use crate::services::membership;
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct ItemService {
    db: Database,
    events: Arc<dyn EventBus>,
}

impl ItemService {
    pub fn new(db: Database, events: Arc<dyn EventBus>) -> Self {
        Self { db, events }
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_item(&self, actor: &User, item_id: i64) -> Result<ItemDTO, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        let item = load_item(&mut conn, item_id).await?;
        membership::authorize_list(&mut conn, &actor.id, item.list_id).await?;

        let author = match item.user_id.as_deref() {
            Some(user_id) => UserRepository::read(&mut conn, user_id)
                .await?
                .map(|user| UserSnippet::from(&user)),
            None => None,
        };
        Ok(ItemDTO::from(item).with_author(author))
    }

    /// Applies any combination of name, quantity, price and status.
    #[instrument(skip(self, actor, data), fields(actor = %actor.id))]
    pub async fn update_details(
        &self,
        actor: &User,
        item_id: i64,
        data: UpdateItemDTO,
    ) -> Result<ItemMutationDTO, AppError> {
        if data.is_empty() {
            return Err(AppError::bad_request("Nothing to update"));
        }
        if matches!(data.item_quantity, Some(q) if q < 1) {
            return Err(AppError::bad_request("item_quantity must be a positive integer"));
        }
        let mut warnings = Vec::new();
        let price = data.item_price.resolve(&mut warnings)?;

        self.mutate(actor, item_id, warnings, move |item| {
            if let Some(name) = data.item_name {
                item.item_name = name;
            }
            if let Some(quantity) = data.item_quantity {
                item.item_quantity = quantity;
            }
            if let PriceChange::Set(value) = price {
                item.item_price = value;
            }
            if let Some(status) = data.item_status {
                item.item_status = status;
            }
        })
        .await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn update_status(
        &self,
        actor: &User,
        item_id: i64,
        status: ItemStatus,
    ) -> Result<ItemMutationDTO, AppError> {
        self.mutate(actor, item_id, Vec::new(), move |item| item.item_status = status)
            .await
    }

    async fn mutate<F>(
        &self,
        actor: &User,
        item_id: i64,
        warnings: Vec<String>,
        apply: F,
    ) -> Result<ItemMutationDTO, AppError>
    where
        F: FnOnce(&mut Item),
    {
        let mut uow = self.db.begin().await?;
        let mut item = load_item(uow.conn(), item_id).await?;
        let owner = membership::authorize_list(uow.conn(), &actor.id, item.list_id).await?;

        apply(&mut item);
        item.user_id = Some(actor.id.clone());
        let saved = ItemRepository::save(uow.conn(), &item).await?;
        let totals = ledger::refresh_totals(uow.conn(), saved.list_id).await?;

        let user = UserSnippet::from(actor);
        let dto = ItemDTO::from(saved).with_author(Some(user.clone()));
        if let ListOwner::Group(group_id) = owner {
            uow.emit(DomainEvent::ListItemUpdated(ListItemNotice {
                group_id,
                list_id: dto.list_id,
                item: dto.clone(),
                user,
                updated_totals: totals,
            }));
        }
        uow.commit(self.events.as_ref()).await?;

        info!(item_id, "Item updated");
        Ok(ItemMutationDTO {
            item: dto,
            updated_totals: totals,
            warnings,
        })
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_item(&self, actor: &User, item_id: i64) -> Result<ItemMutationDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let item = load_item(uow.conn(), item_id).await?;
        let owner = membership::authorize_list(uow.conn(), &actor.id, item.list_id).await?;

        ItemRepository::delete(uow.conn(), &item_id).await?;
        let totals = ledger::refresh_totals(uow.conn(), item.list_id).await?;

        let user = UserSnippet::from(actor);
        let dto = ItemDTO::from(item);
        if let ListOwner::Group(group_id) = owner {
            uow.emit(DomainEvent::ListItemDeleted(ListItemNotice {
                group_id,
                list_id: dto.list_id,
                item: dto.clone(),
                user,
                updated_totals: totals,
            }));
        }
        uow.commit(self.events.as_ref()).await?;

        info!(item_id, "Item deleted");
        Ok(ItemMutationDTO {
            item: dto,
            updated_totals: totals,
            warnings: Vec::new(),
        })
    }
}

async fn load_item(conn: &mut SqliteConnection, item_id: i64) -> Result<Item, AppError> {
    ItemRepository::read(conn, &item_id).await?.ok_or_else(|| {
        warn!(item_id, "Item not found");
        AppError::not_found("Item not found")
    })
}

/// A list with its items and their authors.
pub(crate) async fn load_list(
    conn: &mut SqliteConnection,
    list_id: i64,
) -> Result<ListDTO, AppError> {
    let list = ListRepository::read(conn, &list_id)
        .await?
        .ok_or_else(|| AppError::not_found("List not found"))?;
    let items = ItemRepository::find_with_authors(conn, list_id).await?;
    Ok(ListDTO::new(list, items))
}

/// Adds an item to a list whose access the caller already checked.
pub(crate) async fn add_item_to_list(
    uow: &mut UnitOfWork,
    actor: &User,
    list_id: i64,
    owner: &ListOwner,
    data: CreateItemDTO,
) -> Result<ItemMutationDTO, AppError> {
    if data.item_quantity < 1 {
        return Err(AppError::bad_request("item_quantity must be a positive integer"));
    }
    let mut warnings = Vec::new();
    let item_price = match data.item_price.resolve(&mut warnings)? {
        PriceChange::Set(value) => value,
        PriceChange::Keep => None,
    };

    let item = ItemRepository::create(
        uow.conn(),
        &NewItem {
            list_id,
            item_name: data.item_name,
            item_quantity: data.item_quantity,
            item_price,
            item_status: data.item_status.unwrap_or_default(),
            user_id: actor.id.clone(),
        },
    )
    .await?;
    let totals = ledger::refresh_totals(uow.conn(), list_id).await?;
    debug!(item_id = item.id, list_id, "Item added");

    let user = UserSnippet::from(actor);
    let dto = ItemDTO::from(item).with_author(Some(user.clone()));
    if let ListOwner::Group(group_id) = owner {
        uow.emit(DomainEvent::ListItemAdded(ListItemNotice {
            group_id: *group_id,
            list_id,
            item: dto.clone(),
            user,
            updated_totals: totals,
        }));
    }
    Ok(ItemMutationDTO {
        item: dto,
        updated_totals: totals,
        warnings,
    })
}

/// Deletes every item of a list and resets its totals.
pub(crate) async fn clear_list_items(
    uow: &mut UnitOfWork,
    actor: &User,
    list_id: i64,
    owner: &ListOwner,
) -> Result<ClearedListDTO, AppError> {
    let deleted_count = ItemRepository::delete_by_list(uow.conn(), list_id).await?;
    let updated_totals: Totals = ledger::refresh_totals(uow.conn(), list_id).await?;
    debug!(list_id, deleted_count, "List cleared");

    if let ListOwner::Group(group_id) = owner {
        uow.emit(DomainEvent::ListCleared(ListClearedNotice {
            group_id: *group_id,
            list_id,
            deleted_count,
            user: UserSnippet::from(actor),
        }));
    }
    Ok(ClearedListDTO {
        list_id,
        deleted_count,
        updated_totals,
    })
}
