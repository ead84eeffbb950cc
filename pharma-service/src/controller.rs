//! Generic CRUD controller
//!
//! One [`ResourceDescriptor`] yields the five operations of a resource and
//! the axum routes mounting them under `/api/{collection}`:
//!
//! | Method | Path                      | Success        |
//! |--------|---------------------------|----------------|
//! | GET    | `/api/{collection}`       | 200 list       |
//! | GET    | `/api/{collection}/{id}`  | 200 record     |
//! | POST   | `/api/{collection}`       | 201 record     |
//! | PUT    | `/api/{collection}/{id}`  | 200 record     |
//! | DELETE | `/api/{collection}/{id}`  | 204            |
//!
//! Validation runs in the extractors, so an operation only ever sees parsed
//! input. Mutations are recorded in the activity log after storage succeeds.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::activity::{ActivityAction, ActivityDraft, ActivityLogger};
use crate::api::{
    ApiError, Created, IdParams, ListParams, ListResponse, ListSettings, NoContent, PaginationMeta,
};
use crate::context::RequestContext;
use crate::storage::{EntityId, Record, Storage};
use crate::validation::{Schema, ValidJson, ValidPath, ValidQuery};

/// Everything the controller needs to know about one resource
pub struct ResourceDescriptor<S: Storage> {
    entity_name: &'static str,
    collection: &'static str,
    storage: Arc<S>,
    list: ListSettings,
}

impl<S: Storage> ResourceDescriptor<S> {
    /// Describe a resource
    ///
    /// `entity_name` is used in messages ("Product not found"), `collection`
    /// is the URL segment (`products`).
    pub fn new(entity_name: &'static str, collection: &'static str, storage: Arc<S>) -> Self {
        Self {
            entity_name,
            collection,
            storage,
            list: ListSettings::default(),
        }
    }

    /// Replace the paging limits and searchable fields
    #[must_use]
    pub fn with_list_settings(mut self, list: ListSettings) -> Self {
        self.list = list;
        self
    }

    /// Entity name used in messages
    pub fn entity_name(&self) -> &'static str {
        self.entity_name
    }

    /// `/api/{collection}`
    pub fn base_path(&self) -> String {
        format!("/api/{}", self.collection)
    }

    /// Paging limits and searchable fields
    pub fn list_settings(&self) -> &ListSettings {
        &self.list
    }
}

/// The five CRUD operations of one resource
pub struct CrudController<S: Storage> {
    descriptor: ResourceDescriptor<S>,
    activity: ActivityLogger,
}

impl<S> CrudController<S>
where
    S: Storage,
    S::Create: Schema,
    S::Update: Schema + Serialize,
{
    /// Build a controller
    pub fn new(descriptor: ResourceDescriptor<S>, activity: ActivityLogger) -> Self {
        Self {
            descriptor,
            activity,
        }
    }

    /// The resource description
    pub fn descriptor(&self) -> &ResourceDescriptor<S> {
        &self.descriptor
    }

    /// One page of records, clamped to the resource's limits
    pub async fn list(
        &self,
        _ctx: &RequestContext,
        params: ListParams,
    ) -> Result<ListResponse<S::Record>, ApiError> {
        let (page, search) = self.descriptor.list.resolve(&params);
        let result = self
            .descriptor
            .storage
            .get_all(page, search.as_ref())
            .await?;

        Ok(ListResponse::new(
            result.items,
            PaginationMeta::new(page.page, page.limit, result.total),
        ))
    }

    /// A single record
    pub async fn get(&self, _ctx: &RequestContext, id: EntityId) -> Result<S::Record, ApiError> {
        self.find(id).await
    }

    /// Insert a record and record the creation
    pub async fn create(
        &self,
        ctx: &RequestContext,
        input: S::Create,
    ) -> Result<S::Record, ApiError> {
        let record = self.descriptor.storage.create(input).await?;

        let name = self.descriptor.entity_name;
        self.activity.record(
            ctx,
            ActivityDraft::new(
                ActivityAction::Create,
                name,
                format!("Created {name} #{}", record.id()),
            )
            .with_entity_id(record.id())
            .with_metadata("record", snapshot(&record)),
        );

        Ok(record)
    }

    /// Apply a partial update to an existing record and record the change
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        input: S::Update,
    ) -> Result<S::Record, ApiError> {
        self.find(id).await?;

        let changes = snapshot(&input);
        let record = self.descriptor.storage.update(id, input).await?;

        let name = self.descriptor.entity_name;
        self.activity.record(
            ctx,
            ActivityDraft::new(ActivityAction::Update, name, format!("Updated {name} #{id}"))
                .with_entity_id(id)
                .with_metadata("changes", changes),
        );

        Ok(record)
    }

    /// Delete an existing record and record the deletion
    pub async fn remove(&self, ctx: &RequestContext, id: EntityId) -> Result<(), ApiError> {
        let existing = self.find(id).await?;

        if !self.descriptor.storage.delete(id).await? {
            return Err(ApiError::not_found(self.descriptor.entity_name));
        }

        let name = self.descriptor.entity_name;
        self.activity.record(
            ctx,
            ActivityDraft::new(ActivityAction::Delete, name, format!("Deleted {name} #{id}"))
                .with_entity_id(id)
                .with_metadata("record", snapshot(&existing)),
        );

        Ok(())
    }

    async fn find(&self, id: EntityId) -> Result<S::Record, ApiError> {
        self.descriptor
            .storage
            .get_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(self.descriptor.entity_name))
    }

    /// `METHOD path` lines for every route this controller mounts
    pub fn endpoints(&self) -> Vec<String> {
        let base = self.descriptor.base_path();
        vec![
            format!("GET {base}"),
            format!("GET {base}/{{id}}"),
            format!("POST {base}"),
            format!("PUT {base}/{{id}}"),
            format!("DELETE {base}/{{id}}"),
        ]
    }

    /// Routes for this resource, with the controller as state
    pub fn router(self: Arc<Self>) -> Router {
        let base = self.descriptor.base_path();
        Router::new()
            .route(&base, get(list_handler::<S>).post(create_handler::<S>))
            .route(
                &format!("{base}/{{id}}"),
                get(get_handler::<S>)
                    .put(update_handler::<S>)
                    .delete(remove_handler::<S>),
            )
            .with_state(self)
    }
}

fn snapshot<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| json!({ "unserializable": e.to_string() }))
}

async fn list_handler<S>(
    State(controller): State<Arc<CrudController<S>>>,
    ctx: RequestContext,
    ValidQuery(params): ValidQuery<ListParams>,
) -> Result<ListResponse<S::Record>, ApiError>
where
    S: Storage,
    S::Create: Schema,
    S::Update: Schema + Serialize,
{
    controller.list(&ctx, params).await
}

async fn get_handler<S>(
    State(controller): State<Arc<CrudController<S>>>,
    ctx: RequestContext,
    ValidPath(IdParams { id }): ValidPath<IdParams>,
) -> Result<Json<S::Record>, ApiError>
where
    S: Storage,
    S::Create: Schema,
    S::Update: Schema + Serialize,
{
    controller.get(&ctx, id).await.map(Json)
}

async fn create_handler<S>(
    State(controller): State<Arc<CrudController<S>>>,
    ctx: RequestContext,
    ValidJson(input): ValidJson<S::Create>,
) -> Result<Created<S::Record>, ApiError>
where
    S: Storage,
    S::Create: Schema,
    S::Update: Schema + Serialize,
{
    let record = controller.create(&ctx, input).await?;
    let location = format!("{}/{}", controller.descriptor.base_path(), record.id());
    Ok(Created::new(record).with_location(location))
}

async fn update_handler<S>(
    State(controller): State<Arc<CrudController<S>>>,
    ctx: RequestContext,
    ValidPath(IdParams { id }): ValidPath<IdParams>,
    ValidJson(input): ValidJson<S::Update>,
) -> Result<Json<S::Record>, ApiError>
where
    S: Storage,
    S::Create: Schema,
    S::Update: Schema + Serialize,
{
    controller.update(&ctx, id, input).await.map(Json)
}

async fn remove_handler<S>(
    State(controller): State<Arc<CrudController<S>>>,
    ctx: RequestContext,
    ValidPath(IdParams { id }): ValidPath<IdParams>,
) -> Result<NoContent, ApiError>
where
    S: Storage,
    S::Create: Schema,
    S::Update: Schema + Serialize,
{
    controller.remove(&ctx, id).await.map(|()| NoContent)
}
