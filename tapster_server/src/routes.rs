//! HTTP handlers for the drinks catalog

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    drinks::{Catalog, Drink, DrinkPatch, NewDrink},
    error::ApiError,
};

pub mod permission {
    tapster_axum::permission_guards! {
        pub permission Menu = public;
        pub permission ReadDetail = "get:drinks-detail";
        pub permission PostDrinks = "post:drinks";
        pub permission PatchDrinks = "patch:drinks";
        pub permission DeleteDrinks = "delete:drinks";
    }
}

/// The `{"success": true, "drinks": [...]}` envelope
#[derive(Debug, Serialize)]
pub struct DrinksBody<T> {
    success: bool,
    drinks: Vec<T>,
}

impl<T> DrinksBody<T> {
    fn new(drinks: Vec<T>) -> Json<Self> {
        Json(Self {
            success: true,
            drinks,
        })
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn list_drinks(
    _: permission::Menu,
    State(catalog): State<Catalog>,
) -> Json<Value> {
    let drinks = catalog.list().await;
    Json(json!({
        "success": true,
        "drinks": drinks.iter().map(Drink::short).collect::<Vec<_>>(),
    }))
}

pub async fn drinks_detail(
    _: permission::ReadDetail,
    State(catalog): State<Catalog>,
) -> Json<DrinksBody<Drink>> {
    DrinksBody::new(catalog.list().await)
}

pub async fn create_drink(
    permission::PostDrinks(claims): permission::PostDrinks,
    State(catalog): State<Catalog>,
    body: Result<Json<NewDrink>, JsonRejection>,
) -> ApiResult<Json<DrinksBody<Drink>>> {
    let Json(new) = body?;
    let drink = catalog.create(new).await?;

    tracing::debug!(sub = ?claims.sub(), drink.id = drink.id(), "created on behalf of subject");
    Ok(DrinksBody::new(vec![drink]))
}

pub async fn update_drink(
    _: permission::PatchDrinks,
    State(catalog): State<Catalog>,
    id: Result<Path<u64>, PathRejection>,
    body: Result<Json<DrinkPatch>, JsonRejection>,
) -> ApiResult<Json<DrinksBody<Drink>>> {
    let Json(patch) = body?;
    let Path(id) = id?;
    let drink = catalog.update(id, patch).await?;

    Ok(DrinksBody::new(vec![drink]))
}

pub async fn delete_drink(
    _: permission::DeleteDrinks,
    State(catalog): State<Catalog>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<Value>> {
    let Path(id) = id?;
    let id = catalog.delete(id).await?;

    Ok(Json(json!({ "success": true, "delete": id })))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
