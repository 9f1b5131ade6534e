//! The drinks catalog
//!
//! Drinks live in process memory. Ids are assigned in ascending order
//! starting from 1 and are never reused.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Longest title accepted, in characters
pub const MAX_TITLE_LEN: usize = 80;

/// One component of a recipe
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub color: String,
    pub name: String,
    pub parts: u32,
}

/// A list of ingredients
///
/// A single ingredient object is accepted where a list is expected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecipeDto")]
pub struct Recipe(Vec<Ingredient>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RecipeDto {
    Many(Vec<Ingredient>),
    One(Ingredient),
}

impl From<RecipeDto> for Recipe {
    fn from(dto: RecipeDto) -> Self {
        match dto {
            RecipeDto::Many(ingredients) => Self(ingredients),
            RecipeDto::One(ingredient) => Self(vec![ingredient]),
        }
    }
}

impl Recipe {
    pub fn new(ingredients: Vec<Ingredient>) -> Self {
        Self(ingredients)
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A drink in the catalog
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Drink {
    id: u64,
    title: String,
    recipe: Recipe,
}

/// The public view of a drink: colors and proportions, no ingredient names
#[derive(Debug, Serialize)]
pub struct ShortDrink<'a> {
    id: u64,
    title: &'a str,
    recipe: Vec<ShortIngredient<'a>>,
}

#[derive(Debug, Serialize)]
struct ShortIngredient<'a> {
    color: &'a str,
    parts: u32,
}

impl Drink {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    /// The public representation
    pub fn short(&self) -> ShortDrink<'_> {
        ShortDrink {
            id: self.id,
            title: &self.title,
            recipe: self
                .recipe
                .ingredients()
                .iter()
                .map(|i| ShortIngredient {
                    color: &i.color,
                    parts: i.parts,
                })
                .collect(),
        }
    }

    /// The detailed representation, including ingredient names
    pub fn long(&self) -> &Self {
        self
    }
}

/// A request to add a drink
#[derive(Clone, Debug, Deserialize)]
pub struct NewDrink {
    pub title: String,
    pub recipe: Recipe,
}

/// A request to change a drink
///
/// The title must always be given. The existing recipe is kept when none
/// is given.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DrinkPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<Recipe>,
}

/// Failure of a catalog operation
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// No drink has the given id
    #[error("no drink with id {0}")]
    NotFound(u64),

    /// An update did not name a title
    #[error("title is required")]
    TitleRequired,

    /// The drink violates a catalog constraint
    #[error("constraint violated: {0}")]
    Constraint(&'static str),
}

#[derive(Debug, Default)]
struct Inner {
    drinks: BTreeMap<u64, Drink>,
    last_id: u64,
}

/// The shared catalog; clones refer to the same drinks
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    inner: Arc<RwLock<Inner>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All drinks in ascending id order
    pub async fn list(&self) -> Vec<Drink> {
        self.inner.read().await.drinks.values().cloned().collect()
    }

    pub async fn get(&self, id: u64) -> Result<Drink, CatalogError> {
        self.inner
            .read()
            .await
            .drinks
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    pub async fn create(&self, new: NewDrink) -> Result<Drink, CatalogError> {
        let mut inner = self.inner.write().await;
        check_title(&new.title)?;
        check_recipe(&new.recipe)?;
        inner.check_unique(&new.title, None)?;

        inner.last_id += 1;
        let drink = Drink {
            id: inner.last_id,
            title: new.title,
            recipe: new.recipe,
        };
        inner.drinks.insert(drink.id, drink.clone());

        tracing::info!(drink.id = drink.id, "drink created");
        Ok(drink)
    }

    pub async fn update(&self, id: u64, patch: DrinkPatch) -> Result<Drink, CatalogError> {
        let mut inner = self.inner.write().await;
        if !inner.drinks.contains_key(&id) {
            return Err(CatalogError::NotFound(id));
        }

        let title = patch.title.ok_or(CatalogError::TitleRequired)?;
        check_title(&title)?;
        if let Some(recipe) = &patch.recipe {
            check_recipe(recipe)?;
        }
        inner.check_unique(&title, Some(id))?;

        let drink = inner
            .drinks
            .get_mut(&id)
            .ok_or(CatalogError::NotFound(id))?;
        drink.title = title;
        if let Some(recipe) = patch.recipe {
            drink.recipe = recipe;
        }

        tracing::info!(drink.id = id, "drink updated");
        Ok(drink.clone())
    }

    pub async fn delete(&self, id: u64) -> Result<u64, CatalogError> {
        self.inner
            .write()
            .await
            .drinks
            .remove(&id)
            .ok_or(CatalogError::NotFound(id))?;

        tracing::info!(drink.id = id, "drink deleted");
        Ok(id)
    }
}

impl Inner {
    fn check_unique(&self, title: &str, except: Option<u64>) -> Result<(), CatalogError> {
        let taken = self
            .drinks
            .values()
            .any(|d| d.title == title && Some(d.id) != except);

        if taken {
            Err(CatalogError::Constraint("title must be unique"))
        } else {
            Ok(())
        }
    }
}

fn check_title(title: &str) -> Result<(), CatalogError> {
    if title.is_empty() {
        return Err(CatalogError::Constraint("title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CatalogError::Constraint("title is too long"));
    }
    Ok(())
}

fn check_recipe(recipe: &Recipe) -> Result<(), CatalogError> {
    if recipe.is_empty() {
        return Err(CatalogError::Constraint("recipe must not be empty"));
    }
    if recipe.ingredients().iter().any(|i| i.parts == 0) {
        return Err(CatalogError::Constraint("parts must be at least 1"));
    }
    Ok(())
}
