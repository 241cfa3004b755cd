//! Cart management.
//!
//! The cart is the only input to order placement. Quantities are kept
//! positive and never above the product's stock at the time of the change;
//! placement checks stock again since it may have moved since.

use serde::Serialize;
use store::{
    CartEntry, CartLine, CartLineId, CartStore, Money, ProductId, ProductStore, Storage,
    Transaction,
};

use crate::access::{Action, Actor, Resource, can_perform};
use crate::error::DomainError;
use crate::transaction::finish;

/// The actor's cart lines and their value at current prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub entries: Vec<CartEntry>,
    pub total: Money,
}

/// Service for managing a user's cart.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    storage: S,
}

impl<S: Storage> CartService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn get_cart(&self, actor: &Actor) -> Result<CartSummary, DomainError> {
        authorize(actor)?;
        let mut tx = self.storage.begin().await?;
        let result = summarize(tx.as_mut(), actor).await;
        finish(tx, result).await
    }

    /// Adds a product, merging with an existing line for the same product.
    ///
    /// A quantity of zero or less counts as one.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn add_to_cart(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartEntry, DomainError> {
        authorize(actor)?;
        let quantity = if quantity <= 0 {
            1
        } else {
            to_quantity(product_id, quantity)?
        };

        let mut tx = self.storage.begin().await?;
        let result = add_within(tx.as_mut(), actor, product_id, quantity).await;
        let entry = finish(tx, result).await?;

        metrics::counter!("cart_mutations_total", "op" => "add").increment(1);
        tracing::info!(product_id = %product_id, quantity = entry.line.quantity, "cart line saved");
        Ok(entry)
    }

    /// Sets a line's quantity. Zero or less removes the line and returns `None`.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn update_quantity(
        &self,
        actor: &Actor,
        line_id: CartLineId,
        quantity: i64,
    ) -> Result<Option<CartEntry>, DomainError> {
        authorize(actor)?;
        let mut tx = self.storage.begin().await?;
        let result = update_within(tx.as_mut(), actor, line_id, quantity).await;
        let entry = finish(tx, result).await?;

        let op = if entry.is_some() { "update" } else { "remove" };
        metrics::counter!("cart_mutations_total", "op" => op).increment(1);
        Ok(entry)
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn remove_line(&self, actor: &Actor, line_id: CartLineId) -> Result<(), DomainError> {
        authorize(actor)?;
        let mut tx = self.storage.begin().await?;
        let result = match tx.delete_cart_line(actor.user_id, line_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DomainError::not_found("Cart item", line_id)),
            Err(err) => Err(err.into()),
        };
        finish(tx, result).await?;

        metrics::counter!("cart_mutations_total", "op" => "remove").increment(1);
        Ok(())
    }

    /// Removes every line. Returns how many there were.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn clear_cart(&self, actor: &Actor) -> Result<u64, DomainError> {
        authorize(actor)?;
        let mut tx = self.storage.begin().await?;
        let result = tx.clear_cart(actor.user_id).await.map_err(DomainError::from);
        let removed = finish(tx, result).await?;

        metrics::counter!("cart_mutations_total", "op" => "clear").increment(1);
        Ok(removed)
    }
}

fn authorize(actor: &Actor) -> Result<(), DomainError> {
    let own = Resource::Cart {
        owner: actor.user_id,
    };
    if can_perform(actor, Action::ManageCart, own) {
        Ok(())
    } else {
        Err(DomainError::Forbidden(Action::ManageCart))
    }
}

fn to_quantity(product_id: ProductId, quantity: i64) -> Result<u32, DomainError> {
    u32::try_from(quantity).map_err(|_| DomainError::InvalidQuantity {
        product_id,
        quantity,
    })
}

async fn summarize(tx: &mut dyn Transaction, actor: &Actor) -> Result<CartSummary, DomainError> {
    let entries = tx.list_cart(actor.user_id).await?;
    let total = entries
        .iter()
        .try_fold(Money::zero(), |total, entry| {
            entry
                .product
                .price
                .checked_multiply(entry.line.quantity)
                .and_then(|subtotal| total.checked_add(subtotal))
        })
        .ok_or(DomainError::AmountOverflow)?;
    Ok(CartSummary { entries, total })
}

async fn add_within(
    tx: &mut dyn Transaction,
    actor: &Actor,
    product_id: ProductId,
    quantity: u32,
) -> Result<CartEntry, DomainError> {
    let product = tx
        .get_product(product_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Product", product_id))?;
    if !product.is_active {
        return Err(DomainError::ProductUnavailable(product_id));
    }

    if quantity > product.stock {
        return Err(DomainError::InsufficientStock {
            product_id,
            requested: quantity,
            available: product.stock,
        });
    }

    let line = tx
        .merge_cart_line(&CartLine::new(actor.user_id, product_id, quantity))
        .await?;

    // A refusal here rolls the merge back.
    if line.quantity > product.stock {
        return Err(DomainError::InsufficientStock {
            product_id,
            requested: line.quantity,
            available: product.stock,
        });
    }

    Ok(CartEntry { line, product })
}

async fn update_within(
    tx: &mut dyn Transaction,
    actor: &Actor,
    line_id: CartLineId,
    quantity: i64,
) -> Result<Option<CartEntry>, DomainError> {
    let line = tx
        .get_cart_line(actor.user_id, line_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Cart item", line_id))?;

    if quantity <= 0 {
        tx.delete_cart_line(actor.user_id, line_id).await?;
        return Ok(None);
    }

    let quantity = to_quantity(line.product_id, quantity)?;
    let product = tx
        .get_product(line.product_id)
        .await?
        .ok_or_else(|| DomainError::not_found("Product", line.product_id))?;
    if quantity > product.stock {
        return Err(DomainError::InsufficientStock {
            product_id: product.id,
            requested: quantity,
            available: product.stock,
        });
    }

    let line = line.with_quantity(quantity);
    tx.save_cart_line(&line).await?;
    Ok(Some(CartEntry { line, product }))
}
