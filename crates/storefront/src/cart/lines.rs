//! Pure read-modify-write steps over a cart's line items.
//!
//! Each function takes the current sequence and returns the full sequence to
//! write back, or `None` when there is nothing to write.

use shopfront_core::CartLineItem;

/// Add a line, merging into an existing line for the same product.
///
/// The existing line keeps its position and metadata; only its quantity
/// grows. New products are appended.
#[must_use]
pub fn with_added(items: &[CartLineItem], line: CartLineItem) -> Vec<CartLineItem> {
    let mut next = items.to_vec();

    match next
        .iter_mut()
        .find(|item| item.product_id == line.product_id)
    {
        Some(existing) => {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        }
        None => next.push(line),
    }

    next
}

/// Set the quantity of the line at `index`.
///
/// Returns `None` if `index` is out of range. The quantity is taken as given.
#[must_use]
pub fn with_quantity(
    items: &[CartLineItem],
    index: usize,
    quantity: u32,
) -> Option<Vec<CartLineItem>> {
    let mut next = items.to_vec();
    next.get_mut(index)?.quantity = quantity;
    Some(next)
}

/// Remove the line at `index`.
///
/// Returns `None` if `index` is out of range.
#[must_use]
pub fn without_index(items: &[CartLineItem], index: usize) -> Option<Vec<CartLineItem>> {
    if index >= items.len() {
        return None;
    }

    Some(
        items
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, item)| item.clone())
            .collect(),
    )
}
