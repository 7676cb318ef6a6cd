//! Amendment merge rules and quantity bookkeeping.

use order_store::LineItem;

/// Net change in one product's quantity between two line lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDelta {
    pub product: String,
    pub change: i64,
}

impl LineDelta {
    pub fn is_increase(&self) -> bool {
        self.change > 0
    }

    /// The change as an unsigned unit count.
    pub fn units(&self) -> u32 {
        u32::try_from(self.change.unsigned_abs()).unwrap_or(u32::MAX)
    }
}

/// Applies an amendment to an order's lines.
///
/// For each amendment line, in order:
/// - quantity zero removes every line for that product
/// - an existing product takes the new quantity (later duplicates are dropped)
/// - a new product is appended
///
/// Lines the amendment does not mention are left as they are.
pub fn merge_amendment(existing: &[LineItem], amendment: &[LineItem]) -> Vec<LineItem> {
    let mut merged = existing.to_vec();

    for change in amendment {
        if change.quantity == 0 {
            merged.retain(|line| line.product != change.product);
            continue;
        }

        match merged.iter().position(|line| line.product == change.product) {
            Some(first) => {
                merged[first].quantity = change.quantity;
                let mut seen = false;
                merged.retain(|line| {
                    if line.product != change.product {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => merged.push(change.clone()),
        }
    }

    merged
}

/// Sums quantities per product, keeping first-seen order.
pub fn totals_by_product(lines: &[LineItem]) -> Vec<LineItem> {
    let mut totals: Vec<LineItem> = Vec::new();
    for line in lines {
        match totals.iter_mut().find(|t| t.product == line.product) {
            Some(total) => total.quantity = total.quantity.saturating_add(line.quantity),
            None => totals.push(line.clone()),
        }
    }
    totals
}

/// Per-product quantity changes from `before` to `after`.
///
/// Products appear in first-seen order across `before` then `after`.
/// Unchanged products are omitted.
pub fn quantity_deltas(before: &[LineItem], after: &[LineItem]) -> Vec<LineDelta> {
    let before = totals_by_product(before);
    let after = totals_by_product(after);

    let mut products: Vec<&str> = before.iter().map(|l| l.product.as_str()).collect();
    for line in &after {
        if !products.contains(&line.product.as_str()) {
            products.push(&line.product);
        }
    }

    let quantity_in = |lines: &[LineItem], product: &str| {
        lines
            .iter()
            .find(|l| l.product == product)
            .map_or(0, |l| i64::from(l.quantity))
    };

    products
        .into_iter()
        .filter_map(|product| {
            let change = quantity_in(&after, product) - quantity_in(&before, product);
            (change != 0).then(|| LineDelta {
                product: product.to_string(),
                change,
            })
        })
        .collect()
}
