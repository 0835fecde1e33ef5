use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::{MemStore, Store};
use crate::error::ApiError;
use crate::models::{
    AddToCartRequest, CreateCategoryRequest, CreateOrderRequest, CreateProductRequest,
    HistoryFilter, OrderItemRequest, OrderStatus, Product, UpdateProductRequest,
};

async fn seed_category(store: &MemStore) -> Uuid {
    store
        .create_category(CreateCategoryRequest {
            name: format!("Electronics-{}", Uuid::new_v4()),
            icon: None,
        })
        .await
        .unwrap()
        .id
}

async fn seed_product(
    store: &MemStore,
    category_id: Uuid,
    name: &str,
    price: Decimal,
    stock: i32,
) -> Product {
    store
        .create_product(CreateProductRequest {
            name: name.to_string(),
            description: format!("{} description", name),
            price,
            stock,
            image_url: None,
            category_id,
            brand: Some("Acme".to_string()),
            is_featured: false,
        })
        .await
        .unwrap()
}

fn add(product_id: Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity,
    }
}

fn order_req(items: Vec<(Uuid, i32)>) -> CreateOrderRequest {
    CreateOrderRequest {
        payment_method: "card".to_string(),
        is_installment: false,
        shipping_address: "1 Main St".to_string(),
        items: items
            .into_iter()
            .map(|(product_id, quantity)| OrderItemRequest {
                product_id,
                quantity,
            })
            .collect(),
    }
}

#[tokio::test]
async fn checkout_freezes_prices_and_decrements_stock() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let phone = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let case = seed_product(&store, category, "Case", dec!(5), 40).await;
    let user = Uuid::new_v4();

    store.add_to_cart(user, add(phone.id, 2)).await.unwrap();
    store.add_to_cart(user, add(case.id, 3)).await.unwrap();

    let order = store
        .create_order_from_cart(user, "1 Main St")
        .await
        .unwrap();

    assert_eq!(order.total_amount, dec!(215));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.items.len(), 2);

    let items_total: Decimal = order
        .items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum();
    assert_eq!(items_total, order.total_amount);

    assert_eq!(store.get_product(phone.id).await.unwrap().stock, 8);
    assert_eq!(store.get_product(case.id).await.unwrap().stock, 37);
    assert!(store.get_cart(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_checkout_leaves_everything_untouched() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let a = seed_product(&store, category, "Widget A", dec!(100), 10).await;
    let b = seed_product(&store, category, "Widget B", dec!(50), 10).await;
    let user = Uuid::new_v4();

    store.add_to_cart(user, add(a.id, 2)).await.unwrap();
    store.add_to_cart(user, add(b.id, 5)).await.unwrap();

    // Stock moved under the cart: the optimistic add passed, the
    // authoritative in-transaction check must now fail.
    store
        .update_product(
            b.id,
            UpdateProductRequest {
                stock: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = store.create_order_from_cart(user, "1 Main St").await;
    assert!(matches!(
        err,
        Err(ApiError::InsufficientStock {
            available: 1,
            requested: 5,
            ..
        })
    ));

    // Nothing happened: no orders, stock of A intact, cart intact.
    let (orders, total) = store.get_user_orders(user, None, 10, 0).await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
    assert_eq!(store.get_product(a.id).await.unwrap().stock, 10);
    assert_eq!(store.get_cart(user).await.unwrap().len(), 2);
    let (history, _) = store
        .list_purchase_history(user, &HistoryFilter::default())
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn repeated_add_accumulates_quantity() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let user = Uuid::new_v4();

    store.add_to_cart(user, add(product.id, 2)).await.unwrap();
    let item = store.add_to_cart(user, add(product.id, 3)).await.unwrap();

    assert_eq!(item.quantity, 5);
    let cart = store.get_cart(user).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 5);
    assert_eq!(store.cart_total(user).await.unwrap(), dec!(500));
}

#[tokio::test]
async fn add_beyond_stock_is_rejected() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 4).await;
    let user = Uuid::new_v4();

    store.add_to_cart(user, add(product.id, 3)).await.unwrap();

    // 3 already in the cart; 3 + 2 exceeds the 4 in stock.
    let err = store.add_to_cart(user, add(product.id, 2)).await;
    assert!(matches!(
        err,
        Err(ApiError::InsufficientStock {
            available: 4,
            requested: 5,
            ..
        })
    ));

    let cart = store.get_cart(user).await.unwrap();
    assert_eq!(cart[0].quantity, 3);
}

#[tokio::test]
async fn cart_mutations_are_owner_scoped_and_stock_checked() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 4).await;
    let user = Uuid::new_v4();

    let item = store.add_to_cart(user, add(product.id, 1)).await.unwrap();

    // Another user cannot touch the row; knowing the id is not enough.
    let err = store.update_cart_item(Uuid::new_v4(), item.id, 2).await;
    assert!(matches!(err, Err(ApiError::NotFound("cart item"))));
    let err = store.remove_cart_item(Uuid::new_v4(), item.id).await;
    assert!(matches!(err, Err(ApiError::NotFound("cart item"))));
    assert_eq!(store.get_cart(user).await.unwrap().len(), 1);

    // Quantity updates re-check stock.
    let err = store.update_cart_item(user, item.id, 9).await;
    assert!(matches!(
        err,
        Err(ApiError::InsufficientStock {
            available: 4,
            requested: 9,
            ..
        })
    ));
    let updated = store.update_cart_item(user, item.id, 3).await.unwrap();
    assert_eq!(updated.quantity, 3);

    // Removing an absent item is NotFound; removing the real one works.
    let err = store.remove_cart_item(user, Uuid::new_v4()).await;
    assert!(matches!(err, Err(ApiError::NotFound("cart item"))));
    store.remove_cart_item(user, item.id).await.unwrap();
    assert!(store.get_cart(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn clear_cart_only_touches_the_callers_rows() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();

    store.add_to_cart(user, add(product.id, 1)).await.unwrap();
    store.add_to_cart(other, add(product.id, 2)).await.unwrap();

    store.clear_cart(user).await.unwrap();
    assert!(store.get_cart(user).await.unwrap().is_empty());
    assert_eq!(store.get_cart(other).await.unwrap().len(), 1);
}

#[tokio::test]
async fn adding_unavailable_product_is_rejected() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    store.delete_product(product.id).await.unwrap();

    let err = store.add_to_cart(Uuid::new_v4(), add(product.id, 1)).await;
    assert!(matches!(err, Err(ApiError::ProductUnavailable)));
}

#[tokio::test]
async fn checkout_with_empty_cart_fails() {
    let store = MemStore::new();
    let err = store
        .create_order_from_cart(Uuid::new_v4(), "1 Main St")
        .await;
    assert!(matches!(err, Err(ApiError::CartEmpty)));
}

#[tokio::test]
async fn concurrent_orders_for_last_units() {
    let store = Arc::new(MemStore::new());
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 5).await;

    let first = {
        let store = Arc::clone(&store);
        let req = order_req(vec![(product.id, 3)]);
        tokio::spawn(async move { store.create_order(Uuid::new_v4(), req).await })
    };
    let second = {
        let store = Arc::clone(&store);
        let req = order_req(vec![(product.id, 3)]);
        tokio::spawn(async move { store.create_order(Uuid::new_v4(), req).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = outcomes.iter().filter(|o| o.is_ok()).count();

    assert_eq!(succeeded, 1, "exactly one placement must win");
    assert!(outcomes
        .iter()
        .any(|o| matches!(o, Err(ApiError::InsufficientStock { .. }))));
    assert_eq!(store.get_product(product.id).await.unwrap().stock, 2);
}

#[tokio::test]
async fn opposite_order_multi_line_placements_both_settle() {
    let store = Arc::new(MemStore::new());
    let category = seed_category(&store).await;
    let phone = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let case = seed_product(&store, category, "Case", dec!(5), 10).await;

    // Same two products, opposite line order, concurrently.
    let first = {
        let store = Arc::clone(&store);
        let req = order_req(vec![(phone.id, 2), (case.id, 2)]);
        tokio::spawn(async move { store.create_order(Uuid::new_v4(), req).await })
    };
    let second = {
        let store = Arc::clone(&store);
        let req = order_req(vec![(case.id, 3), (phone.id, 3)]);
        tokio::spawn(async move { store.create_order(Uuid::new_v4(), req).await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(store.get_product(phone.id).await.unwrap().stock, 5);
    assert_eq!(store.get_product(case.id).await.unwrap().stock, 5);
}

#[tokio::test]
async fn search_matches_name_description_and_brand_case_insensitively() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let phone = seed_product(&store, category, "Phone", dec!(100), 10).await;
    seed_product(&store, category, "Laptop", dec!(900), 10).await;

    let by_name = store.search_products("PHONE").await.unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].id, phone.id);

    // seed_product writes "<name> description" and brand "Acme".
    let by_description = store.search_products("phone desc").await.unwrap();
    assert_eq!(by_description.len(), 1);
    let by_brand = store.search_products("acme").await.unwrap();
    assert_eq!(by_brand.len(), 2);

    assert!(store.search_products("tablet").await.unwrap().is_empty());
}

#[tokio::test]
async fn soft_delete_hides_product_but_keeps_snapshots() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let user = Uuid::new_v4();

    let order = store
        .create_order(user, order_req(vec![(product.id, 1)]))
        .await
        .unwrap();

    store.delete_product(product.id).await.unwrap();

    assert!(store.list_products().await.unwrap().is_empty());
    assert!(store.search_products("phone").await.unwrap().is_empty());
    assert!(store
        .list_products_by_category(category)
        .await
        .unwrap()
        .is_empty());

    // The snapshot survives the soft delete.
    let view = store.get_order(user, order.id).await.unwrap();
    assert_eq!(view.items[0].price, dec!(100));
    let (history, _) = store
        .list_purchase_history(user, &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history[0].product_name, "Phone");
    assert_eq!(history[0].unit_price, dec!(100));
}

#[tokio::test]
async fn category_with_products_cannot_be_deleted() {
    let store = MemStore::new();
    let occupied = seed_category(&store).await;
    let empty = seed_category(&store).await;
    seed_product(&store, occupied, "Phone", dec!(100), 10).await;

    let err = store.delete_category(occupied).await;
    assert!(matches!(err, Err(ApiError::Conflict(_))));

    store.delete_category(empty).await.unwrap();
    assert!(matches!(
        store.get_category(empty).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn price_change_never_reprices_existing_orders() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let user = Uuid::new_v4();

    let order = store
        .create_order(user, order_req(vec![(product.id, 2)]))
        .await
        .unwrap();

    store
        .update_product(
            product.id,
            UpdateProductRequest {
                price: Some(dec!(250)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let view = store.get_order(user, order.id).await.unwrap();
    assert_eq!(view.items[0].price, dec!(100));
    assert_eq!(view.total_amount, dec!(200));
    // The embedded product reflects the live catalog, the snapshot does not.
    assert_eq!(view.items[0].product.price, dec!(250));
}

#[tokio::test]
async fn order_lookup_is_owner_scoped() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let owner = Uuid::new_v4();

    let order = store
        .create_order(owner, order_req(vec![(product.id, 1)]))
        .await
        .unwrap();

    // Another user probing the same id gets NotFound, not Forbidden.
    let err = store.get_order(Uuid::new_v4(), order.id).await;
    assert!(matches!(err, Err(ApiError::NotFound("order"))));

    assert!(store.get_order(owner, order.id).await.is_ok());
}

#[tokio::test]
async fn status_follows_the_state_machine() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let user = Uuid::new_v4();

    let order = store
        .create_order(user, order_req(vec![(product.id, 1)]))
        .await
        .unwrap();

    // Skipping straight to SHIPPED is rejected.
    let err = store
        .update_order_status(order.id, OrderStatus::Shipped)
        .await;
    assert!(matches!(
        err,
        Err(ApiError::IllegalStatusTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        })
    ));

    store
        .update_order_status(order.id, OrderStatus::Confirmed)
        .await
        .unwrap();
    store
        .update_order_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    let delivered = store
        .update_order_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    // The projection follows the order, and delivery stamps a date.
    let (history, _) = store
        .list_purchase_history(user, &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(history[0].order_status, OrderStatus::Delivered);
    assert!(history[0].delivery_date.is_some());

    // Terminal states admit no further moves.
    let err = store
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await;
    assert!(matches!(err, Err(ApiError::IllegalStatusTransition { .. })));
}

#[tokio::test]
async fn stock_exhaustion_clears_availability() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 2).await;

    store
        .create_order(Uuid::new_v4(), order_req(vec![(product.id, 2)]))
        .await
        .unwrap();

    let product = store.get_product(product.id).await.unwrap();
    assert_eq!(product.stock, 0);
    assert!(!product.is_available);
    assert!(store.list_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn partial_update_distinguishes_absent_from_zero() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 10).await;

    // Absent fields stay untouched.
    let updated = store
        .update_product(
            product.id,
            UpdateProductRequest {
                name: Some("Phone Pro".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Phone Pro");
    assert_eq!(updated.price, dec!(100));
    assert_eq!(updated.stock, 10);

    // An explicit zero is a real value, and zero stock clears availability.
    let updated = store
        .update_product(
            product.id,
            UpdateProductRequest {
                price: Some(Decimal::ZERO),
                stock: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.price, Decimal::ZERO);
    assert_eq!(updated.stock, 0);
    assert!(!updated.is_available);
}

#[tokio::test]
async fn direct_order_leaves_cart_alone() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let phone = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let case = seed_product(&store, category, "Case", dec!(5), 10).await;
    let user = Uuid::new_v4();

    store.add_to_cart(user, add(case.id, 1)).await.unwrap();

    let order = store
        .create_order(user, order_req(vec![(phone.id, 1)]))
        .await
        .unwrap();
    assert_eq!(order.payment_method.as_deref(), Some("card"));

    // "Buy now" must not clear the cart.
    assert_eq!(store.get_cart(user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn order_stats_reflect_committed_orders() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let product = seed_product(&store, category, "Phone", dec!(100), 20).await;
    let user = Uuid::new_v4();

    let first = store
        .create_order(user, order_req(vec![(product.id, 1)]))
        .await
        .unwrap();
    store
        .create_order(user, order_req(vec![(product.id, 2)]))
        .await
        .unwrap();

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        store.update_order_status(first.id, status).await.unwrap();
    }

    let stats = store.order_stats(user).await.unwrap();
    assert_eq!(stats.total_spent, dec!(100));
    assert!(stats.last_order_date.is_some());

    let delivered = stats
        .status_counts
        .iter()
        .find(|entry| entry.status == OrderStatus::Delivered)
        .unwrap();
    assert_eq!(delivered.count, 1);
    let pending = stats
        .status_counts
        .iter()
        .find(|entry| entry.status == OrderStatus::Pending)
        .unwrap();
    assert_eq!(pending.count, 1);

    // A stranger's stats are empty.
    let stats = store.order_stats(Uuid::new_v4()).await.unwrap();
    assert!(stats.status_counts.is_empty());
    assert_eq!(stats.total_spent, Decimal::ZERO);
}

#[tokio::test]
async fn purchase_history_filters_and_pagination() {
    let store = MemStore::new();
    let category = seed_category(&store).await;
    let phone = seed_product(&store, category, "Phone", dec!(100), 10).await;
    let laptop = seed_product(&store, category, "Laptop", dec!(900), 10).await;
    let user = Uuid::new_v4();

    let first = store
        .create_order(user, order_req(vec![(phone.id, 1)]))
        .await
        .unwrap();
    store
        .create_order(user, order_req(vec![(laptop.id, 1)]))
        .await
        .unwrap();

    for status in [
        OrderStatus::Confirmed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        store.update_order_status(first.id, status).await.unwrap();
    }

    let (all, total) = store
        .list_purchase_history(user, &HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(total, 2);

    let (delivered, _) = store
        .list_purchase_history(
            user,
            &HistoryFilter {
                status: Some(OrderStatus::Delivered),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].product_name, "Phone");

    let (by_name, _) = store
        .list_purchase_history(
            user,
            &HistoryFilter {
                product_name: Some("lap".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].product_name, "Laptop");

    let (first_page, total) = store
        .list_purchase_history(
            user,
            &HistoryFilter {
                limit: Some(1),
                page: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(first_page.len(), 1);
    assert_eq!(total, 2);

    let stats = store.purchase_stats(user).await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.total_amount, dec!(1000));
    assert_eq!(stats.delivered_orders, 1);
    assert_eq!(stats.pending_orders, 1);
    assert_eq!(stats.avg_order_value, dec!(500));

    let recent = store.recent_purchases(user, 5).await.unwrap();
    assert_eq!(recent.len(), 2);
}
