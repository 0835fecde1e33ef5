use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::Store;
use crate::error::ApiError;
use crate::models::{
    AddToCartRequest, CartItem, CartLine, Category, CreateCategoryRequest, CreateOrderRequest,
    CreateProductRequest, HistoryFilter, HistoryStats, Order, OrderItem, OrderItemView,
    OrderStats, OrderStatus, OrderView, Product, PurchaseHistory, StatusCount,
    UpdateCategoryRequest, UpdateProductRequest,
};

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    categories: HashMap<Uuid, Category>,
    cart_items: Vec<CartItem>,
    orders: HashMap<Uuid, Order>,
    order_items: Vec<OrderItem>,
    history: Vec<PurchaseHistory>,
}

/// In-memory store for tests. Every operation runs under one mutex guard, so
/// a "transaction" here is simply: validate everything first, then mutate.
/// The order workflow therefore honors the same all-or-nothing contract as
/// [`super::PgStore`].
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate every line against current stock, then apply all writes.
    /// Runs entirely under the caller's lock; nothing is mutated unless the
    /// whole order is payable.
    fn place_order(
        inner: &mut Inner,
        user_id: Uuid,
        lines: &[(Uuid, i32)],
        payment_method: Option<&str>,
        is_installment: bool,
        shipping_address: &str,
    ) -> Result<Order, ApiError> {
        // Accumulate requested quantity per product so duplicate lines
        // cannot sneak past a per-line check.
        let mut requested: HashMap<Uuid, i32> = HashMap::new();
        for &(product_id, quantity) in lines {
            *requested.entry(product_id).or_insert(0) += quantity;
        }

        let mut total_amount = Decimal::ZERO;
        for &(product_id, quantity) in lines {
            let product = inner
                .products
                .get(&product_id)
                .ok_or(ApiError::ProductNotFound)?;

            let wanted = requested[&product_id];
            if product.stock < wanted {
                return Err(ApiError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                    requested: wanted,
                });
            }

            total_amount += product.price * Decimal::from(quantity);
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            total_amount,
            status: OrderStatus::Pending,
            payment_method: payment_method.map(str::to_string),
            is_installment,
            shipping_address: shipping_address.to_string(),
            created_at: now,
            updated_at: now,
        };

        for &(product_id, quantity) in lines {
            let product = &inner.products[&product_id];

            inner.order_items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id,
                quantity,
                price: product.price,
                created_at: now,
            });

            inner.history.push(PurchaseHistory {
                id: Uuid::new_v4(),
                user_id,
                order_id: order.id,
                product_id,
                product_name: product.name.clone(),
                product_image_url: product.image_url.clone(),
                quantity,
                unit_price: product.price,
                total_price: product.price * Decimal::from(quantity),
                order_status: OrderStatus::Pending,
                payment_method: payment_method.map(str::to_string),
                is_installment,
                purchase_date: now,
                delivery_date: None,
                shipping_address: shipping_address.to_string(),
                created_at: now,
                updated_at: now,
            });
        }

        for (product_id, quantity) in requested {
            let product = inner
                .products
                .get_mut(&product_id)
                .ok_or(ApiError::ProductNotFound)?;
            product.stock -= quantity;
            if product.stock == 0 {
                product.is_available = false;
            }
            product.updated_at = now;
        }

        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    fn order_view(inner: &Inner, order: Order) -> OrderView {
        let mut items: Vec<&OrderItem> = inner
            .order_items
            .iter()
            .filter(|item| item.order_id == order.id)
            .collect();
        items.sort_by_key(|item| item.created_at);

        let views = items
            .into_iter()
            .map(|item| {
                let product = inner.products[&item.product_id].clone();
                OrderItemView::new(item.clone(), product)
            })
            .collect();

        OrderView::new(order, views)
    }

    fn available_products(inner: &Inner) -> Vec<Product> {
        let mut products: Vec<Product> = inner
            .products
            .values()
            .filter(|p| p.is_available)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for MemStore {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        Ok(Self::available_products(&self.lock()))
    }

    async fn list_featured_products(&self) -> Result<Vec<Product>, ApiError> {
        let mut products = Self::available_products(&self.lock());
        products.retain(|p| p.is_featured);
        Ok(products)
    }

    async fn list_products_by_category(&self, category_id: Uuid) -> Result<Vec<Product>, ApiError> {
        let mut products = Self::available_products(&self.lock());
        products.retain(|p| p.category_id == category_id);
        Ok(products)
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        let needle = query.to_lowercase();
        let mut products = Self::available_products(&self.lock());
        products.retain(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
                || p.brand
                    .as_ref()
                    .is_some_and(|brand| brand.to_lowercase().contains(&needle))
        });
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Product, ApiError> {
        self.lock()
            .products
            .get(&id)
            .cloned()
            .ok_or(ApiError::ProductNotFound)
    }

    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, ApiError> {
        let mut inner = self.lock();
        if !inner.categories.contains_key(&req.category_id) {
            return Err(ApiError::CategoryNotFound);
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            image_url: req.image_url,
            brand: req.brand,
            rating: Decimal::ZERO,
            review_count: 0,
            category_id: req.category_id,
            is_featured: req.is_featured,
            is_available: req.stock > 0,
            created_at: now,
            updated_at: now,
        };
        inner.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<Product, ApiError> {
        let mut inner = self.lock();
        if let Some(category_id) = req.category_id {
            if !inner.categories.contains_key(&category_id) {
                return Err(ApiError::CategoryNotFound);
            }
        }

        let product = inner
            .products
            .get_mut(&id)
            .ok_or(ApiError::ProductNotFound)?;

        if let Some(name) = req.name {
            product.name = name;
        }
        if let Some(description) = req.description {
            product.description = description;
        }
        if let Some(price) = req.price {
            product.price = price;
        }
        if let Some(stock) = req.stock {
            product.stock = stock;
        }
        if let Some(image_url) = req.image_url {
            product.image_url = Some(image_url);
        }
        if let Some(brand) = req.brand {
            product.brand = Some(brand);
        }
        if let Some(category_id) = req.category_id {
            product.category_id = category_id;
        }
        if let Some(is_featured) = req.is_featured {
            product.is_featured = is_featured;
        }
        if let Some(is_available) = req.is_available {
            product.is_available = is_available;
        }
        if product.stock == 0 {
            product.is_available = false;
        }
        product.updated_at = Utc::now();

        Ok(product.clone())
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let product = inner
            .products
            .get_mut(&id)
            .ok_or(ApiError::ProductNotFound)?;
        product.is_available = false;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let mut categories: Vec<Category> = self.lock().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Category, ApiError> {
        self.lock()
            .categories
            .get(&id)
            .cloned()
            .ok_or(ApiError::NotFound("category"))
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, ApiError> {
        let mut inner = self.lock();
        if inner.categories.values().any(|c| c.name == req.name) {
            return Err(ApiError::Conflict(
                "category with this name already exists".to_string(),
            ));
        }

        let category = Category {
            id: Uuid::new_v4(),
            name: req.name,
            icon: req.icon,
            created_at: Utc::now(),
        };
        inner.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Category, ApiError> {
        let mut inner = self.lock();
        if !inner.categories.contains_key(&id) {
            return Err(ApiError::NotFound("category"));
        }

        if let Some(name) = &req.name {
            if inner
                .categories
                .values()
                .any(|c| c.id != id && c.name == *name)
            {
                return Err(ApiError::Conflict(
                    "category with this name already exists".to_string(),
                ));
            }
        }

        let category = inner
            .categories
            .get_mut(&id)
            .ok_or(ApiError::NotFound("category"))?;
        if let Some(name) = req.name {
            category.name = name;
        }
        if let Some(icon) = req.icon {
            category.icon = Some(icon);
        }
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), ApiError> {
        let mut inner = self.lock();
        if !inner.categories.contains_key(&id) {
            return Err(ApiError::NotFound("category"));
        }
        if inner.products.values().any(|p| p.category_id == id) {
            return Err(ApiError::Conflict(
                "cannot delete category that has products associated with it".to_string(),
            ));
        }
        inner.categories.remove(&id);
        Ok(())
    }

    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, ApiError> {
        let inner = self.lock();
        let mut items: Vec<CartItem> = inner
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at);

        Ok(items
            .into_iter()
            .map(|item| {
                let product = inner.products[&item.product_id].clone();
                CartLine::new(item, product)
            })
            .collect())
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        req: AddToCartRequest,
    ) -> Result<CartItem, ApiError> {
        let mut inner = self.lock();
        let product = inner
            .products
            .get(&req.product_id)
            .ok_or(ApiError::ProductNotFound)?;

        if !product.is_available {
            return Err(ApiError::ProductUnavailable);
        }

        let existing_quantity = inner
            .cart_items
            .iter()
            .find(|item| item.user_id == user_id && item.product_id == req.product_id)
            .map_or(0, |item| item.quantity);

        let new_quantity = existing_quantity + req.quantity;
        if product.stock < new_quantity {
            return Err(ApiError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock,
                requested: new_quantity,
            });
        }

        let now = Utc::now();
        if let Some(item) = inner
            .cart_items
            .iter_mut()
            .find(|item| item.user_id == user_id && item.product_id == req.product_id)
        {
            item.quantity = new_quantity;
            item.updated_at = now;
            return Ok(item.clone());
        }

        let item = CartItem {
            id: Uuid::new_v4(),
            user_id,
            product_id: req.product_id,
            quantity: req.quantity,
            created_at: now,
            updated_at: now,
        };
        inner.cart_items.push(item.clone());
        Ok(item)
    }

    async fn update_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, ApiError> {
        let mut inner = self.lock();

        let product_id = inner
            .cart_items
            .iter()
            .find(|item| item.id == item_id && item.user_id == user_id)
            .map(|item| item.product_id)
            .ok_or(ApiError::NotFound("cart item"))?;

        let product = inner
            .products
            .get(&product_id)
            .ok_or(ApiError::ProductNotFound)?;
        if product.stock < quantity {
            return Err(ApiError::InsufficientStock {
                name: product.name.clone(),
                available: product.stock,
                requested: quantity,
            });
        }

        let item = inner
            .cart_items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or(ApiError::NotFound("cart item"))?;
        item.quantity = quantity;
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let before = inner.cart_items.len();
        inner
            .cart_items
            .retain(|item| !(item.id == item_id && item.user_id == user_id));
        if inner.cart_items.len() == before {
            return Err(ApiError::NotFound("cart item"));
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<(), ApiError> {
        self.lock().cart_items.retain(|item| item.user_id != user_id);
        Ok(())
    }

    async fn cart_total(&self, user_id: Uuid) -> Result<Decimal, ApiError> {
        let inner = self.lock();
        Ok(inner
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .map(|item| inner.products[&item.product_id].price * Decimal::from(item.quantity))
            .sum())
    }

    async fn create_order_from_cart(
        &self,
        user_id: Uuid,
        shipping_address: &str,
    ) -> Result<OrderView, ApiError> {
        let mut inner = self.lock();

        let mut cart: Vec<CartItem> = inner
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect();
        cart.sort_by_key(|item| item.created_at);

        if cart.is_empty() {
            return Err(ApiError::CartEmpty);
        }

        let lines: Vec<(Uuid, i32)> = cart
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        let order = Self::place_order(&mut inner, user_id, &lines, None, false, shipping_address)?;
        inner.cart_items.retain(|item| item.user_id != user_id);

        Ok(Self::order_view(&inner, order))
    }

    async fn create_order(
        &self,
        user_id: Uuid,
        req: CreateOrderRequest,
    ) -> Result<OrderView, ApiError> {
        let lines: Vec<(Uuid, i32)> = req
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        let mut inner = self.lock();
        let order = Self::place_order(
            &mut inner,
            user_id,
            &lines,
            Some(&req.payment_method),
            req.is_installment,
            &req.shipping_address,
        )?;

        Ok(Self::order_view(&inner, order))
    }

    async fn get_user_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderView>, i64), ApiError> {
        let inner = self.lock();
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .filter(|order| status.map_or(true, |s| order.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = orders.len() as i64;
        let views = page(orders, limit, offset)
            .into_iter()
            .map(|order| Self::order_view(&inner, order))
            .collect();

        Ok((views, total))
    }

    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ApiError> {
        let inner = self.lock();
        let order = inner
            .orders
            .get(&order_id)
            .filter(|order| order.user_id == user_id)
            .cloned()
            .ok_or(ApiError::NotFound("order"))?;
        Ok(Self::order_view(&inner, order))
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let mut inner = self.lock();
        let order = inner
            .orders
            .get_mut(&order_id)
            .ok_or(ApiError::NotFound("order"))?;

        if !order.status.can_transition_to(status) {
            return Err(ApiError::IllegalStatusTransition {
                from: order.status,
                to: status,
            });
        }

        let now = Utc::now();
        order.status = status;
        order.updated_at = now;
        let order = order.clone();

        for record in inner
            .history
            .iter_mut()
            .filter(|record| record.order_id == order_id)
        {
            record.order_status = status;
            record.updated_at = now;
            if status == OrderStatus::Delivered {
                record.delivery_date = Some(now);
            }
        }

        Ok(order)
    }

    async fn order_stats(&self, user_id: Uuid) -> Result<OrderStats, ApiError> {
        let inner = self.lock();
        let orders: Vec<&Order> = inner
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .collect();

        let mut counts: HashMap<OrderStatus, i64> = HashMap::new();
        for order in &orders {
            *counts.entry(order.status).or_insert(0) += 1;
        }
        let mut status_counts: Vec<StatusCount> = counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect();
        status_counts.sort_by_key(|entry| entry.status.as_str());

        let total_spent = orders
            .iter()
            .filter(|order| order.status == OrderStatus::Delivered)
            .map(|order| order.total_amount)
            .sum();

        let last_order_date = orders.iter().map(|order| order.created_at).max();

        Ok(OrderStats {
            status_counts,
            total_spent,
            last_order_date,
        })
    }

    async fn list_purchase_history(
        &self,
        user_id: Uuid,
        filter: &HistoryFilter,
    ) -> Result<(Vec<PurchaseHistory>, i64), ApiError> {
        let inner = self.lock();
        let mut records: Vec<PurchaseHistory> = inner
            .history
            .iter()
            .filter(|record| record.user_id == user_id)
            .filter(|record| filter.status.map_or(true, |s| record.order_status == s))
            .filter(|record| {
                filter
                    .payment_method
                    .as_ref()
                    .map_or(true, |pm| record.payment_method.as_deref() == Some(pm))
            })
            .filter(|record| {
                filter
                    .is_installment
                    .map_or(true, |flag| record.is_installment == flag)
            })
            .filter(|record| filter.start_date.map_or(true, |d| record.purchase_date >= d))
            .filter(|record| filter.end_date.map_or(true, |d| record.purchase_date <= d))
            .filter(|record| {
                filter.product_name.as_ref().map_or(true, |name| {
                    record
                        .product_name
                        .to_lowercase()
                        .contains(&name.to_lowercase())
                })
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));

        let total = records.len() as i64;
        Ok((page(records, filter.limit(), filter.offset()), total))
    }

    async fn get_purchase_history(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<PurchaseHistory, ApiError> {
        self.lock()
            .history
            .iter()
            .find(|record| record.id == id && record.user_id == user_id)
            .cloned()
            .ok_or(ApiError::NotFound("purchase history"))
    }

    async fn purchase_stats(&self, user_id: Uuid) -> Result<HistoryStats, ApiError> {
        let inner = self.lock();
        let records: Vec<&PurchaseHistory> = inner
            .history
            .iter()
            .filter(|record| record.user_id == user_id)
            .collect();

        let total_orders = records.len() as i64;
        let total_amount: Decimal = records.iter().map(|record| record.total_price).sum();

        let mut stats = HistoryStats {
            total_orders,
            total_amount,
            delivered_orders: 0,
            pending_orders: 0,
            cancelled_orders: 0,
            avg_order_value: Decimal::ZERO,
        };

        for record in &records {
            match record.order_status {
                OrderStatus::Delivered => stats.delivered_orders += 1,
                OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Shipped => {
                    stats.pending_orders += 1
                }
                OrderStatus::Cancelled => stats.cancelled_orders += 1,
            }
        }

        if total_orders > 0 {
            stats.avg_order_value = total_amount / Decimal::from(total_orders);
        }

        Ok(stats)
    }

    async fn recent_purchases(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PurchaseHistory>, ApiError> {
        let cutoff = Utc::now() - chrono::Duration::days(30);
        let inner = self.lock();
        let mut records: Vec<PurchaseHistory> = inner
            .history
            .iter()
            .filter(|record| record.user_id == user_id && record.purchase_date >= cutoff)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.purchase_date.cmp(&a.purchase_date));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }
}
