use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::Store;
use crate::error::ApiError;
use crate::models::{
    AddToCartRequest, CartItem, CartLine, Category, CreateCategoryRequest, CreateOrderRequest,
    CreateProductRequest, HistoryFilter, HistoryStats, Order, OrderItem, OrderItemView,
    OrderStats, OrderStatus, OrderView, Product, PurchaseHistory, StatusCount,
    UpdateCategoryRequest, UpdateProductRequest,
};

/// Production store backed by Postgres. The order workflow runs inside a
/// single transaction with `FOR UPDATE` row locks on the products it touches,
/// and the stock decrement is additionally guarded by `stock >= qty` so two
/// racing placements can never drive stock negative.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn category_exists(&self, id: Uuid) -> Result<bool, ApiError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn attach_items(&self, order: Order) -> Result<OrderView, ApiError> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at",
        )
        .bind(order.id)
        .fetch_all(&self.pool)
        .await?;

        let mut views = Vec::with_capacity(items.len());
        for item in items {
            // Products are never physically deleted, so the row must exist.
            let product =
                sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
                    .bind(item.product_id)
                    .fetch_one(&self.pool)
                    .await?;
            views.push(OrderItemView::new(item, product));
        }

        Ok(OrderView::new(order, views))
    }

    /// The transactional core shared by both order entry points. Reads each
    /// product fresh under a row lock, validates stock for every line before
    /// writing anything, then inserts the order, its item snapshots and the
    /// purchase-history rows, and decrements stock. Any error aborts the
    /// whole transaction via the caller's rollback-on-drop.
    async fn place_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        lines: &[(Uuid, i32)],
        payment_method: Option<&str>,
        is_installment: bool,
        shipping_address: &str,
    ) -> Result<Order, ApiError> {
        // Lock rows in a deterministic order so two placements touching the
        // same products in opposite order cannot deadlock.
        let mut lines = lines.to_vec();
        lines.sort_by_key(|&(product_id, _)| product_id);

        let mut products = Vec::with_capacity(lines.len());
        let mut total_amount = Decimal::ZERO;

        for &(product_id, quantity) in &lines {
            let product = sqlx::query_as::<_, Product>(
                "SELECT * FROM products WHERE id = $1 FOR UPDATE",
            )
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(ApiError::ProductNotFound)?;

            if product.stock < quantity {
                return Err(ApiError::InsufficientStock {
                    name: product.name,
                    available: product.stock,
                    requested: quantity,
                });
            }

            total_amount += product.price * Decimal::from(quantity);
            products.push((product, quantity));
        }

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (user_id, total_amount, status, payment_method, is_installment, shipping_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(total_amount)
        .bind(OrderStatus::Pending)
        .bind(payment_method)
        .bind(is_installment)
        .bind(shipping_address)
        .fetch_one(&mut **tx)
        .await?;

        for (product, quantity) in &products {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order.id)
            .bind(product.id)
            .bind(quantity)
            .bind(product.price)
            .execute(&mut **tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO purchase_history (
                    user_id, order_id, product_id, product_name, product_image_url,
                    quantity, unit_price, total_price, order_status, payment_method,
                    is_installment, purchase_date, shipping_address
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(user_id)
            .bind(order.id)
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.image_url)
            .bind(quantity)
            .bind(product.price)
            .bind(product.price * Decimal::from(*quantity))
            .bind(OrderStatus::Pending)
            .bind(payment_method)
            .bind(is_installment)
            .bind(order.created_at)
            .bind(shipping_address)
            .execute(&mut **tx)
            .await?;

            // Conditional decrement: even with the row lock held, the guard
            // keeps stock non-negative. Availability only ever clears here,
            // so a soft-deleted product is not resurrected.
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock = stock - $2,
                    is_available = is_available AND (stock - $2) > 0,
                    updated_at = NOW()
                WHERE id = $1 AND stock >= $2
                "#,
            )
            .bind(product.id)
            .bind(quantity)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(ApiError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                    requested: *quantity,
                });
            }
        }

        Ok(order)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_available = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn list_featured_products(&self) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_featured = TRUE AND is_available = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn list_products_by_category(&self, category_id: Uuid) -> Result<Vec<Product>, ApiError> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE category_id = $1 AND is_available = TRUE ORDER BY created_at DESC",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, ApiError> {
        let pattern = format!("%{}%", query);
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE (name ILIKE $1 OR description ILIKE $1 OR brand ILIKE $1)
              AND is_available = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Product, ApiError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::ProductNotFound)
    }

    async fn create_product(&self, req: CreateProductRequest) -> Result<Product, ApiError> {
        if !self.category_exists(req.category_id).await? {
            return Err(ApiError::CategoryNotFound);
        }

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, description, price, stock, image_url, brand, category_id, is_featured, is_available)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.price)
        .bind(req.stock)
        .bind(&req.image_url)
        .bind(&req.brand)
        .bind(req.category_id)
        .bind(req.is_featured)
        .bind(req.stock > 0)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> Result<Product, ApiError> {
        if let Some(category_id) = req.category_id {
            if !self.category_exists(category_id).await? {
                return Err(ApiError::CategoryNotFound);
            }
        }

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                stock = COALESCE($5, stock),
                image_url = COALESCE($6, image_url),
                brand = COALESCE($7, brand),
                category_id = COALESCE($8, category_id),
                is_featured = COALESCE($9, is_featured),
                is_available = CASE
                    WHEN COALESCE($5, stock) = 0 THEN FALSE
                    ELSE COALESCE($10, is_available)
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.price)
        .bind(req.stock)
        .bind(&req.image_url)
        .bind(&req.brand)
        .bind(req.category_id)
        .bind(req.is_featured)
        .bind(req.is_available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::ProductNotFound)?;

        Ok(product)
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), ApiError> {
        let result =
            sqlx::query("UPDATE products SET is_available = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::ProductNotFound);
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> Result<Category, ApiError> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ApiError::NotFound("category"))
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, ApiError> {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE name = $1)")
                .bind(&req.name)
                .fetch_one(&self.pool)
                .await?;
        if taken {
            return Err(ApiError::Conflict(
                "category with this name already exists".to_string(),
            ));
        }

        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, icon) VALUES ($1, $2) RETURNING *",
        )
        .bind(&req.name)
        .bind(&req.icon)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Category, ApiError> {
        let current = self.get_category(id).await?;

        if let Some(name) = &req.name {
            if *name != current.name {
                let taken: bool = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM categories WHERE name = $1 AND id != $2)",
                )
                .bind(name)
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
                if taken {
                    return Err(ApiError::Conflict(
                        "category with this name already exists".to_string(),
                    ));
                }
            }
        }

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                icon = COALESCE($3, icon)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.icon)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), ApiError> {
        self.get_category(id).await?;

        let dependents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if dependents > 0 {
            return Err(ApiError::Conflict(
                "cannot delete category that has products associated with it".to_string(),
            ));
        }

        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, ApiError> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let product =
                sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
                    .bind(item.product_id)
                    .fetch_one(&self.pool)
                    .await?;
            lines.push(CartLine::new(item, product));
        }

        Ok(lines)
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        req: AddToCartRequest,
    ) -> Result<CartItem, ApiError> {
        let product = self.get_product(req.product_id).await?;

        if !product.is_available {
            return Err(ApiError::ProductUnavailable);
        }

        let existing = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user_id)
        .bind(req.product_id)
        .fetch_optional(&self.pool)
        .await?;

        let new_quantity = existing.as_ref().map_or(0, |item| item.quantity) + req.quantity;
        if product.stock < new_quantity {
            return Err(ApiError::InsufficientStock {
                name: product.name,
                available: product.stock,
                requested: new_quantity,
            });
        }

        let item = match existing {
            Some(existing) => {
                sqlx::query_as::<_, CartItem>(
                    "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
                )
                .bind(existing.id)
                .bind(new_quantity)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CartItem>(
                    "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) RETURNING *",
                )
                .bind(user_id)
                .bind(req.product_id)
                .bind(req.quantity)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(item)
    }

    async fn update_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartItem, ApiError> {
        let item = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE id = $1 AND user_id = $2",
        )
        .bind(item_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("cart item"))?;

        let product = self.get_product(item.product_id).await?;
        if product.stock < quantity {
            return Err(ApiError::InsufficientStock {
                name: product.name,
                available: product.stock,
                requested: quantity,
            });
        }

        let item = sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("cart item"));
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn cart_total(&self, user_id: Uuid) -> Result<Decimal, ApiError> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(p.price * c.quantity), 0)
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn create_order_from_cart(
        &self,
        user_id: Uuid,
        shipping_address: &str,
    ) -> Result<OrderView, ApiError> {
        let mut tx = self.pool.begin().await?;

        let cart = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        if cart.is_empty() {
            return Err(ApiError::CartEmpty);
        }

        let lines: Vec<(Uuid, i32)> = cart
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        let order = self
            .place_order(&mut tx, user_id, &lines, None, false, shipping_address)
            .await?;

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        log::info!("order {} placed from cart for user {}", order.id, user_id);
        self.attach_items(order).await
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

        let mut tx = self.pool.begin().await?;

        let order = self
            .place_order(
                &mut tx,
                user_id,
                &lines,
                Some(&req.payment_method),
                req.is_installment,
                &req.shipping_address,
            )
            .await?;

        tx.commit().await?;

        log::info!("order {} placed for user {}", order.id, user_id);
        self.attach_items(order).await
    }

    async fn get_user_orders(
        &self,
        user_id: Uuid,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<OrderView>, i64), ApiError> {
        let (total, orders) = match status {
            Some(status) => {
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status = $2",
                )
                .bind(user_id)
                .bind(status)
                .fetch_one(&self.pool)
                .await?;

                let orders = sqlx::query_as::<_, Order>(
                    r#"
                    SELECT * FROM orders WHERE user_id = $1 AND status = $2
                    ORDER BY created_at DESC LIMIT $3 OFFSET $4
                    "#,
                )
                .bind(user_id)
                .bind(status)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                (total, orders)
            }
            None => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
                        .bind(user_id)
                        .fetch_one(&self.pool)
                        .await?;

                let orders = sqlx::query_as::<_, Order>(
                    r#"
                    SELECT * FROM orders WHERE user_id = $1
                    ORDER BY created_at DESC LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;

                (total, orders)
            }
        };

        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            views.push(self.attach_items(order).await?);
        }

        Ok((views, total))
    }

    async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderView, ApiError> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 AND user_id = $2",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("order"))?;

        self.attach_items(order).await
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("order"))?;

        if !order.status.can_transition_to(status) {
            return Err(ApiError::IllegalStatusTransition {
                from: order.status,
                to: status,
            });
        }

        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        // Keep the denormalized projection in step with the order.
        if status == OrderStatus::Delivered {
            sqlx::query(
                "UPDATE purchase_history SET order_status = $2, delivery_date = NOW(), updated_at = NOW() WHERE order_id = $1",
            )
            .bind(order_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE purchase_history SET order_status = $2, updated_at = NOW() WHERE order_id = $1",
            )
            .bind(order_id)
            .bind(status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn order_stats(&self, user_id: Uuid) -> Result<OrderStats, ApiError> {
        let status_counts = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders WHERE user_id = $1 GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let total_spent: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_amount), 0) FROM orders WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(OrderStatus::Delivered)
        .fetch_one(&self.pool)
        .await?;

        let last_order_date: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT created_at FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

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
        fn apply_filters<'a>(
            builder: &mut QueryBuilder<'a, Postgres>,
            user_id: Uuid,
            filter: &'a HistoryFilter,
        ) {
            builder.push(" WHERE user_id = ").push_bind(user_id);
            if let Some(status) = filter.status {
                builder.push(" AND order_status = ").push_bind(status);
            }
            if let Some(payment_method) = &filter.payment_method {
                builder.push(" AND payment_method = ").push_bind(payment_method);
            }
            if let Some(is_installment) = filter.is_installment {
                builder.push(" AND is_installment = ").push_bind(is_installment);
            }
            if let Some(start) = filter.start_date {
                builder.push(" AND purchase_date >= ").push_bind(start);
            }
            if let Some(end) = filter.end_date {
                builder.push(" AND purchase_date <= ").push_bind(end);
            }
            if let Some(name) = &filter.product_name {
                builder
                    .push(" AND product_name ILIKE ")
                    .push_bind(format!("%{}%", name));
            }
        }

        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM purchase_history");
        apply_filters(&mut count_builder, user_id, filter);
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::new("SELECT * FROM purchase_history");
        apply_filters(&mut builder, user_id, filter);
        builder
            .push(" ORDER BY purchase_date DESC LIMIT ")
            .push_bind(filter.limit())
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let records = builder
            .build_query_as::<PurchaseHistory>()
            .fetch_all(&self.pool)
            .await?;

        Ok((records, total))
    }

    async fn get_purchase_history(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<PurchaseHistory, ApiError> {
        sqlx::query_as::<_, PurchaseHistory>(
            "SELECT * FROM purchase_history WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ApiError::NotFound("purchase history"))
    }

    async fn purchase_stats(&self, user_id: Uuid) -> Result<HistoryStats, ApiError> {
        let (total_orders, total_amount): (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_price), 0) FROM purchase_history WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let status_counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT order_status AS status, COUNT(*) AS count
            FROM purchase_history WHERE user_id = $1 GROUP BY order_status
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = HistoryStats {
            total_orders,
            total_amount,
            delivered_orders: 0,
            pending_orders: 0,
            cancelled_orders: 0,
            avg_order_value: Decimal::ZERO,
        };

        for entry in status_counts {
            match entry.status {
                OrderStatus::Delivered => stats.delivered_orders = entry.count,
                OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Shipped => {
                    stats.pending_orders += entry.count
                }
                OrderStatus::Cancelled => stats.cancelled_orders = entry.count,
            }
        }

        if stats.total_orders > 0 {
            stats.avg_order_value = stats.total_amount / Decimal::from(stats.total_orders);
        }

        Ok(stats)
    }

    async fn recent_purchases(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PurchaseHistory>, ApiError> {
        let records = sqlx::query_as::<_, PurchaseHistory>(
            r#"
            SELECT * FROM purchase_history
            WHERE user_id = $1 AND purchase_date >= NOW() - INTERVAL '30 days'
            ORDER BY purchase_date DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
