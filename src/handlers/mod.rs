pub mod cart;
pub mod categories;
pub mod history;
pub mod orders;
pub mod products;
