//! Demo data loaded at startup so a fresh deployment has something to order.

use crate::domain::money::Money;
use crate::domain::product::{Category, Product, ProductStatus};
use crate::domain::repository::{ProductRepository, UserRepository};
use crate::domain::user::{AccountStatus, Role, User};
use crate::infrastructure::security::hash_password;
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::info;

/// Id the demo merchant receives when users are seeded into an empty store.
pub const DEMO_MERCHANT_ID: u64 = 2;

const DEMO_USERS: [(&str, &str, Role, &str); 3] = [
    ("admin", "admin123", Role::Admin, "Canteen Administrator"),
    ("merchant", "merchant123", Role::Merchant, "North Canteen Kitchen"),
    ("student", "student123", Role::User, "Demo Student"),
];

const DEMO_CATEGORIES: [(&str, &str); 8] = [
    ("Set Meals", "Rice with a main dish"),
    ("Noodles", "Noodles and wheat dishes"),
    ("Soups", "Light and hearty soups"),
    ("Vegetarian", "Meat-free dishes"),
    ("Meat Dishes", "Pork, chicken and beef"),
    ("Drinks", "Tea, milk tea and juice"),
    ("Snacks", "Dumplings and small bites"),
    ("Breakfast", "Served until ten"),
];

// (name, description, price in cents, category position, hot)
const DEMO_PRODUCTS: [(&str, &str, u64, usize, bool); 18] = [
    ("Braised Pork Set", "Classic braised pork belly with rice", 1800, 0, true),
    ("Kung Pao Chicken Set", "Kung pao chicken with rice", 1600, 0, false),
    ("Sweet and Sour Pork Set", "Sweet and sour tenderloin with rice", 1700, 0, true),
    ("Lanzhou Beef Noodles", "Hand-pulled noodles in beef broth", 1200, 1, true),
    ("Zhajiang Noodles", "Noodles with fried bean sauce", 1100, 1, false),
    ("Tomato Egg Noodles", "Home-style tomato and egg noodles", 1000, 1, false),
    ("Seaweed Egg Soup", "Light seaweed and egg drop soup", 600, 2, false),
    ("Winter Melon Rib Soup", "Pork rib soup with winter melon", 800, 2, true),
    ("Mapo Tofu", "Sichuan tofu in chili bean sauce", 900, 3, false),
    ("Stir-fried Greens", "Seasonal vegetables", 700, 3, false),
    ("Cola Chicken Wings", "Wings braised in cola", 1400, 4, true),
    ("Braised Spare Ribs", "Home-style braised ribs", 1600, 4, false),
    ("Honey Lemon Tea", "Lemon tea with honey", 500, 5, false),
    ("Milk Tea", "Rich milk tea", 600, 5, true),
    ("Xiaolongbao", "Shanghai soup dumplings", 800, 6, true),
    ("Pan-fried Dumplings", "Crispy pan-fried dumplings", 700, 6, false),
    ("Soy Milk and Youtiao", "Soy milk with fried dough sticks", 400, 7, false),
    ("Millet Porridge", "Millet porridge with pickles", 300, 7, false),
];

/// Inserts the demo accounts unless the store already has users.
pub async fn seed_users<R: UserRepository>(repository: &R) -> Result<()> {
    if !repository.list_users().await?.is_empty() {
        info!("Users already present, skipping demo accounts");
        return Ok(());
    }

    for (username, password, role, real_name) in DEMO_USERS {
        let now = Utc::now();
        let user = User {
            id: 0,
            username: username.to_string(),
            password_hash: hash_password(password)
                .map_err(|e| anyhow::anyhow!("failed to hash demo password: {e}"))?,
            email: Some(format!("{username}@canteen.local")),
            phone: None,
            real_name: Some(real_name.to_string()),
            college: None,
            address: None,
            avatar: None,
            role,
            status: AccountStatus::Enabled,
            create_time: now,
            update_time: now,
        };
        repository.insert_user(user).await?;
    }

    info!(count = DEMO_USERS.len(), "Demo accounts created");
    Ok(())
}

/// Inserts the demo menu unless the store already has categories.
pub async fn seed_catalog<R: ProductRepository>(repository: &R, merchant_id: u64) -> Result<()> {
    if !repository.list_categories().await?.is_empty() {
        info!("Categories already present, skipping demo menu");
        return Ok(());
    }

    let mut category_ids = Vec::with_capacity(DEMO_CATEGORIES.len());
    for (position, (name, description)) in DEMO_CATEGORIES.iter().enumerate() {
        let category = repository
            .insert_category(Category {
                id: 0,
                name: name.to_string(),
                description: description.to_string(),
                sort_order: position as u32 + 1,
                enabled: true,
            })
            .await?;
        category_ids.push(category.id);
    }

    let base = Utc::now();
    for (index, (name, description, cents, category, hot)) in DEMO_PRODUCTS.iter().enumerate() {
        let category_id = *category_ids
            .get(*category)
            .context("demo product references a missing category")?;
        // Older entries first so "newest" ordering follows the menu order in reverse.
        let created = base - Duration::minutes((DEMO_PRODUCTS.len() - index) as i64);
        repository
            .insert_product(Product {
                id: 0,
                name: name.to_string(),
                description: description.to_string(),
                price: Money::from_cents(*cents),
                category_id,
                merchant_id,
                image_url: Some(format!("/images/products/{}.jpg", index + 1)),
                stock: 100,
                sales: 10 + ((index as u32 * 7) % 40),
                status: ProductStatus::OnSale,
                is_hot: *hot,
                rating: 4.0 + ((index % 10) as f64) / 10.0,
                create_time: created,
                update_time: created,
            })
            .await?;
    }

    info!(
        categories = DEMO_CATEGORIES.len(),
        products = DEMO_PRODUCTS.len(),
        "Demo menu created"
    );
    Ok(())
}
