use axum_storefront_api::{
    config::AppConfig,
    db::create_pool,
    services::auth_service::hash_password,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let user_id = ensure_user(&pool, "shopper@example.com", "shopper123").await?;
    seed_products(&pool).await?;

    println!("Seed completed. Shopper ID: {user_id}");
    Ok(())
}

async fn ensure_user(pool: &sqlx::PgPool, email: &str, password: &str) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET password_hash = EXCLUDED.password_hash
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO user_profiles (id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.0)
    .execute(pool)
    .await?;

    println!("Ensured user {email} with profile");
    Ok(row.0)
}

async fn seed_products(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let products = [
        ("pp5001340155", "Arizona Original Bootcut Jeans", "Classic five-pocket denim", "28.99", true),
        ("pp5007930078", "Canvas Tote Bag", "Heavy cotton tote", "12.50", false),
        ("pp5004360181", "Ferris Crab Mug", "Coffee tastes better with Ferris", "9.99", false),
        ("pp5008210052", "Merino Crew Sweater", "Lightweight knit", "54.00", true),
    ];

    for (sku, name, desc, price, has_sizes) in products {
        let price: Decimal = price.parse()?;
        sqlx::query(
            r#"
            INSERT INTO products (sku, name, description, price, has_sizes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(sku)
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(has_sizes)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
