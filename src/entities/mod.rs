pub mod banner;
pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use rand::rngs::OsRng;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Schema,
    Set,
};

use crate::config::AppConfig;
use crate::entities::{
    banner::Entity as Banner, category::Entity as Category, order::Entity as Order,
    order_item::Entity as OrderItem, product::Entity as Product, user::Entity as User,
};

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = [
        schema.create_table_from_entity(User),
        schema.create_table_from_entity(Category),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Banner),
        schema.create_table_from_entity(Order),
        schema.create_table_from_entity(OrderItem),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    Ok(())
}

/// Creates the configured admin account unless a user with that email exists.
pub async fn seed_admin(db: &DatabaseConnection, config: &AppConfig) -> Result<(), DbErr> {
    let existing = User::find()
        .filter(user::Column::Email.eq(config.admin_email.as_str()))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password = hash_password(&config.admin_password)
        .map_err(|err| DbErr::Custom(format!("Failed to hash admin password: {err}")))?;

    let admin = user::ActiveModel {
        name: Set(config.admin_name.clone()),
        email: Set(config.admin_email.clone()),
        password: Set(password),
        role: Set(user::Role::Admin),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    User::insert(admin).exec(db).await?;

    tracing::info!(email = %config.admin_email, "Seeded admin account");
    Ok(())
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| err.to_string())
}
